//! The single-game driver: alternates two players under a clock and
//! records the finished game as PGN.

use std::path::Path;

use chrono::Local;
use galapagos_core::board::{Board, Color};
use galapagos_core::clock::Clock;
use galapagos_core::game_result::GameResult;
use galapagos_core::pgn::{AnnotatedMove, GameRecord};
use log::{info, warn};

use crate::player::Player;

/// Play one game to completion.
///
/// The board's own rules (mate, stalemate, repetition, the fifty-move
/// rule, insufficient material) or the clock end the game; the result is
/// returned and, when `pgn_path` is given, the record is appended there.
#[allow(clippy::too_many_arguments)]
pub fn play_game(
    mut board: Board,
    mut clock: Clock,
    white: &mut dyn Player,
    black: &mut dyn Player,
    event: &str,
    site: &str,
    pgn_path: Option<&Path>,
) -> GameResult {
    let first_move_number = board.fullmove_number();
    let first_to_move = board.to_move();
    let starting_fen = (!board.started_from_standard_position())
        .then(|| board.starting_fen().to_owned());

    let mut moves = Vec::new();
    let mut result = board.game_state();

    clock.start(board.to_move());

    while !result.game_has_ended() {
        let player: &mut dyn Player = match board.to_move() {
            Color::White => white,
            Color::Black => black,
        };

        let Some(chosen) = player.choose_move(&board, &clock) else {
            // Only reachable if a player misbehaves in a live position.
            result = GameResult::Other(format!("{} resigned", player.name()));
            break;
        };

        let san = board.san(chosen);
        result = board.play_move(chosen);

        let clock_result = clock.punch(&board);
        if !result.game_has_ended() && clock_result.game_has_ended() {
            result = clock_result;
        }

        moves.push(AnnotatedMove {
            san,
            comment: player.commentary(),
        });
    }

    info!(
        "{} vs {}: {} after {} plies",
        white.name(),
        black.name(),
        result.ending_reason(),
        moves.len()
    );

    if let Some(path) = pgn_path {
        let record = GameRecord {
            event: event.to_owned(),
            site: site.to_owned(),
            date: Local::now().format("%Y.%m.%d").to_string(),
            round: String::new(),
            white: white.name(),
            black: black.name(),
            result: result.clone(),
            time_control: Some(clock.time_control_string()),
            time_left_white: Some(clock.time_left(Color::White)),
            time_left_black: Some(clock.time_left(Color::Black)),
            starting_fen,
            moves,
            first_move_number,
            first_to_move,
        };
        if let Err(error) = record.append_to_file(path) {
            warn!("could not record game in {}: {error}", path.display());
        }
    }

    result
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::calibration::Calibration;
    use crate::genome::Genome;
    use crate::player::GeneticPlayer;
    use galapagos_core::pgn::confirm_game_record;
    use pretty_assertions::assert_eq;

    fn quick_player(id: u64) -> GeneticPlayer {
        GeneticPlayer::with_calibration(Genome::new(), id, Calibration::default())
    }

    #[test]
    fn a_short_game_finishes_and_validates() {
        let mut white = quick_player(1);
        let mut black = quick_player(2);
        let board = Board::starting_position();
        let clock = Clock::with_time(2.0);

        let path = std::env::temp_dir().join(format!(
            "galapagos_game_test_{}.pgn",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);

        let result = play_game(
            board,
            clock,
            &mut white,
            &mut black,
            "driver test",
            "local",
            Some(&path),
        );

        assert!(result.game_has_ended());
        confirm_game_record(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn an_already_finished_position_plays_no_moves() {
        let mut white = quick_player(3);
        let mut black = quick_player(4);
        // Stalemate on the board before anyone moves.
        let board = Board::from_fen("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1").unwrap();
        let clock = Clock::with_time(1.0);

        let result = play_game(
            board,
            clock,
            &mut white,
            &mut black,
            "stalemate",
            "local",
            None,
        );
        assert_eq!(result, GameResult::Stalemate);
    }
}
