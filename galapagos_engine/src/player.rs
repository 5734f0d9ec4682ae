//! The player boundary: anything that can pick moves in a timed game.

use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use galapagos_core::board::{Board, MoveRef};
use galapagos_core::clock::Clock;

use crate::calibration::Calibration;
use crate::genome::Genome;
use crate::search::{Search, SearchReport};

/// A participant in a game. External protocol drivers, humans, and the
/// evolved engine all sit behind this interface.
pub trait Player {
    fn name(&self) -> String;

    /// Pick a move in the current position. Returns [`None`] only if the
    /// game is already over (the driver checks results first, so a well
    /// behaved driver never sees it).
    fn choose_move(&mut self, board: &Board, clock: &Clock) -> Option<MoveRef>;

    /// Commentary to record after the chosen move (a principal variation,
    /// a score), if the player has any.
    fn commentary(&self) -> Option<String> {
        None
    }
}

/// The evolved engine: a genome driving the search, calibrated at
/// construction.
pub struct GeneticPlayer {
    genome: Genome,
    id: u64,
    calibration: Calibration,
    move_now: Arc<AtomicBool>,
    remembered_line: Vec<MoveRef>,
    last_report: Option<SearchReport>,
}

impl GeneticPlayer {
    /// Build a player and run the self-calibration (a brief timing search
    /// plus the pawn-value sampling).
    pub fn new(genome: Genome, id: u64) -> Self {
        let calibration = Calibration::measure(&genome, &mut rand::thread_rng());
        Self::with_calibration(genome, id, calibration)
    }

    /// Build a player with a known calibration (e.g. measured once and
    /// shared across a tournament on the same machine).
    pub fn with_calibration(genome: Genome, id: u64, calibration: Calibration) -> Self {
        Self {
            genome,
            id,
            calibration,
            move_now: Arc::new(AtomicBool::new(false)),
            remembered_line: Vec::new(),
            last_report: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn genome(&self) -> &Genome {
        &self.genome
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// The cooperative cancellation flag: setting it makes the search
    /// return its best answer so far at the next node boundary. Protocol
    /// threads hold a clone of this handle.
    pub fn move_now_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.move_now)
    }

    pub fn last_report(&self) -> Option<&SearchReport> {
        self.last_report.as_ref()
    }

    /// The tail of the previous principal variation that is still ahead
    /// of us: our predicted move held if the opponent played the line's
    /// reply.
    fn usable_seed(&self, board: &Board) -> &[MoveRef] {
        match (self.remembered_line.get(1), board.last_move()) {
            (Some(&predicted), Some(played)) if predicted == played => {
                &self.remembered_line[2..]
            }
            _ => &[],
        }
    }
}

impl Player for GeneticPlayer {
    fn name(&self) -> String {
        format!("Genetic AI {}", self.id)
    }

    fn choose_move(&mut self, board: &Board, clock: &Clock) -> Option<MoveRef> {
        self.move_now.store(false, AtomicOrdering::Relaxed);

        let budget = self.genome.time_to_examine(board, clock);
        let mut scratch = board.clone();
        let seed: Vec<MoveRef> = self.usable_seed(board).to_vec();

        let report = Search::new(&self.genome, &self.calibration, &self.move_now)
            .choose_move(&mut scratch, budget, &seed)?;

        self.remembered_line = report.score.line().to_vec();
        let best = report.best_move;
        self.last_report = Some(report);
        Some(best)
    }

    fn commentary(&self) -> Option<String> {
        let report = self.last_report.as_ref()?;
        if report.nodes_searched == 0 {
            return Some("book".to_owned());
        }

        let centipawns = self.calibration.to_centipawns(report.score.value());
        let line = report
            .score
            .line()
            .iter()
            .map(|m| m.coordinates())
            .collect::<Vec<_>>()
            .join(" ");
        Some(format!(
            "{centipawns:+} cp, depth {}, {} nodes: {line}",
            report.depth_reached, report.nodes_searched
        ))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use galapagos_core::board::Color;
    use pretty_assertions::assert_eq;

    fn quick_player(id: u64) -> GeneticPlayer {
        GeneticPlayer::with_calibration(Genome::new(), id, Calibration::default())
    }

    #[test]
    fn picks_legal_moves() {
        let mut player = quick_player(1);
        let board = Board::starting_position();
        let mut clock = Clock::with_time(1.0);
        clock.start(Color::White);

        let m = player.choose_move(&board, &clock).unwrap();
        assert!(board.legal_moves().contains(&m));
        assert!(player.commentary().is_some());
    }

    #[test]
    fn remembers_its_line_between_moves() {
        let mut player = quick_player(2);
        let mut board = Board::starting_position();
        let mut clock = Clock::with_time(2.0);
        clock.start(Color::White);

        let first = player.choose_move(&board, &clock).unwrap();
        board.play_move(first);
        assert_eq!(player.remembered_line.first(), Some(&first));
    }

    #[test]
    fn move_now_flag_is_shared() {
        let player = quick_player(3);
        let flag = player.move_now_flag();
        flag.store(true, AtomicOrdering::Relaxed);
        assert!(player.move_now.load(AtomicOrdering::Relaxed));
    }
}
