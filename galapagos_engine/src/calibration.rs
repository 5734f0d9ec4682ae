//! Self-measurement at engine construction: how long a search node takes
//! on this machine, and how big a pawn is on this genome's evaluation
//! scale. The first drives time budgeting, the second converts internal
//! scores to centipawns for external reporting.

use std::sync::atomic::AtomicBool;
use std::time::Instant;

use galapagos_core::board::{Board, Piece, PieceType, Square};
use log::debug;
use rand::RngCore;

use crate::genes::random_index;
use crate::genome::Genome;
use crate::search::Search;

/// Stop sampling pawn deltas when the standard error of the mean falls
/// below this fraction of the mean.
pub const CENTIPAWN_RELATIVE_TOLERANCE: f64 = 0.01;

/// Hard cap on pawn-delta samples if the tolerance is never reached.
pub const CENTIPAWN_SAMPLE_CAP: usize = 1000;

/// Wall-clock budget of the node-speed measurement search.
const SPEED_TEST_SECONDS: f64 = 0.1;

/// How many random plies to play when generating a sample position.
const SAMPLE_GAME_PLIES: usize = 20;

/// Measured engine characteristics.
#[derive(Debug, Clone)]
pub struct Calibration {
    /// Seconds per search node.
    pub node_seconds: f64,
    /// One centipawn, in evaluation units: a hundredth of the measured
    /// mean evaluation swing from removing a pawn.
    pub centipawn_value: f64,
}

impl Default for Calibration {
    /// Placeholder values used before (and during) measurement.
    fn default() -> Self {
        Self {
            node_seconds: 5e-5,
            centipawn_value: 6e-4,
        }
    }
}

impl Calibration {
    /// Measure both characteristics for a genome.
    pub fn measure(genome: &Genome, rng: &mut dyn RngCore) -> Self {
        let node_seconds = measure_node_seconds(genome);
        let centipawn_value = measure_centipawn_value(genome, rng, CENTIPAWN_SAMPLE_CAP);
        debug!("calibrated: {node_seconds:.3e} s/node, centipawn {centipawn_value:.3e}");
        Self {
            node_seconds,
            centipawn_value,
        }
    }

    /// An internal score in centipawns, for Xboard/UCI-style output.
    pub fn to_centipawns(&self, score: f64) -> i64 {
        if self.centipawn_value > 0.0 {
            (score / self.centipawn_value).round() as i64
        } else {
            0
        }
    }
}

/// Run a short search from the starting position and time it.
fn measure_node_seconds(genome: &Genome) -> f64 {
    let provisional = Calibration::default();
    let move_now = AtomicBool::new(false);
    let mut board = Board::starting_position();

    let start = Instant::now();
    let report = Search::new(genome, &provisional, &move_now)
        .choose_move(&mut board, SPEED_TEST_SECONDS, &[])
        .expect("the starting position has moves");

    start.elapsed().as_secs_f64() / report.nodes_searched.max(1) as f64
}

/// Score random positions with and without one random pawn; the mean
/// absolute difference is the evaluation weight of a pawn.
fn measure_centipawn_value(genome: &Genome, rng: &mut dyn RngCore, sample_cap: usize) -> f64 {
    let mut count = 0.0;
    let mut mean = 0.0;
    let mut m2 = 0.0;
    let mut attempts = 0usize;

    while (count as usize) < sample_cap {
        attempts += 1;
        if attempts > sample_cap.saturating_mul(10) {
            break;
        }
        let Some((board, lighter)) = sample_position_pair(rng) else {
            continue;
        };

        let with_pawn = genome.evaluate(&board, board.to_move(), 0);
        let without_pawn = genome.evaluate(&lighter, lighter.to_move(), 0);
        let delta = (with_pawn - without_pawn).abs();

        // Welford running statistics.
        count += 1.0;
        let step = delta - mean;
        mean += step / count;
        m2 += step * (delta - mean);

        if count >= 10.0 && mean > 0.0 {
            let standard_error = (m2 / (count * (count - 1.0))).sqrt();
            if standard_error / mean < CENTIPAWN_RELATIVE_TOLERANCE {
                break;
            }
        }
    }

    if mean > 0.0 {
        mean / 100.0
    } else {
        Calibration::default().centipawn_value
    }
}

/// A random middlegame-ish position plus the same position minus one
/// random pawn, when such a pair is constructible.
fn sample_position_pair(rng: &mut dyn RngCore) -> Option<(Board, Board)> {
    let mut board = Board::starting_position();
    for _ in 0..SAMPLE_GAME_PLIES {
        let moves = board.legal_moves();
        if moves.is_empty() {
            return None;
        }
        let m = moves[random_index(rng, moves.len())];
        if board.play_move(m).game_has_ended() {
            return None;
        }
    }

    let pawn_squares: Vec<Square> = Square::all()
        .filter(|&square| {
            board
                .piece_on(square)
                .is_some_and(|piece| piece.piece_type() == PieceType::Pawn)
        })
        .collect();
    if pawn_squares.is_empty() {
        return None;
    }
    let removed = pawn_squares[random_index(rng, pawn_squares.len())];

    let mut pieces: [Option<Piece>; 64] = [None; 64];
    for square in Square::all() {
        if square != removed {
            pieces[square.index()] = board.piece_on(square);
        }
    }

    // Removing the pawn may expose a king and make the position illegal;
    // the caller just draws another sample.
    let lighter = Board::new(
        &pieces,
        board.to_move(),
        board.castling(),
        None,
        0,
        1,
    )
    .ok()?;

    Some((board, lighter))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::genes::test_support;

    #[test]
    fn node_speed_is_positive_and_sane() {
        let genome = Genome::new();
        let node_seconds = measure_node_seconds(&genome);
        assert!(node_seconds > 0.0);
        assert!(node_seconds < 1.0);
    }

    #[test]
    fn pawn_weight_is_positive() {
        let genome = Genome::new();
        let mut rng = test_support::rng();
        let centipawn = measure_centipawn_value(&genome, &mut rng, 30);
        assert!(centipawn > 0.0);
    }

    #[test]
    fn centipawn_conversion() {
        let calibration = Calibration {
            node_seconds: 1e-5,
            centipawn_value: 0.002,
        };
        assert_eq!(calibration.to_centipawns(0.2), 100);
        assert_eq!(calibration.to_centipawns(-0.01), -5);
        assert_eq!(calibration.to_centipawns(0.0), 0);
    }
}
