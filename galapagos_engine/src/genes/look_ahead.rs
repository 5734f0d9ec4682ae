use std::any::Any;

use galapagos_core::board::{Board, Color};
use galapagos_core::clock::Clock;
use rand::RngCore;

use super::{laplace, parse_number, unit, Gene, GenomeError, PieceValues, PropertyMap};

/// How the search walks the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMethod {
    /// One descent with a time-derived minimum depth.
    #[default]
    Minimax,
    /// Repeated full searches at depth 1, 2, 3, ...
    IterativeDeepening,
}

impl SearchMethod {
    fn as_str(self) -> &'static str {
        match self {
            SearchMethod::Minimax => "Minimax",
            SearchMethod::IterativeDeepening => "Iterative Deepening",
        }
    }

    fn from_str(text: &str) -> Option<Self> {
        match text {
            "Minimax" => Some(SearchMethod::Minimax),
            "Iterative Deepening" => Some(SearchMethod::IterativeDeepening),
            _ => None,
        }
    }
}

const MEAN_GAME_LENGTH_KEY: &str = "Mean Game Length";
const UNCERTAINTY_KEY: &str = "Game Length Uncertainty";
const SPECULATION_KEYS: [&str; 4] = [
    "Speculation-Default",
    "Speculation-Just Captured",
    "Speculation-Can Capture",
    "Speculation-Recapture",
];
const SEARCH_METHOD_KEY: &str = "Search Method";

/// The search-policy gene: how much clock to spend on a move, how far to
/// overcommit expecting alpha-beta cutoffs, and which search mode to run.
#[derive(Debug, Clone)]
pub struct LookAheadGene {
    /// Expected total game length in moves (per player), the median of a
    /// log-normal prior.
    mean_game_length: f64,
    /// Width of the log-normal game length prior.
    game_length_uncertainty: f64,
    /// Branch time multipliers, indexed by (last move captured,
    /// a capture is available) packed into two bits.
    speculation: [f64; 4],
    search_method: SearchMethod,
}

impl Default for LookAheadGene {
    fn default() -> Self {
        Self {
            mean_game_length: 50.0,
            game_length_uncertainty: 0.5,
            speculation: [1.0; 4],
            search_method: SearchMethod::default(),
        }
    }
}

impl LookAheadGene {
    /// Seconds to spend choosing the next move: remaining clock divided by
    /// the expected number of moves left (or the moves until the clock
    /// resets, whichever binds first).
    pub fn time_to_examine(&self, board: &Board, clock: &Clock) -> f64 {
        let to_move = board.to_move();
        let time_left = clock.time_left(to_move);
        let moves_to_reset = clock.moves_until_reset(to_move) as f64;

        let moves_so_far = (board.ply_count() / 2) as f64;
        let moves_left = average_moves_left(
            self.mean_game_length,
            self.game_length_uncertainty,
            moves_so_far,
        );

        (time_left / moves_left.min(moves_to_reset)).max(0.0)
    }

    /// The multiplier applied to a branch's time allotment. Cutoffs
    /// usually return time unspent, so values above one let the search
    /// run deeper; capture-laden positions get their own constants.
    pub fn speculation_factor(&self, last_move_captured: bool, capture_possible: bool) -> f64 {
        let index = last_move_captured as usize + 2 * capture_possible as usize;
        self.speculation[index]
    }

    pub fn search_method(&self) -> SearchMethod {
        self.search_method
    }
}

/// The expected number of moves still to play, assuming total game length
/// is log-normal with the given median and width, conditioned on
/// `moves_so_far` already having been played. Uses the continuous-integral
/// approximation of the truncated mean.
fn average_moves_left(mean_moves: f64, width: f64, moves_so_far: f64) -> f64 {
    let m = mean_moves.max(1.0).ln();
    let s = width.max(1e-6);
    let s2 = s * s;
    let sqrt2_s = s * std::f64::consts::SQRT_2;
    let ln_x = moves_so_far.max(1.0).ln();

    let a = (m + s2 / 2.0).exp() * (1.0 + erf((m + s2 - ln_x) / sqrt2_s));
    let b = 1.0 + erf((m - ln_x) / sqrt2_s);

    let expected_mean = a / b - moves_so_far;

    // Far beyond the prior both integrals vanish; expect the game to end
    // shortly rather than divide nothing by nothing.
    if expected_mean.is_finite() && expected_mean > 1.0 {
        expected_mean
    } else {
        1.0
    }
}

/// Abramowitz & Stegun 7.1.26 rational approximation, accurate to ~1e-7,
/// plenty for a time-allocation prior.
fn erf(x: f64) -> f64 {
    let sign = x.signum();
    let x = x.abs();

    let t = 1.0 / (1.0 + 0.3275911 * x);
    let poly = t
        * (0.254829592
            + t * (-0.284496736 + t * (1.421413741 + t * (-1.453152027 + t * 1.061405429))));
    sign * (1.0 - poly * (-x * x).exp())
}

impl Gene for LookAheadGene {
    fn name(&self) -> &'static str {
        "Look Ahead Gene"
    }

    fn score_board(&self, _: &Board, _: Color, _: u32, _: &PieceValues) -> f64 {
        0.0
    }

    fn write_gene_properties(&self, props: &mut PropertyMap) {
        props.insert(MEAN_GAME_LENGTH_KEY.to_owned(), self.mean_game_length.to_string());
        props.insert(
            UNCERTAINTY_KEY.to_owned(),
            self.game_length_uncertainty.to_string(),
        );
        for (key, value) in SPECULATION_KEYS.iter().zip(self.speculation) {
            props.insert((*key).to_owned(), value.to_string());
        }
        props.insert(
            SEARCH_METHOD_KEY.to_owned(),
            self.search_method.as_str().to_owned(),
        );
    }

    fn load_gene_properties(&mut self, props: &PropertyMap) -> Result<(), GenomeError> {
        self.mean_game_length = parse_number(self.name(), MEAN_GAME_LENGTH_KEY, props)?.abs();
        self.game_length_uncertainty = parse_number(self.name(), UNCERTAINTY_KEY, props)?.abs();
        let gene_name = self.name();
        for (key, slot) in SPECULATION_KEYS.iter().zip(self.speculation.iter_mut()) {
            *slot = parse_number(gene_name, key, props)?.abs();
        }

        let method_text =
            props
                .get(SEARCH_METHOD_KEY)
                .ok_or_else(|| GenomeError::MissingKey {
                    gene: self.name().to_owned(),
                    key: SEARCH_METHOD_KEY.to_owned(),
                })?;
        self.search_method =
            SearchMethod::from_str(method_text).ok_or_else(|| GenomeError::BadValue {
                gene: self.name().to_owned(),
                key: SEARCH_METHOD_KEY.to_owned(),
                value: method_text.clone(),
            })?;

        Ok(())
    }

    fn gene_property_count(&self) -> usize {
        7
    }

    fn mutate_gene(&mut self, rng: &mut dyn RngCore) {
        match rng.next_u64() % 7 {
            0 => {
                self.mean_game_length = (self.mean_game_length + laplace(rng, 1.0)).abs();
            }
            1 => {
                self.game_length_uncertainty =
                    (self.game_length_uncertainty + laplace(rng, 0.05)).abs();
            }
            2..=5 => {
                let slot = (rng.next_u64() % 4) as usize;
                self.speculation[slot] = (self.speculation[slot] + laplace(rng, 0.1)).abs();
            }
            _ => {
                // The search method flips only occasionally; the slot is
                // otherwise a no-op so modes stay stable across rounds.
                if unit(rng) < 0.01 {
                    self.search_method = match self.search_method {
                        SearchMethod::Minimax => SearchMethod::IterativeDeepening,
                        SearchMethod::IterativeDeepening => SearchMethod::Minimax,
                    };
                }
            }
        }
    }

    fn boxed_clone(&self) -> Box<dyn Gene> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn properties_round_trip() {
        let mut gene = LookAheadGene::default();
        let props = gene.properties();
        assert_eq!(props.len(), 7);
        assert_eq!(props[SEARCH_METHOD_KEY], "Minimax");

        gene.load_properties(&props).unwrap();
        assert_eq!(gene.properties(), props);
    }

    #[test]
    fn unknown_search_method_is_a_bad_value() {
        let mut gene = LookAheadGene::default();
        let mut props = gene.properties();
        props.insert(SEARCH_METHOD_KEY.to_owned(), "Oracle".to_owned());
        assert_eq!(
            gene.load_properties(&props),
            Err(GenomeError::BadValue {
                gene: "Look Ahead Gene".into(),
                key: SEARCH_METHOD_KEY.into(),
                value: "Oracle".into(),
            })
        );
    }

    #[test]
    fn expected_moves_left_shrinks_as_the_game_drags() {
        let early = average_moves_left(50.0, 0.5, 10.0);
        let late = average_moves_left(50.0, 0.5, 60.0);
        assert!(early > late);
        assert!(late >= 1.0);

        // Pathologically long games still budget for at least one move.
        assert_eq!(average_moves_left(50.0, 0.01, 10_000.0), 1.0);
    }

    #[test]
    fn time_budget_scales_with_the_clock() {
        let board = Board::starting_position();
        let gene = LookAheadGene::default();

        let mut rich = Clock::with_time(300.0);
        rich.start(Color::White);
        let mut poor = Clock::with_time(3.0);
        poor.start(Color::White);

        let rich_budget = gene.time_to_examine(&board, &rich);
        let poor_budget = gene.time_to_examine(&board, &poor);
        assert!(rich_budget > poor_budget);
        assert!(poor_budget > 0.0);
    }

    #[test]
    fn speculation_indexing() {
        let mut gene = LookAheadGene::default();
        gene.speculation = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(gene.speculation_factor(false, false), 1.0);
        assert_eq!(gene.speculation_factor(true, false), 2.0);
        assert_eq!(gene.speculation_factor(false, true), 3.0);
        assert_eq!(gene.speculation_factor(true, true), 4.0);
    }

    #[test]
    fn erf_matches_known_values() {
        assert!((erf(0.0)).abs() < 1e-7);
        assert!((erf(1.0) - 0.8427008).abs() < 1e-5);
        assert!((erf(-1.0) + 0.8427008).abs() < 1e-5);
        assert!((erf(3.0) - 0.9999779).abs() < 1e-5);
    }
}
