//! Scores carried through the search tree.

use galapagos_core::board::{Color, MoveRef};

/// The result of searching one branch: a value, the player it is measured
/// for, and the line of moves that realizes it.
///
/// Wins are `+INFINITY` and losses `-INFINITY`; among wins a shorter line
/// is better (faster mate) and among losses a longer line is better
/// (slower mate). Finite values compare on the number alone.
#[derive(Debug, Clone)]
pub struct TreeScore {
    value: f64,
    perspective: Color,
    line: Vec<MoveRef>,
}

impl TreeScore {
    pub fn new(value: f64, perspective: Color, line: Vec<MoveRef>) -> Self {
        Self {
            value,
            perspective,
            line,
        }
    }

    /// A lost position for `perspective` after the given line; the worst
    /// possible score, used to seed alpha.
    pub fn loss(perspective: Color, line: Vec<MoveRef>) -> Self {
        Self::new(f64::NEG_INFINITY, perspective, line)
    }

    /// A won position for `perspective`.
    pub fn win(perspective: Color, line: Vec<MoveRef>) -> Self {
        Self::new(f64::INFINITY, perspective, line)
    }

    /// The raw value from the owning perspective.
    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn perspective(&self) -> Color {
        self.perspective
    }

    /// The value as seen by `side`: negated when `side` is the opponent of
    /// the perspective the score was measured for.
    pub fn value_for(&self, side: Color) -> f64 {
        if side == self.perspective {
            self.value
        } else {
            -self.value
        }
    }

    pub fn is_win_for(&self, side: Color) -> bool {
        self.value_for(side) == f64::INFINITY
    }

    pub fn is_loss_for(&self, side: Color) -> bool {
        self.value_for(side) == f64::NEG_INFINITY
    }

    /// The number of plies in the line realizing this score.
    pub fn depth(&self) -> usize {
        self.line.len()
    }

    /// The move sequence realizing the score.
    pub fn line(&self) -> &[MoveRef] {
        &self.line
    }

    pub fn into_line(self) -> Vec<MoveRef> {
        self.line
    }

    /// Whether this score is preferable to `other` from `side`'s point of
    /// view: higher value wins; equal infinite values prefer the shorter
    /// win or the longer loss.
    pub fn is_better_than(&self, other: &TreeScore, side: Color) -> bool {
        let mine = self.value_for(side);
        let theirs = other.value_for(side);

        if mine == theirs {
            if mine == f64::INFINITY {
                self.depth() < other.depth()
            } else if mine == f64::NEG_INFINITY {
                self.depth() > other.depth()
            } else {
                false
            }
        } else {
            mine > theirs
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn values_flip_with_perspective() {
        let score = TreeScore::new(2.5, Color::White, Vec::new());
        assert_eq!(score.value_for(Color::White), 2.5);
        assert_eq!(score.value_for(Color::Black), -2.5);
    }

    #[test]
    fn finite_scores_compare_on_value() {
        let better = TreeScore::new(1.0, Color::White, Vec::new());
        let worse = TreeScore::new(0.5, Color::White, Vec::new());
        assert!(better.is_better_than(&worse, Color::White));
        assert!(worse.is_better_than(&better, Color::Black));
        assert!(!better.is_better_than(&better, Color::White));
    }

    fn stub_line(n: usize) -> Vec<MoveRef> {
        use galapagos_core::board::{rays_from, Piece, Square};
        let m = &rays_from(Piece::WHITE_KNIGHT, Square::B1)[0][0];
        vec![m; n]
    }

    #[test]
    fn faster_mates_are_preferred() {
        let quick = TreeScore::new(f64::INFINITY, Color::White, stub_line(1));
        let slow = TreeScore::new(f64::INFINITY, Color::White, stub_line(3));
        assert!(quick.is_better_than(&slow, Color::White));
        // For the loser, the longer loss is preferable.
        assert!(slow.is_better_than(&quick, Color::Black));
    }

    #[test]
    fn a_win_beats_any_finite_score() {
        let win = TreeScore::win(Color::White, Vec::new());
        let finite = TreeScore::new(1_000.0, Color::White, Vec::new());
        assert!(win.is_better_than(&finite, Color::White));
        assert!(finite.is_better_than(&win, Color::Black));
    }
}
