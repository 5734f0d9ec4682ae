use std::any::Any;

use galapagos_core::board::{Board, Color, Square};

use super::{Gene, GeneProfile, PieceValues};

/// Legal-move count for the side to move, normalized. Contributes only
/// from the mover's perspective; the opponent's freedom is unknowable
/// without a null move.
#[derive(Debug, Clone, Default)]
pub struct FreedomToMoveGene {
    profile: GeneProfile,
}

impl Gene for FreedomToMoveGene {
    fn name(&self) -> &'static str {
        "Freedom to Move Gene"
    }

    fn profile(&self) -> Option<&GeneProfile> {
        Some(&self.profile)
    }

    fn profile_mut(&mut self) -> Option<&mut GeneProfile> {
        Some(&mut self.profile)
    }

    fn score_board(&self, board: &Board, perspective: Color, _: u32, _: &PieceValues) -> f64 {
        if board.to_move() == perspective {
            board.legal_moves().len() as f64 / 128.0
        } else {
            0.0
        }
    }

    fn boxed_clone(&self) -> Box<dyn Gene> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// How much of the board the perspective attacks, with squares in the
/// opponent's half weighted half again as much.
#[derive(Debug, Clone, Default)]
pub struct SphereOfInfluenceGene {
    profile: GeneProfile,
}

impl Gene for SphereOfInfluenceGene {
    fn name(&self) -> &'static str {
        "Sphere of Influence Gene"
    }

    fn profile(&self) -> Option<&GeneProfile> {
        Some(&self.profile)
    }

    fn profile_mut(&mut self) -> Option<&mut GeneProfile> {
        Some(&mut self.profile)
    }

    fn score_board(&self, board: &Board, perspective: Color, _: u32, _: &PieceValues) -> f64 {
        let opponent_half = match perspective {
            Color::White => 4..8,
            Color::Black => 0..4,
        };

        let mut influence = 0.0;
        for square in Square::all() {
            if board.is_attacked(square, perspective) {
                influence += if opponent_half.contains(&square.rank()) {
                    1.5
                } else {
                    1.0
                };
            }
        }

        // 64 squares, half of them enhanced.
        influence / 80.0
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
    fn freedom_counts_only_the_mover() {
        let board = Board::starting_position();
        let gene = FreedomToMoveGene::default();
        let values = PieceValues::default();
        assert_eq!(
            gene.score_board(&board, Color::White, 0, &values),
            20.0 / 128.0
        );
        assert_eq!(gene.score_board(&board, Color::Black, 0, &values), 0.0);
    }

    #[test]
    fn influence_grows_with_development() {
        let gene = SphereOfInfluenceGene::default();
        let values = PieceValues::default();

        let start = Board::starting_position();
        let start_score = gene.score_board(&start, Color::White, 0, &values);

        let developed = Board::from_fen(
            "rnbqkbnr/pppppppp/8/8/2B1P3/5N2/PPPP1PPP/RNBQK2R w KQkq - 0 1",
        )
        .unwrap();
        let developed_score = gene.score_board(&developed, Color::White, 0, &values);

        assert!(developed_score > start_score);
    }

    #[test]
    fn enemy_territory_is_worth_more() {
        // A rook on the fourth rank vs the same rook on the fifth.
        let gene = SphereOfInfluenceGene::default();
        let values = PieceValues::default();

        let back = Board::from_fen("4k3/8/8/8/7R/8/8/4K3 w - - 0 1").unwrap();
        let forward = Board::from_fen("4k3/8/8/7R/8/8/8/4K3 w - - 0 1").unwrap();
        assert!(
            gene.score_board(&forward, Color::White, 0, &values)
                > gene.score_board(&back, Color::White, 0, &values)
        );
    }
}
