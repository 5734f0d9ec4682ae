use std::any::Any;

use galapagos_core::board::{Board, Color, Piece, Square};
use rand::RngCore;

use super::{coin_flip, laplace, parse_number, Gene, GeneProfile, GenomeError, PieceValues, PropertyMap};

fn own_pawn_squares(board: &Board, color: Color) -> impl Iterator<Item = Square> + '_ {
    let pawn = Piece::pawn(color);
    Square::all().filter(move |&square| board.piece_on(square) == Some(pawn))
}

const NON_LINEARITY_KEY: &str = "Non-linearity";

/// Rewards pawns for distance from their home rank, with an evolvable
/// exponent bending the reward toward early or late ranks.
#[derive(Debug, Clone, Default)]
pub struct PawnAdvancementGene {
    profile: GeneProfile,
    non_linearity: f64,
}

impl Gene for PawnAdvancementGene {
    fn name(&self) -> &'static str {
        "Pawn Advancement Gene"
    }

    fn profile(&self) -> Option<&GeneProfile> {
        Some(&self.profile)
    }

    fn profile_mut(&mut self) -> Option<&mut GeneProfile> {
        Some(&mut self.profile)
    }

    fn score_board(&self, board: &Board, perspective: Color, _: u32, _: &PieceValues) -> f64 {
        let home_rank = match perspective {
            Color::White => 1i32,
            Color::Black => 6i32,
        };

        let mut score = 0.0;
        for square in own_pawn_squares(board, perspective) {
            let advance = (square.rank() as i32 - home_rank).abs() as f64;
            score += (advance / 5.0).powf(1.0 + self.non_linearity);
        }
        score / 8.0
    }

    fn write_gene_properties(&self, props: &mut PropertyMap) {
        props.insert(NON_LINEARITY_KEY.to_owned(), self.non_linearity.to_string());
    }

    fn load_gene_properties(&mut self, props: &PropertyMap) -> Result<(), GenomeError> {
        self.non_linearity = parse_number(self.name(), NON_LINEARITY_KEY, props)?;
        Ok(())
    }

    fn gene_property_count(&self) -> usize {
        1
    }

    fn mutate_gene(&mut self, rng: &mut dyn RngCore) {
        self.non_linearity += laplace(rng, 0.01);
    }

    fn boxed_clone(&self) -> Box<dyn Gene> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Rewards pawns with no enemy pawn ahead of them on their own or an
/// adjacent file; such blockers each claim back a share of the point.
#[derive(Debug, Clone, Default)]
pub struct PassedPawnGene {
    profile: GeneProfile,
}

impl Gene for PassedPawnGene {
    fn name(&self) -> &'static str {
        "Passed Pawn Gene"
    }

    fn profile(&self) -> Option<&GeneProfile> {
        Some(&self.profile)
    }

    fn profile_mut(&mut self) -> Option<&mut GeneProfile> {
        Some(&mut self.profile)
    }

    fn score_board(&self, board: &Board, perspective: Color, _: u32, _: &PieceValues) -> f64 {
        let enemy_pawn = Piece::pawn(perspective.opposite());
        let forward = perspective.pawn_direction();

        let mut score = 0.0;
        for square in own_pawn_squares(board, perspective) {
            let file = square.file() as i8;
            let neighbor_files = (file - 1).max(0)..=(file + 1).min(7);
            let share = 1.0 / (neighbor_files.clone().count() as f64);

            score += 1.0;
            for blocker_file in neighbor_files {
                let mut probe = square;
                while let Some(ahead) = probe.offset_by(blocker_file - probe.file() as i8, forward)
                {
                    if board.piece_on(ahead) == Some(enemy_pawn) {
                        score -= share;
                        break;
                    }
                    probe = ahead;
                }
            }
        }
        score / 8.0
    }

    fn boxed_clone(&self) -> Box<dyn Gene> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Penalizes doubled (and worse) pawns: one point per extra pawn on a
/// file, scaled to the six that could possibly stack.
#[derive(Debug, Clone, Default)]
pub struct StackedPawnsGene {
    profile: GeneProfile,
}

impl Gene for StackedPawnsGene {
    fn name(&self) -> &'static str {
        "Stacked Pawns Gene"
    }

    fn profile(&self) -> Option<&GeneProfile> {
        Some(&self.profile)
    }

    fn profile_mut(&mut self) -> Option<&mut GeneProfile> {
        Some(&mut self.profile)
    }

    fn score_board(&self, board: &Board, perspective: Color, _: u32, _: &PieceValues) -> f64 {
        let mut per_file = [0u32; 8];
        for square in own_pawn_squares(board, perspective) {
            per_file[square.file() as usize] += 1;
        }

        let extra: u32 = per_file.iter().map(|&n| n.saturating_sub(1)).sum();
        -(extra as f64) / 6.0
    }

    fn boxed_clone(&self) -> Box<dyn Gene> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Penalizes each contiguous group of occupied files beyond the first...
/// or rather, counts the groups: more islands, weaker structure.
#[derive(Debug, Clone, Default)]
pub struct PawnIslandsGene {
    profile: GeneProfile,
}

impl Gene for PawnIslandsGene {
    fn name(&self) -> &'static str {
        "Pawn Islands Gene"
    }

    fn profile(&self) -> Option<&GeneProfile> {
        Some(&self.profile)
    }

    fn profile_mut(&mut self) -> Option<&mut GeneProfile> {
        Some(&mut self.profile)
    }

    fn score_board(&self, board: &Board, perspective: Color, _: u32, _: &PieceValues) -> f64 {
        let mut file_occupied = [false; 8];
        for square in own_pawn_squares(board, perspective) {
            file_occupied[square.file() as usize] = true;
        }

        let mut islands = 0;
        let mut in_island = false;
        for occupied in file_occupied {
            if occupied && !in_island {
                islands += 1;
            }
            in_island = occupied;
        }

        -(islands as f64) / 4.0
    }

    fn boxed_clone(&self) -> Box<dyn Gene> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

const GUARDED_BY_PAWN_KEY: &str = "Guarded By Pawn";
const GUARDED_BY_PIECE_KEY: &str = "Guarded By Piece";

/// Rewards defended pawns, distinguishing the pawn chain (a pawn guarded
/// by a pawn) from piece support. The two awards normalize to unit total
/// weight so only their ratio evolves.
#[derive(Debug, Clone)]
pub struct PawnStructureGene {
    profile: GeneProfile,
    guarded_by_pawn: f64,
    guarded_by_piece: f64,
}

impl Default for PawnStructureGene {
    fn default() -> Self {
        let mut gene = Self {
            profile: GeneProfile::default(),
            guarded_by_pawn: 0.5,
            guarded_by_piece: 0.5,
        };
        gene.normalize_guard_scores();
        gene
    }
}

impl PawnStructureGene {
    fn normalize_guard_scores(&mut self) {
        let total = self.guarded_by_pawn.abs() + self.guarded_by_piece.abs();
        if total > 0.0 {
            self.guarded_by_pawn /= total;
            self.guarded_by_piece /= total;
        }
    }
}

impl Gene for PawnStructureGene {
    fn name(&self) -> &'static str {
        "Pawn Structure Gene"
    }

    fn profile(&self) -> Option<&GeneProfile> {
        Some(&self.profile)
    }

    fn profile_mut(&mut self) -> Option<&mut GeneProfile> {
        Some(&mut self.profile)
    }

    fn score_board(&self, board: &Board, perspective: Color, _: u32, _: &PieceValues) -> f64 {
        let own_pawn = Piece::pawn(perspective);
        let back = -perspective.pawn_direction();

        let mut score = 0.0;
        for square in own_pawn_squares(board, perspective) {
            let pawn_guarded = [-1, 1].into_iter().any(|file_delta| {
                square
                    .offset_by(file_delta, back)
                    .and_then(|guard| board.piece_on(guard))
                    == Some(own_pawn)
            });

            if pawn_guarded {
                score += self.guarded_by_pawn;
            } else if board.is_attacked(square, perspective) {
                score += self.guarded_by_piece;
            }
        }
        score / 8.0
    }

    fn write_gene_properties(&self, props: &mut PropertyMap) {
        props.insert(GUARDED_BY_PAWN_KEY.to_owned(), self.guarded_by_pawn.to_string());
        props.insert(GUARDED_BY_PIECE_KEY.to_owned(), self.guarded_by_piece.to_string());
    }

    fn load_gene_properties(&mut self, props: &PropertyMap) -> Result<(), GenomeError> {
        // Stored values were normalized when written; loading them verbatim
        // keeps the file byte-stable across a read/write cycle.
        self.guarded_by_pawn = parse_number(self.name(), GUARDED_BY_PAWN_KEY, props)?;
        self.guarded_by_piece = parse_number(self.name(), GUARDED_BY_PIECE_KEY, props)?;
        Ok(())
    }

    fn gene_property_count(&self) -> usize {
        2
    }

    fn mutate_gene(&mut self, rng: &mut dyn RngCore) {
        let bump = laplace(rng, 0.1);
        if coin_flip(rng) {
            self.guarded_by_pawn += bump;
        } else {
            self.guarded_by_piece += bump;
        }
        self.normalize_guard_scores();
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

    fn values() -> PieceValues {
        PieceValues::default()
    }

    #[test]
    fn advancement_rewards_pushed_pawns() {
        let gene = PawnAdvancementGene::default();
        let start = Board::starting_position();
        assert_eq!(gene.score_board(&start, Color::White, 0, &values()), 0.0);

        let pushed = Board::from_fen(
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1",
        )
        .unwrap();
        let white = gene.score_board(&pushed, Color::White, 0, &values());
        assert!(white > 0.0);
        assert_eq!(gene.score_board(&pushed, Color::Black, 0, &values()), 0.0);
    }

    #[test]
    fn passed_pawns_score_full_points() {
        // White's a-pawn is passed; the e-pawn is blocked by black's own
        // e-pawn ahead of it.
        let board = Board::from_fen("4k3/4p3/8/8/P3P3/8/8/4K3 w - - 0 1").unwrap();
        let gene = PassedPawnGene::default();
        let white = gene.score_board(&board, Color::White, 0, &values());
        let black = gene.score_board(&board, Color::Black, 0, &values());

        // a4 is worth 1; e4 loses a share to the enemy e7 pawn.
        assert!(white > 1.0 / 8.0);
        assert!(white < 2.0 / 8.0);
        // Black's e7 pawn is likewise obstructed by e4.
        assert!(black < 1.0 / 8.0);
    }

    #[test]
    fn stacked_pawns_are_negative() {
        let board = Board::from_fen("4k3/8/8/8/8/4P3/4P3/4K3 w - - 0 1").unwrap();
        let gene = StackedPawnsGene::default();
        assert_eq!(
            gene.score_board(&board, Color::White, 0, &values()),
            -1.0 / 6.0
        );
        assert_eq!(gene.score_board(&board, Color::Black, 0, &values()), 0.0);
    }

    #[test]
    fn islands_count_contiguous_file_groups() {
        // Pawns on a, b, and e files: two islands.
        let board = Board::from_fen("4k3/8/8/8/8/8/PP2P3/4K3 w - - 0 1").unwrap();
        let gene = PawnIslandsGene::default();
        assert_eq!(
            gene.score_board(&board, Color::White, 0, &values()),
            -2.0 / 4.0
        );

        let start = Board::starting_position();
        assert_eq!(
            gene.score_board(&start, Color::White, 0, &values()),
            -1.0 / 4.0
        );
    }

    #[test]
    fn pawn_chains_beat_piece_support() {
        let gene = PawnStructureGene::default();

        // b2 guards c3.
        let chained = Board::from_fen("4k3/8/8/8/8/2P5/1P6/4K3 w - - 0 1").unwrap();
        let chained_score = gene.score_board(&chained, Color::White, 0, &values());

        // Two unconnected pawns, one defended by the king.
        let loose = Board::from_fen("4k3/8/8/8/2P5/8/4P3/4K3 w - - 0 1").unwrap();
        let loose_score = gene.score_board(&loose, Color::White, 0, &values());

        assert!(chained_score > 0.0);
        assert!(loose_score > 0.0);
        assert!(chained_score >= loose_score);
    }

    #[test]
    fn guard_scores_stay_normalized() {
        let mut gene = PawnStructureGene::default();
        let mut rng = crate::genes::test_support::rng();
        for _ in 0..50 {
            gene.mutate_gene(&mut rng);
            let total = gene.guarded_by_pawn.abs() + gene.guarded_by_piece.abs();
            assert!((total - 1.0).abs() < 1e-9);
        }
    }
}
