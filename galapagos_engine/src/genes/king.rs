use std::any::Any;

use galapagos_core::board::{Board, CastleSide, Color, Direction, Square};
use rand::RngCore;

use super::{coin_flip, laplace, parse_number, Gene, GeneProfile, GenomeError, PieceValues, PropertyMap};

const FRIENDLY_BLOCK_KEY: &str = "Friendly Block Score";
const OPPONENT_BLOCK_KEY: &str = "Opponent Block Score";

/// Flood-fills the area the king could wander with unlimited consecutive
/// moves. Squares blocking the frontier score their blocker coefficient
/// (friendly piece vs enemy-attacked), averaged over the free area, so a
/// hemmed-in king shows up however large the board region around it.
#[derive(Debug, Clone)]
pub struct KingConfinementGene {
    profile: GeneProfile,
    friendly_block_score: f64,
    opponent_block_score: f64,
}

impl Default for KingConfinementGene {
    fn default() -> Self {
        Self {
            profile: GeneProfile::default(),
            friendly_block_score: -0.5,
            opponent_block_score: -0.5,
        }
    }
}

impl Gene for KingConfinementGene {
    fn name(&self) -> &'static str {
        "King Confinement Gene"
    }

    fn profile(&self) -> Option<&GeneProfile> {
        Some(&self.profile)
    }

    fn profile_mut(&mut self) -> Option<&mut GeneProfile> {
        Some(&mut self.profile)
    }

    fn score_board(&self, board: &Board, perspective: Color, _: u32, _: &PieceValues) -> f64 {
        let normalizer = self.friendly_block_score.abs() + self.opponent_block_score.abs();
        if normalizer == 0.0 {
            return 0.0;
        }

        let king = board.king_square(perspective);

        let mut queue = vec![king];
        let mut queued = [false; 64];
        queued[king.index()] = true;

        let mut blocked_total = 0.0;
        let mut free_squares = 0u32;

        let mut head = 0;
        while head < queue.len() {
            let square = queue[head];
            head += 1;

            let friendly_blocker = board
                .piece_on(square)
                .is_some_and(|p| p.color() == perspective && !p.is_king());
            let attacked = !board.safe_for_king(square, perspective);

            // The squares around the king always join the frontier, even
            // under attack, so a king in check still sees its neighborhood.
            let expand = if square == king {
                true
            } else if friendly_blocker {
                blocked_total += self.friendly_block_score;
                false
            } else if attacked {
                blocked_total += self.opponent_block_score;
                false
            } else {
                free_squares += 1;
                true
            };

            if expand {
                for direction in Direction::sliding() {
                    if let Some(next) =
                        square.offset_by(direction.file_delta(), direction.rank_delta())
                    {
                        if !queued[next.index()] {
                            queued[next.index()] = true;
                            queue.push(next);
                        }
                    }
                }
            }
        }

        (blocked_total / free_squares.max(1) as f64) / normalizer
    }

    fn write_gene_properties(&self, props: &mut PropertyMap) {
        props.insert(FRIENDLY_BLOCK_KEY.to_owned(), self.friendly_block_score.to_string());
        props.insert(OPPONENT_BLOCK_KEY.to_owned(), self.opponent_block_score.to_string());
    }

    fn load_gene_properties(&mut self, props: &PropertyMap) -> Result<(), GenomeError> {
        self.friendly_block_score = parse_number(self.name(), FRIENDLY_BLOCK_KEY, props)?;
        self.opponent_block_score = parse_number(self.name(), OPPONENT_BLOCK_KEY, props)?;
        Ok(())
    }

    fn gene_property_count(&self) -> usize {
        2
    }

    fn mutate_gene(&mut self, rng: &mut dyn RngCore) {
        let bump = laplace(rng, 0.2);
        if coin_flip(rng) {
            self.friendly_block_score += bump;
        } else {
            self.opponent_block_score += bump;
        }
    }

    fn boxed_clone(&self) -> Box<dyn Gene> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Counts the open lines running into the king: every empty square along
/// the sixteen attack directions is a square an attack could arrive
/// through. Fewer open squares means better shelter.
#[derive(Debug, Clone, Default)]
pub struct KingProtectionGene {
    profile: GeneProfile,
}

impl Gene for KingProtectionGene {
    fn name(&self) -> &'static str {
        "King Protection Gene"
    }

    fn profile(&self) -> Option<&GeneProfile> {
        Some(&self.profile)
    }

    fn profile_mut(&mut self) -> Option<&mut GeneProfile> {
        Some(&mut self.profile)
    }

    fn score_board(&self, board: &Board, perspective: Color, _: u32, _: &PieceValues) -> f64 {
        // 8 knight squares, two rook lines of 7, and two bishop lines of
        // 7 and 6: the most open squares any king placement can have.
        const MAX_OPEN_SQUARES: f64 = 35.0;

        let king = board.king_square(perspective);
        let mut open = 0u32;

        for direction in Direction::all() {
            let mut square = king;
            while let Some(next) = square.offset_by(direction.file_delta(), direction.rank_delta())
            {
                if board.piece_on(next).is_some() {
                    break;
                }
                open += 1;
                if direction.is_knight() {
                    break;
                }
                square = next;
            }
        }

        (MAX_OPEN_SQUARES - open as f64) / MAX_OPEN_SQUARES
    }

    fn boxed_clone(&self) -> Box<dyn Gene> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

const KINGSIDE_PREFERENCE_KEY: &str = "Kingside Preference";
const QUEENSIDE_PREFERENCE_KEY: &str = "Queenside Preference";

/// Values progress toward castling: keeping the king and rooks unmoved,
/// clearing the squares between them, and keeping the king's path safe.
/// Once the player castles inside the searched line the score collapses
/// to the sign of that side's preference; a castle that already happened
/// in the real game (or became impossible) is worth nothing.
#[derive(Debug, Clone)]
pub struct CastlingPossibleGene {
    profile: GeneProfile,
    kingside_preference: f64,
    queenside_preference: f64,
}

impl Default for CastlingPossibleGene {
    fn default() -> Self {
        Self {
            profile: GeneProfile::default(),
            kingside_preference: 1.0,
            queenside_preference: 0.5,
        }
    }
}

impl CastlingPossibleGene {
    fn preference(&self, side: CastleSide) -> f64 {
        match side {
            CastleSide::Kingside => self.kingside_preference,
            CastleSide::Queenside => self.queenside_preference,
        }
    }
}

impl Gene for CastlingPossibleGene {
    fn name(&self) -> &'static str {
        "Castling Possible Gene"
    }

    fn profile(&self) -> Option<&GeneProfile> {
        Some(&self.profile)
    }

    fn profile_mut(&mut self) -> Option<&mut GeneProfile> {
        Some(&mut self.profile)
    }

    fn score_board(&self, board: &Board, perspective: Color, depth: u32, _: &PieceValues) -> f64 {
        let normalizer = self.kingside_preference.abs() + self.queenside_preference.abs();
        if normalizer == 0.0 {
            return 0.0;
        }

        if let Some((castled_ply, side)) = board.castled_on_ply(perspective) {
            let root_ply = board.ply_count().saturating_sub(depth);
            return if castled_ply >= root_ply {
                // Castled within the searched line: full credit, by sign
                // only, so the reward does not dwarf the partial scores.
                self.preference(side).signum()
            } else {
                // Castled in the actual game; nothing left to reward.
                0.0
            };
        }

        let rank = perspective.home_rank();
        let king_file = 4u8;
        if board.king_square(perspective) != Square::new_unchecked(rank, king_file) {
            return 0.0;
        }

        let mut score = 0.0;
        for side in CastleSide::BOTH {
            if !board.castling().allows(perspective, side) {
                continue;
            }

            let rook_file = side.rook_from_file();
            let files_between = king_file.abs_diff(rook_file) - 1;
            // Shares: rook unmoved, each cleared square, each safe square
            // on the king's path, and one held back for actually castling.
            let share = self.preference(side) / (files_between + 4) as f64;

            score += share;
            let (low, high) = if rook_file < king_file {
                (rook_file + 1, king_file)
            } else {
                (king_file + 1, rook_file)
            };
            for file in low..high {
                let square = Square::new_unchecked(rank, file);
                if board.piece_on(square).is_none() {
                    score += share;
                    if file.abs_diff(king_file) <= 2 && board.safe_for_king(square, perspective) {
                        score += share;
                    }
                }
            }
        }

        score / normalizer
    }

    fn write_gene_properties(&self, props: &mut PropertyMap) {
        props.insert(
            KINGSIDE_PREFERENCE_KEY.to_owned(),
            self.kingside_preference.to_string(),
        );
        props.insert(
            QUEENSIDE_PREFERENCE_KEY.to_owned(),
            self.queenside_preference.to_string(),
        );
    }

    fn load_gene_properties(&mut self, props: &PropertyMap) -> Result<(), GenomeError> {
        self.kingside_preference = parse_number(self.name(), KINGSIDE_PREFERENCE_KEY, props)?;
        self.queenside_preference = parse_number(self.name(), QUEENSIDE_PREFERENCE_KEY, props)?;
        Ok(())
    }

    fn gene_property_count(&self) -> usize {
        2
    }

    fn mutate_gene(&mut self, rng: &mut dyn RngCore) {
        let bump = laplace(rng, 0.1);
        if coin_flip(rng) {
            self.kingside_preference += bump;
        } else {
            self.queenside_preference += bump;
        }
    }

    fn boxed_clone(&self) -> Box<dyn Gene> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
