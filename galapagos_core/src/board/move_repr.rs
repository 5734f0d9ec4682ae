use std::{
    fmt::{Debug, Display, Write},
    sync::OnceLock,
};

use arrayvec::ArrayVec;

use super::{Color, Direction, Piece, PieceType, Square};

/// Which side of the board a castle heads toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CastleSide {
    Kingside,
    Queenside,
}

impl CastleSide {
    pub const BOTH: [CastleSide; 2] = [CastleSide::Kingside, CastleSide::Queenside];

    /// The file the king lands on.
    pub const fn king_to_file(self) -> u8 {
        match self {
            CastleSide::Kingside => 6,
            CastleSide::Queenside => 2,
        }
    }

    /// The file the castling rook starts on.
    pub const fn rook_from_file(self) -> u8 {
        match self {
            CastleSide::Kingside => 7,
            CastleSide::Queenside => 0,
        }
    }

    /// The file the castling rook lands on.
    pub const fn rook_to_file(self) -> u8 {
        match self {
            CastleSide::Kingside => 5,
            CastleSide::Queenside => 3,
        }
    }

    pub const fn rook_from(self, color: Color) -> Square {
        Square::new_unchecked(color.home_rank(), self.rook_from_file())
    }

    pub const fn rook_to(self, color: Color) -> Square {
        Square::new_unchecked(color.home_rank(), self.rook_to_file())
    }
}

/// The closed set of move behaviors.
///
/// The tag determines the move's capture ability, its extra legality rules,
/// and the side effects [`Board::play_move`](super::Board::play_move)
/// performs beyond relocating the moving piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MoveKind {
    /// A plain piece move; captures whatever it lands on.
    Normal,
    /// A one-square pawn advance.
    PawnPush,
    /// A two-square pawn advance from the pawn's starting rank. Sets the
    /// en-passant target to the square it passes over.
    PawnDoublePush,
    /// A diagonal pawn capture; requires an occupied destination.
    PawnCapture,
    /// A diagonal pawn capture onto the en-passant target square; removes
    /// the pawn behind the destination.
    EnPassant,
    /// A pawn advance onto the last rank, replacing the pawn.
    Promotion(PieceType),
    /// A diagonal pawn capture onto the last rank, replacing the pawn.
    PromotionCapture(PieceType),
    /// A king move of two squares that also relocates the rook.
    Castle(CastleSide),
}

/// A single possible chess move.
///
/// All moves are built once into a process-wide table, one list per
/// (color, piece kind, origin square), and handed out as `&'static Move`
/// handles from then on; they are never mutated. See [`rays_from`].
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Move {
    from: Square,
    to: Square,
    piece: Piece,
    kind: MoveKind,
}

/// A legal-move list. A chess position never has more than 256 legal moves.
pub type MoveVec = ArrayVec<MoveRef, 256>;

/// A handle to a move in the process-wide move table.
pub type MoveRef = &'static Move;

impl Move {
    pub const fn from_square(&self) -> Square {
        self.from
    }

    pub const fn to_square(&self) -> Square {
        self.to
    }

    /// The piece this move belongs to.
    pub const fn piece(&self) -> Piece {
        self.piece
    }

    pub const fn kind(&self) -> MoveKind {
        self.kind
    }

    /// Whether this move may land on an enemy-occupied square.
    pub const fn can_capture(&self) -> bool {
        matches!(
            self.kind,
            MoveKind::Normal
                | MoveKind::PawnCapture
                | MoveKind::EnPassant
                | MoveKind::PromotionCapture(_)
        )
    }

    /// Whether this move may land on an empty square.
    pub const fn can_land_on_empty(&self) -> bool {
        !matches!(self.kind, MoveKind::PawnCapture | MoveKind::PromotionCapture(_))
    }

    pub const fn is_pawn_move(&self) -> bool {
        self.piece.is_pawn()
    }

    pub const fn is_en_passant(&self) -> bool {
        matches!(self.kind, MoveKind::EnPassant)
    }

    pub const fn is_castle(&self) -> bool {
        matches!(self.kind, MoveKind::Castle(_))
    }

    pub const fn castle_side(&self) -> Option<CastleSide> {
        match self.kind {
            MoveKind::Castle(side) => Some(side),
            _ => None,
        }
    }

    pub const fn promotion(&self) -> Option<PieceType> {
        match self.kind {
            MoveKind::Promotion(to) | MoveKind::PromotionCapture(to) => Some(to),
            _ => None,
        }
    }

    /// For en passant, the square of the pawn that gets removed (directly
    /// behind the destination).
    pub fn en_passant_victim_square(&self) -> Option<Square> {
        match self.kind {
            MoveKind::EnPassant => self.to.offset_by(0, -self.piece.color().pawn_direction()),
            _ => None,
        }
    }

    /// The sliding direction of travel, if the origin and destination share
    /// a line.
    pub fn direction(&self) -> Option<Direction> {
        Direction::between(self.from, self.to)
    }

    /// Coordinate notation: origin, destination, and a lowercase promotion
    /// letter if any (`e2e4`, `e7e8q`).
    pub fn coordinates(&self) -> String {
        let mut out = String::with_capacity(5);
        write!(out, "{}{}", self.from, self.to).unwrap();
        if let Some(promotion) = self.promotion() {
            out.push(promotion.as_lowercase_char());
        }
        out
    }
}

impl Display for Move {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.coordinates())
    }
}

impl Debug for Move {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Move({} {} {:?})", self.piece, self.coordinates(), self.kind)
    }
}

/// A run of moves sharing an origin, ordered so that a blocked square ends
/// the run: sliding moves by increasing distance, the pawn push before the
/// double push, promotion choices grouped by destination.
pub type Ray = Vec<Move>;

/// All move rays for a piece standing on a square.
///
/// The table behind this is built on first use and lives for the whole
/// process.
pub fn rays_from(piece: Piece, from: Square) -> &'static [Ray] {
    static TABLE: OnceLock<MoveTable> = OnceLock::new();
    &TABLE.get_or_init(MoveTable::build).rays[piece.table_index()][from.index()]
}

struct MoveTable {
    rays: Vec<[Vec<Ray>; 64]>,
}

impl MoveTable {
    fn build() -> Self {
        let mut rays = Vec::with_capacity(12);
        for color in Color::ALL {
            for piece_type in PieceType::ALL {
                let piece = Piece::new(color, piece_type);
                let mut per_square: [Vec<Ray>; 64] = std::array::from_fn(|_| Vec::new());
                for from in Square::all() {
                    per_square[from.index()] = Self::rays_for(piece, from);
                }
                rays.push(per_square);
            }
        }

        // The loop above pushes white pieces then black pieces in PieceType
        // order, which is exactly Piece::table_index order.
        debug_assert_eq!(rays.len(), 12);

        Self { rays }
    }

    fn rays_for(piece: Piece, from: Square) -> Vec<Ray> {
        match piece.piece_type() {
            PieceType::Pawn => Self::pawn_rays(piece, from),
            PieceType::Knight => Self::jump_rays(piece, from, Direction::knight()),
            PieceType::Bishop => Self::slide_rays(piece, from, Direction::diagonal()),
            PieceType::Rook => Self::slide_rays(piece, from, Direction::orthogonal()),
            PieceType::Queen => Self::slide_rays(piece, from, Direction::sliding()),
            PieceType::King => Self::king_rays(piece, from),
        }
    }

    fn jump_rays(
        piece: Piece,
        from: Square,
        directions: impl Iterator<Item = Direction>,
    ) -> Vec<Ray> {
        directions
            .filter_map(|d| from.offset_by(d.file_delta(), d.rank_delta()))
            .map(|to| {
                vec![Move {
                    from,
                    to,
                    piece,
                    kind: MoveKind::Normal,
                }]
            })
            .collect()
    }

    fn slide_rays(
        piece: Piece,
        from: Square,
        directions: impl Iterator<Item = Direction>,
    ) -> Vec<Ray> {
        directions
            .filter_map(|direction| {
                let mut ray = Vec::new();
                let mut square = from;
                while let Some(to) = square.offset_by(direction.file_delta(), direction.rank_delta())
                {
                    ray.push(Move {
                        from,
                        to,
                        piece,
                        kind: MoveKind::Normal,
                    });
                    square = to;
                }
                (!ray.is_empty()).then_some(ray)
            })
            .collect()
    }

    fn king_rays(piece: Piece, from: Square) -> Vec<Ray> {
        let mut rays = Self::jump_rays(piece, from, Direction::sliding());

        let color = piece.color();
        if from == Square::new_unchecked(color.home_rank(), 4) {
            for side in CastleSide::BOTH {
                let to = Square::new_unchecked(color.home_rank(), side.king_to_file());
                rays.push(vec![Move {
                    from,
                    to,
                    piece,
                    kind: MoveKind::Castle(side),
                }]);
            }
        }

        rays
    }

    fn pawn_rays(piece: Piece, from: Square) -> Vec<Ray> {
        let color = piece.color();
        let forward = color.pawn_direction();
        let promotion_rank = color.opposite().home_rank();
        let start_rank = match color {
            Color::White => 1,
            Color::Black => 6,
        };
        // The rank a pawn captures en passant from.
        let en_passant_rank = match color {
            Color::White => 4,
            Color::Black => 3,
        };

        // Pawns never stand on the first or last rank.
        if from.rank() == color.home_rank() || from.rank() == promotion_rank {
            return Vec::new();
        }

        let mut rays = Vec::new();

        // Forward push, with the double push as the second step of the same
        // ray so a blocked intermediate square also blocks the double push.
        if let Some(to) = from.offset_by(0, forward) {
            let mut ray = Vec::new();
            if to.rank() == promotion_rank {
                for target in PieceType::PROMOTIONS {
                    ray.push(Move {
                        from,
                        to,
                        piece,
                        kind: MoveKind::Promotion(target),
                    });
                }
            } else {
                ray.push(Move {
                    from,
                    to,
                    piece,
                    kind: MoveKind::PawnPush,
                });
                if from.rank() == start_rank {
                    if let Some(double_to) = from.offset_by(0, 2 * forward) {
                        ray.push(Move {
                            from,
                            to: double_to,
                            piece,
                            kind: MoveKind::PawnDoublePush,
                        });
                    }
                }
            }
            rays.push(ray);
        }

        // Diagonal captures, and en passant from the one rank it can occur.
        for file_delta in [-1, 1] {
            if let Some(to) = from.offset_by(file_delta, forward) {
                let mut ray = Vec::new();
                if to.rank() == promotion_rank {
                    for target in PieceType::PROMOTIONS {
                        ray.push(Move {
                            from,
                            to,
                            piece,
                            kind: MoveKind::PromotionCapture(target),
                        });
                    }
                } else {
                    ray.push(Move {
                        from,
                        to,
                        piece,
                        kind: MoveKind::PawnCapture,
                    });
                }
                rays.push(ray);

                if from.rank() == en_passant_rank {
                    rays.push(vec![Move {
                        from,
                        to,
                        piece,
                        kind: MoveKind::EnPassant,
                    }]);
                }
            }
        }

        rays
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn all_moves(piece: Piece, from: Square) -> Vec<&'static Move> {
        rays_from(piece, from).iter().flatten().collect()
    }

    #[test]
    fn knight_move_counts() {
        assert_eq!(all_moves(Piece::WHITE_KNIGHT, Square::A1).len(), 2);
        assert_eq!(all_moves(Piece::WHITE_KNIGHT, Square::B1).len(), 3);
        assert_eq!(all_moves(Piece::BLACK_KNIGHT, Square::D4).len(), 8);
    }

    #[test]
    fn rook_rays_span_rank_and_file() {
        let rays = rays_from(Piece::WHITE_ROOK, Square::D4);
        assert_eq!(rays.len(), 4);
        assert_eq!(rays.iter().map(|r| r.len()).sum::<usize>(), 14);

        for ray in rays {
            let direction = ray[0].direction().unwrap();
            for (i, m) in ray.iter().enumerate() {
                assert_eq!(m.direction(), Some(direction));
                let steps = m.from_square().rank().abs_diff(m.to_square().rank()).max(
                    m.from_square().file().abs_diff(m.to_square().file()),
                );
                assert_eq!(steps as usize, i + 1);
            }
        }
    }

    #[test]
    fn white_pawn_start_square_rays() {
        let rays = rays_from(Piece::WHITE_PAWN, Square::E2);
        // Push ray (with double push) plus two capture rays.
        assert_eq!(rays.len(), 3);

        let push_ray = &rays[0];
        assert_eq!(push_ray.len(), 2);
        assert_eq!(push_ray[0].kind(), MoveKind::PawnPush);
        assert_eq!(push_ray[0].to_square(), Square::E3);
        assert_eq!(push_ray[1].kind(), MoveKind::PawnDoublePush);
        assert_eq!(push_ray[1].to_square(), Square::E4);
    }

    #[test]
    fn pawn_promotion_rays() {
        let moves = all_moves(Piece::WHITE_PAWN, Square::G7);
        let pushes: Vec<_> = moves
            .iter()
            .filter(|m| matches!(m.kind(), MoveKind::Promotion(_)))
            .collect();
        let captures: Vec<_> = moves
            .iter()
            .filter(|m| matches!(m.kind(), MoveKind::PromotionCapture(_)))
            .collect();
        assert_eq!(pushes.len(), 4);
        assert_eq!(captures.len(), 8);
    }

    #[test]
    fn black_pawn_en_passant_rank() {
        let moves = all_moves(Piece::BLACK_PAWN, Square::D4);
        let en_passant: Vec<_> = moves.iter().filter(|m| m.is_en_passant()).collect();
        assert_eq!(en_passant.len(), 2);
        assert_eq!(
            en_passant[0].en_passant_victim_square(),
            Some(Square::new_unchecked(3, en_passant[0].to_square().file()))
        );

        assert!(all_moves(Piece::BLACK_PAWN, Square::D5)
            .iter()
            .all(|m| !m.is_en_passant()));
    }

    #[test]
    fn king_castle_moves_only_from_home_square() {
        let e1_moves = all_moves(Piece::WHITE_KING, Square::E1);
        let castles: Vec<_> = e1_moves.iter().filter(|m| m.is_castle()).collect();
        assert_eq!(castles.len(), 2);
        assert!(castles.iter().any(|m| m.to_square() == Square::G1));
        assert!(castles.iter().any(|m| m.to_square() == Square::C1));

        assert!(all_moves(Piece::WHITE_KING, Square::E2).iter().all(|m| !m.is_castle()));
        assert!(all_moves(Piece::BLACK_KING, Square::E1).iter().all(|m| !m.is_castle()));
    }

    #[test]
    fn coordinate_notation() {
        let moves = all_moves(Piece::WHITE_PAWN, Square::E2);
        assert_eq!(moves[1].coordinates(), "e2e4");

        let promotion = all_moves(Piece::WHITE_PAWN, Square::E7)
            .into_iter()
            .find(|m| m.promotion() == Some(PieceType::Queen) && m.to_square() == Square::E8)
            .unwrap();
        assert_eq!(promotion.coordinates(), "e7e8q");
    }
}
