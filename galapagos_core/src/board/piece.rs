use std::{
    fmt::{Debug, Display, Write},
    num::NonZeroU8,
};

use num_derive::{FromPrimitive, ToPrimitive};

/// The type of a piece, without its color.
///
/// Assigned the integers 1-6 so that a piece fits in 4 bits and 0 stays free
/// for Rust to use as the niche of [`Option<Piece>`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, FromPrimitive, ToPrimitive)]
pub enum PieceType {
    Pawn = 1,
    Knight = 2,
    Bishop = 3,
    Rook = 4,
    Queen = 5,
    King = 6,
}

impl PieceType {
    pub const ALL: [PieceType; 6] = [
        Self::Pawn,
        Self::Knight,
        Self::Bishop,
        Self::Rook,
        Self::Queen,
        Self::King,
    ];

    /// Valid promotion targets, in the order they appear in move tables.
    pub const PROMOTIONS: [PieceType; 4] = [Self::Queen, Self::Rook, Self::Bishop, Self::Knight];

    pub const fn with_color(self, color: Color) -> Piece {
        Piece::new(color, self)
    }

    /// The FEN letter of the white version of this piece.
    pub const fn as_uppercase_char(self) -> char {
        match self {
            PieceType::Pawn => 'P',
            PieceType::Knight => 'N',
            PieceType::Bishop => 'B',
            PieceType::Rook => 'R',
            PieceType::Queen => 'Q',
            PieceType::King => 'K',
        }
    }

    /// The FEN letter of the black version of this piece.
    pub const fn as_lowercase_char(self) -> char {
        self.as_uppercase_char().to_ascii_lowercase()
    }

    /// True for bishops, rooks, and queens.
    pub const fn is_slider(self) -> bool {
        matches!(self, PieceType::Bishop | PieceType::Rook | PieceType::Queen)
    }

    /// 0-5 index for value tables.
    pub const fn index(self) -> usize {
        self as usize - 1
    }

    pub const fn from_uppercase_char(c: char) -> Option<Self> {
        match c {
            'P' => Some(PieceType::Pawn),
            'N' => Some(PieceType::Knight),
            'B' => Some(PieceType::Bishop),
            'R' => Some(PieceType::Rook),
            'Q' => Some(PieceType::Queen),
            'K' => Some(PieceType::King),
            _ => None,
        }
    }
}

/// A player in a chess game.
///
/// White is 0 and black is 8 so a [`Piece`] is the bitwise-or of its color
/// and type.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    #[default]
    White = 0,
    Black = 8,
}

impl Color {
    pub const ALL: [Color; 2] = [Color::White, Color::Black];

    pub const fn is_white(self) -> bool {
        matches!(self, Color::White)
    }

    pub const fn is_black(self) -> bool {
        !self.is_white()
    }

    /// The other player.
    pub const fn opposite(self) -> Self {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    pub const fn index(self) -> usize {
        match self {
            Color::White => 0,
            Color::Black => 1,
        }
    }

    /// The rank direction this color's pawns advance in: +1 or -1.
    pub const fn pawn_direction(self) -> i8 {
        match self {
            Color::White => 1,
            Color::Black => -1,
        }
    }

    /// The 0-7 rank this color's pieces start on.
    pub const fn home_rank(self) -> u8 {
        match self {
            Color::White => 0,
            Color::Black => 7,
        }
    }
}

impl Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Color::White => "White",
            Color::Black => "Black",
        })
    }
}

/// A colored piece, packed into 4 bits (color | type).
///
/// Since a [`PieceType`] is never 0, [`Option<Piece>`] occupies a single
/// byte with 0 as [`None`].
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Piece(NonZeroU8);

impl Piece {
    pub const fn new(color: Color, piece_type: PieceType) -> Self {
        // Safety: piece_type as u8 is never 0
        unsafe { Self(NonZeroU8::new_unchecked(color as u8 | piece_type as u8)) }
    }

    pub const fn pawn(color: Color) -> Self {
        Self::new(color, PieceType::Pawn)
    }

    pub const fn knight(color: Color) -> Self {
        Self::new(color, PieceType::Knight)
    }

    pub const fn bishop(color: Color) -> Self {
        Self::new(color, PieceType::Bishop)
    }

    pub const fn rook(color: Color) -> Self {
        Self::new(color, PieceType::Rook)
    }

    pub const fn queen(color: Color) -> Self {
        Self::new(color, PieceType::Queen)
    }

    pub const fn king(color: Color) -> Self {
        Self::new(color, PieceType::King)
    }

    pub const fn color(self) -> Color {
        if self.0.get() & 8 > 0 {
            Color::Black
        } else {
            Color::White
        }
    }

    pub const fn piece_type(self) -> PieceType {
        match self.0.get() & 0x07 {
            1 => PieceType::Pawn,
            2 => PieceType::Knight,
            3 => PieceType::Bishop,
            4 => PieceType::Rook,
            5 => PieceType::Queen,
            6 => PieceType::King,
            // The representation is always color | type with type 1-6.
            _ => unreachable!(),
        }
    }

    pub const fn is_pawn(self) -> bool {
        matches!(self.piece_type(), PieceType::Pawn)
    }

    pub const fn is_king(self) -> bool {
        matches!(self.piece_type(), PieceType::King)
    }

    pub const fn is_slider(self) -> bool {
        self.piece_type().is_slider()
    }

    /// The 4-bit packed representation, used to index Zobrist keys.
    pub const fn get(self) -> u8 {
        self.0.get()
    }

    /// 0-11 index for per-piece tables (six white pieces then six black).
    pub const fn table_index(self) -> usize {
        self.color().index() * 6 + self.piece_type().index()
    }

    pub const fn as_fen_char(self) -> char {
        match self.color() {
            Color::White => self.piece_type().as_uppercase_char(),
            Color::Black => self.piece_type().as_lowercase_char(),
        }
    }

    pub fn as_unicode_char(self) -> char {
        let base = match self.color() {
            Color::White => 0x2654,
            Color::Black => 0x265a,
        };
        let offset = match self.piece_type() {
            PieceType::Pawn => 5,
            PieceType::Knight => 4,
            PieceType::Bishop => 3,
            PieceType::Rook => 2,
            PieceType::Queen => 1,
            PieceType::King => 0,
        };
        char::from_u32(base + offset).unwrap()
    }

    pub const fn try_from_fen_char(c: char) -> Option<Self> {
        let piece_type = match PieceType::from_uppercase_char(c.to_ascii_uppercase()) {
            Some(t) => t,
            None => return None,
        };
        let color = if c.is_ascii_uppercase() {
            Color::White
        } else {
            Color::Black
        };
        Some(Self::new(color, piece_type))
    }
}

/// Piece constants.
impl Piece {
    pub const WHITE_PAWN: Piece = Piece::new(Color::White, PieceType::Pawn);
    pub const WHITE_KNIGHT: Piece = Piece::new(Color::White, PieceType::Knight);
    pub const WHITE_BISHOP: Piece = Piece::new(Color::White, PieceType::Bishop);
    pub const WHITE_ROOK: Piece = Piece::new(Color::White, PieceType::Rook);
    pub const WHITE_QUEEN: Piece = Piece::new(Color::White, PieceType::Queen);
    pub const WHITE_KING: Piece = Piece::new(Color::White, PieceType::King);
    pub const BLACK_PAWN: Piece = Piece::new(Color::Black, PieceType::Pawn);
    pub const BLACK_KNIGHT: Piece = Piece::new(Color::Black, PieceType::Knight);
    pub const BLACK_BISHOP: Piece = Piece::new(Color::Black, PieceType::Bishop);
    pub const BLACK_ROOK: Piece = Piece::new(Color::Black, PieceType::Rook);
    pub const BLACK_QUEEN: Piece = Piece::new(Color::Black, PieceType::Queen);
    pub const BLACK_KING: Piece = Piece::new(Color::Black, PieceType::King);
}

impl Debug for Piece {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Piece")
            .field("color", &self.color())
            .field("piece_type", &self.piece_type())
            .finish()
    }
}

impl Display for Piece {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_char(self.as_fen_char())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn piece_create_and_unpack() {
        for color in Color::ALL {
            for piece_type in PieceType::ALL {
                let piece = Piece::new(color, piece_type);
                assert_eq!(piece.color(), color);
                assert_eq!(piece.piece_type(), piece_type);
            }
        }
    }

    #[test]
    fn color_opposite() {
        assert_eq!(Color::White.opposite(), Color::Black);
        assert_eq!(Color::Black.opposite(), Color::White);
    }

    #[test]
    fn piece_fen_chars_round_trip() {
        for color in Color::ALL {
            for piece_type in PieceType::ALL {
                let piece = Piece::new(color, piece_type);
                assert_eq!(Piece::try_from_fen_char(piece.as_fen_char()), Some(piece));
            }
        }
        assert_eq!(Piece::try_from_fen_char('x'), None);
        assert_eq!(Piece::try_from_fen_char('1'), None);
    }

    #[test]
    fn piece_table_index_is_dense() {
        let mut seen = [false; 12];
        for color in Color::ALL {
            for piece_type in PieceType::ALL {
                let index = Piece::new(color, piece_type).table_index();
                assert!(!seen[index]);
                seen[index] = true;
            }
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn piece_unicode_art() {
        assert_eq!(Piece::WHITE_KING.as_unicode_char(), '♔');
        assert_eq!(Piece::WHITE_PAWN.as_unicode_char(), '♙');
        assert_eq!(Piece::BLACK_QUEEN.as_unicode_char(), '♛');
        assert_eq!(Piece::BLACK_KNIGHT.as_unicode_char(), '♞');
    }

    #[test]
    fn piece_is_slider() {
        assert!(Piece::WHITE_BISHOP.is_slider());
        assert!(Piece::BLACK_ROOK.is_slider());
        assert!(Piece::WHITE_QUEEN.is_slider());
        assert!(!Piece::BLACK_KNIGHT.is_slider());
        assert!(!Piece::WHITE_PAWN.is_slider());
        assert!(!Piece::BLACK_KING.is_slider());
    }
}
