use std::{
    fmt::Debug,
    ops::{BitXor, BitXorAssign},
    sync::OnceLock,
};

use rand::{RngCore, SeedableRng};

use super::{Castling, Color, Piece, Square};

/// A 64-bit position fingerprint, updated incrementally by XOR.
///
/// The hash covers the piece on every square, the side to move, the castling
/// rights, and the en-passant file when the target is actually capturable.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ZobristHash(pub u64);

impl ZobristHash {
    pub fn piece(piece: Piece, square: Square) -> Self {
        let keys = ZobristKeys::instance();
        Self(keys.pieces[piece.get() as usize * 64 + square.index()])
    }

    pub fn side_to_move(color: Color) -> Self {
        match color {
            Color::White => Self(0),
            Color::Black => Self(ZobristKeys::instance().black_to_move),
        }
    }

    pub fn castling(castling: Castling) -> Self {
        Self(ZobristKeys::instance().castling[castling.bits() as usize])
    }

    pub fn en_passant_file(target: Option<Square>) -> Self {
        match target {
            Some(square) => Self(ZobristKeys::instance().en_passant[square.file() as usize]),
            None => Self(0),
        }
    }

    pub fn toggle_piece(&mut self, piece: Piece, square: Square) {
        *self ^= Self::piece(piece, square);
    }
}

impl BitXor for ZobristHash {
    type Output = Self;

    fn bitxor(self, rhs: Self) -> Self {
        Self(self.0 ^ rhs.0)
    }
}

impl BitXorAssign for ZobristHash {
    fn bitxor_assign(&mut self, rhs: Self) {
        *self = *self ^ rhs;
    }
}

impl Debug for ZobristHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ZobristHash")
            .field(&format_args!("{:#018X}", self.0))
            .finish()
    }
}

/// The process-wide random key tables, generated once from a fixed seed so
/// hashes are reproducible across runs and in tests.
struct ZobristKeys {
    pieces: [u64; 16 * 64], // indexed by the 4-bit piece representation
    black_to_move: u64,
    castling: [u64; 16],
    en_passant: [u64; 8],
}

impl ZobristKeys {
    fn new() -> Self {
        let mut rng = rand_chacha::ChaCha12Rng::from_seed([
            0x6c, 0x1b, 0x8f, 0x02, 0x5d, 0xe4, 0x97, 0x33, 0xc8, 0x0a, 0xd1, 0x4e, 0x26, 0xb5,
            0x79, 0xaa, 0x41, 0x90, 0x3c, 0xe7, 0x12, 0x5f, 0x88, 0x2d, 0xf6, 0x64, 0x0b, 0xc9,
            0x57, 0x3e, 0xa2, 0x18,
        ]);

        let mut pieces = [0; 16 * 64];
        pieces.fill_with(|| rng.next_u64());

        let black_to_move = rng.next_u64();

        let mut castling = [0; 16];
        castling.fill_with(|| rng.next_u64());

        let mut en_passant = [0; 8];
        en_passant.fill_with(|| rng.next_u64());

        Self {
            pieces,
            black_to_move,
            castling,
            en_passant,
        }
    }

    fn instance() -> &'static Self {
        static INSTANCE: OnceLock<ZobristKeys> = OnceLock::new();
        INSTANCE.get_or_init(Self::new)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn piece_keys_are_stable_and_distinct() {
        let a = ZobristHash::piece(Piece::WHITE_KNIGHT, Square::B1);
        let b = ZobristHash::piece(Piece::WHITE_KNIGHT, Square::B1);
        assert_eq!(a, b);

        assert_ne!(a, ZobristHash::piece(Piece::WHITE_KNIGHT, Square::G1));
        assert_ne!(a, ZobristHash::piece(Piece::BLACK_KNIGHT, Square::B1));
    }

    #[test]
    fn xor_is_self_inverse() {
        let mut hash = ZobristHash::default();
        hash.toggle_piece(Piece::WHITE_QUEEN, Square::D1);
        hash ^= ZobristHash::side_to_move(Color::Black);
        hash ^= ZobristHash::side_to_move(Color::Black);
        hash.toggle_piece(Piece::WHITE_QUEEN, Square::D1);
        assert_eq!(hash, ZobristHash::default());
    }

    #[test]
    fn white_to_move_contributes_nothing() {
        assert_eq!(ZobristHash::side_to_move(Color::White), ZobristHash::default());
        assert_ne!(ZobristHash::side_to_move(Color::Black), ZobristHash::default());
    }

    #[test]
    fn en_passant_keys_are_per_file() {
        assert_eq!(
            ZobristHash::en_passant_file(Some(Square::D6)),
            ZobristHash::en_passant_file(Some(Square::D3))
        );
        assert_ne!(
            ZobristHash::en_passant_file(Some(Square::D6)),
            ZobristHash::en_passant_file(Some(Square::E6))
        );
        assert_eq!(ZobristHash::en_passant_file(None), ZobristHash::default());
    }
}
