use std::{
    fmt::{Debug, Display, Write},
    str::FromStr,
};

use paste::paste;
use seq_macro::seq;
use thiserror::Error;

/// A square on the chessboard.
///
/// Stored as an integer from 0-63, ordered by increasing file then rank:
/// 0 is a1, 1 is b1, ... 7 is h1, 8 is a2, and 63 is h8.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Square(u8);

impl Square {
    /// Construct a [`Square`] from a rank and file, both numbered 0-7 (rank 0
    /// is rank 1, file 0 is file a). Returns [`None`] if either is out of
    /// range.
    pub const fn new(rank: u8, file: u8) -> Option<Self> {
        if rank >= 8 || file >= 8 {
            None
        } else {
            Some(Self(8 * rank + file))
        }
    }

    /// Construct a [`Square`] from a rank and file assumed to be in `0..=7`.
    ///
    /// The result is truncated into 0-63, so an invalid input still produces
    /// a valid (if unexpected) square rather than undefined behavior.
    pub const fn new_unchecked(rank: u8, file: u8) -> Self {
        Self((rank.wrapping_mul(8).wrapping_add(file)) % 64)
    }

    /// Construct a [`Square`] from its 0-63 index.
    pub const fn from_index(index: usize) -> Option<Self> {
        if index < 64 {
            Some(Self(index as u8))
        } else {
            None
        }
    }

    /// The 0-63 index of this square.
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// The rank of this square, 0-7 (0 is rank 1).
    pub const fn rank(self) -> u8 {
        self.0 / 8
    }

    /// The file of this square, 0-7 (0 is file a).
    pub const fn file(self) -> u8 {
        self.0 % 8
    }

    /// The file as its algebraic letter, `'a'..='h'`.
    pub const fn file_char(self) -> char {
        (self.file() + b'a') as char
    }

    /// The rank as its algebraic digit, `'1'..='8'`.
    pub const fn rank_char(self) -> char {
        (self.rank() + b'1') as char
    }

    /// Iterate over all 64 squares in index order.
    pub fn all() -> impl Iterator<Item = Square> {
        (0..64).map(Square)
    }

    /// Step by a (file, rank) delta, returning [`None`] if the step leaves
    /// the board. This is the primitive that ray walks are built on; unlike
    /// raw index arithmetic it cannot wrap around a board edge.
    pub const fn offset_by(self, file_delta: i8, rank_delta: i8) -> Option<Self> {
        let file = self.file() as i8 + file_delta;
        let rank = self.rank() as i8 + rank_delta;
        if file < 0 || file >= 8 || rank < 0 || rank >= 8 {
            None
        } else {
            Some(Self::new_unchecked(rank as u8, file as u8))
        }
    }
}

impl Display for Square {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_char(self.file_char())?;
        f.write_char(self.rank_char())
    }
}

impl Debug for Square {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.file_char().to_ascii_uppercase(), self.rank_char())
    }
}

#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
#[error("invalid square")]
pub struct ParseSquareError;

impl FromStr for Square {
    type Err = ParseSquareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let file = chars.next().ok_or(ParseSquareError)?;
        let rank = chars.next().ok_or(ParseSquareError)?;
        if chars.next().is_some() {
            return Err(ParseSquareError);
        }

        let file = (file as i32) - ('a' as i32);
        let rank = (rank as i32) - ('1' as i32);
        if (0..8).contains(&rank) && (0..8).contains(&file) {
            Ok(Square::new_unchecked(rank as u8, file as u8))
        } else {
            Err(ParseSquareError)
        }
    }
}

/// Board square aliases
#[allow(clippy::eq_op, clippy::char_lit_as_u8)]
impl Square {
    seq!(RANK in 1..=8 {
        seq!(FILE in 'A'..='H' {
            paste! {
                pub const [<FILE RANK>]: Square = Square::new_unchecked(RANK - 1, FILE as u8 - b'A');
            }
        });
    });
}
