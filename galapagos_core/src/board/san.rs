use std::fmt::Write;

use thiserror::Error;

use super::{Board, CastleSide, MoveRef, PieceType, Square};

/// Errors from interpreting a move written as text.
///
/// Interpreting never mutates the board; the offending text is carried so
/// callers (the PGN validator, a protocol driver) can show it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SanError {
    #[error("unparseable move text {0:?}")]
    Unparseable(String),
    #[error("illegal move {0:?}")]
    IllegalMove(String),
    #[error("ambiguous move {0:?}")]
    AmbiguousMove(String),
}

/// The pieces of a lexed SAN token, before it is matched against a
/// position. The PGN validator compares these annotations against what the
/// move actually does on the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanParts {
    pub castle: Option<CastleSide>,
    pub piece: PieceType,
    pub from_file: Option<u8>,
    pub from_rank: Option<u8>,
    pub capture: bool,
    pub to: Option<Square>,
    pub promotion: Option<PieceType>,
    pub check: bool,
    pub checkmate: bool,
}

impl SanParts {
    /// Lex a SAN token. No legality checking happens here.
    pub fn parse(text: &str) -> Result<Self, SanError> {
        let unparseable = || SanError::Unparseable(text.to_owned());

        let mut rest = text;
        let mut checkmate = false;
        let mut check = false;
        if let Some(stripped) = rest.strip_suffix('#') {
            checkmate = true;
            rest = stripped;
        } else if let Some(stripped) = rest.strip_suffix('+') {
            check = true;
            rest = stripped;
        }

        if rest == "O-O" || rest == "0-0" {
            return Ok(Self {
                castle: Some(CastleSide::Kingside),
                piece: PieceType::King,
                from_file: None,
                from_rank: None,
                capture: false,
                to: None,
                promotion: None,
                check,
                checkmate,
            });
        }
        if rest == "O-O-O" || rest == "0-0-0" {
            return Ok(Self {
                castle: Some(CastleSide::Queenside),
                piece: PieceType::King,
                from_file: None,
                from_rank: None,
                capture: false,
                to: None,
                promotion: None,
                check,
                checkmate,
            });
        }

        let mut promotion = None;
        if let Some((before, after)) = rest.rsplit_once('=') {
            let c = after.chars().next().ok_or_else(unparseable)?;
            if after.chars().count() != 1 {
                return Err(unparseable());
            }
            let target = PieceType::from_uppercase_char(c).ok_or_else(unparseable)?;
            if matches!(target, PieceType::Pawn | PieceType::King) {
                return Err(unparseable());
            }
            promotion = Some(target);
            rest = before;
        }

        let chars: Vec<char> = rest.chars().collect();
        if chars.len() < 2 {
            return Err(unparseable());
        }

        let to_text: String = chars[chars.len() - 2..].iter().collect();
        let to: Square = to_text.parse().map_err(|_| unparseable())?;
        let mut prefix = &chars[..chars.len() - 2];

        let mut capture = false;
        if let Some((&'x', head)) = prefix.split_last() {
            capture = true;
            prefix = head;
        }

        let mut piece = PieceType::Pawn;
        if let Some((&first, tail)) = prefix.split_first() {
            if first.is_ascii_uppercase() {
                piece = PieceType::from_uppercase_char(first).ok_or_else(unparseable)?;
                prefix = tail;
            }
        }

        let mut from_file = None;
        let mut from_rank = None;
        for &c in prefix {
            match c {
                'a'..='h' if from_file.is_none() && from_rank.is_none() => {
                    from_file = Some(c as u8 - b'a');
                }
                '1'..='8' if from_rank.is_none() => {
                    from_rank = Some(c as u8 - b'1');
                }
                _ => return Err(unparseable()),
            }
        }

        if promotion.is_some() && piece != PieceType::Pawn {
            return Err(unparseable());
        }

        Ok(Self {
            castle: None,
            piece,
            from_file,
            from_rank,
            capture,
            to: Some(to),
            promotion,
            check,
            checkmate,
        })
    }
}

impl Board {
    /// Render a legal move in short algebraic notation, including `x`,
    /// `=P`, and the trailing `+`/`#`.
    ///
    /// Disambiguation: the origin file appears when another piece of the
    /// same kind could reach the destination from a different file; the
    /// origin rank appears when a same-file sibling leaves the move
    /// ambiguous even then.
    pub fn san(&self, m: MoveRef) -> String {
        let mut out = String::new();

        if let Some(side) = m.castle_side() {
            out.push_str(match side {
                CastleSide::Kingside => "O-O",
                CastleSide::Queenside => "O-O-O",
            });
        } else {
            let piece_type = m.piece().piece_type();
            let is_capture =
                self.piece_on(m.to_square()).is_some() || m.is_en_passant();

            if piece_type == PieceType::Pawn {
                if is_capture {
                    out.push(m.from_square().file_char());
                }
            } else {
                out.push(piece_type.as_uppercase_char());

                let legal = self.legal_moves();
                let others: Vec<_> = legal
                    .iter()
                    .filter(|other| {
                        other.piece() == m.piece()
                            && other.to_square() == m.to_square()
                            && other.from_square() != m.from_square()
                    })
                    .collect();
                let file_needed = others
                    .iter()
                    .any(|other| other.from_square().file() != m.from_square().file());
                let rank_needed = others
                    .iter()
                    .any(|other| other.from_square().file() == m.from_square().file());

                if file_needed {
                    out.push(m.from_square().file_char());
                }
                if rank_needed {
                    out.push(m.from_square().rank_char());
                }
            }

            if is_capture {
                out.push('x');
            }
            write!(out, "{}", m.to_square()).unwrap();

            if let Some(promotion) = m.promotion() {
                out.push('=');
                out.push(promotion.as_uppercase_char());
            }
        }

        // Play the move on a scratch copy to see whether it checks or
        // mates.
        let mut scratch = self.clone();
        let result = scratch.play_move(m);
        if result.winner().is_some() {
            out.push('#');
        } else if scratch.in_check(scratch.to_move()) {
            out.push('+');
        }

        out
    }

    /// Interpret a SAN token against the current position's legal moves.
    pub fn parse_san(&self, text: &str) -> Result<MoveRef, SanError> {
        let parts = SanParts::parse(text.trim())?;
        self.match_san_parts(&parts, text)
    }

    /// Find the unique legal move matching already-lexed SAN parts.
    pub fn match_san_parts(&self, parts: &SanParts, text: &str) -> Result<MoveRef, SanError> {
        let legal = self.legal_moves();

        let mut matches = legal.iter().copied().filter(|m| {
            if let Some(side) = parts.castle {
                return m.castle_side() == Some(side);
            }
            m.piece().piece_type() == parts.piece
                && Some(m.to_square()) == parts.to
                && m.promotion() == parts.promotion
                && parts
                    .from_file
                    .map_or(true, |file| m.from_square().file() == file)
                && parts
                    .from_rank
                    .map_or(true, |rank| m.from_square().rank() == rank)
        });

        match (matches.next(), matches.next()) {
            (Some(m), None) => Ok(m),
            (Some(_), Some(_)) => Err(SanError::AmbiguousMove(text.to_owned())),
            (None, _) => Err(SanError::IllegalMove(text.to_owned())),
        }
    }
}
