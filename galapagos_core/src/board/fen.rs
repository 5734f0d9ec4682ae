use thiserror::Error;

use super::{Board, Castling, Color, Piece, Square};

/// Why a FEN record was rejected. Each variant names the field at fault.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FenError {
    #[error("expected 6 space-separated fields, found {0}")]
    FieldCount(usize),
    #[error("bad piece placement: {0}")]
    BadPlacement(String),
    #[error("bad side to move: {0:?}")]
    BadSideToMove(String),
    #[error("bad castling field: {0:?}")]
    BadCastling(String),
    #[error("bad en-passant field: {0:?}")]
    BadEnPassant(String),
    #[error("bad halfmove clock: {0:?}")]
    BadHalfmoveClock(String),
    #[error("bad fullmove number: {0:?}")]
    BadFullmoveNumber(String),
    #[error("position does not have exactly one {0} king")]
    WrongKingCount(Color),
    #[error("the player who just moved is still in check")]
    OpponentInCheck,
}

/// Render the standard six-field FEN record for a board.
///
/// The en-passant field is `-` unless the target square is actually
/// capturable, so two positions that differ only by a phantom target render
/// identically.
pub(super) fn board_to_fen(board: &Board) -> String {
    let mut out = String::new();

    for rank in (0..8).rev() {
        let mut empty_run = 0;
        for file in 0..8 {
            match board.piece_on(Square::new_unchecked(rank, file)) {
                None => empty_run += 1,
                Some(piece) => {
                    if empty_run > 0 {
                        out.push((empty_run + b'0') as char);
                        empty_run = 0;
                    }
                    out.push(piece.as_fen_char());
                }
            }
        }
        if empty_run > 0 {
            out.push((empty_run + b'0') as char);
        }
        if rank > 0 {
            out.push('/');
        }
    }

    out.push(' ');
    out.push(if board.to_move().is_white() { 'w' } else { 'b' });
    out.push(' ');
    out.push_str(&board.castling().as_fen_str());
    out.push(' ');
    match board.en_passant_target() {
        Some(square) => out.push_str(&square.to_string()),
        None => out.push('-'),
    }
    out.push(' ');
    out.push_str(&board.halfmove_clock().to_string());
    out.push(' ');
    out.push_str(&board.fullmove_number().to_string());

    out
}

pub(super) fn parse_fen(fen: &str) -> Result<Board, FenError> {
    let fields: Vec<_> = fen.split_whitespace().collect();
    if fields.len() != 6 {
        return Err(FenError::FieldCount(fields.len()));
    }

    let pieces = parse_placement(fields[0])?;

    let to_move = match fields[1] {
        "w" => Color::White,
        "b" => Color::Black,
        other => return Err(FenError::BadSideToMove(other.to_owned())),
    };

    let castling = parse_castling(fields[2])?;

    let en_passant = match fields[3] {
        "-" => None,
        text => Some(
            text.parse::<Square>()
                .map_err(|_| FenError::BadEnPassant(text.to_owned()))?,
        ),
    };

    let halfmove_clock: u32 = fields[4]
        .parse()
        .map_err(|_| FenError::BadHalfmoveClock(fields[4].to_owned()))?;
    let fullmoves: u32 = fields[5]
        .parse()
        .map_err(|_| FenError::BadFullmoveNumber(fields[5].to_owned()))?;
    if fullmoves == 0 {
        return Err(FenError::BadFullmoveNumber(fields[5].to_owned()));
    }

    Board::new(&pieces, to_move, castling, en_passant, halfmove_clock, fullmoves)
}

fn parse_placement(placement: &str) -> Result<[Option<Piece>; 64], FenError> {
    let bad = || FenError::BadPlacement(placement.to_owned());

    let ranks: Vec<_> = placement.split('/').collect();
    if ranks.len() != 8 {
        return Err(bad());
    }

    let mut pieces = [None; 64];
    for (rank_index, rank_text) in ranks.into_iter().enumerate() {
        let rank = 7 - rank_index as u8;
        let mut file = 0u8;
        let mut last_was_digit = false;
        for c in rank_text.chars() {
            if let Some(digit) = c.to_digit(10) {
                if digit == 0 || digit > 8 || last_was_digit {
                    return Err(bad());
                }
                last_was_digit = true;
                file += digit as u8;
            } else {
                last_was_digit = false;
                let piece = Piece::try_from_fen_char(c).ok_or_else(bad)?;
                if file >= 8 {
                    return Err(bad());
                }
                pieces[Square::new_unchecked(rank, file).index()] = Some(piece);
                file += 1;
            }
            if file > 8 {
                return Err(bad());
            }
        }
        if file != 8 {
            return Err(bad());
        }
    }

    Ok(pieces)
}

fn parse_castling(text: &str) -> Result<Castling, FenError> {
    if text == "-" {
        return Ok(Castling::empty());
    }

    let mut castling = Castling::empty();
    for c in text.chars() {
        let flag = match c {
            'K' => Castling::WHITE_KINGSIDE,
            'Q' => Castling::WHITE_QUEENSIDE,
            'k' => Castling::BLACK_KINGSIDE,
            'q' => Castling::BLACK_QUEENSIDE,
            _ => return Err(FenError::BadCastling(text.to_owned())),
        };
        if castling.contains(flag) {
            return Err(FenError::BadCastling(text.to_owned()));
        }
        castling |= flag;
    }
    Ok(castling)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::board::STARTING_POSITION_FEN;
    use pretty_assertions::assert_eq;

    #[test]
    fn starting_position_round_trips() {
        let board = Board::from_fen(STARTING_POSITION_FEN).unwrap();
        assert_eq!(board.fen(), STARTING_POSITION_FEN);
    }

    #[test]
    fn assorted_positions_round_trip() {
        let fens = [
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
            "4k3/8/8/8/8/8/8/4K3 b - - 12 34",
            "r3k2r/8/8/8/8/8/8/R3K2R w Kq - 3 10",
        ];
        for fen in fens {
            let board = Board::from_fen(fen).unwrap();
            assert_eq!(board.fen(), fen);

            let reparsed = Board::from_fen(&board.fen()).unwrap();
            assert_eq!(reparsed.hash(), board.hash());
            assert_eq!(reparsed.castling(), board.castling());
            assert_eq!(reparsed.en_passant_target(), board.en_passant_target());
        }
    }

    #[test]
    fn phantom_en_passant_target_is_suppressed() {
        // There is no black pawn that could capture on e3.
        let board =
            Board::from_fen("4k3/8/8/8/4P3/8/8/4K3 b - e3 0 1").unwrap();
        assert_eq!(board.en_passant_target(), None);
        assert!(board.fen().contains(" - "));

        // With a capturer present the target survives the round trip.
        let board =
            Board::from_fen("4k3/8/8/8/3pP3/8/8/4K3 b - e3 0 1").unwrap();
        assert_eq!(board.en_passant_target(), Some(Square::E3));
        assert!(board.fen().contains(" e3 "));
    }

    #[test]
    fn malformed_records_name_the_field() {
        assert_eq!(
            Board::from_fen("8/8/8/8/8/8/8 w - - 0 1"),
            Err(FenError::BadPlacement("8/8/8/8/8/8/8".into()))
        );
        assert!(matches!(
            Board::from_fen("4k3/8/8/8/8/8/8/4K3 x - - 0 1"),
            Err(FenError::BadSideToMove(_))
        ));
        assert!(matches!(
            Board::from_fen("4k3/8/8/8/8/8/8/4K3 w KX - 0 1"),
            Err(FenError::BadCastling(_))
        ));
        assert!(matches!(
            Board::from_fen("4k3/8/8/8/8/8/8/4K3 w - e9 0 1"),
            Err(FenError::BadEnPassant(_))
        ));
        assert!(matches!(
            Board::from_fen("4k3/8/8/8/8/8/8/4K3 w - - x 1"),
            Err(FenError::BadHalfmoveClock(_))
        ));
        assert!(matches!(
            Board::from_fen("4k3/8/8/8/8/8/8/4K3 w - - 0 0"),
            Err(FenError::BadFullmoveNumber(_))
        ));
        assert!(matches!(
            Board::from_fen("4k3/8/8/8/8/8/8/4K3"),
            Err(FenError::FieldCount(1))
        ));
    }

    #[test]
    fn overfull_ranks_are_rejected() {
        assert!(matches!(
            Board::from_fen("ppppppppp/8/8/8/8/8/8/4K3 w - - 0 1"),
            Err(FenError::BadPlacement(_))
        ));
        assert!(matches!(
            Board::from_fen("4k3/44/8/8/8/8/8/4K3 w - - 0 1"),
            Err(FenError::BadPlacement(_))
        ));
    }
}
