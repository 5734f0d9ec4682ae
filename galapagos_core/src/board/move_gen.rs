//! Legal move generation.
//!
//! Candidate moves come straight from the precomputed move table; a
//! candidate survives if its destination works (empty, or an enemy piece it
//! may capture), its tag-specific rule holds, and it leaves the mover's own
//! king out of check. The king-safety test never regenerates anything: king
//! moves consult the opponent's attack map, other moves use pin-line and
//! check-resolution geometry, and only en passant (which can empty two
//! squares on one rank) falls back to a from-scratch scan of the king's
//! surroundings.

use arrayvec::ArrayVec;

use super::{
    attacks::pawn_attack_directions, move_repr::rays_from, Board, CastleSide, Color, Direction,
    Move, MoveKind, MoveRef, MoveVec, Piece, PieceType, Square,
};

type Checkers = ArrayVec<(Square, Direction), 16>;

pub(crate) fn legal_moves(board: &Board) -> MoveVec {
    let us = board.to_move();
    let them = us.opposite();
    let king = board.king_square(us);
    let checkers = board.checkers(us);

    let mut out = MoveVec::new();

    for from in Square::all() {
        let Some(piece) = board.piece_on(from) else {
            continue;
        };
        if piece.color() != us {
            continue;
        }

        for ray in rays_from(piece, from) {
            let mut blocked_at: Option<Square> = None;
            for m in ray {
                if let Some(blocker) = blocked_at {
                    if m.to_square() != blocker {
                        break;
                    }
                }

                let candidate = match board.piece_on(m.to_square()) {
                    Some(occupant) => {
                        blocked_at = Some(m.to_square());
                        occupant.color() == them && m.can_capture()
                    }
                    None => m.can_land_on_empty(),
                };

                if candidate
                    && m.obeys_rules(board)
                    && keeps_king_safe(board, m, king, &checkers)
                {
                    out.push(m);
                }
            }
        }
    }

    out
}

impl Move {
    /// The tag-specific legality rule, beyond plain destination occupancy.
    pub(crate) fn obeys_rules(&self, board: &Board) -> bool {
        match self.kind() {
            MoveKind::EnPassant => board.raw_en_passant() == Some(self.to_square()),
            MoveKind::Castle(side) => castle_allowed(board, self.piece().color(), side),
            _ => true,
        }
    }
}

fn castle_allowed(board: &Board, color: Color, side: CastleSide) -> bool {
    if !board.castling().allows(color, side) {
        return false;
    }
    if board.piece_on(side.rook_from(color)) != Some(Piece::rook(color)) {
        return false;
    }

    let rank = color.home_rank();
    let king_file = 4;
    let rook_file = side.rook_from_file();

    // Every square between king and rook must be empty.
    let (low, high) = if rook_file < king_file {
        (rook_file + 1, king_file)
    } else {
        (king_file + 1, rook_file)
    };
    for file in low..high {
        if board.piece_on(Square::new_unchecked(rank, file)).is_some() {
            return false;
        }
    }

    // The king may not castle out of, through, or into check.
    if board.in_check(color) {
        return false;
    }
    let them = color.opposite();
    for file in [side.rook_to_file(), side.king_to_file()] {
        if board.is_attacked(Square::new_unchecked(rank, file), them) {
            return false;
        }
    }

    true
}

fn keeps_king_safe(board: &Board, m: MoveRef, king: Square, checkers: &Checkers) -> bool {
    let us = m.piece().color();
    let them = us.opposite();

    if m.is_en_passant() {
        return king_safe_after_en_passant(board, m);
    }

    if m.piece().is_king() {
        // Castle path safety was already checked by the castle rule.
        if m.is_castle() {
            return true;
        }
        if board.is_attacked(m.to_square(), them) {
            return false;
        }
        // Fleeing straight away from a sliding checker stays on its ray,
        // even though the attack map (blocked by the king itself) says the
        // square is quiet.
        for &(checker_square, toward) in checkers {
            let is_slider = board
                .piece_on(checker_square)
                .is_some_and(|piece| piece.is_slider());
            if is_slider {
                let away = toward.opposite();
                if king.offset_by(away.file_delta(), away.rank_delta()) == Some(m.to_square()) {
                    return false;
                }
            }
        }
        return true;
    }

    match checkers.len() {
        0 => stays_on_pin_line(board, m, king),
        1 => stays_on_pin_line(board, m, king) && resolves_check(board, m, king, checkers[0]),
        // Double check: only the king may move.
        _ => false,
    }
}

/// If the moving piece is pinned, its destination must stay on the line
/// between king and pinner.
fn stays_on_pin_line(board: &Board, m: MoveRef, king: Square) -> bool {
    match pin_line(board, m.piece().color(), m.from_square(), king) {
        None => true,
        Some((direction, pinner)) => {
            Direction::between(king, m.to_square()) == Some(direction)
                && line_distance(king, m.to_square()) <= line_distance(king, pinner)
        }
    }
}

/// The direction and pinner square if the piece on `from` is absolutely
/// pinned against its king.
fn pin_line(board: &Board, us: Color, from: Square, king: Square) -> Option<(Direction, Square)> {
    let direction = Direction::between(king, from)?;

    // The stretch between king and piece must be clear.
    let mut square = king;
    loop {
        let next = square.offset_by(direction.file_delta(), direction.rank_delta())?;
        if next == from {
            break;
        }
        if board.piece_on(next).is_some() {
            return None;
        }
        square = next;
    }

    // The first piece beyond must be an enemy slider moving on this line.
    let them = us.opposite();
    let mut square = from;
    while let Some(next) = square.offset_by(direction.file_delta(), direction.rank_delta()) {
        if let Some(piece) = board.piece_on(next) {
            let pins = piece.color() == them
                && match direction.is_diagonal() {
                    true => matches!(piece.piece_type(), PieceType::Bishop | PieceType::Queen),
                    false => matches!(piece.piece_type(), PieceType::Rook | PieceType::Queen),
                };
            return pins.then_some((direction, next));
        }
        square = next;
    }

    None
}

/// Against a single check, a non-king move must capture the checker or
/// interpose on a sliding checker's ray.
fn resolves_check(
    board: &Board,
    m: MoveRef,
    king: Square,
    (checker_square, toward): (Square, Direction),
) -> bool {
    if m.to_square() == checker_square {
        return true;
    }

    let checker_is_slider = board
        .piece_on(checker_square)
        .is_some_and(|piece| piece.is_slider());
    checker_is_slider
        && Direction::between(king, m.to_square()) == Some(toward)
        && line_distance(king, m.to_square()) < line_distance(king, checker_square)
}

/// Full king-safety scan for en passant, which clears both the capturing
/// and the captured pawn's squares and so can open a rank or diagonal the
/// pin test cannot see.
fn king_safe_after_en_passant(board: &Board, m: MoveRef) -> bool {
    let us = m.piece().color();
    let them = us.opposite();
    let king = board.king_square(us);
    let victim = m
        .en_passant_victim_square()
        .expect("en passant has a victim square");

    let occupancy = |square: Square| -> Option<Piece> {
        if square == m.from_square() || square == victim {
            None
        } else if square == m.to_square() {
            Some(m.piece())
        } else {
            board.piece_on(square)
        }
    };

    for direction in Direction::all() {
        if direction.is_knight() {
            let attacker = king.offset_by(direction.file_delta(), direction.rank_delta());
            if attacker.and_then(occupancy) == Some(Piece::knight(them)) {
                return false;
            }
            continue;
        }

        let mut square = king;
        let mut distance = 0u32;
        while let Some(next) = square.offset_by(direction.file_delta(), direction.rank_delta()) {
            distance += 1;
            if let Some(piece) = occupancy(next) {
                if piece.color() == them && attacks_back(piece, direction, distance) {
                    return false;
                }
                break;
            }
            square = next;
        }
    }

    true
}

/// Whether a piece sitting `distance` steps along `direction` from the king
/// attacks the king back along that line.
fn attacks_back(piece: Piece, direction: Direction, distance: u32) -> bool {
    match piece.piece_type() {
        PieceType::Queen => true,
        PieceType::Rook => direction.is_orthogonal(),
        PieceType::Bishop => direction.is_diagonal(),
        PieceType::King => distance == 1,
        PieceType::Pawn => {
            distance == 1
                && pawn_attack_directions(piece.color()).contains(&direction.opposite())
        }
        PieceType::Knight => false,
    }
}

fn line_distance(a: Square, b: Square) -> u8 {
    a.rank().abs_diff(b.rank()).max(a.file().abs_diff(b.file()))
}

#[cfg(test)]
mod test {
    use crate::board::Board;
    use pretty_assertions::assert_eq;

    fn count_moves(fen: &str) -> usize {
        Board::from_fen(fen).unwrap().legal_moves().len()
    }

    #[test]
    fn starting_position_has_twenty_moves() {
        assert_eq!(Board::starting_position().legal_moves().len(), 20);
    }

    #[test]
    fn pinned_pieces_stay_on_the_pin_line() {
        // The e4 rook is pinned by the e8 rook and may only slide on the
        // e-file.
        let board = Board::from_fen("4r2k/8/8/8/4R3/8/8/4K3 w - - 0 1").unwrap();
        let rook_moves: Vec<_> = board
            .legal_moves()
            .into_iter()
            .filter(|m| m.piece().is_slider())
            .collect();
        assert!(rook_moves.iter().all(|m| m.to_square().file() == 4));
        assert_eq!(rook_moves.len(), 6);
    }

    #[test]
    fn check_must_be_addressed() {
        // White king on e1 checked by the e8 rook; knight can block on e5's
        // file line or the rook can be captured... here only blocks/king
        // moves exist.
        let board = Board::from_fen("4r2k/8/8/8/8/8/3N4/4K3 w - - 0 1").unwrap();
        for m in board.legal_moves() {
            let blocks = m.to_square().file() == 4 && m.to_square().rank() < 7;
            let king_moves = m.piece().is_king() && m.to_square().file() != 4;
            assert!(blocks || king_moves, "{m:?} neither blocks nor escapes");
        }
    }

    #[test]
    fn double_check_allows_only_king_moves() {
        // Rook on e8 and bishop on h4 both check the e1 king.
        let board = Board::from_fen("4r2k/8/8/8/7b/8/3Q4/4K3 w - - 0 1").unwrap();
        assert!(board.in_check(crate::board::Color::White));
        let moves = board.legal_moves();
        assert!(!moves.is_empty());
        assert!(moves.iter().all(|m| m.piece().is_king()));
    }

    #[test]
    fn king_cannot_flee_along_the_checking_ray() {
        // Rook checks along the rank; the king cannot step to the shadowed
        // square directly behind itself.
        let board = Board::from_fen("7k/8/8/8/r3K3/8/8/8 w - - 0 1").unwrap();
        let king_targets: Vec<_> = board
            .legal_moves()
            .into_iter()
            .map(|m| m.to_square())
            .collect();
        assert!(!king_targets.contains(&crate::board::Square::F4));
    }

    #[test]
    fn en_passant_is_refused_when_it_exposes_the_king() {
        // Capturing e5xd6 en passant would clear the 5th rank and expose
        // the e5-adjacent white king to the h5 rook.
        let mut board =
            Board::from_fen("7k/3p4/8/K3P2r/8/8/8/8 b - - 0 1").unwrap();
        let m = board.parse_coordinate_move("d7d5").unwrap();
        board.play_move(m);

        assert!(board
            .legal_moves()
            .iter()
            .all(|m| !m.is_en_passant()));
    }

    #[test]
    fn en_passant_may_capture_a_checking_pawn() {
        // Black's d7-d5 would not check; use a position where the pushed
        // pawn checks the white king so the en-passant reply must be legal.
        let mut board = Board::from_fen("7k/3p4/8/4P3/2K5/8/8/8 b - - 0 1").unwrap();
        let m = board.parse_coordinate_move("d7d5").unwrap();
        board.play_move(m);
        assert!(board.in_check(crate::board::Color::White));

        let replies = board.legal_moves();
        assert!(replies.iter().any(|m| m.is_en_passant()));
    }

    #[test]
    fn castling_through_attacked_squares_is_refused() {
        // A black rook on f8 covers f1, barring kingside castling; the
        // queenside path is clear.
        assert_eq!(
            Board::from_fen("5r1k/8/8/8/8/8/8/R3K2R w KQ - 0 1")
                .unwrap()
                .legal_moves()
                .iter()
                .filter(|m| m.is_castle())
                .count(),
            1
        );

        // In check: no castling at all.
        assert_eq!(
            Board::from_fen("4r2k/8/8/8/8/8/8/R3K2R w KQ - 0 1")
                .unwrap()
                .legal_moves()
                .iter()
                .filter(|m| m.is_castle())
                .count(),
            0
        );
    }

    #[test]
    fn blocked_castle_paths_are_refused() {
        assert_eq!(
            Board::from_fen("7k/8/8/8/8/8/8/RN2K1NR w KQ - 0 1")
                .unwrap()
                .legal_moves()
                .iter()
                .filter(|m| m.is_castle())
                .count(),
            0
        );
    }

    #[test]
    fn promotion_generates_all_four_choices() {
        let moves = Board::from_fen("7k/P7/8/8/8/8/8/7K w - - 0 1")
            .unwrap()
            .legal_moves();
        let promotions = moves.iter().filter(|m| m.promotion().is_some()).count();
        assert_eq!(promotions, 4);
    }

    #[test]
    fn stalemate_position_has_no_moves() {
        let board = Board::from_fen("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1").unwrap();
        assert_eq!(board.legal_moves().len(), 0);
        assert!(!board.in_check(crate::board::Color::Black));
    }

    #[test]
    fn a_few_known_positions() {
        // Kiwipete has 48 moves at depth 1.
        assert_eq!(
            count_moves("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1"),
            48
        );
        // CPW position 3.
        assert_eq!(count_moves("8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1"), 14);
    }
}
