//! Property checks on random and adversarial positions: the incremental
//! structures (attack maps, hash) always agree with from-scratch
//! derivation, FEN and SAN round-trip, and the legal move generator
//! matches a brute-force oracle.

use galapagos_core::board::{
    rays_from, Board, CastleSide, Color, MoveKind, MoveRef, Piece, Square,
    STARTING_POSITION_FEN,
};
use rand::{RngCore, SeedableRng};

const INTERESTING_STARTS: &[&str] = &[
    STARTING_POSITION_FEN,
    "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
    "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
    "r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1",
    "7k/P6P/8/8/8/8/p6p/7K w - - 0 1",
    "4k3/8/8/3pP3/8/8/8/4K3 w - d6 0 1",
];

fn playout_rng() -> rand_chacha::ChaCha12Rng {
    rand_chacha::ChaCha12Rng::seed_from_u64(0x9a1a90)
}

/// The §8 oracle: every table move that satisfies its occupancy rule and
/// tag-specific predicate, and whose application leaves the mover's king
/// out of check.
fn brute_force_legal_moves(board: &Board) -> Vec<String> {
    let us = board.to_move();
    let mut legal = Vec::new();

    for from in Square::all() {
        let Some(piece) = board.piece_on(from) else {
            continue;
        };
        if piece.color() != us {
            continue;
        }

        for ray in rays_from(piece, from) {
            for m in ray {
                if !candidate_passes_static_rules(board, m, us) {
                    continue;
                }

                // Apply and test: the one rule shared by every move kind.
                let mut probe = board.clone();
                probe.push_move(m);
                if !probe.in_check(us) {
                    legal.push(m.coordinates());
                }
            }
        }
    }

    legal.sort();
    legal
}

fn candidate_passes_static_rules(board: &Board, m: MoveRef, us: Color) -> bool {
    let them = us.opposite();

    // Destination occupancy.
    match board.piece_on(m.to_square()) {
        Some(occupant) => {
            if occupant.color() == us || !m.can_capture() {
                return false;
            }
        }
        None => {
            if !m.can_land_on_empty() {
                return false;
            }
        }
    }

    // Sliding path emptiness, recomputed naively square by square.
    if let Some(direction) = m.direction() {
        let mut square = m.from_square();
        loop {
            let next = square
                .offset_by(direction.file_delta(), direction.rank_delta())
                .expect("the path to a reachable square stays on the board");
            if next == m.to_square() {
                break;
            }
            if board.piece_on(next).is_some() {
                return false;
            }
            square = next;
        }
    }

    // Tag-specific rules.
    match m.kind() {
        MoveKind::EnPassant => board.en_passant_target() == Some(m.to_square()),
        MoveKind::Castle(side) => castle_statically_allowed(board, us, them, side),
        _ => true,
    }
}

fn castle_statically_allowed(board: &Board, us: Color, them: Color, side: CastleSide) -> bool {
    if !board.castling().allows(us, side) {
        return false;
    }
    if board.piece_on(side.rook_from(us)) != Some(Piece::rook(us)) {
        return false;
    }
    if board.in_check(us) {
        return false;
    }

    let rank = us.home_rank();
    let king_file = 4u8;
    let rook_file = side.rook_from_file();
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
    for file in [side.rook_to_file(), side.king_to_file()] {
        if board.is_attacked(Square::new_unchecked(rank, file), them) {
            return false;
        }
    }
    true
}

fn check_position_invariants(board: &Board, context: &str) {
    // Denormalized king squares match the squares array.
    for color in Color::ALL {
        assert_eq!(
            board.piece_on(board.king_square(color)),
            Some(Piece::king(color)),
            "{context}: king square desynchronized for {color}"
        );
    }

    // The side that just moved is not in check.
    assert!(
        !board.in_check(board.to_move().opposite()),
        "{context}: mover left its king in check"
    );

    // Incremental attack maps equal freshly derived ones.
    assert!(
        board.attack_maps_are_consistent(),
        "{context}: attack maps diverged"
    );

    // Incremental hash equals the from-scratch hash.
    assert_eq!(
        board.recomputed_hash(),
        board.hash(),
        "{context}: hash diverged"
    );

    // FEN round-trips to an identical position.
    let fen = board.fen();
    let reparsed = Board::from_fen(&fen).unwrap_or_else(|e| {
        panic!("{context}: emitted unparseable FEN {fen:?}: {e}");
    });
    assert_eq!(reparsed.fen(), fen, "{context}: FEN did not round-trip");
    assert_eq!(reparsed.hash(), board.hash(), "{context}: FEN changed the hash");
    assert_eq!(
        reparsed.castling(),
        board.castling(),
        "{context}: FEN changed castling rights"
    );
    assert_eq!(
        reparsed.en_passant_target(),
        board.en_passant_target(),
        "{context}: FEN changed the en-passant target"
    );

    // The generator agrees with the brute-force oracle.
    let mut generated: Vec<String> = board.legal_moves().iter().map(|m| m.coordinates()).collect();
    generated.sort();
    assert_eq!(
        generated,
        brute_force_legal_moves(board),
        "{context}: generator disagrees with the oracle\n{board}"
    );
}

fn check_san_round_trips(board: &Board, context: &str) {
    for m in board.legal_moves() {
        let san = board.san(m);
        assert_eq!(
            board.parse_san(&san),
            Ok(m),
            "{context}: SAN {san} did not parse back"
        );
    }
}

#[test]
fn invariants_hold_through_random_playouts() {
    let mut rng = playout_rng();

    for &start in INTERESTING_STARTS {
        let mut board = Board::from_fen(start).unwrap();
        check_position_invariants(&board, start);

        for ply in 0..60 {
            let moves = board.legal_moves();
            if moves.is_empty() {
                break;
            }
            let m = moves[(rng.next_u64() % moves.len() as u64) as usize];
            let context = format!("{start} after {ply} plies (last {})", m.coordinates());

            let result = board.play_move(m);
            check_position_invariants(&board, &context);
            if result.game_has_ended() {
                break;
            }
        }
    }
}

#[test]
fn san_round_trips_through_random_playouts() {
    let mut rng = playout_rng();

    for &start in INTERESTING_STARTS {
        let mut board = Board::from_fen(start).unwrap();

        for ply in 0..30 {
            check_san_round_trips(&board, &format!("{start} at ply {ply}"));

            let moves = board.legal_moves();
            if moves.is_empty() {
                break;
            }
            let m = moves[(rng.next_u64() % moves.len() as u64) as usize];
            if board.play_move(m).game_has_ended() {
                break;
            }
        }
    }
}

#[test]
fn unmaking_a_playout_restores_the_original_position() {
    let mut rng = playout_rng();

    for &start in INTERESTING_STARTS {
        let mut board = Board::from_fen(start).unwrap();
        let original_fen = board.fen();
        let original_hash = board.hash();

        let mut played = 0;
        for _ in 0..40 {
            let moves = board.legal_moves();
            if moves.is_empty() {
                break;
            }
            let m = moves[(rng.next_u64() % moves.len() as u64) as usize];
            board.push_move(m);
            played += 1;
        }
        for _ in 0..played {
            board.pop_move();
        }

        assert_eq!(board.fen(), original_fen, "{start}: unmake drifted");
        assert_eq!(board.hash(), original_hash, "{start}: unmake changed the hash");
        assert!(board.attack_maps_are_consistent(), "{start}: unmake broke the maps");
    }
}
