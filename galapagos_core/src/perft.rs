//! Perft: exhaustive legal-move node counting, the standard correctness
//! test for move generation.

use crate::board::Board;

/// Count the leaf nodes of the legal-move tree to the given depth.
pub fn perft(board: &mut Board, depth: u32) -> u64 {
    if depth == 0 {
        return 1;
    }

    let moves = board.legal_moves();
    if depth == 1 {
        return moves.len() as u64;
    }

    let mut nodes = 0;
    for m in moves {
        board.push_move(m);
        nodes += perft(board, depth - 1);
        board.pop_move();
    }
    nodes
}

/// Perft split by first move, as printed by the `-list` mode: each legal
/// move with the node count of the subtree behind it, plus the total.
pub fn perft_divide(board: &mut Board, depth: u32) -> Vec<(String, u64)> {
    let mut rows = Vec::new();
    let mut total = 0;

    for m in board.legal_moves() {
        let nodes = if depth == 0 {
            1
        } else {
            board.push_move(m);
            let nodes = perft(board, depth.saturating_sub(1));
            board.pop_move();
            nodes
        };
        total += nodes;
        rows.push((m.coordinates(), nodes));
    }

    rows.sort();
    rows.push(("total".to_owned(), total));
    rows
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    pub const KIWIPETE_FEN: &str =
        "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";
    pub const CPW_POSITION_3_FEN: &str = "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1";

    fn perft_from(fen: &str, depth: u32) -> u64 {
        let mut board = Board::from_fen(fen).unwrap();
        perft(&mut board, depth)
    }

    #[test]
    fn startpos_shallow() {
        let mut board = Board::starting_position();
        assert_eq!(perft(&mut board, 1), 20);
        assert_eq!(perft(&mut board, 2), 400);
        assert_eq!(perft(&mut board, 3), 8_902);
        assert_eq!(perft(&mut board, 4), 197_281);
    }

    #[test]
    #[ignore = "slow; run with cargo test -- --ignored"]
    fn startpos_deep() {
        let mut board = Board::starting_position();
        assert_eq!(perft(&mut board, 5), 4_865_609);
        assert_eq!(perft(&mut board, 6), 119_060_324);
    }

    #[test]
    fn kiwipete_shallow() {
        assert_eq!(perft_from(KIWIPETE_FEN, 1), 48);
        assert_eq!(perft_from(KIWIPETE_FEN, 2), 2_039);
        assert_eq!(perft_from(KIWIPETE_FEN, 3), 97_862);
    }

    #[test]
    #[ignore = "slow; run with cargo test -- --ignored"]
    fn kiwipete_deep() {
        assert_eq!(perft_from(KIWIPETE_FEN, 4), 4_085_603);
        assert_eq!(perft_from(KIWIPETE_FEN, 5), 193_690_690);
    }

    #[test]
    fn cpw_position_3_shallow() {
        assert_eq!(perft_from(CPW_POSITION_3_FEN, 1), 14);
        assert_eq!(perft_from(CPW_POSITION_3_FEN, 2), 191);
        assert_eq!(perft_from(CPW_POSITION_3_FEN, 3), 2_812);
        assert_eq!(perft_from(CPW_POSITION_3_FEN, 4), 43_238);
    }

    #[test]
    #[ignore = "slow; run with cargo test -- --ignored"]
    fn cpw_position_3_deep() {
        assert_eq!(perft_from(CPW_POSITION_3_FEN, 5), 674_624);
    }

    #[test]
    fn divide_rows_sum_to_the_total() {
        let mut board = Board::starting_position();
        let rows = perft_divide(&mut board, 3);
        let (label, total) = rows.last().unwrap().clone();
        assert_eq!(label, "total");
        assert_eq!(total, 8_902);
        assert_eq!(
            rows[..rows.len() - 1].iter().map(|(_, n)| n).sum::<u64>(),
            total
        );
        assert_eq!(rows.len() - 1, 20);
    }
}
