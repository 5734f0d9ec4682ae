//! Negamax search with alpha-beta pruning over [`Board`], driven by a
//! [`Genome`] for evaluation, move ordering, and time policy.

use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::time::{Duration, Instant};

use galapagos_core::board::{Board, Color, MoveRef, MoveVec};
use galapagos_core::game_result::GameResult;

use crate::calibration::Calibration;
use crate::genome::Genome;
use crate::genes::SearchMethod;
use crate::score::TreeScore;

/// Branching factor assumed when converting a time budget into a minimum
/// search depth.
pub const MINIMUM_DEPTH_BRANCHING_FACTOR: f64 = 8.0;

/// How much longer each iterative-deepening pass is expected to take than
/// the one before it; the next pass is skipped when the projection busts
/// the budget.
pub const ITERATION_GROWTH_FACTOR: f64 = 4.0;

/// Upper bound on the forced-capture chain played at quiescent leaves.
pub const QUIESCENCE_CAP: u32 = 8;

/// Backstop on recursion depth; budgets should stop the search long
/// before this does.
pub const MAX_SEARCH_PLIES: u32 = 64;

/// What a search produced: the chosen move, the score and principal
/// variation behind it, and counters for reporting.
#[derive(Debug, Clone)]
pub struct SearchReport {
    pub best_move: MoveRef,
    pub score: TreeScore,
    pub nodes_searched: u64,
    pub depth_reached: u32,
    pub elapsed: Duration,
    pub time_budget: f64,
}

/// One search invocation. Borrows the genome and the shared "move now"
/// flag; owns its counters.
pub struct Search<'a> {
    genome: &'a Genome,
    calibration: &'a Calibration,
    move_now: &'a AtomicBool,

    root_player: Color,
    root_marker: usize,
    start: Instant,

    nodes: u64,
    deepest_ply: u32,
}

impl<'a> Search<'a> {
    pub fn new(
        genome: &'a Genome,
        calibration: &'a Calibration,
        move_now: &'a AtomicBool,
    ) -> Self {
        Self {
            genome,
            calibration,
            move_now,
            root_player: Color::White,
            root_marker: 0,
            start: Instant::now(),
            nodes: 0,
            deepest_ply: 0,
        }
    }

    /// Pick a move for the side to move, spending `time_budget` seconds.
    ///
    /// `seed_line` is the principal variation from a previous search; any
    /// prefix of it that is still playable steers move ordering. Returns
    /// [`None`] when the game is already over in this position.
    pub fn choose_move(
        mut self,
        board: &mut Board,
        time_budget: f64,
        seed_line: &[MoveRef],
    ) -> Option<SearchReport> {
        self.root_player = board.to_move();
        self.root_marker = board.repetition_marker();
        self.start = Instant::now();

        if board.legal_moves().is_empty() {
            return None;
        }

        if let Some(book_move) = self.genome.preferred_opening_move(board) {
            return Some(SearchReport {
                best_move: book_move,
                score: TreeScore::new(0.0, self.root_player, vec![book_move]),
                nodes_searched: 0,
                depth_reached: 0,
                elapsed: self.start.elapsed(),
                time_budget,
            });
        }

        let score = match self.genome.search_method() {
            SearchMethod::Minimax => self.fixed_budget_root(board, time_budget, seed_line),
            SearchMethod::IterativeDeepening => self.iterative_root(board, time_budget, seed_line),
        };

        let best_move = *score.line().first()?;
        Some(SearchReport {
            best_move,
            nodes_searched: self.nodes,
            depth_reached: self.deepest_ply,
            elapsed: self.start.elapsed(),
            time_budget,
            score,
        })
    }

    fn must_move_now(&self) -> bool {
        self.move_now.load(AtomicOrdering::Relaxed)
    }

    // --- Fixed-budget mode -------------------------------------------------

    fn fixed_budget_root(
        &mut self,
        board: &mut Board,
        time_budget: f64,
        seed_line: &[MoveRef],
    ) -> TreeScore {
        let node_seconds = self.calibration.node_seconds.max(1e-9);
        let minimum_depth = ((time_budget / node_seconds).max(1.0).ln()
            / MINIMUM_DEPTH_BRANCHING_FACTOR.ln())
        .floor()
        .max(1.0) as u32;

        let mover = board.to_move();
        self.budgeted_node(
            board,
            0,
            minimum_depth,
            time_budget,
            TreeScore::loss(mover, Vec::new()),
            TreeScore::win(mover, Vec::new()),
            seed_line,
        )
    }

    /// One node of the fixed-budget descent. `budget` is the wall-clock
    /// share this subtree may spend.
    #[allow(clippy::too_many_arguments)]
    fn budgeted_node(
        &mut self,
        board: &mut Board,
        ply_from_root: u32,
        minimum_depth: u32,
        budget: f64,
        mut alpha: TreeScore,
        beta: TreeScore,
        pv: &[MoveRef],
    ) -> TreeScore {
        self.nodes += 1;
        self.deepest_ply = self.deepest_ply.max(ply_from_root);

        let mover = board.to_move();

        let mut moves = board.legal_moves();
        if let Some(leaf) = self.terminal_score(board, &moves, mover, ply_from_root) {
            return leaf;
        }

        let descend = ply_from_root < minimum_depth
            || !pv.is_empty()
            || board.in_check(mover)
            || budget > moves.len() as f64 * self.calibration.node_seconds;
        // The root always examines its moves, even out of time: the caller
        // needs a move, not an evaluation.
        if ply_from_root > 0
            && (ply_from_root >= MAX_SEARCH_PLIES || self.must_move_now() || !descend)
        {
            let value = self.quiescent_evaluate(board, mover, ply_from_root);
            return TreeScore::new(value, mover, Vec::new());
        }

        self.order_moves(board, &mut moves, pv);

        let node_start = Instant::now();
        let speculation = self
            .genome
            .speculation_factor(board.last_move_was_capture(), any_capture(board, &moves));

        let mut best = TreeScore::loss(mover, Vec::new());
        let move_count = moves.len();

        for (index, m) in moves.into_iter().enumerate() {
            let moves_left = (move_count - index) as f64;
            let budget_left = budget - node_start.elapsed().as_secs_f64();
            let child_budget = (budget_left / moves_left * speculation).max(0.0);

            let child_pv = match pv.first() {
                Some(&first) if first == m => &pv[1..],
                _ => &[],
            };

            board.push_move(m);
            let reply = self.budgeted_node(
                board,
                ply_from_root + 1,
                minimum_depth,
                child_budget,
                beta.clone(),
                alpha.clone(),
                child_pv,
            );
            board.pop_move();

            let candidate = extend_line(m, reply, mover);
            if candidate.is_better_than(&best, mover) {
                best = candidate;
            }
            if best.is_better_than(&alpha, mover) {
                alpha = best.clone();
            }

            // Alpha-beta cutoff: the opponent already has a better option
            // than letting this position arise.
            if !beta.is_better_than(&alpha, mover) {
                break;
            }

            if self.must_move_now() {
                break;
            }
        }

        best
    }

    // --- Iterative deepening mode ------------------------------------------

    fn iterative_root(
        &mut self,
        board: &mut Board,
        time_budget: f64,
        seed_line: &[MoveRef],
    ) -> TreeScore {
        let mover = board.to_move();
        let mut pv: Vec<MoveRef> = seed_line.to_vec();
        let mut best: Option<TreeScore> = None;

        for depth in 1..=MAX_SEARCH_PLIES {
            let score = self.depth_limited_node(
                board,
                depth,
                0,
                TreeScore::loss(mover, Vec::new()),
                TreeScore::win(mover, Vec::new()),
                &pv,
            );

            if self.must_move_now() && best.is_some() {
                // The pass was cut short; its result is untrustworthy.
                break;
            }

            pv = score.line().to_vec();
            let found_mate = score.is_win_for(mover) || score.is_loss_for(mover);
            best = Some(score);

            if found_mate {
                break;
            }

            let elapsed = self.start.elapsed().as_secs_f64();
            if elapsed * ITERATION_GROWTH_FACTOR > time_budget {
                break;
            }
        }

        best.expect("at least depth 1 completes")
    }

    fn depth_limited_node(
        &mut self,
        board: &mut Board,
        depth: u32,
        ply_from_root: u32,
        mut alpha: TreeScore,
        beta: TreeScore,
        pv: &[MoveRef],
    ) -> TreeScore {
        self.nodes += 1;
        self.deepest_ply = self.deepest_ply.max(ply_from_root);

        let mover = board.to_move();

        let mut moves = board.legal_moves();
        if let Some(leaf) = self.terminal_score(board, &moves, mover, ply_from_root) {
            return leaf;
        }

        if depth == 0 || (ply_from_root > 0 && self.must_move_now()) {
            let value = self.quiescent_evaluate(board, mover, ply_from_root);
            return TreeScore::new(value, mover, Vec::new());
        }

        self.order_moves(board, &mut moves, pv);

        let mut best = TreeScore::loss(mover, Vec::new());

        for m in moves {
            let child_pv = match pv.first() {
                Some(&first) if first == m => &pv[1..],
                _ => &[],
            };

            board.push_move(m);
            let reply = self.depth_limited_node(
                board,
                depth - 1,
                ply_from_root + 1,
                beta.clone(),
                alpha.clone(),
                child_pv,
            );
            board.pop_move();

            let candidate = extend_line(m, reply, mover);
            if candidate.is_better_than(&best, mover) {
                best = candidate;
            }
            if best.is_better_than(&alpha, mover) {
                alpha = best.clone();
            }
            if !beta.is_better_than(&alpha, mover) {
                break;
            }
            if self.must_move_now() {
                break;
            }
        }

        best
    }

    // --- Shared pieces ------------------------------------------------------

    /// Game-over and forced-draw detection for the current node. Returns
    /// the leaf score if the node should not be searched further.
    fn terminal_score(
        &self,
        board: &Board,
        moves: &MoveVec,
        mover: Color,
        ply_from_root: u32,
    ) -> Option<TreeScore> {
        if moves.is_empty() {
            return Some(if board.in_check(mover) {
                TreeScore::loss(mover, Vec::new())
            } else {
                self.draw_score(mover)
            });
        }

        // A position repeated since the true root can be forced into a
        // threefold by the side it favors; score it as the draw it is
        // instead of searching through it.
        if ply_from_root > 0 && board.repetition_count_since(self.root_marker) >= 2 {
            return Some(self.draw_score(mover));
        }

        match board.result_given_moves(moves) {
            GameResult::Ongoing => None,
            GameResult::Checkmate(winner) => Some(if winner == mover {
                TreeScore::win(mover, Vec::new())
            } else {
                TreeScore::loss(mover, Vec::new())
            }),
            _ => Some(self.draw_score(mover)),
        }
    }

    /// A drawn leaf scores the draw-value offset, signed from the player
    /// running the search.
    fn draw_score(&self, mover: Color) -> TreeScore {
        let for_root_player = self.genome.draw_value();
        let value = if mover == self.root_player {
            for_root_player
        } else {
            -for_root_player
        };
        TreeScore::new(value, mover, Vec::new())
    }

    /// Let the move-sorting gene order the list, then put the
    /// principal-variation move (if playable here) first.
    fn order_moves(&self, board: &Board, moves: &mut MoveVec, pv: &[MoveRef]) {
        self.genome.sort_moves(board, moves);

        if let Some(&first) = pv.first() {
            if let Some(position) = moves.iter().position(|&m| m == first) {
                moves.remove(position);
                moves.insert(0, first);
            }
        }
    }

    /// Evaluate a quiescent leaf: play out forced captures on the square
    /// the last move landed on, weakest attacker first, then score the
    /// settled position for `perspective`.
    fn quiescent_evaluate(&mut self, board: &mut Board, perspective: Color, ply: u32) -> f64 {
        let values = self.genome.piece_values();
        let mut played = 0u32;

        if let Some(target) = board.last_move().map(|m| m.to_square()) {
            while played < QUIESCENCE_CAP {
                let moves = board.legal_moves();
                let recapture = moves
                    .iter()
                    .copied()
                    .filter(|m| {
                        (m.to_square() == target && board.piece_on(target).is_some())
                            || m.en_passant_victim_square() == Some(target)
                    })
                    .min_by(|a, b| {
                        values
                            .value_of(a.piece())
                            .total_cmp(&values.value_of(b.piece()))
                            .then(a.piece().piece_type().cmp(&b.piece().piece_type()))
                    });

                match recapture {
                    Some(m) => {
                        board.push_move(m);
                        self.nodes += 1;
                        played += 1;
                    }
                    None => break,
                }
            }
        }

        let value = self.genome.evaluate(board, perspective, ply + played);
        for _ in 0..played {
            board.pop_move();
        }
        value
    }
}

/// A parent-node score built from a child's reply: the move prepended to
/// the child's line, the value re-expressed for the parent's mover.
fn extend_line(m: MoveRef, reply: TreeScore, mover: Color) -> TreeScore {
    let value = reply.value_for(mover);
    let mut line = vec![m];
    line.extend_from_slice(reply.line());
    TreeScore::new(value, mover, line)
}

fn any_capture(board: &Board, moves: &MoveVec) -> bool {
    moves
        .iter()
        .any(|m| board.piece_on(m.to_square()).is_some() || m.is_en_passant())
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn run_search(fen: &str, budget: f64) -> SearchReport {
        let genome = Genome::new();
        let calibration = Calibration::default();
        let move_now = AtomicBool::new(false);
        let mut board = Board::from_fen(fen).unwrap();
        Search::new(&genome, &calibration, &move_now)
            .choose_move(&mut board, budget, &[])
            .expect("position has legal moves")
    }

    #[test]
    fn finds_mate_in_one() {
        // Scholar's mate is available.
        let report = run_search(
            "r1bqkbnr/pppp1ppp/2n5/4p2Q/2B1P3/8/PPPP1PPP/RNB1K1NR w KQkq - 4 4",
            0.2,
        );
        assert_eq!(report.best_move.coordinates(), "h5f7");
        assert!(report.score.is_win_for(Color::White));
    }

    #[test]
    fn escapes_check_legally() {
        let report = run_search("4r2k/8/8/8/8/8/3N4/4K3 w - - 0 1", 0.1);
        let mut board = Board::from_fen("4r2k/8/8/8/8/8/3N4/4K3 w - - 0 1").unwrap();
        assert!(board
            .legal_moves()
            .iter()
            .any(|&m| m == report.best_move));
        board.push_move(report.best_move);
        assert!(!board.in_check(Color::White));
    }

    #[test]
    fn takes_the_hanging_queen() {
        // A free queen on d5, reachable by the c3 knight or the d1 rook.
        let report = run_search("3q3k/8/8/3q4/8/2N5/8/3RK3 w - - 0 1", 0.3);
        assert_eq!(report.best_move.to_square().to_string(), "d5");
    }

    #[test]
    fn move_now_flag_stops_the_search() {
        let genome = Genome::new();
        let calibration = Calibration::default();
        let move_now = AtomicBool::new(true);
        let mut board = Board::starting_position();

        let start = Instant::now();
        let report = Search::new(&genome, &calibration, &move_now)
            .choose_move(&mut board, 60.0, &[])
            .unwrap();
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(board.legal_moves().contains(&report.best_move));
    }

    #[test]
    fn book_moves_bypass_the_search() {
        let genome = Genome::parse(&Genome::new().write_block().replace(
            "Start: -",
            "Start: d4",
        ))
        .unwrap();
        let calibration = Calibration::default();
        let move_now = AtomicBool::new(false);
        let mut board = Board::starting_position();

        let report = Search::new(&genome, &calibration, &move_now)
            .choose_move(&mut board, 1.0, &[])
            .unwrap();
        assert_eq!(report.nodes_searched, 0);
        assert_eq!(report.best_move.coordinates(), "d2d4");
    }

    #[test]
    fn repeated_positions_score_as_draws_in_the_tree() {
        // A blocked knight shuffle: most lines walk in circles, and the
        // repetition rule scores them as draws instead of looping. The
        // search must still produce a legal move promptly.
        let report = run_search("k7/8/2n5/8/8/2N5/8/K7 w - - 0 1", 0.05);
        let board = Board::from_fen("k7/8/2n5/8/8/2N5/8/K7 w - - 0 1").unwrap();
        assert!(board.legal_moves().contains(&report.best_move));
    }

    #[test]
    fn no_legal_moves_returns_none() {
        let genome = Genome::new();
        let calibration = Calibration::default();
        let move_now = AtomicBool::new(false);
        let mut board = Board::from_fen("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1").unwrap();
        assert!(Search::new(&genome, &calibration, &move_now)
            .choose_move(&mut board, 1.0, &[])
            .is_none());
    }

    #[test]
    fn sees_a_ladder_mate_in_two() {
        let report = run_search("7k/8/8/8/8/8/R7/1R5K w - - 0 1", 0.05);
        let board = Board::from_fen("7k/8/8/8/8/8/R7/1R5K w - - 0 1").unwrap();

        // Whatever the exact line, the score must be a forced win.
        assert!(report.score.is_win_for(Color::White));
        assert!(board.legal_moves().contains(&report.best_move));
    }
}
