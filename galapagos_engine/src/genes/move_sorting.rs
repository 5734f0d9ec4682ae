use std::any::Any;

use galapagos_core::board::{Board, Color, MoveRef, MoveVec, PieceType};
use rand::RngCore;

use super::{laplace, parse_number, Gene, GenomeError, PieceValues, PropertyMap};

const SORTER_COUNT_KEY: &str = "Sorter Count";

/// Orders moves before the search examines them. Ordering is advisory: it
/// changes which branches prune, never which move is legal.
///
/// The sub-predicates partition stably in this order: recaptures on the
/// last move's destination, then captures by most-valuable-victim /
/// least-valuable-attacker, then checking moves, then everything else.
/// How many of the partitions are active is the evolvable parameter.
#[derive(Debug, Clone)]
pub struct MoveSortingGene {
    sorter_count: f64,
}

impl Default for MoveSortingGene {
    fn default() -> Self {
        Self { sorter_count: 3.0 }
    }
}

impl MoveSortingGene {
    fn active_sorters(&self) -> usize {
        (self.sorter_count.max(0.0) as usize).min(3)
    }

    /// Stable-sort `moves` most-promising-first.
    pub fn sort_moves(&self, board: &Board, values: &PieceValues, moves: &mut MoveVec) {
        let active = self.active_sorters();
        if active == 0 {
            return;
        }

        let recapture_square = board.last_move().map(|m| m.to_square());

        let mut keyed: Vec<(usize, i64, MoveRef)> = moves
            .iter()
            .map(|&m| {
                let victim = capture_victim(board, m);

                let class = if active >= 1
                    && victim.is_some()
                    && Some(m.to_square()) == recapture_square
                {
                    0
                } else if active >= 2 && victim.is_some() {
                    1
                } else if active >= 3 && board.move_gives_check_hint(m) {
                    2
                } else {
                    3
                };

                // Captures order by victim value falling, attacker value
                // rising; scaled to integers so the key is total. The sort
                // itself is stable, which keeps equal keys in generation
                // order.
                let exchange = match victim {
                    Some(v) if class <= 1 => {
                        let gain = values.value(v) - values.value_of(m.piece()) / 1000.0;
                        -(gain * 1000.0) as i64
                    }
                    _ => 0,
                };

                (class, exchange, m)
            })
            .collect();

        keyed.sort_by_key(|&(class, exchange, _)| (class, exchange));

        moves.clear();
        moves.extend(keyed.into_iter().map(|(_, _, m)| m));
    }
}

fn capture_victim(board: &Board, m: MoveRef) -> Option<PieceType> {
    if m.is_en_passant() {
        Some(PieceType::Pawn)
    } else {
        board.piece_on(m.to_square()).map(|p| p.piece_type())
    }
}

impl Gene for MoveSortingGene {
    fn name(&self) -> &'static str {
        "Move Sorting Gene"
    }

    fn score_board(&self, _: &Board, _: Color, _: u32, _: &PieceValues) -> f64 {
        0.0
    }

    fn write_gene_properties(&self, props: &mut PropertyMap) {
        props.insert(SORTER_COUNT_KEY.to_owned(), self.sorter_count.to_string());
    }

    fn load_gene_properties(&mut self, props: &PropertyMap) -> Result<(), GenomeError> {
        self.sorter_count = parse_number(self.name(), SORTER_COUNT_KEY, props)?.clamp(0.0, 3.0);
        Ok(())
    }

    fn gene_property_count(&self) -> usize {
        1
    }

    fn mutate_gene(&mut self, rng: &mut dyn RngCore) {
        self.sorter_count = (self.sorter_count + laplace(rng, 0.5)).clamp(0.0, 3.0);
    }

    fn boxed_clone(&self) -> Box<dyn Gene> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
