use std::any::Any;
use std::collections::BTreeMap;
use std::sync::OnceLock;

use galapagos_core::board::{Board, Color};
use rand::RngCore;

use super::{random_index, Gene, GenomeError, PieceValues, PropertyMap};

/// No move preferred for a slot.
const NO_CHOICE: &str = "-";
/// The key for the engine's own first move as white.
const START_KEY: &str = "Start";

/// A lookup of preferred opening moves: one slot for the engine's first
/// move as white, and one slot per possible white first move holding the
/// preferred black reply. Every slot may also be empty, handing the choice
/// to the search.
///
/// Only the first ply of a standard-position game consults this gene.
#[derive(Debug, Clone)]
pub struct OpeningMoveGene {
    choices: BTreeMap<String, String>,
}

/// White's twenty first moves, in SAN. Black's twenty replies are the
/// same set of SAN strings regardless of white's move, which is why one
/// reply board suffices.
fn first_move_sans() -> &'static Vec<String> {
    static SANS: OnceLock<Vec<String>> = OnceLock::new();
    SANS.get_or_init(|| {
        let board = Board::starting_position();
        board.legal_moves().iter().map(|&m| board.san(m)).collect()
    })
}

fn reply_board() -> Board {
    let mut board = Board::starting_position();
    let first = board.legal_moves()[0];
    board.play_move(first);
    board
}

fn reply_sans() -> &'static Vec<String> {
    static SANS: OnceLock<Vec<String>> = OnceLock::new();
    SANS.get_or_init(|| {
        let board = reply_board();
        board.legal_moves().iter().map(|&m| board.san(m)).collect()
    })
}

impl Default for OpeningMoveGene {
    fn default() -> Self {
        let mut choices = BTreeMap::new();
        choices.insert(START_KEY.to_owned(), NO_CHOICE.to_owned());
        for san in first_move_sans() {
            choices.insert(san.clone(), NO_CHOICE.to_owned());
        }
        Self { choices }
    }
}

impl OpeningMoveGene {
    /// The preferred move for the current position, if the gene holds one
    /// and the game is still on its first ply from the standard start.
    pub fn choice(&self, board: &Board) -> Option<galapagos_core::board::MoveRef> {
        if !board.started_from_standard_position() || board.ply_count() > 1 {
            return None;
        }

        let key = match board.last_move() {
            None => START_KEY.to_owned(),
            Some(m) => {
                let mut before = board.clone();
                before.pop_move();
                before.san(m)
            }
        };

        let value = self.choices.get(&key)?;
        if value == NO_CHOICE {
            return None;
        }
        board.parse_san(value).ok()
    }
}

impl Gene for OpeningMoveGene {
    fn name(&self) -> &'static str {
        "Opening Move Gene"
    }

    fn score_board(&self, _: &Board, _: Color, _: u32, _: &PieceValues) -> f64 {
        0.0
    }

    fn write_gene_properties(&self, props: &mut PropertyMap) {
        for (key, value) in &self.choices {
            props.insert(key.clone(), value.clone());
        }
    }

    fn load_gene_properties(&mut self, props: &PropertyMap) -> Result<(), GenomeError> {
        let name = self.name();
        let start_board = Board::starting_position();
        let reply_board = reply_board();

        for (key, value) in props {
            if !self.choices.contains_key(key) {
                return Err(GenomeError::UnknownKey {
                    gene: name.to_owned(),
                    key: key.clone(),
                });
            }

            if value != NO_CHOICE {
                let check_board = if key == START_KEY {
                    &start_board
                } else {
                    &reply_board
                };
                if check_board.parse_san(value).is_err() {
                    return Err(GenomeError::BadValue {
                        gene: name.to_owned(),
                        key: key.clone(),
                        value: value.clone(),
                    });
                }
            }
            self.choices.insert(key.clone(), value.clone());
        }

        Ok(())
    }

    fn gene_property_count(&self) -> usize {
        self.choices.len()
    }

    fn mutate_gene(&mut self, rng: &mut dyn RngCore) {
        let index = random_index(rng, self.choices.len());
        let key = self.choices.keys().nth(index).cloned().expect("index in range");

        let pool = if key == START_KEY {
            first_move_sans()
        } else {
            reply_sans()
        };

        // One extra slot stands for clearing the preference.
        let pick = random_index(rng, pool.len() + 1);
        let value = pool.get(pick).cloned().unwrap_or_else(|| NO_CHOICE.to_owned());
        self.choices.insert(key, value);
    }

    fn boxed_clone(&self) -> Box<dyn Gene> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_has_a_slot_per_first_move_plus_start() {
        let gene = OpeningMoveGene::default();
        assert_eq!(gene.properties().len(), 21);
        assert!(gene.properties().contains_key("Start"));
        assert!(gene.properties().contains_key("e4"));
        assert!(gene.properties().contains_key("Na3"));
    }

    #[test]
    fn empty_slots_defer_to_the_search() {
        let gene = OpeningMoveGene::default();
        let board = Board::starting_position();
        assert!(gene.choice(&board).is_none());
    }

    #[test]
    fn stored_choices_resolve_to_moves() {
        let mut gene = OpeningMoveGene::default();
        gene.choices.insert("Start".to_owned(), "e4".to_owned());
        gene.choices.insert("d4".to_owned(), "Nf6".to_owned());

        let mut board = Board::starting_position();
        let first = gene.choice(&board).expect("a preferred first move");
        assert_eq!(board.san(first), "e4");

        let d4 = board.parse_san("d4").unwrap();
        board.play_move(d4);
        let reply = gene.choice(&board).expect("a preferred reply to d4");
        assert_eq!(board.san(reply), "Nf6");
    }

    #[test]
    fn later_plies_and_custom_starts_are_ignored() {
        let mut gene = OpeningMoveGene::default();
        gene.choices.insert("Start".to_owned(), "e4".to_owned());

        let mut board = Board::starting_position();
        for coordinates in ["e2e4", "e7e5"] {
            let m = board.parse_coordinate_move(coordinates).unwrap();
            board.play_move(m);
        }
        assert!(gene.choice(&board).is_none());

        let custom = Board::from_fen("4k3/8/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        assert!(gene.choice(&custom).is_none());
    }

    #[test]
    fn bad_stored_san_is_rejected_on_load() {
        let mut gene = OpeningMoveGene::default();
        let mut props = gene.properties();
        props.insert("e4".to_owned(), "Qh7".to_owned());
        assert!(matches!(
            gene.load_gene_properties(&props),
            Err(GenomeError::BadValue { .. })
        ));
    }

    #[test]
    fn mutation_fills_and_clears_slots() {
        let mut gene = OpeningMoveGene::default();
        let mut rng = crate::genes::test_support::rng();
        for _ in 0..100 {
            gene.mutate_gene(&mut rng);
        }
        let filled = gene
            .choices
            .values()
            .filter(|value| value.as_str() != NO_CHOICE)
            .count();
        assert!(filled > 0);

        // Every filled slot must still resolve against its board.
        let props = gene.properties();
        gene.load_gene_properties(&props).unwrap();
    }
}
