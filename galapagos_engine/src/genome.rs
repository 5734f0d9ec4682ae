//! A genome: an ordered collection of genes defining a player's evaluation
//! and search behavior, plus its file representation.

use galapagos_core::board::{Board, Color, MoveRef, MoveVec};
use galapagos_core::clock::Clock;
use rand::RngCore;

use crate::genes::{
    coin_flip, random_index, CastlingPossibleGene, CheckmateMaterialGene, DrawValueGene,
    FreedomToMoveGene, Gene, GenomeError, KingConfinementGene, KingProtectionGene, LookAheadGene,
    MoveSortingGene, MutationRateGene, NullGene, OpeningMoveGene, OpponentPiecesTargetedGene,
    PassedPawnGene, PawnAdvancementGene, PawnIslandsGene, PawnStructureGene, PieceStrengthGene,
    PieceValues, SearchMethod, SphereOfInfluenceGene, StackedPawnsGene, TotalForceGene,
};

// Fixed slots for the regulatory genes.
const PIECE_STRENGTH: usize = 0;
const LOOK_AHEAD: usize = 1;
const MUTATION_RATE: usize = 2;
const MOVE_SORTING: usize = 3;
const OPENING_MOVE: usize = 4;
const DRAW_VALUE: usize = 5;

/// The complete heritable definition of a player.
///
/// The first six slots are regulatory (piece strengths, search policy,
/// mutation rate, move ordering, opening lookup, draw preference); the
/// rest score board positions. Crossover copies whole slots, so the order
/// is part of the format.
#[derive(Clone)]
pub struct Genome {
    genes: Vec<Box<dyn Gene>>,
}

impl Default for Genome {
    fn default() -> Self {
        Self::new()
    }
}

impl Genome {
    pub fn new() -> Self {
        let genes: Vec<Box<dyn Gene>> = vec![
            Box::new(PieceStrengthGene::default()),
            Box::new(LookAheadGene::default()),
            Box::new(MutationRateGene::default()),
            Box::new(MoveSortingGene::default()),
            Box::new(OpeningMoveGene::default()),
            Box::new(DrawValueGene::default()),
            Box::new(TotalForceGene::default()),
            Box::new(FreedomToMoveGene::default()),
            Box::new(PawnAdvancementGene::default()),
            Box::new(PassedPawnGene::default()),
            Box::new(StackedPawnsGene::default()),
            Box::new(PawnIslandsGene::default()),
            Box::new(PawnStructureGene::default()),
            Box::new(OpponentPiecesTargetedGene::default()),
            Box::new(SphereOfInfluenceGene::default()),
            Box::new(KingConfinementGene::default()),
            Box::new(KingProtectionGene::default()),
            Box::new(CastlingPossibleGene::default()),
            Box::new(CheckmateMaterialGene::default()),
            Box::new(NullGene::default()),
        ];
        Self { genes }
    }

    /// Sexual reproduction: each gene slot comes from either parent with
    /// equal probability. The offspring's material genes automatically
    /// read the piece-strength slot it inherited, whichever parent that
    /// came from.
    pub fn cross(mother: &Genome, father: &Genome, rng: &mut dyn RngCore) -> Genome {
        let genes = mother
            .genes
            .iter()
            .zip(&father.genes)
            .map(|(from_mother, from_father)| {
                if coin_flip(rng) {
                    from_mother.boxed_clone()
                } else {
                    from_father.boxed_clone()
                }
            })
            .collect();
        Genome { genes }
    }

    fn piece_strength(&self) -> &PieceStrengthGene {
        self.genes[PIECE_STRENGTH]
            .as_any()
            .downcast_ref()
            .expect("slot 0 holds the piece strength gene")
    }

    fn look_ahead(&self) -> &LookAheadGene {
        self.genes[LOOK_AHEAD]
            .as_any()
            .downcast_ref()
            .expect("slot 1 holds the look ahead gene")
    }

    fn mutation_rate(&self) -> &MutationRateGene {
        self.genes[MUTATION_RATE]
            .as_any()
            .downcast_ref()
            .expect("slot 2 holds the mutation rate gene")
    }

    fn move_sorting(&self) -> &MoveSortingGene {
        self.genes[MOVE_SORTING]
            .as_any()
            .downcast_ref()
            .expect("slot 3 holds the move sorting gene")
    }

    fn opening_move(&self) -> &OpeningMoveGene {
        self.genes[OPENING_MOVE]
            .as_any()
            .downcast_ref()
            .expect("slot 4 holds the opening move gene")
    }

    fn draw_value_gene(&self) -> &DrawValueGene {
        self.genes[DRAW_VALUE]
            .as_any()
            .downcast_ref()
            .expect("slot 5 holds the draw value gene")
    }

    /// The piece strengths shared by the material-sensitive genes.
    pub fn piece_values(&self) -> &PieceValues {
        self.piece_strength().values()
    }

    /// Evaluate a position for `perspective`: the sum of every active
    /// gene's weighted score, minus the same sum for the opponent. Higher
    /// means better winning chances for `perspective`.
    pub fn evaluate(&self, board: &Board, perspective: Color, depth: u32) -> f64 {
        let progress = board.game_progress();
        self.score_for(board, perspective, depth, progress)
            - self.score_for(board, perspective.opposite(), depth, progress)
    }

    fn score_for(&self, board: &Board, perspective: Color, depth: u32, progress: f64) -> f64 {
        let values = self.piece_values();
        self.genes
            .iter()
            .map(|gene| gene.evaluate(board, perspective, depth, progress, values))
            .sum()
    }

    /// Seconds the search should spend choosing the next move.
    pub fn time_to_examine(&self, board: &Board, clock: &Clock) -> f64 {
        self.look_ahead().time_to_examine(board, clock)
    }

    /// The branch-time overcommitment factor for a node with the given
    /// capture facts.
    pub fn speculation_factor(&self, last_move_captured: bool, capture_possible: bool) -> f64 {
        self.look_ahead()
            .speculation_factor(last_move_captured, capture_possible)
    }

    pub fn search_method(&self) -> SearchMethod {
        self.look_ahead().search_method()
    }

    /// The score offset a drawn leaf earns for the player running the
    /// search (added to the leaf from that player's perspective).
    pub fn draw_value(&self) -> f64 {
        self.draw_value_gene().draw_value()
    }

    /// A preferred book move for the first ply, if any.
    pub fn preferred_opening_move(&self, board: &Board) -> Option<MoveRef> {
        self.opening_move().choice(board)
    }

    /// Order moves most-promising-first for the search.
    pub fn sort_moves(&self, board: &Board, moves: &mut MoveVec) {
        self.move_sorting()
            .sort_moves(board, self.piece_values(), moves);
    }

    /// Apply the number of point mutations dictated by the mutation-rate
    /// gene.
    pub fn mutate(&mut self, rng: &mut dyn RngCore) {
        let count = self.mutation_rate().mutation_count(rng);
        self.mutate_n(rng, count);
    }

    /// Apply exactly `count` point mutations, each landing on a scalar
    /// chosen uniformly across all genes (so a gene with more parameters
    /// receives proportionally more mutations).
    pub fn mutate_n(&mut self, rng: &mut dyn RngCore, count: usize) {
        let weights: Vec<usize> = self
            .genes
            .iter()
            .map(|gene| gene.mutatable_component_count())
            .collect();
        let total: usize = weights.iter().sum();
        if total == 0 {
            return;
        }

        for _ in 0..count {
            let mut ticket = random_index(rng, total);
            let index = weights
                .iter()
                .position(|&weight| {
                    if ticket < weight {
                        true
                    } else {
                        ticket -= weight;
                        false
                    }
                })
                .expect("ticket is below the total weight");
            self.genes[index].mutate(rng);
        }
    }

    /// Render the gene blocks of this genome, ending with `END`. The `ID:`
    /// header is the pool file's concern, not the genome's.
    pub fn write_block(&self) -> String {
        let mut out = String::new();
        for gene in &self.genes {
            out.push_str("Name: ");
            out.push_str(gene.name());
            out.push('\n');
            for (key, value) in gene.properties() {
                out.push_str(&key);
                out.push_str(": ");
                out.push_str(&value);
                out.push('\n');
            }
            out.push('\n');
        }
        out.push_str("END\n");
        out
    }

    /// Read gene blocks from lines of text until `END`.
    ///
    /// Each block is `Name: <gene>` followed by `key: value` lines and a
    /// blank terminator. Missing, duplicated, and unparseable parameters
    /// are distinct errors; so are unknown genes and keys. `#` starts a
    /// comment anywhere.
    pub fn read_from<'a>(
        lines: &mut impl Iterator<Item = &'a str>,
    ) -> Result<Genome, GenomeError> {
        let mut genome = Genome::new();

        loop {
            let Some(line) = next_meaningful_line(lines) else {
                return Err(GenomeError::MissingEnd);
            };
            if line == "END" {
                return Ok(genome);
            }

            let Some(gene_name) = line.strip_prefix("Name:").map(str::trim) else {
                return Err(GenomeError::BadLine { line });
            };

            let index = genome
                .genes
                .iter()
                .position(|gene| gene.name() == gene_name)
                .ok_or_else(|| GenomeError::UnknownGene {
                    name: gene_name.to_owned(),
                })?;

            let mut collected = crate::genes::PropertyMap::new();
            for raw in lines.by_ref() {
                let line = strip_comment(raw);
                if line.is_empty() {
                    break;
                }
                let Some((key, value)) = line.split_once(':') else {
                    return Err(GenomeError::BadLine {
                        line: line.to_owned(),
                    });
                };
                let key = key.trim().to_owned();
                if collected.contains_key(&key) {
                    return Err(GenomeError::DuplicateKey {
                        gene: gene_name.to_owned(),
                        line: line.to_owned(),
                    });
                }
                collected.insert(key, value.trim().to_owned());
            }

            let expected = genome.genes[index].properties();
            for key in collected.keys() {
                if !expected.contains_key(key) {
                    return Err(GenomeError::UnknownKey {
                        gene: gene_name.to_owned(),
                        key: key.clone(),
                    });
                }
            }
            for key in expected.keys() {
                if !collected.contains_key(key) {
                    return Err(GenomeError::MissingKey {
                        gene: gene_name.to_owned(),
                        key: key.clone(),
                    });
                }
            }

            genome.genes[index].load_properties(&collected)?;
        }
    }

    /// Parse one complete genome block from text.
    pub fn parse(text: &str) -> Result<Genome, GenomeError> {
        Self::read_from(&mut text.lines())
    }
}

fn strip_comment(line: &str) -> &str {
    match line.split_once('#') {
        Some((before, _)) => before.trim(),
        None => line.trim(),
    }
}

fn next_meaningful_line<'a>(lines: &mut impl Iterator<Item = &'a str>) -> Option<String> {
    for raw in lines {
        let line = strip_comment(raw);
        if !line.is_empty() {
            return Some(line.to_owned());
        }
    }
    None
}

impl std::fmt::Debug for Genome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Genome({} genes)", self.genes.len())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::genes::test_support;
    use pretty_assertions::assert_eq;

    #[test]
    fn write_read_write_is_byte_identical() {
        let mut rng = test_support::rng();
        let mut genome = Genome::new();
        genome.mutate_n(&mut rng, 100);

        let written = genome.write_block();
        let reread = Genome::parse(&written).unwrap();
        assert_eq!(reread.write_block(), written);
    }

    #[test]
    fn evaluation_is_antisymmetric() {
        let genome = Genome::new();
        let board = Board::starting_position();
        let white = genome.evaluate(&board, Color::White, 0);
        let black = genome.evaluate(&board, Color::Black, 0);
        assert!((white + black).abs() < 1e-12);
    }

    #[test]
    fn material_advantage_shows_in_the_evaluation() {
        let genome = Genome::new();
        // White has an extra queen.
        let board = Board::from_fen("4k3/8/8/8/8/8/8/Q3K3 w - - 0 1").unwrap();
        assert!(genome.evaluate(&board, Color::White, 0) > 0.0);
        assert!(genome.evaluate(&board, Color::Black, 0) < 0.0);
    }

    #[test]
    fn mutation_changes_the_written_form() {
        let mut rng = test_support::rng();
        let mut genome = Genome::new();
        let before = genome.write_block();
        genome.mutate(&mut rng);
        assert_ne!(genome.write_block(), before);
    }

    #[test]
    fn crossover_takes_whole_slots_from_parents() {
        let mut rng = test_support::rng();
        let mut mother = Genome::new();
        let mut father = Genome::new();
        mother.mutate_n(&mut rng, 200);
        father.mutate_n(&mut rng, 200);

        let child = Genome::cross(&mother, &father, &mut rng);

        for (index, gene) in child.genes.iter().enumerate() {
            let rendered = gene.properties();
            let from_mother = mother.genes[index].properties();
            let from_father = father.genes[index].properties();
            assert!(
                rendered == from_mother || rendered == from_father,
                "slot {index} matches neither parent"
            );
        }
    }

    #[test]
    fn unknown_gene_names_are_rejected() {
        let text = "Name: Bogus Gene\nKey: 1\n\nEND\n";
        assert_eq!(
            Genome::parse(text).unwrap_err(),
            GenomeError::UnknownGene {
                name: "Bogus Gene".into()
            }
        );
    }

    #[test]
    fn missing_duplicate_and_bad_values_are_distinguished() {
        let missing = "Name: Mutation Rate Gene\n\nEND\n";
        assert!(matches!(
            Genome::parse(missing).unwrap_err(),
            GenomeError::MissingKey { .. }
        ));

        let duplicate = "Name: Mutation Rate Gene\nMutation Rate: 5\nMutation Rate: 6\n\nEND\n";
        assert!(matches!(
            Genome::parse(duplicate).unwrap_err(),
            GenomeError::DuplicateKey { .. }
        ));

        let bad = "Name: Mutation Rate Gene\nMutation Rate: many\n\nEND\n";
        assert!(matches!(
            Genome::parse(bad).unwrap_err(),
            GenomeError::BadValue { .. }
        ));

        let unknown = "Name: Mutation Rate Gene\nMutation Rate: 5\nExtra: 1\n\nEND\n";
        assert!(matches!(
            Genome::parse(unknown).unwrap_err(),
            GenomeError::UnknownKey { .. }
        ));
    }

    #[test]
    fn truncated_blocks_are_missing_end() {
        let text = "Name: Null Gene\nPriority - Opening: 1\n";
        assert!(matches!(
            Genome::parse(text).unwrap_err(),
            GenomeError::MissingEnd | GenomeError::MissingKey { .. }
        ));
    }

    #[test]
    fn comments_are_ignored() {
        let genome = Genome::new();
        let written = genome.write_block();
        let commented = format!("# header comment\n{written}");
        let reread = Genome::parse(&commented).unwrap();
        assert_eq!(reread.write_block(), written);
    }
}
