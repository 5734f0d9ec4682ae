use std::any::Any;

use galapagos_core::board::{Board, Color, Piece, PieceType};
use rand::RngCore;

use super::{laplace, parse_number, random_index, Gene, GenomeError, PropertyMap};

/// The six piece strengths a genome shares between its material-sensitive
/// genes.
#[derive(Debug, Clone, PartialEq)]
pub struct PieceValues {
    values: [f64; 6],
    normalizer: f64,
}

impl Default for PieceValues {
    fn default() -> Self {
        let mut values = Self {
            values: [100.0; 6],
            normalizer: 0.0,
        };
        values.recalculate_normalizer();
        values
    }
}

impl PieceValues {
    pub fn value(&self, piece_type: PieceType) -> f64 {
        self.values[piece_type.index()]
    }

    pub fn value_of(&self, piece: Piece) -> f64 {
        self.value(piece.piece_type())
    }

    /// The strength of a full army, used to keep material scores in a
    /// stable range however the values themselves evolve.
    pub fn normalizer(&self) -> f64 {
        self.normalizer
    }

    fn set(&mut self, piece_type: PieceType, value: f64) {
        self.values[piece_type.index()] = value;
        self.recalculate_normalizer();
    }

    fn recalculate_normalizer(&mut self) {
        let v = |t: PieceType| self.value(t).abs();
        self.normalizer = 8.0 * v(PieceType::Pawn)
            + 2.0 * v(PieceType::Rook)
            + 2.0 * v(PieceType::Knight)
            + 2.0 * v(PieceType::Bishop)
            + v(PieceType::Queen)
            + v(PieceType::King);
        if self.normalizer == 0.0 {
            self.normalizer = 1.0;
        }
    }
}

/// Holds the piece values. Scores nothing itself; other genes read the
/// values through the genome.
#[derive(Debug, Clone, Default)]
pub struct PieceStrengthGene {
    values: PieceValues,
}

impl PieceStrengthGene {
    pub fn values(&self) -> &PieceValues {
        &self.values
    }
}

impl Gene for PieceStrengthGene {
    fn name(&self) -> &'static str {
        "Piece Strength Gene"
    }

    fn score_board(&self, _: &Board, _: Color, _: u32, _: &PieceValues) -> f64 {
        0.0
    }

    fn write_gene_properties(&self, props: &mut PropertyMap) {
        for piece_type in PieceType::ALL {
            props.insert(
                piece_type.as_uppercase_char().to_string(),
                self.values.value(piece_type).to_string(),
            );
        }
    }

    fn load_gene_properties(&mut self, props: &PropertyMap) -> Result<(), GenomeError> {
        for piece_type in PieceType::ALL {
            let key = piece_type.as_uppercase_char().to_string();
            let value = parse_number(self.name(), &key, props)?;
            self.values.set(piece_type, value);
        }
        Ok(())
    }

    fn gene_property_count(&self) -> usize {
        6
    }

    fn mutate_gene(&mut self, rng: &mut dyn RngCore) {
        let piece_type = PieceType::ALL[random_index(rng, 6)];
        let value = self.values.value(piece_type) + laplace(rng, 1.0);
        self.values.set(piece_type, value);
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
    use crate::genes::test_support;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_values_round_trip_through_properties() {
        let mut gene = PieceStrengthGene::default();
        let props = gene.properties();
        assert_eq!(props.len(), 6);
        assert_eq!(props["Q"], "100");

        gene.load_properties(&props).unwrap();
        assert_eq!(gene.properties(), props);
    }

    #[test]
    fn normalizer_tracks_mutations() {
        let mut gene = PieceStrengthGene::default();
        let before = gene.values().normalizer();
        assert_eq!(before, 1600.0);

        let mut rng = test_support::rng();
        for _ in 0..10 {
            gene.mutate_gene(&mut rng);
        }
        let expected = 8.0 * gene.values().value(PieceType::Pawn).abs()
            + 2.0 * gene.values().value(PieceType::Rook).abs()
            + 2.0 * gene.values().value(PieceType::Knight).abs()
            + 2.0 * gene.values().value(PieceType::Bishop).abs()
            + gene.values().value(PieceType::Queen).abs()
            + gene.values().value(PieceType::King).abs();
        assert_eq!(gene.values().normalizer(), expected);
    }

    #[test]
    fn has_no_profile() {
        let gene = PieceStrengthGene::default();
        assert!(gene.profile().is_none());
        assert_eq!(gene.mutatable_component_count(), 6);
    }
}
