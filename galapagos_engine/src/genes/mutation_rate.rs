use std::any::Any;

use galapagos_core::board::{Board, Color};
use rand::RngCore;

use super::{laplace, parse_number, unit, Gene, GenomeError, PieceValues, PropertyMap};

const MUTATION_RATE_KEY: &str = "Mutation Rate";

/// Controls how many point mutations a genome receives per generation.
/// The rate itself evolves.
#[derive(Debug, Clone)]
pub struct MutationRateGene {
    mutations_per_generation: f64,
}

impl Default for MutationRateGene {
    fn default() -> Self {
        Self {
            mutations_per_generation: 10.0,
        }
    }
}

impl MutationRateGene {
    /// The number of point mutations to apply. The fractional part of the
    /// rate becomes the probability of one extra mutation.
    pub fn mutation_count(&self, rng: &mut dyn RngCore) -> usize {
        (self.mutations_per_generation + unit(rng)) as usize
    }
}

impl Gene for MutationRateGene {
    fn name(&self) -> &'static str {
        "Mutation Rate Gene"
    }

    fn score_board(&self, _: &Board, _: Color, _: u32, _: &PieceValues) -> f64 {
        0.0
    }

    fn write_gene_properties(&self, props: &mut PropertyMap) {
        props.insert(
            MUTATION_RATE_KEY.to_owned(),
            self.mutations_per_generation.to_string(),
        );
    }

    fn load_gene_properties(&mut self, props: &PropertyMap) -> Result<(), GenomeError> {
        self.mutations_per_generation = parse_number(self.name(), MUTATION_RATE_KEY, props)?.abs();
        Ok(())
    }

    fn gene_property_count(&self) -> usize {
        1
    }

    fn mutate_gene(&mut self, rng: &mut dyn RngCore) {
        self.mutations_per_generation = (self.mutations_per_generation + laplace(rng, 1.0)).abs();
    }

    fn boxed_clone(&self) -> Box<dyn Gene> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
