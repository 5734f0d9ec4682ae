use std::any::Any;

use galapagos_core::board::{Board, Color};
use rand::RngCore;

use super::{laplace, parse_number, Gene, GenomeError, PieceValues, PropertyMap};

const DRAW_VALUE_KEY: &str = "Draw Value";

/// The score a drawn leaf is worth to the player running the search.
///
/// A positive value makes the engine steer toward draws, a negative one
/// away from them. The offset is added by the search where it scores a
/// drawn node; the gene contributes nothing to ordinary positions.
#[derive(Debug, Clone, Default)]
pub struct DrawValueGene {
    value_of_draw: f64,
}

impl DrawValueGene {
    pub fn draw_value(&self) -> f64 {
        self.value_of_draw
    }
}

impl Gene for DrawValueGene {
    fn name(&self) -> &'static str {
        "Draw Value Gene"
    }

    fn score_board(&self, _: &Board, _: Color, _: u32, _: &PieceValues) -> f64 {
        0.0
    }

    fn write_gene_properties(&self, props: &mut PropertyMap) {
        props.insert(DRAW_VALUE_KEY.to_owned(), self.value_of_draw.to_string());
    }

    fn load_gene_properties(&mut self, props: &PropertyMap) -> Result<(), GenomeError> {
        self.value_of_draw = parse_number(self.name(), DRAW_VALUE_KEY, props)?;
        Ok(())
    }

    fn gene_property_count(&self) -> usize {
        1
    }

    fn mutate_gene(&mut self, rng: &mut dyn RngCore) {
        self.value_of_draw += laplace(rng, 0.03);
    }

    fn boxed_clone(&self) -> Box<dyn Gene> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
