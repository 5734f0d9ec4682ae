use std::any::Any;

use galapagos_core::board::{Board, Color};

use super::{Gene, GeneProfile, PieceValues};

/// Scores zero always. A slot evolution can repurpose priorities into and
/// out of without changing behavior.
#[derive(Debug, Clone, Default)]
pub struct NullGene {
    profile: GeneProfile,
}

impl Gene for NullGene {
    fn name(&self) -> &'static str {
        "Null Gene"
    }

    fn profile(&self) -> Option<&GeneProfile> {
        Some(&self.profile)
    }

    fn profile_mut(&mut self) -> Option<&mut GeneProfile> {
        Some(&mut self.profile)
    }

    fn score_board(&self, _: &Board, _: Color, _: u32, _: &PieceValues) -> f64 {
        0.0
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
    fn always_zero() {
        let gene = NullGene::default();
        let board = Board::starting_position();
        let values = PieceValues::default();
        assert_eq!(gene.evaluate(&board, Color::White, 0, 0.5, &values), 0.0);
        assert_eq!(gene.mutatable_component_count(), 4);
    }
}
