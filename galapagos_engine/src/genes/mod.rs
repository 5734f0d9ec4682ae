//! The evaluation genes: named, mutable scoring and policy terms that a
//! genome strings together.
//!
//! Every gene carries a name, optionally a [`GeneProfile`] (an
//! opening/endgame priority pair plus an activation window over game
//! progress), and its own scalar parameters. Parameters are written to and
//! read from genome files as `key: value` lines and are the units of point
//! mutation.

mod draw_value;
mod king;
mod look_ahead;
mod material;
mod mobility;
mod move_sorting;
mod mutation_rate;
mod null;
mod opening_move;
mod pawns;
mod piece_strength;

pub use draw_value::DrawValueGene;
pub use king::{CastlingPossibleGene, KingConfinementGene, KingProtectionGene};
pub use look_ahead::{LookAheadGene, SearchMethod};
pub use material::{CheckmateMaterialGene, OpponentPiecesTargetedGene, TotalForceGene};
pub use mobility::{FreedomToMoveGene, SphereOfInfluenceGene};
pub use move_sorting::MoveSortingGene;
pub use mutation_rate::MutationRateGene;
pub use null::NullGene;
pub use opening_move::OpeningMoveGene;
pub use pawns::{
    PassedPawnGene, PawnAdvancementGene, PawnIslandsGene, PawnStructureGene, StackedPawnsGene,
};
pub use piece_strength::{PieceStrengthGene, PieceValues};

use std::{any::Any, collections::BTreeMap};

use galapagos_core::board::{Board, Color};
use rand::RngCore;
use thiserror::Error;

/// Gene parameters as they appear in a genome file. A `BTreeMap` keeps the
/// write order deterministic so re-writing a file reproduces it byte for
/// byte.
pub type PropertyMap = BTreeMap<String, String>;

/// Errors from reading genome data. The three malformed-data cases
/// (missing, duplicated, unparseable) are distinguished, and every variant
/// names the gene at fault.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenomeError {
    #[error("{gene}: missing parameter {key:?}")]
    MissingKey { gene: String, key: String },
    #[error("{gene}: duplicate parameter in line {line:?}")]
    DuplicateKey { gene: String, line: String },
    #[error("{gene}: value {value:?} for {key:?} is not usable")]
    BadValue {
        gene: String,
        key: String,
        value: String,
    },
    #[error("{gene}: unrecognized parameter {key:?}")]
    UnknownKey { gene: String, key: String },
    #[error("unrecognized gene name {name:?}")]
    UnknownGene { name: String },
    #[error("bad line in genome data: {line:?}")]
    BadLine { line: String },
    #[error("genome data ended before END")]
    MissingEnd,
}

pub const PRIORITY_OPENING_KEY: &str = "Priority - Opening";
pub const PRIORITY_ENDGAME_KEY: &str = "Priority - Endgame";
pub const ACTIVATION_BEGIN_KEY: &str = "Activation Begin";
pub const ACTIVATION_END_KEY: &str = "Activation End";

/// Mutating an activation bound clamps it slightly outside [0, 1] so a
/// gene can stay comfortably on (or off) for the very first and last
/// moves instead of flickering at the ends of the range.
const ACTIVATION_MARGIN: f64 = 0.05;

/// The priority and activation data shared by scoring genes.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneProfile {
    pub opening_priority: f64,
    pub endgame_priority: f64,
    pub activation_begin: f64,
    pub activation_end: f64,
}

impl Default for GeneProfile {
    fn default() -> Self {
        Self {
            opening_priority: 1.0,
            endgame_priority: 1.0,
            activation_begin: 0.0,
            activation_end: 1.0,
        }
    }
}

impl GeneProfile {
    /// Whether the gene contributes at this game progress.
    pub fn is_active(&self, progress: f64) -> bool {
        self.activation_begin <= progress && progress <= self.activation_end
    }

    /// The priority weight, linearly interpolated by game progress.
    pub fn priority(&self, progress: f64) -> f64 {
        self.opening_priority + (self.endgame_priority - self.opening_priority) * progress
    }

    fn write(&self, props: &mut PropertyMap) {
        props.insert(PRIORITY_OPENING_KEY.to_owned(), self.opening_priority.to_string());
        props.insert(PRIORITY_ENDGAME_KEY.to_owned(), self.endgame_priority.to_string());
        props.insert(ACTIVATION_BEGIN_KEY.to_owned(), self.activation_begin.to_string());
        props.insert(ACTIVATION_END_KEY.to_owned(), self.activation_end.to_string());
    }

    fn load(&mut self, gene: &str, props: &PropertyMap) -> Result<(), GenomeError> {
        self.opening_priority = parse_number(gene, PRIORITY_OPENING_KEY, props)?;
        self.endgame_priority = parse_number(gene, PRIORITY_ENDGAME_KEY, props)?;
        self.activation_begin = parse_number(gene, ACTIVATION_BEGIN_KEY, props)?;
        self.activation_end = parse_number(gene, ACTIVATION_END_KEY, props)?;
        Ok(())
    }

    fn mutate_priority(&mut self, rng: &mut dyn RngCore) {
        let bump = laplace(rng, 0.1);
        if coin_flip(rng) {
            self.opening_priority += bump;
        } else {
            self.endgame_priority += bump;
        }
    }

    fn mutate_activation(&mut self, rng: &mut dyn RngCore) {
        let lower = 0.0 - ACTIVATION_MARGIN;
        let upper = 1.0 + ACTIVATION_MARGIN;

        if coin_flip(rng) {
            self.activation_begin =
                (self.activation_begin + laplace(rng, 0.05)).clamp(lower, upper);
            // Let the window invert by at most the margin, which shuts the
            // gene off firmly.
            self.activation_end = self
                .activation_end
                .clamp(self.activation_begin - ACTIVATION_MARGIN, upper);
        } else {
            self.activation_end = (self.activation_end + laplace(rng, 0.05)).clamp(lower, upper);
            self.activation_begin = self
                .activation_begin
                .clamp(lower, self.activation_end + ACTIVATION_MARGIN);
        }
    }
}

/// A single evaluation or policy term.
///
/// Implementors provide their raw board score and their own parameters;
/// the provided methods layer on the profile weighting, the property-map
/// round trip, and point mutation.
pub trait Gene: Send + Sync {
    /// The name written to and matched in genome files.
    fn name(&self) -> &'static str;

    /// The priority/activation profile; policy genes have none.
    fn profile(&self) -> Option<&GeneProfile> {
        None
    }

    fn profile_mut(&mut self) -> Option<&mut GeneProfile> {
        None
    }

    /// The raw positional score before priority weighting. `depth` is how
    /// many plies separate `board` from the position actually on the
    /// table; `values` are the genome's shared piece strengths.
    fn score_board(&self, board: &Board, perspective: Color, depth: u32, values: &PieceValues)
        -> f64;

    /// Gene-specific parameters beyond the profile.
    fn write_gene_properties(&self, _props: &mut PropertyMap) {}

    fn load_gene_properties(&mut self, _props: &PropertyMap) -> Result<(), GenomeError> {
        Ok(())
    }

    /// How many gene-specific scalars [`Gene::mutate_gene`] can touch.
    fn gene_property_count(&self) -> usize {
        0
    }

    /// Mutate one gene-specific scalar.
    fn mutate_gene(&mut self, _rng: &mut dyn RngCore) {}

    fn boxed_clone(&self) -> Box<dyn Gene>;

    fn as_any(&self) -> &dyn Any;

    /// The gene's weighted contribution: zero outside its activation
    /// window, otherwise the interpolated priority times the raw score.
    fn evaluate(
        &self,
        board: &Board,
        perspective: Color,
        depth: u32,
        progress: f64,
        values: &PieceValues,
    ) -> f64 {
        match self.profile() {
            Some(profile) if profile.is_active(progress) => {
                profile.priority(progress) * self.score_board(board, perspective, depth, values)
            }
            _ => 0.0,
        }
    }

    /// All parameters as they appear in a genome file.
    fn properties(&self) -> PropertyMap {
        let mut props = PropertyMap::new();
        if let Some(profile) = self.profile() {
            profile.write(&mut props);
        }
        self.write_gene_properties(&mut props);
        props
    }

    /// Load all parameters. The caller has already verified the key set
    /// matches [`Gene::properties`].
    fn load_properties(&mut self, props: &PropertyMap) -> Result<(), GenomeError> {
        let name = self.name();
        if let Some(profile) = self.profile_mut() {
            profile.load(name, props)?;
        }
        self.load_gene_properties(props)
    }

    /// Total mutable scalar count; genomes weight mutation targets by it.
    fn mutatable_component_count(&self) -> usize {
        let profile_components = if self.profile().is_some() { 4 } else { 0 };
        profile_components + self.gene_property_count()
    }

    /// Apply one point mutation, choosing uniformly across this gene's
    /// scalars (so priorities, activation bounds, and gene parameters are
    /// all drawn from the same pool).
    fn mutate(&mut self, rng: &mut dyn RngCore) {
        let total = self.mutatable_component_count();
        if total == 0 {
            return;
        }

        let profile_components = if self.profile().is_some() { 4 } else { 0 };
        let pick = random_index(rng, total);
        if pick < profile_components {
            let profile = self.profile_mut().expect("profile presence just checked");
            if pick < 2 {
                profile.mutate_priority(rng);
            } else {
                profile.mutate_activation(rng);
            }
        } else {
            self.mutate_gene(rng);
        }
    }
}

impl Clone for Box<dyn Gene> {
    fn clone(&self) -> Self {
        self.boxed_clone()
    }
}

/// A uniform draw from [0, 1).
pub(crate) fn unit(rng: &mut dyn RngCore) -> f64 {
    (rng.next_u64() >> 11) as f64 / (1u64 << 53) as f64
}

/// A draw from the Laplace distribution with the given scale: mutations
/// are usually small with occasional large jumps.
pub(crate) fn laplace(rng: &mut dyn RngCore, scale: f64) -> f64 {
    let u = unit(rng) - 0.5;
    -scale * u.signum() * (1.0 - 2.0 * u.abs()).max(f64::MIN_POSITIVE).ln()
}

pub(crate) fn coin_flip(rng: &mut dyn RngCore) -> bool {
    rng.next_u64() % 2 == 0
}

pub(crate) fn random_index(rng: &mut dyn RngCore, len: usize) -> usize {
    (rng.next_u64() % len as u64) as usize
}

/// Fetch and parse one numeric parameter.
pub(crate) fn parse_number(gene: &str, key: &str, props: &PropertyMap) -> Result<f64, GenomeError> {
    let value = props.get(key).ok_or_else(|| GenomeError::MissingKey {
        gene: gene.to_owned(),
        key: key.to_owned(),
    })?;
    value.parse().map_err(|_| GenomeError::BadValue {
        gene: gene.to_owned(),
        key: key.to_owned(),
        value: value.clone(),
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use rand::SeedableRng;

    pub fn rng() -> rand_chacha::ChaCha12Rng {
        rand_chacha::ChaCha12Rng::seed_from_u64(0x5eed)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn profile_interpolates_priorities() {
        let profile = GeneProfile {
            opening_priority: 2.0,
            endgame_priority: -1.0,
            activation_begin: 0.0,
            activation_end: 1.0,
        };
        assert_eq!(profile.priority(0.0), 2.0);
        assert_eq!(profile.priority(1.0), -1.0);
        assert_eq!(profile.priority(0.5), 0.5);
    }

    #[test]
    fn profile_activation_window() {
        let profile = GeneProfile {
            activation_begin: 0.25,
            activation_end: 0.75,
            ..GeneProfile::default()
        };
        assert!(!profile.is_active(0.1));
        assert!(profile.is_active(0.25));
        assert!(profile.is_active(0.5));
        assert!(!profile.is_active(0.9));
    }

    #[test]
    fn activation_mutations_stay_in_bounds() {
        let mut rng = test_support::rng();
        let mut profile = GeneProfile::default();
        for _ in 0..500 {
            profile.mutate_activation(&mut rng);
            assert!(profile.activation_begin >= -ACTIVATION_MARGIN - 1e-12);
            assert!(profile.activation_end <= 1.0 + ACTIVATION_MARGIN + 1e-12);
            assert!(profile.activation_end >= profile.activation_begin - ACTIVATION_MARGIN - 1e-12);
        }
    }

    #[test]
    fn laplace_is_centered_and_scaled() {
        let mut rng = test_support::rng();
        let samples: Vec<f64> = (0..20_000).map(|_| laplace(&mut rng, 0.5)).collect();
        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        assert!(mean.abs() < 0.02, "mean {mean}");

        let mean_abs = samples.iter().map(|x| x.abs()).sum::<f64>() / samples.len() as f64;
        // E|X| for Laplace(0, b) is b.
        assert!((mean_abs - 0.5).abs() < 0.05, "mean abs {mean_abs}");
    }

    #[test]
    fn parse_number_errors_name_the_gene() {
        let mut props = PropertyMap::new();
        props.insert("Key".into(), "oops".into());

        assert_eq!(
            parse_number("Some Gene", "Key", &props),
            Err(GenomeError::BadValue {
                gene: "Some Gene".into(),
                key: "Key".into(),
                value: "oops".into(),
            })
        );
        assert_eq!(
            parse_number("Some Gene", "Other", &props),
            Err(GenomeError::MissingKey {
                gene: "Some Gene".into(),
                key: "Other".into(),
            })
        );
    }
}
