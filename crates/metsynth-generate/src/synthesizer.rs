use metsynth_core::{Dataset, RelationshipGraph};

use crate::errors::GenerationError;
use crate::model::SampleOptions;

/// Generative model collaborator.
///
/// Implementations learn from the source tables and return independently
/// sampled tables sharing their schema. Identifiers may be reissued and
/// cross-table references are not guaranteed to resolve; callers reconcile
/// the output before using it.
pub trait Synthesizer {
    /// Learn from reconciled source tables.
    fn fit(&mut self, data: &Dataset, graph: &RelationshipGraph) -> Result<(), GenerationError>;

    /// Draw a synthetic dataset. Fails with [`GenerationError::NotFitted`] before `fit`.
    fn sample(&self, options: &SampleOptions) -> Result<Dataset, GenerationError>;
}
