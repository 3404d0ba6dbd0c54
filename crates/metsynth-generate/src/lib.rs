//! Synthetic table generation for metsynth.
//!
//! The [`Synthesizer`] trait is the seam the pipeline drives; the bundled
//! [`ResamplingSynthesizer`] is a seeded bootstrap model. Sampled tables can
//! be snapshotted to CSV or JSON before reconciliation.

pub mod errors;
pub mod model;
pub mod output;
pub mod resample;
pub mod synthesizer;

pub use errors::GenerationError;
pub use model::{DEFAULT_ROWS, SampleOptions, TableReport};
pub use output::{write_snapshot, write_snapshots};
pub use resample::ResamplingSynthesizer;
pub use synthesizer::Synthesizer;
