//! Durable per-part, per-step state.

pub mod metadata;
pub mod store;
pub mod types;

pub use metadata::Metadata;
pub use store::{StateStore, StoreError};
pub use types::{ArtifactSet, ProjectRecord, StepState};
