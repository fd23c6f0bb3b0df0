// Service exports
pub mod artifact_store;

pub use artifact_store::{ArtifactStore, BundleChecksums, BundleManifest};
