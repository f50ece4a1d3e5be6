//! Basic cleaning step of a versioned-artifact data pipeline.
//!
//! A raw listings snapshot is fetched from an artifact registry, checked for
//! the columns the step needs, filtered by price, given canonical review
//! dates, restricted to a bounding box, and published as a new version with
//! lineage back to its input.

pub mod artifact;
pub mod cleaning;
pub mod config;
pub mod constants;
pub mod dataset;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod packager;
pub mod run_state;
pub mod session;

pub mod gateway;

// Layered boundaries: application use cases and infrastructure adapters
pub mod app;
pub mod infra;

pub use app::basic_cleaning_use_case::{BasicCleaningUseCase, RunReport};
pub use app::ports::ArtifactRegistry;
pub use error::{CleaningError, ErrorKind, Result};
pub use infra::local_registry::LocalRegistry;
