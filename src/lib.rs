//! gantry - container build pipeline for Python WSGI services
//!
//! Models a small catalog of container build strategies for a Flask or
//! gunicorn application as typed build plans, renders them to Dockerfiles,
//! validates the invariants each strategy promises (lean runtime stages,
//! consistent port wiring, a single entry point) and can execute and verify
//! builds against a local Docker daemon.

pub mod cli;
pub mod config;
pub mod docker;
pub mod dockerfile;
pub mod manifest;
pub mod plan;
pub mod render;
pub mod util;
pub mod validation;

pub use config::{ConfigError, GantryConfig};
pub use manifest::{Manifest, ManifestError, Requirement};
pub use plan::{AppSpec, BuildPlan, Variant};
pub use validation::{Finding, Validator};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_not_empty() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_name() {
        assert_eq!(NAME, "gantry");
    }
}
