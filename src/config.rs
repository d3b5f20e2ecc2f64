//! Deployment configuration.
//!
//! Project, region, and bucket are required configuration, read from the
//! environment. Credentials are resolved separately by the capability and
//! store builders and have no defaults.

use crate::error::{Result, StageError};

/// Environment variable naming the GCP project.
pub const PROJECT_VAR: &str = "ROOMSTAGE_PROJECT";
/// Environment variable naming the GCP region.
pub const LOCATION_VAR: &str = "ROOMSTAGE_LOCATION";
/// Environment variable naming the GCS bucket for uploads and outputs.
pub const BUCKET_VAR: &str = "ROOMSTAGE_BUCKET";

/// Deployment target identifiers for the staging backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageConfig {
    /// GCP project hosting the model endpoints.
    pub project: String,
    /// GCP region, e.g. `us-central1`.
    pub location: String,
    /// GCS bucket persisting uploads and staged outputs.
    pub bucket: String,
}

impl StageConfig {
    /// Reads configuration from the environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Reads configuration through a lookup function.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let require = |var: &str| {
            lookup(var)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| StageError::Config(format!("{var} is not set")))
        };

        Ok(Self {
            project: require(PROJECT_VAR)?,
            location: require(LOCATION_VAR)?,
            bucket: require(BUCKET_VAR)?,
        })
    }
}
