//! Configuration for discarr.
//!
//! Values are layered: explicit loader options, then environment variables
//! (after an optional `.env` is applied), then `discarr.toml`, then the
//! built-in defaults in [`constants`]. Guard rails run as part of loading so
//! a returned [`Config`] is always usable.

pub mod constants;
pub mod loader;
pub mod models;
pub mod util;
pub mod validation;

pub use loader::{
    ConfigLoad, ConfigLoader, ConfigLoaderOptions, error::ConfigLoadError,
};
pub use models::sources::{EnvConfig, FileConfig};
pub use models::{
    Config, ConfigMetadata, MetadataSweepConfig, ServiceConfig,
    StallThresholds, TransmissionConfig,
};
pub use validation::{
    ConfigGuardRailError, ConfigWarning, ConfigWarnings,
    validate_metadata_sweep,
};
