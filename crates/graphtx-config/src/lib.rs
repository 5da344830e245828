//! Configuration for the graphtx client
//!
//! Loads [`ClientConfig`] from a TOML or JSON file, applies `GRAPHTX_*`
//! environment overrides and validates the result.

pub mod config;
pub mod error;
pub mod loader;

pub use config::{ClientConfig, ClientConfigBuilder, Credentials};
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
