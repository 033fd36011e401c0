//! Configuration module for Sociograph
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use sociograph::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("sociograph.toml")).unwrap();
//! println!("Quota cool-down: {:?}", config.crawler.cooldown());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{ApiConfig, Config, CrawlerConfig, CredentialsConfig, OutputConfig, SeedConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::{validate_screen_name, MAX_LOOKUP_BATCH, MAX_TIMELINE_PAGE};
