//! Configuration module for Seedline
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use seedline::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("seedline.toml")).unwrap();
//! println!("Fetching {} seeds", config.pipeline.seeds.len());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, FetchConfig, OutputConfig, PipelineConfig, PolicyConfig, TriggerConfig,
    UserAgentConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
