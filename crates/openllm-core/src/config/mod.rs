//! Configuration system — schema, loading, and env var overrides.
//!
//! # Usage
//! ```no_run
//! use openllm_core::config;
//!
//! let cfg = config::load_config(None).expect("config");
//! println!("Endpoint: {}", cfg.base_url);
//! ```

pub mod loader;
pub mod schema;

// Re-export key types
pub use loader::{get_config_path, load_config, save_config};
pub use schema::{AuthMode, BusyPolicy, Config, ModelConfig};
