//! Configuration module
//!
//! This module handles loading and validating runtime configuration from
//! environment variables. A `.env` file in the working directory is honored
//! when present.
//!
//! # Example
//!
//! ```no_run
//! use njuskalo_tracker::config::load_config;
//!
//! let config = load_config().unwrap();
//! println!("Target category: {}", config.target_category_id);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::Config;

// Re-export parser functions
pub use parser::load_config;
pub use validation::validate;
