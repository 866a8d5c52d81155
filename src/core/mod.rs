// Core business logic module

pub mod config;
pub mod optimizer;

// Re-export commonly used items
pub use config::Config;
