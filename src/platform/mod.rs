// Platform-specific code module

pub mod elevation;
pub mod process;

pub use elevation::{elevation_hint, is_elevated};
pub use process::native_providers;
