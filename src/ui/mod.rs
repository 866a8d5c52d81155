// UI and formatting module

pub mod formatters;
pub mod prompts;

// Re-export commonly used items for cleaner imports
pub use formatters::{
    format_cpu, format_effect, format_health, format_role, format_size, format_size_delta,
    format_time, truncate_name,
};
pub use prompts::{confirm_destructive, dimmed, error, info, report_failure, success, warn};
