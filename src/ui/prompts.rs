// UI prompts and user interaction module

use colored::Colorize;
use dialoguer::Confirm;

use crate::error::WardenError;
use crate::platform::elevation_hint;

/// Ask before an irreversible action; `assume_yes` skips the prompt
pub fn confirm_destructive(prompt: &str, assume_yes: bool) -> anyhow::Result<bool> {
    if assume_yes {
        return Ok(true);
    }
    Ok(Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()?)
}

/// Display a warning message
pub fn warn(message: &str) {
    println!("{}", format!("⚠️  Warning: {}", message).yellow().bold());
}

/// Display an info message
pub fn info(message: &str) {
    println!("{}", message.cyan());
}

/// Display a success message
pub fn success(message: &str) {
    println!("{}", message.green().bold());
}

/// Display an error message
pub fn error(message: &str) {
    println!("{}", message.red().bold());
}

/// Display a dimmed/secondary message
pub fn dimmed(message: &str) {
    println!("{}", message.dimmed());
}

/// Print an action failure, with an elevation hint when privileges were missing
pub fn report_failure(context: &str, err: &WardenError) {
    error(&format!("✗ {}: {}", context, err));
    if matches!(err, WardenError::PermissionDenied(_)) {
        if let Some(hint) = elevation_hint() {
            dimmed(&format!("  {}", hint));
        }
    }
}
