use anyhow::{Context, Result};
use clap::ArgMatches;
use std::path::Path;

use crate::core::optimizer::export::{export_effects, load_effects};
use crate::core::Config;
use crate::ui::{dimmed, format_effect, info, success};

/// Show (and optionally export) the effects history kept by `run`
pub fn execute(matches: &ArgMatches) -> Result<()> {
    let path = Config::get_effects_path()?;
    let history = load_effects(&path)
        .with_context(|| format!("Failed to read effects history: {:?}", path))?;

    if history.is_empty() {
        dimmed("No effects recorded yet. Effects are measured while 'corewarden run' is active");
        return Ok(());
    }

    let limit = matches.get_one::<usize>("last").copied().unwrap_or(20);
    info(&format!(
        "Effects history ({} of {}):",
        limit.min(history.len()),
        history.len()
    ));
    let skip = history.len().saturating_sub(limit);
    for sample in history.iter().skip(skip) {
        println!("  {}", format_effect(sample));
    }

    if let Some(target) = matches.get_one::<String>("export") {
        export_effects(Path::new(target), &history)?;
        success(&format!("✓ Exported {} effect(s) to {}", history.len(), target));
    }

    Ok(())
}
