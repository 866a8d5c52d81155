// Command handlers module
pub mod advise;
pub mod apply;
pub mod completions;
pub mod effects;
pub mod policy;
pub mod profile;
pub mod revert;
pub mod rules;
pub mod run;
pub mod snapshot;
pub mod version;

use anyhow::Result;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::core::optimizer::export::{load_journal, save_journal};
use crate::core::optimizer::{Engine, SnapshotSet};
use crate::core::Config;
use crate::platform::native_providers;

// Re-exports for cleaner imports
pub use version::execute as version;

/// Gap between the two samples a one-shot command takes; CPU usage needs a delta
const WARM_UP_DELAY: Duration = Duration::from_millis(800);

/// Engine over the native providers, configured from the user config and
/// carrying the revert baselines of earlier invocations
pub fn build_engine(config: &Config, dry_run: bool) -> Arc<Engine> {
    let engine = Arc::new(Engine::new(
        native_providers(dry_run),
        config.engine_settings(),
    ));

    let loaded = Config::get_journal_path().and_then(|path| Ok(load_journal(&path)?));
    match loaded {
        Ok(records) if !records.is_empty() => {
            let adopted = engine.restore_journal(records);
            log::debug!("Adopted {} revert record(s) from earlier runs", adopted);
        }
        Ok(_) => {}
        Err(e) => log::warn!("Ignoring revert journal: {}", e),
    }
    engine
}

/// Write the revert baselines back so a later `corewarden revert` finds them.
///
/// Dry runs only simulate changes, so they leave the saved journal alone.
pub fn persist_journal(engine: &Engine, dry_run: bool) -> Result<()> {
    if dry_run {
        return Ok(());
    }
    let path = Config::get_journal_path()?;
    save_journal(&path, &engine.journal_records())?;
    Ok(())
}

/// Take two samples so CPU percentages are meaningful
pub fn warm_up(engine: &Engine) -> Result<Arc<SnapshotSet>> {
    engine.sample_tick()?;
    thread::sleep(WARM_UP_DELAY);
    Ok(engine.sample_tick()?.unwrap_or_else(|| engine.snapshot()))
}
