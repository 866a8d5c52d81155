use anyhow::Result;
use clap::ArgMatches;
use colored::Colorize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::core::optimizer::export::{export_effects, load_effects};
use crate::core::optimizer::{Engine, EngineRuntime};
use crate::core::Config;
use crate::ui::{dimmed, format_effect, info, report_failure, success, warn};

/// How often the foreground loop checks for a new tick or Ctrl+C
const POLL_INTERVAL: Duration = Duration::from_millis(250);

pub fn execute(matches: &ArgMatches, dry_run: bool) -> Result<()> {
    let mut config = Config::load()?;
    let top = matches.get_one::<usize>("top").copied().unwrap_or(10);
    let revert_on_exit = matches.get_flag("revert-on-exit");

    let engine = super::build_engine(&config, dry_run);

    let effects_path = Config::get_effects_path()?;
    match load_effects(&effects_path) {
        Ok(history) if !history.is_empty() => {
            log::debug!("Loaded {} effect(s) from previous sessions", history.len());
            engine.restore_effects(history);
        }
        Ok(_) => {}
        Err(e) => warn(&format!("Ignoring effects history: {}", e)),
    }

    engine.sample_tick()?;

    let profile = matches
        .get_one::<String>("profile")
        .cloned()
        .or_else(|| config.last_profile.clone());
    if let Some(name) = profile {
        match engine.apply_profile(&name) {
            Ok(report) => {
                super::profile::print_report(&report);
                config.last_profile = Some(report.profile.name.clone());
                config.governor_enabled = report.profile.governor_enabled;
            }
            Err(e) => report_failure(&format!("Profile {}", name), &e),
        }
    }

    for gap in engine.capability_gaps() {
        dimmed(&format!("Not available on this system: {}", gap));
    }
    if dry_run {
        println!("{}", "DRY RUN MODE - No process will be modified".yellow().bold());
    }

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = running.clone();
    ctrlc::set_handler(move || {
        println!();
        println!("{}", "Stopping...".yellow().bold());
        running_clone.store(false, Ordering::Relaxed);
    })
    .map_err(|e| anyhow::anyhow!("Failed to set Ctrl+C handler: {}", e))?;

    let mut runtime = EngineRuntime::start(Arc::clone(&engine), config.cadence())?;
    info(&format!(
        "corewarden running (refresh {}s, governor {}). Press Ctrl+C to stop.",
        config.refresh_secs,
        if engine.governor_enabled() { "on" } else { "off" }
    ));

    let mut shown_effects = engine.effects_history().len();
    while running.load(Ordering::Relaxed) {
        thread::sleep(POLL_INTERVAL);

        if !runtime.snapshot_rx.has_changed().unwrap_or(false) {
            continue;
        }
        let set = runtime.snapshot_rx.borrow_and_update().clone();
        println!();
        super::snapshot::print_table(&engine, &set, top);

        let history = engine.effects_history();
        // History is capped, so it can shrink past what was already shown
        let start = shown_effects.min(history.len());
        for sample in &history[start..] {
            println!("  {}", format_effect(sample));
        }
        shown_effects = history.len();
    }

    runtime.shutdown();
    finish(&engine, &mut config, revert_on_exit, dry_run)
}

fn finish(
    engine: &Engine,
    config: &mut Config,
    revert_on_exit: bool,
    dry_run: bool,
) -> Result<()> {
    if revert_on_exit {
        let results = engine.revert_all();
        let mut restored = 0;
        for (pid, result) in &results {
            match result {
                Ok(_) => restored += 1,
                Err(e) => report_failure(&format!("Revert PID {}", pid), e),
            }
        }
        if !results.is_empty() {
            success(&format!("✓ Restored {} process(es)", restored));
        }
    }

    let effects_path = Config::get_effects_path()?;
    if let Err(e) = export_effects(&effects_path, &engine.effects_history()) {
        warn(&format!("Could not save effects history: {}", e));
    }
    if let Err(e) = super::persist_journal(engine, dry_run) {
        warn(&format!("Could not save revert journal: {}", e));
    }

    config.governor_enabled = engine.governor_enabled();
    config.policy = engine.policy();
    config.rules = engine.rules();
    config.save()?;
    Ok(())
}
