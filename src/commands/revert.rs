use anyhow::Result;
use clap::ArgMatches;
use colored::Colorize;

use crate::core::optimizer::{Engine, RevertReport};
use crate::core::Config;
use crate::error::{Result as WardenResult, WardenError};
use crate::ui::{dimmed, info, report_failure, success};

pub fn execute(matches: &ArgMatches, dry_run: bool) -> Result<()> {
    let config = Config::load()?;
    let engine = super::build_engine(&config, dry_run);

    if matches.get_flag("all") {
        let results = engine.revert_all();
        if results.is_empty() {
            dimmed("Nothing to revert");
        }
        for (pid, result) in &results {
            print_revert(*pid, result);
        }
    } else if let Some(pid) = matches.get_one::<u32>("pid") {
        print_revert(*pid, &engine.revert(*pid));
    } else {
        list(&engine);
        return Ok(());
    }

    super::persist_journal(&engine, dry_run)
}

fn list(engine: &Engine) {
    let records = engine.journal_records();
    if records.is_empty() {
        dimmed("No modified processes on record");
        return;
    }

    info("Modified processes:");
    for record in records {
        let originals: Vec<String> = record
            .originals
            .iter()
            .map(|(attribute, value)| format!("{} {}", attribute, value))
            .collect();
        println!(
            "  PID {:<7} {} {}",
            record.pid,
            "was".dimmed(),
            originals.join(", ")
        );
    }
    dimmed("Use 'corewarden revert <PID>' or 'corewarden revert --all' to restore");
}

pub fn print_revert(pid: u32, result: &WardenResult<RevertReport>) {
    match result {
        Ok(report) => {
            let restored: Vec<String> = report.restored.iter().map(|v| v.to_string()).collect();
            success(&format!("✓ Restored PID {}: {}", pid, restored.join(", ")));
        }
        Err(WardenError::NothingToRevert(_)) => {
            dimmed(&format!("Nothing to revert for PID {}", pid));
        }
        Err(e) => report_failure(&format!("Revert PID {}", pid), e),
    }
}
