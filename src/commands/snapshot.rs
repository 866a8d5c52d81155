use anyhow::Result;
use clap::ArgMatches;
use colored::Colorize;
use std::path::Path;

use crate::core::optimizer::export::{export_snapshot, SnapshotExport};
use crate::core::optimizer::{Engine, SnapshotSet};
use crate::core::Config;
use crate::ui::{format_cpu, format_health, format_role, format_size, success, truncate_name};

pub fn execute(matches: &ArgMatches, dry_run: bool) -> Result<()> {
    let config = Config::load()?;
    let engine = super::build_engine(&config, dry_run);
    let set = super::warm_up(&engine)?;

    let top = matches.get_one::<usize>("top").copied().unwrap_or(15);
    print_table(&engine, &set, top);

    if let Some(path) = matches.get_one::<String>("json") {
        let export = SnapshotExport::from_set(&set, |pid| engine.health_flags(pid).primary());
        export_snapshot(Path::new(path), &export)?;
        success(&format!("✓ Snapshot written to {}", path));
    }

    Ok(())
}

/// Print the heaviest processes by CPU, then memory
pub fn print_table(engine: &Engine, set: &SnapshotSet, top: usize) {
    let mut rows: Vec<_> = set.iter().collect();
    rows.sort_by(|a, b| {
        b.cpu_percent
            .total_cmp(&a.cpu_percent)
            .then(b.resident_bytes.cmp(&a.resident_bytes))
    });

    println!(
        "{}",
        format!(
            "{:<8} {:<28} {:>6} {:>10} {:<3} {:<6}",
            "PID", "NAME", "CPU", "MEM", "", "HEALTH"
        )
        .bold()
    );
    for p in rows.into_iter().take(top) {
        let mut line = format!(
            "{:<8} {:<28} {} {:>10} {:<3} {:<6}",
            p.pid,
            truncate_name(&p.name, 28),
            format_cpu(p.cpu_percent),
            format_size(p.resident_bytes),
            format_role(p.role),
            format_health(engine.health_flags(p.pid).primary()),
        );
        if engine.has_revert(p.pid) {
            line.push_str(&format!(" {}", "(modified)".yellow()));
        }
        if p.degraded {
            line.push_str(&format!(" {}", "(limited)".dimmed()));
        }
        println!("{}", line);
    }

    println!(
        "{}",
        format!("{} processes, tick {}", set.len(), set.tick).dimmed()
    );
}
