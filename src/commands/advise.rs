use anyhow::{bail, Result};
use clap::ArgMatches;
use colored::Colorize;

use crate::core::optimizer::{ActionReport, Suggestion};
use crate::core::Config;
use crate::error::Result as WardenResult;
use crate::ui::{dimmed, info, report_failure, success, truncate_name};

pub fn execute(matches: &ArgMatches, dry_run: bool) -> Result<()> {
    let config = Config::load()?;
    let engine = super::build_engine(&config, dry_run);
    super::warm_up(&engine)?;

    let advice = engine.advise();
    if advice.is_empty() {
        success("✓ Nothing to suggest right now");
        return Ok(());
    }

    let flat: Vec<&Suggestion> = advice.values().flatten().collect();
    println!(
        "{}",
        format!("{:>3}  {:<8} {:<24} {:<16} {}", "#", "PID", "NAME", "ACTION", "REASON").bold()
    );
    for (i, s) in flat.iter().enumerate() {
        let marker = if s.action.is_safe() { " " } else { "!" };
        println!(
            "{:>3}{} {:<8} {:<24} {:<16} {}",
            i + 1,
            marker,
            s.pid,
            truncate_name(&s.name, 24),
            s.action.to_string(),
            s.reason.to_string().dimmed()
        );
    }

    let results = if matches.get_flag("apply-safe") {
        info("Applying all safe suggestions...");
        engine.apply_all_safe(&advice)
    } else if let Some(list) = matches.get_one::<String>("apply") {
        let indices = parse_selection(list, flat.len())?;
        let selection: Vec<Suggestion> = indices.into_iter().map(|i| flat[i].clone()).collect();
        engine.apply_suggestions(&selection)
    } else {
        dimmed("Use --apply-safe or --apply <N,M,...> to act on these suggestions");
        return Ok(());
    };

    print_results(&results);
    super::persist_journal(&engine, dry_run)
}

fn print_results(results: &[(Suggestion, WardenResult<ActionReport>)]) {
    for (s, result) in results {
        match result {
            Ok(report) if report.changed => success(&format!(
                "✓ {} on {} (PID {})",
                s.action, s.name, s.pid
            )),
            Ok(_) => dimmed(&format!(
                "= {} on {} (PID {}) already in effect",
                s.action, s.name, s.pid
            )),
            Err(e) => report_failure(&format!("{} on {} (PID {})", s.action, s.name, s.pid), e),
        }
    }
}

/// Parse a 1-based comma list such as `1,3,4` into 0-based indices
pub fn parse_selection(list: &str, len: usize) -> Result<Vec<usize>> {
    let mut out = Vec::new();
    for part in list.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let n: usize = match part.parse() {
            Ok(n) => n,
            Err(_) => bail!("Invalid suggestion number '{}'", part),
        };
        if n == 0 || n > len {
            bail!("Suggestion {} out of range (1..={})", n, len);
        }
        if !out.contains(&(n - 1)) {
            out.push(n - 1);
        }
    }
    Ok(out)
}
