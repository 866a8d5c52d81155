use anyhow::{anyhow, bail, Result};
use clap::ArgMatches;
use std::thread;
use std::time::Duration;

use crate::core::optimizer::{Action, Engine, MemoryPriority, PriorityClass};
use crate::core::Config;
use crate::ui::{confirm_destructive, dimmed, format_effect, info, report_failure, success};

/// Parse `<action> [value]` as typed on the command line
pub fn parse_action(name: &str, value: Option<&str>) -> Result<Action> {
    let needs = |what: &str| anyhow!("Action '{}' needs a {} value", name, what);

    let action = match name.to_lowercase().replace('-', "_").as_str() {
        "priority" | "set_priority" => {
            let class = value.ok_or_else(|| needs("priority class"))?;
            Action::SetPriority(class.parse::<PriorityClass>().map_err(|e| anyhow!(e))?)
        }
        "lower" | "lower_priority" => Action::LowerPriority,
        "memprio" | "memory_priority" => {
            let level = value.ok_or_else(|| needs("level (1-5)"))?;
            let level: u32 = level
                .parse()
                .map_err(|_| anyhow!("Invalid memory priority level '{}'", level))?;
            if !(1..=5).contains(&level) {
                bail!("Memory priority level must be between 1 and 5");
            }
            Action::SetMemoryPriority(MemoryPriority::from_level(level))
        }
        "affinity" => {
            let mask = value.ok_or_else(|| needs("CPU mask"))?;
            Action::SetAffinity(parse_mask(mask)?)
        }
        "eco" | "eco_throttle" => Action::EcoThrottle,
        "trim" => Action::Trim,
        "group" | "throttled_group" => Action::AssignThrottledGroup,
        "suspend" => Action::Suspend,
        "resume" => Action::Resume,
        "kill" => Action::Kill,
        other => bail!("Unknown action '{}'", other),
    };
    Ok(action)
}

/// Affinity mask in hex (`0x3`) or decimal (`3`)
fn parse_mask(text: &str) -> Result<u64> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => text.parse::<u64>(),
    };
    match parsed {
        Ok(0) => bail!("Affinity mask must select at least one CPU"),
        Ok(mask) => Ok(mask),
        Err(_) => bail!("Invalid affinity mask '{}'", text),
    }
}

pub fn execute(matches: &ArgMatches, dry_run: bool) -> Result<()> {
    let pid = *matches
        .get_one::<u32>("pid")
        .ok_or_else(|| anyhow!("PID is required"))?;
    let name = matches
        .get_one::<String>("action")
        .ok_or_else(|| anyhow!("Action is required"))?;
    let action = parse_action(name, matches.get_one::<String>("value").map(String::as_str))?;
    let assume_yes = matches.get_flag("yes");
    let trial = matches.get_flag("trial");

    let config = Config::load()?;
    let engine = super::build_engine(&config, dry_run);
    let set = super::warm_up(&engine)?;

    let target = set
        .get(pid)
        .map(|p| p.name.clone())
        .unwrap_or_else(|| format!("PID {}", pid));

    if !action.is_safe() {
        let prompt = format!("Really {} {} (PID {})?", action, target, pid);
        if !confirm_destructive(&prompt, assume_yes)? {
            dimmed("Cancelled");
            return Ok(());
        }
    }

    match engine.apply(pid, action) {
        Ok(report) if report.changed => {
            let previous = report
                .previous
                .map(|v| format!(" (was {})", v))
                .unwrap_or_default();
            success(&format!("✓ {} applied to {}{}", action, target, previous));
        }
        Ok(_) => {
            dimmed(&format!("= {} already in effect for {}", action, target));
            return Ok(());
        }
        Err(e) => {
            report_failure(&format!("{} on {}", action, target), &e);
            return Ok(());
        }
    }

    super::persist_journal(&engine, dry_run)?;

    // One-shot invocations end before the tracker's delay, so wait for it here
    measure(&engine, config.effects.delay());

    if trial {
        super::revert::print_revert(pid, &engine.revert(pid));
        super::persist_journal(&engine, dry_run)?;
    } else if engine.has_revert(pid) {
        dimmed(&format!("Undo with 'corewarden revert {}'", pid));
    }
    Ok(())
}

fn measure(engine: &Engine, delay: Duration) {
    info(&format!("Measuring effect over {:.1}s...", delay.as_secs_f32()));
    thread::sleep(delay + Duration::from_millis(200));
    for sample in engine.effects_tick() {
        println!("{}", format_effect(&sample));
    }
}
