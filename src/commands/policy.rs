use anyhow::{anyhow, bail, Result};
use clap::ArgMatches;
use colored::Colorize;

use crate::core::optimizer::whitelist::is_system_process;
use crate::core::Config;
use crate::ui::{dimmed, info, success, warn};

pub fn execute(matches: &ArgMatches) -> Result<()> {
    let mut config = Config::load()?;

    match matches.subcommand() {
        Some(("show", _)) | None => show(&config),
        Some(("set", sub)) => {
            let mut changed = false;

            if let Some(cpu) = sub.get_one::<f32>("cpu") {
                if !(0.0..=100.0).contains(cpu) {
                    bail!("CPU threshold must be between 0 and 100");
                }
                config.policy.eco_cpu_threshold = *cpu;
                changed = true;
            }
            if let Some(mb) = sub.get_one::<f64>("mem-mb") {
                config.policy.eco_mem_threshold_mb = *mb;
                changed = true;
            }
            if let Some(cpu) = sub.get_one::<f32>("bg-cpu") {
                config.thresholds.bg_cpu = *cpu;
                changed = true;
            }
            if let Some(mb) = sub.get_one::<f64>("heavy-ram-mb") {
                config.thresholds.heavy_ram_mb = *mb;
                changed = true;
            }
            if let Some(secs) = sub.get_one::<u64>("refresh") {
                config.set_refresh_secs(*secs);
                if config.refresh_secs != *secs {
                    warn(&format!("Refresh interval clamped to {}s", config.refresh_secs));
                }
                changed = true;
            }
            if let Some(state) = sub.get_one::<String>("governor") {
                config.governor_enabled = parse_switch(state)?;
                changed = true;
            }

            if !changed {
                dimmed("Nothing to change. See 'corewarden policy set --help'");
                return Ok(());
            }
            config.save()?;
            success("✓ Policy updated");
            show(&config);
        }
        Some((other, _)) => bail!("Unknown policy command '{}'", other),
    }
    Ok(())
}

fn parse_switch(value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        _ => Err(anyhow!("Expected on/off, got '{}'", value)),
    }
}

fn show(config: &Config) {
    info("Governor");
    let state = if config.governor_enabled {
        "enabled".green()
    } else {
        "disabled".dimmed()
    };
    println!("  state:            {}", state);
    println!("  cpu threshold:    {:.1}%", config.policy.eco_cpu_threshold);
    println!("  memory threshold: {:.0} MB", config.policy.eco_mem_threshold_mb);
    println!("  interval:         {}s", config.governor_interval_secs);
    info("Advisor");
    println!("  background cpu:   {:.1}%", config.thresholds.bg_cpu);
    println!("  heavy ram:        {:.0} MB", config.thresholds.heavy_ram_mb);
    info("Sampling");
    println!("  refresh:          {}s", config.refresh_secs);
    println!("  rules interval:   {}s", config.rules_interval_secs);
    println!("  rule cooldown:    {}s", config.rule_cooldown_secs);
    if let Some(profile) = &config.last_profile {
        println!("  last profile:     {}", profile);
    }
}

pub fn execute_whitelist(matches: &ArgMatches) -> Result<()> {
    let mut config = Config::load()?;

    match matches.subcommand() {
        Some(("list", _)) | None => {
            if config.policy.whitelist.is_empty() {
                dimmed("Whitelist is empty");
            } else {
                info("Whitelisted processes:");
                for name in config.policy.whitelist.iter() {
                    println!("  {}", name);
                }
            }
            return Ok(());
        }
        Some(("add", sub)) => {
            let name = required_name(sub)?;
            if is_system_process(name) {
                dimmed(&format!("{} is a system process and is always excluded", name));
            }
            if config.policy.whitelist.insert(name) {
                success(&format!("✓ Added {} to the whitelist", name));
            } else {
                dimmed(&format!("{} is already whitelisted", name));
                return Ok(());
            }
        }
        Some(("remove", sub)) => {
            let name = required_name(sub)?;
            if config.policy.whitelist.remove(name) {
                success(&format!("✓ Removed {} from the whitelist", name));
            } else {
                warn(&format!("{} is not whitelisted", name));
                return Ok(());
            }
        }
        Some((other, _)) => bail!("Unknown whitelist command '{}'", other),
    }

    config.save()?;
    Ok(())
}

fn required_name(matches: &ArgMatches) -> Result<&String> {
    matches
        .get_one::<String>("name")
        .ok_or_else(|| anyhow!("Process name is required"))
}
