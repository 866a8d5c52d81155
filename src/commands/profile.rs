use anyhow::{anyhow, bail, Result};
use clap::ArgMatches;
use colored::Colorize;

use crate::core::optimizer::{builtin_profiles, ProfileReport};
use crate::core::Config;
use crate::ui::{dimmed, info, report_failure, success};

pub fn execute(matches: &ArgMatches, dry_run: bool) -> Result<()> {
    match matches.subcommand() {
        Some(("list", _)) | None => list(),
        Some(("use", sub)) => {
            let name = sub
                .get_one::<String>("name")
                .ok_or_else(|| anyhow!("Profile name is required"))?;

            let mut config = Config::load()?;
            let engine = super::build_engine(&config, dry_run);
            engine.sample_tick()?;

            let report = engine.apply_profile(name)?;
            print_report(&report);
            super::persist_journal(&engine, dry_run)?;

            config.last_profile = Some(report.profile.name.clone());
            config.governor_enabled = report.profile.governor_enabled;
            config.save()?;
            if report.profile.game_mode_enabled {
                dimmed("Game mode follows the foreground app while 'corewarden run' is active");
            }
        }
        Some((other, _)) => bail!("Unknown profile command '{}'", other),
    }
    Ok(())
}

fn list() {
    let config = Config::load().ok();
    let last = config.and_then(|c| c.last_profile);

    info("Profiles:");
    for profile in builtin_profiles() {
        let marker = if last.as_deref() == Some(profile.name.as_str()) {
            "*".green().bold()
        } else {
            " ".normal()
        };
        println!(
            " {} {:<10} {}",
            marker,
            profile.name.bold(),
            profile.description.dimmed()
        );
        println!(
            "   {:<10} power: {}, governor: {}, game mode: {}, foreground: {}",
            "",
            profile.power_plan,
            on_off(profile.governor_enabled),
            on_off(profile.game_mode_enabled),
            profile.foreground_priority
        );
    }
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "on"
    } else {
        "off"
    }
}

pub fn print_report(report: &ProfileReport) {
    success(&format!("✓ Profile {} applied", report.profile.name));
    match &report.power_plan {
        Ok(()) => dimmed(&format!("  power plan: {}", report.profile.power_plan)),
        Err(e) => report_failure("  power plan", e),
    }
    dimmed(&format!(
        "  governor: {}",
        on_off(report.profile.governor_enabled)
    ));
    if let Some((pid, result)) = &report.boost {
        match result {
            Ok(()) => dimmed(&format!(
                "  boosted foreground PID {} to {}",
                pid, report.profile.foreground_priority
            )),
            Err(e) => report_failure(&format!("  boost PID {}", pid), e),
        }
    }
}
