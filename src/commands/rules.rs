use anyhow::{anyhow, Result};
use clap::ArgMatches;
use colored::Colorize;

use crate::core::optimizer::{Rule, RuleAction, RuleCondition, RuleOrigin, RuleScope, RuleSet};
use crate::core::Config;
use crate::ui::{dimmed, info, success};

pub fn execute(matches: &ArgMatches) -> Result<()> {
    let mut config = Config::load()?;

    match matches.subcommand() {
        Some(("list", _)) | None => {
            print_rules(&config.rules);
            return Ok(());
        }
        Some(("add", sub)) => {
            let rule = rule_from_args(sub)?;
            let index = config.rules.add(rule.clone());
            success(&format!("✓ Added rule {}: {}", index + 1, rule));
        }
        Some(("remove", sub)) => {
            let index = position(sub, "index")?;
            let removed = config.rules.remove(index)?;
            success(&format!("✓ Removed rule: {}", removed));
        }
        Some(("move", sub)) => {
            let from = position(sub, "from")?;
            let to = position(sub, "to")?;
            config.rules.move_rule(from, to)?;
            success(&format!("✓ Moved rule {} to position {}", from + 1, to + 1));
        }
        Some(("reset", _)) => {
            config.rules.reset();
            success("✓ Rules reset to defaults");
        }
        Some((other, _)) => return Err(anyhow!("Unknown rules command '{}'", other)),
    }

    config.save()?;
    print_rules(&config.rules);
    Ok(())
}

fn rule_from_args(matches: &ArgMatches) -> Result<Rule> {
    let pattern = matches
        .get_one::<String>("pattern")
        .ok_or_else(|| anyhow!("Pattern is required"))?;
    let action: RuleAction = matches
        .get_one::<String>("action")
        .ok_or_else(|| anyhow!("Action is required"))?
        .parse()
        .map_err(|e: String| anyhow!(e))?;
    let scope: RuleScope = matches
        .get_one::<String>("scope")
        .map(|s| s.parse::<RuleScope>())
        .transpose()
        .map_err(|e: String| anyhow!(e))?
        .unwrap_or(RuleScope::Always);

    let condition = if let Some(cpu) = matches.get_one::<f32>("cpu-above") {
        RuleCondition::CpuAbove(*cpu)
    } else if matches.get_flag("leak") {
        RuleCondition::LeakTrend
    } else {
        RuleCondition::Always
    };

    Ok(Rule::new(pattern, scope, condition, action)?)
}

/// 1-based position argument as a 0-based index
fn position(matches: &ArgMatches, name: &str) -> Result<usize> {
    let n = *matches
        .get_one::<usize>(name)
        .ok_or_else(|| anyhow!("{} is required", name))?;
    n.checked_sub(1)
        .ok_or_else(|| anyhow!("Rule positions start at 1"))
}

pub fn print_rules(rules: &RuleSet) {
    if rules.is_empty() {
        dimmed("No rules configured");
        return;
    }
    info("Rules (first match wins):");
    for (i, rule) in rules.rules().iter().enumerate() {
        let origin = match rule.origin {
            RuleOrigin::Default => "default".dimmed(),
            RuleOrigin::User => "user".normal(),
        };
        println!("  {:>2}. {} ({})", i + 1, rule, origin);
    }
}
