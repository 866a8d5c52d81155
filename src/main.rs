use anyhow::Result;
use clap::{value_parser, Arg, ArgAction, Command};

use corewarden::commands;

fn build_cli() -> Command {
    Command::new("corewarden")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Process optimizer: rules, background governor and reversible tuning")
        .disable_version_flag(true)
        .arg(
            Arg::new("version")
                .short('v')
                .short_alias('V')
                .long("version")
                .help("Print version information")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .global(true)
                .help("Log intended changes without modifying any process")
                .action(ArgAction::SetTrue),
        )
        .subcommand(
            Command::new("run")
                .about("Run the optimizer: sampling, rules, governor and effects tracking")
                .arg(
                    Arg::new("profile")
                        .short('p')
                        .long("profile")
                        .value_name("NAME")
                        .help("Profile to apply at startup (Gaming, Creator, Everyday)"),
                )
                .arg(
                    Arg::new("top")
                        .short('n')
                        .long("top")
                        .value_name("N")
                        .help("Processes shown per tick")
                        .value_parser(value_parser!(usize))
                        .default_value("10"),
                )
                .arg(
                    Arg::new("revert-on-exit")
                        .long("revert-on-exit")
                        .help("Restore every modified process when stopping")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("snapshot")
                .about("Show the current process table")
                .arg(
                    Arg::new("top")
                        .short('n')
                        .long("top")
                        .value_name("N")
                        .help("Number of processes to show")
                        .value_parser(value_parser!(usize))
                        .default_value("15"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .value_name("PATH")
                        .help("Also export the full table as JSON"),
                ),
        )
        .subcommand(
            Command::new("advise")
                .about("Suggest actions for heavy or leaking processes")
                .arg(
                    Arg::new("apply-safe")
                        .long("apply-safe")
                        .help("Apply every safe suggestion")
                        .action(ArgAction::SetTrue)
                        .conflicts_with("apply"),
                )
                .arg(
                    Arg::new("apply")
                        .long("apply")
                        .value_name("N,M,...")
                        .help("Apply the numbered suggestions"),
                ),
        )
        .subcommand(
            Command::new("apply")
                .about("Apply one action to a process")
                .long_about(
                    "Apply one action to a process\n\nACTIONS:\n    priority <class>    idle, below-normal, normal, above-normal, high, realtime\n    lower               lower priority to BelowNormal\n    memprio <1-5>       memory priority level\n    affinity <mask>     CPU mask, e.g. 0x3\n    eco                 eco (efficiency) throttling\n    trim                trim working set\n    group               move into the throttled group\n    suspend | resume | kill",
                )
                .arg(
                    Arg::new("pid")
                        .help("Target process id")
                        .required(true)
                        .value_parser(value_parser!(u32))
                        .index(1),
                )
                .arg(
                    Arg::new("action")
                        .help("Action to apply")
                        .required(true)
                        .index(2),
                )
                .arg(Arg::new("value").help("Action value").index(3))
                .arg(
                    Arg::new("yes")
                        .short('y')
                        .long("yes")
                        .help("Do not ask for confirmation")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("trial")
                        .long("trial")
                        .help("Revert after the effect has been measured")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("revert")
                .about("Restore processes changed by earlier commands")
                .long_about(
                    "Restore processes changed by earlier commands\n\nWithout arguments, lists the processes that have saved original values.",
                )
                .arg(
                    Arg::new("pid")
                        .help("Process to restore")
                        .value_parser(value_parser!(u32))
                        .index(1),
                )
                .arg(
                    Arg::new("all")
                        .long("all")
                        .help("Restore every modified process")
                        .action(ArgAction::SetTrue)
                        .conflicts_with("pid"),
                ),
        )
        .subcommand(
            Command::new("rules")
                .about("Manage automation rules (use 'corewarden rules --help' for subcommands)")
                .subcommand(Command::new("list").about("List rules in evaluation order"))
                .subcommand(
                    Command::new("add")
                        .about("Append a rule")
                        .arg(
                            Arg::new("pattern")
                                .help("Process name, substring or glob (e.g. 'chrome*')")
                                .required(true)
                                .index(1),
                        )
                        .arg(
                            Arg::new("action")
                                .help("lower_priority, trim, eco_throttle or kill")
                                .required(true)
                                .index(2),
                        )
                        .arg(
                            Arg::new("scope")
                                .short('s')
                                .long("scope")
                                .value_name("SCOPE")
                                .help("always, foreground or background"),
                        )
                        .arg(
                            Arg::new("cpu-above")
                                .long("cpu-above")
                                .value_name("PERCENT")
                                .help("Fire only while CPU is above this value")
                                .value_parser(value_parser!(f32))
                                .conflicts_with("leak"),
                        )
                        .arg(
                            Arg::new("leak")
                                .long("leak")
                                .help("Fire only while memory is trending up")
                                .action(ArgAction::SetTrue),
                        ),
                )
                .subcommand(
                    Command::new("remove").about("Remove a rule").arg(
                        Arg::new("index")
                            .help("Rule number as shown by 'rules list'")
                            .required(true)
                            .value_parser(value_parser!(usize))
                            .index(1),
                    ),
                )
                .subcommand(
                    Command::new("move")
                        .about("Move a rule to another position")
                        .arg(
                            Arg::new("from")
                                .required(true)
                                .value_parser(value_parser!(usize))
                                .index(1),
                        )
                        .arg(
                            Arg::new("to")
                                .required(true)
                                .value_parser(value_parser!(usize))
                                .index(2),
                        ),
                )
                .subcommand(Command::new("reset").about("Restore the default rules")),
        )
        .subcommand(
            Command::new("policy")
                .about("Show or change governor and advisor thresholds")
                .subcommand(Command::new("show").about("Show the current policy"))
                .subcommand(
                    Command::new("set")
                        .about("Change policy values")
                        .arg(
                            Arg::new("cpu")
                                .long("cpu")
                                .value_name("PERCENT")
                                .help("Governor CPU threshold")
                                .value_parser(value_parser!(f32)),
                        )
                        .arg(
                            Arg::new("mem-mb")
                                .long("mem-mb")
                                .value_name("MB")
                                .help("Governor memory threshold")
                                .value_parser(value_parser!(f64)),
                        )
                        .arg(
                            Arg::new("bg-cpu")
                                .long("bg-cpu")
                                .value_name("PERCENT")
                                .help("Advisor background CPU threshold")
                                .value_parser(value_parser!(f32)),
                        )
                        .arg(
                            Arg::new("heavy-ram-mb")
                                .long("heavy-ram-mb")
                                .value_name("MB")
                                .help("Advisor memory threshold")
                                .value_parser(value_parser!(f64)),
                        )
                        .arg(
                            Arg::new("refresh")
                                .long("refresh")
                                .value_name("SECS")
                                .help("Sampling interval (1-10 seconds)")
                                .value_parser(value_parser!(u64)),
                        )
                        .arg(
                            Arg::new("governor")
                                .long("governor")
                                .value_name("on|off")
                                .help("Enable or disable the background governor"),
                        ),
                ),
        )
        .subcommand(
            Command::new("whitelist")
                .about("Processes the rules, governor and advisor leave alone")
                .subcommand(Command::new("list").about("List whitelisted names"))
                .subcommand(
                    Command::new("add")
                        .about("Whitelist a process name")
                        .arg(Arg::new("name").required(true).index(1)),
                )
                .subcommand(
                    Command::new("remove")
                        .about("Remove a process name from the whitelist")
                        .arg(Arg::new("name").required(true).index(1)),
                ),
        )
        .subcommand(
            Command::new("profile")
                .about("List or apply profiles")
                .subcommand(Command::new("list").about("List built-in profiles"))
                .subcommand(
                    Command::new("use")
                        .about("Apply a profile")
                        .arg(Arg::new("name").required(true).index(1)),
                ),
        )
        .subcommand(
            Command::new("effects")
                .about("Show measured effects of past actions")
                .arg(
                    Arg::new("last")
                        .short('n')
                        .long("last")
                        .value_name("N")
                        .help("Number of entries to show")
                        .value_parser(value_parser!(usize))
                        .default_value("20"),
                )
                .arg(
                    Arg::new("export")
                        .long("export")
                        .value_name("PATH")
                        .help("Export the full history as JSON"),
                ),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completions")
                .arg(
                    Arg::new("shell")
                        .help("bash, zsh, fish, powershell or elvish")
                        .required(true)
                        .index(1),
                ),
        )
        .subcommand(Command::new("version").about("Shows version information"))
}

fn main() -> Result<()> {
    corewarden::init_logging();

    let mut cli = build_cli();
    let matches = cli.clone().get_matches();

    if matches.get_flag("version") {
        return commands::version();
    }
    let dry_run = matches.get_flag("dry-run");

    match matches.subcommand() {
        Some(("run", sub)) => commands::run::execute(sub, dry_run)?,
        Some(("snapshot", sub)) => commands::snapshot::execute(sub, dry_run)?,
        Some(("advise", sub)) => commands::advise::execute(sub, dry_run)?,
        Some(("apply", sub)) => commands::apply::execute(sub, dry_run)?,
        Some(("revert", sub)) => commands::revert::execute(sub, dry_run)?,
        Some(("rules", sub)) => commands::rules::execute(sub)?,
        Some(("policy", sub)) => commands::policy::execute(sub)?,
        Some(("whitelist", sub)) => commands::policy::execute_whitelist(sub)?,
        Some(("profile", sub)) => commands::profile::execute(sub, dry_run)?,
        Some(("effects", sub)) => commands::effects::execute(sub)?,
        Some(("completions", sub)) => commands::completions::execute(sub, &mut cli)?,
        Some(("version", _)) => commands::version()?,
        _ => {
            println!("corewarden {}", env!("CARGO_PKG_VERSION"));
            println!("Use 'corewarden --help' for more information.");
        }
    }

    Ok(())
}
