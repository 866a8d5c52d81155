use chrono::{DateTime, Local, Utc};
use colored::{ColoredString, Colorize};

use crate::core::optimizer::{EffectOutcome, EffectSample, HealthFlag, Role};

/// Format byte counts in human-readable form (B, KB, MB, GB)
pub fn format_size(size: u64) -> String {
    if size < 1024 {
        format!("{}B", size)
    } else if size < 1024 * 1024 {
        format!("{:.1}KB", size as f64 / 1024.0)
    } else if size < 1024 * 1024 * 1024 {
        format!("{:.1}MB", size as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1}GB", size as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Signed size delta, e.g. `-12.0MB`
pub fn format_size_delta(delta: i64) -> String {
    let sign = if delta < 0 { "-" } else { "+" };
    format!("{}{}", sign, format_size(delta.unsigned_abs()))
}

/// Format timestamp as local time (YYYY-MM-DD HH:MM:SS)
pub fn format_time(time: DateTime<Utc>) -> String {
    let local: DateTime<Local> = time.into();
    local.format("%Y-%m-%d %H:%M:%S").to_string()
}

pub fn format_cpu(cpu: f32) -> ColoredString {
    let text = format!("{:>5.1}%", cpu);
    if cpu >= 50.0 {
        text.red()
    } else if cpu >= 20.0 {
        text.yellow()
    } else {
        text.normal()
    }
}

pub fn format_role(role: Role) -> ColoredString {
    match role {
        Role::Foreground => "FG".green().bold(),
        Role::Background => "BG".dimmed(),
    }
}

pub fn format_health(flag: HealthFlag) -> ColoredString {
    match flag {
        HealthFlag::Normal => "ok".dimmed(),
        HealthFlag::Leak => "leak".red().bold(),
        HealthFlag::Spike => "spike".yellow(),
    }
}

/// Truncate a process name to `width` characters
pub fn truncate_name(name: &str, width: usize) -> String {
    if name.chars().count() <= width {
        return name.to_string();
    }
    let mut out: String = name.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}

pub fn format_effect(sample: &EffectSample) -> String {
    match &sample.outcome {
        EffectOutcome::Measured {
            delta_cpu,
            delta_resident_bytes,
        } => format!(
            "{} {:<16} PID {:<7} {:<20} CPU {:+.1}%  MEM {}",
            format_time(sample.finished_at).dimmed(),
            sample.action.to_string(),
            sample.pid,
            truncate_name(&sample.name, 20),
            delta_cpu,
            format_size_delta(*delta_resident_bytes)
        ),
        EffectOutcome::Terminated => format!(
            "{} {:<16} PID {:<7} {:<20} {}",
            format_time(sample.finished_at).dimmed(),
            sample.action.to_string(),
            sample.pid,
            truncate_name(&sample.name, 20),
            "terminated".yellow()
        ),
        EffectOutcome::Unmeasured => format!(
            "{} {:<16} PID {:<7} {:<20} {}",
            format_time(sample.finished_at).dimmed(),
            sample.action.to_string(),
            sample.pid,
            truncate_name(&sample.name, 20),
            "not measurable (access denied)".dimmed()
        ),
    }
}
