//! Automation rules evaluated against each published tick.
//!
//! Evaluation is pure: it turns a snapshot set into at most one
//! [`RuleMatch`] per pid. Submitting the matches is the engine's job.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::health::HealthWatcher;
use super::types::{Action, Role, SnapshotSet};
use super::whitelist::{self, Whitelist};
use crate::error::{Result, WardenError};

/// Case-insensitive process name matcher.
///
/// Plain text matches as a substring; text containing `*` or `?` is a glob
/// over the whole name. An empty pattern matches every name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NamePattern {
    raw: String,
    glob: Option<Regex>,
}

impl NamePattern {
    pub fn new(raw: &str) -> Result<Self> {
        let raw = raw.trim().to_lowercase();
        let glob = if raw.contains(['*', '?']) {
            let mut expr = String::from("^");
            for c in raw.chars() {
                match c {
                    '*' => expr.push_str(".*"),
                    '?' => expr.push('.'),
                    other => expr.push_str(&regex::escape(&other.to_string())),
                }
            }
            expr.push('$');
            let re = Regex::new(&expr)
                .map_err(|e| WardenError::config(format!("invalid pattern '{}': {}", raw, e)))?;
            Some(re)
        } else {
            None
        };
        Ok(Self { raw, glob })
    }

    pub fn matches(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        match &self.glob {
            Some(re) => re.is_match(&name),
            None => name.contains(&self.raw),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl PartialEq for NamePattern {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl TryFrom<String> for NamePattern {
    type Error = WardenError;

    fn try_from(raw: String) -> Result<Self> {
        NamePattern::new(&raw)
    }
}

impl From<NamePattern> for String {
    fn from(pattern: NamePattern) -> Self {
        pattern.raw
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleScope {
    Always,
    Foreground,
    Background,
}

impl RuleScope {
    pub fn admits(self, role: Role) -> bool {
        match self {
            RuleScope::Always => true,
            RuleScope::Foreground => role == Role::Foreground,
            RuleScope::Background => role == Role::Background,
        }
    }
}

impl std::str::FromStr for RuleScope {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "always" | "any" => Ok(RuleScope::Always),
            "foreground" | "fg" => Ok(RuleScope::Foreground),
            "background" | "bg" => Ok(RuleScope::Background),
            _ => Err(format!("unknown rule scope '{}'", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RuleCondition {
    Always,
    /// Current tick CPU strictly above the threshold
    CpuAbove(f32),
    /// Health watcher currently reports a leak
    LeakTrend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    LowerPriority,
    Trim,
    EcoThrottle,
    Kill,
}

impl RuleAction {
    pub fn to_action(self) -> Action {
        match self {
            RuleAction::LowerPriority => Action::LowerPriority,
            RuleAction::Trim => Action::Trim,
            RuleAction::EcoThrottle => Action::EcoThrottle,
            RuleAction::Kill => Action::Kill,
        }
    }
}

impl std::str::FromStr for RuleAction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "lower_priority" => Ok(RuleAction::LowerPriority),
            "trim" => Ok(RuleAction::Trim),
            "eco_throttle" => Ok(RuleAction::EcoThrottle),
            "kill" => Ok(RuleAction::Kill),
            _ => Err(format!("unknown rule action '{}'", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleOrigin {
    Default,
    #[default]
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub pattern: NamePattern,
    pub scope: RuleScope,
    pub condition: RuleCondition,
    pub action: RuleAction,
    #[serde(default)]
    pub origin: RuleOrigin,
}

impl Rule {
    pub fn new(
        pattern: &str,
        scope: RuleScope,
        condition: RuleCondition,
        action: RuleAction,
    ) -> Result<Self> {
        Ok(Self {
            pattern: NamePattern::new(pattern)?,
            scope,
            condition,
            action,
            origin: RuleOrigin::User,
        })
    }

    fn builtin(
        pattern: &str,
        scope: RuleScope,
        condition: RuleCondition,
        action: RuleAction,
    ) -> Self {
        Self {
            pattern: NamePattern {
                raw: pattern.to_string(),
                glob: None,
            },
            scope,
            condition,
            action,
            origin: RuleOrigin::Default,
        }
    }

    fn matches(&self, snapshot: &super::types::ProcessSnapshot, health: &HealthWatcher) -> bool {
        if !self.pattern.matches(&snapshot.name) || !self.scope.admits(snapshot.role) {
            return false;
        }
        match self.condition {
            RuleCondition::Always => true,
            RuleCondition::CpuAbove(threshold) => snapshot.cpu_percent > threshold,
            RuleCondition::LeakTrend => health.flag_set(snapshot.pid).leak,
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pattern = if self.pattern.as_str().is_empty() {
            "*"
        } else {
            self.pattern.as_str()
        };
        let when = match self.condition {
            RuleCondition::Always => "always".to_string(),
            RuleCondition::CpuAbove(t) => format!("cpu>{}", t),
            RuleCondition::LeakTrend => "leak".to_string(),
        };
        write!(
            f,
            "{} [{:?}] when {} -> {}",
            pattern,
            self.scope,
            when,
            self.action.to_action()
        )
    }
}

/// One rule firing for one process
#[derive(Debug, Clone, PartialEq)]
pub struct RuleMatch {
    pub pid: u32,
    pub name: String,
    pub rule_index: usize,
    pub action: Action,
}

/// Ordered rules: built-in defaults first, then user additions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self {
            rules: default_rules(),
        }
    }
}

pub fn default_rules() -> Vec<Rule> {
    vec![
        Rule::builtin(
            "chrome.exe",
            RuleScope::Background,
            RuleCondition::CpuAbove(30.0),
            RuleAction::LowerPriority,
        ),
        Rule::builtin(
            "updater",
            RuleScope::Always,
            RuleCondition::Always,
            RuleAction::EcoThrottle,
        ),
    ]
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Append a rule after every existing one
    pub fn add(&mut self, rule: Rule) -> usize {
        self.rules.push(rule);
        self.rules.len() - 1
    }

    pub fn remove(&mut self, index: usize) -> Result<Rule> {
        if index >= self.rules.len() {
            return Err(out_of_range(index, self.rules.len()));
        }
        Ok(self.rules.remove(index))
    }

    /// Move the rule at `from` so it ends up at position `to`
    pub fn move_rule(&mut self, from: usize, to: usize) -> Result<()> {
        let len = self.rules.len();
        if from >= len {
            return Err(out_of_range(from, len));
        }
        if to >= len {
            return Err(out_of_range(to, len));
        }
        let rule = self.rules.remove(from);
        self.rules.insert(to, rule);
        Ok(())
    }

    /// Drop user rules and restore the built-in defaults
    pub fn reset(&mut self) {
        self.rules = default_rules();
    }

    /// First-match-wins evaluation of one tick.
    ///
    /// Excluded names (system list, user whitelist) and this process itself
    /// are never evaluated.
    pub fn evaluate(
        &self,
        set: &SnapshotSet,
        health: &HealthWatcher,
        whitelist: &Whitelist,
    ) -> Vec<RuleMatch> {
        let mut matches = Vec::new();
        for snapshot in set.iter() {
            if whitelist.excludes(&snapshot.name)
                || whitelist::is_protected(snapshot.pid, &snapshot.name)
            {
                continue;
            }
            if let Some((index, rule)) = self
                .rules
                .iter()
                .enumerate()
                .find(|(_, rule)| rule.matches(snapshot, health))
            {
                matches.push(RuleMatch {
                    pid: snapshot.pid,
                    name: snapshot.name.clone(),
                    rule_index: index,
                    action: rule.action.to_action(),
                });
            }
        }
        matches
    }
}

fn out_of_range(index: usize, len: usize) -> WardenError {
    WardenError::config(format!(
        "rule index {} out of range (have {} rules)",
        index, len
    ))
}
