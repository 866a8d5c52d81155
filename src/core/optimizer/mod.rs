//! Process optimization and rules engine.

pub mod advisor;
pub mod effects;
pub mod engine;
pub mod executor;
pub mod export;
pub mod governor;
pub mod health;
pub mod journal;
pub mod profiles;
pub mod providers;
pub mod rules;
pub mod runtime;
pub mod sampler;
pub mod types;
pub mod whitelist;

pub use advisor::{Advice, AdvisorThresholds, Suggestion, SuggestionReason};
pub use effects::{EffectOutcome, EffectSample, EffectsConfig, EffectsTracker};
pub use engine::{Engine, EngineSettings, RuleOutcome};
pub use executor::{ActionExecutor, ActionReport, ExecutorConfig, Providers, RevertReport};
pub use governor::{GovernedProcess, Governor, GovernorPolicy};
pub use health::{HealthConfig, HealthFlag, HealthFlags, HealthWatcher};
pub use journal::{RevertJournal, RevertRecord};
pub use profiles::{builtin_profiles, find_profile, Profile, ProfileManager, ProfileReport};
pub use providers::{
    Capabilities, GroupingProvider, PowerPlan, PowerPolicyProvider, ProcessControlProvider,
    ProcessInfoProvider,
};
pub use rules::{
    NamePattern, Rule, RuleAction, RuleCondition, RuleMatch, RuleOrigin, RuleScope, RuleSet,
};
pub use runtime::{Cadence, EngineRuntime};
pub use types::{
    Action, Attribute, AttributeValue, Capability, MemoryPriority, PriorityClass, ProcessEntry,
    ProcessHandle, ProcessSnapshot, Role, SnapshotSet,
};
pub use whitelist::Whitelist;
