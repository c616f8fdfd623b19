//! Waste scenario rules.
//!
//! Each rule is pure over the pre-fetched snapshot: no store access, no
//! suspension. Rules never raise; ill-formed rows are skipped. Rules are
//! organized by resource family.

pub mod compute;
pub mod database;
pub mod network;
pub mod scaling;
pub mod serverless;
pub mod storage;

use crate::models::{Detection, ImpactLevel, MODE_AUTO_SAFE};
use crate::services::detection::ResourceSnapshot;
use crate::services::pricing::truncate_dollars;
use chrono::{DateTime, Datelike, Utc, Weekday};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

/// Matches preview-environment naming (forgotten preview stacks)
static PREVIEW_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)preview|pr-").unwrap());

/// Matches feature-branch environment naming
static FEATURE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)feature|feat-").unwrap());

/// Matches CI/build-runner naming in instance names and tags
static CI_RUNNER_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(ci|runner|jenkins|gitlab-runner|github-actions|build)\b").unwrap()
});

pub fn looks_like_preview(text: &str) -> bool {
    PREVIEW_PATTERN.is_match(text)
}

pub fn looks_like_feature_env(text: &str) -> bool {
    FEATURE_PATTERN.is_match(text)
}

pub fn looks_like_ci_runner(text: &str) -> bool {
    CI_RUNNER_PATTERN.is_match(text)
}

pub fn is_weekend(now: DateTime<Utc>) -> bool {
    matches!(now.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Evaluation context shared by every rule
pub struct RuleContext<'a> {
    pub snapshot: &'a ResourceSnapshot,
    pub now: DateTime<Utc>,
    /// Whether "both metrics null" counts as idle in the RDS/cache rules.
    /// Conflating "no data" with "no load" is a deliberate policy choice,
    /// surfaced as a knob instead of hardcoded.
    pub treat_missing_metrics_as_idle: bool,
}

/// A waste scenario: fixed id, remediation action, safety mode and baseline
/// confidence, evaluated over the snapshot.
pub trait WasteRule: Send + Sync {
    fn scenario_id(&self) -> &'static str;
    fn evaluate(&self, ctx: &RuleContext) -> Vec<Detection>;
}

/// All 24 scenario rules
pub fn all_rules() -> Vec<Box<dyn WasteRule>> {
    let mut rules: Vec<Box<dyn WasteRule>> = Vec::new();
    rules.extend(compute::get_rules());
    rules.extend(scaling::get_rules());
    rules.extend(database::get_rules());
    rules.extend(storage::get_rules());
    rules.extend(network::get_rules());
    rules.extend(serverless::get_rules());
    rules
}

/// Identity of the resource a detection points at
pub struct TargetRef {
    pub resource_type: &'static str,
    pub resource_id: String,
    pub resource_name: String,
    pub account_id: String,
    pub region: String,
    pub env: String,
}

/// Construct a detection with the invariants every rule must hold:
/// confidence clamped to [0, 100], savings capped at the monthly cost,
/// dollars truncated to 4 decimal places.
#[allow(clippy::too_many_arguments)]
pub fn emit(
    ctx: &RuleContext,
    scenario_id: &'static str,
    action: &'static str,
    mode: i64,
    target: TargetRef,
    confidence: i64,
    monthly_cost: f64,
    potential_savings: f64,
    title: String,
    description: String,
    details: Map<String, Value>,
) -> Detection {
    let monthly_cost = truncate_dollars(monthly_cost.max(0.0));
    let potential_savings = truncate_dollars(potential_savings.clamp(0.0, monthly_cost));
    Detection {
        detection_id: Detection::detection_id_for(scenario_id, &target.resource_id),
        scenario_id: scenario_id.to_string(),
        resource_type: target.resource_type.to_string(),
        resource_id: target.resource_id,
        resource_name: target.resource_name,
        account_id: target.account_id,
        region: target.region,
        env: target.env,
        confidence: confidence.clamp(0, 100),
        mode,
        monthly_cost,
        potential_savings,
        impact_level: ImpactLevel::from_monthly_savings(potential_savings),
        recommended_action: action.to_string(),
        can_auto_optimize: mode == MODE_AUTO_SAFE,
        title,
        description,
        details,
        created_at: ctx.now,
    }
}
