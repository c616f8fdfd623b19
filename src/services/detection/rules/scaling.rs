//! Autoscaling group scenarios: forgotten preview stacks, over-provisioned
//! capacity, stale feature environments and pinned (static) groups.

use super::*;
use crate::models::{AutoscalingGroup, Detection, MODE_APPROVAL_REQUIRED, MODE_AUTO_SAFE};
use crate::services::pricing::instance_monthly_cost;
use serde_json::json;

fn target(asg: &AutoscalingGroup) -> TargetRef {
    TargetRef {
        resource_type: "autoscaling_group",
        resource_id: asg.id.clone(),
        resource_name: asg.name.clone(),
        account_id: asg.account_id.clone(),
        region: asg.region.clone(),
        env: asg.env.clone(),
    }
}

fn group_monthly_cost(asg: &AutoscalingGroup) -> f64 {
    asg.desired_capacity.max(0) as f64 * instance_monthly_cost(&asg.instance_type)
}

/// Days since the group row was last touched; the inventory carries no
/// creation time for groups, so last-modified is the freshness proxy.
fn age_days(asg: &AutoscalingGroup, ctx: &RuleContext) -> i64 {
    (ctx.now - asg.updated_at).num_days()
}

/// Preview-named group still holding capacity at near-zero utilization
pub struct ForgottenPreviewRule;

impl WasteRule for ForgottenPreviewRule {
    fn scenario_id(&self) -> &'static str {
        "forgotten_preview"
    }

    fn evaluate(&self, ctx: &RuleContext) -> Vec<Detection> {
        let mut out = Vec::new();
        for asg in &ctx.snapshot.autoscaling_groups {
            if !looks_like_preview(&asg.env) && !looks_like_preview(&asg.name) {
                continue;
            }
            if asg.desired_capacity <= 0 {
                continue;
            }
            let Some(util) = asg.current_utilization else {
                continue;
            };
            if util >= 10.0 {
                continue;
            }

            let age = age_days(asg, ctx);
            let mut confidence = 85;
            if age > 7 {
                confidence += 10;
            }
            if age > 14 {
                confidence += 5;
            }

            let monthly = group_monthly_cost(asg);
            let mut details = serde_json::Map::new();
            details.insert("desiredCapacity".to_string(), json!(asg.desired_capacity));
            details.insert("currentUtilization".to_string(), json!(util));
            details.insert("ageDays".to_string(), json!(age));

            out.push(emit(
                ctx,
                self.scenario_id(),
                "terminate_asg",
                MODE_AUTO_SAFE,
                target(asg),
                confidence,
                monthly,
                monthly,
                format!("Forgotten preview environment {}", asg.name),
                format!(
                    "Preview stack {} still holds {} instance(s) at {:.0}% utilization.",
                    asg.name, asg.desired_capacity, util
                ),
                details,
            ));
        }
        out
    }
}

/// Group running well below capacity; recommends scaling toward ~50% target
/// utilization.
pub struct OverProvisionedAsgRule;

impl WasteRule for OverProvisionedAsgRule {
    fn scenario_id(&self) -> &'static str {
        "over_provisioned_asg"
    }

    fn evaluate(&self, ctx: &RuleContext) -> Vec<Detection> {
        let mut out = Vec::new();
        for asg in &ctx.snapshot.autoscaling_groups {
            if asg.desired_capacity <= 1 || asg.desired_capacity <= asg.min_size {
                continue;
            }
            let Some(util) = asg.current_utilization else {
                continue;
            };
            if util >= 30.0 {
                continue;
            }

            let recommended = ((asg.desired_capacity as f64 * util / 50.0).ceil() as i64)
                .max(asg.min_size)
                .max(1);
            let shed = asg.desired_capacity - recommended;
            if shed <= 0 {
                continue;
            }

            let per_instance = instance_monthly_cost(&asg.instance_type);
            let monthly = group_monthly_cost(asg);
            let savings = shed as f64 * per_instance;

            let mut confidence = 75;
            if util < 20.0 {
                confidence += 10;
            }
            if util < 10.0 {
                confidence += 10;
            }

            let mut details = serde_json::Map::new();
            details.insert("desiredCapacity".to_string(), json!(asg.desired_capacity));
            details.insert("recommendedCapacity".to_string(), json!(recommended));
            details.insert("currentUtilization".to_string(), json!(util));

            out.push(emit(
                ctx,
                self.scenario_id(),
                "scale_down_asg",
                MODE_AUTO_SAFE,
                target(asg),
                confidence,
                monthly,
                savings,
                format!("Over-provisioned group {}", asg.name),
                format!(
                    "{} runs {} instance(s) at {:.0}% utilization; {} would suffice.",
                    asg.name, asg.desired_capacity, util, recommended
                ),
                details,
            ));
        }
        out
    }
}

/// Feature-branch environment untouched for over a week
pub struct StaleFeatureEnvRule;

impl WasteRule for StaleFeatureEnvRule {
    fn scenario_id(&self) -> &'static str {
        "stale_feature_env"
    }

    fn evaluate(&self, ctx: &RuleContext) -> Vec<Detection> {
        let mut out = Vec::new();
        for asg in &ctx.snapshot.autoscaling_groups {
            if !looks_like_feature_env(&asg.env) && !looks_like_feature_env(&asg.name) {
                continue;
            }
            if asg.desired_capacity <= 0 {
                continue;
            }
            let age = age_days(asg, ctx);
            if age <= 7 {
                continue;
            }
            let Some(util) = asg.current_utilization else {
                continue;
            };
            if util >= 20.0 {
                continue;
            }

            let mut confidence = 85;
            if age > 14 {
                confidence += 10;
            }
            if age > 30 {
                confidence += 5;
            }

            let monthly = group_monthly_cost(asg);
            let mut details = serde_json::Map::new();
            details.insert("ageDays".to_string(), json!(age));
            details.insert("currentUtilization".to_string(), json!(util));

            out.push(emit(
                ctx,
                self.scenario_id(),
                "terminate_asg",
                MODE_AUTO_SAFE,
                target(asg),
                confidence,
                monthly,
                monthly,
                format!("Stale feature environment {}", asg.name),
                format!(
                    "Feature stack {} has sat at {:.0}% utilization for {} days.",
                    asg.name, util, age
                ),
                details,
            ));
        }
        out
    }
}

/// min = max = desired pins the group; it cannot shed capacity off-peak
pub struct StaticAsgRule;

impl WasteRule for StaticAsgRule {
    fn scenario_id(&self) -> &'static str {
        "static_asg"
    }

    fn evaluate(&self, ctx: &RuleContext) -> Vec<Detection> {
        let mut out = Vec::new();
        for asg in &ctx.snapshot.autoscaling_groups {
            if asg.desired_capacity <= 1 {
                continue;
            }
            if asg.min_size != asg.max_size || asg.max_size != asg.desired_capacity {
                continue;
            }

            let monthly = group_monthly_cost(asg);
            let mut details = serde_json::Map::new();
            details.insert("desiredCapacity".to_string(), json!(asg.desired_capacity));

            out.push(emit(
                ctx,
                self.scenario_id(),
                "enable_asg_scaling",
                MODE_APPROVAL_REQUIRED,
                target(asg),
                75,
                monthly,
                // Heuristic: dynamic scaling typically sheds ~30% off-peak
                monthly * 0.30,
                format!("Static autoscaling group {}", asg.name),
                format!(
                    "{} is pinned at {} instance(s) (min=max=desired); enabling scaling lets it shrink off-peak.",
                    asg.name, asg.desired_capacity
                ),
                details,
            ));
        }
        out
    }
}

pub fn get_rules() -> Vec<Box<dyn WasteRule>> {
    vec![
        Box::new(ForgottenPreviewRule),
        Box::new(OverProvisionedAsgRule),
        Box::new(StaleFeatureEnvRule),
        Box::new(StaticAsgRule),
    ]
}
