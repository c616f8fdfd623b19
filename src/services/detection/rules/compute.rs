//! Compute instance scenarios: idle, CI-runner, off-hours and
//! over-provisioned instances.

use super::*;
use crate::models::{Detection, Instance, MODE_APPROVAL_REQUIRED, MODE_AUTO_SAFE, is_non_prod};
use crate::services::pricing::{
    HOURS_PER_MONTH, instance_monthly_cost, recommended_smaller_instance,
};
use chrono::Timelike;
use serde_json::json;

fn target(inst: &Instance) -> TargetRef {
    TargetRef {
        resource_type: "instance",
        resource_id: inst.id.clone(),
        resource_name: inst.display_name(),
        account_id: inst.account_id.clone(),
        region: inst.region.clone(),
        env: inst.env.clone(),
    }
}

/// Running instance with a 7-day CPU average below 5%
pub struct IdleInstanceRule;

impl WasteRule for IdleInstanceRule {
    fn scenario_id(&self) -> &'static str {
        "idle_instance"
    }

    fn evaluate(&self, ctx: &RuleContext) -> Vec<Detection> {
        let mut out = Vec::new();
        for inst in &ctx.snapshot.instances {
            if !inst.is_running() {
                continue;
            }
            let Some(cpu) = inst.effective_cpu() else {
                continue;
            };
            if cpu >= 5.0 {
                continue;
            }

            let monthly = inst.hourly_cost * HOURS_PER_MONTH;
            // Scoring tiers: near-zero CPU earns more than merely-low CPU
            let mut confidence = 80 + if cpu < 2.0 { 15 } else { 10 };
            if matches!(inst.env.as_str(), "dev" | "staging") {
                confidence += 5;
            }

            let mut details = serde_json::Map::new();
            details.insert("instanceType".to_string(), json!(inst.instance_type));
            details.insert("avgCpu7d".to_string(), json!(cpu));
            details.insert("hourlyCost".to_string(), json!(inst.hourly_cost));

            out.push(emit(
                ctx,
                self.scenario_id(),
                "stop_instance",
                MODE_AUTO_SAFE,
                target(inst),
                confidence,
                monthly,
                monthly * 0.90,
                format!("Idle instance {}", inst.display_name()),
                format!(
                    "{} ({}) has averaged {:.1}% CPU over the last 7 days. Stopping it saves ~90% of its monthly cost.",
                    inst.display_name(),
                    inst.instance_type,
                    cpu
                ),
                details,
            ));
        }
        out
    }
}

/// Idle instance whose name or tags mark it as a CI/build runner
pub struct IdleCiRunnerRule;

impl WasteRule for IdleCiRunnerRule {
    fn scenario_id(&self) -> &'static str {
        "idle_ci_runner"
    }

    fn evaluate(&self, ctx: &RuleContext) -> Vec<Detection> {
        let mut out = Vec::new();
        for inst in &ctx.snapshot.instances {
            if !inst.is_running() {
                continue;
            }
            let Some(cpu) = inst.effective_cpu() else {
                continue;
            };
            if cpu >= 5.0 {
                continue;
            }

            let mut haystack = inst.display_name();
            for (k, v) in inst.tags.iter() {
                haystack.push(' ');
                haystack.push_str(k);
                haystack.push(' ');
                haystack.push_str(v);
            }
            if !looks_like_ci_runner(&haystack) {
                continue;
            }

            let monthly = inst.hourly_cost * HOURS_PER_MONTH;
            let confidence = 95 + if cpu < 2.0 { 5 } else { 0 };

            let mut details = serde_json::Map::new();
            details.insert("instanceType".to_string(), json!(inst.instance_type));
            details.insert("avgCpu7d".to_string(), json!(cpu));

            out.push(emit(
                ctx,
                self.scenario_id(),
                "stop_instance",
                MODE_AUTO_SAFE,
                target(inst),
                confidence,
                monthly,
                monthly,
                format!("Idle CI runner {}", inst.display_name()),
                format!(
                    "{} looks like a build runner and has been idle ({:.1}% CPU) for a week.",
                    inst.display_name(),
                    cpu
                ),
                details,
            ));
        }
        out
    }
}

/// Dev instance running outside working hours (07:00-19:00 UTC) or on a
/// weekend. Emits nothing during working hours.
pub struct OffHoursDevRule;

impl WasteRule for OffHoursDevRule {
    fn scenario_id(&self) -> &'static str {
        "off_hours_dev"
    }

    fn evaluate(&self, ctx: &RuleContext) -> Vec<Detection> {
        let weekend = is_weekend(ctx.now);
        let hour = ctx.now.hour();
        let off_hours = weekend || !(7..19).contains(&hour);
        if !off_hours {
            return vec![];
        }

        let mut out = Vec::new();
        for inst in &ctx.snapshot.instances {
            if !inst.is_running() || inst.env != "dev" {
                continue;
            }

            let monthly = inst.hourly_cost * HOURS_PER_MONTH;
            let mut confidence = 80;
            if weekend {
                confidence += 10;
            }
            if inst.effective_cpu().is_some_and(|c| c < 5.0) {
                confidence += 5;
            }

            let mut details = serde_json::Map::new();
            details.insert("instanceType".to_string(), json!(inst.instance_type));
            details.insert("weekend".to_string(), json!(weekend));

            out.push(emit(
                ctx,
                self.scenario_id(),
                "stop_instance",
                MODE_AUTO_SAFE,
                target(inst),
                confidence,
                monthly,
                monthly * 0.60,
                format!("Dev instance {} running off-hours", inst.display_name()),
                format!(
                    "{} is a dev instance running outside working hours. Stopping dev capacity nights and weekends saves ~60% of its cost.",
                    inst.display_name()
                ),
                details,
            ));
        }
        out
    }
}

/// Moderate-CPU, low-memory instance with a smaller family sibling
pub struct OverProvisionedInstanceRule;

impl WasteRule for OverProvisionedInstanceRule {
    fn scenario_id(&self) -> &'static str {
        "over_provisioned_instance"
    }

    fn evaluate(&self, ctx: &RuleContext) -> Vec<Detection> {
        let mut out = Vec::new();
        for inst in &ctx.snapshot.instances {
            if !inst.is_running() {
                continue;
            }
            let Some(cpu) = inst.effective_cpu() else {
                continue;
            };
            if !(5.0..30.0).contains(&cpu) {
                continue;
            }
            let memory = inst.current_memory;
            if memory.is_some_and(|m| m >= 40.0) {
                continue;
            }
            let Some(smaller) = recommended_smaller_instance(&inst.instance_type) else {
                continue;
            };

            let monthly = inst.hourly_cost * HOURS_PER_MONTH;
            let smaller_monthly = instance_monthly_cost(smaller);
            let savings = monthly - smaller_monthly;
            if savings <= 0.0 {
                continue;
            }

            let mut confidence = 80;
            if cpu < 15.0 {
                confidence += 10;
            }
            if memory.is_some_and(|m| m < 25.0) {
                confidence += 5;
            }
            if is_non_prod(&inst.env) {
                confidence += 5;
            }

            let mut details = serde_json::Map::new();
            details.insert("recommendedInstanceType".to_string(), json!(smaller));
            details.insert("currentInstanceType".to_string(), json!(inst.instance_type));
            details.insert("avgCpu7d".to_string(), json!(cpu));
            if let Some(m) = memory {
                details.insert("currentMemory".to_string(), json!(m));
            }

            out.push(emit(
                ctx,
                self.scenario_id(),
                "rightsize_instance",
                MODE_APPROVAL_REQUIRED,
                target(inst),
                confidence,
                monthly,
                savings,
                format!("Over-provisioned instance {}", inst.display_name()),
                format!(
                    "{} runs at {:.0}% CPU on a {}; a {} would carry the load at lower cost.",
                    inst.display_name(),
                    cpu,
                    inst.instance_type,
                    smaller
                ),
                details,
            ));
        }
        out
    }
}

pub fn get_rules() -> Vec<Box<dyn WasteRule>> {
    vec![
        Box::new(IdleInstanceRule),
        Box::new(IdleCiRunnerRule),
        Box::new(OffHoursDevRule),
        Box::new(OverProvisionedInstanceRule),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::detection::fixtures;
    use crate::services::detection::ResourceSnapshot;

    #[test]
    fn test_idle_instance_confidence_tiers() {
        let mut snapshot = ResourceSnapshot::default();
        let mut inst = fixtures::instance("a");
        inst.env = "dev".to_string();
        inst.avg_cpu_7d = Some(3.0);
        snapshot.instances.push(inst);

        let detections = IdleInstanceRule.evaluate(&fixtures::context(&snapshot));
        assert_eq!(detections.len(), 1);
        let d = &detections[0];
        assert_eq!(d.confidence, 95);
        assert_eq!(d.recommended_action, "stop_instance");
        assert!(d.can_auto_optimize);
        // 90% of t3.small monthly ($14.976)
        assert!((d.potential_savings - 13.4784).abs() < 1e-4);
    }

    #[test]
    fn test_idle_instance_near_zero_cpu_clamps_at_100() {
        let mut snapshot = ResourceSnapshot::default();
        let mut inst = fixtures::instance("a");
        inst.env = "staging".to_string();
        inst.avg_cpu_7d = Some(1.0);
        snapshot.instances.push(inst);

        let detections = IdleInstanceRule.evaluate(&fixtures::context(&snapshot));
        assert_eq!(detections[0].confidence, 100);
    }

    #[test]
    fn test_idle_instance_skips_stopped_and_busy() {
        let mut snapshot = ResourceSnapshot::default();
        let mut stopped = fixtures::instance("a");
        stopped.state = "stopped".to_string();
        stopped.avg_cpu_7d = Some(1.0);
        let busy = fixtures::instance("b");
        snapshot.instances.push(stopped);
        snapshot.instances.push(busy);

        assert!(IdleInstanceRule.evaluate(&fixtures::context(&snapshot)).is_empty());
    }

    #[test]
    fn test_idle_instance_falls_back_to_current_cpu() {
        let mut snapshot = ResourceSnapshot::default();
        let mut inst = fixtures::instance("a");
        inst.avg_cpu_7d = None;
        inst.current_cpu = Some(2.5);
        snapshot.instances.push(inst);

        let detections = IdleInstanceRule.evaluate(&fixtures::context(&snapshot));
        assert_eq!(detections.len(), 1);
    }

    #[test]
    fn test_ci_runner_matches_tags() {
        let mut snapshot = ResourceSnapshot::default();
        let mut inst = fixtures::instance("a");
        inst.avg_cpu_7d = Some(1.0);
        inst.tags.0.insert("role".to_string(), "gitlab-runner".to_string());
        snapshot.instances.push(inst);

        let detections = IdleCiRunnerRule.evaluate(&fixtures::context(&snapshot));
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].confidence, 100);
        assert_eq!(detections[0].potential_savings, detections[0].monthly_cost);
    }

    #[test]
    fn test_off_hours_dev_fires_on_weekend_only_for_dev() {
        use chrono::TimeZone;

        let mut snapshot = ResourceSnapshot::default();
        let mut dev = fixtures::instance("a");
        dev.env = "dev".to_string();
        dev.avg_cpu_7d = Some(2.0);
        let prod = fixtures::instance("b");
        snapshot.instances.push(dev);
        snapshot.instances.push(prod);

        // Saturday noon
        let saturday = Utc.with_ymd_and_hms(2025, 1, 4, 12, 0, 0).unwrap();
        let ctx = RuleContext { snapshot: &snapshot, now: saturday, treat_missing_metrics_as_idle: true };
        let detections = OffHoursDevRule.evaluate(&ctx);
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].confidence, 95);
        assert!((detections[0].potential_savings - detections[0].monthly_cost * 0.6).abs() < 1e-4);

        // Tuesday noon is working hours
        let tuesday = Utc.with_ymd_and_hms(2025, 1, 7, 12, 0, 0).unwrap();
        let ctx = RuleContext { snapshot: &snapshot, now: tuesday, treat_missing_metrics_as_idle: true };
        assert!(OffHoursDevRule.evaluate(&ctx).is_empty());

        // Tuesday 22:00 is off-hours
        let late = Utc.with_ymd_and_hms(2025, 1, 7, 22, 0, 0).unwrap();
        let ctx = RuleContext { snapshot: &snapshot, now: late, treat_missing_metrics_as_idle: true };
        assert_eq!(OffHoursDevRule.evaluate(&ctx).len(), 1);
    }

    #[test]
    fn test_over_provisioned_suggests_smaller_sibling() {
        let mut snapshot = ResourceSnapshot::default();
        let mut inst = fixtures::instance("a");
        inst.instance_type = "t3.large".to_string();
        inst.hourly_cost = 0.0832;
        inst.avg_cpu_7d = Some(12.0);
        inst.current_memory = Some(20.0);
        inst.env = "staging".to_string();
        snapshot.instances.push(inst);

        let detections = OverProvisionedInstanceRule.evaluate(&fixtures::context(&snapshot));
        assert_eq!(detections.len(), 1);
        let d = &detections[0];
        assert_eq!(d.recommended_instance_type(), Some("t3.medium"));
        assert_eq!(d.confidence, 100);
        assert!(d.potential_savings > 0.0);
        assert!(d.potential_savings <= d.monthly_cost);
    }

    #[test]
    fn test_over_provisioned_skips_smallest_in_family() {
        let mut snapshot = ResourceSnapshot::default();
        let mut inst = fixtures::instance("a");
        inst.instance_type = "t3.micro".to_string();
        inst.avg_cpu_7d = Some(12.0);
        inst.current_memory = Some(20.0);
        snapshot.instances.push(inst);

        assert!(OverProvisionedInstanceRule.evaluate(&fixtures::context(&snapshot)).is_empty());
    }
}
