//! Serverless function scenarios: over-provisioned memory, unused
//! functions and over-configured timeouts.

use super::*;
use crate::models::{Detection, LambdaFunction, MODE_APPROVAL_REQUIRED, MODE_AUTO_SAFE};
use crate::services::pricing::{ASSUMED_LAMBDA_IDLE_MONTHLY, lambda_monthly_cost};
use serde_json::json;

fn target(f: &LambdaFunction) -> TargetRef {
    TargetRef {
        resource_type: "lambda_function",
        resource_id: f.id.clone(),
        resource_name: f.name.clone(),
        account_id: f.account_id.clone(),
        region: f.region.clone(),
        env: f.env.clone(),
    }
}

fn invocations_per_month(f: &LambdaFunction) -> f64 {
    f.invocations_7d.unwrap_or(0) as f64 / 7.0 * 30.0
}

/// Function using under half of its configured memory
pub struct OverProvisionedLambdaRule;

impl WasteRule for OverProvisionedLambdaRule {
    fn scenario_id(&self) -> &'static str {
        "over_provisioned_lambda"
    }

    fn evaluate(&self, ctx: &RuleContext) -> Vec<Detection> {
        let mut out = Vec::new();
        for func in &ctx.snapshot.lambda_functions {
            if func.memory_mb <= 0 {
                continue;
            }
            let Some(used) = func.avg_memory_used_mb_7d else {
                continue;
            };
            let utilization = used / func.memory_mb as f64 * 100.0;
            if utilization >= 50.0 {
                continue;
            }

            // 1.5x headroom over observed usage, rounded up to the 64 MB grid
            let recommended = (((used * 1.5 / 64.0).ceil() * 64.0) as i64).max(128);
            if recommended >= func.memory_mb {
                continue;
            }

            let invocations = invocations_per_month(func);
            let duration = func.avg_duration_ms_7d.unwrap_or(0.0);
            let current_cost = lambda_monthly_cost(func.memory_mb, duration, invocations);
            let recomputed = lambda_monthly_cost(recommended, duration, invocations);

            let mut confidence = 85;
            if utilization < 25.0 {
                confidence += 10;
            }
            if utilization < 10.0 {
                confidence += 5;
            }

            let mut details = serde_json::Map::new();
            details.insert("recommendedMemoryMb".to_string(), json!(recommended));
            details.insert("currentMemoryMb".to_string(), json!(func.memory_mb));
            details.insert("memoryUtilization".to_string(), json!(utilization.trunc()));

            out.push(emit(
                ctx,
                self.scenario_id(),
                "rightsize_lambda",
                MODE_APPROVAL_REQUIRED,
                target(func),
                confidence,
                current_cost,
                current_cost - recomputed,
                format!("Over-provisioned function {}", func.name),
                format!(
                    "{} uses {:.0} MB of its {} MB allocation ({:.0}%); {} MB leaves comfortable headroom.",
                    func.name, used, func.memory_mb, utilization, recommended
                ),
                details,
            ));
        }
        out
    }
}

/// Function with zero (or unknown) invocations over 7 days
pub struct UnusedLambdaRule;

impl WasteRule for UnusedLambdaRule {
    fn scenario_id(&self) -> &'static str {
        "unused_lambda"
    }

    fn evaluate(&self, ctx: &RuleContext) -> Vec<Detection> {
        let mut out = Vec::new();
        for func in &ctx.snapshot.lambda_functions {
            if func.invocations_7d.unwrap_or(0) > 0 {
                continue;
            }

            // Monitoring/alarm overhead is what an unused function actually costs
            let monthly = ASSUMED_LAMBDA_IDLE_MONTHLY;
            let mut details = serde_json::Map::new();
            details.insert("invocations7d".to_string(), json!(func.invocations_7d.unwrap_or(0)));

            out.push(emit(
                ctx,
                self.scenario_id(),
                "delete_lambda",
                MODE_AUTO_SAFE,
                target(func),
                90,
                monthly,
                monthly,
                format!("Unused function {}", func.name),
                format!("{} has not been invoked in the last 7 days.", func.name),
                details,
            ));
        }
        out
    }
}

/// Timeout configured far beyond observed duration; long timeouts amplify
/// the cost of stuck invocations.
pub struct OverConfiguredLambdaTimeoutRule;

impl WasteRule for OverConfiguredLambdaTimeoutRule {
    fn scenario_id(&self) -> &'static str {
        "over_configured_lambda_timeout"
    }

    fn evaluate(&self, ctx: &RuleContext) -> Vec<Detection> {
        let mut out = Vec::new();
        for func in &ctx.snapshot.lambda_functions {
            if func.timeout_seconds < 10 {
                continue;
            }
            let Some(duration_ms) = func.avg_duration_ms_7d else {
                continue;
            };
            let avg_seconds = duration_ms / 1000.0;
            if avg_seconds <= 0.0 || (func.timeout_seconds as f64) < avg_seconds * 3.0 {
                continue;
            }

            let recommended = ((avg_seconds * 2.0).ceil() as i64).max(3);
            let invocations = invocations_per_month(func);
            let monthly = lambda_monthly_cost(func.memory_mb, duration_ms, invocations);

            let mut details = serde_json::Map::new();
            details.insert("recommendedTimeout".to_string(), json!(recommended));
            details.insert("currentTimeout".to_string(), json!(func.timeout_seconds));
            details.insert("avgDurationMs".to_string(), json!(duration_ms));

            out.push(emit(
                ctx,
                self.scenario_id(),
                "optimize_lambda_timeout",
                MODE_APPROVAL_REQUIRED,
                target(func),
                80,
                monthly,
                monthly * 0.10,
                format!("Over-configured timeout on {}", func.name),
                format!(
                    "{} is allowed {}s per invocation but averages {:.1}s; {}s is a safer ceiling.",
                    func.name, func.timeout_seconds, avg_seconds, recommended
                ),
                details,
            ));
        }
        out
    }
}

pub fn get_rules() -> Vec<Box<dyn WasteRule>> {
    vec![
        Box::new(OverProvisionedLambdaRule),
        Box::new(UnusedLambdaRule),
        Box::new(OverConfiguredLambdaTimeoutRule),
    ]
}
