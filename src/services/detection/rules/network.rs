//! Floating IP and load balancer scenarios.

use super::*;
use crate::models::{Detection, ElasticIp, LoadBalancer, MODE_APPROVAL_REQUIRED, MODE_AUTO_SAFE};
use crate::services::pricing::{lb_monthly_cost, unattached_eip_monthly_cost};
use serde_json::json;

fn eip_target(eip: &ElasticIp) -> TargetRef {
    TargetRef {
        resource_type: "elastic_ip",
        resource_id: eip.id.clone(),
        resource_name: eip.public_ip.clone(),
        account_id: eip.account_id.clone(),
        region: eip.region.clone(),
        env: eip.env.clone(),
    }
}

fn lb_target(lb: &LoadBalancer) -> TargetRef {
    TargetRef {
        resource_type: "load_balancer",
        resource_id: lb.id.clone(),
        resource_name: lb.name.clone(),
        account_id: lb.account_id.clone(),
        region: lb.region.clone(),
        env: lb.env.clone(),
    }
}

/// Allocated address not associated with any instance
pub struct OrphanedEipRule;

impl WasteRule for OrphanedEipRule {
    fn scenario_id(&self) -> &'static str {
        "orphaned_eip"
    }

    fn evaluate(&self, ctx: &RuleContext) -> Vec<Detection> {
        let mut out = Vec::new();
        for eip in &ctx.snapshot.elastic_ips {
            if eip.associated_instance_id.is_some() {
                continue;
            }

            let monthly = unattached_eip_monthly_cost();
            let mut details = serde_json::Map::new();
            details.insert("allocationId".to_string(), json!(eip.allocation_id));
            details.insert("publicIp".to_string(), json!(eip.public_ip));

            out.push(emit(
                ctx,
                self.scenario_id(),
                "release_eip",
                MODE_AUTO_SAFE,
                eip_target(eip),
                98,
                monthly,
                monthly,
                format!("Orphaned elastic IP {}", eip.public_ip),
                format!("{} is allocated but not associated with any instance.", eip.public_ip),
                details,
            ));
        }
        out
    }
}

/// Load balancer averaging under 1000 requests over 7 days. A null request
/// count is treated as idle.
pub struct IdleLoadBalancerRule;

impl WasteRule for IdleLoadBalancerRule {
    fn scenario_id(&self) -> &'static str {
        "idle_load_balancer"
    }

    fn evaluate(&self, ctx: &RuleContext) -> Vec<Detection> {
        let mut out = Vec::new();
        for lb in &ctx.snapshot.load_balancers {
            let requests = lb.avg_request_count_7d.unwrap_or(0.0);
            if requests >= 1000.0 {
                continue;
            }

            let monthly = lb_monthly_cost(0.0);
            let confidence = if requests < 100.0 { 95 } else { 80 };

            let mut details = serde_json::Map::new();
            details.insert("lbType".to_string(), json!(lb.lb_type));
            details.insert("avgRequestCount7d".to_string(), json!(requests));

            out.push(emit(
                ctx,
                self.scenario_id(),
                "delete_lb",
                MODE_APPROVAL_REQUIRED,
                lb_target(lb),
                confidence,
                monthly,
                monthly,
                format!("Idle load balancer {}", lb.name),
                format!("{} served {:.0} requests over the last 7 days.", lb.name, requests),
                details,
            ));
        }
        out
    }
}

/// Load balancer with no targets, or none healthy
pub struct EmptyLoadBalancerRule;

impl WasteRule for EmptyLoadBalancerRule {
    fn scenario_id(&self) -> &'static str {
        "empty_load_balancer"
    }

    fn evaluate(&self, ctx: &RuleContext) -> Vec<Detection> {
        let mut out = Vec::new();
        for lb in &ctx.snapshot.load_balancers {
            let no_targets = lb.target_count == 0;
            let none_healthy =
                lb.target_count > 0 && lb.healthy_target_count.is_some_and(|h| h == 0);
            if !no_targets && !none_healthy {
                continue;
            }

            let monthly = lb_monthly_cost(0.0);
            let mut details = serde_json::Map::new();
            details.insert("targetCount".to_string(), json!(lb.target_count));
            if let Some(h) = lb.healthy_target_count {
                details.insert("healthyTargetCount".to_string(), json!(h));
            }

            out.push(emit(
                ctx,
                self.scenario_id(),
                "delete_empty_lb",
                MODE_APPROVAL_REQUIRED,
                lb_target(lb),
                85,
                monthly,
                monthly,
                format!("Empty load balancer {}", lb.name),
                if no_targets {
                    format!("{} has no registered targets.", lb.name)
                } else {
                    format!("{} has {} target(s), none healthy.", lb.name, lb.target_count)
                },
                details,
            ));
        }
        out
    }
}

pub fn get_rules() -> Vec<Box<dyn WasteRule>> {
    vec![
        Box::new(OrphanedEipRule),
        Box::new(IdleLoadBalancerRule),
        Box::new(EmptyLoadBalancerRule),
    ]
}
