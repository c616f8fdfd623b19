//! Managed database and cache scenarios.
//!
//! The idle rules deliberately allow "both metrics null" to count as idle
//! when the policy knob says so; absence of telemetry on a database that has
//! been up for a week usually means nothing connects to it.

use super::*;
use crate::models::{
    CacheCluster, Detection, MODE_APPROVAL_REQUIRED, MODE_AUTO_SAFE, NON_PROD_ENVS, RdsInstance,
    is_non_prod,
};
use crate::services::pricing::{cache_monthly_cost, rds_monthly_cost};
use serde_json::json;

fn rds_target(db: &RdsInstance) -> TargetRef {
    TargetRef {
        resource_type: "rds_instance",
        resource_id: db.id.clone(),
        resource_name: db.db_instance_id.clone(),
        account_id: db.account_id.clone(),
        region: db.region.clone(),
        env: db.env.clone(),
    }
}

fn cache_target(c: &CacheCluster) -> TargetRef {
    TargetRef {
        resource_type: "cache_cluster",
        resource_id: c.id.clone(),
        resource_name: c.cluster_id.clone(),
        account_id: c.account_id.clone(),
        region: c.region.clone(),
        env: c.env.clone(),
    }
}

/// Available database with near-zero CPU or connections
pub struct IdleRdsRule;

impl WasteRule for IdleRdsRule {
    fn scenario_id(&self) -> &'static str {
        "idle_rds"
    }

    fn evaluate(&self, ctx: &RuleContext) -> Vec<Detection> {
        let mut out = Vec::new();
        for db in &ctx.snapshot.rds_instances {
            if db.state != "available" {
                continue;
            }
            let cpu = db.avg_cpu_7d;
            let conn = db.avg_connections_7d;
            let both_null = cpu.is_none() && conn.is_none();

            let idle = cpu.is_some_and(|c| c < 15.0)
                || conn.is_some_and(|c| c <= 1.0)
                || (is_non_prod(&db.env)
                    && cpu.is_some_and(|c| c < 25.0)
                    && conn.is_some_and(|c| c < 5.0))
                || (both_null && ctx.treat_missing_metrics_as_idle);
            if !idle {
                continue;
            }

            let mut confidence = 75;
            if cpu.is_some_and(|c| c < 1.0) {
                confidence += 10;
            }
            if conn.is_some_and(|c| c == 0.0) {
                confidence += 10;
            }

            let monthly = rds_monthly_cost(&db.instance_class);
            let mut details = serde_json::Map::new();
            details.insert("instanceClass".to_string(), json!(db.instance_class));
            details.insert("engine".to_string(), json!(db.engine));
            if let Some(c) = cpu {
                details.insert("avgCpu7d".to_string(), json!(c));
            }
            if let Some(c) = conn {
                details.insert("avgConnections7d".to_string(), json!(c));
            }
            if both_null {
                details.insert("missingMetrics".to_string(), json!(true));
            }

            out.push(emit(
                ctx,
                self.scenario_id(),
                "stop_rds",
                MODE_APPROVAL_REQUIRED,
                rds_target(db),
                confidence,
                monthly,
                monthly * 0.80,
                format!("Idle database {}", db.db_instance_id),
                format!(
                    "{} ({}) shows no meaningful load over the last 7 days.",
                    db.db_instance_id, db.instance_class
                ),
                details,
            ));
        }
        out
    }
}

/// Cache cluster with near-zero CPU or connections
pub struct IdleCacheRule;

impl WasteRule for IdleCacheRule {
    fn scenario_id(&self) -> &'static str {
        "idle_cache"
    }

    fn evaluate(&self, ctx: &RuleContext) -> Vec<Detection> {
        let mut out = Vec::new();
        for cluster in &ctx.snapshot.cache_clusters {
            let cpu = cluster.avg_cpu_7d;
            let conn = cluster.avg_connections_7d;
            let both_null = cpu.is_none() && conn.is_none();

            let idle = cpu.is_some_and(|c| c < 15.0)
                || conn.is_some_and(|c| c <= 3.0)
                || (is_non_prod(&cluster.env)
                    && cpu.is_some_and(|c| c < 25.0)
                    && conn.is_some_and(|c| c < 10.0))
                || (both_null && ctx.treat_missing_metrics_as_idle);
            if !idle {
                continue;
            }

            let mut confidence = 70;
            if cpu.is_some_and(|c| c < 1.0) {
                confidence += 15;
            }
            if conn.is_some_and(|c| c == 0.0) {
                confidence += 10;
            }

            let monthly = cache_monthly_cost(&cluster.node_type, cluster.num_nodes);
            let mut details = serde_json::Map::new();
            details.insert("nodeType".to_string(), json!(cluster.node_type));
            details.insert("numNodes".to_string(), json!(cluster.num_nodes));
            if both_null {
                details.insert("missingMetrics".to_string(), json!(true));
            }

            out.push(emit(
                ctx,
                self.scenario_id(),
                "delete_cache",
                MODE_APPROVAL_REQUIRED,
                cache_target(cluster),
                confidence,
                monthly,
                monthly,
                format!("Idle cache cluster {}", cluster.cluster_id),
                format!(
                    "{} ({} x {}) is serving almost no traffic.",
                    cluster.cluster_id, cluster.num_nodes, cluster.node_type
                ),
                details,
            ));
        }
        out
    }
}

/// Multi-AZ standby on a non-production database
pub struct MultiAzNonProdRule;

impl WasteRule for MultiAzNonProdRule {
    fn scenario_id(&self) -> &'static str {
        "multi_az_non_prod"
    }

    fn evaluate(&self, ctx: &RuleContext) -> Vec<Detection> {
        let mut out = Vec::new();
        for db in &ctx.snapshot.rds_instances {
            if !db.multi_az || !NON_PROD_ENVS.contains(&db.env.as_str()) {
                continue;
            }

            let monthly = rds_monthly_cost(&db.instance_class);
            let mut details = serde_json::Map::new();
            details.insert("instanceClass".to_string(), json!(db.instance_class));

            out.push(emit(
                ctx,
                self.scenario_id(),
                "disable_multi_az",
                MODE_AUTO_SAFE,
                rds_target(db),
                90,
                monthly,
                monthly * 0.50,
                format!("Multi-AZ standby on non-prod database {}", db.db_instance_id),
                format!(
                    "{} runs a Multi-AZ standby in '{}'; non-production rarely needs one.",
                    db.db_instance_id, db.env
                ),
                details,
            ));
        }
        out
    }
}

pub fn get_rules() -> Vec<Box<dyn WasteRule>> {
    vec![Box::new(IdleRdsRule), Box::new(IdleCacheRule), Box::new(MultiAzNonProdRule)]
}
