//! Executor: performs one typed row mutation per approved action and leaves
//! exactly one audit row behind, success or not.
//!
//! Handler errors are converted into a failed ActionResult; they never raise
//! past this boundary. The detection scan cache is invalidated after every
//! successful mutation so the next scan reflects the new state.

use crate::models::{
    ActionResult, AuditEntry, ExecuteActionParams, LifecycleRule, LifecycleTransition,
    NoncurrentVersionExpiration,
};
use crate::services::audit_log_service::AuditLogService;
use crate::services::pricing::next_smaller_rds_class;
use crate::services::resource_store::ResourceStore;
use crate::services::scan_cache::ScanCache;
use crate::utils::{ApiError, ApiResult};
use chrono::Utc;
use serde_json::{Value, json};
use sqlx::types::Json;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// What a handler hands back on success: a human-readable message and the
/// before/after view of exactly the fields it changed.
struct HandlerOutcome {
    message: String,
    previous_state: Option<Value>,
    new_state: Option<Value>,
}

pub struct ExecutionService {
    store: Arc<ResourceStore>,
    audit: Arc<AuditLogService>,
    cache: Arc<ScanCache>,
}

impl ExecutionService {
    pub fn new(store: Arc<ResourceStore>, audit: Arc<AuditLogService>, cache: Arc<ScanCache>) -> Self {
        Self { store, audit, cache }
    }

    /// Execute one action. Always appends one audit entry; never raises a
    /// handler failure past this boundary.
    pub async fn execute_action(&self, params: &ExecuteActionParams) -> ApiResult<ActionResult> {
        let started = Instant::now();
        let executed_at = Utc::now();

        let outcome = self.dispatch(params).await;
        let duration_ms = started.elapsed().as_millis() as i64;

        let result = match outcome {
            Ok(o) => {
                tracing::info!(
                    "Action {} on {} '{}' succeeded: {}",
                    params.action,
                    params.resource_type,
                    params.resource_id,
                    o.message
                );
                ActionResult {
                    success: true,
                    action: params.action.clone(),
                    resource_id: params.resource_id.clone(),
                    resource_type: params.resource_type.clone(),
                    message: o.message,
                    previous_state: o.previous_state,
                    new_state: o.new_state,
                    executed_at,
                    duration_ms,
                }
            },
            Err(e) => {
                tracing::warn!(
                    "Action {} on {} '{}' failed: {}",
                    params.action,
                    params.resource_type,
                    params.resource_id,
                    e
                );
                ActionResult {
                    success: false,
                    action: params.action.clone(),
                    resource_id: params.resource_id.clone(),
                    resource_type: params.resource_type.clone(),
                    message: e.to_string(),
                    previous_state: None,
                    new_state: None,
                    executed_at,
                    duration_ms,
                }
            },
        };

        self.log_action(params, &result).await;

        if result.success {
            self.cache.invalidate();
        }

        Ok(result)
    }

    /// Audit write failures are logged, never propagated.
    async fn log_action(&self, params: &ExecuteActionParams, result: &ActionResult) {
        let entry = AuditEntry {
            id: Uuid::new_v4().to_string(),
            action: result.action.clone(),
            resource_type: result.resource_type.clone(),
            resource_id: result.resource_id.clone(),
            resource_name: params
                .resource_name
                .clone()
                .unwrap_or_else(|| result.resource_id.clone()),
            scenario_id: params.scenario_id.clone(),
            detection_id: params.detection_id.clone(),
            success: result.success,
            message: result.message.clone(),
            previous_state: result.previous_state.clone().map(Json),
            new_state: result.new_state.clone().map(Json),
            executed_at: result.executed_at,
            duration_ms: result.duration_ms,
            executed_by: params.executed_by.clone().unwrap_or_else(|| "manual".to_string()),
        };

        if let Err(e) = self.audit.append(&entry).await {
            tracing::error!("Failed to write audit entry for action {}: {}", entry.action, e);
        }
    }

    async fn dispatch(&self, params: &ExecuteActionParams) -> ApiResult<HandlerOutcome> {
        match params.action.as_str() {
            "terminate_instance" => self.set_instance_state(params, "terminated").await,
            "stop_instance" => self.set_instance_state(params, "stopped").await,
            "rightsize_instance" => self.rightsize_instance(params).await,
            "terminate_asg" => self.terminate_asg(params).await,
            "scale_down_asg" => self.scale_down_asg(params).await,
            "enable_asg_scaling" => self.enable_asg_scaling(params).await,
            "release_eip" => self.release_eip(params).await,
            "delete_volume" => self.delete_volume(params).await,
            "upgrade_volume_type" => self.upgrade_volume_type(params).await,
            "delete_snapshot" | "delete_orphaned_snapshot" => self.delete_snapshot(params).await,
            "add_lifecycle_policy" => self.add_lifecycle_policy(params).await,
            "add_version_expiration" => self.add_version_expiration(params).await,
            "set_retention" => self.set_retention(params).await,
            "stop_rds" => self.set_rds_state(params, "stopped").await,
            "downsize_rds" => self.downsize_rds(params).await,
            "disable_multi_az" => self.disable_multi_az(params).await,
            "delete_cache" => self.delete_cache(params).await,
            "delete_lb" | "delete_empty_lb" => self.delete_lb(params).await,
            "delete_lambda" => self.delete_lambda(params).await,
            "rightsize_lambda" => self.rightsize_lambda(params).await,
            "optimize_lambda_timeout" => self.optimize_lambda_timeout(params).await,
            other => Err(ApiError::unknown_action(other)),
        }
    }

    fn not_found(params: &ExecuteActionParams) -> ApiError {
        ApiError::not_found(format!(
            "Resource not found: {} '{}'",
            params.resource_type, params.resource_id
        ))
    }

    // ------------------------------------------------------------------
    // Instances
    // ------------------------------------------------------------------

    async fn set_instance_state(
        &self,
        params: &ExecuteActionParams,
        new_state: &str,
    ) -> ApiResult<HandlerOutcome> {
        let inst = self
            .store
            .get_instance(&params.resource_id)
            .await?
            .ok_or_else(|| Self::not_found(params))?;

        self.store.update_instance_state(&inst.id, new_state).await?;

        Ok(HandlerOutcome {
            message: format!("Instance {} is now {}", inst.instance_id, new_state),
            previous_state: Some(json!({ "state": inst.state })),
            new_state: Some(json!({ "state": new_state })),
        })
    }

    async fn rightsize_instance(&self, params: &ExecuteActionParams) -> ApiResult<HandlerOutcome> {
        let recommended = params
            .detail_str("recommendedInstanceType")
            .ok_or_else(|| ApiError::missing_detail("recommendedInstanceType"))?
            .to_string();

        let inst = self
            .store
            .get_instance(&params.resource_id)
            .await?
            .ok_or_else(|| Self::not_found(params))?;

        self.store.update_instance_type(&inst.id, &recommended).await?;

        Ok(HandlerOutcome {
            message: format!(
                "Instance {} resized from {} to {}",
                inst.instance_id, inst.instance_type, recommended
            ),
            previous_state: Some(json!({ "instance_type": inst.instance_type })),
            new_state: Some(json!({ "instance_type": recommended })),
        })
    }

    // ------------------------------------------------------------------
    // Autoscaling groups
    // ------------------------------------------------------------------

    async fn terminate_asg(&self, params: &ExecuteActionParams) -> ApiResult<HandlerOutcome> {
        let asg = self
            .store
            .get_autoscaling_group(&params.resource_id)
            .await?
            .ok_or_else(|| Self::not_found(params))?;

        self.store.update_asg_capacity(&asg.id, 0, 0, 0).await?;

        Ok(HandlerOutcome {
            message: format!("Autoscaling group {} scaled to zero", asg.name),
            previous_state: Some(json!({
                "min_size": asg.min_size,
                "max_size": asg.max_size,
                "desired_capacity": asg.desired_capacity,
            })),
            new_state: Some(json!({ "min_size": 0, "max_size": 0, "desired_capacity": 0 })),
        })
    }

    async fn scale_down_asg(&self, params: &ExecuteActionParams) -> ApiResult<HandlerOutcome> {
        let asg = self
            .store
            .get_autoscaling_group(&params.resource_id)
            .await?
            .ok_or_else(|| Self::not_found(params))?;

        let new_desired = (asg.desired_capacity / 2).max(1);
        let new_min = asg.min_size.min(new_desired);
        self.store
            .update_asg_capacity(&asg.id, new_min, asg.max_size, new_desired)
            .await?;

        Ok(HandlerOutcome {
            message: format!(
                "Autoscaling group {} scaled down from {} to {} instance(s)",
                asg.name, asg.desired_capacity, new_desired
            ),
            previous_state: Some(json!({
                "min_size": asg.min_size,
                "desired_capacity": asg.desired_capacity,
            })),
            new_state: Some(json!({ "min_size": new_min, "desired_capacity": new_desired })),
        })
    }

    async fn enable_asg_scaling(&self, params: &ExecuteActionParams) -> ApiResult<HandlerOutcome> {
        let asg = self
            .store
            .get_autoscaling_group(&params.resource_id)
            .await?
            .ok_or_else(|| Self::not_found(params))?;

        let new_max = (asg.desired_capacity * 2).max(4);
        self.store
            .update_asg_capacity(&asg.id, 1, new_max, asg.desired_capacity)
            .await?;

        Ok(HandlerOutcome {
            message: format!("Dynamic scaling enabled on {} (1..{})", asg.name, new_max),
            previous_state: Some(json!({ "min_size": asg.min_size, "max_size": asg.max_size })),
            new_state: Some(json!({ "min_size": 1, "max_size": new_max })),
        })
    }

    // ------------------------------------------------------------------
    // Elastic IPs
    // ------------------------------------------------------------------

    async fn release_eip(&self, params: &ExecuteActionParams) -> ApiResult<HandlerOutcome> {
        let eip = self
            .store
            .get_elastic_ip(&params.resource_id)
            .await?
            .ok_or_else(|| Self::not_found(params))?;

        self.store.delete_elastic_ip(&eip.id).await?;

        Ok(HandlerOutcome {
            message: format!("Elastic IP {} released", eip.public_ip),
            previous_state: Some(json!({
                "allocation_id": eip.allocation_id,
                "public_ip": eip.public_ip,
                "state": eip.state,
            })),
            new_state: None,
        })
    }

    // ------------------------------------------------------------------
    // Volumes and snapshots
    // ------------------------------------------------------------------

    async fn delete_volume(&self, params: &ExecuteActionParams) -> ApiResult<HandlerOutcome> {
        let vol = self
            .store
            .get_volume(&params.resource_id)
            .await?
            .ok_or_else(|| Self::not_found(params))?;

        self.store.update_volume_state(&vol.id, "deleted").await?;

        Ok(HandlerOutcome {
            message: format!("Volume {} deleted", vol.volume_id),
            previous_state: Some(json!({ "state": vol.state })),
            new_state: Some(json!({ "state": "deleted" })),
        })
    }

    async fn upgrade_volume_type(&self, params: &ExecuteActionParams) -> ApiResult<HandlerOutcome> {
        let vol = self
            .store
            .get_volume(&params.resource_id)
            .await?
            .ok_or_else(|| Self::not_found(params))?;

        self.store.update_volume_type(&vol.id, "gp3").await?;

        Ok(HandlerOutcome {
            message: format!("Volume {} migrated to gp3", vol.volume_id),
            previous_state: Some(json!({ "volume_type": vol.volume_type })),
            new_state: Some(json!({ "volume_type": "gp3" })),
        })
    }

    async fn delete_snapshot(&self, params: &ExecuteActionParams) -> ApiResult<HandlerOutcome> {
        let snap = self
            .store
            .get_snapshot(&params.resource_id)
            .await?
            .ok_or_else(|| Self::not_found(params))?;

        self.store.delete_snapshot(&snap.id).await?;

        Ok(HandlerOutcome {
            message: format!("Snapshot {} deleted", snap.snapshot_id),
            previous_state: Some(json!({
                "snapshot_id": snap.snapshot_id,
                "size_gib": snap.size_gib,
                "source_volume_id": snap.source_volume_id,
            })),
            new_state: None,
        })
    }

    // ------------------------------------------------------------------
    // S3 buckets and log groups
    // ------------------------------------------------------------------

    async fn add_lifecycle_policy(&self, params: &ExecuteActionParams) -> ApiResult<HandlerOutcome> {
        let bucket = self
            .store
            .get_s3_bucket(&params.resource_id)
            .await?
            .ok_or_else(|| Self::not_found(params))?;

        let previous = serde_json::to_value(&bucket.lifecycle_rules.0)
            .unwrap_or_else(|_| Value::Array(vec![]));

        let mut rules = bucket.lifecycle_rules.0.clone();
        rules.push(LifecycleRule {
            id: "intelligent-tiering".to_string(),
            status: "Enabled".to_string(),
            transitions: vec![
                LifecycleTransition { days: 30, storage_class: "INTELLIGENT_TIERING".to_string() },
                LifecycleTransition { days: 90, storage_class: "GLACIER".to_string() },
            ],
            noncurrent_version_expiration: None,
        });
        self.store.update_bucket_lifecycle_rules(&bucket.id, &rules).await?;

        let new = serde_json::to_value(&rules).unwrap_or_else(|_| Value::Array(vec![]));
        Ok(HandlerOutcome {
            message: format!("Tiering lifecycle policy added to bucket {}", bucket.name),
            previous_state: Some(json!({ "lifecycle_rules": previous })),
            new_state: Some(json!({ "lifecycle_rules": new })),
        })
    }

    async fn add_version_expiration(
        &self,
        params: &ExecuteActionParams,
    ) -> ApiResult<HandlerOutcome> {
        let bucket = self
            .store
            .get_s3_bucket(&params.resource_id)
            .await?
            .ok_or_else(|| Self::not_found(params))?;

        let previous = serde_json::to_value(&bucket.lifecycle_rules.0)
            .unwrap_or_else(|_| Value::Array(vec![]));

        let mut rules = bucket.lifecycle_rules.0.clone();
        rules.push(LifecycleRule {
            id: "expire-noncurrent-versions".to_string(),
            status: "Enabled".to_string(),
            transitions: vec![],
            noncurrent_version_expiration: Some(NoncurrentVersionExpiration { days: 30 }),
        });
        self.store.update_bucket_lifecycle_rules(&bucket.id, &rules).await?;

        let new = serde_json::to_value(&rules).unwrap_or_else(|_| Value::Array(vec![]));
        Ok(HandlerOutcome {
            message: format!("Noncurrent-version expiration added to bucket {}", bucket.name),
            previous_state: Some(json!({ "lifecycle_rules": previous })),
            new_state: Some(json!({ "lifecycle_rules": new })),
        })
    }

    async fn set_retention(&self, params: &ExecuteActionParams) -> ApiResult<HandlerOutcome> {
        let group = self
            .store
            .get_log_group(&params.resource_id)
            .await?
            .ok_or_else(|| Self::not_found(params))?;

        self.store.update_log_group_retention(&group.id, 30).await?;

        Ok(HandlerOutcome {
            message: format!("Retention on log group {} set to 30 days", group.name),
            previous_state: Some(json!({ "retention_in_days": group.retention_in_days })),
            new_state: Some(json!({ "retention_in_days": 30 })),
        })
    }

    // ------------------------------------------------------------------
    // Managed databases and caches
    // ------------------------------------------------------------------

    async fn set_rds_state(
        &self,
        params: &ExecuteActionParams,
        new_state: &str,
    ) -> ApiResult<HandlerOutcome> {
        let db = self
            .store
            .get_rds_instance(&params.resource_id)
            .await?
            .ok_or_else(|| Self::not_found(params))?;

        self.store.update_rds_state(&db.id, new_state).await?;

        Ok(HandlerOutcome {
            message: format!("Database {} is now {}", db.db_instance_id, new_state),
            previous_state: Some(json!({ "state": db.state })),
            new_state: Some(json!({ "state": new_state })),
        })
    }

    async fn downsize_rds(&self, params: &ExecuteActionParams) -> ApiResult<HandlerOutcome> {
        let db = self
            .store
            .get_rds_instance(&params.resource_id)
            .await?
            .ok_or_else(|| Self::not_found(params))?;

        let Some(smaller) = next_smaller_rds_class(&db.instance_class) else {
            // Already at the floor of the ladder
            return Ok(HandlerOutcome {
                message: format!(
                    "Database {} is already at the smallest class ({})",
                    db.db_instance_id, db.instance_class
                ),
                previous_state: Some(json!({ "instance_class": db.instance_class })),
                new_state: Some(json!({ "instance_class": db.instance_class })),
            });
        };

        self.store.update_rds_class(&db.id, smaller).await?;

        Ok(HandlerOutcome {
            message: format!(
                "Database {} downsized from {} to {}",
                db.db_instance_id, db.instance_class, smaller
            ),
            previous_state: Some(json!({ "instance_class": db.instance_class })),
            new_state: Some(json!({ "instance_class": smaller })),
        })
    }

    async fn disable_multi_az(&self, params: &ExecuteActionParams) -> ApiResult<HandlerOutcome> {
        let db = self
            .store
            .get_rds_instance(&params.resource_id)
            .await?
            .ok_or_else(|| Self::not_found(params))?;

        self.store.update_rds_multi_az(&db.id, false).await?;

        Ok(HandlerOutcome {
            message: format!("Multi-AZ disabled on database {}", db.db_instance_id),
            previous_state: Some(json!({ "multi_az": db.multi_az })),
            new_state: Some(json!({ "multi_az": false })),
        })
    }

    async fn delete_cache(&self, params: &ExecuteActionParams) -> ApiResult<HandlerOutcome> {
        let cluster = self
            .store
            .get_cache_cluster(&params.resource_id)
            .await?
            .ok_or_else(|| Self::not_found(params))?;

        self.store.delete_cache_cluster(&cluster.id).await?;

        Ok(HandlerOutcome {
            message: format!("Cache cluster {} deleted", cluster.cluster_id),
            previous_state: Some(json!({
                "cluster_id": cluster.cluster_id,
                "node_type": cluster.node_type,
                "num_nodes": cluster.num_nodes,
            })),
            new_state: None,
        })
    }

    // ------------------------------------------------------------------
    // Load balancers and serverless functions
    // ------------------------------------------------------------------

    async fn delete_lb(&self, params: &ExecuteActionParams) -> ApiResult<HandlerOutcome> {
        let lb = self
            .store
            .get_load_balancer(&params.resource_id)
            .await?
            .ok_or_else(|| Self::not_found(params))?;

        self.store.delete_load_balancer(&lb.id).await?;

        Ok(HandlerOutcome {
            message: format!("Load balancer {} deleted", lb.name),
            previous_state: Some(json!({
                "lb_arn": lb.lb_arn,
                "name": lb.name,
                "target_count": lb.target_count,
            })),
            new_state: None,
        })
    }

    async fn delete_lambda(&self, params: &ExecuteActionParams) -> ApiResult<HandlerOutcome> {
        let func = self
            .store
            .get_lambda_function(&params.resource_id)
            .await?
            .ok_or_else(|| Self::not_found(params))?;

        self.store.delete_lambda_function(&func.id).await?;

        Ok(HandlerOutcome {
            message: format!("Function {} deleted", func.name),
            previous_state: Some(json!({ "name": func.name, "memory_mb": func.memory_mb })),
            new_state: None,
        })
    }

    async fn rightsize_lambda(&self, params: &ExecuteActionParams) -> ApiResult<HandlerOutcome> {
        let func = self
            .store
            .get_lambda_function(&params.resource_id)
            .await?
            .ok_or_else(|| Self::not_found(params))?;

        let new_memory = (func.memory_mb / 2).max(128);
        self.store.update_lambda_memory(&func.id, new_memory).await?;

        Ok(HandlerOutcome {
            message: format!(
                "Function {} memory reduced from {} MB to {} MB",
                func.name, func.memory_mb, new_memory
            ),
            previous_state: Some(json!({ "memory_mb": func.memory_mb })),
            new_state: Some(json!({ "memory_mb": new_memory })),
        })
    }

    async fn optimize_lambda_timeout(
        &self,
        params: &ExecuteActionParams,
    ) -> ApiResult<HandlerOutcome> {
        let recommended = params
            .detail_i64("recommendedTimeout")
            .ok_or_else(|| ApiError::missing_detail("recommendedTimeout"))?;

        let func = self
            .store
            .get_lambda_function(&params.resource_id)
            .await?
            .ok_or_else(|| Self::not_found(params))?;

        self.store.update_lambda_timeout(&func.id, recommended).await?;

        Ok(HandlerOutcome {
            message: format!(
                "Function {} timeout reduced from {}s to {}s",
                func.name, func.timeout_seconds, recommended
            ),
            previous_state: Some(json!({ "timeout_seconds": func.timeout_seconds })),
            new_state: Some(json!({ "timeout_seconds": recommended })),
        })
    }
}
