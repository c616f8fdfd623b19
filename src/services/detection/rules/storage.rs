//! Block storage, snapshot, object-storage and log-group scenarios.

use super::*;
use crate::models::{
    Detection, LogGroup, MODE_AUTO_SAFE, S3Bucket, Snapshot, Volume,
};
use crate::services::pricing::{
    ASSUMED_LOG_GROUP_MONTHLY, ASSUMED_VERSIONING_OVERHEAD_MONTHLY, S3_DEFAULT_ASSUMED_GIB,
    S3_STANDARD_GIB_MONTH, s3_tiering_savings, snapshot_monthly_cost, volume_monthly_cost,
};
use serde_json::json;
use std::collections::HashMap;

fn volume_target(v: &Volume) -> TargetRef {
    TargetRef {
        resource_type: "volume",
        resource_id: v.id.clone(),
        resource_name: v.volume_id.clone(),
        account_id: v.account_id.clone(),
        region: v.region.clone(),
        env: v.env.clone(),
    }
}

fn snapshot_target(s: &Snapshot) -> TargetRef {
    TargetRef {
        resource_type: "snapshot",
        resource_id: s.id.clone(),
        resource_name: s.snapshot_id.clone(),
        account_id: s.account_id.clone(),
        region: s.region.clone(),
        env: s.env.clone(),
    }
}

fn bucket_target(b: &S3Bucket) -> TargetRef {
    TargetRef {
        resource_type: "s3_bucket",
        resource_id: b.id.clone(),
        resource_name: b.name.clone(),
        account_id: b.account_id.clone(),
        region: b.region.clone(),
        env: b.env.clone(),
    }
}

fn log_group_target(g: &LogGroup) -> TargetRef {
    TargetRef {
        resource_type: "log_group",
        resource_id: g.id.clone(),
        resource_name: g.name.clone(),
        account_id: g.account_id.clone(),
        region: g.region.clone(),
        env: g.env.clone(),
    }
}

/// Volume detached from any instance
pub struct UnattachedVolumeRule;

impl WasteRule for UnattachedVolumeRule {
    fn scenario_id(&self) -> &'static str {
        "unattached_volume"
    }

    fn evaluate(&self, ctx: &RuleContext) -> Vec<Detection> {
        let mut out = Vec::new();
        for vol in &ctx.snapshot.volumes {
            if vol.state != "available" {
                continue;
            }

            let monthly = volume_monthly_cost(&vol.volume_type, vol.size_gib);
            // No creation time on volumes; last-modified is the detach proxy
            let idle_days = (ctx.now - vol.updated_at).num_days();
            let confidence = if idle_days > 30 { 95 } else { 85 };

            let mut details = serde_json::Map::new();
            details.insert("volumeType".to_string(), json!(vol.volume_type));
            details.insert("sizeGib".to_string(), json!(vol.size_gib));

            out.push(emit(
                ctx,
                self.scenario_id(),
                "delete_volume",
                MODE_AUTO_SAFE,
                volume_target(vol),
                confidence,
                monthly,
                monthly,
                format!("Unattached volume {}", vol.volume_id),
                format!(
                    "{} ({} GiB {}) is not attached to any instance.",
                    vol.volume_id, vol.size_gib, vol.volume_type
                ),
                details,
            ));
        }
        out
    }
}

/// gp2 volume that could be migrated to gp3 at ~20% lower cost
pub struct Gp2VolumeRule;

impl WasteRule for Gp2VolumeRule {
    fn scenario_id(&self) -> &'static str {
        "gp2_volume"
    }

    fn evaluate(&self, ctx: &RuleContext) -> Vec<Detection> {
        let mut out = Vec::new();
        for vol in &ctx.snapshot.volumes {
            if vol.volume_type != "gp2" || vol.state == "deleted" {
                continue;
            }

            let gp2_cost = volume_monthly_cost("gp2", vol.size_gib);
            let gp3_cost = volume_monthly_cost("gp3", vol.size_gib);

            let mut details = serde_json::Map::new();
            details.insert("sizeGib".to_string(), json!(vol.size_gib));
            details.insert("gp3MonthlyCost".to_string(), json!(gp3_cost));

            out.push(emit(
                ctx,
                self.scenario_id(),
                "upgrade_volume_type",
                MODE_AUTO_SAFE,
                volume_target(vol),
                95,
                gp2_cost,
                gp2_cost - gp3_cost,
                format!("gp2 volume {}", vol.volume_id),
                format!(
                    "{} ({} GiB) is on gp2; gp3 offers the same baseline performance for less.",
                    vol.volume_id, vol.size_gib
                ),
                details,
            ));
        }
        out
    }
}

/// Snapshot older than 90 days
pub struct OldSnapshotRule;

impl WasteRule for OldSnapshotRule {
    fn scenario_id(&self) -> &'static str {
        "old_snapshot"
    }

    fn evaluate(&self, ctx: &RuleContext) -> Vec<Detection> {
        let mut out = Vec::new();
        for snap in &ctx.snapshot.snapshots {
            let age = snap.age_days(ctx.now);
            if age <= 90 {
                continue;
            }

            let mut confidence = 70;
            if age > 180 {
                confidence += 15;
            }
            if age > 365 {
                confidence += 10;
            }

            let monthly = snapshot_monthly_cost(snap.size_gib);
            let mut details = serde_json::Map::new();
            details.insert("ageDays".to_string(), json!(age));
            details.insert("sizeGib".to_string(), json!(snap.size_gib));

            out.push(emit(
                ctx,
                self.scenario_id(),
                "delete_snapshot",
                MODE_AUTO_SAFE,
                snapshot_target(snap),
                confidence,
                monthly,
                monthly,
                format!("Old snapshot {}", snap.snapshot_id),
                format!("{} is {} days old with no retention policy keeping it.", snap.snapshot_id, age),
                details,
            ));
        }
        out
    }
}

/// Snapshot whose source volume no longer exists (or is deleted)
pub struct OrphanedSnapshotRule;

impl WasteRule for OrphanedSnapshotRule {
    fn scenario_id(&self) -> &'static str {
        "orphaned_snapshot"
    }

    fn evaluate(&self, ctx: &RuleContext) -> Vec<Detection> {
        let volume_states: HashMap<&str, &str> = ctx
            .snapshot
            .volumes
            .iter()
            .map(|v| (v.volume_id.as_str(), v.state.as_str()))
            .collect();

        let mut out = Vec::new();
        for snap in &ctx.snapshot.snapshots {
            let Some(source) = snap.source_volume_id.as_deref() else {
                continue;
            };
            let orphaned = match volume_states.get(source) {
                None => true,
                Some(state) => *state == "deleted",
            };
            if !orphaned {
                continue;
            }

            let monthly = snapshot_monthly_cost(snap.size_gib);
            let mut details = serde_json::Map::new();
            details.insert("sourceVolumeId".to_string(), json!(source));
            details.insert("sizeGib".to_string(), json!(snap.size_gib));

            out.push(emit(
                ctx,
                self.scenario_id(),
                "delete_orphaned_snapshot",
                MODE_AUTO_SAFE,
                snapshot_target(snap),
                85,
                monthly,
                monthly,
                format!("Orphaned snapshot {}", snap.snapshot_id),
                format!(
                    "{} references volume {} which no longer exists.",
                    snap.snapshot_id, source
                ),
                details,
            ));
        }
        out
    }
}

/// Bucket with no lifecycle rules at all
pub struct S3NoLifecycleRule;

impl WasteRule for S3NoLifecycleRule {
    fn scenario_id(&self) -> &'static str {
        "s3_no_lifecycle"
    }

    fn evaluate(&self, ctx: &RuleContext) -> Vec<Detection> {
        let mut out = Vec::new();
        for bucket in &ctx.snapshot.s3_buckets {
            if bucket.has_lifecycle_rules() {
                continue;
            }

            let monthly = S3_DEFAULT_ASSUMED_GIB * S3_STANDARD_GIB_MONTH;
            let savings = s3_tiering_savings(S3_DEFAULT_ASSUMED_GIB);

            let mut details = serde_json::Map::new();
            details.insert("assumedSizeGib".to_string(), json!(S3_DEFAULT_ASSUMED_GIB));

            out.push(emit(
                ctx,
                self.scenario_id(),
                "add_lifecycle_policy",
                MODE_AUTO_SAFE,
                bucket_target(bucket),
                90,
                monthly,
                savings,
                format!("No lifecycle policy on bucket {}", bucket.name),
                format!(
                    "{} keeps everything in the Standard tier; a 30/90-day tiering rule moves cold data to IA and Glacier.",
                    bucket.name
                ),
                details,
            ));
        }
        out
    }
}

/// Versioned bucket that never expires noncurrent object versions
pub struct S3NoVersionExpirationRule;

impl WasteRule for S3NoVersionExpirationRule {
    fn scenario_id(&self) -> &'static str {
        "s3_no_version_expiration"
    }

    fn evaluate(&self, ctx: &RuleContext) -> Vec<Detection> {
        let mut out = Vec::new();
        for bucket in &ctx.snapshot.s3_buckets {
            if !bucket.versioning_enabled || bucket.has_noncurrent_version_expiration() {
                continue;
            }

            let monthly = ASSUMED_VERSIONING_OVERHEAD_MONTHLY;
            let mut details = serde_json::Map::new();
            details.insert("versioningEnabled".to_string(), json!(true));

            out.push(emit(
                ctx,
                self.scenario_id(),
                "add_version_expiration",
                MODE_AUTO_SAFE,
                bucket_target(bucket),
                85,
                monthly,
                monthly * 0.70,
                format!("Unbounded version history on bucket {}", bucket.name),
                format!(
                    "{} has versioning enabled but no noncurrent-version expiration; old versions accumulate forever.",
                    bucket.name
                ),
                details,
            ));
        }
        out
    }
}

/// Log group retaining everything forever
pub struct LogNoRetentionRule;

impl WasteRule for LogNoRetentionRule {
    fn scenario_id(&self) -> &'static str {
        "log_no_retention"
    }

    fn evaluate(&self, ctx: &RuleContext) -> Vec<Detection> {
        let mut out = Vec::new();
        for group in &ctx.snapshot.log_groups {
            if group.retention_days.is_some() || group.retention_in_days.is_some() {
                continue;
            }

            let monthly = ASSUMED_LOG_GROUP_MONTHLY;
            let details = serde_json::Map::new();

            out.push(emit(
                ctx,
                self.scenario_id(),
                "set_retention",
                MODE_AUTO_SAFE,
                log_group_target(group),
                90,
                monthly,
                monthly * 0.90,
                format!("No retention on log group {}", group.name),
                format!("{} retains logs indefinitely; a 30-day policy caps the growth.", group.name),
                details,
            ));
        }
        out
    }
}

pub fn get_rules() -> Vec<Box<dyn WasteRule>> {
    vec![
        Box::new(UnattachedVolumeRule),
        Box::new(Gp2VolumeRule),
        Box::new(OldSnapshotRule),
        Box::new(OrphanedSnapshotRule),
        Box::new(S3NoLifecycleRule),
        Box::new(S3NoVersionExpirationRule),
        Box::new(LogNoRetentionRule),
    ]
}
