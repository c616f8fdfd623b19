// Executor contract: typed mutations, natural-key fallback, audit
// completeness and previous-state capture.

use crate::models::ExecuteActionParams;
use crate::services::detection::fixtures;
use crate::tests::common::harness;
use serde_json::{Map, Value, json};

fn params(action: &str, resource_type: &str, resource_id: &str) -> ExecuteActionParams {
    ExecuteActionParams {
        action: action.to_string(),
        resource_type: resource_type.to_string(),
        resource_id: resource_id.to_string(),
        resource_name: None,
        detection_id: None,
        scenario_id: None,
        details: None,
        executed_by: None,
    }
}

#[tokio::test]
async fn test_unknown_action_is_rejected_and_audited() {
    let h = harness().await;
    h.store.insert_instance(&fixtures::instance("a")).await.unwrap();

    let result = h
        .executor
        .execute_action(&params("nuke_everything", "instance", "res-a"))
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.message, "Unknown action type: nuke_everything");

    // Failed attempt still lands on the audit log
    let audit = h.audit.list_recent(10).await.unwrap();
    assert_eq!(audit.len(), 1);
    assert!(!audit[0].success);
    assert_eq!(audit[0].action, "nuke_everything");

    // No rows mutated
    let inst = h.store.get_instance("res-a").await.unwrap().unwrap();
    assert_eq!(inst.state, "running");
}

#[tokio::test]
async fn test_every_invocation_writes_exactly_one_audit_row() {
    let h = harness().await;
    h.store.insert_instance(&fixtures::instance("a")).await.unwrap();

    h.executor
        .execute_action(&params("stop_instance", "instance", "res-a"))
        .await
        .unwrap();
    assert_eq!(h.audit.count().await.unwrap(), 1);

    h.executor
        .execute_action(&params("bogus", "instance", "res-a"))
        .await
        .unwrap();
    assert_eq!(h.audit.count().await.unwrap(), 2);

    h.executor
        .execute_action(&params("stop_instance", "instance", "missing"))
        .await
        .unwrap();
    assert_eq!(h.audit.count().await.unwrap(), 3);
}

#[tokio::test]
async fn test_natural_key_fallback() {
    let h = harness().await;
    let inst = fixtures::instance("a");
    h.store.insert_instance(&inst).await.unwrap();

    // Callers may pass the human-meaningful identifier instead of the row id
    let result = h
        .executor
        .execute_action(&params("stop_instance", "instance", &inst.instance_id))
        .await
        .unwrap();
    assert!(result.success);

    let reread = h.store.get_instance(&inst.id).await.unwrap().unwrap();
    assert_eq!(reread.state, "stopped");
}

#[tokio::test]
async fn test_resource_not_found_after_both_keys() {
    let h = harness().await;

    let result = h
        .executor
        .execute_action(&params("stop_instance", "instance", "i-nonexistent"))
        .await
        .unwrap();
    assert!(!result.success);
    assert!(result.message.contains("Resource not found"));
}

#[tokio::test]
async fn test_previous_state_round_trip() {
    let h = harness().await;
    let inst = fixtures::instance("a");
    h.store.insert_instance(&inst).await.unwrap();

    let result = h
        .executor
        .execute_action(&params("stop_instance", "instance", &inst.id))
        .await
        .unwrap();
    assert!(result.success);

    let previous = result.previous_state.expect("previous state captured");
    assert_eq!(previous, json!({ "state": "running" }));

    // Applying the reverse mutation from the audited previous_state restores
    // the captured subset exactly
    let prior_state = previous.get("state").and_then(Value::as_str).unwrap();
    h.store.update_instance_state(&inst.id, prior_state).await.unwrap();
    let restored = h.store.get_instance(&inst.id).await.unwrap().unwrap();
    assert_eq!(restored.state, inst.state);
}

#[tokio::test]
async fn test_rightsize_instance_requires_detail() {
    let h = harness().await;
    let inst = fixtures::instance("a");
    h.store.insert_instance(&inst).await.unwrap();

    let bare = h
        .executor
        .execute_action(&params("rightsize_instance", "instance", &inst.id))
        .await
        .unwrap();
    assert!(!bare.success);
    assert!(bare.message.contains("recommendedInstanceType"));

    let mut details = Map::new();
    details.insert("recommendedInstanceType".to_string(), json!("t3.micro"));
    let mut with_detail = params("rightsize_instance", "instance", &inst.id);
    with_detail.details = Some(details);

    let result = h.executor.execute_action(&with_detail).await.unwrap();
    assert!(result.success);
    let reread = h.store.get_instance(&inst.id).await.unwrap().unwrap();
    assert_eq!(reread.instance_type, "t3.micro");
    // Catalog rate follows the new type
    assert!((reread.hourly_cost - 0.0104).abs() < 1e-9);
}

#[tokio::test]
async fn test_asg_capacity_actions() {
    let h = harness().await;
    let mut asg = fixtures::asg("web");
    asg.min_size = 2;
    asg.max_size = 8;
    asg.desired_capacity = 6;
    h.store.insert_autoscaling_group(&asg).await.unwrap();

    let result = h
        .executor
        .execute_action(&params("scale_down_asg", "autoscaling_group", &asg.id))
        .await
        .unwrap();
    assert!(result.success);
    let halved = h.store.get_autoscaling_group(&asg.id).await.unwrap().unwrap();
    assert_eq!(halved.desired_capacity, 3);
    assert_eq!(halved.min_size, 2);

    let result = h
        .executor
        .execute_action(&params("terminate_asg", "autoscaling_group", &asg.id))
        .await
        .unwrap();
    assert!(result.success);
    let emptied = h.store.get_autoscaling_group(&asg.id).await.unwrap().unwrap();
    assert_eq!(
        (emptied.min_size, emptied.max_size, emptied.desired_capacity),
        (0, 0, 0)
    );
}

#[tokio::test]
async fn test_enable_asg_scaling_bounds() {
    let h = harness().await;
    let mut asg = fixtures::asg("pinned");
    asg.min_size = 3;
    asg.max_size = 3;
    asg.desired_capacity = 3;
    h.store.insert_autoscaling_group(&asg).await.unwrap();

    let result = h
        .executor
        .execute_action(&params("enable_asg_scaling", "autoscaling_group", &asg.id))
        .await
        .unwrap();
    assert!(result.success);
    let scaled = h.store.get_autoscaling_group(&asg.id).await.unwrap().unwrap();
    assert_eq!(scaled.min_size, 1);
    assert_eq!(scaled.max_size, 6);
    assert_eq!(scaled.desired_capacity, 3);
}

#[tokio::test]
async fn test_volume_and_snapshot_actions() {
    let h = harness().await;
    let mut vol = fixtures::volume("a");
    vol.volume_type = "gp2".to_string();
    h.store.insert_volume(&vol).await.unwrap();
    let snap = fixtures::snapshot_row("b");
    h.store.insert_snapshot(&snap).await.unwrap();

    let result = h
        .executor
        .execute_action(&params("upgrade_volume_type", "volume", &vol.id))
        .await
        .unwrap();
    assert!(result.success);
    assert_eq!(
        h.store.get_volume(&vol.id).await.unwrap().unwrap().volume_type,
        "gp3"
    );

    let result = h
        .executor
        .execute_action(&params("delete_volume", "volume", &vol.id))
        .await
        .unwrap();
    assert!(result.success);
    // Soft delete: the row survives with state=deleted
    assert_eq!(h.store.get_volume(&vol.id).await.unwrap().unwrap().state, "deleted");

    let result = h
        .executor
        .execute_action(&params("delete_snapshot", "snapshot", &snap.id))
        .await
        .unwrap();
    assert!(result.success);
    assert!(h.store.get_snapshot(&snap.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_bucket_policy_actions_append_rules() {
    let h = harness().await;
    let mut bucket = fixtures::bucket("assets");
    bucket.lifecycle_rules = sqlx::types::Json(vec![]);
    bucket.versioning_enabled = true;
    h.store.insert_s3_bucket(&bucket).await.unwrap();

    h.executor
        .execute_action(&params("add_lifecycle_policy", "s3_bucket", &bucket.id))
        .await
        .unwrap();
    h.executor
        .execute_action(&params("add_version_expiration", "s3_bucket", &bucket.id))
        .await
        .unwrap();

    let reread = h.store.get_s3_bucket(&bucket.id).await.unwrap().unwrap();
    assert_eq!(reread.lifecycle_rules.len(), 2);
    // Insertion order preserved
    assert_eq!(reread.lifecycle_rules[0].id, "intelligent-tiering");
    assert_eq!(reread.lifecycle_rules[0].transitions.len(), 2);
    assert_eq!(reread.lifecycle_rules[1].id, "expire-noncurrent-versions");
    assert_eq!(
        reread.lifecycle_rules[1]
            .noncurrent_version_expiration
            .as_ref()
            .map(|e| e.days),
        Some(30)
    );
}

#[tokio::test]
async fn test_set_retention_and_rds_actions() {
    let h = harness().await;
    let mut group = fixtures::log_group("/app/api");
    group.retention_days = None;
    group.retention_in_days = None;
    h.store.insert_log_group(&group).await.unwrap();
    let mut db = fixtures::rds("orders");
    db.multi_az = true;
    h.store.insert_rds_instance(&db).await.unwrap();

    h.executor
        .execute_action(&params("set_retention", "log_group", &group.id))
        .await
        .unwrap();
    assert_eq!(
        h.store.get_log_group(&group.id).await.unwrap().unwrap().retention_in_days,
        Some(30)
    );

    h.executor
        .execute_action(&params("disable_multi_az", "rds_instance", &db.id))
        .await
        .unwrap();
    assert!(!h.store.get_rds_instance(&db.id).await.unwrap().unwrap().multi_az);

    h.executor
        .execute_action(&params("downsize_rds", "rds_instance", &db.id))
        .await
        .unwrap();
    assert_eq!(
        h.store.get_rds_instance(&db.id).await.unwrap().unwrap().instance_class,
        "db.t3.small"
    );

    h.executor
        .execute_action(&params("stop_rds", "rds_instance", &db.id))
        .await
        .unwrap();
    assert_eq!(h.store.get_rds_instance(&db.id).await.unwrap().unwrap().state, "stopped");
}

#[tokio::test]
async fn test_downsize_rds_noop_at_floor() {
    let h = harness().await;
    let mut db = fixtures::rds("tiny");
    db.instance_class = "db.t3.micro".to_string();
    h.store.insert_rds_instance(&db).await.unwrap();

    let result = h
        .executor
        .execute_action(&params("downsize_rds", "rds_instance", &db.id))
        .await
        .unwrap();
    assert!(result.success);
    assert!(result.message.contains("smallest"));
    assert_eq!(
        h.store.get_rds_instance(&db.id).await.unwrap().unwrap().instance_class,
        "db.t3.micro"
    );
}

#[tokio::test]
async fn test_lambda_actions() {
    let h = harness().await;
    let mut func = fixtures::lambda("worker");
    func.memory_mb = 200;
    func.timeout_seconds = 60;
    h.store.insert_lambda_function(&func).await.unwrap();

    // Halving 200 MB floors at 128
    h.executor
        .execute_action(&params("rightsize_lambda", "lambda_function", &func.id))
        .await
        .unwrap();
    assert_eq!(
        h.store.get_lambda_function(&func.id).await.unwrap().unwrap().memory_mb,
        128
    );

    let bare = h
        .executor
        .execute_action(&params("optimize_lambda_timeout", "lambda_function", &func.id))
        .await
        .unwrap();
    assert!(!bare.success);
    assert!(bare.message.contains("recommendedTimeout"));

    let mut details = Map::new();
    details.insert("recommendedTimeout".to_string(), json!(10));
    let mut with_detail = params("optimize_lambda_timeout", "lambda_function", &func.id);
    with_detail.details = Some(details);
    h.executor.execute_action(&with_detail).await.unwrap();
    assert_eq!(
        h.store.get_lambda_function(&func.id).await.unwrap().unwrap().timeout_seconds,
        10
    );

    h.executor
        .execute_action(&params("delete_lambda", "lambda_function", &func.id))
        .await
        .unwrap();
    assert!(h.store.get_lambda_function(&func.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_release_eip_removes_row() {
    let h = harness().await;
    let mut eip = fixtures::eip("loose");
    eip.associated_instance_id = None;
    h.store.insert_elastic_ip(&eip).await.unwrap();

    let result = h
        .executor
        .execute_action(&params("release_eip", "elastic_ip", &eip.allocation_id))
        .await
        .unwrap();
    assert!(result.success);
    assert!(h.store.get_elastic_ip(&eip.id).await.unwrap().is_none());

    let previous = result.previous_state.unwrap();
    assert_eq!(previous.get("public_ip").and_then(Value::as_str), Some("203.0.113.10"));
}
