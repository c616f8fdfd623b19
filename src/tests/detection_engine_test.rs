// Detection engine behavior over a live (in-memory) store: cache semantics,
// confidence bounds and savings monotonicity.

use crate::services::detection::fixtures;
use crate::tests::common::{harness, harness_with_cache_ttl};
use std::time::Duration;

#[tokio::test]
async fn test_scan_over_empty_store() {
    let h = harness().await;

    let result = h.detection.detect_all(false).await.unwrap();
    assert!(result.detections.is_empty());
    assert_eq!(result.summary.total_detections, 0);
    assert_eq!(result.resource_counts.total, 0);
}

#[tokio::test]
async fn test_resource_counts_match_snapshot() {
    let h = harness().await;

    let mut inst = fixtures::instance("a");
    inst.env = "prod".to_string();
    h.store.insert_instance(&inst).await.unwrap();
    h.store.insert_volume(&fixtures::volume("b")).await.unwrap();
    h.store.insert_s3_bucket(&fixtures::bucket("assets")).await.unwrap();

    let result = h.detection.detect_all(false).await.unwrap();
    assert_eq!(result.resource_counts.instances, 1);
    assert_eq!(result.resource_counts.volumes, 1);
    assert_eq!(result.resource_counts.s3_buckets, 1);
    assert_eq!(result.resource_counts.total, 3);
}

#[tokio::test]
async fn test_consecutive_scans_within_ttl_return_cached_result() {
    let h = harness().await;

    let mut inst = fixtures::instance("a");
    inst.avg_cpu_7d = Some(2.0);
    h.store.insert_instance(&inst).await.unwrap();

    let first = h.detection.detect_all(false).await.unwrap();
    let second = h.detection.detect_all(false).await.unwrap();

    // Same memoized result, including the timestamp
    assert_eq!(first.timestamp, second.timestamp);
    assert_eq!(first.summary.total_detections, second.summary.total_detections);
}

#[tokio::test]
async fn test_refresh_bypasses_cache() {
    let h = harness().await;
    h.store.insert_instance(&fixtures::instance("a")).await.unwrap();

    let first = h.detection.detect_all(false).await.unwrap();
    let refreshed = h.detection.detect_all(true).await.unwrap();
    assert!(refreshed.timestamp >= first.timestamp);
}

#[tokio::test]
async fn test_expired_cache_rescans() {
    let h = harness_with_cache_ttl(Duration::from_millis(1)).await;
    h.store.insert_instance(&fixtures::instance("a")).await.unwrap();

    let first = h.detection.detect_all(false).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = h.detection.detect_all(false).await.unwrap();
    assert!(second.timestamp > first.timestamp);
}

#[tokio::test]
async fn test_executor_action_invalidates_cache() {
    let h = harness().await;

    let mut inst = fixtures::instance("a");
    inst.avg_cpu_7d = Some(2.0);
    h.store.insert_instance(&inst).await.unwrap();

    let before = h.detection.detect_all(false).await.unwrap();
    assert!(before.detections.iter().any(|d| d.scenario_id == "idle_instance"));

    let params = crate::models::ExecuteActionParams {
        action: "stop_instance".to_string(),
        resource_type: "instance".to_string(),
        resource_id: inst.id.clone(),
        resource_name: None,
        detection_id: None,
        scenario_id: None,
        details: None,
        executed_by: None,
    };
    let result = h.executor.execute_action(&params).await.unwrap();
    assert!(result.success);

    // Within TTL, but the mutation must be visible: the stopped instance no
    // longer counts as idle
    let after = h.detection.detect_all(false).await.unwrap();
    assert!(after.detections.iter().all(|d| d.scenario_id != "idle_instance"));
}

#[tokio::test]
async fn test_confidence_bounds_and_savings_monotonicity() {
    let h = harness().await;

    // A spread of wasteful resources across the rule families
    let mut idle = fixtures::instance("idle");
    idle.env = "dev".to_string();
    idle.avg_cpu_7d = Some(0.5);
    h.store.insert_instance(&idle).await.unwrap();

    let mut eip = fixtures::eip("loose");
    eip.associated_instance_id = None;
    h.store.insert_elastic_ip(&eip).await.unwrap();

    let mut vol = fixtures::volume("old-gp2");
    vol.volume_type = "gp2".to_string();
    vol.state = "available".to_string();
    h.store.insert_volume(&vol).await.unwrap();

    let mut db = fixtures::rds("quiet");
    db.env = "staging".to_string();
    db.multi_az = true;
    db.avg_cpu_7d = Some(0.2);
    db.avg_connections_7d = Some(0.0);
    h.store.insert_rds_instance(&db).await.unwrap();

    let mut snap = fixtures::snapshot_row("ancient");
    snap.created_at = chrono::Utc::now() - chrono::Duration::days(400);
    h.store.insert_snapshot(&snap).await.unwrap();

    let mut func = fixtures::lambda("dormant");
    func.invocations_7d = Some(0);
    h.store.insert_lambda_function(&func).await.unwrap();

    let result = h.detection.detect_all(false).await.unwrap();
    assert!(result.summary.total_detections >= 6);

    for d in &result.detections {
        assert!((0..=100).contains(&d.confidence), "{} confidence {}", d.scenario_id, d.confidence);
        assert!(
            d.potential_savings <= d.monthly_cost + 1e-9,
            "{} savings {} exceed cost {}",
            d.scenario_id,
            d.potential_savings,
            d.monthly_cost
        );
        assert!(d.potential_savings >= 0.0);
    }
}

#[tokio::test]
async fn test_detection_ids_are_unique_per_scan() {
    let h = harness().await;

    let mut idle = fixtures::instance("idle");
    idle.avg_cpu_7d = Some(1.0);
    h.store.insert_instance(&idle).await.unwrap();
    let mut vol = fixtures::volume("loose");
    vol.state = "available".to_string();
    h.store.insert_volume(&vol).await.unwrap();

    let result = h.detection.detect_all(false).await.unwrap();
    let mut ids: Vec<_> = result.detections.iter().map(|d| d.detection_id.clone()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), result.detections.len());
}
