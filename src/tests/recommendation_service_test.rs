// Recommendation lifecycle: idempotent ingestion and state machine safety.

use crate::models::{
    ImpactLevel, RecommendationActionRequest, RecommendationFilter, RecommendationStatus,
};
use crate::services::detection::fixtures;
use crate::tests::common::harness;
use chrono::{Duration, Utc};

fn action(id: &str, action: &str) -> RecommendationActionRequest {
    RecommendationActionRequest {
        id: id.to_string(),
        action: action.to_string(),
        days: None,
        date: None,
        reason: None,
        actioned_by: None,
    }
}

#[tokio::test]
async fn test_ingest_is_idempotent() {
    let h = harness().await;

    let mut eip = fixtures::eip("loose");
    eip.associated_instance_id = None;
    h.store.insert_elastic_ip(&eip).await.unwrap();
    let mut vol = fixtures::volume("stray");
    vol.state = "available".to_string();
    h.store.insert_volume(&vol).await.unwrap();

    let scan = h.detection.detect_all(false).await.unwrap();
    assert!(!scan.detections.is_empty());

    let first = h.recommendations.ingest(&scan.detections).await.unwrap();
    assert_eq!(first.created, scan.detections.len() as i64);
    assert_eq!(first.skipped, 0);

    let second = h.recommendations.ingest(&scan.detections).await.unwrap();
    assert_eq!(second.created, 0);
    assert_eq!(second.skipped, scan.detections.len() as i64);
}

#[tokio::test]
async fn test_pending_listing_orders_by_impact() {
    let h = harness().await;

    // Small savings: orphaned EIP (low impact)
    let mut eip = fixtures::eip("loose");
    eip.associated_instance_id = None;
    h.store.insert_elastic_ip(&eip).await.unwrap();

    // Large savings: big idle CI-sized instance (high impact)
    let mut inst = fixtures::instance("hog");
    inst.instance_type = "m5.2xlarge".to_string();
    inst.hourly_cost = 0.384;
    inst.avg_cpu_7d = Some(1.0);
    h.store.insert_instance(&inst).await.unwrap();

    let scan = h.detection.detect_all(false).await.unwrap();
    h.recommendations.ingest(&scan.detections).await.unwrap();

    let filter = RecommendationFilter {
        status: Some(vec![RecommendationStatus::Pending]),
        ..Default::default()
    };
    let listed = h.recommendations.list(&filter).await.unwrap();
    assert!(listed.len() >= 2);
    // Higher impact first
    for pair in listed.windows(2) {
        assert!(pair[0].impact_level >= pair[1].impact_level);
    }
}

#[tokio::test]
async fn test_filters_by_scenario_and_impact() {
    let h = harness().await;

    let mut eip = fixtures::eip("loose");
    eip.associated_instance_id = None;
    h.store.insert_elastic_ip(&eip).await.unwrap();
    let mut vol = fixtures::volume("stray");
    vol.state = "available".to_string();
    h.store.insert_volume(&vol).await.unwrap();

    let scan = h.detection.detect_all(false).await.unwrap();
    h.recommendations.ingest(&scan.detections).await.unwrap();

    let by_scenario = h
        .recommendations
        .list(&RecommendationFilter {
            scenario_id: Some("orphaned_eip".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(by_scenario.len(), 1);
    assert_eq!(by_scenario[0].scenario_id, "orphaned_eip");

    let by_impact = h
        .recommendations
        .list(&RecommendationFilter {
            impact_level: Some(ImpactLevel::Low),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(by_impact.iter().all(|r| r.impact_level == ImpactLevel::Low));
}

#[tokio::test]
async fn test_snooze_then_unsnooze_returns_to_pending() {
    let h = harness().await;

    let mut eip = fixtures::eip("loose");
    eip.associated_instance_id = None;
    h.store.insert_elastic_ip(&eip).await.unwrap();
    let scan = h.detection.detect_all(false).await.unwrap();
    h.recommendations.ingest(&scan.detections).await.unwrap();

    let rec = &h.recommendations.list(&RecommendationFilter::default()).await.unwrap()[0];

    let mut snooze = action(&rec.id, "snooze");
    snooze.days = Some(3);
    let (snoozed, _) = h.recommendations.transition(&snooze).await.unwrap();
    assert_eq!(snoozed.status, RecommendationStatus::Snoozed);
    let until = snoozed.snoozed_until.expect("snoozed_until set");
    let expected = Utc::now() + Duration::days(3);
    assert!((until - expected).num_minutes().abs() < 5);

    // Approving a snoozed record un-snoozes it back to pending
    let (unsnoozed, _) = h.recommendations.transition(&action(&rec.id, "approve")).await.unwrap();
    assert_eq!(unsnoozed.status, RecommendationStatus::Pending);
    assert!(unsnoozed.snoozed_until.is_none());
}

#[tokio::test]
async fn test_snooze_requires_positive_days() {
    let h = harness().await;

    let mut eip = fixtures::eip("loose");
    eip.associated_instance_id = None;
    h.store.insert_elastic_ip(&eip).await.unwrap();
    let scan = h.detection.detect_all(false).await.unwrap();
    h.recommendations.ingest(&scan.detections).await.unwrap();
    let rec = &h.recommendations.list(&RecommendationFilter::default()).await.unwrap()[0];

    let mut snooze = action(&rec.id, "snooze");
    snooze.days = Some(0);
    assert!(h.recommendations.transition(&snooze).await.is_err());
}

#[tokio::test]
async fn test_schedule_requires_future_date() {
    let h = harness().await;

    let mut eip = fixtures::eip("loose");
    eip.associated_instance_id = None;
    h.store.insert_elastic_ip(&eip).await.unwrap();
    let scan = h.detection.detect_all(false).await.unwrap();
    h.recommendations.ingest(&scan.detections).await.unwrap();
    let rec = &h.recommendations.list(&RecommendationFilter::default()).await.unwrap()[0];

    let mut past = action(&rec.id, "schedule");
    past.date = Some(Utc::now() - Duration::hours(1));
    assert!(h.recommendations.transition(&past).await.is_err());

    let mut future = action(&rec.id, "schedule");
    future.date = Some(Utc::now() + Duration::days(1));
    let (scheduled, _) = h.recommendations.transition(&future).await.unwrap();
    assert_eq!(scheduled.status, RecommendationStatus::Scheduled);
    assert!(scheduled.scheduled_for.is_some());
}

#[tokio::test]
async fn test_terminal_states_accept_no_transitions() {
    let h = harness().await;

    let mut eip = fixtures::eip("loose");
    eip.associated_instance_id = None;
    h.store.insert_elastic_ip(&eip).await.unwrap();
    let scan = h.detection.detect_all(false).await.unwrap();
    h.recommendations.ingest(&scan.detections).await.unwrap();
    let rec = h.recommendations.list(&RecommendationFilter::default()).await.unwrap()[0].clone();

    let mut reject = action(&rec.id, "reject");
    reject.reason = Some("keeping it".to_string());
    let (rejected, _) = h.recommendations.transition(&reject).await.unwrap();
    assert_eq!(rejected.status, RecommendationStatus::Rejected);
    assert_eq!(rejected.rejection_reason.as_deref(), Some("keeping it"));

    // The executor never fires against a rejected recommendation
    assert!(h.recommendations.transition(&action(&rec.id, "execute")).await.is_err());
    assert!(h.recommendations.transition(&action(&rec.id, "approve")).await.is_err());
    assert!(h.recommendations.transition(&action(&rec.id, "snooze")).await.is_err());
    assert_eq!(h.audit.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_approve_then_execute_flow() {
    let h = harness().await;

    let mut eip = fixtures::eip("loose");
    eip.associated_instance_id = None;
    h.store.insert_elastic_ip(&eip).await.unwrap();
    let scan = h.detection.detect_all(false).await.unwrap();
    h.recommendations.ingest(&scan.detections).await.unwrap();
    let rec = h.recommendations.list(&RecommendationFilter::default()).await.unwrap()[0].clone();

    // Two separate calls, exactly as the approvals UI issues them
    let (approved, result) = h.recommendations.transition(&action(&rec.id, "approve")).await.unwrap();
    assert_eq!(approved.status, RecommendationStatus::Approved);
    assert!(result.is_none());

    let (executed, result) = h.recommendations.transition(&action(&rec.id, "execute")).await.unwrap();
    assert_eq!(executed.status, RecommendationStatus::Executed);
    let result = result.expect("execution result present");
    assert!(result.success);

    // The EIP row is gone
    assert!(h.store.get_elastic_ip(&eip.id).await.unwrap().is_none());

    // Executed is terminal
    assert!(h.recommendations.transition(&action(&rec.id, "execute")).await.is_err());
}

#[tokio::test]
async fn test_failed_execution_keeps_prior_state() {
    let h = harness().await;

    let mut eip = fixtures::eip("loose");
    eip.associated_instance_id = None;
    h.store.insert_elastic_ip(&eip).await.unwrap();
    let scan = h.detection.detect_all(false).await.unwrap();
    h.recommendations.ingest(&scan.detections).await.unwrap();
    let rec = h.recommendations.list(&RecommendationFilter::default()).await.unwrap()[0].clone();

    let (approved, _) = h.recommendations.transition(&action(&rec.id, "approve")).await.unwrap();
    assert_eq!(approved.status, RecommendationStatus::Approved);

    // Delete the underlying resource so execution fails
    h.store.delete_elastic_ip(&eip.id).await.unwrap();

    let (after, result) = h.recommendations.transition(&action(&rec.id, "execute")).await.unwrap();
    let result = result.expect("execution result present");
    assert!(!result.success);
    // Stays approved, and the failed attempt is on the audit log
    assert_eq!(after.status, RecommendationStatus::Approved);
    let audit = h.audit.list_recent(10).await.unwrap();
    assert!(audit.iter().any(|e| !e.success));
}

#[tokio::test]
async fn test_summary_rollups() {
    let h = harness().await;

    let mut eip = fixtures::eip("loose");
    eip.associated_instance_id = None;
    h.store.insert_elastic_ip(&eip).await.unwrap();
    let mut vol = fixtures::volume("stray");
    vol.state = "available".to_string();
    h.store.insert_volume(&vol).await.unwrap();

    let scan = h.detection.detect_all(false).await.unwrap();
    h.recommendations.ingest(&scan.detections).await.unwrap();

    let summary = h.recommendations.summary().await.unwrap();
    assert_eq!(summary.total, scan.detections.len() as i64);
    assert_eq!(summary.by_status.get("pending"), Some(&summary.total));
    assert!(summary.pending_savings > 0.0);
    assert!((summary.pending_savings - summary.total_potential_savings).abs() < 1e-9);
    assert!(summary.by_scenario.contains_key("orphaned_eip"));
    assert!(summary.by_resource_type.contains_key("volume"));
}

#[tokio::test]
async fn test_delete_recommendation() {
    let h = harness().await;

    let mut eip = fixtures::eip("loose");
    eip.associated_instance_id = None;
    h.store.insert_elastic_ip(&eip).await.unwrap();
    let scan = h.detection.detect_all(false).await.unwrap();
    h.recommendations.ingest(&scan.detections).await.unwrap();
    let rec = h.recommendations.list(&RecommendationFilter::default()).await.unwrap()[0].clone();

    h.recommendations.delete(&rec.id).await.unwrap();
    assert!(h.recommendations.get(&rec.id).await.is_err());
    assert!(h.recommendations.delete(&rec.id).await.is_err());
}
