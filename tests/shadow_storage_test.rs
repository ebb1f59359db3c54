//! Integration tests for shadow-comparison storage and reporting
//!
//! Each test runs against a fresh SQLite file in a temporary directory.

use std::sync::Arc;

use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;

use hybrid_decision_router::config::{DatabaseConfig, MetricsConfig, PromotionPolicy};
use hybrid_decision_router::error::StorageError;
use hybrid_decision_router::shadow::{
    render_prometheus, AgentType, ShadowComparisonAggregator,
};
use hybrid_decision_router::storage::{
    ShadowComparisonRecord, ShadowComparisonStore, SqliteStorage,
};

/// Create a file-backed storage instance in a temp directory
async fn create_test_storage() -> (SqliteStorage, TempDir) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = DatabaseConfig {
        path: dir.path().join("nested").join("router.db"),
        max_connections: 2,
    };
    let storage = SqliteStorage::new(&config)
        .await
        .expect("Failed to create storage");
    (storage, dir)
}

fn comparison(tenant: &str, agent: AgentType, matches: bool) -> ShadowComparisonRecord {
    ShadowComparisonRecord::new(
        tenant,
        agent.as_str(),
        json!({"category": "travel"}),
        json!({"category": if matches { "travel" } else { "meals" }}),
    )
    .with_confidences(90, 80)
    .with_durations(110, 100)
}

#[tokio::test]
async fn test_record_and_list_round_trip() {
    let (storage, _dir) = create_test_storage().await;

    let record = comparison("t1", AgentType::TransactionCategorization, false)
        .with_match_details(json!({"category": {"sdk": "travel", "heuristic": "meals"}}));
    storage.record_comparison(&record).await.unwrap();

    let since = Utc::now() - Duration::days(1);
    let listed = storage
        .list_comparisons("t1", "transaction-categorization", since)
        .await
        .unwrap();

    assert_eq!(listed.len(), 1);
    let stored = &listed[0];
    assert_eq!(stored.id, record.id);
    assert_eq!(stored.sdk_result, record.sdk_result);
    assert_eq!(stored.heuristic_result, record.heuristic_result);
    assert!(!stored.results_match);
    assert_eq!(stored.sdk_confidence, 90);
    assert_eq!(stored.heuristic_duration_ms, 100);
    assert_eq!(stored.match_details, record.match_details);
}

#[tokio::test]
async fn test_record_rejects_duration_beyond_i64() {
    let (storage, _dir) = create_test_storage().await;

    let record = comparison("t1", AgentType::TransactionCategorization, true)
        .with_durations(u64::MAX, 100);
    let result = storage.record_comparison(&record).await;
    assert!(matches!(result, Err(StorageError::Serialization { .. })));

    let record = comparison("t1", AgentType::TransactionCategorization, true)
        .with_durations(100, i64::MAX as u64 + 1);
    let result = storage.record_comparison(&record).await;
    assert!(matches!(result, Err(StorageError::Serialization { .. })));

    let listed = storage
        .list_comparisons(
            "t1",
            "transaction-categorization",
            Utc::now() - Duration::days(1),
        )
        .await
        .unwrap();
    assert!(listed.is_empty());
}

#[tokio::test]
async fn test_record_keeps_largest_representable_duration() {
    let (storage, _dir) = create_test_storage().await;

    let record = comparison("t1", AgentType::TransactionCategorization, true)
        .with_durations(i64::MAX as u64, 0);
    storage.record_comparison(&record).await.unwrap();

    let listed = storage
        .list_comparisons(
            "t1",
            "transaction-categorization",
            Utc::now() - Duration::days(1),
        )
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].sdk_duration_ms, i64::MAX as u64);
    assert_eq!(listed[0].heuristic_duration_ms, 0);
}

#[tokio::test]
async fn test_aggregator_report_over_unbounded_window() {
    let (storage, _dir) = create_test_storage().await;
    storage
        .record_comparison(
            &comparison("t1", AgentType::TransactionCategorization, true)
                .with_created_at(Utc::now() - Duration::days(4000)),
        )
        .await
        .unwrap();

    let aggregator = ShadowComparisonAggregator::new(Arc::new(storage), PromotionPolicy::default());
    let report = aggregator
        .generate_report(AgentType::TransactionCategorization, "t1", u32::MAX)
        .await;

    assert_eq!(report.period_days, u32::MAX);
    assert_eq!(report.total_decisions, 1);
}

#[tokio::test]
async fn test_list_filters_tenant_agent_and_window() {
    let (storage, _dir) = create_test_storage().await;

    let old = comparison("t1", AgentType::TransactionCategorization, true)
        .with_created_at(Utc::now() - Duration::days(40));
    let current = comparison("t1", AgentType::TransactionCategorization, true);
    let other_tenant = comparison("t2", AgentType::TransactionCategorization, true);
    let other_agent = comparison("t1", AgentType::MessagingFlow, true);

    for record in [&old, &current, &other_tenant, &other_agent] {
        storage.record_comparison(record).await.unwrap();
    }

    let listed = storage
        .list_comparisons(
            "t1",
            "transaction-categorization",
            Utc::now() - Duration::days(30),
        )
        .await
        .unwrap();

    let ids: Vec<_> = listed.iter().map(|r| r.id.clone()).collect();
    assert_eq!(ids, vec![current.id.clone()]);
}

#[tokio::test]
async fn test_aggregator_end_to_end() {
    let (storage, _dir) = create_test_storage().await;

    for _ in 0..9 {
        storage
            .record_comparison(&comparison("t1", AgentType::TaxFormGeneration, true))
            .await
            .unwrap();
    }
    storage
        .record_comparison(
            &comparison("t1", AgentType::TaxFormGeneration, false).with_confidences(60, 85),
        )
        .await
        .unwrap();

    let aggregator =
        ShadowComparisonAggregator::new(Arc::new(storage), PromotionPolicy::default())
            .with_metrics_config(MetricsConfig { period_days: 30 });

    let report = aggregator
        .generate_report(AgentType::TaxFormGeneration, "t1", 7)
        .await;
    assert_eq!(report.total_decisions, 10);
    assert_eq!(report.match_rate, 90);
    assert_eq!(report.identical, 9);
    assert_eq!(report.heuristic_better, 1);
    assert_eq!(report.sdk_avg_latency_ms, 110);
    assert_eq!(report.avg_latency_diff_ms, 10);
    assert!(!report.meets_promotion_criteria);
    assert_eq!(report.promotion_blockers.len(), 1);
    assert!(report.promotion_blockers[0].contains("comparisons"));

    let summaries = aggregator.get_dashboard_summary("t1", 7).await;
    let totals: Vec<_> = summaries.iter().map(|s| s.total_decisions).collect();
    assert_eq!(totals, vec![0, 10, 0, 0]);

    let metrics = aggregator.get_metrics("t1").await;
    assert_eq!(metrics.len(), 20);
    let text = render_prometheus(&metrics);
    assert!(text.contains(
        "shadow_decisions_total{agent=\"tax-form-generation\",tenant=\"t1\"} 10"
    ));
}

#[tokio::test]
async fn test_aggregator_promotes_healthy_agent() {
    let (storage, _dir) = create_test_storage().await;

    for _ in 0..120 {
        storage
            .record_comparison(&comparison("t1", AgentType::BankStatementExtraction, true))
            .await
            .unwrap();
    }

    let aggregator =
        ShadowComparisonAggregator::new(Arc::new(storage), PromotionPolicy::default());
    let report = aggregator
        .generate_report(AgentType::BankStatementExtraction, "t1", 7)
        .await;

    assert_eq!(report.match_rate, 100);
    assert!(report.meets_promotion_criteria);
    assert!(report.promotion_blockers.is_empty());
}
