//! Storage layer for shadow-comparison records.
//!
//! Shadow comparisons are written by the collaborator that runs both the
//! learned and heuristic paths for one input, and read back by the
//! promotion aggregator. Records are immutable once written.

mod sqlite;

pub use sqlite::SqliteStorage;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StorageResult;

/// One dual-run decision: both paths executed, only one result used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShadowComparisonRecord {
    /// Unique record identifier.
    pub id: String,
    /// Tenant the decision belongs to.
    pub tenant_id: String,
    /// Agent / decision type, e.g. "transaction-categorization".
    pub agent_type: String,
    /// Output of the learned (SDK) path.
    pub sdk_result: serde_json::Value,
    /// Output of the heuristic path.
    pub heuristic_result: serde_json::Value,
    /// Whether both paths agreed.
    pub results_match: bool,
    /// Learned path confidence (0-100).
    pub sdk_confidence: u8,
    /// Heuristic path confidence (0-100).
    pub heuristic_confidence: u8,
    /// Learned path wall time.
    pub sdk_duration_ms: u64,
    /// Heuristic path wall time.
    pub heuristic_duration_ms: u64,
    /// Field-level comparison detail, if the runner produced one.
    pub match_details: Option<serde_json::Value>,
    /// When the comparison was recorded.
    pub created_at: DateTime<Utc>,
}

impl ShadowComparisonRecord {
    /// Create a new record with a generated ID, timestamped now.
    pub fn new(
        tenant_id: impl Into<String>,
        agent_type: impl Into<String>,
        sdk_result: serde_json::Value,
        heuristic_result: serde_json::Value,
    ) -> Self {
        let results_match = sdk_result == heuristic_result;
        Self {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.into(),
            agent_type: agent_type.into(),
            sdk_result,
            heuristic_result,
            results_match,
            sdk_confidence: 0,
            heuristic_confidence: 0,
            sdk_duration_ms: 0,
            heuristic_duration_ms: 0,
            match_details: None,
            created_at: Utc::now(),
        }
    }

    /// Override the match flag (e.g. when results are equivalent but not identical).
    pub fn with_results_match(mut self, results_match: bool) -> Self {
        self.results_match = results_match;
        self
    }

    /// Set both confidences, clamped to 0-100.
    pub fn with_confidences(mut self, sdk: u8, heuristic: u8) -> Self {
        self.sdk_confidence = sdk.min(100);
        self.heuristic_confidence = heuristic.min(100);
        self
    }

    /// Set both durations.
    pub fn with_durations(mut self, sdk_ms: u64, heuristic_ms: u64) -> Self {
        self.sdk_duration_ms = sdk_ms;
        self.heuristic_duration_ms = heuristic_ms;
        self
    }

    /// Set match details.
    pub fn with_match_details(mut self, details: serde_json::Value) -> Self {
        self.match_details = Some(details);
        self
    }

    /// Set the creation timestamp.
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}

/// Persistence for shadow comparisons.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ShadowComparisonStore: Send + Sync {
    /// Persist a comparison.
    async fn record_comparison(&self, record: &ShadowComparisonRecord) -> StorageResult<()>;

    /// Comparisons for a tenant and agent type created at or after `since`,
    /// oldest first.
    async fn list_comparisons(
        &self,
        tenant_id: &str,
        agent_type: &str,
        since: DateTime<Utc>,
    ) -> StorageResult<Vec<ShadowComparisonRecord>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_new_derives_match() {
        let record = ShadowComparisonRecord::new(
            "t1",
            "transaction-categorization",
            json!({"category": "travel"}),
            json!({"category": "travel"}),
        );
        assert!(!record.id.is_empty());
        assert!(record.results_match);
        assert!(record.match_details.is_none());

        let record = ShadowComparisonRecord::new(
            "t1",
            "transaction-categorization",
            json!({"category": "travel"}),
            json!({"category": "meals"}),
        );
        assert!(!record.results_match);
    }

    #[test]
    fn test_record_confidence_clamp() {
        let record = ShadowComparisonRecord::new("t1", "a", json!(1), json!(1))
            .with_confidences(250, 40);
        assert_eq!(record.sdk_confidence, 100);
        assert_eq!(record.heuristic_confidence, 40);
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let record = ShadowComparisonRecord::new("t1", "a", json!(1), json!(2))
            .with_durations(120, 15);
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["tenantId"], "t1");
        assert_eq!(value["resultsMatch"], false);
        assert_eq!(value["sdkDurationMs"], 120);
        assert_eq!(value["heuristicDurationMs"], 15);
    }
}
