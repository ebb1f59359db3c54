//! Rolling historical accuracy per (tenant, decision type).
//!
//! Used as the routing fallback whenever the learning engine cannot answer.
//! Each key keeps a bounded window of recent outcomes for both paths; the
//! recommendation compares the two accuracies once both have enough
//! samples and otherwise stays on the heuristic baseline.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use super::RoutingAction;

/// Which path produced an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionPath {
    /// The learned/LLM path.
    Llm,
    /// The deterministic heuristic path.
    Heuristic,
}

/// Accuracy comparison for one (tenant, decision type).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccuracySnapshot {
    /// Fraction of correct LLM outcomes in the window.
    pub llm_accuracy: f64,
    /// Fraction of correct heuristic outcomes in the window.
    pub heuristic_accuracy: f64,
    /// Total outcomes in the window.
    pub sample_size: usize,
    /// Recommended action.
    pub recommendation: RoutingAction,
}

#[derive(Debug, Clone, Copy)]
struct OutcomeEntry {
    path: DecisionPath,
    correct: bool,
}

/// Tracker tuning.
#[derive(Debug, Clone)]
pub struct AccuracyTrackerConfig {
    /// Outcomes retained per key.
    pub window_size: usize,
    /// Samples each path needs before accuracies are compared.
    pub min_samples_per_path: usize,
    /// Accuracy lead required to prefer one path outright.
    pub margin: f64,
}

impl Default for AccuracyTrackerConfig {
    fn default() -> Self {
        Self {
            window_size: 200,
            min_samples_per_path: 20,
            margin: 0.05,
        }
    }
}

/// Maintains rolling accuracy estimates per (tenant, decision type).
#[derive(Debug, Default)]
pub struct AccuracyTracker {
    config: AccuracyTrackerConfig,
    windows: RwLock<HashMap<(String, String), VecDeque<OutcomeEntry>>>,
}

impl AccuracyTracker {
    /// Create a tracker with default tuning.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a tracker with explicit tuning.
    pub fn with_config(config: AccuracyTrackerConfig) -> Self {
        Self {
            config,
            windows: RwLock::new(HashMap::new()),
        }
    }

    /// Record whether a path's output turned out to be correct.
    pub async fn record_outcome(
        &self,
        tenant_id: &str,
        decision_type: &str,
        path: DecisionPath,
        correct: bool,
    ) {
        let mut windows = self.windows.write().await;
        let window = windows
            .entry((tenant_id.to_string(), decision_type.to_string()))
            .or_default();

        window.push_back(OutcomeEntry { path, correct });
        while window.len() > self.config.window_size.max(1) {
            window.pop_front();
        }

        debug!(
            tenant_id = %tenant_id,
            decision_type = %decision_type,
            path = ?path,
            correct,
            window = window.len(),
            "Outcome recorded"
        );
    }

    /// Current accuracy comparison and recommendation.
    pub async fn get_accuracy(&self, tenant_id: &str, decision_type: &str) -> AccuracySnapshot {
        let windows = self.windows.read().await;
        let key = (tenant_id.to_string(), decision_type.to_string());

        let (mut llm_total, mut llm_correct, mut heur_total, mut heur_correct) = (0, 0, 0, 0);
        if let Some(window) = windows.get(&key) {
            for entry in window {
                match entry.path {
                    DecisionPath::Llm => {
                        llm_total += 1;
                        llm_correct += usize::from(entry.correct);
                    }
                    DecisionPath::Heuristic => {
                        heur_total += 1;
                        heur_correct += usize::from(entry.correct);
                    }
                }
            }
        }

        let llm_accuracy = ratio(llm_correct, llm_total);
        let heuristic_accuracy = ratio(heur_correct, heur_total);
        let recommendation =
            self.recommend(llm_total, heur_total, llm_accuracy, heuristic_accuracy);

        AccuracySnapshot {
            llm_accuracy,
            heuristic_accuracy,
            sample_size: llm_total + heur_total,
            recommendation,
        }
    }

    fn recommend(
        &self,
        llm_total: usize,
        heur_total: usize,
        llm_accuracy: f64,
        heuristic_accuracy: f64,
    ) -> RoutingAction {
        let min = self.config.min_samples_per_path;
        if llm_total < min || heur_total < min {
            return RoutingAction::HeuristicPrimary;
        }

        let lead = llm_accuracy - heuristic_accuracy;
        if lead > self.config.margin {
            RoutingAction::LlmPrimary
        } else if -lead > self.config.margin {
            RoutingAction::HeuristicPrimary
        } else {
            RoutingAction::Hybrid
        }
    }
}

fn ratio(correct: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        correct as f64 / total as f64
    }
}
