//! "Which path should we prefer right now?"
//!
//! Decision order, first answer wins:
//!
//! 1. the learned policy ([`PathSelector`]), if injected and available;
//! 2. the [`AccuracyTracker`] recommendation, if injected;
//! 3. the heuristic baseline.

use std::sync::Arc;

use tracing::debug;

use super::{
    AccuracyTracker, BlendWeights, DecisionSource, PathSelector, RoutingAction, RoutingContext,
    RoutingDecision, WeightTable,
};

/// Orchestrates the learned policy with the accuracy-tracker fallback.
#[derive(Default)]
pub struct ScoringRouter {
    learning: Option<Arc<dyn PathSelector>>,
    accuracy: Option<Arc<AccuracyTracker>>,
}

impl ScoringRouter {
    /// Create a router with the given optional collaborators.
    pub fn new(
        learning: Option<Arc<dyn PathSelector>>,
        accuracy: Option<Arc<AccuracyTracker>>,
    ) -> Self {
        Self { learning, accuracy }
    }

    /// Preferred path for the tenant and decision type.
    pub async fn get_preferred_path(&self, tenant_id: &str, decision_type: &str) -> RoutingAction {
        self.route(&RoutingContext::new(tenant_id, decision_type))
            .await
            .path
    }

    /// Full routing decision, including which collaborator answered.
    pub async fn route(&self, ctx: &RoutingContext) -> RoutingDecision {
        if let Some(decision) = self.learned_decision(ctx).await {
            return decision;
        }

        if let Some(tracker) = &self.accuracy {
            let snapshot = tracker.get_accuracy(&ctx.tenant_id, &ctx.decision_type).await;
            let confidence = match snapshot.recommendation {
                RoutingAction::LlmPrimary => snapshot.llm_accuracy,
                RoutingAction::HeuristicPrimary => snapshot.heuristic_accuracy,
                RoutingAction::Hybrid => {
                    (snapshot.llm_accuracy + snapshot.heuristic_accuracy) / 2.0
                }
            };
            debug!(
                state_key = %ctx.state_key(),
                recommendation = %snapshot.recommendation,
                sample_size = snapshot.sample_size,
                "Routing from accuracy tracker"
            );
            return RoutingDecision::new(
                snapshot.recommendation,
                confidence,
                DecisionSource::AccuracyTracker,
                ctx.state_key(),
            );
        }

        RoutingDecision::new(
            RoutingAction::HeuristicPrimary,
            0.0,
            DecisionSource::Default,
            ctx.state_key(),
        )
    }

    /// Fixed blend weights for an action.
    pub fn get_weights_for_path(&self, action: RoutingAction) -> BlendWeights {
        WeightTable::weights_for(action)
    }

    async fn learned_decision(&self, ctx: &RoutingContext) -> Option<RoutingDecision> {
        let learning = self.learning.as_ref()?;
        if !learning.is_available().await {
            return None;
        }
        learning.select_path(ctx).await
    }
}
