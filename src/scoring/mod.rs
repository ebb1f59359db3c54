//! Confidence-score fusion for the LLM and heuristic paths.
//!
//! [`HybridScorer::combine`] blends an optional LLM confidence with the
//! heuristic confidence. Weights come from the learned policy when it has an
//! answer, otherwise from the fixed default blend. Whatever the source, the
//! heuristic share never drops below [`BlendWeights::HEURISTIC_FLOOR`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::routing::{BlendWeights, PathSelector, RoutingContext};

/// Which inputs contributed to a fused score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScoreSource {
    /// Only the LLM score was used.
    LlmOnly,
    /// Only the heuristic score was used.
    HeuristicOnly,
    /// Both scores were blended.
    Hybrid,
}

/// Where the blend weights came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WeightSource {
    /// Proposed by the learned policy.
    LearningEngine,
    /// Proposed by the learned policy, then raised to the heuristic floor.
    Floored,
    /// Fixed default blend.
    Default,
}

/// The fused score and the record of how it was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HybridScore {
    /// Final score in [0, 100].
    pub score: i32,
    /// Which inputs were used.
    pub source: ScoreSource,
    /// Whether an LLM score was supplied.
    pub llm_available: bool,
    /// The LLM score as supplied.
    pub llm_score: Option<i32>,
    /// Weights applied, when both scores were blended.
    pub sona_weights: Option<BlendWeights>,
    /// Origin of the applied weights.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight_source: Option<WeightSource>,
}

/// Fuses LLM and heuristic confidence scores.
#[derive(Default)]
pub struct HybridScorer {
    learning: Option<Arc<dyn PathSelector>>,
}

impl HybridScorer {
    /// Create a scorer, optionally consulting a learned policy for weights.
    pub fn new(learning: Option<Arc<dyn PathSelector>>) -> Self {
        Self { learning }
    }

    /// Combine the two confidence scores for a decision.
    pub async fn combine(
        &self,
        llm_score: Option<i32>,
        heuristic_score: i32,
        ctx: &RoutingContext,
    ) -> HybridScore {
        let Some(llm) = llm_score else {
            return HybridScore {
                score: clamp_score(heuristic_score as f64),
                source: ScoreSource::HeuristicOnly,
                llm_available: false,
                llm_score: None,
                sona_weights: None,
                weight_source: None,
            };
        };

        let (weights, weight_source) = self.resolve_weights(ctx).await;
        let blended = llm as f64 * weights.llm + heuristic_score as f64 * weights.heuristic;
        let score = clamp_score(blended);

        debug!(
            state_key = %ctx.state_key(),
            llm_score = llm,
            heuristic_score,
            w_llm = weights.llm,
            w_heuristic = weights.heuristic,
            score,
            "Scores combined"
        );

        HybridScore {
            score,
            source: ScoreSource::Hybrid,
            llm_available: true,
            llm_score: Some(llm),
            sona_weights: Some(weights),
            weight_source: Some(weight_source),
        }
    }

    async fn resolve_weights(&self, ctx: &RoutingContext) -> (BlendWeights, WeightSource) {
        let Some(proposal) = self.learned_weights(ctx).await else {
            return (BlendWeights::DEFAULT, WeightSource::Default);
        };

        if !proposal.is_normalized() {
            warn!(
                state_key = %ctx.state_key(),
                llm = proposal.llm,
                heuristic = proposal.heuristic,
                "Learned weights are malformed; using default blend"
            );
            return (BlendWeights::DEFAULT, WeightSource::Default);
        }

        let floored = proposal.with_heuristic_floor();
        if floored != proposal {
            debug!(
                state_key = %ctx.state_key(),
                heuristic = proposal.heuristic,
                "Learned weights below heuristic floor; clamped"
            );
            (floored, WeightSource::Floored)
        } else {
            (proposal, WeightSource::LearningEngine)
        }
    }

    async fn learned_weights(&self, ctx: &RoutingContext) -> Option<BlendWeights> {
        let learning = self.learning.as_ref()?;
        if !learning.is_available().await {
            return None;
        }
        learning.optimal_weights(ctx).await
    }
}

fn clamp_score(value: f64) -> i32 {
    if !value.is_finite() {
        return 0;
    }
    value.round().clamp(0.0, 100.0) as i32
}
