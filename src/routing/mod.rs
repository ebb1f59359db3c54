//! Routing of individual decisions between the learned (LLM) path and the
//! deterministic heuristic path.
//!
//! # Components
//!
//! ```text
//! ScoringRouter ──▶ PathSelector (LearningRouter ──▶ LearningEngine)
//!       │
//!       └────────▶ AccuracyTracker   (fallback)
//! ```
//!
//! Every routing answer ultimately maps to one of three fixed
//! [`RoutingAction`]s, each with a fixed [`BlendWeights`] pair from the
//! [`WeightTable`].

pub mod accuracy;
pub mod engine;
pub mod learning;
pub mod scoring;

pub use accuracy::{AccuracySnapshot, AccuracyTracker, DecisionPath};
pub use engine::{
    ActionChoice, AlgorithmVariant, EngineParams, LearningEngine, LearningEngineFactory,
    Transition,
};
pub use learning::LearningRouter;
pub use scoring::ScoringRouter;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Tolerance used when checking that blend weights sum to one.
pub const WEIGHT_TOLERANCE: f64 = 1e-9;

// ============================================================================
// Routing Context
// ============================================================================

/// Identifies a decision class for learning purposes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingContext {
    /// Tenant the decision belongs to.
    pub tenant_id: String,
    /// Decision type, e.g. "transaction-categorization".
    pub decision_type: String,
    /// Optional finer-grained context discriminator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_hash: Option<String>,
}

impl RoutingContext {
    /// Create a new routing context.
    pub fn new(tenant_id: impl Into<String>, decision_type: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            decision_type: decision_type.into(),
            context_hash: None,
        }
    }

    /// Set the context hash.
    pub fn with_context_hash(mut self, context_hash: impl Into<String>) -> Self {
        self.context_hash = Some(context_hash.into());
        self
    }

    /// Derive the learning-engine state key: `tenant:decisionType[:contextHash]`.
    pub fn state_key(&self) -> StateKey {
        let key = match &self.context_hash {
            Some(hash) => format!("{}:{}:{}", self.tenant_id, self.decision_type, hash),
            None => format!("{}:{}", self.tenant_id, self.decision_type),
        };
        StateKey(key)
    }
}

/// The string identifying a routing context to the learning engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateKey(String);

impl StateKey {
    /// Borrow the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Routing Action & Weights
// ============================================================================

/// The closed set of actions the learning engine may choose among.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoutingAction {
    /// Trust the LLM path, heuristic as secondary signal.
    LlmPrimary,
    /// Trust the heuristic path, LLM as secondary signal.
    HeuristicPrimary,
    /// Blend both paths.
    Hybrid,
}

impl RoutingAction {
    /// All actions, in the order offered to the learning engine.
    pub const ALL: [RoutingAction; 3] = [
        RoutingAction::LlmPrimary,
        RoutingAction::HeuristicPrimary,
        RoutingAction::Hybrid,
    ];

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingAction::LlmPrimary => "LLM_PRIMARY",
            RoutingAction::HeuristicPrimary => "HEURISTIC_PRIMARY",
            RoutingAction::Hybrid => "HYBRID",
        }
    }

    /// Blend weights for this action.
    pub fn weights(&self) -> BlendWeights {
        WeightTable::weights_for(*self)
    }
}

impl std::fmt::Display for RoutingAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RoutingAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "LLM_PRIMARY" => Ok(RoutingAction::LlmPrimary),
            "HEURISTIC_PRIMARY" => Ok(RoutingAction::HeuristicPrimary),
            "HYBRID" => Ok(RoutingAction::Hybrid),
            _ => Err(format!("Unknown routing action: {}", s)),
        }
    }
}

/// Proportion assigned to each path's confidence when fusing scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlendWeights {
    /// Weight of the LLM path.
    pub llm: f64,
    /// Weight of the heuristic path.
    pub heuristic: f64,
}

impl BlendWeights {
    /// Blend used when no learned weights are available.
    pub const DEFAULT: BlendWeights = BlendWeights {
        llm: 0.6,
        heuristic: 0.4,
    };

    /// Lowest heuristic share a blend may carry.
    pub const HEURISTIC_FLOOR: f64 = 0.2;

    /// Blend substituted when a proposal falls below the heuristic floor.
    pub const FLOORED: BlendWeights = BlendWeights {
        llm: 0.8,
        heuristic: 0.2,
    };

    /// True when both weights are finite, non-negative, and sum to one.
    pub fn is_normalized(&self) -> bool {
        self.llm.is_finite()
            && self.heuristic.is_finite()
            && self.llm >= 0.0
            && self.heuristic >= 0.0
            && (self.llm + self.heuristic - 1.0).abs() <= WEIGHT_TOLERANCE
    }

    /// Apply the heuristic floor.
    pub fn with_heuristic_floor(self) -> BlendWeights {
        if self.heuristic < Self::HEURISTIC_FLOOR {
            Self::FLOORED
        } else {
            self
        }
    }
}

/// Fixed mapping from routing action to blend weights.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeightTable;

impl WeightTable {
    /// Weights for the given action.
    pub const fn weights_for(action: RoutingAction) -> BlendWeights {
        match action {
            RoutingAction::LlmPrimary => BlendWeights {
                llm: 0.8,
                heuristic: 0.2,
            },
            RoutingAction::HeuristicPrimary => BlendWeights {
                llm: 0.2,
                heuristic: 0.8,
            },
            RoutingAction::Hybrid => BlendWeights {
                llm: 0.6,
                heuristic: 0.4,
            },
        }
    }
}

// ============================================================================
// Routing Decision
// ============================================================================

/// Where a routing decision came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionSource {
    /// Chosen by the reinforcement-learning engine.
    LearningEngine,
    /// Recommended by the historical accuracy tracker.
    AccuracyTracker,
    /// No collaborator answered; heuristic baseline.
    Default,
}

/// The outcome of a single routing call. Ephemeral; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingDecision {
    /// Chosen path.
    pub path: RoutingAction,
    /// Confidence in the choice, in [0, 1].
    pub confidence: f64,
    /// Blend weights for the chosen path.
    pub weights: BlendWeights,
    /// Which collaborator produced the decision.
    pub source: DecisionSource,
    /// State key of the routed context.
    pub state_key: StateKey,
}

impl RoutingDecision {
    /// Build a decision for `path`, taking weights from the [`WeightTable`].
    pub fn new(
        path: RoutingAction,
        confidence: f64,
        source: DecisionSource,
        state_key: StateKey,
    ) -> Self {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            path,
            confidence,
            weights: path.weights(),
            source,
            state_key,
        }
    }
}

/// Outcome feedback for one routed decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardEvent {
    /// Context the action was taken in.
    pub context: RoutingContext,
    /// Action that was taken.
    pub action: RoutingAction,
    /// Observed reward.
    pub reward: f64,
    /// Context of the following decision, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_context: Option<RoutingContext>,
    /// Whether the episode ended with this decision.
    pub done: bool,
}

impl RewardEvent {
    /// Create a terminal reward event.
    pub fn new(context: RoutingContext, action: RoutingAction, reward: f64) -> Self {
        Self {
            context,
            action,
            reward,
            next_context: None,
            done: true,
        }
    }

    /// Chain the event to a following context (non-terminal).
    pub fn with_next_context(mut self, next_context: RoutingContext) -> Self {
        self.next_context = Some(next_context);
        self.done = false;
        self
    }
}

// ============================================================================
// Path Selector
// ============================================================================

/// A learned routing policy consulted ahead of the accuracy fallback.
///
/// Implementations absorb their own failures: every method answers `None`
/// (or `false`) rather than erroring.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PathSelector: Send + Sync {
    /// Whether the policy can currently answer. May trigger lazy initialization.
    async fn is_available(&self) -> bool;

    /// Choose a path for the context.
    async fn select_path(&self, ctx: &RoutingContext) -> Option<RoutingDecision>;

    /// Blend weights the policy currently prefers for the context.
    async fn optimal_weights(&self, ctx: &RoutingContext) -> Option<BlendWeights>;

    /// Raw learned values per action.
    async fn q_values(&self, ctx: &RoutingContext) -> Option<HashMap<RoutingAction, f64>>;

    /// Feed an outcome back into the policy.
    async fn record_reward(&self, event: &RewardEvent);
}
