//! Capability contract of the external reinforcement-learning engine.
//!
//! The router only depends on these traits; the engine's update rule is
//! opaque. Implementations are expected to be externally synchronized
//! services, so every method takes `&self`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::RoutingAction;
use crate::error::EngineResult;

/// Construction parameters for a learning engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineParams {
    /// Default exploration rate.
    pub default_epsilon: f64,
    /// Reward discount factor.
    pub discount_factor: f64,
}

/// Learning algorithm variants an engine namespace can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlgorithmVariant {
    /// Tabular Q-learning.
    QLearning,
    /// Double Q-learning (reduced overestimation bias).
    DoubleQ,
}

impl AlgorithmVariant {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            AlgorithmVariant::QLearning => "q-learning",
            AlgorithmVariant::DoubleQ => "double-q",
        }
    }
}

/// The engine's answer to "what should we do in this state?".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActionChoice {
    /// Chosen action.
    pub action: RoutingAction,
    /// Engine confidence in the choice.
    pub confidence: f64,
}

/// A single experience handed to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transition {
    /// State the action was taken in.
    pub state: String,
    /// Action taken.
    pub action: RoutingAction,
    /// Observed reward.
    pub reward: f64,
    /// Following state, if any.
    pub next_state: Option<String>,
    /// Whether the episode ended.
    pub done: bool,
}

/// A constructed learning engine.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LearningEngine: Send + Sync {
    /// Best action among `actions` for `state_key`.
    async fn get_best_action(
        &self,
        namespace: &str,
        state_key: &str,
        actions: &[RoutingAction],
    ) -> EngineResult<ActionChoice>;

    /// Apply one experience.
    async fn update(&self, namespace: &str, transition: &Transition) -> EngineResult<()>;

    /// Learned value per action for `state_key`.
    async fn get_q_values(
        &self,
        namespace: &str,
        state_key: &str,
    ) -> EngineResult<HashMap<RoutingAction, f64>>;

    /// Select the algorithm variant for a namespace.
    async fn set_algorithm(&self, namespace: &str, variant: AlgorithmVariant) -> EngineResult<()>;
}

/// Constructs the learning engine. Called at most once per router.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LearningEngineFactory: Send + Sync {
    /// Build an engine with the given parameters.
    async fn create(&self, params: EngineParams) -> EngineResult<Arc<dyn LearningEngine>>;
}
