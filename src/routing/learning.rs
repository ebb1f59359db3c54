//! Reinforcement-learning backed path selection.
//!
//! [`LearningRouter`] wraps an external learning engine. The engine is
//! constructed lazily on first use with a fixed discount factor and the
//! configured exploration rate, and its namespace is switched to double
//! Q-learning. If construction fails the router stays unavailable for the
//! rest of its life; callers fall back to the accuracy tracker.
//!
//! No method on this type surfaces an error. Failures are logged and
//! answered with `None` (or silently dropped, for rewards).

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::engine::{
    AlgorithmVariant, EngineParams, LearningEngine, LearningEngineFactory, Transition,
};
use super::{
    BlendWeights, DecisionSource, PathSelector, RewardEvent, RoutingAction, RoutingContext,
    RoutingDecision,
};
use crate::config::{LearningConfig, RequestConfig, DISCOUNT_FACTOR};
use crate::error::{EngineError, EngineResult};
use crate::lifecycle::{InitState, LazyInit};

/// Routes decisions using an external reinforcement-learning engine.
pub struct LearningRouter {
    factory: Option<Arc<dyn LearningEngineFactory>>,
    engine: LazyInit<Arc<dyn LearningEngine>>,
    config: LearningConfig,
    timeout: Duration,
}

impl LearningRouter {
    /// Create a router backed by the given engine factory.
    pub fn new(
        factory: Arc<dyn LearningEngineFactory>,
        config: LearningConfig,
        request: &RequestConfig,
    ) -> Self {
        Self {
            factory: Some(factory),
            engine: LazyInit::new("learning_engine"),
            config,
            timeout: request.timeout(),
        }
    }

    /// Create a router with no engine configured. It is never available.
    pub fn unconfigured(config: LearningConfig) -> Self {
        Self {
            factory: None,
            engine: LazyInit::new("learning_engine"),
            config,
            timeout: RequestConfig::default().timeout(),
        }
    }

    /// Engine namespace this router reads and writes.
    pub fn namespace(&self) -> &str {
        &self.config.namespace
    }

    /// Current initialization state.
    pub async fn state(&self) -> InitState {
        self.engine.state().await
    }

    /// Run the one-time initialization if it has not been attempted.
    ///
    /// Returns whether the engine is ready.
    pub async fn initialize(&self) -> bool {
        self.engine().await.is_some()
    }

    /// True only once the engine has been initialized successfully.
    ///
    /// Triggers the lazy initialization on first call.
    pub async fn is_available(&self) -> bool {
        self.initialize().await
    }

    /// Ask the engine for the best path in this context.
    pub async fn select_path(&self, ctx: &RoutingContext) -> Option<RoutingDecision> {
        let engine = self.engine().await?;
        let state_key = ctx.state_key();

        let choice = self
            .call(
                "get_best_action",
                engine.get_best_action(self.namespace(), state_key.as_str(), &RoutingAction::ALL),
            )
            .await;

        match choice {
            Ok(choice) => {
                debug!(
                    state_key = %state_key,
                    action = %choice.action,
                    confidence = choice.confidence,
                    "Learning engine selected path"
                );
                Some(RoutingDecision::new(
                    choice.action,
                    choice.confidence,
                    DecisionSource::LearningEngine,
                    state_key,
                ))
            }
            Err(e) => {
                warn!(
                    state_key = %state_key,
                    error = %e,
                    "Learning engine path selection failed"
                );
                None
            }
        }
    }

    /// Feed an outcome to the engine.
    ///
    /// A no-op while the engine is not initialized. Engine failures are
    /// logged and dropped.
    pub async fn record_reward(&self, event: &RewardEvent) {
        let Some(engine) = self.engine.get().await else {
            debug!(
                tenant_id = %event.context.tenant_id,
                decision_type = %event.context.decision_type,
                "Learning engine not initialized; reward dropped"
            );
            return;
        };

        let transition = Transition {
            state: event.context.state_key().to_string(),
            action: event.action,
            reward: event.reward,
            next_state: event.next_context.as_ref().map(|c| c.state_key().to_string()),
            done: event.done,
        };

        match self
            .call("update", engine.update(self.namespace(), &transition))
            .await
        {
            Ok(()) => debug!(
                state_key = %transition.state,
                action = %transition.action,
                reward = transition.reward,
                "Reward recorded"
            ),
            Err(e) => warn!(
                state_key = %transition.state,
                error = %e,
                "Failed to record reward"
            ),
        }
    }

    /// Record a reward on a background task.
    ///
    /// The task awaits the engine call itself, so failures are still
    /// absorbed and logged.
    pub fn record_reward_detached(self: &Arc<Self>, event: RewardEvent) -> JoinHandle<()> {
        let router = Arc::clone(self);
        tokio::spawn(async move { router.record_reward(&event).await })
    }

    /// Raw learned values per action, for observability.
    pub async fn get_q_values(&self, ctx: &RoutingContext) -> Option<HashMap<RoutingAction, f64>> {
        let engine = self.engine().await?;
        let state_key = ctx.state_key();

        match self
            .call("get_q_values", engine.get_q_values(self.namespace(), state_key.as_str()))
            .await
        {
            Ok(values) => Some(values),
            Err(e) => {
                warn!(state_key = %state_key, error = %e, "Failed to read Q-values");
                None
            }
        }
    }

    /// Weights of the path the engine would currently choose.
    pub async fn get_optimal_weights(&self, ctx: &RoutingContext) -> Option<BlendWeights> {
        self.select_path(ctx).await.map(|decision| decision.weights)
    }

    async fn engine(&self) -> Option<Arc<dyn LearningEngine>> {
        self.engine.get_or_init(|| self.connect()).await
    }

    async fn connect(&self) -> EngineResult<Arc<dyn LearningEngine>> {
        let factory = self.factory.as_ref().ok_or(EngineError::NotConfigured)?;

        let params = EngineParams {
            default_epsilon: self.config.exploration_rate,
            discount_factor: DISCOUNT_FACTOR,
        };
        let engine = self.call("create", factory.create(params)).await?;

        self.call(
            "set_algorithm",
            engine.set_algorithm(self.namespace(), AlgorithmVariant::DoubleQ),
        )
        .await?;

        info!(
            namespace = %self.config.namespace,
            epsilon = params.default_epsilon,
            discount_factor = params.discount_factor,
            algorithm = AlgorithmVariant::DoubleQ.as_str(),
            "Learning engine initialized"
        );
        Ok(engine)
    }

    async fn call<T>(
        &self,
        operation: &str,
        fut: impl Future<Output = EngineResult<T>>,
    ) -> EngineResult<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::Timeout {
                operation: operation.to_string(),
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        }
    }
}

#[async_trait]
impl PathSelector for LearningRouter {
    async fn is_available(&self) -> bool {
        LearningRouter::is_available(self).await
    }

    async fn select_path(&self, ctx: &RoutingContext) -> Option<RoutingDecision> {
        LearningRouter::select_path(self, ctx).await
    }

    async fn optimal_weights(&self, ctx: &RoutingContext) -> Option<BlendWeights> {
        self.get_optimal_weights(ctx).await
    }

    async fn q_values(&self, ctx: &RoutingContext) -> Option<HashMap<RoutingAction, f64>> {
        self.get_q_values(ctx).await
    }

    async fn record_reward(&self, event: &RewardEvent) {
        LearningRouter::record_reward(self, event).await
    }
}
