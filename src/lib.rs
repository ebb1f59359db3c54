//! # Hybrid Decision Router
//!
//! Decides, per tenant and decision type, whether an automated decision
//! should be driven by an LLM, by deterministic heuristics, or by a blend of
//! both, and learns that choice from observed outcomes.
//!
//! ## Components
//!
//! - **LearningRouter**: wraps an external reinforcement-learning engine
//!   that picks a path per context and learns from rewards
//! - **AccuracyTracker**: rolling per-path accuracy used when the learned
//!   policy has no answer
//! - **ScoringRouter**: learned policy first, accuracy tracker second,
//!   heuristic-primary default last
//! - **HybridScorer**: fuses LLM and heuristic confidences with a floor on
//!   the heuristic share
//! - **ShadowComparisonAggregator**: turns dual-run logs into promotion
//!   reports and scrape metrics
//! - **ReasoningBank**: tenant-scoped semantic memory of reasoning chains
//!
//! ## Architecture
//!
//! ```text
//! caller ─▶ ScoringRouter ─▶ LearningRouter ─▶ learning engine
//!                │                 (lazy, timed out, never throws)
//!                └──────▶ AccuracyTracker
//!
//! caller ─▶ HybridScorer ─▶ LearningRouter (weights)
//!
//! shadow runner ─▶ SQLite ─▶ ShadowComparisonAggregator ─▶ reports / metrics
//! ```
//!
//! Every external capability is optional. A component whose capability is
//! absent or broken degrades to its fallback instead of failing the
//! decision.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use hybrid_decision_router::{Config, HybridScorer, RoutingContext};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let _config = Config::from_env()?;
//!     let scorer = HybridScorer::default();
//!     let ctx = RoutingContext::new("tenant-1", "transaction-categorization");
//!     let fused = scorer.combine(Some(80), 60, &ctx).await;
//!     assert_eq!(fused.score, 72);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// Operator CLI commands for promotion reports.
pub mod cli;
/// Configuration management.
pub mod config;
/// Error types and result aliases for the application.
pub mod error;
/// Lazy one-shot initialization of external capabilities.
pub mod lifecycle;
/// Tenant-scoped reasoning-chain memory.
pub mod reasoning;
/// Path selection: learned policy, accuracy tracking and routing.
pub mod routing;
/// Confidence-score fusion.
pub mod scoring;
/// Shadow-mode comparison reports and metrics.
pub mod shadow;
/// SQLite storage layer for shadow comparisons.
pub mod storage;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use reasoning::ReasoningBank;
pub use routing::{
    AccuracyTracker, LearningRouter, RoutingAction, RoutingContext, RoutingDecision, ScoringRouter,
};
pub use scoring::{HybridScore, HybridScorer};
pub use shadow::{ShadowComparisonAggregator, ShadowReport};
pub use storage::SqliteStorage;
