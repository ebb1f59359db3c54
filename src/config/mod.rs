use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::AppError;

/// Discount factor handed to the learning engine at construction.
pub const DISCOUNT_FACTOR: f64 = 0.95;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Shadow-comparison database.
    pub database: DatabaseConfig,
    /// Log level and format.
    pub logging: LoggingConfig,
    /// Timeout for external capability calls.
    pub request: RequestConfig,
    /// Learning engine settings.
    pub learning: LearningConfig,
    /// Shadow-mode promotion thresholds.
    pub promotion: PromotionPolicy,
    /// Metrics export settings.
    pub metrics: MetricsConfig,
    /// Reasoning bank settings.
    pub reasoning: ReasoningConfig,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// SQLite file path.
    pub path: PathBuf,
    /// Connection pool size.
    pub max_connections: u32,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    /// Human-readable lines.
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Timeout applied to every call into an external capability
/// (learning engine, embedding provider, vector store).
#[derive(Debug, Clone)]
pub struct RequestConfig {
    /// Per-call timeout in milliseconds.
    pub timeout_ms: u64,
}

impl RequestConfig {
    /// Timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Learning engine configuration
#[derive(Debug, Clone)]
pub struct LearningConfig {
    /// Namespace the router's state lives under in the engine.
    pub namespace: String,
    /// Default exploration rate (epsilon).
    pub exploration_rate: f64,
}

/// Thresholds for promoting the learned path out of shadow mode.
#[derive(Debug, Clone, PartialEq)]
pub struct PromotionPolicy {
    /// Minimum number of shadow comparisons in the window.
    pub min_samples: u64,
    /// Minimum observation window in days.
    pub min_period_days: u32,
    /// Minimum match rate, in percent.
    pub min_match_rate: u8,
    /// Maximum allowed ratio of SDK to heuristic average latency.
    pub max_latency_ratio: f64,
}

/// Metrics export configuration
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Window used when flattening reports into metrics.
    pub period_days: u32,
}

/// Reasoning bank configuration
#[derive(Debug, Clone)]
pub struct ReasoningConfig {
    /// Prefix of the per-tenant collection name.
    pub collection_prefix: String,
    /// Default number of similar chains returned.
    pub similar_limit: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database = DatabaseConfig {
            path: PathBuf::from(
                env::var("DATABASE_PATH").unwrap_or_else(|_| "./data/router.db".to_string()),
            ),
            max_connections: parse_env("DATABASE_MAX_CONNECTIONS", 5),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let request = RequestConfig {
            timeout_ms: parse_env("DEPENDENCY_TIMEOUT_MS", 5000),
        };

        let learning = LearningConfig {
            namespace: env::var("ROUTER_NAMESPACE")
                .unwrap_or_else(|_| "hybrid-routing".to_string()),
            exploration_rate: parse_env("ROUTER_EXPLORATION_RATE", 0.1),
        };
        if !(0.0..=1.0).contains(&learning.exploration_rate) {
            return Err(AppError::Config {
                message: format!(
                    "ROUTER_EXPLORATION_RATE must be within [0, 1], got {}",
                    learning.exploration_rate
                ),
            });
        }

        let defaults = PromotionPolicy::default();
        let promotion = PromotionPolicy {
            min_samples: parse_env("PROMOTION_MIN_SAMPLES", defaults.min_samples),
            min_period_days: parse_env("PROMOTION_MIN_PERIOD_DAYS", defaults.min_period_days),
            min_match_rate: parse_env("PROMOTION_MIN_MATCH_RATE", defaults.min_match_rate),
            max_latency_ratio: parse_env(
                "PROMOTION_MAX_LATENCY_RATIO",
                defaults.max_latency_ratio,
            ),
        };
        if !promotion.max_latency_ratio.is_finite() || promotion.max_latency_ratio <= 0.0 {
            return Err(AppError::Config {
                message: format!(
                    "PROMOTION_MAX_LATENCY_RATIO must be a positive finite number, got {}",
                    promotion.max_latency_ratio
                ),
            });
        }
        if promotion.min_match_rate > 100 {
            return Err(AppError::Config {
                message: format!(
                    "PROMOTION_MIN_MATCH_RATE must be a percentage, got {}",
                    promotion.min_match_rate
                ),
            });
        }

        let metrics = MetricsConfig {
            period_days: parse_env("METRICS_PERIOD_DAYS", 30),
        };

        let reasoning = ReasoningConfig {
            collection_prefix: env::var("REASONING_COLLECTION_PREFIX")
                .unwrap_or_else(|_| "reasoning-chains".to_string()),
            similar_limit: parse_env("REASONING_SIMILAR_LIMIT", 5),
        };

        Ok(Config {
            database,
            logging,
            request,
            learning,
            promotion,
            metrics,
            reasoning,
        })
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self { timeout_ms: 5000 }
    }
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            namespace: "hybrid-routing".to_string(),
            exploration_rate: 0.1,
        }
    }
}

impl Default for PromotionPolicy {
    fn default() -> Self {
        Self {
            min_samples: 100,
            min_period_days: 7,
            min_match_rate: 90,
            max_latency_ratio: 1.5,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { period_days: 30 }
    }
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            collection_prefix: "reasoning-chains".to_string(),
            similar_limit: 5,
        }
    }
}
