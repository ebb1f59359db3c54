//! Lazy, one-shot initialization of external capability handles.
//!
//! Components that talk to an external service (the learning engine, the
//! vector store) connect on first use rather than at construction. The
//! handle moves through an explicit state machine:
//!
//! ```text
//! Uninitialized ──▶ Initializing ──▶ Ready(handle)
//!                         │
//!                         └────────▶ Failed   (terminal)
//! ```
//!
//! `Failed` is never retried for the lifetime of the owning instance.
//! Concurrent first callers are serialized behind a gate so the initializer
//! runs at most once.

use std::fmt::Display;
use std::future::Future;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Observable initialization state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitState {
    /// No initialization attempted yet.
    Uninitialized,
    /// First caller is running the initializer.
    Initializing,
    /// Handle is ready for use.
    Ready,
    /// Initialization failed; permanent for this instance.
    Failed,
}

impl InitState {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            InitState::Uninitialized => "uninitialized",
            InitState::Initializing => "initializing",
            InitState::Ready => "ready",
            InitState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for InitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

enum Slot<T> {
    Uninitialized,
    Initializing,
    Ready(T),
    Failed,
}

impl<T> Slot<T> {
    fn state(&self) -> InitState {
        match self {
            Slot::Uninitialized => InitState::Uninitialized,
            Slot::Initializing => InitState::Initializing,
            Slot::Ready(_) => InitState::Ready,
            Slot::Failed => InitState::Failed,
        }
    }
}

/// A handle that is initialized at most once, on first use.
pub struct LazyInit<T> {
    component: &'static str,
    slot: RwLock<Slot<T>>,
    gate: Mutex<()>,
}

impl<T: Clone> LazyInit<T> {
    /// Create an uninitialized handle for the named component.
    pub fn new(component: &'static str) -> Self {
        Self {
            component,
            slot: RwLock::new(Slot::Uninitialized),
            gate: Mutex::new(()),
        }
    }

    /// Current state.
    pub async fn state(&self) -> InitState {
        self.slot.read().await.state()
    }

    /// The ready handle, without attempting initialization.
    pub async fn get(&self) -> Option<T> {
        match &*self.slot.read().await {
            Slot::Ready(value) => Some(value.clone()),
            _ => None,
        }
    }

    /// Return the ready handle, running `init` if no attempt has been made.
    ///
    /// Returns `None` once initialization has failed.
    pub async fn get_or_init<F, Fut, E>(&self, init: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        if let Some(settled) = self.settled().await {
            return settled;
        }

        let _gate = self.gate.lock().await;

        // Another caller may have finished while we waited on the gate.
        if let Some(settled) = self.settled().await {
            return settled;
        }

        *self.slot.write().await = Slot::Initializing;
        debug!(component = self.component, "Initializing capability");

        let outcome = init().await;

        let mut slot = self.slot.write().await;
        match outcome {
            Ok(value) => {
                *slot = Slot::Ready(value.clone());
                info!(component = self.component, "Capability ready");
                Some(value)
            }
            Err(e) => {
                *slot = Slot::Failed;
                warn!(
                    component = self.component,
                    error = %e,
                    "Capability initialization failed; staying unavailable"
                );
                None
            }
        }
    }

    async fn settled(&self) -> Option<Option<T>> {
        match &*self.slot.read().await {
            Slot::Ready(value) => Some(Some(value.clone())),
            Slot::Failed => Some(None),
            Slot::Uninitialized | Slot::Initializing => None,
        }
    }
}
