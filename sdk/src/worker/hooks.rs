//! Worker hooks for observing polling activity.

use async_trait::async_trait;
use std::sync::Arc;

/// Events emitted by a running job worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    /// The poll loop started
    Started { task_type: String },
    /// Every job drained after `stop()`
    Stopped { task_type: String },
    /// A poll cycle began
    Poll {
        active_jobs: usize,
        max_jobs: usize,
        /// Jobs that will be requested; zero when the worker is saturated
        capacity: usize,
    },
    /// Activation failed; the loop continues on the next tick
    PollError { error: String },
}

/// Hook for observing job worker events.
///
/// Hooks run inline on the poll loop, so keep them cheap.
#[async_trait]
pub trait WorkerHook: Send + Sync {
    /// Called for every worker event.
    async fn on_event(&self, event: &WorkerEvent) {
        let _ = event;
    }
}

/// A chain of worker hooks that are executed in order.
pub struct HookChain {
    hooks: Vec<Arc<dyn WorkerHook>>,
}

impl Default for HookChain {
    fn default() -> Self {
        Self::new()
    }
}

impl HookChain {
    /// Creates a new empty hook chain.
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    /// Adds a hook to the chain.
    pub fn add<H: WorkerHook + 'static>(&mut self, hook: H) {
        self.hooks.push(Arc::new(hook));
    }

    /// Adds an Arc-wrapped hook to the chain.
    pub fn add_arc(&mut self, hook: Arc<dyn WorkerHook>) {
        self.hooks.push(hook);
    }

    /// Returns the number of hooks in the chain.
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Returns true if the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Emits an event to all hooks in order.
    pub async fn emit(&self, event: WorkerEvent) {
        for hook in &self.hooks {
            hook.on_event(&event).await;
        }
    }
}

impl Clone for HookChain {
    fn clone(&self) -> Self {
        Self {
            hooks: self.hooks.clone(),
        }
    }
}

impl std::fmt::Debug for HookChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookChain")
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

/// Built-in hook that logs worker events with tracing
pub struct LoggingHook {
    level: tracing::Level,
}

impl LoggingHook {
    /// Create a new logging hook with the specified log level
    pub fn new(level: tracing::Level) -> Self {
        Self { level }
    }

    /// Create a logging hook that logs at INFO level
    pub fn info() -> Self {
        Self::new(tracing::Level::INFO)
    }

    /// Create a logging hook that logs at DEBUG level
    pub fn debug() -> Self {
        Self::new(tracing::Level::DEBUG)
    }
}

impl Default for LoggingHook {
    fn default() -> Self {
        Self::info()
    }
}

#[async_trait]
impl WorkerHook for LoggingHook {
    async fn on_event(&self, event: &WorkerEvent) {
        match event {
            // Poll ticks are noisy, always debug
            WorkerEvent::Poll {
                active_jobs,
                max_jobs,
                capacity,
            } => {
                tracing::debug!(active_jobs, max_jobs, capacity, "Polling for jobs");
            }
            WorkerEvent::PollError { error } => {
                tracing::warn!(error = %error, "Job activation failed");
            }
            WorkerEvent::Started { task_type } => match self.level {
                tracing::Level::DEBUG => tracing::debug!(task_type = %task_type, "Worker started"),
                _ => tracing::info!(task_type = %task_type, "Worker started"),
            },
            WorkerEvent::Stopped { task_type } => match self.level {
                tracing::Level::DEBUG => tracing::debug!(task_type = %task_type, "Worker stopped"),
                _ => tracing::info!(task_type = %task_type, "Worker stopped"),
            },
        }
    }
}
