//! AppBuilder - wiring and startup checks.
//!
//! # Fail-fast
//! The three tracker task types are expected by default; `build()` fails
//! with [`BuildError::MissingTaskTypes`] if any expected type has no handler,
//! instead of letting the first submitted task fail at run time.

use std::sync::Arc;

use super::runtime::Runtime;
use super::tracker::Tracker;
use super::worker::WorkerGroup;
use crate::config::TrackerConfig;
use crate::domain::{DefaultDecider, TransportError};
use crate::impls::HttpTransport;
use crate::ports::Transport;
use crate::queue::InMemoryQueue;
use crate::typed::{
    Handler, RegistryError, Task, TrackEvent, TrackFunnel, TrackPeople, TrackingHandler,
    TypedRegistry,
};

pub const DEFAULT_WORKERS: usize = 4;

/// ```ignore
/// let tracker = AppBuilder::new(TrackerConfig::from_env()?)
///     .with_tracking_handlers()?
///     .build()?
///     .start();
/// ```
pub struct AppBuilder {
    config: TrackerConfig,
    registry: TypedRegistry,
    transport: Option<Arc<dyn Transport>>,
    workers: usize,
    expected_tasks: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("missing task types: {0:?}. These tasks were expected but not registered.")]
    MissingTaskTypes(Vec<String>),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("HTTP transport: {0}")]
    Transport(#[from] TransportError),

    #[error("at least one worker is required")]
    NoWorkers,
}

impl AppBuilder {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            registry: TypedRegistry::new(),
            transport: None,
            workers: DEFAULT_WORKERS,
            expected_tasks: vec![
                TrackEvent::TYPE.to_string(),
                TrackPeople::TYPE.to_string(),
                TrackFunnel::TYPE.to_string(),
            ],
        }
    }

    /// Transport used by [`with_tracking_handlers`](Self::with_tracking_handlers).
    /// Defaults to [`HttpTransport`] built from the config.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Register the tracking pipeline for the event, people and funnel tasks.
    pub fn with_tracking_handlers(mut self) -> Result<Self, BuildError> {
        let transport: Arc<dyn Transport> = match &self.transport {
            Some(transport) => Arc::clone(transport),
            None => Arc::new(HttpTransport::from_config(&self.config)?),
        };
        let handler = TrackingHandler::new(Arc::new(self.config.clone()), transport);

        self.registry.register::<TrackEvent, _>(handler.clone())?;
        self.registry.register::<TrackPeople, _>(handler.clone())?;
        self.registry.register::<TrackFunnel, _>(handler)?;
        Ok(self)
    }

    pub fn register<T: Task, H: Handler<T> + 'static>(
        mut self,
        handler: H,
    ) -> Result<Self, RegistryError> {
        self.registry.register::<T, H>(handler)?;
        Ok(self)
    }

    /// Replace the set of task types that must have a handler at build time.
    pub fn expect_tasks(mut self, task_types: &[&str]) -> Self {
        self.expected_tasks = task_types.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn build(self) -> Result<App, BuildError> {
        if self.workers == 0 {
            return Err(BuildError::NoWorkers);
        }

        let registered = self.registry.registered_types();
        let missing: Vec<String> = self
            .expected_tasks
            .iter()
            .filter(|t| !registered.contains(t))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(BuildError::MissingTaskTypes(missing));
        }

        Ok(App {
            config: self.config,
            registry: Arc::new(self.registry),
            workers: self.workers,
        })
    }
}

/// A validated application, ready to start.
pub struct App {
    config: TrackerConfig,
    registry: Arc<TypedRegistry>,
    workers: usize,
}

impl App {
    pub fn registry(&self) -> &TypedRegistry {
        &self.registry
    }

    /// Spawn the workers and return the facade that feeds them.
    /// Must be called inside a tokio runtime.
    pub fn start(self) -> Tracker {
        let queue = Arc::new(InMemoryQueue::new());
        let decider = Arc::new(DefaultDecider::new(self.config.retry_policy()));
        let runtime = Arc::new(Runtime::new(self.registry, decider, queue.clone()));
        let workers = WorkerGroup::spawn(self.workers, queue.clone(), runtime);
        Tracker::new(self.config, queue, workers)
    }
}
