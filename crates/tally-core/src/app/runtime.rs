//! Runtime - runs one attempt of a task and decides what happens next.
//!
//! The runtime never sleeps for a retry: a rescheduled task is handed to the
//! [`RetryScheduler`] and the attempt returns immediately.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::{Decider, Decision, Outcome, TaskEnvelope, TrackError};
use crate::ports::RetryScheduler;
use crate::typed::TypedRegistry;

pub struct Runtime {
    registry: Arc<TypedRegistry>,
    decider: Arc<dyn Decider>,
    scheduler: Arc<dyn RetryScheduler>,
}

impl Runtime {
    pub fn new(
        registry: Arc<TypedRegistry>,
        decider: Arc<dyn Decider>,
        scheduler: Arc<dyn RetryScheduler>,
    ) -> Self {
        Self {
            registry,
            decider,
            scheduler,
        }
    }

    /// Execute one attempt of `envelope`.
    ///
    /// - the remote answered: `Delivered`
    /// - transient failure with retries left: resubmitted, `RetryScheduled`
    /// - transient failure, retries spent: `RetriesExhausted` when the
    ///   envelope asks for it, otherwise a warning and `Abandoned`
    /// - permanent failure: the error, unchanged
    pub async fn run_attempt(&self, envelope: &TaskEnvelope) -> Result<Outcome, TrackError> {
        let task_type = envelope.task_type();
        let handler = self
            .registry
            .get(task_type.as_str())
            .ok_or_else(|| TrackError::HandlerNotFound(task_type.to_string()))?;

        let task_id = envelope.task_id();
        let attempt = envelope.attempt();

        let error = match handler.handle_dyn(envelope.payload()).await {
            Ok(recorded) => {
                debug!(%task_id, attempt, recorded, "attempt delivered");
                return Ok(Outcome::Delivered { recorded });
            }
            Err(err) if !err.is_retryable() => return Err(err),
            Err(err) => err,
        };

        match self.decider.decide(attempt, &error) {
            Decision::Retry { delay, reason } => {
                warn!(%task_id, attempt, error = %error, "{reason}");
                let next_attempt = attempt + 1;
                self.scheduler
                    .submit(envelope.next_attempt(), delay, next_attempt)
                    .await?;
                Ok(Outcome::RetryScheduled {
                    next_attempt,
                    delay,
                })
            }
            Decision::GiveUp { reason } => {
                if envelope.raise_on_exhaustion() {
                    return Err(match error {
                        TrackError::Transport(source) => TrackError::RetriesExhausted {
                            attempts: attempt,
                            source,
                        },
                        other => other,
                    });
                }
                warn!(%task_id, attempts = attempt, error = %error, "{reason}; dropping task");
                Ok(Outcome::Abandoned {
                    attempts: attempt,
                    reason: error.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::config::TrackerConfig;
    use crate::domain::{DefaultDecider, TaskId, TaskType, TransportError};
    use crate::impls::RecordingScheduler;
    use crate::queue::RetryPolicy;
    use crate::typed::handler::tests::ScriptedTransport;
    use crate::typed::{Task, TrackEvent, TrackFunnel, TrackingHandler};

    const DELAY: Duration = Duration::from_secs(300);

    fn unavailable() -> Result<bool, TransportError> {
        Err(TransportError::Status {
            status: 503,
            reason: "Service Unavailable".to_string(),
        })
    }

    fn runtime(
        answer: fn() -> Result<bool, TransportError>,
        max_retries: u32,
    ) -> (Runtime, Arc<RecordingScheduler>, Arc<ScriptedTransport>) {
        let transport = Arc::new(ScriptedTransport::new(answer));
        let handler = TrackingHandler::new(
            Arc::new(TrackerConfig::default().with_api_token("tok")),
            transport.clone(),
        );
        let mut registry = TypedRegistry::new();
        registry.register::<TrackEvent, _>(handler.clone()).unwrap();
        registry.register::<TrackFunnel, _>(handler).unwrap();

        let scheduler = Arc::new(RecordingScheduler::new());
        let decider = Arc::new(DefaultDecider::new(RetryPolicy::fixed(DELAY, max_retries)));
        let rt = Runtime::new(Arc::new(registry), decider, scheduler.clone());
        (rt, scheduler, transport)
    }

    fn event_envelope() -> TaskEnvelope {
        TaskEnvelope::new(
            TaskId::generate(),
            TaskType::new(TrackEvent::TYPE),
            json!({"event": "event_foo"}),
        )
    }

    #[tokio::test]
    async fn delivered_attempt_is_not_rescheduled() {
        let (rt, scheduler, _) = runtime(|| Ok(true), 5);

        let outcome = rt.run_attempt(&event_envelope()).await.unwrap();
        assert_eq!(outcome, Outcome::Delivered { recorded: true });
        assert!(scheduler.submissions().is_empty());
    }

    #[tokio::test]
    async fn transport_failure_is_resubmitted_with_next_attempt() {
        let (rt, scheduler, _) = runtime(unavailable, 5);
        let env = event_envelope();

        let outcome = rt.run_attempt(&env).await.unwrap();
        assert_eq!(
            outcome,
            Outcome::RetryScheduled {
                next_attempt: 2,
                delay: DELAY
            }
        );

        let submitted = scheduler.submissions();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].attempt, 2);
        assert_eq!(submitted[0].delay, DELAY);
        assert_eq!(submitted[0].envelope.task_id(), env.task_id());
        assert_eq!(submitted[0].envelope.attempt(), 2);
    }

    #[tokio::test]
    async fn invalid_funnel_is_never_resubmitted() {
        let (rt, scheduler, transport) = runtime(|| Ok(true), 5);
        let env = TaskEnvelope::new(
            TaskId::generate(),
            TaskType::new(TrackFunnel::TYPE),
            json!({"funnel": "f", "step": "s", "goal": "g", "properties": {}}),
        );

        let err = rt.run_attempt(&env).await.unwrap_err();
        assert!(matches!(
            err,
            TrackError::MissingRequiredField {
                field: "distinct_id"
            }
        ));
        assert!(scheduler.submissions().is_empty());
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn exhaustion_raises_when_asked() {
        let (rt, scheduler, _) = runtime(unavailable, 2);
        let env = event_envelope()
            .with_raise_on_exhaustion(true)
            .next_attempt()
            .next_attempt();

        let err = rt.run_attempt(&env).await.unwrap_err();
        assert!(matches!(
            err,
            TrackError::RetriesExhausted {
                attempts: 3,
                source: TransportError::Status { status: 503, .. }
            }
        ));
        assert!(scheduler.submissions().is_empty());
    }

    #[tokio::test]
    async fn exhaustion_is_absorbed_by_default() {
        let (rt, scheduler, _) = runtime(unavailable, 2);
        let env = event_envelope().next_attempt().next_attempt();

        let outcome = rt.run_attempt(&env).await.unwrap();
        assert!(matches!(outcome, Outcome::Abandoned { attempts: 3, .. }));
        assert!(!outcome.recorded());
        assert!(scheduler.submissions().is_empty());
    }

    #[tokio::test]
    async fn unknown_task_type_is_an_error() {
        let (rt, _, _) = runtime(|| Ok(true), 5);
        let env = TaskEnvelope::new(TaskId::generate(), TaskType::new("missing"), json!({}));

        let err = rt.run_attempt(&env).await.unwrap_err();
        assert!(matches!(err, TrackError::HandlerNotFound(t) if t == "missing"));
    }
}
