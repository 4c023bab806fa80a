use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use super::runtime::Runtime;
use crate::domain::{TaskEnvelope, TrackError};
use crate::queue::{Queue, TaskResult};

/// Worker group handle.
/// - `request_shutdown` stops every worker from taking new leases
/// - `shutdown_and_join` also waits for in-flight attempts to finish
pub struct WorkerGroup {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl WorkerGroup {
    /// Spawn `n` workers.
    pub fn spawn(n: usize, queue: Arc<dyn Queue>, runtime: Arc<Runtime>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let joins = (0..n)
            .map(|worker_id| {
                let q = Arc::clone(&queue);
                let rt = Arc::clone(&runtime);
                let mut rx = shutdown_rx.clone();
                tokio::spawn(async move {
                    worker_loop(worker_id, q, rt, &mut rx).await;
                })
            })
            .collect();

        Self { shutdown_tx, joins }
    }

    pub fn len(&self) -> usize {
        self.joins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }

    pub fn request_shutdown(&self) {
        // receivers may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for join in self.joins {
            let _ = join.await;
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    queue: Arc<dyn Queue>,
    runtime: Arc<Runtime>,
    shutdown_rx: &mut watch::Receiver<bool>,
) {
    debug!(worker_id, "worker started");
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        // lease() may wait, so race it against shutdown
        let lease = tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            lease = queue.lease() => lease,
        };

        // own what the attempt needs; no queue lock is held across the await
        let envelope = lease.envelope().clone();
        let result = run_isolated(&runtime, &envelope).await;

        match &result {
            Err(
                err @ (TrackError::HandlerNotFound(_)
                | TrackError::InvalidPayload(_)
                | TrackError::Scheduler(_)
                | TrackError::Worker(_)),
            ) => error!(worker_id, task_id = %envelope.task_id(), error = %err, "task failed"),
            Err(err) => debug!(worker_id, task_id = %envelope.task_id(), error = %err, "task failed"),
            Ok(_) => {}
        }
        lease.complete(result).await;
    }
    debug!(worker_id, "worker stopped");
}

/// Run the attempt on its own task so a panicking handler fails the task
/// instead of the worker; the lease is completed either way.
async fn run_isolated(runtime: &Arc<Runtime>, envelope: &TaskEnvelope) -> TaskResult {
    let rt = Arc::clone(runtime);
    let env = envelope.clone();
    match tokio::spawn(async move { rt.run_attempt(&env).await }).await {
        Ok(result) => result,
        Err(join) => Err(TrackError::Worker(join.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::config::TrackerConfig;
    use crate::domain::{
        DefaultDecider, Outcome, TaskEnvelope, TaskId, TaskType, TransportError,
    };
    use crate::queue::{InMemoryQueue, RetryPolicy};
    use crate::typed::handler::tests::ScriptedTransport;
    use crate::typed::{Handler, Task, TrackEvent, TrackingHandler, TypedRegistry};

    const BOUND: Duration = Duration::from_secs(2);

    /// Blows up on the event named "boom".
    struct Explosive;

    #[async_trait::async_trait]
    impl Handler<TrackEvent> for Explosive {
        async fn handle(&self, task: TrackEvent) -> Result<bool, TrackError> {
            if task.event == "boom" {
                panic!("handler exploded");
            }
            Ok(true)
        }
    }

    fn single_worker(registry: TypedRegistry) -> (WorkerGroup, Arc<InMemoryQueue>) {
        let queue = Arc::new(InMemoryQueue::new());
        let runtime = Arc::new(Runtime::new(
            Arc::new(registry),
            Arc::new(DefaultDecider::new(RetryPolicy::default())),
            queue.clone(),
        ));
        let workers = WorkerGroup::spawn(1, queue.clone(), runtime);
        (workers, queue)
    }

    fn named(event: &str) -> TaskEnvelope {
        TaskEnvelope::new(
            TaskId::generate(),
            TaskType::new(TrackEvent::TYPE),
            json!({ "event": event }),
        )
    }

    fn group(
        answer: fn() -> Result<bool, TransportError>,
        policy: RetryPolicy,
    ) -> (WorkerGroup, Arc<InMemoryQueue>, Arc<ScriptedTransport>) {
        let transport = Arc::new(ScriptedTransport::new(answer));
        let handler = TrackingHandler::new(Arc::new(TrackerConfig::default()), transport.clone());
        let mut registry = TypedRegistry::new();
        registry.register::<TrackEvent, _>(handler).unwrap();

        let queue = Arc::new(InMemoryQueue::new());
        let runtime = Arc::new(Runtime::new(
            Arc::new(registry),
            Arc::new(DefaultDecider::new(policy)),
            queue.clone(),
        ));
        let workers = WorkerGroup::spawn(2, queue.clone(), runtime);
        (workers, queue, transport)
    }

    fn event() -> TaskEnvelope {
        TaskEnvelope::new(
            TaskId::generate(),
            TaskType::new(TrackEvent::TYPE),
            json!({"event": "e"}),
        )
    }

    #[tokio::test]
    async fn workers_drain_the_queue() {
        let (workers, queue, transport) = group(|| Ok(true), RetryPolicy::default());
        assert_eq!(workers.len(), 2);

        let first = queue.enqueue(event()).await.unwrap();
        let second = queue.enqueue(event()).await.unwrap();
        assert!(first.wait().await.unwrap().recorded());
        assert!(second.wait().await.unwrap().recorded());
        assert_eq!(transport.sent().len(), 2);
        assert_eq!(queue.counts_by_state().await.succeeded, 2);

        workers.shutdown_and_join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn failing_task_runs_max_retries_plus_one_times() {
        let (workers, queue, transport) = group(
            || Err(TransportError::Timeout(Duration::from_secs(5))),
            RetryPolicy::fixed(Duration::from_secs(300), 3),
        );

        let handle = queue.enqueue(event()).await.unwrap();
        let outcome = handle.wait().await.unwrap();

        assert!(matches!(outcome, Outcome::Abandoned { attempts: 4, .. }));
        assert_eq!(transport.sent().len(), 4);
        assert_eq!(queue.counts_by_state().await.dead, 1);

        workers.shutdown_and_join().await;
    }

    #[tokio::test]
    async fn panicking_handler_fails_only_its_task() {
        let mut registry = TypedRegistry::new();
        registry.register::<TrackEvent, _>(Explosive).unwrap();
        let (workers, queue) = single_worker(registry);

        let boom = queue.enqueue(named("boom")).await.unwrap();
        let err = tokio::time::timeout(BOUND, boom.wait())
            .await
            .expect("handle should resolve")
            .unwrap_err();
        assert!(matches!(err, TrackError::Worker(_)));

        // the only worker is still alive
        let fine = queue.enqueue(named("fine")).await.unwrap();
        let outcome = tokio::time::timeout(BOUND, fine.wait())
            .await
            .expect("handle should resolve")
            .unwrap();
        assert!(outcome.recorded());

        let counts = queue.counts_by_state().await;
        assert_eq!((counts.succeeded, counts.dead), (1, 1));
        workers.shutdown_and_join().await;
    }

    #[tokio::test]
    async fn unknown_task_type_fails_its_handle() {
        let (workers, queue) = single_worker(TypedRegistry::new());

        let envelope = TaskEnvelope::new(TaskId::generate(), TaskType::new("missing"), json!({}));
        let handle = queue.enqueue(envelope).await.unwrap();
        let err = tokio::time::timeout(BOUND, handle.wait())
            .await
            .expect("handle should resolve")
            .unwrap_err();
        assert!(matches!(err, TrackError::HandlerNotFound(t) if t == "missing"));
        workers.shutdown_and_join().await;
    }

    #[tokio::test]
    async fn idle_workers_stop_on_shutdown() {
        let (workers, _, _) = group(|| Ok(true), RetryPolicy::default());
        tokio::time::timeout(Duration::from_secs(1), workers.shutdown_and_join())
            .await
            .expect("workers should stop promptly");
    }
}
