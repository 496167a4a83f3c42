//! Worker pool
//!
//! A fixed set of tokio tasks pulls [`Task`]s from the work queue, runs each one
//! through the [`Environment`] with a proxy from the [`ProxyManager`], and routes
//! the outcome: results go to the result queue, failures are retried until the
//! retry budget is spent and then recorded as terminal.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use super::environment::Environment;
use super::ledger::{RetryDecision, TaskLedger};
use crate::config::PoolConfig;
use crate::error::{PoolError, Result};
use crate::models::{FailedTask, Handler, Proxy, Task, TaskId, TaskOutput, TaskState};
use crate::proxy::ProxyManager;
use crate::queue::WorkQueue;

/// Outcome of a single attempt
enum Attempt {
    Succeeded(Value),
    Failed(PoolError),
    Cancelled,
}

struct Shared<E: Environment> {
    config: PoolConfig,
    environment: E,
    proxies: Option<Arc<ProxyManager>>,
    tasks: WorkQueue<Task<E::Context>>,
    results: WorkQueue<TaskOutput>,
    failed: Mutex<Vec<FailedTask<E::Context>>>,
    ledger: TaskLedger,
}

/// Workers spawned by one `start()` and the channel that stops them
struct Run {
    workers: Vec<JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
}

pub struct WorkerPool<E: Environment> {
    shared: Arc<Shared<E>>,
    run: Mutex<Option<Run>>,
}

impl<E: Environment> WorkerPool<E> {
    pub fn new(
        config: PoolConfig,
        environment: E,
        proxies: Option<Arc<ProxyManager>>,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                environment,
                proxies,
                tasks: WorkQueue::new(),
                results: WorkQueue::new(),
                failed: Mutex::new(Vec::new()),
                ledger: TaskLedger::new(),
            }),
            run: Mutex::new(None),
        })
    }

    /// Spawn the configured number of workers
    pub fn start(&self) -> Result<()> {
        let mut run = self.run.lock();
        if run.is_some() {
            return Err(PoolError::AlreadyRunning);
        }

        let (shutdown_tx, _) = watch::channel(false);
        let workers = (1..=self.shared.config.num_workers)
            .map(|worker_id| {
                let shared = Arc::clone(&self.shared);
                tokio::spawn(shared.run_worker(worker_id, shutdown_tx.subscribe()))
            })
            .collect();
        *run = Some(Run {
            workers,
            shutdown_tx,
        });

        info!(
            "Started {} workers (max retries: {}, blacklist policy: {})",
            self.shared.config.num_workers,
            self.shared.config.max_retries,
            self.shared.config.blacklist_policy.as_str()
        );
        Ok(())
    }

    /// Signal every worker to stop and wait for them to exit.
    ///
    /// Attempts in flight are abandoned: their context is closed and the task is
    /// marked cancelled, neither retried nor recorded as failed.
    pub async fn stop(&self) {
        let Some(run) = self.run.lock().take() else {
            return;
        };

        run.shutdown_tx.send_replace(true);
        for handle in run.workers {
            if let Err(e) = handle.await {
                error!("Worker exited abnormally: {}", e);
            }
        }
        info!("Worker pool stopped");
    }

    pub fn is_running(&self) -> bool {
        self.run.lock().is_some()
    }

    /// Queue a task for execution
    pub fn submit(&self, task: Task<E::Context>) -> TaskId {
        let id = task.id().clone();
        self.shared.ledger.mark_pending(&id);
        self.shared.tasks.enqueue(task);
        info!(task_id = %id, "Created task");
        id
    }

    /// Queue a handler with its arguments, generating an id when none is given
    pub fn submit_with(
        &self,
        id: Option<TaskId>,
        handler: Arc<dyn Handler<E::Context>>,
        args: Vec<Value>,
    ) -> TaskId {
        let id = id.unwrap_or_else(TaskId::generate);
        self.submit(Task::new(id, handler, args))
    }

    /// Wait until every submitted task, retries included, has been processed
    pub async fn wait_for_completion(&self) {
        self.shared.tasks.join().await;
    }

    /// Start, submit everything, wait for completion, then stop
    pub async fn run_batch<I>(&self, tasks: I) -> Result<()>
    where
        I: IntoIterator<Item = Task<E::Context>>,
    {
        self.run_batch_with(tasks, || async {}).await
    }

    /// Like [`run_batch`](Self::run_batch), running `after_drain` once the queue
    /// has completed and before the workers are stopped
    pub async fn run_batch_with<I, F, Fut>(&self, tasks: I, after_drain: F) -> Result<()>
    where
        I: IntoIterator<Item = Task<E::Context>>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = ()>,
    {
        self.start()?;

        for task in tasks {
            self.submit(task);
        }

        self.wait_for_completion().await;
        after_drain().await;
        self.stop().await;
        Ok(())
    }

    /// Take every result produced so far
    pub fn drain_results(&self) -> Vec<TaskOutput> {
        self.shared.results.drain()
    }

    /// Take the oldest result without waiting
    pub fn next_result(&self) -> Option<TaskOutput> {
        self.shared.results.try_dequeue()?.take()
    }

    /// Tasks that exhausted their retry budget, with the last error
    pub fn failed_tasks(&self) -> Vec<FailedTask<E::Context>> {
        self.shared.failed.lock().clone()
    }

    /// Number of attempts started for a task
    pub fn attempts(&self, id: &TaskId) -> u32 {
        self.shared.ledger.attempts(id)
    }

    pub fn task_state(&self, id: &TaskId) -> Option<TaskState> {
        self.shared.ledger.state(id)
    }

    /// Submitted items not yet processed
    pub fn pending(&self) -> usize {
        self.shared.tasks.unfinished()
    }
}

impl<E: Environment> Drop for WorkerPool<E> {
    fn drop(&mut self) {
        if let Some(run) = self.run.get_mut().take() {
            run.shutdown_tx.send_replace(true);
        }
    }
}

impl<E: Environment> Shared<E> {
    #[instrument(skip(self, shutdown))]
    async fn run_worker(self: Arc<Self>, worker_id: usize, mut shutdown: watch::Receiver<bool>) {
        debug!("Worker started");

        loop {
            let mut ticket = tokio::select! {
                biased;
                _ = cancelled(&mut shutdown) => break,
                ticket = self.tasks.dequeue() => ticket,
            };

            if let Some(task) = ticket.take() {
                self.process(worker_id, task, &mut shutdown).await;
            }
            ticket.ack();
        }

        debug!("Worker stopped");
    }

    async fn process(
        &self,
        worker_id: usize,
        task: Task<E::Context>,
        shutdown: &mut watch::Receiver<bool>,
    ) {
        let attempt = self.ledger.begin_attempt(task.id());
        info!(task_id = %task.id(), attempt, "Worker {} processing task", worker_id);

        let (outcome, proxy) = self.execute(&task, shutdown).await;

        match outcome {
            Attempt::Succeeded(value) => {
                if let (Some(manager), Some(proxy)) = (&self.proxies, &proxy) {
                    manager.add_to_whitelist(proxy);
                }
                self.ledger.mark_succeeded(task.id());
                self.results.enqueue(TaskOutput {
                    task_id: task.id().clone(),
                    value,
                    attempts: attempt,
                });
                info!(task_id = %task.id(), attempt, "Worker {} completed task", worker_id);
            }
            Attempt::Failed(err) => self.handle_failure(worker_id, task, proxy, err),
            Attempt::Cancelled => {
                self.ledger.mark_cancelled(task.id());
                info!(task_id = %task.id(), "Worker {} abandoned task on shutdown", worker_id);
            }
        }
    }

    /// Run one attempt, closing the context whatever happens
    async fn execute(
        &self,
        task: &Task<E::Context>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> (Attempt, Option<Proxy>) {
        let proxy = match &self.proxies {
            Some(manager) => {
                let selected = tokio::select! {
                    biased;
                    _ = cancelled(shutdown) => return (Attempt::Cancelled, None),
                    selected = manager.get_random_proxy() => selected,
                };
                match selected {
                    Ok(proxy) => Some(proxy),
                    Err(e) => return (Attempt::Failed(e), None),
                }
            }
            None => None,
        };

        let settings = proxy.as_ref().map(Proxy::to_settings);
        if let Some(settings) = &settings {
            debug!(task_id = %task.id(), proxy = %settings.server, "Opening context");
        }

        let opened = tokio::select! {
            biased;
            _ = cancelled(shutdown) => return (Attempt::Cancelled, proxy),
            opened = self.environment.open(settings.as_ref()) => opened,
        };
        let mut context = match opened {
            Ok(context) => context,
            Err(e) => return (Attempt::Failed(e), proxy),
        };

        let result = tokio::select! {
            biased;
            _ = cancelled(shutdown) => None,
            result = AssertUnwindSafe(task.run(&mut context)).catch_unwind() => Some(result),
        };
        self.environment.close(context).await;

        let outcome = match result {
            Some(Ok(Ok(value))) => Attempt::Succeeded(value),
            Some(Ok(Err(e))) => Attempt::Failed(e),
            Some(Err(panic)) => Attempt::Failed(PoolError::HandlerFailure(format!(
                "handler panicked: {}",
                panic_message(panic.as_ref())
            ))),
            None => Attempt::Cancelled,
        };
        (outcome, proxy)
    }

    fn handle_failure(
        &self,
        worker_id: usize,
        task: Task<E::Context>,
        proxy: Option<Proxy>,
        err: PoolError,
    ) {
        warn!(
            task_id = %task.id(),
            "Worker {} encountered an error processing task: {}",
            worker_id, err
        );

        if let (Some(manager), Some(proxy)) = (&self.proxies, &proxy) {
            if self.config.blacklist_policy.should_blacklist(&err) {
                manager.add_to_blacklist(proxy);
            }
        }

        let max_retries = self.config.max_retries;
        match self
            .ledger
            .record_failure(task.id(), max_retries, err.is_retryable())
        {
            RetryDecision::Retry { failures } => {
                info!(
                    task_id = %task.id(),
                    "Worker {} retrying task (attempt {}/{})",
                    worker_id, failures, max_retries
                );
                self.ledger.mark_pending(task.id());
                self.tasks.enqueue(task);
            }
            RetryDecision::GiveUp { failures } => {
                let attempts = self.ledger.attempts(task.id());
                error!(
                    task_id = %task.id(),
                    failures,
                    "Worker {}: task failed after {} attempts",
                    worker_id, attempts
                );
                self.failed.lock().push(FailedTask {
                    task,
                    error: err.to_string(),
                    attempts,
                    failed_at: Utc::now(),
                });
            }
        }
    }
}

fn panic_message<'a>(panic: &'a (dyn Any + Send + 'static)) -> &'a str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        *message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

/// Resolves once shutdown is requested or the pool is gone
async fn cancelled(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}
