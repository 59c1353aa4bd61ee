//! Per-identity event queues
//!
//! Every participant gets one worker task fed by an unbounded channel, so a
//! participant's events are handled one at a time in delivery order while
//! different participants proceed concurrently. A worker that sees no events
//! for the idle timeout closes its queue, finishes what is buffered and
//! removes itself; the next event for that participant starts a fresh one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::conversation::ConversationEngine;
use crate::ledger::UserId;
use crate::transport::InboundEvent;

/// Default time a worker waits for its next event before retiring
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(600);

type Workers = Arc<DashMap<UserId, Worker>>;

struct Worker {
    tx: mpsc::UnboundedSender<InboundEvent>,
    handle: JoinHandle<()>,
    generation: u64,
}

pub struct Dispatcher {
    engine: Arc<ConversationEngine>,
    workers: Workers,
    idle_timeout: Duration,
    generations: AtomicU64,
}

impl Dispatcher {
    pub fn new(engine: Arc<ConversationEngine>) -> Self {
        Self {
            engine,
            workers: Arc::new(DashMap::new()),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            generations: AtomicU64::new(0),
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn engine(&self) -> &Arc<ConversationEngine> {
        &self.engine
    }

    /// Queue `event` behind earlier events of the same participant.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn dispatch(&self, event: InboundEvent) {
        let user_id = event.user_id;
        let event = {
            let worker = self
                .workers
                .entry(user_id)
                .or_insert_with(|| self.spawn_worker(user_id));
            match worker.tx.send(event) {
                Ok(()) => return,
                Err(mpsc::error::SendError(event)) => event,
            }
        };

        // The worker retired or panicked; replace it and retry once
        debug!(user_id, "Event worker gone, restarting");
        let worker = self.spawn_worker(user_id);
        if worker.tx.send(event).is_err() {
            error!(user_id, "Dropping event, worker unavailable");
        }
        self.workers.insert(user_id, worker);
    }

    /// Number of participants with a live queue
    pub fn active_workers(&self) -> usize {
        self.workers.len()
    }

    /// Close every queue and wait until all queued events are handled
    pub async fn drain(&self) {
        let user_ids: Vec<UserId> = self.workers.iter().map(|entry| *entry.key()).collect();
        for user_id in user_ids {
            if let Some((_, worker)) = self.workers.remove(&user_id) {
                drop(worker.tx);
                if let Err(e) = worker.handle.await {
                    error!(user_id, error = %e, "Event worker failed");
                }
            }
        }
    }

    fn spawn_worker(&self, user_id: UserId) -> Worker {
        let (tx, mut rx) = mpsc::unbounded_channel::<InboundEvent>();
        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        let engine = self.engine.clone();
        let workers = self.workers.clone();
        let idle_timeout = self.idle_timeout;
        debug!(user_id, generation, "Starting event worker");

        let handle = tokio::spawn(async move {
            loop {
                match tokio::time::timeout(idle_timeout, rx.recv()).await {
                    Ok(Some(event)) => process(&engine, user_id, event).await,
                    Ok(None) => break,
                    Err(_) => {
                        rx.close();
                        while let Some(event) = rx.recv().await {
                            process(&engine, user_id, event).await;
                        }
                        workers.remove_if(&user_id, |_, worker| worker.generation == generation);
                        debug!(user_id, "Event worker idle, retired");
                        break;
                    }
                }
            }
            debug!(user_id, "Event worker stopped");
        });

        Worker { tx, handle, generation }
    }
}

async fn process(engine: &ConversationEngine, user_id: UserId, event: InboundEvent) {
    let chat_id = event.chat_id;
    if let Err(e) = engine.handle(event).await {
        error!(user_id, error = %e, "Failed to handle event");
        if let Err(e) = engine.notify_failure(chat_id).await {
            warn!(user_id, error = %e, "Failed to send failure notice");
        }
    }
}
