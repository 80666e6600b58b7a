//! Per-user message queues
//!
//! Each user gets a worker task fed by an unbounded channel, so that user's
//! messages are handled in arrival order while other users run concurrently.
//! Idle workers shut down and are recreated on the next message.

use crate::engine::ConversationEngine;
use crate::transport::InboundMessage;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

type Queues = Arc<Mutex<HashMap<String, UnboundedSender<String>>>>;

pub struct Dispatcher {
    engine: Arc<ConversationEngine>,
    queues: Queues,
    idle_timeout: Duration,
}

impl Dispatcher {
    pub fn new(engine: Arc<ConversationEngine>, idle_timeout: Duration) -> Self {
        Self {
            engine,
            queues: Arc::new(Mutex::new(HashMap::new())),
            idle_timeout,
        }
    }

    /// Queue an inbound message; group messages are dropped here
    pub fn submit(&self, message: InboundMessage) {
        if message.is_group {
            debug!("Ignoring group message from {}", message.user_id);
            return;
        }

        let mut queues = lock_queues(&self.queues);
        let text = match queues.get(&message.user_id) {
            Some(tx) => match tx.send(message.text) {
                Ok(()) => return,
                // Worker gone; start a fresh one with the same text
                Err(returned) => returned.0,
            },
            None => message.text,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        // Receiver is alive until the worker below drops it
        let _ = tx.send(text);
        queues.insert(message.user_id.clone(), tx);

        tokio::spawn(run_worker(
            self.engine.clone(),
            self.queues.clone(),
            message.user_id,
            rx,
            self.idle_timeout,
        ));
    }

    /// Users with a live worker
    pub fn active_workers(&self) -> usize {
        lock_queues(&self.queues).len()
    }
}

fn lock_queues(queues: &Queues) -> MutexGuard<'_, HashMap<String, UnboundedSender<String>>> {
    queues.lock().unwrap_or_else(|e| e.into_inner())
}

async fn run_worker(
    engine: Arc<ConversationEngine>,
    queues: Queues,
    user_id: String,
    mut rx: UnboundedReceiver<String>,
    idle_timeout: Duration,
) {
    debug!("Worker started for {}", user_id);
    loop {
        let text = match tokio::time::timeout(idle_timeout, rx.recv()).await {
            Ok(Some(text)) => text,
            Ok(None) => break,
            Err(_) => {
                // Senders only send while holding the map lock, so an empty
                // queue checked under it cannot receive anything after removal
                let next = {
                    let mut map = lock_queues(&queues);
                    match rx.try_recv() {
                        Ok(text) => Some(text),
                        Err(_) => {
                            map.remove(&user_id);
                            None
                        }
                    }
                };
                match next {
                    Some(text) => text,
                    None => break,
                }
            }
        };
        engine.handle_message(&user_id, &text).await;
    }
    debug!("Worker stopped for {}", user_id);
}
