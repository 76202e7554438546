//! Background view counting.
//!
//! Page views are recorded into a bounded queue and applied to the store by a
//! single drain task, so a slow or failing store never delays the response
//! that triggered the count.

use crate::repository::ArticleRepository;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub struct ViewCounter {
    sender: Mutex<Option<mpsc::Sender<String>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ViewCounter {
    /// Spawn the drain task. Must be called inside a tokio runtime.
    pub fn start(repo: Arc<dyn ArticleRepository>, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let worker = tokio::spawn(drain(repo, receiver));
        Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Queue one view of `slug`. Returns `false` when the event was dropped.
    pub fn record(&self, slug: &str) -> bool {
        let sender = self.sender.lock().unwrap_or_else(|e| e.into_inner());
        let Some(sender) = sender.as_ref() else {
            metrics::counter!("pressroom_view_events_dropped_total").increment(1);
            return false;
        };
        match sender.try_send(slug.to_string()) {
            Ok(()) => true,
            Err(TrySendError::Full(slug)) => {
                metrics::counter!("pressroom_view_events_dropped_total").increment(1);
                debug!(slug = %slug, "View queue full, dropping event");
                false
            }
            Err(TrySendError::Closed(_)) => {
                metrics::counter!("pressroom_view_events_dropped_total").increment(1);
                false
            }
        }
    }

    /// Close the queue and wait until queued events are applied.
    pub async fn shutdown(&self) {
        drop(self.sender.lock().unwrap_or_else(|e| e.into_inner()).take());
        let worker = self.worker.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                warn!(error = %e, "View counter task ended abnormally");
            }
        }
    }
}

async fn drain(repo: Arc<dyn ArticleRepository>, mut receiver: mpsc::Receiver<String>) {
    while let Some(slug) = receiver.recv().await {
        if let Err(e) = repo.increment_views(&slug).await {
            warn!(slug = %slug, error = %e, "Failed to increment view count");
        }
    }
    debug!("View counter drained");
}
