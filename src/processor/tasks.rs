use futures::future::join_all;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::{
    config::BackgroundConfig,
    database::store::Store,
    error::StoreError,
    model::structures::play_log::{PlayLogEntry, RatingSnapshot}
};

/// Writes that happen outside the submission transaction. Both are idempotent
/// so they can be retried freely.
#[derive(Debug, Clone, PartialEq)]
pub enum BackgroundTask {
    RecordPlay(PlayLogEntry),
    RecordRatingSnapshot(RatingSnapshot)
}

impl BackgroundTask {
    pub fn name(&self) -> &'static str {
        match self {
            BackgroundTask::RecordPlay(_) => "record_play",
            BackgroundTask::RecordRatingSnapshot(_) => "record_rating_snapshot"
        }
    }

    pub async fn run<S: Store>(&self, store: &S) -> Result<(), StoreError> {
        match self {
            BackgroundTask::RecordPlay(entry) => store.append_play_log(entry).await,
            BackgroundTask::RecordRatingSnapshot(snapshot) => store.upsert_rating_snapshot(snapshot).await
        }
    }
}

/// Fire-and-forget task submission. Implementations must not block the caller.
pub trait TaskDispatcher: Send + Sync {
    fn dispatch(&self, task: BackgroundTask);
}

/// Runs each task on its own tokio task, retrying failures with a doubling delay.
pub struct TokioDispatcher<S: Store> {
    store: Arc<S>,
    retry: BackgroundConfig,
    handles: Mutex<Vec<JoinHandle<()>>>
}

impl<S: Store> TokioDispatcher<S> {
    pub fn new(store: Arc<S>, retry: BackgroundConfig) -> TokioDispatcher<S> {
        TokioDispatcher {
            store,
            retry,
            handles: Mutex::new(Vec::new())
        }
    }

    /// Waits for every task dispatched so far.
    pub async fn drain(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
            handles.drain(..).collect()
        };

        for result in join_all(handles).await {
            if let Err(e) = result {
                error!("Background task panicked: {}", e);
            }
        }
    }
}

async fn run_with_retries<S: Store>(store: &S, task: &BackgroundTask, retry: &BackgroundConfig) -> Result<(), StoreError> {
    let mut attempt = 0;

    loop {
        match task.run(store).await {
            Ok(()) => return Ok(()),
            Err(e) if attempt < retry.retry_attempts => {
                attempt += 1;
                let delay = retry.retry_delay(attempt);
                warn!(
                    "{} failed: {}. Retrying in {:?} ({}/{})",
                    task.name(),
                    e,
                    delay,
                    attempt,
                    retry.retry_attempts
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e)
        }
    }
}

impl<S: Store> TaskDispatcher for TokioDispatcher<S> {
    fn dispatch(&self, task: BackgroundTask) {
        let store = Arc::clone(&self.store);
        let retry = self.retry.clone();

        let handle = tokio::spawn(async move {
            match run_with_retries(store.as_ref(), &task, &retry).await {
                Ok(()) => debug!("{} done", task.name()),
                Err(e) => error!("{} gave up after {} retries: {}", task.name(), retry.retry_attempts, e)
            }
        });

        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }
}
