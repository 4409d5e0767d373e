//! Results upload.
//!
//! An upload is a shared future: every clone of the [`UploadHandle`] observes
//! the same single submission, so callers can await it from several places
//! without sending the results twice. The future does nothing until it is
//! polled; the host is expected to drive it on its executor.

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use misinfo_logic::study::Study;

use crate::error::UploadError;
use crate::persistence::PersistedGame;

/// Remote endpoint that receives finished sessions.
#[async_trait]
pub trait ResultsSink: Send + Sync {
    async fn submit_results(
        &self,
        study: &Study,
        snapshot: &PersistedGame,
    ) -> Result<(), UploadError>;
}

pub type UploadHandle = Shared<BoxFuture<'static, Result<(), UploadError>>>;

/// Starts submitting `snapshot`. The returned handle is lazy.
pub fn start_upload(
    sink: Arc<dyn ResultsSink>,
    study: Arc<Study>,
    snapshot: PersistedGame,
) -> UploadHandle {
    async move {
        let result = sink.submit_results(&study, &snapshot).await;
        if let Err(e) = &result {
            log::warn!("Results upload for session {} failed: {}", snapshot.session_id, e);
        }
        result
    }
    .boxed()
    .shared()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadStatus {
    NotStarted,
    InFlight,
    Succeeded,
    Failed(String),
}

impl UploadStatus {
    pub fn of(handle: Option<&UploadHandle>) -> Self {
        match handle.map(Shared::peek) {
            None => UploadStatus::NotStarted,
            Some(None) => UploadStatus::InFlight,
            Some(Some(Ok(()))) => UploadStatus::Succeeded,
            Some(Some(Err(e))) => UploadStatus::Failed(e.message.clone()),
        }
    }
}

/// Sink that keeps submissions in memory and can be told to fail.
#[derive(Debug, Default)]
pub struct MemorySink {
    submissions: Mutex<Vec<PersistedGame>>,
    failures: Mutex<VecDeque<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next submission fail with `message`.
    pub fn fail_next(&self, message: impl Into<String>) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(message.into());
    }

    pub fn submissions(&self) -> Vec<PersistedGame> {
        self.submissions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn submission_count(&self) -> usize {
        self.submissions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl ResultsSink for MemorySink {
    async fn submit_results(
        &self,
        study: &Study,
        snapshot: &PersistedGame,
    ) -> Result<(), UploadError> {
        let failure = self
            .failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        if let Some(message) = failure {
            log::debug!("Rejecting results for study {}: {}", study.id, message);
            return Err(UploadError::new(message));
        }
        self.submissions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(snapshot.clone());
        Ok(())
    }
}
