//! Consumers of search results

use super::types::{SearchResult, SessionId, SessionState};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Receives result batches from the engine.
///
/// Delivery is awaited, so a slow client slows down reading of the search
/// process output instead of buffering without bound.
#[async_trait]
pub trait SearchClient: Send + Sync {
    /// Called once per output chunk that produced at least one result
    async fn on_search_result(&self, results: Vec<SearchResult>, session_id: SessionId);

    /// Called once when the session settles
    async fn on_search_finished(&self, _session_id: SessionId, _state: &SessionState) {}
}

/// Notification forwarded by the channel adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchEvent {
    Results {
        session_id: SessionId,
        results: Vec<SearchResult>,
    },
    Finished {
        session_id: SessionId,
        state: SessionState,
    },
}

impl SearchEvent {
    pub fn session_id(&self) -> SessionId {
        match self {
            SearchEvent::Results { session_id, .. } | SearchEvent::Finished { session_id, .. } => {
                *session_id
            }
        }
    }
}

#[async_trait]
impl SearchClient for mpsc::Sender<SearchEvent> {
    async fn on_search_result(&self, results: Vec<SearchResult>, session_id: SessionId) {
        let event = SearchEvent::Results {
            session_id,
            results,
        };
        if self.send(event).await.is_err() {
            tracing::debug!(session_id, "search event receiver dropped");
        }
    }

    async fn on_search_finished(&self, session_id: SessionId, state: &SessionState) {
        let event = SearchEvent::Finished {
            session_id,
            state: state.clone(),
        };
        if self.send(event).await.is_err() {
            tracing::debug!(session_id, "search event receiver dropped");
        }
    }
}

/// Create a bounded channel whose sender can be registered as a client
pub fn search_channel(capacity: usize) -> (mpsc::Sender<SearchEvent>, mpsc::Receiver<SearchEvent>) {
    mpsc::channel(capacity.max(1))
}
