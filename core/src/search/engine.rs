//! Search session lifecycle
//!
//! Every call to [`WorkspaceSearchEngine::search`] spawns one search process
//! and one driver task. The driver owns the process, reads its output, hands
//! result batches to the registered clients and settles the session into a
//! terminal [`SessionState`].

use super::client::SearchClient;
use super::parser::ResultParser;
use super::process::{
    spawn_error_message, ChunkStream, ProcessFactory, ProcessOptions, RipgrepProcessFactory,
    SearchProcess,
};
use super::query::{prepare_query, search_args, validate_globs};
use super::types::{SearchResult, SessionId, SessionState};
use super::uri::WorkspaceRoot;
use crate::config::{EngineConfig, SearchOptions};
use crate::error::{Result, SearchError};
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{oneshot, watch, Mutex, RwLock};

type SessionTable = Arc<Mutex<HashMap<SessionId, SessionEntry>>>;

struct SessionEntry {
    cancel: Option<oneshot::Sender<()>>,
    state: watch::Receiver<SessionState>,
}

/// Handle to a started search session
#[derive(Debug, Clone)]
pub struct SearchHandle {
    id: SessionId,
    state: watch::Receiver<SessionState>,
}

impl SearchHandle {
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Current state without waiting
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Wait until the session settles and return its terminal state
    pub async fn wait(&self) -> SessionState {
        let mut rx = self.state.clone();
        let settled = rx
            .wait_for(SessionState::is_terminal)
            .await
            .map(|state| state.clone());
        match settled {
            Ok(state) => state,
            Err(_) => {
                let last = rx.borrow().clone();
                if last.is_terminal() {
                    last
                } else {
                    SessionState::Failed {
                        message: "search session ended unexpectedly".to_string(),
                    }
                }
            }
        }
    }
}

/// Runs ripgrep searches over workspace roots and streams results to clients
pub struct WorkspaceSearchEngine {
    factory: Arc<dyn ProcessFactory>,
    config: EngineConfig,
    clients: RwLock<Vec<Arc<dyn SearchClient>>>,
    sessions: SessionTable,
    next_id: AtomicU64,
}

impl WorkspaceSearchEngine {
    pub fn new(factory: Arc<dyn ProcessFactory>, config: EngineConfig) -> Self {
        Self {
            factory,
            config,
            clients: RwLock::new(Vec::new()),
            sessions: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        }
    }

    /// Engine backed by real ripgrep processes.
    ///
    /// A bare `rg_path` is resolved on PATH here rather than on every search.
    pub fn ripgrep(config: EngineConfig) -> Self {
        Self::new(
            Arc::new(RipgrepProcessFactory::new()),
            config.with_resolved_rg_path(),
        )
    }

    pub fn with_client(mut self, client: Arc<dyn SearchClient>) -> Self {
        self.clients.get_mut().push(client);
        self
    }

    /// Register another client; it receives batches of sessions started afterwards
    pub async fn add_client(&self, client: Arc<dyn SearchClient>) {
        self.clients.write().await.push(client);
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Start a search of `query` below every root.
    ///
    /// Returns as soon as the process is running; results arrive through the
    /// registered clients and the handle settles when the session ends.
    pub async fn search<S: AsRef<str>>(
        &self,
        query: &str,
        roots: &[S],
        options: SearchOptions,
    ) -> Result<SearchHandle> {
        self.config.validate()?;
        if query.is_empty() {
            return Err(SearchError::EmptyQuery.into());
        }
        let roots = WorkspaceRoot::parse_all(roots)?;
        validate_globs(&options)?;

        let session_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let pattern = prepare_query(query, &options);
        let process_options = ProcessOptions::new(&self.config.rg_path)
            .args(search_args(&options, self.config.max_count_per_file))
            .arg(pattern)
            .args(roots.iter().map(|root| root.path.clone().into_os_string()));

        tracing::debug!(session_id, args = ?process_options.args, "starting search");

        let clients = self.clients.read().await.clone();

        let mut process = match self.factory.spawn(&process_options) {
            Ok(process) => process,
            Err(e) => {
                let message = spawn_error_message(&e);
                tracing::error!(session_id, error = %e, "{}", message);
                notify_failed(&clients, session_id, &message).await;
                return Err(SearchError::Spawn {
                    session_id,
                    message,
                }
                .into());
            }
        };

        let Some(output) = process.take_output() else {
            let error = SearchError::NoOutput { session_id };
            tracing::error!(session_id, "{}", error);
            if let Err(e) = process.kill().await {
                tracing::warn!(session_id, "failed to kill search process: {}", e);
            }
            notify_failed(&clients, session_id, &error.to_string()).await;
            return Err(error.into());
        };

        let (cancel_tx, cancel_rx) = oneshot::channel();
        let (state_tx, state_rx) = watch::channel(SessionState::Running);

        self.sessions.lock().await.insert(
            session_id,
            SessionEntry {
                cancel: Some(cancel_tx),
                state: state_rx.clone(),
            },
        );

        let driver = SessionDriver {
            session_id,
            process,
            output,
            parser: ResultParser::new(roots, self.config.column_unit),
            clients,
            max_results: options.max_results,
            result_count: 0,
            sessions: Arc::clone(&self.sessions),
            state: state_tx,
        };
        tokio::spawn(driver.run(cancel_rx));

        Ok(SearchHandle {
            id: session_id,
            state: state_rx,
        })
    }

    /// Cancel a running session and wait for it to settle.
    ///
    /// Unknown or finished sessions are ignored.
    pub async fn cancel(&self, session_id: SessionId) -> Result<()> {
        let (cancel, mut state) = {
            let mut sessions = self.sessions.lock().await;
            match sessions.get_mut(&session_id) {
                Some(entry) => (entry.cancel.take(), entry.state.clone()),
                None => return Ok(()),
            }
        };

        if let Some(cancel) = cancel {
            tracing::debug!(session_id, "cancelling search");
            let _ = cancel.send(());
        }

        // The driver may have gone away without a terminal state only if it panicked
        let _ = state.wait_for(SessionState::is_terminal).await;
        Ok(())
    }

    /// Ids of the sessions still running, ascending
    pub async fn active_sessions(&self) -> Vec<SessionId> {
        let mut ids: Vec<_> = self.sessions.lock().await.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

async fn notify_failed(clients: &[Arc<dyn SearchClient>], session_id: SessionId, message: &str) {
    let state = SessionState::Failed {
        message: message.to_string(),
    };
    for client in clients {
        client.on_search_finished(session_id, &state).await;
    }
}

async fn broadcast(
    clients: &[Arc<dyn SearchClient>],
    session_id: SessionId,
    results: Vec<SearchResult>,
) {
    if let Some((last, rest)) = clients.split_last() {
        for client in rest {
            client.on_search_result(results.clone(), session_id).await;
        }
        last.on_search_result(results, session_id).await;
    }
}

enum Delivery {
    Continue,
    Truncated,
    Cancelled,
}

struct SessionDriver {
    session_id: SessionId,
    process: Box<dyn SearchProcess>,
    output: ChunkStream,
    parser: ResultParser,
    clients: Vec<Arc<dyn SearchClient>>,
    max_results: Option<usize>,
    result_count: usize,
    sessions: SessionTable,
    state: watch::Sender<SessionState>,
}

impl SessionDriver {
    async fn run(mut self, cancel: oneshot::Receiver<()>) {
        let state = self.drive(cancel).await;

        tracing::debug!(
            session_id = self.session_id,
            state = state.as_str(),
            results = self.result_count,
            "search finished"
        );

        // Settle first: a client that is not reading must not hold up cancel()
        self.sessions.lock().await.remove(&self.session_id);
        self.state.send_replace(state.clone());

        for client in &self.clients {
            client.on_search_finished(self.session_id, &state).await;
        }
    }

    async fn drive(&mut self, mut cancel: oneshot::Receiver<()>) -> SessionState {
        loop {
            tokio::select! {
                biased;

                // A dropped sender counts as cancellation too
                _ = &mut cancel => {
                    self.stop().await;
                    return SessionState::Cancelled {
                        result_count: self.result_count,
                    };
                }

                chunk = self.output.next() => match chunk {
                    Some(Ok(bytes)) => {
                        let results = self.parser.parse_chunk(&bytes);
                        if let Some(state) = self.deliver(results, &mut cancel).await {
                            return state;
                        }
                    }
                    Some(Err(e)) => {
                        tracing::error!(session_id = self.session_id, "failed to read search output: {}", e);
                        self.stop().await;
                        return SessionState::Failed {
                            message: format!("failed to read search output: {}", e),
                        };
                    }
                    None => break,
                }
            }
        }

        let tail = self.parser.finish();
        if let Some(state) = self.deliver(tail, &mut cancel).await {
            return state;
        }

        match self.process.wait().await {
            Ok(exit) => {
                // 0: matches found, 1: no match
                if !matches!(exit.code, Some(0) | Some(1)) {
                    tracing::warn!(
                        session_id = self.session_id,
                        exit_code = ?exit.code,
                        stderr = %exit.stderr,
                        "ripgrep exited abnormally"
                    );
                }
                SessionState::Completed {
                    result_count: self.result_count,
                    exit_code: exit.code,
                }
            }
            Err(e) => {
                tracing::error!(session_id = self.session_id, "failed to wait for search process: {}", e);
                SessionState::Failed {
                    message: format!("failed to wait for search process: {}", e),
                }
            }
        }
    }

    /// Deliver one chunk's results and stop the process if the session ends
    /// because of it. Returns the terminal state in that case.
    async fn deliver(
        &mut self,
        results: Vec<SearchResult>,
        cancel: &mut oneshot::Receiver<()>,
    ) -> Option<SessionState> {
        match self.send_batch(results, cancel).await {
            Delivery::Continue => None,
            Delivery::Truncated => {
                self.stop().await;
                Some(SessionState::Truncated {
                    result_count: self.result_count,
                })
            }
            Delivery::Cancelled => {
                self.stop().await;
                Some(SessionState::Cancelled {
                    result_count: self.result_count,
                })
            }
        }
    }

    /// Hand results to every client, honouring `max_results`.
    ///
    /// Clients may apply backpressure, so the broadcast races `cancel`.
    async fn send_batch(
        &mut self,
        mut results: Vec<SearchResult>,
        cancel: &mut oneshot::Receiver<()>,
    ) -> Delivery {
        let mut delivery = Delivery::Continue;
        if let Some(max) = self.max_results {
            let room = max.saturating_sub(self.result_count);
            if results.len() > room {
                results.truncate(room);
                delivery = Delivery::Truncated;
            }
        }

        if results.is_empty() {
            return delivery;
        }

        let count = results.len();
        tokio::select! {
            biased;

            _ = cancel => Delivery::Cancelled,
            _ = broadcast(&self.clients, self.session_id, results) => {
                self.result_count += count;
                delivery
            }
        }
    }

    async fn stop(&mut self) {
        if let Err(e) = self.process.kill().await {
            tracing::warn!(session_id = self.session_id, "failed to kill search process: {}", e);
        }
        if let Err(e) = self.process.wait().await {
            tracing::debug!(session_id = self.session_id, "failed to reap search process: {}", e);
        }
    }
}
