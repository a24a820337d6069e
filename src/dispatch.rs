//! One outbound exchange per submitted turn.
//!
//! Every outcome settles into exactly one bot [`Turn`]: the answer verbatim on
//! success, [`GENERIC_FAILURE`] otherwise. The concrete error only reaches the
//! log.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::client::AnswerBackend;
use crate::error::ChatError;
use crate::state::Turn;

/// Shown to the user for every failed exchange.
pub const GENERIC_FAILURE: &str = "Sorry, something went wrong. Please try again.";

/// Issues questions to a backend and maps the outcome to bot turns.
#[derive(Clone)]
pub struct Dispatcher {
    backend: Arc<dyn AnswerBackend>,
    timeout: Option<Duration>,
    next_id: u64,
}

/// Handle to an in-flight exchange.
pub struct PendingRequest {
    id: u64,
    task: JoinHandle<()>,
}

impl PendingRequest {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Abort the exchange. No turn is delivered for an aborted request.
    pub fn abort(&self) {
        self.task.abort();
    }
}

impl Dispatcher {
    pub fn new(backend: Arc<dyn AnswerBackend>) -> Self {
        Self {
            backend,
            timeout: None,
            next_id: 0,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run one exchange to completion and return the bot turn it settles into.
    pub async fn ask(&self, question: &str) -> Turn {
        settle(self.backend.as_ref(), self.timeout, question).await
    }

    /// Spawn one exchange; `on_settle` receives the request id and the bot turn.
    pub fn dispatch<F>(&mut self, question: String, on_settle: F) -> PendingRequest
    where
        F: FnOnce(u64, Turn) + Send + 'static,
    {
        self.next_id += 1;
        let id = self.next_id;
        let backend = Arc::clone(&self.backend);
        let timeout = self.timeout;

        tracing::debug!(request_id = id, "dispatching question");
        let task = tokio::spawn(async move {
            let turn = settle(backend.as_ref(), timeout, &question).await;
            on_settle(id, turn);
        });

        PendingRequest { id, task }
    }
}

async fn settle(backend: &dyn AnswerBackend, timeout: Option<Duration>, question: &str) -> Turn {
    let result = match timeout {
        Some(limit) => match tokio::time::timeout(limit, backend.ask(question)).await {
            Ok(result) => result,
            Err(_) => Err(ChatError::Timeout(limit)),
        },
        None => backend.ask(question).await,
    };

    match result {
        Ok(answer) => {
            tracing::info!(answer_len = answer.len(), "answer received");
            Turn::bot(answer)
        }
        Err(e) => {
            tracing::error!(error = %e, "chat request failed");
            Turn::bot(GENERIC_FAILURE)
        }
    }
}
