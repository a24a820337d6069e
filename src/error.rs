//! Error types for the chat client.

use std::time::Duration;

/// Errors from a single question/answer exchange.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("backend returned status {status}{}", detail_suffix(.detail))]
    Status { status: u16, detail: Option<String> },
    #[error("could not decode backend response: {0}")]
    Decode(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

fn detail_suffix(detail: &Option<String>) -> String {
    detail.as_deref().map(|d| format!(": {d}")).unwrap_or_default()
}

/// Errors from the speech capability.
#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error("failed to start recognizer: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("recognizer failed: {0}")]
    Failed(String),
}
