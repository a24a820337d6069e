pub mod app;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod logging;
pub mod speech;
pub mod state;
pub mod tui;
pub mod ui;

// Re-export main types for convenience
pub use app::App;
pub use client::{AnswerBackend, HttpBackend};
pub use config::Config;
pub use dispatch::{Dispatcher, PendingRequest, GENERIC_FAILURE};
pub use error::{ChatError, SpeechError};
pub use speech::{CommandRecognizer, SpeechBridge, SpeechEvent, SpeechRecognizer, SpeechSettings};
pub use state::{Conversation, Sender, Turn};
