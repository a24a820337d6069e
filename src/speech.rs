//! Optional speech-to-text input.
//!
//! The chat view owns a [`SpeechBridge`] that wraps whatever recognizer the
//! host provides. Each toggle is a single best-effort utterance: no retries,
//! no queuing.

use std::process::Stdio;
use std::sync::Arc;

use tokio::process::Command;
use tokio::task::JoinHandle;

use crate::error::SpeechError;

/// Recognition settings handed to every recognizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechSettings {
    pub lang: &'static str,
    pub continuous: bool,
    pub interim_results: bool,
    pub max_alternatives: u8,
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            lang: "en-US",
            continuous: false,
            interim_results: false,
            max_alternatives: 1,
        }
    }
}

/// What a recognizer reports back
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    /// Best transcript for the utterance
    Result(String),
    Error(String),
    /// Session finished, with or without a result
    End,
}

pub type SpeechSink = Arc<dyn Fn(SpeechEvent) + Send + Sync>;

/// Narrow adapter over a host speech capability.
pub trait SpeechRecognizer: Send {
    fn start(&mut self, settings: &SpeechSettings, sink: SpeechSink) -> Result<(), SpeechError>;
    fn stop(&mut self);
}

/// Runs an external recognizer command for one utterance.
///
/// Settings are exported as `SPEECH_*` environment variables. The command
/// prints candidate transcripts best-first, one per line; the first non-empty
/// line wins. A non-zero exit status is reported as an error.
pub struct CommandRecognizer {
    program: String,
    args: Vec<String>,
    session: Option<JoinHandle<()>>,
}

impl CommandRecognizer {
    /// Build from a command line such as `["whisper-listen", "--once"]`.
    /// Returns `None` for an empty command.
    pub fn from_command(command: &[String]) -> Option<Self> {
        let (program, args) = command.split_first()?;
        if program.trim().is_empty() {
            return None;
        }
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
            session: None,
        })
    }
}

impl SpeechRecognizer for CommandRecognizer {
    fn start(&mut self, settings: &SpeechSettings, sink: SpeechSink) -> Result<(), SpeechError> {
        self.stop();

        let child = Command::new(&self.program)
            .args(&self.args)
            .env("SPEECH_LANG", settings.lang)
            .env("SPEECH_CONTINUOUS", settings.continuous.to_string())
            .env("SPEECH_INTERIM_RESULTS", settings.interim_results.to_string())
            .env("SPEECH_MAX_ALTERNATIVES", settings.max_alternatives.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        tracing::info!(program = %self.program, "recognizer started");
        self.session = Some(tokio::spawn(async move {
            match child.wait_with_output().await {
                Ok(output) if output.status.success() => {
                    let stdout = String::from_utf8_lossy(&output.stdout);
                    if let Some(best) = stdout.lines().map(str::trim).find(|l| !l.is_empty()) {
                        sink(SpeechEvent::Result(best.to_string()));
                    }
                }
                Ok(output) => {
                    sink(SpeechEvent::Error(format!("recognizer exited with {}", output.status)));
                }
                Err(e) => sink(SpeechEvent::Error(e.to_string())),
            }
            sink(SpeechEvent::End);
        }));

        Ok(())
    }

    fn stop(&mut self) {
        if let Some(session) = self.session.take() {
            // Dropping the child with the task kills the process
            session.abort();
        }
    }
}

impl Drop for CommandRecognizer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// What a toggle did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Toggle {
    Started,
    Stopped,
    Unsupported,
    Failed(String),
}

/// The view's handle on the speech capability.
///
/// Every start opens a new session; events are tagged with the session that
/// produced them and anything from an earlier session is dropped.
pub struct SpeechBridge {
    recognizer: Option<Box<dyn SpeechRecognizer>>,
    settings: SpeechSettings,
    listening: bool,
    session: u64,
}

impl SpeechBridge {
    pub fn new(recognizer: Option<Box<dyn SpeechRecognizer>>) -> Self {
        Self {
            recognizer,
            settings: SpeechSettings::default(),
            listening: false,
            session: 0,
        }
    }

    pub fn unsupported() -> Self {
        Self::new(None)
    }

    pub fn is_supported(&self) -> bool {
        self.recognizer.is_some()
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    /// Start or stop listening. `make_sink` receives the id of the session
    /// being started and returns where that session reports to.
    pub fn toggle<F>(&mut self, make_sink: F) -> Toggle
    where
        F: FnOnce(u64) -> SpeechSink,
    {
        let Some(recognizer) = self.recognizer.as_mut() else {
            return Toggle::Unsupported;
        };

        if self.listening {
            recognizer.stop();
            self.listening = false;
            tracing::debug!(session = self.session, "listening stopped by user");
            return Toggle::Stopped;
        }

        let session = self.session + 1;
        match recognizer.start(&self.settings, make_sink(session)) {
            Ok(()) => {
                self.session = session;
                self.listening = true;
                tracing::debug!(session, "listening started");
                Toggle::Started
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to start speech recognition");
                Toggle::Failed(e.to_string())
            }
        }
    }

    /// Apply an event from the recognizer. Returns the transcript to place in
    /// the input box, if any. Events from a session other than the current
    /// listening one are ignored.
    pub fn on_event(&mut self, session: u64, event: SpeechEvent) -> Option<String> {
        if !self.listening || session != self.session {
            tracing::debug!(session, current = self.session, "ignoring stale speech event");
            return None;
        }

        match event {
            SpeechEvent::Result(transcript) => {
                self.stop();
                Some(transcript)
            }
            SpeechEvent::Error(message) => {
                tracing::warn!(error = %message, "speech recognition error");
                self.stop();
                None
            }
            SpeechEvent::End => {
                self.listening = false;
                None
            }
        }
    }

    pub fn stop(&mut self) {
        if self.listening {
            if let Some(recognizer) = self.recognizer.as_mut() {
                recognizer.stop();
            }
            self.listening = false;
        }
    }
}

impl Drop for SpeechBridge {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    #[derive(Default)]
    struct Calls {
        starts: usize,
        stops: usize,
    }

    struct FakeRecognizer(Arc<Mutex<Calls>>);

    impl SpeechRecognizer for FakeRecognizer {
        fn start(&mut self, _settings: &SpeechSettings, _sink: SpeechSink) -> Result<(), SpeechError> {
            self.0.lock().unwrap().starts += 1;
            Ok(())
        }

        fn stop(&mut self) {
            self.0.lock().unwrap().stops += 1;
        }
    }

    fn noop_sink() -> SpeechSink {
        Arc::new(|_: SpeechEvent| {})
    }

    fn fake_bridge() -> (SpeechBridge, Arc<Mutex<Calls>>) {
        let calls = Arc::new(Mutex::new(Calls::default()));
        let bridge = SpeechBridge::new(Some(Box::new(FakeRecognizer(Arc::clone(&calls)))));
        (bridge, calls)
    }

    #[test]
    fn test_default_settings() {
        let settings = SpeechSettings::default();
        assert_eq!(settings.lang, "en-US");
        assert!(!settings.continuous);
        assert!(!settings.interim_results);
        assert_eq!(settings.max_alternatives, 1);
    }

    #[test]
    fn test_toggle_unsupported() {
        let mut bridge = SpeechBridge::unsupported();
        assert!(!bridge.is_supported());
        assert_eq!(bridge.toggle(|_| noop_sink()), Toggle::Unsupported);
        assert!(!bridge.is_listening());
    }

    #[test]
    fn test_toggle_starts_then_stops() {
        let (mut bridge, calls) = fake_bridge();

        assert_eq!(bridge.toggle(|_| noop_sink()), Toggle::Started);
        assert!(bridge.is_listening());

        assert_eq!(bridge.toggle(|_| noop_sink()), Toggle::Stopped);
        assert!(!bridge.is_listening());

        let calls = calls.lock().unwrap();
        assert_eq!(calls.starts, 1);
        assert_eq!(calls.stops, 1);
    }

    #[test]
    fn test_result_returns_transcript_and_stops() {
        let (mut bridge, _calls) = fake_bridge();
        bridge.toggle(|_| noop_sink());

        let transcript = bridge.on_event(1, SpeechEvent::Result("where is laptop 42".to_string()));
        assert_eq!(transcript.as_deref(), Some("where is laptop 42"));
        assert!(!bridge.is_listening());
    }

    #[test]
    fn test_error_and_end_reset_listening() {
        let (mut bridge, _calls) = fake_bridge();

        bridge.toggle(|_| noop_sink());
        assert_eq!(bridge.on_event(1, SpeechEvent::Error("no-speech".to_string())), None);
        assert!(!bridge.is_listening());

        bridge.toggle(|_| noop_sink());
        assert_eq!(bridge.on_event(2, SpeechEvent::End), None);
        assert!(!bridge.is_listening());
    }

    #[test]
    fn test_events_outside_session_ignored() {
        let (mut bridge, _calls) = fake_bridge();
        assert_eq!(bridge.on_event(0, SpeechEvent::Result("stale".to_string())), None);
        assert!(!bridge.is_listening());
    }

    /// Keeps every sink it was started with so tests can report late.
    struct RecordingRecognizer {
        sinks: Arc<Mutex<Vec<SpeechSink>>>,
        calls: Arc<Mutex<Calls>>,
    }

    impl SpeechRecognizer for RecordingRecognizer {
        fn start(&mut self, _settings: &SpeechSettings, sink: SpeechSink) -> Result<(), SpeechError> {
            self.calls.lock().unwrap().starts += 1;
            self.sinks.lock().unwrap().push(sink);
            Ok(())
        }

        fn stop(&mut self) {
            self.calls.lock().unwrap().stops += 1;
        }
    }

    #[test]
    fn test_events_from_previous_session_ignored() {
        let sinks = Arc::new(Mutex::new(Vec::new()));
        let calls = Arc::new(Mutex::new(Calls::default()));
        let mut bridge = SpeechBridge::new(Some(Box::new(RecordingRecognizer {
            sinks: Arc::clone(&sinks),
            calls: Arc::clone(&calls),
        })));

        let queued = Arc::new(Mutex::new(Vec::new()));
        let tagging_sink = |session: u64| -> SpeechSink {
            let queued = Arc::clone(&queued);
            Arc::new(move |event: SpeechEvent| queued.lock().unwrap().push((session, event)))
        };

        // First session reports late, after the user stopped it and started again
        assert_eq!(bridge.toggle(tagging_sink), Toggle::Started);
        let first = Arc::clone(&sinks.lock().unwrap()[0]);
        first(SpeechEvent::Result("stale transcript".to_string()));
        first(SpeechEvent::End);
        assert_eq!(bridge.toggle(tagging_sink), Toggle::Stopped);
        assert_eq!(bridge.toggle(tagging_sink), Toggle::Started);

        let drained: Vec<(u64, SpeechEvent)> = queued.lock().unwrap().drain(..).collect();
        assert_eq!(drained.len(), 2);
        for (session, event) in drained {
            assert_eq!(bridge.on_event(session, event), None);
        }

        assert!(bridge.is_listening());
        assert_eq!(calls.lock().unwrap().stops, 1);

        // The current session still delivers
        let second = Arc::clone(&sinks.lock().unwrap()[1]);
        second(SpeechEvent::Result("current transcript".to_string()));
        let (session, event) = queued.lock().unwrap().remove(0);
        assert_eq!(bridge.on_event(session, event).as_deref(), Some("current transcript"));
        assert!(!bridge.is_listening());
    }

    #[test]
    fn test_drop_stops_active_session() {
        let (mut bridge, calls) = fake_bridge();
        bridge.toggle(|_| noop_sink());
        drop(bridge);
        assert_eq!(calls.lock().unwrap().stops, 1);
    }

    #[test]
    fn test_from_command_rejects_empty() {
        assert!(CommandRecognizer::from_command(&[]).is_none());
        assert!(CommandRecognizer::from_command(&["  ".to_string()]).is_none());
        assert!(CommandRecognizer::from_command(&["listen".to_string()]).is_some());
    }

    fn channel_sink() -> (SpeechSink, mpsc::UnboundedReceiver<SpeechEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink: SpeechSink = Arc::new(move |event: SpeechEvent| {
            let _ = tx.send(event);
        });
        (sink, rx)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_recognizer_reports_first_line() {
        let command = vec![
            "sh".to_string(),
            "-c".to_string(),
            "printf '\\n  show open tickets  \\nshow open ticket\\n'".to_string(),
        ];
        let mut recognizer = CommandRecognizer::from_command(&command).unwrap();
        let (sink, mut rx) = channel_sink();

        recognizer.start(&SpeechSettings::default(), sink).unwrap();

        assert_eq!(
            rx.recv().await,
            Some(SpeechEvent::Result("show open tickets".to_string()))
        );
        assert_eq!(rx.recv().await, Some(SpeechEvent::End));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_recognizer_sees_settings() {
        let command = vec![
            "sh".to_string(),
            "-c".to_string(),
            "echo \"$SPEECH_LANG $SPEECH_CONTINUOUS $SPEECH_INTERIM_RESULTS $SPEECH_MAX_ALTERNATIVES\"".to_string(),
        ];
        let mut recognizer = CommandRecognizer::from_command(&command).unwrap();
        let (sink, mut rx) = channel_sink();

        recognizer.start(&SpeechSettings::default(), sink).unwrap();

        assert_eq!(
            rx.recv().await,
            Some(SpeechEvent::Result("en-US false false 1".to_string()))
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_recognizer_failure_is_error() {
        let command = vec!["sh".to_string(), "-c".to_string(), "exit 3".to_string()];
        let mut recognizer = CommandRecognizer::from_command(&command).unwrap();
        let (sink, mut rx) = channel_sink();

        recognizer.start(&SpeechSettings::default(), sink).unwrap();

        assert!(matches!(rx.recv().await, Some(SpeechEvent::Error(_))));
        assert_eq!(rx.recv().await, Some(SpeechEvent::End));
    }

    #[tokio::test]
    async fn test_command_recognizer_missing_program() {
        let command = vec!["definitely-not-a-recognizer-binary".to_string()];
        let mut recognizer = CommandRecognizer::from_command(&command).unwrap();
        let err = recognizer
            .start(&SpeechSettings::default(), noop_sink())
            .unwrap_err();
        assert!(matches!(err, SpeechError::Spawn(_)));
    }
}
