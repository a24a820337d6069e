use std::sync::Arc;

use ratatui::layout::Rect;
use tokio::sync::mpsc::UnboundedSender;

use crate::dispatch::{Dispatcher, PendingRequest};
use crate::speech::{SpeechBridge, SpeechEvent, SpeechSink, Toggle};
use crate::state::{Conversation, Turn};
use crate::tui::AppEvent;

pub const SPEECH_UNSUPPORTED_NOTICE: &str =
    "Speech recognition is not available. Set \"speech_command\" in the config file to enable the microphone.";

pub struct App {
    // Core state
    pub should_quit: bool,
    pub backend_label: String,

    // Conversation
    pub conversation: Conversation,
    pub loading: bool,
    pending: Option<PendingRequest>,
    dispatcher: Dispatcher,

    // Input box
    pub input: String,
    pub cursor: usize, // cursor position in input, in chars

    // Speech
    speech: SpeechBridge,

    // Chat view
    pub chat_scroll: u16,
    pub chat_height: u16, // Height of chat area for scroll calculations
    pub chat_width: u16,  // Width of chat area for wrap calculations
    pub chat_area: Option<Rect>,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    /// Blocking notice shown over the chat until dismissed
    pub notice: Option<String>,

    events: UnboundedSender<AppEvent>,
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

impl App {
    pub fn new(
        dispatcher: Dispatcher,
        speech: SpeechBridge,
        events: UnboundedSender<AppEvent>,
        backend_label: impl Into<String>,
    ) -> Self {
        Self {
            should_quit: false,
            backend_label: backend_label.into(),

            conversation: Conversation::new(),
            loading: false,
            pending: None,
            dispatcher,

            input: String::new(),
            cursor: 0,

            speech,

            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            chat_area: None,

            animation_frame: 0,
            notice: None,

            events,
        }
    }

    pub fn is_listening(&self) -> bool {
        self.speech.is_listening()
    }

    pub fn speech_supported(&self) -> bool {
        self.speech.is_supported()
    }

    /// Input accepts edits only while no request is in flight
    pub fn input_enabled(&self) -> bool {
        !self.loading
    }

    pub fn can_submit(&self) -> bool {
        !self.loading && !self.input.trim().is_empty()
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.input = text.into();
        self.cursor = self.input.chars().count();
    }

    pub fn insert_char(&mut self, c: char) {
        if !self.input_enabled() {
            return;
        }
        let byte_pos = char_to_byte_index(&self.input, self.cursor);
        self.input.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if !self.input_enabled() || self.cursor == 0 {
            return;
        }
        self.cursor -= 1;
        let byte_pos = char_to_byte_index(&self.input, self.cursor);
        self.input.remove(byte_pos);
    }

    pub fn delete(&mut self) {
        if !self.input_enabled() {
            return;
        }
        if self.cursor < self.input.chars().count() {
            let byte_pos = char_to_byte_index(&self.input, self.cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.input.chars().count());
    }

    pub fn cursor_home(&mut self) {
        self.cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.cursor = self.input.chars().count();
    }

    /// Send the current input as a question. Returns false when nothing was
    /// sent: blank input, or a request is already in flight.
    pub fn submit(&mut self) -> bool {
        let question = self.input.trim().to_string();
        if question.is_empty() || self.loading {
            return false;
        }

        self.append(Turn::user(question.clone()));
        self.input.clear();
        self.cursor = 0;
        self.loading = true;

        let events = self.events.clone();
        self.pending = Some(self.dispatcher.dispatch(question, move |id, turn| {
            let _ = events.send(AppEvent::Answer { id, turn });
        }));

        // Scroll to bottom so "Thinking..." is visible
        self.scroll_to_bottom();
        true
    }

    /// A dispatched request settled. Only the current pending request counts.
    pub fn on_answer(&mut self, id: u64, turn: Turn) {
        match &self.pending {
            Some(pending) if pending.id() == id => {}
            _ => {
                tracing::debug!(request_id = id, "ignoring stale answer");
                return;
            }
        }

        self.pending = None;
        self.loading = false;
        self.append(turn);
    }

    pub fn toggle_mic(&mut self) {
        if self.loading {
            return;
        }

        let events = self.events.clone();
        let make_sink = move |session: u64| -> SpeechSink {
            Arc::new(move |event: SpeechEvent| {
                let _ = events.send(AppEvent::Speech { session, event });
            })
        };

        match self.speech.toggle(make_sink) {
            Toggle::Unsupported => {
                self.notice = Some(SPEECH_UNSUPPORTED_NOTICE.to_string());
            }
            Toggle::Failed(message) => {
                self.notice = Some(format!("Could not start the microphone: {}", message));
            }
            Toggle::Started | Toggle::Stopped => {}
        }
    }

    pub fn on_speech(&mut self, session: u64, event: SpeechEvent) {
        if let Some(transcript) = self.speech.on_event(session, event) {
            self.set_text(transcript);
        }
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    /// Stop anything still running on behalf of this view
    pub fn shutdown(&mut self) {
        self.speech.stop();
        if let Some(pending) = self.pending.take() {
            tracing::info!(request_id = pending.id(), "aborting in-flight request");
            pending.abort();
        }
        self.loading = false;
    }

    fn append(&mut self, turn: Turn) {
        self.conversation.append(turn);
        self.scroll_to_bottom();
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.loading {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        let max = self.total_chat_lines().saturating_sub(self.visible_height());
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(max);
    }

    /// Scroll chat so the latest turn (and "Thinking...") is visible
    pub fn scroll_to_bottom(&mut self) {
        let total_lines = self.total_chat_lines();
        let visible_height = self.visible_height();
        self.chat_scroll = total_lines.saturating_sub(visible_height);
    }

    fn visible_height(&self) -> u16 {
        if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        }
    }

    /// Lines the chat needs once word-wrapped, exactly as `ui` draws it
    fn total_chat_lines(&self) -> u16 {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 { self.chat_width } else { 50 };

        let lines = crate::ui::chat_paragraph(self).line_count(wrap_width);
        u16::try_from(lines).unwrap_or(u16::MAX)
    }
}

impl Drop for App {
    fn drop(&mut self) {
        self.shutdown();
    }
}
