use std::sync::Arc;

use ratatui::layout::Rect;
use tokio::sync::mpsc;
use tracing::{debug, info};

use parley_core::{spawn_reply, Accumulator, ReplyEvent, Responder, Settings, ThemeMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub theme: ThemeMode,

    // Conversation
    pub chat: Accumulator,
    pub input_cursor: usize, // cursor position in chars
    pub responder: Arc<dyn Responder>,
    pub responder_label: String,
    reply_rx: Option<mpsc::UnboundedReceiver<ReplyEvent>>,

    // Chat scroll state
    pub chat_scroll: u16,
    pub chat_height: u16, // Inner height of the chat area
    pub chat_lines: u16,  // Wrapped line count, measured at render
    pub follow: bool,     // Keep the newest line in view

    // Panel area for mouse hit-testing (updated during render)
    pub chat_area: Option<Rect>,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation
}

impl App {
    pub fn new(settings: &Settings, responder: Arc<dyn Responder>) -> Self {
        let responder_label = responder.describe();
        Self {
            should_quit: false,
            input_mode: InputMode::Editing,
            theme: settings.theme,

            chat: Accumulator::new(settings.history),
            input_cursor: 0,
            responder,
            responder_label,
            reply_rx: None,

            chat_scroll: 0,
            chat_height: 0,
            chat_lines: 0,
            follow: true,

            chat_area: None,

            animation_frame: 0,
        }
    }

    /// Send the input buffer. Ignored while a reply is pending.
    pub fn send(&mut self) {
        if self.chat.is_pending() {
            debug!("send ignored while a reply is pending");
            return;
        }
        let Some(request) = self.chat.submit_input() else {
            return;
        };
        self.input_cursor = 0;
        self.follow = true;
        self.scroll_to_bottom();

        info!(history = ?request.history.as_ref().map(Vec::len), "sending message");
        // The task runs to completion on its own; only its channel is kept
        let (rx, _task) = spawn_reply(self.responder.clone(), request);
        self.reply_rx = Some(rx);
    }

    /// Wait for the next reply event. Never resolves when nothing is in flight.
    pub async fn next_reply(&mut self) -> Option<ReplyEvent> {
        match self.reply_rx.as_mut() {
            Some(rx) => rx.recv().await,
            None => std::future::pending().await,
        }
    }

    /// Apply a reply event, or close out the reply when the channel ended
    pub fn on_reply(&mut self, event: Option<ReplyEvent>) {
        match event {
            Some(event) => {
                let terminal = event.is_terminal();
                self.chat.apply(event);
                if terminal {
                    self.reply_rx = None;
                }
            }
            None => {
                self.chat.abandon();
                self.reply_rx = None;
            }
        }
        if self.follow {
            self.scroll_to_bottom();
        }
    }

    pub fn has_reply_in_flight(&self) -> bool {
        self.reply_rx.is_some()
    }

    pub fn toggle_theme(&mut self) {
        self.theme = self.theme.toggled();
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.chat.is_pending() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn scroll_down(&mut self, lines: u16) {
        let max = self.max_scroll();
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(max);
        self.follow = self.chat_scroll >= max;
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
        self.follow = false;
    }

    pub fn scroll_to_top(&mut self) {
        self.chat_scroll = 0;
        self.follow = false;
    }

    /// Scroll chat to bottom so the newest content is visible
    pub fn scroll_to_bottom(&mut self) {
        self.chat_scroll = self.max_scroll();
        self.follow = true;
    }

    fn max_scroll(&self) -> u16 {
        self.chat_lines.saturating_sub(self.chat_height)
    }

    /// Pending, but nothing of the reply has arrived yet
    pub fn awaiting_first_fragment(&self) -> bool {
        self.chat.is_pending() && !self.chat.transcript().in_progress()
    }
}
