//! Ordered conversation transcript
//!
//! Append-only, except that the last message may be a provisional assistant
//! reply whose content is replaced while it streams in.

use crate::state::{ChatMessage, ChatRole, MessageStatus};

#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    /// True while an assistant reply is still streaming into the last slot
    pub fn in_progress(&self) -> bool {
        self.messages.last().is_some_and(ChatMessage::is_provisional)
    }

    /// Append a user message. A reply still open is finalized as it stands.
    pub fn push_user(&mut self, content: impl Into<String>) {
        self.close_reply();
        self.messages.push(ChatMessage::user(content));
    }

    /// Append a final assistant message. A reply still open is finalized first.
    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.close_reply();
        self.messages.push(ChatMessage::assistant(content));
    }

    /// Open an assistant placeholder. Returns false if one is already open.
    pub fn open_reply(&mut self) -> bool {
        if self.in_progress() {
            return false;
        }
        self.messages.push(ChatMessage::placeholder());
        true
    }

    /// Replace the content of the open reply. Returns false if none is open.
    pub fn replace_reply(&mut self, content: String) -> bool {
        match self.messages.last_mut() {
            Some(last) if last.is_provisional() => {
                debug_assert_eq!(last.role, ChatRole::Assistant);
                last.content = content;
                true
            }
            _ => false,
        }
    }

    /// Mark the open reply final. Returns false if none is open.
    pub fn close_reply(&mut self) -> bool {
        match self.messages.last_mut() {
            Some(last) if last.is_provisional() => {
                last.status = MessageStatus::Final;
                true
            }
            _ => false,
        }
    }

    pub fn assistant_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.role == ChatRole::Assistant)
            .count()
    }
}
