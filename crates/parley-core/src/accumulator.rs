//! Streaming transcript accumulator
//!
//! Owns the conversation, the pending flag and the input buffer. A submission
//! goes through two phases: `submit` appends the user message and hands back a
//! request to dispatch, then reply events are merged with `apply` until a
//! terminal event resolves it. Every resolution path clears the pending flag.

use tracing::{debug, warn};

use crate::dispatch::ReplyEvent;
use crate::responder::ChatRequest;
use crate::state::{ChatMessage, HistoryPolicy};
use crate::transcript::Transcript;

/// Content of the assistant message shown when a reply fails
pub const REPLY_ERROR_TEXT: &str = "Error: could not get a reply from the chat service. Please try again.";

#[derive(Debug, Clone)]
pub struct Accumulator {
    transcript: Transcript,
    pending: bool,
    input: String,
    history: HistoryPolicy,
    /// Concatenation of all fragments of the reply in flight
    running: String,
    error_text: String,
}

impl Default for Accumulator {
    fn default() -> Self {
        Self::new(HistoryPolicy::default())
    }
}

impl Accumulator {
    pub fn new(history: HistoryPolicy) -> Self {
        Self {
            transcript: Transcript::new(),
            pending: false,
            input: String::new(),
            history,
            running: String::new(),
            error_text: REPLY_ERROR_TEXT.to_string(),
        }
    }

    pub fn with_error_text(mut self, text: impl Into<String>) -> Self {
        self.error_text = text.into();
        self
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn messages(&self) -> &[ChatMessage] {
        self.transcript.messages()
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut String {
        &mut self.input
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    pub fn history_policy(&self) -> HistoryPolicy {
        self.history
    }

    pub fn set_history_policy(&mut self, history: HistoryPolicy) {
        self.history = history;
    }

    pub fn error_text(&self) -> &str {
        &self.error_text
    }

    /// Submit whatever is in the input buffer.
    pub fn submit_input(&mut self) -> Option<ChatRequest> {
        let text = self.input.clone();
        self.submit(&text)
    }

    /// Append the user message and enter the pending phase. Returns the request
    /// to dispatch, or `None` when the text is blank.
    ///
    /// Callers are expected not to submit while a reply is pending. If one is,
    /// a reply still streaming is finalized with what has arrived so far.
    pub fn submit(&mut self, text: &str) -> Option<ChatRequest> {
        let prompt = text.trim();
        if prompt.is_empty() {
            return None;
        }

        if self.transcript.close_reply() {
            debug!("finalized an unfinished reply before the next submission");
        }
        // Context is everything before this message
        let history = self.history.select(self.transcript.messages());

        self.transcript.push_user(prompt);
        self.pending = true;
        self.running.clear();
        self.input.clear();

        debug!(
            chars = prompt.chars().count(),
            history = history.as_ref().map(Vec::len).unwrap_or(0),
            "submitted user message"
        );

        Some(ChatRequest {
            prompt: prompt.to_string(),
            history,
        })
    }

    /// Merge one reply event into the transcript
    pub fn apply(&mut self, event: ReplyEvent) {
        if !self.pending {
            debug!(?event, "reply event with nothing pending, ignoring");
            return;
        }

        match event {
            ReplyEvent::Whole(text) => {
                // Supersedes any fragments already shown
                if self.transcript.in_progress() {
                    self.transcript.replace_reply(text);
                    self.transcript.close_reply();
                } else {
                    self.transcript.push_assistant(text);
                }
                self.resolve();
            }
            ReplyEvent::Fragment(fragment) => {
                if !self.transcript.in_progress() {
                    self.running.clear();
                    self.transcript.open_reply();
                }
                self.running.push_str(&fragment);
                self.transcript.replace_reply(self.running.clone());
            }
            ReplyEvent::Finished => {
                if !self.transcript.close_reply() {
                    debug!("reply ended without content");
                }
                self.resolve();
            }
            ReplyEvent::Failed(err) => {
                warn!(error = %err, "chat reply failed");
                self.fail();
            }
        }
    }

    /// Resolve a submission whose reply channel closed without a terminal event
    pub fn abandon(&mut self) {
        if self.pending {
            warn!("reply channel closed before the reply resolved");
            self.fail();
        }
    }

    fn fail(&mut self) {
        let text = self.error_text.clone();
        if self.transcript.in_progress() {
            self.transcript.replace_reply(text);
            self.transcript.close_reply();
        } else {
            self.transcript.push_assistant(text);
        }
        self.resolve();
    }

    fn resolve(&mut self) {
        self.running.clear();
        self.pending = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResponderError;
    use crate::state::ChatRole;

    fn failure() -> ReplyEvent {
        ReplyEvent::Failed(ResponderError::Other("connection refused".to_string()))
    }

    #[test]
    fn test_submit_appends_user_message_and_sets_pending() {
        let mut acc = Accumulator::default();
        acc.set_input("  hello there  ");

        let request = acc.submit_input().unwrap();
        assert_eq!(request.prompt, "hello there");
        assert_eq!(acc.messages().len(), 1);
        assert_eq!(acc.messages()[0].role, ChatRole::User);
        assert_eq!(acc.messages()[0].content, "hello there");
        assert!(acc.is_pending());
        assert_eq!(acc.input(), "");
    }

    #[test]
    fn test_blank_submit_is_noop() {
        let mut acc = Accumulator::default();
        acc.set_input("   ");

        assert!(acc.submit_input().is_none());
        assert!(acc.submit("\n\t").is_none());
        assert!(acc.messages().is_empty());
        assert!(!acc.is_pending());
        assert_eq!(acc.input(), "   ");
    }

    #[test]
    fn test_blank_submit_twice_keeps_length() {
        let mut acc = Accumulator::default();
        acc.submit("first");
        acc.apply(ReplyEvent::Whole("reply".to_string()));
        let before = acc.messages().len();

        acc.submit("");
        assert_eq!(acc.messages().len(), before);
        acc.submit(" ");
        assert_eq!(acc.messages().len(), before);
    }

    #[test]
    fn test_whole_reply_appends_assistant() {
        let mut acc = Accumulator::default();
        acc.submit("hi");
        acc.apply(ReplyEvent::Whole("X".to_string()));

        assert_eq!(acc.transcript().assistant_count(), 1);
        let last = acc.transcript().last().unwrap();
        assert_eq!(last.role, ChatRole::Assistant);
        assert_eq!(last.content, "X");
        assert!(!last.is_provisional());
        assert!(!acc.is_pending());
    }

    #[test]
    fn test_failed_reply_appends_error_text() {
        let mut acc = Accumulator::default();
        acc.submit("hi");
        acc.apply(failure());

        assert_eq!(acc.transcript().assistant_count(), 1);
        assert_eq!(acc.transcript().last().unwrap().content, REPLY_ERROR_TEXT);
        assert!(!acc.is_pending());
    }

    #[test]
    fn test_fragments_replace_running_content() {
        let mut acc = Accumulator::default();
        acc.submit("greet me");

        acc.apply(ReplyEvent::Fragment("Hel".to_string()));
        assert_eq!(acc.transcript().last().unwrap().content, "Hel");
        assert_eq!(acc.transcript().assistant_count(), 1);
        assert!(acc.transcript().in_progress());

        acc.apply(ReplyEvent::Fragment("lo".to_string()));
        assert_eq!(acc.transcript().last().unwrap().content, "Hello");
        assert_eq!(acc.transcript().assistant_count(), 1);
        assert!(acc.is_pending());

        acc.apply(ReplyEvent::Finished);
        assert_eq!(acc.transcript().last().unwrap().content, "Hello");
        assert!(!acc.transcript().in_progress());
        assert!(!acc.is_pending());
    }

    #[test]
    fn test_stream_without_fragments_only_clears_pending() {
        let mut acc = Accumulator::default();
        acc.submit("anyone?");
        acc.apply(ReplyEvent::Finished);

        assert_eq!(acc.messages().len(), 1);
        assert!(!acc.is_pending());
    }

    #[test]
    fn test_failure_mid_stream_replaces_placeholder() {
        let mut acc = Accumulator::default();
        acc.submit("tell me a story");
        acc.apply(ReplyEvent::Fragment("Once upon".to_string()));
        acc.apply(failure());

        assert_eq!(acc.transcript().assistant_count(), 1);
        let last = acc.transcript().last().unwrap();
        assert_eq!(last.content, REPLY_ERROR_TEXT);
        assert!(!last.is_provisional());
        assert!(!acc.is_pending());
    }

    #[test]
    fn test_events_after_resolution_are_ignored() {
        let mut acc = Accumulator::default();
        acc.submit("hi");
        acc.apply(ReplyEvent::Whole("done".to_string()));
        acc.apply(ReplyEvent::Fragment("late".to_string()));

        assert_eq!(acc.messages().len(), 2);
        assert_eq!(acc.transcript().last().unwrap().content, "done");
    }

    #[test]
    fn test_abandon_resolves_pending_submission() {
        let mut acc = Accumulator::default();
        acc.submit("hi");
        acc.apply(ReplyEvent::Fragment("par".to_string()));
        acc.abandon();

        assert!(!acc.is_pending());
        assert_eq!(acc.transcript().last().unwrap().content, REPLY_ERROR_TEXT);

        // Nothing pending: no further change
        acc.abandon();
        assert_eq!(acc.messages().len(), 2);
    }

    #[test]
    fn test_second_reply_starts_fresh_placeholder() {
        let mut acc = Accumulator::default();
        acc.submit("one");
        acc.apply(ReplyEvent::Fragment("first".to_string()));
        acc.apply(ReplyEvent::Finished);

        acc.submit("two");
        acc.apply(ReplyEvent::Fragment("second".to_string()));
        acc.apply(ReplyEvent::Finished);

        let contents: Vec<&str> = acc.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "first", "two", "second"]);
    }

    #[test]
    fn test_history_policy_shapes_request() {
        let mut acc = Accumulator::new(HistoryPolicy::Last(1));
        acc.submit("one");
        acc.apply(ReplyEvent::Whole("uno".to_string()));

        let request = acc.submit("two").unwrap();
        let history = request.history.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, "uno");

        acc.apply(ReplyEvent::Whole("dos".to_string()));
        acc.set_history_policy(HistoryPolicy::None);
        assert_eq!(acc.submit("three").unwrap().history, None);
    }

    #[test]
    fn test_custom_error_text() {
        let mut acc = Accumulator::default().with_error_text("backend down");
        acc.submit("hi");
        acc.apply(failure());
        assert_eq!(acc.transcript().last().unwrap().content, "backend down");
        assert_eq!(acc.error_text(), "backend down");
    }

    #[test]
    fn test_submit_while_reply_open_keeps_one_provisional() {
        let mut acc = Accumulator::default();
        acc.submit("one");
        acc.apply(ReplyEvent::Fragment("par".to_string()));

        let request = acc.submit("two").unwrap();
        assert!(acc.is_pending());
        assert!(!acc.transcript().in_progress());
        // The cut-off reply is kept as finished context
        assert_eq!(request.history.unwrap().len(), 2);

        acc.apply(ReplyEvent::Fragment("x".to_string()));
        let provisional: Vec<usize> = acc
            .messages()
            .iter()
            .enumerate()
            .filter(|(_, m)| m.is_provisional())
            .map(|(i, _)| i)
            .collect();
        assert_eq!(provisional, vec![3]);

        acc.apply(ReplyEvent::Finished);
        let contents: Vec<&str> = acc.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "par", "two", "x"]);
        assert!(!acc.is_pending());
    }

    #[test]
    fn test_whole_reply_replaces_partial_fragments() {
        let mut acc = Accumulator::default();
        acc.submit("hi");
        acc.apply(ReplyEvent::Fragment("Hel".to_string()));
        acc.apply(ReplyEvent::Whole("Hello".to_string()));

        assert_eq!(acc.messages().len(), 2);
        assert_eq!(acc.transcript().last().unwrap().content, "Hello");
        assert!(!acc.transcript().in_progress());
        assert!(!acc.is_pending());
    }
}
