//! UI-agnostic chat state types
//!
//! This module contains the data structures shared between the accumulator,
//! the responders and the terminal UI. None of them depend on a UI framework.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A chat message in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    /// Local bookkeeping only, never sent to the responder
    #[serde(skip)]
    pub status: MessageStatus,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            status: MessageStatus::Final,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            status: MessageStatus::Final,
        }
    }

    /// Empty assistant placeholder for a reply that is still streaming
    pub fn placeholder() -> Self {
        Self {
            role: ChatRole::Assistant,
            content: String::new(),
            status: MessageStatus::Provisional,
        }
    }

    pub fn is_provisional(&self) -> bool {
        self.status == MessageStatus::Provisional
    }
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

/// Whether a message may still change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageStatus {
    Provisional,
    #[default]
    Final,
}

/// How the reply body is consumed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    #[default]
    Stream,
    Whole,
}

impl ResponseMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseMode::Stream => "stream",
            ResponseMode::Whole => "whole",
        }
    }
}

impl FromStr for ResponseMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "stream" | "streaming" => Ok(ResponseMode::Stream),
            "whole" | "json" => Ok(ResponseMode::Whole),
            other => Err(format!("unknown response mode '{}' (expected stream or whole)", other)),
        }
    }
}

impl fmt::Display for ResponseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much of the prior conversation accompanies each request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "HistorySetting", into = "String")]
pub enum HistoryPolicy {
    None,
    #[default]
    All,
    Last(usize),
}

impl HistoryPolicy {
    /// Select the context to send from the finished messages of a transcript
    pub fn select(&self, messages: &[ChatMessage]) -> Option<Vec<ChatMessage>> {
        let finished: Vec<&ChatMessage> = messages.iter().filter(|m| !m.is_provisional()).collect();
        match self {
            HistoryPolicy::None => None,
            HistoryPolicy::All => Some(finished.into_iter().cloned().collect()),
            HistoryPolicy::Last(n) => {
                let skip = finished.len().saturating_sub(*n);
                Some(finished.into_iter().skip(skip).cloned().collect())
            }
        }
    }
}

impl FromStr for HistoryPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" | "off" => Ok(HistoryPolicy::None),
            "all" | "full" => Ok(HistoryPolicy::All),
            other => other
                .parse::<usize>()
                .map(HistoryPolicy::Last)
                .map_err(|_| format!("invalid history policy '{}' (expected none, all or a count)", s)),
        }
    }
}

/// A history setting as written in config: `"all"`, `"6"` or plain `6`
#[derive(Deserialize)]
#[serde(untagged)]
enum HistorySetting {
    Count(usize),
    Text(String),
}

impl TryFrom<HistorySetting> for HistoryPolicy {
    type Error = String;

    fn try_from(value: HistorySetting) -> Result<Self, Self::Error> {
        match value {
            HistorySetting::Count(n) => Ok(HistoryPolicy::Last(n)),
            HistorySetting::Text(text) => text.parse(),
        }
    }
}

impl From<HistoryPolicy> for String {
    fn from(policy: HistoryPolicy) -> Self {
        policy.to_string()
    }
}

impl fmt::Display for HistoryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryPolicy::None => f.write_str("none"),
            HistoryPolicy::All => f.write_str("all"),
            HistoryPolicy::Last(n) => write!(f, "{}", n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<ChatMessage> {
        vec![
            ChatMessage::user("one"),
            ChatMessage::assistant("two"),
            ChatMessage::user("three"),
            ChatMessage::assistant("four"),
        ]
    }

    #[test]
    fn test_message_serializes_role_and_content_only() {
        let json = serde_json::to_value(ChatMessage::placeholder()).unwrap();
        assert_eq!(json, serde_json::json!({ "role": "assistant", "content": "" }));
    }

    #[test]
    fn test_history_policy_parse() {
        assert_eq!("none".parse::<HistoryPolicy>(), Ok(HistoryPolicy::None));
        assert_eq!("ALL".parse::<HistoryPolicy>(), Ok(HistoryPolicy::All));
        assert_eq!("6".parse::<HistoryPolicy>(), Ok(HistoryPolicy::Last(6)));
        assert!("lots".parse::<HistoryPolicy>().is_err());
    }

    #[test]
    fn test_history_policy_deserializes_numbers_and_names() {
        let policy: HistoryPolicy = serde_json::from_str("6").unwrap();
        assert_eq!(policy, HistoryPolicy::Last(6));
        let policy: HistoryPolicy = serde_json::from_str(r#""none""#).unwrap();
        assert_eq!(policy, HistoryPolicy::None);
        assert!(serde_json::from_str::<HistoryPolicy>("-1").is_err());
        assert_eq!(serde_json::to_value(HistoryPolicy::Last(6)).unwrap(), "6");
    }

    #[test]
    fn test_history_policy_last_keeps_tail() {
        let context = HistoryPolicy::Last(2).select(&sample()).unwrap();
        let contents: Vec<&str> = context.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["three", "four"]);
    }

    #[test]
    fn test_history_policy_skips_provisional() {
        let mut messages = sample();
        messages.push(ChatMessage::placeholder());
        assert_eq!(HistoryPolicy::All.select(&messages).unwrap().len(), 4);
        assert_eq!(HistoryPolicy::None.select(&messages), None);
    }

    #[test]
    fn test_response_mode_parse() {
        assert_eq!("Stream".parse::<ResponseMode>(), Ok(ResponseMode::Stream));
        assert_eq!("whole".parse::<ResponseMode>(), Ok(ResponseMode::Whole));
        assert!("chunks".parse::<ResponseMode>().is_err());
    }
}
