use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::error::Result;
use crate::state::ChatMessage;

/// Lazy, finite, non-restartable sequence of reply text fragments
pub type FragmentStream = BoxStream<'static, Result<String>>;

/// One outbound call to the chat responder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub prompt: String,
    /// Prior conversation, present only when the history policy sends it
    pub history: Option<Vec<ChatMessage>>,
}

/// What the responder handed back for a request
pub enum Reply {
    Whole(String),
    Stream(FragmentStream),
    /// Success without a readable body
    Empty,
}

impl std::fmt::Debug for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reply::Whole(text) => f.debug_tuple("Whole").field(text).finish(),
            Reply::Stream(_) => f.write_str("Stream(..)"),
            Reply::Empty => f.write_str("Empty"),
        }
    }
}

/// The external chat service as the accumulator sees it
#[async_trait]
pub trait Responder: Send + Sync {
    async fn reply(&self, request: &ChatRequest) -> Result<Reply>;

    /// Short label for status lines
    fn describe(&self) -> String;
}
