pub mod accumulator;
pub mod config;
pub mod decode;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod responder;
pub mod state;
pub mod transcript;

// Re-export main types for convenience
pub use accumulator::{Accumulator, REPLY_ERROR_TEXT};
pub use config::{Config, Overrides, Settings, ThemeMode};
pub use decode::{decode_fragments, Utf8Decoder};
pub use dispatch::{forward_reply, spawn_reply, ReplyEvent};
pub use error::ResponderError;
pub use http::HttpResponder;
pub use responder::{ChatRequest, FragmentStream, Reply, Responder};
pub use state::{ChatMessage, ChatRole, HistoryPolicy, MessageStatus, ResponseMode};
pub use transcript::Transcript;
