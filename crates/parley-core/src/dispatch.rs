use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::ResponderError;
use crate::responder::{ChatRequest, Reply, Responder};

/// Ordered events produced by one submission
#[derive(Debug)]
pub enum ReplyEvent {
    Whole(String),
    Fragment(String),
    Failed(ResponderError),
    /// The fragment stream ran out
    Finished,
}

impl ReplyEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReplyEvent::Fragment(_))
    }
}

/// Run one request against the responder and forward what comes back.
/// Exactly one terminal event is sent, unless the receiver is gone.
pub async fn forward_reply(
    responder: &dyn Responder,
    request: &ChatRequest,
    events: &mpsc::UnboundedSender<ReplyEvent>,
) {
    info!(responder = %responder.describe(), "dispatching chat request");

    let reply = match responder.reply(request).await {
        Ok(reply) => reply,
        Err(err) => {
            let _ = events.send(ReplyEvent::Failed(err));
            return;
        }
    };

    match reply {
        Reply::Whole(text) => {
            debug!(chars = text.chars().count(), "whole reply received");
            let _ = events.send(ReplyEvent::Whole(text));
        }
        Reply::Empty => {
            debug!("reply had no body");
            let _ = events.send(ReplyEvent::Finished);
        }
        Reply::Stream(mut fragments) => {
            let mut count = 0usize;
            while let Some(item) = fragments.next().await {
                match item {
                    Ok(fragment) if fragment.is_empty() => {}
                    Ok(fragment) => {
                        count += 1;
                        if events.send(ReplyEvent::Fragment(fragment)).is_err() {
                            debug!("reply receiver dropped, releasing stream");
                            return;
                        }
                    }
                    Err(err) => {
                        let _ = events.send(ReplyEvent::Failed(err));
                        return;
                    }
                }
            }
            debug!(fragments = count, "reply stream finished");
            let _ = events.send(ReplyEvent::Finished);
        }
    }
}

/// Spawn `forward_reply` on the runtime and hand back its event channel
pub fn spawn_reply(
    responder: Arc<dyn Responder>,
    request: ChatRequest,
) -> (mpsc::UnboundedReceiver<ReplyEvent>, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(async move {
        forward_reply(responder.as_ref(), &request, &tx).await;
    });
    (rx, task)
}
