use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::decode::decode_fragments;
use crate::error::{ResponderError, Result};
use crate::responder::{ChatRequest, Reply, Responder};
use crate::state::ResponseMode;

pub const DEFAULT_PROMPT_FIELD: &str = "message";

#[derive(Deserialize)]
struct WholeResponse {
    response: String,
}

#[derive(Deserialize)]
struct HealthResponse {
    status: String,
}

/// Chat responder reached with one JSON POST per message
#[derive(Clone)]
pub struct HttpResponder {
    client: Client,
    endpoint: Url,
    mode: ResponseMode,
    prompt_field: String,
}

impl HttpResponder {
    pub fn new(endpoint: &str, mode: ResponseMode) -> Result<Self> {
        let endpoint = Url::parse(endpoint).map_err(|e| ResponderError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(ResponderError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                message: "scheme must be http or https".to_string(),
            });
        }

        Ok(Self {
            client: Client::new(),
            endpoint,
            mode,
            prompt_field: DEFAULT_PROMPT_FIELD.to_string(),
        })
    }

    /// Name of the JSON field carrying the user text
    pub fn with_prompt_field(mut self, field: impl Into<String>) -> Self {
        self.prompt_field = field.into();
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn mode(&self) -> ResponseMode {
        self.mode
    }

    fn request_body(&self, request: &ChatRequest) -> Result<Value> {
        let mut body = Map::new();
        body.insert(self.prompt_field.clone(), Value::String(request.prompt.clone()));
        if let Some(history) = &request.history {
            // ChatMessage serializes to {role, content}
            body.insert("messages".to_string(), serde_json::to_value(history)?);
        }
        Ok(Value::Object(body))
    }

    /// Probe the service root and return its reported status
    pub async fn health(&self) -> Result<String> {
        let mut url = self.endpoint.clone();
        url.set_path("/");
        url.set_query(None);

        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ResponderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        match serde_json::from_str::<HealthResponse>(&body) {
            Ok(parsed) => Ok(parsed.status),
            Err(_) => Ok(body.trim().to_string()),
        }
    }
}

#[async_trait]
impl Responder for HttpResponder {
    async fn reply(&self, request: &ChatRequest) -> Result<Reply> {
        let body = self.request_body(request)?;
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "chat service rejected request");
            return Err(ResponderError::Status {
                status: status.as_u16(),
                body,
            });
        }
        debug!(%status, mode = %self.mode, "chat service accepted request");

        match self.mode {
            ResponseMode::Whole => {
                let body = response.text().await?;
                let parsed: WholeResponse = serde_json::from_str(&body)?;
                Ok(Reply::Whole(parsed.response))
            }
            ResponseMode::Stream => {
                if status == StatusCode::NO_CONTENT || response.content_length() == Some(0) {
                    return Ok(Reply::Empty);
                }
                Ok(Reply::Stream(decode_fragments(response.bytes_stream())))
            }
        }
    }

    fn describe(&self) -> String {
        format!("{} ({})", self.endpoint, self.mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ChatMessage;

    #[test]
    fn test_rejects_invalid_endpoint() {
        assert!(matches!(
            HttpResponder::new("not a url", ResponseMode::Stream),
            Err(ResponderError::InvalidEndpoint { .. })
        ));
        assert!(matches!(
            HttpResponder::new("ftp://example.com/chat", ResponseMode::Whole),
            Err(ResponderError::InvalidEndpoint { .. })
        ));
    }

    #[test]
    fn test_request_body_without_history() {
        let responder = HttpResponder::new("http://localhost:8000/chat", ResponseMode::Stream).unwrap();
        let body = responder
            .request_body(&ChatRequest {
                prompt: "hi".to_string(),
                history: None,
            })
            .unwrap();
        assert_eq!(body, serde_json::json!({ "message": "hi" }));
    }

    #[test]
    fn test_request_body_with_history_and_custom_field() {
        let responder = HttpResponder::new("http://localhost:8000/chat", ResponseMode::Whole)
            .unwrap()
            .with_prompt_field("prompt");
        let body = responder
            .request_body(&ChatRequest {
                prompt: "and then?".to_string(),
                history: Some(vec![ChatMessage::user("hi"), ChatMessage::assistant("hello")]),
            })
            .unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "prompt": "and then?",
                "messages": [
                    { "role": "user", "content": "hi" },
                    { "role": "assistant", "content": "hello" }
                ]
            })
        );
    }

    #[test]
    fn test_describe_mentions_mode() {
        let responder = HttpResponder::new("http://localhost:8000/chat", ResponseMode::Whole).unwrap();
        assert_eq!(responder.describe(), "http://localhost:8000/chat (whole)");
    }
}
