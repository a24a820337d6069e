use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::ChatError;

#[derive(Serialize)]
struct ChatRequest<'a> {
    question: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    answer: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: Option<String>,
}

/// Anything that can answer a single question.
#[async_trait]
pub trait AnswerBackend: Send + Sync {
    async fn ask(&self, question: &str) -> Result<String, ChatError>;
}

/// The question-answering service reached over HTTP.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat", self.base_url)
    }
}

#[async_trait]
impl AnswerBackend for HttpBackend {
    async fn ask(&self, question: &str) -> Result<String, ChatError> {
        let url = self.endpoint();

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&ChatRequest { question })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            // Error bodies are best-effort; the status alone is enough.
            let detail = response
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|body| body.detail);
            return Err(ChatError::Status {
                status: status.as_u16(),
                detail,
            });
        }

        let body = response.bytes().await?;
        let chat_response: ChatResponse =
            serde_json::from_slice(&body).map_err(|e| ChatError::Decode(e.to_string()))?;
        Ok(chat_response.answer)
    }
}
