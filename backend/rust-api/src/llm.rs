use async_trait::async_trait;
use serde_json::{json, Value};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("model provider request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("model provider returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("model call timed out after {0:?}")]
    Timeout(Duration),
    #[error("model response was malformed: {0}")]
    Malformed(String),
}

/// One chat-completion call. `system` is optional; `user` carries the
/// grounding prompt.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub system: Option<String>,
    pub user: String,
}

/// Function-calling schema forced on the model so the reply arrives as
/// structured JSON arguments instead of prose.
#[derive(Debug, Clone)]
pub struct FunctionSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Seam between the services and the chat-completions provider. Tests swap
/// in counting or sleeping fakes here.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Invoke with a forced function call, returning the parsed arguments.
    async fn call_function(
        &self,
        request: &ChatRequest,
        function: &FunctionSpec,
    ) -> Result<Value, LlmError>;

    /// Plain completion, returning the message content.
    async fn complete(&self, request: &ChatRequest) -> Result<String, LlmError>;
}

/// Race a model call against a deadline. The loser's settlement is
/// discarded, not aborted at the network level.
pub async fn with_timeout<T, F>(limit: Duration, call: F) -> Result<T, LlmError>
where
    F: Future<Output = Result<T, LlmError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(LlmError::Timeout(limit)),
    }
}

/// Client for any OpenAI-compatible chat-completions endpoint.
pub struct OpenAiChatClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiChatClient {
    pub fn new(
        api_key: Option<String>,
        base_url: String,
        client_timeout: Duration,
    ) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder().timeout(client_timeout).build()?;

        Ok(Self {
            http,
            api_key: api_key.unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn payload(&self, request: &ChatRequest) -> Value {
        let mut messages = Vec::new();
        if let Some(system) = &request.system {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.push(json!({ "role": "user", "content": request.user }));

        json!({
            "model": request.model,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
            "messages": messages,
        })
    }

    async fn send(&self, payload: Value) -> Result<Value, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_else(|_| "unknown error".to_string());
            return Err(LlmError::Status { status, body });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl ChatModel for OpenAiChatClient {
    async fn call_function(
        &self,
        request: &ChatRequest,
        function: &FunctionSpec,
    ) -> Result<Value, LlmError> {
        let mut payload = self.payload(request);
        payload["functions"] = json!([{
            "name": function.name,
            "description": function.description,
            "parameters": function.parameters,
        }]);
        payload["function_call"] = json!({ "name": function.name });

        let body = self.send(payload).await?;

        let arguments = body["choices"][0]["message"]["function_call"]["arguments"]
            .as_str()
            .ok_or_else(|| {
                LlmError::Malformed("function call returned no arguments".to_string())
            })?;

        serde_json::from_str(arguments)
            .map_err(|e| LlmError::Malformed(format!("function arguments are not JSON: {}", e)))
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String, LlmError> {
        let body = self.send(self.payload(request)).await?;

        body["choices"][0]["message"]["content"]
            .as_str()
            .map(|content| content.to_string())
            .ok_or_else(|| LlmError::Malformed("completion returned no content".to_string()))
    }
}
