use std::collections::HashMap;
use std::fmt::{Debug, Display};
use std::str::FromStr;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, warn};

/// The four operations the xAI REST API exposes to this client.
///
/// Kept as a trait so that callers can swap in a fake for tests instead of
/// talking to the real endpoint.
pub trait GrokApi {
    fn chat_completion(&self, model: GrokModel, messages: &[ChatMessage]) -> Result<ChatMessage>;
    fn models(&self) -> Result<Vec<Model>>;
    fn language_models(&self) -> Result<Vec<Model>>;
    fn embedding_models(&self) -> Result<Vec<Model>>;
}

pub struct GrokClient {
    key: GrokApiKey,
    client: Client,
}
impl GrokClient {
    const BASE_URL: &'static str = "https://api.x.ai/v1";
    // The API itself has no latency guarantee; without these a dead network
    // blocks the terminal forever.
    const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

    pub fn new(key: GrokApiKey) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Self::CONNECT_TIMEOUT)
            .timeout(Self::REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                GrokClientError::new(
                    "failed to build http client".to_string(),
                    GrokClientErrorKind::RequestError(e.to_string()),
                )
            })?;
        Ok(Self { key, client })
    }
    pub fn from_env() -> Result<Self> {
        Self::new(GrokApiKey::from_env()?)
    }
    fn url(endpoint: &str) -> String {
        format!("{}/{}", Self::BASE_URL, endpoint)
    }
    fn get(&self, endpoint: &str) -> Result<String> {
        let url = Self::url(endpoint);
        let response = self
            .client
            .get(&url)
            .bearer_auth(self.key.key())
            .send()
            .map_err(|e| {
                GrokClientError::new(
                    format!("failed to request to {}", url),
                    GrokClientErrorKind::RequestError(e.to_string()),
                )
            })?;
        Self::read_body(response)
    }
    fn post(&self, endpoint: &str, body: String) -> Result<String> {
        let url = Self::url(endpoint);
        debug!(">> {}", body);
        let response = self
            .client
            .post(&url)
            .bearer_auth(self.key.key())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .map_err(|e| {
                GrokClientError::new(
                    format!("failed to request to {}", url),
                    GrokClientErrorKind::RequestError(e.to_string()),
                )
            })?;
        Self::read_body(response)
    }
    fn read_body(response: reqwest::blocking::Response) -> Result<String> {
        let status = response.status();
        let data = response.text().map_err(|e| {
            GrokClientError::new(
                "failed to read response body".to_string(),
                GrokClientErrorKind::RequestError(e.to_string()),
            )
        })?;
        debug!("<< {}", data);
        if !status.is_success() {
            warn!("api returned {}: {}", status, data);
            return Err(GrokClientError::new(
                format!("api returned {}", status),
                GrokClientErrorKind::ResponseError(data),
            ));
        }
        Ok(data)
    }
}

impl GrokApi for GrokClient {
    fn chat_completion(&self, model: GrokModel, messages: &[ChatMessage]) -> Result<ChatMessage> {
        let request = ChatRequest::new(model, messages.to_vec());
        let body = serde_json::to_string(&request).map_err(|e| {
            GrokClientError::new(
                "failed to encode chat completion request".to_string(),
                GrokClientErrorKind::NotMakeChatBody(e.to_string()),
            )
        })?;
        let data = self.post("chat/completions", body)?;
        decode::<ChatCompletionResponse>(&data)?.into_message()
    }
    fn models(&self) -> Result<Vec<Model>> {
        let data = self.get("models")?;
        let response = decode::<ListModelsResponse>(&data)?;
        Ok(response.data)
    }
    fn language_models(&self) -> Result<Vec<Model>> {
        let data = self.get("language-models")?;
        let response = decode::<ListSpecificModelsResponse>(&data)?;
        Ok(response.models)
    }
    fn embedding_models(&self) -> Result<Vec<Model>> {
        let data = self.get("embedding-models")?;
        let response = decode::<ListSpecificModelsResponse>(&data)?;
        Ok(response.models)
    }
}

fn decode<T: serde::de::DeserializeOwned>(data: &str) -> Result<T> {
    serde_json::from_str(data).map_err(|e| {
        GrokClientError::new(
            format!("failed to deserialize response: {}", data),
            GrokClientErrorKind::ResponseDeserializeError(e.to_string()),
        )
    })
}

#[derive(Clone)]
pub struct GrokApiKey(String);

impl GrokApiKey {
    pub const ENV_VAR: &'static str = "XAI_API_KEY";
    pub fn from_env() -> Result<Self> {
        Ok(Self(std::env::var(Self::ENV_VAR).map_err(|_| {
            GrokClientError::new(
                format!("{} is not found", Self::ENV_VAR),
                GrokClientErrorKind::NotFoundEnvAPIKey,
            )
        })?))
    }
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }
    fn key(&self) -> &str {
        self.0.as_str()
    }
}
impl Debug for GrokApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", "x".repeat(self.0.len()))
    }
}
impl Display for GrokApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", "x".repeat(self.0.len()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}
impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrokModel {
    GrokBeta,
    GrokVisionBeta,
    Grok2Latest,
}
impl Default for GrokModel {
    fn default() -> Self {
        Self::GrokBeta
    }
}
impl GrokModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GrokBeta => "grok-beta",
            Self::GrokVisionBeta => "grok-vision-beta",
            Self::Grok2Latest => "grok-2-latest",
        }
    }
}
impl serde::Serialize for GrokModel {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}
impl FromStr for GrokModel {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "grok-beta" | "beta" => Ok(Self::GrokBeta),
            "grok-vision-beta" | "vision" => Ok(Self::GrokVisionBeta),
            "grok-2-latest" | "grok-2" => Ok(Self::Grok2Latest),
            _ => Err(format!("{} is not supported", s)),
        }
    }
}

/// Wire request for `POST /v1/chat/completions`.
///
/// Unset tuning fields stay out of the encoded body entirely, so a field set
/// to zero on purpose (`seed: Some(0)`) is still sent.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ChatRequest {
    pub model: GrokModel,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logit_bias: Option<HashMap<String, f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logprobs: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_options: Option<String>,
}
impl ChatRequest {
    const DEFAULT_MAX_TOKENS: u32 = 500;
    pub fn new(model: GrokModel, messages: Vec<ChatMessage>) -> Self {
        Self {
            model,
            messages,
            max_tokens: Self::DEFAULT_MAX_TOKENS,
            frequency_penalty: None,
            logit_bias: None,
            logprobs: None,
            n: None,
            presence_penalty: None,
            response_format: None,
            seed: None,
            stop: None,
            stream: None,
            stream_options: None,
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: String,
    pub created: u64,
    pub model: String,
    pub choices: Vec<ChatChoice>,
    pub usage: Usage,
}
impl ChatCompletionResponse {
    /// The API may answer with any number of choices; this client only ever
    /// asks for one and uses the first. Zero choices is a hard error.
    fn into_message(self) -> Result<ChatMessage> {
        self.choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| {
                GrokClientError::new(
                    "chat completion response contains no choices".to_string(),
                    GrokClientErrorKind::EmptyChoices,
                )
            })
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ChatChoice {
    pub index: u32,
    pub finish_reason: String,
    pub message: ChatMessage,
}

#[derive(Debug, Clone, Copy, serde::Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(default)]
pub struct Model {
    pub id: String,
    pub object: String,
    pub created: u64,
    pub owned_by: String,
    pub version: String,
    pub input_modalities: Vec<String>,
    pub prompt_text_token_price: u64,
    pub prompt_image_token_price: u64,
}

// `GET /v1/models` nests the list differently from the model-type endpoints.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ListModelsResponse {
    pub object: String,
    pub data: Vec<Model>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ListSpecificModelsResponse {
    pub models: Vec<Model>,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct GrokClientError {
    message: String,
    pub kind: GrokClientErrorKind,
}
impl GrokClientError {
    pub fn new(message: String, kind: GrokClientErrorKind) -> Self {
        Self { message, kind }
    }
}
impl Display for GrokClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "kind : {}\n message : {}", self.kind, self.message)
    }
}
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum GrokClientErrorKind {
    NotFoundEnvAPIKey,
    RequestError(String),
    ResponseError(String),
    ResponseDeserializeError(String),
    EmptyChoices,
    NotMakeChatBody(String),
}
impl Display for GrokClientErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Self::NotFoundEnvAPIKey => {
                format!("Not found {} in env", GrokApiKey::ENV_VAR)
            }
            Self::RequestError(s) => format!("Request Error. Error is : {}", s),
            Self::ResponseError(s) => format!("Response Error. Error is : {}", s),
            Self::ResponseDeserializeError(s) => {
                format!("Not Deserialize response. Serde Error is : {}", s)
            }
            Self::EmptyChoices => "Response contains no choices".to_string(),
            Self::NotMakeChatBody(s) => format!("Not make chat body from {}", s),
        };
        write!(f, "{}", kind)
    }
}
impl std::error::Error for GrokClientError {}
pub type Result<T> = std::result::Result<T, GrokClientError>;


#[cfg(test)]
pub mod fakes {
    use std::cell::{Cell, RefCell};

    use super::*;

    /// Canned-response stand-in for [`GrokApi`] so chat and repl tests never
    /// touch the network.
    pub struct FakeApi {
        replies: RefCell<Vec<ChatMessage>>,
        called_time: Cell<usize>,
        failure: Option<GrokClientErrorKind>,
    }
    impl FakeApi {
        pub fn with_replies(replies: Vec<&str>) -> Self {
            Self {
                replies: RefCell::new(
                    replies
                        .into_iter()
                        .map(|content| ChatMessage::new(Role::Assistant, content))
                        .collect(),
                ),
                called_time: Cell::new(0),
                failure: None,
            }
        }
        pub fn failing(kind: GrokClientErrorKind) -> Self {
            Self {
                replies: RefCell::new(Vec::new()),
                called_time: Cell::new(0),
                failure: Some(kind),
            }
        }
        pub fn called_time(&self) -> usize {
            self.called_time.get()
        }
    }
    impl GrokApi for FakeApi {
        fn chat_completion(
            &self,
            _model: GrokModel,
            _messages: &[ChatMessage],
        ) -> Result<ChatMessage> {
            self.called_time.set(self.called_time.get() + 1);
            if let Some(kind) = &self.failure {
                return Err(GrokClientError::new("fake failure".to_string(), kind.clone()));
            }
            let mut replies = self.replies.borrow_mut();
            if replies.is_empty() {
                return Err(GrokClientError::new(
                    "no canned reply left".to_string(),
                    GrokClientErrorKind::EmptyChoices,
                ));
            }
            Ok(replies.remove(0))
        }
        fn models(&self) -> Result<Vec<Model>> {
            Ok(Vec::new())
        }
        fn language_models(&self) -> Result<Vec<Model>> {
            Ok(Vec::new())
        }
        fn embedding_models(&self) -> Result<Vec<Model>> {
            Ok(Vec::new())
        }
    }
}
