//! Requests to an OpenAI-style chat-completion endpoint.
//!
//! One blocking call per text unit, no retries. Any failure is logged and
//! turned into a [`GenerationReply::Failed`] so the caller can move on.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::EndpointSettings;
use crate::error::{Error, RequestError, Result};

/// Placeholder replaced by the unit text in an instruction template.
pub const TEXT_PLACEHOLDER: &str = "{text}";

pub const DEFAULT_TEMPLATE: &str = "Given the following text create 5 question answer pairs. \
I don't want the answers to be multiple choice. The answer should appear directly below the question. \
Question should start with Q: and answer with A: \n\n {text}";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Request body. Sampling is pinned (temperature and top_p at zero) to
/// keep runs comparable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<serde_json::Value>,
    pub do_sample: bool,
    pub temperature: f32,
    pub top_p: f32,
    pub n: u32,
    pub max_tokens: u32,
    pub stream: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub message: ReplyMessage,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReplyMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatResponse {
    pub fn first_content(&self) -> Option<&str> {
        self.choices.first()?.message.content.as_deref()
    }
}

/// Anything that can deliver a chat request and hand back the decoded body.
pub trait ChatTransport {
    fn send(&self, request: &ChatRequest) -> std::result::Result<ChatResponse, RequestError>;
}

impl<T: ChatTransport + ?Sized> ChatTransport for &T {
    fn send(&self, request: &ChatRequest) -> std::result::Result<ChatResponse, RequestError> {
        (**self).send(request)
    }
}

/// Blocking HTTP transport.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    url: String,
}

impl HttpTransport {
    pub fn new(settings: &EndpointSettings) -> Result<Self> {
        let mut builder = reqwest::blocking::Client::builder();
        // reqwest's blocking client defaults to 30s; zero means wait forever
        builder = if settings.timeout_secs > 0 {
            builder.timeout(Duration::from_secs(settings.timeout_secs))
        } else {
            builder.timeout(None)
        };
        let client = builder
            .build()
            .map_err(|e| Error::configuration(format!("cannot build HTTP client: {}", e)))?;
        Ok(HttpTransport {
            client,
            url: settings.url.clone(),
        })
    }
}

impl ChatTransport for HttpTransport {
    fn send(&self, request: &ChatRequest) -> std::result::Result<ChatResponse, RequestError> {
        let response = self.client.post(&self.url).json(request).send()?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(RequestError::Status {
                status: status.as_u16(),
                body,
            });
        }
        response
            .json::<ChatResponse>()
            .map_err(|e| RequestError::Decode(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyFailure {
    HttpError { status: u16 },
    Timeout,
    /// 2xx reply with no usable content.
    Empty,
    /// Connection or decoding problem.
    Transport(String),
}

/// Outcome of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationReply {
    Success { raw_content: String },
    Failed(ReplyFailure),
}

impl GenerationReply {
    pub fn content(&self) -> Option<&str> {
        match self {
            GenerationReply::Success { raw_content } => Some(raw_content),
            GenerationReply::Failed(_) => None,
        }
    }
}

/// Builds the instruction prompt for a unit and sends it.
pub struct Generator<T> {
    transport: T,
    model: String,
    template: String,
    max_tokens: u32,
}

impl<T: ChatTransport> Generator<T> {
    pub fn new(transport: T, settings: &EndpointSettings) -> Result<Self> {
        if !settings.template.contains(TEXT_PLACEHOLDER) {
            return Err(Error::configuration(format!(
                "instruction template has no {} placeholder",
                TEXT_PLACEHOLDER
            )));
        }
        Ok(Generator {
            transport,
            model: settings.model.clone(),
            template: settings.template.clone(),
            max_tokens: settings.max_tokens,
        })
    }

    /// The prompt with `text` embedded verbatim.
    pub fn prompt(&self, text: &str) -> String {
        self.template.replacen(TEXT_PLACEHOLDER, text, 1)
    }

    pub fn build_request(&self, text: &str) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: self.prompt(text),
            }],
            tools: Vec::new(),
            do_sample: true,
            temperature: 0.0,
            top_p: 0.0,
            n: 1,
            max_tokens: self.max_tokens,
            stream: false,
        }
    }

    pub fn request_completion(&self, text: &str) -> GenerationReply {
        let request = self.build_request(text);
        match self.transport.send(&request) {
            Ok(response) => match response.first_content().map(str::trim) {
                Some(content) if !content.is_empty() => {
                    debug!(chars = content.len(), "received reply");
                    GenerationReply::Success {
                        raw_content: content.to_string(),
                    }
                }
                _ => {
                    warn!("endpoint returned no content");
                    GenerationReply::Failed(ReplyFailure::Empty)
                }
            },
            Err(RequestError::Status { status, body }) => {
                warn!(status, body = %truncate(&body, 200), "endpoint returned an error");
                GenerationReply::Failed(ReplyFailure::HttpError { status })
            }
            Err(RequestError::Timeout) => {
                warn!("endpoint request timed out");
                GenerationReply::Failed(ReplyFailure::Timeout)
            }
            Err(e) => {
                warn!(error = %e, "endpoint request failed");
                GenerationReply::Failed(ReplyFailure::Transport(e.to_string()))
            }
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}
