//! Seams between the feedback pipeline and the remote provider.
//!
//! [`InferenceGateway`] covers chat completions and [`MediaGateway`] covers
//! image generation, speech synthesis, and transcription. The production
//! implementation is [`crate::core::openai::OpenAiClient`]; tests substitute
//! in-memory fakes.

use async_trait::async_trait;
use std::error::Error;
use std::fmt;

use crate::api::ChatMessage;

/// One chat-completion call: ordered role-tagged messages plus sampling
/// parameters. Only the first choice of the reply is used.
#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
            temperature: 0.7,
            max_tokens: 500,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|message| message.role == crate::api::ROLE_SYSTEM)
            .map(|message| message.content.as_str())
    }

    pub fn user_content(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|message| message.role == crate::api::ROLE_USER)
            .map(|message| message.content.as_str())
    }
}

/// Recorded audio handed to the transcription endpoint.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioPayload {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime_type: String,
}

impl AudioPayload {
    /// Browser recordings arrive as WebM/Opus.
    pub fn webm(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            file_name: "audio.webm".to_string(),
            mime_type: "audio/webm".to_string(),
        }
    }

    /// Picks the declared container from a file extension, defaulting to WebM.
    pub fn from_extension(bytes: Vec<u8>, extension: Option<&str>) -> Self {
        let extension = extension.map(str::to_ascii_lowercase);
        let (file_name, mime_type) = match extension.as_deref() {
            Some("mp3") => ("audio.mp3", "audio/mpeg"),
            Some("wav") => ("audio.wav", "audio/wav"),
            Some("m4a") => ("audio.m4a", "audio/mp4"),
            Some("ogg") => ("audio.ogg", "audio/ogg"),
            _ => return Self::webm(bytes),
        };
        Self {
            bytes,
            file_name: file_name.to_string(),
            mime_type: mime_type.to_string(),
        }
    }
}

#[derive(Debug)]
pub enum GatewayError {
    /// The request never produced an HTTP response, or its body could not be read.
    Transport(reqwest::Error),

    /// The provider answered with a non-success status.
    Api { status: u16, message: String },

    /// The provider answered successfully but without anything usable.
    EmptyResponse(&'static str),

    /// Error raised by a non-HTTP gateway implementation.
    Other(String),
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::Transport(err) => write!(f, "Request failed: {err}"),
            GatewayError::Api { status, message } => {
                write!(f, "API error {status}: {message}")
            }
            GatewayError::EmptyResponse(what) => write!(f, "Empty response from {what}"),
            GatewayError::Other(message) => f.write_str(message),
        }
    }
}

impl Error for GatewayError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            GatewayError::Transport(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::Transport(err)
    }
}

#[async_trait]
pub trait InferenceGateway: Send + Sync {
    /// Returns the text of the first choice; a null content is an empty string.
    async fn complete(&self, request: CompletionRequest) -> Result<String, GatewayError>;
}

#[async_trait]
pub trait MediaGateway: Send + Sync {
    /// Returns `Ok(None)` when the provider produced no usable image reference.
    async fn generate_image(&self, prompt: &str) -> Result<Option<String>, GatewayError>;

    /// Returns a playable audio reference for `text`.
    async fn synthesize_speech(&self, text: &str) -> Result<String, GatewayError>;

    async fn transcribe(&self, audio: AudioPayload) -> Result<String, GatewayError>;
}
