use serde::{Deserialize, Serialize};

pub const ROLE_SYSTEM: &str = "system";
pub const ROLE_USER: &str = "user";

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ROLE_SYSTEM.to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ROLE_USER.to_string(),
            content: content.into(),
        }
    }
}

#[derive(Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Deserialize)]
pub struct ChatCompletionMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Deserialize)]
pub struct ChatCompletionChoice {
    pub message: ChatCompletionMessage,
}

#[derive(Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<ChatCompletionChoice>,
}

#[derive(Serialize)]
pub struct ImageGenerationRequest {
    pub model: String,
    pub prompt: String,
    pub n: u8,
    pub size: String,
    pub quality: String,
    pub style: String,
}

#[derive(Deserialize)]
pub struct ImageData {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Deserialize)]
pub struct ImageGenerationResponse {
    #[serde(default)]
    pub data: Vec<ImageData>,
}

#[derive(Serialize)]
pub struct SpeechRequest {
    pub model: String,
    pub voice: String,
    pub input: String,
}

#[derive(Deserialize)]
pub struct TranscriptionResponse {
    pub text: String,
}
