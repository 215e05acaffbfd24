//! OpenAI-compatible implementation of the inference and media gateways.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use tracing::debug;

use crate::api::{
    ChatCompletionRequest, ChatCompletionResponse, ImageGenerationRequest,
    ImageGenerationResponse, SpeechRequest, TranscriptionResponse,
};
use crate::core::config::Config;
use crate::core::gateway::{
    AudioPayload, CompletionRequest, GatewayError, InferenceGateway, MediaGateway,
};
use crate::utils::media::audio_data_url;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o";
pub const DEFAULT_IMAGE_MODEL: &str = "dall-e-3";
pub const DEFAULT_SPEECH_MODEL: &str = "tts-1";
pub const DEFAULT_SPEECH_VOICE: &str = "alloy";
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-1";

const IMAGE_SIZE: &str = "1024x1024";
const IMAGE_QUALITY: &str = "standard";
const IMAGE_STYLE: &str = "natural";
const SPEECH_MIME_TYPE: &str = "audio/mpeg";

#[derive(Clone, Debug, PartialEq)]
pub struct ProviderSettings {
    pub base_url: String,
    pub chat_model: String,
    pub image_model: String,
    pub speech_model: String,
    pub speech_voice: String,
    pub transcription_model: String,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            speech_model: DEFAULT_SPEECH_MODEL.to_string(),
            speech_voice: DEFAULT_SPEECH_VOICE.to_string(),
            transcription_model: DEFAULT_TRANSCRIPTION_MODEL.to_string(),
        }
    }
}

impl ProviderSettings {
    /// Layers configured values over the defaults. `OPENAI_BASE_URL` wins
    /// over the config file.
    pub fn from_config(config: &Config) -> Self {
        let defaults = Self::default();
        let base_url = std::env::var("OPENAI_BASE_URL")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .or_else(|| config.base_url.clone())
            .unwrap_or(defaults.base_url);

        Self {
            base_url,
            chat_model: config.chat_model.clone().unwrap_or(defaults.chat_model),
            image_model: config.image_model.clone().unwrap_or(defaults.image_model),
            speech_model: config.speech_model.clone().unwrap_or(defaults.speech_model),
            speech_voice: config.speech_voice.clone().unwrap_or(defaults.speech_voice),
            transcription_model: config
                .transcription_model
                .clone()
                .unwrap_or(defaults.transcription_model),
        }
    }
}

#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    settings: ProviderSettings,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>, settings: ProviderSettings) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            settings,
        }
    }

    pub fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    fn post(&self, endpoint: &str) -> RequestBuilder {
        let url = endpoint_url(&self.settings.base_url, endpoint);
        debug!(url = %url, "Sending provider request");
        self.client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }
}

fn endpoint_url(base_url: &str, endpoint: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}

/// Pulls a one-line summary out of an error body, preferring the
/// `error.message` field OpenAI-compatible APIs return.
fn api_error_message(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<no body>".to_string();
    }

    let summary = serde_json::from_str::<serde_json::Value>(trimmed)
        .ok()
        .and_then(|value| {
            value
                .pointer("/error/message")
                .and_then(|v| v.as_str())
                .map(str::to_owned)
                .or_else(|| {
                    value
                        .get("error")
                        .and_then(|v| v.as_str())
                        .map(str::to_owned)
                })
                .or_else(|| {
                    value
                        .get("message")
                        .and_then(|v| v.as_str())
                        .map(str::to_owned)
                })
        })
        .unwrap_or_else(|| trimmed.to_string());

    summary.split_whitespace().collect::<Vec<_>>().join(" ")
}

async fn ensure_success(response: Response) -> Result<Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(GatewayError::Api {
        status: status.as_u16(),
        message: api_error_message(&body),
    })
}

#[async_trait]
impl InferenceGateway for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, GatewayError> {
        let body = ChatCompletionRequest {
            model: self.settings.chat_model.clone(),
            messages: request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = self.post("chat/completions").json(&body).send().await?;
        let completion: ChatCompletionResponse = ensure_success(response).await?.json().await?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.unwrap_or_default())
            .ok_or(GatewayError::EmptyResponse("chat completion"))
    }
}

#[async_trait]
impl MediaGateway for OpenAiClient {
    async fn generate_image(&self, prompt: &str) -> Result<Option<String>, GatewayError> {
        let body = ImageGenerationRequest {
            model: self.settings.image_model.clone(),
            prompt: prompt.to_string(),
            n: 1,
            size: IMAGE_SIZE.to_string(),
            quality: IMAGE_QUALITY.to_string(),
            style: IMAGE_STYLE.to_string(),
        };

        let response = self.post("images/generations").json(&body).send().await?;
        let generated: ImageGenerationResponse = ensure_success(response).await?.json().await?;

        Ok(generated
            .data
            .into_iter()
            .next()
            .and_then(|image| image.url)
            .filter(|url| !url.trim().is_empty()))
    }

    async fn synthesize_speech(&self, text: &str) -> Result<String, GatewayError> {
        let body = SpeechRequest {
            model: self.settings.speech_model.clone(),
            voice: self.settings.speech_voice.clone(),
            input: text.to_string(),
        };

        let response = self.post("audio/speech").json(&body).send().await?;
        let bytes = ensure_success(response).await?.bytes().await?;
        if bytes.is_empty() {
            return Err(GatewayError::EmptyResponse("speech synthesis"));
        }
        Ok(audio_data_url(&bytes, SPEECH_MIME_TYPE))
    }

    async fn transcribe(&self, audio: AudioPayload) -> Result<String, GatewayError> {
        let AudioPayload {
            bytes,
            file_name,
            mime_type,
        } = audio;
        let file = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(&mime_type)?;
        let form = Form::new()
            .part("file", file)
            .text("model", self.settings.transcription_model.clone());

        let response = self.post("audio/transcriptions").multipart(form).send().await?;
        let transcription: TranscriptionResponse = ensure_success(response).await?.json().await?;
        Ok(transcription.text)
    }
}
