use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::config::io::ConfigError;

/// Pause between pipeline steps when `step_delay_ms` is unset.
pub const DEFAULT_STEP_DELAY_MS: u64 = 1000;

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct Config {
    /// OpenAI-compatible API root, e.g. "https://api.openai.com/v1"
    pub base_url: Option<String>,
    pub chat_model: Option<String>,
    pub image_model: Option<String>,
    pub speech_model: Option<String>,
    pub speech_voice: Option<String>,
    pub transcription_model: Option<String>,
    /// Milliseconds to pause after announcing each processing step
    pub step_delay_ms: Option<u64>,
}

/// Keys accepted by `repcoach set` and `repcoach unset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    BaseUrl,
    ChatModel,
    ImageModel,
    SpeechModel,
    SpeechVoice,
    TranscriptionModel,
    StepDelayMs,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 7] = [
        ConfigKey::BaseUrl,
        ConfigKey::ChatModel,
        ConfigKey::ImageModel,
        ConfigKey::SpeechModel,
        ConfigKey::SpeechVoice,
        ConfigKey::TranscriptionModel,
        ConfigKey::StepDelayMs,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ConfigKey::BaseUrl => "base-url",
            ConfigKey::ChatModel => "chat-model",
            ConfigKey::ImageModel => "image-model",
            ConfigKey::SpeechModel => "speech-model",
            ConfigKey::SpeechVoice => "speech-voice",
            ConfigKey::TranscriptionModel => "transcription-model",
            ConfigKey::StepDelayMs => "step-delay-ms",
        }
    }

    pub fn parse(key: &str) -> Result<Self, ConfigError> {
        let normalized = key.trim().replace('_', "-").to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.as_str() == normalized)
            .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))
    }
}

impl Config {
    fn slot(&mut self, key: ConfigKey) -> Option<&mut Option<String>> {
        match key {
            ConfigKey::BaseUrl => Some(&mut self.base_url),
            ConfigKey::ChatModel => Some(&mut self.chat_model),
            ConfigKey::ImageModel => Some(&mut self.image_model),
            ConfigKey::SpeechModel => Some(&mut self.speech_model),
            ConfigKey::SpeechVoice => Some(&mut self.speech_voice),
            ConfigKey::TranscriptionModel => Some(&mut self.transcription_model),
            ConfigKey::StepDelayMs => None,
        }
    }

    pub fn set_value(&mut self, key: ConfigKey, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: key.as_str(),
                value: value.to_string(),
            });
        }

        if key == ConfigKey::StepDelayMs {
            let millis = value.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                key: key.as_str(),
                value: value.to_string(),
            })?;
            self.step_delay_ms = Some(millis);
        } else if let Some(slot) = self.slot(key) {
            *slot = Some(value.to_string());
        }
        Ok(())
    }

    pub fn unset_value(&mut self, key: ConfigKey) {
        if key == ConfigKey::StepDelayMs {
            self.step_delay_ms = None;
        } else if let Some(slot) = self.slot(key) {
            *slot = None;
        }
    }

    pub fn value(&self, key: ConfigKey) -> Option<String> {
        match key {
            ConfigKey::BaseUrl => self.base_url.clone(),
            ConfigKey::ChatModel => self.chat_model.clone(),
            ConfigKey::ImageModel => self.image_model.clone(),
            ConfigKey::SpeechModel => self.speech_model.clone(),
            ConfigKey::SpeechVoice => self.speech_voice.clone(),
            ConfigKey::TranscriptionModel => self.transcription_model.clone(),
            ConfigKey::StepDelayMs => self.step_delay_ms.map(|millis| millis.to_string()),
        }
    }

    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms.unwrap_or(DEFAULT_STEP_DELAY_MS))
    }
}

pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            if let Ok(relative) = path.strip_prefix(PathBuf::from(home)) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
