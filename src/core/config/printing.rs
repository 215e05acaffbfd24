use crate::core::config::data::{Config, ConfigKey, DEFAULT_STEP_DELAY_MS};
use crate::core::openai::ProviderSettings;

impl Config {
    /// Lines describing every key, with the effective default for unset ones.
    pub fn describe(&self) -> Vec<String> {
        let defaults = ProviderSettings::default();
        ConfigKey::ALL
            .into_iter()
            .map(|key| {
                let shown = match self.value(key) {
                    Some(value) => value,
                    None => {
                        let fallback = match key {
                            ConfigKey::BaseUrl => defaults.base_url.clone(),
                            ConfigKey::ChatModel => defaults.chat_model.clone(),
                            ConfigKey::ImageModel => defaults.image_model.clone(),
                            ConfigKey::SpeechModel => defaults.speech_model.clone(),
                            ConfigKey::SpeechVoice => defaults.speech_voice.clone(),
                            ConfigKey::TranscriptionModel => defaults.transcription_model.clone(),
                            ConfigKey::StepDelayMs => DEFAULT_STEP_DELAY_MS.to_string(),
                        };
                        format!("(unset, default {fallback})")
                    }
                };
                format!("  {}: {}", key.as_str(), shown)
            })
            .collect()
    }

    pub fn print_all(&self) {
        println!("Current configuration:");
        for line in self.describe() {
            println!("{line}");
        }
    }
}
