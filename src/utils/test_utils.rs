//! In-memory gateway fakes shared by pipeline and conversation tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use crate::core::gateway::{
    AudioPayload, CompletionRequest, GatewayError, InferenceGateway, MediaGateway,
};
use crate::core::orchestrator::FeedbackOrchestrator;
use crate::core::prompts::{COACH_SYSTEM_PROMPT, MOTIVATION_SYSTEM_PROMPT};

pub const SQUAT_REPLY: &str =
    "Great question!\nGENERATE_IMAGE: squat form\nGENERATE_AUDIO: Keep your back straight";

/// Answers chat completions by system prompt: coach analysis, motivation
/// line, or follow-up suggestions.
pub struct ScriptedInference {
    analysis: Result<String, String>,
    motivation: Result<String, String>,
    suggestions: Result<String, String>,
    gate: Option<Arc<Notify>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedInference {
    pub fn replying(analysis: &str) -> Self {
        Self {
            analysis: Ok(analysis.to_string()),
            motivation: Ok("You've got this, one more rep!".to_string()),
            suggestions: Ok(r#"["How deep should I squat?", "Can I use a Smith machine?"]"#.to_string()),
            gate: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_analysis(message: &str) -> Self {
        Self {
            analysis: Err(message.to_string()),
            ..Self::replying("")
        }
    }

    pub fn with_motivation(mut self, motivation: Result<&str, &str>) -> Self {
        self.motivation = motivation.map(str::to_string).map_err(str::to_string);
        self
    }

    pub fn with_suggestions(mut self, suggestions: Result<&str, &str>) -> Self {
        self.suggestions = suggestions.map(str::to_string).map_err(str::to_string);
        self
    }

    /// Holds the analysis call until the gate is notified.
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl InferenceGateway for ScriptedInference {
    async fn complete(&self, request: CompletionRequest) -> Result<String, GatewayError> {
        self.requests.lock().unwrap().push(request.clone());
        let reply = match request.system_prompt() {
            Some(COACH_SYSTEM_PROMPT) => {
                if let Some(gate) = &self.gate {
                    gate.notified().await;
                }
                &self.analysis
            }
            Some(MOTIVATION_SYSTEM_PROMPT) => &self.motivation,
            _ => &self.suggestions,
        };
        reply.clone().map_err(GatewayError::Other)
    }
}

/// Image results are consumed in order; once the script runs out every call
/// yields a numbered URL. Speech fails for inputs containing any of the
/// configured fragments.
#[derive(Default)]
pub struct FakeMedia {
    images: Mutex<VecDeque<Result<Option<String>, String>>>,
    failing_speech: Vec<String>,
    transcript: String,
    image_prompts: Mutex<Vec<String>>,
    speech_inputs: Mutex<Vec<String>>,
    transcriptions: Mutex<Vec<AudioPayload>>,
}

impl FakeMedia {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_images(self, images: Vec<Result<Option<&str>, &str>>) -> Self {
        *self.images.lock().unwrap() = images
            .into_iter()
            .map(|image| {
                image
                    .map(|url| url.map(str::to_string))
                    .map_err(str::to_string)
            })
            .collect();
        self
    }

    pub fn failing_speech_for(mut self, fragment: &str) -> Self {
        self.failing_speech.push(fragment.to_string());
        self
    }

    pub fn with_transcript(mut self, transcript: &str) -> Self {
        self.transcript = transcript.to_string();
        self
    }

    pub fn image_prompts(&self) -> Vec<String> {
        self.image_prompts.lock().unwrap().clone()
    }

    pub fn speech_inputs(&self) -> Vec<String> {
        self.speech_inputs.lock().unwrap().clone()
    }

    pub fn transcriptions(&self) -> Vec<AudioPayload> {
        self.transcriptions.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaGateway for FakeMedia {
    async fn generate_image(&self, prompt: &str) -> Result<Option<String>, GatewayError> {
        let call = {
            let mut prompts = self.image_prompts.lock().unwrap();
            prompts.push(prompt.to_string());
            prompts.len()
        };
        match self.images.lock().unwrap().pop_front() {
            Some(result) => result.map_err(GatewayError::Other),
            None => Ok(Some(format!("https://images.test/{call}.png"))),
        }
    }

    async fn synthesize_speech(&self, text: &str) -> Result<String, GatewayError> {
        self.speech_inputs.lock().unwrap().push(text.to_string());
        if self
            .failing_speech
            .iter()
            .any(|fragment| text.contains(fragment.as_str()))
        {
            return Err(GatewayError::Other(format!("speech failed for {text}")));
        }
        Ok(format!("audio://{text}"))
    }

    async fn transcribe(&self, audio: AudioPayload) -> Result<String, GatewayError> {
        self.transcriptions.lock().unwrap().push(audio);
        Ok(self.transcript.clone())
    }
}

pub fn orchestrator_with(
    inference: &Arc<ScriptedInference>,
    media: &Arc<FakeMedia>,
) -> FeedbackOrchestrator {
    FeedbackOrchestrator::new(inference.clone(), media.clone())
}
