//! The five-stage feedback pipeline.
//!
//! Every submission runs the same linear sequence: analysis, plan creation,
//! image generation, audio generation, suggestions. Only the analysis call is
//! required; every later stage degrades to an absent field on failure so the
//! user still gets a coherent, partial answer.

use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::core::extract::{
    classify_response, clean_speech_text, extract_directive, extract_workout_plan, first_line,
    motivational_subject, parse_suggestions, sanitize_image_subject, Directive,
};
use crate::core::gateway::{CompletionRequest, GatewayError, InferenceGateway, MediaGateway};
use crate::core::message::{InputKind, StructuredResponse};
use crate::core::processing::ProcessingStep;
use crate::core::prompts::{
    exercise_image_prompt, motivation_user_prompt, motivational_image_prompt,
    ANALYSIS_MAX_TOKENS, COACH_SYSTEM_PROMPT, FALLBACK_MOTIVATION, MOTIVATION_MAX_TOKENS,
    MOTIVATION_SYSTEM_PROMPT, SUGGESTIONS_MAX_TOKENS, SUGGESTIONS_SYSTEM_PROMPT,
};

/// Receives the active stage, then `None` once the run settles.
pub type StepListener<'a> = &'a (dyn Fn(Option<ProcessingStep>) + Send + Sync);

#[derive(Debug)]
pub enum ProcessError {
    /// The initial analysis completion failed; nothing can be built without it.
    Analysis(GatewayError),
}

impl fmt::Display for ProcessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessError::Analysis(err) => write!(f, "Initial analysis failed: {err}"),
        }
    }
}

impl Error for ProcessError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ProcessError::Analysis(err) => Some(err),
        }
    }
}

#[derive(Clone)]
pub struct FeedbackOrchestrator {
    inference: Arc<dyn InferenceGateway>,
    media: Arc<dyn MediaGateway>,
    step_delay: Duration,
}

impl FeedbackOrchestrator {
    pub fn new(inference: Arc<dyn InferenceGateway>, media: Arc<dyn MediaGateway>) -> Self {
        Self {
            inference,
            media,
            step_delay: Duration::ZERO,
        }
    }

    /// Pauses after each step notification so progress stays visible.
    pub fn with_step_delay(mut self, step_delay: Duration) -> Self {
        self.step_delay = step_delay;
        self
    }

    pub fn media(&self) -> &Arc<dyn MediaGateway> {
        &self.media
    }

    pub async fn process(
        &self,
        content: &str,
        input: InputKind,
        on_step: StepListener<'_>,
    ) -> Result<StructuredResponse, ProcessError> {
        info!(input = %input, chars = content.len(), "Processing submission");

        self.enter(ProcessingStep::InitialAnalysis, on_step).await;
        let raw = match self.analyze(content).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!(error = %err, "Initial analysis failed");
                on_step(None);
                return Err(ProcessError::Analysis(err));
            }
        };
        debug!(raw = %raw, "Analysis response received");

        let mut response = StructuredResponse::new(classify_response(&raw));
        response.text = Some(first_line(&raw).to_string());

        self.enter(ProcessingStep::PlanCreation, on_step).await;
        response.workout = extract_workout_plan(&raw);
        match &response.workout {
            Some(items) => debug!(items = items.len(), "Workout plan parsed"),
            None => debug!("No usable workout plan"),
        }

        self.enter(ProcessingStep::ImageGeneration, on_step).await;
        response.image_url = self.image_for(&raw).await;

        self.enter(ProcessingStep::AudioGeneration, on_step).await;
        response.audio_url = self.audio_for(&raw).await;

        self.enter(ProcessingStep::Suggestions, on_step).await;
        response.suggestions = self.suggestions_for(&raw).await;

        on_step(None);
        info!(kind = response.kind.as_str(), "Submission processed");
        Ok(response)
    }

    async fn enter(&self, step: ProcessingStep, on_step: StepListener<'_>) {
        debug!(step = %step, "Entering processing step");
        on_step(Some(step));
        if !self.step_delay.is_zero() {
            tokio::time::sleep(self.step_delay).await;
        }
    }

    async fn analyze(&self, content: &str) -> Result<String, GatewayError> {
        let request = CompletionRequest::new(COACH_SYSTEM_PROMPT, content)
            .with_max_tokens(ANALYSIS_MAX_TOKENS);
        self.inference.complete(request).await
    }

    async fn image_for(&self, raw: &str) -> Option<String> {
        let subject = extract_directive(raw, Directive::Image)
            .map(|prompt| sanitize_image_subject(&prompt))
            .filter(|subject| !subject.is_empty());

        if let Some(subject) = subject {
            match self.media.generate_image(&exercise_image_prompt(&subject)).await {
                Ok(Some(url)) => return Some(url),
                Ok(None) => warn!(subject = %subject, "Exercise image had no usable reference"),
                Err(err) => warn!(error = %err, subject = %subject, "Exercise image failed"),
            }
        }

        let subject = motivational_subject(raw);
        info!(subject = %subject, "Falling back to motivational image");
        match self.media.generate_image(&motivational_image_prompt(&subject)).await {
            Ok(Some(url)) => Some(url),
            Ok(None) => {
                warn!("Motivational image had no usable reference");
                None
            }
            Err(err) => {
                warn!(error = %err, "Motivational image failed");
                None
            }
        }
    }

    /// Synthesizes the directive's instruction and, independently, a fresh
    /// motivational line. The motivational audio is only kept when the
    /// instruction audio is missing.
    async fn audio_for(&self, raw: &str) -> Option<String> {
        let mut audio_url = None;

        let instruction = extract_directive(raw, Directive::Audio)
            .map(|prompt| clean_speech_text(&prompt))
            .filter(|text| !text.is_empty());
        if let Some(instruction) = instruction {
            match self.media.synthesize_speech(&instruction).await {
                Ok(url) => audio_url = Some(url),
                Err(err) => warn!(error = %err, "Instruction audio failed"),
            }
        }

        match self.motivation_audio(raw).await {
            Ok(url) if audio_url.is_none() => audio_url = Some(url),
            Ok(_) => debug!("Discarding motivational audio; instruction audio already present"),
            Err(err) => warn!(error = %err, "Motivational audio failed"),
        }

        audio_url
    }

    async fn motivation_audio(&self, raw: &str) -> Result<String, GatewayError> {
        let request = CompletionRequest::new(MOTIVATION_SYSTEM_PROMPT, motivation_user_prompt(raw))
            .with_max_tokens(MOTIVATION_MAX_TOKENS);
        let motivation = self.inference.complete(request).await?;
        let line = if motivation.trim().is_empty() {
            FALLBACK_MOTIVATION.to_string()
        } else {
            motivation
        };
        self.media.synthesize_speech(&clean_speech_text(&line)).await
    }

    async fn suggestions_for(&self, raw: &str) -> Option<Vec<String>> {
        let request = CompletionRequest::new(SUGGESTIONS_SYSTEM_PROMPT, raw)
            .with_max_tokens(SUGGESTIONS_MAX_TOKENS);
        let reply = match self.inference.complete(request).await {
            Ok(reply) => reply,
            Err(err) => {
                warn!(error = %err, "Suggestions request failed");
                return None;
            }
        };

        let reply = if reply.trim().is_empty() {
            "[]".to_string()
        } else {
            reply
        };
        let suggestions = parse_suggestions(&reply);
        if suggestions.is_none() {
            debug!(reply = %reply, "Suggestions reply was not a JSON array");
        }
        suggestions
    }
}
