//! Plain-text rendering of progress and responses.

use std::path::Path;

use crate::core::config::data::path_display;
use crate::core::message::{ChatMessage, StructuredResponse, WorkoutItem};
use crate::core::processing::ProcessingStep;
use crate::utils::media::describe_reference;

pub fn step_line(step: ProcessingStep) -> String {
    format!(
        "[{}/{}] {}: {}",
        step.index() + 1,
        ProcessingStep::SEQUENCE.len(),
        step.title(),
        step.description()
    )
}

fn workout_line(item: &WorkoutItem) -> String {
    let mut line = match &item.number {
        Some(number) => format!("  {}. {}", number, item.machine),
        None => format!("  - {}", item.machine),
    };
    match (&item.sets, &item.reps) {
        (Some(sets), Some(reps)) => line.push_str(&format!(" - {sets} x {reps}")),
        (Some(sets), None) => line.push_str(&format!(" - {sets} sets")),
        (None, Some(reps)) => line.push_str(&format!(" - {reps} reps")),
        (None, None) => {}
    }
    if let Some(weight) = &item.weight {
        let weight = weight.to_string();
        if !weight.trim().is_empty() {
            line.push_str(&format!(" @ {}", weight.trim()));
        }
    }
    if let Some(notes) = item.notes.as_deref().filter(|notes| !notes.trim().is_empty()) {
        line.push_str(&format!(" ({})", notes.trim()));
    }
    line
}

/// Renders every present field; `saved_audio` replaces the audio description
/// when the clip was written to disk.
pub fn render_response(response: &StructuredResponse, saved_audio: Option<&Path>) -> String {
    let mut out = Vec::new();

    if let Some(text) = response.text.as_deref() {
        out.push(text.to_string());
    }

    if let Some(workout) = &response.workout {
        out.push(String::new());
        out.push("Workout plan:".to_string());
        out.extend(workout.iter().map(workout_line));
    }

    if let Some(image) = response.image_url.as_deref() {
        out.push(String::new());
        out.push(format!("Image: {image}"));
    }

    if let Some(audio) = response.audio_url.as_deref() {
        let shown = match saved_audio {
            Some(path) => path_display(path),
            None => describe_reference(audio),
        };
        out.push(format!("Audio: {shown}"));
    }

    if let Some(suggestions) = response.suggestions.as_ref().filter(|s| !s.is_empty()) {
        out.push(String::new());
        out.push("You could ask next:".to_string());
        out.extend(
            suggestions
                .iter()
                .enumerate()
                .map(|(index, suggestion)| format!("  {}) {}", index + 1, suggestion)),
        );
    }

    out.join("\n")
}

/// Oldest-first transcript of a newest-first history.
pub fn render_history(messages: &[ChatMessage]) -> String {
    if messages.is_empty() {
        return "(no messages yet)".to_string();
    }
    messages
        .iter()
        .rev()
        .map(|message| {
            format!(
                "[{}] {}: {}",
                message.timestamp.format("%H:%M:%S"),
                message.role.as_str(),
                message.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
