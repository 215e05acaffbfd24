//! Pure helpers that pull structured data out of free-form model output.
//!
//! The coach prompt asks the model to answer with a greeting line followed by
//! marker-prefixed directives:
//!
//! ```text
//! Great question!
//! GENERATE_IMAGE: squat form
//! WORKOUT_PLAN: [{"machine":"Leg Press","number":4,"sets":3,"reps":"8-12","weight":"60kg"}]
//! GENERATE_AUDIO: Keep your back straight
//! ```
//!
//! Models drift from that format often, so everything here is tolerant: a
//! missing marker yields `None`, and malformed JSON yields the caller's
//! fallback instead of an error.

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::warn;

use crate::core::message::{ResponseKind, WorkoutItem};

pub const DEFAULT_MOTIVATIONAL_SUBJECT: &str = "fitness workout";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    Image,
    WorkoutPlan,
    Audio,
}

impl Directive {
    pub fn marker(self) -> &'static str {
        match self {
            Directive::Image => "GENERATE_IMAGE:",
            Directive::WorkoutPlan => "WORKOUT_PLAN:",
            Directive::Audio => "GENERATE_AUDIO:",
        }
    }

    fn pattern(self) -> &'static Regex {
        match self {
            Directive::Image => &IMAGE_DIRECTIVE,
            Directive::WorkoutPlan => &PLAN_DIRECTIVE,
            Directive::Audio => &AUDIO_DIRECTIVE,
        }
    }
}

fn line_directive(marker: &str) -> Regex {
    Regex::new(&format!(r"{}\s*(.*?)(?:\n|$)", regex::escape(marker)))
        .expect("directive pattern is valid")
}

static IMAGE_DIRECTIVE: LazyLock<Regex> =
    LazyLock::new(|| line_directive(Directive::Image.marker()));
static PLAN_DIRECTIVE: LazyLock<Regex> =
    LazyLock::new(|| line_directive(Directive::WorkoutPlan.marker()));
static AUDIO_DIRECTIVE: LazyLock<Regex> =
    LazyLock::new(|| line_directive(Directive::Audio.marker()));
static WORKOUT_ARRAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"WORKOUT_PLAN:\s*(\[[\s\S]*?\])(?:\n|$)").expect("workout pattern is valid")
});
static JSON_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```json\n?").expect("fence pattern is valid"));
static PLAIN_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```\n?").expect("fence pattern is valid"));
static MOTIVATIONAL_SUBJECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:exercise|training|workout|machine)s?\s+(\w+(?:\s+\w+){0,3})")
        .expect("subject pattern is valid")
});
static UNSAFE_SUBJECT_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^0-9A-Za-z_\s-]").expect("subject filter is valid"));

/// Returns the trimmed text following the first occurrence of the directive's
/// marker, up to the end of that line.
pub fn extract_directive(raw: &str, directive: Directive) -> Option<String> {
    directive
        .pattern()
        .captures(raw)
        .and_then(|captures| captures.get(1))
        .map(|capture| capture.as_str().trim().to_string())
}

/// Returns the bracketed JSON array attached to `WORKOUT_PLAN:`, if any.
pub fn extract_workout_json(raw: &str) -> Option<&str> {
    WORKOUT_ARRAY
        .captures(raw)
        .and_then(|captures| captures.get(1))
        .map(|capture| capture.as_str())
}

/// Strips markdown code fences and parses `text` as JSON, returning
/// `fallback` on any failure.
pub fn parse_json_lenient<T: DeserializeOwned>(text: &str, fallback: T) -> T {
    let without_json_fences = JSON_FENCE.replace_all(text, "");
    let cleaned = PLAIN_FENCE.replace_all(&without_json_fences, "");
    match serde_json::from_str(cleaned.trim()) {
        Ok(value) => value,
        Err(err) => {
            warn!(error = %err, text, "Falling back after JSON parse failure");
            fallback
        }
    }
}

/// Parses the workout plan directive, keeping every item with a machine name.
/// Returns `None` when the directive is missing, malformed, or empty.
pub fn extract_workout_plan(raw: &str) -> Option<Vec<WorkoutItem>> {
    let json = extract_workout_json(raw)?;
    let Value::Array(entries) = parse_json_lenient(json, Value::Null) else {
        return None;
    };

    let items: Vec<WorkoutItem> = entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<WorkoutItem>(entry) {
            Ok(item) if item.is_valid() => Some(item),
            Ok(_) => None,
            Err(err) => {
                warn!(error = %err, "Dropping malformed workout item");
                None
            }
        })
        .collect();

    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

/// Turns a follow-up suggestion reply into display strings. Non-array input
/// yields `None`.
pub fn parse_suggestions(text: &str) -> Option<Vec<String>> {
    let Value::Array(entries) = parse_json_lenient(text, Value::Null) else {
        return None;
    };

    Some(
        entries
            .into_iter()
            .map(|entry| match entry {
                Value::String(text) => text,
                Value::Object(ref map) => match map.get("question").and_then(Value::as_str) {
                    Some(question) => question.to_string(),
                    None => entry.to_string(),
                },
                other => other.to_string(),
            })
            .collect(),
    )
}

pub fn classify_response(raw: &str) -> ResponseKind {
    let lowered = raw.to_lowercase();
    if lowered.contains("machine") || lowered.contains("exercise") {
        ResponseKind::Training
    } else {
        ResponseKind::Question
    }
}

pub fn first_line(raw: &str) -> &str {
    let line = raw.split('\n').next().unwrap_or_default();
    line.strip_suffix('\r').unwrap_or(line)
}

/// Keeps word characters, whitespace and hyphens so the subject is safe to
/// splice into an image prompt.
pub fn sanitize_image_subject(subject: &str) -> String {
    UNSAFE_SUBJECT_CHARS
        .replace_all(subject, "")
        .trim()
        .to_string()
}

/// Picks up to four words following an exercise-related keyword to seed the
/// fallback image prompt.
pub fn motivational_subject(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    MOTIVATIONAL_SUBJECT
        .captures(&lowered)
        .and_then(|captures| captures.get(1))
        .map(|capture| capture.as_str().to_string())
        .unwrap_or_else(|| DEFAULT_MOTIVATIONAL_SUBJECT.to_string())
}

/// Removes bracket placeholders and control characters before speech
/// synthesis.
pub fn clean_speech_text(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .filter(|ch| *ch != '[' && *ch != ']')
        .filter_map(|ch| match ch {
            '\n' | '\r' | '\t' => Some(' '),
            ch if ch.is_control() => None,
            ch => Some(ch),
        })
        .collect();
    cleaned.trim().to_string()
}
