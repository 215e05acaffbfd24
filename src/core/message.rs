use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub const APOLOGY_TEXT: &str = "Sorry, there was an error processing your request.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }

    pub fn is_user(self) -> bool {
        self == MessageRole::User
    }

    pub fn is_assistant(self) -> bool {
        self == MessageRole::Assistant
    }
}

impl TryFrom<&str> for MessageRole {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            _ => Err(format!("invalid message role: {value}")),
        }
    }
}

impl TryFrom<String> for MessageRole {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl From<MessageRole> for String {
    fn from(value: MessageRole) -> Self {
        value.as_str().to_string()
    }
}

/// How the user produced a submission. Transcribed voice input is still
/// plain text by the time it reaches the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    Text,
    Audio,
}

impl InputKind {
    pub fn as_str(self) -> &'static str {
        match self {
            InputKind::Text => "text",
            InputKind::Audio => "audio",
        }
    }
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    Feedback,
    Training,
    Question,
}

impl ResponseKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ResponseKind::Feedback => "feedback",
            ResponseKind::Training => "training",
            ResponseKind::Question => "question",
        }
    }
}

/// A plan quantity as the model wrote it: a whole count, a decimal, or free
/// text such as "8-12" or "60kg".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Amount {
    Count(u64),
    Decimal(f64),
    Text(String),
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Amount::Count(count) => write!(f, "{count}"),
            Amount::Decimal(value) => write!(f, "{value}"),
            Amount::Text(text) => f.write_str(text),
        }
    }
}

/// One machine in a workout plan. Only `machine` is required; the other
/// fields accept numbers, strings or null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutItem {
    pub machine: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sets: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reps: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl WorkoutItem {
    pub fn is_valid(&self) -> bool {
        !self.machine.trim().is_empty()
    }
}

/// The assembled multi-modal result of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredResponse {
    #[serde(rename = "type")]
    pub kind: ResponseKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workout: Option<Vec<WorkoutItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<String>>,
}

impl StructuredResponse {
    pub fn new(kind: ResponseKind) -> Self {
        Self {
            kind,
            text: None,
            workout: None,
            image_url: None,
            audio_url: None,
            suggestions: None,
        }
    }

    pub fn apology() -> Self {
        Self {
            text: Some(APOLOGY_TEXT.to_string()),
            ..Self::new(ResponseKind::Feedback)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<StructuredResponse>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: new_message_id(),
            role: MessageRole::User,
            content: content.into(),
            timestamp: Utc::now(),
            response: None,
        }
    }

    pub fn assistant(response: StructuredResponse) -> Self {
        Self {
            id: new_message_id(),
            role: MessageRole::Assistant,
            content: response.text.clone().unwrap_or_default(),
            timestamp: Utc::now(),
            response: Some(response),
        }
    }

    pub fn is_user(&self) -> bool {
        self.role.is_user()
    }

    pub fn is_assistant(&self) -> bool {
        self.role.is_assistant()
    }
}

/// Random UUIDv4 in canonical text form.
pub fn new_message_id() -> String {
    Uuid::new_v4().to_string()
}
