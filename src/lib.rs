//! Repcoach is a terminal fitness coach built on top of a remote LLM API.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the conversation state, the five-stage feedback pipeline,
//!   directive extraction, configuration, and credential resolution.
//! - [`api`] defines the chat, image, speech, and transcription payloads
//!   exchanged with OpenAI-compatible endpoints.
//! - [`cli`] parses arguments and renders conversation state in the terminal.
//! - [`utils`] holds logging setup and media reference helpers.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`], which wires an [`core::openai::OpenAiClient`]
//! into a [`core::orchestrator::FeedbackOrchestrator`] and drives it through a
//! [`core::conversation::ConversationStore`].

pub mod api;
pub mod cli;
pub mod core;
pub mod utils;
