pub mod config;
pub mod conversation;
pub mod credentials;
pub mod extract;
pub mod gateway;
pub mod keyring;
pub mod message;
pub mod openai;
pub mod orchestrator;
pub mod processing;
pub mod prompts;
