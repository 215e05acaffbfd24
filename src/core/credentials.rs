//! API key resolution: environment first, then the system keyring.

use std::error::Error;
use std::fmt;

use tracing::{debug, warn};

use crate::core::keyring::{read_api_key, KeyringAccessError};

pub const API_KEY_ENV_VAR: &str = "OPENAI_API_KEY";

const QUICK_FIXES: &[&str] = &[
    "repcoach auth                          # Store an OpenAI API key in the keyring",
    "export OPENAI_API_KEY=\"sk-...\"         # Or provide the key through the environment",
    "repcoach set base-url <url>            # Point at an OpenAI-compatible endpoint",
];

#[derive(Debug)]
pub struct CredentialError {
    message: String,
    quick_fixes: &'static [&'static str],
    exit_code: i32,
}

impl CredentialError {
    pub fn missing() -> Self {
        Self {
            message: "❌ No API key found in OPENAI_API_KEY or the system keyring".to_string(),
            quick_fixes: QUICK_FIXES,
            exit_code: 2,
        }
    }

    pub fn keyring(err: &KeyringAccessError) -> Self {
        Self {
            message: format!("❌ Could not read the API key from the system keyring: {err}"),
            quick_fixes: QUICK_FIXES,
            exit_code: 2,
        }
    }

    pub fn quick_fixes(&self) -> &'static [&'static str] {
        self.quick_fixes
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for CredentialError {}

/// Picks the API key from an explicit environment value or a keyring lookup.
pub fn resolve_api_key_with<F>(env_value: Option<String>, keyring: F) -> Result<String, CredentialError>
where
    F: FnOnce() -> Result<Option<String>, KeyringAccessError>,
{
    if let Some(key) = env_value.filter(|key| !key.trim().is_empty()) {
        debug!("Using API key from {API_KEY_ENV_VAR}");
        return Ok(key.trim().to_string());
    }

    match keyring() {
        Ok(Some(key)) if !key.trim().is_empty() => {
            debug!("Using API key from system keyring");
            Ok(key.trim().to_string())
        }
        Ok(_) => Err(CredentialError::missing()),
        Err(err) => {
            warn!(error = %err, recoverable = err.is_recoverable(), "Keyring lookup failed");
            Err(CredentialError::keyring(&err))
        }
    }
}

pub fn resolve_api_key() -> Result<String, CredentialError> {
    resolve_api_key_with(std::env::var(API_KEY_ENV_VAR).ok(), read_api_key)
}
