use std::error::Error;
use std::fmt;

use keyring::Entry;

pub const KEYRING_SERVICE: &str = "repcoach";
pub const KEYRING_USER: &str = "openai";

/// Describes failures when attempting to access the system keyring.
///
/// Recoverable errors indicate that the credential backend was
/// temporarily unavailable (for example when the keychain service is
/// locked or inaccessible). Permanent errors surface the underlying
/// cause directly so callers can report them to the user.
#[derive(Debug)]
pub enum KeyringAccessError {
    Recoverable(keyring::Error),
    Permanent(keyring::Error),
}

impl KeyringAccessError {
    fn inner(&self) -> &keyring::Error {
        match self {
            KeyringAccessError::Recoverable(err) | KeyringAccessError::Permanent(err) => err,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(self, KeyringAccessError::Recoverable(_))
    }
}

impl From<keyring::Error> for KeyringAccessError {
    fn from(err: keyring::Error) -> Self {
        match err {
            keyring::Error::PlatformFailure(_) | keyring::Error::NoStorageAccess(_) => {
                KeyringAccessError::Recoverable(err)
            }
            other => KeyringAccessError::Permanent(other),
        }
    }
}

impl fmt::Display for KeyringAccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner())
    }
}

impl Error for KeyringAccessError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.inner())
    }
}

fn entry() -> Result<Entry, KeyringAccessError> {
    Ok(Entry::new(KEYRING_SERVICE, KEYRING_USER)?)
}

pub fn store_api_key(api_key: &str) -> Result<(), KeyringAccessError> {
    entry()?.set_password(api_key)?;
    Ok(())
}

/// Returns `Ok(None)` when no key has been stored yet.
pub fn read_api_key() -> Result<Option<String>, KeyringAccessError> {
    match entry()?.get_password() {
        Ok(key) => Ok(Some(key)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Returns whether a stored key was actually removed.
pub fn delete_api_key() -> Result<bool, KeyringAccessError> {
    match entry()?.delete_credential() {
        Ok(()) => Ok(true),
        Err(keyring::Error::NoEntry) => Ok(false),
        Err(err) => Err(err.into()),
    }
}
