//! Keychain storage for pipeline secrets.
//!
//! Uses the system keychain (macOS Keychain, Linux Secret Service, Windows Credential Manager).

use crate::{Error, Result};
use keyring::Entry;

const SERVICE_NAME: &str = "liftoff";

fn keyring_error(e: keyring::Error) -> Error {
    Error::keychain_unavailable(e.to_string())
}

fn entry(scope: &str, key: &str) -> Result<Entry> {
    let account = format!("{}:{}", scope, key);
    Entry::new(SERVICE_NAME, &account).map_err(keyring_error)
}

/// Stores a secret under `<scope>:<key>`.
pub fn store(scope: &str, key: &str, value: &str) -> Result<()> {
    entry(scope, key)?.set_password(value).map_err(keyring_error)
}

/// Retrieves a secret. Returns `None` if the entry doesn't exist.
pub fn get(scope: &str, key: &str) -> Result<Option<String>> {
    match entry(scope, key)?.get_password() {
        Ok(value) => Ok(Some(value)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(keyring_error(e)),
    }
}

pub fn delete(scope: &str, key: &str) -> Result<()> {
    match entry(scope, key)?.delete_credential() {
        Ok(()) => Ok(()),
        Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(keyring_error(e)),
    }
}
