//! Credential lookup for the connection handshake.
//!
//! The deployment authenticates a socket with the session id the browser
//! keeps in its cookie jar. Here the jar is a plain `name=value; ...` string,
//! taken from the command line or read from a file.

use std::path::{Path, PathBuf};

/// Source of named out-of-band credentials.
pub trait CredentialSource {
    /// Look up a credential by name. `None` when absent.
    fn credential(&self, name: &str) -> Option<String>;
}

impl<F> CredentialSource for F
where
    F: Fn(&str) -> Option<String>,
{
    fn credential(&self, name: &str) -> Option<String> {
        self(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("failed to read cookie file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Parsed cookie string.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CookieJar {
    entries: Vec<(String, String)>,
}

impl CookieJar {
    /// Parse `name=value` pairs separated by `;`.
    ///
    /// Names and values are trimmed. Entries without `=` are skipped.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let entries = raw
            .split(';')
            .filter_map(|entry| entry.split_once('='))
            .map(|(name, value)| (name.trim().to_owned(), value.trim().to_owned()))
            .filter(|(name, _)| !name.is_empty())
            .collect();
        Self { entries }
    }

    /// Read and parse a cookie file.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Read`] if the file cannot be read.
    pub async fn load(path: &Path) -> Result<Self, CredentialError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| CredentialError::Read {
                path: path.to_owned(),
                source,
            })?;
        Ok(Self::parse(&raw))
    }

    /// First value stored under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CredentialSource for CookieJar {
    fn credential(&self, name: &str) -> Option<String> {
        self.get(name).map(ToOwned::to_owned)
    }
}

#[cfg(test)]
#[path = "credentials_test.rs"]
mod tests;
