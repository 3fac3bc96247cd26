//! Map credential storage.
//!
//! The map view needs an access token. It is kept in a small JSON file in
//! the user's config directory under the `mapbox_token` key, so it survives
//! between sessions.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::errors::SpeedTestError;

const APP_DIR: &str = "speedstream";
const CREDENTIALS_FILE: &str = "credentials.json";

/// On-disk layout of the credentials file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Credentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mapbox_token: Option<String>,
}

/// Persistent key/value store for the map token.
pub trait CredentialStore: Send + Sync {
    /// The stored token, if any.
    fn load(&self) -> Result<Option<String>, SpeedTestError>;

    fn save(&self, token: &str) -> Result<(), SpeedTestError>;

    fn clear(&self) -> Result<(), SpeedTestError>;

    /// Where the token lives, for display.
    fn describe(&self) -> String;
}

/// [`CredentialStore`] backed by a JSON file.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/speedstream/credentials.json`
    pub fn default_location() -> Result<Self, SpeedTestError> {
        let dir = dirs::config_dir().ok_or_else(|| {
            SpeedTestError::storage("could not determine the config directory")
        })?;

        Ok(Self::new(dir.join(APP_DIR).join(CREDENTIALS_FILE)))
    }

    #[cfg(test)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Credentials, SpeedTestError> {
        if !self.path.exists() {
            debug!("No credentials file at {}", self.path.display());
            return Ok(Credentials::default());
        }

        let contents = fs::read_to_string(&self.path).map_err(|e| {
            SpeedTestError::storage(format!(
                "could not read {}",
                self.path.display()
            ))
            .with_source(e)
        })?;

        if contents.trim().is_empty() {
            return Ok(Credentials::default());
        }

        serde_json::from_str(&contents).map_err(|e| {
            SpeedTestError::storage(format!(
                "{} is not valid JSON",
                self.path.display()
            ))
            .with_suggestion("Delete the file and enter the token again.")
            .with_source(e)
        })
    }

    fn write(&self, credentials: &Credentials) -> Result<(), SpeedTestError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SpeedTestError::storage(format!(
                    "could not create {}",
                    parent.display()
                ))
                .with_source(e)
            })?;
        }

        let json = serde_json::to_string_pretty(credentials).map_err(|e| {
            SpeedTestError::storage("could not encode credentials").with_source(e)
        })?;

        fs::write(&self.path, json).map_err(|e| {
            SpeedTestError::storage(format!(
                "could not write {}",
                self.path.display()
            ))
            .with_source(e)
        })?;

        restrict_permissions(&self.path);
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
        debug!("Could not restrict {}: {}", path.display(), e);
    }
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) {}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<String>, SpeedTestError> {
        Ok(self
            .read()?
            .mapbox_token
            .filter(|token| !token.trim().is_empty()))
    }

    fn save(&self, token: &str) -> Result<(), SpeedTestError> {
        let mut credentials = self.read().unwrap_or_default();
        credentials.mapbox_token = Some(token.to_string());
        self.write(&credentials)?;

        info!("Saved map token to {}", self.path.display());
        Ok(())
    }

    fn clear(&self) -> Result<(), SpeedTestError> {
        if !self.path.exists() {
            return Ok(());
        }

        let mut credentials = self.read().unwrap_or_default();
        credentials.mapbox_token = None;
        self.write(&credentials)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Session-only store, used when no config directory is available.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    token: Mutex<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn with_token(token: impl Into<String>) -> Self {
        Self { token: Mutex::new(Some(token.into())) }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Option<String>, SpeedTestError> {
        Ok(self
            .token
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone())
    }

    fn save(&self, token: &str) -> Result<(), SpeedTestError> {
        *self.token.lock().unwrap_or_else(|e| e.into_inner()) =
            Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), SpeedTestError> {
        *self.token.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }

    fn describe(&self) -> String {
        "memory (this session only)".to_string()
    }
}
