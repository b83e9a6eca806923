//! `preferences.json`: remembered credentials and the tesseract path.
//!
//! File layout:
//!
//! ```json
//! {"api_key": "<base64>", "organization_id": "<base64>", "tesseract_path": "/usr/bin/tesseract"}
//! ```
//!
//! The credential fields are base64-encoded so they are not readable at a
//! glance. This is obscuring, not encryption: anyone with access to the file
//! can decode them.

use crate::config::Credentials;
use crate::error::PipelineError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name inside the application folder.
pub const PREFERENCES_FILE: &str = "preferences.json";

/// Decoded preferences.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Preferences {
    pub credentials: Credentials,
    /// Empty when no path has been chosen.
    pub tesseract_path: String,
}

/// On-disk representation.
#[derive(Debug, Default, Serialize, Deserialize)]
struct PreferencesFile {
    #[serde(default)]
    api_key: String,
    #[serde(default)]
    organization_id: String,
    #[serde(default)]
    tesseract_path: String,
}

/// Default location: `<Documents>/openai_ocr/preferences.json`.
pub fn default_preferences_path() -> PathBuf {
    crate::config::default_app_dir().join(PREFERENCES_FILE)
}

impl Preferences {
    /// Load preferences from `path`. A missing file yields defaults.
    pub async fn load(path: &Path) -> Result<Self, PipelineError> {
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No preferences at {}", path.display());
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(PipelineError::InvalidPreferences {
                    path: path.to_path_buf(),
                    detail: e.to_string(),
                })
            }
        };
        Self::from_json(&raw).map_err(|detail| PipelineError::InvalidPreferences {
            path: path.to_path_buf(),
            detail,
        })
    }

    /// Save preferences to `path`, creating the parent directory if needed.
    ///
    /// Credential fields are trimmed before encoding.
    pub async fn save(&self, path: &Path) -> Result<(), PipelineError> {
        let persist_err = |source| PipelineError::Persistence {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(persist_err)?;
        }
        let json = self
            .to_json()
            .map_err(|e| PipelineError::InvalidPreferences {
                path: path.to_path_buf(),
                detail: format!("could not serialise: {e}"),
            })?;
        tokio::fs::write(path, json).await.map_err(persist_err)?;
        debug!("Saved preferences to {}", path.display());
        Ok(())
    }

    fn from_json(raw: &str) -> Result<Self, String> {
        let file: PreferencesFile = serde_json::from_str(raw).map_err(|e| e.to_string())?;
        Ok(Self {
            credentials: Credentials {
                api_key: decode_field("api_key", &file.api_key)?,
                organization_id: decode_field("organization_id", &file.organization_id)?,
            },
            tesseract_path: file.tesseract_path,
        })
    }

    fn to_json(&self) -> serde_json::Result<String> {
        let file = PreferencesFile {
            api_key: STANDARD.encode(self.credentials.api_key.trim()),
            organization_id: STANDARD.encode(self.credentials.organization_id.trim()),
            tesseract_path: self.tesseract_path.clone(),
        };
        serde_json::to_string(&file)
    }

    /// The tesseract path, if one was saved.
    pub fn tesseract_path(&self) -> Option<PathBuf> {
        if self.tesseract_path.trim().is_empty() {
            None
        } else {
            Some(PathBuf::from(&self.tesseract_path))
        }
    }
}

fn decode_field(name: &str, value: &str) -> Result<String, String> {
    let bytes = STANDARD
        .decode(value.trim())
        .map_err(|e| format!("{name}: invalid base64 ({e})"))?;
    String::from_utf8(bytes).map_err(|e| format!("{name}: not UTF-8 ({e})"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::APP_FOLDER;

    fn sample() -> Preferences {
        Preferences {
            credentials: Credentials::new("sk-abc", "org-xyz"),
            tesseract_path: "/opt/tesseract/bin/tesseract".into(),
        }
    }

    #[test]
    fn credentials_are_base64_on_disk() {
        let json = sample().to_json().unwrap();
        assert!(!json.contains("sk-abc"));
        assert!(json.contains(&STANDARD.encode("sk-abc")));
        assert!(json.contains("/opt/tesseract/bin/tesseract"));
    }

    #[test]
    fn reads_file_written_by_earlier_versions() {
        let raw = format!(
            r#"{{"api_key": "{}", "organization_id": "{}", "tesseract_path": ""}}"#,
            STANDARD.encode("sk-old"),
            STANDARD.encode("org-old")
        );
        let prefs = Preferences::from_json(&raw).unwrap();
        assert_eq!(prefs.credentials, Credentials::new("sk-old", "org-old"));
        assert_eq!(prefs.tesseract_path(), None);
    }

    #[test]
    fn invalid_base64_is_reported() {
        let raw = r#"{"api_key": "not base64!!", "organization_id": "", "tesseract_path": ""}"#;
        let err = Preferences::from_json(raw).unwrap_err();
        assert!(err.contains("api_key"), "got: {err}");
    }

    #[test]
    fn save_trims_credentials() {
        let prefs = Preferences {
            credentials: Credentials::new("  sk-pad  ", "org\n"),
            tesseract_path: String::new(),
        };
        let back = Preferences::from_json(&prefs.to_json().unwrap()).unwrap();
        assert_eq!(back.credentials, Credentials::new("sk-pad", "org"));
    }

    #[tokio::test]
    async fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(APP_FOLDER).join(PREFERENCES_FILE);

        sample().save(&path).await.unwrap();
        let loaded = Preferences::load(&path).await.unwrap();
        assert_eq!(loaded, sample());
    }

    #[tokio::test]
    async fn saved_file_is_never_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PREFERENCES_FILE);

        Preferences::default().save(&path).await.unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw, Preferences::default().to_json().unwrap());
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        for field in ["api_key", "organization_id", "tesseract_path"] {
            assert!(value.get(field).is_some(), "missing {field} in {raw}");
        }
    }

    #[tokio::test]
    async fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Preferences::load(&dir.path().join("absent.json")).await.unwrap();
        assert_eq!(loaded, Preferences::default());
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PREFERENCES_FILE);
        std::fs::write(&path, "{not json").unwrap();
        let err = Preferences::load(&path).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidPreferences { .. }));
    }
}
