//! # Process Configuration
//!
//! Settings shared by every stage of the pipeline: where raw pages live, where
//! passages live and how to reach the LLM. They are read from the environment
//! exactly once at process start and then passed to each stage explicitly.
//!
//! | Variable                       | Default                 |
//! |--------------------------------|-------------------------|
//! | `SITECHAT_OBJECT_DIR`          | `.sitechat/objects`     |
//! | `SITECHAT_BUCKET`              | `sitechat`              |
//! | `SITECHAT_DATABASE_URL`        | `.sitechat/passages.db` |
//! | `SITECHAT_DATABASE_TOKEN`      | unset                   |
//! | `GEMINI_API_KEY`               | unset                   |
//! | `SITECHAT_MODEL`               | `gemini-2.0-flash`      |
//! | `SITECHAT_REQUESTS_PER_MINUTE` | `30`                    |

use std::path::PathBuf;

use crate::error::{Error, Result};

/// Location of the object store bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectStoreConfig {
    /// Root directory that holds the buckets
    pub root: PathBuf,

    /// Bucket name
    pub bucket: String,
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(".sitechat/objects"),
            bucket: "sitechat".to_string(),
        }
    }
}

/// Location of the document store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentStoreConfig {
    /// Local database path or remote libsql URL
    pub url: String,

    /// Auth token for remote databases
    pub auth_token: Option<String>,
}

impl Default for DocumentStoreConfig {
    fn default() -> Self {
        Self {
            url: ".sitechat/passages.db".to_string(),
            auth_token: None,
        }
    }
}

impl DocumentStoreConfig {
    /// Whether the URL points at a remote database
    pub fn is_remote(&self) -> bool {
        ["libsql://", "http://", "https://"]
            .iter()
            .any(|scheme| self.url.starts_with(scheme))
    }
}

/// LLM provider settings
#[derive(Clone, PartialEq, Eq)]
pub struct LlmConfig {
    /// API key for the provider
    pub api_key: Option<String>,

    /// Completion model name
    pub model: String,

    /// Completion requests allowed per minute
    pub requests_per_minute: u32,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("requests_per_minute", &self.requests_per_minute)
            .finish()
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-2.0-flash".to_string(),
            requests_per_minute: 30,
        }
    }
}

impl LlmConfig {
    /// The API key, or a configuration error naming the variable to set
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| Error::Config("GEMINI_API_KEY environment variable must be set".into()))
    }
}

/// Process-wide settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub object_store: ObjectStoreConfig,
    pub document_store: DocumentStoreConfig,
    pub llm: LlmConfig,
}

impl Settings {
    /// Load settings from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load settings from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let mut settings = Settings::default();

        if let Some(root) = get("SITECHAT_OBJECT_DIR") {
            settings.object_store.root = PathBuf::from(root);
        }
        if let Some(bucket) = get("SITECHAT_BUCKET") {
            settings.object_store.bucket = bucket;
        }
        if let Some(url) = get("SITECHAT_DATABASE_URL") {
            settings.document_store.url = url;
        }
        settings.document_store.auth_token = get("SITECHAT_DATABASE_TOKEN");
        settings.llm.api_key = get("GEMINI_API_KEY");
        if let Some(model) = get("SITECHAT_MODEL") {
            settings.llm.model = model;
        }
        if let Some(rpm) = get("SITECHAT_REQUESTS_PER_MINUTE") {
            settings.llm.requests_per_minute = rpm.parse().map_err(|_| {
                Error::Config(format!("SITECHAT_REQUESTS_PER_MINUTE is not a number: {rpm}"))
            })?;
            if settings.llm.requests_per_minute == 0 {
                return Err(Error::Config(
                    "SITECHAT_REQUESTS_PER_MINUTE must be greater than zero".into(),
                ));
            }
        }

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_when_environment_is_empty() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings, Settings::default());
        assert!(settings.llm.require_api_key().is_err());
        assert!(!settings.document_store.is_remote());
    }

    #[test]
    fn test_environment_overrides() {
        let settings = Settings::from_lookup(lookup(&[
            ("SITECHAT_OBJECT_DIR", "/data/minio"),
            ("SITECHAT_BUCKET", "pages"),
            ("SITECHAT_DATABASE_URL", "libsql://passages.example.io"),
            ("SITECHAT_DATABASE_TOKEN", "secret"),
            ("GEMINI_API_KEY", "key"),
            ("SITECHAT_REQUESTS_PER_MINUTE", "120"),
        ]))
        .unwrap();

        assert_eq!(settings.object_store.root, PathBuf::from("/data/minio"));
        assert_eq!(settings.object_store.bucket, "pages");
        assert!(settings.document_store.is_remote());
        assert_eq!(settings.document_store.auth_token.as_deref(), Some("secret"));
        assert_eq!(settings.llm.require_api_key().unwrap(), "key");
        assert_eq!(settings.llm.requests_per_minute, 120);
    }

    #[test]
    fn test_blank_values_are_ignored() {
        let settings = Settings::from_lookup(lookup(&[("SITECHAT_BUCKET", "  ")])).unwrap();
        assert_eq!(settings.object_store.bucket, "sitechat");
    }

    #[test]
    fn test_invalid_rate_is_rejected() {
        assert!(Settings::from_lookup(lookup(&[("SITECHAT_REQUESTS_PER_MINUTE", "fast")])).is_err());
        assert!(Settings::from_lookup(lookup(&[("SITECHAT_REQUESTS_PER_MINUTE", "0")])).is_err());
    }

    #[test]
    fn test_api_key_is_redacted_in_debug_output() {
        let llm = LlmConfig {
            api_key: Some("super-secret".into()),
            ..Default::default()
        };
        let printed = format!("{:?}", llm);
        assert!(!printed.contains("super-secret"));
        assert!(printed.contains("<redacted>"));
    }
}
