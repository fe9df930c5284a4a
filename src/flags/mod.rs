//! Remote feature flag.
//!
//! The fetcher never fails: transport errors, timeouts, and malformed
//! documents all read as "disabled".

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::Value;
use tracing::{info, warn};

use crate::core::models::FeatureFlagResult;
use crate::errors::LaunchError;

#[async_trait]
pub trait RemoteConfigSource: Send + Sync {
    async fn fetch(&self, key: &str) -> Result<bool, LaunchError>;
}

/// Remote configuration served as a flat JSON document of `key -> value`.
pub struct HttpRemoteConfig {
    client: Client,
    document_url: String,
}

impl HttpRemoteConfig {
    pub fn new(client: Client, document_url: impl Into<String>) -> Self {
        Self {
            client,
            document_url: document_url.into(),
        }
    }
}

#[async_trait]
impl RemoteConfigSource for HttpRemoteConfig {
    async fn fetch(&self, key: &str) -> Result<bool, LaunchError> {
        let response = self
            .client
            .get(&self.document_url)
            .send()
            .await
            .map_err(|e| LaunchError::RemoteFlag(e.to_string()))?
            .error_for_status()
            .map_err(|e| LaunchError::RemoteFlag(e.to_string()))?;

        let document: Value = response
            .json()
            .await
            .map_err(|e| LaunchError::RemoteFlag(format!("document decode: {e}")))?;

        flag_from_document(&document, key)
    }
}

/// Reads `key` from a remote config document. Accepts JSON booleans and the
/// string forms some consoles export.
pub fn flag_from_document(document: &Value, key: &str) -> Result<bool, LaunchError> {
    match document.get(key) {
        Some(Value::Bool(b)) => Ok(*b),
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            other => Err(LaunchError::RemoteFlag(format!(
                "'{key}' is not a boolean: {other}"
            ))),
        },
        Some(other) => Err(LaunchError::RemoteFlag(format!(
            "'{key}' is not a boolean: {other}"
        ))),
        None => Err(LaunchError::RemoteFlag(format!("'{key}' missing"))),
    }
}

pub struct RemoteFlagFetcher {
    source: Arc<dyn RemoteConfigSource>,
    timeout: Duration,
}

impl RemoteFlagFetcher {
    pub fn new(source: Arc<dyn RemoteConfigSource>, timeout: Duration) -> Self {
        Self { source, timeout }
    }

    pub async fn fetch_flag(&self, key: &str) -> FeatureFlagResult {
        let enabled = match tokio::time::timeout(self.timeout, self.source.fetch(key)).await {
            Ok(Ok(enabled)) => enabled,
            Ok(Err(e)) => {
                warn!(flag_key = key, "Remote flag fetch failed, using default: {}", e);
                false
            }
            Err(_) => {
                warn!(
                    flag_key = key,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Remote flag fetch timed out, using default"
                );
                false
            }
        };

        info!(flag_key = key, enabled, "Remote flag resolved");
        FeatureFlagResult {
            enabled,
            fetched_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Fixed(Result<bool, ()>);

    #[async_trait]
    impl RemoteConfigSource for Fixed {
        async fn fetch(&self, _key: &str) -> Result<bool, LaunchError> {
            self.0
                .map_err(|()| LaunchError::RemoteFlag("unreachable".to_string()))
        }
    }

    struct Hanging;

    #[async_trait]
    impl RemoteConfigSource for Hanging {
        async fn fetch(&self, _key: &str) -> Result<bool, LaunchError> {
            std::future::pending().await
        }
    }

    #[test]
    fn test_flag_from_document_accepts_bool_and_strings() {
        let doc = json!({"a": true, "b": "false", "c": "1", "d": " TRUE "});
        assert!(flag_from_document(&doc, "a").unwrap());
        assert!(!flag_from_document(&doc, "b").unwrap());
        assert!(flag_from_document(&doc, "c").unwrap());
        assert!(flag_from_document(&doc, "d").unwrap());
    }

    #[test]
    fn test_flag_from_document_rejects_missing_and_malformed() {
        let doc = json!({"n": 1, "s": "maybe"});
        assert!(flag_from_document(&doc, "missing").is_err());
        assert!(flag_from_document(&doc, "n").is_err());
        assert!(flag_from_document(&doc, "s").is_err());
    }

    #[tokio::test]
    async fn test_fetch_flag_passes_through_success() {
        let fetcher = RemoteFlagFetcher::new(Arc::new(Fixed(Ok(true))), Duration::from_secs(1));
        assert!(fetcher.fetch_flag("k").await.enabled);
    }

    #[tokio::test]
    async fn test_fetch_flag_failure_defaults_to_disabled() {
        let fetcher = RemoteFlagFetcher::new(Arc::new(Fixed(Err(()))), Duration::from_secs(1));
        assert!(!fetcher.fetch_flag("k").await.enabled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_flag_timeout_defaults_to_disabled() {
        let fetcher = RemoteFlagFetcher::new(Arc::new(Hanging), Duration::from_secs(10));
        assert!(!fetcher.fetch_flag("k").await.enabled);
    }
}
