//! Attribution endpoint client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use md5::{Digest, Md5};
use tracing::{error, info};

use crate::core::models::MetricsResponse;
use crate::errors::LaunchError;

#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn fetch_metrics(
        &self,
        bundle_id: &str,
        salt: &str,
        advertising_id: Option<&str>,
    ) -> Result<MetricsResponse, LaunchError>;
}

/// Stable installation fingerprint: lowercase hex MD5 of bundle id followed by salt.
#[must_use]
pub fn fingerprint(bundle_id: &str, salt: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(bundle_id.as_bytes());
    hasher.update(salt.as_bytes());
    hex::encode(hasher.finalize())
}

pub struct HttpMetricsClient {
    client: Client,
    endpoint: String,
}

impl HttpMetricsClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, LaunchError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LaunchError::Config(format!("metrics http client: {e}")))?;
        Ok(Self::with_client(client, endpoint))
    }

    pub fn with_client(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    fn query(bundle_id: &str, salt: &str, advertising_id: Option<&str>) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("bundle_id", bundle_id.to_string()),
            ("fingerprint", fingerprint(bundle_id, salt)),
        ];
        if let Some(idfa) = advertising_id {
            query.push(("idfa", idfa.to_string()));
        }
        query
    }
}

#[async_trait]
impl MetricsSource for HttpMetricsClient {
    async fn fetch_metrics(
        &self,
        bundle_id: &str,
        salt: &str,
        advertising_id: Option<&str>,
    ) -> Result<MetricsResponse, LaunchError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&Self::query(bundle_id, salt, advertising_id))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            error!(status = status.as_u16(), "Metrics endpoint returned error status");
            return Err(LaunchError::Network(format!("HTTP {status}")));
        }

        let body = response.text().await?;
        let metrics: MetricsResponse = serde_json::from_str(&body)?;

        info!(
            is_organic = metrics.is_organic,
            parameter_count = metrics.parameters.len(),
            "Metrics response received"
        );
        Ok(metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_stable_and_salted() {
        let a = fingerprint("com.app", "salt");
        assert_eq!(a, fingerprint("com.app", "salt"));
        assert_ne!(a, fingerprint("com.app", "pepper"));
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_fingerprint_known_value() {
        // md5("abc")
        assert_eq!(fingerprint("ab", "c"), "900150983cd24fb0d6963f7d28e17f72");
        assert_eq!(fingerprint("a", "bc"), fingerprint("ab", "c"));
    }

    #[test]
    fn test_query_includes_idfa_only_when_present() {
        let q = HttpMetricsClient::query("com.app", "s", None);
        assert_eq!(q.len(), 2);
        assert_eq!(q[0], ("bundle_id", "com.app".to_string()));

        let q = HttpMetricsClient::query("com.app", "s", Some("IDFA123"));
        assert_eq!(q.last(), Some(&("idfa", "IDFA123".to_string())));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_network_error() {
        let client = HttpMetricsClient::new("http://127.0.0.1:9/metrics", Duration::from_secs(2))
            .unwrap();
        let err = client.fetch_metrics("com.app", "s", None).await.unwrap_err();
        assert!(matches!(err, LaunchError::Network(_)));
    }
}
