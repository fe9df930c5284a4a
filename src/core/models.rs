use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// Reserved metrics parameter that becomes a path segment instead of a query pair.
pub const SUB_ID_PATH_KEY: &str = "sub_id_2";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFlagResult {
    pub enabled: bool,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PermissionOutcome {
    pub notifications_granted: bool,
    pub tracking_authorized: bool,
    pub advertising_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsResponse {
    pub is_organic: bool,
    #[serde(rename = "URL", alias = "url")]
    pub url: String,
    #[serde(default)]
    pub parameters: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedDestination {
    pub url: Url,
    pub saved_at: DateTime<Utc>,
}

impl ResolvedDestination {
    #[must_use]
    pub fn new(url: Url) -> Self {
        Self {
            url,
            saved_at: Utc::now(),
        }
    }
}

/// What the presentation layer should render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", content = "url", rename_all = "snake_case")]
pub enum FlowDecision {
    Pending,
    ShowApplication,
    ShowDestination(Url),
}

impl FlowDecision {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, FlowDecision::Pending)
    }
}
