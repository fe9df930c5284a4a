//! RedBook Bird launch gate.
//!
//! On every cold start the app decides whether to show its normal tab
//! interface or a web destination resolved through an attribution endpoint.
//!
//! # Architecture
//!
//! - `permissions`: push-notification and ad-tracking prompts, once per process
//! - `flags`: remote boolean flag with a safe `false` default
//! - `metrics`: attribution endpoint client
//! - `tracking_url`: pure destination URL construction
//! - `store`: single persisted destination slot
//! - `flow`: the controller that sequences all of the above
//! - `platform`: headless permission answers for the binary and CI
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use redbook_launch::core::config::AppConfig;
//! use redbook_launch::flags::{HttpRemoteConfig, RemoteFlagFetcher};
//! use redbook_launch::flow::{AttributionFlowController, FlowSettings};
//! use redbook_launch::metrics::HttpMetricsClient;
//! use redbook_launch::permissions::PermissionGateway;
//! use redbook_launch::platform::HeadlessPlatform;
//! use redbook_launch::store::FileDestinationStore;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     redbook_launch::setup_logging();
//!
//!     let config = AppConfig::from_env()?;
//!     let platform = Arc::new(HeadlessPlatform::from_env()?);
//!     let flow = Arc::new(AttributionFlowController::new(
//!         Arc::new(PermissionGateway::new(platform.clone(), platform)),
//!         Arc::new(RemoteFlagFetcher::new(
//!             Arc::new(HttpRemoteConfig::new(reqwest::Client::new(), &config.remote_config_url)),
//!             config.flag_timeout,
//!         )),
//!         Arc::new(HttpMetricsClient::new(&config.metrics_url, config.metrics_timeout)?),
//!         Arc::new(FileDestinationStore::new(&config.store_path)),
//!         FlowSettings::from_config(&config),
//!     ));
//!
//!     let decision = flow.spawn().await?;
//!     println!("{decision:?}");
//!     Ok(())
//! }
//! ```
pub mod core;
pub mod errors;
pub mod flags;
pub mod flow;
pub mod metrics;
pub mod permissions;
pub mod platform;
pub mod store;
pub mod tracking_url;

/// Configure structured JSON logging, filtered by `RUST_LOG` (default `info`).
///
/// Calling it more than once is harmless; only the first call installs a subscriber.
///
/// # Example
///
/// ```
/// redbook_launch::setup_logging();
/// ```
pub fn setup_logging() {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().json().with_target(true);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}
