use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{OnceCell, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use url::Url;

use super::state::FlowState;
use crate::core::config::{AppConfig, SPLASH_DISPLAY_DELAY};
use crate::core::models::{FlowDecision, PermissionOutcome};
use crate::errors::LaunchError;
use crate::flags::RemoteFlagFetcher;
use crate::metrics::MetricsSource;
use crate::permissions::PermissionGateway;
use crate::store::DestinationStore;
use crate::tracking_url::build_destination_url;

#[derive(Debug, Clone)]
pub struct FlowSettings {
    pub bundle_id: String,
    pub metrics_salt: String,
    pub flag_key: String,
    pub display_delay: Duration,
}

impl FlowSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            bundle_id: config.bundle_id.clone(),
            metrics_salt: config.metrics_salt.clone(),
            flag_key: config.flag_key.clone(),
            display_delay: SPLASH_DISPLAY_DELAY,
        }
    }
}

/// Decides, once per cold start, whether to show the application or the
/// attribution destination.
pub struct AttributionFlowController {
    permissions: Arc<PermissionGateway>,
    flags: Arc<RemoteFlagFetcher>,
    metrics: Arc<dyn MetricsSource>,
    store: Arc<dyn DestinationStore>,
    settings: FlowSettings,
    state: Mutex<FlowState>,
    decision: watch::Sender<FlowDecision>,
    started: AtomicBool,
    destination: OnceCell<Option<Url>>,
}

impl AttributionFlowController {
    pub fn new(
        permissions: Arc<PermissionGateway>,
        flags: Arc<RemoteFlagFetcher>,
        metrics: Arc<dyn MetricsSource>,
        store: Arc<dyn DestinationStore>,
        settings: FlowSettings,
    ) -> Self {
        let (decision, _) = watch::channel(FlowDecision::Pending);
        Self {
            permissions,
            flags,
            metrics,
            store,
            settings,
            state: Mutex::new(FlowState::Init),
            decision,
            started: AtomicBool::new(false),
            destination: OnceCell::new(),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<FlowDecision> {
        self.decision.subscribe()
    }

    pub fn decision(&self) -> FlowDecision {
        self.decision.borrow().clone()
    }

    pub fn state(&self) -> FlowState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub async fn wait_for_decision(&self) -> FlowDecision {
        let mut rx = self.decision.subscribe();
        match rx.wait_for(FlowDecision::is_terminal).await {
            Ok(decision) => decision.clone(),
            Err(_) => FlowDecision::ShowApplication,
        }
    }

    pub fn spawn(self: Arc<Self>) -> JoinHandle<FlowDecision> {
        tokio::spawn(async move { self.run().await })
    }

    /// Drives the flow to a terminal decision. Only the first call does any
    /// work; later calls wait for that decision.
    pub async fn run(&self) -> FlowDecision {
        if self.started.swap(true, Ordering::SeqCst) {
            debug!("Launch flow already running");
            return self.wait_for_decision().await;
        }

        self.transition(FlowState::WaitingOnPermissionsAndFlag);
        let (outcome, flag) = tokio::join!(
            self.resolve_permissions(),
            self.flags.fetch_flag(&self.settings.flag_key)
        );
        info!(
            enabled = flag.enabled,
            notifications_granted = outcome.notifications_granted,
            tracking_authorized = outcome.tracking_authorized,
            "Permissions and flag resolved"
        );

        if !flag.enabled {
            self.transition(FlowState::FastPathApp);
            return self.finish_with_application().await;
        }

        if let Some(url) = self.load_persisted().await {
            self.transition(FlowState::ReusingPersistedUrl);
            info!("Reusing persisted destination");
            return self.finish(FlowDecision::ShowDestination(url));
        }

        if !self.transition(FlowState::FetchingMetrics) {
            return self.wait_for_decision().await;
        }
        match self.resolve_destination(&outcome).await {
            Some(url) => self.finish(FlowDecision::ShowDestination(url)),
            None => self.finish_with_application().await,
        }
    }

    /// Notification first, then tracking; tracking is never prompted before
    /// the notification answer is in.
    async fn resolve_permissions(&self) -> PermissionOutcome {
        self.permissions.request_notification_permission().await;
        self.permissions.request_tracking_grant().await;
        self.permissions.outcome().unwrap_or_default()
    }

    async fn load_persisted(&self) -> Option<Url> {
        let store = Arc::clone(&self.store);
        let loaded = tokio::task::spawn_blocking(move || store.load())
            .await
            .map_err(|e| LaunchError::Persistence(format!("load task: {e}")))
            .and_then(|loaded| loaded);
        match loaded {
            Ok(url) => url,
            Err(e) => {
                warn!("Persisted destination unavailable: {}", e);
                None
            }
        }
    }

    async fn resolve_destination(&self, outcome: &PermissionOutcome) -> Option<Url> {
        self.destination
            .get_or_init(|| self.fetch_and_persist(outcome))
            .await
            .clone()
    }

    async fn fetch_and_persist(&self, outcome: &PermissionOutcome) -> Option<Url> {
        let advertising_id = outcome.advertising_id.as_deref();
        let response = match self
            .metrics
            .fetch_metrics(
                &self.settings.bundle_id,
                &self.settings.metrics_salt,
                advertising_id,
            )
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!("Metrics fetch failed, falling back to application: {}", e);
                return None;
            }
        };

        let push_subscriber_id = self.permissions.push_subscriber_id();
        let Some(url) = build_destination_url(
            &response,
            advertising_id,
            &self.settings.bundle_id,
            push_subscriber_id.as_deref(),
        ) else {
            let err = LaunchError::UrlBuild(format!("'{}' is not a usable base", response.url));
            warn!(
                is_organic = response.is_organic,
                "{}, falling back to application", err
            );
            return None;
        };

        if let Err(e) = self.persist(url.clone()).await {
            warn!("Destination resolved but not persisted: {}", e);
        }
        Some(url)
    }

    async fn persist(&self, url: Url) -> Result<(), LaunchError> {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || store.save(&url))
            .await
            .map_err(|e| LaunchError::Persistence(format!("save task: {e}")))?
    }

    async fn finish_with_application(&self) -> FlowDecision {
        tokio::time::sleep(self.settings.display_delay).await;
        self.finish(FlowDecision::ShowApplication)
    }

    fn finish(&self, decision: FlowDecision) -> FlowDecision {
        if self.transition(FlowState::Terminal(decision.clone())) {
            self.decision.send_if_modified(|current| {
                if current.is_terminal() {
                    false
                } else {
                    *current = decision;
                    true
                }
            });
            info!(decision = ?self.decision(), "Launch decision emitted");
        }
        self.decision()
    }

    fn transition(&self, next: FlowState) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.can_transition_to(&next) {
            debug!(from = ?*state, to = ?next, "Launch flow transition");
            *state = next;
            true
        } else {
            warn!(from = ?*state, to = ?next, "Ignoring illegal launch flow transition");
            false
        }
    }
}
