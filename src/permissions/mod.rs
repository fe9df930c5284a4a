//! Operating-system permission prompts.
//!
//! The gateway wraps the push-notification provider and the ad-tracking
//! authorization API. Each permission is prompted at most once per process;
//! later calls return the cached outcome.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tokio_retry::Retry;
use tokio_retry::strategy::FixedInterval;
use tracing::{debug, info, warn};

use crate::core::config::TRACKING_RETRY_BACKOFF;
use crate::core::models::PermissionOutcome;
use crate::errors::LaunchError;

/// Platforms hand this out instead of a real identifier when tracking is limited.
pub const ZEROED_ADVERTISING_ID: &str = "00000000-0000-0000-0000-000000000000";

/// Number of status re-reads after a `NotDetermined` answer to the prompt.
const TRACKING_RETRY_LIMIT: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationStatus {
    NotDetermined,
    Denied,
    Authorized,
    Provisional,
    Ephemeral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingStatus {
    NotDetermined,
    Restricted,
    Denied,
    Authorized,
}

/// Push-notification provider: permission prompt plus the subscriber identifier.
#[async_trait]
pub trait PushProvider: Send + Sync {
    async fn authorization_status(&self) -> NotificationStatus;

    /// Shows the system prompt and reports whether the user granted it.
    async fn request_permission(&self) -> Result<bool, LaunchError>;

    fn subscriber_id(&self) -> Option<String>;
}

/// Ad-tracking authorization API.
#[async_trait]
pub trait TrackingProvider: Send + Sync {
    async fn authorization_status(&self) -> TrackingStatus;

    /// Shows the system prompt. May return `NotDetermined` even after the user answered.
    async fn request_authorization(&self) -> TrackingStatus;

    /// Only meaningful while the status is `Authorized`.
    fn advertising_identifier(&self) -> Option<String>;
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TrackingGrant {
    pub authorized: bool,
    pub advertising_id: Option<String>,
}

pub struct PermissionGateway {
    push: Arc<dyn PushProvider>,
    tracking: Arc<dyn TrackingProvider>,
    retry_backoff: Duration,
    notifications: OnceCell<bool>,
    tracking_grant: OnceCell<TrackingGrant>,
}

impl PermissionGateway {
    pub fn new(push: Arc<dyn PushProvider>, tracking: Arc<dyn TrackingProvider>) -> Self {
        Self::with_retry_backoff(push, tracking, TRACKING_RETRY_BACKOFF)
    }

    pub fn with_retry_backoff(
        push: Arc<dyn PushProvider>,
        tracking: Arc<dyn TrackingProvider>,
        retry_backoff: Duration,
    ) -> Self {
        Self {
            push,
            tracking,
            retry_backoff,
            notifications: OnceCell::new(),
            tracking_grant: OnceCell::new(),
        }
    }

    pub async fn request_notification_permission(&self) -> bool {
        *self
            .notifications
            .get_or_init(|| self.resolve_notifications())
            .await
    }

    /// Returns the advertising identifier when tracking was authorized.
    pub async fn request_tracking_authorization(&self) -> Option<String> {
        self.request_tracking_grant().await.advertising_id
    }

    pub async fn request_tracking_grant(&self) -> TrackingGrant {
        self.tracking_grant
            .get_or_init(|| self.resolve_tracking())
            .await
            .clone()
    }

    /// Both outcomes, if both have already resolved.
    pub fn outcome(&self) -> Option<PermissionOutcome> {
        let notifications_granted = *self.notifications.get()?;
        let grant = self.tracking_grant.get()?;
        Some(PermissionOutcome {
            notifications_granted,
            tracking_authorized: grant.authorized,
            advertising_id: grant.advertising_id.clone(),
        })
    }

    pub fn push_subscriber_id(&self) -> Option<String> {
        self.push.subscriber_id().filter(|id| !id.trim().is_empty())
    }

    async fn resolve_notifications(&self) -> bool {
        match self.push.authorization_status().await {
            NotificationStatus::Authorized
            | NotificationStatus::Provisional
            | NotificationStatus::Ephemeral => true,
            NotificationStatus::Denied => false,
            NotificationStatus::NotDetermined => match self.push.request_permission().await {
                Ok(granted) => {
                    info!(granted, "Notification permission resolved");
                    granted
                }
                Err(e) => {
                    warn!("Notification permission request failed: {}", e);
                    false
                }
            },
        }
    }

    async fn resolve_tracking(&self) -> TrackingGrant {
        let status = match self.tracking.authorization_status().await {
            TrackingStatus::NotDetermined => self.prompt_tracking().await,
            decided => decided,
        };

        if status != TrackingStatus::Authorized {
            info!(?status, "Tracking not authorized");
            return TrackingGrant::default();
        }

        let advertising_id = self
            .tracking
            .advertising_identifier()
            .filter(|id| is_usable_advertising_id(id));
        info!(
            has_advertising_id = advertising_id.is_some(),
            "Tracking authorized"
        );
        TrackingGrant {
            authorized: true,
            advertising_id,
        }
    }

    async fn prompt_tracking(&self) -> TrackingStatus {
        match self.tracking.request_authorization().await {
            TrackingStatus::NotDetermined => {
                debug!("Tracking prompt returned NotDetermined, re-reading status");
                let strategy = FixedInterval::new(self.retry_backoff).take(TRACKING_RETRY_LIMIT);
                Retry::spawn(strategy, || async move {
                    match self.tracking.authorization_status().await {
                        TrackingStatus::NotDetermined => Err(TrackingStatus::NotDetermined),
                        settled => Ok(settled),
                    }
                })
                .await
                .unwrap_or(TrackingStatus::NotDetermined)
            }
            settled => settled,
        }
    }
}

fn is_usable_advertising_id(id: &str) -> bool {
    let id = id.trim();
    !id.is_empty() && id != ZEROED_ADVERTISING_ID
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakePush {
        status: NotificationStatus,
        answer: Result<bool, ()>,
        prompts: AtomicUsize,
    }

    impl FakePush {
        fn new(status: NotificationStatus, answer: Result<bool, ()>) -> Self {
            Self {
                status,
                answer,
                prompts: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PushProvider for FakePush {
        async fn authorization_status(&self) -> NotificationStatus {
            self.status
        }

        async fn request_permission(&self) -> Result<bool, LaunchError> {
            self.prompts.fetch_add(1, Ordering::SeqCst);
            self.answer
                .map_err(|()| LaunchError::Permission("center unavailable".to_string()))
        }

        fn subscriber_id(&self) -> Option<String> {
            Some("  ".to_string())
        }
    }

    struct FakeTracking {
        initial: TrackingStatus,
        prompt_answer: TrackingStatus,
        // Popped on each status read after the prompt; last value sticks.
        later_statuses: Mutex<Vec<TrackingStatus>>,
        advertising_id: Option<String>,
        prompts: AtomicUsize,
        status_reads: AtomicUsize,
    }

    impl FakeTracking {
        fn new(initial: TrackingStatus, prompt_answer: TrackingStatus) -> Self {
            Self {
                initial,
                prompt_answer,
                later_statuses: Mutex::new(Vec::new()),
                advertising_id: Some("IDFA123".to_string()),
                prompts: AtomicUsize::new(0),
                status_reads: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TrackingProvider for FakeTracking {
        async fn authorization_status(&self) -> TrackingStatus {
            let read = self.status_reads.fetch_add(1, Ordering::SeqCst);
            if read == 0 {
                return self.initial;
            }
            let mut later = self.later_statuses.lock().unwrap();
            if later.len() > 1 {
                later.remove(0)
            } else {
                later.first().copied().unwrap_or(self.prompt_answer)
            }
        }

        async fn request_authorization(&self) -> TrackingStatus {
            self.prompts.fetch_add(1, Ordering::SeqCst);
            self.prompt_answer
        }

        fn advertising_identifier(&self) -> Option<String> {
            self.advertising_id.clone()
        }
    }

    fn gateway(push: Arc<FakePush>, tracking: Arc<FakeTracking>) -> PermissionGateway {
        PermissionGateway::with_retry_backoff(push, tracking, Duration::from_millis(5))
    }

    #[tokio::test]
    async fn test_notification_prompt_shown_once() {
        let push = Arc::new(FakePush::new(NotificationStatus::NotDetermined, Ok(true)));
        let tracking = Arc::new(FakeTracking::new(
            TrackingStatus::Denied,
            TrackingStatus::Denied,
        ));
        let gw = gateway(push.clone(), tracking);

        assert!(gw.request_notification_permission().await);
        assert!(gw.request_notification_permission().await);
        assert_eq!(push.prompts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_notification_already_decided_skips_prompt() {
        let push = Arc::new(FakePush::new(NotificationStatus::Provisional, Ok(false)));
        let tracking = Arc::new(FakeTracking::new(
            TrackingStatus::Denied,
            TrackingStatus::Denied,
        ));
        let gw = gateway(push.clone(), tracking);

        assert!(gw.request_notification_permission().await);
        assert_eq!(push.prompts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_notification_prompt_error_resolves_denied() {
        let push = Arc::new(FakePush::new(NotificationStatus::NotDetermined, Err(())));
        let tracking = Arc::new(FakeTracking::new(
            TrackingStatus::Denied,
            TrackingStatus::Denied,
        ));
        let gw = gateway(push, tracking);

        assert!(!gw.request_notification_permission().await);
    }

    #[tokio::test]
    async fn test_tracking_authorized_exposes_identifier() {
        let push = Arc::new(FakePush::new(NotificationStatus::Denied, Ok(false)));
        let tracking = Arc::new(FakeTracking::new(
            TrackingStatus::NotDetermined,
            TrackingStatus::Authorized,
        ));
        let gw = gateway(push, tracking.clone());

        assert_eq!(
            gw.request_tracking_authorization().await,
            Some("IDFA123".to_string())
        );
        assert_eq!(
            gw.request_tracking_authorization().await,
            Some("IDFA123".to_string())
        );
        assert_eq!(tracking.prompts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_tracking_denied_has_no_identifier() {
        let push = Arc::new(FakePush::new(NotificationStatus::Denied, Ok(false)));
        let tracking = Arc::new(FakeTracking::new(
            TrackingStatus::NotDetermined,
            TrackingStatus::Denied,
        ));
        let gw = gateway(push, tracking);

        let grant = gw.request_tracking_grant().await;
        assert!(!grant.authorized);
        assert_eq!(grant.advertising_id, None);
    }

    #[tokio::test]
    async fn test_tracking_not_determined_race_rereads_without_prompting_again() {
        let push = Arc::new(FakePush::new(NotificationStatus::Denied, Ok(false)));
        let tracking = Arc::new(FakeTracking::new(
            TrackingStatus::NotDetermined,
            TrackingStatus::NotDetermined,
        ));
        *tracking.later_statuses.lock().unwrap() =
            vec![TrackingStatus::NotDetermined, TrackingStatus::Authorized];
        let gw = gateway(push, tracking.clone());

        let grant = gw.request_tracking_grant().await;
        assert!(grant.authorized);
        assert_eq!(tracking.prompts.load(Ordering::SeqCst), 1);
        // initial read, immediate re-read, one re-read after the backoff
        assert_eq!(tracking.status_reads.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_tracking_still_not_determined_after_retry_is_unauthorized() {
        let push = Arc::new(FakePush::new(NotificationStatus::Denied, Ok(false)));
        let tracking = Arc::new(FakeTracking::new(
            TrackingStatus::NotDetermined,
            TrackingStatus::NotDetermined,
        ));
        let gw = gateway(push, tracking.clone());

        let grant = gw.request_tracking_grant().await;
        assert!(!grant.authorized);
        assert_eq!(tracking.prompts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zeroed_identifier_treated_as_absent() {
        let push = Arc::new(FakePush::new(NotificationStatus::Denied, Ok(false)));
        let mut tracking = FakeTracking::new(TrackingStatus::Authorized, TrackingStatus::Authorized);
        tracking.advertising_id = Some(ZEROED_ADVERTISING_ID.to_string());
        let gw = gateway(push, Arc::new(tracking));

        let grant = gw.request_tracking_grant().await;
        assert!(grant.authorized);
        assert_eq!(grant.advertising_id, None);
    }

    #[tokio::test]
    async fn test_outcome_only_after_both_resolved() {
        let push = Arc::new(FakePush::new(NotificationStatus::Authorized, Ok(true)));
        let tracking = Arc::new(FakeTracking::new(
            TrackingStatus::Restricted,
            TrackingStatus::Restricted,
        ));
        let gw = gateway(push, tracking.clone());

        assert!(gw.outcome().is_none());
        gw.request_notification_permission().await;
        assert!(gw.outcome().is_none());
        gw.request_tracking_grant().await;

        let outcome = gw.outcome().unwrap();
        assert!(outcome.notifications_granted);
        assert!(!outcome.tracking_authorized);
        assert_eq!(tracking.prompts.load(Ordering::SeqCst), 0);
        assert_eq!(gw.push_subscriber_id(), None);
    }
}
