//! Headless stand-in for the device permission APIs.
//!
//! Used by the launch binary and in CI, where no OS prompt can be shown: the
//! answer each prompt "receives" is configured up front.

use std::env;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tracing::debug;

use crate::errors::LaunchError;
use crate::permissions::{NotificationStatus, PushProvider, TrackingProvider, TrackingStatus};

pub struct HeadlessPlatform {
    notifications_answer: bool,
    tracking_answer: TrackingStatus,
    advertising_id: Option<String>,
    subscriber_id: Option<String>,
    notifications_prompted: AtomicBool,
    tracking_prompted: AtomicBool,
}

impl HeadlessPlatform {
    pub fn new(
        notifications_answer: bool,
        tracking_answer: TrackingStatus,
        advertising_id: Option<String>,
        subscriber_id: Option<String>,
    ) -> Self {
        Self {
            notifications_answer,
            tracking_answer,
            advertising_id,
            subscriber_id,
            notifications_prompted: AtomicBool::new(false),
            tracking_prompted: AtomicBool::new(false),
        }
    }

    /// Reads `REDBOOK_NOTIFICATIONS`, `REDBOOK_TRACKING`, `REDBOOK_ADVERTISING_ID`
    /// and `REDBOOK_PUSH_SUBSCRIBER_ID`. Unset answers default to denied.
    pub fn from_env() -> Result<Self, String> {
        let notifications = match env::var("REDBOOK_NOTIFICATIONS") {
            Ok(raw) => {
                parse_notification_answer(&raw).map_err(|e| format!("REDBOOK_NOTIFICATIONS: {e}"))?
            }
            Err(_) => false,
        };
        let tracking = match env::var("REDBOOK_TRACKING") {
            Ok(raw) => parse_tracking_answer(&raw).map_err(|e| format!("REDBOOK_TRACKING: {e}"))?,
            Err(_) => TrackingStatus::Denied,
        };

        Ok(Self::new(
            notifications,
            tracking,
            env::var("REDBOOK_ADVERTISING_ID").ok(),
            env::var("REDBOOK_PUSH_SUBSCRIBER_ID").ok(),
        ))
    }
}

pub fn parse_notification_answer(raw: &str) -> Result<bool, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "granted" | "grant" | "yes" | "true" => Ok(true),
        "denied" | "deny" | "no" | "false" => Ok(false),
        other => Err(format!("expected granted or denied, got '{other}'")),
    }
}

pub fn parse_tracking_answer(raw: &str) -> Result<TrackingStatus, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "authorized" | "allow" => Ok(TrackingStatus::Authorized),
        "denied" | "deny" => Ok(TrackingStatus::Denied),
        "restricted" => Ok(TrackingStatus::Restricted),
        other => Err(format!(
            "expected authorized, denied or restricted, got '{other}'"
        )),
    }
}

#[async_trait]
impl PushProvider for HeadlessPlatform {
    async fn authorization_status(&self) -> NotificationStatus {
        match (
            self.notifications_prompted.load(Ordering::SeqCst),
            self.notifications_answer,
        ) {
            (false, _) => NotificationStatus::NotDetermined,
            (true, true) => NotificationStatus::Authorized,
            (true, false) => NotificationStatus::Denied,
        }
    }

    async fn request_permission(&self) -> Result<bool, LaunchError> {
        self.notifications_prompted.store(true, Ordering::SeqCst);
        debug!(granted = self.notifications_answer, "Headless notification prompt");
        Ok(self.notifications_answer)
    }

    fn subscriber_id(&self) -> Option<String> {
        self.subscriber_id.clone()
    }
}

#[async_trait]
impl TrackingProvider for HeadlessPlatform {
    async fn authorization_status(&self) -> TrackingStatus {
        if self.tracking_prompted.load(Ordering::SeqCst) {
            self.tracking_answer
        } else {
            TrackingStatus::NotDetermined
        }
    }

    async fn request_authorization(&self) -> TrackingStatus {
        self.tracking_prompted.store(true, Ordering::SeqCst);
        debug!(status = ?self.tracking_answer, "Headless tracking prompt");
        self.tracking_answer
    }

    fn advertising_identifier(&self) -> Option<String> {
        if self.tracking_answer == TrackingStatus::Authorized {
            self.advertising_id.clone()
        } else {
            None
        }
    }
}
