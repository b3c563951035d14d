//! Push notifications and notification clicks.

use chrono::{DateTime, Utc};
use serde::Serialize;

use harbor_core::AppConfig;

use crate::notify::{ClientMessage, ClientNotifier};

const ICON: &str = "/logo192.png";
const VIBRATE_PATTERN: [u32; 3] = [100, 50, 100];

/// A click action offered on a notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationData {
    pub date_of_arrival: DateTime<Utc>,
    pub primary_key: u32,
}

/// Notification shown for a push.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
    pub data: NotificationData,
    pub actions: Vec<NotificationAction>,
}

/// What a click on a notification asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickAction {
    Explore,
    /// `close` and any unknown action only dismiss.
    Dismiss,
}

impl ClickAction {
    pub fn parse(action: &str) -> Self {
        if action == "explore" { ClickAction::Explore } else { ClickAction::Dismiss }
    }
}

/// Turns push signals into notifications and clicks into navigations.
#[derive(Debug, Clone)]
pub struct PushHandler {
    title: String,
    default_body: String,
    explore_path: String,
    notifier: ClientNotifier,
}

impl PushHandler {
    pub fn new(config: &AppConfig, notifier: ClientNotifier) -> Self {
        Self {
            title: config.notification_title.clone(),
            default_body: config.notification_body.clone(),
            explore_path: config.explore_path.clone(),
            notifier,
        }
    }

    /// Build the notification for a push and broadcast it.
    ///
    /// A missing or blank payload falls back to the configured body.
    pub fn on_push(&self, payload: Option<&str>) -> Notification {
        let body = payload
            .filter(|text| !text.trim().is_empty())
            .unwrap_or(self.default_body.as_str())
            .to_string();

        let notification = Notification {
            title: self.title.clone(),
            body,
            icon: ICON.into(),
            badge: ICON.into(),
            vibrate: VIBRATE_PATTERN.to_vec(),
            data: NotificationData { date_of_arrival: Utc::now(), primary_key: 1 },
            actions: vec![
                NotificationAction { action: "explore".into(), title: "View Project".into(), icon: Some(ICON.into()) },
                NotificationAction { action: "close".into(), title: "Close".into(), icon: None },
            ],
        };

        let delivered = self.notifier.notify_all(ClientMessage::Notification(notification.clone()));
        tracing::info!(delivered, "push notification shown");
        notification
    }

    /// Handle a click, returning the path a window was opened on, if any.
    pub fn on_click(&self, action: &str) -> Option<String> {
        match ClickAction::parse(action) {
            ClickAction::Explore => {
                self.notifier.notify_all(ClientMessage::OpenWindow { url: self.explore_path.clone() });
                Some(self.explore_path.clone())
            }
            ClickAction::Dismiss => None,
        }
    }
}
