//! Outbound Telegram notifications.
//!
//! Fire-and-forget: delivery failures are logged and swallowed, a dead
//! notification channel must never break a trading cycle.

use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Sends trade and status messages to a Telegram chat.
pub struct Notifier {
    client: Client,
    base_url: String,
    credentials: Option<(String, String)>,
}

impl Notifier {
    /// Notifier for the given bot token and chat id. Pass `None` to disable
    /// delivery entirely (messages are logged at debug instead).
    pub fn new(token: Option<String>, chat_id: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: TELEGRAM_API_BASE.to_string(),
            credentials: token.zip(chat_id),
        }
    }

    /// Create with custom base URL (for testing).
    pub fn with_base_url(token: String, chat_id: String, base_url: String) -> Self {
        let mut notifier = Self::new(Some(token), Some(chat_id));
        notifier.base_url = base_url;
        notifier
    }

    pub fn is_enabled(&self) -> bool {
        self.credentials.is_some()
    }

    /// Send a message. Never fails the caller.
    pub async fn notify(&self, text: &str) {
        let Some((token, chat_id)) = &self.credentials else {
            debug!(text, "notification (delivery disabled)");
            return;
        };

        let url = format!("{}/bot{}/sendMessage", self.base_url, token);
        let body = json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "HTML",
        });

        match self.client.post(&url).json(&body).send().await {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => {
                warn!(status = %response.status(), "Telegram rejected notification");
            }
            Err(e) => {
                warn!(error = %e, "Failed to deliver notification");
            }
        }
    }
}
