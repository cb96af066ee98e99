//! Best-effort delivery of session events to the frontend.
//!
//! Notifications are fire-and-forget: a failed POST is logged and dropped,
//! never retried, and never reported back to the API caller.

use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::error::{CoreError, Result};

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Outbound webhook channel.
pub trait Notifier: Send {
    /// Queue `payload` for `POST <base><endpoint>`. Must not block.
    fn notify(&self, endpoint: &str, payload: Value);
}

/// Sink for short user-visible messages.
pub trait NoticeSink: Send {
    fn notice(&self, message: &str);
}

/// Writes notices to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotices;

impl NoticeSink for LogNotices {
    fn notice(&self, message: &str) {
        tracing::info!(target: "scrapbook::notice", "{message}");
    }
}

/// Discards every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, endpoint: &str, _payload: Value) {
        tracing::debug!(endpoint, "notification dropped (no frontend configured)");
    }
}

/// POST a single notification.
///
/// # Errors
/// Returns [`CoreError::Transport`] on network failure or a non-2xx status.
pub async fn deliver(
    client: &reqwest::Client,
    base_url: &str,
    endpoint: &str,
    payload: &Value,
) -> Result<()> {
    let url = format!("{}{endpoint}", base_url.trim_end_matches('/'));
    let transport = |message: String| CoreError::Transport {
        endpoint: endpoint.to_string(),
        message,
    };
    let resp = client
        .post(&url)
        .json(payload)
        .send()
        .await
        .map_err(|e| transport(e.to_string()))?;
    if resp.status().is_success() {
        Ok(())
    } else {
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        Err(transport(format!("HTTP {status}: {text}")))
    }
}

/// Webhook notifier with a single delivery worker, so notifications reach the
/// frontend in the order they were raised.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    tx: mpsc::UnboundedSender<(String, Value)>,
}

impl WebhookNotifier {
    /// Spawn the delivery worker. Must be called inside a tokio runtime.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn spawn(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DELIVERY_TIMEOUT)
            .build()
            .map_err(|e| CoreError::Custom(format!("failed to build HTTP client: {e}")))?;
        let base_url = base_url.into();
        let (tx, mut rx) = mpsc::unbounded_channel::<(String, Value)>();
        tokio::spawn(async move {
            while let Some((endpoint, payload)) = rx.recv().await {
                if let Err(e) = deliver(&client, &base_url, &endpoint, &payload).await {
                    tracing::warn!(
                        endpoint = %endpoint,
                        payload = %payload,
                        error = %e,
                        "failed to notify frontend"
                    );
                }
            }
        });
        Ok(Self { tx })
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, endpoint: &str, payload: Value) {
        if self.tx.send((endpoint.to_string(), payload)).is_err() {
            tracing::warn!(endpoint, "notification worker stopped; dropping notification");
        }
    }
}
