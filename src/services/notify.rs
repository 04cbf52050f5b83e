//! Best-effort webhook notifications.
//!
//! Notifications are spawned and forgotten: a slow or dead webhook target
//! must never delay a device response.

use serde_json::json;

pub struct Notifier {
    client: reqwest::Client,
    webhook_url: Option<String>,
}

impl Notifier {
    pub fn new(client: reqwest::Client, webhook_url: Option<String>) -> Self {
        Self {
            client,
            webhook_url,
        }
    }

    /// Post a low-battery notification in the background.
    pub fn low_battery(&self, device_id: &str, threshold: f32, percent: f32) {
        let Some(url) = self.webhook_url.clone() else {
            tracing::debug!(
                device_id = %device_id,
                percent = percent,
                "Low battery crossing (no webhook configured)"
            );
            return;
        };
        let client = self.client.clone();
        let device_id = device_id.to_string();
        tokio::spawn(async move {
            let body = json!({
                "event": "low_battery",
                "deviceId": device_id,
                "threshold": threshold,
                "percent": percent,
            });
            let result = client
                .post(&url)
                .json(&body)
                .timeout(std::time::Duration::from_secs(10))
                .send()
                .await;
            match result {
                Ok(response) if response.status().is_success() => {
                    tracing::info!(device_id = %device_id, percent = percent, "Low battery webhook sent");
                }
                Ok(response) => {
                    tracing::warn!(
                        device_id = %device_id,
                        status = response.status().as_u16(),
                        "Low battery webhook rejected"
                    );
                }
                Err(e) => {
                    tracing::warn!(device_id = %device_id, error = %e, "Low battery webhook failed");
                }
            }
        });
    }
}
