// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Outbound lobby announcements (registrations, evictions, board updates).

use std::time::Duration;

use reqwest::Client;

/// Fire-and-forget text sink. Implementations must not block the caller.
pub trait Notifier: Send + Sync {
    fn send(&self, text: &str);
}

/// Writes announcements to the log only.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, text: &str) {
        tracing::info!(target: "octolobby::announce", "{text}");
    }
}

/// Posts announcements to a chat webhook as `{"content": text}`.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    url: String,
    client: Client,
}

impl WebhookNotifier {
    pub fn new(url: String) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self { url, client })
    }

    /// Post one announcement. Non-2xx responses are errors.
    pub async fn post(&self, text: &str) -> anyhow::Result<()> {
        self.client
            .post(&self.url)
            .json(&serde_json::json!({ "content": text }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

impl Notifier for WebhookNotifier {
    fn send(&self, text: &str) {
        let webhook = self.clone();
        let text = text.to_owned();
        tokio::spawn(async move {
            if let Err(e) = webhook.post(&text).await {
                tracing::warn!(url = %webhook.url, err = %e, "webhook announcement failed");
            }
        });
    }
}

#[cfg(test)]
#[path = "notify_tests.rs"]
mod tests;
