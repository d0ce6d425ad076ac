//! Webhook event delivery with bounded retries.

use super::{EventPublisher, EventRecord};
use crate::config::PublisherConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

/// Posts events as JSON to a webhook.
pub struct WebhookPublisher {
    client: Client,
    url: String,
    max_attempts: u32,
    backoff: Duration,
}

impl WebhookPublisher {
    pub fn new(url: impl Into<String>, config: &PublisherConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create webhook HTTP client")?;

        Ok(Self {
            client,
            url: url.into(),
            max_attempts: config.max_attempts.max(1),
            backoff: Duration::from_millis(config.backoff_ms),
        })
    }
}

#[async_trait]
impl EventPublisher for WebhookPublisher {
    async fn publish(&self, event: &EventRecord) -> bool {
        for attempt in 1..=self.max_attempts {
            match self.client.post(&self.url).json(event).send().await {
                Ok(resp) if resp.status().is_success() => {
                    debug!(symbol = %event.symbol, attempt, "Event delivered");
                    return true;
                }
                Ok(resp) => {
                    warn!(symbol = %event.symbol, attempt, status = %resp.status(), "Webhook rejected event");
                }
                Err(e) => {
                    warn!(symbol = %event.symbol, attempt, error = %e, "Webhook request failed");
                }
            }

            if attempt < self.max_attempts {
                tokio::time::sleep(self.backoff * attempt).await;
            }
        }

        false
    }
}
