//! Outbound crowd alerts. Delivery is best effort: callers log failures and
//! carry on.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use log::warn;
use serde::Serialize;

const WEBHOOK_TIMEOUT_SECS: u64 = 3;

pub trait Notifier: Send + Sync {
    fn notify(&self, live: usize, threshold: u32) -> Result<()>;
}

/// Writes alerts to the log; the default when no transport is configured.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, live: usize, threshold: u32) -> Result<()> {
        warn!("Overcrowding detected: live count {live} reached threshold {threshold}");
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AlertPayload<'a> {
    subject: &'a str,
    message: String,
    live: usize,
    threshold: u32,
}

/// Posts a JSON alert to an HTTP endpoint (chat hook, mail relay, pager).
pub struct WebhookNotifier {
    url: String,
    agent: ureq::Agent,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(WEBHOOK_TIMEOUT_SECS))
            .build();
        Self {
            url: url.into(),
            agent,
        }
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, live: usize, threshold: u32) -> Result<()> {
        let payload = AlertPayload {
            subject: "Crowd alert",
            message: format!(
                "Overcrowding detected! Live crowd count: {live}. Threshold limit: {threshold}."
            ),
            live,
            threshold,
        };
        let body = serde_json::to_string(&payload).context("failed to serialize alert")?;
        self.agent
            .post(&self.url)
            .set("Content-Type", "application/json")
            .send_string(&body)
            .map_err(|err| anyhow!("webhook {} rejected alert: {err}", self.url))?;
        Ok(())
    }
}
