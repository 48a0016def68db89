//! Discord REST Client - `ChatResponder` over the HTTP API
//!
//! Wraps reqwest with a governor rate limiter and a short retry loop
//! for 429 / 5xx responses. Sends and edits channel messages only.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tokio::time::sleep;
use tracing::{debug, instrument, warn};

use crate::config::DiscordConfig;
use crate::domain::format::clip;
use crate::ports::responder::{ChatResponder, MessageId, Reply};

use super::auth::DiscordAuth;
use super::types::{CreatedMessage, MessageBody, RateLimited};

/// Maximum retries on 429 / 5xx.
const MAX_RETRIES: u32 = 2;

/// Rate-limited HTTP client for the Discord REST API.
pub struct DiscordRest {
    /// Underlying HTTP client.
    http: Client,
    /// Bot credentials.
    auth: Arc<DiscordAuth>,
    /// API base URL, no trailing slash.
    base_url: String,
    /// Outbound request pacing.
    limiter: DefaultDirectRateLimiter,
}

impl DiscordRest {
    /// Create a new REST client.
    pub fn new(auth: Arc<DiscordAuth>, config: &DiscordConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(5)
            .build()
            .context("Failed to build HTTP client")?;

        let per_second = NonZeroU32::new(config.max_requests_per_second)
            .context("discord.max_requests_per_second must be positive")?;

        Ok(Self {
            http,
            auth,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            limiter: RateLimiter::direct(Quota::per_second(per_second)),
        })
    }

    fn messages_url(&self, channel: &str) -> String {
        format!("{}/channels/{channel}/messages", self.base_url)
    }

    /// Execute a request with auth, pacing and retries.
    async fn execute_with_retry(&self, request: RequestBuilder, what: &str) -> Result<Response> {
        let mut last_error = None;

        for attempt in 0..=MAX_RETRIES {
            self.limiter.until_ready().await;

            let req = request
                .try_clone()
                .context("Failed to clone request")?
                .header("Authorization", self.auth.authorization_header());

            match req.send().await {
                Ok(response) => match response.status() {
                    status if status.is_success() => return Ok(response),
                    StatusCode::TOO_MANY_REQUESTS => {
                        let wait = response
                            .json::<RateLimited>()
                            .await
                            .map_or(1.0, |r| r.retry_after);
                        warn!(attempt, retry_after = wait, "Rate limited by Discord, backing off");
                        sleep(Duration::from_secs_f64(wait.clamp(0.0, 30.0))).await;
                        last_error = Some(anyhow::anyhow!("{what}: rate limited"));
                    }
                    status if status.is_server_error() => {
                        warn!(status = %status, attempt, "Discord server error, retrying");
                        sleep(Duration::from_millis(500 * 2u64.pow(attempt))).await;
                        last_error = Some(anyhow::anyhow!("{what}: server error {status}"));
                    }
                    status => {
                        let body = response.text().await.unwrap_or_default();
                        anyhow::bail!("{what}: Discord API error {status}: {}", clip(&body, 300));
                    }
                },
                Err(e) => {
                    warn!(error = %e, attempt, "Discord request failed");
                    last_error = Some(anyhow::Error::new(e).context(what.to_string()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("{what}: max retries exceeded")))
    }
}

#[async_trait]
impl ChatResponder for DiscordRest {
    #[instrument(skip(self, reply))]
    async fn send(&self, channel: &str, reply: &Reply) -> Result<MessageId> {
        let request = self.http.post(self.messages_url(channel)).json(&MessageBody::from(reply));

        let created: CreatedMessage = self
            .execute_with_retry(request, "create message")
            .await?
            .json()
            .await
            .context("Invalid create message response")?;

        debug!(message_id = %created.id, "Message sent");
        Ok(created.id)
    }

    #[instrument(skip(self, reply))]
    async fn edit(&self, channel: &str, message: &str, reply: &Reply) -> Result<()> {
        let url = format!("{}/{message}", self.messages_url(channel));
        let request = self.http.patch(url).json(&MessageBody::from(reply));

        self.execute_with_retry(request, "edit message").await?;
        debug!(message_id = message, "Message edited");
        Ok(())
    }
}
