// src/notify/telegram.rs
use super::{DeliveryOutcome, Transport};
use crate::markup::Dialect;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

#[derive(Clone)]
pub struct TelegramNotifier {
    api_base: String,
    token: String,
    chat_id: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl TelegramNotifier {
    pub fn new(token: String, chat_id: String) -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            token,
            chat_id,
            client: Client::new(),
            timeout: Duration::from_secs(30),
            max_retries: 3,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    /// Point at a different Bot API host (self-hosted server, test stub).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.token)
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
    disable_web_page_preview: bool,
}

#[derive(Deserialize, Default)]
struct ApiReply {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Telegram reports markup problems as 400 "Bad Request: can't parse entities ...".
pub(crate) fn is_parse_error(status: StatusCode, description: &str) -> bool {
    status == StatusCode::BAD_REQUEST && description.to_ascii_lowercase().contains("can't parse")
}

fn backoff(attempt: u8) -> Duration {
    Duration::from_millis(500u64 << (attempt - 1))
}

#[async_trait]
impl Transport for TelegramNotifier {
    async fn deliver(&self, body: &str, dialect: Dialect) -> Result<DeliveryOutcome> {
        let payload = SendMessage {
            chat_id: &self.chat_id,
            text: body,
            parse_mode: dialect.parse_mode(),
            disable_web_page_preview: false,
        };
        let url = self.endpoint();

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&url)
                .timeout(self.timeout)
                .json(&payload)
                .send()
                .await;

            match res {
                Ok(rsp) => {
                    let status = rsp.status();
                    let reply: ApiReply = rsp.json().await.unwrap_or_default();
                    if status.is_success() && reply.ok {
                        return Ok(DeliveryOutcome::Delivered);
                    }
                    let reason = reply
                        .description
                        .unwrap_or_else(|| format!("HTTP {status}"));
                    if is_parse_error(status, &reason) {
                        // retrying the same markup cannot help
                        return Ok(DeliveryOutcome::Rejected {
                            parse_error: true,
                            reason,
                        });
                    }
                    tracing::warn!(target: "digest", %status, %reason, attempt, "telegram send failed");
                    if attempt < self.max_retries {
                        tokio::time::sleep(backoff(attempt)).await;
                        continue;
                    }
                    return Ok(DeliveryOutcome::Rejected {
                        parse_error: false,
                        reason,
                    });
                }
                Err(e) => {
                    // the url carries the bot token
                    let e = e.without_url();
                    tracing::warn!(target: "digest", error = %e, attempt, "telegram request error");
                    if attempt < self.max_retries {
                        tokio::time::sleep(backoff(attempt)).await;
                        continue;
                    }
                    return Err(anyhow!("Telegram request failed: {e}"));
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}
