// src/notify/mod.rs
pub mod telegram;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use metrics::counter;
use tracing::{info, warn};

use crate::config::DigestConfig;
use crate::markup::{is_balanced, Dialect};
use crate::pack::FormattedMessage;
use crate::pipeline::{ensure_metrics_described, Digest};
use crate::rules::Rules;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// The surface refused the message. `parse_error` means the markup was
    /// the problem and another dialect may succeed.
    Rejected { parse_error: bool, reason: String },
}

/// Delivery surface. Retries and backoff live behind this trait.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn deliver(&self, body: &str, dialect: Dialect) -> Result<DeliveryOutcome>;
    fn name(&self) -> &'static str;
}

/// Send `digest`, walking the dialect fallback chain: renders with unbalanced
/// markup are skipped, parse rejections move on to the next dialect. The
/// digest is only re-rendered, never re-extracted.
pub async fn deliver_digest(
    digest: &Digest,
    cfg: &DigestConfig,
    rules: &Rules,
    transport: &dyn Transport,
) -> Result<FormattedMessage> {
    ensure_metrics_described();
    let mut tried: Vec<Dialect> = Vec::with_capacity(3);
    let mut last_reason = String::from("no dialect produced balanced markup");

    for dialect in cfg.dialect.fallback_chain() {
        if tried.contains(&dialect) {
            continue;
        }
        tried.push(dialect);

        let msg = digest.render(dialect, cfg, rules);
        if !is_balanced(&msg.body, dialect) {
            warn!(target: "digest", %dialect, "unbalanced markup, skipping dialect");
            continue;
        }

        counter!("digest_delivery_attempts_total").increment(1);
        match transport.deliver(&msg.body, dialect).await? {
            DeliveryOutcome::Delivered => {
                info!(
                    target: "digest",
                    %dialect,
                    transport = transport.name(),
                    items = msg.item_count,
                    truncated = msg.truncated,
                    "digest delivered"
                );
                return Ok(msg);
            }
            DeliveryOutcome::Rejected {
                parse_error: true,
                reason,
            } => {
                warn!(target: "digest", %dialect, %reason, "markup rejected, re-rendering");
                last_reason = reason;
            }
            DeliveryOutcome::Rejected {
                parse_error: false,
                reason,
            } => {
                return Err(anyhow!("{} rejected the digest: {reason}", transport.name()));
            }
        }
    }

    Err(anyhow!(
        "{} rejected every dialect: {last_reason}",
        transport.name()
    ))
}

/// Send an already-formatted message once, falling back to plain text on a
/// parse rejection.
pub async fn deliver_message(msg: &FormattedMessage, transport: &dyn Transport) -> Result<()> {
    counter!("digest_delivery_attempts_total").increment(1);
    match transport.deliver(&msg.body, msg.dialect).await? {
        DeliveryOutcome::Delivered => Ok(()),
        DeliveryOutcome::Rejected {
            parse_error: true, ..
        } if msg.dialect != Dialect::Plain => {
            counter!("digest_delivery_attempts_total").increment(1);
            let plain = crate::markup::to_plain(&msg.body, msg.dialect);
            match transport.deliver(&plain, Dialect::Plain).await? {
                DeliveryOutcome::Delivered => Ok(()),
                DeliveryOutcome::Rejected { reason, .. } => Err(anyhow!(reason)),
            }
        }
        DeliveryOutcome::Rejected { reason, .. } => Err(anyhow!(reason)),
    }
}
