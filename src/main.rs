//! One-shot digest run: fetch the feed, build the digest, deliver it.
//!
//! Meant to be invoked by cron or a CI timer. `--dry-run` prints the rendered
//! message instead of sending it.

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use digest_headlines::config::DigestConfig;
use digest_headlines::ingest::rss::{RssProvider, DEFAULT_FEED_URL};
use digest_headlines::ingest::fetch_recent;
use digest_headlines::markup::Dialect;
use digest_headlines::notify::telegram::TelegramNotifier;
use digest_headlines::notify::{deliver_digest, deliver_message, Transport};
use digest_headlines::pack::FormattedMessage;
use digest_headlines::pipeline::build_digest;
use digest_headlines::rules::Rules;

const ENV_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
const ENV_CHANNEL: &str = "TELEGRAM_CHANNEL_ID";
const ENV_FEED_URL: &str = "DIGEST_FEED_URL";
const ENV_LOG_JSON: &str = "DIGEST_LOG_JSON";

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("digest=info,warn"));
    let json = std::env::var(ENV_LOG_JSON).ok().as_deref() == Some("1");

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

/// Bold-prefixed one-liner for runs that produce no digest.
fn notice(dialect: Dialect, bold: &str, rest: &str) -> FormattedMessage {
    FormattedMessage {
        body: format!(
            "{} {}",
            dialect.bold(&dialect.text(bold)),
            dialect.text(rest)
        ),
        dialect,
        truncated: false,
        item_count: 0,
    }
}

async fn run(dry_run: bool) -> Result<()> {
    let cfg = DigestConfig::load().context("loading digest config")?;
    let rules = Rules::load(cfg.rules_path.as_deref()).context("loading rule table")?;
    info!(target: "digest", rules_version = rules.table.version, dialect = %cfg.dialect, "config loaded");

    let transport: Option<TelegramNotifier> = if dry_run {
        None
    } else {
        let token = std::env::var(ENV_TOKEN).with_context(|| format!("{ENV_TOKEN} not set"))?;
        let chat = std::env::var(ENV_CHANNEL).with_context(|| format!("{ENV_CHANNEL} not set"))?;
        Some(TelegramNotifier::new(token, chat))
    };

    let result = digest_and_send(&cfg, &rules, transport.as_ref().map(|t| t as &dyn Transport)).await;
    if let (Err(e), Some(t)) = (&result, &transport) {
        // best effort: tell the channel the run failed
        let msg_text: String = format!("{e:#}").chars().take(200).collect();
        let msg = notice(cfg.dialect, "⚠️ Bot error:", &msg_text);
        if let Err(e2) = deliver_message(&msg, t).await {
            warn!(target: "digest", error = ?e2, "error notice not delivered");
        }
    }
    result
}

async fn digest_and_send(
    cfg: &DigestConfig,
    rules: &Rules,
    transport: Option<&dyn Transport>,
) -> Result<()> {
    let feed_url = std::env::var(ENV_FEED_URL).unwrap_or_else(|_| DEFAULT_FEED_URL.to_string());
    info!(target: "digest", %feed_url, "fetching feed");
    let provider = RssProvider::from_url(feed_url)?;
    let now = Utc::now();
    let entries = fetch_recent(&provider, now, cfg.recency_hours).await?;

    let Some(digest) = build_digest(&entries, cfg, rules, now) else {
        warn!(target: "digest", "feed has no entries");
        let msg = notice(
            cfg.dialect,
            "⚠️ No posts found in AI news feed.",
            "Check https://news.smol.ai directly.",
        );
        return match transport {
            Some(t) => deliver_message(&msg, t).await,
            None => {
                println!("{}", msg.body);
                Ok(())
            }
        };
    };

    match transport {
        Some(t) => {
            let sent = deliver_digest(&digest, cfg, rules, t).await?;
            info!(target: "digest", dialect = %sent.dialect, items = sent.item_count, "daily update completed");
        }
        None => {
            let msg = digest.render_with_fallback(cfg, rules);
            println!("{}", msg.body);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional; real environments set the variables directly
    let _ = dotenvy::dotenv();
    init_tracing();

    let dry_run = std::env::args().skip(1).any(|a| a == "--dry-run");
    if let Err(e) = run(dry_run).await {
        error!(target: "digest", error = ?e, "digest run failed");
        return Err(e);
    }
    Ok(())
}
