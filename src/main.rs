//! # AllFoodSicily
//!
//! An automated editorial pipeline for Sicilian food news. Each run
//! discovers recent stories, selects newsworthy topics, drafts articles
//! with an LLM, renders them as PDFs, and delivers everything through
//! Telegram.
//!
//! ## Usage
//!
//! ```sh
//! # Daemon mode: run the full pipeline daily at the configured hour
//! allfood_sicily
//!
//! # One scheduled run, then exit
//! allfood_sicily --now
//!
//! # One on-demand article
//! allfood_sicily --topic "cassata siciliana"
//! ```
//!
//! ## Architecture
//!
//! The scheduled pipeline is a fixed stage sequence:
//! 1. **Research**: grounded web search over the configured queries (parallel)
//! 2. **Scrape**: read each monitored site through the oracle (parallel, 60s per site)
//! 3. **Analyze**: one completion selecting 3-5 topics from the merged context
//! 4. **Generate**: draft one article per topic (parallel, 3 at a time)
//! 5. **Output**: render PDFs and deliver summary + documents via Telegram

use chrono::{DateTime, Local, TimeZone};
use clap::Parser;
use std::error::Error;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod error;
mod models;
mod notify;
mod oracle;
mod pipeline;
mod render;
mod runner;
mod utils;

use cli::Cli;
use config::Config;
use notify::{Delivery, TelegramNotifier, sanitize_filename};
use oracle::{Oracle, Retry, gemini::Gemini};
use pipeline::{manual, run::Pipeline};
use render::{DocumentRenderer, PdfRenderer};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    info!("allfood_sicily starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let mut config = Config::from_env();
    if let Some(ref path) = args.sources {
        config.apply_sources_file(path)?;
        info!(
            sources = path,
            sites = config.sites.len(),
            queries = config.queries.len(),
            "editorial sources overridden"
        );
    }

    let missing = config.validate();
    if args.validate {
        if missing.is_empty() {
            info!("configuration complete");
            return Ok(());
        }
        return Err(format!("missing configuration: {}", missing.join(", ")).into());
    }
    if !missing.is_empty() {
        return Err(format!("missing configuration: {}", missing.join(", ")).into());
    }

    let oracle = Retry::new(Gemini::new(&config));
    let delivery = TelegramNotifier::new(&config);
    let renderer = PdfRenderer::new();

    if let Some(ref topic) = args.topic {
        return run_topic(&oracle, &renderer, &delivery, &config, topic, &args).await;
    }

    let pipeline = Pipeline {
        oracle: &oracle,
        renderer: &renderer,
        delivery: &delivery,
        config: &config,
    };

    if args.now {
        let result = pipeline.run_scheduled().await;
        info!(
            succeeded = result.succeeded,
            articles = result.articles.len(),
            "run finished"
        );
        if !result.succeeded {
            let message = result
                .error_message
                .unwrap_or_else(|| "pipeline run failed".to_string());
            return Err(message.into());
        }
        return Ok(());
    }

    // Daemon mode: one scheduled run per day.
    info!(hour = config.daily_execution_hour, "daemon mode, daily scheduler active");
    loop {
        let now = Local::now();
        let next = next_run_at(now, config.daily_execution_hour);
        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
        info!(next = %next.format("%Y-%m-%d %H:%M:%S"), "sleeping until next run");
        tokio::time::sleep(wait).await;

        let result = pipeline.run_scheduled().await;
        info!(
            succeeded = result.succeeded,
            articles = result.articles.len(),
            "scheduled run finished"
        );
    }
}

/// On-demand single-topic mode: generate, deliver, optionally save.
async fn run_topic(
    oracle: &dyn Oracle,
    renderer: &dyn DocumentRenderer,
    delivery: &dyn Delivery,
    config: &Config,
    topic: &str,
    args: &Cli,
) -> Result<(), Box<dyn Error>> {
    let (article, bytes) = manual::run_adhoc(oracle, renderer, config, topic).await?;

    let filename = sanitize_filename(&format!("AllFoodSicily_{}.pdf", article.title));
    if let Some(ref dir) = args.output_dir {
        let path = std::path::Path::new(dir).join(&filename);
        std::fs::write(&path, &bytes)?;
        info!(path = %path.display(), "document saved");
    }

    let caption = format!(
        "📝 {}\n\n📊 {} parole\n🏷️ {}\n🔗 {} fonti",
        article.title,
        article.word_count,
        article.topic.keywords.join(", "),
        article.sources.len()
    );
    if let Err(err) = delivery.send_file(bytes, &filename, &caption).await {
        error!(%err, "document delivery failed");
        return Err(Box::new(err));
    }

    info!(title = %article.title, words = article.word_count, "on-demand article delivered");
    Ok(())
}

/// Next wall-clock occurrence of `hour:00` after `now`.
fn next_run_at(now: DateTime<Local>, hour: u32) -> DateTime<Local> {
    let naive = match now.date_naive().and_hms_opt(hour, 0, 0) {
        Some(today) if now.naive_local() < today => today,
        Some(today) => today + chrono::Duration::days(1),
        None => now.naive_local() + chrono::Duration::days(1),
    };
    // A DST gap can make the target time nonexistent locally.
    match Local.from_local_datetime(&naive).earliest() {
        Some(next) => next,
        None => {
            warn!("target hour does not exist locally, deferring one day");
            now + chrono::Duration::days(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn next_run_is_today_before_the_hour() {
        let now = Local.with_ymd_and_hms(2026, 3, 10, 6, 30, 0).unwrap();
        let next = next_run_at(now, 9);
        assert_eq!(next.hour(), 9);
        assert_eq!(next.date_naive(), now.date_naive());
    }

    #[test]
    fn next_run_is_tomorrow_after_the_hour() {
        let now = Local.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        let next = next_run_at(now, 9);
        assert_eq!(next.hour(), 9);
        assert_eq!(
            next.date_naive(),
            now.date_naive() + chrono::Duration::days(1)
        );
    }

    #[test]
    fn next_run_is_always_in_the_future() {
        let now = Local.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap();
        let next = next_run_at(now, 9);
        assert!(next > now);
    }
}
