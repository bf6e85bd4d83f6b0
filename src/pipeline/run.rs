//! Pipeline orchestrator for the scheduled run.
//!
//! Stage sequence: Search → Scrape → Analyze → {End(no-topics) |
//! Generate → Output → Done}. Structural errors from any stage are
//! absorbed exactly once here: they become a failure result and
//! additionally trigger a best-effort error notification. The terminal
//! result, success or failure, is always handed to delivery exactly
//! once.

use chrono::{DateTime, Local};
use itertools::Itertools;
use std::time::Duration;
use tracing::{error, info, instrument};

use crate::config::Config;
use crate::error::PipelineError;
use crate::models::PipelineRunResult;
use crate::notify::{Delivery, sanitize_filename};
use crate::oracle::Oracle;
use crate::pipeline::{analyze, generate, scrape, search};
use crate::render::DocumentRenderer;

/// Pause between consecutive document sends.
const SEND_SPACING: Duration = Duration::from_millis(500);

pub struct Pipeline<'a> {
    pub oracle: &'a dyn Oracle,
    pub renderer: &'a dyn DocumentRenderer,
    pub delivery: &'a dyn Delivery,
    pub config: &'a Config,
}

impl Pipeline<'_> {
    /// Run the full scheduled pipeline and deliver its outcome.
    #[instrument(skip_all)]
    pub async fn run_scheduled(&self) -> PipelineRunResult {
        let started_at = Local::now();

        let result = match self.execute(started_at).await {
            Ok(result) => result,
            Err(err) => {
                error!(%err, "pipeline run failed");
                self.notify_error(&err.to_string()).await;
                PipelineRunResult::failure(started_at, self.config.sites.len(), err.to_string())
            }
        };

        self.deliver(&result).await;
        result
    }

    async fn execute(
        &self,
        started_at: DateTime<Local>,
    ) -> Result<PipelineRunResult, PipelineError> {
        let sources_monitored = self.config.sites.len();

        let search_results = search::research(self.oracle, self.config).await;
        let (scraped, stats) = scrape::scrape_sites(self.oracle, self.config).await;
        info!(
            search_results = search_results.len(),
            scraped = stats.succeeded,
            "context gathered"
        );

        let topics = analyze::select_topics(self.oracle, &search_results, &scraped).await?;
        if topics.is_empty() {
            info!("no topics selected, ending run");
            return Ok(PipelineRunResult::failure(
                started_at,
                sources_monitored,
                "No topics selected",
            ));
        }

        let articles = generate::generate_articles(self.oracle, self.config, &topics).await;
        if articles.is_empty() {
            info!("no articles generated, ending run");
            return Ok(PipelineRunResult::failure(
                started_at,
                sources_monitored,
                "No articles generated",
            ));
        }

        Ok(PipelineRunResult {
            articles,
            sources_monitored,
            started_at,
            succeeded: true,
            error_message: None,
        })
    }

    /// Send the run summary, then each article as a rendered document.
    /// Send failures are logged and do not stop the remaining sends.
    async fn deliver(&self, result: &PipelineRunResult) {
        let summary = summary_message(result);
        if let Err(err) = self.delivery.send_text(&summary).await {
            error!(%err, "summary delivery failed");
        }

        let total = result.articles.len();
        for (i, article) in result.articles.iter().enumerate() {
            let bytes = self.renderer.render(article);
            let filename =
                sanitize_filename(&format!("Articolo_{}_{}.pdf", i + 1, article.title));
            let caption = format!(
                "📝 Articolo {}/{total}\n\n{}\n\n📊 {} parole",
                i + 1,
                article.title,
                article.word_count
            );
            if let Err(err) = self.delivery.send_file(bytes, &filename, &caption).await {
                error!(%err, title = %article.title, "document delivery failed");
                continue;
            }
            tokio::time::sleep(SEND_SPACING).await;
        }
    }

    async fn notify_error(&self, message: &str) {
        let text = format!(
            "❌ Errore nel workflow AllFoodSicily\n\n{message}\n\n🕐 Timestamp: {}",
            Local::now().format("%Y-%m-%d %H:%M:%S")
        );
        if let Err(err) = self.delivery.send_text(&text).await {
            error!(%err, "error notification failed");
        }
    }
}

fn summary_message(result: &PipelineRunResult) -> String {
    let status = if result.succeeded {
        "✅ Stato: completato con successo".to_string()
    } else {
        format!(
            "❌ Stato: completato con errori:\n{}",
            result.error_message.as_deref().unwrap_or("errore sconosciuto")
        )
    };

    let mut summary = format!(
        "🍝 Workflow Automatico AllFoodSicily\n\n\
         {status}\n\n\
         📝 Articoli generati: {}\n\
         🔗 Fonti monitorate: {}\n\
         🕐 Timestamp: {}\n\n",
        result.articles.len(),
        result.sources_monitored,
        result.started_at.format("%Y-%m-%d %H:%M:%S")
    );

    if !result.articles.is_empty() {
        let listing = result
            .articles
            .iter()
            .enumerate()
            .map(|(i, article)| {
                format!("{}. {} ({} parole)", i + 1, article.title, article.word_count)
            })
            .join("\n");
        summary.push_str("📋 Articoli:\n");
        summary.push_str(&listing);
        summary.push('\n');
    }

    summary.push_str("\n📄 I PDF completi seguono...");
    summary
}
