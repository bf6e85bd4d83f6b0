//! Article generation stage: draft one article per selected topic,
//! bounded and individually timed out.
//!
//! Topics beyond the per-run article cap are dropped in input order.
//! The stage returns whatever succeeded; a run where every unit failed
//! is the orchestrator's soft-failure case, not an error here.

use tracing::{info, instrument};

use crate::config::Config;
use crate::error::OracleError;
use crate::models::{Article, Topic};
use crate::oracle::{CompletionRequest, Oracle};
use crate::runner::run_all;

#[instrument(skip_all, fields(topics = topics.len()))]
pub async fn generate_articles(
    oracle: &dyn Oracle,
    config: &Config,
    topics: &[Topic],
) -> Vec<Article> {
    let selected: Vec<Topic> = topics
        .iter()
        .take(config.max_articles_per_run)
        .cloned()
        .collect();
    let attempted = selected.len();

    let results = run_all(
        selected,
        config.max_concurrent_generations,
        Some(config.generation_timeout),
        |_, topic| async move { draft_article(oracle, config, topic).await },
    )
    .await;

    let articles: Vec<Article> = results.into_iter().flatten().collect();
    info!(generated = articles.len(), attempted, "generation completed");
    articles
}

pub(crate) async fn draft_article(
    oracle: &dyn Oracle,
    config: &Config,
    topic: Topic,
) -> Result<Article, OracleError> {
    let request = CompletionRequest {
        prompt: article_prompt(&topic, config),
        temperature: 0.8,
        max_tokens: 3000,
    };
    let body = oracle.complete(&request).await?;
    Ok(Article::from_topic(topic, body))
}

pub(crate) fn article_prompt(topic: &Topic, config: &Config) -> String {
    format!(
        "Scrivi una bozza di articolo per AllFoodSicily sul seguente topic.\n\n\
         Titolo: {}\n\
         Angolo editoriale: {}\n\
         Keywords: {}\n\
         Fonti: {}\n\n\
         Requisiti dell'articolo:\n\
         - Tono: professionale ma accessibile, adatto a un pubblico appassionato di food\n\
         - Lunghezza: {}-{} parole\n\
         - Struttura: introduzione accattivante, corpo informativo con dettagli, conclusione con riflessione\n\
         - Cita le fonti originali quando appropriato\n\
         - Ottimizzato SEO per keywords siciliane e gastronomiche\n\
         - Formato: Markdown con titoli, paragrafi, e formattazione appropriata\n\n\
         Scrivi l'articolo completo in formato Markdown.",
        topic.title,
        topic.angle,
        topic.keywords.join(", "),
        topic.source_urls.join(", "),
        config.article_min_words,
        config.article_max_words
    )
}
