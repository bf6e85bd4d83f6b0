//! Ad-hoc single-topic pipeline, run synchronously for one user request.
//!
//! Research (single grounded query) → synthetic topic → article text →
//! best-effort image → render. Research and article generation failures
//! propagate to the caller; a failed image step only logs and continues
//! without the illustration.

use once_cell::sync::Lazy;
use std::collections::HashSet;
use tracing::{info, instrument, warn};

use crate::config::Config;
use crate::error::PipelineError;
use crate::models::{Article, GeneratedImage, SourceRef, Topic};
use crate::oracle::{CompletionRequest, Oracle};
use crate::pipeline::{generate, search};
use crate::render::DocumentRenderer;
use crate::utils::{title_case, truncate_chars};

const ADHOC_DAYS_BACK: u32 = 30;
const ADHOC_RESULT_LIMIT: usize = 10;
const MAX_TOPIC_SOURCES: usize = 5;
const MAX_KEYWORDS: usize = 5;
const DOMAIN_KEYWORD: &str = "Sicilia";

static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "un", "una", "il", "la", "i", "le", "gli", "lo", "di", "da", "in", "su", "per", "con",
        "tra", "fra", "e", "o", "ma", "se", "che", "del", "della", "dei", "delle", "al", "alla",
        "ai", "alle", "sul", "sulla", "sui", "sulle", "nel", "nella", "nei", "nelle",
    ]
    .into_iter()
    .collect()
});

/// Produce one article and its rendered document for a user topic.
#[instrument(skip(oracle, renderer, config))]
pub async fn run_adhoc(
    oracle: &dyn Oracle,
    renderer: &dyn DocumentRenderer,
    config: &Config,
    topic_text: &str,
) -> Result<(Article, Vec<u8>), PipelineError> {
    let query = format!("{topic_text} Sicilia food gastronomia cucina");
    let results = search::search_one(oracle, &query, ADHOC_DAYS_BACK, ADHOC_RESULT_LIMIT).await?;
    info!(results = results.len(), "topic researched");

    let topic = Topic {
        title: title_case(topic_text),
        angle: "articolo su richiesta".to_string(),
        source_urls: results
            .iter()
            .take(MAX_TOPIC_SOURCES)
            .filter(|r| !r.url.is_empty())
            .map(|r| r.url.clone())
            .collect(),
        keywords: extract_keywords(topic_text),
    };

    let mut article = generate::draft_article(oracle, config, topic).await?;
    article.sources = results
        .iter()
        .take(MAX_TOPIC_SOURCES)
        .map(SourceRef::from)
        .collect();
    info!(words = article.word_count, "article drafted");

    match generate_article_image(oracle, &article).await {
        Ok(image) => article.image = Some(image),
        Err(err) => warn!(%err, "image generation failed, continuing without image"),
    }

    let bytes = renderer.render(&article);
    info!(bytes = bytes.len(), title = %article.title, "document rendered");
    Ok((article, bytes))
}

async fn generate_article_image(
    oracle: &dyn Oracle,
    article: &Article,
) -> Result<GeneratedImage, crate::error::OracleError> {
    let prompt = image_prompt(oracle, article).await;
    oracle.generate_image(&prompt).await
}

/// Ask the oracle to write a photography prompt for the article; fall
/// back to a fixed template when that call fails or comes back blank.
async fn image_prompt(oracle: &dyn Oracle, article: &Article) -> String {
    let request = CompletionRequest {
        prompt: image_prompt_request(article),
        temperature: 0.7,
        max_tokens: 500,
    };
    match oracle.complete(&request).await {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        Ok(_) => fallback_image_prompt(&article.title),
        Err(err) => {
            warn!(%err, "image prompt generation failed, using fallback");
            fallback_image_prompt(&article.title)
        }
    }
}

fn image_prompt_request(article: &Article) -> String {
    format!(
        "Crea un prompt dettagliato per generare un'immagine professionale di food \
         photography per questo articolo.\n\n\
         Titolo articolo: {}\n\
         Contenuto (anteprima): {}\n\n\
         Il prompt deve:\n\
         - Descrivere una fotografia professionale di food\n\
         - Essere specifico sul soggetto (piatto, ingrediente, o scena culinaria siciliana)\n\
         - Includere dettagli su stile fotografico, illuminazione, composizione\n\
         - Evocare l'ambientazione siciliana quando appropriato\n\
         - Essere adatto per un articolo di giornale food\n\n\
         Restituisci SOLO il prompt per l'immagine, senza spiegazioni aggiuntive.",
        article.title,
        truncate_chars(&article.body, 500)
    )
}

fn fallback_image_prompt(title: &str) -> String {
    format!("Professional food photography of {title}, Sicilian cuisine, high quality, magazine style")
}

/// Keywords from the user's topic text: lowercase tokens, Italian
/// stopwords and tokens of one or two characters dropped, first five
/// kept in order. The domain keyword always makes the list, displacing
/// the last slot when the list is already full.
pub fn extract_keywords(topic: &str) -> Vec<String> {
    let mut keywords: Vec<String> = topic
        .split_whitespace()
        .map(|word| word.to_lowercase())
        .filter(|word| !STOPWORDS.contains(word.as_str()) && word.chars().count() > 2)
        .take(MAX_KEYWORDS)
        .collect();

    if !keywords
        .iter()
        .any(|k| k.eq_ignore_ascii_case(DOMAIN_KEYWORD))
    {
        if keywords.len() == MAX_KEYWORDS {
            keywords.truncate(MAX_KEYWORDS - 1);
        }
        keywords.push(DOMAIN_KEYWORD.to_string());
    }
    keywords
}
