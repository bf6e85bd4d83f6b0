//! Selection stage: one oracle completion over the merged research and
//! scrape context, parsed into 3-5 candidate topics.
//!
//! An unparseable response is a hard error; an explicit empty topic
//! list is a valid outcome the orchestrator turns into a soft failure.

use tracing::{info, instrument};

use crate::error::PipelineError;
use crate::models::{ScrapedContent, SearchResult, Topic, TopicsResponse};
use crate::oracle::{CompletionRequest, Oracle};
use crate::utils::{extract_json_object, strip_code_fences, truncate_chars, truncate_for_log};

/// Cap on how many items of each kind go into the prompt context.
const CONTEXT_ITEMS: usize = 10;
/// Cap on embedded scraped content length, in characters.
const CONTENT_PREVIEW_CHARS: usize = 500;

#[instrument(skip_all, fields(search_results = search_results.len(), scraped = scraped.len()))]
pub async fn select_topics(
    oracle: &dyn Oracle,
    search_results: &[SearchResult],
    scraped: &[ScrapedContent],
) -> Result<Vec<Topic>, PipelineError> {
    let context = build_context(search_results, scraped);
    let request = CompletionRequest {
        prompt: analysis_prompt(&context),
        temperature: 0.7,
        max_tokens: 2000,
    };

    let response = oracle.complete(&request).await?;
    let topics = parse_topics(&response)?;
    info!(topics = topics.len(), "selection completed");
    Ok(topics)
}

fn build_context(search_results: &[SearchResult], scraped: &[ScrapedContent]) -> String {
    let mut parts = Vec::new();

    if !search_results.is_empty() {
        parts.push("=== RISULTATI RICERCA ===\n".to_string());
        for (i, result) in search_results.iter().take(CONTEXT_ITEMS).enumerate() {
            parts.push(format!(
                "{}. {}\n   URL: {}\n   Snippet: {}\n",
                i + 1,
                result.title,
                result.url,
                result.snippet
            ));
        }
    }

    if !scraped.is_empty() {
        parts.push("\n=== CONTENUTI SCRAPED ===\n".to_string());
        for (i, content) in scraped.iter().take(CONTEXT_ITEMS).enumerate() {
            parts.push(format!(
                "{}. {} ({})\n   URL: {}\n   Contenuto: {}...\n",
                i + 1,
                content.title,
                content.source_name,
                content.url,
                truncate_chars(&content.content, CONTENT_PREVIEW_CHARS)
            ));
        }
    }

    parts.join("\n")
}

fn analysis_prompt(context: &str) -> String {
    format!(
        "Analizza le seguenti notizie food dalla Sicilia e identifica 3-5 topic \
         interessanti per il giornale AllFoodSicily.\n\n\
         Criteri di selezione:\n\
         - Evita duplicati con articoli già pubblicati sui competitor\n\
         - Focus su: eventi, aperture ristoranti, ricette tradizionali, chef siciliani, prodotti tipici\n\
         - Seleziona solo notizie con valore editoriale e interesse per il pubblico\n\
         - Priorità a notizie recenti e rilevanti\n\n\
         Contenuti da analizzare:\n\n\
         {context}\n\n\
         Output richiesto (solo JSON valido, nessun testo aggiuntivo):\n\
         {{\n\
         \x20 \"topics\": [\n\
         \x20   {{\n\
         \x20     \"titolo\": \"Titolo dell'articolo proposto\",\n\
         \x20     \"angolo\": \"Angolo editoriale (es: evento, apertura, ricetta, chef, prodotto)\",\n\
         \x20     \"fonti\": [\"url1\", \"url2\"],\n\
         \x20     \"keywords\": [\"keyword1\", \"keyword2\", \"keyword3\"]\n\
         \x20   }}\n\
         \x20 ]\n\
         }}\n\n\
         Importante: Restituisci SOLO il JSON, senza markdown, senza spiegazioni."
    )
}

fn parse_topics(response: &str) -> Result<Vec<Topic>, PipelineError> {
    let cleaned = strip_code_fences(response);
    let parsed = serde_json::from_str::<TopicsResponse>(cleaned).or_else(|first_error| {
        // Some responses wrap the JSON in prose despite the instructions.
        extract_json_object(cleaned)
            .ok_or(first_error)
            .and_then(|json| serde_json::from_str::<TopicsResponse>(json))
    });

    match parsed {
        Ok(envelope) => Ok(envelope.topics),
        Err(_) => Err(PipelineError::MalformedResponse(truncate_for_log(
            response, 200,
        ))),
    }
}
