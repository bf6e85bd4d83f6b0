//! Research stage: fan out the configured search queries and merge the
//! discovered results into one deduplicated list.
//!
//! Grounded citations are the primary source; when the backend returns
//! none, the stage falls back to extracting the JSON envelope the
//! prompt asks for. A failing query contributes zero results and never
//! fails the stage.

use serde::Deserialize;
use tracing::{info, instrument, warn};

use crate::config::Config;
use crate::models::SearchResult;
use crate::oracle::{CompletionRequest, Oracle};
use crate::runner::run_all;
use crate::utils::{dedupe_by_key, extract_json_object, strip_code_fences};

#[instrument(skip_all, fields(queries = config.queries.len()))]
pub async fn research(oracle: &dyn Oracle, config: &Config) -> Vec<SearchResult> {
    let queries = config.queries.clone();
    let results = run_all(queries, config.max_concurrent_searches, None, |_, query| {
        async move {
            search_one(
                oracle,
                &query,
                config.days_back,
                config.search_result_limit,
            )
            .await
        }
    })
    .await;

    // Merge in query order; failed queries were already logged.
    let mut merged = Vec::new();
    for result in results.into_iter().flatten() {
        merged.extend(result);
    }
    let unique = dedupe_by_key(merged, |r: &SearchResult| r.url.clone());
    info!(results = unique.len(), "research completed");
    unique
}

pub(crate) async fn search_one(
    oracle: &dyn Oracle,
    query: &str,
    days_back: u32,
    limit: usize,
) -> Result<Vec<SearchResult>, crate::error::OracleError> {
    let request = CompletionRequest {
        prompt: search_prompt(query, days_back, limit),
        temperature: 0.3,
        max_tokens: 2000,
    };
    let answer = oracle.grounded_search(&request).await?;

    if !answer.citations.is_empty() {
        return Ok(answer.citations);
    }
    Ok(parse_results_json(&answer.text))
}

fn search_prompt(query: &str, days_back: u32, limit: usize) -> String {
    format!(
        "Cerca notizie recenti (ultimi {days_back} giorni) su: {query} in Sicilia, \n\
         focus su food, ristoranti, gastronomia siciliana.\n\n\
         Restituisci un JSON con i risultati trovati:\n\
         {{\n\
         \x20 \"results\": [\n\
         \x20   {{\n\
         \x20     \"url\": \"URL dell'articolo\",\n\
         \x20     \"title\": \"Titolo\",\n\
         \x20     \"snippet\": \"Breve descrizione\"\n\
         \x20   }}\n\
         \x20 ]\n\
         }}\n\n\
         Massimo {limit} risultati. Solo notizie recenti e rilevanti."
    )
}

#[derive(Debug, Deserialize)]
struct ResultsEnvelope {
    #[serde(default)]
    results: Vec<SearchResult>,
}

/// Fallback parse when no grounding citations came back.
pub(crate) fn parse_results_json(text: &str) -> Vec<SearchResult> {
    let cleaned = strip_code_fences(text);
    let Some(json) = extract_json_object(cleaned) else {
        warn!("no JSON object in ungrounded search response");
        return Vec::new();
    };
    match serde_json::from_str::<ResultsEnvelope>(json) {
        Ok(envelope) => envelope.results,
        Err(error) => {
            warn!(%error, "search response JSON did not parse");
            Vec::new()
        }
    }
}
