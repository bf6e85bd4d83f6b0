//! Data models for one editorial pipeline run.
//!
//! All entities here are created fresh per run and discarded once the
//! terminal [`PipelineRunResult`] has been handed to rendering and
//! delivery; nothing is persisted across runs.
//!
//! [`Topic`] and [`SearchResult`] cross the JSON boundary with the
//! generation oracle, which answers with Italian field names (`titolo`,
//! `angolo`, `fonti`), hence the serde renames.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// One web result discovered by the research stage.
///
/// Identity key for deduplication is `url`; results with an empty URL
/// are never matched as duplicates of each other.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchResult {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub snippet: String,
}

/// Page content extracted from one monitored source.
///
/// Only successful scrapes produce a `ScrapedContent`; failures and
/// timeouts are recorded in the scrape stage's tally instead.
#[derive(Debug, Clone)]
pub struct ScrapedContent {
    pub url: String,
    pub title: String,
    pub content: String,
    pub source_name: String,
    pub source_category: String,
}

/// A topic selected for article generation.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Topic {
    #[serde(rename = "titolo")]
    pub title: String,
    /// Editorial angle (e.g. evento, apertura, ricetta, chef, prodotto).
    #[serde(rename = "angolo")]
    pub angle: String,
    #[serde(rename = "fonti", default)]
    pub source_urls: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Envelope the selection stage expects back from the oracle.
#[derive(Debug, Deserialize)]
pub struct TopicsResponse {
    pub topics: Vec<Topic>,
}

/// Raw image bytes produced by the oracle's image mode.
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// A source reference attached to a finished article.
#[derive(Debug, Clone)]
pub struct SourceRef {
    pub url: String,
    pub title: Option<String>,
    pub snippet: Option<String>,
}

impl From<&SearchResult> for SourceRef {
    fn from(result: &SearchResult) -> Self {
        SourceRef {
            url: result.url.clone(),
            title: (!result.title.is_empty()).then(|| result.title.clone()),
            snippet: (!result.snippet.is_empty()).then(|| result.snippet.clone()),
        }
    }
}

/// A drafted article, never mutated after creation.
#[derive(Debug, Clone)]
pub struct Article {
    pub title: String,
    /// Markdown body as returned by the oracle.
    pub body: String,
    pub topic: Topic,
    pub image: Option<GeneratedImage>,
    /// Literal whitespace-token count of `body`, never model-reported.
    pub word_count: usize,
    pub sources: Vec<SourceRef>,
}

impl Article {
    /// Build an article from a topic and its generated body text.
    ///
    /// Sources are seeded from the topic's URLs; the ad-hoc path replaces
    /// them with richer references carrying titles and snippets.
    pub fn from_topic(topic: Topic, body: String) -> Self {
        let word_count = body.split_whitespace().count();
        let sources = topic
            .source_urls
            .iter()
            .map(|url| SourceRef {
                url: url.clone(),
                title: None,
                snippet: None,
            })
            .collect();
        Article {
            title: topic.title.clone(),
            body,
            topic,
            image: None,
            word_count,
            sources,
        }
    }
}

/// Terminal artifact of one orchestrator invocation.
#[derive(Debug)]
pub struct PipelineRunResult {
    pub articles: Vec<Article>,
    pub sources_monitored: usize,
    pub started_at: DateTime<Local>,
    pub succeeded: bool,
    pub error_message: Option<String>,
}

impl PipelineRunResult {
    pub fn failure(
        started_at: DateTime<Local>,
        sources_monitored: usize,
        message: impl Into<String>,
    ) -> Self {
        PipelineRunResult {
            articles: Vec::new(),
            sources_monitored,
            started_at,
            succeeded: false,
            error_message: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_parses_italian_field_names() {
        let json = r#"{
            "titolo": "Nuova apertura a Palermo",
            "angolo": "apertura",
            "fonti": ["https://example.com/a"],
            "keywords": ["palermo", "ristorante"]
        }"#;

        let topic: Topic = serde_json::from_str(json).unwrap();
        assert_eq!(topic.title, "Nuova apertura a Palermo");
        assert_eq!(topic.angle, "apertura");
        assert_eq!(topic.source_urls.len(), 1);
        assert_eq!(topic.keywords.len(), 2);
    }

    #[test]
    fn topic_without_sources_is_legal() {
        let json = r#"{"titolo": "Cassata", "angolo": "ricetta"}"#;
        let topic: Topic = serde_json::from_str(json).unwrap();
        assert!(topic.source_urls.is_empty());
        assert!(topic.keywords.is_empty());
    }

    #[test]
    fn article_word_count_is_literal_token_count() {
        let topic = Topic {
            title: "Test".to_string(),
            angle: "evento".to_string(),
            source_urls: vec!["https://example.com".to_string()],
            keywords: vec![],
        };
        let article = Article::from_topic(topic, "uno  due\ntre\t quattro".to_string());
        assert_eq!(article.word_count, 4);
        assert_eq!(article.sources.len(), 1);
        assert!(article.image.is_none());
    }

    #[test]
    fn source_ref_drops_empty_fields() {
        let result = SearchResult {
            url: "https://example.com".to_string(),
            title: String::new(),
            snippet: "anteprima".to_string(),
        };
        let source = SourceRef::from(&result);
        assert!(source.title.is_none());
        assert_eq!(source.snippet.as_deref(), Some("anteprima"));
    }

    #[test]
    fn failure_result_has_no_articles() {
        let result = PipelineRunResult::failure(Local::now(), 8, "No topics selected");
        assert!(!result.succeeded);
        assert!(result.articles.is_empty());
        assert_eq!(result.error_message.as_deref(), Some("No topics selected"));
    }
}
