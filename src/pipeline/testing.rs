//! Scripted collaborators for pipeline tests.
//!
//! Stages call the oracle concurrently, so scripted responses are keyed
//! rather than queued: completions and searches match on a substring of
//! the prompt, page reads match on the URL.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::{DeliveryError, OracleError};
use crate::models::{Article, GeneratedImage};
use crate::notify::Delivery;
use crate::oracle::{CompletionRequest, GroundedAnswer, Oracle};
use crate::render::DocumentRenderer;

/// One scripted outcome.
#[derive(Clone)]
pub enum Scripted<T> {
    Value(T),
    Fail(String),
    Slow(Duration, T),
}

impl<T: Clone> Scripted<T> {
    async fn resolve(&self) -> Result<T, OracleError> {
        match self {
            Scripted::Value(value) => Ok(value.clone()),
            Scripted::Fail(message) => Err(OracleError::Api {
                status: 500,
                body: message.clone(),
            }),
            Scripted::Slow(delay, value) => {
                tokio::time::sleep(*delay).await;
                Ok(value.clone())
            }
        }
    }
}

#[derive(Default)]
pub struct ScriptedOracle {
    completions: Vec<(String, Scripted<String>)>,
    searches: Vec<(String, Scripted<GroundedAnswer>)>,
    pages: HashMap<String, Scripted<String>>,
    image: Option<Scripted<GeneratedImage>>,
    pub complete_calls: AtomicUsize,
    pub search_calls: AtomicUsize,
    pub page_calls: AtomicUsize,
    pub image_calls: AtomicUsize,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        ScriptedOracle::default()
    }

    /// Script a completion for any prompt containing `needle`.
    pub fn on_complete(mut self, needle: &str, outcome: Scripted<String>) -> Self {
        self.completions.push((needle.to_string(), outcome));
        self
    }

    /// Script a grounded search for any prompt containing `needle`.
    pub fn on_search(mut self, needle: &str, outcome: Scripted<GroundedAnswer>) -> Self {
        self.searches.push((needle.to_string(), outcome));
        self
    }

    pub fn on_page(mut self, url: &str, outcome: Scripted<String>) -> Self {
        self.pages.insert(url.to_string(), outcome);
        self
    }

    pub fn on_image(mut self, outcome: Scripted<GeneratedImage>) -> Self {
        self.image = Some(outcome);
        self
    }

    fn unscripted<T>(what: &str) -> Result<T, OracleError> {
        Err(OracleError::Api {
            status: 404,
            body: format!("no scripted response for {what}"),
        })
    }
}

#[async_trait]
impl Oracle for ScriptedOracle {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, OracleError> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        match self
            .completions
            .iter()
            .find(|(needle, _)| request.prompt.contains(needle))
        {
            Some((_, outcome)) => outcome.resolve().await,
            None => Self::unscripted("completion"),
        }
    }

    async fn grounded_search(
        &self,
        request: &CompletionRequest,
    ) -> Result<GroundedAnswer, OracleError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        match self
            .searches
            .iter()
            .find(|(needle, _)| request.prompt.contains(needle))
        {
            Some((_, outcome)) => outcome.resolve().await,
            None => Self::unscripted("grounded search"),
        }
    }

    async fn read_page(&self, url: &str) -> Result<String, OracleError> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        match self.pages.get(url) {
            Some(outcome) => outcome.resolve().await,
            None => Self::unscripted("page read"),
        }
    }

    async fn generate_image(&self, _prompt: &str) -> Result<GeneratedImage, OracleError> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        match &self.image {
            Some(outcome) => outcome.resolve().await,
            None => Self::unscripted("image generation"),
        }
    }
}

/// Records everything sent through it.
#[derive(Default)]
pub struct RecordingDelivery {
    pub texts: Mutex<Vec<String>>,
    pub files: Mutex<Vec<(String, String)>>,
}

impl RecordingDelivery {
    pub fn new() -> Self {
        RecordingDelivery::default()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }

    pub fn sent_files(&self) -> Vec<(String, String)> {
        self.files.lock().unwrap().clone()
    }
}

#[async_trait]
impl Delivery for RecordingDelivery {
    async fn send_text(&self, text: &str) -> Result<(), DeliveryError> {
        self.texts.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn send_file(
        &self,
        _bytes: Vec<u8>,
        filename: &str,
        caption: &str,
    ) -> Result<(), DeliveryError> {
        self.files
            .lock()
            .unwrap()
            .push((filename.to_string(), caption.to_string()));
        Ok(())
    }
}

/// Counts renders and returns fixed bytes.
#[derive(Default)]
pub struct CountingRenderer {
    pub calls: AtomicUsize,
}

impl CountingRenderer {
    pub fn new() -> Self {
        CountingRenderer::default()
    }
}

impl DocumentRenderer for CountingRenderer {
    fn render(&self, _article: &Article) -> Vec<u8> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        b"%PDF-stub".to_vec()
    }
}

pub fn answer(text: &str, urls: &[&str]) -> GroundedAnswer {
    GroundedAnswer {
        text: text.to_string(),
        citations: urls
            .iter()
            .map(|url| crate::models::SearchResult {
                url: url.to_string(),
                title: format!("Titolo {url}"),
                snippet: "anteprima".to_string(),
            })
            .collect(),
    }
}
