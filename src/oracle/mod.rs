//! Generation oracle abstraction.
//!
//! Pipeline stages talk to a single [`Oracle`] trait covering the four
//! capabilities they need: plain completion, search-grounded completion,
//! URL reading, and image generation. The production implementation is
//! [`gemini::Gemini`]; tests script their own.
//!
//! Transient backend failures are handled by wrapping any oracle in
//! [`Retry`], which re-issues failed calls with exponential backoff.

pub mod gemini;

use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::OracleError;
use crate::models::{GeneratedImage, SearchResult};

/// Parameters for one text completion.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// A search-grounded answer: the model's text plus the web sources it
/// consulted, in the order the backend reported them.
#[derive(Debug, Clone)]
pub struct GroundedAnswer {
    pub text: String,
    pub citations: Vec<SearchResult>,
}

/// Text and image generation backend.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Plain text completion.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, OracleError>;

    /// Completion grounded in live web search.
    async fn grounded_search(&self, request: &CompletionRequest)
        -> Result<GroundedAnswer, OracleError>;

    /// Read one web page and return its extracted textual content.
    async fn read_page(&self, url: &str) -> Result<String, OracleError>;

    /// Generate one image from a textual prompt.
    async fn generate_image(&self, prompt: &str) -> Result<GeneratedImage, OracleError>;
}

/// Retrying decorator around any oracle.
///
/// Each call is attempted up to `max_attempts` times. The pause between
/// attempts doubles from `base_delay` up to a 10 second cap, plus up to
/// 250ms of jitter so that concurrent units do not retry in lockstep.
pub struct Retry<T> {
    inner: T,
    max_attempts: u32,
    base_delay: Duration,
}

impl<T> Retry<T> {
    pub fn new(inner: T) -> Self {
        Retry {
            inner,
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }

    async fn backoff(&self, attempt: u32) {
        let exp = self.base_delay * 2u32.saturating_pow(attempt);
        let capped = exp.min(Duration::from_secs(10));
        let jitter = Duration::from_millis(rand::rng().random_range(0..=250));
        tokio::time::sleep(capped + jitter).await;
    }
}

macro_rules! retried {
    ($self:ident, $label:literal, $call:expr) => {{
        let mut attempt = 0;
        loop {
            match $call {
                Ok(value) => {
                    if attempt > 0 {
                        info!(attempt, concat!($label, " succeeded after retry"));
                    }
                    break Ok(value);
                }
                Err(error) if attempt + 1 < $self.max_attempts => {
                    warn!(attempt, %error, concat!($label, " failed, retrying"));
                    $self.backoff(attempt).await;
                    attempt += 1;
                }
                Err(error) => break Err(error),
            }
        }
    }};
}

#[async_trait]
impl<T: Oracle> Oracle for Retry<T> {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, OracleError> {
        retried!(self, "completion", self.inner.complete(request).await)
    }

    async fn grounded_search(
        &self,
        request: &CompletionRequest,
    ) -> Result<GroundedAnswer, OracleError> {
        retried!(self, "grounded search", self.inner.grounded_search(request).await)
    }

    async fn read_page(&self, url: &str) -> Result<String, OracleError> {
        retried!(self, "page read", self.inner.read_page(url).await)
    }

    async fn generate_image(&self, prompt: &str) -> Result<GeneratedImage, OracleError> {
        retried!(self, "image generation", self.inner.generate_image(prompt).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails the first `failures` calls, then succeeds.
    struct Flaky {
        failures: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Oracle for Flaky {
        async fn complete(&self, _request: &CompletionRequest) -> Result<String, OracleError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(OracleError::Api {
                    status: 503,
                    body: "overloaded".to_string(),
                })
            } else {
                Ok("risposta".to_string())
            }
        }

        async fn grounded_search(
            &self,
            request: &CompletionRequest,
        ) -> Result<GroundedAnswer, OracleError> {
            self.complete(request).await.map(|text| GroundedAnswer {
                text,
                citations: Vec::new(),
            })
        }

        async fn read_page(&self, _url: &str) -> Result<String, OracleError> {
            Ok(String::new())
        }

        async fn generate_image(&self, _prompt: &str) -> Result<GeneratedImage, OracleError> {
            Err(OracleError::NoImageData)
        }
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            prompt: "ciao".to_string(),
            temperature: 0.7,
            max_tokens: 100,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retry_recovers_from_transient_failures() {
        let oracle = Retry::new(Flaky {
            failures: 2,
            calls: AtomicUsize::new(0),
        });
        let text = oracle.complete(&request()).await.unwrap();
        assert_eq!(text, "risposta");
        assert_eq!(oracle.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_gives_up_after_max_attempts() {
        let oracle = Retry::new(Flaky {
            failures: 10,
            calls: AtomicUsize::new(0),
        });
        let result = oracle.complete(&request()).await;
        assert!(matches!(result, Err(OracleError::Api { status: 503, .. })));
        assert_eq!(oracle.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn first_success_makes_one_call() {
        let oracle = Retry::new(Flaky {
            failures: 0,
            calls: AtomicUsize::new(0),
        });
        oracle.complete(&request()).await.unwrap();
        assert_eq!(oracle.inner.calls.load(Ordering::SeqCst), 1);
    }
}
