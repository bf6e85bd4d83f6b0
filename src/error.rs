//! Error taxonomy for the editorial pipeline.
//!
//! The pipeline distinguishes four failure channels:
//! - [`UnitError`]: one unit of parallel work (a query, a scrape, a
//!   generation) failed or timed out. Isolated and logged, never aborts
//!   the batch.
//! - [`OracleError`]: the generation backend misbehaved at the transport
//!   or API level. Subject to retry inside the oracle decorator.
//! - [`DeliveryError`]: the outbound notification channel rejected a send.
//! - [`PipelineError`]: a structural failure of a whole run, caught once
//!   at the orchestrator boundary and converted into a failure summary.

use std::time::Duration;
use thiserror::Error;

/// Failure of a single unit of parallel work.
#[derive(Debug, Error)]
pub enum UnitError {
    /// The unit exceeded its per-unit deadline.
    #[error("unit timed out after {0:?}")]
    TimedOut(Duration),
    /// The unit returned an error of its own.
    #[error("{0}")]
    Failed(String),
}

impl UnitError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, UnitError::TimedOut(_))
    }
}

/// Errors from the text/image generation backend.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("api returned status {status}: {body}")]
    Api { status: u16, body: String },
    #[error("model returned an empty response")]
    EmptyResponse,
    #[error("no image data in model response")]
    NoImageData,
    #[error("invalid inline image data: {0}")]
    InvalidImageData(#[from] base64::DecodeError),
}

/// Errors from the outbound delivery channel.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("delivery api error {status}: {body}")]
    Api { status: u16, body: String },
}

/// Structural failure of a whole pipeline run.
///
/// These propagate out of the stage that detected them and are absorbed
/// exactly once by the orchestrator, which turns them into a failure
/// run summary plus a best-effort error notification.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The selection stage received a response it could not parse into
    /// the expected topics structure. Distinct from "zero topics", which
    /// is a valid soft outcome.
    #[error("malformed oracle response: {0}")]
    MalformedResponse(String),
    #[error(transparent)]
    Oracle(#[from] OracleError),
}
