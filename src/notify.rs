//! Outbound delivery of run results.
//!
//! The pipeline reports through a [`Delivery`] channel: one text summary
//! per run plus one document per rendered article. The production
//! channel is the Telegram Bot API; long summaries are chunked to stay
//! under Telegram's message size limit.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::config::Config;
use crate::error::DeliveryError;
use crate::utils::truncate_chars;

/// Telegram caps messages at 4096 characters; chunk below that to leave
/// room for formatting.
pub const MAX_MESSAGE_CHARS: usize = 4000;
/// Telegram caps document captions at 1024 characters.
pub const MAX_CAPTION_CHARS: usize = 1024;

const CONTINUATION_PREFIX: &str = "(continued) ";

/// Channel for run summaries and rendered documents.
#[async_trait]
pub trait Delivery: Send + Sync {
    async fn send_text(&self, text: &str) -> Result<(), DeliveryError>;

    async fn send_file(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        caption: &str,
    ) -> Result<(), DeliveryError>;
}

pub struct TelegramNotifier {
    client: reqwest::Client,
    base_url: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(config: &Config) -> Self {
        TelegramNotifier {
            client: reqwest::Client::new(),
            base_url: format!("https://api.telegram.org/bot{}", config.telegram_bot_token),
            chat_id: config.telegram_chat_id.clone(),
        }
    }

    async fn check(&self, response: reqwest::Response) -> Result<(), DeliveryError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(DeliveryError::Api {
            status: status.as_u16(),
            body,
        })
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

#[async_trait]
impl Delivery for TelegramNotifier {
    #[instrument(skip_all, fields(chars = text.chars().count()))]
    async fn send_text(&self, text: &str) -> Result<(), DeliveryError> {
        for chunk in chunk_message(text, MAX_MESSAGE_CHARS) {
            let response = self
                .client
                .post(format!("{}/sendMessage", self.base_url))
                .json(&SendMessage {
                    chat_id: &self.chat_id,
                    text: &chunk,
                })
                .send()
                .await?;
            self.check(response).await?;
        }
        Ok(())
    }

    #[instrument(skip(self, bytes, caption), fields(bytes = bytes.len()))]
    async fn send_file(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        caption: &str,
    ) -> Result<(), DeliveryError> {
        let caption = truncate_chars(caption, MAX_CAPTION_CHARS).to_string();
        let form = Form::new()
            .text("chat_id", self.chat_id.clone())
            .text("caption", caption)
            .part(
                "document",
                Part::bytes(bytes).file_name(filename.to_string()),
            );

        let response = self
            .client
            .post(format!("{}/sendDocument", self.base_url))
            .multipart(form)
            .send()
            .await?;
        debug!(filename, "document sent");
        self.check(response).await
    }
}

/// Split `text` into chunks of at most `max_len` characters.
///
/// Splits prefer paragraph boundaries, then sentence boundaries, and
/// fall back to a hard character split only for a single oversized
/// sentence. Every chunk after the first is prefixed with
/// "(continued) " so readers see it is a continuation.
pub fn chunk_message(text: &str, max_len: usize) -> Vec<String> {
    if text.chars().count() <= max_len {
        return vec![text.to_string()];
    }

    // Continuation chunks must still fit under max_len with the prefix.
    let budget = max_len - CONTINUATION_PREFIX.chars().count();

    let mut units: Vec<String> = Vec::new();
    for paragraph in text.split("\n\n") {
        if paragraph.chars().count() <= budget {
            units.push(paragraph.to_string());
            continue;
        }
        for sentence in paragraph.split_inclusive(". ") {
            if sentence.chars().count() <= budget {
                units.push(sentence.to_string());
            } else {
                let mut rest = sentence;
                while !rest.is_empty() {
                    let head = truncate_chars(rest, budget);
                    units.push(head.to_string());
                    rest = &rest[head.len()..];
                }
            }
        }
    }

    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();
    for unit in units {
        let separator = if current.is_empty() { 0 } else { 2 };
        if !current.is_empty()
            && current.chars().count() + separator + unit.chars().count() > budget
        {
            chunks.push(current);
            current = String::new();
        }
        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(&unit);
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    for chunk in chunks.iter_mut().skip(1) {
        chunk.insert_str(0, CONTINUATION_PREFIX);
    }
    chunks
}

static FILENAME_DISALLOWED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\-.]").expect("valid filename pattern"));

/// Make a string safe to use as a Telegram document filename.
///
/// Spaces become underscores, anything outside `[\w\-.]` is dropped,
/// and names longer than 50 characters are cut down while keeping the
/// extension.
pub fn sanitize_filename(name: &str) -> String {
    let underscored = name.replace(' ', "_");
    let cleaned = FILENAME_DISALLOWED.replace_all(&underscored, "");
    if cleaned.chars().count() <= 50 {
        return cleaned.into_owned();
    }

    match cleaned.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => {
            format!("{}.{ext}", truncate_chars(stem, 46))
        }
        _ => truncate_chars(&cleaned, 50).to_string(),
    }
}
