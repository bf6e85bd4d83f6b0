//! Gemini REST backend for the [`Oracle`] trait.
//!
//! Talks to the `generateContent` endpoint directly over reqwest. Three
//! request shapes are used: a plain completion, a completion with the
//! `googleSearch` and `urlContext` tools enabled (grounded search and
//! page reading), and an image request with `responseModalities` set to
//! IMAGE.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::config::Config;
use crate::error::OracleError;
use crate::models::{GeneratedImage, SearchResult};
use crate::oracle::{CompletionRequest, GroundedAnswer, Oracle};
use crate::utils::truncate_for_log;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct Gemini {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    text_model: String,
    image_model: String,
    aspect_ratio: String,
    image_size: String,
}

impl Gemini {
    pub fn new(config: &Config) -> Self {
        Gemini {
            client: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: config.gemini_api_key.clone(),
            text_model: config.text_model.clone(),
            image_model: config.image_model.clone(),
            aspect_ratio: config.image_aspect_ratio.clone(),
            image_size: config.image_size.clone(),
        }
    }

    async fn generate(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, OracleError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, model);
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::Api {
                status: status.as_u16(),
                body: truncate_for_log(&body, 500),
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl Oracle for Gemini {
    #[instrument(skip_all, fields(model = %self.text_model))]
    async fn complete(&self, request: &CompletionRequest) -> Result<String, OracleError> {
        let body = GenerateContentRequest {
            contents: vec![Content::user_text(&request.prompt)],
            generation_config: Some(GenerationConfig {
                temperature: Some(request.temperature),
                max_output_tokens: Some(request.max_tokens),
                ..GenerationConfig::default()
            }),
            tools: None,
        };

        let response = self.generate(&self.text_model, &body).await?;
        let text = response.text();
        if text.is_empty() {
            return Err(OracleError::EmptyResponse);
        }
        debug!(chars = text.chars().count(), "completion received");
        Ok(text)
    }

    #[instrument(skip_all, fields(model = %self.text_model))]
    async fn grounded_search(
        &self,
        request: &CompletionRequest,
    ) -> Result<GroundedAnswer, OracleError> {
        let body = GenerateContentRequest {
            contents: vec![Content::user_text(&request.prompt)],
            generation_config: Some(GenerationConfig {
                temperature: Some(request.temperature),
                max_output_tokens: Some(request.max_tokens),
                ..GenerationConfig::default()
            }),
            tools: Some(vec![
                Tool {
                    google_search: Some(Empty {}),
                    url_context: None,
                },
                Tool {
                    google_search: None,
                    url_context: Some(Empty {}),
                },
            ]),
        };

        let response = self.generate(&self.text_model, &body).await?;
        let text = response.text();
        if text.is_empty() {
            return Err(OracleError::EmptyResponse);
        }

        let citations = response.citations();
        debug!(citations = citations.len(), "grounded answer received");
        Ok(GroundedAnswer { text, citations })
    }

    #[instrument(skip(self))]
    async fn read_page(&self, url: &str) -> Result<String, OracleError> {
        let prompt = format!(
            "Leggi e analizza il contenuto di questa pagina web: {url}\n\n\
             Estrai in formato markdown:\n\
             - Titolo dell'articolo\n\
             - Contenuto principale (focus su food/gastronomia se presente)\n\
             - Informazioni rilevanti per un giornale food siciliano\n\n\
             Restituisci il contenuto completo in formato markdown pulito."
        );
        let body = GenerateContentRequest {
            contents: vec![Content::user_text(&prompt)],
            generation_config: Some(GenerationConfig {
                temperature: Some(0.1),
                max_output_tokens: Some(4000),
                ..GenerationConfig::default()
            }),
            tools: Some(vec![Tool {
                google_search: None,
                url_context: Some(Empty {}),
            }]),
        };

        let response = self.generate(&self.text_model, &body).await?;
        let text = response.text();
        if text.is_empty() {
            return Err(OracleError::EmptyResponse);
        }
        Ok(text)
    }

    #[instrument(skip_all, fields(model = %self.image_model))]
    async fn generate_image(&self, prompt: &str) -> Result<GeneratedImage, OracleError> {
        let body = GenerateContentRequest {
            contents: vec![Content::user_text(prompt)],
            generation_config: Some(GenerationConfig {
                response_modalities: Some(vec!["IMAGE".to_string()]),
                image_config: Some(ImageConfig {
                    aspect_ratio: self.aspect_ratio.clone(),
                    image_size: self.image_size.clone(),
                }),
                ..GenerationConfig::default()
            }),
            tools: None,
        };

        let response = self.generate(&self.image_model, &body).await?;
        let inline = response.inline_data().ok_or(OracleError::NoImageData)?;
        let bytes = BASE64.decode(&inline.data)?;
        debug!(bytes = bytes.len(), mime = %inline.mime_type, "image received");
        Ok(GeneratedImage {
            bytes,
            mime_type: inline.mime_type.clone(),
        })
    }
}

// Wire format.

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Tool>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

impl Content {
    fn user_text(text: &str) -> Self {
        Content {
            parts: vec![Part {
                text: Some(text.to_string()),
                inline_data: None,
            }],
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_modalities: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_config: Option<ImageConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageConfig {
    aspect_ratio: String,
    image_size: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Tool {
    #[serde(skip_serializing_if = "Option::is_none")]
    google_search: Option<Empty>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url_context: Option<Empty>,
}

#[derive(Debug, Serialize)]
struct Empty {}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Deserialize)]
struct GroundingChunk {
    web: Option<WebSource>,
}

#[derive(Debug, Deserialize)]
struct WebSource {
    #[serde(default)]
    uri: String,
    #[serde(default)]
    title: String,
}

impl GenerateContentResponse {
    /// Concatenation of all text parts across candidates.
    fn text(&self) -> String {
        self.candidates
            .iter()
            .filter_map(|c| c.content.as_ref())
            .flat_map(|content| content.parts.iter())
            .filter_map(|part| part.text.as_deref())
            .collect()
    }

    /// First inline data part, if any.
    fn inline_data(&self) -> Option<&InlineData> {
        self.candidates
            .iter()
            .filter_map(|c| c.content.as_ref())
            .flat_map(|content| content.parts.iter())
            .find_map(|part| part.inline_data.as_ref())
    }

    /// Web sources the backend grounded the answer in, response order.
    fn citations(&self) -> Vec<SearchResult> {
        self.candidates
            .iter()
            .filter_map(|c| c.grounding_metadata.as_ref())
            .flat_map(|meta| meta.grounding_chunks.iter())
            .filter_map(|chunk| chunk.web.as_ref())
            .map(|web| SearchResult {
                url: web.uri.clone(),
                title: web.title.clone(),
                snippet: String::new(),
            })
            .collect()
    }
}
