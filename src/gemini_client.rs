use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, warn};
use url::Url;

use crate::config::TutorConfig;
use crate::error::{Result, TutorError};
use crate::tutor::model::{InvokeOptions, ModelClient, ModelResponse};

/// Response bodies the endpoint (or a proxy in front of it) may return.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RawCompletion {
    /// A bare JSON string.
    Plain(String),
    /// An object carrying the reply in a `content` field.
    Message { content: String },
    /// The native `generateContent` shape.
    Candidates {
        #[serde(default)]
        candidates: Vec<Candidate>,
        #[serde(default, rename = "promptFeedback")]
        prompt_feedback: Option<PromptFeedback>,
    },
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default, rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PromptFeedback {
    #[serde(default, rename = "blockReason")]
    block_reason: Option<String>,
}

impl RawCompletion {
    /// Collapse any accepted shape into a single reply text.
    pub fn normalize(self) -> Result<ModelResponse> {
        match self {
            RawCompletion::Plain(text) => ModelResponse::from_text(text),
            RawCompletion::Message { content } => ModelResponse::from_text(content),
            RawCompletion::Candidates {
                candidates,
                prompt_feedback,
            } => {
                if let Some(reason) = prompt_feedback.and_then(|f| f.block_reason) {
                    warn!(%reason, "Prompt was blocked by the model");
                    return Err(TutorError::EmptyResponse);
                }

                let Some(first) = candidates.into_iter().next() else {
                    warn!("Response contained no candidates");
                    return Err(TutorError::EmptyResponse);
                };

                let text: String = first
                    .content
                    .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
                    .unwrap_or_default();

                if text.trim().is_empty() {
                    warn!(finish_reason = ?first.finish_reason, "Candidate carried no text");
                }
                ModelResponse::from_text(text)
            }
        }
    }
}

pub struct GeminiClient {
    api_key: String,
    base_url: Url,
    client: reqwest::Client,
}

const API_KEY_HEADER: &str = "x-goog-api-key";

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, base_url: Url, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TutorError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_key: api_key.into(),
            base_url,
            client,
        })
    }

    pub fn from_config(config: &TutorConfig) -> Result<Self> {
        Self::new(config.api_key.clone(), config.base_url.clone(), config.timeout)
    }

    fn endpoint(&self, model: &str) -> Result<Url> {
        self.base_url
            .join(&format!("v1beta/models/{model}:generateContent"))
            .map_err(|e| TutorError::config(format!("invalid model name {model:?}: {e}")))
    }

    pub fn request_body(prompt: &str, options: &InvokeOptions) -> Value {
        json!({
            "contents": [
                {
                    "role": "user",
                    "parts": [
                        {
                            "text": prompt
                        }
                    ]
                }
            ],
            "generationConfig": {
                "temperature": options.temperature
            }
        })
    }
}

#[async_trait]
impl ModelClient for GeminiClient {
    async fn invoke(&self, prompt: &str, options: &InvokeOptions) -> Result<ModelResponse> {
        let url = self.endpoint(&options.model)?;
        let request_body = Self::request_body(prompt, options);

        debug!(model = %options.model, temperature = options.temperature, "Sending request to Gemini API");

        let response = self
            .client
            .post(url)
            .header(API_KEY_HEADER, self.api_key.as_str())
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            error!(%status, "Gemini API request failed");
            return Err(TutorError::transport(format!(
                "Gemini API returned {status}: {}",
                body.trim()
            )));
        }

        debug!(bytes = body.len(), "Received response from Gemini API");

        match serde_json::from_str::<RawCompletion>(&body) {
            Ok(raw) => raw.normalize(),
            Err(e) => {
                warn!(error = %e, "Response body matched no known shape");
                Err(TutorError::EmptyResponse)
            }
        }
    }
}
