//! Field-extraction stage of the document pipeline.
//!
//! Turns OCR text into structured identity fields. With an API key the text
//! goes to the OpenAI Chat Completions API; without one a small set of regular
//! expressions stands in.

use crate::config::ConfidenceTuning;
use crate::errors::AppError;
use crate::models::ExtractedFields;
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const SYSTEM_PROMPT: &str = "You are an assistant that extracts structured identity fields from OCR text of government ID cards (like passport, driving licence, PAN, Aadhaar). Return strict JSON with fields: full_name, dob (DD-MM-YYYY), id_number, expiry_date (if present, DD-MM-YYYY or empty), address (if present), doc_type (passport/pan/aadhaar/driving_license/unknown). If a field is not found, return empty string. After the JSON, return a short \"confidence\" float between 0 and 1 in a JSON field \"confidence\". DO NOT output any other text.";

const MAX_TOKENS: u32 = 800;

/// Parsed fields, the extractor's own confidence, and the reply it parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmExtraction {
    pub fields: ExtractedFields,
    pub confidence: f64,
    pub raw: String,
}

#[async_trait]
pub trait FieldExtractor: Send + Sync {
    async fn extract(&self, text: &str) -> Result<LlmExtraction, AppError>;

    /// Short label for logs.
    fn name(&self) -> &'static str;
}

// ============ OpenAI ============

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Chat Completions client with a single fallback model.
#[derive(Clone)]
pub struct OpenAiExtractor {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    fallback_model: String,
    tuning: ConfidenceTuning,
}

impl OpenAiExtractor {
    /// Creates a new extractor.
    ///
    /// # Arguments
    ///
    /// * `base_url` - API root, e.g. `https://api.openai.com/v1`.
    /// * `api_key` - Bearer token.
    /// * `model` - Model tried first.
    /// * `fallback_model` - Model tried once if the first request fails.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        fallback_model: impl Into<String>,
        tuning: ConfidenceTuning,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            fallback_model: fallback_model.into(),
            tuning,
        }
    }

    async fn send_request(&self, model: &str, text: &str) -> Result<String, AppError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatCompletionRequest {
            model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt(text),
                },
            ],
            temperature: 0.0,
            max_tokens: MAX_TOKENS,
        };

        tracing::info!("Requesting field extraction from model {}", model);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("OpenAI request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "OpenAI returned {}: {}",
                status, error_text
            )));
        }

        let parsed: ChatCompletionResponse = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse OpenAI response: {}", e))
        })?;

        Ok(reply_text(parsed))
    }
}

#[async_trait]
impl FieldExtractor for OpenAiExtractor {
    async fn extract(&self, text: &str) -> Result<LlmExtraction, AppError> {
        let content = match self.send_request(&self.model, text).await {
            Ok(content) => content,
            Err(first) => {
                tracing::warn!(
                    "Model {} failed ({}), retrying with {}",
                    self.model,
                    first,
                    self.fallback_model
                );
                self.send_request(&self.fallback_model, text)
                    .await
                    .inspect_err(|e| tracing::error!("OpenAI error: {}", e))?
            }
        };

        let (fields, confidence) = parse_reply(&content, &self.tuning);
        Ok(LlmExtraction {
            fields,
            confidence,
            raw: content,
        })
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

fn user_prompt(text: &str) -> String {
    format!(
        "OCR_TEXT_START\n{}\nOCR_TEXT_END\nExtract identity fields as described.",
        text
    )
}

fn reply_text(response: ChatCompletionResponse) -> String {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.and_then(|m| m.content).or(c.text))
        .unwrap_or_default()
}

/// Parses a free-text LLM reply into fields and a confidence.
///
/// The span from the first `{` to the last `}` is parsed as a JSON object. A
/// reported `confidence` of exactly 0 is still a reported value and clamps to
/// the minimum. Without such a span the whole reply is tried as any JSON value
/// and kept under `raw`. Anything unparseable becomes `{"raw": reply}`.
pub fn parse_reply(content: &str, tuning: &ConfidenceTuning) -> (ExtractedFields, f64) {
    let block = match (content.find('{'), content.rfind('}')) {
        (Some(start), Some(end)) if end > start => Some(&content[start..=end]),
        _ => None,
    };

    let parsed = match block {
        Some(json) => parse_object(json).map(|mut map| {
            let reported = map.remove("confidence").and_then(|c| c.as_f64());
            let confidence = match reported {
                Some(c) => c.clamp(tuning.llm_reported_min, tuning.llm_reported_max),
                None => tuning.llm_unreported,
            };
            (flatten_fields(map), confidence)
        }),
        None => serde_json::from_str::<Value>(content.trim())
            .ok()
            .map(|value| {
                let mut fields = ExtractedFields::new();
                fields.insert("raw".to_string(), value_to_string(value));
                (fields, tuning.llm_bare_json)
            }),
    };

    match parsed {
        Some(result) => result,
        None => {
            tracing::warn!("LLM reply was not valid JSON, keeping raw text");
            let mut fields = ExtractedFields::new();
            fields.insert("raw".to_string(), content.to_string());
            (fields, tuning.llm_unparsed)
        }
    }
}

fn parse_object(json: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(json.trim()) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn flatten_fields(map: Map<String, Value>) -> ExtractedFields {
    map.into_iter().map(|(k, v)| (k, value_to_string(v))).collect()
}

fn value_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => serde_json::to_string(&other).unwrap_or_default(),
    }
}

// ============ Regex fallback ============

/// Best-effort extractor used when no API key is configured.
#[derive(Debug, Clone)]
pub struct HeuristicExtractor {
    name_re: Regex,
    dob_re: Regex,
    id_re: Regex,
    confidence: f64,
}

impl HeuristicExtractor {
    pub fn new(tuning: &ConfidenceTuning) -> Result<Self, AppError> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| AppError::InternalError(format!("Invalid pattern {}: {}", pattern, e)))
        };

        Ok(Self {
            name_re: compile(r"(?i)Name[:\s]+([A-Z][A-Za-z ]{2,50})")?,
            dob_re: compile(r"(?i)(?:DOB|Date of Birth)[:\s]+([\d/\-.\s]{6,10})")?,
            id_re: compile(r"(?i)\b[A-Z0-9]{8,20}\b")?,
            confidence: tuning.heuristic,
        })
    }

    /// Applies the patterns to OCR text.
    pub fn extract_fields(&self, text: &str) -> ExtractedFields {
        let mut fields = ExtractedFields::new();

        if let Some(name) = self.name_re.captures(text).and_then(|c| c.get(1)) {
            fields.insert("full_name".to_string(), name.as_str().trim().to_string());
        }
        if let Some(dob) = self.dob_re.captures(text).and_then(|c| c.get(1)) {
            fields.insert("dob".to_string(), dob.as_str().trim().to_string());
        }
        // plain words like "PASSPORT" also match the shape, so require a digit
        if let Some(id) = self
            .id_re
            .find_iter(text)
            .map(|m| m.as_str())
            .find(|token| token.chars().any(|c| c.is_ascii_digit()))
        {
            fields.insert("id_number".to_string(), id.to_string());
        }

        fields
    }
}

#[async_trait]
impl FieldExtractor for HeuristicExtractor {
    async fn extract(&self, text: &str) -> Result<LlmExtraction, AppError> {
        let fields = self.extract_fields(text);
        tracing::debug!("Heuristic extraction found {} fields", fields.len());

        Ok(LlmExtraction {
            fields,
            confidence: self.confidence,
            raw: text.to_string(),
        })
    }

    fn name(&self) -> &'static str {
        "regex"
    }
}
