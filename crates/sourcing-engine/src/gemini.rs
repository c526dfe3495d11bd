use std::env;
use std::fmt;
use std::time::Duration;

use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::{json, Map, Value};
use sourcing_contracts::types::GroundingSource;
use sourcing_contracts::SourcingError;

use crate::model::{GenerateRequest, GenerateResponse, GenerativeModel};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-3-pro-preview";
pub const DEFAULT_REQUEST_TIMEOUT_S: f64 = 120.0;

const UPSTREAM_BODY_MAX_CHARS: usize = 512;
const MIN_REQUEST_TIMEOUT_S: f64 = 15.0;
const MAX_REQUEST_TIMEOUT_S: f64 = 600.0;
const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Clone, PartialEq)]
pub struct GeminiConfig {
    pub api_base: String,
    pub api_key: Option<String>,
    pub model: String,
    pub request_timeout_s: f64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            request_timeout_s: DEFAULT_REQUEST_TIMEOUT_S,
        }
    }
}

impl fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_base", &self.api_base)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("request_timeout_s", &self.request_timeout_s)
            .finish()
    }
}

impl GeminiConfig {
    /// Reads `GEMINI_API_KEY` (then `GOOGLE_API_KEY`, then `API_KEY`),
    /// `GEMINI_API_BASE` and `SOURCING_MODEL`. Blank values count as unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_base: non_empty_env("GEMINI_API_BASE")
                .map(|value| normalize_api_base(&value))
                .unwrap_or(defaults.api_base),
            api_key: non_empty_env("GEMINI_API_KEY")
                .or_else(|| non_empty_env("GOOGLE_API_KEY"))
                .or_else(|| non_empty_env("API_KEY")),
            model: non_empty_env("SOURCING_MODEL").unwrap_or(defaults.model),
            request_timeout_s: defaults.request_timeout_s,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = normalize_api_base(api_base);
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into()).filter(|key: &String| !key.trim().is_empty());
        self
    }

    pub fn with_timeout_seconds(mut self, seconds: f64) -> Self {
        self.request_timeout_s = sanitize_timeout(seconds);
        self
    }

    /// Effective timeout. The field is public, so it is bounded again here
    /// rather than trusted.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs_f64(sanitize_timeout(self.request_timeout_s))
    }

    pub fn endpoint(&self) -> String {
        let trimmed = self.model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }
}

/// `generateContent` transport. One attempt per call; retries are the
/// caller's decision.
pub struct GeminiModel {
    config: GeminiConfig,
    http: HttpClient,
}

impl GeminiModel {
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            config,
            http: HttpClient::new(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(GeminiConfig::from_env())
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn api_key(&self) -> Result<&str, SourcingError> {
        self.config.api_key.as_deref().ok_or_else(|| {
            SourcingError::Configuration(
                "GEMINI_API_KEY or GOOGLE_API_KEY or API_KEY not set".to_string(),
            )
        })
    }
}

impl GenerativeModel for GeminiModel {
    fn name(&self) -> &str {
        &self.config.model
    }

    fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, SourcingError> {
        let api_key = self.api_key()?;
        let endpoint = self.config.endpoint();
        let payload = build_payload(request);

        let response = self
            .http
            .post(&endpoint)
            .header(API_KEY_HEADER, api_key)
            .timeout(self.config.request_timeout())
            .json(&payload)
            .send()
            .map_err(|err| {
                SourcingError::transport(format!(
                    "Gemini request failed: {}",
                    error_chain_text(&err.without_url())
                ))
            })?;
        let response_payload = response_json_or_error(response)?;
        Ok(parse_response(&response_payload))
    }
}

pub(crate) fn build_payload(request: &GenerateRequest) -> Value {
    let mut parts = vec![json!({ "text": request.prompt })];
    if let Some(image) = request.image.as_ref() {
        parts.push(json!({
            "inlineData": {
                "mimeType": image.mime_type,
                "data": image.data,
            }
        }));
    }

    let mut payload = Map::new();
    payload.insert(
        "contents".to_string(),
        Value::Array(vec![json!({
            "role": "user",
            "parts": parts,
        })]),
    );
    if request.web_search {
        payload.insert(
            "tools".to_string(),
            Value::Array(vec![json!({ "googleSearch": {} })]),
        );
    }

    let mut generation_config = Map::new();
    if let Some(temperature) = request.temperature {
        generation_config.insert("temperature".to_string(), json!(temperature));
    }
    if let Some(max_output_tokens) = request.max_output_tokens {
        generation_config.insert("maxOutputTokens".to_string(), json!(max_output_tokens));
    }
    if let Some(thinking_budget) = request.thinking_budget {
        generation_config.insert(
            "thinkingConfig".to_string(),
            json!({ "thinkingBudget": thinking_budget }),
        );
    }
    if let Some(schema) = request.response_schema.as_ref() {
        generation_config.insert(
            "responseMimeType".to_string(),
            Value::String("application/json".to_string()),
        );
        generation_config.insert("responseSchema".to_string(), schema.clone());
    }
    if !generation_config.is_empty() {
        payload.insert(
            "generationConfig".to_string(),
            Value::Object(generation_config),
        );
    }

    Value::Object(payload)
}

pub(crate) fn parse_response(payload: &Value) -> GenerateResponse {
    let Some(candidate) = payload
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first())
    else {
        return GenerateResponse::default();
    };

    let text = candidate
        .get("content")
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter(|part| !part.get("thought").and_then(Value::as_bool).unwrap_or(false))
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default();

    let citations = candidate
        .get("groundingMetadata")
        .and_then(|metadata| metadata.get("groundingChunks"))
        .and_then(Value::as_array)
        .map(|chunks| {
            chunks
                .iter()
                .filter_map(|chunk| chunk.get("web"))
                .map(|web| GroundingSource {
                    title: string_at(web, "title"),
                    uri: string_at(web, "uri"),
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    let finish_reason = candidate
        .get("finishReason")
        .and_then(Value::as_str)
        .map(str::to_string);

    GenerateResponse {
        text,
        citations,
        finish_reason,
    }
}

fn response_json_or_error(response: HttpResponse) -> Result<Value, SourcingError> {
    let status = response.status();
    let body = response.text().map_err(|err| {
        SourcingError::transport(format!(
            "Gemini response body read failed: {}",
            error_chain_text(&err.without_url())
        ))
    })?;
    if !status.is_success() {
        return Err(SourcingError::Upstream {
            status: status.as_u16(),
            body: truncate_text(&body, UPSTREAM_BODY_MAX_CHARS),
        });
    }
    serde_json::from_str(&body).map_err(|err| {
        SourcingError::transport(format!("Gemini returned invalid JSON envelope: {err}"))
    })
}

fn string_at(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn sanitize_timeout(seconds: f64) -> f64 {
    if seconds.is_finite() {
        seconds.clamp(MIN_REQUEST_TIMEOUT_S, MAX_REQUEST_TIMEOUT_S)
    } else {
        DEFAULT_REQUEST_TIMEOUT_S
    }
}

fn normalize_api_base(value: &str) -> String {
    let trimmed = value.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        DEFAULT_API_BASE.to_string()
    } else {
        trimmed.to_string()
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn error_chain_text(err: &(dyn std::error::Error + 'static)) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut current = Some(err);
    while let Some(cause) = current {
        let text = cause.to_string();
        let trimmed = text.trim();
        if !trimmed.is_empty() && parts.last().map(|last| last != trimmed).unwrap_or(true) {
            parts.push(trimmed.to_string());
        }
        current = cause.source();
    }
    parts.join(" | caused by: ")
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
