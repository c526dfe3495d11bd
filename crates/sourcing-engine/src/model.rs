use serde_json::Value;
use sourcing_contracts::types::{GroundingSource, InlineImage};
use sourcing_contracts::SourcingError;

/// One content-generation call: a text prompt, an optional image part and the
/// generation knobs the orchestrators tune.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateRequest {
    pub prompt: String,
    pub image: Option<InlineImage>,
    pub web_search: bool,
    pub temperature: Option<f32>,
    pub thinking_budget: Option<u32>,
    pub max_output_tokens: Option<u32>,
    /// Structured-output schema; when set the reply is requested as JSON.
    pub response_schema: Option<Value>,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateResponse {
    pub text: String,
    /// Web citations from search grounding, in the order returned.
    pub citations: Vec<GroundingSource>,
    pub finish_reason: Option<String>,
}

pub trait GenerativeModel: Send + Sync {
    fn name(&self) -> &str;
    fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, SourcingError>;
}
