use std::sync::Mutex;

use sourcing_contracts::types::GroundingSource;
use sourcing_contracts::SourcingError;

use crate::model::{GenerateRequest, GenerateResponse, GenerativeModel};

pub(crate) enum Reply {
    Text(String, Vec<GroundingSource>),
    TransportFailure(String),
}

/// In-process model returning a canned reply and recording every request.
pub(crate) struct ScriptedModel {
    reply: Reply,
    finish_reason: String,
    seen: Mutex<Vec<GenerateRequest>>,
}

impl ScriptedModel {
    pub(crate) fn text(text: &str) -> Self {
        Self::new(Reply::Text(text.to_string(), Vec::new()))
    }

    pub(crate) fn with_citations(text: &str, citations: Vec<GroundingSource>) -> Self {
        Self::new(Reply::Text(text.to_string(), citations))
    }

    pub(crate) fn failing(message: &str) -> Self {
        Self::new(Reply::TransportFailure(message.to_string()))
    }

    fn new(reply: Reply) -> Self {
        Self {
            reply,
            finish_reason: "STOP".to_string(),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn finishing_with(mut self, reason: &str) -> Self {
        self.finish_reason = reason.to_string();
        self
    }

    pub(crate) fn requests(&self) -> Vec<GenerateRequest> {
        self.seen.lock().map(|seen| seen.clone()).unwrap_or_default()
    }
}

impl GenerativeModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, SourcingError> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(request.clone());
        }
        match &self.reply {
            Reply::Text(text, citations) => Ok(GenerateResponse {
                text: text.clone(),
                citations: citations.clone(),
                finish_reason: Some(self.finish_reason.clone()),
            }),
            Reply::TransportFailure(message) => Err(SourcingError::transport(message.clone())),
        }
    }
}
