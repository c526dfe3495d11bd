mod analysis;
mod gemini;
mod model;
mod search;
#[cfg(test)]
mod testing;

use std::time::Instant;

use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use sourcing_contracts::events::{EventKind, EventPayload, EventWriter};
use sourcing_contracts::types::{ReliabilityReport, SearchResult, SourcingParams, Supplier};
use sourcing_contracts::SourcingError;

pub use analysis::{
    analyze_company_reliability, build_analysis_prompt, report_schema, ANALYSIS_MAX_OUTPUT_TOKENS,
    ANALYSIS_TEMPERATURE, ANALYSIS_THINKING_BUDGET,
};
pub use gemini::{
    GeminiConfig, GeminiModel, DEFAULT_API_BASE, DEFAULT_MODEL, DEFAULT_REQUEST_TIMEOUT_S,
};
pub use model::{GenerateRequest, GenerateResponse, GenerativeModel};
pub use search::{build_search_prompt, find_suppliers, search_response_schema};

/// Front door for the two sourcing operations.
///
/// Holds no results between calls. Each call is a pure function of its input
/// plus one model request; the optional event log only records what happened.
pub struct SourcingEngine {
    model: Box<dyn GenerativeModel>,
    events: Option<EventWriter>,
}

impl SourcingEngine {
    pub fn new(model: Box<dyn GenerativeModel>) -> Self {
        Self {
            model,
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventWriter) -> Self {
        self.events = Some(events);
        self.emit(
            EventKind::SessionStarted,
            map_object(json!({ "model": self.model.name() })),
        );
        self
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    pub fn event_writer(&self) -> Option<&EventWriter> {
        self.events.as_ref()
    }

    pub fn find_suppliers(&self, params: &SourcingParams) -> Result<SearchResult, SourcingError> {
        let started = Instant::now();
        self.emit(
            EventKind::SearchStarted,
            map_object(json!({
                "model": self.model.name(),
                "material": params.material,
                "country_filter": params.country_filter,
                "has_image": params.has_image(),
                "prompt_sha256": prompt_digest(&build_search_prompt(params)),
            })),
        );

        let (outcome, finish_reason) = search::run_search(self.model.as_ref(), params);
        let latency_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            Ok(result) => self.emit(
                EventKind::SearchCompleted,
                map_object(json!({
                    "suppliers": result.suppliers.len(),
                    "sources": result.sources.len(),
                    "finish_reason": finish_reason,
                    "latency_ms": latency_ms,
                })),
            ),
            Err(err) => self.emit(
                EventKind::SearchFailed,
                failure_payload(err, finish_reason.as_deref(), latency_ms),
            ),
        }
        outcome
    }

    pub fn analyze_company_reliability(
        &self,
        supplier: &Supplier,
    ) -> Result<ReliabilityReport, SourcingError> {
        let started = Instant::now();
        self.emit(
            EventKind::AnalysisStarted,
            map_object(json!({
                "model": self.model.name(),
                "supplier_id": supplier.id,
                "supplier_name": supplier.name,
                "prompt_sha256": prompt_digest(&build_analysis_prompt(supplier)),
            })),
        );

        let (outcome, finish_reason) = analysis::run_analysis(self.model.as_ref(), supplier);
        let latency_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            Ok(report) => self.emit(
                EventKind::AnalysisCompleted,
                map_object(json!({
                    "supplier_id": supplier.id,
                    "verdict": report.verdict_status().map(|status| status.as_str()),
                    "score": report.score_value(),
                    "finish_reason": finish_reason,
                    "latency_ms": latency_ms,
                })),
            ),
            Err(err) => self.emit(
                EventKind::AnalysisFailed,
                failure_payload(err, finish_reason.as_deref(), latency_ms),
            ),
        }
        outcome
    }

    fn emit(&self, kind: EventKind, payload: EventPayload) {
        let Some(events) = self.events.as_ref() else {
            return;
        };
        // The log is diagnostics only; a write failure must not change the
        // outcome of the operation being logged.
        if let Err(err) = events.record(kind, payload) {
            eprintln!("sourcing-engine: event log write failed ({kind}): {err:#}");
        }
    }
}

fn failure_payload(
    err: &SourcingError,
    finish_reason: Option<&str>,
    latency_ms: u64,
) -> EventPayload {
    map_object(json!({
        "category": err.category().as_str(),
        "kind": err.kind(),
        "message": err.to_string(),
        "diagnostic": err.diagnostic(),
        "finish_reason": finish_reason,
        "latency_ms": latency_ms,
    }))
}

fn prompt_digest(prompt: &str) -> String {
    hex::encode(Sha256::digest(prompt.as_bytes()))
}

fn map_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
