use serde_json::{json, Value};
use sourcing_contracts::coerce::value_kind;
use sourcing_contracts::extract::extract_json;
use sourcing_contracts::types::{ReliabilityReport, Supplier};
use sourcing_contracts::SourcingError;

use crate::model::{GenerateRequest, GenerativeModel};

pub const ANALYSIS_TEMPERATURE: f32 = 0.1;
pub const ANALYSIS_THINKING_BUDGET: u32 = 4000;
// Thinking tokens count against the output limit; leave room for the report.
pub const ANALYSIS_MAX_OUTPUT_TOKENS: u32 = 8192;

const REPORT_SHAPE: &str = r#"{
  "snapshot": {"legalName": "", "location": "", "incorporationYear": "", "ownership": "", "coreActivities": ""},
  "score": {"value": 0, "category": ""},
  "financials": {"creditworthiness": "", "paymentBehavior": "", "redFlags": [""]},
  "tradeHistory": {"experienceYears": "", "markets": "", "consistency": "", "inspections": ""},
  "compliance": {"registrationStatus": "", "certifications": [""], "legalIssues": ""},
  "reputation": {"summary": "", "feedback": "", "onlinePresence": ""},
  "riskFlags": [""],
  "verdict": {"status": "Safe" | "Caution" | "Not Recommended", "conditions": ""},
  "mitigation": {"paymentTerms": "", "verificationActions": "", "safeguards": ""},
  "executiveSummary": "one sentence"
}"#;

fn string_props(names: &[&str]) -> Value {
    let props = names
        .iter()
        .map(|name| (name.to_string(), json!({"type": "STRING"})))
        .collect::<serde_json::Map<_, _>>();
    Value::Object(props)
}

fn string_list() -> Value {
    json!({"type": "ARRAY", "items": {"type": "STRING"}})
}

/// Structured-output schema for the report. Leaf fields stay optional so a
/// partially researched company still yields a report.
pub fn report_schema() -> Value {
    let mut financials = string_props(&["creditworthiness", "paymentBehavior"]);
    financials["redFlags"] = string_list();
    let mut compliance = string_props(&["registrationStatus", "legalIssues"]);
    compliance["certifications"] = string_list();

    json!({
        "type": "OBJECT",
        "properties": {
            "snapshot": {
                "type": "OBJECT",
                "properties": string_props(&[
                    "legalName",
                    "location",
                    "incorporationYear",
                    "ownership",
                    "coreActivities",
                ]),
            },
            "score": {
                "type": "OBJECT",
                "properties": {"value": {"type": "NUMBER"}, "category": {"type": "STRING"}},
            },
            "financials": {"type": "OBJECT", "properties": financials},
            "tradeHistory": {
                "type": "OBJECT",
                "properties": string_props(&["experienceYears", "markets", "consistency", "inspections"]),
            },
            "compliance": {"type": "OBJECT", "properties": compliance},
            "reputation": {
                "type": "OBJECT",
                "properties": string_props(&["summary", "feedback", "onlinePresence"]),
            },
            "riskFlags": string_list(),
            "verdict": {
                "type": "OBJECT",
                "properties": {
                    "status": {"type": "STRING", "enum": ["Safe", "Caution", "Not Recommended"]},
                    "conditions": {"type": "STRING"},
                },
            },
            "mitigation": {
                "type": "OBJECT",
                "properties": string_props(&["paymentTerms", "verificationActions", "safeguards"]),
            },
            "executiveSummary": {"type": "STRING"},
        },
        "required": [
            "snapshot",
            "score",
            "financials",
            "tradeHistory",
            "compliance",
            "reputation",
            "verdict",
            "mitigation",
            "executiveSummary",
        ],
    })
}

pub fn build_analysis_prompt(supplier: &Supplier) -> String {
    let name = or_na(&supplier.name);
    let website = or_na(&supplier.website);
    let country = or_na(&supplier.country);

    format!(
        "Act as a professional Credit Score Inspector and Company Reliability Analyst.\n\
         Perform a deep-dive analysis on:\n\
         Name: {name}\n\
         Website: {website}\n\
         Country: {country}\n\
         \n\
         CRITICAL CONSTRAINTS:\n\
         1. Use Google Search to verify business registration, litigation, and shipment consistency.\n\
         2. Each JSON text field MUST be concise (max 150 chars).\n\
         3. Avoid special characters (like unescaped quotes) that break JSON.\n\
         4. If information is missing, use \"Record not found\" rather than hallucinating.\n\
         5. The output MUST be a single valid JSON object and nothing else.\n\
         \n\
         Analyze: corporate snapshot, reliability score (0-100) with a category label, financial signals, trade history, compliance status, reputation, risk flags, a verdict (Safe, Caution or Not Recommended) with optional conditions, and a mitigation strategy (payment terms, verification actions, safeguards). Finish with a one-sentence executive summary.\n\
         \n\
         Return JSON matching this shape:\n\
         {REPORT_SHAPE}"
    )
}

/// Runs one grounded reliability analysis for `supplier`.
///
/// Extraction failures propagate as-is; there is no default report.
pub fn analyze_company_reliability(
    model: &dyn GenerativeModel,
    supplier: &Supplier,
) -> Result<ReliabilityReport, SourcingError> {
    run_analysis(model, supplier).0
}

/// Like [`analyze_company_reliability`], also handing back the finish
/// reason. `MAX_TOKENS` here usually explains a truncated report.
pub(crate) fn run_analysis(
    model: &dyn GenerativeModel,
    supplier: &Supplier,
) -> (Result<ReliabilityReport, SourcingError>, Option<String>) {
    let request = GenerateRequest {
        prompt: build_analysis_prompt(supplier),
        image: None,
        web_search: true,
        temperature: Some(ANALYSIS_TEMPERATURE),
        thinking_budget: Some(ANALYSIS_THINKING_BUDGET),
        max_output_tokens: Some(ANALYSIS_MAX_OUTPUT_TOKENS),
        response_schema: Some(report_schema()),
    };
    match model.generate(&request) {
        Ok(response) => (map_analysis_text(&response.text), response.finish_reason),
        Err(err) => (Err(err), None),
    }
}

pub(crate) fn map_analysis_text(text: &str) -> Result<ReliabilityReport, SourcingError> {
    let parsed = extract_json(text)?;
    if !parsed.is_object() {
        return Err(SourcingError::UnexpectedShape {
            expected: "object",
            found: value_kind(&parsed),
        });
    }
    Ok(ReliabilityReport::from_value(&parsed))
}

fn or_na(value: &str) -> &str {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        "N/A"
    } else {
        trimmed
    }
}
