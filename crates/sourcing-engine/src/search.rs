use std::collections::HashSet;

use serde_json::{json, Value};
use sourcing_contracts::coerce::{text_field, value_kind};
use sourcing_contracts::extract::extract_json;
use sourcing_contracts::types::{SearchResult, SourcingParams, Supplier};
use sourcing_contracts::SourcingError;

use crate::model::{GenerateRequest, GenerateResponse, GenerativeModel};

const SEARCH_RESPONSE_SHAPE: &str = r#"{
  "summary": "string, short market overview",
  "suppliers": [
    {
      "name": "string",
      "type": "Supplier" | "Trader",
      "address": "string",
      "country": "string",
      "website": "string",
      "contact": "string, email or phone",
      "materialMatch": "string, the matching product",
      "certifications": ["string"],
      "reliabilityScore": "number 0-100",
      "whyScore": "string, reason for the score"
    }
  ]
}"#;

/// Structured-output schema sent alongside the prompt. Only the fields the
/// mapper cannot default are required.
pub fn search_response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "summary": {"type": "STRING"},
            "suppliers": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "name": {"type": "STRING"},
                        "type": {"type": "STRING", "enum": ["Supplier", "Trader"]},
                        "address": {"type": "STRING"},
                        "country": {"type": "STRING"},
                        "website": {"type": "STRING"},
                        "contact": {"type": "STRING"},
                        "materialMatch": {"type": "STRING"},
                        "certifications": {"type": "ARRAY", "items": {"type": "STRING"}},
                        "reliabilityScore": {"type": "NUMBER"},
                        "whyScore": {"type": "STRING"}
                    },
                    "required": ["name", "type", "country", "website", "reliabilityScore"]
                }
            }
        },
        "required": ["summary", "suppliers"]
    })
}

pub fn build_search_prompt(params: &SourcingParams) -> String {
    let material = or_placeholder(Some(params.material.as_str()), "N/A");
    let keywords = or_placeholder(params.keywords.as_deref(), "N/A");
    let country = or_placeholder(params.country_filter.as_deref(), "Global");
    let requirements = or_placeholder(params.additional_requirements.as_deref(), "N/A");
    let image_line = if params.has_image() {
        "\n- A reference image of the product is provided."
    } else {
        ""
    };

    format!(
        "Act as an expert global procurement officer. Find the most reliable suppliers and traders for the following request:\n\
         - Product/Material: {material}\n\
         - Keywords: {keywords}\n\
         - Country Filter: {country}\n\
         - Additional Requirements: {requirements}{image_line}\n\
         \n\
         Search for active companies with verified websites and certifications. Distinguish between manufacturers (\"Supplier\") and distributors (\"Trader\").\n\
         \n\
         You MUST return a single JSON object and nothing else, matching this shape:\n\
         {SEARCH_RESPONSE_SHAPE}"
    )
}

/// Runs one grounded supplier search.
///
/// Transport and extraction failures are returned as errors; an empty
/// supplier list only ever means the model found nobody.
pub fn find_suppliers(
    model: &dyn GenerativeModel,
    params: &SourcingParams,
) -> Result<SearchResult, SourcingError> {
    run_search(model, params).0
}

/// Like [`find_suppliers`], also handing back the finish reason of the model
/// call when one was made.
pub(crate) fn run_search(
    model: &dyn GenerativeModel,
    params: &SourcingParams,
) -> (Result<SearchResult, SourcingError>, Option<String>) {
    let image = match params.inline_image() {
        Ok(image) => image,
        Err(err) => return (Err(err), None),
    };
    let request = GenerateRequest {
        prompt: build_search_prompt(params),
        image,
        web_search: true,
        response_schema: Some(search_response_schema()),
        ..GenerateRequest::default()
    };
    match model.generate(&request) {
        Ok(response) => {
            let result = map_search_response(&response, chrono::Utc::now().timestamp_millis());
            (result, response.finish_reason)
        }
        Err(err) => (Err(err), None),
    }
}

pub(crate) fn map_search_response(
    response: &GenerateResponse,
    stamp: i64,
) -> Result<SearchResult, SourcingError> {
    let parsed = extract_json(&response.text)?;
    if !parsed.is_object() {
        return Err(SourcingError::UnexpectedShape {
            expected: "object",
            found: value_kind(&parsed),
        });
    }

    let entries = parsed
        .get("suppliers")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter(|item| item.is_object()).collect::<Vec<_>>())
        .unwrap_or_default();
    let ids = assign_ids(&entries, stamp);
    let suppliers = entries
        .into_iter()
        .zip(ids)
        .map(|(entry, id)| Supplier::from_model_value(entry, id))
        .collect();

    Ok(SearchResult {
        summary: text_field(&parsed, "summary").unwrap_or_default(),
        suppliers,
        sources: response.citations.clone(),
    })
}

/// Keeps a model-supplied id when it is non-blank and unused, otherwise
/// assigns `s-{index}-{stamp}`.
fn assign_ids(entries: &[&Value], stamp: i64) -> Vec<String> {
    let mut used = HashSet::new();
    let mut ids = Vec::with_capacity(entries.len());
    for (idx, entry) in entries.iter().enumerate() {
        let id = text_field(entry, "id")
            .filter(|id| !used.contains(id))
            .unwrap_or_else(|| synthetic_id(idx, stamp, &used));
        used.insert(id.clone());
        ids.push(id);
    }
    ids
}

fn synthetic_id(idx: usize, stamp: i64, used: &HashSet<String>) -> String {
    let base = format!("s-{idx}-{stamp}");
    if !used.contains(&base) {
        return base;
    }
    (1..)
        .map(|n| format!("{base}-{n}"))
        .find(|candidate| !used.contains(candidate))
        .unwrap_or(base)
}

fn or_placeholder<'a>(value: Option<&'a str>, placeholder: &'a str) -> &'a str {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(placeholder)
}

#[cfg(test)]
mod tests {
    use sourcing_contracts::types::{GroundingSource, SupplierKind};
    use sourcing_contracts::ExtractError;

    use super::*;
    use crate::testing::ScriptedModel;

    #[test]
    fn prompt_fills_placeholders_for_missing_fields() {
        let prompt = build_search_prompt(&SourcingParams::new("Polypropylene Resin"));
        assert!(prompt.contains("- Product/Material: Polypropylene Resin\n"));
        assert!(prompt.contains("- Keywords: N/A\n"));
        assert!(prompt.contains("- Country Filter: Global\n"));
        assert!(prompt.contains("- Additional Requirements: N/A\n"));
        assert!(!prompt.contains("reference image"));
        assert!(prompt.contains("\"reliabilityScore\""));
    }

    #[test]
    fn prompt_mentions_reference_image() {
        let params = SourcingParams {
            material: String::new(),
            keywords: Some("food grade".to_string()),
            country_filter: Some("Vietnam".to_string()),
            image_data: Some("data:image/png;base64,aGVsbG8=".to_string()),
            ..SourcingParams::default()
        };
        let prompt = build_search_prompt(&params);
        assert!(prompt.contains("- Product/Material: N/A\n"));
        assert!(prompt.contains("- Keywords: food grade\n"));
        assert!(prompt.contains("- Country Filter: Vietnam\n"));
        assert!(prompt.contains("- A reference image of the product is provided.\n"));
    }

    #[test]
    fn maps_single_supplier_without_citations() {
        let model = ScriptedModel::text(
            r#"{"summary":"ok","suppliers":[{"name":"Acme","type":"Supplier","country":"DE","website":"https://acme.de","reliabilityScore":82}]}"#,
        );
        let result = find_suppliers(&model, &SourcingParams::new("Polypropylene Resin")).unwrap();

        assert_eq!(result.summary, "ok");
        assert_eq!(result.suppliers.len(), 1);
        assert!(result.sources.is_empty());
        let supplier = &result.suppliers[0];
        assert!(supplier.id.starts_with("s-0-"), "unexpected id {}", supplier.id);
        assert_eq!(supplier.name, "Acme");
        assert_eq!(supplier.kind, SupplierKind::Supplier);
        assert_eq!(supplier.reliability_score, 82.0);
        assert_eq!(supplier.contact, "");
    }

    #[test]
    fn request_enables_grounding_and_strips_image_prefix() {
        let model = ScriptedModel::text(r#"{"summary":"","suppliers":[]}"#);
        let params = SourcingParams {
            material: "PET bottles".to_string(),
            image_data: Some("data:image/jpeg;base64,aGVsbG8=".to_string()),
            image_mime_type: Some("image/jpeg".to_string()),
            ..SourcingParams::default()
        };
        find_suppliers(&model, &params).unwrap();

        let requests = model.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].web_search);
        assert_eq!(requests[0].response_schema, Some(search_response_schema()));
        let image = requests[0].image.as_ref().unwrap();
        assert_eq!(image.data, "aGVsbG8=");
        assert_eq!(image.mime_type, "image/jpeg");
    }

    #[test]
    fn schema_constrains_supplier_kind_and_required_fields() {
        let schema = search_response_schema();
        let item = &schema["properties"]["suppliers"]["items"];
        assert_eq!(item["properties"]["type"]["enum"], json!(["Supplier", "Trader"]));
        assert_eq!(item["properties"]["reliabilityScore"]["type"], json!("NUMBER"));
        assert_eq!(
            item["required"],
            json!(["name", "type", "country", "website", "reliabilityScore"])
        );
        assert_eq!(schema["required"], json!(["summary", "suppliers"]));
    }

    #[test]
    fn run_search_reports_the_finish_reason() {
        let model = ScriptedModel::text(r#"{"summary":"","suppliers":[]}"#).finishing_with("MAX_TOKENS");
        let (result, finish_reason) = run_search(&model, &SourcingParams::new("PET"));
        assert!(result.is_ok());
        assert_eq!(finish_reason.as_deref(), Some("MAX_TOKENS"));

        let failing = ScriptedModel::failing("connection reset");
        let (result, finish_reason) = run_search(&failing, &SourcingParams::new("PET"));
        assert!(result.is_err());
        assert_eq!(finish_reason, None);
    }

    #[test]
    fn invalid_image_fails_before_calling_the_model() {
        let model = ScriptedModel::text("{}");
        let params = SourcingParams {
            material: "PET".to_string(),
            image_data: Some("aGVsbG8=".to_string()),
            ..SourcingParams::default()
        };
        let err = find_suppliers(&model, &params).unwrap_err();
        assert!(matches!(err, SourcingError::InvalidInput(_)));
        assert!(model.requests().is_empty());
    }

    #[test]
    fn every_supplier_gets_an_id_and_numeric_score() {
        let model = ScriptedModel::text(
            "Sure! Here is what I found:\n```json\n{\"summary\":\"resin market\",\"suppliers\":[{\"name\":\"A\"},{\"name\":\"B\",\"reliabilityScore\":\"n/a\"},{\"name\":\"C\",\"reliabilityScore\":91.5}]}\n```",
        );
        let result = find_suppliers(&model, &SourcingParams::new("Polypropylene Resin")).unwrap();
        assert_eq!(result.suppliers.len(), 3);
        let ids = result
            .suppliers
            .iter()
            .map(|supplier| supplier.id.clone())
            .collect::<HashSet<_>>();
        assert_eq!(ids.len(), 3);
        for supplier in &result.suppliers {
            assert!(!supplier.id.is_empty());
            assert!(supplier.reliability_score.is_finite());
        }
        assert_eq!(result.suppliers[0].reliability_score, 0.0);
        assert_eq!(result.suppliers[2].reliability_score, 91.5);
    }

    #[test]
    fn duplicate_model_ids_are_replaced() {
        let response = GenerateResponse {
            text: r#"{"suppliers":[{"id":"x","name":"A"},{"id":"x","name":"B"},{"id":"s-2-7","name":"C"},{"name":"D"}]}"#.to_string(),
            ..GenerateResponse::default()
        };
        let result = map_search_response(&response, 7).unwrap();
        let ids = result
            .suppliers
            .iter()
            .map(|supplier| supplier.id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["x", "s-1-7", "s-2-7", "s-3-7"]);
        assert_eq!(result.summary, "");
    }

    #[test]
    fn synthetic_id_collision_gets_suffix() {
        let response = GenerateResponse {
            text: r#"{"suppliers":[{"id":"s-1-7"},{"name":"B"}]}"#.to_string(),
            ..GenerateResponse::default()
        };
        let result = map_search_response(&response, 7).unwrap();
        assert_eq!(result.suppliers[0].id, "s-1-7");
        assert_eq!(result.suppliers[1].id, "s-1-7-1");
    }

    #[test]
    fn citations_pass_through_in_order() {
        let citations = vec![
            GroundingSource {
                title: "b.com".to_string(),
                uri: "https://b.com".to_string(),
            },
            GroundingSource {
                title: "a.com".to_string(),
                uri: "https://a.com".to_string(),
            },
        ];
        let model = ScriptedModel::with_citations(r#"{"summary":"s"}"#, citations.clone());
        let result = find_suppliers(&model, &SourcingParams::new("steel coil")).unwrap();
        assert_eq!(result.sources, citations);
        assert!(result.suppliers.is_empty());
    }

    #[test]
    fn prose_only_reply_is_an_error_not_an_empty_result() {
        let model = ScriptedModel::text("I could not find any suppliers for that request.");
        let err = find_suppliers(&model, &SourcingParams::new("unobtainium")).unwrap_err();
        assert!(matches!(
            err,
            SourcingError::Extraction(ExtractError::NoJsonFound)
        ));
    }

    #[test]
    fn empty_reply_is_an_error() {
        let model = ScriptedModel::text("");
        let err = find_suppliers(&model, &SourcingParams::new("steel")).unwrap_err();
        assert_eq!(err.kind(), "no_json_found");
    }

    #[test]
    fn array_root_is_unexpected_shape() {
        let model = ScriptedModel::text(r#"[{"name":"Acme"}]"#);
        let err = find_suppliers(&model, &SourcingParams::new("steel")).unwrap_err();
        assert!(matches!(
            err,
            SourcingError::UnexpectedShape {
                expected: "object",
                found: "array"
            }
        ));
    }

    #[test]
    fn transport_failures_propagate() {
        let model = ScriptedModel::failing("connection reset");
        let err = find_suppliers(&model, &SourcingParams::new("steel")).unwrap_err();
        assert!(matches!(err, SourcingError::Transport { .. }));
    }
}
