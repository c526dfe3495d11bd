use serde_json::Value;
use thiserror::Error;

/// Failure modes of [`extract_json`].
///
/// `MalformedJson` keeps the offending span for the event log; it is never
/// meant to be shown to an end user.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("no JSON object or array found in model response")]
    NoJsonFound,
    #[error("JSON in model response is unterminated (opened at byte {start})")]
    UnterminatedJson { start: usize },
    #[error("malformed JSON in model response: {source}")]
    MalformedJson {
        candidate: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ExtractError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoJsonFound => "no_json_found",
            Self::UnterminatedJson { .. } => "unterminated_json",
            Self::MalformedJson { .. } => "malformed_json",
        }
    }

    pub fn candidate(&self) -> Option<&str> {
        match self {
            Self::MalformedJson { candidate, .. } => Some(candidate.as_str()),
            _ => None,
        }
    }
}

/// Best-effort JSON extraction from free-form model output.
///
/// 1. parse the whole text
/// 2. otherwise parse the span from the first `{`/`[` to the last `}`/`]`
///
/// Multiple independent values in one text are over-captured by step 2 and
/// fail as `MalformedJson`; no brace balancing is attempted.
pub fn extract_json(text: &str) -> Result<Value, ExtractError> {
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return Ok(value);
    }

    let start = match (text.find('{'), text.find('[')) {
        (Some(brace), Some(bracket)) => brace.min(bracket),
        (Some(index), None) | (None, Some(index)) => index,
        (None, None) => return Err(ExtractError::NoJsonFound),
    };
    let end = match (text.rfind('}'), text.rfind(']')) {
        (Some(brace), Some(bracket)) => Some(brace.max(bracket)),
        (Some(index), None) | (None, Some(index)) => Some(index),
        (None, None) => None,
    };
    let Some(end) = end.filter(|end| *end > start) else {
        return Err(ExtractError::UnterminatedJson { start });
    };

    // Both bounds sit on ASCII delimiters, so the slice is on char boundaries.
    let candidate = &text[start..=end];
    serde_json::from_str::<Value>(candidate).map_err(|source| ExtractError::MalformedJson {
        candidate: candidate.to_string(),
        source,
    })
}
