use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::coerce::{clamp_score, list_field, number_field, text_field};

/// Deep-dive credit and reliability assessment of one supplier.
///
/// Every field may be missing. A missing field means "unknown"; it is never
/// read as false, zero or safe.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReliabilityReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<CompanySnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<ScoreAssessment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub financials: Option<FinancialSignals>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trade_history: Option<TradeHistory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compliance: Option<ComplianceStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reputation: Option<Reputation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub risk_flags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<Verdict>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mitigation: Option<Mitigation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executive_summary: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanySnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legal_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incorporation_year: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ownership: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub core_activities: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreAssessment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialSignals {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creditworthiness: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_behavior: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub red_flags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeHistory {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience_years: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markets: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consistency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inspections: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_status: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub certifications: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legal_issues: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reputation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub online_presence: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerdictStatus {
    Safe,
    Caution,
    #[serde(rename = "Not Recommended")]
    NotRecommended,
}

impl VerdictStatus {
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized = label
            .trim()
            .to_ascii_lowercase()
            .replace(['_', '-'], " ");
        match normalized.as_str() {
            "safe" => Some(Self::Safe),
            "caution" => Some(Self::Caution),
            "not recommended" | "notrecommended" => Some(Self::NotRecommended),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Safe => "Safe",
            Self::Caution => "Caution",
            Self::NotRecommended => "Not Recommended",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<VerdictStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mitigation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_terms: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_actions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safeguards: Option<String>,
}

fn group<'a>(root: &'a Value, key: &str) -> Option<&'a Value> {
    root.get(key).filter(|value| value.is_object())
}

impl ReliabilityReport {
    /// Maps the model's JSON object field by field. Unusable fields are
    /// dropped to `None` individually instead of failing the whole report.
    pub fn from_value(root: &Value) -> Self {
        Self {
            snapshot: group(root, "snapshot").map(|value| CompanySnapshot {
                legal_name: text_field(value, "legalName"),
                location: text_field(value, "location"),
                incorporation_year: text_field(value, "incorporationYear"),
                ownership: text_field(value, "ownership"),
                core_activities: text_field(value, "coreActivities"),
            }),
            score: group(root, "score").map(|value| ScoreAssessment {
                value: number_field(value, "value").map(clamp_score),
                category: text_field(value, "category"),
            }),
            financials: group(root, "financials").map(|value| FinancialSignals {
                creditworthiness: text_field(value, "creditworthiness"),
                payment_behavior: text_field(value, "paymentBehavior"),
                red_flags: list_field(value, "redFlags"),
            }),
            trade_history: group(root, "tradeHistory").map(|value| TradeHistory {
                experience_years: text_field(value, "experienceYears"),
                markets: text_field(value, "markets"),
                consistency: text_field(value, "consistency"),
                inspections: text_field(value, "inspections"),
            }),
            compliance: group(root, "compliance").map(|value| ComplianceStatus {
                registration_status: text_field(value, "registrationStatus"),
                certifications: list_field(value, "certifications"),
                legal_issues: text_field(value, "legalIssues"),
            }),
            reputation: group(root, "reputation").map(|value| Reputation {
                summary: text_field(value, "summary"),
                feedback: text_field(value, "feedback"),
                online_presence: text_field(value, "onlinePresence"),
            }),
            risk_flags: list_field(root, "riskFlags"),
            verdict: group(root, "verdict").map(|value| Verdict {
                status: text_field(value, "status")
                    .and_then(|label| VerdictStatus::from_label(&label)),
                conditions: text_field(value, "conditions"),
            }),
            mitigation: group(root, "mitigation").map(|value| Mitigation {
                payment_terms: text_field(value, "paymentTerms"),
                verification_actions: text_field(value, "verificationActions"),
                safeguards: text_field(value, "safeguards"),
            }),
            executive_summary: text_field(root, "executiveSummary"),
        }
    }

    pub fn verdict_status(&self) -> Option<VerdictStatus> {
        self.verdict.as_ref().and_then(|verdict| verdict.status)
    }

    pub fn score_value(&self) -> Option<f64> {
        self.score.as_ref().and_then(|score| score.value)
    }
}
