use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::coerce::{clamp_score, list_field, number_field, text_field};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupplierKind {
    /// Manufacturer.
    #[default]
    Supplier,
    /// Distributor, wholesaler or agent.
    Trader,
}

impl SupplierKind {
    pub fn from_label(label: &str) -> Self {
        let lowered = label.trim().to_ascii_lowercase();
        let is_trader = ["trader", "trading", "distribut", "wholesal", "agent", "reseller"]
            .iter()
            .any(|needle| lowered.contains(needle));
        if is_trader {
            Self::Trader
        } else {
            Self::Supplier
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Supplier => "Supplier",
            Self::Trader => "Trader",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Supplier {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: SupplierKind,
    pub address: String,
    pub country: String,
    pub website: String,
    pub contact: String,
    pub material_match: String,
    pub certifications: Vec<String>,
    pub reliability_score: f64,
    pub why_score: String,
}

impl Supplier {
    /// Maps one entry of the model's `suppliers` array. The id is decided by
    /// the caller so uniqueness holds across the whole result set.
    pub fn from_model_value(value: &Value, id: String) -> Self {
        let text = |key: &str| text_field(value, key).unwrap_or_default();
        Self {
            id,
            name: text("name"),
            kind: text_field(value, "type")
                .map(|label| SupplierKind::from_label(&label))
                .unwrap_or_default(),
            address: text("address"),
            country: text("country"),
            website: text("website"),
            contact: text("contact"),
            material_match: text("materialMatch"),
            certifications: list_field(value, "certifications"),
            reliability_score: number_field(value, "reliabilityScore")
                .map(clamp_score)
                .unwrap_or(0.0),
            why_score: text("whyScore"),
        }
    }

    pub fn score_band(&self) -> ScoreBand {
        ScoreBand::from_score(self.reliability_score)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreBand {
    Excellent,
    Good,
    Fair,
    Weak,
}

impl ScoreBand {
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            Self::Excellent
        } else if score >= 75.0 {
            Self::Good
        } else if score >= 60.0 {
            Self::Fair
        } else {
            Self::Weak
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Fair => "fair",
            Self::Weak => "weak",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundingSource {
    pub title: String,
    pub uri: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub summary: String,
    pub suppliers: Vec<Supplier>,
    pub sources: Vec<GroundingSource>,
}

impl SearchResult {
    /// Suppliers ordered by score, best first. Display order only; the
    /// result keeps the model's order.
    pub fn ranked(&self) -> Vec<&Supplier> {
        let mut ranked = self.suppliers.iter().collect::<Vec<_>>();
        ranked.sort_by(|a, b| b.reliability_score.total_cmp(&a.reliability_score));
        ranked
    }
}
