mod params;
mod report;
mod supplier;

pub use params::{InlineImage, SourcingParams};
pub use report::{
    CompanySnapshot, ComplianceStatus, FinancialSignals, Mitigation, ReliabilityReport,
    Reputation, ScoreAssessment, TradeHistory, Verdict, VerdictStatus,
};
pub use supplier::{GroundingSource, ScoreBand, SearchResult, Supplier, SupplierKind};
