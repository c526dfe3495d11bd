pub mod coerce;
pub mod error;
pub mod events;
pub mod extract;
pub mod rfq;
pub mod types;

pub use error::{ErrorCategory, SourcingError};
pub use extract::{extract_json, ExtractError};
