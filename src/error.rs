// Error taxonomy for normalization and report building.

use crate::aggregate::EligibilityReport;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    /// The document carried no content; the student is skipped.
    #[error("document is empty")]
    EmptyDocument,

    /// The document is present but its top-level shape is unusable.
    #[error("malformed document: {reason}")]
    MalformedDocument { reason: String },

    /// A record timestamp did not match `YYYY-MM-DD-HH-mm`; the record is dropped.
    #[error("invalid record date {value:?}")]
    DateParse {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    /// A record body could not be read; the record is dropped.
    #[error("malformed record {id}: {reason}")]
    MalformedRecord { id: String, reason: String },

    /// No eligible record fell on any target date. The eligibility report
    /// is still carried so callers can emit it.
    #[error("no records found for the target dates")]
    EmptyResult { eligibility: EligibilityReport },

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ReportError>;
