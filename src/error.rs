// ⚠️ Error Types - Validation failures that must never be coerced
// Region codes, person counts and rule tables fail fast here instead of
// propagating silently-wrong identifiers or totals.

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum OdError {
    #[error("invalid region code '{value}': expected {width} ASCII digits")]
    InvalidRegionCode { value: String, width: usize },

    #[error("invalid person count '{0}': expected a non-negative whole number")]
    InvalidPersonCount(String),

    #[error("person count overflow on edge {source_code} -> {target_code}")]
    CountOverflow {
        source_code: String,
        target_code: String,
    },

    #[error("missing field '{field}' at column {column}")]
    MissingField { field: &'static str, column: usize },

    #[error("invalid rule for {code}: {reason}")]
    InvalidRule { code: String, reason: String },

    #[error(
        "unsupported split composition: edge {source_code} -> {target_code} needs both sides split under the same rule"
    )]
    UnsupportedSplitComposition {
        source_code: String,
        target_code: String,
    },

    #[error("{count} malformed migration records in {file} (first at line {first_line}: {first_reason})")]
    RejectedRecords {
        file: String,
        count: usize,
        first_line: usize,
        first_reason: String,
    },
}

pub type OdResult<T> = std::result::Result<T, OdError>;
