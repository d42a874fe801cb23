//! Error Types for the P2P Calculator

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CalcError>;

#[derive(Error, Debug)]
pub enum CalcError {
    #[error("Rate source error: {0}")]
    RateSource(String),

    #[error("Field `{field}` missing from {source_name} response")]
    MissingField {
        source_name: String,
        field: String,
    },

    #[error("Invalid rate: {0}")]
    InvalidRate(String),

    #[error("Premium {0}% is outside the allowed range")]
    PremiumOutOfRange(rust_decimal::Decimal),

    #[error("Rate feed stopped")]
    FeedStopped,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
