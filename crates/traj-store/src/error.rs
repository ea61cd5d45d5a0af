use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrajError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("out of range: {0}")]
    OutOfRange(String),
    #[error("invalid time range: {0}")]
    InvalidRange(String),
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),
    #[error("no atom correspondence: {0}")]
    Unmatchable(String),
    #[error("parse failure: {0}")]
    ParseFailure(String),
    #[error("loading cancelled")]
    Cancelled,
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("invalid argument: {0}")]
    Invalid(String),
}

pub type TrajResult<T> = Result<T, TrajError>;

impl TrajError {
    /// Short stable identifier used in progress events.
    pub fn code(&self) -> &'static str {
        match self {
            TrajError::Io(_) => "io",
            TrajError::Json(_) => "json",
            TrajError::OutOfRange(_) => "out_of_range",
            TrajError::InvalidRange(_) => "invalid_range",
            TrajError::DimensionMismatch(_) => "dimension_mismatch",
            TrajError::Unmatchable(_) => "unmatchable",
            TrajError::ParseFailure(_) => "parse_failure",
            TrajError::Cancelled => "cancelled",
            TrajError::Unsupported(_) => "unsupported",
            TrajError::Invalid(_) => "invalid",
        }
    }
}

pub(crate) fn check_index(kind: &str, idx: usize, len: usize) -> TrajResult<()> {
    if idx >= len {
        return Err(TrajError::OutOfRange(format!(
            "{kind} index {idx} outside [0, {len})"
        )));
    }
    Ok(())
}
