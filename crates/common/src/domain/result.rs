use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Record already exists: {company_id} / {reporting_period}")]
    RecordAlreadyExists {
        company_id: String,
        reporting_period: String,
    },

    #[error("Batch already exists: {0}")]
    BatchAlreadyExists(String),

    #[error("Batch not found: {0}")]
    BatchNotFound(String),

    #[error("No records found")]
    NoRecordsFound,

    #[error("Malformed queue message: {0}")]
    MalformedMessage(String),

    #[error("Authentication required")]
    MissingToken,

    #[error("Invalid or expired token: {0}")]
    InvalidToken(String),

    #[error("Risk scoring failed: {0}")]
    RiskScoringError(String),

    #[error("Repository error: {0}")]
    RepositoryError(#[from] anyhow::Error),
}

impl DomainError {
    /// True when the error is a uniqueness-condition violation rather than a fault.
    pub fn is_conflict(&self) -> bool {
        matches!(self, DomainError::RecordAlreadyExists { .. })
    }
}
