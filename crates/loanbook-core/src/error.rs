use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoanBookError {
    #[error("Invalid input: {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("No outstanding instalment for loan {loan_id}")]
    NoOutstandingInstalment { loan_id: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Concurrent modification of schedule entry {entry_id}; re-read and retry")]
    ConcurrentModification { entry_id: String },

    #[error("Date error: {0}")]
    DateError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl LoanBookError {
    /// Arithmetic on `field` left the range a `Decimal` can represent.
    pub fn overflow(field: &str) -> Self {
        LoanBookError::InvalidInput {
            field: field.to_string(),
            reason: "Amount exceeds the representable decimal range".into(),
        }
    }
}

impl From<serde_json::Error> for LoanBookError {
    fn from(e: serde_json::Error) -> Self {
        LoanBookError::SerializationError(e.to_string())
    }
}
