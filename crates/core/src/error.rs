#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Not ready: {0}")]
    NotReady(String),

    #[error("No usable results: {0}")]
    NoUsableResults(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
