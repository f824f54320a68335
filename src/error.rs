use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssignmentError {
    #[error("recommender is not initialized; set a credential first")]
    NotInitialized,
    #[error("credential was rejected by the recommender")]
    InvalidCredential,
    #[error("recommender reply is malformed: {0}")]
    MalformedResponse(String),
    #[error("a recommender call is already in flight")]
    RequestInFlight,
    #[error(transparent)]
    Transport(anyhow::Error),
    #[error("credential storage failed: {0}")]
    Storage(anyhow::Error),
}

pub type AssignmentResult<T> = std::result::Result<T, AssignmentError>;
