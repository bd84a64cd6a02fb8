use crate::store::StoreError;

/// Failures of team operations, shared by both request surfaces
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("{0}")]
    Validation(String),

    #[error("Team {0} not found or inactive")]
    NotFound(String),

    #[error("Target team is too far away ({distance:.2} m)")]
    TooFar { distance: f64 },

    #[error("Team {0} was already eliminated")]
    AlreadyEliminated(String),

    #[error("Team store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GameError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Stable machine-readable code for error payloads
    pub fn code(&self) -> &'static str {
        match self {
            GameError::Validation(_) => "validation",
            GameError::NotFound(_) => "not_found",
            GameError::TooFar { .. } => "too_far",
            GameError::AlreadyEliminated(_) => "already_eliminated",
            GameError::StoreUnavailable(_) => "store_unavailable",
            GameError::Internal(_) => "internal",
        }
    }

    /// Measured distance, for out-of-range eliminations
    pub fn distance(&self) -> Option<f64> {
        match self {
            GameError::TooFar { distance } => Some(*distance),
            _ => None,
        }
    }
}

impl From<StoreError> for GameError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => GameError::StoreUnavailable(msg),
            other => GameError::Internal(other.to_string()),
        }
    }
}

pub type GameResult<T> = Result<T, GameError>;
