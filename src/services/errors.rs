use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum AttemptError {
    #[error("candidate is not eligible to start this exam")]
    Ineligible(Vec<String>),
    #[error("invalid access code")]
    InvalidAccessCode,
    #[error("attempt is not active")]
    AttemptNotActive,
    #[error("{0}")]
    InvalidState(String),
    #[error("attempt time has expired")]
    AttemptExpired,
    #[error("section time has expired")]
    SectionExpired,
    #[error("question is not part of this attempt")]
    QuestionNotInAttempt,
    #[error("invalid answer: {0}")]
    InvalidAnswer(String),
    #[error("invalid grade: {0}")]
    InvalidGrade(String),
    #[error("an unused attempt override already exists")]
    DuplicateOverride,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl AttemptError {
    pub(crate) fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    /// Errors raised after a lazy expiry was written. The transaction must still commit.
    pub(crate) fn keeps_writes(&self) -> bool {
        matches!(self, Self::AttemptExpired)
    }
}
