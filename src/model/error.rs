use thiserror::Error;

use crate::model::entity::QuestionRuleViolation;

pub type DatabaseResult<T> = std::result::Result<T, DatabaseError>;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("sqlx migrate error: {0}")]
    SqlxMigrateError(#[from] sqlx::migrate::MigrateError),
    #[error("sqlx error: {0}")]
    SqlxError(#[from] sqlx::Error),
    #[error("access to this resource is forbidden")]
    Forbidden,
    #[error("question #{index} rejected: {violation}")]
    InvalidQuestion {
        index: usize,
        violation: QuestionRuleViolation,
    },
}

impl DatabaseError {
    /// `true` when the underlying failure is a unique-constraint violation.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::SqlxError(sqlx::Error::Database(e)) => e.is_unique_violation(),
            _ => false,
        }
    }
}
