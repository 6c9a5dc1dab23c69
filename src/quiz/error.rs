use thiserror::Error;

use crate::model::entity::{QuestionRuleViolation, QuestionType};
use crate::storage::StorageError;

pub type QuizResult<T> = std::result::Result<T, QuizError>;

#[derive(Debug, Error)]
pub enum QuizError {
    #[error("unsupported document type `{0}`")]
    UnsupportedDocument(String),
    #[error("unable to read document: {0}")]
    Extraction(String),
    #[error("document contains no readable text")]
    EmptyDocument,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("extraction task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("generator request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("generator answered {status}: {body}")]
    Api { status: u16, body: String },
    #[error("generator returned no text")]
    EmptyResponse,
    #[error("generator output is not a question list: {0}")]
    MalformedResponse(#[from] serde_json::Error),
    #[error("generated question #{index} rejected: {violation}")]
    InvalidQuestion {
        index: usize,
        violation: QuestionRuleViolation,
    },
    #[error("generated question #{index} is `{}`, which was not requested", question_type.as_str())]
    UnrequestedType {
        index: usize,
        question_type: QuestionType,
    },
    #[error("generator returned no questions")]
    NoQuestions,
}
