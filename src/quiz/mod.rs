//! AI-assisted quiz drafting: document text -> prompt -> generator -> validated questions.

mod error;
pub use error::{QuizError, QuizResult};

pub mod document;
pub use document::DocumentKind;

pub mod prompt;

mod client;
pub use client::{GeminiClient, QuizGenerator};

mod parse;
pub use parse::parse_questions;

use crate::model::entity::{QuestionDraft, QuestionType};
use crate::storage::{Disk, Storage};

pub const MIN_QUESTIONS: usize = 5;
pub const MAX_QUESTIONS: usize = 30;

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub question_count: usize,
    pub question_types: Vec<QuestionType>,
}

/// Drafts questions from a temporary document on [`Disk::Local`].
///
/// The document is deleted whatever the outcome.
#[tracing::instrument(skip(storage, generator))]
pub async fn draft_questions(
    storage: &Storage,
    generator: &dyn QuizGenerator,
    document: &str,
    request: &GenerationRequest,
) -> QuizResult<Vec<QuestionDraft>> {
    let result = try_draft_questions(storage, generator, document, request).await;
    storage.discard_temp(document).await;

    if let Err(e) = &result {
        tracing::warn!("quiz generation from `{document}` failed: {e}");
    }
    result
}

async fn try_draft_questions(
    storage: &Storage,
    generator: &dyn QuizGenerator,
    document: &str,
    request: &GenerationRequest,
) -> QuizResult<Vec<QuestionDraft>> {
    let kind = DocumentKind::from_file_name(document)
        .ok_or_else(|| QuizError::UnsupportedDocument(document.to_string()))?;
    let path = storage.resolve(Disk::Local, document)?;

    let text = document::extract_text(path, kind).await?;
    let prompt = prompt::build_prompt(&text, request.question_count, &request.question_types);
    let raw = generator.generate(&prompt).await?;

    parse_questions(&raw, request.question_count, &request.question_types)
}
