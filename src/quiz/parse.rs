use crate::model::entity::{QuestionDraft, QuestionType};
use crate::quiz::{QuizError, QuizResult};

/// Removes a surrounding markdown code fence (```json ... ```), if any.
fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // drop the info string (`json`) up to the first newline
    let rest = match rest.split_once('\n') {
        Some((_, body)) => body,
        None => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// Parses generator output into questions, rejecting the whole batch on the
/// first malformed item or on an item whose type is not in `allowed`.
/// At most `limit` questions are kept.
pub fn parse_questions(
    raw: &str,
    limit: usize,
    allowed: &[QuestionType],
) -> QuizResult<Vec<QuestionDraft>> {
    let mut drafts: Vec<QuestionDraft> = serde_json::from_str(strip_fences(raw))?;

    for (index, draft) in drafts.iter().enumerate() {
        if !allowed.contains(&draft.question_type) {
            return Err(QuizError::UnrequestedType {
                index,
                question_type: draft.question_type,
            });
        }
        draft
            .validate()
            .map_err(|violation| QuizError::InvalidQuestion { index, violation })?;
    }

    drafts.truncate(limit);
    if drafts.is_empty() {
        return Err(QuizError::NoQuestions);
    }
    Ok(drafts)
}
