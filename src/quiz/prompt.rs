use std::sync::LazyLock;

use regex::Regex;

use crate::model::entity::QuestionType;

/// Upper bound of source characters embedded in a prompt.
pub const MAX_SOURCE_CHARS: usize = 18_000;

static TAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("Invalid tag regex"));
static WHITESPACE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("Invalid whitespace regex"));

/// Strips markup, collapses whitespace and caps the length.
pub fn clean_source(raw: &str) -> String {
    let stripped = TAG_REGEX.replace_all(raw, " ");
    let collapsed = WHITESPACE_REGEX.replace_all(&stripped, " ");
    collapsed.trim().chars().take(MAX_SOURCE_CHARS).collect()
}

fn describe(question_type: QuestionType) -> &'static str {
    match question_type {
        QuestionType::MultipleChoice => {
            "\"multiple_choice\" (3 to 5 answers, at least one correct)"
        }
        QuestionType::TrueFalse => {
            "\"true_false\" (exactly 2 answers, \"True\" and \"False\", one correct)"
        }
    }
}

pub fn build_prompt(source: &str, question_count: usize, types: &[QuestionType]) -> String {
    let types = types
        .iter()
        .map(|t| describe(*t))
        .collect::<Vec<_>>()
        .join(", ");
    let source = clean_source(source);

    format!(
        "You are writing a quiz for an online course lesson.\n\
         Create exactly {question_count} questions based only on the lesson material below.\n\
         Allowed question types: {types}.\n\
         Respond with a JSON array and nothing else. Each element must look like:\n\
         {{\"question\": \"...\", \"type\": \"multiple_choice\", \"answers\": [{{\"text\": \"...\", \"is_correct\": true}}]}}\n\
         \n\
         Lesson material:\n\
         \"\"\"\n{source}\n\"\"\""
    )
}
