use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::model::entity::{Answer, Question, QuestionDraft, QuestionType, Quiz};
use crate::quiz::{MAX_QUESTIONS, MIN_QUESTIONS};
use crate::web::{WebError, WebResult};

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct QuizCreateBody {
    #[validate(length(min = 1, max = 200, message = "title must be 1 to 200 characters"))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[validate(range(min = 1, message = "time limit must be at least one minute"))]
    pub time_limit_minutes: Option<i32>,
    #[validate(range(min = 0, max = 100, message = "passing score must be between 0 and 100"))]
    pub passing_score: i32,
    pub due_date: Option<DateTime<Utc>>,
    #[validate(length(min = 1, message = "a quiz needs at least one question"))]
    pub questions: Vec<QuestionDraft>,
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct AnswerResponse {
    pub id: Uuid,
    pub text: String,
    /// Hidden from students
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct QuestionResponse {
    pub id: Uuid,
    pub text: String,
    pub question_type: QuestionType,
    pub order_index: i32,
    pub answers: Vec<AnswerResponse>,
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct QuizResponse {
    pub id: Uuid,
    pub lesson_id: Uuid,
    pub title: String,
    pub description: String,
    pub time_limit_minutes: Option<i32>,
    pub passing_score: i32,
    pub due_date: Option<DateTime<Utc>>,
    pub questions: Vec<QuestionResponse>,
}

impl QuizResponse {
    pub fn build(quiz: &Quiz, questions: Vec<(Question, Vec<Answer>)>, reveal: bool) -> Self {
        let questions = questions
            .into_iter()
            .map(|(question, answers)| QuestionResponse {
                id: question.id(),
                text: question.question_text().to_string(),
                question_type: question.question_type(),
                order_index: question.order_index(),
                answers: answers
                    .iter()
                    .map(|a| AnswerResponse {
                        id: a.id(),
                        text: a.answer_text().to_string(),
                        is_correct: reveal.then_some(a.is_correct()),
                    })
                    .collect(),
            })
            .collect();

        Self {
            id: quiz.id(),
            lesson_id: quiz.lesson_id(),
            title: quiz.title().to_string(),
            description: quiz.description().to_string(),
            time_limit_minutes: quiz.time_limit_minutes(),
            passing_score: quiz.passing_score(),
            due_date: quiz.due_date(),
            questions,
        }
    }
}

/// Multipart fields of the quiz generation form, as received.
#[derive(Debug, Default, utoipa::ToSchema)]
pub struct QuizGenerateForm {
    pub title: Option<String>,
    pub description: Option<String>,
    /// Minutes
    pub time_limit: Option<String>,
    pub passing_score: Option<String>,
    /// RFC 3339 timestamp
    pub due_date: Option<String>,
    /// Between 5 and 30
    pub question_count: Option<String>,
    /// Comma separated, e.g. `multiple_choice,true_false`; all types when empty
    pub question_types: Option<String>,
    /// PDF or DOCX source; holds the stored temporary path once received
    #[schema(value_type = String, format = Binary)]
    pub document: Option<String>,
}

/// Validated generation form, minus the document.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizGenerateSettings {
    pub title: String,
    pub description: String,
    pub time_limit_minutes: Option<i32>,
    pub passing_score: i32,
    pub due_date: Option<DateTime<Utc>>,
    pub question_count: usize,
    pub question_types: Vec<QuestionType>,
}

impl QuizGenerateForm {
    /// Records a text field. Returns `false` for names the form does not know.
    pub fn set_text(&mut self, name: &str, value: String) -> bool {
        let slot = match name {
            "title" => &mut self.title,
            "description" => &mut self.description,
            "time_limit" => &mut self.time_limit,
            "passing_score" => &mut self.passing_score,
            "due_date" => &mut self.due_date,
            "question_count" => &mut self.question_count,
            "question_types" => &mut self.question_types,
            _ => return false,
        };
        *slot = Some(value);
        true
    }

    pub fn settings(&self) -> WebResult<QuizGenerateSettings> {
        let title = self.title.as_deref().map(str::trim).unwrap_or_default();
        if title.is_empty() || title.chars().count() > 200 {
            return Err(WebError::validation("title", "title must be 1 to 200 characters"));
        }

        let time_limit_minutes = match non_blank(&self.time_limit) {
            Some(raw) => match raw.parse::<i32>() {
                Ok(minutes) if minutes >= 1 => Some(minutes),
                _ => {
                    return Err(WebError::validation(
                        "time_limit",
                        "time limit must be a whole number of minutes, at least one",
                    ));
                }
            },
            None => None,
        };

        let passing_score = non_blank(&self.passing_score)
            .and_then(|raw| raw.parse::<i32>().ok())
            .filter(|score| (0..=100).contains(score))
            .ok_or_else(|| {
                WebError::validation("passing_score", "passing score must be between 0 and 100")
            })?;

        let due_date = match non_blank(&self.due_date) {
            Some(raw) => Some(raw.parse::<DateTime<Utc>>().map_err(|_| {
                WebError::validation("due_date", "due date must be an RFC 3339 timestamp")
            })?),
            None => None,
        };

        let question_count = non_blank(&self.question_count)
            .and_then(|raw| raw.parse::<usize>().ok())
            .filter(|count| (MIN_QUESTIONS..=MAX_QUESTIONS).contains(count))
            .ok_or_else(|| {
                WebError::validation(
                    "question_count",
                    format!("question count must be between {MIN_QUESTIONS} and {MAX_QUESTIONS}"),
                )
            })?;

        let mut question_types = Vec::new();
        for raw in non_blank(&self.question_types).unwrap_or_default().split(',') {
            if raw.trim().is_empty() {
                continue;
            }
            let kind = raw
                .parse::<QuestionType>()
                .map_err(|e| WebError::validation("question_types", e.to_string()))?;
            if !question_types.contains(&kind) {
                question_types.push(kind);
            }
        }
        if question_types.is_empty() {
            question_types = vec![QuestionType::MultipleChoice, QuestionType::TrueFalse];
        }

        Ok(QuizGenerateSettings {
            title: title.to_string(),
            description: self.description.as_deref().unwrap_or_default().trim().to_string(),
            time_limit_minutes,
            passing_score,
            due_date,
            question_count,
            question_types,
        })
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
