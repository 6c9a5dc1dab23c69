use crate::model::entity::Answer;
use crate::model::error::{DatabaseError, DatabaseResult};
use crate::model::repo::ResourceTyped;
use crate::model::ModelManager;
use crate::web::AuthenticatedUser;
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use sqlx::{PgConnection, Postgres, Transaction};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    TrueFalse,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MultipleChoice => "multiple_choice",
            Self::TrueFalse => "true_false",
        }
    }
}

impl std::fmt::Display for QuestionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown question type `{0}`")]
pub struct UnknownQuestionType(pub String);

impl FromStr for QuestionType {
    type Err = UnknownQuestionType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "multiple_choice" => Ok(Self::MultipleChoice),
            "true_false" => Ok(Self::TrueFalse),
            other => Err(UnknownQuestionType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QuestionRuleViolation {
    #[error("question text is blank")]
    BlankQuestion,
    #[error("a question needs at least two answers")]
    TooFewAnswers,
    #[error("a true/false question needs exactly two answers, got {0}")]
    TrueFalseAnswerCount(usize),
    #[error("no answer is marked correct")]
    NoCorrectAnswer,
    #[error("answer text is blank")]
    BlankAnswer,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, utoipa::ToSchema)]
pub struct AnswerDraft {
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

/// A question with its answers, not yet persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, utoipa::ToSchema)]
pub struct QuestionDraft {
    #[serde(alias = "question")]
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub answers: Vec<AnswerDraft>,
}

impl QuestionDraft {
    pub fn validate(&self) -> Result<(), QuestionRuleViolation> {
        if self.text.trim().is_empty() {
            return Err(QuestionRuleViolation::BlankQuestion);
        }
        if self.answers.len() < 2 {
            return Err(QuestionRuleViolation::TooFewAnswers);
        }
        if self.question_type == QuestionType::TrueFalse && self.answers.len() != 2 {
            return Err(QuestionRuleViolation::TrueFalseAnswerCount(self.answers.len()));
        }
        if self.answers.iter().any(|a| a.text.trim().is_empty()) {
            return Err(QuestionRuleViolation::BlankAnswer);
        }
        if !self.answers.iter().any(|a| a.is_correct) {
            return Err(QuestionRuleViolation::NoCorrectAnswer);
        }
        Ok(())
    }
}

/// Checks every draft, reporting the first offender by position.
pub fn validate_all(drafts: &[QuestionDraft]) -> DatabaseResult<()> {
    for (index, draft) in drafts.iter().enumerate() {
        draft
            .validate()
            .map_err(|violation| DatabaseError::InvalidQuestion { index, violation })?;
    }
    Ok(())
}

#[derive(Debug, Clone, FromRow)]
pub struct Question {
    id: Uuid,
    quiz_id: Uuid,
    question_text: String,
    question_type: String,
    order_index: i32,
}

impl ResourceTyped for Question {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::Question
    }
}

impl Question {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn quiz_id(&self) -> Uuid {
        self.quiz_id
    }

    pub fn question_text(&self) -> &str {
        &self.question_text
    }

    /// Rows are written only through `QuestionType`, so unknown text maps to the
    /// more permissive kind.
    pub fn question_type(&self) -> QuestionType {
        self.question_type
            .parse()
            .unwrap_or(QuestionType::MultipleChoice)
    }

    pub fn order_index(&self) -> i32 {
        self.order_index
    }
}

impl Question {
    /// Inserts the question and its answers on `conn`; the caller owns the transaction.
    pub(crate) async fn insert(
        conn: &mut PgConnection,
        quiz_id: Uuid,
        order_index: i32,
        draft: &QuestionDraft,
    ) -> DatabaseResult<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO questions (id, quiz_id, question_text, question_type, order_index) VALUES ($1,$2,$3,$4,$5)",
        )
        .bind(id)
        .bind(quiz_id)
        .bind(draft.text.trim())
        .bind(draft.question_type.as_str())
        .bind(order_index)
        .execute(&mut *conn)
        .await?;

        for (position, answer) in (0..).zip(&draft.answers) {
            Answer::insert(&mut *conn, id, position, answer).await?;
        }
        Ok(id)
    }

    pub async fn find_in_quiz(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        quiz_id: Uuid,
        question_id: Uuid,
    ) -> DatabaseResult<Option<Self>> {
        let result = sqlx::query_as("SELECT * FROM questions WHERE id = $1 AND quiz_id = $2")
            .bind(question_id)
            .bind(quiz_id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(result)
    }

    pub async fn all_by_quiz(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        quiz_id: Uuid,
    ) -> DatabaseResult<Vec<Self>> {
        let result = sqlx::query_as("SELECT * FROM questions WHERE quiz_id = $1 ORDER BY order_index")
            .bind(quiz_id)
            .fetch_all(mm.executor())
            .await?;
        Ok(result)
    }

    /// Replaces the text, type and full answer set in one transaction.
    pub async fn replace(
        mut self,
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        draft: QuestionDraft,
    ) -> DatabaseResult<Self> {
        draft
            .validate()
            .map_err(|violation| DatabaseError::InvalidQuestion {
                index: 0,
                violation,
            })?;

        let mut tx: Transaction<'static, Postgres> = mm.begin().await?;
        sqlx::query("UPDATE questions SET question_text = $1, question_type = $2 WHERE id = $3")
            .bind(draft.text.trim())
            .bind(draft.question_type.as_str())
            .bind(self.id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM answers WHERE question_id = $1")
            .bind(self.id)
            .execute(&mut *tx)
            .await?;
        for (position, answer) in (0..).zip(&draft.answers) {
            Answer::insert(&mut *tx, self.id, position, answer).await?;
        }
        tx.commit().await?;

        self.question_text = draft.text.trim().to_string();
        self.question_type = draft.question_type.as_str().to_string();
        Ok(self)
    }
}
