use crate::model::access::HasOwner;
use crate::model::entity::{Answer, Question, QuestionDraft, validate_all};
use crate::model::repo::ResourceTyped;
use crate::model::{ModelManager, error::DatabaseResult};
use crate::web::AuthenticatedUser;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct Quiz {
    id: Uuid,
    lesson_id: Uuid,
    title: String,
    description: String,
    time_limit_minutes: Option<i32>,
    passing_score: i32,
    due_date: Option<DateTime<Utc>>,
}

impl ResourceTyped for Quiz {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::Quiz
    }
}

impl Quiz {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn lesson_id(&self) -> Uuid {
        self.lesson_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn time_limit_minutes(&self) -> Option<i32> {
        self.time_limit_minutes
    }

    pub fn passing_score(&self) -> i32 {
        self.passing_score
    }

    pub fn due_date(&self) -> Option<DateTime<Utc>> {
        self.due_date
    }
}

#[derive(Debug, Clone)]
pub struct QuizCreate {
    pub lesson_id: Uuid,
    pub title: String,
    pub description: String,
    pub time_limit_minutes: Option<i32>,
    pub passing_score: i32,
    pub due_date: Option<DateTime<Utc>>,
}

impl Quiz {
    /// Inserts the quiz and every question with its answers atomically.
    /// Nothing is written when any draft breaks the question rules.
    #[tracing::instrument(skip(mm, _actor, questions), fields(questions = questions.len()))]
    pub async fn create_with_questions(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: QuizCreate,
        questions: &[QuestionDraft],
    ) -> DatabaseResult<Self> {
        validate_all(questions)?;

        let mut tx = mm.begin().await?;
        let quiz: Quiz = sqlx::query_as(
            r#"
            INSERT INTO quizzes (id, lesson_id, title, description, time_limit_minutes, passing_score, due_date)
            VALUES ($1,$2,$3,$4,$5,$6,$7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(data.lesson_id)
        .bind(&data.title)
        .bind(&data.description)
        .bind(data.time_limit_minutes)
        .bind(data.passing_score)
        .bind(data.due_date)
        .fetch_one(&mut *tx)
        .await?;

        for (position, draft) in (0..).zip(questions) {
            Question::insert(&mut *tx, quiz.id, position, draft).await?;
        }
        tx.commit().await?;

        tracing::info!(quiz_id = %quiz.id, "quiz created");
        Ok(quiz)
    }

    pub async fn find_by_id(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        id: Uuid,
    ) -> DatabaseResult<Option<Self>> {
        let result = sqlx::query_as("SELECT * FROM quizzes WHERE id = $1")
            .bind(id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(result)
    }

    pub async fn all_by_lesson(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        lesson_id: Uuid,
    ) -> DatabaseResult<Vec<Self>> {
        let result = sqlx::query_as("SELECT * FROM quizzes WHERE lesson_id = $1 ORDER BY title")
            .bind(lesson_id)
            .fetch_all(mm.executor())
            .await?;
        Ok(result)
    }

    /// Questions in order, each paired with its answers in order.
    pub async fn questions(
        &self,
        mm: &ModelManager,
        actor: &AuthenticatedUser,
    ) -> DatabaseResult<Vec<(Question, Vec<Answer>)>> {
        let questions = Question::all_by_quiz(mm, actor, self.id).await?;
        let mut answers = Answer::find_all_by_quiz(mm, actor, self.id).await?;

        let mut result = Vec::with_capacity(questions.len());
        for question in questions {
            let (own, rest): (Vec<Answer>, Vec<Answer>) = answers
                .into_iter()
                .partition(|a| a.question_id() == question.id());
            answers = rest;
            result.push((question, own));
        }
        Ok(result)
    }

    pub async fn delete(self, mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<()> {
        sqlx::query("DELETE FROM quizzes WHERE id = $1")
            .bind(self.id)
            .execute(mm.executor())
            .await?;
        Ok(())
    }
}

#[async_trait]
impl HasOwner for Quiz {
    type OwnerId = Uuid;

    async fn get_owner_id(
        &self,
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
    ) -> DatabaseResult<Self::OwnerId> {
        let owner: Uuid = sqlx::query_scalar(
            r#"
            SELECT c.instructor_id
            FROM lessons l
            JOIN courses c ON c.id = l.course_id
            WHERE l.id = $1
            "#,
        )
        .bind(self.lesson_id)
        .fetch_one(mm.executor())
        .await?;
        Ok(owner)
    }
}
