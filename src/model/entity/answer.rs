use crate::model::entity::AnswerDraft;
use crate::model::repo::ResourceTyped;
use crate::model::{ModelManager, error::DatabaseResult};
use crate::web::AuthenticatedUser;
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use sqlx::prelude::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct Answer {
    id: Uuid,
    question_id: Uuid,
    answer_text: String,
    is_correct: bool,
    order_index: i32,
}

impl ResourceTyped for Answer {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::Question
    }
}

impl Answer {
    pub fn id(&self) -> uuid::Uuid {
        self.id
    }

    pub fn question_id(&self) -> uuid::Uuid {
        self.question_id
    }

    pub fn answer_text(&self) -> &str {
        &self.answer_text
    }

    pub fn is_correct(&self) -> bool {
        self.is_correct
    }

    pub fn order_index(&self) -> i32 {
        self.order_index
    }
}

impl Answer {
    pub(crate) async fn insert(
        conn: &mut PgConnection,
        question_id: Uuid,
        order_index: i32,
        draft: &AnswerDraft,
    ) -> DatabaseResult<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO answers (id, question_id, answer_text, is_correct, order_index) VALUES ($1,$2,$3,$4,$5)")
            .bind(id)
            .bind(question_id)
            .bind(draft.text.trim())
            .bind(draft.is_correct)
            .bind(order_index)
            .execute(conn)
            .await?;
        Ok(id)
    }

    pub async fn find_all_by_question(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        question_id: Uuid,
    ) -> DatabaseResult<Vec<Self>> {
        let rows: Vec<Self> = sqlx::query_as(
            r#"
            SELECT *
            FROM answers a
            WHERE a.question_id = $1
            ORDER BY a.order_index
            "#,
        )
        .bind(question_id)
        .fetch_all(mm.executor())
        .await?;

        Ok(rows)
    }

    /// All answers of a quiz, grouped by the caller.
    pub async fn find_all_by_quiz(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        quiz_id: Uuid,
    ) -> DatabaseResult<Vec<Self>> {
        let rows: Vec<Self> = sqlx::query_as(
            r#"
            SELECT a.*
            FROM answers a
            JOIN questions q ON q.id = a.question_id
            WHERE q.quiz_id = $1
            ORDER BY q.order_index, a.order_index
            "#,
        )
        .bind(quiz_id)
        .fetch_all(mm.executor())
        .await?;

        Ok(rows)
    }
}
