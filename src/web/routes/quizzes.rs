use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    model::{
        CrudRepository, ResourceTyped, check_manage,
        entity::{Lesson, Question, QuestionDraft, Quiz, QuizCreate},
    },
    quiz::{DocumentKind, GenerationRequest, QuizError, draft_questions},
    storage::TEMP_DOCUMENT_PREFIX,
    web::{
        AppState, AuthenticatedUser, ErrorResponse, RequestContext, WebError, WebResult,
        dto::quizzes::{QuestionResponse, QuizCreateBody, QuizGenerateForm, QuizResponse},
        middlewares,
        routes::{
            lessons::find_viewable_lesson,
            uploads::{MULTIPART_OVERHEAD, store_field},
        },
    },
};

/// Quiz creation lives under `/api/v1/lessons/`.
pub fn lesson_routes<S>(state: AppState) -> Router<S> {
    let body_limit =
        usize::try_from(state.max_document_bytes() + MULTIPART_OVERHEAD).unwrap_or(usize::MAX);

    let generate = Router::new()
        .route("/{id}/quizzes/generate", post(quizzes_generate_handler))
        .layer(DefaultBodyLimit::max(body_limit));

    Router::new()
        .route("/{id}/quizzes", post(quizzes_create_handler))
        .merge(generate)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            middlewares::extract_context_fn,
        ))
        .with_state(state)
}

pub fn routes<S>(state: AppState) -> Router<S> {
    Router::new()
        .route("/{id}", get(quizzes_get_handler).delete(quizzes_delete_handler))
        .route("/{id}/questions/{question_id}", put(questions_replace_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            middlewares::extract_context_fn,
        ))
        .with_state(state)
}

async fn find_managed_lesson(
    state: &AppState,
    user: &AuthenticatedUser,
    id: Uuid,
) -> WebResult<Lesson> {
    let lesson = Lesson::find_by_id(state.pool(), user, id)
        .await
        .map_err(|e| WebError::resource_fetch_error(Lesson::get_resource_type(), e))?
        .ok_or_else(|| WebError::resource_not_found(Lesson::get_resource_type()))?;

    check_manage(state.pool(), user, &lesson)
        .await
        .map_err(|e| WebError::from_database(Lesson::get_resource_type(), e))?;

    Ok(lesson)
}

async fn find_quiz(state: &AppState, user: &AuthenticatedUser, id: Uuid) -> WebResult<Quiz> {
    Quiz::find_by_id(state.pool(), user, id)
        .await
        .map_err(|e| WebError::resource_fetch_error(Quiz::get_resource_type(), e))?
        .ok_or_else(|| WebError::resource_not_found(Quiz::get_resource_type()))
}

#[utoipa::path(
    post,
    path = "/api/v1/lessons/{id}/quizzes",
    request_body = QuizCreateBody,
    description = "Creates a quiz with its questions in one go",
    params(
        ("id" = Uuid, Path, description = "ID of the lesson")
    ),
    responses(
        (status = 201, description = "Quiz created", body = QuizResponse),
        (status = 401, description = "You're not authorized", body = ErrorResponse),
        (status = 403, description = "You don't own this course", body = ErrorResponse),
        (status = 404, description = "Lesson not found", body = ErrorResponse),
        (status = 422, description = "Invalid quiz or question", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    security(
        ("cookie" = [])
    ),
    tag = "quizzes"
)]
async fn quizzes_create_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<QuizCreateBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let lesson = find_managed_lesson(&state, user, id).await?;
    payload.validate()?;

    let data = QuizCreate {
        lesson_id: lesson.id(),
        title: payload.title,
        description: payload.description,
        time_limit_minutes: payload.time_limit_minutes,
        passing_score: payload.passing_score,
        due_date: payload.due_date,
    };

    let quiz = Quiz::create_with_questions(state.pool(), user, data, &payload.questions)
        .await
        .map_err(|e| WebError::from_database(Quiz::get_resource_type(), e))?;

    respond_with_quiz(&state, user, quiz, StatusCode::CREATED).await
}

#[utoipa::path(
    post,
    path = "/api/v1/lessons/{id}/quizzes/generate",
    request_body(content = QuizGenerateForm, content_type = "multipart/form-data"),
    description = "Drafts quiz questions from a PDF or DOCX document with the AI generator. \
                   The document is never kept",
    params(
        ("id" = Uuid, Path, description = "ID of the lesson")
    ),
    responses(
        (status = 201, description = "Quiz created", body = QuizResponse),
        (status = 401, description = "You're not authorized", body = ErrorResponse),
        (status = 403, description = "You don't own this course", body = ErrorResponse),
        (status = 404, description = "Lesson not found", body = ErrorResponse),
        (status = 422, description = "Invalid form, or no quiz could be generated from the document", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    security(
        ("cookie" = [])
    ),
    tag = "quizzes"
)]
async fn quizzes_generate_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let lesson = find_managed_lesson(&state, user, id).await?;

    let mut form = QuizGenerateForm::default();
    let received = read_generate_form(&state, multipart, &mut form)
        .await
        .and_then(|()| form.settings());

    let (settings, document) = match (received, form.document.take()) {
        (Ok(settings), Some(document)) => (settings, document),
        (result, stored) => {
            if let Some(path) = stored {
                state.storage().discard_temp(&path).await;
            }
            return Err(result.err().unwrap_or_else(|| {
                WebError::validation("document", "a PDF or DOCX document is required")
            }));
        }
    };

    let request = GenerationRequest {
        question_count: settings.question_count,
        question_types: settings.question_types.clone(),
    };
    let drafts = draft_questions(state.storage(), state.generator(), &document, &request)
        .await
        .map_err(generation_error)?;

    let data = QuizCreate {
        lesson_id: lesson.id(),
        title: settings.title,
        description: settings.description,
        time_limit_minutes: settings.time_limit_minutes,
        passing_score: settings.passing_score,
        due_date: settings.due_date,
    };

    let quiz = Quiz::create_with_questions(state.pool(), user, data, &drafts)
        .await
        .map_err(|e| WebError::from_database(Quiz::get_resource_type(), e))?;

    tracing::info!(quiz_id = %quiz.id(), questions = drafts.len(), "quiz generated");
    respond_with_quiz(&state, user, quiz, StatusCode::CREATED).await
}

/// Reads every field of the form. The document is stored as soon as it arrives,
/// so `form.document` must be discarded by the caller on any later failure.
async fn read_generate_form(
    state: &AppState,
    mut multipart: Multipart,
    form: &mut QuizGenerateForm,
) -> WebResult<()> {
    loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|e| WebError::validation("document", format!("malformed form: {e}")))?;
        let Some(field) = field else {
            return Ok(());
        };

        let name = field.name().unwrap_or_default().to_string();
        if name == "document" {
            if form.document.is_some() {
                return Err(WebError::validation("document", "only one document is accepted"));
            }

            let kind = field
                .file_name()
                .and_then(DocumentKind::from_file_name)
                .ok_or_else(|| WebError::validation("document", "document must be a PDF or DOCX file"))?;

            let path = store_field(
                state,
                field,
                "document",
                TEMP_DOCUMENT_PREFIX,
                kind.extension(),
                state.max_document_bytes(),
            )
            .await?;
            form.document = Some(path);
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| WebError::validation(name.clone(), format!("unreadable field: {e}")))?;
        form.set_text(&name, value);
    }
}

fn generation_error(error: QuizError) -> WebError {
    match error {
        QuizError::Storage(e) => WebError::server_storage_error(e),
        QuizError::UnsupportedDocument(_) => {
            WebError::validation("document", "document must be a PDF or DOCX file")
        }
        QuizError::Extraction(_) | QuizError::EmptyDocument => {
            WebError::validation("document", "no text could be read from the document")
        }
        other => WebError::validation("document", format!("quiz could not be generated: {other}")),
    }
}

async fn respond_with_quiz(
    state: &AppState,
    user: &AuthenticatedUser,
    quiz: Quiz,
    status: StatusCode,
) -> WebResult<(StatusCode, Json<QuizResponse>)> {
    let questions = quiz
        .questions(state.pool(), user)
        .await
        .map_err(|e| WebError::resource_fetch_error(Quiz::get_resource_type(), e))?;

    Ok((status, Json(QuizResponse::build(&quiz, questions, true))))
}

#[utoipa::path(
    get,
    path = "/api/v1/quizzes/{id}",
    description = "Quiz with its questions. Correct answers are only revealed to the \
                   course instructor and admins",
    params(
        ("id" = Uuid, Path, description = "ID of the quiz")
    ),
    responses(
        (status = 200, description = "Quiz found", body = QuizResponse),
        (status = 401, description = "You're not authorized", body = ErrorResponse),
        (status = 403, description = "You're not enrolled in this course", body = ErrorResponse),
        (status = 404, description = "Quiz not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    security(
        ("cookie" = [])
    ),
    tag = "quizzes"
)]
async fn quizzes_get_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let quiz = find_quiz(&state, user, id).await?;
    find_viewable_lesson(&state, user, quiz.lesson_id()).await?;

    let reveal = check_manage(state.pool(), user, &quiz).await.is_ok();
    let questions = quiz
        .questions(state.pool(), user)
        .await
        .map_err(|e| WebError::resource_fetch_error(Quiz::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(QuizResponse::build(&quiz, questions, reveal))))
}

#[utoipa::path(
    put,
    path = "/api/v1/quizzes/{id}/questions/{question_id}",
    request_body = QuestionDraft,
    description = "Replaces a question's text, type and complete answer set",
    params(
        ("id" = Uuid, Path, description = "ID of the quiz"),
        ("question_id" = Uuid, Path, description = "ID of the question"),
    ),
    responses(
        (status = 200, description = "Question replaced", body = QuestionResponse),
        (status = 401, description = "You're not authorized", body = ErrorResponse),
        (status = 403, description = "You don't own this course", body = ErrorResponse),
        (status = 404, description = "Quiz or question not found", body = ErrorResponse),
        (status = 422, description = "Question breaks the answer rules", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    security(
        ("cookie" = [])
    ),
    tag = "quizzes"
)]
async fn questions_replace_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path((id, question_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<QuestionDraft>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let quiz = find_quiz(&state, user, id).await?;
    check_manage(state.pool(), user, &quiz)
        .await
        .map_err(|e| WebError::from_database(Quiz::get_resource_type(), e))?;

    let question = Question::find_in_quiz(state.pool(), user, quiz.id(), question_id)
        .await
        .map_err(|e| WebError::resource_fetch_error(Question::get_resource_type(), e))?
        .ok_or_else(|| WebError::resource_not_found(Question::get_resource_type()))?;

    question
        .replace(state.pool(), user, payload)
        .await
        .map_err(|e| WebError::from_database(Question::get_resource_type(), e))?;

    let questions = quiz
        .questions(state.pool(), user)
        .await
        .map_err(|e| WebError::resource_fetch_error(Quiz::get_resource_type(), e))?;

    let replaced = QuizResponse::build(&quiz, questions, true)
        .questions
        .into_iter()
        .find(|q| q.id == question_id)
        .ok_or_else(|| WebError::resource_not_found(Question::get_resource_type()))?;

    Ok((StatusCode::OK, Json(replaced)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/quizzes/{id}",
    description = "Deletes a quiz with its questions and answers",
    params(
        ("id" = Uuid, Path, description = "ID of the quiz")
    ),
    responses(
        (status = 200, description = "Quiz deleted"),
        (status = 401, description = "You're not authorized", body = ErrorResponse),
        (status = 403, description = "You don't own this course", body = ErrorResponse),
        (status = 404, description = "Quiz not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    security(
        ("cookie" = [])
    ),
    tag = "quizzes"
)]
async fn quizzes_delete_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let quiz = find_quiz(&state, user, id).await?;
    check_manage(state.pool(), user, &quiz)
        .await
        .map_err(|e| WebError::from_database(Quiz::get_resource_type(), e))?;

    quiz.delete(state.pool(), user)
        .await
        .map_err(|e| WebError::resource_fetch_error(Quiz::get_resource_type(), e))?;

    Ok(StatusCode::OK)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::entity::{QuestionRuleViolation, QuestionType};

    fn field_of(err: WebError) -> (String, u16) {
        let status = err.status_code().as_u16();
        match err {
            WebError::ValidationError(e) => (e.field, status),
            other => (other.to_string(), status),
        }
    }

    #[test]
    fn generation_failures_point_at_the_document() {
        for error in [
            QuizError::EmptyDocument,
            QuizError::NoQuestions,
            QuizError::Api {
                status: 503,
                body: String::from("overloaded"),
            },
            QuizError::InvalidQuestion {
                index: 2,
                violation: QuestionRuleViolation::NoCorrectAnswer,
            },
            QuizError::UnrequestedType {
                index: 0,
                question_type: QuestionType::MultipleChoice,
            },
        ] {
            assert_eq!(
                field_of(generation_error(error)),
                (String::from("document"), 422)
            );
        }
    }
}
