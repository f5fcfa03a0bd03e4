use std::collections::HashMap;

use bizboard_db::Session;
use bizboard_db::community;
use bizboard_db::users;
use bizboard_types::api::{
    AnswerCreated, CreateAnswerRequest, CreateQuestionRequest, LikeToggled, QuestionCreated,
    QuestionsResponse, ToggleLikeRequest, UpsertUserRequest, UserUpserted,
};
use bizboard_types::models::{LikeAction, QuestionDetail};
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::context::AuthContext;
use crate::dispatch::{Service, respond};
use crate::error::{ApiError, DomainError};
use crate::event::{Event, trailing_id};

/// The Q&A board: questions, answers, likes and the lightweight user upsert.
pub struct CommunityService;

impl Service for CommunityService {
    fn name(&self) -> &'static str {
        "community"
    }

    fn allow_methods(&self) -> &'static str {
        "GET, POST, PUT, DELETE, OPTIONS"
    }

    fn allow_headers(&self) -> &'static str {
        "Content-Type, X-User-Id"
    }

    fn route(&self, session: &mut Session, event: &Event) -> Result<Value, ApiError> {
        let ctx = AuthContext::from_headers(&event.headers)?;
        let path = event.path();

        match event.method.as_str() {
            "GET" => match path {
                "questions" => session.unit(|conn| list_questions(conn).and_then(respond)),
                _ if path.starts_with("question/") => {
                    let question_id = trailing_id(path)?;
                    session.unit(|conn| question_detail(conn, question_id).and_then(respond))
                }
                _ => Err(DomainError::InvalidPath.into()),
            },
            "POST" => {
                let body: Value = event.json_body()?;
                session.unit(|conn| match path {
                    "question" => create_question(conn, &ctx, &body).and_then(respond),
                    "answer" => create_answer(conn, &ctx, &body).and_then(respond),
                    "like" => toggle_like(conn, &ctx, &body).and_then(respond),
                    "user" => upsert_user(conn, &body).and_then(respond),
                    _ => Err(DomainError::InvalidPath.into()),
                })
            }
            _ => Err(DomainError::MethodNotAllowed.into()),
        }
    }
}

pub fn list_questions(conn: &Connection) -> Result<QuestionsResponse, ApiError> {
    let questions = community::list_questions(conn)?;
    Ok(QuestionsResponse { questions })
}

pub fn question_detail(conn: &Connection, question_id: i64) -> Result<QuestionDetail, ApiError> {
    let mut question =
        community::find_question(conn, question_id)?.ok_or(DomainError::QuestionNotFound)?;
    let mut answers = community::answers_for_question(conn, question_id)?;

    let answer_ids: Vec<i64> = answers.iter().map(|a| a.id).collect();
    let mut likers: HashMap<i64, Vec<i64>> = HashMap::new();
    for like in community::likes_for_answers(conn, &answer_ids)? {
        likers.entry(like.answer_id).or_default().push(like.user_id);
    }

    for answer in &mut answers {
        answer.liked_by = likers.remove(&answer.id).unwrap_or_default();
    }
    question.answers = answers;
    Ok(question)
}

pub fn create_question(
    conn: &Connection,
    ctx: &AuthContext,
    body: &Value,
) -> Result<QuestionCreated, ApiError> {
    let user_id = ctx.require_user()?;
    let req = CreateQuestionRequest::deserialize(body)?;

    let inserted =
        community::insert_question(conn, user_id, &req.title, &req.content, &req.category)?;
    Ok(QuestionCreated {
        success: true,
        question_id: inserted.id,
        created_at: inserted.created_at,
    })
}

pub fn create_answer(
    conn: &Connection,
    ctx: &AuthContext,
    body: &Value,
) -> Result<AnswerCreated, ApiError> {
    let user_id = ctx.require_user()?;
    let req = CreateAnswerRequest::deserialize(body)?;

    let inserted = community::insert_answer(conn, req.question_id, user_id, &req.content)?;
    Ok(AnswerCreated {
        success: true,
        answer_id: inserted.id,
        created_at: inserted.created_at,
    })
}

/// Check-then-act on the (answer, caller) pair. Concurrent toggles from the
/// same caller are not serialized beyond the unique index.
pub fn toggle_like(
    conn: &Connection,
    ctx: &AuthContext,
    body: &Value,
) -> Result<LikeToggled, ApiError> {
    let user_id = ctx.require_user()?;
    let req = ToggleLikeRequest::deserialize(body)?;

    let action = if community::like_exists(conn, req.answer_id, user_id)? {
        community::delete_like(conn, req.answer_id, user_id)?;
        LikeAction::Removed
    } else {
        community::insert_like(conn, req.answer_id, user_id)?;
        LikeAction::Added
    };
    debug!("User {} like on answer {}: {:?}", user_id, req.answer_id, action);

    let like_count = community::like_count(conn, req.answer_id)?;
    Ok(LikeToggled {
        success: true,
        action,
        like_count,
    })
}

pub fn upsert_user(conn: &Connection, body: &Value) -> Result<UserUpserted, ApiError> {
    let req = UpsertUserRequest::deserialize(body)?;
    let user_id = users::upsert_by_email(conn, &req)?;
    Ok(UserUpserted {
        success: true,
        user_id,
    })
}
