use anyhow::Result;
use bizboard_types::models::{AnswerView, Author, QuestionDetail, QuestionSummary};
use rusqlite::types::ToSql;
use rusqlite::{Connection, Row};

use crate::OptionalExt;
use crate::models::{Inserted, LikeRow};

/// Author columns in positions `start..start + 4`.
fn author_from_row(row: &Row, start: usize) -> rusqlite::Result<Author> {
    Ok(Author {
        user_id: row.get(start)?,
        username: row.get(start + 1)?,
        avatar_url: row.get(start + 2)?,
        is_premium: row.get(start + 3)?,
    })
}

fn inserted_from_row(row: &Row) -> rusqlite::Result<Inserted> {
    Ok(Inserted {
        id: row.get(0)?,
        created_at: row.get(1)?,
    })
}

// -- Questions --

pub fn list_questions(conn: &Connection) -> Result<Vec<QuestionSummary>> {
    let mut stmt = conn.prepare(
        "SELECT q.id, q.title, q.content, q.category, q.created_at,
                u.id, u.username, u.avatar_url, u.is_premium,
                COUNT(DISTINCT a.id) AS answer_count
         FROM questions q
         LEFT JOIN users u ON q.user_id = u.id
         LEFT JOIN answers a ON q.id = a.question_id
         GROUP BY q.id, u.id
         ORDER BY q.created_at DESC, q.id DESC",
    )?;

    let rows = stmt
        .query_map([], |row| {
            Ok(QuestionSummary {
                id: row.get(0)?,
                title: row.get(1)?,
                content: row.get(2)?,
                category: row.get(3)?,
                created_at: row.get(4)?,
                author: author_from_row(row, 5)?,
                answer_count: row.get(9)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// The question with an empty answer list; see [`answers_for_question`].
pub fn find_question(conn: &Connection, question_id: i64) -> Result<Option<QuestionDetail>> {
    conn.query_row(
        "SELECT q.id, q.title, q.content, q.category, q.created_at,
                u.id, u.username, u.avatar_url, u.is_premium
         FROM questions q
         LEFT JOIN users u ON q.user_id = u.id
         WHERE q.id = ?1",
        [question_id],
        |row| {
            Ok(QuestionDetail {
                id: row.get(0)?,
                title: row.get(1)?,
                content: row.get(2)?,
                category: row.get(3)?,
                created_at: row.get(4)?,
                author: author_from_row(row, 5)?,
                answers: Vec::new(),
            })
        },
    )
    .optional()
}

/// Answers ranked by likes, earlier answers first among equals. `liked_by`
/// is left empty; fill it from [`likes_for_answers`].
pub fn answers_for_question(conn: &Connection, question_id: i64) -> Result<Vec<AnswerView>> {
    let mut stmt = conn.prepare(
        "SELECT a.id, a.content, a.created_at,
                u.id, u.username, u.avatar_url, u.is_premium,
                COUNT(DISTINCT al.id) AS like_count
         FROM answers a
         LEFT JOIN users u ON a.user_id = u.id
         LEFT JOIN answer_likes al ON a.id = al.answer_id
         WHERE a.question_id = ?1
         GROUP BY a.id, u.id
         ORDER BY like_count DESC, a.created_at ASC, a.id ASC",
    )?;

    let rows = stmt
        .query_map([question_id], |row| {
            Ok(AnswerView {
                id: row.get(0)?,
                content: row.get(1)?,
                created_at: row.get(2)?,
                author: author_from_row(row, 3)?,
                like_count: row.get(7)?,
                liked_by: Vec::new(),
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Batch-fetch likes for a set of answer IDs.
pub fn likes_for_answers(conn: &Connection, answer_ids: &[i64]) -> Result<Vec<LikeRow>> {
    if answer_ids.is_empty() {
        return Ok(vec![]);
    }

    let placeholders: Vec<String> = (1..=answer_ids.len()).map(|i| format!("?{}", i)).collect();
    let sql = format!(
        "SELECT answer_id, user_id FROM answer_likes WHERE answer_id IN ({}) ORDER BY id ASC",
        placeholders.join(", ")
    );

    let mut stmt = conn.prepare(&sql)?;
    let params: Vec<&dyn ToSql> = answer_ids.iter().map(|id| id as &dyn ToSql).collect();

    let rows = stmt
        .query_map(params.as_slice(), |row| {
            Ok(LikeRow {
                answer_id: row.get(0)?,
                user_id: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

pub fn insert_question(
    conn: &Connection,
    user_id: i64,
    title: &str,
    content: &str,
    category: &str,
) -> Result<Inserted> {
    let inserted = conn.query_row(
        "INSERT INTO questions (user_id, title, content, category)
         VALUES (?1, ?2, ?3, ?4)
         RETURNING id, created_at",
        rusqlite::params![user_id, title, content, category],
        inserted_from_row,
    )?;
    Ok(inserted)
}

pub fn insert_answer(
    conn: &Connection,
    question_id: i64,
    user_id: i64,
    content: &str,
) -> Result<Inserted> {
    let inserted = conn.query_row(
        "INSERT INTO answers (question_id, user_id, content)
         VALUES (?1, ?2, ?3)
         RETURNING id, created_at",
        rusqlite::params![question_id, user_id, content],
        inserted_from_row,
    )?;
    Ok(inserted)
}

// -- Likes --

pub fn like_exists(conn: &Connection, answer_id: i64, user_id: i64) -> Result<bool> {
    let id = conn
        .query_row(
            "SELECT id FROM answer_likes WHERE answer_id = ?1 AND user_id = ?2",
            [answer_id, user_id],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    Ok(id.is_some())
}

pub fn insert_like(conn: &Connection, answer_id: i64, user_id: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO answer_likes (answer_id, user_id) VALUES (?1, ?2)",
        [answer_id, user_id],
    )?;
    Ok(())
}

pub fn delete_like(conn: &Connection, answer_id: i64, user_id: i64) -> Result<()> {
    conn.execute(
        "DELETE FROM answer_likes WHERE answer_id = ?1 AND user_id = ?2",
        [answer_id, user_id],
    )?;
    Ok(())
}

pub fn like_count(conn: &Connection, answer_id: i64) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM answer_likes WHERE answer_id = ?1",
        [answer_id],
        |row| row.get(0),
    )?;
    Ok(count)
}
