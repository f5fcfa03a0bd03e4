use anyhow::Result;
use bizboard_types::models::{
    Advertisement, Business, BusinessSummary, ChatMessage, Member, MemberRole, Note, Transaction,
    TransactionKind,
};
use rusqlite::{Connection, Row};

use crate::OptionalExt;
use crate::models::{
    BusinessAggregate, BusinessChanges, CreatedBusiness, Inserted, JoinTarget, LedgerTotals,
    NewBusiness, NewMember, NewTransaction,
};

const BUSINESS_COLUMNS: &str = "b.id, b.user_id, b.name, b.description, b.icon, b.color, \
                                b.is_online, b.online_code, b.is_archived, b.created_at, b.updated_at";

/// Signed sum over a business's ledger: income counts up, expense down.
const SIGNED_AMOUNT: &str = "CASE WHEN t.type = 'income' THEN t.amount ELSE -t.amount END";

fn business_from_row(row: &Row) -> rusqlite::Result<Business> {
    Ok(Business {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        icon: row.get(4)?,
        color: row.get(5)?,
        is_online: row.get(6)?,
        online_code: row.get(7)?,
        is_archived: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn role_from_column(row: &Row, idx: usize) -> rusqlite::Result<MemberRole> {
    let raw: String = row.get(idx)?;
    MemberRole::parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("unknown member role '{raw}'").into(),
        )
    })
}

fn json_from_column(row: &Row, idx: usize) -> rusqlite::Result<serde_json::Value> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn inserted_from_row(row: &Row) -> rusqlite::Result<Inserted> {
    Ok(Inserted {
        id: row.get(0)?,
        created_at: row.get(1)?,
    })
}

// -- Businesses --

pub fn online_code_exists(conn: &Connection, code: &str) -> Result<bool> {
    let id = conn
        .query_row("SELECT id FROM businesses WHERE online_code = ?1", [code], |row| {
            row.get::<_, i64>(0)
        })
        .optional()?;
    Ok(id.is_some())
}

pub fn insert(conn: &Connection, business: &NewBusiness) -> Result<CreatedBusiness> {
    let created = conn.query_row(
        "INSERT INTO businesses (user_id, name, description, icon, color, is_online, online_code)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         RETURNING id, online_code",
        rusqlite::params![
            business.owner_id,
            business.name,
            business.description,
            business.icon,
            business.color,
            business.is_online,
            business.online_code,
        ],
        |row| {
            Ok(CreatedBusiness {
                id: row.get(0)?,
                online_code: row.get(1)?,
            })
        },
    )?;
    Ok(created)
}

/// Insert a membership. Returns `None` when the pair already exists.
pub fn add_member(conn: &Connection, member: &NewMember) -> Result<Option<i64>> {
    conn.query_row(
        "INSERT INTO business_members (business_id, user_id, role)
         VALUES (?1, ?2, ?3)
         ON CONFLICT (business_id, user_id) DO NOTHING
         RETURNING id",
        rusqlite::params![member.business_id, member.user_id, member.role.as_str()],
        |row| row.get(0),
    )
    .optional()
}

/// Non-archived businesses the user owns or belongs to, newest first.
pub fn list_for_user(conn: &Connection, user_id: i64, limit: u32) -> Result<Vec<BusinessSummary>> {
    let sql = format!(
        "SELECT {BUSINESS_COLUMNS},
                CASE WHEN b.user_id = ?1 THEN 'owner' ELSE bm.role END AS my_role,
                COUNT(DISTINCT t.id) AS transaction_count,
                COALESCE(SUM({SIGNED_AMOUNT}), 0.0) AS balance
         FROM businesses b
         LEFT JOIN business_members bm ON b.id = bm.business_id AND bm.user_id = ?1
         LEFT JOIN transactions t ON b.id = t.business_id
         WHERE (b.user_id = ?1 OR bm.user_id = ?1) AND b.is_archived = 0
         GROUP BY b.id, bm.role
         ORDER BY b.created_at DESC, b.id DESC
         LIMIT ?2"
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params![user_id, limit], |row| {
            Ok(BusinessSummary {
                business: business_from_row(row)?,
                my_role: role_from_column(row, 11)?,
                transaction_count: row.get(12)?,
                balance: row.get(13)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

pub fn find_aggregate(conn: &Connection, business_id: i64) -> Result<Option<BusinessAggregate>> {
    let sql = format!(
        "SELECT {BUSINESS_COLUMNS},
                (SELECT COUNT(*) FROM business_members bm WHERE bm.business_id = b.id),
                (SELECT COALESCE(SUM({SIGNED_AMOUNT}), 0.0)
                   FROM transactions t WHERE t.business_id = b.id)
         FROM businesses b
         WHERE b.id = ?1"
    );

    conn.query_row(&sql, [business_id], |row| {
        Ok(BusinessAggregate {
            business: business_from_row(row)?,
            member_count: row.get(11)?,
            balance: row.get(12)?,
        })
    })
    .optional()
}

pub fn members(conn: &Connection, business_id: i64) -> Result<Vec<Member>> {
    let mut stmt = conn.prepare(
        "SELECT u.id, u.username, u.avatar_url, u.is_premium, bm.role
         FROM business_members bm
         JOIN users u ON bm.user_id = u.id
         WHERE bm.business_id = ?1
         ORDER BY bm.joined_at ASC, bm.id ASC",
    )?;

    let rows = stmt
        .query_map([business_id], |row| {
            Ok(Member {
                id: row.get(0)?,
                username: row.get(1)?,
                avatar_url: row.get(2)?,
                is_premium: row.get(3)?,
                role: role_from_column(row, 4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Update the owner's business. Fields passed as `None` keep their value.
/// Returns false when no row matched the (id, owner) pair.
pub fn update(
    conn: &Connection,
    owner_id: i64,
    business_id: Option<i64>,
    changes: &BusinessChanges,
) -> Result<bool> {
    let id = conn
        .query_row(
            "UPDATE businesses
             SET name = COALESCE(?1, name),
                 description = COALESCE(?2, description),
                 icon = COALESCE(?3, icon),
                 color = COALESCE(?4, color),
                 updated_at = strftime('%Y-%m-%d %H:%M:%f', 'now')
             WHERE id = ?5 AND user_id = ?6
             RETURNING id",
            rusqlite::params![
                changes.name,
                changes.description,
                changes.icon,
                changes.color,
                business_id,
                owner_id,
            ],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    Ok(id.is_some())
}

pub fn archive(conn: &Connection, owner_id: i64, business_id: Option<i64>) -> Result<bool> {
    let id = conn
        .query_row(
            "UPDATE businesses
             SET is_archived = 1, updated_at = strftime('%Y-%m-%d %H:%M:%f', 'now')
             WHERE id = ?1 AND user_id = ?2
             RETURNING id",
            rusqlite::params![business_id, owner_id],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    Ok(id.is_some())
}

pub fn find_online_by_code(conn: &Connection, code: Option<&str>) -> Result<Option<JoinTarget>> {
    conn.query_row(
        "SELECT id, name FROM businesses WHERE online_code = ?1 AND is_online = 1",
        [code],
        |row| {
            Ok(JoinTarget {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        },
    )
    .optional()
}

pub fn created_at(
    conn: &Connection,
    business_id: i64,
) -> Result<Option<chrono::DateTime<chrono::Utc>>> {
    conn.query_row(
        "SELECT created_at FROM businesses WHERE id = ?1",
        [business_id],
        |row| row.get(0),
    )
    .optional()
}

// -- Ledger --

pub fn insert_transaction(conn: &Connection, tx: &NewTransaction) -> Result<Inserted> {
    let inserted = conn.query_row(
        "INSERT INTO transactions (business_id, type, amount, category, description, created_by, date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, COALESCE(?7, strftime('%Y-%m-%d %H:%M:%f', 'now')))
         RETURNING id, created_at",
        rusqlite::params![
            tx.business_id,
            tx.kind.as_str(),
            tx.amount,
            tx.category,
            tx.description,
            tx.created_by,
            tx.date,
        ],
        inserted_from_row,
    )?;
    Ok(inserted)
}

pub fn list_transactions(
    conn: &Connection,
    business_id: Option<i64>,
    limit: u32,
) -> Result<Vec<Transaction>> {
    let mut stmt = conn.prepare(
        "SELECT t.id, t.business_id, t.type, t.amount, t.category, t.description,
                t.created_by, t.date, t.created_at, u.username
         FROM transactions t
         LEFT JOIN users u ON t.created_by = u.id
         WHERE t.business_id = ?1
         ORDER BY t.date DESC, t.id DESC
         LIMIT ?2",
    )?;

    let rows = stmt
        .query_map(rusqlite::params![business_id, limit], |row| {
            let raw_kind: String = row.get(2)?;
            let kind = TransactionKind::parse(&raw_kind).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    2,
                    rusqlite::types::Type::Text,
                    format!("unknown transaction type '{raw_kind}'").into(),
                )
            })?;
            Ok(Transaction {
                id: row.get(0)?,
                business_id: row.get(1)?,
                kind,
                amount: row.get(3)?,
                category: row.get(4)?,
                description: row.get(5)?,
                created_by: row.get(6)?,
                date: row.get(7)?,
                created_at: row.get(8)?,
                username: row.get(9)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

pub fn ledger_totals(conn: &Connection, business_id: i64) -> Result<LedgerTotals> {
    let totals = conn.query_row(
        "SELECT COALESCE(SUM(CASE WHEN type = 'income' THEN amount ELSE 0 END), 0.0),
                COALESCE(SUM(CASE WHEN type = 'expense' THEN amount ELSE 0 END), 0.0),
                COUNT(*)
         FROM transactions
         WHERE business_id = ?1",
        [business_id],
        |row| {
            Ok(LedgerTotals {
                income: row.get(0)?,
                expenses: row.get(1)?,
                count: row.get(2)?,
            })
        },
    )?;
    Ok(totals)
}

// -- Notes --

pub fn note_id(conn: &Connection, business_id: i64) -> Result<Option<i64>> {
    conn.query_row(
        "SELECT id FROM business_notes WHERE business_id = ?1",
        [business_id],
        |row| row.get(0),
    )
    .optional()
}

pub fn update_note(
    conn: &Connection,
    business_id: i64,
    content: &str,
    rich_text: &serde_json::Value,
) -> Result<i64> {
    let id = conn.query_row(
        "UPDATE business_notes
         SET content = ?1, rich_text = ?2, updated_at = strftime('%Y-%m-%d %H:%M:%f', 'now')
         WHERE business_id = ?3
         RETURNING id",
        rusqlite::params![content, serde_json::to_string(rich_text)?, business_id],
        |row| row.get(0),
    )?;
    Ok(id)
}

pub fn insert_note(
    conn: &Connection,
    business_id: i64,
    content: &str,
    rich_text: &serde_json::Value,
    created_by: i64,
) -> Result<i64> {
    let id = conn.query_row(
        "INSERT INTO business_notes (business_id, content, rich_text, created_by)
         VALUES (?1, ?2, ?3, ?4)
         RETURNING id",
        rusqlite::params![business_id, content, serde_json::to_string(rich_text)?, created_by],
        |row| row.get(0),
    )?;
    Ok(id)
}

pub fn latest_note(conn: &Connection, business_id: i64) -> Result<Option<Note>> {
    conn.query_row(
        "SELECT id, business_id, content, rich_text, created_by, created_at, updated_at
         FROM business_notes
         WHERE business_id = ?1
         ORDER BY updated_at DESC
         LIMIT 1",
        [business_id],
        |row| {
            Ok(Note {
                id: row.get(0)?,
                business_id: row.get(1)?,
                content: row.get(2)?,
                rich_text: json_from_column(row, 3)?,
                created_by: row.get(4)?,
                created_at: row.get(5)?,
                updated_at: row.get(6)?,
            })
        },
    )
    .optional()
}

// -- Chat --

pub fn insert_chat_message(
    conn: &Connection,
    business_id: i64,
    user_id: i64,
    message: &str,
) -> Result<Inserted> {
    let inserted = conn.query_row(
        "INSERT INTO business_chat (business_id, user_id, message)
         VALUES (?1, ?2, ?3)
         RETURNING id, created_at",
        rusqlite::params![business_id, user_id, message],
        inserted_from_row,
    )?;
    Ok(inserted)
}

/// Oldest first, so clients can append in order.
pub fn chat_messages(
    conn: &Connection,
    business_id: Option<i64>,
    limit: u32,
) -> Result<Vec<ChatMessage>> {
    let mut stmt = conn.prepare(
        "SELECT bc.id, bc.business_id, bc.user_id, bc.message, bc.created_at,
                u.username, u.avatar_url, u.is_premium
         FROM business_chat bc
         JOIN users u ON bc.user_id = u.id
         WHERE bc.business_id = ?1
         ORDER BY bc.created_at ASC, bc.id ASC
         LIMIT ?2",
    )?;

    let rows = stmt
        .query_map(rusqlite::params![business_id, limit], |row| {
            Ok(ChatMessage {
                id: row.get(0)?,
                business_id: row.get(1)?,
                user_id: row.get(2)?,
                message: row.get(3)?,
                created_at: row.get(4)?,
                username: row.get(5)?,
                avatar_url: row.get(6)?,
                is_premium: row.get(7)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

// -- Advertisements --

pub fn active_advertisement(conn: &Connection) -> Result<Option<Advertisement>> {
    conn.query_row(
        "SELECT id, title, content, image_url, created_at
         FROM advertisements
         WHERE is_active = 1
         ORDER BY created_at DESC, id DESC
         LIMIT 1",
        [],
        |row| {
            Ok(Advertisement {
                id: row.get(0)?,
                title: row.get(1)?,
                content: row.get(2)?,
                image_url: row.get(3)?,
                created_at: row.get(4)?,
            })
        },
    )
    .optional()
}
