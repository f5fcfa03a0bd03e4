use anyhow::{Result, bail};
use bizboard_types::api::{ProfileField, UpsertUserRequest};
use bizboard_types::models::{BlockedUser, ProfileSummary, UserListing, UserProfile, VerifiedUser};
use rusqlite::types::ToSql;
use rusqlite::{Connection, Row};

use crate::OptionalExt;
use crate::models::{NewUser, SubscriptionRow};

const PROFILE_COLUMNS: &str = "id, username, email, avatar_url, is_premium, premium_icon, \
                               subscription_ends_at, is_blocked, is_admin";

fn profile_from_row(row: &Row) -> rusqlite::Result<UserProfile> {
    Ok(UserProfile {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        avatar_url: row.get(3)?,
        is_premium: row.get(4)?,
        premium_icon: row.get(5)?,
        subscription_ends_at: row.get(6)?,
        is_blocked: row.get(7)?,
        is_admin: row.get(8)?,
        remember_token: None,
    })
}

/// Profile columns followed by `remember_token` in position 9.
fn profile_with_token(row: &Row) -> rusqlite::Result<UserProfile> {
    let mut profile = profile_from_row(row)?;
    profile.remember_token = row.get(9)?;
    Ok(profile)
}

pub fn email_exists(conn: &Connection, email: &str) -> Result<bool> {
    let id = conn
        .query_row("SELECT id FROM users WHERE email = ?1", [email], |row| {
            row.get::<_, i64>(0)
        })
        .optional()?;
    Ok(id.is_some())
}

/// Insert a registered account. New accounts start premium for the trial window.
pub fn insert(conn: &Connection, user: &NewUser) -> Result<UserProfile> {
    let sql = format!(
        "INSERT INTO users (
             username, email, password_hash, phone_number,
             is_premium, subscription_ends_at, ip_address, remember_token
         )
         VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6, ?7)
         RETURNING {PROFILE_COLUMNS}, remember_token"
    );

    let profile = conn.query_row(
        &sql,
        rusqlite::params![
            user.username,
            user.email,
            user.password_hash,
            user.phone_number,
            user.subscription_ends_at,
            user.ip_address,
            user.remember_token,
        ],
        profile_with_token,
    )?;

    Ok(profile)
}

pub fn find_by_credentials(
    conn: &Connection,
    email: &str,
    password_hash: &str,
) -> Result<Option<UserProfile>> {
    let sql = format!(
        "SELECT {PROFILE_COLUMNS} FROM users WHERE email = ?1 AND password_hash = ?2"
    );
    conn.query_row(&sql, [email, password_hash], profile_from_row)
        .optional()
}

pub fn set_remember_token(conn: &Connection, id: i64, token: &str, ip_address: &str) -> Result<()> {
    conn.execute(
        "UPDATE users SET remember_token = ?1, ip_address = ?2 WHERE id = ?3",
        rusqlite::params![token, ip_address, id],
    )?;
    Ok(())
}

pub fn find_by_remember_token(
    conn: &Connection,
    token: Option<&str>,
    ip_address: &str,
) -> Result<Option<UserProfile>> {
    let sql = format!(
        "SELECT {PROFILE_COLUMNS} FROM users WHERE remember_token = ?1 AND ip_address = ?2"
    );
    conn.query_row(&sql, rusqlite::params![token, ip_address], profile_from_row)
        .optional()
}

/// Unblocked accounts that hold a remember token for this address, newest first.
pub fn remember_suggestions(
    conn: &Connection,
    ip_address: &str,
    limit: u32,
) -> Result<Vec<UserProfile>> {
    let sql = format!(
        "SELECT {PROFILE_COLUMNS}, remember_token
         FROM users
         WHERE ip_address = ?1 AND remember_token IS NOT NULL AND is_blocked = 0
         ORDER BY created_at DESC, id DESC
         LIMIT ?2"
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params![ip_address, limit], profile_with_token)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn profile_column(field: &ProfileField) -> &'static str {
    match field {
        ProfileField::AvatarUrl(_) => "avatar_url",
        ProfileField::PremiumIcon(_) => "premium_icon",
    }
}

fn profile_value(field: &ProfileField) -> &Option<String> {
    match field {
        ProfileField::AvatarUrl(value) | ProfileField::PremiumIcon(value) => value,
    }
}

/// Apply the given profile fields. Column names come from [`ProfileField`]
/// alone; values are always bound.
pub fn update_profile(
    conn: &Connection,
    user_id: Option<i64>,
    fields: &[ProfileField],
) -> Result<Option<ProfileSummary>> {
    if fields.is_empty() {
        bail!("no profile fields to update");
    }

    let assignments: Vec<String> = fields
        .iter()
        .enumerate()
        .map(|(i, field)| format!("{} = ?{}", profile_column(field), i + 1))
        .collect();
    let sql = format!(
        "UPDATE users SET {} WHERE id = ?{} RETURNING id, username, avatar_url, premium_icon",
        assignments.join(", "),
        fields.len() + 1
    );

    let mut params: Vec<&dyn ToSql> = fields
        .iter()
        .map(|field| profile_value(field) as &dyn ToSql)
        .collect();
    params.push(&user_id);

    conn.query_row(&sql, params.as_slice(), |row| {
        Ok(ProfileSummary {
            id: row.get(0)?,
            username: row.get(1)?,
            avatar_url: row.get(2)?,
            premium_icon: row.get(3)?,
        })
    })
    .optional()
}

pub fn subscription(conn: &Connection, user_id: i64) -> Result<Option<SubscriptionRow>> {
    conn.query_row(
        "SELECT subscription_ends_at, is_blocked, is_premium FROM users WHERE id = ?1",
        [user_id],
        |row| {
            Ok(SubscriptionRow {
                subscription_ends_at: row.get(0)?,
                is_blocked: row.get(1)?,
                is_premium: row.get(2)?,
            })
        },
    )
    .optional()
}

/// Whether the stored account is an admin. Unknown ids are not.
pub fn is_admin(conn: &Connection, user_id: Option<i64>) -> Result<bool> {
    let flag = conn
        .query_row("SELECT is_admin FROM users WHERE id = ?1", [user_id], |row| {
            row.get::<_, bool>(0)
        })
        .optional()?;
    Ok(flag.unwrap_or(false))
}

pub fn set_verified(conn: &Connection, user_id: Option<i64>) -> Result<Option<VerifiedUser>> {
    conn.query_row(
        "UPDATE users SET is_verified = 1 WHERE id = ?1 RETURNING id, username, is_verified",
        [user_id],
        |row| {
            Ok(VerifiedUser {
                id: row.get(0)?,
                username: row.get(1)?,
                is_verified: row.get(2)?,
            })
        },
    )
    .optional()
}

pub fn set_blocked(
    conn: &Connection,
    user_id: Option<i64>,
    is_blocked: bool,
) -> Result<Option<BlockedUser>> {
    conn.query_row(
        "UPDATE users SET is_blocked = ?1 WHERE id = ?2 RETURNING id, username, is_blocked",
        rusqlite::params![is_blocked, user_id],
        |row| {
            Ok(BlockedUser {
                id: row.get(0)?,
                username: row.get(1)?,
                is_blocked: row.get(2)?,
            })
        },
    )
    .optional()
}

/// Case-insensitive substring match on username or email.
pub fn search(conn: &Connection, term: &str, limit: u32) -> Result<Vec<UserListing>> {
    let pattern = format!("%{term}%");
    let mut stmt = conn.prepare(
        "SELECT id, username, email, phone_number, is_premium, is_blocked,
                is_verified, subscription_ends_at, created_at
         FROM users
         WHERE fold(username) LIKE fold(?1) OR fold(email) LIKE fold(?1)
         ORDER BY created_at DESC, id DESC
         LIMIT ?2",
    )?;

    let rows = stmt
        .query_map(rusqlite::params![pattern, limit], |row| {
            Ok(UserListing {
                id: row.get(0)?,
                username: row.get(1)?,
                email: row.get(2)?,
                phone_number: row.get(3)?,
                is_premium: row.get(4)?,
                is_blocked: row.get(5)?,
                is_verified: row.get(6)?,
                subscription_ends_at: row.get(7)?,
                created_at: row.get(8)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Insert keyed on email; an existing row gets its username, avatar,
/// premium flag and address overwritten.
pub fn upsert_by_email(conn: &Connection, user: &UpsertUserRequest) -> Result<i64> {
    let id = conn.query_row(
        "INSERT INTO users (username, email, avatar_url, is_premium, ip_address)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT (email) DO UPDATE SET
             username = excluded.username,
             avatar_url = excluded.avatar_url,
             is_premium = excluded.is_premium,
             ip_address = excluded.ip_address
         RETURNING id",
        rusqlite::params![
            user.username,
            user.email,
            user.avatar_url,
            user.is_premium,
            user.ip_address,
        ],
        |row| row.get(0),
    )?;
    Ok(id)
}
