use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE users (
                id                    INTEGER PRIMARY KEY AUTOINCREMENT,
                username              TEXT NOT NULL,
                email                 TEXT NOT NULL UNIQUE,
                password_hash         TEXT,
                phone_number          TEXT,
                avatar_url            TEXT,
                premium_icon          TEXT,
                is_premium            INTEGER NOT NULL DEFAULT 0,
                is_blocked            INTEGER NOT NULL DEFAULT 0,
                is_verified           INTEGER NOT NULL DEFAULT 0,
                is_admin              INTEGER NOT NULL DEFAULT 0,
                subscription_ends_at  TEXT,
                ip_address            TEXT,
                remember_token        TEXT,
                created_at            TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
            );

            CREATE INDEX idx_users_remember ON users(remember_token, ip_address);

            CREATE TABLE businesses (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id      INTEGER NOT NULL REFERENCES users(id),
                name         TEXT NOT NULL,
                description  TEXT NOT NULL DEFAULT '',
                icon         TEXT NOT NULL DEFAULT '💼',
                color        TEXT NOT NULL DEFAULT 'blue',
                is_online    INTEGER NOT NULL DEFAULT 0,
                online_code  TEXT UNIQUE,
                is_archived  INTEGER NOT NULL DEFAULT 0,
                created_at   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
                updated_at   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
            );

            CREATE INDEX idx_businesses_owner ON businesses(user_id, is_archived);

            CREATE TABLE business_members (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                business_id  INTEGER NOT NULL REFERENCES businesses(id),
                user_id      INTEGER NOT NULL REFERENCES users(id),
                role         TEXT NOT NULL CHECK (role IN ('owner', 'member')),
                joined_at    TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
                UNIQUE(business_id, user_id)
            );

            CREATE TABLE transactions (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                business_id  INTEGER NOT NULL REFERENCES businesses(id),
                type         TEXT NOT NULL CHECK (type IN ('income', 'expense')),
                amount       REAL NOT NULL,
                category     TEXT NOT NULL,
                description  TEXT NOT NULL DEFAULT '',
                created_by   INTEGER REFERENCES users(id),
                date         TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
                created_at   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
            );

            CREATE INDEX idx_transactions_business ON transactions(business_id, date);

            CREATE TABLE business_notes (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                business_id  INTEGER NOT NULL UNIQUE REFERENCES businesses(id),
                content      TEXT NOT NULL,
                rich_text    TEXT NOT NULL DEFAULT '{}',
                created_by   INTEGER REFERENCES users(id),
                created_at   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
                updated_at   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
            );

            CREATE TABLE business_chat (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                business_id  INTEGER NOT NULL REFERENCES businesses(id),
                user_id      INTEGER NOT NULL REFERENCES users(id),
                message      TEXT NOT NULL,
                created_at   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
            );

            CREATE INDEX idx_business_chat_business ON business_chat(business_id, created_at);

            CREATE TABLE advertisements (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                title        TEXT NOT NULL,
                content      TEXT,
                image_url    TEXT,
                is_active    INTEGER NOT NULL DEFAULT 1,
                created_at   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
            );

            CREATE TABLE questions (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id      INTEGER REFERENCES users(id),
                title        TEXT NOT NULL,
                content      TEXT NOT NULL,
                category     TEXT NOT NULL,
                created_at   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
            );

            CREATE TABLE answers (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                question_id  INTEGER NOT NULL REFERENCES questions(id),
                user_id      INTEGER REFERENCES users(id),
                content      TEXT NOT NULL,
                created_at   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
            );

            CREATE INDEX idx_answers_question ON answers(question_id);

            CREATE TABLE answer_likes (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                answer_id    INTEGER NOT NULL REFERENCES answers(id),
                user_id      INTEGER NOT NULL REFERENCES users(id),
                created_at   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
                UNIQUE(answer_id, user_id)
            );

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
