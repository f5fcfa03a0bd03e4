#![allow(dead_code)]

use std::sync::Arc;

use axum::http::{Method, StatusCode};
use bizboard_api::{AuthService, BusinessService, CommunityService, Dispatcher, Event, Reply};
use bizboard_db::Database;
use serde_json::{Value, json};
use tempfile::TempDir;

pub const CLIENT_IP: &str = "10.0.0.7";

/// The three services over one throwaway store.
pub struct Harness {
    _dir: TempDir,
    pub db: Arc<Database>,
    pub auth: Dispatcher<AuthService>,
    pub businesses: Dispatcher<BusinessService>,
    pub community: Dispatcher<CommunityService>,
}

impl Harness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bizboard.db");
        let db = Arc::new(Database::open(path.to_str().unwrap()).unwrap());

        Self {
            auth: Dispatcher::new(db.clone(), AuthService),
            businesses: Dispatcher::new(db.clone(), BusinessService),
            community: Dispatcher::new(db.clone(), CommunityService),
            db,
            _dir: dir,
        }
    }

    /// Register through the auth service and return the new user's id.
    pub fn register(&self, username: &str, email: &str) -> i64 {
        let body = json!({ "username": username, "email": email, "password": "secret" });
        let reply = self.auth.handle(&post("register", &body));
        let payload = ok(&reply);
        payload["user"]["id"].as_i64().unwrap()
    }

    pub fn execute(&self, sql: &str, params: impl rusqlite::Params) {
        let session = self.db.acquire().unwrap();
        session.connection().execute(sql, params).unwrap();
    }

    pub fn count(&self, sql: &str, params: impl rusqlite::Params) -> i64 {
        let session = self.db.acquire().unwrap();
        session
            .connection()
            .query_row(sql, params, |row| row.get(0))
            .unwrap()
    }

    pub fn make_admin(&self, user_id: i64) {
        self.execute("UPDATE users SET is_admin = 1 WHERE id = ?1", [user_id]);
    }

    pub fn insert_advertisement(&self, title: &str, is_active: bool, created_at: &str) {
        self.execute(
            "INSERT INTO advertisements (title, content, is_active, created_at)
             VALUES (?1, 'promo', ?2, ?3)",
            rusqlite::params![title, is_active, created_at],
        );
    }
}

pub fn post(path: &str, body: &Value) -> Event {
    Event::new(Method::POST)
        .with_path(path)
        .with_json(body)
        .with_source_ip(CLIENT_IP)
}

pub fn put(path: &str, body: &Value) -> Event {
    Event::new(Method::PUT)
        .with_path(path)
        .with_json(body)
        .with_source_ip(CLIENT_IP)
}

pub fn get(path: &str) -> Event {
    Event::new(Method::GET)
        .with_path(path)
        .with_source_ip(CLIENT_IP)
}

/// Payload of a 200 reply.
pub fn ok(reply: &Reply) -> Value {
    assert_eq!(reply.status, StatusCode::OK, "body: {}", reply.body);
    reply.payload().unwrap()
}

/// The `error` text of a 200 reply.
pub fn domain_error(reply: &Reply) -> String {
    let payload = ok(reply);
    payload["error"]
        .as_str()
        .unwrap_or_else(|| panic!("expected an error, got {payload}"))
        .to_string()
}
