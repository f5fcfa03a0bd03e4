//! Row types and insert payloads private to the storage layer. Shapes that
//! travel to clients live in `bizboard_types::models`.

use bizboard_types::models::{Business, MemberRole, TransactionKind};
use chrono::{DateTime, Utc};

pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub phone_number: Option<&'a str>,
    pub subscription_ends_at: DateTime<Utc>,
    pub ip_address: &'a str,
    pub remember_token: Option<&'a str>,
}

pub struct SubscriptionRow {
    pub subscription_ends_at: Option<DateTime<Utc>>,
    pub is_blocked: bool,
    pub is_premium: bool,
}

pub struct NewBusiness<'a> {
    pub owner_id: i64,
    pub name: &'a str,
    pub description: &'a str,
    pub icon: &'a str,
    pub color: &'a str,
    pub is_online: bool,
    pub online_code: Option<&'a str>,
}

pub struct CreatedBusiness {
    pub id: i64,
    pub online_code: Option<String>,
}

pub struct BusinessChanges<'a> {
    pub name: Option<&'a str>,
    pub description: Option<&'a str>,
    pub icon: Option<&'a str>,
    pub color: Option<&'a str>,
}

/// A business with its member count and derived balance.
pub struct BusinessAggregate {
    pub business: Business,
    pub member_count: i64,
    pub balance: f64,
}

pub struct JoinTarget {
    pub id: i64,
    pub name: String,
}

pub struct NewMember {
    pub business_id: i64,
    pub user_id: i64,
    pub role: MemberRole,
}

pub struct NewTransaction<'a> {
    pub business_id: i64,
    pub kind: TransactionKind,
    pub amount: f64,
    pub category: &'a str,
    pub description: &'a str,
    pub created_by: i64,
    pub date: Option<DateTime<Utc>>,
}

pub struct LedgerTotals {
    pub income: f64,
    pub expenses: f64,
    pub count: i64,
}

/// `(id, created_at)` as handed back by `RETURNING`.
pub struct Inserted {
    pub id: i64,
    pub created_at: DateTime<Utc>,
}

pub struct LikeRow {
    pub answer_id: i64,
    pub user_id: i64,
}
