use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// -- Enums --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    Expense,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "income" => Some(Self::Income),
            "expense" => Some(Self::Expense),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Owner,
    Member,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Member => "member",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "owner" => Some(Self::Owner),
            "member" => Some(Self::Member),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LikeAction {
    Added,
    Removed,
}

// -- Users --

/// The user projection returned by register, login and remember-token checks.
/// `remember_token` is only populated where the caller is entitled to see it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub avatar_url: Option<String>,
    pub is_premium: bool,
    pub premium_icon: Option<String>,
    pub subscription_ends_at: Option<DateTime<Utc>>,
    pub is_blocked: bool,
    pub is_admin: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remember_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub id: i64,
    pub username: String,
    pub avatar_url: Option<String>,
    pub premium_icon: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifiedUser {
    pub id: i64,
    pub username: String,
    pub is_verified: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockedUser {
    pub id: i64,
    pub username: String,
    pub is_blocked: bool,
}

/// Row shape of the admin user listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserListing {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub is_premium: bool,
    pub is_blocked: bool,
    pub is_verified: bool,
    pub subscription_ends_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionStatus {
    pub is_active: bool,
    pub is_blocked: bool,
    pub days_left: i64,
    pub subscription_ends_at: Option<DateTime<Utc>>,
}

impl SubscriptionStatus {
    /// Active means not blocked and either no expiry or `now` strictly before it.
    /// `days_left` counts whole days remaining and never goes below zero.
    pub fn evaluate(
        is_blocked: bool,
        subscription_ends_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Self {
        let is_active = !is_blocked && subscription_ends_at.is_none_or(|ends| now < ends);
        let days_left = subscription_ends_at
            .map(|ends| (ends - now).num_days().max(0))
            .unwrap_or(0);

        Self {
            is_active,
            is_blocked,
            days_left,
            subscription_ends_at,
        }
    }
}

// -- Businesses --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Business {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub color: String,
    pub is_online: bool,
    pub online_code: Option<String>,
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A business as seen in the caller's list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessSummary {
    #[serde(flatten)]
    pub business: Business,
    pub my_role: MemberRole,
    pub transaction_count: i64,
    pub balance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessDetail {
    #[serde(flatten)]
    pub business: Business,
    pub member_count: i64,
    pub balance: f64,
    pub members: Vec<Member>,
    pub note: Option<Note>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub id: i64,
    pub username: String,
    pub avatar_url: Option<String>,
    pub is_premium: bool,
    pub role: MemberRole,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub id: i64,
    pub business_id: i64,
    pub content: String,
    pub rich_text: serde_json::Value,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub business_id: i64,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub amount: f64,
    pub category: String,
    pub description: String,
    pub created_by: Option<i64>,
    pub date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub business_id: i64,
    pub user_id: i64,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub username: String,
    pub avatar_url: Option<String>,
    pub is_premium: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Advertisement {
    pub id: i64,
    pub title: String,
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

// -- Business analytics --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusinessStatus {
    Loss,
    Stable,
    Successful,
    Ideal,
    Excellent,
}

impl BusinessStatus {
    pub fn from_margin(margin: f64) -> Self {
        if margin < 20.0 {
            Self::Loss
        } else if margin < 35.0 {
            Self::Stable
        } else if margin < 60.0 {
            Self::Successful
        } else if margin < 100.0 {
            Self::Ideal
        } else {
            Self::Excellent
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessStats {
    pub total_income: f64,
    pub total_expenses: f64,
    pub profit: f64,
    pub profit_margin: f64,
    pub status: BusinessStatus,
    pub days_active: i64,
    pub daily_average: f64,
    pub monthly_average: f64,
    pub yearly_projection: f64,
}

impl BusinessStats {
    pub fn compute(
        total_income: f64,
        total_expenses: f64,
        transaction_count: i64,
        created_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        let profit = total_income - total_expenses;
        let profit_margin = if total_expenses > 0.0 {
            profit / total_expenses * 100.0
        } else {
            0.0
        };

        let days_active = if transaction_count == 0 {
            0
        } else {
            let millis = (now - created_at).num_milliseconds().abs();
            let days = (millis as f64 / 86_400_000.0).ceil() as i64;
            days.max(1)
        };

        let daily_average = if days_active > 0 {
            profit / days_active as f64
        } else {
            0.0
        };

        Self {
            total_income,
            total_expenses,
            profit,
            profit_margin,
            status: BusinessStatus::from_margin(profit_margin),
            days_active,
            daily_average,
            monthly_average: daily_average * 30.0,
            yearly_projection: daily_average * 365.0,
        }
    }
}

// -- Community --

/// Author columns joined onto questions and answers. All optional because
/// the author row is LEFT JOINed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Author {
    pub user_id: Option<i64>,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
    pub is_premium: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionSummary {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub category: String,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub author: Author,
    pub answer_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionDetail {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub category: String,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub author: Author,
    pub answers: Vec<AnswerView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerView {
    pub id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub author: Author,
    pub like_count: i64,
    pub liked_by: Vec<i64>,
}
