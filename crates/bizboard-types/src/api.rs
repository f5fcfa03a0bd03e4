use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::models::{
    Advertisement, BlockedUser, BusinessSummary, ChatMessage, LikeAction, ProfileSummary,
    QuestionSummary, Transaction, TransactionKind, UserListing, UserProfile, VerifiedUser,
};

/// Distinguishes a field that was sent as `null` from one that was not sent.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

fn default_true() -> bool {
    true
}

// -- Auth --

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub remember_me: bool,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub remember_me: bool,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub user: UserProfile,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remember_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RememberRequest {
    #[serde(default)]
    pub token: Option<String>,
}

/// Either a re-authenticated user or, when the token did not match, a short
/// list of accounts remembered on the same address.
#[derive(Debug, Serialize)]
pub struct RememberResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<UserProfile>>,
}

/// One updatable profile column. The set is closed: nothing else can be
/// written through the profile update path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileField {
    AvatarUrl(Option<String>),
    PremiumIcon(Option<String>),
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default, deserialize_with = "present")]
    pub avatar_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub premium_icon: Option<Option<String>>,
}

impl UpdateProfileRequest {
    /// Fields the caller actually sent, in column order.
    pub fn fields(&self) -> Vec<ProfileField> {
        let mut fields = Vec::with_capacity(2);
        if let Some(avatar_url) = &self.avatar_url {
            fields.push(ProfileField::AvatarUrl(avatar_url.clone()));
        }
        if let Some(premium_icon) = &self.premium_icon {
            fields.push(ProfileField::PremiumIcon(premium_icon.clone()));
        }
        fields
    }
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub success: bool,
    pub user: Option<ProfileSummary>,
}

#[derive(Debug, Deserialize)]
pub struct AdminVerifyRequest {
    #[serde(default)]
    pub admin_id: Option<i64>,
    #[serde(default)]
    pub user_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct AdminBlockRequest {
    #[serde(default)]
    pub admin_id: Option<i64>,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default = "default_true")]
    pub is_blocked: bool,
}

#[derive(Debug, Deserialize)]
pub struct AdminUsersRequest {
    #[serde(default)]
    pub admin_id: Option<i64>,
    #[serde(default)]
    pub search: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub success: bool,
    pub user: Option<VerifiedUser>,
}

#[derive(Debug, Serialize)]
pub struct BlockResponse {
    pub success: bool,
    pub user: Option<BlockedUser>,
}

#[derive(Debug, Serialize)]
pub struct UsersResponse {
    pub success: bool,
    pub users: Vec<UserListing>,
}

// -- Businesses --

fn default_icon() -> String {
    "💼".into()
}

fn default_color() -> String {
    "blue".into()
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(Default::default())
}

#[derive(Debug, Deserialize)]
pub struct CreateBusinessRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_icon")]
    pub icon: String,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default)]
    pub is_online: bool,
}

#[derive(Debug, Serialize)]
pub struct BusinessCreated {
    pub success: bool,
    pub business_id: i64,
    pub online_code: Option<String>,
}

/// Fields left out keep their stored value.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateBusinessRequest {
    #[serde(default)]
    pub business_id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ArchiveBusinessRequest {
    #[serde(default)]
    pub business_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct Ack {
    pub success: bool,
}

impl Ack {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

#[derive(Debug, Serialize)]
pub struct BusinessesResponse {
    pub businesses: Vec<BusinessSummary>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTransactionRequest {
    pub business_id: i64,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub amount: f64,
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct TransactionCreated {
    pub success: bool,
    pub transaction_id: i64,
}

#[derive(Debug, Serialize)]
pub struct TransactionsResponse {
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Deserialize)]
pub struct NoteRequest {
    pub business_id: i64,
    pub content: String,
    #[serde(default = "empty_object")]
    pub rich_text: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct NoteSaved {
    pub success: bool,
    pub note_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct JoinBusinessRequest {
    #[serde(default)]
    pub online_code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BusinessJoined {
    pub success: bool,
    pub business_id: i64,
    pub business_name: String,
}

#[derive(Debug, Deserialize)]
pub struct SendChatRequest {
    pub business_id: i64,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatSent {
    pub success: bool,
    pub message_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
pub struct AdvertisementResponse {
    pub advertisement: Option<Advertisement>,
}

// -- Community --

#[derive(Debug, Serialize)]
pub struct QuestionsResponse {
    pub questions: Vec<QuestionSummary>,
}

#[derive(Debug, Deserialize)]
pub struct CreateQuestionRequest {
    pub title: String,
    pub content: String,
    pub category: String,
}

#[derive(Debug, Serialize)]
pub struct QuestionCreated {
    pub success: bool,
    pub question_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateAnswerRequest {
    pub question_id: i64,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct AnswerCreated {
    pub success: bool,
    pub answer_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct ToggleLikeRequest {
    pub answer_id: i64,
}

#[derive(Debug, Serialize)]
pub struct LikeToggled {
    pub success: bool,
    pub action: LikeAction,
    pub like_count: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpsertUserRequest {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub is_premium: bool,
    #[serde(default)]
    pub ip_address: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserUpserted {
    pub success: bool,
    pub user_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_fields_follow_presence() {
        let req: UpdateProfileRequest =
            serde_json::from_str(r#"{"user_id": 4, "premium_icon": null}"#).unwrap();
        assert_eq!(req.fields(), vec![ProfileField::PremiumIcon(None)]);

        let req: UpdateProfileRequest =
            serde_json::from_str(r#"{"avatar_url": "a.png", "premium_icon": "crown"}"#).unwrap();
        assert_eq!(
            req.fields(),
            vec![
                ProfileField::AvatarUrl(Some("a.png".into())),
                ProfileField::PremiumIcon(Some("crown".into())),
            ]
        );

        let req: UpdateProfileRequest = serde_json::from_str(r#"{"user_id": 4}"#).unwrap();
        assert!(req.fields().is_empty());
    }

    #[test]
    fn test_business_defaults() {
        let req: CreateBusinessRequest = serde_json::from_str(r#"{"name": "Shop"}"#).unwrap();
        assert_eq!(req.description, "");
        assert_eq!(req.icon, "💼");
        assert_eq!(req.color, "blue");
        assert!(!req.is_online);
    }

    #[test]
    fn test_block_defaults_to_blocking() {
        let req: AdminBlockRequest =
            serde_json::from_str(r#"{"admin_id": 1, "user_id": 2}"#).unwrap();
        assert!(req.is_blocked);
    }

    #[test]
    fn test_note_rich_text_defaults_to_object() {
        let req: NoteRequest =
            serde_json::from_str(r#"{"business_id": 1, "content": "hi"}"#).unwrap();
        assert!(req.rich_text.as_object().is_some_and(|o| o.is_empty()));
    }

    #[test]
    fn test_ack_shape() {
        let resp = Ack::ok();
        assert_eq!(serde_json::to_string(&resp).unwrap(), r#"{"success":true}"#);
    }
}
