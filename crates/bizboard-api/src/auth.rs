use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use bizboard_db::Session;
use bizboard_db::models::NewUser;
use bizboard_db::users;
use bizboard_types::api::{
    AdminBlockRequest, AdminUsersRequest, AdminVerifyRequest, AuthResponse, BlockResponse,
    LoginRequest, ProfileResponse, RegisterRequest, RememberRequest, RememberResponse,
    UpdateProfileRequest, UsersResponse, VerifyResponse,
};
use bizboard_types::models::{SubscriptionStatus, UserProfile};
use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::dispatch::{Service, respond};
use crate::error::{ApiError, DomainError};
use crate::event::Event;

/// Length of the subscription every new account starts with.
pub const TRIAL_DAYS: i64 = 7;
const SUGGESTION_LIMIT: u32 = 3;
const USER_SEARCH_LIMIT: u32 = 100;

/// Registration, login, remember-me sessions, profile and admin actions.
pub struct AuthService;

impl Service for AuthService {
    fn name(&self) -> &'static str {
        "auth"
    }

    fn allow_methods(&self) -> &'static str {
        "GET, POST, PUT, OPTIONS"
    }

    fn allow_headers(&self) -> &'static str {
        "Content-Type"
    }

    fn route(&self, session: &mut Session, event: &Event) -> Result<Value, ApiError> {
        let ip = event.source_ip.as_str();

        match event.method.as_str() {
            "POST" => match event.path() {
                "register" => {
                    let req: RegisterRequest = event.json_body()?;
                    session.unit(|conn| register(conn, &req, ip, Utc::now()).and_then(respond))
                }
                "login" => {
                    let req: LoginRequest = event.json_body()?;
                    session.unit(|conn| login(conn, &req, ip, Utc::now()).and_then(respond))
                }
                "check-remember" => {
                    let req: RememberRequest = event.json_body()?;
                    session.unit(|conn| {
                        check_remember(conn, &req, ip, Utc::now()).and_then(respond)
                    })
                }
                "update-profile" => {
                    let req: UpdateProfileRequest = event.json_body()?;
                    session.unit(|conn| update_profile(conn, &req).and_then(respond))
                }
                "admin/verify-user" => {
                    let req: AdminVerifyRequest = event.json_body()?;
                    session.unit(|conn| verify_user(conn, &req).and_then(respond))
                }
                "admin/block-user" => {
                    let req: AdminBlockRequest = event.json_body()?;
                    session.unit(|conn| block_user(conn, &req).and_then(respond))
                }
                "admin/get-users" => {
                    let req: AdminUsersRequest = event.json_body()?;
                    session.unit(|conn| list_users(conn, &req).and_then(respond))
                }
                _ => Err(DomainError::InvalidPath.into()),
            },
            "GET" => match event.path() {
                "check-subscription" => {
                    let user_id = event.query_id("user_id")?;
                    session.unit(|conn| {
                        check_subscription(conn, user_id, Utc::now()).and_then(respond)
                    })
                }
                _ => Err(DomainError::InvalidPath.into()),
            },
            _ => Err(DomainError::MethodNotAllowed.into()),
        }
    }
}

/// Unsalted SHA-256, hex encoded. Stored hashes depend on this exact form.
pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

/// 32 random bytes, URL-safe base64 without padding.
pub fn generate_token() -> String {
    URL_SAFE_NO_PAD.encode(rand::random::<[u8; 32]>())
}

fn check_access(user: &UserProfile, now: DateTime<Utc>) -> Result<(), DomainError> {
    if user.is_blocked {
        return Err(DomainError::AccountBlocked);
    }
    if user.subscription_ends_at.is_some_and(|ends| now > ends) {
        return Err(DomainError::SubscriptionExpired);
    }
    Ok(())
}

pub fn register(
    conn: &Connection,
    req: &RegisterRequest,
    ip: &str,
    now: DateTime<Utc>,
) -> Result<AuthResponse, ApiError> {
    if users::email_exists(conn, &req.email)? {
        return Err(DomainError::DuplicateEmail.into());
    }

    let password_hash = hash_password(&req.password);
    let remember_token = req.remember_me.then(generate_token);

    let user = users::insert(
        conn,
        &NewUser {
            username: &req.username,
            email: &req.email,
            password_hash: &password_hash,
            phone_number: req.phone_number.as_deref(),
            subscription_ends_at: now + Duration::days(TRIAL_DAYS),
            ip_address: ip,
            remember_token: remember_token.as_deref(),
        },
    )?;

    info!("Registered user {} ({})", user.id, user.username);
    Ok(AuthResponse {
        success: true,
        user,
        remember_token,
    })
}

pub fn login(
    conn: &Connection,
    req: &LoginRequest,
    ip: &str,
    now: DateTime<Utc>,
) -> Result<AuthResponse, ApiError> {
    let user = users::find_by_credentials(conn, &req.email, &hash_password(&req.password))?
        .ok_or(DomainError::InvalidCredentials)?;
    check_access(&user, now)?;

    let remember_token = if req.remember_me {
        let token = generate_token();
        users::set_remember_token(conn, user.id, &token, ip)?;
        Some(token)
    } else {
        None
    };

    Ok(AuthResponse {
        success: true,
        user,
        remember_token,
    })
}

/// Re-authenticate by (token, address). When nothing matches, offer the
/// accounts remembered on this address instead of failing.
pub fn check_remember(
    conn: &Connection,
    req: &RememberRequest,
    ip: &str,
    now: DateTime<Utc>,
) -> Result<RememberResponse, ApiError> {
    if let Some(user) = users::find_by_remember_token(conn, req.token.as_deref(), ip)? {
        check_access(&user, now)?;
        return Ok(RememberResponse {
            success: true,
            user: Some(user),
            suggestions: None,
        });
    }

    let suggestions = users::remember_suggestions(conn, ip, SUGGESTION_LIMIT)?;
    Ok(RememberResponse {
        success: false,
        user: None,
        suggestions: Some(suggestions),
    })
}

pub fn update_profile(
    conn: &Connection,
    req: &UpdateProfileRequest,
) -> Result<ProfileResponse, ApiError> {
    let fields = req.fields();
    if fields.is_empty() {
        return Err(DomainError::NoUpdates.into());
    }

    let user = users::update_profile(conn, req.user_id, &fields)?;
    Ok(ProfileResponse {
        success: true,
        user,
    })
}

pub fn check_subscription(
    conn: &Connection,
    user_id: Option<i64>,
    now: DateTime<Utc>,
) -> Result<SubscriptionStatus, ApiError> {
    let row = match user_id {
        Some(id) => users::subscription(conn, id)?,
        None => None,
    }
    .ok_or(DomainError::UserNotFound)?;

    Ok(SubscriptionStatus::evaluate(
        row.is_blocked,
        row.subscription_ends_at,
        now,
    ))
}

/// The acting user's admin flag is always re-read from storage.
fn require_admin(conn: &Connection, admin_id: Option<i64>) -> Result<(), ApiError> {
    if users::is_admin(conn, admin_id)? {
        Ok(())
    } else {
        Err(DomainError::AccessDenied.into())
    }
}

pub fn verify_user(
    conn: &Connection,
    req: &AdminVerifyRequest,
) -> Result<VerifyResponse, ApiError> {
    require_admin(conn, req.admin_id)?;

    let user = users::set_verified(conn, req.user_id)?;
    info!("Admin {:?} verified user {:?}", req.admin_id, req.user_id);
    Ok(VerifyResponse {
        success: true,
        user,
    })
}

pub fn block_user(conn: &Connection, req: &AdminBlockRequest) -> Result<BlockResponse, ApiError> {
    require_admin(conn, req.admin_id)?;

    let user = users::set_blocked(conn, req.user_id, req.is_blocked)?;
    info!(
        "Admin {:?} set blocked={} on user {:?}",
        req.admin_id, req.is_blocked, req.user_id
    );
    Ok(BlockResponse {
        success: true,
        user,
    })
}

pub fn list_users(conn: &Connection, req: &AdminUsersRequest) -> Result<UsersResponse, ApiError> {
    require_admin(conn, req.admin_id)?;

    let users = users::search(conn, &req.search, USER_SEARCH_LIMIT)?;
    Ok(UsersResponse {
        success: true,
        users,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_password_is_plain_sha256_hex() {
        assert_eq!(
            hash_password("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(hash_password("p"), hash_password("p"));
    }

    #[test]
    fn test_generate_token_shape() {
        let token = generate_token();
        assert_eq!(token.len(), 43);
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
        assert_ne!(token, generate_token());
    }

    #[test]
    fn test_check_access_order() {
        let now = Utc::now();
        let mut user = UserProfile {
            id: 1,
            username: "u".into(),
            email: "u@x.com".into(),
            avatar_url: None,
            is_premium: true,
            premium_icon: None,
            subscription_ends_at: Some(now - Duration::days(1)),
            is_blocked: true,
            is_admin: false,
            remember_token: None,
        };
        assert_eq!(check_access(&user, now), Err(DomainError::AccountBlocked));

        user.is_blocked = false;
        assert_eq!(check_access(&user, now), Err(DomainError::SubscriptionExpired));

        user.subscription_ends_at = None;
        assert_eq!(check_access(&user, now), Ok(()));
    }
}
