use axum::http::HeaderMap;

use crate::error::{ApiError, DomainError};

/// Header carrying the caller's user id. Lowercase so it can be used with
/// `HeaderName::from_static`; header lookup is case-insensitive.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Who is calling. Today this is the `x-user-id` header taken at face value;
/// operations only ever ask this type, so a signed session can replace it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuthContext {
    user_id: Option<i64>,
}

impl AuthContext {
    pub fn anonymous() -> Self {
        Self { user_id: None }
    }

    pub fn for_user(user_id: i64) -> Self {
        Self {
            user_id: Some(user_id),
        }
    }

    /// Read the caller from request headers. An absent or empty header is an
    /// anonymous caller; anything that is not an integer fails the request.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, ApiError> {
        let Some(raw) = headers.get(USER_ID_HEADER) else {
            return Ok(Self::anonymous());
        };

        let raw = raw
            .to_str()
            .map_err(|e| ApiError::internal(format!("invalid {USER_ID_HEADER} header: {e}")))?
            .trim();
        if raw.is_empty() {
            return Ok(Self::anonymous());
        }

        let user_id = raw.parse::<i64>().map_err(|_| {
            ApiError::internal(format!("invalid literal for user id: '{raw}'"))
        })?;
        Ok(Self::for_user(user_id))
    }

    pub fn user_id(&self) -> Option<i64> {
        self.user_id
    }

    pub fn require_user(&self) -> Result<i64, DomainError> {
        self.user_id.ok_or(DomainError::UserIdRequired)
    }
}
