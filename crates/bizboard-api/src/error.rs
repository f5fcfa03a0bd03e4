use thiserror::Error;

/// Failures the caller caused or is allowed to know about. They travel as a
/// normal 200 reply whose `error` field is the display text below.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DomainError {
    #[error("User ID required")]
    UserIdRequired,

    #[error("Пользователь с таким email уже существует")]
    DuplicateEmail,

    #[error("Неверный email или пароль")]
    InvalidCredentials,

    #[error("Ваш аккаунт заблокирован")]
    AccountBlocked,

    #[error("Подписка истекла. Продлите подписку для доступа")]
    SubscriptionExpired,

    #[error("No updates provided")]
    NoUpdates,

    #[error("User not found")]
    UserNotFound,

    #[error("Access denied")]
    AccessDenied,

    #[error("Business not found")]
    BusinessNotFound,

    #[error("Business not found or access denied")]
    NotFoundOrAccessDenied,

    #[error("Бизнес с таким кодом не найден")]
    JoinCodeNotFound,

    #[error("Вы уже участник этого бизнеса")]
    AlreadyMember,

    #[error("Question not found")]
    QuestionNotFound,

    #[error("Invalid path")]
    InvalidPath,

    #[error("Method not allowed")]
    MethodNotAllowed,
}

/// Everything an entity operation can fail with. `Internal` covers malformed
/// input and storage failures and becomes a 500.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn internal(message: impl std::fmt::Display) -> Self {
        Self::Internal(anyhow::anyhow!("{message}"))
    }

    pub fn domain(&self) -> Option<DomainError> {
        match self {
            Self::Domain(e) => Some(*e),
            Self::Internal(_) => None,
        }
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Internal(e.into())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        Self::Internal(e.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_text_is_wire_text() {
        assert_eq!(DomainError::AccessDenied.to_string(), "Access denied");
        assert_eq!(
            DomainError::NotFoundOrAccessDenied.to_string(),
            "Business not found or access denied"
        );
        assert_eq!(
            ApiError::from(DomainError::InvalidPath).to_string(),
            "Invalid path"
        );
    }

    #[test]
    fn test_storage_errors_are_internal() {
        let err = ApiError::from(rusqlite::Error::QueryReturnedNoRows);
        assert!(err.domain().is_none());
        assert_eq!(
            ApiError::from(DomainError::AlreadyMember).domain(),
            Some(DomainError::AlreadyMember)
        );
    }
}
