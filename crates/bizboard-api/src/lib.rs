pub mod auth;
pub mod businesses;
pub mod community;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod event;

pub use auth::AuthService;
pub use businesses::BusinessService;
pub use community::CommunityService;
pub use context::AuthContext;
pub use dispatch::{Dispatcher, Service};
pub use error::{ApiError, DomainError};
pub use event::{Event, Reply};
