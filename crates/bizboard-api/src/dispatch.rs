use std::sync::Arc;

use axum::http::{Method, StatusCode};
use bizboard_db::{Database, Session};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info_span};

use crate::error::ApiError;
use crate::event::{Event, Reply};

/// One routed service: a closed table of (method, path) pairs mapped to
/// entity operations.
pub trait Service: Send + Sync {
    fn name(&self) -> &'static str;

    /// Value of `Access-Control-Allow-Methods` on preflight.
    fn allow_methods(&self) -> &'static str;

    /// Value of `Access-Control-Allow-Headers` on preflight.
    fn allow_headers(&self) -> &'static str;

    /// Run the operation matching the event. Unknown paths and methods are
    /// domain errors; the session is released by the caller afterwards.
    fn route(&self, session: &mut Session, event: &Event) -> Result<Value, ApiError>;
}

/// Serialize an operation's typed result into the response body.
pub fn respond<T: Serialize>(value: T) -> Result<Value, ApiError> {
    Ok(serde_json::to_value(value)?)
}

/// Entry point for one service. Turns every event into a [`Reply`]: domain
/// errors become a 200 carrying `error`, anything else a 500.
pub struct Dispatcher<S> {
    db: Arc<Database>,
    service: S,
}

impl<S: Service> Dispatcher<S> {
    pub fn new(db: Arc<Database>, service: S) -> Self {
        Self { db, service }
    }

    pub fn handle(&self, event: &Event) -> Reply {
        let span = info_span!(
            "invoke",
            service = self.service.name(),
            method = %event.method,
            path = event.path(),
            request_id = %event.request_id,
        );
        let _enter = span.enter();

        if event.method == Method::OPTIONS {
            return Reply::preflight(self.service.allow_methods(), self.service.allow_headers());
        }

        match self.invoke(event) {
            Ok(payload) => Reply::json(StatusCode::OK, &payload),
            Err(ApiError::Domain(e)) => {
                debug!("Domain error: {e}");
                Reply::error(StatusCode::OK, &e.to_string())
            }
            Err(ApiError::Internal(e)) => {
                error!("Invocation failed: {e:#}");
                Reply::error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
            }
        }
    }

    fn invoke(&self, event: &Event) -> Result<Value, ApiError> {
        // Dropped at the end of this call on every path, releasing the connection.
        let mut session = self.db.acquire()?;
        self.service.route(&mut session, event)
    }
}
