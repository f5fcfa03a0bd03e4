use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::{ConnectInfo, Query, Request, State},
    http::{HeaderMap, StatusCode, request::Parts},
    response::{IntoResponse, Response},
    routing::any,
};
use bizboard_api::{
    AuthService, BusinessService, CommunityService, Dispatcher, Event, Reply, Service,
};
use bizboard_db::Database;
use tower_http::trace::TraceLayer;
use tracing::error;

/// Request bodies are small JSON documents.
const MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    auth: Arc<Dispatcher<AuthService>>,
    businesses: Arc<Dispatcher<BusinessService>>,
    community: Arc<Dispatcher<CommunityService>>,
}

impl AppState {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            auth: Arc::new(Dispatcher::new(db.clone(), AuthService)),
            businesses: Arc::new(Dispatcher::new(db.clone(), BusinessService)),
            community: Arc::new(Dispatcher::new(db, CommunityService)),
        }
    }
}

/// One route per service. Every method reaches the dispatcher, which owns
/// preflight handling and the method table.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/auth", any(auth))
        .route("/businesses", any(businesses))
        .route("/community", any(community))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn auth(State(state): State<AppState>, request: Request) -> Response {
    invoke(state.auth, request).await
}

async fn businesses(State(state): State<AppState>, request: Request) -> Response {
    invoke(state.businesses, request).await
}

async fn community(State(state): State<AppState>, request: Request) -> Response {
    invoke(state.community, request).await
}

/// Translate the request and run the dispatcher on the blocking pool; the
/// whole invocation is synchronous SQLite work.
async fn invoke<S: Service + 'static>(
    dispatcher: Arc<Dispatcher<S>>,
    request: Request,
) -> Response {
    let event = match to_event(request).await {
        Ok(event) => event,
        Err(e) => {
            error!("Unreadable request: {e:#}");
            return Reply::error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()).into_response();
        }
    };

    match tokio::task::spawn_blocking(move || dispatcher.handle(&event)).await {
        Ok(reply) => reply.into_response(),
        Err(e) => {
            error!("Dispatcher task failed: {e}");
            Reply::error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()).into_response()
        }
    }
}

pub async fn to_event(request: Request) -> anyhow::Result<Event> {
    let (parts, body) = request.into_parts();

    let Query(query) = Query::<HashMap<String, String>>::try_from_uri(&parts.uri)?;
    let source_ip = client_ip(&parts);
    let body = read_body(body).await?;

    let mut event = Event::new(parts.method);
    event.query = query;
    event.headers = parts.headers;
    event.body = body;
    event.source_ip = source_ip;
    Ok(event)
}

async fn read_body(body: Body) -> anyhow::Result<Option<String>> {
    let bytes = axum::body::to_bytes(body, MAX_BODY_BYTES).await?;
    if bytes.is_empty() {
        return Ok(None);
    }
    Ok(Some(String::from_utf8(bytes.to_vec())?))
}

/// First `X-Forwarded-For` hop when behind a proxy, else the peer address.
fn client_ip(parts: &Parts) -> String {
    forwarded_for(&parts.headers)
        .or_else(|| {
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_default()
}

fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")?
        .to_str()
        .ok()?
        .split(',')
        .map(str::trim)
        .find(|hop| !hop.is_empty())
        .map(str::to_string)
}
