use std::collections::HashMap;

use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use crate::error::ApiError;

/// One inbound invocation: everything a handler gets to see.
#[derive(Debug, Clone)]
pub struct Event {
    pub method: Method,
    pub query: HashMap<String, String>,
    pub headers: HeaderMap,
    pub body: Option<String>,
    pub source_ip: String,
    pub request_id: Uuid,
}

impl Event {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            query: HashMap::new(),
            headers: HeaderMap::new(),
            body: None,
            source_ip: String::new(),
            request_id: Uuid::new_v4(),
        }
    }

    pub fn with_path(self, path: &str) -> Self {
        self.with_query("path", path)
    }

    pub fn with_query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn with_user(self, user_id: i64) -> Self {
        self.with_header(
            HeaderName::from_static(crate::context::USER_ID_HEADER),
            &user_id.to_string(),
        )
    }

    pub fn with_json(mut self, body: &Value) -> Self {
        self.body = Some(body.to_string());
        self
    }

    pub fn with_source_ip(mut self, ip: &str) -> Self {
        self.source_ip = ip.to_string();
        self
    }

    /// The `path` query parameter routing is keyed on; empty when absent.
    pub fn path(&self) -> &str {
        self.query_param("path").unwrap_or("")
    }

    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    /// Numeric query parameter. Absent is `None`; present but not a number
    /// is a request failure.
    pub fn query_id(&self, key: &str) -> Result<Option<i64>, ApiError> {
        self.query_param(key)
            .map(|raw| {
                raw.trim()
                    .parse::<i64>()
                    .map_err(|_| ApiError::internal(format!("invalid {key}: '{raw}'")))
            })
            .transpose()
    }

    /// Decode the JSON body. A missing or blank body reads as `{}`.
    pub fn json_body<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        let raw = self
            .body
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("{}");
        let value: Value = serde_json::from_str(raw)?;
        Ok(serde_json::from_value(value)?)
    }
}

/// The numeric id at the end of a `resource/{id}` path.
pub fn trailing_id(path: &str) -> Result<i64, ApiError> {
    path.rsplit('/')
        .next()
        .and_then(|raw| raw.parse::<i64>().ok())
        .ok_or_else(|| ApiError::internal(format!("invalid id in path '{path}'")))
}

/// What goes back to the caller: status, headers and an already encoded body.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl Reply {
    pub fn json(status: StatusCode, payload: &Value) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));

        Self {
            status,
            headers,
            body: payload.to_string(),
        }
    }

    pub fn error(status: StatusCode, message: &str) -> Self {
        Self::json(status, &serde_json::json!({ "error": message }))
    }

    /// CORS preflight: fixed headers, empty body.
    pub fn preflight(allow_methods: &'static str, allow_headers: &'static str) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(allow_methods),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(allow_headers),
        );
        headers.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("86400"));

        Self {
            status: StatusCode::OK,
            headers,
            body: String::new(),
        }
    }

    pub fn payload(&self) -> serde_json::Result<Value> {
        serde_json::from_str(&self.body)
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        (self.status, self.headers, self.body).into_response()
    }
}
