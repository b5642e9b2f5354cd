//! HTTP error mapping
//!
//! Every failure that reaches a client is an [`ApiError`]; the body is
//! always `{"error": "<message>"}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use mcp_compose_core::{ConfigError, ControlError};
use mcp_compose_mcp::{InspectorError, UpstreamError};
use mcp_compose_runtime::{EngineErrorKind, RuntimeError};
use serde_json::json;

use crate::auth::AuthError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("{0}")]
    Timeout(String),

    #[error(transparent)]
    Engine(#[from] RuntimeError),

    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::Config(_) => StatusCode::BAD_REQUEST,
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Upstream(UpstreamError::Timeout(_)) | Self::Timeout(_) => {
                StatusCode::GATEWAY_TIMEOUT
            }
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Engine(e) => match e.kind {
                EngineErrorKind::EngineAbsent => StatusCode::SERVICE_UNAVAILABLE,
                EngineErrorKind::NotFound => StatusCode::NOT_FOUND,
                EngineErrorKind::Busy => StatusCode::CONFLICT,
                EngineErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut response = (status, Json(json!({ "error": self.to_string() }))).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                http::header::WWW_AUTHENTICATE,
                http::HeaderValue::from_static("Bearer"),
            );
        }
        response
    }
}

impl From<InspectorError> for ApiError {
    fn from(err: InspectorError) -> Self {
        match err {
            InspectorError::SessionNotFound(_) | InspectorError::UnknownRoute { .. } => {
                Self::NotFound(err.to_string())
            }
            InspectorError::Upstream(e) => Self::Upstream(e),
            InspectorError::Rpc { .. } => Self::Upstream(UpstreamError::Malformed(err.to_string())),
        }
    }
}

impl From<ControlError> for ApiError {
    fn from(err: ControlError) -> Self {
        match err {
            ControlError::Config(e) => Self::Config(e),
            ControlError::UnknownServer(name) => Self::NotFound(format!("Unknown server '{}'", name)),
            ControlError::EngineAbsent => Self::Engine(RuntimeError::engine_absent()),
            ControlError::Engine(message) => Self::Internal(message),
        }
    }
}
