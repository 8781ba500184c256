use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("{0}")]
    Validation(String),
    #[error("Bad credentials: {0}")]
    Configuration(String),
    #[error("Token exchange failed: {0}")]
    Authentication(String),
    #[error("Upstream request failed ({status}): {body}")]
    Upstream { status: u16, body: String },
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("Could not sign token assertion: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = match &self {
            RelayError::Validation(_) => StatusCode::BAD_REQUEST,
            RelayError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        tracing::error!(%status, "->> {}", self);

        let body = Json(serde_json::json!({
            "error": format!("{}", &self)
        }));

        (status, body).into_response()
    }
}
