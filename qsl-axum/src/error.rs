use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use qsl_core::errors::QslError;
use tracing::{error, warn};

#[derive(Debug)]
pub struct QslAxumError(pub anyhow::Error);

impl From<anyhow::Error> for QslAxumError {
    fn from(e: anyhow::Error) -> Self {
        Self(e)
    }
}

impl From<QslError> for QslAxumError {
    fn from(e: QslError) -> Self {
        Self(e.into_anyhow())
    }
}

impl IntoResponse for QslAxumError {
    fn into_response(self) -> Response {
        let safe = match QslError::find_in(&self.0) {
            Some(qsl) => {
                if qsl.code() >= 500 {
                    warn!(error = ?self.0, code = qsl.code(), "request failed");
                }
                qsl.sanitize_for_client()
            }
            None => {
                // Anything that is not a QslError is an internal failure.
                error!(error = ?self.0, "unhandled error");
                QslError::general_error("Internal server error")
            }
        };
        let status = StatusCode::from_u16(safe.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(safe.to_envelope())).into_response()
    }
}
