use qsl_core::errors::QslError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("JWT secret is not configured")]
    MissingSecret,

    #[error("token expired")]
    Expired,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error("invalid auth configuration: {0}")]
    Config(String),
}

impl From<AuthError> for QslError {
    fn from(err: AuthError) -> Self {
        let base = match &err {
            AuthError::Expired => QslError::not_authenticated("Token expired"),
            AuthError::InvalidToken(_) => QslError::not_authenticated("Invalid token"),
            AuthError::MissingSecret | AuthError::Hash(_) | AuthError::Config(_) => {
                QslError::general_error("Internal server error")
            }
        };
        base.with_source(anyhow::Error::new(err))
    }
}

impl AuthError {
    pub fn into_anyhow(self) -> anyhow::Error {
        QslError::from(self).into_anyhow()
    }
}
