use qsl_core::errors::QslError;
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Failures of a document store connection.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("connection is closed")]
    Closed,

    #[error("duplicate key in `{collection}` ({index})")]
    Duplicate { collection: String, index: String },

    #[error("document not found: {0}")]
    NotFound(String),

    #[error("collection is not registered: {0}")]
    UnknownCollection(String),

    #[error("invalid store uri: {0}")]
    InvalidUri(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Failures of the connection registry.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("administrative connection is not initialized")]
    NotInitialized,

    #[error("cannot connect to database `{database}`")]
    Connection {
        database: String,
        #[source]
        source: StoreError,
    },

    #[error("cannot register record types on `{database}`")]
    Registration {
        database: String,
        #[source]
        source: StoreError,
    },
}

impl From<StoreError> for QslError {
    fn from(err: StoreError) -> Self {
        let base = match &err {
            StoreError::Closed | StoreError::Connection(_) => {
                QslError::unavailable("Service temporarily unavailable")
            }
            StoreError::Duplicate { .. } => QslError::bad_request("Record already exists"),
            StoreError::NotFound(_) => QslError::not_found("Resource not found"),
            StoreError::UnknownCollection(_)
            | StoreError::InvalidUri(_)
            | StoreError::Serialization(_)
            | StoreError::Backend(_) => QslError::general_error("Internal server error"),
        };
        base.with_source(anyhow::Error::new(err))
    }
}

impl From<RegistryError> for QslError {
    fn from(err: RegistryError) -> Self {
        QslError::unavailable("Service temporarily unavailable").with_source(anyhow::Error::new(err))
    }
}

/// `StoreError` as the `anyhow::Error` services propagate.
pub fn store_error(err: StoreError) -> anyhow::Error {
    QslError::from(err).into_anyhow()
}

pub fn registry_error(err: RegistryError) -> anyhow::Error {
    QslError::from(err).into_anyhow()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_are_bad_requests() {
        let err = store_error(StoreError::Duplicate {
            collection: "tags".into(),
            index: "name".into(),
        });
        let qsl = QslError::find_in(&err).unwrap();
        assert_eq!(qsl.code(), 400);
        assert_eq!(qsl.message, "Record already exists");
    }

    #[test]
    fn registry_failures_are_unavailable_without_leaking_details() {
        let err = registry_error(RegistryError::Connection {
            database: "radio_card_user_1".into(),
            source: StoreError::Connection("refused".into()),
        });
        let qsl = QslError::find_in(&err).unwrap().sanitize_for_client();
        assert_eq!(qsl.code(), 503);
        assert_eq!(qsl.message, "Service temporarily unavailable");
        assert!(!qsl.to_json().to_string().contains("refused"));
    }
}
