//! Store URIs: `scheme://authority[/prefix]/database[?query]`.
//!
//! The last path segment names the database. Tenant URIs are derived from
//! the base URI by swapping that segment, or appending one when the base has
//! none. The query string is kept as is.

use std::fmt;
use std::str::FromStr;

use crate::error::{StoreError, StoreResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreUri {
    scheme: String,
    authority: String,
    prefix: String,
    database: Option<String>,
    query: Option<String>,
}

impl StoreUri {
    pub fn parse(raw: &str) -> StoreResult<Self> {
        let raw = raw.trim();
        let (scheme, rest) = raw
            .split_once("://")
            .ok_or_else(|| StoreError::InvalidUri(format!("missing scheme in `{raw}`")))?;

        if scheme.is_empty()
            || !scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        {
            return Err(StoreError::InvalidUri(format!("bad scheme in `{raw}`")));
        }

        let (main, query) = match rest.split_once('?') {
            Some((m, q)) => (m, Some(q.to_string())),
            None => (rest, None),
        };

        let (authority, path) = main.split_once('/').unwrap_or((main, ""));
        let path = path.trim_end_matches('/');

        let (prefix, database) = if path.is_empty() {
            (String::new(), None)
        } else {
            match path.rsplit_once('/') {
                Some((pre, db)) => (format!("/{pre}"), Some(db.to_string())),
                None => (String::new(), Some(path.to_string())),
            }
        };

        Ok(Self {
            scheme: scheme.to_ascii_lowercase(),
            authority: authority.to_string(),
            prefix,
            database,
            query: query.filter(|q| !q.is_empty()),
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Everything between the scheme and the database segment, used as a
    /// filesystem directory by file-backed drivers.
    pub fn location(&self) -> String {
        let loc = format!("{}{}", self.authority, self.prefix);
        if loc.is_empty() {
            ".".to_string()
        } else {
            loc
        }
    }

    /// Same server and options, different database.
    pub fn with_database(&self, database: &str) -> Self {
        Self {
            database: Some(database.to_string()),
            ..self.clone()
        }
    }
}

impl fmt::Display for StoreUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}{}", self.scheme, self.authority, self.prefix)?;
        if let Some(db) = &self.database {
            write!(f, "/{db}")?;
        }
        if let Some(q) = &self.query {
            write!(f, "?{q}")?;
        }
        Ok(())
    }
}

impl FromStr for StoreUri {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_database_and_keeps_query() {
        let base = StoreUri::parse("mongodb://localhost:27017/radio-card-system?authSource=admin").unwrap();
        assert_eq!(base.database(), Some("radio-card-system"));
        assert_eq!(
            base.with_database("radio_card_user_507f1f77bcf86cd799439011").to_string(),
            "mongodb://localhost:27017/radio_card_user_507f1f77bcf86cd799439011?authSource=admin"
        );
    }

    #[test]
    fn appends_database_when_missing() {
        let base = StoreUri::parse("mongodb://db.example:27017").unwrap();
        assert_eq!(base.database(), None);
        assert_eq!(base.with_database("t1").to_string(), "mongodb://db.example:27017/t1");

        let slash = StoreUri::parse("mongodb://db.example:27017/?replicaSet=rs0").unwrap();
        assert_eq!(slash.with_database("t1").to_string(), "mongodb://db.example:27017/t1?replicaSet=rs0");
    }

    #[test]
    fn file_locations_keep_the_directory() {
        let abs = StoreUri::parse("sqlite:///var/lib/qsl/radio").unwrap();
        assert_eq!(abs.location(), "/var/lib/qsl");
        assert_eq!(abs.with_database("t2").to_string(), "sqlite:///var/lib/qsl/t2");

        let rel = StoreUri::parse("sqlite://data/radio").unwrap();
        assert_eq!(rel.location(), "data");
    }

    #[test]
    fn rejects_garbage() {
        assert!(StoreUri::parse("localhost:27017").is_err());
        assert!(StoreUri::parse("://x/y").is_err());
    }
}
