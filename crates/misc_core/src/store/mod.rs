//! Document persistence with version history.
//!
//! # Responsibility
//! - Define the transactional document store contract (`document`).
//! - Provide the SQLite implementation of that contract (`sqlite`).
//! - Implement save-with-archive and delete-with-archive once for every
//!   entity kind (`versioned`).
//!
//! # Invariants
//! - Every multi-step write runs inside one store transaction.
//! - Store APIs return semantic errors (`NoDataFound`) in addition to DB
//!   transport errors; nothing is logged in place of being returned.

use crate::db::DbError;
use crate::model::entity::ObjectId;
use crate::model::validation::ValidationError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod document;
pub mod sqlite;
pub mod versioned;

pub type StoreResult<T> = Result<T, StoreError>;

/// Error taxonomy shared by the document store and the versioned store.
#[derive(Debug)]
pub enum StoreError {
    Validation(ValidationError),
    /// A replace or delete targeted an identity with no live record.
    NoDataFound {
        collection: &'static str,
        id: ObjectId,
    },
    /// SQLite failure or a connection not at the latest schema.
    Db(DbError),
    /// A document could not be encoded to or decoded from JSON.
    Serialization(serde_json::Error),
    /// A persisted row cannot be read back as a document.
    InvalidData(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NoDataFound { collection, id } => {
                write!(f, "no data found in `{collection}` for id {id}")
            }
            Self::Db(err) => write!(f, "{err}"),
            Self::Serialization(err) => write!(f, "document serialization failed: {err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted document: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Serialization(err) => Some(err),
            Self::NoDataFound { .. } | Self::InvalidData(_) => None,
        }
    }
}

impl From<ValidationError> for StoreError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(value.into())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}
