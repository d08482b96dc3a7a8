//! Transactional document store contract.
//!
//! # Responsibility
//! - Name live and archive collections in a typed way.
//! - Define the session operations a transaction callback may use.
//! - Provide JSON document helpers shared by store implementations.
//!
//! # Invariants
//! - Live inserts always receive a fresh identity from the store.
//! - Archive collections only accept inserts; replace/delete are rejected.
//! - A transaction commits only when its callback returns `Ok`.

use crate::model::entity::{EntityKind, EpochMillis, ObjectId};
use crate::model::validation::ValidationError;
use crate::store::{StoreError, StoreResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// JSON object stored as one document.
pub type Document = Value;

pub const ID_FIELD: &str = "id";
pub const CREATED_AT_FIELD: &str = "createdAt";
pub const CHANGED_AT_FIELD: &str = "changedAt";
pub const DELETED_AT_FIELD: &str = "deletedAt";
pub const CHANGE_COMMENT_FIELD: &str = "changeComment";
pub const CHANGE_USER_FIELD: &str = "changeUser";

static FIELD_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").expect("valid field name regex"));

/// Live or archive collection of one entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Live(EntityKind),
    Archive(EntityKind),
}

impl Collection {
    pub fn kind(self) -> EntityKind {
        match self {
            Self::Live(kind) | Self::Archive(kind) => kind,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Live(kind) => kind.collection_name(),
            Self::Archive(kind) => kind.archive_collection_name(),
        }
    }

    pub fn is_archive(self) -> bool {
        matches!(self, Self::Archive(_))
    }
}

impl Display for Collection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One row of an archive collection.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchivedDocument {
    /// Identity of the archive row itself.
    pub archive_id: ObjectId,
    /// Time the row was appended, assigned by the store.
    pub archived_at: EpochMillis,
    /// Prior version as it was immediately before replace/delete, plus stamps.
    pub body: Document,
}

/// Operations available inside a store transaction.
pub trait DocumentSession {
    /// Inserts one document and returns its identity.
    ///
    /// Live: the store assigns a fresh identity and writes it into the
    /// document's `id` field. Archive: the document is appended unchanged and
    /// the identity of the archive row is returned.
    fn insert(&self, collection: Collection, document: Document) -> StoreResult<ObjectId>;

    fn find_by_id(&self, collection: Collection, id: ObjectId) -> StoreResult<Option<Document>>;

    /// All live documents in insertion order.
    fn find_all(&self, collection: Collection) -> StoreResult<Vec<Document>>;

    /// Live documents whose top-level `field` equals `value`.
    fn find_by_field(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> StoreResult<Vec<Document>>;

    /// Replaces the live document and returns the superseded one, or `None`
    /// when no live document matches.
    ///
    /// An integer `createdAt` on the stored document wins over the one in
    /// `document`, so the first insert time survives every replace.
    fn replace_by_id(
        &self,
        collection: Collection,
        id: ObjectId,
        document: Document,
    ) -> StoreResult<Option<Document>>;

    /// Removes the live document and returns it, or `None` when no live
    /// document matches.
    fn delete_by_id(&self, collection: Collection, id: ObjectId) -> StoreResult<Option<Document>>;

    /// Archived versions of one identity in append order.
    fn find_archived(&self, kind: EntityKind, id: ObjectId) -> StoreResult<Vec<ArchivedDocument>>;
}

/// A document store that runs callbacks inside one transaction.
pub trait DocumentStore {
    /// Runs `f` in a transaction; commits on `Ok`, rolls back on `Err`.
    fn with_transaction<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&dyn DocumentSession) -> StoreResult<T>;

    /// Runs a callback that only reads.
    ///
    /// `f` still sees one consistent snapshot, but the store may skip taking
    /// a write lock. Defaults to [`Self::with_transaction`].
    fn with_read_transaction<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&dyn DocumentSession) -> StoreResult<T>,
    {
        self.with_transaction(f)
    }
}

impl<S: DocumentStore> DocumentStore for &S {
    fn with_transaction<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&dyn DocumentSession) -> StoreResult<T>,
    {
        (**self).with_transaction(f)
    }

    fn with_read_transaction<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&dyn DocumentSession) -> StoreResult<T>,
    {
        (**self).with_read_transaction(f)
    }
}

/// Rejects writes that would mutate an archive collection.
pub fn ensure_live(collection: Collection) -> StoreResult<()> {
    if collection.is_archive() {
        return Err(ValidationError::ArchiveIsAppendOnly(collection.name()).into());
    }
    Ok(())
}

/// Rejects field names that cannot be used as a top-level lookup key.
pub fn validate_field_name(field: &str) -> Result<(), ValidationError> {
    if FIELD_NAME_RE.is_match(field) {
        Ok(())
    } else {
        Err(ValidationError::InvalidFieldName(field.to_string()))
    }
}

pub fn to_document<T: Serialize>(value: &T) -> StoreResult<Document> {
    let document = serde_json::to_value(value)?;
    if !document.is_object() {
        return Err(StoreError::InvalidData(
            "documents must serialize to JSON objects".to_string(),
        ));
    }
    Ok(document)
}

pub fn from_document<T: DeserializeOwned>(document: Document) -> StoreResult<T> {
    Ok(serde_json::from_value(document)?)
}

/// Reads the `id` field of a document; absent, null or nil means `None`.
pub fn document_id(document: &Document) -> StoreResult<Option<ObjectId>> {
    match document.get(ID_FIELD) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) if text.trim().is_empty() => Ok(None),
        Some(Value::String(text)) => {
            let id = Uuid::parse_str(text.trim()).map_err(|_| {
                StoreError::InvalidData(format!("invalid document id `{text}`"))
            })?;
            Ok(Some(id).filter(|id| !id.is_nil()))
        }
        Some(other) => Err(StoreError::InvalidData(format!(
            "document id must be a string, got `{other}`"
        ))),
    }
}

/// Reads an integer field, ignoring values of any other JSON type.
pub fn i64_field(document: &Document, field: &str) -> Option<i64> {
    document.get(field).and_then(Value::as_i64)
}

/// Sets one top-level field on an object document.
pub fn set_field(document: &mut Document, field: &str, value: impl Into<Value>) -> StoreResult<()> {
    match document.as_object_mut() {
        Some(object) => {
            object.insert(field.to_string(), value.into());
            Ok(())
        }
        None => Err(StoreError::InvalidData(format!(
            "cannot set `{field}` on a non-object document"
        ))),
    }
}
