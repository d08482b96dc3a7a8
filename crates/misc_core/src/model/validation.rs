//! Validation errors raised before any store mutation.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Input rejected before it reaches storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A save request carried no objects.
    EmptyBatch,
    /// A required field is absent or blank.
    MissingField {
        entity: &'static str,
        field: &'static str,
    },
    /// A field is present but violates an entity rule.
    InvalidField {
        entity: &'static str,
        field: &'static str,
        reason: String,
    },
    /// Collection name does not map to a known entity.
    UnknownCollection(String),
    /// Field name is not usable in a document lookup.
    InvalidFieldName(String),
    /// Replace/delete was attempted against an archive collection.
    ArchiveIsAppendOnly(&'static str),
    /// Request header is absent or incomplete.
    InvalidHeader(&'static str),
    /// Request requires an identity but none (or the nil identity) was given.
    MissingIdentity,
    /// A get request named both an identity and a field filter.
    ConflictingSelectors,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyBatch => write!(f, "batch must contain at least one object"),
            Self::MissingField { entity, field } => {
                write!(f, "{entity}.{field} is required")
            }
            Self::InvalidField {
                entity,
                field,
                reason,
            } => write!(f, "{entity}.{field} is invalid: {reason}"),
            Self::UnknownCollection(name) => write!(f, "unknown collection `{name}`"),
            Self::InvalidFieldName(name) => write!(f, "invalid document field name `{name}`"),
            Self::ArchiveIsAppendOnly(name) => {
                write!(f, "archive collection `{name}` is append-only")
            }
            Self::InvalidHeader(details) => write!(f, "invalid request header: {details}"),
            Self::MissingIdentity => write!(f, "request requires a non-empty id"),
            Self::ConflictingSelectors => write!(f, "use either id or filter, not both"),
        }
    }
}

impl Error for ValidationError {}

pub(crate) fn require_text(
    entity: &'static str,
    field: &'static str,
    value: &str,
) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField { entity, field });
    }
    Ok(())
}

pub(crate) fn invalid(
    entity: &'static str,
    field: &'static str,
    reason: impl Into<String>,
) -> ValidationError {
    ValidationError::InvalidField {
        entity,
        field,
        reason: reason.into(),
    }
}
