//! JSON request, reply and event envelopes.

use crate::action::ActionError;
use crate::model::entity::{EpochMillis, ObjectId};
use crate::model::validation::ValidationError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Caller metadata present on every request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestHeader {
    /// Correlation id echoed in the reply and events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default)]
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl RequestHeader {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.user.trim().is_empty() {
            return Err(ValidationError::InvalidHeader("user is required"));
        }
        Ok(())
    }

    pub fn comment(&self) -> &str {
        self.comment.as_deref().unwrap_or("")
    }
}

/// Returns the validated header, or a validation error when it is absent.
pub fn require_header(header: Option<&RequestHeader>) -> Result<&RequestHeader, ValidationError> {
    let header = header.ok_or(ValidationError::InvalidHeader("header is missing"))?;
    header.validate()?;
    Ok(header)
}

/// `save`: objects to insert or replace.
#[derive(Debug, Clone, Deserialize)]
pub struct SaveRequest<T> {
    #[serde(default)]
    pub header: Option<RequestHeader>,
    #[serde(default = "Vec::new")]
    pub objects: Vec<T>,
}

/// `delete` and `history`: one target identity.
#[derive(Debug, Clone, Deserialize)]
pub struct IdRequest {
    #[serde(default)]
    pub header: Option<RequestHeader>,
    #[serde(
        default,
        deserialize_with = "crate::model::entity::deserialize_identity"
    )]
    pub id: Option<ObjectId>,
}

impl IdRequest {
    pub fn require_id(&self) -> Result<ObjectId, ValidationError> {
        self.id
            .filter(|id| !id.is_nil())
            .ok_or(ValidationError::MissingIdentity)
    }
}

/// Exact-match filter on a top-level string field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldFilter {
    pub field: String,
    pub value: String,
}

/// `get`: one object by id, objects matching a filter, or all objects.
#[derive(Debug, Clone, Deserialize)]
pub struct GetRequest {
    #[serde(default)]
    pub header: Option<RequestHeader>,
    #[serde(
        default,
        deserialize_with = "crate::model::entity::deserialize_identity"
    )]
    pub id: Option<ObjectId>,
    #[serde(default)]
    pub filter: Option<FieldFilter>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    BadRequest,
    ValidationError,
    NoDataFound,
    DatabaseError,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyError {
    pub code: ErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyHeader {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub status: ReplyStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ReplyError>,
}

/// Reply published on the action's reply topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub header: ReplyHeader,
    #[serde(default)]
    pub objects: Vec<Value>,
}

impl Reply {
    pub fn ok(request_id: Option<String>, objects: Vec<Value>) -> Self {
        Self {
            header: ReplyHeader {
                request_id,
                status: ReplyStatus::Ok,
                error: None,
            },
            objects,
        }
    }

    pub fn error(request_id: Option<String>, error: &ActionError) -> Self {
        Self {
            header: ReplyHeader {
                request_id,
                status: ReplyStatus::Error,
                error: Some(ReplyError {
                    code: error.code(),
                    message: error.to_string(),
                }),
            },
            objects: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Saved,
    Deleted,
    SaveFailed,
    DeleteFailed,
}

/// Domain event published after a save or delete reaches the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEvent {
    pub event: EventKind,
    pub collection: String,
    /// Affected identities; for failures, the identities the request named.
    pub ids: Vec<ObjectId>,
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub at: EpochMillis,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorCode>,
}
