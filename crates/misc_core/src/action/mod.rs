//! Request/reply actions over the versioned store.
//!
//! # Responsibility
//! - Map request topics to an entity kind and a verb.
//! - Decode JSON requests, validate headers, run store operations.
//! - Publish one reply per request and a domain event per save/delete.
//!
//! # Invariants
//! - Header validation failures never reach the store.
//! - Handlers keep no per-request state; each request's result is a value
//!   threaded through the call.

use crate::model::entity::EntityKind;
use crate::model::validation::ValidationError;
use crate::store::StoreError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod envelope;
pub mod handler;
pub mod publisher;

use envelope::ErrorCode;

/// Operation requested on one entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Save,
    Delete,
    Get,
    History,
}

impl Verb {
    pub const ALL: [Verb; 4] = [Verb::Save, Verb::Delete, Verb::Get, Verb::History];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Save => "save",
            Self::Delete => "delete",
            Self::Get => "get",
            Self::History => "history",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|verb| verb.as_str() == value)
    }
}

/// Entity kind plus verb, identified by a request topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Action {
    pub kind: EntityKind,
    pub verb: Verb,
}

/// Topic naming: `<prefix>/<collection>/<verb>/request|reply` and
/// `<prefix>/<collection>/events`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicScheme {
    prefix: String,
}

impl TopicScheme {
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self {
            prefix: prefix.trim().trim_matches('/').to_string(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn request_topic(&self, action: Action) -> String {
        self.action_topic(action, "request")
    }

    pub fn reply_topic(&self, action: Action) -> String {
        self.action_topic(action, "reply")
    }

    pub fn event_topic(&self, kind: EntityKind) -> String {
        format!("{}/{}/events", self.prefix, kind.collection_name())
    }

    /// Resolves a request topic; reply/event topics and foreign prefixes
    /// return `None`.
    pub fn parse_request(&self, topic: &str) -> Option<Action> {
        let rest = topic.trim().strip_prefix(self.prefix.as_str())?;
        let rest = rest.strip_prefix('/')?;

        let mut parts = rest.split('/');
        let collection = parts.next()?;
        let verb = parts.next()?;
        if parts.next()? != "request" || parts.next().is_some() {
            return None;
        }

        Some(Action {
            kind: EntityKind::from_collection_name(collection)?,
            verb: Verb::parse(verb)?,
        })
    }

    fn action_topic(&self, action: Action, suffix: &str) -> String {
        format!(
            "{}/{}/{}/{suffix}",
            self.prefix,
            action.kind.collection_name(),
            action.verb.as_str()
        )
    }
}

impl Default for TopicScheme {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_TOPIC_PREFIX)
    }
}

/// Failure while handling one request.
#[derive(Debug)]
pub enum ActionError {
    /// Topic does not name a known action; no reply can be addressed.
    UnknownTopic(String),
    /// Payload is not valid JSON or does not match the request shape.
    BadRequest(serde_json::Error),
    Validation(ValidationError),
    Store(StoreError),
    /// Reply could not be encoded.
    ReplyEncoding(serde_json::Error),
}

impl ActionError {
    /// Reply error code reported to the caller.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::UnknownTopic(_) | Self::BadRequest(_) => ErrorCode::BadRequest,
            Self::Validation(_) | Self::Store(StoreError::Validation(_)) => {
                ErrorCode::ValidationError
            }
            Self::Store(StoreError::NoDataFound { .. }) => ErrorCode::NoDataFound,
            Self::Store(_) | Self::ReplyEncoding(_) => ErrorCode::DatabaseError,
        }
    }
}

impl Display for ActionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownTopic(topic) => write!(f, "unknown request topic `{topic}`"),
            Self::BadRequest(err) => write!(f, "malformed request: {err}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::ReplyEncoding(err) => write!(f, "reply encoding failed: {err}"),
        }
    }
}

impl Error for ActionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::UnknownTopic(_) => None,
            Self::BadRequest(err) | Self::ReplyEncoding(err) => Some(err),
            Self::Validation(err) => Some(err),
            Self::Store(err) => Some(err),
        }
    }
}

impl From<ValidationError> for ActionError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<StoreError> for ActionError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

#[cfg(test)]
mod tests {
    use super::{Action, ActionError, TopicScheme, Verb};
    use crate::action::envelope::ErrorCode;
    use crate::model::entity::EntityKind;
    use crate::store::StoreError;
    use uuid::Uuid;

    #[test]
    fn request_topics_round_trip_through_parser() {
        let topics = TopicScheme::new("misc/");
        for kind in EntityKind::ALL {
            for verb in Verb::ALL {
                let action = Action { kind, verb };
                let topic = topics.request_topic(action);
                assert_eq!(topics.parse_request(&topic), Some(action), "{topic}");
            }
        }
    }

    #[test]
    fn parser_rejects_reply_foreign_and_archive_topics() {
        let topics = TopicScheme::default();
        assert_eq!(topics.parse_request("misc/categories/save/reply"), None);
        assert_eq!(topics.parse_request("other/categories/save/request"), None);
        assert_eq!(topics.parse_request("miscx/categories/save/request"), None);
        assert_eq!(
            topics.parse_request("misc/categories_archive/get/request"),
            None
        );
        assert_eq!(
            topics.parse_request("misc/categories/save/request/extra"),
            None
        );
        assert_eq!(topics.parse_request("misc/categories/rename/request"), None);
    }

    #[test]
    fn event_and_reply_topics_use_collection_names() {
        let topics = TopicScheme::new("svc");
        let action = Action {
            kind: EntityKind::StateTransitionRule,
            verb: Verb::Delete,
        };
        assert_eq!(
            topics.reply_topic(action),
            "svc/state_transition_rules/delete/reply"
        );
        assert_eq!(
            topics.event_topic(EntityKind::Parameter),
            "svc/parameters/events"
        );
    }

    #[test]
    fn store_errors_map_to_reply_codes() {
        let not_found = ActionError::Store(StoreError::NoDataFound {
            collection: "categories",
            id: Uuid::new_v4(),
        });
        assert_eq!(not_found.code(), ErrorCode::NoDataFound);

        let invalid = ActionError::Store(StoreError::InvalidData("bad".into()));
        assert_eq!(invalid.code(), ErrorCode::DatabaseError);
    }
}
