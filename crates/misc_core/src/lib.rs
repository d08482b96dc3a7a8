//! Core of the misc service: reference-data entities kept in a document
//! store, with every replaced or deleted version moved to an append-only
//! archive.

pub mod action;
pub mod clock;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod store;

pub use action::envelope::{DomainEvent, ErrorCode, EventKind, Reply, ReplyStatus, RequestHeader};
pub use action::handler::ActionHandler;
pub use action::publisher::{PublishedMessage, Publisher, RecordingPublisher};
pub use action::{Action, ActionError, TopicScheme, Verb};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, MiscConfig};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::attribute::{AttributeDataType, AttributeDefinition, ObjectTypeCustomization};
pub use model::category::{Category, Hierarchy};
pub use model::entity::{
    DomainObject, EntityKind, EpochMillis, HasIdentity, HasLifecycleInfo, LifecycleInfo, ObjectId,
};
pub use model::parameter::Parameter;
pub use model::state::{State, StateTransitionRule};
pub use model::validation::ValidationError;
pub use store::document::{Collection, Document, DocumentSession, DocumentStore};
pub use store::sqlite::SqliteDocumentStore;
pub use store::versioned::{ArchiveRecord, VersionedStore};
pub use store::{StoreError, StoreResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
