//! Domain model for the misc service entities.
//!
//! # Responsibility
//! - Define the seven entity shapes persisted by the versioned store.
//! - Define the identity/lifecycle capabilities the store relies on.
//! - Own per-entity validation rules.
//!
//! # Invariants
//! - An absent or nil identity always means "not yet persisted".
//! - `createdAt` is set once and never overwritten by later saves.
//! - Lifecycle stamps are epoch milliseconds.

pub mod attribute;
pub mod category;
pub mod entity;
pub mod parameter;
pub mod state;
pub mod validation;
