//! Versioned upsert/archive store.
//!
//! # Responsibility
//! - Save batches of entities: insert new objects, replace existing ones and
//!   append the superseded version to the archive collection.
//! - Delete entities by moving the live version into the archive collection.
//! - Read live entities and their archived history.
//!
//! # Invariants
//! - One batch or delete runs in exactly one store transaction.
//! - `createdAt` is stamped once and carried forward on every replace.
//! - Provenance (`changedAt`, `changeComment`, `changeUser`) on a live record
//!   only ever comes from this store, never from the caller's object.
//! - Superseded versions are stamped `changedAt = batch start`; deleted
//!   versions are stamped `deletedAt = now`.
//! - The store holds no per-call state; results are returned, never stashed.

use crate::clock::{Clock, SystemClock};
use crate::model::entity::{
    DomainObject, EntityKind, EpochMillis, HasIdentity, HasLifecycleInfo, ObjectId,
};
use crate::model::state::StateTransitionRule;
use crate::model::validation::ValidationError;
use crate::store::document::{
    from_document, i64_field, set_field, to_document, Collection, DocumentStore,
    CHANGED_AT_FIELD, CHANGE_COMMENT_FIELD, CHANGE_USER_FIELD, CREATED_AT_FIELD,
    DELETED_AT_FIELD,
};
use crate::store::{StoreError, StoreResult};
use log::debug;
use serde::Serialize;
use std::time::Instant;

/// Archived version of an entity, oldest first when listed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveRecord<T> {
    pub archive_id: ObjectId,
    pub archived_at: EpochMillis,
    pub object: T,
}

/// Save/delete-with-archive over any `DocumentStore`.
pub struct VersionedStore<S, C = SystemClock> {
    store: S,
    clock: C,
}

impl<S: DocumentStore> VersionedStore<S, SystemClock> {
    pub fn new(store: S) -> Self {
        Self::with_clock(store, SystemClock)
    }
}

impl<S: DocumentStore, C: Clock> VersionedStore<S, C> {
    pub fn with_clock(store: S, clock: C) -> Self {
        Self { store, clock }
    }

    /// Clock used for lifecycle stamps.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Persists a batch of objects of one entity kind in one transaction.
    ///
    /// Objects without identity are inserted and receive a fresh identity;
    /// any provenance they carry is cleared. Objects with identity replace their live record; the superseded record
    /// is archived with `changedAt` set to the batch start time.
    ///
    /// # Errors
    /// - `Validation` for an empty batch or an object breaking entity rules.
    /// - `NoDataFound` when an identity has no live record.
    /// - `Db` for storage failures; nothing from the batch is committed.
    pub fn save_batch<T: DomainObject>(
        &self,
        objects: Vec<T>,
        comment: &str,
        user: &str,
    ) -> StoreResult<Vec<T>> {
        if objects.is_empty() {
            return Err(ValidationError::EmptyBatch.into());
        }
        for object in &objects {
            object.validate()?;
        }

        let timer = Instant::now();
        let started_at = self.clock.now_ms();
        let comment = non_blank(comment);
        let user = non_blank(user);
        let live = Collection::Live(T::KIND);
        let archive = Collection::Archive(T::KIND);

        let (saved, replaced) = self.store.with_transaction(|session| {
            let mut saved = Vec::with_capacity(objects.len());
            let mut replaced = 0usize;

            for mut object in objects {
                let now = self.clock.now_ms();
                object.lifecycle_mut().deleted_at = None;

                match object.persisted_id() {
                    None => {
                        let lifecycle = object.lifecycle_mut();
                        lifecycle.created_at.get_or_insert(now);
                        lifecycle.changed_at = None;
                        lifecycle.change_comment = None;
                        lifecycle.change_user = None;
                        let id = session.insert(live, to_document(&object)?)?;
                        object.set_id(id);
                    }
                    Some(id) => {
                        let lifecycle = object.lifecycle_mut();
                        lifecycle.changed_at = Some(now);
                        lifecycle.change_comment = comment.clone();
                        lifecycle.change_user = user.clone();

                        let mut superseded = session
                            .replace_by_id(live, id, to_document(&object)?)?
                            .ok_or(StoreError::NoDataFound {
                                collection: live.name(),
                                id,
                            })?;
                        let lifecycle = object.lifecycle_mut();
                        lifecycle.created_at =
                            i64_field(&superseded, CREATED_AT_FIELD).or(lifecycle.created_at);

                        set_field(&mut superseded, CHANGED_AT_FIELD, started_at)?;
                        session.insert(archive, superseded)?;
                        replaced += 1;
                    }
                }
                saved.push(object);
            }

            Ok((saved, replaced))
        })?;

        debug!(
            "event=save_batch module=store status=ok collection={} inserted={} replaced={} duration_ms={}",
            live,
            saved.len() - replaced,
            replaced,
            timer.elapsed().as_millis()
        );
        Ok(saved)
    }

    /// Deletes a live record and appends it to the archive with `deletedAt`.
    ///
    /// # Errors
    /// - `Validation` when `collection_name` is not a live collection name.
    /// - `NoDataFound` when no live record matches; nothing is written.
    /// - `Db` for storage failures, including a failed archive insert, in
    ///   which case the live delete is rolled back.
    pub fn delete_by_id(&self, id: ObjectId, collection_name: &str) -> StoreResult<()> {
        self.archive_delete(id, collection_name, None, None)
    }

    /// Same as [`Self::delete_by_id`], also stamping provenance on the
    /// archived record.
    pub fn delete_by_id_with_comment(
        &self,
        id: ObjectId,
        collection_name: &str,
        comment: &str,
        user: &str,
    ) -> StoreResult<()> {
        self.archive_delete(id, collection_name, non_blank(comment), non_blank(user))
    }

    fn archive_delete(
        &self,
        id: ObjectId,
        collection_name: &str,
        comment: Option<String>,
        user: Option<String>,
    ) -> StoreResult<()> {
        let kind = EntityKind::from_collection_name(collection_name)
            .ok_or_else(|| ValidationError::UnknownCollection(collection_name.to_string()))?;
        let live = Collection::Live(kind);

        self.store.with_transaction(|session| {
            let mut removed = session
                .delete_by_id(live, id)?
                .ok_or(StoreError::NoDataFound {
                    collection: live.name(),
                    id,
                })?;

            set_field(&mut removed, DELETED_AT_FIELD, self.clock.now_ms())?;
            if let Some(comment) = comment {
                set_field(&mut removed, CHANGE_COMMENT_FIELD, comment)?;
            }
            if let Some(user) = user {
                set_field(&mut removed, CHANGE_USER_FIELD, user)?;
            }
            session.insert(Collection::Archive(kind), removed)?;
            Ok(())
        })?;

        debug!("event=delete module=store status=ok collection={live} id={id}");
        Ok(())
    }

    /// Loads one live object.
    pub fn get_by_id<T: DomainObject>(&self, id: ObjectId) -> StoreResult<Option<T>> {
        self.store.with_read_transaction(|session| {
            session
                .find_by_id(Collection::Live(T::KIND), id)?
                .map(from_document)
                .transpose()
        })
    }

    /// Lists live objects in insertion order.
    pub fn list<T: DomainObject>(&self) -> StoreResult<Vec<T>> {
        self.store.with_read_transaction(|session| {
            session
                .find_all(Collection::Live(T::KIND))?
                .into_iter()
                .map(from_document)
                .collect()
        })
    }

    /// Lists live objects whose top-level string field equals `value`.
    pub fn find_by_field<T: DomainObject>(&self, field: &str, value: &str) -> StoreResult<Vec<T>> {
        self.store.with_read_transaction(|session| {
            session
                .find_by_field(Collection::Live(T::KIND), field, value)?
                .into_iter()
                .map(from_document)
                .collect()
        })
    }

    /// Transition rules leaving `state_id`.
    pub fn transitions_from(&self, state_id: ObjectId) -> StoreResult<Vec<StateTransitionRule>> {
        self.find_by_field("fromState", &state_id.to_string())
    }

    /// Archived versions of one identity, oldest first.
    pub fn history<T: DomainObject>(&self, id: ObjectId) -> StoreResult<Vec<ArchiveRecord<T>>> {
        self.store.with_read_transaction(|session| {
            session
                .find_archived(T::KIND, id)?
                .into_iter()
                .map(|archived| {
                    Ok(ArchiveRecord {
                        archive_id: archived.archive_id,
                        archived_at: archived.archived_at,
                        object: from_document(archived.body)?,
                    })
                })
                .collect()
        })
    }
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
