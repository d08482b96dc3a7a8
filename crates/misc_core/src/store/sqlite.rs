//! SQLite-backed document store.
//!
//! # Responsibility
//! - Store JSON documents in the `documents` (live) and `document_archive`
//!   (append-only) tables.
//! - Map store transactions onto `IMMEDIATE` SQLite transactions and
//!   read-only ones onto `DEFERRED` transactions.
//!
//! # Invariants
//! - Callers must hand in a migrated connection (`db::open_db*`).
//! - A callback error drops the SQLite transaction, which rolls it back.
//! - Archive rows are never updated or deleted (also enforced by triggers).

use crate::db::migrations::require_latest;
use crate::model::entity::{EntityKind, ObjectId};
use crate::store::document::{
    document_id, ensure_live, i64_field, set_field, validate_field_name, ArchivedDocument,
    Collection, Document, DocumentSession, DocumentStore, CREATED_AT_FIELD, ID_FIELD,
};
use crate::store::{StoreError, StoreResult};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use uuid::Uuid;

/// Document store over one SQLite connection.
///
/// Each concurrent caller needs its own connection; the store keeps no state
/// besides the borrowed connection.
pub struct SqliteDocumentStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDocumentStore<'conn> {
    /// Constructs a store from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        require_latest(conn)?;
        Ok(Self { conn })
    }

    fn run<T, F>(&self, behavior: TransactionBehavior, f: F) -> StoreResult<T>
    where
        F: FnOnce(&dyn DocumentSession) -> StoreResult<T>,
    {
        let tx = Transaction::new_unchecked(self.conn, behavior)?;
        let value = f(&SqliteSession { conn: &tx })?;
        tx.commit()?;
        Ok(value)
    }
}

impl DocumentStore for SqliteDocumentStore<'_> {
    fn with_transaction<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&dyn DocumentSession) -> StoreResult<T>,
    {
        self.run(TransactionBehavior::Immediate, f)
    }

    /// Deferred: no lock until the first read, and never a write lock.
    fn with_read_transaction<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&dyn DocumentSession) -> StoreResult<T>,
    {
        self.run(TransactionBehavior::Deferred, f)
    }
}

struct SqliteSession<'tx> {
    conn: &'tx Connection,
}

impl DocumentSession for SqliteSession<'_> {
    fn insert(&self, collection: Collection, mut document: Document) -> StoreResult<ObjectId> {
        match collection {
            Collection::Live(kind) => {
                let id = Uuid::new_v4();
                set_field(&mut document, ID_FIELD, id.to_string())?;
                self.conn.execute(
                    "INSERT INTO documents (collection, id, body) VALUES (?1, ?2, ?3);",
                    params![
                        kind.collection_name(),
                        id.to_string(),
                        encode_body(&document)?
                    ],
                )?;
                Ok(id)
            }
            Collection::Archive(kind) => {
                let archive_id = Uuid::new_v4();
                let object_id = document_id(&document)?;
                self.conn.execute(
                    "INSERT INTO document_archive (archive_id, collection, object_id, body)
                     VALUES (?1, ?2, ?3, ?4);",
                    params![
                        archive_id.to_string(),
                        kind.collection_name(),
                        object_id.map(|id| id.to_string()),
                        encode_body(&document)?
                    ],
                )?;
                Ok(archive_id)
            }
        }
    }

    fn find_by_id(&self, collection: Collection, id: ObjectId) -> StoreResult<Option<Document>> {
        let sql = match collection {
            Collection::Live(_) => {
                "SELECT body FROM documents WHERE collection = ?1 AND id = ?2;"
            }
            Collection::Archive(_) => {
                "SELECT body FROM document_archive WHERE collection = ?1 AND archive_id = ?2;"
            }
        };

        let body: Option<String> = self
            .conn
            .query_row(
                sql,
                params![collection.kind().collection_name(), id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        body.map(|text| decode_body(collection, &text)).transpose()
    }

    fn find_all(&self, collection: Collection) -> StoreResult<Vec<Document>> {
        let sql = match collection {
            Collection::Live(_) => {
                "SELECT body FROM documents WHERE collection = ?1 ORDER BY rowid ASC;"
            }
            Collection::Archive(_) => {
                "SELECT body FROM document_archive WHERE collection = ?1 ORDER BY seq ASC;"
            }
        };

        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query([collection.kind().collection_name()])?;
        let mut documents = Vec::new();
        while let Some(row) = rows.next()? {
            let body: String = row.get(0)?;
            documents.push(decode_body(collection, &body)?);
        }
        Ok(documents)
    }

    fn find_by_field(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> StoreResult<Vec<Document>> {
        ensure_live(collection)?;
        validate_field_name(field)?;

        let mut stmt = self.conn.prepare(
            "SELECT body
             FROM documents
             WHERE collection = ?1
               AND json_extract(body, '$.' || ?2) = ?3
             ORDER BY rowid ASC;",
        )?;
        let mut rows = stmt.query(params![
            collection.kind().collection_name(),
            field,
            value
        ])?;
        let mut documents = Vec::new();
        while let Some(row) = rows.next()? {
            let body: String = row.get(0)?;
            documents.push(decode_body(collection, &body)?);
        }
        Ok(documents)
    }

    fn replace_by_id(
        &self,
        collection: Collection,
        id: ObjectId,
        mut document: Document,
    ) -> StoreResult<Option<Document>> {
        ensure_live(collection)?;

        let Some(prior) = self.find_by_id(collection, id)? else {
            return Ok(None);
        };

        set_field(&mut document, ID_FIELD, id.to_string())?;
        if let Some(created_at) = i64_field(&prior, CREATED_AT_FIELD) {
            set_field(&mut document, CREATED_AT_FIELD, created_at)?;
        }
        self.conn.execute(
            "UPDATE documents
             SET body = ?3,
                 updated_at = CAST((julianday('now') - 2440587.5) * 86400000 AS INTEGER)
             WHERE collection = ?1
               AND id = ?2;",
            params![
                collection.kind().collection_name(),
                id.to_string(),
                encode_body(&document)?
            ],
        )?;

        Ok(Some(prior))
    }

    fn delete_by_id(&self, collection: Collection, id: ObjectId) -> StoreResult<Option<Document>> {
        ensure_live(collection)?;

        let body: Option<String> = self
            .conn
            .query_row(
                "DELETE FROM documents
                 WHERE collection = ?1
                   AND id = ?2
                 RETURNING body;",
                params![collection.kind().collection_name(), id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        body.map(|text| decode_body(collection, &text)).transpose()
    }

    fn find_archived(&self, kind: EntityKind, id: ObjectId) -> StoreResult<Vec<ArchivedDocument>> {
        let mut stmt = self.conn.prepare(
            "SELECT archive_id, archived_at, body
             FROM document_archive
             WHERE collection = ?1
               AND object_id = ?2
             ORDER BY seq ASC;",
        )?;
        let mut rows = stmt.query(params![kind.collection_name(), id.to_string()])?;
        let mut archived = Vec::new();
        while let Some(row) = rows.next()? {
            let archive_id_text: String = row.get("archive_id")?;
            let archive_id = Uuid::parse_str(&archive_id_text).map_err(|_| {
                StoreError::InvalidData(format!(
                    "invalid archive id `{archive_id_text}` in document_archive.archive_id"
                ))
            })?;
            let body: String = row.get("body")?;
            archived.push(ArchivedDocument {
                archive_id,
                archived_at: row.get("archived_at")?,
                body: decode_body(Collection::Archive(kind), &body)?,
            });
        }
        Ok(archived)
    }
}

fn encode_body(document: &Document) -> StoreResult<String> {
    Ok(serde_json::to_string(document)?)
}

fn decode_body(collection: Collection, body: &str) -> StoreResult<Document> {
    let document: Document = serde_json::from_str(body).map_err(|err| {
        StoreError::InvalidData(format!("unreadable body in `{collection}`: {err}"))
    })?;
    if !document.is_object() {
        return Err(StoreError::InvalidData(format!(
            "non-object body in `{collection}`"
        )));
    }
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::SqliteDocumentStore;
    use crate::db::{open_db_in_memory, DbError};
    use crate::model::entity::EntityKind;
    use crate::store::document::{Collection, DocumentStore};
    use crate::store::StoreError;
    use rusqlite::Connection;
    use serde_json::json;

    const LIVE: Collection = Collection::Live(EntityKind::Category);
    const ARCHIVE: Collection = Collection::Archive(EntityKind::Category);

    #[test]
    fn try_new_rejects_unmigrated_connection() {
        let conn = Connection::open_in_memory().unwrap();
        let err = SqliteDocumentStore::try_new(&conn).err().unwrap();
        assert!(matches!(
            err,
            StoreError::Db(DbError::SchemaNotReady {
                actual_version: 0,
                ..
            })
        ));
    }

    #[test]
    fn live_insert_assigns_identity_into_body() {
        let conn = open_db_in_memory().unwrap();
        let store = SqliteDocumentStore::try_new(&conn).unwrap();

        let (id, loaded) = store
            .with_transaction(|session| {
                let id = session.insert(LIVE, json!({"name": "Alpha"}))?;
                Ok((id, session.find_by_id(LIVE, id)?))
            })
            .unwrap();

        let loaded = loaded.unwrap();
        assert_eq!(loaded["id"], id.to_string());
        assert_eq!(loaded["name"], "Alpha");
    }

    #[test]
    fn replace_and_delete_return_prior_document() {
        let conn = open_db_in_memory().unwrap();
        let store = SqliteDocumentStore::try_new(&conn).unwrap();

        store
            .with_transaction(|session| {
                let id = session.insert(LIVE, json!({"name": "Alpha"}))?;
                let prior = session.replace_by_id(LIVE, id, json!({"name": "Beta"}))?;
                assert_eq!(prior.unwrap()["name"], "Alpha");

                let removed = session.delete_by_id(LIVE, id)?;
                assert_eq!(removed.unwrap()["name"], "Beta");
                assert!(session.find_by_id(LIVE, id)?.is_none());
                assert!(session.delete_by_id(LIVE, id)?.is_none());
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn replace_keeps_stored_created_at() {
        let conn = open_db_in_memory().unwrap();
        let store = SqliteDocumentStore::try_new(&conn).unwrap();

        store
            .with_transaction(|session| {
                let id = session.insert(LIVE, json!({"name": "Alpha", "createdAt": 100}))?;
                let prior =
                    session.replace_by_id(LIVE, id, json!({"name": "Beta", "createdAt": 7}))?;
                assert_eq!(prior.unwrap()["createdAt"], 100);

                let live = session.find_by_id(LIVE, id)?.unwrap();
                assert_eq!(live["name"], "Beta");
                assert_eq!(live["createdAt"], 100);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn read_transaction_does_not_take_the_write_lock() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("misc.db");
        let writer = crate::db::open_db(&path).unwrap();
        let reader = crate::db::open_db(&path).unwrap();
        reader.busy_timeout(std::time::Duration::ZERO).unwrap();

        writer.execute_batch("BEGIN IMMEDIATE;").unwrap();
        let store = SqliteDocumentStore::try_new(&reader).unwrap();

        let listed = store
            .with_read_transaction(|session| session.find_all(LIVE))
            .unwrap();
        assert!(listed.is_empty());

        let err = store.with_transaction(|_| Ok(())).unwrap_err();
        assert!(matches!(err, StoreError::Db(ref db) if db.is_busy()));
        writer.execute_batch("ROLLBACK;").unwrap();
    }

    #[test]
    fn archive_rejects_replace_and_delete() {
        let conn = open_db_in_memory().unwrap();
        let store = SqliteDocumentStore::try_new(&conn).unwrap();

        let err = store
            .with_transaction(|session| {
                let archive_id = session.insert(ARCHIVE, json!({"name": "old"}))?;
                session.delete_by_id(ARCHIVE, archive_id)
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn failed_callback_rolls_back_writes() {
        let conn = open_db_in_memory().unwrap();
        let store = SqliteDocumentStore::try_new(&conn).unwrap();

        let err = store
            .with_transaction(|session| {
                session.insert(LIVE, json!({"name": "Alpha"}))?;
                Err::<(), _>(StoreError::InvalidData("forced".to_string()))
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidData(_)));

        let remaining = store
            .with_transaction(|session| session.find_all(LIVE))
            .unwrap();
        assert!(remaining.is_empty());
    }

    #[test]
    fn find_by_field_matches_string_values_only_in_collection() {
        let conn = open_db_in_memory().unwrap();
        let store = SqliteDocumentStore::try_new(&conn).unwrap();

        let hits = store
            .with_transaction(|session| {
                session.insert(LIVE, json!({"name": "Alpha"}))?;
                session.insert(LIVE, json!({"name": "Beta"}))?;
                session.insert(
                    Collection::Live(EntityKind::State),
                    json!({"name": "Alpha"}),
                )?;
                session.find_by_field(LIVE, "name", "Alpha")
            })
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0]["name"], "Alpha");
    }
}
