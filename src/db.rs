use crate::store::{
    apply_fields, server_timestamp, Direction, Document, DocumentStore, SetMode, StoreError,
    WriteBatch, WriteOp,
};
use anyhow::Context;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;

pub const DB_FILE: &str = "gradebook.sqlite3";

// Keys bound per `IN (...)` lookup; stays well under SQLite's bound-variable limit.
const GET_MANY_CHUNK: usize = 500;

/// Document store kept in a single SQLite table inside the workspace folder.
pub struct SqliteStore {
    conn: Connection,
}

pub fn open_db(workspace: &Path) -> anyhow::Result<SqliteStore> {
    std::fs::create_dir_all(workspace).with_context(|| {
        format!(
            "failed to create workspace {}",
            workspace.to_string_lossy()
        )
    })?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(&db_path)
        .with_context(|| format!("failed to open {}", db_path.to_string_lossy()))?;
    init_schema(&conn)?;
    Ok(SqliteStore { conn })
}

fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS documents(
            collection TEXT NOT NULL,
            doc_id TEXT NOT NULL,
            data TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY(collection, doc_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection)",
        [],
    )?;
    Ok(())
}

impl SqliteStore {
    #[cfg(test)]
    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    fn read_data(
        &self,
        collection: &str,
        key: &str,
    ) -> Result<Option<Map<String, Value>>, StoreError> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT data FROM documents WHERE collection = ? AND doc_id = ?",
                (collection, key),
                |r| r.get(0),
            )
            .optional()?;
        raw.map(|s| decode(collection, key, &s)).transpose()
    }
}

fn decode(collection: &str, id: &str, raw: &str) -> Result<Map<String, Value>, StoreError> {
    serde_json::from_str(raw).map_err(|source| StoreError::Corrupt {
        collection: collection.to_string(),
        id: id.to_string(),
        source,
    })
}

impl DocumentStore for SqliteStore {
    fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        let now = server_timestamp();
        // Dropping the transaction on an early return rolls it back.
        let tx = self.conn.unchecked_transaction()?;
        for op in batch.ops() {
            let (collection, key, fields, mode) = match op {
                WriteOp::Set {
                    collection,
                    key,
                    fields,
                    mode,
                } => (collection, key, fields, *mode),
                WriteOp::Add {
                    collection,
                    id,
                    fields,
                } => (collection, id, fields, SetMode::Overwrite),
            };
            let existing = match mode {
                SetMode::Merge => self.read_data(collection, key)?,
                SetMode::Overwrite => None,
            };
            let data = apply_fields(existing, fields, mode, &now);
            tx.execute(
                "INSERT INTO documents(collection, doc_id, data, updated_at)
                 VALUES(?, ?, ?, ?)
                 ON CONFLICT(collection, doc_id) DO UPDATE SET
                   data = excluded.data,
                   updated_at = excluded.updated_at",
                (collection, key, serde_json::to_string(&data)?, &now),
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn get(&self, collection: &str, key: &str) -> Result<Option<Document>, StoreError> {
        Ok(self.read_data(collection, key)?.map(|data| Document {
            id: key.to_string(),
            data,
        }))
    }

    fn get_many(
        &self,
        collection: &str,
        keys: &[String],
    ) -> Result<HashMap<String, Document>, StoreError> {
        let mut out = HashMap::with_capacity(keys.len());
        for chunk in keys.chunks(GET_MANY_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!(
                "SELECT doc_id, data FROM documents WHERE collection = ? AND doc_id IN ({})",
                placeholders
            );
            let mut bind_values: Vec<&str> = Vec::with_capacity(chunk.len() + 1);
            bind_values.push(collection);
            bind_values.extend(chunk.iter().map(|k| k.as_str()));

            let mut stmt = self.conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(bind_values), |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?
                .collect::<Result<Vec<_>, _>>()?;

            for (id, raw) in rows {
                let data = decode(collection, &id, &raw)?;
                out.insert(id.clone(), Document { id, data });
            }
        }
        Ok(out)
    }

    fn query_ordered(
        &self,
        collection: &str,
        field: &str,
        direction: Direction,
    ) -> Result<Vec<Document>, StoreError> {
        let dir = match direction {
            Direction::Ascending => "ASC",
            Direction::Descending => "DESC",
        };
        let sql = format!(
            "SELECT doc_id, data FROM documents
             WHERE collection = ?1 AND json_extract(data, ?2) IS NOT NULL
             ORDER BY json_extract(data, ?2) {dir}, rowid {dir}"
        );
        let path = format!("$.{field}");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map((collection, &path), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, raw)| {
                let data = decode(collection, &id, &raw)?;
                Ok(Document { id, data })
            })
            .collect()
    }
}
