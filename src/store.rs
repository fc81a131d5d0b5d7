use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

pub const STUDENTS: &str = "students";
pub const GRADES: &str = "grades";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("corrupt document {collection}/{id}: {source}")]
    Corrupt {
        collection: String,
        id: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("encode document: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// A value in a write. `ServerTimestamp` is resolved by the store when the write applies.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Value(Value),
    ServerTimestamp,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteFields(Vec<(String, FieldValue)>);

impl WriteFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.0.push((name.to_string(), FieldValue::Value(value.into())));
        self
    }

    pub fn with_server_timestamp(mut self, name: &str) -> Self {
        self.0.push((name.to_string(), FieldValue::ServerTimestamp));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetMode {
    Overwrite,
    /// Shallow merge: top-level fields not named in the write are kept.
    Merge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Map<String, Value>,
}

impl Document {
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.data.get(field).and_then(|v| v.as_str())
    }

    pub fn get_f64(&self, field: &str) -> Option<f64> {
        self.data.get(field).and_then(|v| v.as_f64())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Set {
        collection: String,
        key: String,
        fields: WriteFields,
        mode: SetMode,
    },
    Add {
        collection: String,
        id: String,
        fields: WriteFields,
    },
}

/// Writes committed all-or-nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, collection: &str, key: &str, fields: WriteFields, mode: SetMode) {
        self.ops.push(WriteOp::Set {
            collection: collection.to_string(),
            key: key.to_string(),
            fields,
            mode,
        });
    }

    /// Queues an insert under a freshly generated id and returns that id.
    pub fn add(&mut self, collection: &str, fields: WriteFields) -> String {
        let id = new_document_id();
        self.ops.push(WriteOp::Add {
            collection: collection.to_string(),
            id: id.clone(),
            fields,
        });
        id
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Client interface to a schema-less document store addressed by collection and key.
pub trait DocumentStore {
    fn commit(&self, batch: WriteBatch) -> Result<(), StoreError>;

    fn get(&self, collection: &str, key: &str) -> Result<Option<Document>, StoreError>;

    /// Documents ordered by `field`. Documents without the field are not returned.
    /// Ties keep insertion order, newest first when descending.
    fn query_ordered(
        &self,
        collection: &str,
        field: &str,
        direction: Direction,
    ) -> Result<Vec<Document>, StoreError>;

    fn set(
        &self,
        collection: &str,
        key: &str,
        fields: WriteFields,
        mode: SetMode,
    ) -> Result<(), StoreError> {
        let mut batch = WriteBatch::new();
        batch.set(collection, key, fields, mode);
        self.commit(batch)
    }

    fn add(&self, collection: &str, fields: WriteFields) -> Result<String, StoreError> {
        let mut batch = WriteBatch::new();
        let id = batch.add(collection, fields);
        self.commit(batch)?;
        Ok(id)
    }

    /// Fetches every existing document among `keys`; absent keys are simply not in the map.
    fn get_many(
        &self,
        collection: &str,
        keys: &[String],
    ) -> Result<HashMap<String, Document>, StoreError> {
        let mut out = HashMap::new();
        for key in keys {
            if let Some(doc) = self.get(collection, key)? {
                out.insert(key.clone(), doc);
            }
        }
        Ok(out)
    }
}

pub fn new_document_id() -> String {
    Uuid::new_v4().to_string()
}

/// RFC 3339, UTC, fixed millisecond precision so that string order is time order.
pub fn server_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Applies a write to the currently stored data (if any) and returns the new document body.
pub(crate) fn apply_fields(
    existing: Option<Map<String, Value>>,
    fields: &WriteFields,
    mode: SetMode,
    now: &str,
) -> Map<String, Value> {
    let mut data = match mode {
        SetMode::Merge => existing.unwrap_or_default(),
        SetMode::Overwrite => Map::new(),
    };
    for (name, value) in fields.iter() {
        let v = match value {
            FieldValue::Value(v) => v.clone(),
            FieldValue::ServerTimestamp => Value::String(now.to_string()),
        };
        data.insert(name.to_string(), v);
    }
    data
}

fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

pub(crate) fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

#[derive(Debug, Default)]
struct MemCollection {
    docs: HashMap<String, (u64, Map<String, Value>)>,
}

#[derive(Debug, Default)]
struct MemState {
    collections: HashMap<String, MemCollection>,
    next_seq: u64,
}

impl MemState {
    fn apply(&mut self, op: &WriteOp, now: &str) {
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
        let seq = self.next_seq;
        let coll = self.collections.entry(collection.clone()).or_default();
        match coll.docs.remove(key) {
            Some((kept_seq, existing)) => {
                let data = apply_fields(Some(existing), fields, mode, now);
                coll.docs.insert(key.clone(), (kept_seq, data));
            }
            None => {
                let data = apply_fields(None, fields, mode, now);
                coll.docs.insert(key.clone(), (seq, data));
                self.next_seq += 1;
            }
        }
    }
}

/// In-process store. Single-threaded like the rest of the sidecar.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RefCell<MemState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self, collection: &str) -> usize {
        self.state
            .borrow()
            .collections
            .get(collection)
            .map(|c| c.docs.len())
            .unwrap_or(0)
    }
}

impl DocumentStore for MemoryStore {
    fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let now = server_timestamp();
        let mut state = self
            .state
            .try_borrow_mut()
            .map_err(|_| StoreError::Unavailable("memory store is busy".into()))?;
        for op in batch.ops() {
            state.apply(op, &now);
        }
        Ok(())
    }

    fn get(&self, collection: &str, key: &str) -> Result<Option<Document>, StoreError> {
        let state = self.state.borrow();
        Ok(state
            .collections
            .get(collection)
            .and_then(|c| c.docs.get(key))
            .map(|(_, data)| Document {
                id: key.to_string(),
                data: data.clone(),
            }))
    }

    fn query_ordered(
        &self,
        collection: &str,
        field: &str,
        direction: Direction,
    ) -> Result<Vec<Document>, StoreError> {
        let state = self.state.borrow();
        let Some(coll) = state.collections.get(collection) else {
            return Ok(Vec::new());
        };
        let mut rows: Vec<(u64, &Value, Document)> = coll
            .docs
            .iter()
            .filter_map(|(id, (seq, data))| {
                let v = data.get(field).filter(|v| !v.is_null())?;
                Some((
                    *seq,
                    v,
                    Document {
                        id: id.clone(),
                        data: data.clone(),
                    },
                ))
            })
            .collect();
        rows.sort_by(|a, b| compare_values(a.1, b.1).then(a.0.cmp(&b.0)));
        if direction == Direction::Descending {
            rows.reverse();
        }
        Ok(rows.into_iter().map(|(_, _, d)| d).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_keeps_unnamed_fields_and_overwrite_drops_them() {
        let store = MemoryStore::new();
        store
            .set(
                STUDENTS,
                "1001",
                WriteFields::new().with("name", "Ana").with("email", "ana@x"),
                SetMode::Overwrite,
            )
            .unwrap();
        store
            .set(
                STUDENTS,
                "1001",
                WriteFields::new().with("name", "Ana Maria"),
                SetMode::Merge,
            )
            .unwrap();
        let doc = store.get(STUDENTS, "1001").unwrap().expect("doc");
        assert_eq!(doc.get_str("name"), Some("Ana Maria"));
        assert_eq!(doc.get_str("email"), Some("ana@x"));

        store
            .set(
                STUDENTS,
                "1001",
                WriteFields::new().with("name", "Ana"),
                SetMode::Overwrite,
            )
            .unwrap();
        let doc = store.get(STUDENTS, "1001").unwrap().expect("doc");
        assert_eq!(doc.get_str("email"), None);
    }

    #[test]
    fn add_generates_distinct_ids_and_resolves_timestamp() {
        let store = MemoryStore::new();
        let a = store
            .add(GRADES, WriteFields::new().with_server_timestamp("at"))
            .unwrap();
        let b = store
            .add(GRADES, WriteFields::new().with_server_timestamp("at"))
            .unwrap();
        assert_ne!(a, b);
        let doc = store.get(GRADES, &a).unwrap().expect("doc");
        let at = doc.get_str("at").expect("timestamp");
        assert!(chrono::DateTime::parse_from_rfc3339(at).is_ok(), "{at}");
    }

    #[test]
    fn query_ordered_descending_breaks_ties_by_newest_insert() {
        let store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        let first = batch.add(GRADES, WriteFields::new().with("at", "2024-01-01"));
        let second = batch.add(GRADES, WriteFields::new().with("at", "2024-01-01"));
        let newest = batch.add(GRADES, WriteFields::new().with("at", "2025-01-01"));
        batch.add(GRADES, WriteFields::new().with("other", 1));
        store.commit(batch).unwrap();

        let ids: Vec<String> = store
            .query_ordered(GRADES, "at", Direction::Descending)
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec![newest, second, first]);
    }

    #[test]
    fn get_many_skips_absent_keys() {
        let store = MemoryStore::new();
        store
            .set(STUDENTS, "1", WriteFields::new().with("name", "A"), SetMode::Merge)
            .unwrap();
        let found = store
            .get_many(STUDENTS, &["1".to_string(), "2".to_string()])
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found["1"].data.get("name"), Some(&json!("A")));
    }

    #[test]
    fn numbers_compare_numerically() {
        assert_eq!(compare_values(&json!(9), &json!(10.5)), Ordering::Less);
        assert_eq!(compare_values(&json!("9"), &json!("10")), Ordering::Greater);
        assert_eq!(compare_values(&json!(1), &json!("1")), Ordering::Less);
    }
}
