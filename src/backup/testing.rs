//! In-memory [`EntityRepository`] used by engine unit tests. Keeps the
//! orchestrator/reconciler tests free of any database dependency.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::Value as JsonValue;

use crate::backup::{BackupError, EntityKind, RecordError, SelectionFilter};
use crate::store::EntityRepository;

pub(crate) struct MemoryRepository {
    kind: EntityKind,
    key_fields: &'static [&'static str],
    hierarchical: bool,
    fail_on: Option<String>,
    records: Mutex<Vec<JsonValue>>,
    ops: AtomicUsize,
}

impl MemoryRepository {
    pub fn new(kind: EntityKind, key_fields: &'static [&'static str]) -> Self {
        Self {
            kind,
            key_fields,
            hierarchical: false,
            fail_on: None,
            records: Mutex::new(Vec::new()),
            ops: AtomicUsize::new(0),
        }
    }

    /// Category-shaped repository: keyed by name + type + parent chain, with
    /// parent resolution against the committed records.
    pub fn categories() -> Self {
        Self {
            hierarchical: true,
            ..Self::new(EntityKind::Categories, &["name", "type"])
        }
    }

    /// Make `create` fail for any record whose key fields contain `value`.
    pub fn failing_on(mut self, value: &str) -> Self {
        self.fail_on = Some(value.to_string());
        self
    }

    /// Pre-populate committed records, bypassing the trait methods.
    pub fn seed(&self, records: Vec<JsonValue>) {
        self.records.lock().unwrap().extend(records);
    }

    pub fn stored_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    /// Field value of the committed record named `name`.
    pub fn stored_field(&self, name: &str, field: &str) -> JsonValue {
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|record| record.get("name").and_then(JsonValue::as_str) == Some(name))
            .and_then(|record| record.get(field))
            .cloned()
            .unwrap_or(JsonValue::Null)
    }

    /// How many trait calls this repository has served.
    pub fn op_count(&self) -> usize {
        self.ops.load(Ordering::SeqCst)
    }

    fn chain_of(record: &JsonValue) -> Vec<String> {
        record
            .get("parent")
            .and_then(JsonValue::as_array)
            .map(|chain| {
                chain
                    .iter()
                    .filter_map(JsonValue::as_str)
                    .map(|name| name.to_lowercase())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn natural_key(&self, record: &JsonValue) -> String {
        let mut parts: Vec<String> = self
            .key_fields
            .iter()
            .map(|field| {
                record
                    .get(*field)
                    .and_then(JsonValue::as_str)
                    .unwrap_or_default()
                    .to_lowercase()
            })
            .collect();
        if self.hierarchical {
            parts.push(Self::chain_of(record).join("/"));
        }
        parts.join("\u{1f}")
    }

    fn parent_resolvable(&self, committed: &[JsonValue], record: &JsonValue) -> bool {
        let chain = Self::chain_of(record);
        let Some((parent_name, parent_chain)) = chain.split_last() else {
            return true;
        };
        committed.iter().any(|candidate| {
            candidate
                .get("name")
                .and_then(JsonValue::as_str)
                .is_some_and(|name| name.to_lowercase() == *parent_name)
                && candidate.get("type") == record.get("type")
                && Self::chain_of(candidate) == parent_chain
        })
    }
}

#[rocket::async_trait]
impl EntityRepository for MemoryRepository {
    fn kind(&self) -> EntityKind {
        self.kind
    }

    async fn collect(&self, filter: &SelectionFilter) -> Result<Vec<JsonValue>, BackupError> {
        self.ops.fetch_add(1, Ordering::SeqCst);
        let records = self.records.lock().unwrap();
        Ok(records.iter().take(filter.limit as usize).cloned().collect())
    }

    async fn count(&self, filter: &SelectionFilter) -> Result<i64, BackupError> {
        self.ops.fetch_add(1, Ordering::SeqCst);
        let len = self.records.lock().unwrap().len() as i64;
        Ok(len.min(filter.limit))
    }

    async fn find_existing(&self, record: &JsonValue) -> Result<Option<i32>, RecordError> {
        self.ops.fetch_add(1, Ordering::SeqCst);
        let key = self.natural_key(record);
        let records = self.records.lock().unwrap();
        Ok(records
            .iter()
            .position(|candidate| self.natural_key(candidate) == key)
            .map(|index| index as i32))
    }

    async fn create(&self, record: &JsonValue) -> Result<(), RecordError> {
        self.ops.fetch_add(1, Ordering::SeqCst);

        if let Some(fail_on) = &self.fail_on {
            let poisoned = self.key_fields.iter().any(|field| {
                record.get(*field).and_then(JsonValue::as_str) == Some(fail_on.as_str())
            });
            if poisoned {
                return Err(RecordError::InvalidSnapshot(format!(
                    "simulated failure for '{fail_on}'"
                )));
            }
        }

        let mut records = self.records.lock().unwrap();
        if self.hierarchical && !self.parent_resolvable(&records, record) {
            return Err(RecordError::UnresolvedReference(format!(
                "parent {:?} not found",
                record.get("parent")
            )));
        }
        records.push(record.clone());
        Ok(())
    }

    async fn update(&self, id: i32, record: &JsonValue) -> Result<(), RecordError> {
        self.ops.fetch_add(1, Ordering::SeqCst);
        let mut records = self.records.lock().unwrap();
        let slot = records
            .get_mut(id as usize)
            .ok_or_else(|| RecordError::InvalidSnapshot(format!("no record with id {id}")))?;
        *slot = record.clone();
        Ok(())
    }
}
