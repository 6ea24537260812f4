use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::debug;

use crate::bail;
use crate::destination::{Destination, RowId, StoredRecord};
use crate::error::{ErrorKind, SyncResult};
use crate::types::{EntityKind, NaturalKey, Record};

/// A write applied to a [`MemoryDestination`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteEvent {
    Insert(NaturalKey),
    Update(NaturalKey),
}

impl WriteEvent {
    pub fn key(&self) -> &NaturalKey {
        match self {
            WriteEvent::Insert(key) | WriteEvent::Update(key) => key,
        }
    }
}

#[derive(Debug)]
struct Inner {
    rows: BTreeMap<NaturalKey, StoredRecord>,
    next_id: RowId,
    writes: Vec<WriteEvent>,
    /// Inserts of these keys fail with a conflict this many more times.
    conflicts: HashMap<NaturalKey, u32>,
    /// Records a concurrent writer stores right before our insert of the same key.
    racing_writes: HashMap<NaturalKey, Record>,
    latency: Option<Duration>,
    in_flight: usize,
    max_in_flight: usize,
}

/// In-memory destination for tests.
///
/// Enforces the same rules as the Postgres schema: unique natural keys, parents must exist
/// before children, ids are assigned by the destination. Conflicts with concurrent writers can
/// be injected per key and every write is logged in order.
#[derive(Debug, Clone)]
pub struct MemoryDestination {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryDestination {
    pub fn new() -> Self {
        let inner = Inner {
            rows: BTreeMap::new(),
            next_id: 1,
            writes: Vec::new(),
            conflicts: HashMap::new(),
            racing_writes: HashMap::new(),
            latency: None,
            in_flight: 0,
            max_in_flight: 0,
        };

        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Delays every operation, which makes concurrent row tasks overlap.
    pub async fn set_latency(&self, latency: Duration) {
        let mut inner = self.inner.lock().await;
        inner.latency = Some(latency);
    }

    /// Makes the next `times` inserts of `key` fail with a write conflict.
    pub async fn inject_conflicts(&self, key: NaturalKey, times: u32) {
        let mut inner = self.inner.lock().await;
        inner.conflicts.insert(key, times);
    }

    /// Simulates another writer storing `record` between our lookup and our insert.
    pub async fn inject_racing_write(&self, record: Record) {
        let mut inner = self.inner.lock().await;
        inner.racing_writes.insert(record.natural_key(), record);
    }

    /// Stores `record` directly, bypassing the write log.
    pub async fn seed(&self, record: Record) -> RowId {
        let mut inner = self.inner.lock().await;
        inner.store(record)
    }

    /// Returns every stored record of `kind` ordered by natural key.
    pub async fn records(&self, kind: EntityKind) -> Vec<Record> {
        let inner = self.inner.lock().await;
        inner
            .rows
            .values()
            .filter(|stored| stored.record.kind() == kind)
            .map(|stored| stored.record.clone())
            .collect()
    }

    /// Returns every stored record, without ids, keyed by natural key.
    pub async fn snapshot(&self) -> BTreeMap<NaturalKey, Record> {
        let inner = self.inner.lock().await;
        inner
            .rows
            .iter()
            .map(|(key, stored)| (key.clone(), stored.record.clone()))
            .collect()
    }

    pub async fn get(&self, key: &NaturalKey) -> Option<StoredRecord> {
        let inner = self.inner.lock().await;
        inner.rows.get(key).cloned()
    }

    /// Returns the writes applied so far, in order.
    pub async fn writes(&self) -> Vec<WriteEvent> {
        let inner = self.inner.lock().await;
        inner.writes.clone()
    }

    /// Returns the highest number of operations that were running at the same time.
    pub async fn max_in_flight(&self) -> usize {
        let inner = self.inner.lock().await;
        inner.max_in_flight
    }

    async fn enter(&self) {
        let latency = {
            let mut inner = self.inner.lock().await;
            inner.in_flight += 1;
            inner.max_in_flight = inner.max_in_flight.max(inner.in_flight);
            inner.latency
        };

        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    async fn leave(&self) {
        let mut inner = self.inner.lock().await;
        inner.in_flight -= 1;
    }

    async fn insert_record(&self, record: &Record) -> SyncResult<RowId> {
        let mut inner = self.inner.lock().await;
        let key = record.natural_key();

        if let Some(racing) = inner.racing_writes.remove(&key) {
            inner.store(racing);
            bail!(
                ErrorKind::WriteConflict,
                "Natural key collided with a concurrent write",
                key
            );
        }

        if let Some(remaining) = inner.conflicts.get_mut(&key)
            && *remaining > 0
        {
            *remaining -= 1;
            bail!(
                ErrorKind::WriteConflict,
                "Natural key collided with a concurrent write",
                key
            );
        }

        inner.check_parent(record)?;

        if inner.rows.contains_key(&key) {
            bail!(
                ErrorKind::WriteConflict,
                "Natural key collided with a concurrent write",
                key
            );
        }

        let id = inner.store(record.clone());
        inner.writes.push(WriteEvent::Insert(key));

        Ok(id)
    }

    async fn update_record(&self, id: RowId, record: &Record) -> SyncResult<()> {
        let mut inner = self.inner.lock().await;
        let key = record.natural_key();

        inner.check_parent(record)?;

        match inner.rows.get_mut(&key) {
            Some(stored) if stored.id == id => stored.record = record.clone(),
            _ => bail!(
                ErrorKind::DestinationQueryFailed,
                "No row with the given id",
                format!("{key} (id {id})")
            ),
        }
        inner.writes.push(WriteEvent::Update(key));

        Ok(())
    }
}

impl Inner {
    fn store(&mut self, record: Record) -> RowId {
        let id = self.next_id;
        self.next_id += 1;
        self.rows
            .insert(record.natural_key(), StoredRecord { id, record });

        id
    }

    fn check_parent(&self, record: &Record) -> SyncResult<()> {
        let Some(parent_key) = record.parent_key() else {
            return Ok(());
        };

        match self.rows.get(&parent_key) {
            Some(parent) if record.agrees_with_parent(&parent.record) => Ok(()),
            _ => bail!(
                ErrorKind::MissingParent,
                "Parent row does not exist",
                format!(
                    "{} references {}",
                    record.natural_key(),
                    record.parent_reference()
                )
            ),
        }
    }
}

impl Default for MemoryDestination {
    fn default() -> Self {
        Self::new()
    }
}

impl Destination for MemoryDestination {
    fn name() -> &'static str {
        "memory"
    }

    async fn find(&self, key: &NaturalKey) -> SyncResult<Option<StoredRecord>> {
        self.enter().await;
        let stored = self.get(key).await;
        self.leave().await;

        Ok(stored)
    }

    async fn insert(&self, record: &Record) -> SyncResult<RowId> {
        self.enter().await;
        let result = self.insert_record(record).await;
        self.leave().await;

        debug!(key = %record.natural_key(), ok = result.is_ok(), "memory insert");

        result
    }

    async fn update(&self, id: RowId, record: &Record) -> SyncResult<()> {
        self.enter().await;
        let result = self.update_record(id, record).await;
        self.leave().await;

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{InstallmentRecord, MemberRecord, SaleRecord};

    fn member(enrollment: &str) -> Record {
        Record::Member(MemberRecord {
            organization: "1".to_string(),
            enrollment: enrollment.to_string(),
            name: None,
            cpf: None,
            email: None,
            phone: None,
            active: None,
            blocked: None,
            credit_limit: None,
        })
    }

    fn sale(enrollment: &str) -> Record {
        Record::Sale(SaleRecord {
            organization: "1".to_string(),
            sequence: "1".to_string(),
            enrollment: enrollment.to_string(),
            merchant: None,
            issued_on: None,
            installment_count: None,
            installment_value: None,
            cancelled: None,
        })
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn child_without_parent_is_rejected() {
        let destination = MemoryDestination::new();

        let err = destination.insert(&sale("2221")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingParent);

        destination.insert(&member("2221")).await.unwrap();
        destination.insert(&sale("2221")).await.unwrap();
        assert_eq!(destination.records(EntityKind::Sales).await.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn installment_of_another_members_sale_is_rejected() {
        let destination = MemoryDestination::new();
        destination.seed(member("2221")).await;
        destination.seed(sale("2221")).await;
        let installment = |enrollment: &str| {
            Record::Installment(InstallmentRecord {
                organization: "1".to_string(),
                sale_sequence: "1".to_string(),
                index: 1,
                enrollment: enrollment.to_string(),
                due_on: None,
                amount: None,
                paid: None,
                paid_on: None,
            })
        };

        let err = destination.insert(&installment("3005")).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::MissingParent);
        assert_eq!(
            err.detail(),
            Some("installment 1/1#1 references sale 1/1 of enrollment 3005")
        );
        destination.insert(&installment("2221")).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn duplicate_key_is_a_conflict() {
        let destination = MemoryDestination::new();
        destination.insert(&member("2221")).await.unwrap();

        let err = destination.insert(&member("2221")).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::WriteConflict);
        assert_eq!(
            destination.writes().await,
            vec![WriteEvent::Insert(NaturalKey::member("1", "2221"))]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn racing_write_lands_before_the_conflict() {
        let destination = MemoryDestination::new();
        destination.inject_racing_write(member("2221")).await;

        let err = destination.insert(&member("2221")).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::WriteConflict);
        assert!(destination.get(&NaturalKey::member("1", "2221")).await.is_some());
        assert!(destination.writes().await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_requires_matching_id() {
        let destination = MemoryDestination::new();
        let id = destination.seed(member("2221")).await;

        destination.update(id, &member("2221")).await.unwrap();
        let err = destination.update(id + 1, &member("2221")).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DestinationQueryFailed);
    }
}
