use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::instrument;

use crate::{
    dao::{Store, StoreTransaction},
    model::{
        apperror::{ApplicationError, ErrorType},
        entities::{Association, EntityKind, Record, RecordId, UniqueKey},
        models::ListQuery,
    },
};

#[derive(Debug, Clone, Default)]
struct Tables {
    records: BTreeMap<EntityKind, BTreeMap<RecordId, Record>>,
    sequences: BTreeMap<EntityKind, RecordId>,
    /**
     * Association rows as (association, owner id, target id).
     */
    links: BTreeSet<(Association, RecordId, RecordId)>,
}

impl Tables {
    fn table(&self, kind: EntityKind) -> impl Iterator<Item = &Record> {
        self.records.get(&kind).into_iter().flat_map(|table| table.values())
    }
}

/**
 * In-process store. Transactions are serialized: a transaction holds the store lock until it is
 * committed, rolled back or dropped.
 */
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

impl Store for MemoryStore {
    type Transaction = MemoryTransaction;

    async fn begin(&self) -> Result<MemoryTransaction, ApplicationError> {
        let tables = self.tables.clone().lock_owned().await;
        let snapshot = tables.clone();
        Ok(MemoryTransaction { tables, snapshot: Some(snapshot) })
    }
}

/**
 * Transaction on a `MemoryStore`. Restores the state it started from unless committed.
 */
pub struct MemoryTransaction {
    tables: OwnedMutexGuard<Tables>,
    snapshot: Option<Tables>,
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            *self.tables = snapshot;
        }
    }
}

fn to_usize(value: i64, name: &str) -> Result<usize, ApplicationError> {
    usize::try_from(value).map_err(|err| ApplicationError::new(ErrorType::Application, format!("Invalid {name} {value}: {err}")))
}

/**
 * Copy of a record as stored: association members live in the link rows only.
 */
fn stored(record: &Record) -> Record {
    let mut stored = record.clone();
    stored.set_links(vec![]);
    stored
}

impl StoreTransaction for MemoryTransaction {
    #[instrument(level = "debug", skip(self, record), fields(kind = %record.kind()))]
    async fn insert(&mut self, record: &Record) -> Result<RecordId, ApplicationError> {
        let kind = record.kind();
        let sequence = self.tables.sequences.entry(kind).or_insert(0);
        *sequence += 1;
        let id = *sequence;
        let mut stored = stored(record);
        stored.stamp(id, record.created_date(), record.updated_date());
        self.tables.records.entry(kind).or_default().insert(id, stored);
        Ok(id)
    }

    #[instrument(level = "debug", skip(self, record), fields(kind = %record.kind(), id = record.id()))]
    async fn update(&mut self, record: &Record) -> Result<bool, ApplicationError> {
        let Some(existing) = self.tables.records.get_mut(&record.kind()).and_then(|table| table.get_mut(&record.id())) else {
            return Ok(false);
        };
        *existing = stored(record);
        Ok(true)
    }

    async fn fetch(&mut self, kind: EntityKind, id: RecordId) -> Result<Option<Record>, ApplicationError> {
        Ok(self.tables.records.get(&kind).and_then(|table| table.get(&id)).cloned())
    }

    async fn list(&mut self, kind: EntityKind, query: &ListQuery) -> Result<Vec<Record>, ApplicationError> {
        let mut records: Vec<&Record> = self.tables.table(kind).filter(|record| query.accepts(record.created_date())).collect();
        records.sort_by(|a, b| b.created_date().cmp(&a.created_date()).then(b.id().cmp(&a.id())));
        Ok(records.into_iter().skip(to_usize(query.offset, "offset")?).take(to_usize(query.limit, "limit")?).cloned().collect())
    }

    async fn count(&mut self, kind: EntityKind) -> Result<i64, ApplicationError> {
        let count = self.tables.table(kind).count();
        i64::try_from(count).map_err(|err| ApplicationError::new(ErrorType::Application, format!("Failed to count {kind}: {err}")))
    }

    #[instrument(level = "debug", skip(self))]
    async fn delete(&mut self, kind: EntityKind, id: RecordId) -> Result<bool, ApplicationError> {
        Ok(self.tables.records.get_mut(&kind).and_then(|table| table.remove(&id)).is_some())
    }

    async fn exists(&mut self, kind: EntityKind, id: RecordId) -> Result<bool, ApplicationError> {
        Ok(self.tables.records.get(&kind).is_some_and(|table| table.contains_key(&id)))
    }

    async fn find_unique_conflict(&mut self, kind: EntityKind, key: &UniqueKey, exclude: Option<RecordId>) -> Result<Option<RecordId>, ApplicationError> {
        Ok(self
            .tables
            .table(kind)
            .filter(|record| Some(record.id()) != exclude)
            .find(|record| record.unique_keys().iter().any(|other| other.columns == key.columns && other.values == key.values))
            .map(Record::id))
    }

    async fn find_referencing(&mut self, kind: EntityKind, id: RecordId) -> Result<Option<(EntityKind, RecordId)>, ApplicationError> {
        for (referencing, column) in kind.protected_by() {
            let found = self
                .tables
                .table(*referencing)
                .find(|record| record.references().iter().any(|reference| reference.column == *column && reference.kind == kind && reference.id == id));
            if let Some(record) = found {
                return Ok(Some((*referencing, record.id())));
            }
        }
        Ok(None)
    }

    async fn set_links(&mut self, association: Association, owner: RecordId, targets: &[RecordId]) -> Result<(), ApplicationError> {
        self.tables.links.retain(|(other, other_owner, _)| !(*other == association && *other_owner == owner));
        self.tables.links.extend(targets.iter().map(|target| (association, owner, *target)));
        Ok(())
    }

    async fn links(&mut self, association: Association, owner: RecordId) -> Result<Vec<RecordId>, ApplicationError> {
        Ok(self.tables.links.iter().filter(|(other, other_owner, _)| *other == association && *other_owner == owner).map(|(_, _, target)| *target).collect())
    }

    async fn reverse_links(&mut self, association: Association, target: RecordId) -> Result<Vec<RecordId>, ApplicationError> {
        Ok(self.tables.links.iter().filter(|(other, _, other_target)| *other == association && *other_target == target).map(|(_, owner, _)| *owner).collect())
    }

    async fn remove_links(&mut self, kind: EntityKind, id: RecordId) -> Result<(), ApplicationError> {
        self.tables
            .links
            .retain(|(association, owner, target)| !((association.owner() == kind && *owner == id) || (association.target() == kind && *target == id)));
        Ok(())
    }

    async fn commit(mut self) -> Result<(), ApplicationError> {
        self.snapshot = None;
        Ok(())
    }

    async fn rollback(self) -> Result<(), ApplicationError> {
        drop(self);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::model::{
        entities::{Category, CategoryInput, Entity, Location, LocationInput},
        models::{ListInput, PaginationInput},
    };

    fn category(name: &str, offset_secs: i64) -> Record {
        Category::from_input(CategoryInput { name: name.to_string() }, Utc::now() + Duration::seconds(offset_secs)).into_record()
    }

    #[tokio::test]
    async fn test_insert_assigns_sequential_ids() {
        let store = MemoryStore::new();
        let mut transaction = store.begin().await.unwrap();
        assert_eq!(transaction.insert(&category("a", 0)).await.unwrap(), 1);
        assert_eq!(transaction.insert(&category("b", 0)).await.unwrap(), 2);
        transaction.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let store = MemoryStore::new();
        let mut transaction = store.begin().await.unwrap();
        transaction.insert(&category("a", 0)).await.unwrap();
        transaction.rollback().await.unwrap();
        let mut transaction = store.begin().await.unwrap();
        assert_eq!(transaction.count(EntityKind::Category).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_drop_without_commit_discards_writes() {
        let store = MemoryStore::new();
        {
            let mut transaction = store.begin().await.unwrap();
            transaction.insert(&category("a", 0)).await.unwrap();
        }
        let mut transaction = store.begin().await.unwrap();
        assert!(!transaction.exists(EntityKind::Category, 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_newest_first_with_pagination() {
        let store = MemoryStore::new();
        let mut transaction = store.begin().await.unwrap();
        for (index, name) in ["old", "middle", "new"].into_iter().enumerate() {
            transaction.insert(&category(name, i64::try_from(index).unwrap())).await.unwrap();
        }
        let query = ListQuery::from(&ListInput { pagination: PaginationInput { start_index: 0, page_size: 2 }, ..ListInput::default() });
        let names: Vec<String> = transaction.list(EntityKind::Category, &query).await.unwrap().into_iter().map(|record| record.to_string()).collect();
        assert_eq!(names, vec!["new", "middle", "old"]);
        let query = ListQuery::from(&ListInput { pagination: PaginationInput { start_index: 2, page_size: 2 }, ..ListInput::default() });
        let names: Vec<String> = transaction.list(EntityKind::Category, &query).await.unwrap().into_iter().map(|record| record.to_string()).collect();
        assert_eq!(names, vec!["old"]);
    }

    #[tokio::test]
    async fn test_composite_unique_conflict() {
        let store = MemoryStore::new();
        let mut transaction = store.begin().await.unwrap();
        let location = Location::from_input(LocationInput { city: "Riga".to_string(), country: "Latvia".to_string(), address: "Brivibas 1".to_string() }, Utc::now()).into_record();
        let id = transaction.insert(&location).await.unwrap();
        let key = &location.unique_keys()[0];
        assert_eq!(transaction.find_unique_conflict(EntityKind::Location, key, None).await.unwrap(), Some(id));
        assert_eq!(transaction.find_unique_conflict(EntityKind::Location, key, Some(id)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_links_from_both_sides() {
        let store = MemoryStore::new();
        let mut transaction = store.begin().await.unwrap();
        transaction.set_links(Association::TruckCategory, 1, &[2, 3]).await.unwrap();
        transaction.set_links(Association::TruckCategory, 4, &[3]).await.unwrap();
        assert_eq!(transaction.links(Association::TruckCategory, 1).await.unwrap(), vec![2, 3]);
        assert_eq!(transaction.reverse_links(Association::TruckCategory, 3).await.unwrap(), vec![1, 4]);
        transaction.remove_links(EntityKind::Category, 3).await.unwrap();
        assert_eq!(transaction.links(Association::TruckCategory, 1).await.unwrap(), vec![2]);
        assert!(transaction.links(Association::TruckCategory, 4).await.unwrap().is_empty());
    }
}
