pub mod memory;
pub mod postgres;

use crate::model::{
    apperror::ApplicationError,
    entities::{Association, EntityKind, Record, RecordId, UniqueKey},
    models::ListQuery,
};

/**
 * A relational store the schema is persisted in.
 */
#[allow(async_fn_in_trait)]
pub trait Store {
    type Transaction: StoreTransaction;

    /**
     * Begins a transaction. Every service operation runs inside exactly one.
     */
    async fn begin(&self) -> Result<Self::Transaction, ApplicationError>;
}

/**
 * Operations available inside a store transaction. Nothing is visible to other transactions
 * until `commit`; dropping a transaction without committing discards its writes.
 */
#[allow(async_fn_in_trait)]
pub trait StoreTransaction: Sized {
    /**
     * Inserts a record and returns the identifier the store assigned to it. The id of `record` is ignored.
     */
    async fn insert(&mut self, record: &Record) -> Result<RecordId, ApplicationError>;

    /**
     * Overwrites the stored record with the same kind and id.
     *
     * # Returns
     * `false` when no such record exists.
     */
    async fn update(&mut self, record: &Record) -> Result<bool, ApplicationError>;

    /**
     * Fetches one record. Association member sets are left empty.
     */
    async fn fetch(&mut self, kind: EntityKind, id: RecordId) -> Result<Option<Record>, ApplicationError>;

    /**
     * Lists records newest-created-first. Association member sets are left empty.
     */
    async fn list(&mut self, kind: EntityKind, query: &ListQuery) -> Result<Vec<Record>, ApplicationError>;

    async fn count(&mut self, kind: EntityKind) -> Result<i64, ApplicationError>;

    /**
     * Deletes one record.
     *
     * # Returns
     * `false` when no such record exists.
     */
    async fn delete(&mut self, kind: EntityKind, id: RecordId) -> Result<bool, ApplicationError>;

    async fn exists(&mut self, kind: EntityKind, id: RecordId) -> Result<bool, ApplicationError>;

    /**
     * Finds a record of `kind` other than `exclude` holding the same values in the uniqueness domain of `key`.
     */
    async fn find_unique_conflict(&mut self, kind: EntityKind, key: &UniqueKey, exclude: Option<RecordId>) -> Result<Option<RecordId>, ApplicationError>;

    /**
     * Finds one record referencing (`kind`, `id`) through a delete-protect relationship.
     */
    async fn find_referencing(&mut self, kind: EntityKind, id: RecordId) -> Result<Option<(EntityKind, RecordId)>, ApplicationError>;

    /**
     * Replaces the association rows of `owner` with one row per target.
     */
    async fn set_links(&mut self, association: Association, owner: RecordId, targets: &[RecordId]) -> Result<(), ApplicationError>;

    /**
     * Targets linked to `owner`, ascending.
     */
    async fn links(&mut self, association: Association, owner: RecordId) -> Result<Vec<RecordId>, ApplicationError>;

    /**
     * Owners linked to `target`, ascending.
     */
    async fn reverse_links(&mut self, association: Association, target: RecordId) -> Result<Vec<RecordId>, ApplicationError>;

    /**
     * Removes every association row in which (`kind`, `id`) takes part, on either side.
     */
    async fn remove_links(&mut self, kind: EntityKind, id: RecordId) -> Result<(), ApplicationError>;

    async fn commit(self) -> Result<(), ApplicationError>;

    async fn rollback(self) -> Result<(), ApplicationError>;
}
