use chrono::{DateTime, SubsecRound, Utc};
use tracing::instrument;

use crate::{
    dao::{Store, StoreTransaction},
    model::{
        apperror::{ApplicationError, ConstraintRule, ErrorType},
        entities::{Association, Entity, EntityKind, LinkSide, Record, RecordId},
        models::{ListInput, ListOutput, ListQuery, PaginationOutput},
    },
    service::pipeline,
};

/**
 * Represents the service for managing logistics records.
 */
pub struct LogisticsService<S: Store> {
    /**
     * The store records are persisted in.
     */
    store: S,
}

impl<S: Store> LogisticsService<S> {
    /**
     * Creates a new instance of `LogisticsService`.
     *
     * # Arguments
     * `store`: The store records are persisted in.
     *
     * # Returns
     * A new instance of `LogisticsService`.
     */
    pub fn new(store: S) -> Self {
        LogisticsService { store }
    }

    /**
     * Creates a record.
     *
     * # Arguments
     * `input`: Field values of the new record.
     *
     * # Returns
     * The persisted record with its id, dates and association set, or a validation or uniqueness error.
     */
    #[instrument(skip(self, input), fields(entity = %E::KIND, result))]
    pub async fn create<E: Entity>(&self, input: E::Input) -> Result<E, ApplicationError> {
        let record = E::from_input(input, now()).into_record();
        let mut transaction = self.store.begin().await?;
        let result = Self::insert_record(&mut transaction, record).await;
        let record = finish(transaction, result).await?;
        tracing::Span::current().record("result", record.id());
        into_entity(record)
    }

    /**
     * Replaces every caller-supplied field of a record. `created_date` is kept, `updated_date` refreshed.
     *
     * # Arguments
     * `id`: Id of the record to update.
     * `input`: New field values.
     *
     * # Returns
     * The updated record, `NotFound` if no record has the id, or a validation or uniqueness error.
     */
    #[instrument(skip(self, input), fields(entity = %E::KIND))]
    pub async fn update<E: Entity>(&self, id: RecordId, input: E::Input) -> Result<E, ApplicationError> {
        let record = E::from_input(input, now()).into_record();
        let mut transaction = self.store.begin().await?;
        let result = Self::update_record(&mut transaction, id, record).await;
        into_entity(finish(transaction, result).await?)
    }

    /**
     * Deletes a record.
     *
     * # Arguments
     * `id`: Id of the record to delete.
     *
     * # Returns
     * `NotFound` if absent, `ReferentialIntegrity` while a protected reference to it exists or while it is
     * the only member of some owner's association set.
     */
    pub async fn delete<E: Entity>(&self, id: RecordId) -> Result<(), ApplicationError> {
        self.delete_record(E::KIND, id).await
    }

    /**
     * Deletes a record of any kind. Association rows on either side go with it.
     */
    #[instrument(skip(self))]
    pub async fn delete_record(&self, kind: EntityKind, id: RecordId) -> Result<(), ApplicationError> {
        let mut transaction = self.store.begin().await?;
        let result = Self::remove_record(&mut transaction, kind, id).await;
        finish(transaction, result).await?;
        tracing::info!("Deleted {kind} {id}");
        Ok(())
    }

    /**
     * Reads a record with its association set.
     */
    #[instrument(level = "debug", skip(self), fields(entity = %E::KIND))]
    pub async fn get<E: Entity>(&self, id: RecordId) -> Result<E, ApplicationError> {
        into_entity(self.get_record(E::KIND, id).await?)
    }

    pub async fn get_record(&self, kind: EntityKind, id: RecordId) -> Result<Record, ApplicationError> {
        let mut transaction = self.store.begin().await?;
        let result = Self::read_record(&mut transaction, kind, id).await;
        finish(transaction, result).await
    }

    /**
     * Lists records newest-created-first.
     *
     * # Arguments
     * `list_input`: Date filters and pagination.
     *
     * # Returns
     * One page of records and whether more exist.
     */
    #[instrument(level = "debug", skip(self), fields(entity = %E::KIND))]
    pub async fn list<E: Entity>(&self, list_input: ListInput) -> Result<ListOutput<E>, ApplicationError> {
        let output = self.list_records(E::KIND, list_input).await?;
        let elements = output.elements.into_iter().map(into_entity).collect::<Result<Vec<E>, ApplicationError>>()?;
        Ok(ListOutput::new(elements, output.pagination))
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn list_records(&self, kind: EntityKind, list_input: ListInput) -> Result<ListOutput<Record>, ApplicationError> {
        let pagination = list_input.pagination.validate(kind)?;
        let query = ListQuery::from(&list_input);
        let mut transaction = self.store.begin().await?;
        let result = Self::read_page(&mut transaction, kind, &query).await;
        let mut records = finish(transaction, result).await?;
        let page_size = usize::try_from(pagination.page_size).map_err(|err| ApplicationError::new(ErrorType::Application, format!("Failed to truncate elements: {err}")))?;
        let has_more = records.len() > page_size;
        records.truncate(page_size);
        Ok(ListOutput::new(records, PaginationOutput::new(pagination.start_index, pagination.page_size, has_more)))
    }

    /**
     * Ids linked to a record through an association.
     *
     * # Arguments
     * `association`: The association to follow.
     * `side`: Which side of the association `id` is on.
     * `id`: Id of the record to start from.
     *
     * # Returns
     * The ids on the other side, ascending, or `NotFound` if the starting record does not exist.
     */
    #[instrument(level = "debug", skip(self))]
    pub async fn related(&self, association: Association, side: LinkSide, id: RecordId) -> Result<Vec<RecordId>, ApplicationError> {
        let mut transaction = self.store.begin().await?;
        let result = Self::read_related(&mut transaction, association, side, id).await;
        finish(transaction, result).await
    }

    pub async fn count(&self, kind: EntityKind) -> Result<i64, ApplicationError> {
        let mut transaction = self.store.begin().await?;
        let result = transaction.count(kind).await;
        finish(transaction, result).await
    }

    async fn insert_record(transaction: &mut S::Transaction, mut record: Record) -> Result<Record, ApplicationError> {
        pipeline::run(&mut record)?;
        check_references(transaction, &record).await?;
        check_uniqueness(transaction, &record, None).await?;
        let id = transaction.insert(&record).await?;
        record.stamp(id, record.created_date(), record.updated_date());
        if let Some((association, targets)) = record.links() {
            transaction.set_links(association, id, targets).await?;
        }
        Ok(record)
    }

    async fn update_record(transaction: &mut S::Transaction, id: RecordId, mut record: Record) -> Result<Record, ApplicationError> {
        let kind = record.kind();
        let existing = transaction.fetch(kind, id).await?.ok_or_else(|| ApplicationError::not_found(kind, id))?;
        record.stamp(id, existing.created_date(), record.updated_date());
        pipeline::run(&mut record)?;
        check_references(transaction, &record).await?;
        check_uniqueness(transaction, &record, Some(id)).await?;
        if !transaction.update(&record).await? {
            return Err(ApplicationError::not_found(kind, id));
        }
        if let Some((association, targets)) = record.links() {
            transaction.set_links(association, id, targets).await?;
        }
        Ok(record)
    }

    async fn remove_record(transaction: &mut S::Transaction, kind: EntityKind, id: RecordId) -> Result<(), ApplicationError> {
        if !transaction.exists(kind, id).await? {
            return Err(ApplicationError::not_found(kind, id));
        }
        if let Some((blocking_entity, blocking_id)) = transaction.find_referencing(kind, id).await? {
            tracing::debug!("Delete of {kind} {id} blocked by {blocking_entity} {blocking_id}");
            return Err(ApplicationError::referenced(kind, id, blocking_entity, Some(blocking_id)));
        }
        check_last_member(transaction, kind, id).await?;
        transaction.remove_links(kind, id).await?;
        if !transaction.delete(kind, id).await? {
            return Err(ApplicationError::not_found(kind, id));
        }
        Ok(())
    }

    async fn read_record(transaction: &mut S::Transaction, kind: EntityKind, id: RecordId) -> Result<Record, ApplicationError> {
        let mut record = transaction.fetch(kind, id).await?.ok_or_else(|| ApplicationError::not_found(kind, id))?;
        hydrate(transaction, &mut record).await?;
        Ok(record)
    }

    async fn read_page(transaction: &mut S::Transaction, kind: EntityKind, query: &ListQuery) -> Result<Vec<Record>, ApplicationError> {
        let mut records = transaction.list(kind, query).await?;
        for record in &mut records {
            hydrate(transaction, record).await?;
        }
        Ok(records)
    }

    async fn read_related(transaction: &mut S::Transaction, association: Association, side: LinkSide, id: RecordId) -> Result<Vec<RecordId>, ApplicationError> {
        let kind = match side {
            LinkSide::Owner => association.owner(),
            LinkSide::Target => association.target(),
        };
        if !transaction.exists(kind, id).await? {
            return Err(ApplicationError::not_found(kind, id));
        }
        match side {
            LinkSide::Owner => transaction.links(association, id).await,
            LinkSide::Target => transaction.reverse_links(association, id).await,
        }
    }
}

/**
 * Commits the transaction when `result` is a success, rolls it back otherwise.
 */
async fn finish<T, X: StoreTransaction>(transaction: X, result: Result<T, ApplicationError>) -> Result<T, ApplicationError> {
    match result {
        Ok(value) => {
            transaction.commit().await?;
            Ok(value)
        }
        Err(err) => {
            transaction.rollback().await?;
            Err(err)
        }
    }
}

/**
 * Current time at the microsecond precision the stores keep.
 */
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/**
 * Fails with `ReferentialIntegrity` when the record is the only member of some owner's association set.
 */
async fn check_last_member<X: StoreTransaction>(transaction: &mut X, kind: EntityKind, id: RecordId) -> Result<(), ApplicationError> {
    for association in Association::ALL.into_iter().filter(|association| association.target() == kind) {
        for owner in transaction.reverse_links(association, id).await? {
            if transaction.links(association, owner).await? == [id] {
                tracing::debug!("Delete of {kind} {id} would empty {} of {} {owner}", association.field(), association.owner());
                return Err(ApplicationError::referenced(kind, id, association.owner(), Some(owner)));
            }
        }
    }
    Ok(())
}

fn into_entity<E: Entity>(record: Record) -> Result<E, ApplicationError> {
    let kind = record.kind();
    E::from_record(record).ok_or_else(|| ApplicationError::new(ErrorType::Application, format!("Expected a {} record, got {kind}", E::KIND)))
}

/**
 * Fails with `MissingReference` on the first foreign key or association member that does not exist.
 */
async fn check_references<X: StoreTransaction>(transaction: &mut X, record: &Record) -> Result<(), ApplicationError> {
    let kind = record.kind();
    for reference in record.references() {
        if !transaction.exists(reference.kind, reference.id).await? {
            return Err(ApplicationError::validation(kind, reference.field(), ConstraintRule::MissingReference(reference.kind)));
        }
    }
    if let Some((association, targets)) = record.links() {
        for target in targets {
            if !transaction.exists(association.target(), *target).await? {
                return Err(ApplicationError::validation(kind, association.field(), ConstraintRule::MissingReference(association.target())));
            }
        }
    }
    Ok(())
}

async fn check_uniqueness<X: StoreTransaction>(transaction: &mut X, record: &Record, exclude: Option<RecordId>) -> Result<(), ApplicationError> {
    let kind = record.kind();
    for key in record.unique_keys() {
        if let Some(existing_id) = transaction.find_unique_conflict(kind, &key, exclude).await? {
            return Err(ApplicationError::uniqueness(kind, &key.field_label(), &key.value_label(), Some(existing_id)));
        }
    }
    Ok(())
}

/**
 * Loads the owned association set of a record read from the store.
 */
async fn hydrate<X: StoreTransaction>(transaction: &mut X, record: &mut Record) -> Result<(), ApplicationError> {
    if let Some(association) = record.kind().owned_association() {
        let targets = transaction.links(association, record.id()).await?;
        record.set_links(targets);
    }
    Ok(())
}
