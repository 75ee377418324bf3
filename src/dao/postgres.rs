use std::borrow::Cow;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{
    PgPool, Postgres, Row,
    postgres::{PgArguments, PgDatabaseError, PgPoolOptions, PgRow},
    query::Query,
};
use tracing::{Instrument, instrument};

use crate::{
    dao::{Store, StoreTransaction},
    model::{
        apperror::{ApplicationError, ConstraintRule, ErrorType},
        config::DatabaseType,
        entities::{Association, Cargo, Category, Customer, Driver, EntityKind, Invoice, Location, Order, Record, RecordId, Truck, UniqueKey, WayBill},
        models::ListQuery,
    },
};

/**
 * Database response type for querying categories.
 */
pub type QueryCategoryDbResp = (i64, String, DateTime<Utc>, DateTime<Utc>);

/**
 * Database response type for querying customers.
 */
pub type QueryCustomerDbResp = (i64, String, String, String, String, String, DateTime<Utc>, DateTime<Utc>);

/**
 * Database response type for querying cargo.
 */
pub type QueryCargoDbResp = (i64, Decimal, Decimal, Decimal, Decimal, Decimal, i64, DateTime<Utc>, DateTime<Utc>);

/**
 * Database response type for querying trucks.
 */
pub type QueryTruckDbResp = (i64, String, Decimal, Decimal, String, String, String, DateTime<Utc>, DateTime<Utc>);

/**
 * Database response type for querying drivers.
 */
pub type QueryDriverDbResp = (i64, String, String, String, String, String, DateTime<Utc>, DateTime<Utc>);

/**
 * Database response type for querying locations.
 */
pub type QueryLocationDbResp = (i64, String, String, String, DateTime<Utc>, DateTime<Utc>);

/**
 * Database response type for querying invoices.
 */
pub type QueryInvoiceDbResp = (i64, i64, i64, i64, DateTime<Utc>, DateTime<Utc>);

/**
 * Database response type for querying way bills.
 */
pub type QueryWayBillDbResp = (i64, i64, i64, i64, i64, DateTime<Utc>, DateTime<Utc>);

/**
 * Database response type for querying orders.
 */
pub type QueryOrderDbResp = (i64, i64, DateTime<Utc>, DateTime<Utc>);

/**
 * Filter appended to a select when listing records, newest first.
 */
const LIST_FILTER: &str = "WHERE ($1::timestamptz IS NULL OR created_date >= $1) AND ($2::timestamptz IS NULL OR created_date < $2)
                           ORDER BY created_date DESC, id DESC
                           LIMIT $3 OFFSET $4";

/**
 * Filter appended to a select when fetching a single record.
 */
const ID_FILTER: &str = "WHERE id = $1";

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const STRING_DATA_RIGHT_TRUNCATION: &str = "22001";
const CHECK_VIOLATION: &str = "23514";

/**
 * Data columns of each kind, in the order records bind them. `id`, `created_date` and `updated_date` are handled separately.
 */
fn data_columns(kind: EntityKind) -> &'static [&'static str] {
    match kind {
        EntityKind::Category => &["name"],
        EntityKind::Customer => &["name", "surname", "telephone_number", "passport", "email"],
        EntityKind::Cargo => &["length", "width", "height", "weight", "volume", "category_id"],
        EntityKind::Truck => &["truck_number", "weight", "volume", "brand", "model", "vin_code"],
        EntityKind::Driver => &["name", "surname", "telephone_number", "passport", "driver_license"],
        EntityKind::Location => &["city", "country", "address"],
        EntityKind::Invoice => &["customer_id", "point_a_id", "point_b_id"],
        EntityKind::WayBill => &["driver_id", "truck_id", "point_a_id", "point_b_id"],
        EntityKind::Order => &["way_bill_id"],
    }
}

fn select_sql(kind: EntityKind, filter: &str) -> String {
    format!("SELECT id, {}, created_date, updated_date FROM {} {filter}", data_columns(kind).join(", "), kind.table_name())
}

fn insert_sql(kind: EntityKind) -> String {
    let columns = data_columns(kind);
    let placeholders: Vec<String> = (1..=columns.len() + 2).map(|index| format!("${index}")).collect();
    format!("INSERT INTO {} ({}, created_date, updated_date) VALUES ({}) RETURNING id", kind.table_name(), columns.join(", "), placeholders.join(", "))
}

fn update_sql(kind: EntityKind) -> String {
    let columns = data_columns(kind);
    let assignments: Vec<String> = columns.iter().enumerate().map(|(index, column)| format!("{column} = ${}", index + 1)).collect();
    format!("UPDATE {} SET {}, updated_date = ${} WHERE id = ${}", kind.table_name(), assignments.join(", "), columns.len() + 1, columns.len() + 2)
}

/**
 * Binds the data columns of a record, in `data_columns` order.
 */
fn bind_fields<'q>(query: Query<'q, Postgres, PgArguments>, record: &'q Record) -> Query<'q, Postgres, PgArguments> {
    match record {
        Record::Category(category) => query.bind(category.name.as_str()),
        Record::Customer(customer) => query
            .bind(customer.name.as_str())
            .bind(customer.surname.as_str())
            .bind(customer.telephone_number.as_str())
            .bind(customer.passport.as_str())
            .bind(customer.email.as_str()),
        Record::Cargo(cargo) => query.bind(cargo.length).bind(cargo.width).bind(cargo.height).bind(cargo.weight).bind(cargo.volume).bind(cargo.category_id),
        Record::Truck(truck) => query
            .bind(truck.truck_number.as_str())
            .bind(truck.weight)
            .bind(truck.volume)
            .bind(truck.brand.as_str())
            .bind(truck.model.as_str())
            .bind(truck.vin_code.as_str()),
        Record::Driver(driver) => query
            .bind(driver.name.as_str())
            .bind(driver.surname.as_str())
            .bind(driver.telephone_number.as_str())
            .bind(driver.passport.as_str())
            .bind(driver.driver_license.as_str()),
        Record::Location(location) => query.bind(location.city.as_str()).bind(location.country.as_str()).bind(location.address.as_str()),
        Record::Invoice(invoice) => query.bind(invoice.customer_id).bind(invoice.point_a_id).bind(invoice.point_b_id),
        Record::WayBill(way_bill) => query.bind(way_bill.driver_id).bind(way_bill.truck_id).bind(way_bill.point_a_id).bind(way_bill.point_b_id),
        Record::Order(order) => query.bind(order.way_bill_id),
    }
}

/**
 * Rows to select: one by id, or one page.
 */
#[derive(Debug, Clone, Copy)]
enum Selection<'a> {
    ById(RecordId),
    Page(&'a ListQuery),
}

impl Selection<'_> {
    fn filter(&self) -> &'static str {
        match self {
            Selection::ById(_) => ID_FILTER,
            Selection::Page(_) => LIST_FILTER,
        }
    }
}

/**
 * Store persisting records in `PostgreSQL`.
 */
#[derive(Debug, Clone)]
pub struct PostgresStore {
    connection_pool: PgPool,
}

impl PostgresStore {
    pub fn new(connection_pool: PgPool) -> Self {
        PostgresStore { connection_pool }
    }

    /**
     * Creates a connection pool from the database configuration.
     *
     * # Arguments
     * `db_type`: Database configuration. Must be `Postgresql`.
     *
     * # Returns
     * A store on the new pool, with migrations applied when configured.
     */
    pub async fn connect(db_type: &DatabaseType) -> Result<Self, ApplicationError> {
        let DatabaseType::Postgresql { connection_string, max_connections, min_connections, acquire_timeout, acquire_slow_threshold, idle_timeout, max_lifetime, run_migrations } = db_type
        else {
            return Err(ApplicationError::new(ErrorType::Initialization, "PostgreSQL store requires a postgresql database configuration".to_string()));
        };
        let connection_pool = PgPoolOptions::new()
            .max_connections(*max_connections)
            .min_connections(*min_connections)
            .acquire_timeout(Duration::from_millis(*acquire_timeout))
            .acquire_slow_threshold(Duration::from_millis(*acquire_slow_threshold))
            .idle_timeout(Duration::from_millis(*idle_timeout))
            .max_lifetime(Duration::from_millis(*max_lifetime))
            .connect(connection_string.as_str())
            .await
            .map_err(|err| ApplicationError::new(ErrorType::Initialization, format!("Failed to create database pool: {err}")))?;
        let store = PostgresStore::new(connection_pool);
        if *run_migrations {
            store.migrate().await?;
        }
        Ok(store)
    }

    /**
     * Applies the bundled schema migrations.
     */
    #[instrument(skip(self))]
    pub async fn migrate(&self) -> Result<(), ApplicationError> {
        sqlx::migrate!("./migrations")
            .run(&self.connection_pool)
            .await
            .map_err(|err| ApplicationError::new(ErrorType::Initialization, format!("Failed to run database migrations: {err}")))
    }
}

impl Store for PostgresStore {
    type Transaction = PostgresTransaction;

    async fn begin(&self) -> Result<PostgresTransaction, ApplicationError> {
        let transaction = self.connection_pool.begin().await.map_err(|err| ApplicationError::database(format!("Failed to start transaction: {err}")))?;
        Ok(PostgresTransaction { transaction })
    }
}

/**
 * Transaction on a `PostgresStore`. sqlx rolls back a transaction that is dropped uncommitted.
 */
pub struct PostgresTransaction {
    transaction: sqlx::Transaction<'static, Postgres>,
}

impl PostgresTransaction {
    async fn select_rows<R>(&mut self, kind: EntityKind, selection: Selection<'_>) -> Result<Vec<R>, ApplicationError>
    where
        R: for<'r> sqlx::FromRow<'r, PgRow> + Send + Unpin,
    {
        let span = tracing::Span::current();
        let sql = select_sql(kind, selection.filter());
        let query = sqlx::query_as::<_, R>(&sql);
        let query = match selection {
            Selection::ById(id) => query.bind(id),
            Selection::Page(list_query) => query.bind(list_query.created_after).bind(list_query.created_before).bind(list_query.limit).bind(list_query.offset),
        };
        query
            .fetch_all(&mut *self.transaction)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::database(format!("Failed to execute query to get {kind} list: {err}")))
    }

    /**
     * Selects records of one kind. Association member sets are left empty.
     */
    async fn select_records(&mut self, kind: EntityKind, selection: Selection<'_>) -> Result<Vec<Record>, ApplicationError> {
        let records = match kind {
            EntityKind::Category => self.select_rows::<QueryCategoryDbResp>(kind, selection).await?.into_iter().map(|row| Record::Category(Category::from(row))).collect(),
            EntityKind::Customer => self.select_rows::<QueryCustomerDbResp>(kind, selection).await?.into_iter().map(|row| Record::Customer(Customer::from(row))).collect(),
            EntityKind::Cargo => self.select_rows::<QueryCargoDbResp>(kind, selection).await?.into_iter().map(|row| Record::Cargo(Cargo::from(row))).collect(),
            EntityKind::Truck => self.select_rows::<QueryTruckDbResp>(kind, selection).await?.into_iter().map(|row| Record::Truck(Truck::from(row))).collect(),
            EntityKind::Driver => self.select_rows::<QueryDriverDbResp>(kind, selection).await?.into_iter().map(|row| Record::Driver(Driver::from(row))).collect(),
            EntityKind::Location => self.select_rows::<QueryLocationDbResp>(kind, selection).await?.into_iter().map(|row| Record::Location(Location::from(row))).collect(),
            EntityKind::Invoice => self.select_rows::<QueryInvoiceDbResp>(kind, selection).await?.into_iter().map(|row| Record::Invoice(Invoice::from(row))).collect(),
            EntityKind::WayBill => self.select_rows::<QueryWayBillDbResp>(kind, selection).await?.into_iter().map(|row| Record::WayBill(WayBill::from(row))).collect(),
            EntityKind::Order => self.select_rows::<QueryOrderDbResp>(kind, selection).await?.into_iter().map(|row| Record::Order(Order::from(row))).collect(),
        };
        Ok(records)
    }
}

impl StoreTransaction for PostgresTransaction {
    #[instrument(skip(self, record), fields(kind = %record.kind(), result))]
    async fn insert(&mut self, record: &Record) -> Result<RecordId, ApplicationError> {
        let span = tracing::Span::current();
        let kind = record.kind();
        let sql = insert_sql(kind);
        let row = bind_fields(sqlx::query(&sql), record)
            .bind(record.created_date())
            .bind(record.updated_date())
            .fetch_one(&mut *self.transaction)
            .instrument(span)
            .await
            .map_err(|err| handle_write_error(record, &err))?;
        let id: i64 = row.try_get("id").map_err(|err| ApplicationError::database(format!("Failed to read id of inserted {kind}: {err}")))?;
        tracing::Span::current().record("result", id);
        Ok(id)
    }

    #[instrument(skip(self, record), fields(kind = %record.kind(), id = record.id()))]
    async fn update(&mut self, record: &Record) -> Result<bool, ApplicationError> {
        let span = tracing::Span::current();
        let sql = update_sql(record.kind());
        let result = bind_fields(sqlx::query(&sql), record)
            .bind(record.updated_date())
            .bind(record.id())
            .execute(&mut *self.transaction)
            .instrument(span)
            .await
            .map_err(|err| handle_write_error(record, &err))?;
        Ok(result.rows_affected() == 1)
    }

    #[instrument(level = "debug", skip(self))]
    async fn fetch(&mut self, kind: EntityKind, id: RecordId) -> Result<Option<Record>, ApplicationError> {
        Ok(self.select_records(kind, Selection::ById(id)).await?.into_iter().next())
    }

    #[instrument(level = "debug", skip(self))]
    async fn list(&mut self, kind: EntityKind, query: &ListQuery) -> Result<Vec<Record>, ApplicationError> {
        self.select_records(kind, Selection::Page(query)).await
    }

    async fn count(&mut self, kind: EntityKind) -> Result<i64, ApplicationError> {
        let sql = format!("SELECT COUNT(*) FROM {}", kind.table_name());
        sqlx::query_scalar::<_, i64>(&sql)
            .fetch_one(&mut *self.transaction)
            .await
            .map_err(|err| ApplicationError::database(format!("Failed to count {kind}: {err}")))
    }

    #[instrument(skip(self), fields(result))]
    async fn delete(&mut self, kind: EntityKind, id: RecordId) -> Result<bool, ApplicationError> {
        let span = tracing::Span::current();
        let sql = format!("DELETE FROM {} WHERE id = $1", kind.table_name());
        let result = sqlx::query(&sql)
            .bind(id)
            .execute(&mut *self.transaction)
            .instrument(span)
            .await
            .map_err(|err| handle_delete_error(kind, id, &err))?;
        tracing::Span::current().record("result", result.rows_affected());
        Ok(result.rows_affected() == 1)
    }

    async fn exists(&mut self, kind: EntityKind, id: RecordId) -> Result<bool, ApplicationError> {
        let sql = format!("SELECT EXISTS (SELECT 1 FROM {} WHERE id = $1)", kind.table_name());
        sqlx::query_scalar::<_, bool>(&sql)
            .bind(id)
            .fetch_one(&mut *self.transaction)
            .await
            .map_err(|err| ApplicationError::database(format!("Failed to check existence of {kind} {id}: {err}")))
    }

    #[instrument(level = "debug", skip(self))]
    async fn find_unique_conflict(&mut self, kind: EntityKind, key: &UniqueKey, exclude: Option<RecordId>) -> Result<Option<RecordId>, ApplicationError> {
        let span = tracing::Span::current();
        let conditions: Vec<String> = key.columns.iter().enumerate().map(|(index, column)| format!("{column}::text = ${}", index + 1)).collect();
        let exclude_index = key.columns.len() + 1;
        let sql = format!(
            "SELECT id FROM {} WHERE {} AND (${exclude_index}::bigint IS NULL OR id <> ${exclude_index}) ORDER BY id LIMIT 1",
            kind.table_name(),
            conditions.join(" AND ")
        );
        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        for value in &key.values {
            query = query.bind(value.as_str());
        }
        query
            .bind(exclude)
            .fetch_optional(&mut *self.transaction)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::database(format!("Failed to look up {kind} by {}: {err}", key.field_label())))
    }

    #[instrument(level = "debug", skip(self))]
    async fn find_referencing(&mut self, kind: EntityKind, id: RecordId) -> Result<Option<(EntityKind, RecordId)>, ApplicationError> {
        for (referencing, column) in kind.protected_by() {
            let sql = format!("SELECT id FROM {} WHERE {column} = $1 ORDER BY id LIMIT 1", referencing.table_name());
            let found = sqlx::query_scalar::<_, i64>(&sql)
                .bind(id)
                .fetch_optional(&mut *self.transaction)
                .await
                .map_err(|err| ApplicationError::database(format!("Failed to look up {referencing} referencing {kind} {id}: {err}")))?;
            if let Some(referencing_id) = found {
                return Ok(Some((*referencing, referencing_id)));
            }
        }
        Ok(None)
    }

    #[instrument(level = "debug", skip(self, targets))]
    async fn set_links(&mut self, association: Association, owner: RecordId, targets: &[RecordId]) -> Result<(), ApplicationError> {
        let delete_sql = format!("DELETE FROM {} WHERE {} = $1", association.table_name(), association.owner_column());
        sqlx::query(&delete_sql)
            .bind(owner)
            .execute(&mut *self.transaction)
            .await
            .map_err(|err| ApplicationError::database(format!("Failed to clear {}: {err}", association.table_name())))?;
        let insert_sql = format!("INSERT INTO {} ({}, {}) SELECT $1, UNNEST($2::bigint[])", association.table_name(), association.owner_column(), association.target_column());
        sqlx::query(&insert_sql).bind(owner).bind(targets).execute(&mut *self.transaction).await.map_err(|err| {
            if foreign_key_violation(&err) {
                ApplicationError::validation(association.owner(), association.field(), ConstraintRule::MissingReference(association.target()))
            } else {
                ApplicationError::database(format!("Failed to insert into {}: {err}", association.table_name()))
            }
        })?;
        Ok(())
    }

    async fn links(&mut self, association: Association, owner: RecordId) -> Result<Vec<RecordId>, ApplicationError> {
        let sql = format!("SELECT {target} FROM {} WHERE {} = $1 ORDER BY {target}", association.table_name(), association.owner_column(), target = association.target_column());
        sqlx::query_scalar::<_, i64>(&sql)
            .bind(owner)
            .fetch_all(&mut *self.transaction)
            .await
            .map_err(|err| ApplicationError::database(format!("Failed to query {}: {err}", association.table_name())))
    }

    async fn reverse_links(&mut self, association: Association, target: RecordId) -> Result<Vec<RecordId>, ApplicationError> {
        let sql = format!("SELECT {owner} FROM {} WHERE {} = $1 ORDER BY {owner}", association.table_name(), association.target_column(), owner = association.owner_column());
        sqlx::query_scalar::<_, i64>(&sql)
            .bind(target)
            .fetch_all(&mut *self.transaction)
            .await
            .map_err(|err| ApplicationError::database(format!("Failed to query {}: {err}", association.table_name())))
    }

    async fn remove_links(&mut self, kind: EntityKind, id: RecordId) -> Result<(), ApplicationError> {
        for association in kind.associations() {
            let column = if association.owner() == kind { association.owner_column() } else { association.target_column() };
            let sql = format!("DELETE FROM {} WHERE {column} = $1", association.table_name());
            sqlx::query(&sql)
                .bind(id)
                .execute(&mut *self.transaction)
                .await
                .map_err(|err| ApplicationError::database(format!("Failed to delete from {}: {err}", association.table_name())))?;
        }
        Ok(())
    }

    async fn commit(self) -> Result<(), ApplicationError> {
        self.transaction.commit().await.map_err(|err| ApplicationError::database(format!("Failed to commit transaction: {err}")))
    }

    async fn rollback(self) -> Result<(), ApplicationError> {
        self.transaction.rollback().await.map_err(|err| ApplicationError::database(format!("Failed to rollback transaction: {err}")))
    }
}

fn has_code(error: &sqlx::Error, code: &str) -> bool {
    error.as_database_error().is_some_and(|db_error| db_error.code() == Some(Cow::Borrowed(code)))
}

fn foreign_key_violation(error: &sqlx::Error) -> bool {
    has_code(error, FOREIGN_KEY_VIOLATION)
}

/**
 * Maps an error from an insert or update to an application error. The service checks these
 * constraints before writing, so this only triggers when a concurrent writer got there first.
 *
 * # Arguments
 * `record`: The record being written.
 * `error`: The database error.
 *
 * # Returns
 * An `ApplicationError` corresponding to the database error.
 */
fn handle_write_error(record: &Record, error: &sqlx::Error) -> ApplicationError {
    let kind = record.kind();
    let Some(db_error) = error.as_database_error() else {
        return ApplicationError::database(format!("Failed to write {kind}: {error}"));
    };
    tracing::debug!("Database error: {}", db_error);
    let column = db_error.try_downcast_ref::<PgDatabaseError>().and_then(PgDatabaseError::column);
    if let Some(mapped) = map_write_error(record, db_error.code().as_deref(), db_error.constraint().unwrap_or_default(), column) {
        return mapped;
    }
    tracing::error!("Unhandled database error: {}", db_error);
    ApplicationError::database(format!("Unhandled database error writing {kind}: {db_error}"))
}

/**
 * Maps the SQLSTATE code, constraint name and column of a failed write to a structured error.
 *
 * # Returns
 * `None` for codes that have no structured counterpart.
 */
fn map_write_error(record: &Record, code: Option<&str>, constraint: &str, column: Option<&str>) -> Option<ApplicationError> {
    let kind = record.kind();
    let table = kind.table_name();
    let mapped = match code? {
        UNIQUE_VIOLATION => match record.unique_keys().into_iter().find(|key| constraint == format!("{table}_{}_key", key.columns.join("_"))) {
            Some(key) => ApplicationError::uniqueness(kind, &key.field_label(), &key.value_label(), None),
            None => ApplicationError::validation(kind, "id", ConstraintRule::Constraint(constraint.to_string())),
        },
        FOREIGN_KEY_VIOLATION => match record.references().into_iter().find(|reference| constraint == format!("{table}_{}_fkey", reference.column)) {
            Some(reference) => ApplicationError::validation(kind, reference.field(), ConstraintRule::MissingReference(reference.kind)),
            None => ApplicationError::validation(kind, "id", ConstraintRule::Constraint(constraint.to_string())),
        },
        CHECK_VIOLATION => {
            let field = constraint.strip_prefix(&format!("{table}_")).and_then(|rest| rest.strip_suffix("_check")).unwrap_or(constraint);
            ApplicationError::validation(kind, field, ConstraintRule::MinValue(0))
        }
        STRING_DATA_RIGHT_TRUNCATION => ApplicationError::validation(kind, column.unwrap_or("value"), ConstraintRule::Constraint("value too long".to_string())),
        _ => return None,
    };
    Some(mapped)
}

/**
 * Maps an error from a delete to an application error. A foreign key violation means a protected reference exists.
 */
fn handle_delete_error(kind: EntityKind, id: RecordId, error: &sqlx::Error) -> ApplicationError {
    if let Some(db_error) = error.as_database_error()
        && has_code(error, FOREIGN_KEY_VIOLATION)
    {
        tracing::debug!("Delete blocked: {}", db_error);
        let blocking = db_error
            .table()
            .and_then(|table| EntityKind::ALL.into_iter().find(|candidate| candidate.table_name() == table))
            .or_else(|| kind.protected_by().first().map(|(referencing, _)| *referencing));
        if let Some(blocking_entity) = blocking {
            return ApplicationError::referenced(kind, id, blocking_entity, None);
        }
    }
    ApplicationError::database(format!("Failed to delete {kind} {id}: {error}"))
}

impl From<QueryCategoryDbResp> for Category {
    fn from(row: QueryCategoryDbResp) -> Self {
        Category { id: row.0, name: row.1, created_date: row.2, updated_date: row.3 }
    }
}

impl From<QueryCustomerDbResp> for Customer {
    fn from(row: QueryCustomerDbResp) -> Self {
        Customer { id: row.0, name: row.1, surname: row.2, telephone_number: row.3, passport: row.4, email: row.5, created_date: row.6, updated_date: row.7 }
    }
}

impl From<QueryCargoDbResp> for Cargo {
    fn from(row: QueryCargoDbResp) -> Self {
        Cargo { id: row.0, length: row.1, width: row.2, height: row.3, weight: row.4, volume: row.5, category_id: row.6, created_date: row.7, updated_date: row.8 }
    }
}

impl From<QueryTruckDbResp> for Truck {
    fn from(row: QueryTruckDbResp) -> Self {
        Truck {
            id: row.0,
            truck_number: row.1,
            weight: row.2,
            volume: row.3,
            brand: row.4,
            model: row.5,
            vin_code: row.6,
            categories: vec![],
            created_date: row.7,
            updated_date: row.8,
        }
    }
}

impl From<QueryDriverDbResp> for Driver {
    fn from(row: QueryDriverDbResp) -> Self {
        Driver {
            id: row.0,
            name: row.1,
            surname: row.2,
            telephone_number: row.3,
            passport: row.4,
            driver_license: row.5,
            categories: vec![],
            created_date: row.6,
            updated_date: row.7,
        }
    }
}

impl From<QueryLocationDbResp> for Location {
    fn from(row: QueryLocationDbResp) -> Self {
        Location { id: row.0, city: row.1, country: row.2, address: row.3, created_date: row.4, updated_date: row.5 }
    }
}

impl From<QueryInvoiceDbResp> for Invoice {
    fn from(row: QueryInvoiceDbResp) -> Self {
        Invoice { id: row.0, customer_id: row.1, point_a_id: row.2, point_b_id: row.3, cargo: vec![], created_date: row.4, updated_date: row.5 }
    }
}

impl From<QueryWayBillDbResp> for WayBill {
    fn from(row: QueryWayBillDbResp) -> Self {
        WayBill { id: row.0, driver_id: row.1, truck_id: row.2, point_a_id: row.3, point_b_id: row.4, created_date: row.5, updated_date: row.6 }
    }
}

impl From<QueryOrderDbResp> for Order {
    fn from(row: QueryOrderDbResp) -> Self {
        Order { id: row.0, way_bill_id: row.1, invoices: vec![], created_date: row.2, updated_date: row.3 }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::entities::Entity;

    #[test]
    fn test_insert_sql_binds_every_column() {
        assert_eq!(insert_sql(EntityKind::Location), "INSERT INTO location (city, country, address, created_date, updated_date) VALUES ($1, $2, $3, $4, $5) RETURNING id");
    }

    #[test]
    fn test_update_sql_leaves_created_date() {
        assert_eq!(update_sql(EntityKind::Order), "UPDATE orders SET way_bill_id = $1, updated_date = $2 WHERE id = $3");
    }

    #[test]
    fn test_select_sql_by_id() {
        assert_eq!(select_sql(EntityKind::Category, ID_FILTER), "SELECT id, name, created_date, updated_date FROM category WHERE id = $1");
    }

    fn truck() -> Record {
        Truck {
            id: 3,
            truck_number: "A123BC".to_string(),
            weight: Decimal::ONE,
            volume: Decimal::ONE,
            brand: "Volvo".to_string(),
            model: "FH16".to_string(),
            vin_code: "VIN1".to_string(),
            categories: vec![1],
            created_date: Utc::now(),
            updated_date: Utc::now(),
        }
        .into_record()
    }

    fn order() -> Record {
        Order { id: 4, invoices: vec![1], way_bill_id: 9, created_date: Utc::now(), updated_date: Utc::now() }.into_record()
    }

    #[test]
    fn test_value_too_long_maps_to_validation() {
        let error = map_write_error(&truck(), Some(STRING_DATA_RIGHT_TRUNCATION), "", Some("brand")).unwrap();
        assert_eq!(
            error.error_type,
            ErrorType::Validation { entity: EntityKind::Truck, field: "brand".to_string(), rule: ConstraintRule::Constraint("value too long".to_string()) }
        );
        let error = map_write_error(&truck(), Some(STRING_DATA_RIGHT_TRUNCATION), "", None).unwrap();
        assert!(matches!(error.error_type, ErrorType::Validation { ref field, .. } if field == "value"));
    }

    #[test]
    fn test_unique_violation_maps_to_field() {
        let error = map_write_error(&truck(), Some(UNIQUE_VIOLATION), "truck_vin_code_key", None).unwrap();
        assert_eq!(error.error_type, ErrorType::UniquenessViolation { entity: EntityKind::Truck, field: "vin_code".to_string(), value: "VIN1".to_string(), existing_id: None });
        let error = map_write_error(&order(), Some(UNIQUE_VIOLATION), "orders_way_bill_id_key", None).unwrap();
        assert!(matches!(error.error_type, ErrorType::UniquenessViolation { ref field, .. } if field == "way_bill"));
    }

    #[test]
    fn test_foreign_key_and_check_violations() {
        let error = map_write_error(&order(), Some(FOREIGN_KEY_VIOLATION), "orders_way_bill_id_fkey", None).unwrap();
        assert_eq!(error.error_type, ErrorType::Validation { entity: EntityKind::Order, field: "way_bill".to_string(), rule: ConstraintRule::MissingReference(EntityKind::WayBill) });
        let error = map_write_error(&truck(), Some(CHECK_VIOLATION), "truck_weight_check", None).unwrap();
        assert_eq!(error.error_type, ErrorType::Validation { entity: EntityKind::Truck, field: "weight".to_string(), rule: ConstraintRule::MinValue(0) });
    }

    #[test]
    fn test_unknown_code_is_not_mapped() {
        assert!(map_write_error(&truck(), Some("40001"), "", None).is_none());
        assert!(map_write_error(&truck(), None, "", None).is_none());
    }

    #[test]
    fn test_row_types_match_columns() {
        assert_eq!(data_columns(EntityKind::Customer).len() + 3, 8);
        assert_eq!(data_columns(EntityKind::Cargo).len() + 3, 9);
        assert_eq!(data_columns(EntityKind::Truck).len() + 3, 9);
        assert_eq!(data_columns(EntityKind::WayBill).len() + 3, 7);
    }
}

#[cfg(feature = "integration-test")]
#[cfg(test)]
mod integration_test {
    use super::*;
    use crate::model::{
        entities::{CargoInput, CategoryInput, Entity, LocationInput, TruckInput},
        models::ListInput,
    };

    fn category(name: &str) -> Record {
        Category::from_input(CategoryInput { name: name.to_string() }, Utc::now()).into_record()
    }

    #[sqlx::test]
    async fn test_insert_then_fetch_category() {
        let store = init_db().await;
        let mut transaction = store.begin().await.unwrap();
        let id = transaction.insert(&category("Fragile")).await.unwrap();
        let fetched = transaction.fetch(EntityKind::Category, id).await.unwrap().unwrap();
        assert_eq!(fetched.to_string(), "Fragile");
        transaction.rollback().await.unwrap(); // Rollback the transaction to avoid leaving test data in the database
    }

    #[sqlx::test]
    async fn test_list_newest_first() {
        let store = init_db().await;
        let mut transaction = store.begin().await.unwrap();
        transaction.insert(&category("first")).await.unwrap();
        transaction.insert(&category("second")).await.unwrap();
        let records = transaction.list(EntityKind::Category, &ListQuery::from(&ListInput::default())).await.unwrap();
        assert_eq!(records.first().map(ToString::to_string), Some("second".to_string()));
        transaction.rollback().await.unwrap();
    }

    #[sqlx::test]
    async fn test_delete_referenced_category_is_blocked() {
        let store = init_db().await;
        let mut transaction = store.begin().await.unwrap();
        let category_id = transaction.insert(&category("Fragile")).await.unwrap();
        let cargo = Cargo::from_input(
            CargoInput { length: Decimal::TWO, width: Decimal::ONE, height: Decimal::ONE, weight: Decimal::TEN, volume: Some(Decimal::TWO), category_id },
            Utc::now(),
        )
        .into_record();
        let cargo_id = transaction.insert(&cargo).await.unwrap();
        assert_eq!(transaction.find_referencing(EntityKind::Category, category_id).await.unwrap(), Some((EntityKind::Cargo, cargo_id)));
        let error = transaction.delete(EntityKind::Category, category_id).await.unwrap_err();
        assert!(matches!(error.error_type, ErrorType::ReferentialIntegrity { blocking_entity: EntityKind::Cargo, .. }));
    }

    #[sqlx::test]
    async fn test_duplicate_location_maps_to_uniqueness() {
        let store = init_db().await;
        let mut transaction = store.begin().await.unwrap();
        let location = Location::from_input(LocationInput { city: "Riga".to_string(), country: "Latvia".to_string(), address: "Brivibas 1".to_string() }, Utc::now()).into_record();
        transaction.insert(&location).await.unwrap();
        let error = transaction.insert(&location).await.unwrap_err();
        assert!(matches!(error.error_type, ErrorType::UniquenessViolation { ref field, .. } if field == "country, city, address"));
    }

    #[sqlx::test]
    async fn test_links_from_both_sides() {
        let store = init_db().await;
        let mut transaction = store.begin().await.unwrap();
        let first = transaction.insert(&category("A")).await.unwrap();
        let second = transaction.insert(&category("B")).await.unwrap();
        let truck = Truck::from_input(
            TruckInput {
                truck_number: "A123BC".to_string(),
                weight: Decimal::new(20, 0),
                volume: Decimal::new(82, 0),
                brand: "Volvo".to_string(),
                model: "FH16".to_string(),
                vin_code: "YV2RT40A5JB123456".to_string(),
                categories: vec![first, second],
            },
            Utc::now(),
        )
        .into_record();
        let truck_id = transaction.insert(&truck).await.unwrap();
        transaction.set_links(Association::TruckCategory, truck_id, &[first, second]).await.unwrap();
        assert_eq!(transaction.links(Association::TruckCategory, truck_id).await.unwrap(), vec![first, second]);
        assert_eq!(transaction.reverse_links(Association::TruckCategory, second).await.unwrap(), vec![truck_id]);
        transaction.remove_links(EntityKind::Category, first).await.unwrap();
        assert_eq!(transaction.links(Association::TruckCategory, truck_id).await.unwrap(), vec![second]);
        let error = transaction.set_links(Association::TruckCategory, truck_id, &[second + 1000]).await.unwrap_err();
        assert!(matches!(error.error_type, ErrorType::Validation { rule: ConstraintRule::MissingReference(EntityKind::Category), .. }));
    }

    /**
     * Initialize the database connection pool.
     */
    async fn init_db() -> PostgresStore {
        dotenv::from_filename("./.env-test").ok();
        let pool = PgPool::connect(dotenv::var("DATABASE_URL").unwrap().as_str()).await.unwrap();
        let store = PostgresStore::new(pool);
        store.migrate().await.unwrap();
        store
    }
}
