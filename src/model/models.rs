use chrono::{DateTime, Utc};

use crate::model::{
    apperror::{ApplicationError, ConstraintRule},
    constraints,
    entities::EntityKind,
};

/**
 * Default number of records per page.
 */
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/**
 * Largest page a caller may request.
 */
pub const MAX_PAGE_SIZE: i64 = 1000;

/**
 * Pagination input.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationInput {
    /**
     * Index of the first record to return.
     */
    pub start_index: i64,
    /**
     * Number of records to return.
     */
    pub page_size: i64,
}

impl Default for PaginationInput {
    fn default() -> Self {
        PaginationInput { start_index: 0, page_size: DEFAULT_PAGE_SIZE }
    }
}

impl PaginationInput {
    /**
     * Validates the pagination input for a listing of `entity`.
     *
     * # Returns
     * The input itself, or a validation error naming the offending field.
     */
    pub fn validate(self, entity: EntityKind) -> Result<Self, ApplicationError> {
        if self.start_index < 0 {
            return Err(ApplicationError::validation(entity, "start_index", ConstraintRule::MinValue(0)));
        }
        if self.page_size < 1 {
            return Err(ApplicationError::validation(entity, "page_size", ConstraintRule::MinValue(1)));
        }
        constraints::max_value(entity, "page_size", self.page_size, MAX_PAGE_SIZE)?;
        Ok(self)
    }
}

/**
 * Pagination output.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationOutput {
    pub start_index: i64,
    pub page_size: i64,
    /**
     * Whether records exist beyond this page.
     */
    pub has_more: bool,
}

impl PaginationOutput {
    pub fn new(start_index: i64, page_size: i64, has_more: bool) -> Self {
        PaginationOutput { start_index, page_size, has_more }
    }
}

/**
 * Filter and pagination for listing records of one kind.
 */
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListInput {
    pub pagination: PaginationInput,
    /**
     * Only records created at or after this instant.
     */
    pub created_after: Option<DateTime<Utc>>,
    /**
     * Only records created strictly before this instant.
     */
    pub created_before: Option<DateTime<Utc>>,
}

/**
 * Query handed to a store when listing records. `limit` is one more than the page size so the
 * caller can tell whether another page exists.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListQuery {
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub offset: i64,
    pub limit: i64,
}

impl From<&ListInput> for ListQuery {
    fn from(input: &ListInput) -> Self {
        ListQuery { created_after: input.created_after, created_before: input.created_before, offset: input.pagination.start_index, limit: input.pagination.page_size + 1 }
    }
}

impl ListQuery {
    /**
     * Whether a record created at `created_date` passes the date filters.
     */
    pub fn accepts(&self, created_date: DateTime<Utc>) -> bool {
        self.created_after.is_none_or(|after| created_date >= after) && self.created_before.is_none_or(|before| created_date < before)
    }
}

/**
 * One page of records.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct ListOutput<E> {
    pub elements: Vec<E>,
    pub pagination: PaginationOutput,
}

impl<E> ListOutput<E> {
    pub fn new(elements: Vec<E>, pagination: PaginationOutput) -> Self {
        ListOutput { elements, pagination }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::apperror::ErrorType;

    #[test]
    fn test_pagination_validate_ok() {
        let input = PaginationInput { start_index: 10, page_size: 20 };
        assert_eq!(input.validate(EntityKind::Truck), Ok(input));
    }

    #[test]
    fn test_pagination_validate_page_size_too_large() {
        let result = PaginationInput { start_index: 0, page_size: MAX_PAGE_SIZE + 1 }.validate(EntityKind::Truck);
        assert!(matches!(result.unwrap_err().error_type, ErrorType::Validation { rule: ConstraintRule::MaxValue(MAX_PAGE_SIZE), .. }));
    }

    #[test]
    fn test_pagination_validate_negative_start() {
        let result = PaginationInput { start_index: -1, page_size: 10 }.validate(EntityKind::Truck);
        assert!(matches!(result.unwrap_err().error_type, ErrorType::Validation { rule: ConstraintRule::MinValue(0), .. }));
    }

    #[test]
    fn test_list_query_fetches_one_extra() {
        let query = ListQuery::from(&ListInput { pagination: PaginationInput { start_index: 5, page_size: 10 }, ..ListInput::default() });
        assert_eq!(query.offset, 5);
        assert_eq!(query.limit, 11);
    }

    #[test]
    fn test_list_query_date_bounds() {
        let now = Utc::now();
        let query = ListQuery { created_after: Some(now), created_before: Some(now + chrono::Duration::seconds(1)), offset: 0, limit: 1 };
        assert!(query.accepts(now));
        assert!(!query.accepts(now - chrono::Duration::seconds(1)));
        assert!(!query.accepts(now + chrono::Duration::seconds(1)));
    }
}
