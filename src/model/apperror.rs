use std::fmt;

use crate::model::entities::{EntityKind, RecordId};

/**
 * Field rule that a value failed to satisfy.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintRule {
    /**
     * Value missing, empty or whitespace only.
     */
    Required,
    /**
     * String longer than the allowed number of characters.
     */
    MaxLength(usize),
    /**
     * Number below the allowed minimum.
     */
    MinValue(i64),
    /**
     * Number above the allowed maximum.
     */
    MaxValue(i64),
    /**
     * Number with more digits than allowed in total.
     */
    MaxDigits(u32),
    /**
     * Number with more decimal places than allowed.
     */
    DecimalPlaces(u32),
    InvalidEmail,
    InvalidPhoneNumber,
    /**
     * Referenced record of the given kind does not exist.
     */
    MissingReference(EntityKind),
    /**
     * Named database constraint rejected the value.
     */
    Constraint(String),
}

impl fmt::Display for ConstraintRule {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConstraintRule::Required => write!(f, "value is required"),
            ConstraintRule::MaxLength(max) => write!(f, "must be at most {max} characters"),
            ConstraintRule::MinValue(min) => write!(f, "must be greater than or equal to {min}"),
            ConstraintRule::MaxValue(max) => write!(f, "must be less than or equal to {max}"),
            ConstraintRule::MaxDigits(max) => write!(f, "must have at most {max} digits"),
            ConstraintRule::DecimalPlaces(max) => write!(f, "must have at most {max} decimal places"),
            ConstraintRule::InvalidEmail => write!(f, "must be a valid e-mail address"),
            ConstraintRule::InvalidPhoneNumber => write!(f, "must be a phone number in international format"),
            ConstraintRule::MissingReference(kind) => write!(f, "referenced {kind} does not exist"),
            ConstraintRule::Constraint(name) => write!(f, "violates constraint {name}"),
        }
    }
}

/**
 * Represents the type of error that can occur within the application.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorType {
    /**
     * A field value violates a declared constraint.
     */
    Validation { entity: EntityKind, field: String, rule: ConstraintRule },
    /**
     * A write would duplicate a value in a unique domain.
     */
    UniquenessViolation { entity: EntityKind, field: String, value: String, existing_id: Option<RecordId> },
    /**
     * A delete was attempted while a protected reference exists.
     */
    ReferentialIntegrity { entity: EntityKind, id: RecordId, blocking_entity: EntityKind, blocking_id: Option<RecordId> },
    /**
     * The targeted record does not exist.
     */
    NotFound { entity: EntityKind, id: RecordId },
    DatabaseError,
    Initialization,
    Application,
}

/**
 * Represents an error that occurs within the application.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationError {
    /**
     * Error type.
     */
    pub error_type: ErrorType,
    /**
     * Error message describing problem.
     */
    pub message: String,
}

impl ApplicationError {
    /**
     * Creates a new ApplicationError.
     *
     * #Arguments
     * `error_type`: The type of error.
     * `message`: A description of the error.
     */
    pub fn new(error_type: ErrorType, message: String) -> Self {
        ApplicationError { error_type, message }
    }

    /**
     * Creates a validation error for a field of an entity.
     */
    pub fn validation(entity: EntityKind, field: &str, rule: ConstraintRule) -> Self {
        let message = format!("{entity}.{field}: {rule}");
        ApplicationError::new(ErrorType::Validation { entity, field: field.to_string(), rule }, message)
    }

    /**
     * Creates a uniqueness violation for a field (or comma separated field group) of an entity.
     */
    pub fn uniqueness(entity: EntityKind, field: &str, value: &str, existing_id: Option<RecordId>) -> Self {
        let message = match existing_id {
            Some(existing_id) => format!("{entity} with {field} '{value}' already exists (id {existing_id})"),
            None => format!("{entity} with {field} '{value}' already exists"),
        };
        ApplicationError::new(ErrorType::UniquenessViolation { entity, field: field.to_string(), value: value.to_string(), existing_id }, message)
    }

    /**
     * Creates a referential integrity error for a delete blocked by another record.
     */
    pub fn referenced(entity: EntityKind, id: RecordId, blocking_entity: EntityKind, blocking_id: Option<RecordId>) -> Self {
        let message = match blocking_id {
            Some(blocking_id) => format!("{entity} {id} is still referenced by {blocking_entity} {blocking_id}"),
            None => format!("{entity} {id} is still referenced by {blocking_entity}"),
        };
        ApplicationError::new(ErrorType::ReferentialIntegrity { entity, id, blocking_entity, blocking_id }, message)
    }

    pub fn not_found(entity: EntityKind, id: RecordId) -> Self {
        ApplicationError::new(ErrorType::NotFound { entity, id }, format!("{entity} {id} not found"))
    }

    pub fn database(message: String) -> Self {
        ApplicationError::new(ErrorType::DatabaseError, message)
    }
}

impl fmt::Display for ApplicationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApplicationError {}
