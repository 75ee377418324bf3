use rust_decimal::Decimal;
use validator::ValidateEmail;

use crate::model::{
    apperror::{ApplicationError, ConstraintRule},
    entities::EntityKind,
};

/**
 * Checks that a string field is present and not only whitespace.
 */
pub fn required(entity: EntityKind, field: &str, value: &str) -> Result<(), ApplicationError> {
    if value.trim().is_empty() {
        return Err(ApplicationError::validation(entity, field, ConstraintRule::Required));
    }
    Ok(())
}

/**
 * Checks that a string field holds at most `max` characters.
 */
pub fn max_length(entity: EntityKind, field: &str, value: &str, max: usize) -> Result<(), ApplicationError> {
    if value.chars().count() > max {
        return Err(ApplicationError::validation(entity, field, ConstraintRule::MaxLength(max)));
    }
    Ok(())
}

/**
 * Required text of bounded length.
 */
pub fn text(entity: EntityKind, field: &str, value: &str, max: usize) -> Result<(), ApplicationError> {
    required(entity, field, value)?;
    max_length(entity, field, value, max)
}

pub fn min_value(entity: EntityKind, field: &str, value: Decimal, min: i64) -> Result<(), ApplicationError> {
    if value < Decimal::from(min) {
        return Err(ApplicationError::validation(entity, field, ConstraintRule::MinValue(min)));
    }
    Ok(())
}

pub fn max_value(entity: EntityKind, field: &str, value: i64, max: i64) -> Result<(), ApplicationError> {
    if value > max {
        return Err(ApplicationError::validation(entity, field, ConstraintRule::MaxValue(max)));
    }
    Ok(())
}

/**
 * Checks a decimal against a fixed point column of `max_digits` digits, `decimal_places` of them after the point.
 * Trailing zeros after the point do not count.
 */
pub fn decimal_digits(entity: EntityKind, field: &str, value: Decimal, max_digits: u32, decimal_places: u32) -> Result<(), ApplicationError> {
    let normalized = value.normalize();
    let scale = normalized.scale();
    if scale > decimal_places {
        return Err(ApplicationError::validation(entity, field, ConstraintRule::DecimalPlaces(decimal_places)));
    }
    let digits = u32::try_from(normalized.mantissa().unsigned_abs().to_string().len()).unwrap_or(u32::MAX);
    let whole_digits = digits.saturating_sub(scale);
    if whole_digits > max_digits - decimal_places {
        return Err(ApplicationError::validation(entity, field, ConstraintRule::MaxDigits(max_digits)));
    }
    Ok(())
}

/**
 * Non-negative fixed point quantity.
 */
pub fn quantity(entity: EntityKind, field: &str, value: Decimal, max_digits: u32, decimal_places: u32) -> Result<(), ApplicationError> {
    min_value(entity, field, value, 0)?;
    decimal_digits(entity, field, value, max_digits, decimal_places)
}

pub fn email(entity: EntityKind, field: &str, value: &str) -> Result<(), ApplicationError> {
    required(entity, field, value)?;
    if !value.validate_email() {
        return Err(ApplicationError::validation(entity, field, ConstraintRule::InvalidEmail));
    }
    Ok(())
}

/**
 * Accepts `+` followed by 7 to 15 digits. Separators must already be stripped.
 */
pub fn phone_number(entity: EntityKind, field: &str, value: &str) -> Result<(), ApplicationError> {
    required(entity, field, value)?;
    let Some(digits) = value.strip_prefix('+') else {
        return Err(ApplicationError::validation(entity, field, ConstraintRule::InvalidPhoneNumber));
    };
    if !(7..=15).contains(&digits.len()) || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ApplicationError::validation(entity, field, ConstraintRule::InvalidPhoneNumber));
    }
    Ok(())
}
