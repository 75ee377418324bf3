use tracing::instrument;

use crate::model::{
    apperror::{ApplicationError, ConstraintRule},
    constraints::{self, quantity, text},
    entities::{EntityKind, Record},
};

/**
 * A pre-write hook. Works on the candidate record only, never on the store.
 */
pub type Hook = fn(&mut Record) -> Result<(), ApplicationError>;

/**
 * Hooks run, in order, on every candidate record before Create and Update write it.
 */
pub const PRE_WRITE_HOOKS: &[Hook] = &[normalize, derive, validate];

const CARGO_DIGITS: u32 = 12;
const CARGO_DECIMAL_PLACES: u32 = 2;
const CARGO_VOLUME_DIGITS: u32 = 24;
const CARGO_VOLUME_DECIMAL_PLACES: u32 = 6;
const TRUCK_DIGITS: u32 = 25;
const TRUCK_DECIMAL_PLACES: u32 = 3;

/**
 * Runs the pre-write hooks on a candidate record.
 *
 * # Arguments
 * `record`: The candidate record, modified in place.
 *
 * # Returns
 * `Ok` when the record may be written, otherwise the first failed constraint.
 */
#[instrument(level = "debug", skip(record), fields(kind = %record.kind()))]
pub fn run(record: &mut Record) -> Result<(), ApplicationError> {
    for hook in PRE_WRITE_HOOKS {
        hook(record)?;
    }
    Ok(())
}

/**
 * Uppercases the first character and keeps every other character as supplied.
 */
pub fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/**
 * Strips the separators people type into phone numbers.
 */
pub fn normalize_phone_number(value: &str) -> String {
    value.chars().filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')')).collect()
}

fn normalize(record: &mut Record) -> Result<(), ApplicationError> {
    match record {
        Record::Customer(customer) => {
            customer.name = capitalize(&customer.name);
            customer.surname = capitalize(&customer.surname);
            customer.telephone_number = normalize_phone_number(&customer.telephone_number);
        }
        Record::Driver(driver) => driver.telephone_number = normalize_phone_number(&driver.telephone_number),
        _ => {}
    }
    if let Some((_, ids)) = record.links() {
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        record.set_links(ids);
    }
    Ok(())
}

fn derive(record: &mut Record) -> Result<(), ApplicationError> {
    if let Record::Cargo(cargo) = record {
        cargo.volume = cargo
            .length
            .checked_mul(cargo.width)
            .and_then(|area| area.checked_mul(cargo.height))
            .ok_or_else(|| ApplicationError::validation(EntityKind::Cargo, "volume", ConstraintRule::MaxDigits(CARGO_VOLUME_DIGITS)))?;
    }
    Ok(())
}

fn validate(record: &mut Record) -> Result<(), ApplicationError> {
    let kind = record.kind();
    match record {
        Record::Category(category) => text(kind, "name", &category.name, 50)?,
        Record::Customer(customer) => {
            text(kind, "name", &customer.name, 70)?;
            text(kind, "surname", &customer.surname, 70)?;
            constraints::phone_number(kind, "telephone_number", &customer.telephone_number)?;
            text(kind, "passport", &customer.passport, 25)?;
            constraints::email(kind, "email", &customer.email)?;
        }
        Record::Cargo(cargo) => {
            quantity(kind, "length", cargo.length, CARGO_DIGITS, CARGO_DECIMAL_PLACES)?;
            quantity(kind, "width", cargo.width, CARGO_DIGITS, CARGO_DECIMAL_PLACES)?;
            quantity(kind, "height", cargo.height, CARGO_DIGITS, CARGO_DECIMAL_PLACES)?;
            quantity(kind, "weight", cargo.weight, CARGO_DIGITS, CARGO_DECIMAL_PLACES)?;
            quantity(kind, "volume", cargo.volume, CARGO_VOLUME_DIGITS, CARGO_VOLUME_DECIMAL_PLACES)?;
        }
        Record::Truck(truck) => {
            text(kind, "truck_number", &truck.truck_number, 25)?;
            quantity(kind, "weight", truck.weight, TRUCK_DIGITS, TRUCK_DECIMAL_PLACES)?;
            quantity(kind, "volume", truck.volume, TRUCK_DIGITS, TRUCK_DECIMAL_PLACES)?;
            text(kind, "brand", &truck.brand, 25)?;
            text(kind, "model", &truck.model, 25)?;
            text(kind, "vin_code", &truck.vin_code, 25)?;
        }
        Record::Driver(driver) => {
            text(kind, "name", &driver.name, 25)?;
            text(kind, "surname", &driver.surname, 25)?;
            constraints::phone_number(kind, "telephone_number", &driver.telephone_number)?;
            text(kind, "passport", &driver.passport, 25)?;
            text(kind, "driver_license", &driver.driver_license, 25)?;
        }
        Record::Location(location) => {
            text(kind, "city", &location.city, 25)?;
            text(kind, "country", &location.country, 25)?;
            text(kind, "address", &location.address, 25)?;
        }
        Record::Invoice(_) | Record::WayBill(_) | Record::Order(_) => {}
    }
    if let Some((association, ids)) = record.links()
        && ids.is_empty()
    {
        return Err(ApplicationError::validation(kind, association.field(), ConstraintRule::Required));
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::*;
    use crate::model::{
        apperror::ErrorType,
        entities::{Cargo, CargoInput, Customer, CustomerInput, Entity, Truck, TruckInput},
    };

    fn customer(name: &str, surname: &str) -> Record {
        Customer::from_input(
            CustomerInput {
                name: name.to_string(),
                surname: surname.to_string(),
                telephone_number: "+1 (000) 000-00-01".to_string(),
                passport: "P1".to_string(),
                email: "a@a.com".to_string(),
            },
            Utc::now(),
        )
        .into_record()
    }

    fn cargo(length: Decimal, width: Decimal, height: Decimal, volume: Option<Decimal>) -> Record {
        Cargo::from_input(CargoInput { length, width, height, weight: Decimal::TEN, volume, category_id: 1 }, Utc::now()).into_record()
    }

    fn rule_of(result: Result<(), ApplicationError>) -> (String, ConstraintRule) {
        match result.unwrap_err().error_type {
            ErrorType::Validation { field, rule, .. } => (field, rule),
            other => panic!("unexpected error type {other:?}"),
        }
    }

    #[test]
    fn test_capitalize_keeps_rest() {
        assert_eq!(capitalize("ivan"), "Ivan");
        assert_eq!(capitalize("mcDonald"), "McDonald");
        assert_eq!(capitalize("иван"), "Иван");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn test_customer_is_normalized() {
        let mut record = customer("ivan", "petrov");
        run(&mut record).unwrap();
        let Record::Customer(customer) = record else { panic!("not a customer") };
        assert_eq!(customer.name, "Ivan");
        assert_eq!(customer.surname, "Petrov");
        assert_eq!(customer.telephone_number, "+10000000001");
    }

    #[test]
    fn test_cargo_volume_overrides_supplied_value() {
        let mut record = cargo(Decimal::TWO, Decimal::ONE, Decimal::new(15, 1), Some(Decimal::new(999, 0)));
        run(&mut record).unwrap();
        let Record::Cargo(cargo) = record else { panic!("not a cargo") };
        assert_eq!(cargo.volume, Decimal::new(300, 2));
    }

    #[test]
    fn test_cargo_volume_is_exact() {
        let mut record = cargo(Decimal::new(133, 2), Decimal::new(271, 2), Decimal::new(99, 2), None);
        run(&mut record).unwrap();
        let Record::Cargo(cargo) = record else { panic!("not a cargo") };
        assert_eq!(cargo.volume, Decimal::new(3_568_257, 6));
    }

    #[test]
    fn test_negative_dimension_rejected() {
        let mut record = cargo(Decimal::NEGATIVE_ONE, Decimal::ONE, Decimal::ONE, None);
        assert_eq!(rule_of(run(&mut record)), ("length".to_string(), ConstraintRule::MinValue(0)));
    }

    #[test]
    fn test_zero_dimensions_accepted() {
        let mut record = cargo(Decimal::ZERO, Decimal::ZERO, Decimal::ZERO, None);
        assert!(run(&mut record).is_ok());
    }

    #[test]
    fn test_truck_requires_a_category() {
        let mut record = Truck::from_input(
            TruckInput {
                truck_number: "A123BC".to_string(),
                weight: Decimal::new(20, 0),
                volume: Decimal::new(82, 0),
                brand: "Volvo".to_string(),
                model: "FH16".to_string(),
                vin_code: "YV2RT40A5JB123456".to_string(),
                categories: vec![],
            },
            Utc::now(),
        )
        .into_record();
        assert_eq!(rule_of(run(&mut record)), ("categories".to_string(), ConstraintRule::Required));
    }

    #[test]
    fn test_duplicate_links_collapse() {
        let mut record = Truck::from_input(
            TruckInput {
                truck_number: "A123BC".to_string(),
                weight: Decimal::ZERO,
                volume: Decimal::ZERO,
                brand: "Volvo".to_string(),
                model: "FH16".to_string(),
                vin_code: "YV2RT40A5JB123456".to_string(),
                categories: vec![3, 1, 3],
            },
            Utc::now(),
        )
        .into_record();
        run(&mut record).unwrap();
        assert_eq!(record.links().map(|(_, ids)| ids.to_vec()), Some(vec![1, 3]));
    }

    #[test]
    fn test_customer_name_too_long() {
        let mut record = customer(&"a".repeat(71), "petrov");
        assert_eq!(rule_of(run(&mut record)), ("name".to_string(), ConstraintRule::MaxLength(70)));
    }
}
