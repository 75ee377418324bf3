use rust_decimal::Decimal;

use logistics_schema::dao::memory::MemoryStore;
use logistics_schema::model::apperror::ErrorType;
use logistics_schema::model::entities::{Cargo, CargoInput, Category, CategoryInput, Customer, CustomerInput, EntityKind};
use logistics_schema::service::logistics::LogisticsService;

#[tokio::test]
async fn test_fragile_cargo_lifecycle() {
    let service = LogisticsService::new(MemoryStore::new());
    let fragile = service.create::<Category>(CategoryInput { name: "Fragile".to_string() }).await.unwrap();
    let cargo = service
        .create::<Cargo>(CargoInput { length: Decimal::TWO, width: Decimal::ONE, height: Decimal::new(15, 1), weight: Decimal::TEN, volume: None, category_id: fragile.id })
        .await
        .unwrap();
    assert_eq!(cargo.volume, Decimal::new(300, 2));
    assert_eq!(cargo.to_string(), format!("Cargo #{}", cargo.id));

    let error = service.delete::<Category>(fragile.id).await.unwrap_err();
    assert_eq!(
        error.error_type,
        ErrorType::ReferentialIntegrity { entity: EntityKind::Category, id: fragile.id, blocking_entity: EntityKind::Cargo, blocking_id: Some(cargo.id) }
    );

    service.delete::<Cargo>(cargo.id).await.unwrap();
    service.delete::<Category>(fragile.id).await.unwrap();
    assert_eq!(service.count(EntityKind::Category).await.unwrap(), 0);
}

#[tokio::test]
async fn test_customer_capitalized_and_email_unique() {
    let service = LogisticsService::new(MemoryStore::new());
    let input = CustomerInput {
        name: "ivan".to_string(),
        surname: "petrov".to_string(),
        telephone_number: "+10000000001".to_string(),
        passport: "P1".to_string(),
        email: "a@a.com".to_string(),
    };
    let customer = service.create::<Customer>(input.clone()).await.unwrap();
    assert_eq!(customer.name, "Ivan");
    assert_eq!(customer.surname, "Petrov");
    assert_eq!(customer.to_string(), "Petrov Ivan");

    let duplicate = CustomerInput { telephone_number: "+10000000002".to_string(), passport: "P2".to_string(), ..input };
    let error = service.create::<Customer>(duplicate).await.unwrap_err();
    assert_eq!(
        error.error_type,
        ErrorType::UniquenessViolation { entity: EntityKind::Customer, field: "email".to_string(), value: "a@a.com".to_string(), existing_id: Some(customer.id) }
    );
    assert_eq!(service.count(EntityKind::Customer).await.unwrap(), 1);
}
