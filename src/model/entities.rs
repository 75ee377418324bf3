use std::fmt;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/**
 * Store assigned record identifier. Zero marks a record that has not been persisted yet.
 */
pub type RecordId = i64;

/**
 * The nine record types of the schema.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum EntityKind {
    Category,
    Customer,
    Cargo,
    Truck,
    Driver,
    Location,
    Invoice,
    WayBill,
    Order,
}

/**
 * Label and help text of a single field, consumed by the presentation layer.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMeta {
    pub name: &'static str,
    pub label: &'static str,
    pub help_text: Option<&'static str>,
}

const fn field(name: &'static str, label: &'static str) -> FieldMeta {
    FieldMeta { name, label, help_text: None }
}

const fn field_with_help(name: &'static str, label: &'static str, help_text: &'static str) -> FieldMeta {
    FieldMeta { name, label, help_text: Some(help_text) }
}

const CREATED_DATE: FieldMeta = field("created_date", "Record created");
const UPDATED_DATE: FieldMeta = field("updated_date", "Record updated");

const CATEGORY_FIELDS: &[FieldMeta] = &[field("name", "Category name"), CREATED_DATE, UPDATED_DATE];
const CUSTOMER_FIELDS: &[FieldMeta] = &[
    field("name", "Name"),
    field("surname", "Surname"),
    field("telephone_number", "Phone number"),
    field("passport", "Passport number"),
    field("email", "E-mail"),
    CREATED_DATE,
    UPDATED_DATE,
];
const CARGO_FIELDS: &[FieldMeta] = &[
    field_with_help("length", "Cargo length", "m"),
    field_with_help("width", "Cargo width", "m"),
    field_with_help("height", "Cargo height", "m"),
    field_with_help("weight", "Weight", "kg"),
    field_with_help("volume", "Volume", "m³"),
    field("category", "Category"),
    CREATED_DATE,
    UPDATED_DATE,
];
const TRUCK_FIELDS: &[FieldMeta] = &[
    field("truck_number", "Registration number"),
    field_with_help("weight", "Payload", "tonnes"),
    field_with_help("volume", "Volume", "m³"),
    field("brand", "Brand"),
    field("model", "Model"),
    field("vin_code", "VIN code"),
    field("categories", "Cargo categories"),
    CREATED_DATE,
    UPDATED_DATE,
];
const DRIVER_FIELDS: &[FieldMeta] = &[
    field("name", "Name"),
    field("surname", "Surname"),
    field("telephone_number", "Phone number"),
    field("passport", "Passport number"),
    field("driver_license", "Driver license number"),
    field("categories", "Cargo categories"),
    CREATED_DATE,
    UPDATED_DATE,
];
const LOCATION_FIELDS: &[FieldMeta] = &[field("city", "City"), field("country", "Country"), field("address", "Address"), CREATED_DATE, UPDATED_DATE];
const INVOICE_FIELDS: &[FieldMeta] = &[field("customer", "Customer"), field("cargo", "Cargo"), field("point_a", "Origin"), field("point_b", "Destination"), CREATED_DATE, UPDATED_DATE];
const WAY_BILL_FIELDS: &[FieldMeta] = &[field("driver", "Driver"), field("truck", "Truck"), field("point_a", "Origin"), field("point_b", "Destination"), CREATED_DATE, UPDATED_DATE];
const ORDER_FIELDS: &[FieldMeta] = &[field("invoices", "Invoices"), field("way_bill", "Waybill"), CREATED_DATE, UPDATED_DATE];

impl EntityKind {
    pub const ALL: [EntityKind; 9] = [
        EntityKind::Category,
        EntityKind::Customer,
        EntityKind::Cargo,
        EntityKind::Truck,
        EntityKind::Driver,
        EntityKind::Location,
        EntityKind::Invoice,
        EntityKind::WayBill,
        EntityKind::Order,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EntityKind::Category => "category",
            EntityKind::Customer => "customer",
            EntityKind::Cargo => "cargo",
            EntityKind::Truck => "truck",
            EntityKind::Driver => "driver",
            EntityKind::Location => "location",
            EntityKind::Invoice => "invoice",
            EntityKind::WayBill => "way_bill",
            EntityKind::Order => "order",
        }
    }

    /**
     * Name of the table holding records of this kind.
     */
    pub fn table_name(&self) -> &'static str {
        match self {
            EntityKind::Order => "orders",
            other => other.name(),
        }
    }

    pub fn verbose_name(&self) -> &'static str {
        match self {
            EntityKind::Category => "Category",
            EntityKind::Customer => "Customer",
            EntityKind::Cargo => "Cargo",
            EntityKind::Truck => "Truck",
            EntityKind::Driver => "Driver",
            EntityKind::Location => "Address",
            EntityKind::Invoice => "Invoice",
            EntityKind::WayBill => "Waybill",
            EntityKind::Order => "Order",
        }
    }

    pub fn verbose_name_plural(&self) -> &'static str {
        match self {
            EntityKind::Category => "Categories",
            EntityKind::Customer => "Customers",
            EntityKind::Cargo => "Cargo",
            EntityKind::Truck => "Trucks",
            EntityKind::Driver => "Drivers",
            EntityKind::Location => "Addresses",
            EntityKind::Invoice => "Invoices",
            EntityKind::WayBill => "Waybills",
            EntityKind::Order => "Orders",
        }
    }

    /**
     * Fields of this kind in form order, with labels and help text.
     */
    pub fn fields(&self) -> &'static [FieldMeta] {
        match self {
            EntityKind::Category => CATEGORY_FIELDS,
            EntityKind::Customer => CUSTOMER_FIELDS,
            EntityKind::Cargo => CARGO_FIELDS,
            EntityKind::Truck => TRUCK_FIELDS,
            EntityKind::Driver => DRIVER_FIELDS,
            EntityKind::Location => LOCATION_FIELDS,
            EntityKind::Invoice => INVOICE_FIELDS,
            EntityKind::WayBill => WAY_BILL_FIELDS,
            EntityKind::Order => ORDER_FIELDS,
        }
    }

    /**
     * Delete-protect relationships pointing at this kind, as (referencing kind, referencing column).
     */
    pub fn protected_by(&self) -> &'static [(EntityKind, &'static str)] {
        match self {
            EntityKind::Category => &[(EntityKind::Cargo, "category_id")],
            EntityKind::Customer => &[(EntityKind::Invoice, "customer_id")],
            EntityKind::Location => &[
                (EntityKind::Invoice, "point_a_id"),
                (EntityKind::Invoice, "point_b_id"),
                (EntityKind::WayBill, "point_a_id"),
                (EntityKind::WayBill, "point_b_id"),
            ],
            EntityKind::Driver => &[(EntityKind::WayBill, "driver_id")],
            EntityKind::Truck => &[(EntityKind::WayBill, "truck_id")],
            EntityKind::WayBill => &[(EntityKind::Order, "way_bill_id")],
            EntityKind::Cargo | EntityKind::Invoice | EntityKind::Order => &[],
        }
    }

    /**
     * Association whose member set is stored on records of this kind.
     */
    pub fn owned_association(&self) -> Option<Association> {
        Association::ALL.into_iter().find(|association| association.owner() == *self)
    }

    /**
     * Associations in which this kind takes part, on either side.
     */
    pub fn associations(&self) -> Vec<Association> {
        Association::ALL.into_iter().filter(|association| association.owner() == *self || association.target() == *self).collect()
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/**
 * Many-to-many associations. Each is stored as a table of (owner id, target id) pairs, unique on the pair.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Association {
    TruckCategory,
    DriverCategory,
    InvoiceCargo,
    OrderInvoice,
}

impl Association {
    pub const ALL: [Association; 4] = [Association::TruckCategory, Association::DriverCategory, Association::InvoiceCargo, Association::OrderInvoice];

    pub fn owner(&self) -> EntityKind {
        match self {
            Association::TruckCategory => EntityKind::Truck,
            Association::DriverCategory => EntityKind::Driver,
            Association::InvoiceCargo => EntityKind::Invoice,
            Association::OrderInvoice => EntityKind::Order,
        }
    }

    pub fn target(&self) -> EntityKind {
        match self {
            Association::TruckCategory | Association::DriverCategory => EntityKind::Category,
            Association::InvoiceCargo => EntityKind::Cargo,
            Association::OrderInvoice => EntityKind::Invoice,
        }
    }

    /**
     * Name of the member set field on the owning record.
     */
    pub fn field(&self) -> &'static str {
        match self {
            Association::TruckCategory | Association::DriverCategory => "categories",
            Association::InvoiceCargo => "cargo",
            Association::OrderInvoice => "invoices",
        }
    }

    pub fn table_name(&self) -> &'static str {
        match self {
            Association::TruckCategory => "truck_category",
            Association::DriverCategory => "driver_category",
            Association::InvoiceCargo => "invoice_cargo",
            Association::OrderInvoice => "order_invoice",
        }
    }

    pub fn owner_column(&self) -> &'static str {
        match self {
            Association::TruckCategory => "truck_id",
            Association::DriverCategory => "driver_id",
            Association::InvoiceCargo => "invoice_id",
            Association::OrderInvoice => "order_id",
        }
    }

    pub fn target_column(&self) -> &'static str {
        match self {
            Association::TruckCategory | Association::DriverCategory => "category_id",
            Association::InvoiceCargo => "cargo_id",
            Association::OrderInvoice => "invoice_id",
        }
    }
}

/**
 * Side of an association a lookup starts from.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkSide {
    Owner,
    Target,
}

/**
 * Value of a record in one uniqueness domain. Composite domains have several columns.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueKey {
    pub columns: &'static [&'static str],
    pub values: Vec<String>,
}

impl UniqueKey {
    fn single(column: &'static [&'static str], value: &str) -> Self {
        UniqueKey { columns: column, values: vec![value.to_string()] }
    }

    /**
     * Field names of the domain, with the `_id` suffix of reference columns dropped.
     */
    pub fn field_label(&self) -> String {
        self.columns.iter().map(|column| column.trim_end_matches("_id")).collect::<Vec<_>>().join(", ")
    }

    pub fn value_label(&self) -> String {
        self.values.join(", ")
    }
}

/**
 * Delete-protect reference held by a record.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference {
    /**
     * Column holding the reference, named after the field with an `_id` suffix.
     */
    pub column: &'static str,
    pub kind: EntityKind,
    pub id: RecordId,
}

impl Reference {
    /**
     * Field name of the reference, as used in validation errors.
     */
    pub fn field(&self) -> &'static str {
        self.column.trim_end_matches("_id")
    }
}

/***************** Category *********************/

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: RecordId,
    pub name: String,
    pub created_date: DateTime<Utc>,
    pub updated_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryInput {
    pub name: String,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/***************** Customer *********************/

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: RecordId,
    pub name: String,
    pub surname: String,
    pub telephone_number: String,
    pub passport: String,
    pub email: String,
    pub created_date: DateTime<Utc>,
    pub updated_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomerInput {
    pub name: String,
    pub surname: String,
    pub telephone_number: String,
    pub passport: String,
    pub email: String,
}

impl fmt::Display for Customer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.surname, self.name)
    }
}

/***************** Cargo *********************/

/**
 * A cargo item. Dimensions are in metres, weight in kilograms and volume in cubic metres.
 */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cargo {
    pub id: RecordId,
    pub length: Decimal,
    pub width: Decimal,
    pub height: Decimal,
    pub weight: Decimal,
    /**
     * Always `length * width * height`, recomputed on every write.
     */
    pub volume: Decimal,
    pub category_id: RecordId,
    pub created_date: DateTime<Utc>,
    pub updated_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CargoInput {
    pub length: Decimal,
    pub width: Decimal,
    pub height: Decimal,
    pub weight: Decimal,
    /**
     * Ignored. Accepted so that a round-tripped record can be submitted as is.
     */
    #[serde(default)]
    pub volume: Option<Decimal>,
    pub category_id: RecordId,
}

impl fmt::Display for Cargo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Cargo #{}", self.id)
    }
}

/***************** Truck *********************/

/**
 * A truck. Weight is the payload in tonnes, volume the body volume in cubic metres.
 */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Truck {
    pub id: RecordId,
    pub truck_number: String,
    pub weight: Decimal,
    pub volume: Decimal,
    pub brand: String,
    pub model: String,
    pub vin_code: String,
    pub categories: Vec<RecordId>,
    pub created_date: DateTime<Utc>,
    pub updated_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TruckInput {
    pub truck_number: String,
    pub weight: Decimal,
    pub volume: Decimal,
    pub brand: String,
    pub model: String,
    pub vin_code: String,
    pub categories: Vec<RecordId>,
}

impl fmt::Display for Truck {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} | {}", self.vin_code, self.truck_number)
    }
}

/***************** Driver *********************/

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    pub id: RecordId,
    pub name: String,
    pub surname: String,
    pub telephone_number: String,
    pub passport: String,
    pub driver_license: String,
    pub categories: Vec<RecordId>,
    pub created_date: DateTime<Utc>,
    pub updated_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DriverInput {
    pub name: String,
    pub surname: String,
    pub telephone_number: String,
    pub passport: String,
    pub driver_license: String,
    pub categories: Vec<RecordId>,
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.name, self.surname)
    }
}

/***************** Location *********************/

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: RecordId,
    pub city: String,
    pub country: String,
    pub address: String,
    pub created_date: DateTime<Utc>,
    pub updated_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocationInput {
    pub city: String,
    pub country: String,
    pub address: String,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {} {}", self.country, self.city, self.address)
    }
}

/***************** Invoice *********************/

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: RecordId,
    pub customer_id: RecordId,
    pub point_a_id: RecordId,
    pub point_b_id: RecordId,
    pub cargo: Vec<RecordId>,
    pub created_date: DateTime<Utc>,
    pub updated_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceInput {
    pub customer_id: RecordId,
    pub point_a_id: RecordId,
    pub point_b_id: RecordId,
    pub cargo: Vec<RecordId>,
}

impl fmt::Display for Invoice {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Invoice #{}", self.id)
    }
}

/***************** WayBill *********************/

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WayBill {
    pub id: RecordId,
    pub driver_id: RecordId,
    pub truck_id: RecordId,
    pub point_a_id: RecordId,
    pub point_b_id: RecordId,
    pub created_date: DateTime<Utc>,
    pub updated_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WayBillInput {
    pub driver_id: RecordId,
    pub truck_id: RecordId,
    pub point_a_id: RecordId,
    pub point_b_id: RecordId,
}

impl fmt::Display for WayBill {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Waybill #{}", self.id)
    }
}

/***************** Order *********************/

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: RecordId,
    pub invoices: Vec<RecordId>,
    pub way_bill_id: RecordId,
    pub created_date: DateTime<Utc>,
    pub updated_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderInput {
    pub invoices: Vec<RecordId>,
    pub way_bill_id: RecordId,
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Order #{}", self.id)
    }
}

/***************** Record *********************/

/**
 * Any record of the schema. This is what stores persist and what the pre-write pipeline works on.
 */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    Category(Category),
    Customer(Customer),
    Cargo(Cargo),
    Truck(Truck),
    Driver(Driver),
    Location(Location),
    Invoice(Invoice),
    WayBill(WayBill),
    Order(Order),
}

macro_rules! on_record {
    ($record:expr, $inner:ident => $body:expr) => {
        match $record {
            Record::Category($inner) => $body,
            Record::Customer($inner) => $body,
            Record::Cargo($inner) => $body,
            Record::Truck($inner) => $body,
            Record::Driver($inner) => $body,
            Record::Location($inner) => $body,
            Record::Invoice($inner) => $body,
            Record::WayBill($inner) => $body,
            Record::Order($inner) => $body,
        }
    };
}

const PHONE: &[&str] = &["telephone_number"];
const PASSPORT: &[&str] = &["passport"];
const EMAIL: &[&str] = &["email"];
const VIN_CODE: &[&str] = &["vin_code"];
const DRIVER_LICENSE: &[&str] = &["driver_license"];
const COUNTRY_CITY_ADDRESS: &[&str] = &["country", "city", "address"];
const WAY_BILL: &[&str] = &["way_bill_id"];

impl Record {
    pub fn kind(&self) -> EntityKind {
        match self {
            Record::Category(_) => EntityKind::Category,
            Record::Customer(_) => EntityKind::Customer,
            Record::Cargo(_) => EntityKind::Cargo,
            Record::Truck(_) => EntityKind::Truck,
            Record::Driver(_) => EntityKind::Driver,
            Record::Location(_) => EntityKind::Location,
            Record::Invoice(_) => EntityKind::Invoice,
            Record::WayBill(_) => EntityKind::WayBill,
            Record::Order(_) => EntityKind::Order,
        }
    }

    pub fn id(&self) -> RecordId {
        on_record!(self, record => record.id)
    }

    pub fn created_date(&self) -> DateTime<Utc> {
        on_record!(self, record => record.created_date)
    }

    pub fn updated_date(&self) -> DateTime<Utc> {
        on_record!(self, record => record.updated_date)
    }

    /**
     * Sets the store managed fields.
     */
    pub fn stamp(&mut self, id: RecordId, created_date: DateTime<Utc>, updated_date: DateTime<Utc>) {
        on_record!(self, record => {
            record.id = id;
            record.created_date = created_date;
            record.updated_date = updated_date;
        })
    }

    /**
     * Values of this record in each uniqueness domain of its kind.
     */
    pub fn unique_keys(&self) -> Vec<UniqueKey> {
        match self {
            Record::Customer(customer) => vec![
                UniqueKey::single(PHONE, &customer.telephone_number),
                UniqueKey::single(PASSPORT, &customer.passport),
                UniqueKey::single(EMAIL, &customer.email),
            ],
            Record::Truck(truck) => vec![UniqueKey::single(VIN_CODE, &truck.vin_code)],
            Record::Driver(driver) => vec![
                UniqueKey::single(PHONE, &driver.telephone_number),
                UniqueKey::single(PASSPORT, &driver.passport),
                UniqueKey::single(DRIVER_LICENSE, &driver.driver_license),
            ],
            Record::Location(location) => vec![UniqueKey {
                columns: COUNTRY_CITY_ADDRESS,
                values: vec![location.country.clone(), location.city.clone(), location.address.clone()],
            }],
            Record::Order(order) => vec![UniqueKey::single(WAY_BILL, &order.way_bill_id.to_string())],
            Record::Category(_) | Record::Cargo(_) | Record::Invoice(_) | Record::WayBill(_) => vec![],
        }
    }

    /**
     * Delete-protect references held by this record.
     */
    pub fn references(&self) -> Vec<Reference> {
        match self {
            Record::Cargo(cargo) => vec![Reference { column: "category_id", kind: EntityKind::Category, id: cargo.category_id }],
            Record::Invoice(invoice) => vec![
                Reference { column: "customer_id", kind: EntityKind::Customer, id: invoice.customer_id },
                Reference { column: "point_a_id", kind: EntityKind::Location, id: invoice.point_a_id },
                Reference { column: "point_b_id", kind: EntityKind::Location, id: invoice.point_b_id },
            ],
            Record::WayBill(way_bill) => vec![
                Reference { column: "driver_id", kind: EntityKind::Driver, id: way_bill.driver_id },
                Reference { column: "truck_id", kind: EntityKind::Truck, id: way_bill.truck_id },
                Reference { column: "point_a_id", kind: EntityKind::Location, id: way_bill.point_a_id },
                Reference { column: "point_b_id", kind: EntityKind::Location, id: way_bill.point_b_id },
            ],
            Record::Order(order) => vec![Reference { column: "way_bill_id", kind: EntityKind::WayBill, id: order.way_bill_id }],
            Record::Category(_) | Record::Customer(_) | Record::Truck(_) | Record::Driver(_) | Record::Location(_) => vec![],
        }
    }

    /**
     * Member set of the association owned by this record, if its kind owns one.
     */
    pub fn links(&self) -> Option<(Association, &[RecordId])> {
        match self {
            Record::Truck(truck) => Some((Association::TruckCategory, truck.categories.as_slice())),
            Record::Driver(driver) => Some((Association::DriverCategory, driver.categories.as_slice())),
            Record::Invoice(invoice) => Some((Association::InvoiceCargo, invoice.cargo.as_slice())),
            Record::Order(order) => Some((Association::OrderInvoice, order.invoices.as_slice())),
            _ => None,
        }
    }

    /**
     * Replaces the member set of the owned association. No-op for kinds without one.
     */
    pub fn set_links(&mut self, ids: Vec<RecordId>) {
        match self {
            Record::Truck(truck) => truck.categories = ids,
            Record::Driver(driver) => driver.categories = ids,
            Record::Invoice(invoice) => invoice.cargo = ids,
            Record::Order(order) => order.invoices = ids,
            _ => {}
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        on_record!(self, record => fmt::Display::fmt(record, f))
    }
}

/***************** Entity *********************/

/**
 * Typed view of one record kind, used by the service to offer a typed API over `Record`.
 */
pub trait Entity: Clone + Sized {
    const KIND: EntityKind;
    type Input;

    /**
     * Builds an unsaved record from caller input.
     */
    fn from_input(input: Self::Input, now: DateTime<Utc>) -> Self;

    fn into_record(self) -> Record;

    fn from_record(record: Record) -> Option<Self>;
}

macro_rules! entity {
    ($entity:ident, $input:ident, |$source:ident, $now:ident| $build:expr) => {
        impl Entity for $entity {
            const KIND: EntityKind = EntityKind::$entity;
            type Input = $input;

            fn from_input($source: $input, $now: DateTime<Utc>) -> Self {
                $build
            }

            fn into_record(self) -> Record {
                Record::$entity(self)
            }

            fn from_record(record: Record) -> Option<Self> {
                match record {
                    Record::$entity(entity) => Some(entity),
                    _ => None,
                }
            }
        }
    };
}

entity!(Category, CategoryInput, |input, now| Category { id: 0, name: input.name, created_date: now, updated_date: now });
entity!(Customer, CustomerInput, |input, now| Customer {
    id: 0,
    name: input.name,
    surname: input.surname,
    telephone_number: input.telephone_number,
    passport: input.passport,
    email: input.email,
    created_date: now,
    updated_date: now,
});
entity!(Cargo, CargoInput, |input, now| Cargo {
    id: 0,
    length: input.length,
    width: input.width,
    height: input.height,
    weight: input.weight,
    volume: input.volume.unwrap_or_default(),
    category_id: input.category_id,
    created_date: now,
    updated_date: now,
});
entity!(Truck, TruckInput, |input, now| Truck {
    id: 0,
    truck_number: input.truck_number,
    weight: input.weight,
    volume: input.volume,
    brand: input.brand,
    model: input.model,
    vin_code: input.vin_code,
    categories: input.categories,
    created_date: now,
    updated_date: now,
});
entity!(Driver, DriverInput, |input, now| Driver {
    id: 0,
    name: input.name,
    surname: input.surname,
    telephone_number: input.telephone_number,
    passport: input.passport,
    driver_license: input.driver_license,
    categories: input.categories,
    created_date: now,
    updated_date: now,
});
entity!(Location, LocationInput, |input, now| Location { id: 0, city: input.city, country: input.country, address: input.address, created_date: now, updated_date: now });
entity!(Invoice, InvoiceInput, |input, now| Invoice {
    id: 0,
    customer_id: input.customer_id,
    point_a_id: input.point_a_id,
    point_b_id: input.point_b_id,
    cargo: input.cargo,
    created_date: now,
    updated_date: now,
});
entity!(WayBill, WayBillInput, |input, now| WayBill {
    id: 0,
    driver_id: input.driver_id,
    truck_id: input.truck_id,
    point_a_id: input.point_a_id,
    point_b_id: input.point_b_id,
    created_date: now,
    updated_date: now,
});
entity!(Order, OrderInput, |input, now| Order { id: 0, invoices: input.invoices, way_bill_id: input.way_bill_id, created_date: now, updated_date: now });

#[cfg(test)]
mod test {
    use super::*;

    fn way_bill() -> Record {
        Record::WayBill(WayBill::from_input(WayBillInput { driver_id: 1, truck_id: 2, point_a_id: 3, point_b_id: 4 }, Utc::now()))
    }

    #[test]
    fn test_references_match_protected_relationships() {
        let now = Utc::now();
        let records = vec![
            Record::Cargo(Cargo::from_input(
                CargoInput { length: Decimal::ONE, width: Decimal::ONE, height: Decimal::ONE, weight: Decimal::ONE, volume: None, category_id: 1 },
                now,
            )),
            Record::Invoice(Invoice::from_input(InvoiceInput { customer_id: 1, point_a_id: 2, point_b_id: 3, cargo: vec![4] }, now)),
            way_bill(),
            Record::Order(Order::from_input(OrderInput { invoices: vec![1], way_bill_id: 2 }, now)),
        ];
        for record in records {
            for reference in record.references() {
                assert!(
                    reference.kind.protected_by().contains(&(record.kind(), reference.column)),
                    "{} {} is not declared as protecting {}",
                    record.kind(),
                    reference.column,
                    reference.kind
                );
            }
        }
    }

    #[test]
    fn test_every_protected_relationship_is_emitted() {
        for kind in EntityKind::ALL {
            for (referencing, column) in kind.protected_by() {
                let emitted = match referencing {
                    EntityKind::Cargo => vec!["category_id"],
                    EntityKind::Invoice => vec!["customer_id", "point_a_id", "point_b_id"],
                    EntityKind::WayBill => vec!["driver_id", "truck_id", "point_a_id", "point_b_id"],
                    EntityKind::Order => vec!["way_bill_id"],
                    _ => vec![],
                };
                assert!(emitted.contains(column), "{referencing}.{column} not emitted");
            }
        }
    }

    #[test]
    fn test_reference_field_name() {
        let reference = Reference { column: "point_a_id", kind: EntityKind::Location, id: 1 };
        assert_eq!(reference.field(), "point_a");
    }

    #[test]
    fn test_display_strings() {
        let now = Utc::now();
        let mut customer = Customer::from_input(
            CustomerInput { name: "Ivan".to_string(), surname: "Petrov".to_string(), telephone_number: "+10000000001".to_string(), passport: "P1".to_string(), email: "a@a.com".to_string() },
            now,
        );
        customer.id = 3;
        assert_eq!(customer.to_string(), "Petrov Ivan");
        let location = Location::from_input(LocationInput { city: "Riga".to_string(), country: "Latvia".to_string(), address: "Brivibas 1".to_string() }, now);
        assert_eq!(Record::Location(location).to_string(), "Latvia Riga Brivibas 1");
        let mut record = way_bill();
        record.stamp(12, now, now);
        assert_eq!(record.to_string(), "Waybill #12");
    }

    #[test]
    fn test_location_unique_key_is_composite() {
        let location = Record::Location(Location::from_input(LocationInput { city: "Riga".to_string(), country: "Latvia".to_string(), address: "Brivibas 1".to_string() }, Utc::now()));
        let keys = location.unique_keys();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].field_label(), "country, city, address");
        assert_eq!(keys[0].value_label(), "Latvia, Riga, Brivibas 1");
    }

    #[test]
    fn test_order_way_bill_key_uses_reference_field_name() {
        let order = Record::Order(Order::from_input(OrderInput { invoices: vec![1], way_bill_id: 2 }, Utc::now()));
        let keys = order.unique_keys();
        let reference = order.references().into_iter().find(|reference| reference.kind == EntityKind::WayBill).unwrap();
        assert_eq!(keys[0].field_label(), "way_bill");
        assert_eq!(keys[0].field_label(), reference.field());
    }

    #[test]
    fn test_owned_associations() {
        assert_eq!(EntityKind::Truck.owned_association(), Some(Association::TruckCategory));
        assert_eq!(EntityKind::Category.owned_association(), None);
        assert_eq!(EntityKind::Category.associations(), vec![Association::TruckCategory, Association::DriverCategory]);
        assert_eq!(EntityKind::Invoice.associations(), vec![Association::InvoiceCargo, Association::OrderInvoice]);
    }

    #[test]
    fn test_every_kind_has_timestamps_in_field_list() {
        for kind in EntityKind::ALL {
            let names: Vec<&str> = kind.fields().iter().map(|field| field.name).collect();
            assert!(names.contains(&"created_date"), "{kind}");
            assert!(names.contains(&"updated_date"), "{kind}");
        }
    }
}
