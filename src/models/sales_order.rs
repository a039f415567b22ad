use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use uuid::Uuid;

use super::{items_total, validate_document, DocumentRecord, HasLineItems, LineItem};
use crate::errors::ServiceError;
use crate::store::{Collection, StoredDocument};

/// Enum representing the possible statuses of a sales order.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SalesOrderStatus {
    Pending,
    Confirmed,
    Shipped,
    Delivered,
    /// An invoice has been raised for the order.
    Invoiced,
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SalesOrder {
    pub id: Uuid,
    pub number: String,
    pub customer_name: String,
    items: Vec<LineItem>,
    amount: Decimal,
    pub status: SalesOrderStatus,
    pub created_at: DateTime<Utc>,
    pub delivery_date: Option<NaiveDate>,
    #[serde(default)]
    pub quotation_id: Option<Uuid>,
    #[serde(default)]
    pub invoice_id: Option<Uuid>,
    #[serde(default)]
    pub shipping_address: Option<String>,
}

impl SalesOrder {
    pub fn new(
        number: impl Into<String>,
        customer_name: impl Into<String>,
        items: Vec<LineItem>,
        delivery_date: Option<NaiveDate>,
    ) -> Self {
        let amount = items_total(&items);
        Self {
            id: Uuid::new_v4(),
            number: number.into(),
            customer_name: customer_name.into(),
            items,
            amount,
            status: SalesOrderStatus::Pending,
            created_at: Utc::now(),
            delivery_date,
            quotation_id: None,
            invoice_id: None,
            shipping_address: None,
        }
    }

    pub fn with_status(mut self, status: SalesOrderStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn can_invoice(&self) -> bool {
        !matches!(
            self.status,
            SalesOrderStatus::Invoiced | SalesOrderStatus::Cancelled
        )
    }
}

impl DocumentRecord for SalesOrder {
    type Status = SalesOrderStatus;

    fn id(&self) -> Uuid {
        self.id
    }

    fn number(&self) -> &str {
        &self.number
    }

    fn counterparty_name(&self) -> &str {
        &self.customer_name
    }

    fn amount(&self) -> Decimal {
        self.amount
    }

    fn status(&self) -> SalesOrderStatus {
        self.status
    }

    fn set_status(&mut self, status: SalesOrderStatus) {
        self.status = status;
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn secondary_date(&self) -> Option<NaiveDate> {
        self.delivery_date
    }
}

impl HasLineItems for SalesOrder {
    fn items(&self) -> &[LineItem] {
        &self.items
    }

    fn set_items(&mut self, items: Vec<LineItem>) {
        self.amount = items_total(&items);
        self.items = items;
    }
}

impl StoredDocument for SalesOrder {
    const COLLECTION: Collection = Collection::SalesOrders;

    fn validate_record(&self) -> Result<(), ServiceError> {
        validate_document(&self.customer_name, &self.items)
    }
}
