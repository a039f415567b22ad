use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use uuid::Uuid;

use super::{items_total, validate_document, DocumentRecord, HasLineItems, LineItem};
use crate::errors::ServiceError;
use crate::store::{Collection, StoredDocument};

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
pub enum QuotationStatus {
    Draft,
    Sent,
    Accepted,
    Rejected,
    Expired,
    /// Turned into a sales order.
    Converted,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quotation {
    pub id: Uuid,
    pub number: String,
    pub customer_name: String,
    items: Vec<LineItem>,
    amount: Decimal,
    pub status: QuotationStatus,
    pub created_at: DateTime<Utc>,
    pub valid_until: Option<NaiveDate>,
    /// Sales order created from this quotation.
    #[serde(default)]
    pub sales_order_id: Option<Uuid>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Quotation {
    pub fn new(
        number: impl Into<String>,
        customer_name: impl Into<String>,
        items: Vec<LineItem>,
        valid_until: Option<NaiveDate>,
    ) -> Self {
        let amount = items_total(&items);
        Self {
            id: Uuid::new_v4(),
            number: number.into(),
            customer_name: customer_name.into(),
            items,
            amount,
            status: QuotationStatus::Draft,
            created_at: Utc::now(),
            valid_until,
            sales_order_id: None,
            notes: None,
        }
    }

    pub fn with_status(mut self, status: QuotationStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn can_convert(&self) -> bool {
        !matches!(
            self.status,
            QuotationStatus::Converted | QuotationStatus::Rejected
        )
    }
}

impl DocumentRecord for Quotation {
    type Status = QuotationStatus;

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

    fn status(&self) -> QuotationStatus {
        self.status
    }

    fn set_status(&mut self, status: QuotationStatus) {
        self.status = status;
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn secondary_date(&self) -> Option<NaiveDate> {
        self.valid_until
    }
}

impl HasLineItems for Quotation {
    fn items(&self) -> &[LineItem] {
        &self.items
    }

    fn set_items(&mut self, items: Vec<LineItem>) {
        self.amount = items_total(&items);
        self.items = items;
    }
}

impl StoredDocument for Quotation {
    const COLLECTION: Collection = Collection::Quotations;

    fn validate_record(&self) -> Result<(), ServiceError> {
        validate_document(&self.customer_name, &self.items)
    }
}
