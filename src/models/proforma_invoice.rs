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
pub enum ProformaStatus {
    Draft,
    Sent,
    /// Replaced by a final invoice.
    Converted,
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProformaInvoice {
    pub id: Uuid,
    pub number: String,
    pub customer_name: String,
    items: Vec<LineItem>,
    amount: Decimal,
    pub status: ProformaStatus,
    pub created_at: DateTime<Utc>,
    pub valid_until: Option<NaiveDate>,
    #[serde(default)]
    pub invoice_id: Option<Uuid>,
}

impl ProformaInvoice {
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
            status: ProformaStatus::Draft,
            created_at: Utc::now(),
            valid_until,
            invoice_id: None,
        }
    }

    pub fn with_status(mut self, status: ProformaStatus) -> Self {
        self.status = status;
        self
    }

    pub fn can_convert(&self) -> bool {
        !matches!(
            self.status,
            ProformaStatus::Converted | ProformaStatus::Cancelled
        )
    }
}

impl DocumentRecord for ProformaInvoice {
    type Status = ProformaStatus;

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

    fn status(&self) -> ProformaStatus {
        self.status
    }

    fn set_status(&mut self, status: ProformaStatus) {
        self.status = status;
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn secondary_date(&self) -> Option<NaiveDate> {
        self.valid_until
    }
}

impl HasLineItems for ProformaInvoice {
    fn items(&self) -> &[LineItem] {
        &self.items
    }

    fn set_items(&mut self, items: Vec<LineItem>) {
        self.amount = items_total(&items);
        self.items = items;
    }
}

impl StoredDocument for ProformaInvoice {
    const COLLECTION: Collection = Collection::ProformaInvoices;

    fn validate_record(&self) -> Result<(), ServiceError> {
        validate_document(&self.customer_name, &self.items)
    }
}
