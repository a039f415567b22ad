use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use uuid::Uuid;

use super::{items_total, validate_document, DocumentRecord, HasLineItems, LineItem};
use crate::errors::ServiceError;
use crate::store::{Collection, StoredDocument};

/// Enum representing the possible statuses of an invoice.
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
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Overdue,
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: Uuid,
    pub number: String,
    pub customer_name: String,
    items: Vec<LineItem>,
    amount: Decimal,
    pub status: InvoiceStatus,
    pub created_at: DateTime<Utc>,
    pub due_date: Option<NaiveDate>,
    /// Sales order this invoice was raised from.
    #[serde(default)]
    pub sales_order_id: Option<Uuid>,
    /// Proforma invoice this invoice replaced.
    #[serde(default)]
    pub proforma_id: Option<Uuid>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Invoice {
    /// New draft invoice; the amount is the sum of the items.
    pub fn new(
        number: impl Into<String>,
        customer_name: impl Into<String>,
        items: Vec<LineItem>,
        due_date: Option<NaiveDate>,
    ) -> Self {
        let amount = items_total(&items);
        Self {
            id: Uuid::new_v4(),
            number: number.into(),
            customer_name: customer_name.into(),
            items,
            amount,
            status: InvoiceStatus::Draft,
            created_at: Utc::now(),
            due_date,
            sales_order_id: None,
            proforma_id: None,
            notes: None,
        }
    }

    pub fn with_status(mut self, status: InvoiceStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Unpaid and past its due date on `today`.
    pub fn is_past_due(&self, today: NaiveDate) -> bool {
        matches!(self.status, InvoiceStatus::Sent | InvoiceStatus::Overdue)
            && self.due_date.map_or(false, |due| due < today)
    }
}

impl DocumentRecord for Invoice {
    type Status = InvoiceStatus;

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

    fn status(&self) -> InvoiceStatus {
        self.status
    }

    fn set_status(&mut self, status: InvoiceStatus) {
        self.status = status;
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn secondary_date(&self) -> Option<NaiveDate> {
        self.due_date
    }
}

impl HasLineItems for Invoice {
    fn items(&self) -> &[LineItem] {
        &self.items
    }

    fn set_items(&mut self, items: Vec<LineItem>) {
        self.amount = items_total(&items);
        self.items = items;
    }
}

impl StoredDocument for Invoice {
    const COLLECTION: Collection = Collection::Invoices;

    fn validate_record(&self) -> Result<(), ServiceError> {
        validate_document(&self.customer_name, &self.items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::str::FromStr;

    fn sample() -> Invoice {
        Invoice::new(
            "INV-1",
            "TechCorp",
            vec![
                LineItem::new("Consulting", dec!(8), dec!(120)),
                LineItem::new("Travel", dec!(1), dec!(85.50)),
            ],
            NaiveDate::from_ymd_opt(2024, 3, 31),
        )
    }

    #[test]
    fn amount_is_derived_from_items() {
        let invoice = sample();
        assert_eq!(invoice.amount(), dec!(1045.50));
        assert_eq!(invoice.status(), InvoiceStatus::Draft);
    }

    #[test]
    fn set_items_recomputes_amount() {
        let mut invoice = sample();
        invoice.set_items(vec![LineItem::new("Consulting", dec!(2), dec!(100))]);
        assert_eq!(invoice.amount(), dec!(200));
        assert_eq!(invoice.items().len(), 1);
    }

    #[test]
    fn any_status_may_follow_any_other() {
        let mut invoice = sample().with_status(InvoiceStatus::Paid);
        invoice.set_status(InvoiceStatus::Draft);
        assert_eq!(invoice.status(), InvoiceStatus::Draft);
    }

    #[test]
    fn status_string_forms() {
        assert_eq!(InvoiceStatus::Overdue.to_string(), "overdue");
        assert_eq!(InvoiceStatus::from_str("PAID").unwrap(), InvoiceStatus::Paid);
        assert!(InvoiceStatus::from_str("settled").is_err());
    }

    #[test]
    fn past_due_only_for_open_invoices() {
        let today = NaiveDate::from_ymd_opt(2024, 4, 15).unwrap();
        let sent = sample().with_status(InvoiceStatus::Sent);
        assert!(sent.is_past_due(today));

        let paid = sample().with_status(InvoiceStatus::Paid);
        assert!(!paid.is_past_due(today));
    }

    #[test]
    fn serializes_with_snake_case_status() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["status"], "draft");
        assert_eq!(json["customer_name"], "TechCorp");
        let back: Invoice = serde_json::from_value(json).unwrap();
        assert_eq!(back.amount(), dec!(1045.50));
    }
}
