//! Document records held by the back office.
//!
//! Every collection that can be listed, searched and sorted implements
//! [`DocumentRecord`], the shared shape the list engine works against.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::fmt;
use std::hash::Hash;
use uuid::Uuid;

pub mod invoice;
pub mod line_item;
pub mod numbering;
pub mod proforma_invoice;
pub mod product;
pub mod quotation;
pub mod sales_order;

pub use invoice::{Invoice, InvoiceStatus};
pub use line_item::{items_total, validate_document, LineItem};
pub use numbering::NumberGenerator;
pub use proforma_invoice::{ProformaInvoice, ProformaStatus};
pub use product::{Product, ProductStatus};
pub use quotation::{Quotation, QuotationStatus};
pub use sales_order::{SalesOrder, SalesOrderStatus};

/// Fields shared by invoices, quotations, orders, proforma invoices and
/// products.
pub trait DocumentRecord {
    /// Collection-specific closed status set.
    type Status: Copy + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static;

    fn id(&self) -> Uuid;

    /// Display identifier, unique within the collection.
    fn number(&self) -> &str;

    /// Customer or supplier name.
    fn counterparty_name(&self) -> &str;

    fn amount(&self) -> Decimal;

    fn status(&self) -> Self::Status;

    /// Any status may follow any other; callers decide what is meaningful.
    fn set_status(&mut self, status: Self::Status);

    fn created_at(&self) -> DateTime<Utc>;

    /// Due date, valid-until date or delivery date depending on the collection.
    fn secondary_date(&self) -> Option<NaiveDate> {
        None
    }
}

/// Records whose amount is derived from line items.
pub trait HasLineItems: DocumentRecord {
    fn items(&self) -> &[LineItem];

    /// Replaces the items and recomputes the amount.
    fn set_items(&mut self, items: Vec<LineItem>);
}
