//! bizdesk back-office core
//!
//! Document records for a small CRM/ERP back office (invoices, quotations,
//! sales orders, proforma invoices and warehouse products), the in-memory
//! list engine that filters, searches and sorts them, and a fixed-interval
//! status poller for long-running jobs.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod errors;
pub mod models;
pub mod notifications;
pub mod polling;
pub mod queries;
pub mod services;
pub mod store;

pub use errors::{PollError, ServiceError, ServiceResult};

/// Commonly used types.
pub mod prelude {
    pub use crate::auth::{PermissionChecker, PermissionTable};
    pub use crate::config::AppConfig;
    pub use crate::errors::{PollError, ServiceError, ServiceResult};
    pub use crate::models::{
        DocumentRecord, HasLineItems, Invoice, InvoiceStatus, LineItem, ProformaInvoice,
        ProformaStatus, Product, ProductStatus, Quotation, QuotationStatus, SalesOrder,
        SalesOrderStatus,
    };
    pub use crate::notifications::{Notification, NotificationKind, NotificationSink};
    pub use crate::polling::{
        PollSnapshot, PollStatus, PollerConfig, StatusFetcher, StatusPoller, StatusReport,
    };
    pub use crate::queries::{
        filter_and_sort_documents, AmountBucket, Filter, ListParams, ListQuery, SortDirection,
        SortField, SortMode,
    };
    pub use crate::services::{DocumentService, ServiceContext, Services, WorkflowService};
    pub use crate::store::{Collection, DataStore, FilterSpec, InMemoryStore, Repository};
}
