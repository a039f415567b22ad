use chrono::{Duration, NaiveDate, Utc};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{report, KeyedLocks, ServiceContext};
use crate::config::DocumentConfig;
use crate::errors::ServiceError;
use crate::models::{
    HasLineItems, Invoice, NumberGenerator, ProformaInvoice, ProformaStatus, Quotation,
    QuotationStatus, SalesOrder, SalesOrderStatus,
};
use crate::notifications::{Notification, NotificationSink};
use crate::store::{Collection, Repository};

/// Conversions along quotation -> sales order -> invoice, and proforma
/// invoice -> invoice.
///
/// Each conversion writes the new document first and then marks the source,
/// so a failure in between leaves the source convertible again. Conversions
/// of the same source are serialized, so only one of them sees it open.
#[derive(Clone)]
pub struct WorkflowService {
    quotations: Repository<Quotation>,
    sales_orders: Repository<SalesOrder>,
    invoices: Repository<Invoice>,
    proformas: Repository<ProformaInvoice>,
    notifier: Arc<dyn NotificationSink>,
    numbers: Arc<NumberGenerator>,
    locks: KeyedLocks,
    documents: DocumentConfig,
}

impl WorkflowService {
    pub fn new(ctx: &ServiceContext) -> Self {
        Self {
            quotations: Repository::new(ctx.store.clone()),
            sales_orders: Repository::new(ctx.store.clone()),
            invoices: Repository::new(ctx.store.clone()),
            proformas: Repository::new(ctx.store.clone()),
            notifier: ctx.notifier.clone(),
            numbers: ctx.numbers.clone(),
            locks: ctx.locks.clone(),
            documents: ctx.config.documents.clone(),
        }
    }

    async fn exclusive<T, F>(&self, source: Collection, id: Uuid, work: F) -> T
    where
        F: std::future::Future<Output = T>,
    {
        self.locks.run(format!("{}/{}", source, id), work).await
    }

    fn due_date(&self, today: NaiveDate) -> NaiveDate {
        today + Duration::days(i64::from(self.documents.payment_terms_days))
    }

    async fn finish<T>(
        &self,
        result: Result<T, ServiceError>,
        (created_title, failed_title): (&str, &str),
        describe: impl FnOnce(&T) -> String + Send,
    ) -> Result<T, ServiceError>
    where
        T: Send + Sync,
    {
        report(
            self.notifier.as_ref(),
            result,
            |created| Notification::success(created_title, describe(created)),
            failed_title,
        )
        .await
    }

    /// Creates a pending sales order from a quotation and marks the
    /// quotation converted. Converted and rejected quotations are refused.
    #[instrument(skip(self))]
    pub async fn quotation_to_sales_order(&self, id: Uuid) -> Result<SalesOrder, ServiceError> {
        let result: Result<(String, SalesOrder), ServiceError> = self
            .exclusive(Collection::Quotations, id, async {
                let mut quotation = self.quotations.get(id).await?;
                if !quotation.can_convert() {
                    warn!(status = %quotation.status, "Quotation cannot be converted");
                    return Err(ServiceError::InvalidOperation(format!(
                        "Quotation {} is {} and cannot be converted",
                        quotation.number, quotation.status
                    )));
                }

                let mut order = SalesOrder::new(
                    self.numbers
                        .next(self.documents.prefix_for(Collection::SalesOrders)),
                    quotation.customer_name.clone(),
                    quotation.items().to_vec(),
                    None,
                );
                order.quotation_id = Some(quotation.id);
                let order = self.sales_orders.insert(&order).await?;

                quotation.status = QuotationStatus::Converted;
                quotation.sales_order_id = Some(order.id);
                self.quotations.save(&quotation).await?;

                info!(quotation = %quotation.number, order = %order.number, "Quotation converted");
                Ok((quotation.number, order))
            })
            .await;

        self.finish(
            result,
            ("Sales order created", "Quotation not converted"),
            |(quotation, order)| format!("{} created from {}", order.number, quotation),
        )
        .await
        .map(|(_, order)| order)
    }

    /// Raises a draft invoice for a sales order, due after the configured
    /// payment terms, and marks the order invoiced.
    pub async fn sales_order_to_invoice(&self, id: Uuid) -> Result<Invoice, ServiceError> {
        self.sales_order_to_invoice_on(id, Utc::now().date_naive())
            .await
    }

    #[instrument(skip(self))]
    pub async fn sales_order_to_invoice_on(
        &self,
        id: Uuid,
        today: NaiveDate,
    ) -> Result<Invoice, ServiceError> {
        let result: Result<(String, Invoice), ServiceError> = self
            .exclusive(Collection::SalesOrders, id, async {
                let mut order = self.sales_orders.get(id).await?;
                if !order.can_invoice() {
                    warn!(status = %order.status, "Sales order cannot be invoiced");
                    return Err(ServiceError::InvalidOperation(format!(
                        "Sales order {} is {} and cannot be invoiced",
                        order.number, order.status
                    )));
                }

                let mut invoice = Invoice::new(
                    self.numbers
                        .next(self.documents.prefix_for(Collection::Invoices)),
                    order.customer_name.clone(),
                    order.items().to_vec(),
                    Some(self.due_date(today)),
                );
                invoice.sales_order_id = Some(order.id);
                let invoice = self.invoices.insert(&invoice).await?;

                order.status = SalesOrderStatus::Invoiced;
                order.invoice_id = Some(invoice.id);
                self.sales_orders.save(&order).await?;

                info!(order = %order.number, invoice = %invoice.number, "Sales order invoiced");
                Ok((order.number, invoice))
            })
            .await;

        self.finish(
            result,
            ("Invoice created", "Sales order not invoiced"),
            |(order, invoice)| format!("{} created from {}", invoice.number, order),
        )
        .await
        .map(|(_, invoice)| invoice)
    }

    /// Replaces a proforma invoice with a final draft invoice and marks the
    /// proforma converted.
    pub async fn proforma_to_invoice(&self, id: Uuid) -> Result<Invoice, ServiceError> {
        self.proforma_to_invoice_on(id, Utc::now().date_naive())
            .await
    }

    #[instrument(skip(self))]
    pub async fn proforma_to_invoice_on(
        &self,
        id: Uuid,
        today: NaiveDate,
    ) -> Result<Invoice, ServiceError> {
        let result: Result<(String, Invoice), ServiceError> = self
            .exclusive(Collection::ProformaInvoices, id, async {
                let mut proforma = self.proformas.get(id).await?;
                if !proforma.can_convert() {
                    warn!(status = %proforma.status, "Proforma invoice cannot be converted");
                    return Err(ServiceError::InvalidOperation(format!(
                        "Proforma invoice {} is {} and cannot be converted",
                        proforma.number, proforma.status
                    )));
                }

                let mut invoice = Invoice::new(
                    self.numbers
                        .next(self.documents.prefix_for(Collection::Invoices)),
                    proforma.customer_name.clone(),
                    proforma.items().to_vec(),
                    Some(self.due_date(today)),
                );
                invoice.proforma_id = Some(proforma.id);
                let invoice = self.invoices.insert(&invoice).await?;

                proforma.status = ProformaStatus::Converted;
                proforma.invoice_id = Some(invoice.id);
                self.proformas.save(&proforma).await?;

                info!(
                    proforma = %proforma.number,
                    invoice = %invoice.number,
                    "Proforma invoice converted"
                );
                Ok((proforma.number, invoice))
            })
            .await;

        self.finish(
            result,
            ("Invoice created", "Proforma invoice not converted"),
            |(proforma, invoice)| format!("{} created from {}", invoice.number, proforma),
        )
        .await
        .map(|(_, invoice)| invoice)
    }
}
