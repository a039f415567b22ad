//! Quotation -> sales order -> invoice and proforma -> invoice conversions.

mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use bizdesk::errors::ServiceError;
use bizdesk::models::{
    DocumentRecord, InvoiceStatus, LineItem, ProformaInvoice, ProformaStatus, Quotation,
    QuotationStatus, SalesOrder, SalesOrderStatus,
};
use bizdesk::notifications::NotificationKind;
use bizdesk::queries::ListQuery;
use common::{date, services};
use rstest::rstest;
use rust_decimal_macros::dec;

fn items() -> Vec<LineItem> {
    vec![
        LineItem::new("Fibre patch cable", dec!(20), dec!(7.5)),
        LineItem::new("Installation", dec!(1), dec!(350)),
    ]
}

#[tokio::test]
async fn quotation_flows_through_to_invoice() {
    let (services, _, notifier) = services();
    let quotation = services
        .quotations
        .create(Quotation::new("QUO-1", "CableCorp", items(), None))
        .await
        .unwrap();

    let order = services
        .workflow
        .quotation_to_sales_order(quotation.id)
        .await
        .unwrap();
    let invoice = services
        .workflow
        .sales_order_to_invoice_on(order.id, date(3, 1))
        .await
        .unwrap();

    assert_eq!(invoice.amount(), dec!(500));
    assert_eq!(invoice.status, InvoiceStatus::Draft);
    assert_eq!(invoice.customer_name, "CableCorp");
    assert_eq!(invoice.sales_order_id, Some(order.id));
    assert_eq!(invoice.due_date, Some(date(3, 31)));

    let order = services.sales_orders.get(order.id).await.unwrap();
    assert_eq!(order.status, SalesOrderStatus::Invoiced);
    assert_eq!(order.invoice_id, Some(invoice.id));

    let invoices = services.invoices.list(&ListQuery::new()).await.unwrap();
    assert_eq!(invoices.len(), 1);

    assert_eq!(
        notifier.kinds(),
        vec![NotificationKind::Success; 3],
        "create, convert and invoice each report success"
    );
}

#[rstest]
#[case(QuotationStatus::Converted)]
#[case(QuotationStatus::Rejected)]
#[tokio::test]
async fn closed_quotations_are_refused(#[case] status: QuotationStatus) {
    let (services, _, notifier) = services();
    let quotation = services
        .quotations
        .create(Quotation::new("QUO-9", "TechCorp", items(), None).with_status(status))
        .await
        .unwrap();
    notifier.clear();

    assert_matches!(
        services.workflow.quotation_to_sales_order(quotation.id).await,
        Err(ServiceError::InvalidOperation(message)) if message.contains("QUO-9")
    );
    assert!(services
        .sales_orders
        .list(&ListQuery::new())
        .await
        .unwrap()
        .is_empty());

    let delivered = notifier.notifications();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].kind, NotificationKind::Error);
    assert_eq!(delivered[0].title, "Quotation not converted");
}

#[rstest]
#[case(SalesOrderStatus::Invoiced)]
#[case(SalesOrderStatus::Cancelled)]
#[tokio::test]
async fn closed_orders_are_not_invoiced(#[case] status: SalesOrderStatus) {
    let (services, _, _) = services();
    let order = services
        .sales_orders
        .create(SalesOrder::new("SO-3", "AccessCorp", items(), None).with_status(status))
        .await
        .unwrap();

    assert_matches!(
        services.workflow.sales_order_to_invoice(order.id).await,
        Err(ServiceError::InvalidOperation(_))
    );
    let stored = services.sales_orders.get(order.id).await.unwrap();
    assert_eq!(stored.status, status);
    assert_eq!(stored.invoice_id, None);
}

#[tokio::test]
async fn proforma_becomes_final_invoice() {
    let (services, _, _) = services();
    let proforma = services
        .proforma_invoices
        .create(ProformaInvoice::new("PRO-4", "Northwind", items(), Some(date(2, 1))))
        .await
        .unwrap();

    let invoice = services
        .workflow
        .proforma_to_invoice_on(proforma.id, date(1, 15))
        .await
        .unwrap();
    assert_eq!(invoice.proforma_id, Some(proforma.id));
    assert_eq!(invoice.due_date, Some(date(2, 14)));
    assert!(invoice.number.starts_with("INV-"));

    let stored = services.proforma_invoices.get(proforma.id).await.unwrap();
    assert_eq!(stored.status, ProformaStatus::Converted);
    assert_eq!(stored.invoice_id, Some(invoice.id));

    assert_matches!(
        services.workflow.proforma_to_invoice(proforma.id).await,
        Err(ServiceError::InvalidOperation(_))
    );
}

#[tokio::test]
async fn cancelled_proforma_is_refused() {
    let (services, _, _) = services();
    let proforma = services
        .proforma_invoices
        .create(
            ProformaInvoice::new("PRO-5", "Northwind", items(), None)
                .with_status(ProformaStatus::Cancelled),
        )
        .await
        .unwrap();

    assert_matches!(
        services.workflow.proforma_to_invoice(proforma.id).await,
        Err(ServiceError::InvalidOperation(_))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_conversions_create_one_order() {
    let (services, _, _) = services();
    let quotation = services
        .quotations
        .create(Quotation::new("QUO-7", "TechCorp", items(), None))
        .await
        .unwrap();

    let start = Arc::new(tokio::sync::Barrier::new(2));
    let racers: Vec<_> = (0..2)
        .map(|_| {
            let workflow = services.workflow.clone();
            let start = start.clone();
            tokio::spawn(async move {
                start.wait().await;
                workflow.quotation_to_sales_order(quotation.id).await
            })
        })
        .collect();

    let mut converted = Vec::new();
    let mut refused = 0;
    for racer in racers {
        match racer.await.unwrap() {
            Ok(order) => converted.push(order),
            Err(err) => {
                assert_matches!(err, ServiceError::InvalidOperation(_));
                refused += 1;
            }
        }
    }
    assert_eq!(converted.len(), 1);
    assert_eq!(refused, 1);

    let orders = services.sales_orders.list(&ListQuery::new()).await.unwrap();
    assert_eq!(orders.len(), 1);
    let stored = services.quotations.get(quotation.id).await.unwrap();
    assert_eq!(stored.sales_order_id, Some(orders[0].id));
    assert_eq!(orders[0].id, converted[0].id);
}
