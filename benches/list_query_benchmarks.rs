use bizdesk::models::{Invoice, InvoiceStatus, LineItem};
use bizdesk::queries::{
    filter_and_sort_documents, filter_documents, AmountBucket, ListQuery, SortDirection,
    SortField,
};
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rust_decimal::Decimal;
use std::time::Duration;

const CUSTOMERS: [&str; 6] = [
    "TechCorp",
    "AccessCorp",
    "CableCorp",
    "Northwind",
    "Contoso",
    "Initech",
];
const STATUSES: [InvoiceStatus; 4] = [
    InvoiceStatus::Draft,
    InvoiceStatus::Sent,
    InvoiceStatus::Paid,
    InvoiceStatus::Overdue,
];

fn ledger(size: usize) -> Vec<Invoice> {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    (0..size)
        .map(|i| {
            let amount = Decimal::new(((i * 7919) % 2_000_000) as i64, 2);
            Invoice::new(
                format!("INV-{:06}", i),
                CUSTOMERS[i % CUSTOMERS.len()],
                vec![LineItem::new("Services", Decimal::ONE, amount)],
                None,
            )
            .with_status(STATUSES[i % STATUSES.len()])
            .with_created_at(start + ChronoDuration::minutes((i * 37 % 10_000) as i64))
        })
        .collect()
}

// Search plus status filter, no sorting
fn filter_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_documents");
    let query = ListQuery::new()
        .search("corp")
        .with_status(InvoiceStatus::Paid);

    for size in [100, 1_000, 10_000].iter() {
        let docs = ledger(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &docs, |b, docs| {
            b.iter(|| filter_documents(black_box(docs), black_box(&query)));
        });
    }

    group.finish();
}

// Full list view: filters then a sort on each field
fn filter_and_sort_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_and_sort");
    let docs = ledger(5_000);

    for field in [
        SortField::CreatedAt,
        SortField::Number,
        SortField::CounterpartyName,
        SortField::Amount,
        SortField::Status,
    ] {
        let query = ListQuery::new()
            .with_amount(AmountBucket::From1kTo5k)
            .sort_by(field.clone(), SortDirection::Desc);
        group.bench_with_input(BenchmarkId::from_parameter(&field), &query, |b, query| {
            b.iter(|| filter_and_sort_documents(black_box(&docs), black_box(query)));
        });
    }

    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .measurement_time(Duration::from_secs(5))
        .sample_size(50);
    targets = filter_benchmark, filter_and_sort_benchmark
}

criterion_main!(benches);
