use std::collections::HashMap;

use chrono::{Duration, TimeZone, Utc};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{Money, OrderDocument, OrderItem};
use order_search::{InMemorySearchIndex, ORDERS_COLLECTION, SearchProjector, compile};

fn filter() -> HashMap<String, String> {
    HashMap::from([
        ("status".to_string(), "paid".to_string()),
        ("item".to_string(), "SKU-7".to_string()),
        ("startDate".to_string(), "2024-01-01".to_string()),
        ("endDate".to_string(), "2024-06-30".to_string()),
    ])
}

/// Populate an index with N documents spread over a year.
async fn populate_index(index: &InMemorySearchIndex, n: usize) {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let statuses = ["created", "paid", "shipped"];

    for i in 0..n {
        let created_at = start + Duration::hours(i as i64 * 8);
        let doc = OrderDocument {
            id: format!("order-{i}"),
            items: vec![OrderItem::new(
                format!("SKU-{}", i % 10),
                "Widget",
                1,
                Money::from_cents(1000),
            )],
            status: statuses[i % statuses.len()].to_string(),
            total: Money::from_cents(1000),
            created_at,
            updated_at: created_at,
        };
        index.upsert(ORDERS_COLLECTION, &doc.id, &doc).await.unwrap();
    }
}

fn bench_compile(c: &mut Criterion) {
    let params = filter();

    c.bench_function("search/compile_four_filters", |b| {
        b.iter(|| compile(std::hint::black_box(&params)));
    });
}

fn bench_query_1000_documents(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let index = InMemorySearchIndex::new();
    rt.block_on(populate_index(&index, 1000));
    let query = compile(&filter());

    c.bench_function("search/in_memory_query_1000_docs", |b| {
        b.iter(|| {
            rt.block_on(async {
                index.query(ORDERS_COLLECTION, &query).await.unwrap();
            });
        });
    });
}

fn bench_render_dsl(c: &mut Criterion) {
    let query = compile(&filter());

    c.bench_function("search/render_dsl", |b| {
        b.iter(|| query.to_json());
    });
}

criterion_group!(
    benches,
    bench_compile,
    bench_query_1000_documents,
    bench_render_dsl
);
criterion_main!(benches);
