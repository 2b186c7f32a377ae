//! Purchase path against a real Postgres.
//!
//! Requires `DATABASE_URL` pointing at a scratch database:
//! `cargo test --test postgres_store_test -- --ignored`

use std::time::Duration;

use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use ticket_inventory::models::{PurchaseItem, PurchaseRequest};
use ticket_inventory::purchase::{PurchaseCoordinator, PurchaseError};
use ticket_inventory::store::{InventoryStore, InventoryTransaction, PgInventoryStore, StoreError};

async fn connect() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(&url)
        .await
        .unwrap();
    sqlx::migrate!().run(&pool).await.unwrap();
    pool
}

async fn seed(pool: &PgPool, total_qty: i32) -> (i64, i64) {
    let (event_id,): (i64,) = sqlx::query_as("INSERT INTO events (title) VALUES ('Test') RETURNING id")
        .fetch_one(pool)
        .await
        .unwrap();
    let (ticket_type_id,): (i64,) = sqlx::query_as(
        "INSERT INTO ticket_types (event_id, name, price, currency, total_qty) \
         VALUES ($1, 'General', $2, 'USD', $3) RETURNING id",
    )
    .bind(event_id)
    .bind(Decimal::new(2500, 2))
    .bind(total_qty)
    .fetch_one(pool)
    .await
    .unwrap();
    (event_id, ticket_type_id)
}

async fn sold_qty(pool: &PgPool, ticket_type_id: i64) -> i32 {
    let (sold,): (i32,) = sqlx::query_as("SELECT sold_qty FROM ticket_types WHERE id = $1")
        .bind(ticket_type_id)
        .fetch_one(pool)
        .await
        .unwrap();
    sold
}

async fn ticket_count(pool: &PgPool, ticket_type_id: i64) -> i64 {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tickets WHERE ticket_type_id = $1")
        .bind(ticket_type_id)
        .fetch_one(pool)
        .await
        .unwrap();
    count
}

fn request(event_id: i64, ticket_type_id: i64, quantity: i32) -> PurchaseRequest {
    PurchaseRequest {
        event_id: Some(event_id),
        user_id: None,
        items: vec![PurchaseItem {
            ticket_type_id: Some(ticket_type_id),
            quantity,
            buyer_email: "buyer@example.com".to_string(),
            buyer_phone: "+15550100".to_string(),
        }],
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
#[ignore = "requires DATABASE_URL"]
async fn test_postgres_no_oversell() {
    let pool = connect().await;
    let (event_id, id) = seed(&pool, 5).await;
    let coordinator =
        PurchaseCoordinator::new(PgInventoryStore::new(pool.clone(), Duration::from_secs(5)));

    let mut handles = Vec::new();
    for _ in 0..30 {
        let coordinator = coordinator.clone();
        handles.push(tokio::spawn(async move {
            coordinator.purchase(&request(event_id, id, 1)).await
        }));
    }

    let mut issued = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(tickets) => issued += tickets.len(),
            Err(PurchaseError::InsufficientInventory { .. }) => {}
            Err(other) => panic!("unexpected failure: {other:?}"),
        }
    }

    assert_eq!(issued, 5);
    assert_eq!(sold_qty(&pool, id).await, 5);
    assert_eq!(ticket_count(&pool, id).await, 5);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_postgres_foreign_event_rejected() {
    let pool = connect().await;
    let (_, id) = seed(&pool, 5).await;
    let (other_event, _) = seed(&pool, 5).await;
    let coordinator =
        PurchaseCoordinator::new(PgInventoryStore::new(pool.clone(), Duration::from_secs(5)));

    let err = coordinator
        .purchase(&request(other_event, id, 1))
        .await
        .unwrap_err();

    assert!(matches!(err, PurchaseError::TicketTypeNotFound { .. }));
    assert_eq!(sold_qty(&pool, id).await, 0);
    assert_eq!(ticket_count(&pool, id).await, 0);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_postgres_lock_timeout() {
    let pool = connect().await;
    let (event_id, id) = seed(&pool, 5).await;
    let store = PgInventoryStore::new(pool.clone(), Duration::from_millis(200));
    let coordinator = PurchaseCoordinator::new(store.clone());

    let mut holder = store.begin().await.unwrap();
    holder.lock_ticket_type(event_id, id).await.unwrap();

    let err = coordinator
        .purchase(&request(event_id, id, 1))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PurchaseError::StorageFailure(StoreError::LockTimeout { .. })
    ));

    holder.rollback().await.unwrap();
    assert_eq!(sold_qty(&pool, id).await, 0);
}
