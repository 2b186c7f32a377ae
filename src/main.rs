use std::net::SocketAddr;

use axum::Router;
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use ticket_inventory::config::Config;
use ticket_inventory::purchase::PurchaseCoordinator;
use ticket_inventory::routes::{create_routes, AppState};
use ticket_inventory::store::PgInventoryStore;

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Successfully connected to database");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    tracing::info!("Migrations run successfully");

    let store = PgInventoryStore::new(pool, config.lock_timeout);
    let state = AppState::new(PurchaseCoordinator::new(store));
    let app: Router = create_routes(state, &config);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let lock_timeout_ms = u64::try_from(config.lock_timeout.as_millis()).unwrap_or(u64::MAX);
    tracing::info!(lock_timeout_ms, "Server running at http://{}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app).await.expect("Server failed");
}
