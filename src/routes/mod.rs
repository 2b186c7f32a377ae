use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, Config};
use crate::handlers::{health_check, list_ticket_types, purchase_tickets};
use crate::purchase::PurchaseCoordinator;
use crate::store::InventoryStore;

pub struct AppState<S> {
    pub coordinator: PurchaseCoordinator<S>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            coordinator: self.coordinator.clone(),
        }
    }
}

impl<S: InventoryStore> AppState<S> {
    pub fn new(coordinator: PurchaseCoordinator<S>) -> Self {
        Self { coordinator }
    }
}

pub fn create_routes<S: InventoryStore>(state: AppState<S>, config: &Config) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/v1/tickets", post(purchase_tickets::<S>))
        .route(
            "/v1/events/:event_id/ticket-types",
            get(list_ticket_types::<S>),
        )
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer(&config.allowed_origins)),
        )
}
