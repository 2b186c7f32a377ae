use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::{Extension, Json};
use serde::Serialize;

use crate::models::{PurchaseRequest, TicketTypeAvailability};
use crate::routes::AppState;
use crate::store::InventoryStore;
use crate::utils::response::success;
use crate::utils::AppError;

/// Identity of the caller, inserted into request extensions by the
/// authentication layer in front of this service. Absent for anonymous
/// buyers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser(pub i64);

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    service: &'static str,
}

pub async fn health_check() -> Response {
    let payload = HealthPayload {
        status: "ok",
        service: "ticket-inventory",
    };

    success(StatusCode::OK, payload, "Health check successful")
}

pub async fn purchase_tickets<S: InventoryStore>(
    State(state): State<AppState<S>>,
    user: Option<Extension<AuthenticatedUser>>,
    payload: Result<Json<PurchaseRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(mut request) = payload.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    request.user_id = user.map(|Extension(AuthenticatedUser(id))| id);

    let tickets = state.coordinator.purchase(&request).await?;

    Ok(success(
        StatusCode::CREATED,
        tickets,
        "Tickets purchased successfully",
    ))
}

pub async fn list_ticket_types<S: InventoryStore>(
    State(state): State<AppState<S>>,
    Path(event_id): Path<i64>,
) -> Result<Response, AppError> {
    let ticket_types: Vec<TicketTypeAvailability> = state
        .coordinator
        .store()
        .ticket_types_for_event(event_id)
        .await?
        .into_iter()
        .map(TicketTypeAvailability::from)
        .collect();

    Ok(success(
        StatusCode::OK,
        ticket_types,
        "Ticket types retrieved successfully",
    ))
}
