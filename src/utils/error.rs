use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{error, info};

use crate::purchase::PurchaseError;
use crate::store::StoreError;
use crate::utils::response::error as error_response;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Purchase(#[from] PurchaseError),

    #[error("Storage error")]
    Storage(#[from] StoreError),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Purchase(PurchaseError::ValidationFailed(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::Purchase(PurchaseError::TicketTypeNotFound { .. }) => StatusCode::NOT_FOUND,
            AppError::Purchase(PurchaseError::InsufficientInventory { .. }) => StatusCode::CONFLICT,
            AppError::Purchase(PurchaseError::StorageFailure(_)) | AppError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Purchase(PurchaseError::ValidationFailed(_)) => "VALIDATION_ERROR",
            AppError::Purchase(PurchaseError::TicketTypeNotFound { .. }) => {
                "TICKET_TYPE_NOT_FOUND"
            }
            AppError::Purchase(PurchaseError::InsufficientInventory { .. }) => {
                "INSUFFICIENT_INVENTORY"
            }
            AppError::Purchase(PurchaseError::StorageFailure(_)) | AppError::Storage(_) => {
                "INTERNAL_SERVER_ERROR"
            }
        }
    }

    fn log(&self) {
        if self.status_code().is_server_error() {
            error!(error = ?self, "Application error");
        } else {
            info!(error = %self, "Request rejected");
        }
    }

    fn public_message(&self) -> String {
        match self {
            AppError::BadRequest(msg) => msg.clone(),
            AppError::Purchase(PurchaseError::ValidationFailed(_)) => {
                "The purchase request is invalid".to_string()
            }
            AppError::Purchase(PurchaseError::StorageFailure(_)) | AppError::Storage(_) => {
                "An internal error occurred".to_string()
            }
            AppError::Purchase(rejection) => rejection.to_string(),
        }
    }

    fn details(&self) -> Option<Value> {
        let AppError::Purchase(err) = self else {
            return None;
        };
        match err {
            PurchaseError::ValidationFailed(fields) => serde_json::to_value(fields).ok(),
            PurchaseError::TicketTypeNotFound { ticket_type_id } => {
                Some(json!({ "ticket_type_id": ticket_type_id }))
            }
            PurchaseError::InsufficientInventory {
                ticket_type_id,
                requested,
                available,
            } => Some(json!({
                "ticket_type_id": ticket_type_id,
                "requested": requested,
                "available": available,
                "short_by": err.short_by(),
            })),
            PurchaseError::StorageFailure(_) => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.log();
        error_response(
            self.code(),
            self.public_message(),
            self.details(),
            self.status_code(),
        )
    }
}
