//! The purchase path: validate, lock, check, allocate, commit.
//!
//! [`PurchaseCoordinator::purchase`] is the only entry point. Either every
//! requested ticket is issued and every counter updated in one transaction,
//! or nothing is written at all.

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::models::{PurchaseRequest, Ticket, ValidatedPurchase};
use crate::store::{InventoryStore, InventoryTransaction, StoreError};

pub mod allocation;
pub mod availability;
pub mod validator;

pub use availability::{aggregate_quantities, LockedTicketType};
pub use validator::{validate, FieldErrors};

#[derive(Debug, Error)]
pub enum PurchaseError {
    #[error("invalid purchase request: {0}")]
    ValidationFailed(FieldErrors),

    #[error("ticket type {ticket_type_id} not found for this event")]
    TicketTypeNotFound { ticket_type_id: i64 },

    #[error(
        "insufficient tickets for type {ticket_type_id}: requested {requested}, available {available}"
    )]
    InsufficientInventory {
        ticket_type_id: i64,
        requested: u64,
        available: i64,
    },

    #[error("storage failure: {0}")]
    StorageFailure(#[from] StoreError),
}

impl PurchaseError {
    /// How many units the request was short by, for inventory rejections.
    pub fn short_by(&self) -> Option<u64> {
        match self {
            PurchaseError::InsufficientInventory {
                requested,
                available,
                ..
            } => Some(requested.saturating_sub(u64::try_from(*available).unwrap_or(0))),
            _ => None,
        }
    }
}

/// Runs purchase attempts against an [`InventoryStore`].
pub struct PurchaseCoordinator<S> {
    store: Arc<S>,
}

impl<S> Clone for PurchaseCoordinator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: InventoryStore> PurchaseCoordinator<S> {
    pub fn new(store: S) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Atomically allocates every ticket in `request`, or none of them.
    ///
    /// No deduplication happens here: resubmitting a request that already
    /// committed issues a second, independent set of tickets.
    pub async fn purchase(&self, request: &PurchaseRequest) -> Result<Vec<Ticket>, PurchaseError> {
        let span = info_span!(
            "purchase",
            attempt_id = %Uuid::new_v4(),
            event_id = ?request.event_id,
        );
        self.attempt(request).instrument(span).await
    }

    async fn attempt(&self, request: &PurchaseRequest) -> Result<Vec<Ticket>, PurchaseError> {
        let purchase = validate(request).map_err(|errors| {
            debug!(%errors, "purchase rejected by validation");
            PurchaseError::ValidationFailed(errors)
        })?;
        let requested = aggregate_quantities(&purchase.items);

        let mut tx = match self.store.begin().await {
            Ok(tx) => tx,
            Err(err) => return Err(storage_failure(err, &purchase, &requested)),
        };

        match allocate(&mut tx, &purchase, &requested).await {
            Ok(tickets) => {
                if let Err(err) = tx.commit().await {
                    return Err(storage_failure(err, &purchase, &requested));
                }
                info!(tickets = tickets.len(), "purchase committed");
                Ok(tickets)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "rollback failed");
                }
                Err(match err {
                    PurchaseError::StorageFailure(err) => {
                        storage_failure(err, &purchase, &requested)
                    }
                    rejection => {
                        info!(reason = %rejection, "purchase rejected");
                        rejection
                    }
                })
            }
        }
    }
}

async fn allocate<T: InventoryTransaction>(
    tx: &mut T,
    purchase: &ValidatedPurchase,
    requested: &BTreeMap<i64, u64>,
) -> Result<Vec<Ticket>, PurchaseError> {
    let locked = availability::lock_and_check(tx, purchase.event_id, requested).await?;
    debug!(ticket_types = locked.len(), "inventory locked");

    let tickets = allocation::commit_allocation(tx, purchase, &locked).await?;
    Ok(tickets)
}

/// Logs the shape of the failed request (never buyer contact details).
fn storage_failure(
    err: StoreError,
    purchase: &ValidatedPurchase,
    requested: &BTreeMap<i64, u64>,
) -> PurchaseError {
    error!(
        error = ?err,
        event_id = purchase.event_id,
        items = purchase.items.len(),
        requested = ?requested,
        authenticated = purchase.user_id.is_some(),
        "purchase storage failure"
    );
    PurchaseError::StorageFailure(err)
}
