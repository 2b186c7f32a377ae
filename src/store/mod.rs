//! Transactional inventory storage.
//!
//! The purchase path is written against [`InventoryStore`] and
//! [`InventoryTransaction`]. A transaction holds exclusive row locks on the
//! ticket types it has locked until it commits or rolls back; dropping a
//! transaction without committing discards everything it staged.

use std::future::Future;

use thiserror::Error;

use crate::models::{NewTicket, Ticket, TicketType};

pub mod memory;
pub mod postgres;

pub use memory::MemoryInventoryStore;
pub use postgres::PgInventoryStore;

/// SQLSTATE raised by Postgres when `lock_timeout` expires.
const LOCK_NOT_AVAILABLE: &str = "55P03";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("timed out waiting for the lock on ticket type {ticket_type_id}")]
    LockTimeout { ticket_type_id: i64 },

    #[error("ticket type {ticket_type_id} is not locked by this transaction")]
    NotLocked { ticket_type_id: i64 },

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl StoreError {
    /// Classifies an error raised while waiting on the row lock of
    /// `ticket_type_id`.
    pub(crate) fn from_lock_wait(err: sqlx::Error, ticket_type_id: i64) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().as_deref() == Some(LOCK_NOT_AVAILABLE) {
                return StoreError::LockTimeout { ticket_type_id };
            }
        }
        StoreError::from(err)
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            // Class 23: integrity constraint violation
            if db_err.code().is_some_and(|code| code.starts_with("23")) {
                return StoreError::ConstraintViolation(db_err.message().to_string());
            }
        }
        StoreError::Database(err)
    }
}

pub trait InventoryStore: Send + Sync + 'static {
    type Transaction: InventoryTransaction;

    /// Opens a new unit of work.
    fn begin(&self) -> impl Future<Output = Result<Self::Transaction, StoreError>> + Send;

    /// Non-locking read of every ticket type of an event, ordered by id.
    fn ticket_types_for_event(
        &self,
        event_id: i64,
    ) -> impl Future<Output = Result<Vec<TicketType>, StoreError>> + Send;
}

pub trait InventoryTransaction: Send {
    /// Acquires the exclusive lock on a ticket type row scoped to `event_id`
    /// and returns its state as of acquisition.
    ///
    /// Returns `Ok(None)` when no such row exists under that event. Waiting
    /// is bounded by the store's lock timeout, after which
    /// [`StoreError::LockTimeout`] is returned.
    fn lock_ticket_type(
        &mut self,
        event_id: i64,
        ticket_type_id: i64,
    ) -> impl Future<Output = Result<Option<TicketType>, StoreError>> + Send;

    /// Persists one ticket for a ticket type this transaction has locked.
    fn insert_ticket(
        &mut self,
        ticket: NewTicket,
    ) -> impl Future<Output = Result<Ticket, StoreError>> + Send;

    /// Adds `quantity` to `sold_qty` of a ticket type this transaction has
    /// locked.
    fn add_sold_qty(
        &mut self,
        ticket_type_id: i64,
        quantity: i32,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn commit(self) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn rollback(self) -> impl Future<Output = Result<(), StoreError>> + Send;
}
