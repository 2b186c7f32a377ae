//! In-process inventory with the same locking semantics as the Postgres
//! store: one async mutex per ticket type row, held by a transaction until it
//! ends, and writes that stay invisible until commit.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

use super::{InventoryStore, InventoryTransaction, StoreError};
use crate::models::{NewTicket, Ticket, TicketType};

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

struct Row {
    lock: Arc<AsyncMutex<()>>,
    committed: Mutex<TicketType>,
}

impl Row {
    fn snapshot(&self) -> TicketType {
        self.committed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[derive(Default)]
struct Inner {
    rows: RwLock<BTreeMap<i64, Arc<Row>>>,
    tickets: Mutex<Vec<Ticket>>,
    next_ticket_type_id: AtomicI64,
    next_ticket_id: AtomicI64,
}

impl Inner {
    fn row(&self, ticket_type_id: i64) -> Option<Arc<Row>> {
        self.rows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&ticket_type_id)
            .cloned()
    }
}

#[derive(Clone)]
pub struct MemoryInventoryStore {
    inner: Arc<Inner>,
    lock_timeout: Duration,
}

impl Default for MemoryInventoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryInventoryStore {
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner::default()),
            lock_timeout,
        }
    }

    /// Creates a ticket type with `sold_qty = 0` and returns it.
    pub fn insert_ticket_type(
        &self,
        event_id: i64,
        name: &str,
        price: Decimal,
        currency: &str,
        total_qty: i32,
    ) -> TicketType {
        let id = self.inner.next_ticket_type_id.fetch_add(1, Ordering::SeqCst) + 1;
        let now = Utc::now();
        let ticket_type = TicketType {
            id,
            event_id,
            name: name.to_string(),
            price,
            currency: currency.to_string(),
            total_qty,
            sold_qty: 0,
            created_at: now,
            updated_at: now,
        };

        let row = Row {
            lock: Arc::new(AsyncMutex::new(())),
            committed: Mutex::new(ticket_type.clone()),
        };
        self.inner
            .rows
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::new(row));

        ticket_type
    }

    /// Last committed state of a ticket type.
    pub fn ticket_type(&self, ticket_type_id: i64) -> Option<TicketType> {
        self.inner.row(ticket_type_id).map(|row| row.snapshot())
    }

    /// Every committed ticket, in commit order.
    pub fn tickets(&self) -> Vec<Ticket> {
        self.inner
            .tickets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

struct HeldLock {
    row: Arc<Row>,
    _guard: OwnedMutexGuard<()>,
}

pub struct MemoryTransaction {
    store: Arc<Inner>,
    lock_timeout: Duration,
    held: BTreeMap<i64, HeldLock>,
    pending_sold: BTreeMap<i64, i32>,
    pending_tickets: Vec<Ticket>,
}

impl MemoryTransaction {
    fn held(&self, ticket_type_id: i64) -> Result<&HeldLock, StoreError> {
        self.held
            .get(&ticket_type_id)
            .ok_or(StoreError::NotLocked { ticket_type_id })
    }
}

impl InventoryStore for MemoryInventoryStore {
    type Transaction = MemoryTransaction;

    async fn begin(&self) -> Result<MemoryTransaction, StoreError> {
        Ok(MemoryTransaction {
            store: Arc::clone(&self.inner),
            lock_timeout: self.lock_timeout,
            held: BTreeMap::new(),
            pending_sold: BTreeMap::new(),
            pending_tickets: Vec::new(),
        })
    }

    async fn ticket_types_for_event(&self, event_id: i64) -> Result<Vec<TicketType>, StoreError> {
        let rows: Vec<Arc<Row>> = self
            .inner
            .rows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();

        Ok(rows
            .iter()
            .map(|row| row.snapshot())
            .filter(|ticket_type| ticket_type.event_id == event_id)
            .collect())
    }
}

impl InventoryTransaction for MemoryTransaction {
    async fn lock_ticket_type(
        &mut self,
        event_id: i64,
        ticket_type_id: i64,
    ) -> Result<Option<TicketType>, StoreError> {
        if let Some(held) = self.held.get(&ticket_type_id) {
            let mut ticket_type = held.row.snapshot();
            ticket_type.sold_qty += self.pending_sold.get(&ticket_type_id).copied().unwrap_or(0);
            return Ok(Some(ticket_type).filter(|t| t.event_id == event_id));
        }

        let Some(row) = self.store.row(ticket_type_id) else {
            return Ok(None);
        };

        // A row of another event never matches, so it is not locked either.
        if row.snapshot().event_id != event_id {
            return Ok(None);
        }

        let guard = tokio::time::timeout(self.lock_timeout, Arc::clone(&row.lock).lock_owned())
            .await
            .map_err(|_| StoreError::LockTimeout { ticket_type_id })?;

        // Read after acquiring: any previous holder has already published.
        let ticket_type = row.snapshot();
        debug!(ticket_type_id, sold_qty = ticket_type.sold_qty, "row locked");

        self.held.insert(
            ticket_type_id,
            HeldLock {
                row,
                _guard: guard,
            },
        );
        Ok(Some(ticket_type))
    }

    async fn insert_ticket(&mut self, ticket: NewTicket) -> Result<Ticket, StoreError> {
        self.held(ticket.ticket_type_id)?;

        let id = self.store.next_ticket_id.fetch_add(1, Ordering::SeqCst) + 1;
        let ticket = Ticket {
            id,
            event_id: ticket.event_id,
            ticket_type_id: ticket.ticket_type_id,
            user_id: ticket.user_id,
            status: ticket.status,
            paid_at: None,
            used_at: None,
            buyer_email: ticket.buyer_email,
            buyer_phone: ticket.buyer_phone,
            created_at: Utc::now(),
        };
        self.pending_tickets.push(ticket.clone());
        Ok(ticket)
    }

    async fn add_sold_qty(&mut self, ticket_type_id: i64, quantity: i32) -> Result<(), StoreError> {
        let committed = self.held(ticket_type_id)?.row.snapshot();
        let pending = self.pending_sold.get(&ticket_type_id).copied().unwrap_or(0);

        // Mirrors CHECK (sold_qty >= 0 AND sold_qty <= total_qty).
        let sold_qty = i64::from(committed.sold_qty) + i64::from(pending) + i64::from(quantity);
        if sold_qty < 0 || sold_qty > i64::from(committed.total_qty) {
            return Err(StoreError::ConstraintViolation(format!(
                "sold_qty {sold_qty} out of range for ticket type {ticket_type_id} (total_qty {})",
                committed.total_qty
            )));
        }

        self.pending_sold.insert(ticket_type_id, pending + quantity);
        Ok(())
    }

    async fn commit(self) -> Result<(), StoreError> {
        let now = Utc::now();
        for (ticket_type_id, quantity) in &self.pending_sold {
            let held = self.held(*ticket_type_id)?;
            let mut committed = held
                .row
                .committed
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            committed.sold_qty += quantity;
            committed.updated_at = now;
        }

        self.store
            .tickets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(self.pending_tickets);

        // Locks are released when `self.held` drops here.
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        Ok(())
    }
}
