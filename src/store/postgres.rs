use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::{FromRow, Postgres, Transaction};

use super::{InventoryStore, InventoryTransaction, StoreError};
use crate::models::{NewTicket, Ticket, TicketStatus, TicketType};

const TICKET_TYPE_COLUMNS: &str =
    "id, event_id, name, price, currency, total_qty, sold_qty, created_at, updated_at";

/// Inventory backed by the `ticket_types` and `tickets` tables.
#[derive(Clone)]
pub struct PgInventoryStore {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PgInventoryStore {
    pub fn new(pool: PgPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

pub struct PgTransaction {
    tx: Transaction<'static, Postgres>,
    locked: BTreeSet<i64>,
}

impl PgTransaction {
    fn ensure_locked(&self, ticket_type_id: i64) -> Result<(), StoreError> {
        if self.locked.contains(&ticket_type_id) {
            Ok(())
        } else {
            Err(StoreError::NotLocked { ticket_type_id })
        }
    }
}

#[derive(FromRow)]
struct TicketRow {
    id: i64,
    event_id: i64,
    ticket_type_id: i64,
    user_id: Option<i64>,
    status: String,
    paid_at: Option<DateTime<Utc>>,
    used_at: Option<DateTime<Utc>>,
    buyer_email: String,
    buyer_phone: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<TicketRow> for Ticket {
    type Error = StoreError;

    fn try_from(row: TicketRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<TicketStatus>()
            .map_err(|msg| StoreError::Database(sqlx::Error::Decode(msg.into())))?;

        Ok(Ticket {
            id: row.id,
            event_id: row.event_id,
            ticket_type_id: row.ticket_type_id,
            user_id: row.user_id,
            status,
            paid_at: row.paid_at,
            used_at: row.used_at,
            buyer_email: row.buyer_email,
            buyer_phone: row.buyer_phone,
            created_at: row.created_at,
        })
    }
}

/// `SET` does not take bind parameters. Postgres reads `0` as "no limit", so
/// the timeout is rounded up to whole milliseconds and never below 1ms.
fn lock_timeout_statement(lock_timeout: Duration) -> String {
    let millis = lock_timeout.as_nanos().div_ceil(1_000_000).max(1);
    format!("SET LOCAL lock_timeout = '{millis}ms'")
}

impl InventoryStore for PgInventoryStore {
    type Transaction = PgTransaction;

    async fn begin(&self) -> Result<PgTransaction, StoreError> {
        let mut tx = self.pool.begin().await?;

        let statement = lock_timeout_statement(self.lock_timeout);
        sqlx::query(&statement).execute(&mut *tx).await?;

        Ok(PgTransaction {
            tx,
            locked: BTreeSet::new(),
        })
    }

    async fn ticket_types_for_event(&self, event_id: i64) -> Result<Vec<TicketType>, StoreError> {
        let query = format!(
            "SELECT {TICKET_TYPE_COLUMNS} FROM ticket_types WHERE event_id = $1 ORDER BY id"
        );
        let rows = sqlx::query_as::<_, TicketType>(&query)
            .bind(event_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}

impl InventoryTransaction for PgTransaction {
    async fn lock_ticket_type(
        &mut self,
        event_id: i64,
        ticket_type_id: i64,
    ) -> Result<Option<TicketType>, StoreError> {
        let query = format!(
            "SELECT {TICKET_TYPE_COLUMNS} FROM ticket_types \
             WHERE id = $1 AND event_id = $2 \
             FOR UPDATE"
        );
        let row = sqlx::query_as::<_, TicketType>(&query)
            .bind(ticket_type_id)
            .bind(event_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|err| StoreError::from_lock_wait(err, ticket_type_id))?;

        if row.is_some() {
            self.locked.insert(ticket_type_id);
        }
        Ok(row)
    }

    async fn insert_ticket(&mut self, ticket: NewTicket) -> Result<Ticket, StoreError> {
        self.ensure_locked(ticket.ticket_type_id)?;

        let row = sqlx::query_as::<_, TicketRow>(
            r#"
            INSERT INTO tickets
                (event_id, ticket_type_id, user_id, status, paid_at, used_at, buyer_email, buyer_phone, created_at)
            VALUES ($1, $2, $3, $4, NULL, NULL, $5, $6, now())
            RETURNING id, event_id, ticket_type_id, user_id, status, paid_at, used_at,
                      buyer_email, buyer_phone, created_at
            "#,
        )
        .bind(ticket.event_id)
        .bind(ticket.ticket_type_id)
        .bind(ticket.user_id)
        .bind(ticket.status.as_str())
        .bind(&ticket.buyer_email)
        .bind(&ticket.buyer_phone)
        .fetch_one(&mut *self.tx)
        .await?;

        Ticket::try_from(row)
    }

    async fn add_sold_qty(&mut self, ticket_type_id: i64, quantity: i32) -> Result<(), StoreError> {
        self.ensure_locked(ticket_type_id)?;

        let result = sqlx::query(
            r#"
            UPDATE ticket_types
            SET sold_qty = sold_qty + $1,
                updated_at = now()
            WHERE id = $2
            "#,
        )
        .bind(quantity)
        .bind(ticket_type_id)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() != 1 {
            return Err(StoreError::NotLocked { ticket_type_id });
        }
        Ok(())
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
