use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A purchasable category within one event, e.g. "VIP".
///
/// `total_qty` is fixed at creation. `sold_qty` only ever grows, and only
/// through the purchase path while the row is locked, so
/// `0 <= sold_qty <= total_qty` holds at every commit point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TicketType {
    pub id: i64,
    pub event_id: i64,
    pub name: String,
    pub price: Decimal,
    pub currency: String,
    pub total_qty: i32,
    pub sold_qty: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TicketType {
    /// Units still available for sale.
    pub fn available(&self) -> i64 {
        i64::from(self.total_qty) - i64::from(self.sold_qty)
    }
}

/// Read-side view returned by the availability listing.
#[derive(Debug, Clone, Serialize)]
pub struct TicketTypeAvailability {
    #[serde(flatten)]
    pub ticket_type: TicketType,
    pub available: i64,
}

impl From<TicketType> for TicketTypeAvailability {
    fn from(ticket_type: TicketType) -> Self {
        let available = ticket_type.available();
        Self {
            ticket_type,
            available,
        }
    }
}
