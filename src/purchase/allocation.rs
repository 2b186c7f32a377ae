use tracing::debug;

use super::availability::LockedTicketType;
use crate::models::{NewTicket, Ticket, TicketStatus, ValidatedPurchase};
use crate::store::{InventoryTransaction, StoreError};

/// Issues one ticket per purchased unit and bumps `sold_qty` once per type.
///
/// Must run in the transaction that produced `locked`. Tickets come back in
/// item order.
pub async fn commit_allocation<T: InventoryTransaction>(
    tx: &mut T,
    purchase: &ValidatedPurchase,
    locked: &[LockedTicketType],
) -> Result<Vec<Ticket>, StoreError> {
    let units: u64 = purchase.items.iter().map(|item| u64::from(item.quantity)).sum();
    let mut tickets = Vec::with_capacity(usize::try_from(units).unwrap_or(0));

    for item in &purchase.items {
        for _ in 0..item.quantity {
            let ticket = tx
                .insert_ticket(NewTicket {
                    event_id: purchase.event_id,
                    ticket_type_id: item.ticket_type_id,
                    user_id: purchase.user_id,
                    status: TicketStatus::Paid,
                    buyer_email: item.buyer_email.clone(),
                    buyer_phone: item.buyer_phone.clone(),
                })
                .await?;
            tickets.push(ticket);
        }
    }

    for entry in locked {
        let ticket_type_id = entry.ticket_type.id;
        let quantity = i32::try_from(entry.requested).map_err(|_| {
            StoreError::ConstraintViolation(format!(
                "quantity {} for ticket type {ticket_type_id} exceeds the counter range",
                entry.requested
            ))
        })?;
        tx.add_sold_qty(ticket_type_id, quantity).await?;
        debug!(ticket_type_id, quantity, "sold_qty incremented");
    }

    Ok(tickets)
}
