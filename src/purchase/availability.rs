use std::collections::BTreeMap;

use tracing::debug;

use super::PurchaseError;
use crate::models::{TicketType, ValidatedItem};
use crate::store::InventoryTransaction;

/// A ticket type held under this transaction's lock, with the total quantity
/// the request wants from it.
#[derive(Debug, Clone, PartialEq)]
pub struct LockedTicketType {
    pub ticket_type: TicketType,
    pub requested: u64,
}

/// Sums requested quantities per ticket type id.
///
/// Iterating the returned map yields ids in ascending order, which is the
/// global lock order.
pub fn aggregate_quantities(items: &[ValidatedItem]) -> BTreeMap<i64, u64> {
    let mut totals = BTreeMap::new();
    for item in items {
        *totals.entry(item.ticket_type_id).or_insert(0) += u64::from(item.quantity);
    }
    totals
}

/// Locks every requested ticket type in ascending id order and checks that
/// each has enough remaining capacity.
///
/// Stops at the first type that is missing or short; the caller rolls the
/// transaction back, which releases every lock taken so far.
pub async fn lock_and_check<T: InventoryTransaction>(
    tx: &mut T,
    event_id: i64,
    requested: &BTreeMap<i64, u64>,
) -> Result<Vec<LockedTicketType>, PurchaseError> {
    let mut locked = Vec::with_capacity(requested.len());

    for (&ticket_type_id, &quantity) in requested {
        let ticket_type = tx
            .lock_ticket_type(event_id, ticket_type_id)
            .await?
            .ok_or(PurchaseError::TicketTypeNotFound { ticket_type_id })?;

        let available = ticket_type.available();
        if u64::try_from(available).unwrap_or(0) < quantity {
            return Err(PurchaseError::InsufficientInventory {
                ticket_type_id,
                requested: quantity,
                available,
            });
        }

        debug!(ticket_type_id, requested = quantity, available, "capacity confirmed");
        locked.push(LockedTicketType {
            ticket_type,
            requested: quantity,
        });
    }

    Ok(locked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InventoryStore, MemoryInventoryStore};
    use rust_decimal::Decimal;

    fn item(ticket_type_id: i64, quantity: u32) -> ValidatedItem {
        ValidatedItem {
            ticket_type_id,
            quantity,
            buyer_email: "buyer@example.com".to_string(),
            buyer_phone: "+15550100".to_string(),
        }
    }

    #[test]
    fn test_aggregates_by_id_value() {
        let totals = aggregate_quantities(&[item(7, 2), item(3, 1), item(7, 3)]);
        assert_eq!(totals.into_iter().collect::<Vec<_>>(), vec![(3, 1), (7, 5)]);
    }

    #[tokio::test]
    async fn test_aggregated_quantity_checked_against_capacity() {
        let store = MemoryInventoryStore::new();
        let vip = store.insert_ticket_type(1, "VIP", Decimal::new(100, 0), "USD", 4);

        let mut tx = store.begin().await.unwrap();
        let requested = aggregate_quantities(&[item(vip.id, 2), item(vip.id, 3)]);
        let err = lock_and_check(&mut tx, 1, &requested).await.unwrap_err();

        assert!(matches!(
            err,
            PurchaseError::InsufficientInventory { requested: 5, available: 4, .. }
        ));
    }

    #[tokio::test]
    async fn test_returns_locked_rows_in_ascending_order() {
        let store = MemoryInventoryStore::new();
        let a = store.insert_ticket_type(1, "A", Decimal::new(10, 0), "USD", 10);
        let b = store.insert_ticket_type(1, "B", Decimal::new(20, 0), "USD", 10);

        let mut tx = store.begin().await.unwrap();
        let requested = aggregate_quantities(&[item(b.id, 1), item(a.id, 2)]);
        let locked = lock_and_check(&mut tx, 1, &requested).await.unwrap();

        let ids: Vec<i64> = locked.iter().map(|l| l.ticket_type.id).collect();
        assert_eq!(ids, vec![a.id, b.id]);
        assert_eq!(locked[0].requested, 2);
    }

    #[tokio::test]
    async fn test_ticket_type_of_other_event_not_found() {
        let store = MemoryInventoryStore::new();
        let other = store.insert_ticket_type(2, "VIP", Decimal::new(100, 0), "USD", 10);

        let mut tx = store.begin().await.unwrap();
        let requested = aggregate_quantities(&[item(other.id, 1)]);
        let err = lock_and_check(&mut tx, 1, &requested).await.unwrap_err();

        assert!(matches!(
            err,
            PurchaseError::TicketTypeNotFound { ticket_type_id } if ticket_type_id == other.id
        ));
    }
}
