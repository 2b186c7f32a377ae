use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::models::{PurchaseRequest, ValidatedItem, ValidatedPurchase};

/// Field-keyed validation messages. Only the first message per field is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_insert_with(|| message.into());
    }

    pub fn check(&mut self, ok: bool, field: impl Into<String>, message: impl Into<String>) {
        if !ok {
            self.add(field, message);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in self.iter() {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{field} {message}")?;
            first = false;
        }
        Ok(())
    }
}

/// Checks a decoded purchase request without touching the store.
///
/// Every violation is collected so the caller can report them all at once.
pub fn validate(request: &PurchaseRequest) -> Result<ValidatedPurchase, FieldErrors> {
    let mut errors = FieldErrors::new();

    errors.check(request.event_id.is_some(), "event_id", "must be provided");
    errors.check(
        !request.items.is_empty(),
        "items",
        "at least one ticket type is required",
    );

    let mut items = Vec::with_capacity(request.items.len());
    for (index, item) in request.items.iter().enumerate() {
        let field = |name: &str| format!("items[{index}].{name}");
        let buyer_email = item.buyer_email.trim();
        let buyer_phone = item.buyer_phone.trim();

        errors.check(
            item.ticket_type_id.is_some(),
            field("ticket_type_id"),
            "must be provided",
        );
        errors.check(item.quantity > 0, field("quantity"), "must be greater than zero");
        errors.check(!buyer_email.is_empty(), field("buyer_email"), "must be provided");
        errors.check(!buyer_phone.is_empty(), field("buyer_phone"), "must be provided");

        if let (Some(ticket_type_id), Ok(quantity)) =
            (item.ticket_type_id, u32::try_from(item.quantity))
        {
            items.push(ValidatedItem {
                ticket_type_id,
                quantity,
                buyer_email: buyer_email.to_string(),
                buyer_phone: buyer_phone.to_string(),
            });
        }
    }

    match request.event_id {
        Some(event_id) if errors.is_empty() => Ok(ValidatedPurchase {
            event_id,
            user_id: request.user_id,
            items,
        }),
        _ => Err(errors),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PurchaseItem;

    fn item(ticket_type_id: Option<i64>, quantity: i32) -> PurchaseItem {
        PurchaseItem {
            ticket_type_id,
            quantity,
            buyer_email: "buyer@example.com".to_string(),
            buyer_phone: "+15550100".to_string(),
        }
    }

    fn request(items: Vec<PurchaseItem>) -> PurchaseRequest {
        PurchaseRequest {
            event_id: Some(1),
            user_id: Some(42),
            items,
        }
    }

    #[test]
    fn test_valid_request_is_normalized() {
        let mut raw = item(Some(3), 2);
        raw.buyer_email = "  buyer@example.com ".to_string();

        let purchase = validate(&request(vec![raw])).unwrap();
        assert_eq!(purchase.event_id, 1);
        assert_eq!(purchase.user_id, Some(42));
        assert_eq!(
            purchase.items,
            vec![ValidatedItem {
                ticket_type_id: 3,
                quantity: 2,
                buyer_email: "buyer@example.com".to_string(),
                buyer_phone: "+15550100".to_string(),
            }]
        );
    }

    #[test]
    fn test_empty_items_rejected() {
        let errors = validate(&request(vec![])).unwrap_err();
        assert_eq!(errors.get("items"), Some("at least one ticket type is required"));
    }

    #[test]
    fn test_zero_and_negative_quantities_rejected() {
        let errors = validate(&request(vec![item(Some(1), 0), item(Some(1), -2)])).unwrap_err();
        assert_eq!(errors.get("items[0].quantity"), Some("must be greater than zero"));
        assert_eq!(errors.get("items[1].quantity"), Some("must be greater than zero"));
    }

    #[test]
    fn test_collects_every_violation() {
        let mut bad = item(None, 0);
        bad.buyer_email = "   ".to_string();
        bad.buyer_phone = String::new();

        let mut raw = request(vec![bad]);
        raw.event_id = None;

        let errors = validate(&raw).unwrap_err();
        assert_eq!(errors.len(), 5);
        assert!(errors.get("event_id").is_some());
        assert!(errors.get("items[0].ticket_type_id").is_some());
        assert!(errors.get("items[0].quantity").is_some());
        assert!(errors.get("items[0].buyer_email").is_some());
        assert!(errors.get("items[0].buyer_phone").is_some());
    }

    #[test]
    fn test_first_message_per_field_wins() {
        let mut errors = FieldErrors::new();
        errors.add("quantity", "first");
        errors.add("quantity", "second");
        assert_eq!(errors.get("quantity"), Some("first"));
        assert_eq!(errors.to_string(), "quantity first");
    }
}
