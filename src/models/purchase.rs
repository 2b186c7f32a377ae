use serde::{Deserialize, Serialize};

/// Purchase request as decoded from the wire. Every field is optional or
/// loosely typed here; `purchase::validator` turns it into a
/// [`ValidatedPurchase`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRequest {
    pub event_id: Option<i64>,
    #[serde(skip)]
    pub user_id: Option<i64>,
    #[serde(rename = "ticketTypes", default)]
    pub items: Vec<PurchaseItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseItem {
    pub ticket_type_id: Option<i64>,
    #[serde(default)]
    pub quantity: i32,
    #[serde(default)]
    pub buyer_email: String,
    #[serde(default)]
    pub buyer_phone: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedPurchase {
    pub event_id: i64,
    pub user_id: Option<i64>,
    pub items: Vec<ValidatedItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedItem {
    pub ticket_type_id: i64,
    pub quantity: u32,
    pub buyer_email: String,
    pub buyer_phone: String,
}
