use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Paid,
    Used,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Paid => "paid",
            TicketStatus::Used => "used",
        }
    }
}

impl FromStr for TicketStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "paid" => Ok(TicketStatus::Paid),
            "used" => Ok(TicketStatus::Used),
            other => Err(format!("unknown ticket status '{other}'")),
        }
    }
}

/// One issued seat. A purchase line of quantity 3 yields three of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: i64,
    pub event_id: i64,
    pub ticket_type_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    pub status: TicketStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_at: Option<DateTime<Utc>>,
    pub buyer_email: String,
    pub buyer_phone: String,
    pub created_at: DateTime<Utc>,
}

/// Ticket row as handed to the store before it has an id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTicket {
    pub event_id: i64,
    pub ticket_type_id: i64,
    pub user_id: Option<i64>,
    pub status: TicketStatus,
    pub buyer_email: String,
    pub buyer_phone: String,
}
