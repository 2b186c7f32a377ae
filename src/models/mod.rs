pub mod purchase;
pub mod ticket;
pub mod ticket_type;

pub use purchase::{PurchaseItem, PurchaseRequest, ValidatedItem, ValidatedPurchase};
pub use ticket::{NewTicket, Ticket, TicketStatus};
pub use ticket_type::{TicketType, TicketTypeAvailability};
