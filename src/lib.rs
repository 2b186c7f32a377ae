//! Concurrency-safe ticket inventory allocation.
//!
//! A purchase names an event and one or more ticket types with quantities.
//! [`purchase::PurchaseCoordinator`] locks the referenced ticket type rows in
//! ascending id order, checks remaining capacity and issues every ticket in
//! a single transaction, so concurrent purchases can never oversell.

pub mod config;
pub mod handlers;
pub mod models;
pub mod purchase;
pub mod routes;
pub mod store;
pub mod utils;
