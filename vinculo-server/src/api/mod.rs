//! HTTP API handlers for vinculo-server

pub mod access;
pub mod checkout;
pub mod events;
pub mod health;
pub mod identity;
pub mod leads;
pub mod report;
pub mod webhook;

pub use access::get_access;
pub use checkout::{create_checkout, verify_checkout};
pub use events::track_event;
pub use health::health_routes;
pub use leads::capture_lead;
pub use report::{get_report, post_report};
pub use webhook::payment_webhook;
