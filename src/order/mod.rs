//! Order domain module
//!
//! Contains models, the status state machine, the order service, and the
//! stale-order sweeper.

mod model;
mod service;
mod sweeper;

pub use model::*;
pub use service::OrderService;
pub use sweeper::pending_order_sweeper;
