//! Payment domain module
//!
//! Contains models, the gateway client, webhook signature verification, and
//! the payment service.

pub mod gateway;
mod model;
mod service;
pub mod webhook;

pub use gateway::PaymentGateway;
pub use model::*;
pub use service::PaymentService;
