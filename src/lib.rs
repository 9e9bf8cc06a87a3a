//! Cafetero Backend Library
//!
//! This library exports the core modules for the Cafetero backend server:
//! accounts and sessions, businesses and their menus, the order lifecycle,
//! and payment processing against an external gateway.

pub mod auth;
pub mod business;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod order;
pub mod payment;
pub mod product;
pub mod routes;
pub mod state;
