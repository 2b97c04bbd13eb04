//! sales-service: dual-schema sales record intake, the derived sales ledger
//! and cash collection reconciliation.

pub mod config;
pub mod dtos;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod normalizer;
pub mod services;
pub mod startup;

pub use startup::{build_router, AppState, Application, Stores};
