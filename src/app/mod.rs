// Application layer: ledger features built on the domain and the store.

pub mod assistant;
pub mod audit;
pub mod chart;
pub mod converter;
pub mod dashboard;
pub mod projection;
pub mod reconciliation;
pub mod reports;
pub mod services;
pub mod transactions;

#[cfg(feature = "cli")]
pub mod commands;
