// Domain layer: ledger models, value parsing and ports. No I/O here.

pub mod accounts;
pub mod model;
pub mod ports;
pub mod values;
pub mod wire;
