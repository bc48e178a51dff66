pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::Cli;

pub use adapters::LocalStorage;
pub use config::AppConfig;
pub use crate::core::{etl::ImportEngine, pipeline::ImportPipeline, store::AppStore};
pub use domain::model::{AppData, Transaction};
pub use utils::error::{CfoError, Result};
