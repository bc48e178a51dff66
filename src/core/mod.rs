pub mod encoding;
pub mod etl;
pub mod parser;
pub mod pipeline;
pub mod store;

pub use crate::domain::model::{ImportReport, ParsedStatement};
pub use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
pub use crate::utils::error::Result;
