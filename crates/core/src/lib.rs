pub mod config;
pub mod error;
pub mod templates;
pub mod types;

pub use config::AppConfig;
pub use error::{BlastError, BlastResult};
