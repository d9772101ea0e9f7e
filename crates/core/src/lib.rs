pub mod config;
pub mod error;
pub mod types;

pub use config::{Settings, load_settings};
pub use error::{Error, Result};
pub use types::*;
