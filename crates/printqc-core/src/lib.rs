pub mod config;
pub mod error;
pub mod types;

pub use config::PrintQcConfig;
pub use error::{PrintQcError, Result};
pub use types::*;
