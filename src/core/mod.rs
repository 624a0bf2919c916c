pub mod config;
pub mod error;
pub mod types;

pub use config::WorldConfig;
pub use error::{Result, SimError};
pub use types::{Tick, Value};
