pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use config::SafeSprintConfig;
pub use error::{Result, SafeSprintError};
pub use events::{ChangeKind, RecordChange};
pub use types::*;
