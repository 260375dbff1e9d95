pub mod config;
pub mod error;
pub mod event;
pub mod plan;
pub mod traits;
pub mod types;

pub use config::AppConfig;
pub use error::{Result, ReliefError};
pub use event::EventBus;
pub use plan::*;
pub use types::*;
