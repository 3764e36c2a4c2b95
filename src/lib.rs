pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use app::{routes::build_router, state::AppState};
pub use config::TomlConfig;
pub use utils::error::{GameError, Result};
