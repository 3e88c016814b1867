pub mod env;
mod loader;

pub use env::{
    AppConfig, ConfigError, DirectoryConfig, EscalationConfig, FilterConfig, GhostConfig,
    InsightsConfig, LoggingConfig, MatchConfig, SignalConfig, SyncConfig, MAX_GHOST_WINDOW_DAYS,
};
pub use loader::load_config;
