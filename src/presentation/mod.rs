pub mod config;
pub mod handlers;
pub mod router;
pub mod state;

pub use config::{
    CorsSettings, Environment, LoggingSettings, ServerSettings, Settings,
    TranscriptionProviderSetting, TranscriptionSettings,
};
pub use router::create_router;
pub use state::AppState;
