// Zap Manejo - Core Library
// Farm chat messages (births, deaths, rain, temperature, weather) → records
// Exposes all modules for use in CLI, webhook server, and tests

pub mod account;
pub mod area;
pub mod breed;
pub mod chat;
pub mod config;
pub mod date;
pub mod db;
pub mod sanitize;
pub mod textmsg;

#[cfg(feature = "server")]
pub mod server;

// Re-export commonly used types
pub use account::{find_account_by_phone_number, phone_number_variants, Team};
pub use area::{Area, AreaParser, AreaResolver};
pub use breed::{Breed, BreedMatcher};
pub use chat::{
    classify, get_parser, process_entries,
    BaseContext, ChatMessage, DispatchOutcome, Language, Parser, RecordKind, References, Sex,
    BirthMessage, DeathMessage, RainMessage, TemperatureMessage, WeatherMessage,
};
pub use config::{Config, ConfigError};
pub use db::{setup_database, GLOBAL_ACCOUNT};
pub use textmsg::{sender_from_config, LogSender, MessageSender, SendError, WhatsAppSender};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
