/// Database URL resolution, connection and startup migration
pub mod database;

/// Settings loading from config.toml
pub mod settings;
