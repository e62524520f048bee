//! Configuration loading (spec §6.5, ambient per SPEC_FULL §10).

mod loader;
mod schema;

pub use loader::ConfigLoader;
pub use schema::{Config, GeneralConfig, ServerConfig, TransportConfig, TransportKind};
