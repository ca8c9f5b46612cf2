pub mod cli;
pub mod error;
mod loader;
mod raw;
pub mod resolver;

pub use cli::{CliArgs, RegistryArg};
pub use error::ConfigError;
pub use loader::{config_file_path, load_config_file};
pub use resolver::{determine_registry_url, resolve, resolve_with_registry};
