//! Shared helpers for the Lumen host: configuration, paths and command lines.

pub mod config;
pub mod path_processing;
pub mod shell_lexing;

pub use config::{
    CONFIG_FILE_NAME, CONFIG_PATH_ENV, Config, ConfigError, DEFAULT_TIMEOUT_MS, ExtensionConfig, default_config_path, load_config,
    load_config_from_path,
};
pub use path_processing::{expand_tilde, resolve_relative_to};
pub use shell_lexing::split_command_line;
