/// CLI argument parsing and command handling - Gateway
mod args;
mod commands;

pub use args::{BackendArg, Cli, Commands, OutputFormat};
pub use commands::{handle_command, open_store};
