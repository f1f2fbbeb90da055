//! Command handlers for CLI subcommands

mod completions;
mod config;
mod request;

pub use completions::handle_completions;
pub use config::handle_config;
pub use request::handle_request;
