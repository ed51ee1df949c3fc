//! id-token-generator library
//!
//! Obtains an OpenID Connect ID token through the browser-based implicit
//! grant flow with `form_post` response mode.
//!
//! # Architecture
//!
//! - `oidc`: discovery, authorization request building and the local HTTPS
//!   callback listener
//! - `delivery`: writing the token to a file or stdout
//! - `commands`: the end-to-end `generate` command
//! - `config`: layered configuration and validation
//! - `error`: error types and result aliases
//! - `cli`: command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use clap::Parser;
//! use id_token_generator::{cli::Cli, commands, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cli = Cli::parse_from(["id-token-generator", "https://accounts.google.com", "client"]);
//!     let config = Config::load(None, &cli)?;
//!     config.validate()?;
//!     commands::generate::run_generate(config).await
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod delivery;
pub mod error;
pub mod oidc;

// Re-export commonly used types
pub use config::Config;
pub use error::{IdTokenError, Result};
pub use oidc::callback::CallbackResult;

#[cfg(test)]
pub mod test_utils;
