//! id-token-generator - obtain an OpenID Connect ID token from the command line
//!
#![doc = "Main entry point for the id-token-generator CLI."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use id_token_generator::cli::Cli;
use id_token_generator::commands;
use id_token_generator::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Load configuration, then initialize tracing from it; RUST_LOG wins
    let config = Config::load(cli.config.as_deref(), &cli)?;
    init_tracing(config.verbose);

    config.validate()?;

    tracing::info!("Requesting an ID token from {}", config.issuer);
    commands::generate::run_generate(config).await
}

/// Initialize tracing subscriber with environment filter
///
/// Logs go to stderr so stdout only ever carries the token.
fn init_tracing(verbose: bool) {
    let default_level = if verbose {
        "id_token_generator=debug"
    } else {
        "id_token_generator=warn"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
