//! Command-line interface definition for id-token-generator
//!
//! This module defines the CLI structure using clap's derive API. Flags that
//! have a configured default are `Option`s here so that the config layer can
//! tell "not given" apart from "given with the default value".

use clap::Parser;
use std::path::PathBuf;

/// Obtain an OpenID Connect ID token through the implicit grant flow.
///
/// Opens the issuer's authorization page in the browser, receives the
/// `form_post` redirect on a local HTTPS listener and prints the ID token.
///
/// Example:
///   id-token-generator https://accounts.google.com xxx-client-id --scopes profile email
#[derive(Parser, Debug, Clone)]
#[command(name = "id-token-generator")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// The OpenID Connect issuer
    pub issuer: String,

    /// The OpenID Connect client_id of the Relying Party
    pub client_id: String,

    /// The port used to receive the ID token redirect response [default: 4553]
    #[arg(short, long)]
    pub port: Option<u16>,

    /// The endpoint used to receive the ID token redirect response [default: callback]
    #[arg(short, long)]
    pub endpoint: Option<String>,

    /// PEM file holding the certificate and private key of the local server
    /// [default: ./cert/server.pem]
    #[arg(short, long)]
    pub key: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Output file for the ID token (stdout when omitted)
    #[arg(short, long)]
    pub outfile: Option<PathBuf>,

    /// The server's polling interval in seconds [default: 1]
    #[arg(long = "poll_interval", alias = "poll-interval")]
    pub poll_interval: Option<u64>,

    /// Additional scopes to request; `openid` is always requested first
    #[arg(short, long, num_args = 1..)]
    pub scopes: Vec<String>,

    /// Give up after waiting this many seconds for the redirect
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Explicit `state` value to send (random when omitted)
    #[arg(long)]
    pub state: Option<String>,

    /// Reject callbacks whose `state` does not match the one sent
    #[arg(long)]
    pub verify_state: bool,

    /// Print the authorization URL without launching a browser
    #[arg(long)]
    pub no_browser: bool,

    /// Path to an optional YAML configuration file
    #[arg(short, long)]
    pub config: Option<String>,
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
