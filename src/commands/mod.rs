/*!
Command handlers for the CLI

- `generate`: run the implicit flow once and deliver the ID token
- `browser`: open the authorization URL with the platform opener
*/

// Token generation command handler
pub mod generate {
    //! Runs one implicit-grant flow end to end.
    //!
    //! The listener is bound before the browser is opened, and the redirect
    //! URI uses the port it actually bound.

    use crate::config::Config;
    use crate::delivery;
    use crate::error::Result;
    use crate::oidc::authorization::{self, AuthorizationRequest};
    use crate::oidc::callback::{CallbackConfig, CallbackListener};
    use crate::oidc::discovery;

    /// Obtain an ID token as described by `config` and deliver it.
    ///
    /// # Arguments
    ///
    /// * `config` - Validated configuration
    ///
    /// # Errors
    ///
    /// Fails on discovery errors (before any listener or browser is
    /// started), TLS or bind errors, a provider error, a timeout, or a
    /// failure to write the token.
    pub async fn run_generate(config: Config) -> Result<()> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("id-token-generator/", env!("CARGO_PKG_VERSION")))
            .build()?;

        // Step 1: authorization endpoint from the discovery document.
        let authorization_endpoint =
            discovery::discover_authorization_endpoint(&http, &config.issuer).await?;
        tracing::debug!("Authorization endpoint: {}", authorization_endpoint);

        // Step 2: bind the callback listener.
        let state = config
            .state
            .clone()
            .unwrap_or_else(authorization::generate_state);
        tracing::debug!("Server key: {}", config.listener.key_path.display());
        let mut server = CallbackListener::new(CallbackConfig::from_config(&config, &state))
            .start()
            .await?;

        // Step 3: authorization request against the port actually bound.
        let redirect_uri =
            authorization::redirect_uri(server.local_addr().port(), config.endpoint_segment())?;
        let request = AuthorizationRequest::new(
            authorization_endpoint,
            &config.client_id,
            &config.scopes,
            redirect_uri,
            &state,
        );
        let auth_url = request.to_url();
        tracing::debug!(
            nonce = request.nonce(),
            state = request.state(),
            "Authorization request built"
        );

        // Step 4: hand the URL to the user agent.
        eprintln!(
            "Open the following URL in your browser to sign in:\n{}",
            auth_url
        );
        if config.open_browser {
            tracing::info!("Opening {}", auth_url);
            super::browser::try_open_browser(auth_url.as_str());
        }

        // Step 5: wait for the redirect, deliver, then stop the listener.
        let outcome = match server.wait_for_result(config.timeout()).await {
            Ok(result) => delivery::deliver(result, config.outfile.as_deref()),
            Err(e) => Err(e),
        };

        let stopped = server.shutdown().await;
        outcome.and(stopped)
    }
}

// Browser launch helper
pub mod browser {
    //! Opens a URL in the user's default browser.

    /// Attempts to open `url` in the default browser.
    ///
    /// Failures are logged and otherwise ignored; the URL has already been
    /// printed to stderr by the caller.
    pub fn try_open_browser(url: &str) {
        let result = opener_command(url).and_then(|mut cmd| cmd.spawn().ok());
        if result.is_none() {
            tracing::warn!("Could not launch a browser; open the URL manually");
        }
    }

    #[cfg(target_os = "macos")]
    fn opener_command(url: &str) -> Option<std::process::Command> {
        let mut cmd = std::process::Command::new("open");
        cmd.arg(url);
        Some(cmd)
    }

    #[cfg(target_os = "linux")]
    fn opener_command(url: &str) -> Option<std::process::Command> {
        let mut cmd = std::process::Command::new("xdg-open");
        cmd.arg(url);
        Some(cmd)
    }

    #[cfg(target_os = "windows")]
    fn opener_command(url: &str) -> Option<std::process::Command> {
        // `start` treats the first quoted argument as a window title.
        let mut cmd = std::process::Command::new("cmd");
        cmd.args(["/C", "start", ""]).arg(url);
        Some(cmd)
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    fn opener_command(_url: &str) -> Option<std::process::Command> {
        None
    }
}
