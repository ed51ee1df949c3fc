//! OpenID Connect discovery
//!
//! Fetches the provider metadata document published at
//! `{issuer}/.well-known/openid-configuration` and extracts the
//! authorization endpoint used to start the implicit flow.
//!
//! # References
//!
//! - OpenID Connect Discovery 1.0 <https://openid.net/specs/openid-connect-discovery-1_0.html>

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{IdTokenError, Result};

/// Well-known path of the discovery document, appended to the issuer.
pub const WELL_KNOWN_PATH: &str = "/.well-known/openid-configuration";

/// Metadata document describing an OpenID Connect provider.
///
/// Only `authorization_endpoint` is consumed by this tool. All other keys are
/// kept in [`Self::extra`] so they can be logged for diagnostics.
///
/// # Examples
///
/// ```
/// use id_token_generator::oidc::discovery::DiscoveryDocument;
///
/// let json = r#"{
///     "issuer": "https://auth.example.com",
///     "authorization_endpoint": "https://auth.example.com/authorize",
///     "jwks_uri": "https://auth.example.com/keys"
/// }"#;
///
/// let doc: DiscoveryDocument = serde_json::from_str(json).unwrap();
/// assert_eq!(
///     doc.authorization_endpoint().unwrap().as_str(),
///     "https://auth.example.com/authorize"
/// );
/// assert!(doc.extra.contains_key("jwks_uri"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryDocument {
    /// The issuer identifier, when the provider publishes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,

    /// URL of the authorization endpoint (OpenID Connect Core section 3.1.2).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_endpoint: Option<serde_json::Value>,

    /// Additional provider metadata not modelled above.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl DiscoveryDocument {
    /// Returns the authorization endpoint as an absolute URL.
    ///
    /// # Errors
    ///
    /// Returns [`IdTokenError::Discovery`] when the key is absent, is not a
    /// string, or does not parse as an absolute URL.
    pub fn authorization_endpoint(&self) -> Result<Url> {
        let raw = match &self.authorization_endpoint {
            Some(serde_json::Value::String(s)) => s,
            Some(other) => {
                return Err(IdTokenError::Discovery(format!(
                    "authorization_endpoint is not a string: {other}"
                ))
                .into())
            }
            None => {
                return Err(IdTokenError::Discovery(
                    "discovery document has no authorization_endpoint".to_string(),
                )
                .into())
            }
        };

        Url::parse(raw).map_err(|e| {
            IdTokenError::Discovery(format!("invalid authorization_endpoint {raw}: {e}")).into()
        })
    }
}

/// Builds the discovery document URL for an issuer.
///
/// The well-known suffix is appended to the issuer path, so an issuer with a
/// path component (`https://host/realms/dev`) yields
/// `https://host/realms/dev/.well-known/openid-configuration`. A trailing
/// `/` on the issuer is ignored.
///
/// # Errors
///
/// Returns [`IdTokenError::Discovery`] when the result is not a valid URL.
pub fn discovery_url(issuer: &str) -> Result<Url> {
    let base = issuer.trim_end_matches('/');
    Url::parse(&format!("{base}{WELL_KNOWN_PATH}"))
        .map_err(|e| IdTokenError::Discovery(format!("invalid issuer URL {issuer}: {e}")).into())
}

/// Fetches and parses the discovery document of `issuer`.
///
/// # Errors
///
/// Returns [`IdTokenError::Discovery`] if the request fails, the server
/// answers with a non-success status, or the body is not a JSON object.
pub async fn fetch_discovery_document(
    http: &reqwest::Client,
    issuer: &str,
) -> Result<DiscoveryDocument> {
    let url = discovery_url(issuer)?;
    tracing::debug!("Fetching discovery document from {}", url);

    let resp = http
        .get(url.clone())
        .send()
        .await
        .map_err(|e| IdTokenError::Discovery(format!("request to {url} failed: {e}")))?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(IdTokenError::Discovery(format!("{url} returned {status}: {body}")).into());
    }

    let document: DiscoveryDocument = resp.json().await.map_err(|e| {
        IdTokenError::Discovery(format!("failed to parse discovery document: {e}"))
    })?;

    tracing::debug!(?document, "Discovery document retrieved");
    Ok(document)
}

/// Discovers the authorization endpoint of `issuer`.
///
/// # Examples
///
/// ```no_run
/// use id_token_generator::oidc::discovery::discover_authorization_endpoint;
///
/// # async fn example() -> id_token_generator::error::Result<()> {
/// let http = reqwest::Client::new();
/// let endpoint = discover_authorization_endpoint(&http, "https://accounts.google.com").await?;
/// println!("authorize at {endpoint}");
/// # Ok(())
/// # }
/// ```
pub async fn discover_authorization_endpoint(http: &reqwest::Client, issuer: &str) -> Result<Url> {
    fetch_discovery_document(http, issuer)
        .await?
        .authorization_endpoint()
}
