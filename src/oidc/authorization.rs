//! Authorization request construction for the implicit flow
//!
//! Builds the URL the browser is sent to. The request asks for an
//! `id_token` delivered through `form_post`, carries a fresh nonce and a
//! `state` value, and always requests the `openid` scope first.
//!
//! No network traffic happens here.

use base64::Engine as _;
use url::Url;

use crate::error::{IdTokenError, Result};

/// `response_type` requested from the provider.
pub const RESPONSE_TYPE: &str = "id_token";

/// `response_mode` requested from the provider.
pub const RESPONSE_MODE: &str = "form_post";

/// Scope that is always requested, and always first.
pub const OPENID_SCOPE: &str = "openid";

/// Random bytes behind each nonce (256 bits).
const NONCE_BYTES: usize = 32;

/// Random bytes behind a generated state value.
const STATE_BYTES: usize = 16;

/// A single authorization request of the implicit flow.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use id_token_generator::oidc::authorization::AuthorizationRequest;
///
/// let request = AuthorizationRequest::new(
///     Url::parse("https://auth.example.com/authorize").unwrap(),
///     "my-client",
///     &["email".to_string()],
///     Url::parse("https://localhost:4553/callback").unwrap(),
///     "xyz",
/// );
///
/// let url = request.to_url();
/// assert!(url.as_str().contains("response_mode=form_post"));
/// assert_eq!(request.scopes().join(" "), "openid email");
/// assert_eq!(request.state(), "xyz");
/// ```
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    authorization_endpoint: Url,
    client_id: String,
    scopes: Vec<String>,
    redirect_uri: Url,
    nonce: String,
    state: String,
}

impl AuthorizationRequest {
    /// Creates a request with a freshly generated nonce.
    ///
    /// `scopes` lists the extra scopes; they are normalized with
    /// [`normalize_scopes`].
    pub fn new(
        authorization_endpoint: Url,
        client_id: &str,
        scopes: &[String],
        redirect_uri: Url,
        state: &str,
    ) -> Self {
        Self {
            authorization_endpoint,
            client_id: client_id.to_string(),
            scopes: normalize_scopes(scopes),
            redirect_uri,
            nonce: generate_nonce(),
            state: state.to_string(),
        }
    }

    /// The nonce sent with this request.
    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    /// The state sent with this request.
    pub fn state(&self) -> &str {
        &self.state
    }

    /// The normalized scope list, `openid` first.
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// The redirect URI registered with this request.
    pub fn redirect_uri(&self) -> &Url {
        &self.redirect_uri
    }

    /// Renders the full authorization URL.
    ///
    /// Query parameters already present on the endpoint are preserved and
    /// the request parameters are appended after them.
    pub fn to_url(&self) -> Url {
        let mut url = self.authorization_endpoint.clone();
        url.query_pairs_mut()
            .append_pair("response_type", RESPONSE_TYPE)
            .append_pair("client_id", &self.client_id)
            .append_pair("scope", &self.scopes.join(" "))
            .append_pair("redirect_uri", self.redirect_uri.as_str())
            .append_pair("response_mode", RESPONSE_MODE)
            .append_pair("nonce", &self.nonce)
            .append_pair("state", &self.state);
        url
    }
}

/// Puts `openid` first and drops blanks and duplicates, keeping order.
pub fn normalize_scopes(extra: &[String]) -> Vec<String> {
    let mut scopes = vec![OPENID_SCOPE.to_string()];
    for scope in extra.iter().flat_map(|s| s.split_whitespace()) {
        if !scopes.iter().any(|existing| existing == scope) {
            scopes.push(scope.to_string());
        }
    }
    scopes
}

/// Renders `https://localhost:{port}/{endpoint}`.
///
/// The listener binds `127.0.0.1`; the advertised host is still `localhost`.
///
/// # Errors
///
/// Returns [`IdTokenError::Config`] if the endpoint produces an invalid URL.
pub fn redirect_uri(port: u16, endpoint: &str) -> Result<Url> {
    let endpoint = endpoint.trim_matches('/');
    Url::parse(&format!("https://localhost:{port}/{endpoint}"))
        .map_err(|e| IdTokenError::Config(format!("invalid redirect URI: {e}")).into())
}

/// Generates a nonce: 32 CSPRNG bytes, base64url without padding.
///
/// The alphabet (`A-Z a-z 0-9 - _`) never needs percent-encoding.
pub fn generate_nonce() -> String {
    random_token(NONCE_BYTES)
}

/// Generates a random `state` value: 16 CSPRNG bytes, base64url without padding.
pub fn generate_state() -> String {
    random_token(STATE_BYTES)
}

fn random_token(len: usize) -> String {
    use rand::RngCore as _;
    let mut bytes = vec![0u8; len];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}
