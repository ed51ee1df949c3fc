//! OpenID Connect implicit flow
//!
//! # Module Layout
//!
//! - [`discovery`]     -- fetch the provider's discovery document
//! - [`authorization`] -- build the authorization URL (nonce, state, scopes)
//! - [`callback`]      -- local HTTPS listener receiving the `form_post` redirect

pub mod authorization;
pub mod callback;
pub mod discovery;
