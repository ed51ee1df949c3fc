//! Delivery of the callback result
//!
//! A token is written, followed by a newline, either to the configured
//! output file (overwriting it) or to stdout. A provider error turns into an
//! [`IdTokenError::Provider`] and nothing is written anywhere.

use std::io::Write;
use std::path::Path;

use crate::error::{IdTokenError, Result};
use crate::oidc::callback::{CallbackResult, FormParams};

/// Writes a token result to `outfile` or stdout.
///
/// # Errors
///
/// Returns [`IdTokenError::Provider`] for an `Error` result, with the
/// provider's parameters rendered as JSON, or an IO error if writing fails.
pub fn deliver(result: CallbackResult, outfile: Option<&Path>) -> Result<()> {
    match result {
        CallbackResult::Token(token) => match outfile {
            Some(path) => write_token_file(&token, path),
            None => {
                let stdout = std::io::stdout();
                let mut handle = stdout.lock();
                write_token(&token, &mut handle)
            }
        },
        CallbackResult::Error(params) => {
            Err(IdTokenError::Provider(render_params(&params)).into())
        }
    }
}

/// Writes `token` and a trailing newline to `writer`.
pub fn write_token<W: Write>(token: &str, writer: &mut W) -> Result<()> {
    writeln!(writer, "{token}")?;
    writer.flush()?;
    Ok(())
}

/// Creates or truncates `path` and writes `token` followed by a newline.
pub fn write_token_file(token: &str, path: &Path) -> Result<()> {
    let mut file = std::fs::File::create(path).map_err(|e| {
        IdTokenError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to create {}: {e}", path.display()),
        ))
    })?;
    write_token(token, &mut file)?;
    tracing::info!("ID token written to {}", path.display());
    Ok(())
}

fn render_params(params: &FormParams) -> String {
    serde_json::to_string(params).unwrap_or_else(|_| format!("{params:?}"))
}
