//! Test utilities for id-token-generator
//!
//! Helpers shared by unit tests: temporary TLS material for the callback
//! listener.

use std::path::PathBuf;
use tempfile::TempDir;

/// Write a self-signed `localhost` certificate and its private key into a
/// single PEM file inside `dir`
///
/// # Returns
///
/// Returns the path to the created PEM file
///
/// # Panics
///
/// Panics if generation or writing fails
pub fn write_self_signed_pem(dir: &TempDir) -> PathBuf {
    let certified = rcgen::generate_simple_self_signed(vec![
        "localhost".to_string(),
        "127.0.0.1".to_string(),
    ])
    .expect("Failed to generate self-signed certificate");

    let mut pem = certified.cert.pem();
    pem.push_str(&certified.key_pair.serialize_pem());

    let path = dir.path().join("server.pem");
    std::fs::write(&path, pem).expect("Failed to write PEM file");
    path
}
