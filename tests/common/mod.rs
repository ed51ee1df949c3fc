use std::path::PathBuf;
use std::time::Duration;

use tempfile::TempDir;

/// Writes a self-signed `localhost` certificate plus key into one PEM file.
#[allow(dead_code)]
pub fn write_self_signed_pem(dir: &TempDir) -> PathBuf {
    let certified = rcgen::generate_simple_self_signed(vec![
        "localhost".to_string(),
        "127.0.0.1".to_string(),
    ])
    .expect("failed to generate certificate");

    let mut pem = certified.cert.pem();
    pem.push_str(&certified.key_pair.serialize_pem());

    let path = dir.path().join("server.pem");
    std::fs::write(&path, pem).expect("failed to write PEM file");
    path
}

/// HTTPS client that trusts the self-signed test certificate.
#[allow(dead_code)]
pub fn insecure_client() -> reqwest::Client {
    reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .timeout(Duration::from_secs(10))
        .build()
        .expect("failed to build reqwest client")
}

/// Asks the OS for a port that is free right now.
#[allow(dead_code)]
pub fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .expect("failed to bind ephemeral port")
        .local_addr()
        .expect("failed to read local address")
        .port()
}

/// POSTs a form body, retrying while the listener is still starting up.
#[allow(dead_code)]
pub async fn post_form_with_retry(
    client: &reqwest::Client,
    url: &str,
    body: &str,
) -> reqwest::Response {
    let mut last_error = None;
    for _ in 0..100 {
        match client
            .post(url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body.to_string())
            .send()
            .await
        {
            Ok(resp) => return resp,
            Err(e) => {
                last_error = Some(e);
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }
    panic!("callback listener never became reachable: {last_error:?}");
}

/// Minimal discovery document pointing at `base_url`.
#[allow(dead_code)]
pub fn discovery_body(base_url: &str) -> serde_json::Value {
    serde_json::json!({
        "issuer": base_url,
        "authorization_endpoint": format!("{}/authorize", base_url),
        "response_types_supported": ["id_token"],
        "response_modes_supported": ["form_post"]
    })
}
