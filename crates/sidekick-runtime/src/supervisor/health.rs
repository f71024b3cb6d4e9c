//! Engine health probing.

use reqwest::Client;
use tracing::debug;

use super::config::ENGINE_HOST;

/// Health path served by the engine once it accepts requests.
pub const HEALTH_PATH: &str = "/health";

pub(crate) fn health_url(port: u16) -> String {
    format!("http://{ENGINE_HOST}:{port}{HEALTH_PATH}")
}

/// One health check. Only a 200 counts as healthy; the engine answers 503 while
/// the model is still loading.
pub(crate) async fn check(client: &Client, port: u16) -> bool {
    match client.get(health_url(port)).send().await {
        Ok(response) if response.status() == reqwest::StatusCode::OK => true,
        Ok(response) => {
            debug!(port, status = %response.status(), "Engine not ready yet");
            false
        }
        Err(e) => {
            debug!(port, error = %e, "Health check failed, retrying");
            false
        }
    }
}
