//! Release metadata lookup and platform asset selection.

use reqwest::Client;
use reqwest::header::{ACCEPT, USER_AGENT};
use serde::Deserialize;
use tracing::debug;

/// Release metadata as served by the GitHub releases API.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Release {
    #[serde(default)]
    pub tag_name: Option<String>,
    pub assets: Vec<ReleaseAsset>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ReleaseAsset {
    pub name: String,
    pub browser_download_url: String,
}

/// Fetch and parse release metadata from one endpoint.
pub(crate) async fn fetch_release(
    client: &Client,
    endpoint: &str,
    user_agent: &str,
) -> Result<Release, reqwest::Error> {
    debug!(endpoint, "Fetching release metadata");
    client
        .get(endpoint)
        .header(USER_AGENT, user_agent)
        .header(ACCEPT, "application/vnd.github+json")
        .send()
        .await?
        .error_for_status()?
        .json::<Release>()
        .await
}

/// Pick the asset for the first pattern that matches anything.
///
/// Patterns are tried in order and compared case-insensitively as substrings
/// of the asset name, so an earlier pattern wins even when a later pattern
/// matches an asset listed first.
pub(crate) fn match_asset<'a>(
    assets: &'a [ReleaseAsset],
    patterns: &[String],
) -> Option<&'a ReleaseAsset> {
    patterns.iter().find_map(|pattern| {
        let pattern = pattern.to_lowercase();
        assets
            .iter()
            .find(|asset| asset.name.to_lowercase().contains(&pattern))
    })
}

/// Default asset name patterns for the running platform, best first.
pub fn platform_asset_patterns() -> Vec<String> {
    let patterns: &[&str] = if cfg!(target_os = "macos") {
        if cfg!(target_arch = "aarch64") {
            &["macos-arm64"]
        } else {
            &["macos-x64"]
        }
    } else if cfg!(target_os = "windows") {
        if cfg!(target_arch = "aarch64") {
            &["win-cpu-arm64", "win-arm64"]
        } else {
            &["win-cuda", "win-vulkan-x64", "win-avx2-x64", "win-cpu-x64"]
        }
    } else if cfg!(target_arch = "aarch64") {
        &["ubuntu-arm64", "linux-arm64"]
    } else {
        &["ubuntu-vulkan-x64", "ubuntu-x64", "linux-x64"]
    };

    patterns.iter().map(|p| (*p).to_string()).collect()
}
