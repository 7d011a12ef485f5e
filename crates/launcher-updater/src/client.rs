//! HTTP client for the update server's JSON documents.

use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};

use crate::config::endpoint;
use crate::error::{Result, UpdateError};
use crate::manifest::{LauncherDescriptor, RemoteManifest};

/// Manifest endpoint, relative to the base URL.
pub const MANIFEST_PATH: &str = "update.json";

/// Launcher descriptor endpoint, relative to the base URL.
pub const LAUNCHER_DESCRIPTOR_PATH: &str = "launcher_update.json";

/// Directory of patch archives, relative to the base URL.
pub const UPDATES_PATH: &str = "updates";

/// Directory of launcher executables, relative to the base URL.
pub const LAUNCHER_UPDATES_PATH: &str = "launcher_updates";

/// Client for one update server.
///
/// No retries happen here; a failed request fails the current cycle.
#[derive(Debug, Clone)]
pub struct UpdateClient {
    client: reqwest::Client,
    base_url: String,
}

impl UpdateClient {
    /// Creates a client for the given base URL.
    pub fn new(base_url: impl Into<String>, user_agent: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let agent = HeaderValue::from_str(user_agent)
            .map_err(|e| UpdateError::Config(format!("invalid user agent: {e}")))?;
        headers.insert(USER_AGENT, agent);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| UpdateError::Network(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// The server base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The underlying HTTP client, shared with downloads.
    #[must_use]
    pub fn http(&self) -> &reqwest::Client {
        &self.client
    }

    /// URL of a patch archive.
    #[must_use]
    pub fn patch_url(&self, file_name: &str) -> String {
        endpoint(&self.base_url, &format!("{UPDATES_PATH}/{file_name}"))
    }

    /// URL of the helper executable.
    #[must_use]
    pub fn helper_url(&self, helper_file_name: &str) -> String {
        endpoint(&self.base_url, helper_file_name)
    }

    /// Fetches the game update manifest.
    pub async fn fetch_manifest(&self) -> Result<RemoteManifest> {
        let body = self.get_text(MANIFEST_PATH).await?;
        let manifest = RemoteManifest::from_json(&body)?;
        tracing::debug!(
            "Manifest: latest {} with {} update(s)",
            manifest.latest_version,
            manifest.updates.len()
        );
        Ok(manifest)
    }

    /// Fetches the launcher's own version descriptor.
    pub async fn fetch_launcher_descriptor(&self) -> Result<LauncherDescriptor> {
        let body = self.get_text(LAUNCHER_DESCRIPTOR_PATH).await?;
        LauncherDescriptor::from_json(&body)
    }

    async fn get_text(&self, path: &str) -> Result<String> {
        let url = endpoint(&self.base_url, path);
        tracing::debug!("Fetching {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(UpdateError::Manifest(format!("{path} not found on server")));
        }
        if !status.is_success() {
            return Err(UpdateError::Network(format!(
                "server returned {status} for {path}"
            )));
        }

        Ok(response.text().await?)
    }
}
