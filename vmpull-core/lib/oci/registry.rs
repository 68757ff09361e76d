//! HTTP client for the GitHub Container Registry's anonymous-token OCI distribution API.

use std::{path::Path, time::Duration};

use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use serde::Deserialize;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};

use crate::{oci::model::Manifest, VmPullError, VmPullResult};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Base URL for the GitHub Container Registry API.
const GHCR_REGISTRY_URL: &str = "https://ghcr.io";

/// Endpoint for acquiring anonymous pull tokens.
const GHCR_AUTH_REALM: &str = "https://ghcr.io/token";

/// Per-HTTP-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Per-blob resource timeout, covering the whole download including retries.
const RESOURCE_TIMEOUT: Duration = Duration::from_secs(3600);

/// Header carrying the manifest's content digest, used as the manifest-id.
const DOCKER_CONTENT_DIGEST_HEADER: &str = "Docker-Content-Digest";

/// Seconds to sleep per retry attempt is `attempt * RETRY_BACKOFF_SECS`.
const RETRY_BACKOFF_SECS: u64 = 5;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A client for GHCR's anonymous-token OCI distribution API.
///
/// Holds a single shared [`ClientWithMiddleware`] reused across every call; callers are expected
/// to construct one `RegistryClient` and share it across a pull.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    http: ClientWithMiddleware,
    pub(crate) registry_url: String,
    pub(crate) auth_realm: String,
    registry_domain: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl RegistryClient {
    /// Creates a new registry client for the given registry domain (e.g. `ghcr.io`).
    ///
    /// Retries live solely in [`Self::download_blob`]'s manual attempt loop; the HTTP client
    /// itself carries no retry middleware, so the two don't stack.
    pub fn new(registry_domain: impl Into<String>) -> Self {
        let http = ClientBuilder::new(Client::new()).build();

        Self {
            http,
            registry_url: GHCR_REGISTRY_URL.to_string(),
            auth_realm: GHCR_AUTH_REALM.to_string(),
            registry_domain: registry_domain.into(),
        }
    }

    /// Acquires an anonymous bearer token scoped to `pull` on the given repository.
    #[tracing::instrument(skip(self))]
    pub async fn acquire_token(&self, repository: &str) -> VmPullResult<String> {
        let request = self
            .http
            .get(&self.auth_realm)
            .query(&[
                ("service", self.registry_domain.as_str()),
                ("scope", &format!("repository:{repository}:pull")),
            ])
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| VmPullError::TokenFetchFailed(e.to_string()))?;

        tracing::debug!(%repository, "requesting registry token");

        let response = self
            .http
            .execute(request)
            .await
            .map_err(|e| VmPullError::TokenFetchFailed(e.to_string()))?;

        if !response.status().is_success() {
            tracing::warn!(%repository, status = %response.status(), "token request failed");
            return Err(VmPullError::TokenFetchFailed(repository.to_string()));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| VmPullError::TokenFetchFailed(e.to_string()))?;

        body.token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| VmPullError::TokenFetchFailed(repository.to_string()))
    }

    /// Fetches the manifest for `repository:tag`, returning the parsed manifest and its
    /// server-reported digest (the manifest-id source).
    #[tracing::instrument(skip(self, token))]
    pub async fn fetch_manifest(
        &self,
        repository: &str,
        tag: &str,
        token: &str,
    ) -> VmPullResult<(Manifest, String)> {
        let request = self
            .http
            .get(format!(
                "{}/v2/{}/manifests/{}",
                self.registry_url, repository, tag
            ))
            .bearer_auth(token)
            .header("Accept", "application/vnd.oci.image.manifest.v1+json")
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| VmPullError::ManifestFetchFailed(e.to_string()))?;

        tracing::debug!(%repository, %tag, "fetching manifest");

        let response = self
            .http
            .execute(request)
            .await
            .map_err(|e| VmPullError::ManifestFetchFailed(e.to_string()))?;

        if !response.status().is_success() {
            tracing::warn!(%repository, %tag, status = %response.status(), "manifest fetch failed");
            return Err(VmPullError::ManifestFetchFailed(format!(
                "{repository}:{tag}"
            )));
        }

        let digest = response
            .headers()
            .get(DOCKER_CONTENT_DIGEST_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                VmPullError::ManifestFetchFailed(format!(
                    "{repository}:{tag} missing {DOCKER_CONTENT_DIGEST_HEADER}"
                ))
            })?;

        let manifest: Manifest = response
            .json()
            .await
            .map_err(|e| VmPullError::ManifestFetchFailed(e.to_string()))?;

        Ok((manifest, digest))
    }

    /// Downloads a blob to `destination`, retrying up to `max_retries` times on failure.
    ///
    /// The response is streamed to a sibling temporary file and atomically renamed into place
    /// only once the download completes, so `destination` is never observed half-written.
    #[tracing::instrument(skip(self, token))]
    pub async fn download_blob(
        &self,
        repository: &str,
        digest: &str,
        media_type: &str,
        token: &str,
        destination: &Path,
        max_retries: u32,
    ) -> VmPullResult<()> {
        let url = format!("{}/v2/{}/blobs/{}", self.registry_url, repository, digest);

        for attempt in 1..=max_retries {
            match self
                .try_download_blob(&url, media_type, token, destination)
                .await
            {
                Ok(()) => return Ok(()),
                Err(err) if attempt < max_retries => {
                    tracing::warn!(
                        %digest,
                        attempt,
                        %err,
                        "blob download attempt failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_secs(attempt as u64 * RETRY_BACKOFF_SECS))
                        .await;
                }
                Err(err) => {
                    tracing::warn!(%digest, attempt, %err, "blob download exhausted retries");
                    return Err(VmPullError::LayerDownloadFailed(digest.to_string()));
                }
            }
        }

        Err(VmPullError::LayerDownloadFailed(digest.to_string()))
    }

    async fn try_download_blob(
        &self,
        url: &str,
        media_type: &str,
        token: &str,
        destination: &Path,
    ) -> anyhow::Result<()> {
        let request = self
            .http
            .get(url)
            .bearer_auth(token)
            .header("Accept", media_type)
            .timeout(RESOURCE_TIMEOUT)
            .build()?;

        let response = self.http.execute(request).await?;
        if !response.status().is_success() {
            anyhow::bail!("unexpected status {}", response.status());
        }

        let temp_path = destination.with_extension("part");
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = File::create(&temp_path).await?;
        let bytes = response.bytes().await?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        drop(file);

        fs::rename(&temp_path, destination).await?;
        Ok(())
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
