//! Top-level `pull` orchestration: registry, cache, scheduler, reassembler and materializer
//! wired together into a single end-to-end operation.

use std::str::FromStr;

use tempfile::TempDir;
use tokio::fs;
use vmpull_utils::{digest_to_filename, CONFIG_FILENAME, DISK_IMAGE_FILENAME, NVRAM_FILENAME};

use crate::{
    oci::{
        cache::CacheStore,
        materialize,
        memory,
        model::Layer,
        reassemble::reassemble,
        reference::ImageReference,
        registry::RegistryClient,
        scheduler::{classify, part_result, DownloadScheduler, LayerClass, PartSource, Progress},
    },
    vmdir::{VmDirectory, VmDirectoryProvider},
    VmPullResult,
};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Pulls `image` (`repository:tag`) into the cache and materializes it as a VM directory.
///
/// `name` overrides the VM directory's name (defaults to the repository). `location` selects a
/// named VM root from [`VmDirectoryProvider`]; `None` uses the default root.
///
/// The single-flight coordinator is not a parameter here: it lives inside `scheduler`, shared
/// across every pull in the process.
#[allow(clippy::too_many_arguments)]
#[tracing::instrument(skip(registry, cache, scheduler, vmdir))]
pub async fn pull(
    image: &str,
    name: Option<&str>,
    location: Option<&str>,
    registry: &RegistryClient,
    cache: &CacheStore,
    scheduler: &DownloadScheduler,
    vmdir: &dyn VmDirectoryProvider,
) -> VmPullResult<VmDirectory> {
    let reference = ImageReference::from_str(image)?;
    let repository = reference.repository();
    let tag = reference.tag();
    let org = reference.organization();
    let vm_name = name.unwrap_or(repository);

    let vm_directory = vmdir.get_vm_directory(vm_name, location)?;

    let token = registry.acquire_token(repository).await?;
    let (manifest, digest) = registry.fetch_manifest(repository, tag, &token).await?;
    let manifest_id = digest_to_filename(&digest);

    let staging = TempDir::new()?;
    let staging_dir = staging.path().to_path_buf();

    if cache.validate(org, &manifest, &manifest_id).await {
        tracing::info!(%repository, %manifest_id, "cache hit, reassembling from cached layers");
        copy_cached_layers_into_staging(cache, org, &manifest_id, &manifest.layers, &staging_dir)
            .await?;
    } else {
        tracing::info!(%repository, %manifest_id, "cache miss, downloading layers");
        cache.cleanup_old_versions(org, repository, &manifest_id).await?;
        cache.prepare(org, &manifest_id, &manifest, repository).await?;

        let memory_constrained = memory::memory_constrained();
        let progress = Progress::new();

        let outcome = scheduler
            .schedule(
                org,
                repository,
                &manifest_id,
                &token,
                &manifest.layers,
                &staging_dir,
                memory_constrained,
                &progress,
            )
            .await?;

        if let Some(total_parts) = outcome.total_parts {
            let disk_image_path = staging_dir.join(DISK_IMAGE_FILENAME);
            let expected_size = expected_disk_size(&manifest.layers);
            reassemble(&outcome.disk_parts, total_parts, &disk_image_path, expected_size).await?;
        }
    }

    materialize::install(&staging_dir, &vm_directory.path).await?;

    Ok(vm_directory)
}

/// Copies a validated cache hit's layers into `staging_dir`, ready for [`materialize::install`].
///
/// Disk parts are reassembled directly from their cached locations; non-part files are copied
/// to their well-known staging filenames.
async fn copy_cached_layers_into_staging(
    cache: &CacheStore,
    org: &str,
    manifest_id: &str,
    layers: &[Layer],
    staging_dir: &std::path::Path,
) -> VmPullResult<()> {
    let mut disk_parts = Vec::new();
    let mut total_parts = None;

    for layer in layers {
        let class = classify(layer);
        let cached_path = cache.layer_path(org, manifest_id, &layer.digest);

        match &class {
            LayerClass::Empty | LayerClass::Ignored => continue,
            LayerClass::DiskPart { total_parts: tp, .. } => {
                total_parts = Some(*tp);
                if let Some((part_num, source)) = part_result(&class, PartSource::Cached(cached_path)) {
                    disk_parts.push((part_num, source));
                }
            }
            LayerClass::Disk => {
                fs::copy(&cached_path, staging_dir.join(DISK_IMAGE_FILENAME)).await?;
            }
            LayerClass::Config => {
                fs::copy(&cached_path, staging_dir.join(CONFIG_FILENAME)).await?;
            }
            LayerClass::Nvram => {
                fs::copy(&cached_path, staging_dir.join(NVRAM_FILENAME)).await?;
            }
        }
    }

    if let Some(total_parts) = total_parts {
        let disk_image_path = staging_dir.join(DISK_IMAGE_FILENAME);
        let expected_size = expected_disk_size(layers);
        reassemble(&disk_parts, total_parts, &disk_image_path, expected_size).await?;
    }

    Ok(())
}

fn expected_disk_size(layers: &[Layer]) -> u64 {
    layers
        .iter()
        .filter(|layer| matches!(classify(layer), LayerClass::DiskPart { .. } | LayerClass::Disk))
        .map(|layer| layer.size)
        .sum()
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oci::singleflight::SingleFlight;
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir as TestTempDir;
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    struct FixedVmDirectories {
        root: std::path::PathBuf,
    }

    impl VmDirectoryProvider for FixedVmDirectories {
        fn get_vm_directory(
            &self,
            name: &str,
            _location: Option<&str>,
        ) -> VmPullResult<VmDirectory> {
            Ok(VmDirectory {
                path: self.root.join(name),
            })
        }

        fn create_temp_vm_directory(&self) -> VmPullResult<VmDirectory> {
            Ok(VmDirectory {
                path: self.root.join(".staging"),
            })
        }
    }

    #[tokio::test]
    async fn pull_rejects_invalid_image_format() {
        let cache_dir = TestTempDir::new().unwrap();
        let vms_dir = TestTempDir::new().unwrap();

        let registry = RegistryClient::new("ghcr.io");
        let cache = CacheStore::new(cache_dir.path());
        let scheduler = DownloadScheduler::new(
            Arc::new(registry.clone()),
            Arc::new(cache.clone()),
            Arc::new(SingleFlight::new()),
        );
        let vmdir = FixedVmDirectories {
            root: vms_dir.path().to_path_buf(),
        };

        let err = pull(
            "not-a-valid-reference",
            None,
            None,
            &registry,
            &cache,
            &scheduler,
            &vmdir,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, crate::VmPullError::InvalidImageFormat(_)));
    }

    #[tokio::test]
    async fn pull_downloads_and_materializes_a_single_layer_disk_image() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "tok" })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/org/app/manifests/latest"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Docker-Content-Digest", "sha256:deadbeef")
                    .set_body_json(json!({
                        "schemaVersion": 2,
                        "mediaType": "application/vnd.oci.image.manifest.v1+json",
                        "layers": [{
                            "mediaType": "application/vnd.oci.image.layer.v1.tar",
                            "digest": "sha256:diskdigest",
                            "size": 4,
                        }],
                    })),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/org/app/blobs/sha256:diskdigest"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"disk".to_vec()))
            .mount(&server)
            .await;

        let cache_dir = TestTempDir::new().unwrap();
        let vms_dir = TestTempDir::new().unwrap();

        let mut registry = RegistryClient::new("ghcr.io");
        registry.registry_url = server.uri();
        registry.auth_realm = format!("{}/token", server.uri());

        let cache = CacheStore::new(cache_dir.path());
        let scheduler = DownloadScheduler::new(
            Arc::new(registry.clone()),
            Arc::new(cache.clone()),
            Arc::new(SingleFlight::new()),
        );
        let vmdir = FixedVmDirectories {
            root: vms_dir.path().to_path_buf(),
        };

        let vm_directory = pull(
            "org/app:latest",
            None,
            None,
            &registry,
            &cache,
            &scheduler,
            &vmdir,
        )
        .await
        .unwrap();

        assert_eq!(
            fs::read(vm_directory.path.join(DISK_IMAGE_FILENAME)).await.unwrap(),
            b"disk"
        );
        assert!(cache
            .layer_path("org", "sha256_deadbeef", "sha256:diskdigest")
            .exists());
    }

    fn manifest_with_parts(part_sizes: &[(&str, u64)]) -> serde_json::Value {
        let layers: Vec<_> = part_sizes
            .iter()
            .enumerate()
            .map(|(i, (digest, size))| {
                json!({
                    "mediaType": format!(
                        "application/vnd.oci.image.layer.v1.tar+part;part.number={};part.total={}",
                        i + 1,
                        part_sizes.len()
                    ),
                    "digest": digest,
                    "size": size,
                })
            })
            .collect();
        json!({
            "schemaVersion": 2,
            "mediaType": "application/vnd.oci.image.manifest.v1+json",
            "layers": layers,
        })
    }

    async fn mount_manifest_and_token(server: &MockServer, manifest: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "tok" })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/org/app/manifests/latest"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Docker-Content-Digest", "sha256:deadbeef")
                    .set_body_json(manifest),
            )
            .mount(server)
            .await;
    }

    fn client_with(server: &MockServer) -> RegistryClient {
        let mut registry = RegistryClient::new("ghcr.io");
        registry.registry_url = server.uri();
        registry.auth_realm = format!("{}/token", server.uri());
        registry
    }

    /// S2: a manifest of three disk parts reassembles into the exact concatenation.
    #[tokio::test]
    async fn pull_reassembles_multi_part_disk_image() {
        let server = MockServer::start().await;
        mount_manifest_and_token(
            &server,
            manifest_with_parts(&[
                ("sha256:part1", 10),
                ("sha256:part2", 20),
                ("sha256:part3", 30),
            ]),
        )
        .await;
        for (digest, body) in [
            ("sha256:part1", vec![1u8; 10]),
            ("sha256:part2", vec![2u8; 20]),
            ("sha256:part3", vec![3u8; 30]),
        ] {
            Mock::given(method("GET"))
                .and(path(format!("/v2/org/app/blobs/{digest}")))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
                .mount(&server)
                .await;
        }

        let cache_dir = TestTempDir::new().unwrap();
        let vms_dir = TestTempDir::new().unwrap();
        let registry = client_with(&server);
        let cache = CacheStore::new(cache_dir.path());
        let scheduler = DownloadScheduler::new(
            Arc::new(registry.clone()),
            Arc::new(cache.clone()),
            Arc::new(SingleFlight::new()),
        );
        let vmdir = FixedVmDirectories {
            root: vms_dir.path().to_path_buf(),
        };

        let vm_directory = pull("org/app:latest", None, None, &registry, &cache, &scheduler, &vmdir)
            .await
            .unwrap();

        let mut expected = vec![1u8; 10];
        expected.extend(vec![2u8; 20]);
        expected.extend(vec![3u8; 30]);
        assert_eq!(
            fs::read(vm_directory.path.join(DISK_IMAGE_FILENAME)).await.unwrap(),
            expected
        );
    }

    /// S3 / property #1: a second pull of a fully cached image performs no blob downloads and
    /// yields a byte-identical VM directory.
    #[tokio::test]
    async fn cached_repull_performs_no_further_blob_downloads() {
        let server = MockServer::start().await;
        mount_manifest_and_token(&server, manifest_with_parts(&[("sha256:part1", 5)])).await;
        Mock::given(method("GET"))
            .and(path("/v2/org/app/blobs/sha256:part1"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![9u8; 5]))
            .expect(1)
            .mount(&server)
            .await;

        let cache_dir = TestTempDir::new().unwrap();
        let vms_dir = TestTempDir::new().unwrap();
        let registry = client_with(&server);
        let cache = CacheStore::new(cache_dir.path());
        let scheduler = DownloadScheduler::new(
            Arc::new(registry.clone()),
            Arc::new(cache.clone()),
            Arc::new(SingleFlight::new()),
        );
        let vmdir = FixedVmDirectories {
            root: vms_dir.path().to_path_buf(),
        };

        let first = pull("org/app:latest", None, None, &registry, &cache, &scheduler, &vmdir)
            .await
            .unwrap();
        let second = pull("org/app:latest", None, None, &registry, &cache, &scheduler, &vmdir)
            .await
            .unwrap();

        let first_disk = fs::read(first.path.join(DISK_IMAGE_FILENAME)).await.unwrap();
        let second_disk = fs::read(second.path.join(DISK_IMAGE_FILENAME)).await.unwrap();
        assert_eq!(first_disk, second_disk);

        server.verify().await;
    }

    /// S4: deleting one cached part forces a redownload of exactly that part on the next pull.
    #[tokio::test]
    async fn stale_cache_redownloads_only_missing_part() {
        let server = MockServer::start().await;
        mount_manifest_and_token(
            &server,
            manifest_with_parts(&[("sha256:part1", 5), ("sha256:part2", 5)]),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/v2/org/app/blobs/sha256:part1"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 5]))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/org/app/blobs/sha256:part2"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![2u8; 5]))
            .expect(2)
            .mount(&server)
            .await;

        let cache_dir = TestTempDir::new().unwrap();
        let vms_dir = TestTempDir::new().unwrap();
        let registry = client_with(&server);
        let cache = CacheStore::new(cache_dir.path());
        let scheduler = DownloadScheduler::new(
            Arc::new(registry.clone()),
            Arc::new(cache.clone()),
            Arc::new(SingleFlight::new()),
        );
        let vmdir = FixedVmDirectories {
            root: vms_dir.path().to_path_buf(),
        };

        pull("org/app:latest", None, None, &registry, &cache, &scheduler, &vmdir)
            .await
            .unwrap();

        let part2_path = cache.layer_path("org", "sha256_deadbeef", "sha256:part2");
        fs::remove_file(&part2_path).await.unwrap();

        let vm_directory = pull("org/app:latest", None, None, &registry, &cache, &scheduler, &vmdir)
            .await
            .unwrap();

        let mut expected = vec![1u8; 5];
        expected.extend(vec![2u8; 5]);
        assert_eq!(
            fs::read(vm_directory.path.join(DISK_IMAGE_FILENAME)).await.unwrap(),
            expected
        );

        server.verify().await;
    }

    /// S5: pulling a newer manifest for the same repository leaves exactly one cache directory.
    #[tokio::test]
    async fn old_version_cleanup_keeps_only_latest_manifest() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "tok" })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/org/app/manifests/v1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Docker-Content-Digest", "sha256:aaa")
                    .set_body_json(manifest_with_parts(&[("sha256:part1", 4)])),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/org/app/manifests/v2"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Docker-Content-Digest", "sha256:bbb")
                    .set_body_json(manifest_with_parts(&[("sha256:part2", 4)])),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/org/app/blobs/sha256:part1"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 4]))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/org/app/blobs/sha256:part2"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![2u8; 4]))
            .mount(&server)
            .await;

        let cache_dir = TestTempDir::new().unwrap();
        let vms_dir = TestTempDir::new().unwrap();
        let registry = client_with(&server);
        let cache = CacheStore::new(cache_dir.path());
        let scheduler = DownloadScheduler::new(
            Arc::new(registry.clone()),
            Arc::new(cache.clone()),
            Arc::new(SingleFlight::new()),
        );
        let vmdir = FixedVmDirectories {
            root: vms_dir.path().to_path_buf(),
        };

        pull("org/app:v1", None, None, &registry, &cache, &scheduler, &vmdir)
            .await
            .unwrap();
        pull("org/app:v2", None, None, &registry, &cache, &scheduler, &vmdir)
            .await
            .unwrap();

        let mut org_entries = fs::read_dir(cache.org_dir("org")).await.unwrap();
        let mut remaining = Vec::new();
        while let Some(entry) = org_entries.next_entry().await.unwrap() {
            remaining.push(entry.file_name().to_string_lossy().to_string());
        }
        assert_eq!(remaining, vec!["sha256_bbb".to_string()]);
    }
}
