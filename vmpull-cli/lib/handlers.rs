//! Subcommand handlers, delegating to `vmpull-core`.

use std::sync::Arc;

use vmpull_core::{
    oci::{list_cached_images, CacheStore, DownloadScheduler, RegistryClient, SingleFlight},
    settings::{EnvSettings, Settings},
    vmdir::FsVmDirectories,
};
use vmpull_utils::term;

use crate::error::VmPullCliResult;

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Pulls `image` and materializes it as `name` (or the repository name) under `location`.
pub async fn pull_subcommand(
    image: String,
    name: Option<String>,
    location: Option<String>,
) -> VmPullCliResult<()> {
    let settings = EnvSettings;
    let cache_root = settings.cache_directory();
    let registry_domain = vmpull_utils::get_registry_domain();

    let registry = RegistryClient::new(registry_domain);
    let cache = CacheStore::new(cache_root);
    let single_flight = Arc::new(SingleFlight::new());
    let scheduler = DownloadScheduler::new(
        Arc::new(registry.clone()),
        Arc::new(cache.clone()),
        single_flight,
    );
    let vmdir = FsVmDirectories;

    let spinner = term::create_spinner(format!("pulling {image}"), None, None);

    let result = vmpull_core::oci::pull(
        &image,
        name.as_deref(),
        location.as_deref(),
        &registry,
        &cache,
        &scheduler,
        &vmdir,
    )
    .await;

    let vm_directory = match result {
        Ok(vm_directory) => {
            spinner.finish_with_message(format!("pulled {image}"));
            vm_directory
        }
        Err(err) => {
            term::finish_with_error(&spinner);
            return Err(err.into());
        }
    };

    println!("pulled {image} into {}", vm_directory.path.display());

    Ok(())
}

/// Lists every image currently present in the cache.
pub async fn list_subcommand() -> VmPullCliResult<()> {
    let settings = EnvSettings;
    let images = list_cached_images(&settings.cache_directory()).await?;

    if images.is_empty() {
        println!("no cached images");
        return Ok(());
    }

    println!("{:<30}  {:<14}  MANIFEST", "REPOSITORY", "IMAGE ID");
    for image in images {
        println!(
            "{:<30}  {:<14}  {}",
            image.repository, image.image_id, image.manifest_id
        );
    }

    Ok(())
}

/// Removes every cache entry belonging to `repository`.
pub async fn rm_subcommand(repository: String) -> VmPullCliResult<()> {
    let settings = EnvSettings;
    let cache = CacheStore::new(settings.cache_directory());

    let images = list_cached_images(&settings.cache_directory()).await?;
    let matching: Vec<_> = images
        .into_iter()
        .filter(|image| image.repository == repository)
        .collect();

    if matching.is_empty() {
        return Err(crate::error::VmPullCliError::NotFound(repository));
    }

    let org = repository.split('/').next().unwrap_or(&repository);
    // An empty "current" manifest id matches nothing, so every entry for this repository is removed.
    cache.cleanup_old_versions(org, &repository, "").await?;

    for image in &matching {
        tracing::info!(manifest_id = %image.manifest_id, %repository, "removed cache entry");
    }

    println!("removed {} cache entries for {repository}", matching.len());

    Ok(())
}
