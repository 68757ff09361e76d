//! Atomically installs a staged artifact tree into a destination VM directory.

use std::{future::Future, path::Path, pin::Pin};

use tokio::fs;

use crate::{VmPullError, VmPullResult};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Moves the fully-staged tree at `staging_dir` into `destination`, replacing any prior occupant.
///
/// The destination either does not exist or contains the complete new tree; it is never observed
/// half-written. Falls back to a recursive copy-then-delete when a native rename fails because
/// `staging_dir` and `destination` live on different filesystems.
#[tracing::instrument]
pub async fn install(staging_dir: &Path, destination: &Path) -> VmPullResult<()> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|_| VmPullError::DirectoryCreationFailed(parent.display().to_string()))?;
    }

    if destination.exists() {
        tracing::debug!(path = %destination.display(), "removing prior VM directory occupant");
        fs::remove_dir_all(destination).await?;
    }

    match fs::rename(staging_dir, destination).await {
        Ok(()) => Ok(()),
        Err(err) if is_cross_device(&err) => {
            tracing::debug!("staging and destination are on different filesystems, falling back to copy");
            copy_then_delete(staging_dir, destination).await
        }
        Err(err) => Err(err.into()),
    }
}

fn is_cross_device(err: &std::io::Error) -> bool {
    #[cfg(unix)]
    {
        err.raw_os_error() == Some(libc::EXDEV)
    }
    #[cfg(not(unix))]
    {
        let _ = err;
        false
    }
}

async fn copy_then_delete(staging_dir: &Path, destination: &Path) -> VmPullResult<()> {
    let temp_dest = destination.with_extension("vmpull-staging-tmp");
    if temp_dest.exists() {
        fs::remove_dir_all(&temp_dest).await?;
    }

    copy_dir_recursive(staging_dir, &temp_dest).await?;
    fs::rename(&temp_dest, destination).await?;
    fs::remove_dir_all(staging_dir).await.ok();

    Ok(())
}

fn copy_dir_recursive<'a>(
    source: &'a Path,
    destination: &'a Path,
) -> Pin<Box<dyn Future<Output = VmPullResult<()>> + Send + 'a>> {
    Box::pin(async move {
        fs::create_dir_all(destination).await?;

        let mut entries = fs::read_dir(source).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            let dest_path = destination.join(entry.file_name());

            if file_type.is_dir() {
                copy_dir_recursive(&entry.path(), &dest_path).await?;
            } else {
                fs::copy(entry.path(), &dest_path).await?;
            }
        }

        Ok(())
    })
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
