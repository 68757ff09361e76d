//! Resolves where a named VM's materialized directory lives.

use std::path::PathBuf;

use vmpull_utils::{get_cache_home_path, get_vm_locations, VMS_SUBDIR};

use crate::{VmPullError, VmPullResult};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A resolved, not-yet-necessarily-existing directory for a named VM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmDirectory {
    /// The directory's path.
    pub path: PathBuf,
}

impl VmDirectory {
    /// True iff the directory already exists on disk.
    pub fn initialized(&self) -> bool {
        self.path.exists()
    }
}

/// Resolves the destination directory a pulled VM should be materialized into.
pub trait VmDirectoryProvider: Send + Sync {
    /// Resolves `name`'s directory. If `location` is `Some`, it names a configured location
    /// (see `VMPULL_VM_LOCATIONS`); an unknown name is an error. If `location` is `None`, the
    /// default VM root is used.
    fn get_vm_directory(&self, name: &str, location: Option<&str>) -> VmPullResult<VmDirectory>;

    /// Creates a fresh, uniquely-named temporary VM directory for use as a pull staging area.
    fn create_temp_vm_directory(&self) -> VmPullResult<VmDirectory>;
}

/// Resolves VM directories against the filesystem, using `VMPULL_VM_LOCATIONS` for named
/// locations and the cache home's `vms` subdirectory as the default root.
#[derive(Debug, Default, Clone)]
pub struct FsVmDirectories;

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl FsVmDirectories {
    fn default_vms_root(&self) -> PathBuf {
        get_cache_home_path().join(VMS_SUBDIR)
    }

    fn resolve_location(&self, location: &str) -> VmPullResult<PathBuf> {
        get_vm_locations()
            .into_iter()
            .find(|(name, _)| name == location)
            .map(|(_, path)| path)
            .ok_or_else(|| VmPullError::LocationNotFound(location.to_string()))
    }
}

impl VmDirectoryProvider for FsVmDirectories {
    fn get_vm_directory(&self, name: &str, location: Option<&str>) -> VmPullResult<VmDirectory> {
        let root = match location {
            Some(location) => self.resolve_location(location)?,
            None => self.default_vms_root(),
        };

        Ok(VmDirectory {
            path: root.join(name),
        })
    }

    fn create_temp_vm_directory(&self) -> VmPullResult<VmDirectory> {
        let unique = format!(".staging-{}", process::id_and_counter());
        Ok(VmDirectory {
            path: self.default_vms_root().join(unique),
        })
    }
}

mod process {
    use std::sync::atomic::{AtomicU64, Ordering};

    static COUNTER: AtomicU64 = AtomicU64::new(0);

    /// A per-process, monotonically increasing suffix unique enough for a staging directory name.
    pub fn id_and_counter() -> String {
        let count = COUNTER.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}", std::process::id(), count)
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
