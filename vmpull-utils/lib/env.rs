//! Utility functions for working with environment variables.

use std::path::PathBuf;

use crate::{DEFAULT_REGISTRY_DOMAIN, DEFAULT_VMPULL_CACHE_HOME};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Environment variable for the vmpull cache home directory.
pub const VMPULL_CACHE_HOME_ENV_VAR: &str = "VMPULL_CACHE_HOME";

/// Environment variable for the registry domain used when pulling.
pub const VMPULL_REGISTRY_DOMAIN_ENV_VAR: &str = "VMPULL_REGISTRY_DOMAIN";

/// Environment variable holding a colon-separated list of `name=path` VM location mappings.
pub const VMPULL_VM_LOCATIONS_ENV_VAR: &str = "VMPULL_VM_LOCATIONS";

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Returns the path to the vmpull cache home directory.
///
/// If the `VMPULL_CACHE_HOME` environment variable is set, returns that path (with a leading `~`
/// expanded to the user's home directory). Otherwise returns the default cache home path.
pub fn get_cache_home_path() -> PathBuf {
    if let Ok(raw) = std::env::var(VMPULL_CACHE_HOME_ENV_VAR) {
        expand_tilde(&raw)
    } else {
        DEFAULT_VMPULL_CACHE_HOME.to_owned()
    }
}

/// Returns the registry domain to use for pulls.
/// If the `VMPULL_REGISTRY_DOMAIN` environment variable is set, returns that value.
/// Otherwise, returns the default registry domain.
pub fn get_registry_domain() -> String {
    std::env::var(VMPULL_REGISTRY_DOMAIN_ENV_VAR).unwrap_or_else(|_| DEFAULT_REGISTRY_DOMAIN.to_string())
}

/// Parses the `VMPULL_VM_LOCATIONS` environment variable into `(name, path)` pairs.
///
/// Entries are separated by `:` and each entry has the form `name=path`. Malformed entries are
/// skipped.
pub fn get_vm_locations() -> Vec<(String, PathBuf)> {
    let Ok(raw) = std::env::var(VMPULL_VM_LOCATIONS_ENV_VAR) else {
        return Vec::new();
    };

    parse_vm_locations(&raw)
}

fn parse_vm_locations(raw: &str) -> Vec<(String, PathBuf)> {
    raw.split(':')
        .filter_map(|entry| {
            let (name, path) = entry.split_once('=')?;
            if name.is_empty() || path.is_empty() {
                return None;
            }
            Some((name.to_string(), expand_tilde(path)))
        })
        .collect()
}

/// Expands a leading `~` or `~/` in a path string to the user's home directory.
pub fn expand_tilde(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    } else if raw == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }

    PathBuf::from(raw)
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_tilde_replaces_home_prefix() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(expand_tilde("~/cache"), home.join("cache"));
    }

    #[test]
    fn expand_tilde_leaves_absolute_paths_untouched() {
        assert_eq!(
            expand_tilde("/var/cache/vmpull"),
            PathBuf::from("/var/cache/vmpull")
        );
    }

    #[test]
    fn parse_vm_locations_parses_pairs_and_skips_malformed_entries() {
        let parsed = parse_vm_locations("work=/vms/work:broken:home=~/vms");

        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].0, "work");
        assert_eq!(parsed[0].1, PathBuf::from("/vms/work"));
        assert_eq!(parsed[1].0, "home");
    }
}
