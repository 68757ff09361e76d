//! Command line argument definitions.

use clap::Parser;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// vmpull is a tool for pulling and caching VM disk images from an OCI registry.
#[derive(Debug, Parser)]
#[command(name = "vmpull", author)]
pub struct VmPullArgs {
    /// The subcommand to run.
    #[command(subcommand)]
    pub subcommand: VmPullSubcommand,

    /// Show logs with error level.
    #[arg(long, global = true)]
    pub error: bool,

    /// Show logs with warn level.
    #[arg(long, global = true)]
    pub warn: bool,

    /// Show logs with info level.
    #[arg(long, global = true)]
    pub info: bool,

    /// Show logs with debug level.
    #[arg(long, global = true)]
    pub debug: bool,

    /// Show logs with trace level.
    #[arg(long, global = true)]
    pub trace: bool,
}

/// Available subcommands.
#[derive(Debug, Parser)]
pub enum VmPullSubcommand {
    /// Pull an image and materialize it as a named VM directory.
    #[command(name = "pull")]
    Pull {
        /// Image reference, e.g. `org/alpine-vm:latest`.
        image: String,

        /// Name for the materialized VM directory; defaults to the repository name.
        #[arg(short, long)]
        name: Option<String>,

        /// Named VM root to materialize into, configured via `VMPULL_VM_LOCATIONS`.
        #[arg(short, long)]
        location: Option<String>,
    },

    /// List images currently present in the cache.
    #[command(name = "list")]
    List,

    /// Remove a cached image's cache entries, matched by repository.
    #[command(name = "rm")]
    Rm {
        /// Repository name to remove, e.g. `org/alpine-vm`.
        repository: String,
    },
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Sets `RUST_LOG` from the verbosity flags, if any were given. Leaves the environment untouched
/// otherwise, so an externally-set `RUST_LOG` is respected.
pub fn apply_log_level(args: &VmPullArgs) {
    let level = if args.trace {
        Some("trace")
    } else if args.debug {
        Some("debug")
    } else if args.info {
        Some("info")
    } else if args.warn {
        Some("warn")
    } else if args.error {
        Some("error")
    } else {
        None
    };

    if let Some(level) = level {
        unsafe { std::env::set_var("RUST_LOG", format!("vmpull={level},vmpull_cli={level}")) };
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn parses_pull_with_name_and_location() {
        let args = VmPullArgs::parse_from([
            "vmpull", "pull", "org/app:latest", "--name", "my-vm", "--location", "work",
        ]);
        match args.subcommand {
            VmPullSubcommand::Pull {
                image,
                name,
                location,
            } => {
                assert_eq!(image, "org/app:latest");
                assert_eq!(name.as_deref(), Some("my-vm"));
                assert_eq!(location.as_deref(), Some("work"));
            }
            _ => panic!("expected pull subcommand"),
        }
    }

    #[test]
    #[serial_test::serial]
    fn apply_log_level_leaves_rust_log_unset_without_flags() {
        std::env::remove_var("RUST_LOG");
        let args = VmPullArgs::parse_from(["vmpull", "list"]);
        apply_log_level(&args);
        assert!(std::env::var("RUST_LOG").is_err());
    }

    #[test]
    #[serial_test::serial]
    fn apply_log_level_sets_rust_log_from_debug_flag() {
        std::env::remove_var("RUST_LOG");
        let args = VmPullArgs::parse_from(["vmpull", "--debug", "list"]);
        apply_log_level(&args);
        assert_eq!(std::env::var("RUST_LOG").unwrap(), "vmpull=debug,vmpull_cli=debug");
        std::env::remove_var("RUST_LOG");
    }

    #[test]
    fn command_builds_without_panicking() {
        VmPullArgs::command().debug_assert();
    }
}
