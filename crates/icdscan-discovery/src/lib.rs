//! Filesystem side of icdscan: reproduces the search paths GLVND and the
//! Vulkan loader would use, walks them inside a sysroot, parses what it finds
//! with `icdscan-schema`, and flags duplicated drivers.
//!
//! [`Discovery`] is the entry point. Everything below it is usable on its own:
//! [`Environment`] and [`Sysroot`] capture the inputs, [`build_search_path`]
//! is a pure function of them, [`ManifestScanner`] lists one directory at a
//! time, and [`flag_duplicates`] runs the duplicate pass over any list of
//! records.

pub mod discover;
pub mod duplicates;
pub mod env;
pub mod scan;
pub mod search_path;
pub mod sysroot;

pub use discover::{Discovery, DiscoveryOptions};
pub use duplicates::{flag_duplicates, HelperInspector, LibraryInspector};
pub use env::Environment;
pub use scan::{ManifestScanner, ScanOrder};
pub use search_path::{build_search_path, host_abi_tuple, search_path_for, LoaderKind, SearchPath};
pub use sysroot::{ResolvedPath, Sysroot};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("sysroot {path}: {source}")]
    Sysroot {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("sysroot {0} is not a directory")]
    NotADirectory(PathBuf),
    #[error("unknown loader kind: {0}")]
    UnknownKind(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovery_error_display_not_a_directory() {
        let e = DiscoveryError::NotADirectory(PathBuf::from("/etc/os-release"));
        assert_eq!(e.to_string(), "sysroot /etc/os-release is not a directory");
    }

    #[test]
    fn discovery_error_display_unknown_kind() {
        let e = DiscoveryError::UnknownKind("opencl".to_owned());
        assert!(e.to_string().contains("opencl"));
    }
}
