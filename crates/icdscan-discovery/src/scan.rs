use crate::sysroot::Sysroot;
use std::collections::HashSet;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Order in which manifests within one directory are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanOrder {
    /// Byte order of file names, as GLVND uses.
    Sorted,
    /// Whatever `readdir()` returns, as the Vulkan loader uses.
    #[default]
    Unsorted,
}

/// Lists `*.json` manifests one directory at a time.
///
/// A scanner remembers every directory it has listed, by canonical path, so a
/// directory reachable from two search path entries is only read once.
#[derive(Debug)]
pub struct ManifestScanner<'a> {
    sysroot: &'a Sysroot,
    order: ScanOrder,
    visited: HashSet<PathBuf>,
}

impl<'a> ManifestScanner<'a> {
    pub fn new(sysroot: &'a Sysroot, order: ScanOrder) -> Self {
        Self {
            sysroot,
            order,
            visited: HashSet::new(),
        }
    }

    /// Call `on_file` with the in-sysroot path of each manifest in `dir`.
    /// Missing or unreadable directories yield nothing. Returns the number of
    /// manifests visited.
    pub fn scan_dir(&mut self, dir: &Path, mut on_file: impl FnMut(&Path)) -> usize {
        let resolved = match self.sysroot.resolve(dir) {
            Ok(r) => r,
            Err(e) => {
                debug!("skipping {}: {e}", dir.display());
                return 0;
            }
        };
        if !self.visited.insert(resolved.canonical.clone()) {
            debug!(
                "skipping {}: already searched as {}",
                dir.display(),
                resolved.canonical.display()
            );
            return 0;
        }

        let entries = match fs::read_dir(&resolved.host) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("skipping {}: {e}", dir.display());
                return 0;
            }
        };
        let mut names: Vec<OsString> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.file_name())
            .filter(|name| is_manifest_name(name))
            .collect();
        if self.order == ScanOrder::Sorted {
            names.sort();
        }

        debug!(
            "searching {} ({} manifests)",
            resolved.canonical.display(),
            names.len()
        );
        for name in &names {
            let path = resolved.canonical.join(name);
            trace!("found {}", path.display());
            on_file(&path);
        }
        names.len()
    }

    pub fn visited(&self) -> impl Iterator<Item = &Path> {
        self.visited.iter().map(PathBuf::as_path)
    }
}

fn is_manifest_name(name: &OsStr) -> bool {
    name.as_encoded_bytes().ends_with(b".json")
}
