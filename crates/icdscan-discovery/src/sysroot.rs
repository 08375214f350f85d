use crate::DiscoveryError;
use std::collections::VecDeque;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::trace;

/// Same limit as Linux `MAXSYMLINKS`.
const MAX_SYMLINKS: usize = 40;

/// A directory treated as `/` for every path lookup, the way `chroot` would
/// see it. Symbolic links inside it are followed without ever leaving it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sysroot {
    root: PathBuf,
}

/// Where a sysroot path really lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Path on the host, usable with `std::fs`.
    pub host: PathBuf,
    /// Canonical absolute path as seen from inside the sysroot.
    pub canonical: PathBuf,
}

impl Sysroot {
    pub fn new(root: impl AsRef<Path>) -> Result<Self, DiscoveryError> {
        let path = root.as_ref();
        let root = fs::canonicalize(path).map_err(|source| DiscoveryError::Sysroot {
            path: path.to_path_buf(),
            source,
        })?;
        if !root.is_dir() {
            return Err(DiscoveryError::NotADirectory(path.to_path_buf()));
        }
        Ok(Self { root })
    }

    /// The running system's own root.
    pub fn host() -> Self {
        Self {
            root: PathBuf::from("/"),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_host(&self) -> bool {
        self.root == Path::new("/")
    }

    /// Resolve `path` (interpreted relative to the sysroot's `/`) following
    /// symbolic links. Absolute link targets are re-rooted and `..` stops at
    /// the root. Fails if any component is missing.
    pub fn resolve(&self, path: &Path) -> io::Result<ResolvedPath> {
        let mut pending: VecDeque<OsString> = components(path).into();
        let mut parts: Vec<OsString> = Vec::new();
        let mut links = 0;

        while let Some(component) = pending.pop_front() {
            if component == ".." {
                parts.pop();
                continue;
            }
            let candidate = self.host_path_of(&parts).join(&component);
            let meta = fs::symlink_metadata(&candidate)?;
            if !meta.file_type().is_symlink() {
                parts.push(component);
                continue;
            }

            links += 1;
            if links > MAX_SYMLINKS {
                return Err(io::Error::other(format!(
                    "too many levels of symbolic links resolving {}",
                    path.display()
                )));
            }
            let target = fs::read_link(&candidate)?;
            trace!("{} -> {}", candidate.display(), target.display());
            if target.is_absolute() {
                parts.clear();
            }
            for c in components(&target).into_iter().rev() {
                pending.push_front(c);
            }
        }

        let mut canonical = PathBuf::from("/");
        canonical.extend(&parts);
        Ok(ResolvedPath {
            host: self.host_path_of(&parts),
            canonical,
        })
    }

    pub fn read_to_string(&self, path: &Path) -> io::Result<(ResolvedPath, String)> {
        let resolved = self.resolve(path)?;
        let content = fs::read_to_string(&resolved.host)?;
        Ok((resolved, content))
    }

    /// Whether the sysroot is a Flatpak sandbox (or looks like one).
    pub fn is_flatpak(&self) -> bool {
        self.resolve(Path::new("/.flatpak-info")).is_ok()
    }

    fn host_path_of(&self, parts: &[OsString]) -> PathBuf {
        let mut host = self.root.clone();
        host.extend(parts);
        host
    }
}

fn components(path: &Path) -> Vec<OsString> {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(name) => Some(name.to_os_string()),
            Component::ParentDir => Some(OsString::from("..")),
            Component::RootDir | Component::CurDir | Component::Prefix(_) => None,
        })
        .collect()
}
