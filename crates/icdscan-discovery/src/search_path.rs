//! Where each loader looks for manifests.
//!
//! The lists produced here follow GLVND (`egl_vendor.d`), the NVIDIA EGL
//! external platform interface (`egl_external_platform.d`) and the Khronos
//! Vulkan loader, including the extra freedesktop-sdk locations used inside
//! Flatpak. Entries come most-important first.

use crate::env::Environment;
use crate::sysroot::Sysroot;
use crate::DiscoveryError;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoaderKind {
    EglIcd,
    EglExternalPlatform,
    VulkanIcd,
    VulkanExplicitLayer,
    VulkanImplicitLayer,
}

impl LoaderKind {
    pub const ALL: [Self; 5] = [
        Self::EglIcd,
        Self::EglExternalPlatform,
        Self::VulkanIcd,
        Self::VulkanExplicitLayer,
        Self::VulkanImplicitLayer,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::EglIcd => "egl-icd",
            Self::EglExternalPlatform => "egl-external-platform",
            Self::VulkanIcd => "vulkan-icd",
            Self::VulkanExplicitLayer => "vulkan-layer-explicit",
            Self::VulkanImplicitLayer => "vulkan-layer-implicit",
        }
    }

    /// Directory appended to each generic search path entry.
    pub fn suffix(self) -> &'static str {
        match self {
            Self::EglIcd => "glvnd/egl_vendor.d",
            Self::EglExternalPlatform => "egl/egl_external_platform.d",
            Self::VulkanIcd => "vulkan/icd.d",
            Self::VulkanExplicitLayer => "vulkan/explicit_layer.d",
            Self::VulkanImplicitLayer => "vulkan/implicit_layer.d",
        }
    }

    pub fn is_egl(self) -> bool {
        matches!(self, Self::EglIcd | Self::EglExternalPlatform)
    }
}

impl fmt::Display for LoaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoaderKind {
    type Err = DiscoveryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| DiscoveryError::UnknownKind(s.to_owned()))
    }
}

/// What a loader will read: either an explicit list of manifest files from an
/// override variable, or directories to scan for `*.json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchPath {
    Files(Vec<PathBuf>),
    Directories(Vec<PathBuf>),
}

impl SearchPath {
    pub fn paths(&self) -> &[PathBuf] {
        match self {
            Self::Files(p) | Self::Directories(p) => p,
        }
    }
}

/// Debian-style multiarch tuple of the architecture this binary was built for.
pub fn host_abi_tuple() -> Option<&'static str> {
    if cfg!(target_arch = "x86_64") {
        Some("x86_64-linux-gnu")
    } else if cfg!(target_arch = "x86") {
        Some("i386-linux-gnu")
    } else if cfg!(target_arch = "aarch64") {
        Some("aarch64-linux-gnu")
    } else if cfg!(target_arch = "arm") {
        Some("arm-linux-gnueabihf")
    } else {
        None
    }
}

/// Search path for `kind` inside `sysroot`. The only filesystem access is the
/// Flatpak marker check.
pub fn build_search_path(
    sysroot: &Sysroot,
    env: &Environment,
    kind: LoaderKind,
    abi_tuples: &[String],
) -> SearchPath {
    search_path_for(kind, env, sysroot.is_flatpak(), abi_tuples)
}

/// Pure form of [`build_search_path`].
pub fn search_path_for(
    kind: LoaderKind,
    env: &Environment,
    flatpak: bool,
    abi_tuples: &[String],
) -> SearchPath {
    let tuples = effective_tuples(abi_tuples);
    match kind {
        LoaderKind::EglIcd => egl_search_path(
            env,
            flatpak,
            &tuples,
            "__EGL_VENDOR_LIBRARY_FILENAMES",
            "__EGL_VENDOR_LIBRARY_DIRS",
            "GL/glvnd/egl_vendor.d",
            kind.suffix(),
        ),
        LoaderKind::EglExternalPlatform => egl_search_path(
            env,
            flatpak,
            &tuples,
            "__EGL_EXTERNAL_PLATFORM_CONFIG_FILENAMES",
            "__EGL_EXTERNAL_PLATFORM_CONFIG_DIRS",
            "GL/egl/egl_external_platform.d",
            kind.suffix(),
        ),
        LoaderKind::VulkanIcd => {
            match env
                .list("VK_DRIVER_FILES")
                .or_else(|| env.list("VK_ICD_FILENAMES"))
            {
                Some(files) => SearchPath::Files(to_paths(files)),
                None => vulkan_search_path(env, flatpak, &tuples, kind.suffix()),
            }
        }
        LoaderKind::VulkanExplicitLayer => match env.list("VK_LAYER_PATH") {
            Some(dirs) => SearchPath::Directories(to_paths(dirs)),
            None => vulkan_search_path(env, flatpak, &tuples, kind.suffix()),
        },
        // The loader never applies VK_LAYER_PATH to implicit layers.
        LoaderKind::VulkanImplicitLayer => vulkan_search_path(env, flatpak, &tuples, kind.suffix()),
    }
}

fn effective_tuples(abi_tuples: &[String]) -> Vec<String> {
    if abi_tuples.is_empty() {
        host_abi_tuple().map(str::to_owned).into_iter().collect()
    } else {
        abi_tuples.to_vec()
    }
}

fn to_paths(entries: Vec<String>) -> Vec<PathBuf> {
    entries.into_iter().map(PathBuf::from).collect()
}

fn egl_search_path(
    env: &Environment,
    flatpak: bool,
    tuples: &[String],
    files_var: &str,
    dirs_var: &str,
    multiarch_suffix: &str,
    suffix: &str,
) -> SearchPath {
    if let Some(files) = env.list(files_var) {
        return SearchPath::Files(to_paths(files));
    }
    if let Some(dirs) = env.list(dirs_var) {
        return SearchPath::Directories(to_paths(dirs));
    }
    if flatpak {
        return SearchPath::Directories(
            tuples
                .iter()
                .map(|t| PathBuf::from(format!("/usr/lib/{t}/{multiarch_suffix}")))
                .collect(),
        );
    }
    SearchPath::Directories(vec![
        PathBuf::from("/etc").join(suffix),
        PathBuf::from("/usr/share").join(suffix),
    ])
}

fn vulkan_search_path(
    env: &Environment,
    flatpak: bool,
    tuples: &[String],
    suffix: &str,
) -> SearchPath {
    let mut dirs: Vec<PathBuf> = Vec::new();

    if let Some(config_home) = env.get_non_empty("XDG_CONFIG_HOME") {
        dirs.push(PathBuf::from(config_home).join(suffix));
    } else if let Some(home) = env.home() {
        dirs.push(PathBuf::from(home).join(".config").join(suffix));
    }

    let config_dirs = env
        .list("XDG_CONFIG_DIRS")
        .unwrap_or_else(|| vec!["/etc/xdg".to_owned()]);
    dirs.extend(config_dirs.iter().map(|d| PathBuf::from(d).join(suffix)));

    dirs.push(PathBuf::from("/etc").join(suffix));

    if flatpak {
        for tuple in tuples {
            dirs.push(PathBuf::from(format!("/usr/lib/{tuple}/GL")).join(suffix));
            dirs.push(PathBuf::from(format!("/usr/lib/{tuple}")).join(suffix));
        }
        dirs.push(PathBuf::from("/usr/lib/extensions/vulkan/share").join(suffix));
    }

    if let Some(data_home) = env.get_non_empty("XDG_DATA_HOME") {
        dirs.push(PathBuf::from(data_home).join(suffix));
    }
    if let Some(home) = env.home() {
        dirs.push(PathBuf::from(home).join(".local/share").join(suffix));
    }

    let data_dirs = env
        .list("XDG_DATA_DIRS")
        .unwrap_or_else(|| vec!["/usr/local/share".to_owned(), "/usr/share".to_owned()]);
    dirs.extend(data_dirs.iter().map(|d| PathBuf::from(d).join(suffix)));

    SearchPath::Directories(dirs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dirs(path: &SearchPath) -> Vec<String> {
        match path {
            SearchPath::Directories(d) => d.iter().map(|p| p.display().to_string()).collect(),
            SearchPath::Files(_) => panic!("expected directories, got {path:?}"),
        }
    }

    fn tuples(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn vulkan_icd_generic_order() {
        let env = Environment::new().with("HOME", "/home/me");
        let path = search_path_for(LoaderKind::VulkanIcd, &env, false, &[]);
        assert_eq!(
            dirs(&path),
            vec![
                "/home/me/.config/vulkan/icd.d",
                "/etc/xdg/vulkan/icd.d",
                "/etc/vulkan/icd.d",
                "/home/me/.local/share/vulkan/icd.d",
                "/usr/local/share/vulkan/icd.d",
                "/usr/share/vulkan/icd.d",
            ]
        );
    }

    #[test]
    fn vulkan_xdg_variables_and_flatpak() {
        let env = Environment::new()
            .with("HOME", "/home/me")
            .with("XDG_CONFIG_HOME", "/cfg")
            .with("XDG_CONFIG_DIRS", "/a:/b")
            .with("XDG_DATA_HOME", "/data")
            .with("XDG_DATA_DIRS", "/c");
        let path = search_path_for(
            LoaderKind::VulkanExplicitLayer,
            &env,
            true,
            &tuples(&["x86_64-linux-gnu", "i386-linux-gnu"]),
        );
        assert_eq!(
            dirs(&path),
            vec![
                "/cfg/vulkan/explicit_layer.d",
                "/a/vulkan/explicit_layer.d",
                "/b/vulkan/explicit_layer.d",
                "/etc/vulkan/explicit_layer.d",
                "/usr/lib/x86_64-linux-gnu/GL/vulkan/explicit_layer.d",
                "/usr/lib/x86_64-linux-gnu/vulkan/explicit_layer.d",
                "/usr/lib/i386-linux-gnu/GL/vulkan/explicit_layer.d",
                "/usr/lib/i386-linux-gnu/vulkan/explicit_layer.d",
                "/usr/lib/extensions/vulkan/share/vulkan/explicit_layer.d",
                "/data/vulkan/explicit_layer.d",
                // Kept even when XDG_DATA_HOME is set.
                "/home/me/.local/share/vulkan/explicit_layer.d",
                "/c/vulkan/explicit_layer.d",
            ]
        );
    }

    #[test]
    fn no_home_means_no_home_entries() {
        let path = search_path_for(LoaderKind::VulkanIcd, &Environment::new(), false, &[]);
        assert!(dirs(&path).iter().all(|d| !d.contains(".config") && !d.contains(".local")));
    }

    #[test]
    fn vulkan_icd_file_overrides() {
        let env = Environment::new()
            .with("VK_ICD_FILENAMES", "/a.json::/b.json")
            .with("HOME", "/home/me");
        assert_eq!(
            search_path_for(LoaderKind::VulkanIcd, &env, false, &[]),
            SearchPath::Files(vec![PathBuf::from("/a.json"), PathBuf::from("/b.json")])
        );

        let env = env.with("VK_DRIVER_FILES", "/c.json");
        assert_eq!(
            search_path_for(LoaderKind::VulkanIcd, &env, false, &[]),
            SearchPath::Files(vec![PathBuf::from("/c.json")])
        );
    }

    #[test]
    fn layer_path_only_affects_explicit_layers() {
        let env = Environment::new().with("VK_LAYER_PATH", "/layers:/more");
        assert_eq!(
            search_path_for(LoaderKind::VulkanExplicitLayer, &env, false, &[]),
            SearchPath::Directories(vec![PathBuf::from("/layers"), PathBuf::from("/more")])
        );
        let implicit = dirs(&search_path_for(LoaderKind::VulkanImplicitLayer, &env, false, &[]));
        assert!(implicit.contains(&"/etc/vulkan/implicit_layer.d".to_owned()));
        assert!(!implicit.iter().any(|d| d.starts_with("/layers")));
    }

    #[test]
    fn egl_precedence() {
        let env = Environment::new();
        assert_eq!(
            dirs(&search_path_for(LoaderKind::EglIcd, &env, false, &[])),
            vec!["/etc/glvnd/egl_vendor.d", "/usr/share/glvnd/egl_vendor.d"]
        );
        assert_eq!(
            dirs(&search_path_for(
                LoaderKind::EglIcd,
                &env,
                true,
                &tuples(&["aarch64-linux-gnu"])
            )),
            vec!["/usr/lib/aarch64-linux-gnu/GL/glvnd/egl_vendor.d"]
        );

        let env = env.with("__EGL_VENDOR_LIBRARY_DIRS", "/vendor");
        assert_eq!(
            dirs(&search_path_for(LoaderKind::EglIcd, &env, true, &[])),
            vec!["/vendor"]
        );

        let env = env.with("__EGL_VENDOR_LIBRARY_FILENAMES", "/x.json");
        assert_eq!(
            search_path_for(LoaderKind::EglIcd, &env, true, &[]),
            SearchPath::Files(vec![PathBuf::from("/x.json")])
        );
    }

    #[test]
    fn egl_external_platform_paths() {
        let env = Environment::new();
        assert_eq!(
            dirs(&search_path_for(LoaderKind::EglExternalPlatform, &env, false, &[])),
            vec![
                "/etc/egl/egl_external_platform.d",
                "/usr/share/egl/egl_external_platform.d"
            ]
        );
        let env = env.with("__EGL_EXTERNAL_PLATFORM_CONFIG_FILENAMES", "/wayland.json");
        assert_eq!(
            search_path_for(LoaderKind::EglExternalPlatform, &env, false, &[]),
            SearchPath::Files(vec![PathBuf::from("/wayland.json")])
        );
    }

    #[test]
    fn kind_names_roundtrip() {
        for kind in LoaderKind::ALL {
            assert_eq!(kind.as_str().parse::<LoaderKind>().unwrap(), kind);
        }
        assert!("opencl-icd".parse::<LoaderKind>().is_err());
    }
}
