use crate::duplicates::{flag_duplicates, HelperInspector, LibraryInspector};
use crate::env::Environment;
use crate::scan::{ManifestScanner, ScanOrder};
use crate::search_path::{build_search_path, LoaderKind, SearchPath};
use crate::sysroot::Sysroot;
use icdscan_schema::{
    absolute_path, parse_egl_icd, parse_vulkan_icd, parse_vulkan_layers, unreadable,
    EglExternalPlatform, EglIcd, EglSection, GraphicsReport, Loadable, LoadableDetails,
    VulkanIcd, VulkanLayer, VulkanSection,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryOptions {
    /// Multiarch tuples to consider for Flatpak paths and duplicate checks.
    pub abi_tuples: Vec<String>,
    /// Directory containing `<tuple>-inspect-library` helpers.
    pub helpers_dir: Option<PathBuf>,
    pub check_duplicates: bool,
    /// Read Vulkan manifests in file name order instead of directory order.
    pub sort_vulkan: bool,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            abi_tuples: Vec::new(),
            helpers_dir: None,
            check_duplicates: true,
            sort_vulkan: false,
        }
    }
}

/// Finds EGL and Vulkan drivers and layers the way their loaders would.
///
/// Every `load_*` method is a fresh, synchronous walk of the search path:
/// nothing is cached between calls.
pub struct Discovery {
    sysroot: Sysroot,
    env: Environment,
    options: DiscoveryOptions,
    inspector: Option<Box<dyn LibraryInspector>>,
}

impl Discovery {
    pub fn new(sysroot: Sysroot, env: Environment, options: DiscoveryOptions) -> Self {
        let inspector = options.helpers_dir.as_ref().map(|dir| {
            Box::new(HelperInspector::new(dir, env.clone())) as Box<dyn LibraryInspector>
        });
        Self {
            sysroot,
            env,
            options,
            inspector,
        }
    }

    /// Replace the library inspector used for per-ABI duplicate checks.
    #[must_use]
    pub fn with_inspector(mut self, inspector: Box<dyn LibraryInspector>) -> Self {
        self.inspector = Some(inspector);
        self
    }

    pub fn sysroot(&self) -> &Sysroot {
        &self.sysroot
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn options(&self) -> &DiscoveryOptions {
        &self.options
    }

    pub fn search_path(&self, kind: LoaderKind) -> SearchPath {
        build_search_path(&self.sysroot, &self.env, kind, &self.options.abi_tuples)
    }

    pub fn load_egl_icds(&self) -> Vec<EglIcd> {
        self.load(LoaderKind::EglIcd, |path, content| {
            vec![parse_egl_icd(path, content)]
        })
    }

    pub fn load_egl_external_platforms(&self) -> Vec<EglExternalPlatform> {
        self.load(LoaderKind::EglExternalPlatform, |path, content| {
            vec![parse_egl_icd(path, content)]
        })
    }

    pub fn load_vulkan_icds(&self) -> Vec<VulkanIcd> {
        self.load(LoaderKind::VulkanIcd, |path, content| {
            vec![parse_vulkan_icd(path, content)]
        })
    }

    pub fn load_vulkan_explicit_layers(&self) -> Vec<VulkanLayer> {
        self.load(LoaderKind::VulkanExplicitLayer, parse_vulkan_layers)
    }

    pub fn load_vulkan_implicit_layers(&self) -> Vec<VulkanLayer> {
        self.load(LoaderKind::VulkanImplicitLayer, parse_vulkan_layers)
    }

    /// Run every discovery pass and collect the results.
    pub fn report(&self) -> GraphicsReport {
        GraphicsReport {
            egl: EglSection {
                icds: self.load_egl_icds(),
                external_platforms: self.load_egl_external_platforms(),
            },
            vulkan: VulkanSection {
                icds: self.load_vulkan_icds(),
                explicit_layers: self.load_vulkan_explicit_layers(),
                implicit_layers: self.load_vulkan_implicit_layers(),
            },
        }
    }

    fn scan_order(&self, kind: LoaderKind) -> ScanOrder {
        if kind.is_egl() || self.options.sort_vulkan {
            ScanOrder::Sorted
        } else {
            ScanOrder::Unsorted
        }
    }

    fn load<D, F>(&self, kind: LoaderKind, parse: F) -> Vec<Loadable<D>>
    where
        D: LoadableDetails,
        F: Fn(&Path, &str) -> Vec<Loadable<D>>,
    {
        let mut found = Vec::new();
        match self.search_path(kind) {
            SearchPath::Files(files) => {
                debug!("{kind}: using {} explicit manifests", files.len());
                for file in &files {
                    found.extend(self.load_file(&absolute_path(file), &parse));
                }
            }
            SearchPath::Directories(dirs) => {
                let mut scanner = ManifestScanner::new(&self.sysroot, self.scan_order(kind));
                for dir in &dirs {
                    scanner.scan_dir(dir, |file| found.extend(self.load_file(file, &parse)));
                }
            }
        }

        if self.options.check_duplicates {
            flag_duplicates(
                &mut found,
                self.inspector.as_deref(),
                &self.options.abi_tuples,
            );
        }
        info!("{kind}: found {} manifests", found.len());
        found
    }

    fn load_file<D, F>(&self, path: &Path, parse: &F) -> Vec<Loadable<D>>
    where
        D: LoadableDetails,
        F: Fn(&Path, &str) -> Vec<Loadable<D>>,
    {
        match self.sysroot.read_to_string(path) {
            Ok((resolved, content)) => parse(&resolved.canonical, &content),
            Err(e) => vec![unreadable(path, &e)],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use icdscan_schema::Issues;
    use std::fs;

    fn write(root: &Sysroot, path: &str, content: &str) {
        let full = root.root().join(path.trim_start_matches('/'));
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, content).unwrap();
    }

    #[test]
    fn default_options() {
        let options = DiscoveryOptions::default();
        assert!(options.check_duplicates);
        assert!(!options.sort_vulkan);
        assert!(options.abi_tuples.is_empty());
    }

    #[test]
    fn egl_icds_sorted_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let root = Sysroot::new(dir.path()).unwrap();
        write(
            &root,
            "/usr/share/glvnd/egl_vendor.d/50_mesa.json",
            r#"{"file_format_version":"1.0.0","ICD":{"library_path":"libEGL_mesa.so.0"}}"#,
        );
        write(
            &root,
            "/usr/share/glvnd/egl_vendor.d/10_nvidia.json",
            r#"{"file_format_version":"1.0.0","ICD":{"library_path":"libEGL_nvidia.so.0"}}"#,
        );
        let discovery = Discovery::new(root, Environment::new(), DiscoveryOptions::default());
        let icds = discovery.load_egl_icds();
        let libs: Vec<_> = icds.iter().filter_map(EglIcd::library_path).collect();
        assert_eq!(libs, vec!["libEGL_nvidia.so.0", "libEGL_mesa.so.0"]);
    }

    #[test]
    fn duplicates_can_be_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let root = Sysroot::new(dir.path()).unwrap();
        let icd = r#"{"file_format_version":"1.0.0","ICD":{"library_path":"libEGL_mesa.so.0"}}"#;
        write(&root, "/etc/glvnd/egl_vendor.d/50_mesa.json", icd);
        write(&root, "/usr/share/glvnd/egl_vendor.d/50_mesa.json", icd);

        let options = DiscoveryOptions {
            check_duplicates: false,
            ..DiscoveryOptions::default()
        };
        let discovery = Discovery::new(root.clone(), Environment::new(), options);
        assert!(discovery
            .load_egl_icds()
            .iter()
            .all(|i| i.issues().is_empty()));

        let discovery = Discovery::new(root, Environment::new(), DiscoveryOptions::default());
        assert!(discovery
            .load_egl_icds()
            .iter()
            .all(|i| i.issues() == Issues::DUPLICATED));
    }

    #[test]
    fn json_path_is_canonical_in_sysroot() {
        let dir = tempfile::tempdir().unwrap();
        let root = Sysroot::new(dir.path()).unwrap();
        write(
            &root,
            "/opt/egl/10_vendor.json",
            r#"{"file_format_version":"1.0.0","ICD":{"library_path":"libEGL_vendor.so.0"}}"#,
        );
        fs::create_dir_all(root.root().join("etc/glvnd/egl_vendor.d")).unwrap();
        std::os::unix::fs::symlink(
            "/opt/egl/10_vendor.json",
            root.root().join("etc/glvnd/egl_vendor.d/10_vendor.json"),
        )
        .unwrap();

        let discovery = Discovery::new(root, Environment::new(), DiscoveryOptions::default());
        let icds = discovery.load_egl_icds();
        assert_eq!(icds.len(), 1);
        assert_eq!(icds[0].json_path(), Path::new("/opt/egl/10_vendor.json"));
    }
}
