use icdscan_discovery::{DiscoveryOptions, Environment};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Contents of `config.toml`. Every key is optional.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    pub sysroot: Option<PathBuf>,
    pub abi_tuples: Vec<String>,
    pub helpers_dir: Option<PathBuf>,
    pub check_duplicates: bool,
    pub sort_vulkan: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sysroot: None,
            abi_tuples: Vec::new(),
            helpers_dir: None,
            check_duplicates: true,
            sort_vulkan: false,
        }
    }
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Default)]
pub struct Flags<'a> {
    pub sysroot: Option<&'a Path>,
    pub abi_tuples: &'a [String],
    pub helpers_dir: Option<&'a Path>,
    pub no_duplicates: bool,
}

impl Config {
    pub fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| format!("config error: {e}"))
    }

    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("config error: failed to read {}: {e}", path.display()))?;
        Self::parse(&content)
            .map_err(|e| format!("{e} (in {})", path.display()))
    }

    /// Load `explicit` if given (it must exist), otherwise the default file
    /// if there is one.
    pub fn resolve(explicit: Option<&Path>, env: &Environment) -> Result<Self, String> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match default_config_path(env) {
            Some(path) if path.exists() => {
                debug!("using config {}", path.display());
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }

    #[must_use]
    pub fn merge(mut self, flags: &Flags<'_>) -> Self {
        if let Some(sysroot) = flags.sysroot {
            self.sysroot = Some(sysroot.to_path_buf());
        }
        if !flags.abi_tuples.is_empty() {
            self.abi_tuples = flags.abi_tuples.to_vec();
        }
        if let Some(dir) = flags.helpers_dir {
            self.helpers_dir = Some(dir.to_path_buf());
        }
        if flags.no_duplicates {
            self.check_duplicates = false;
        }
        self
    }

    pub fn sysroot_path(&self) -> PathBuf {
        self.sysroot.clone().unwrap_or_else(|| PathBuf::from("/"))
    }

    pub fn discovery_options(&self) -> DiscoveryOptions {
        DiscoveryOptions {
            abi_tuples: self.abi_tuples.clone(),
            helpers_dir: self.helpers_dir.clone(),
            check_duplicates: self.check_duplicates,
            sort_vulkan: self.sort_vulkan,
        }
    }
}

/// `$XDG_CONFIG_HOME/icdscan/config.toml`, falling back to `$HOME/.config`.
pub fn default_config_path(env: &Environment) -> Option<PathBuf> {
    let base = match env.get_non_empty("XDG_CONFIG_HOME") {
        Some(dir) => PathBuf::from(dir),
        None => PathBuf::from(env.home()?).join(".config"),
    };
    Some(base.join("icdscan/config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_config() {
        let config = Config::parse(
            r#"
sysroot = "/srv/runtime"
abi_tuples = ["x86_64-linux-gnu", "i386-linux-gnu"]
helpers_dir = "/usr/libexec/icdscan"
check_duplicates = false
sort_vulkan = true
"#,
        )
        .unwrap();
        assert_eq!(config.sysroot, Some(PathBuf::from("/srv/runtime")));
        assert_eq!(config.abi_tuples.len(), 2);
        assert!(!config.check_duplicates);
        assert!(config.sort_vulkan);
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config, Config::default());
        assert!(config.check_duplicates);
        assert_eq!(config.sysroot_path(), PathBuf::from("/"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = Config::parse("sysroot = \"/\"\nfrobnicate = true\n").unwrap_err();
        assert!(err.starts_with("config error:"));
        assert!(err.contains("frobnicate"));
    }

    #[test]
    fn flags_override_file() {
        let config = Config::parse("abi_tuples = [\"i386-linux-gnu\"]\nsysroot = \"/a\"\n")
            .unwrap()
            .merge(&Flags {
                sysroot: Some(Path::new("/b")),
                abi_tuples: &["x86_64-linux-gnu".to_owned()],
                helpers_dir: None,
                no_duplicates: true,
            });
        assert_eq!(config.sysroot_path(), PathBuf::from("/b"));
        assert_eq!(config.abi_tuples, vec!["x86_64-linux-gnu".to_owned()]);
        assert!(!config.discovery_options().check_duplicates);
    }

    #[test]
    fn empty_flags_keep_file_values() {
        let config = Config::parse("abi_tuples = [\"i386-linux-gnu\"]\n")
            .unwrap()
            .merge(&Flags::default());
        assert_eq!(config.abi_tuples, vec!["i386-linux-gnu".to_owned()]);
        assert!(config.check_duplicates);
    }

    #[test]
    fn default_path_prefers_xdg_config_home() {
        let env = Environment::new()
            .with("HOME", "/home/me")
            .with("XDG_CONFIG_HOME", "/cfg");
        assert_eq!(
            default_config_path(&env),
            Some(PathBuf::from("/cfg/icdscan/config.toml"))
        );
        let env = Environment::new().with("HOME", "/home/me");
        assert_eq!(
            default_config_path(&env),
            Some(PathBuf::from("/home/me/.config/icdscan/config.toml"))
        );
        assert_eq!(default_config_path(&Environment::new()), None);
    }

    #[test]
    fn missing_default_is_fine_missing_explicit_is_not() {
        let dir = tempfile::tempdir().unwrap();
        let env = Environment::new().with("HOME", &dir.path().display().to_string());
        assert_eq!(Config::resolve(None, &env).unwrap(), Config::default());

        let err = Config::resolve(Some(&dir.path().join("nope.toml")), &env).unwrap_err();
        assert!(err.starts_with("config error:"));
    }

    #[test]
    fn default_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".config/icdscan/config.toml");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "sort_vulkan = true\n").unwrap();
        let env = Environment::new().with("HOME", &dir.path().display().to_string());
        assert!(Config::resolve(None, &env).unwrap().sort_vulkan);
    }
}
