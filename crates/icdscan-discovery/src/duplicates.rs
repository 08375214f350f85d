//! Duplicate detection.
//!
//! Two records are duplicates when they would make the loader open the same
//! library (and, for layers, under the same name). When ABI tuples are given,
//! each library is canonicalized once per tuple by an external helper, since
//! the same soname can resolve to a different file for each architecture.

use crate::env::Environment;
use icdscan_schema::{normalize_lexically, Loadable, LoadableDetails};
use serde_json::Value;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, trace, warn};

/// Finds the file a library name resolves to for one ABI.
pub trait LibraryInspector {
    /// Absolute path `library` resolves to for `abi_tuple`, or `None` if it
    /// cannot be found or inspected.
    fn canonical_path(&self, library: &str, abi_tuple: &str) -> Option<PathBuf>;
}

/// Runs `<helpers_dir>/<tuple>-inspect-library <library>` and reads the
/// resolved path from its JSON output:
///
/// ```json
/// { "libvulkan_intel.so": { "path": "/usr/lib/x86_64-linux-gnu/libvulkan_intel.so" } }
/// ```
#[derive(Debug, Clone)]
pub struct HelperInspector {
    helpers_dir: PathBuf,
    env: Environment,
}

impl HelperInspector {
    pub fn new(helpers_dir: impl Into<PathBuf>, env: Environment) -> Self {
        Self {
            helpers_dir: helpers_dir.into(),
            env,
        }
    }

    pub fn helper_path(&self, abi_tuple: &str) -> PathBuf {
        self.helpers_dir
            .join(format!("{abi_tuple}-inspect-library"))
    }
}

impl LibraryInspector for HelperInspector {
    fn canonical_path(&self, library: &str, abi_tuple: &str) -> Option<PathBuf> {
        let helper = self.helper_path(abi_tuple);
        let output = match Command::new(&helper)
            .arg(library)
            .env_clear()
            .envs(self.env.iter())
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
        {
            Ok(output) => output,
            Err(e) => {
                warn!("failed to run {}: {e}", helper.display());
                return None;
            }
        };
        if !output.status.success() {
            debug!(
                "{} could not inspect {library}: {}",
                helper.display(),
                output.status
            );
            return None;
        }
        parse_helper_output(&output.stdout)
    }
}

fn parse_helper_output(stdout: &[u8]) -> Option<PathBuf> {
    let value: Value = match serde_json::from_slice(stdout) {
        Ok(v) => v,
        Err(e) => {
            debug!("unparseable inspect-library output: {e}");
            return None;
        }
    };
    let path = value
        .as_object()?
        .values()
        .next()?
        .get("path")?
        .as_str()?;
    path.starts_with('/').then(|| PathBuf::from(path))
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DuplicateKey {
    name: Option<String>,
    path: PathBuf,
}

/// Flag every pair of records that resolve to the same library. Both members
/// of a pair are flagged. Failed records and meta-layers are ignored.
///
/// With no ABI tuples, or no inspector, the key is the resolved library path
/// normalized lexically; bare sonames are compared as-is.
pub fn flag_duplicates<D: LoadableDetails>(
    records: &mut [Loadable<D>],
    inspector: Option<&dyn LibraryInspector>,
    abi_tuples: &[String],
) {
    let keys: Vec<Vec<DuplicateKey>> = records
        .iter()
        .map(|record| duplicate_keys(record, inspector, abi_tuples))
        .collect();

    let mut first_seen: HashMap<DuplicateKey, usize> = HashMap::new();
    for (index, record_keys) in keys.into_iter().enumerate() {
        for key in record_keys {
            match first_seen.entry(key) {
                Entry::Vacant(slot) => {
                    slot.insert(index);
                }
                Entry::Occupied(slot) => {
                    let first = *slot.get();
                    if first != index {
                        debug!(
                            "{} duplicates {} ({})",
                            records[index].json_path().display(),
                            records[first].json_path().display(),
                            slot.key().path.display()
                        );
                        records[first].mark_duplicated();
                        records[index].mark_duplicated();
                    }
                }
            }
        }
    }
}

fn duplicate_keys<D: LoadableDetails>(
    record: &Loadable<D>,
    inspector: Option<&dyn LibraryInspector>,
    abi_tuples: &[String],
) -> Vec<DuplicateKey> {
    let Some(details) = record.details() else {
        return Vec::new();
    };
    let Some(library) = record.resolved_library_path() else {
        trace!("{} has no library of its own", record.json_path().display());
        return Vec::new();
    };
    let name = details.duplicate_name().map(str::to_owned);

    let paths: Vec<PathBuf> = match inspector {
        Some(inspector) if !abi_tuples.is_empty() => abi_tuples
            .iter()
            .filter_map(|tuple| inspector.canonical_path(&library, tuple))
            .collect(),
        _ => vec![lexical_key(&library)],
    };
    paths
        .into_iter()
        .map(|path| DuplicateKey {
            name: name.clone(),
            path,
        })
        .collect()
}

fn lexical_key(library: &str) -> PathBuf {
    if library.starts_with('/') {
        normalize_lexically(Path::new(library))
    } else {
        PathBuf::from(library)
    }
}
