use crate::error::{LoadableError, MANIFEST_ERROR_DOMAIN, MANIFEST_ERROR_INVALID};
use crate::issues::Issues;
use crate::SchemaError;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Kind-specific contents of a successfully parsed manifest.
///
/// Implemented by [`EglDetails`](crate::EglDetails),
/// [`VulkanIcdDetails`](crate::VulkanIcdDetails) and
/// [`VulkanLayerDetails`](crate::VulkanLayerDetails).
pub trait LoadableDetails: Clone + PartialEq + fmt::Debug {
    /// Short human-readable kind, used in log messages.
    const LABEL: &'static str;

    fn library_path(&self) -> Option<&str>;

    /// Point the record at a different library. Returns `false` if the record
    /// has no library of its own (a meta-layer) and was left untouched.
    fn set_library_path(&mut self, path: &str) -> bool;

    /// Extra identity that must also match for two records to be duplicates.
    fn duplicate_name(&self) -> Option<&str> {
        None
    }

    /// The manifest JSON document a loader would read.
    fn to_manifest(&self) -> Value;

    /// Append this record's success fields to a report object.
    fn write_report_fields(&self, out: &mut Map<String, Value>);

    /// Rebuild details from the success fields of a report object.
    fn from_report_fields(fields: &Map<String, Value>, json_path: &str)
        -> Result<Self, LoadableError>;
}

/// One manifest-derived record: an EGL ICD, EGL external platform, Vulkan ICD
/// or Vulkan layer.
///
/// A record is either loaded (carrying `D`) or failed (carrying a
/// [`LoadableError`]), never both. The only mutation after construction is
/// [`mark_duplicated`](Self::mark_duplicated).
#[derive(Debug, Clone, PartialEq)]
pub struct Loadable<D> {
    json_path: PathBuf,
    issues: Issues,
    contents: Result<D, LoadableError>,
}

impl<D: LoadableDetails> Loadable<D> {
    pub fn new(json_path: impl AsRef<Path>, details: D) -> Self {
        Self {
            json_path: absolute_path(json_path.as_ref()),
            issues: Issues::empty(),
            contents: Ok(details),
        }
    }

    pub fn failed(json_path: impl AsRef<Path>, error: LoadableError) -> Self {
        Self {
            json_path: absolute_path(json_path.as_ref()),
            issues: error.issues(),
            contents: Err(error),
        }
    }

    /// Assemble a record from already-known parts, e.g. when decoding a report.
    /// `DUPLICATED` is dropped from failed records.
    pub fn from_parts(
        json_path: impl AsRef<Path>,
        mut issues: Issues,
        contents: Result<D, LoadableError>,
    ) -> Self {
        if contents.is_err() {
            issues.remove(Issues::DUPLICATED);
        }
        Self {
            json_path: absolute_path(json_path.as_ref()),
            issues,
            contents,
        }
    }

    #[inline]
    pub fn json_path(&self) -> &Path {
        &self.json_path
    }

    #[inline]
    pub fn issues(&self) -> Issues {
        self.issues
    }

    #[inline]
    pub fn contents(&self) -> Result<&D, &LoadableError> {
        self.contents.as_ref()
    }

    pub fn details(&self) -> Option<&D> {
        self.contents.as_ref().ok()
    }

    pub fn error(&self) -> Option<&LoadableError> {
        self.contents.as_ref().err()
    }

    pub fn is_loaded(&self) -> bool {
        self.contents.is_ok()
    }

    /// The library path exactly as written in the manifest.
    pub fn library_path(&self) -> Option<&str> {
        self.details().and_then(LoadableDetails::library_path)
    }

    /// The library path as the loader would pass it to `dlopen()`.
    pub fn resolved_library_path(&self) -> Option<String> {
        self.library_path()
            .map(|lib| resolve_library_path(lib, &self.json_path))
    }

    /// A copy of this record pointing at `new_path`. Failed records and
    /// meta-layers come back unchanged.
    #[must_use]
    pub fn replace_library_path(&self, new_path: &str) -> Self {
        let mut copy = self.clone();
        if let Ok(details) = &mut copy.contents {
            if !details.set_library_path(new_path) {
                debug!(
                    "{} {} has no library path to replace",
                    D::LABEL,
                    self.json_path.display()
                );
            }
        }
        copy
    }

    /// Flag this record as a duplicate. Failed records are never flagged.
    pub fn mark_duplicated(&mut self) {
        if self.contents.is_ok() {
            self.issues.insert(Issues::DUPLICATED);
        }
    }

    /// Serialize the manifest for this record to `path`, atomically.
    pub fn write_to_file(&self, path: &Path) -> Result<(), SchemaError> {
        let details = self
            .details()
            .ok_or_else(|| SchemaError::NotLoadable(self.json_path.display().to_string()))?;
        let mut content = serde_json::to_string_pretty(&details.to_manifest())?;
        content.push('\n');

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| SchemaError::Io(e.error))?;
        Ok(())
    }

    /// Encode as one entry of a system report.
    pub fn to_report(&self) -> Value {
        let mut out = Map::new();
        out.insert(
            "json_path".to_owned(),
            Value::String(self.json_path.to_string_lossy().into_owned()),
        );
        match &self.contents {
            Ok(details) => details.write_report_fields(&mut out),
            Err(err) => {
                out.insert(
                    "error-domain".to_owned(),
                    Value::String(err.domain().to_owned()),
                );
                out.insert("error-code".to_owned(), Value::from(err.code()));
                out.insert("error".to_owned(), Value::String(err.to_string()));
            }
        }
        out.insert(
            "issues".to_owned(),
            serde_json::to_value(self.issues).unwrap_or_default(),
        );
        Value::Object(out)
    }

    /// Decode one entry of a system report. Returns `None` for entries that
    /// are not objects or lack a `json_path`.
    pub fn from_report(value: &Value) -> Option<Self> {
        let Some(obj) = value.as_object() else {
            debug!("ignoring {} report entry that is not an object", D::LABEL);
            return None;
        };
        let Some(json_path) = obj.get("json_path").and_then(Value::as_str) else {
            debug!("ignoring {} report entry without json_path", D::LABEL);
            return None;
        };

        let mut issues = match obj.get("issues") {
            Some(nicks) => Issues::deserialize(nicks).unwrap_or(Issues::UNKNOWN),
            None => Issues::empty(),
        };

        let contents = if let Some(message) = obj.get("error") {
            Err(LoadableError::Reported {
                domain: obj
                    .get("error-domain")
                    .and_then(Value::as_str)
                    .unwrap_or(MANIFEST_ERROR_DOMAIN)
                    .to_owned(),
                code: obj
                    .get("error-code")
                    .and_then(Value::as_i64)
                    .and_then(|c| i32::try_from(c).ok())
                    .unwrap_or(MANIFEST_ERROR_INVALID),
                message: message
                    .as_str()
                    .map_or_else(|| message.to_string(), str::to_owned),
            })
        } else {
            D::from_report_fields(obj, json_path).inspect_err(|e| issues |= e.issues())
        };

        Some(Self::from_parts(json_path, issues, contents))
    }
}

impl<D: LoadableDetails> Serialize for Loadable<D> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_report().serialize(serializer)
    }
}

/// Resolve a manifest's `library_path` the way the loaders do.
///
/// Absolute paths and bare sonames (no `/`) are returned unchanged. Anything
/// else is relative to the directory containing the manifest.
pub fn resolve_library_path(library_path: &str, json_path: &Path) -> String {
    if library_path.starts_with('/') || !library_path.contains('/') {
        return library_path.to_owned();
    }
    let dir = json_path.parent().unwrap_or_else(|| Path::new("/"));
    dir.join(library_path).to_string_lossy().into_owned()
}

/// Resolve `.` and `..` components without touching the filesystem.
/// `..` at the root stays at the root.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let text = path.to_string_lossy();
    let mut parts: Vec<&str> = Vec::new();
    for component in text.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    PathBuf::from(format!("/{}", parts.join("/")))
}

/// Make `path` absolute against the current directory and normalize it.
pub fn absolute_path(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return normalize_lexically(path);
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
    normalize_lexically(&cwd.join(path))
}
