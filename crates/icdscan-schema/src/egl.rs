use crate::error::LoadableError;
use crate::loadable::{Loadable, LoadableDetails};
use crate::parse::Fields;
use serde_json::{json, Map, Value};

/// Contents of a GLVND EGL vendor manifest or an EGL external platform manifest.
/// Both use the same `{"file_format_version", "ICD": {"library_path"}}` schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EglDetails {
    /// `None` only for records decoded from a report that did not carry it.
    pub file_format_version: Option<String>,
    pub library_path: String,
}

pub type EglIcd = Loadable<EglDetails>;
pub type EglExternalPlatform = Loadable<EglDetails>;

const DEFAULT_FORMAT_VERSION: &str = "1.0.0";

impl LoadableDetails for EglDetails {
    const LABEL: &'static str = "EGL";

    fn library_path(&self) -> Option<&str> {
        Some(&self.library_path)
    }

    fn set_library_path(&mut self, path: &str) -> bool {
        path.clone_into(&mut self.library_path);
        true
    }

    fn to_manifest(&self) -> Value {
        json!({
            "file_format_version": self
                .file_format_version
                .as_deref()
                .unwrap_or(DEFAULT_FORMAT_VERSION),
            "ICD": {
                "library_path": self.library_path,
            },
        })
    }

    fn write_report_fields(&self, out: &mut Map<String, Value>) {
        out.insert(
            "library_path".to_owned(),
            Value::String(self.library_path.clone()),
        );
        if let Some(version) = &self.file_format_version {
            out.insert(
                "file_format_version".to_owned(),
                Value::String(version.clone()),
            );
        }
    }

    fn from_report_fields(
        fields: &Map<String, Value>,
        json_path: &str,
    ) -> Result<Self, LoadableError> {
        let fields = Fields::new(fields, json_path, "the report entry");
        Ok(Self {
            file_format_version: fields.optional_str("file_format_version")?.map(str::to_owned),
            library_path: fields.required_str("library_path")?.to_owned(),
        })
    }
}
