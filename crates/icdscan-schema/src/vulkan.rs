use crate::error::LoadableError;
use crate::loadable::{Loadable, LoadableDetails};
use crate::parse::{layer_details, Fields};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Contents of a Vulkan ICD manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VulkanIcdDetails {
    pub file_format_version: Option<String>,
    pub library_path: String,
    pub api_version: String,
    /// `"32"` or `"64"` when the manifest declares it.
    pub library_arch: Option<String>,
    pub is_portability_driver: bool,
}

pub type VulkanIcd = Loadable<VulkanIcdDetails>;

impl VulkanIcdDetails {
    /// The format version to write: the recorded one, or the oldest one able
    /// to express this record.
    pub fn effective_format_version(&self) -> &str {
        match &self.file_format_version {
            Some(v) => v.as_str(),
            None if self.is_portability_driver => "1.0.1",
            None => "1.0.0",
        }
    }
}

impl LoadableDetails for VulkanIcdDetails {
    const LABEL: &'static str = "Vulkan ICD";

    fn library_path(&self) -> Option<&str> {
        Some(&self.library_path)
    }

    fn set_library_path(&mut self, path: &str) -> bool {
        path.clone_into(&mut self.library_path);
        true
    }

    fn to_manifest(&self) -> Value {
        let mut icd = Map::new();
        icd.insert("library_path".to_owned(), json!(self.library_path));
        icd.insert("api_version".to_owned(), json!(self.api_version));
        if let Some(arch) = &self.library_arch {
            icd.insert("library_arch".to_owned(), json!(arch));
        }
        if self.is_portability_driver {
            icd.insert("is_portability_driver".to_owned(), json!(true));
        }
        json!({
            "file_format_version": self.effective_format_version(),
            "ICD": icd,
        })
    }

    fn write_report_fields(&self, out: &mut Map<String, Value>) {
        out.insert("library_path".to_owned(), json!(self.library_path));
        out.insert("api_version".to_owned(), json!(self.api_version));
        if let Some(arch) = &self.library_arch {
            out.insert("library_arch".to_owned(), json!(arch));
        }
        out.insert(
            "portability_driver".to_owned(),
            json!(self.is_portability_driver),
        );
        if let Some(version) = &self.file_format_version {
            out.insert("file_format_version".to_owned(), json!(version));
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
            api_version: fields.required_str("api_version")?.to_owned(),
            library_arch: fields.optional_str("library_arch")?.map(str::to_owned),
            is_portability_driver: fields.optional_bool("portability_driver")?.unwrap_or(false),
        })
    }
}

/// An instance or device extension advertised by a layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Extension {
    pub name: String,
    pub spec_version: String,
    /// Only meaningful for device extensions.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub entrypoints: Vec<String>,
}

/// An environment variable that enables or disables an implicit layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

impl EnvVar {
    fn to_json(&self) -> Value {
        let mut obj = Map::new();
        obj.insert(self.name.clone(), json!(self.value));
        Value::Object(obj)
    }
}

/// What a layer loads: its own library, or a list of other layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerTarget {
    Library(String),
    /// A meta-layer. Never empty.
    Components(Vec<String>),
}

/// Contents of one entry of a Vulkan layer manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VulkanLayerDetails {
    pub file_format_version: Option<String>,
    pub name: String,
    /// `"GLOBAL"` or `"INSTANCE"`.
    pub layer_type: String,
    pub api_version: String,
    pub implementation_version: String,
    pub description: String,
    pub target: LayerTarget,
    pub functions: BTreeMap<String, String>,
    pub pre_instance_functions: BTreeMap<String, String>,
    pub instance_extensions: Vec<Extension>,
    pub device_extensions: Vec<Extension>,
    pub enable_env_var: Option<EnvVar>,
    pub disable_env_var: Option<EnvVar>,
}

pub type VulkanLayer = Loadable<VulkanLayerDetails>;

impl VulkanLayerDetails {
    pub fn component_layers(&self) -> &[String] {
        match &self.target {
            LayerTarget::Components(names) => names,
            LayerTarget::Library(_) => &[],
        }
    }

    /// The recorded format version, or the oldest one that can express the
    /// features this layer uses.
    pub fn effective_format_version(&self) -> &str {
        if let Some(v) = &self.file_format_version {
            return v;
        }
        if !self.pre_instance_functions.is_empty() {
            "1.1.2"
        } else if matches!(self.target, LayerTarget::Components(_)) {
            "1.1.1"
        } else {
            "1.1.0"
        }
    }

    /// The layer object as it appears under `"layer"` in a manifest.
    fn entry_json(&self, out: &mut Map<String, Value>) {
        out.insert("name".to_owned(), json!(self.name));
        out.insert("type".to_owned(), json!(self.layer_type));
        match &self.target {
            LayerTarget::Library(lib) => {
                out.insert("library_path".to_owned(), json!(lib));
            }
            LayerTarget::Components(names) => {
                out.insert("component_layers".to_owned(), json!(names));
            }
        }
        out.insert("api_version".to_owned(), json!(self.api_version));
        out.insert(
            "implementation_version".to_owned(),
            json!(self.implementation_version),
        );
        out.insert("description".to_owned(), json!(self.description));
        if !self.functions.is_empty() {
            out.insert("functions".to_owned(), json!(self.functions));
        }
        if !self.pre_instance_functions.is_empty() {
            out.insert(
                "pre_instance_functions".to_owned(),
                json!(self.pre_instance_functions),
            );
        }
        if !self.instance_extensions.is_empty() {
            out.insert(
                "instance_extensions".to_owned(),
                json!(self.instance_extensions),
            );
        }
        if !self.device_extensions.is_empty() {
            out.insert(
                "device_extensions".to_owned(),
                json!(self.device_extensions),
            );
        }
        if let Some(var) = &self.enable_env_var {
            out.insert("enable_environment".to_owned(), var.to_json());
        }
        if let Some(var) = &self.disable_env_var {
            out.insert("disable_environment".to_owned(), var.to_json());
        }
    }
}

impl LoadableDetails for VulkanLayerDetails {
    const LABEL: &'static str = "Vulkan layer";

    fn library_path(&self) -> Option<&str> {
        match &self.target {
            LayerTarget::Library(lib) => Some(lib),
            LayerTarget::Components(_) => None,
        }
    }

    fn set_library_path(&mut self, path: &str) -> bool {
        match &mut self.target {
            LayerTarget::Library(lib) => {
                path.clone_into(lib);
                true
            }
            LayerTarget::Components(_) => false,
        }
    }

    fn duplicate_name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn to_manifest(&self) -> Value {
        let mut layer = Map::new();
        self.entry_json(&mut layer);
        json!({
            "file_format_version": self.effective_format_version(),
            "layer": layer,
        })
    }

    fn write_report_fields(&self, out: &mut Map<String, Value>) {
        self.entry_json(out);
        if let Some(version) = &self.file_format_version {
            out.insert("file_format_version".to_owned(), json!(version));
        }
    }

    fn from_report_fields(
        fields: &Map<String, Value>,
        json_path: &str,
    ) -> Result<Self, LoadableError> {
        let fields = Fields::new(fields, json_path, "the report entry");
        let version = fields.optional_str("file_format_version")?.map(str::to_owned);
        layer_details(&fields, version)
    }
}
