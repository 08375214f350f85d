//! The graphics part of a system report: what was discovered, in the order the
//! loaders would use it.
//!
//! ```json
//! {
//!   "egl": { "icds": [...], "external_platforms": [...] },
//!   "vulkan": { "icds": [...], "explicit_layers": [...], "implicit_layers": [...] }
//! }
//! ```
//!
//! Decoding is tolerant: missing sections are empty, malformed entries are
//! skipped or turned into failed records, and unknown issue nicknames become
//! [`Issues::UNKNOWN`](crate::Issues::UNKNOWN).

use crate::egl::{EglExternalPlatform, EglIcd};
use crate::loadable::{Loadable, LoadableDetails};
use crate::vulkan::{VulkanIcd, VulkanLayer};
use crate::SchemaError;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EglSection {
    pub icds: Vec<EglIcd>,
    pub external_platforms: Vec<EglExternalPlatform>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VulkanSection {
    pub icds: Vec<VulkanIcd>,
    pub explicit_layers: Vec<VulkanLayer>,
    pub implicit_layers: Vec<VulkanLayer>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GraphicsReport {
    pub egl: EglSection,
    pub vulkan: VulkanSection,
}

fn decode_list<D: LoadableDetails>(section: Option<&Value>, key: &str) -> Vec<Loadable<D>> {
    section
        .and_then(|s| s.get(key))
        .and_then(Value::as_array)
        .map(|entries| entries.iter().filter_map(Loadable::from_report).collect())
        .unwrap_or_default()
}

impl GraphicsReport {
    /// Decode from a report object. Other top-level keys are ignored, so a
    /// full system report can be passed as-is.
    pub fn from_json(value: &Value) -> Result<Self, SchemaError> {
        if !value.is_object() {
            return Err(SchemaError::ReportNotObject);
        }
        let egl = value.get("egl");
        let vulkan = value.get("vulkan");
        Ok(Self {
            egl: EglSection {
                icds: decode_list(egl, "icds"),
                external_platforms: decode_list(egl, "external_platforms"),
            },
            vulkan: VulkanSection {
                icds: decode_list(vulkan, "icds"),
                explicit_layers: decode_list(vulkan, "explicit_layers"),
                implicit_layers: decode_list(vulkan, "implicit_layers"),
            },
        })
    }

    pub fn from_json_str(input: &str) -> Result<Self, SchemaError> {
        let value: Value = serde_json::from_str(input)?;
        Self::from_json(&value)
    }

    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, SchemaError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn to_json(&self) -> Result<Value, SchemaError> {
        Ok(serde_json::to_value(self)?)
    }
}
