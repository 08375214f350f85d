//! Loadable model, manifest parsing and system report codec for icdscan.
//!
//! This crate defines the data layer: the [`Loadable`] record shared by EGL
//! ICDs, EGL external platforms, Vulkan ICDs and Vulkan layers, parsers for
//! their JSON manifest schemas as GLVND and the Vulkan loader read them,
//! manifest writing, the dotted-version comparator, issue flags, and the
//! [`GraphicsReport`] codec. It performs no directory walking and reads no
//! environment variables.

pub mod egl;
pub mod error;
pub mod issues;
pub mod loadable;
pub mod parse;
pub mod report;
pub mod version;
pub mod vulkan;

pub use egl::{EglDetails, EglExternalPlatform, EglIcd};
pub use error::LoadableError;
pub use issues::Issues;
pub use loadable::{
    absolute_path, normalize_lexically, resolve_library_path, Loadable, LoadableDetails,
};
pub use parse::{parse_egl_icd, parse_vulkan_icd, parse_vulkan_layers, unreadable};
pub use report::{EglSection, GraphicsReport, VulkanSection};
pub use version::compare_versions;
pub use vulkan::{
    EnvVar, Extension, LayerTarget, VulkanIcd, VulkanIcdDetails, VulkanLayer, VulkanLayerDetails,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("manifest I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("cannot write a manifest for {0}: it failed to load")]
    NotLoadable(String),
    #[error("report is not a JSON object")]
    ReportNotObject,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_error_display_not_loadable() {
        let e = SchemaError::NotLoadable("/etc/vulkan/icd.d/bad.json".to_owned());
        assert!(e.to_string().contains("/etc/vulkan/icd.d/bad.json"));
    }

    #[test]
    fn schema_error_display_report_not_object() {
        assert!(SchemaError::ReportNotObject
            .to_string()
            .contains("not a JSON object"));
    }
}
