//! Manifest parsing for EGL ICDs, EGL external platforms, Vulkan ICDs and
//! Vulkan layers.
//!
//! Parsing never fails as a whole: a file that cannot be used becomes a single
//! failed record, and a bad entry in a `layers` array becomes a failed record
//! next to its valid siblings.

use crate::egl::{EglDetails, EglIcd};
use crate::error::LoadableError;
use crate::loadable::Loadable;
use crate::version::{is_icd_format_version, is_supported_layer_format_version};
use crate::vulkan::{
    EnvVar, Extension, LayerTarget, VulkanIcd, VulkanIcdDetails, VulkanLayer, VulkanLayerDetails,
};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, trace};

/// Typed accessors over one JSON object, producing [`LoadableError::Invalid`]
/// messages that name the offending field.
pub(crate) struct Fields<'a> {
    obj: &'a Map<String, Value>,
    path: &'a str,
    context: &'a str,
}

impl<'a> Fields<'a> {
    pub(crate) fn new(obj: &'a Map<String, Value>, path: &'a str, context: &'a str) -> Self {
        Self { obj, path, context }
    }

    fn invalid(&self, message: String) -> LoadableError {
        LoadableError::invalid(self.path, message)
    }

    pub(crate) fn required_str(&self, key: &str) -> Result<&'a str, LoadableError> {
        self.obj.get(key).and_then(Value::as_str).ok_or_else(|| {
            self.invalid(format!(
                "\"{key}\" in {} is missing or not a string",
                self.context
            ))
        })
    }

    pub(crate) fn optional_str(&self, key: &str) -> Result<Option<&'a str>, LoadableError> {
        match self.obj.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(_) => Err(self.invalid(format!(
                "\"{key}\" in {} is not a string",
                self.context
            ))),
        }
    }

    pub(crate) fn optional_bool(&self, key: &str) -> Result<Option<bool>, LoadableError> {
        match self.obj.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(_) => Err(self.invalid(format!(
                "\"{key}\" in {} is not a boolean",
                self.context
            ))),
        }
    }

    pub(crate) fn optional_string_list(&self, key: &str) -> Result<Vec<String>, LoadableError> {
        let Some(value) = self.obj.get(key) else {
            return Ok(Vec::new());
        };
        let mistyped = || {
            self.invalid(format!(
                "\"{key}\" in {} is not an array of strings",
                self.context
            ))
        };
        value
            .as_array()
            .ok_or_else(mistyped)?
            .iter()
            .map(|item| item.as_str().map(str::to_owned).ok_or_else(mistyped))
            .collect()
    }

    pub(crate) fn optional_string_map(
        &self,
        key: &str,
    ) -> Result<BTreeMap<String, String>, LoadableError> {
        let Some(value) = self.obj.get(key) else {
            return Ok(BTreeMap::new());
        };
        let mistyped = || {
            self.invalid(format!(
                "\"{key}\" in {} is not an object mapping strings to strings",
                self.context
            ))
        };
        value
            .as_object()
            .ok_or_else(mistyped)?
            .iter()
            .map(|(k, v)| {
                v.as_str()
                    .map(|s| (k.clone(), s.to_owned()))
                    .ok_or_else(mistyped)
            })
            .collect()
    }

    /// `{"NAME": "value"}`: only the first member is meaningful to the loader.
    pub(crate) fn optional_env_var(&self, key: &str) -> Result<Option<EnvVar>, LoadableError> {
        let Some(value) = self.obj.get(key) else {
            return Ok(None);
        };
        let mistyped = || {
            self.invalid(format!(
                "\"{key}\" in {} is not an object with a string value",
                self.context
            ))
        };
        let obj = value.as_object().ok_or_else(mistyped)?;
        match obj.iter().next() {
            None => Ok(None),
            Some((name, value)) => Ok(Some(EnvVar {
                name: name.clone(),
                value: value.as_str().ok_or_else(mistyped)?.to_owned(),
            })),
        }
    }

    pub(crate) fn optional_extensions(&self, key: &str) -> Result<Vec<Extension>, LoadableError> {
        let Some(value) = self.obj.get(key) else {
            return Ok(Vec::new());
        };
        let Some(items) = value.as_array() else {
            return Err(self.invalid(format!(
                "\"{key}\" in {} is not an array",
                self.context
            )));
        };
        let context = format!("an entry of \"{key}\"");
        items
            .iter()
            .map(|item| {
                let Some(obj) = item.as_object() else {
                    return Err(self.invalid(format!("{context} is not an object")));
                };
                let fields = Fields::new(obj, self.path, &context);
                // Some manifests in the wild write spec_version as a number.
                let spec_version = match obj.get("spec_version") {
                    Some(Value::Number(n)) => n.to_string(),
                    _ => fields.required_str("spec_version")?.to_owned(),
                };
                Ok(Extension {
                    name: fields.required_str("name")?.to_owned(),
                    spec_version,
                    entrypoints: fields.optional_string_list("entrypoints")?,
                })
            })
            .collect()
    }
}

fn display_path(json_path: &Path) -> String {
    json_path.to_string_lossy().into_owned()
}

fn parse_root(path: &str, contents: &str) -> Result<Map<String, Value>, LoadableError> {
    let value: Value = serde_json::from_str(contents).map_err(|e| LoadableError::Json {
        path: path.to_owned(),
        message: e.to_string(),
    })?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(LoadableError::invalid(
            path,
            "expected a JSON object at top level",
        )),
    }
}

/// Shared ICD envelope: `file_format_version` 1.0.x and an `ICD` object.
fn parse_icd_envelope(
    path: &str,
    contents: &str,
) -> Result<(String, Map<String, Value>), LoadableError> {
    let mut root = parse_root(path, contents)?;
    let version = Fields::new(&root, path, "the top-level object")
        .required_str("file_format_version")?
        .to_owned();
    if !is_icd_format_version(&version) {
        return Err(LoadableError::UnsupportedVersion {
            path: path.to_owned(),
            version,
        });
    }
    match root.remove("ICD") {
        Some(Value::Object(icd)) => Ok((version, icd)),
        _ => Err(LoadableError::invalid(path, "no \"ICD\" object")),
    }
}

pub(crate) fn egl_details(path: &str, contents: &str) -> Result<EglDetails, LoadableError> {
    let (version, icd) = parse_icd_envelope(path, contents)?;
    let fields = Fields::new(&icd, path, "the \"ICD\" object");
    Ok(EglDetails {
        file_format_version: Some(version),
        library_path: fields.required_str("library_path")?.to_owned(),
    })
}

fn vulkan_icd_details(path: &str, contents: &str) -> Result<VulkanIcdDetails, LoadableError> {
    let (version, icd) = parse_icd_envelope(path, contents)?;
    let fields = Fields::new(&icd, path, "the \"ICD\" object");
    Ok(VulkanIcdDetails {
        file_format_version: Some(version),
        library_path: fields.required_str("library_path")?.to_owned(),
        api_version: fields.required_str("api_version")?.to_owned(),
        library_arch: fields.optional_str("library_arch")?.map(str::to_owned),
        is_portability_driver: fields.optional_bool("is_portability_driver")?.unwrap_or(false),
    })
}

/// Parse an EGL ICD (GLVND vendor) or EGL external platform manifest.
pub fn parse_egl_icd(json_path: &Path, contents: &str) -> EglIcd {
    let path = display_path(json_path);
    trace!("parsing EGL manifest {path}");
    match egl_details(&path, contents) {
        Ok(details) => Loadable::new(json_path, details),
        Err(e) => {
            debug!("failed to load EGL manifest: {e}");
            Loadable::failed(json_path, e)
        }
    }
}

/// Parse a Vulkan ICD manifest.
pub fn parse_vulkan_icd(json_path: &Path, contents: &str) -> VulkanIcd {
    let path = display_path(json_path);
    trace!("parsing Vulkan ICD manifest {path}");
    match vulkan_icd_details(&path, contents) {
        Ok(details) => Loadable::new(json_path, details),
        Err(e) => {
            debug!("failed to load Vulkan ICD manifest: {e}");
            Loadable::failed(json_path, e)
        }
    }
}

/// Parse the fields of one layer object, shared by manifests and reports.
pub(crate) fn layer_details(
    fields: &Fields<'_>,
    file_format_version: Option<String>,
) -> Result<VulkanLayerDetails, LoadableError> {
    let name = fields.required_str("name")?.to_owned();
    let library_path = fields.optional_str("library_path")?;
    let component_layers = fields.optional_string_list("component_layers")?;

    let target = match (library_path, component_layers.is_empty()) {
        (Some(lib), true) => LayerTarget::Library(lib.to_owned()),
        (None, false) => LayerTarget::Components(component_layers),
        (Some(_), false) => {
            return Err(fields.invalid(format!(
                "layer \"{name}\" has both \"library_path\" and \"component_layers\""
            )))
        }
        (None, true) => {
            return Err(fields.invalid(format!(
                "layer \"{name}\" has neither \"library_path\" nor \"component_layers\""
            )))
        }
    };

    Ok(VulkanLayerDetails {
        file_format_version,
        layer_type: fields.required_str("type")?.to_owned(),
        api_version: fields.required_str("api_version")?.to_owned(),
        implementation_version: fields.required_str("implementation_version")?.to_owned(),
        description: fields.required_str("description")?.to_owned(),
        target,
        functions: fields.optional_string_map("functions")?,
        pre_instance_functions: fields.optional_string_map("pre_instance_functions")?,
        instance_extensions: fields.optional_extensions("instance_extensions")?,
        device_extensions: fields.optional_extensions("device_extensions")?,
        enable_env_var: fields.optional_env_var("enable_environment")?,
        disable_env_var: fields.optional_env_var("disable_environment")?,
        name,
    })
}

fn layer_entry(
    json_path: &Path,
    path: &str,
    version: &str,
    entry: &Value,
    context: &str,
) -> VulkanLayer {
    let result = match entry.as_object() {
        Some(obj) => layer_details(&Fields::new(obj, path, context), Some(version.to_owned())),
        None => Err(LoadableError::invalid(
            path,
            format!("{context} is not an object"),
        )),
    };
    match result {
        Ok(details) => Loadable::new(json_path, details),
        Err(e) => {
            debug!("failed to load Vulkan layer: {e}");
            Loadable::failed(json_path, e)
        }
    }
}

/// Parse a Vulkan layer manifest, which may define one layer (`layer`) or
/// several (`layers`).
pub fn parse_vulkan_layers(json_path: &Path, contents: &str) -> Vec<VulkanLayer> {
    let path = display_path(json_path);
    trace!("parsing Vulkan layer manifest {path}");

    let fail = |e: LoadableError| -> Vec<VulkanLayer> {
        debug!("failed to load Vulkan layer manifest: {e}");
        vec![Loadable::failed(json_path, e)]
    };

    let root = match parse_root(&path, contents) {
        Ok(root) => root,
        Err(e) => return fail(e),
    };
    let version = match Fields::new(&root, &path, "the top-level object")
        .required_str("file_format_version")
    {
        Ok(v) => v,
        Err(e) => return fail(e),
    };
    if !is_supported_layer_format_version(version) {
        return fail(LoadableError::UnsupportedVersion {
            path: path.clone(),
            version: version.to_owned(),
        });
    }

    if let Some(layers) = root.get("layers") {
        let Some(entries) = layers.as_array() else {
            return fail(LoadableError::invalid(&path, "\"layers\" is not an array"));
        };
        entries
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                layer_entry(json_path, &path, version, entry, &format!("\"layers\"[{i}]"))
            })
            .collect()
    } else if let Some(layer) = root.get("layer") {
        vec![layer_entry(json_path, &path, version, layer, "the \"layer\" object")]
    } else {
        fail(LoadableError::invalid(
            &path,
            "missing both the \"layer\" and \"layers\" fields",
        ))
    }
}

/// Record for a manifest that could not be read at all.
pub fn unreadable<D: crate::LoadableDetails>(json_path: &Path, err: &std::io::Error) -> Loadable<D> {
    let e = LoadableError::io(display_path(json_path), err);
    debug!("failed to read {} manifest: {e}", D::LABEL);
    Loadable::failed(json_path, e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issues::Issues;

    fn p(s: &str) -> &Path {
        Path::new(s)
    }

    #[test]
    fn vulkan_icd_minimal() {
        let icd = parse_vulkan_icd(
            p("/etc/vulkan/icd.d/intel.json"),
            r#"{"file_format_version":"1.0.0","ICD":{"library_path":"libvulkan_intel.so","api_version":"1.2.142"}}"#,
        );
        assert_eq!(icd.issues(), Issues::empty());
        let d = icd.details().unwrap();
        assert_eq!(d.library_path, "libvulkan_intel.so");
        assert_eq!(d.api_version, "1.2.142");
        assert!(!d.is_portability_driver);
        assert_eq!(icd.library_path(), Some("libvulkan_intel.so"));
    }

    #[test]
    fn vulkan_icd_optional_fields() {
        let icd = parse_vulkan_icd(
            p("/x.json"),
            r#"{"file_format_version":"1.0.1","ICD":{"library_path":"/lib/libMoltenVK.so","api_version":"1.3.0","library_arch":"64","is_portability_driver":true}}"#,
        );
        let d = icd.details().unwrap();
        assert_eq!(d.library_arch.as_deref(), Some("64"));
        assert!(d.is_portability_driver);
    }

    #[test]
    fn vulkan_icd_requires_api_version() {
        let icd = parse_vulkan_icd(
            p("/x.json"),
            r#"{"file_format_version":"1.0.0","ICD":{"library_path":"libfoo.so"}}"#,
        );
        assert_eq!(icd.issues(), Issues::CANNOT_LOAD);
        assert!(icd.error().unwrap().to_string().contains("api_version"));
    }

    #[test]
    fn egl_does_not_require_api_version() {
        let icd = parse_egl_icd(
            p("/usr/share/glvnd/egl_vendor.d/50_mesa.json"),
            r#"{"file_format_version":"1.0.0","ICD":{"library_path":"libEGL_mesa.so.0"}}"#,
        );
        assert!(icd.is_loaded());
        assert_eq!(icd.library_path(), Some("libEGL_mesa.so.0"));
    }

    #[test]
    fn icd_wrong_format_version_is_unsupported() {
        for version in ["2.0.0", "1.0", "1.01.0"] {
            let icd = parse_egl_icd(
                p("/x.json"),
                &format!(r#"{{"file_format_version":"{version}","ICD":{{"library_path":"libEGL.so"}}}}"#),
            );
            assert_eq!(icd.issues(), Issues::UNSUPPORTED, "{version}");
        }
    }

    #[test]
    fn icd_missing_format_version_cannot_load() {
        let icd = parse_egl_icd(p("/x.json"), r#"{"ICD":{"library_path":"libEGL.so"}}"#);
        assert_eq!(icd.issues(), Issues::CANNOT_LOAD);
    }

    #[test]
    fn icd_not_json() {
        let icd = parse_vulkan_icd(p("/x.json"), "this is not json");
        assert_eq!(icd.issues(), Issues::CANNOT_LOAD);
        assert!(matches!(icd.error(), Some(LoadableError::Json { .. })));
    }

    #[test]
    fn icd_top_level_array() {
        let icd = parse_vulkan_icd(p("/x.json"), "[]");
        assert_eq!(icd.issues(), Issues::CANNOT_LOAD);
    }

    #[test]
    fn icd_missing_icd_object() {
        let icd = parse_vulkan_icd(p("/x.json"), r#"{"file_format_version":"1.0.0"}"#);
        assert!(icd.error().unwrap().to_string().contains("ICD"));
    }

    const LAYER: &str = r#"{
        "file_format_version": "1.1.2",
        "layer": {
            "name": "VK_LAYER_MANGOHUD_overlay",
            "type": "GLOBAL",
            "library_path": "/usr/$LIB/mangohud/libMangoHud.so",
            "api_version": "1.3.0",
            "implementation_version": "1",
            "description": "Vulkan Hud Overlay",
            "functions": {"vkGetInstanceProcAddr": "overlay_GetInstanceProcAddr"},
            "pre_instance_functions": {"vkEnumerateInstanceExtensionProperties": "overlay_Enum"},
            "instance_extensions": [{"name": "VK_EXT_debug_report", "spec_version": "6"}],
            "device_extensions": [{"name": "VK_EXT_debug_marker", "spec_version": 4, "entrypoints": ["vkCmdDebugMarkerBeginEXT"]}],
            "enable_environment": {"MANGOHUD": "1"},
            "disable_environment": {"DISABLE_MANGOHUD": "1"}
        }
    }"#;

    #[test]
    fn layer_full() {
        let layers = parse_vulkan_layers(p("/usr/share/vulkan/implicit_layer.d/MangoHud.json"), LAYER);
        assert_eq!(layers.len(), 1);
        let d = layers[0].details().unwrap();
        assert_eq!(d.name, "VK_LAYER_MANGOHUD_overlay");
        assert_eq!(d.layer_type, "GLOBAL");
        assert_eq!(d.file_format_version.as_deref(), Some("1.1.2"));
        assert_eq!(
            d.target,
            LayerTarget::Library("/usr/$LIB/mangohud/libMangoHud.so".to_owned())
        );
        assert_eq!(d.functions["vkGetInstanceProcAddr"], "overlay_GetInstanceProcAddr");
        assert_eq!(d.instance_extensions[0].spec_version, "6");
        assert_eq!(d.device_extensions[0].spec_version, "4");
        assert_eq!(d.device_extensions[0].entrypoints, vec!["vkCmdDebugMarkerBeginEXT"]);
        assert_eq!(d.enable_env_var.as_ref().unwrap().name, "MANGOHUD");
        assert_eq!(d.disable_env_var.as_ref().unwrap().value, "1");
    }

    #[test]
    fn layer_format_version_1_2_0_accepted() {
        let layers = parse_vulkan_layers(
            p("/x.json"),
            r#"{"file_format_version":"1.2.0","layer":{"name":"L","type":"GLOBAL","library_path":"libL.so","api_version":"1.3.0","implementation_version":"1","description":"d"}}"#,
        );
        assert!(layers[0].is_loaded());
    }

    #[test]
    fn layer_format_version_too_new() {
        for version in ["1.3.0", "1.10.0", "1.99999999999999999999.0"] {
            let layers = parse_vulkan_layers(
                p("/x.json"),
                &format!(r#"{{"file_format_version":"{version}","layer":{{}}}}"#),
            );
            assert_eq!(layers.len(), 1);
            assert_eq!(layers[0].issues(), Issues::UNSUPPORTED, "{version}");
        }
    }

    #[test]
    fn layer_both_library_and_components_is_error() {
        let layers = parse_vulkan_layers(
            p("/x.json"),
            r#"{"file_format_version":"1.1.1","layer":{"name":"L","type":"GLOBAL","library_path":"libL.so","component_layers":["A"],"api_version":"1","implementation_version":"1","description":"d"}}"#,
        );
        assert_eq!(layers[0].issues(), Issues::CANNOT_LOAD);
        assert!(layers[0].error().unwrap().to_string().contains("both"));
    }

    #[test]
    fn layer_neither_library_nor_components_is_error() {
        let layers = parse_vulkan_layers(
            p("/x.json"),
            r#"{"file_format_version":"1.1.1","layer":{"name":"L","type":"GLOBAL","component_layers":[],"api_version":"1","implementation_version":"1","description":"d"}}"#,
        );
        assert!(layers[0].error().unwrap().to_string().contains("neither"));
    }

    #[test]
    fn meta_layer() {
        let layers = parse_vulkan_layers(
            p("/x.json"),
            r#"{"file_format_version":"1.1.1","layer":{"name":"VK_LAYER_KHRONOS_meta","type":"GLOBAL","component_layers":["VK_LAYER_KHRONOS_validation","VK_LAYER_LUNARG_api_dump"],"api_version":"1.3.0","implementation_version":"1","description":"meta"}}"#,
        );
        let d = layers[0].details().unwrap();
        assert_eq!(
            d.target,
            LayerTarget::Components(vec![
                "VK_LAYER_KHRONOS_validation".to_owned(),
                "VK_LAYER_LUNARG_api_dump".to_owned()
            ])
        );
        assert_eq!(layers[0].library_path(), None);
    }

    #[test]
    fn layers_array_isolates_bad_entries() {
        let layers = parse_vulkan_layers(
            p("/x.json"),
            r#"{"file_format_version":"1.0.1","layers":[
                {"name":"A","type":"GLOBAL","library_path":"libA.so","api_version":"1","implementation_version":"1","description":"a"},
                {"name":"B","type":"GLOBAL","api_version":"1","implementation_version":"1","description":"b"},
                "garbage",
                {"name":"C","type":"INSTANCE","library_path":"libC.so","api_version":"1","implementation_version":"1","description":"c"}
            ]}"#,
        );
        assert_eq!(layers.len(), 4);
        assert!(layers[0].is_loaded());
        assert!(!layers[1].is_loaded());
        assert!(!layers[2].is_loaded());
        assert!(layers[3].is_loaded());
        assert_eq!(layers[3].details().unwrap().name, "C");
    }

    #[test]
    fn layer_missing_both_layer_and_layers() {
        let layers = parse_vulkan_layers(p("/x.json"), r#"{"file_format_version":"1.0.0"}"#);
        assert_eq!(layers.len(), 1);
        assert_eq!(layers[0].issues(), Issues::CANNOT_LOAD);
    }

    #[test]
    fn layer_missing_required_description() {
        let layers = parse_vulkan_layers(
            p("/x.json"),
            r#"{"file_format_version":"1.0.0","layer":{"name":"L","type":"GLOBAL","library_path":"libL.so","api_version":"1","implementation_version":"1"}}"#,
        );
        assert!(layers[0].error().unwrap().to_string().contains("description"));
    }

    #[test]
    fn layer_mistyped_functions() {
        let layers = parse_vulkan_layers(
            p("/x.json"),
            r#"{"file_format_version":"1.0.0","layer":{"name":"L","type":"GLOBAL","library_path":"libL.so","api_version":"1","implementation_version":"1","description":"d","functions":{"vkFoo":3}}}"#,
        );
        assert_eq!(layers[0].issues(), Issues::CANNOT_LOAD);
    }

    #[test]
    fn unreadable_carries_io_error() {
        let err = std::io::Error::from(std::io::ErrorKind::NotFound);
        let icd: VulkanIcd = unreadable(p("/missing.json"), &err);
        assert_eq!(icd.issues(), Issues::CANNOT_LOAD);
        assert!(matches!(icd.error(), Some(LoadableError::Io { .. })));
    }
}
