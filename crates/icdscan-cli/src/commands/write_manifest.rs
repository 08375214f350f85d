use super::show_report::load;
use super::EXIT_SUCCESS;
use icdscan_discovery::LoaderKind;
use icdscan_schema::{Loadable, LoadableDetails};
use std::path::Path;
use std::str::FromStr;

/// Re-serialize record `index` of `kind` from a saved report as a manifest,
/// optionally pointing it at a different library.
pub fn run(
    report_path: &Path,
    kind: &str,
    index: usize,
    dest: &Path,
    library_path: Option<&str>,
) -> Result<u8, String> {
    let kind = LoaderKind::from_str(kind).map_err(|e| e.to_string())?;
    let report = load(report_path)?;
    match kind {
        LoaderKind::EglIcd => write_one(&report.egl.icds, kind, index, dest, library_path),
        LoaderKind::EglExternalPlatform => {
            write_one(&report.egl.external_platforms, kind, index, dest, library_path)
        }
        LoaderKind::VulkanIcd => write_one(&report.vulkan.icds, kind, index, dest, library_path),
        LoaderKind::VulkanExplicitLayer => {
            write_one(&report.vulkan.explicit_layers, kind, index, dest, library_path)
        }
        LoaderKind::VulkanImplicitLayer => {
            write_one(&report.vulkan.implicit_layers, kind, index, dest, library_path)
        }
    }
}

fn write_one<D: LoadableDetails>(
    records: &[Loadable<D>],
    kind: LoaderKind,
    index: usize,
    dest: &Path,
    library_path: Option<&str>,
) -> Result<u8, String> {
    let record = records.get(index).ok_or_else(|| {
        format!(
            "no {kind} at index {index}: the report has {}",
            records.len()
        )
    })?;
    let record = match library_path {
        Some(path) => record.replace_library_path(path),
        None => record.clone(),
    };
    record
        .write_to_file(dest)
        .map_err(|e| format!("failed to write {}: {e}", dest.display()))?;
    println!("wrote {} to {}", record.json_path().display(), dest.display());
    Ok(EXIT_SUCCESS)
}
