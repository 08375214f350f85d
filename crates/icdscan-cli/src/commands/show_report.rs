use super::report::records_with_issues;
use super::{egl, exit_code, json_pretty, vulkan};
use icdscan_schema::GraphicsReport;
use std::path::Path;

pub fn run(path: &Path, json: bool, strict: bool) -> Result<u8, String> {
    let report = load(path)?;
    if json {
        println!("{}", json_pretty(&report)?);
    } else {
        egl::print(&report.egl, false)?;
        println!();
        vulkan::print(&report.vulkan, false)?;
    }
    Ok(exit_code(strict, records_with_issues(&report)))
}

pub fn load(path: &Path) -> Result<GraphicsReport, String> {
    GraphicsReport::from_file(path)
        .map_err(|e| format!("report error: {}: {e}", path.display()))
}
