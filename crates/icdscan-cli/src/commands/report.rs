use super::{count_with_issues, exit_code, json_pretty};
use icdscan_discovery::Discovery;
use icdscan_schema::GraphicsReport;

pub fn run(discovery: &Discovery, strict: bool) -> Result<u8, String> {
    let report = discovery.report();
    println!("{}", json_pretty(&report)?);
    Ok(exit_code(strict, records_with_issues(&report)))
}

pub fn records_with_issues(report: &GraphicsReport) -> usize {
    count_with_issues(&report.egl.icds)
        + count_with_issues(&report.egl.external_platforms)
        + count_with_issues(&report.vulkan.icds)
        + count_with_issues(&report.vulkan.explicit_layers)
        + count_with_issues(&report.vulkan.implicit_layers)
}
