use super::{count_with_issues, exit_code, json_pretty, print_section, spinner};
use icdscan_discovery::Discovery;
use icdscan_schema::{EglDetails, EglSection};

pub fn run(discovery: &Discovery, json: bool, strict: bool) -> Result<u8, String> {
    let pb = (!json).then(|| spinner("scanning EGL manifests"));
    let section = EglSection {
        icds: discovery.load_egl_icds(),
        external_platforms: discovery.load_egl_external_platforms(),
    };
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    let flagged = print(&section, json)?;
    Ok(exit_code(strict, flagged))
}

/// Print the EGL part of a report. Returns how many records have issues.
pub fn print(section: &EglSection, json: bool) -> Result<usize, String> {
    if json {
        println!("{}", json_pretty(section)?);
    } else {
        print_section("EGL ICDs", &section.icds, summary);
        print_section("EGL external platforms", &section.external_platforms, summary);
    }
    Ok(count_with_issues(&section.icds) + count_with_issues(&section.external_platforms))
}

fn summary(details: &EglDetails) -> String {
    format!("library: {}", details.library_path)
}
