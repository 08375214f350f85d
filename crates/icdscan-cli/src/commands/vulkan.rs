use super::{count_with_issues, exit_code, json_pretty, print_section, spinner};
use icdscan_discovery::Discovery;
use icdscan_schema::{LayerTarget, VulkanIcdDetails, VulkanLayerDetails, VulkanSection};

pub fn run(discovery: &Discovery, json: bool, strict: bool) -> Result<u8, String> {
    let pb = (!json).then(|| spinner("scanning Vulkan manifests"));
    let section = VulkanSection {
        icds: discovery.load_vulkan_icds(),
        explicit_layers: discovery.load_vulkan_explicit_layers(),
        implicit_layers: discovery.load_vulkan_implicit_layers(),
    };
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    let flagged = print(&section, json)?;
    Ok(exit_code(strict, flagged))
}

/// Print the Vulkan part of a report. Returns how many records have issues.
pub fn print(section: &VulkanSection, json: bool) -> Result<usize, String> {
    if json {
        println!("{}", json_pretty(section)?);
    } else {
        print_section("Vulkan ICDs", &section.icds, icd_summary);
        print_section("Vulkan explicit layers", &section.explicit_layers, layer_summary);
        print_section("Vulkan implicit layers", &section.implicit_layers, layer_summary);
    }
    Ok(count_with_issues(&section.icds)
        + count_with_issues(&section.explicit_layers)
        + count_with_issues(&section.implicit_layers))
}

fn icd_summary(details: &VulkanIcdDetails) -> String {
    let mut line = format!(
        "library: {}  api: {}",
        details.library_path, details.api_version
    );
    if let Some(arch) = &details.library_arch {
        line.push_str(&format!("  arch: {arch}"));
    }
    if details.is_portability_driver {
        line.push_str("  (portability)");
    }
    line
}

fn layer_summary(details: &VulkanLayerDetails) -> String {
    let target = match &details.target {
        LayerTarget::Library(lib) => format!("library: {lib}"),
        LayerTarget::Components(names) => format!("components: {}", names.join(", ")),
    };
    format!(
        "{} ({})  {target}  api: {}",
        details.name, details.layer_type, details.api_version
    )
}
