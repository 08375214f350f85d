use super::{json_pretty, EXIT_SUCCESS};
use icdscan_discovery::{Discovery, LoaderKind, SearchPath};
use serde_json::json;
use std::str::FromStr;

pub fn run(discovery: &Discovery, kind: &str, json: bool) -> Result<u8, String> {
    let kind = LoaderKind::from_str(kind).map_err(|e| e.to_string())?;
    let search_path = discovery.search_path(kind);
    let (label, paths) = match &search_path {
        SearchPath::Files(p) => ("files", p),
        SearchPath::Directories(p) => ("directories", p),
    };

    if json {
        let value = json!({
            "kind": kind.as_str(),
            "type": label,
            "paths": paths.iter().map(|p| p.display().to_string()).collect::<Vec<_>>(),
        });
        println!("{}", json_pretty(&value)?);
        return Ok(EXIT_SUCCESS);
    }

    println!("{kind} ({label}):");
    for path in paths {
        let marker = if discovery.sysroot().resolve(path).is_ok() {
            ""
        } else {
            "  (missing)"
        };
        println!("  {}{marker}", path.display());
    }
    Ok(EXIT_SUCCESS)
}
