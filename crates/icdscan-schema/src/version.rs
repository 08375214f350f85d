//! Dotted version strings as used by `file_format_version` and `api_version`.
//!
//! Segments are compared numerically where both sides start with digits, so
//! `1.10.0` sorts after `1.2.0`. Missing trailing segments count as zero.

use std::cmp::Ordering;

/// Newest Vulkan layer manifest format this crate understands.
pub const MAX_LAYER_FORMAT_VERSION: &str = "1.2.0";

/// Leading digit run, without leading zeros, and the rest of the segment.
fn split_numeric(segment: &str) -> (Option<&str>, &str) {
    let digits = segment.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return (None, segment);
    }
    let (num, rest) = segment.split_at(digits);
    (Some(num.trim_start_matches('0')), rest)
}

/// Digit runs of any length compare by magnitude without parsing.
fn compare_digits(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn compare_segments(a: &str, b: &str) -> Ordering {
    match (split_numeric(a), split_numeric(b)) {
        ((Some(x), rest_a), (Some(y), rest_b)) => {
            compare_digits(x, y).then_with(|| rest_a.cmp(rest_b))
        }
        // A numeric segment sorts after a non-numeric one.
        ((Some(_), _), (None, _)) => Ordering::Greater,
        ((None, _), (Some(_), _)) => Ordering::Less,
        ((None, _), (None, _)) => a.cmp(b),
    }
}

/// Compare two dotted version strings.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let mut left = a.trim().split('.');
    let mut right = b.trim().split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (l, r) => {
                let ord = compare_segments(l.unwrap_or("0"), r.unwrap_or("0"));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

/// Whether `version` matches `1.0.*`, the only ICD manifest format GLVND
/// and the Vulkan loader accept.
pub fn is_icd_format_version(version: &str) -> bool {
    version.trim().starts_with("1.0.")
}

/// Whether a Vulkan layer manifest with this format version can be parsed.
pub fn is_supported_layer_format_version(version: &str) -> bool {
    compare_versions(version, MAX_LAYER_FORMAT_VERSION) != Ordering::Greater
}
