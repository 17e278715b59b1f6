//! Village names as used by the loss-record store.

use std::path::Path;

/// Canonical village name: trimmed, one trailing administrative suffix
/// removed (longest match first), ending in `村`.
///
/// Returns `None` when nothing is left.
pub fn canonical_village(raw: &str, suffixes: &[String]) -> Option<String> {
    let trimmed = raw.trim();

    let mut ordered: Vec<&str> = suffixes.iter().map(|s| s.trim()).filter(|s| !s.is_empty()).collect();
    ordered.sort_by_key(|s| std::cmp::Reverse(s.chars().count()));

    let stem = ordered
        .iter()
        .find_map(|suffix| trimmed.strip_suffix(suffix))
        .unwrap_or(trimmed)
        .trim();

    if stem.is_empty() {
        return None;
    }
    if stem.ends_with('村') {
        Some(stem.to_string())
    } else {
        Some(format!("{stem}村"))
    }
}

/// Village name derived from a report's file stem, e.g.
/// `reports/张庄村委会.xlsx` → `张庄村`.
pub fn village_from_path(path: &Path, suffixes: &[String]) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    canonical_village(stem, suffixes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnrichConfig;

    fn suffixes() -> Vec<String> {
        EnrichConfig::default().village_suffixes
    }

    #[test]
    fn test_strips_suffix_and_appends_village() {
        let s = suffixes();
        assert_eq!(canonical_village("张庄村委会", &s).as_deref(), Some("张庄村"));
        assert_eq!(canonical_village("张庄村民委员会", &s).as_deref(), Some("张庄村"));
        assert_eq!(canonical_village(" 张庄村委 ", &s).as_deref(), Some("张庄村"));
        assert_eq!(canonical_village("张庄", &s).as_deref(), Some("张庄村"));
        assert_eq!(canonical_village("张庄村", &s).as_deref(), Some("张庄村"));
        assert_eq!(canonical_village("新华居委会", &s).as_deref(), Some("新华村"));
    }

    #[test]
    fn test_only_one_suffix_removed() {
        let s = suffixes();
        assert_eq!(canonical_village("村委村委会", &s).as_deref(), Some("村委村"));
    }

    #[test]
    fn test_blank_is_none() {
        let s = suffixes();
        assert_eq!(canonical_village("  ", &s), None);
        assert_eq!(canonical_village("村委会", &s), None);
    }

    #[test]
    fn test_from_path() {
        let s = suffixes();
        assert_eq!(
            village_from_path(Path::new("/data/东乡/张庄村委会.xlsx"), &s).as_deref(),
            Some("张庄村")
        );
        assert_eq!(village_from_path(Path::new("/"), &s), None);
    }
}
