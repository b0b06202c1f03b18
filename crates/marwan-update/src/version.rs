use std::cmp::Ordering;
use std::fmt;

/// One numeric component of any length, kept without leading zeros.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Component(String);

impl Component {
    fn new(digits: &str) -> Self {
        let trimmed = digits.trim_start_matches('0');
        Self(if trimmed.is_empty() { "0" } else { trimmed }.to_string())
    }
}

impl Ord for Component {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .len()
            .cmp(&other.0.len())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for Component {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Dotted numeric version such as `1.2.0`.
///
/// Ordering is lexicographic over the components, so a strict prefix sorts
/// before any extension of it: `1.0 < 1.0.0 < 1.0.1`. Components are not
/// limited in size.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version(Vec<Component>);

impl Version {
    /// Numeric components as decimal strings without leading zeros.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|component| component.0.as_str())
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for component in self.components() {
            if !first {
                f.write_str(".")?;
            }
            f.write_str(component)?;
            first = false;
        }
        Ok(())
    }
}

/// Parse a version tag like `v1.2.0` into its numeric components.
///
/// A single leading run of non-digit characters is stripped. Dot-separated
/// components that are not purely numeric are dropped, so `1.2.0-beta`
/// parses as `1.2`. Returns `None` when no numeric component remains.
#[must_use]
pub fn parse_version(raw: &str) -> Option<Version> {
    let trimmed = raw.trim_start_matches(|c: char| !c.is_ascii_digit());
    let components: Vec<Component> = trimmed
        .split('.')
        .filter(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()))
        .map(Component::new)
        .collect();

    if components.is_empty() {
        None
    } else {
        Some(Version(components))
    }
}

/// Whether `candidate` is a newer release than `current`.
///
/// Tags that do not parse on either side fall back to plain string
/// inequality, so any differing tag counts as an update.
#[must_use]
pub fn is_newer(current: &str, candidate: &str) -> bool {
    match (parse_version(current), parse_version(candidate)) {
        (Some(current), Some(candidate)) => candidate > current,
        _ => candidate != current,
    }
}

#[cfg(test)]
mod tests {
    use super::{is_newer, parse_version};

    #[test]
    fn test_version_comparison() {
        assert!(is_newer("1.0.0", "1.0.1"));
        assert!(is_newer("1.0.0", "1.1.0"));
        assert!(is_newer("1.9.9", "2.0.0"));
        assert!(is_newer("1.1.9", "1.2"));
        assert!(is_newer("1.1.9", "1.2.0"));
        assert!(!is_newer("1.2.0", "1.1.9"));
        assert!(!is_newer("1.0.0", "1.0.0"));
        assert!(!is_newer("1.0.1", "1.0.0"));
    }

    #[test]
    fn longer_version_with_equal_prefix_is_newer() {
        assert!(is_newer("1.0", "1.0.0"));
        assert!(!is_newer("1.0.0", "1.0"));
    }

    #[test]
    fn leading_prefix_is_stripped_on_both_sides() {
        assert!(is_newer("v1.0.0", "v1.0.1"));
        assert!(is_newer("1.0.0", "v1.0.1"));
        assert!(!is_newer("release-2.0", "v2.0"));
    }

    #[test]
    fn non_numeric_tags_fall_back_to_inequality() {
        assert!(is_newer("abc", "xyz"));
        assert!(!is_newer("abc", "abc"));
        assert!(is_newer("1.0.0", "nightly"));
    }

    #[test]
    fn non_numeric_components_are_dropped() {
        let parsed = parse_version("v1.2.0-beta.3").expect("version should parse");
        assert_eq!(parsed.components().collect::<Vec<_>>(), ["1", "2", "3"]);
        assert_eq!(parsed.to_string(), "1.2.3");
    }

    #[test]
    fn empty_and_prefix_only_tags_do_not_parse() {
        assert!(parse_version("").is_none());
        assert!(parse_version("v").is_none());
        assert!(parse_version("latest").is_none());
    }

    #[test]
    fn components_beyond_u64_still_compare_numerically() {
        assert!(is_newer("1.0", "1.18446744073709551616"));
        assert!(is_newer("1.18446744073709551615", "1.18446744073709551616"));
        assert!(!is_newer("1.99999999999999999999", "1.18446744073709551616"));
    }

    #[test]
    fn leading_zeros_do_not_change_the_value() {
        assert!(!is_newer("1.02", "1.2"));
        assert!(is_newer("1.09", "1.10"));
        assert_eq!(
            parse_version("v01.000.7").map(|v| v.to_string()),
            Some("1.0.7".to_string())
        );
    }
}
