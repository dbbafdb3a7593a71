use regex::Regex;
use std::sync::LazyLock;

/// `HN` or `CN`, an optional space or hyphen, then an alphanumeric run, as a whole word.
/// Case sensitive.
pub const LICENSE_PATTERN: &str = r"\b(?:HN|CN)[ -]?[A-Za-z0-9]+\b";

pub const LICENSE_NOT_FOUND: &str = "license-not-found";

static LICENSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(LICENSE_PATTERN).expect("license pattern is valid"));

/// Returns the first license identifier in document order, if any.
pub fn find_license_number(text: &str) -> Option<&str> {
    LICENSE_RE.find(text).map(|m| m.as_str())
}
