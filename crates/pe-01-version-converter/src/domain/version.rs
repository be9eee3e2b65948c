//! Dot-separated numeric versions.

use super::errors::ConversionError;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A version such as `1.4.0`, compared component by component.
///
/// When one version is a strict prefix of the other, the longer one is
/// greater (`1.2.0 > 1.2`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CodeVersion {
    parts: Vec<u64>,
}

impl CodeVersion {
    #[must_use]
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            parts: vec![major, minor, patch],
        }
    }

    #[must_use]
    pub fn parts(&self) -> &[u64] {
        &self.parts
    }

    /// True for the `major.minor.patch` form required of published policies.
    #[must_use]
    pub fn is_semantic(&self) -> bool {
        self.parts.len() == 3
    }
}

impl FromStr for CodeVersion {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ConversionError::InvalidVersion(s.to_string()));
        }
        let parts = trimmed
            .split('.')
            .map(|part| {
                part.parse::<u64>()
                    .map_err(|_| ConversionError::InvalidVersion(s.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { parts })
    }
}

impl Ord for CodeVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.parts.iter().zip(other.parts.iter()) {
            match a.cmp(b) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }
        self.parts.len().cmp(&other.parts.len())
    }
}

impl PartialOrd for CodeVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for CodeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.parts.iter().map(u64::to_string).collect();
        f.write_str(&rendered.join("."))
    }
}

/// Compare two version strings. A missing or empty `right` is older than anything.
pub fn compare_versions(left: &str, right: Option<&str>) -> Result<Ordering, ConversionError> {
    let left: CodeVersion = left.parse()?;
    match right.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(Ordering::Greater),
        Some(right) => Ok(left.cmp(&right.parse()?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let v: CodeVersion = "1.4.0".parse().unwrap();
        assert_eq!(v, CodeVersion::new(1, 4, 0));
        assert_eq!(v.to_string(), "1.4.0");
        assert!(v.is_semantic());
    }

    #[test]
    fn test_invalid_versions() {
        assert!("".parse::<CodeVersion>().is_err());
        assert!("1.x.0".parse::<CodeVersion>().is_err());
        assert!("1..0".parse::<CodeVersion>().is_err());
    }

    #[test]
    fn test_ordering() {
        let v = |s: &str| s.parse::<CodeVersion>().unwrap();
        assert!(v("1.10.0") > v("1.9.0"));
        assert!(v("1.2.0") > v("1.2"));
        assert!(v("2.0.0") > v("1.99.99"));
        assert_eq!(v("1.0.0").cmp(&v("1.0.0")), Ordering::Equal);
    }

    #[test]
    fn test_compare_with_missing() {
        assert_eq!(compare_versions("1.0.0", None).unwrap(), Ordering::Greater);
        assert_eq!(compare_versions("1.0.0", Some("")).unwrap(), Ordering::Greater);
        assert_eq!(compare_versions("1.0.0", Some("1.1.0")).unwrap(), Ordering::Less);
    }
}
