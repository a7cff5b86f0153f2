use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::NotSemverError;

/// Largest value accepted for a numeric component (2^53 - 1).
const MAX_SAFE_COMPONENT: u64 = 9_007_199_254_740_991;

/// Finds the first `major[.minor[.patch]]` run in arbitrary text, plus any
/// prerelease/build tag attached directly to it. Digits are ASCII only.
static COERCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:^|[^0-9])([0-9]{1,16})(?:\.([0-9]{1,16}))?(?:\.([0-9]{1,16}))?(?:-([0-9A-Za-z-]+(?:\.[0-9A-Za-z-]+)*))?(?:\+([0-9A-Za-z-]+(?:\.[0-9A-Za-z-]+)*))?(?:$|[^0-9])",
    )
    .expect("coercion pattern is valid")
});

static STRICT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(0|[1-9][0-9]*)\.(0|[1-9][0-9]*)\.(0|[1-9][0-9]*)(?:-([0-9A-Za-z-]+(?:\.[0-9A-Za-z-]+)*))?(?:\+([0-9A-Za-z-]+(?:\.[0-9A-Za-z-]+)*))?$",
    )
    .expect("version pattern is valid")
});

/// A prerelease identifier such as `beta` or `1` in `1.0.0-beta.1`.
///
/// Variant order matters: the derived `Ord` ranks numeric identifiers below
/// alphanumeric ones, numbers by value and text by ASCII order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Identifier {
    Numeric(u64),
    AlphaNumeric(String),
}

impl Identifier {
    fn parse(s: &str) -> Self {
        if s.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(n) = s.parse::<u64>() {
                if n <= MAX_SAFE_COMPONENT {
                    return Identifier::Numeric(n);
                }
            }
        }
        Identifier::AlphaNumeric(s.to_string())
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Numeric(n) => write!(f, "{}", n),
            Identifier::AlphaNumeric(s) => write!(f, "{}", s),
        }
    }
}

/// A semantic version.
///
/// Equality is structural (build metadata included). Use
/// [`Version::cmp_precedence`] for release ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub pre: Vec<Identifier>,
    pub build: Vec<String>,
}

impl Version {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Version {
            major,
            minor,
            patch,
            pre: Vec::new(),
            build: Vec::new(),
        }
    }

    /// Whether this version carries prerelease identifiers.
    pub fn is_prerelease(&self) -> bool {
        !self.pre.is_empty()
    }

    /// Compares two versions by semantic-versioning precedence.
    ///
    /// A prerelease sorts below the release with the same `major.minor.patch`,
    /// and build metadata never affects the result.
    pub fn cmp_precedence(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.patch.cmp(&other.patch))
            .then_with(|| match (self.pre.is_empty(), other.pre.is_empty()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => self.pre.cmp(&other.pre),
            })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;

        if !self.pre.is_empty() {
            let pre: Vec<String> = self.pre.iter().map(|id| id.to_string()).collect();
            write!(f, "-{}", pre.join("."))?;
        }
        if !self.build.is_empty() {
            write!(f, "+{}", self.build.join("."))?;
        }
        Ok(())
    }
}

/// Parses a well-formed `major.minor.patch[-pre][+build]` string.
///
/// Numeric prerelease identifiers may carry leading zeros; components may not.
impl FromStr for Version {
    type Err = NotSemverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || NotSemverError::new(s);
        let caps = STRICT_RE.captures(s.trim()).ok_or_else(invalid)?;

        let component = |i: usize| {
            caps[i]
                .parse::<u64>()
                .ok()
                .filter(|n| *n <= MAX_SAFE_COMPONENT)
                .ok_or_else(invalid)
        };

        let pre: Vec<Identifier> = caps
            .get(4)
            .map(|m| m.as_str().split('.').map(Identifier::parse).collect())
            .unwrap_or_default();
        let build: Vec<String> = caps
            .get(5)
            .map(|m| m.as_str().split('.').map(str::to_string).collect())
            .unwrap_or_default();

        Ok(Version {
            major: component(1)?,
            minor: component(2)?,
            patch: component(3)?,
            pre,
            build,
        })
    }
}

/// Extracts a best-effort version string from loosely formatted text.
///
/// Missing minor/patch components default to zero and leading zeros are
/// dropped, so `"v01.2-beta"` becomes `"1.2.0-beta"`.
pub(crate) fn coerce(raw: &str) -> Option<String> {
    let caps = COERCE_RE.captures(raw)?;

    // Only an absent group defaults to zero; a group that does not parse fails.
    let component = |i: usize| match caps.get(i) {
        Some(m) => m.as_str().parse::<u64>().ok(),
        None => Some(0),
    };

    let mut coerced = format!("{}.{}.{}", component(1)?, component(2)?, component(3)?);
    if let Some(pre) = caps.get(4) {
        coerced.push('-');
        coerced.push_str(pre.as_str());
    }
    if let Some(build) = caps.get(5) {
        coerced.push('+');
        coerced.push_str(build.as_str());
    }
    Some(coerced)
}

/// Normalizes an arbitrary version string into a [`Version`].
///
/// # Arguments
///
/// * `raw` - Any text containing a version, e.g. `"12"`, `"v1.2"` or `"Version 4.5 (build 7)"`
///
/// # Returns
///
/// * `Ok(Version)` - The first version-like run, zero-filled to three components
/// * `Err(NotSemverError)` - If the text holds no ASCII digit run that fits a version
///
/// # Examples
///
/// ```
/// use app_updates::parse_version;
///
/// assert_eq!(parse_version("12").unwrap().to_string(), "12.0.0");
/// assert_eq!(parse_version("v1.2-beta").unwrap().to_string(), "1.2.0-beta");
/// assert!(parse_version("not-a-version").is_err());
/// ```
pub fn parse_version(raw: &str) -> Result<Version, NotSemverError> {
    coerce(raw)
        .ok_or_else(|| NotSemverError::new(raw))?
        .parse::<Version>()
        .map_err(|_| NotSemverError::new(raw))
}

/// The magnitude of an available update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateType {
    Major,
    Minor,
    Patch,
    Premajor,
    Preminor,
    Prepatch,
    Prerelease,
}

impl UpdateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateType::Major => "major",
            UpdateType::Minor => "minor",
            UpdateType::Patch => "patch",
            UpdateType::Premajor => "premajor",
            UpdateType::Preminor => "preminor",
            UpdateType::Prepatch => "prepatch",
            UpdateType::Prerelease => "prerelease",
        }
    }
}

impl fmt::Display for UpdateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies the update from `v1_raw` to `v2_raw`.
///
/// # Arguments
///
/// * `v1_raw` - The running version
/// * `v2_raw` - The candidate version
///
/// # Returns
///
/// `Ok(None)` unless `v2_raw` is strictly newer. Otherwise the most
/// significant changed component, as its `pre` variant when either side is a
/// prerelease. When only prerelease identifiers differ the result is
/// [`UpdateType::Prerelease`]. Fails if either side cannot be normalized.
pub fn diff(v1_raw: &str, v2_raw: &str) -> Result<Option<UpdateType>, NotSemverError> {
    if v1_raw == v2_raw {
        return Ok(None);
    }

    let v1 = parse_version(v1_raw)?;
    let v2 = parse_version(v2_raw)?;
    if v2.cmp_precedence(&v1) != Ordering::Greater {
        return Ok(None);
    }

    let prerelease = v1.is_prerelease() || v2.is_prerelease();
    let components = [
        (v1.major, v2.major, UpdateType::Major, UpdateType::Premajor),
        (v1.minor, v2.minor, UpdateType::Minor, UpdateType::Preminor),
        (v1.patch, v2.patch, UpdateType::Patch, UpdateType::Prepatch),
    ];

    let changed = components
        .into_iter()
        .find(|(old, new, _, _)| old != new)
        .map(|(_, _, release, pre)| if prerelease { pre } else { release });

    Ok(changed.or(prerelease.then_some(UpdateType::Prerelease)))
}
