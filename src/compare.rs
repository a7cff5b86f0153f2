use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::version::{UpdateType, diff};

/// Notice attached when the store did not report a latest version.
pub const MISSING_LATEST_NOTICE: &str = "Error: could not get latest version";

/// Outcome of comparing a running version against the latest listed one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    /// Whether the latest version should be installed
    pub needs_update: bool,
    /// Magnitude of the update, `None` when there is nothing to install
    pub update_type: Option<UpdateType>,
    /// Diagnostic for missing or non-semver versions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

/// Decides whether `latest` is an update over `current`.
///
/// Never fails. A missing or empty `latest` yields "no update" with a notice.
/// When either side is not a recognizable version the strings are compared
/// lexically instead, and an update is only suggested if `latest` has at least
/// three dot-separated parts; such an update is always reported as minor.
///
/// # Examples
///
/// ```
/// use app_updates::{UpdateType, compare};
///
/// let result = compare("1.2.3", Some("1.3.0"));
/// assert!(result.needs_update);
/// assert_eq!(result.update_type, Some(UpdateType::Minor));
///
/// let result = compare("1.0.0", Some("not-a-version"));
/// assert!(!result.needs_update);
/// assert_eq!(result.notice.as_deref(), Some("Not a valid semver version: not-a-version"));
/// ```
pub fn compare(current: &str, latest: Option<&str>) -> ComparisonResult {
    let Some(latest) = latest.filter(|latest| !latest.is_empty()) else {
        return ComparisonResult {
            needs_update: false,
            update_type: None,
            notice: Some(MISSING_LATEST_NOTICE.to_string()),
        };
    };

    match diff(current, latest) {
        Ok(update_type) => ComparisonResult {
            needs_update: update_type.is_some(),
            update_type,
            notice: None,
        },
        Err(err) => {
            debug!(current, latest, "falling back to lexical comparison: {}", err);

            // Lexical, not numeric: "10" sorts before "9".
            let needs_update = current != latest && latest > current && has_three_parts(latest);

            ComparisonResult {
                needs_update,
                update_type: needs_update.then_some(UpdateType::Minor),
                notice: Some(err.notice()),
            }
        }
    }
}

fn has_three_parts(version: &str) -> bool {
    version.split('.').count() >= 3
}
