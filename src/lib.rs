//! # app-updates
//!
//! A Rust library that tells a mobile app whether a newer version is listed
//! on the App Store or Google Play, and how big the update is.
//!
//! # Usage
//!
//! ## Basic
//!
//! The easiest way to use this crate is with the [`check`] function:
//!
//! ```no_run
//! let response = app_updates::check("ios", "com.example.app", "1.2.3", None);
//!
//! // {"platform":"ios","bundleId":"com.example.app","version":"1.3.0",
//! //  "needsUpdate":true,"updateType":"minor",...}
//! println!("{}", response.body);
//! ```
//!
//! Lookup failures give a `400` status and an `{"error": ...}` body.
//!
//! ## Comparing versions only
//!
//! [`compare`] works on version strings you already have and never fails:
//!
//! ```
//! use app_updates::{UpdateType, compare};
//!
//! let result = compare("1.2.3", Some("1.2.4-beta.1"));
//! assert!(result.needs_update);
//! assert_eq!(result.update_type, Some(UpdateType::Prepatch));
//!
//! // The store had no version to offer
//! let result = compare("1.2.3", None);
//! assert!(!result.needs_update);
//! assert_eq!(result.notice.as_deref(), Some("Error: could not get latest version"));
//! ```
//!
//! Loosely formatted versions such as `"12"`, `"v1.2"` or `"1.2-beta"` are
//! coerced before comparison. Strings with no version in them fall back to a
//! plain string comparison that only ever reports a `minor` update, and only
//! when the latest version has at least three dot-separated parts.
//!
//! ## Custom lookups
//!
//! Implement [`VersionLookup`] to serve listings from somewhere other than
//! the public stores, and pass it to [`handle`].
//!
//! # Caching Behaviour
//!
//! [`StoreClient`] caches store lookups in your system's temp directory for 1 hour:
//!
//! - **Cache location**: `{temp_dir}/app_updates_cache.bin`
//! - **Cache duration**: 3600 seconds (1 hour)
//! - **Cache format**: Compact binary format using postcard serialisation
//!
//! Version comparisons themselves are never cached.

mod compare;
mod error;
mod handler;
mod lookup;
mod version;

pub use compare::{ComparisonResult, MISSING_LATEST_NOTICE, compare};
pub use error::{CheckError, LookupError, NotSemverError};
pub use handler::{Request, Response, check, handle};
pub use lookup::{DEFAULT_COUNTRY, LookupData, Platform, StoreClient, VersionLookup};
pub use version::{Identifier, UpdateType, Version, diff, parse_version};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::coerce;
    use mockito::{Matcher, Server};

    #[test]
    fn test_coercion() {
        assert_eq!(coerce("12"), Some("12.0.0".to_string()));
        assert_eq!(coerce("1.2-beta"), Some("1.2.0-beta".to_string()));
        assert_eq!(coerce("version 3.1"), Some("3.1.0".to_string()));
        assert_eq!(coerce("no digits"), None);
    }

    #[test]
    fn test_update_types() {
        assert_eq!(compare("1.2.3", Some("1.2.3")).update_type, None);
        assert_eq!(compare("1.2.3", Some("1.2.4")).update_type, Some(UpdateType::Patch));
        assert_eq!(compare("1.2.3", Some("1.3.0")).update_type, Some(UpdateType::Minor));
        assert_eq!(compare("1.2.3", Some("2.0.0")).update_type, Some(UpdateType::Major));
        assert_eq!(
            compare("1.2.3", Some("1.2.4-beta.1")).update_type,
            Some(UpdateType::Prepatch)
        );
    }

    #[test]
    fn test_downgrades() {
        assert!(!compare("1.2.4", Some("1.2.3")).needs_update);
        assert!(!compare("2.0.0", Some("2.0.0-rc.1")).needs_update);
        assert!(!compare("1.10.0", Some("1.9.0")).needs_update);
    }

    #[test]
    fn test_notices() {
        assert_eq!(
            compare("1.0.0", None).notice.as_deref(),
            Some(MISSING_LATEST_NOTICE)
        );

        let err = parse_version("not-a-version").unwrap_err();
        assert_eq!(err.to_string(), "Invalid Version: not-a-version");
        assert_eq!(
            compare("1.0.0", Some("not-a-version")).notice,
            Some(err.notice())
        );
    }

    #[test]
    fn test_update_type_names() {
        let names: Vec<String> = [
            UpdateType::Major,
            UpdateType::Minor,
            UpdateType::Patch,
            UpdateType::Premajor,
            UpdateType::Preminor,
            UpdateType::Prepatch,
            UpdateType::Prerelease,
        ]
        .iter()
        .map(|t| serde_json::to_value(t).unwrap().as_str().unwrap().to_string())
        .collect();

        assert_eq!(
            names,
            ["major", "minor", "patch", "premajor", "preminor", "prepatch", "prerelease"]
        );
        assert_eq!(UpdateType::Prepatch.to_string(), "prepatch");
    }

    #[test]
    fn test_store_check_end_to_end() {
        let mut server = Server::new();
        let _mock = server
            .mock("GET", "/lookup")
            .match_query(Matcher::UrlEncoded(
                "bundleId".into(),
                "com.example.app".into(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"resultCount":1,"results":[{"version":"2.0.0","trackName":"Example"}]}"#)
            .create();

        let client = StoreClient::with_cache(true, None)
            .with_itunes_url(&server.url());
        let request = Request {
            platform: "ios".to_string(),
            bundle_id: "com.example.app".to_string(),
            current_version: "1.4.2".to_string(),
            country: None,
        };

        let response = handle(&client, &request);

        assert_eq!(response.status_code, 200);
        assert_eq!(response.body["version"], "2.0.0");
        assert_eq!(response.body["needsUpdate"], true);
        assert_eq!(response.body["updateType"], "major");
    }
}
