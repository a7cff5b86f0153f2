use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::compare::{ComparisonResult, compare};
use crate::error::CheckError;
use crate::lookup::{DEFAULT_COUNTRY, LookupData, Platform, StoreClient, VersionLookup};

/// An update check for one app.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub platform: String,
    pub bundle_id: String,
    pub current_version: String,
    /// Store country, `"us"` when absent
    #[serde(default)]
    pub country: Option<String>,
}

/// Status code and JSON body answering a [`Request`].
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status_code: u16,
    pub body: Value,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckBody<'a> {
    platform: &'a str,
    bundle_id: &'a str,
    #[serde(flatten)]
    data: &'a LookupData,
    #[serde(flatten)]
    comparison: &'a ComparisonResult,
}

/// Looks up the latest version of the requested app and compares it to the
/// running one.
///
/// # Arguments
///
/// * `lookup` - Where the latest listing comes from
/// * `request` - Platform, bundle id, running version and optional country
///
/// # Returns
///
/// A `200` response whose body merges the listing with the comparison, or an
/// `{"error": ...}` body: `400` for unknown platforms and failed lookups,
/// `500` if the body could not be encoded. Version problems never fail the
/// request; they surface as a `notice`.
pub fn handle<L: VersionLookup + ?Sized>(lookup: &L, request: &Request) -> Response {
    match check_with(lookup, request) {
        Ok(body) => Response {
            status_code: 200,
            body,
        },
        Err(e) => {
            warn!(
                platform = %request.platform,
                bundle_id = %request.bundle_id,
                "update check failed: {}",
                e
            );
            Response {
                status_code: e.status_code(),
                body: json!({ "error": e.to_string() }),
            }
        }
    }
}

/// Convenience wrapper around [`handle`] using a caching [`StoreClient`].
///
/// # Arguments
///
/// * `platform` - `"ios"` or `"android"`
/// * `bundle_id` - The app's bundle identifier or package name
/// * `current_version` - The version the app is running
/// * `country` - Store country, `"us"` when `None`
///
/// # Examples
///
/// ```no_run
/// let response = app_updates::check("ios", "com.apple.Pages", "13.0", None);
/// if response.body["needsUpdate"] == true {
///     println!("Update available: {}", response.body["updateType"]);
/// }
/// ```
pub fn check(
    platform: &str,
    bundle_id: &str,
    current_version: &str,
    country: Option<&str>,
) -> Response {
    let request = Request {
        platform: platform.to_string(),
        bundle_id: bundle_id.to_string(),
        current_version: current_version.to_string(),
        country: country.map(str::to_string),
    };
    handle(&StoreClient::new(false), &request)
}

fn check_with<L: VersionLookup + ?Sized>(
    lookup: &L,
    request: &Request,
) -> Result<Value, CheckError> {
    let platform: Platform = request.platform.parse()?;
    let country = request
        .country
        .as_deref()
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_COUNTRY);

    let data = lookup.lookup_version(platform, &request.bundle_id, country)?;
    debug!("{}", data);

    let comparison = compare(&request.current_version, data.version.as_deref());

    let body = serde_json::to_value(CheckBody {
        platform: &request.platform,
        bundle_id: &request.bundle_id,
        data: &data,
        comparison: &comparison,
    })?;
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LookupError;
    use std::cell::RefCell;

    /// Lookup returning a fixed listing and recording the country asked for.
    struct FakeLookup {
        version: Option<Option<String>>,
        countries: RefCell<Vec<String>>,
    }

    impl FakeLookup {
        fn listing(version: Option<&str>) -> Self {
            FakeLookup {
                version: Some(version.map(str::to_string)),
                countries: RefCell::new(Vec::new()),
            }
        }

        fn missing() -> Self {
            FakeLookup {
                version: None,
                countries: RefCell::new(Vec::new()),
            }
        }
    }

    impl VersionLookup for FakeLookup {
        fn lookup_version(
            &self,
            _platform: Platform,
            bundle_id: &str,
            country: &str,
        ) -> Result<LookupData, LookupError> {
            self.countries.borrow_mut().push(country.to_string());
            match &self.version {
                Some(version) => Ok(LookupData {
                    version: version.clone(),
                    name: Some("Example".to_string()),
                    ..Default::default()
                }),
                None => Err(LookupError::NotFound(bundle_id.to_string())),
            }
        }
    }

    fn request(platform: &str, current_version: &str, country: Option<&str>) -> Request {
        Request {
            platform: platform.to_string(),
            bundle_id: "com.example.app".to_string(),
            current_version: current_version.to_string(),
            country: country.map(str::to_string),
        }
    }

    #[test]
    fn reports_available_update() {
        let lookup = FakeLookup::listing(Some("1.2.4"));

        let response = handle(&lookup, &request("ios", "1.2.3", None));

        assert_eq!(response.status_code, 200);
        assert_eq!(response.body["platform"], "ios");
        assert_eq!(response.body["bundleId"], "com.example.app");
        assert_eq!(response.body["version"], "1.2.4");
        assert_eq!(response.body["name"], "Example");
        assert_eq!(response.body["needsUpdate"], true);
        assert_eq!(response.body["updateType"], "patch");
        assert!(response.body.get("notice").is_none());
    }

    #[test]
    fn reports_up_to_date_app() {
        let lookup = FakeLookup::listing(Some("2.0.0"));

        let response = handle(&lookup, &request("android", "2.0.0", None));

        assert_eq!(response.status_code, 200);
        assert_eq!(response.body["needsUpdate"], false);
        assert_eq!(response.body["updateType"], Value::Null);
    }

    #[test]
    fn missing_store_version_becomes_notice() {
        let lookup = FakeLookup::listing(None);

        let response = handle(&lookup, &request("android", "2.0.0", None));

        assert_eq!(response.status_code, 200);
        assert_eq!(response.body["needsUpdate"], false);
        assert_eq!(
            response.body["notice"],
            "Error: could not get latest version"
        );
    }

    #[test]
    fn non_semver_store_version_becomes_notice() {
        let lookup = FakeLookup::listing(Some("Varies with device"));

        let response = handle(&lookup, &request("android", "2.0.0", None));

        assert_eq!(response.status_code, 200);
        assert_eq!(response.body["needsUpdate"], false);
        assert_eq!(
            response.body["notice"],
            "Not a valid semver version: Varies with device"
        );
    }

    #[test]
    fn lookup_failure_is_error_envelope() {
        let lookup = FakeLookup::missing();

        let response = handle(&lookup, &request("ios", "1.0.0", None));

        assert_eq!(
            response,
            Response {
                status_code: 400,
                body: json!({ "error": "App not found: com.example.app" }),
            }
        );
    }

    #[test]
    fn unknown_platform_is_error_envelope() {
        let lookup = FakeLookup::listing(Some("1.0.0"));

        let response = handle(&lookup, &request("windows", "1.0.0", None));

        assert_eq!(response.status_code, 400);
        assert_eq!(response.body["error"], "Unsupported platform: windows");
        assert!(lookup.countries.borrow().is_empty());
    }

    #[test]
    fn country_defaults_to_us() {
        let lookup = FakeLookup::listing(Some("1.0.0"));

        handle(&lookup, &request("ios", "1.0.0", None));
        handle(&lookup, &request("ios", "1.0.0", Some("")));
        handle(&lookup, &request("ios", "1.0.0", Some("de")));

        assert_eq!(*lookup.countries.borrow(), vec!["us", "us", "de"]);
    }

    #[test]
    fn request_deserializes_from_camel_case() {
        let request: Request = serde_json::from_value(json!({
            "platform": "ios",
            "bundleId": "com.example.app",
            "currentVersion": "1.0.0"
        }))
        .unwrap();

        assert_eq!(request.bundle_id, "com.example.app");
        assert_eq!(request.country, None);
    }
}
