use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{LazyLock, Mutex};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use humanly::{HumanDuration, HumanTime};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::LookupError;

/// Store country used when the caller does not name one.
pub const DEFAULT_COUNTRY: &str = "us";

/// Time in seconds before cache entries expire (1 hour).
const CACHE_EXPIRE_TIME: i64 = 3600;

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

const USER_AGENT: &str = concat!("app-updates/", env!("CARGO_PKG_VERSION"));

const CACHE_FILE_NAME: &str = "app_updates_cache.bin";

const DEFAULT_ITUNES_URL: &str = "https://itunes.apple.com";
const DEFAULT_PLAY_URL: &str = "https://play.google.com";

/// The version string embedded in a Google Play details page, e.g. `[[["2.14.1"]]`.
static PLAY_VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\[\[\["([0-9]+(?:\.[0-9]+)+(?:[-+][0-9A-Za-z.-]+)?)"\]\]"#)
        .expect("play version pattern is valid")
});

static PLAY_TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<title[^>]*>(.+?) - Apps on Google Play</title>")
        .expect("play title pattern is valid")
});

/// The store an app is listed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Ios,
    Android,
}

impl FromStr for Platform {
    type Err = LookupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ios" => Ok(Platform::Ios),
            "android" => Ok(Platform::Android),
            _ => Err(LookupError::UnsupportedPlatform(s.to_string())),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Ios => f.write_str("ios"),
            Platform::Android => f.write_str("android"),
        }
    }
}

/// Store listing details for an app.
///
/// `version` may be absent when the store page does not expose one; callers
/// treat that as "latest version unknown".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupData {
    /// Latest listed version
    pub version: Option<String>,
    /// Display name of the app
    pub name: Option<String>,
    /// Store page URL
    pub url: Option<String>,
    /// Release notes of the latest version
    pub release_notes: Option<String>,
    /// When the latest version was released
    pub released: Option<DateTime<Utc>>,
}

impl fmt::Display for LookupData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name.as_deref().unwrap_or("the app");

        let Some(ref version) = self.version else {
            return write!(f, "No version of {} is listed.", name);
        };

        write!(f, "Version {} of {} ", version, name)?;
        if let Some(date) = self.released {
            write!(f, "was released {}.", release_age(date))
        } else {
            write!(f, "is available.")
        }
    }
}

/// Source of the latest listed version of an app.
pub trait VersionLookup {
    /// Fetches the listing of `bundle_id` in the `country` store of `platform`.
    ///
    /// A listing without a version is still `Ok`; errors mean the lookup
    /// itself failed.
    fn lookup_version(
        &self,
        platform: Platform,
        bundle_id: &str,
        country: &str,
    ) -> Result<LookupData, LookupError>;
}

/// Platform, bundle id and country of a lookup.
type CacheKey = (String, String, String);

type Cache = HashMap<CacheKey, CacheEntry>;

/// A cached lookup and the Unix timestamp it was stored at.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    timestamp: i64,
    data: LookupData,
}

impl CacheEntry {
    fn is_fresh(&self, now: i64) -> bool {
        now - self.timestamp < CACHE_EXPIRE_TIME
    }
}

/// Reads the persisted cache, keeping only entries that have not expired.
fn read_cache_file(path: &Path, now: i64) -> Cache {
    let Ok(bytes) = fs::read(path) else {
        return Cache::new();
    };

    match postcard::from_bytes::<Cache>(&bytes) {
        Ok(mut cache) => {
            cache.retain(|_, entry| entry.is_fresh(now));
            cache
        }
        Err(e) => {
            debug!("ignoring unreadable cache file {}: {}", path.display(), e);
            Cache::new()
        }
    }
}

fn write_cache_file(path: &Path, cache: &Cache) {
    let written = postcard::to_allocvec(cache)
        .map_err(|e| e.to_string())
        .and_then(|bytes| fs::write(path, bytes).map_err(|e| e.to_string()));

    if let Err(e) = written {
        debug!("failed to write cache file {}: {}", path.display(), e);
    }
}

/// Response structure from the iTunes lookup API.
#[derive(Deserialize)]
struct ItunesResponse {
    #[serde(default)]
    results: Vec<ItunesApp>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItunesApp {
    version: Option<String>,
    track_name: Option<String>,
    track_view_url: Option<String>,
    release_notes: Option<String>,
    current_version_release_date: Option<String>,
}

/// Looks up apps on the App Store and Google Play, caching results.
///
/// # Examples
///
/// ```no_run
/// use app_updates::{Platform, StoreClient, VersionLookup};
///
/// let client = StoreClient::new(false);
/// let data = client
///     .lookup_version(Platform::Ios, "com.apple.Pages", "us")
///     .unwrap();
/// println!("{}", data);
/// ```
pub struct StoreClient {
    /// Whether to bypass the cache on every lookup
    bypass_cache: bool,
    itunes_url: String,
    play_url: String,
    /// Fresh lookups, mirrored to `cache_file` when one is set
    cache: Mutex<Cache>,
    cache_file: Option<PathBuf>,
}

impl StoreClient {
    /// Creates a client against the public stores, persisting its cache to
    /// `{temp_dir}/app_updates_cache.bin`.
    ///
    /// # Arguments
    ///
    /// * `bypass_cache` - If `true`, always queries the store instead of using cached results.
    ///   If `false`, uses cached results for up to 1 hour.
    pub fn new(bypass_cache: bool) -> Self {
        Self::with_cache(bypass_cache, Some(std::env::temp_dir().join(CACHE_FILE_NAME)))
    }

    /// Creates a client whose cache lives in `cache_file`.
    ///
    /// # Arguments
    ///
    /// * `bypass_cache` - Skip cache reads; results are still stored
    /// * `cache_file` - Where to persist lookups, or `None` to keep them in memory only
    ///
    /// # Examples
    ///
    /// ```
    /// use app_updates::StoreClient;
    ///
    /// // Nothing touches the disk
    /// let client = StoreClient::with_cache(false, None);
    /// ```
    pub fn with_cache(bypass_cache: bool, cache_file: Option<PathBuf>) -> Self {
        let now = Utc::now().timestamp();
        let cache = cache_file
            .as_deref()
            .map(|path| read_cache_file(path, now))
            .unwrap_or_default();

        StoreClient {
            bypass_cache,
            itunes_url: DEFAULT_ITUNES_URL.to_string(),
            play_url: DEFAULT_PLAY_URL.to_string(),
            cache: Mutex::new(cache),
            cache_file,
        }
    }

    /// Points App Store lookups at another base URL, such as a proxy.
    pub fn with_itunes_url(mut self, url: &str) -> Self {
        self.itunes_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Points Google Play lookups at another base URL.
    pub fn with_play_url(mut self, url: &str) -> Self {
        self.play_url = url.trim_end_matches('/').to_string();
        self
    }

    fn cached(&self, key: &CacheKey, now: i64) -> Option<LookupData> {
        if self.bypass_cache {
            return None;
        }

        let cache = self.cache.lock().ok()?;
        cache
            .get(key)
            .filter(|entry| entry.is_fresh(now))
            .map(|entry| entry.data.clone())
    }

    /// Stores a lookup, evicting expired entries before the file is rewritten.
    fn remember(&self, key: CacheKey, data: &LookupData, now: i64) {
        let Ok(mut cache) = self.cache.lock() else {
            return;
        };

        cache.retain(|_, entry| entry.is_fresh(now));
        cache.insert(
            key,
            CacheEntry {
                timestamp: now,
                data: data.clone(),
            },
        );

        if let Some(ref path) = self.cache_file {
            write_cache_file(path, &cache);
        }
    }

    fn itunes(&self, bundle_id: &str, country: &str) -> Result<LookupData, LookupError> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/lookup", self.itunes_url),
            &[("bundleId", bundle_id), ("country", country)],
        )
        .map_err(|e| LookupError::InvalidUrl(e.to_string()))?;

        let body = fetch(&url, bundle_id)?;
        let response: ItunesResponse = serde_json::from_str(&body)
            .map_err(|e| LookupError::InvalidResponse(e.to_string()))?;

        let app = response
            .results
            .into_iter()
            .next()
            .ok_or_else(|| LookupError::NotFound(bundle_id.to_string()))?;

        let released = app.current_version_release_date.and_then(|d| {
            DateTime::parse_from_rfc3339(&d)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        });

        Ok(LookupData {
            version: app.version,
            name: app.track_name,
            url: app.track_view_url,
            release_notes: app.release_notes,
            released,
        })
    }

    fn play(&self, bundle_id: &str, country: &str) -> Result<LookupData, LookupError> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/store/apps/details", self.play_url),
            &[("id", bundle_id), ("hl", "en"), ("gl", country)],
        )
        .map_err(|e| LookupError::InvalidUrl(e.to_string()))?;

        let page = fetch(&url, bundle_id)?;
        let version = PLAY_VERSION_RE
            .captures(&page)
            .map(|caps| caps[1].to_string());
        let name = PLAY_TITLE_RE
            .captures(&page)
            .map(|caps| caps[1].to_string());

        if version.is_none() {
            debug!(bundle_id, "no version found on Google Play page");
        }

        Ok(LookupData {
            version,
            name,
            url: Some(url.to_string()),
            release_notes: None,
            released: None,
        })
    }
}

impl VersionLookup for StoreClient {
    fn lookup_version(
        &self,
        platform: Platform,
        bundle_id: &str,
        country: &str,
    ) -> Result<LookupData, LookupError> {
        let now = Utc::now().timestamp();
        let key = (
            platform.to_string(),
            bundle_id.to_string(),
            country.to_string(),
        );

        if let Some(data) = self.cached(&key, now) {
            debug!(%platform, bundle_id, country, "store lookup served from cache");
            return Ok(data);
        }

        debug!(%platform, bundle_id, country, "querying store");
        let data = match platform {
            Platform::Ios => self.itunes(bundle_id, country)?,
            Platform::Android => self.play(bundle_id, country)?,
        };

        self.remember(key, &data, now);
        Ok(data)
    }
}

/// Fetches a store URL, mapping 404 to [`LookupError::NotFound`].
fn fetch(url: &reqwest::Url, bundle_id: &str) -> Result<String, LookupError> {
    let response = reqwest::blocking::Client::new()
        .get(url.as_str())
        .header("User-Agent", USER_AGENT)
        .timeout(LOOKUP_TIMEOUT)
        .send()?;

    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(LookupError::NotFound(bundle_id.to_string()));
    }
    if !status.is_success() {
        warn!("store returned status {}: {}", status, url);
        return Err(LookupError::Status(status.as_u16()));
    }

    Ok(response.text()?)
}

/// Describes when a release happened: relative within a week, the full date
/// beyond that.
fn release_age(released: DateTime<Utc>) -> String {
    let age = Utc::now().signed_duration_since(released);

    if age.num_days() > 7 {
        released.format("%x %X").to_string()
    } else if age < chrono::TimeDelta::zero() {
        let ahead = (-age).to_std().unwrap_or_default();
        format!("in {}", HumanTime::from(ahead).to_string())
    } else {
        HumanDuration::from(Some(SystemTime::from(released))).to_string()
    }
}
