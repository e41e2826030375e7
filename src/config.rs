//! Configuration types for intelligence-report-dl
//!
//! A [`Config`] is assembled once at the entry point and handed to every stage
//! by reference. The sub-configs derive `serde` with per-field defaults so they
//! can also be built from JSON; durations are (de)serialized as whole seconds.

use crate::error::{Error, Result};
use crate::types::{Credentials, InstanceId, ReportId};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Service domain the region is interpolated into
pub const DEFAULT_SERVICE_DOMAIN: &str = "data.vmwservices.com";

/// API version segment of the report endpoints
pub const DEFAULT_API_VERSION: &str = "v2";

/// Everything one run needs
#[derive(Debug)]
pub struct Config {
    /// Where the service lives and how to talk to it
    pub service: ServiceConfig,

    /// Report definition to regenerate and download
    pub report_id: ReportId,

    /// OAuth client credentials
    pub credentials: Credentials,

    /// Destination file and collision handling
    pub output: OutputConfig,

    /// How to wait for the triggered instance
    pub wait: WaitConfig,
}

impl Config {
    /// Check that identifiers are present and the endpoints are well-formed
    ///
    /// Region and report identifiers are otherwise passed through untouched.
    pub fn validate(&self) -> Result<()> {
        require_non_empty("region", &self.service.region)?;
        require_non_empty("service_domain", &self.service.service_domain)?;
        require_non_empty("api_version", &self.service.api_version)?;
        require_non_empty("report_id", self.report_id.as_str())?;
        require_non_empty("client_id", &self.credentials.client_id)?;

        if self.output.path.as_os_str().is_empty() {
            return Err(Error::config("out_file", "output path must not be empty"));
        }

        if matches!(self.wait.strategy, WaitStrategy::Poll { interval, .. } if interval.is_zero()) {
            return Err(Error::config(
                "poll_interval",
                "poll interval must be greater than zero",
            ));
        }

        // Surfaces malformed overrides or region values before any request is made
        self.service.endpoints()?;
        Ok(())
    }
}

fn require_non_empty(key: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::config(key, format!("{key} must not be empty")));
    }
    Ok(())
}

/// Service location and transport settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Region segment interpolated into the auth and API hostnames
    pub region: String,

    /// Service domain (default: "data.vmwservices.com")
    #[serde(default = "default_service_domain")]
    pub service_domain: String,

    /// API version path segment (default: "v2")
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Full token endpoint URL, replacing the region-derived one
    #[serde(default)]
    pub auth_url: Option<String>,

    /// Full report API base URL, replacing the region-derived one
    #[serde(default)]
    pub api_base_url: Option<String>,

    /// Per-request timeout (default: 300 seconds, None = no timeout)
    #[serde(default = "default_request_timeout", with = "optional_duration_serde")]
    pub request_timeout: Option<Duration>,
}

impl ServiceConfig {
    /// Service settings for a region with every other field at its default
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            service_domain: default_service_domain(),
            api_version: default_api_version(),
            auth_url: None,
            api_base_url: None,
            request_timeout: default_request_timeout(),
        }
    }

    /// Resolve the token endpoint and report API base
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if either URL does not parse.
    pub fn endpoints(&self) -> Result<Endpoints> {
        let auth_url = match &self.auth_url {
            Some(url) => url.clone(),
            None => format!(
                "https://auth.{}.{}/oauth/token",
                self.region, self.service_domain
            ),
        };

        let mut api_base = match &self.api_base_url {
            Some(url) => url.clone(),
            None => format!(
                "https://api.{}.{}/{}/reports/",
                self.region, self.service_domain, self.api_version
            ),
        };
        if !api_base.ends_with('/') {
            api_base.push('/');
        }

        url::Url::parse(&auth_url)
            .map_err(|e| Error::config("auth_url", format!("invalid URL '{auth_url}': {e}")))?;
        url::Url::parse(&api_base)
            .map_err(|e| Error::config("api_url", format!("invalid URL '{api_base}': {e}")))?;

        Ok(Endpoints { auth_url, api_base })
    }
}

/// Resolved service URLs
///
/// `api_base` always ends with `/`; report and instance identifiers are
/// percent-encoded as single path segments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoints {
    /// OAuth token endpoint
    pub auth_url: String,
    /// Report API base, e.g. `https://api.na1.data.vmwservices.com/v2/reports/`
    pub api_base: String,
}

impl Endpoints {
    /// `POST` target that starts regeneration of a report
    pub fn run_url(&self, report_id: &ReportId) -> String {
        format!(
            "{}{}/run",
            self.api_base,
            urlencoding::encode(report_id.as_str())
        )
    }

    /// `POST` target that lists generated instances of a report
    pub fn search_url(&self, report_id: &ReportId) -> String {
        format!(
            "{}{}/downloads/search",
            self.api_base,
            urlencoding::encode(report_id.as_str())
        )
    }

    /// `GET` target that returns the artifact of one instance
    pub fn download_url(&self, instance_id: &InstanceId) -> String {
        format!(
            "{}tracking/{}/download",
            self.api_base,
            urlencoding::encode(instance_id.as_str())
        )
    }
}

/// Output file settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Destination path of the delimited text file
    pub path: PathBuf,

    /// What to do when the destination already exists (default: overwrite)
    #[serde(default)]
    pub on_existing: FileCollisionAction,
}

impl OutputConfig {
    /// Output to `path`, overwriting any existing file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            on_existing: FileCollisionAction::default(),
        }
    }
}

/// How to handle an output file that already exists
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum FileCollisionAction {
    /// Replace the existing file (atomically) (default)
    #[default]
    Overwrite,
    /// Append rows to the existing file
    Append,
    /// Write to `name (N).ext` instead
    Rename,
    /// Fail without touching the existing file
    Refuse,
}

/// Waiting between triggering a run and picking the instance to download
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WaitConfig {
    /// Fixed delay or poll loop (default: poll)
    #[serde(default)]
    pub strategy: WaitStrategy,

    /// Tolerance applied to the local trigger time when judging freshness (default: 5 seconds)
    #[serde(default = "default_clock_skew", with = "duration_serde")]
    pub clock_skew: Duration,

    /// What to do when no fresh instance shows up (default: use latest)
    #[serde(default)]
    pub on_stale: StalePolicy,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            strategy: WaitStrategy::default(),
            clock_skew: default_clock_skew(),
            on_stale: StalePolicy::default(),
        }
    }
}

/// How the waiter gives the backend time to materialize a new instance
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum WaitStrategy {
    /// Sleep once, then list once
    FixedDelay {
        /// Delay after the trigger (default: 30 seconds)
        #[serde(default = "default_fixed_delay", with = "duration_serde")]
        delay: Duration,
    },
    /// List repeatedly until a fresh instance appears or the timeout elapses
    Poll {
        /// Pause between listings (default: 10 seconds)
        #[serde(default = "default_poll_interval", with = "duration_serde")]
        interval: Duration,
        /// Give up after this long (default: 15 minutes)
        #[serde(default = "default_poll_timeout", with = "duration_serde")]
        timeout: Duration,
    },
}

impl WaitStrategy {
    /// The fixed 30 second delay
    pub fn fixed() -> Self {
        WaitStrategy::FixedDelay {
            delay: default_fixed_delay(),
        }
    }
}

impl Default for WaitStrategy {
    fn default() -> Self {
        WaitStrategy::Poll {
            interval: default_poll_interval(),
            timeout: default_poll_timeout(),
        }
    }
}

/// Policy when the trigger fails or no fresh instance appears in time
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum StalePolicy {
    /// Log a warning and download the newest visible instance (default)
    #[default]
    UseLatest,
    /// Stop the run with an error
    Fail,
}

fn default_service_domain() -> String {
    DEFAULT_SERVICE_DOMAIN.to_string()
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

fn default_request_timeout() -> Option<Duration> {
    Some(Duration::from_secs(300))
}

fn default_fixed_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_poll_timeout() -> Duration {
    Duration::from_secs(15 * 60) // 15 minutes
}

fn default_clock_skew() -> Duration {
    Duration::from_secs(5)
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Optional Duration serialization helper
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}
