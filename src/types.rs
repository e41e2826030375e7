//! Core types for intelligence-report-dl

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Number of instance records requested from the listing endpoint
///
/// Only a single page is fetched; older instances beyond this are invisible.
pub const LIST_PAGE_SIZE: usize = 200;

/// Identifier of a report definition (the stable, user-configured report)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportId(pub String);

impl ReportId {
    /// Create a new ReportId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ReportId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ReportId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ReportId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of one generated instance of a report
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(pub String);

impl InstanceId {
    /// Borrow the identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for InstanceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl PartialEq<&str> for InstanceId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// OAuth client credentials
///
/// Supplied externally for each run and never written anywhere. The secret
/// is redacted from `Debug` output.
#[derive(Debug)]
pub struct Credentials {
    /// OAuth client identifier
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: SecretString,
}

impl Credentials {
    /// Create credentials from plain strings
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: SecretString::from(client_secret.into()),
        }
    }
}

/// Bearer token obtained from the client-credentials grant
///
/// Lives for the remainder of the run; never cached or refreshed.
#[derive(Debug)]
pub struct AccessToken(SecretString);

impl AccessToken {
    /// Wrap a raw token string
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    /// Raw token value for the `Authorization` header
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

/// One generated instance of a report, as returned by the listing endpoint
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReportInstance {
    /// Instance identifier used for the download
    pub id: InstanceId,

    /// When generation of this instance started
    #[serde(with = "start_time_serde")]
    pub start_time: DateTime<Utc>,

    /// Any other service-defined fields, kept as-is
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Report instances ordered newest first
///
/// The ordering is established by a stable sort on `start_time` descending, so
/// among instances sharing the newest timestamp the one the service listed
/// first wins.
#[derive(Clone, Debug, Default)]
pub struct ReportListing {
    instances: Vec<ReportInstance>,
}

impl ReportListing {
    /// Sort instances newest first and wrap them
    pub fn from_unsorted(mut instances: Vec<ReportInstance>) -> Self {
        instances.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Self { instances }
    }

    /// The most recently started instance, if any
    pub fn newest(&self) -> Option<&ReportInstance> {
        self.instances.first()
    }

    /// Number of instances in the listing
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Whether the listing is empty
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Whether the page came back full, meaning older instances may be missing
    pub fn truncated(&self) -> bool {
        self.instances.len() >= LIST_PAGE_SIZE
    }

    /// Instances, newest first
    pub fn instances(&self) -> &[ReportInstance] {
        &self.instances
    }
}

/// Workflow stage, used to label log spans and errors
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Client-credentials token exchange
    Authenticate,
    /// Report regeneration request
    Trigger,
    /// Instance listing (including waiting for a fresh instance)
    List,
    /// Artifact download
    Download,
    /// Writing the output file
    Persist,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Authenticate => "authenticate",
            Stage::Trigger => "trigger",
            Stage::List => "list",
            Stage::Download => "download",
            Stage::Persist => "persist",
        };
        f.write_str(name)
    }
}

/// Result of a completed run
#[derive(Clone, Debug, Serialize)]
pub struct RunSummary {
    /// Report definition that was run
    pub report_id: ReportId,
    /// Instance that was downloaded
    pub instance_id: InstanceId,
    /// Start time of the downloaded instance
    pub instance_started_at: DateTime<Utc>,
    /// Whether the instance was generated by this run's trigger
    pub fresh: bool,
    /// Size of the downloaded artifact
    pub bytes_downloaded: usize,
    /// Rows written to the output file
    pub rows_written: usize,
    /// Where the rows were written (may differ from the configured path on rename)
    pub output_path: PathBuf,
}

// Instance timestamps arrive either as RFC 3339 text or as epoch milliseconds
mod start_time_serde {
    use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawTime {
        Millis(i64),
        Text(String),
    }

    pub fn serialize<S>(time: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&time.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match RawTime::deserialize(deserializer)? {
            RawTime::Millis(ms) => Utc
                .timestamp_millis_opt(ms)
                .single()
                .ok_or_else(|| D::Error::custom(format!("start_time out of range: {ms}"))),
            RawTime::Text(text) => parse_text(&text)
                .ok_or_else(|| D::Error::custom(format!("invalid start_time: {text:?}"))),
        }
    }

    fn parse_text(text: &str) -> Option<DateTime<Utc>> {
        if let Ok(time) = DateTime::parse_from_rfc3339(text) {
            return Some(time.with_timezone(&Utc));
        }
        // Offset-less timestamps are taken as UTC
        NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn instance(id: &str, start_time: &str) -> ReportInstance {
        serde_json::from_value(json!({ "id": id, "start_time": start_time })).unwrap()
    }

    #[test]
    fn test_listing_sorted_newest_first() {
        let listing = ReportListing::from_unsorted(vec![
            instance("s1", "2024-01-01T00:00:00Z"),
            instance("s3", "2024-01-03T00:00:00Z"),
            instance("s2", "2024-01-02T00:00:00Z"),
        ]);

        let ids: Vec<&str> = listing.instances().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["s3", "s2", "s1"]);
        assert_eq!(listing.newest().unwrap().id, "s3");
    }

    #[test]
    fn test_listing_ties_keep_service_order() {
        let listing = ReportListing::from_unsorted(vec![
            instance("old", "2024-01-01T00:00:00Z"),
            instance("first", "2024-01-05T00:00:00Z"),
            instance("second", "2024-01-05T00:00:00Z"),
        ]);

        assert_eq!(listing.newest().unwrap().id, "first");
        assert_eq!(listing.instances()[1].id, "second");
    }

    #[test]
    fn test_empty_listing_has_no_newest() {
        let listing = ReportListing::from_unsorted(Vec::new());
        assert!(listing.is_empty());
        assert!(listing.newest().is_none());
        assert!(!listing.truncated());
    }

    #[test]
    fn test_full_page_is_truncated() {
        let instances = (0..LIST_PAGE_SIZE)
            .map(|n| instance(&format!("s{n}"), "2024-01-01T00:00:00Z"))
            .collect();
        let listing = ReportListing::from_unsorted(instances);
        assert_eq!(listing.len(), LIST_PAGE_SIZE);
        assert!(listing.truncated());
    }

    #[test]
    fn test_start_time_offsets_compare_as_instants() {
        // 01:00+02:00 is 23:00Z the previous day, earlier than 00:30Z
        let listing = ReportListing::from_unsorted(vec![
            instance("offset", "2024-01-02T01:00:00+02:00"),
            instance("utc", "2024-01-02T00:30:00Z"),
        ]);
        assert_eq!(listing.newest().unwrap().id, "utc");
    }

    #[test]
    fn test_start_time_accepts_epoch_millis_and_naive() {
        let millis: ReportInstance =
            serde_json::from_value(json!({ "id": "a", "start_time": 1_704_153_600_000_i64 }))
                .unwrap();
        assert_eq!(
            millis.start_time,
            DateTime::parse_from_rfc3339("2024-01-02T00:00:00Z").unwrap()
        );

        let naive = instance("b", "2024-01-02T00:00:00.250");
        assert_eq!(
            naive.start_time,
            DateTime::parse_from_rfc3339("2024-01-02T00:00:00.250Z").unwrap()
        );
    }

    #[test]
    fn test_start_time_rejects_garbage() {
        let result: Result<ReportInstance, _> =
            serde_json::from_value(json!({ "id": "a", "start_time": "yesterday" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_instance_keeps_extra_fields() {
        let parsed: ReportInstance = serde_json::from_value(json!({
            "id": "s9",
            "start_time": "2024-01-02T00:00:00Z",
            "status": "COMPLETED",
            "record_count": 42
        }))
        .unwrap();

        assert_eq!(parsed.extra["status"], "COMPLETED");
        assert_eq!(parsed.extra["record_count"], 42);
        assert!(!parsed.extra.contains_key("id"));
    }

    #[test]
    fn test_secrets_are_redacted_in_debug() {
        let credentials = Credentials::new("client-a", "hunter2");
        let token = AccessToken::new("tok-1");

        assert!(!format!("{credentials:?}").contains("hunter2"));
        assert!(format!("{credentials:?}").contains("client-a"));
        assert!(!format!("{token:?}").contains("tok-1"));
        assert_eq!(token.expose(), "tok-1");
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::Authenticate.to_string(), "authenticate");
        assert_eq!(Stage::Persist.to_string(), "persist");
    }
}
