//! Command line surface
//!
//! The five required flags keep their original single-dash spelling
//! (`-Region`, `-ReportId`, ...). clap only understands single-character short
//! flags, so those arguments are rewritten to `--Region` etc. before parsing.
//! Kebab-case aliases (`--report-id`) are accepted as well.

use crate::config::{
    Config, DEFAULT_API_VERSION, DEFAULT_SERVICE_DOMAIN, FileCollisionAction, OutputConfig,
    ServiceConfig, StalePolicy, WaitConfig, WaitStrategy,
};
use crate::types::{Credentials, ReportId};
use clap::{Parser, ValueEnum};
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

/// Flags accepted with a single leading dash
pub const LEGACY_FLAGS: &[&str] = &["Region", "ReportId", "ClientId", "ClientSecret", "OutFile"];

/// How to wait for the triggered report
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum WaitMode {
    /// List until an instance newer than the trigger appears
    Poll,
    /// Sleep a fixed delay, then list once
    Fixed,
}

/// Trigger a Workspace ONE Intelligence report, download the newest instance
/// and save it as CSV
#[derive(Parser)]
#[command(name = "intelligence-report-dl", version, about)]
pub struct Cli {
    /// Region segment of the auth and API hostnames (e.g. na1)
    #[arg(long = "Region", visible_alias = "region", env = "INTELLIGENCE_REGION")]
    pub region: String,

    /// Identifier of the report definition
    #[arg(long = "ReportId", visible_alias = "report-id")]
    pub report_id: String,

    /// OAuth client identifier
    #[arg(
        long = "ClientId",
        visible_alias = "client-id",
        env = "INTELLIGENCE_CLIENT_ID"
    )]
    pub client_id: String,

    /// OAuth client secret
    #[arg(
        long = "ClientSecret",
        visible_alias = "client-secret",
        env = "INTELLIGENCE_CLIENT_SECRET",
        hide_env_values = true,
        allow_hyphen_values = true
    )]
    pub client_secret: String,

    /// Destination of the CSV file
    #[arg(long = "OutFile", visible_alias = "out-file")]
    pub out_file: PathBuf,

    /// Wait strategy after triggering the report
    #[arg(long, value_enum, default_value_t = WaitMode::Poll)]
    pub wait: WaitMode,

    /// Delay used by the fixed wait strategy, in seconds
    #[arg(long, default_value_t = 30)]
    pub delay_secs: u64,

    /// Pause between listings when polling, in seconds
    #[arg(long, default_value_t = 10)]
    pub poll_interval_secs: u64,

    /// Give up polling after this many seconds
    #[arg(long, default_value_t = 900)]
    pub poll_timeout_secs: u64,

    /// What to do if the trigger fails or no fresh instance appears
    #[arg(long, value_enum, default_value_t = StalePolicy::UseLatest)]
    pub on_stale: StalePolicy,

    /// What to do if the output file already exists
    #[arg(long, value_enum, default_value_t = FileCollisionAction::Overwrite)]
    pub on_existing: FileCollisionAction,

    /// Service domain the region is interpolated into
    #[arg(long, default_value = DEFAULT_SERVICE_DOMAIN)]
    pub service_domain: String,

    /// API version path segment
    #[arg(long, default_value = DEFAULT_API_VERSION)]
    pub api_version: String,

    /// Full token endpoint URL, replacing the region-derived one
    #[arg(long)]
    pub auth_url: Option<String>,

    /// Full report API base URL, replacing the region-derived one
    #[arg(long)]
    pub api_url: Option<String>,

    /// Per-request timeout in seconds (0 disables it)
    #[arg(long, default_value_t = 300)]
    pub timeout_secs: u64,
}

impl std::fmt::Debug for Cli {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cli")
            .field("region", &self.region)
            .field("report_id", &self.report_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("out_file", &self.out_file)
            .field("wait", &self.wait)
            .field("on_stale", &self.on_stale)
            .field("on_existing", &self.on_existing)
            .finish_non_exhaustive()
    }
}

impl Cli {
    /// Build the run configuration from parsed arguments
    pub fn into_config(self) -> Config {
        let mut service = ServiceConfig::new(self.region);
        service.service_domain = self.service_domain;
        service.api_version = self.api_version;
        service.auth_url = self.auth_url;
        service.api_base_url = self.api_url;
        service.request_timeout =
            (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs));

        let strategy = match self.wait {
            WaitMode::Fixed => WaitStrategy::FixedDelay {
                delay: Duration::from_secs(self.delay_secs),
            },
            WaitMode::Poll => WaitStrategy::Poll {
                interval: Duration::from_secs(self.poll_interval_secs),
                timeout: Duration::from_secs(self.poll_timeout_secs),
            },
        };

        Config {
            service,
            report_id: ReportId::new(self.report_id),
            credentials: Credentials::new(self.client_id, self.client_secret),
            output: OutputConfig {
                path: self.out_file,
                on_existing: self.on_existing,
            },
            wait: WaitConfig {
                strategy,
                on_stale: self.on_stale,
                ..WaitConfig::default()
            },
        }
    }
}

/// Parse arguments, accepting the single-dash legacy flags
///
/// # Errors
///
/// Returns clap's error for missing or malformed arguments (and for
/// `--help` / `--version`, which clap reports as errors to be printed).
pub fn parse_from<I, T>(args: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    Cli::try_parse_from(normalize_legacy_flags(args))
}

/// Rewrite `-Region` / `-Region=value` style arguments to their `--` form
///
/// The argument after a bare legacy flag is its value and is left alone, as
/// is everything after a `--` separator.
pub fn normalize_legacy_flags<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut normalized = Vec::new();
    let mut literal = false;
    let mut takes_value = false;

    for arg in args.into_iter().map(Into::into) {
        if literal || std::mem::take(&mut takes_value) {
            normalized.push(arg);
            continue;
        }
        match arg.to_str() {
            Some("--") => {
                literal = true;
                normalized.push(arg);
            }
            Some(text) => match legacy_flag(text) {
                Some(LegacyFlag { inline_value }) => {
                    takes_value = !inline_value;
                    normalized.push(OsString::from(format!("-{text}")));
                }
                None => normalized.push(arg),
            },
            None => normalized.push(arg),
        }
    }
    normalized
}

struct LegacyFlag {
    inline_value: bool,
}

fn legacy_flag(arg: &str) -> Option<LegacyFlag> {
    let rest = arg.strip_prefix('-')?;
    if rest.starts_with('-') {
        return None;
    }
    let (name, inline_value) = match rest.split_once('=') {
        Some((name, _)) => (name, true),
        None => (rest, false),
    };
    LEGACY_FLAGS
        .contains(&name)
        .then_some(LegacyFlag { inline_value })
}

/// Initialize tracing for the command line binary
///
/// Logs go to stderr so stdout only carries the run summary. The filter comes
/// from `RUST_LOG` and defaults to `info`.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
