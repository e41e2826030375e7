//! # intelligence-report-dl
//!
//! Trigger a Workspace ONE Intelligence report, wait for the new instance,
//! download it and save it as comma-delimited text.
//!
//! One run is a straight line through five stages: acquire a token, trigger
//! the report, wait and list instances, download the newest, persist it.
//! Each stage returns a [`Result`]; [`ReportDownloader::run`] decides whether a
//! failure halts the run or the run carries on with the newest visible
//! instance (see [`StalePolicy`]).
//!
//! ## Quick Start
//!
//! ```no_run
//! use intelligence_report_dl::{
//!     Config, Credentials, OutputConfig, ReportDownloader, ReportId, ServiceConfig, WaitConfig,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         service: ServiceConfig::new("na1"),
//!         report_id: ReportId::new("0b7e3e8c-2f6a-4e55-9d3c-1f2a3b4c5d6e"),
//!         credentials: Credentials::new("client-id", "client-secret"),
//!         output: OutputConfig::new("report.csv"),
//!         wait: WaitConfig::default(),
//!     };
//!
//!     let summary = ReportDownloader::new(config)?.run().await?;
//!     println!("saved {} rows to {}", summary.rows_written, summary.output_path.display());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Command line parsing and logging setup for the binary
pub mod cli;
/// HTTP client for the token endpoint and report API
pub mod client;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Writing reports to disk
pub mod persist;
/// The report workflow
pub mod pipeline;
/// Core types
pub mod types;
/// Output path helpers
pub mod utils;
/// Waiting for a triggered instance
pub mod wait;

// Re-export commonly used types
pub use client::ReportClient;
pub use config::{
    Config, FileCollisionAction, OutputConfig, ServiceConfig, StalePolicy, WaitConfig,
    WaitStrategy,
};
pub use error::{Error, Result};
pub use persist::{PersistSummary, write_report};
pub use pipeline::ReportDownloader;
pub use types::{
    AccessToken, Credentials, InstanceId, ReportId, ReportInstance, ReportListing, RunSummary,
    Stage,
};
pub use wait::{WaitOutcome, wait_for_instance};
