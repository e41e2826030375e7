//! The report workflow: authenticate, trigger, wait and list, download, persist
//!
//! Every stage returns a [`Result`]. Whether a failure halts the run or the
//! run carries on with the newest visible instance is decided here, in one
//! place, according to [`StalePolicy`].

use crate::client::ReportClient;
use crate::config::{Config, StalePolicy};
use crate::error::{Error, Result};
use crate::persist::write_report;
use crate::types::{RunSummary, Stage};
use crate::wait::wait_for_instance;
use chrono::Utc;
use std::time::Duration;
use tracing::{Instrument, info, info_span, warn};

/// Runs the report workflow once for a validated [`Config`]
#[derive(Debug)]
pub struct ReportDownloader {
    config: Config,
    client: ReportClient,
}

impl ReportDownloader {
    /// Validate the configuration and build the HTTP client
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration is incomplete or the
    /// endpoints are malformed.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let client = ReportClient::new(&config.service)?;
        Ok(Self { config, client })
    }

    /// The configuration this downloader runs with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Execute the workflow
    ///
    /// | failure | `UseLatest` | `Fail` |
    /// |---|---|---|
    /// | token, list, download, persist | halt | halt |
    /// | trigger | continue with newest visible | halt |
    /// | no fresh instance | continue with newest visible | halt |
    /// | empty listing | halt | halt |
    pub async fn run(&self) -> Result<RunSummary> {
        let config = &self.config;
        let report_id = &config.report_id;
        let on_stale = config.wait.on_stale;

        let token = self
            .client
            .acquire_token(&config.credentials)
            .instrument(stage_span(Stage::Authenticate))
            .await?;

        let triggered_at = Utc::now();
        let trigger_result = self
            .client
            .trigger_run(report_id, &token)
            .instrument(stage_span(Stage::Trigger))
            .await;
        let triggered = match trigger_result {
            Ok(()) => true,
            Err(e) if on_stale == StalePolicy::UseLatest => {
                warn!(
                    report_id = %report_id,
                    error = %e,
                    "could not trigger report run, continuing with existing instances"
                );
                false
            }
            Err(e) => return Err(e),
        };

        let (listing, fresh, waited) = if triggered {
            let outcome = wait_for_instance(
                &self.client,
                report_id,
                &token,
                triggered_at,
                &config.wait,
            )
            .instrument(stage_span(Stage::List))
            .await?;
            (outcome.listing, outcome.fresh, outcome.waited)
        } else {
            let listing = self
                .client
                .list_instances(report_id, &token)
                .instrument(stage_span(Stage::List))
                .await?;
            (listing, false, Duration::ZERO)
        };

        let newest = listing.newest().ok_or_else(|| Error::NoInstances {
            report_id: report_id.to_string(),
        })?;

        if !fresh {
            match on_stale {
                StalePolicy::UseLatest => warn!(
                    instance_id = %newest.id,
                    started_at = %newest.start_time,
                    "newest visible instance predates this run, downloading it anyway"
                ),
                StalePolicy::Fail => {
                    return Err(Error::StaleReport {
                        report_id: report_id.to_string(),
                        waited,
                    });
                }
            }
        }

        let artifact = self
            .client
            .download(&newest.id, &token)
            .instrument(stage_span(Stage::Download))
            .await?;

        let persisted = {
            let _span = stage_span(Stage::Persist).entered();
            write_report(&config.output, &artifact)?
        };

        info!(
            report_id = %report_id,
            instance_id = %newest.id,
            fresh,
            rows = persisted.rows_written,
            path = %persisted.path.display(),
            "report saved"
        );

        Ok(RunSummary {
            report_id: report_id.clone(),
            instance_id: newest.id.clone(),
            instance_started_at: newest.start_time,
            fresh,
            bytes_downloaded: artifact.len(),
            rows_written: persisted.rows_written,
            output_path: persisted.path,
        })
    }
}

fn stage_span(stage: Stage) -> tracing::Span {
    info_span!("stage", name = %stage)
}
