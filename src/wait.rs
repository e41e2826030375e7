//! Waiting for a triggered report instance to materialize
//!
//! The service gives no completion signal for a run, so the waiter either
//! sleeps a fixed delay and lists once, or lists on an interval until an
//! instance started after the trigger shows up. Either way the caller learns
//! whether the newest visible instance is fresh.

use crate::client::ReportClient;
use crate::config::{WaitConfig, WaitStrategy};
use crate::error::Result;
use crate::types::{AccessToken, ReportId, ReportInstance, ReportListing};
use chrono::{DateTime, TimeDelta, Utc};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// What the waiter saw when it stopped
#[derive(Debug)]
pub struct WaitOutcome {
    /// Last listing fetched, newest first
    pub listing: ReportListing,
    /// Whether the newest instance started after the trigger
    pub fresh: bool,
    /// Time spent waiting, including list calls
    pub waited: Duration,
}

/// Whether an instance started at or after the trigger time, minus `clock_skew`
pub fn is_fresh(
    instance: &ReportInstance,
    triggered_at: DateTime<Utc>,
    clock_skew: Duration,
) -> bool {
    let skew = TimeDelta::from_std(clock_skew).unwrap_or(TimeDelta::MAX);
    match triggered_at.checked_sub_signed(skew) {
        Some(cutoff) => instance.start_time >= cutoff,
        None => true,
    }
}

fn newest_is_fresh(listing: &ReportListing, triggered_at: DateTime<Utc>, skew: Duration) -> bool {
    listing
        .newest()
        .is_some_and(|instance| is_fresh(instance, triggered_at, skew))
}

/// Wait according to `config.strategy` and return the listing to pick from
///
/// List failures are returned immediately; there is no retry.
pub async fn wait_for_instance(
    client: &ReportClient,
    report_id: &ReportId,
    token: &AccessToken,
    triggered_at: DateTime<Utc>,
    config: &WaitConfig,
) -> Result<WaitOutcome> {
    let started = Instant::now();

    match config.strategy {
        WaitStrategy::FixedDelay { delay } => {
            debug!(delay_secs = delay.as_secs_f64(), "waiting for report generation");
            tokio::time::sleep(delay).await;

            let listing = client.list_instances(report_id, token).await?;
            let fresh = newest_is_fresh(&listing, triggered_at, config.clock_skew);
            Ok(WaitOutcome {
                listing,
                fresh,
                waited: started.elapsed(),
            })
        }
        WaitStrategy::Poll { interval, timeout } => {
            let deadline = started + timeout;
            let mut attempt: u32 = 0;

            loop {
                attempt += 1;
                let listing = client.list_instances(report_id, token).await?;

                if newest_is_fresh(&listing, triggered_at, config.clock_skew) {
                    info!(attempts = attempt, "fresh report instance available");
                    return Ok(WaitOutcome {
                        listing,
                        fresh: true,
                        waited: started.elapsed(),
                    });
                }

                let now = Instant::now();
                if now >= deadline {
                    warn!(
                        attempts = attempt,
                        timeout_secs = timeout.as_secs(),
                        "no fresh report instance before timeout"
                    );
                    return Ok(WaitOutcome {
                        listing,
                        fresh: false,
                        waited: started.elapsed(),
                    });
                }

                let pause = interval.min(deadline - now);
                debug!(
                    attempt,
                    next_poll_ms = pause.as_millis() as u64,
                    "report instance not ready yet"
                );
                tokio::time::sleep(pause).await;
            }
        }
    }
}
