//! intelligence-report-dl command line entry point
//!
//! Settings may also come from a `.env` file in the working directory.

use intelligence_report_dl::ReportDownloader;
use intelligence_report_dl::cli::{self, init_tracing};
use std::process::ExitCode;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = match cli::parse_from(std::env::args_os()) {
        Ok(cli) => cli,
        Err(e) => e.exit(),
    };
    init_tracing();

    let downloader = match ReportDownloader::new(cli.into_config()) {
        Ok(downloader) => downloader,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let summary = match downloader.run().await {
        Ok(summary) => summary,
        Err(e) => {
            let stage = e.stage().map(|s| s.to_string());
            tracing::error!(stage = stage.as_deref(), error = %e, "report download failed");
            return ExitCode::FAILURE;
        }
    };

    match serde_json::to_string_pretty(&summary) {
        Ok(json) => println!("{json}"),
        Err(e) => tracing::warn!(error = %e, "could not serialize run summary"),
    }
    ExitCode::SUCCESS
}
