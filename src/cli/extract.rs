//! Extraction command: one run, or repeated runs on a cron schedule

use tracing::{error, info};

use super::{Cli, CliError};
use crate::cancel::SharedCancellation;
use crate::extractor::{ExtractionStats, Extractor};
use crate::scheduler::Scheduler;

impl Cli {
    /// Run the extraction once, or immediately and then on the cron schedule
    /// until cancelled.
    ///
    /// A failed scheduled run is logged and the schedule continues; a failed
    /// single run is returned as an error.
    pub async fn execute(&self, cancel: SharedCancellation) -> Result<(), CliError> {
        let extractor = self.build_extractor()?;
        info!(
            workspace = %self.workspace,
            output_dir = %self.output_dir.display(),
            requests_per_minute = self.requests_per_minute,
            "Extractor configured"
        );

        if self.once {
            return run_once(&extractor, &cancel).await.map(|_| ());
        }

        let scheduler = Scheduler::parse(&self.schedule_cron)?;
        let (extractor, run_cancel) = (&extractor, &cancel);
        scheduler
            .run(&cancel, move || async move {
                if let Err(e) = run_once(extractor, run_cancel).await {
                    error!(error = %e, "Scheduled extraction failed");
                }
            })
            .await;
        Ok(())
    }
}

async fn run_once(extractor: &Extractor, cancel: &SharedCancellation) -> Result<ExtractionStats, CliError> {
    match extractor.run(cancel).await {
        Ok(stats) => {
            info!(
                users = stats.users_extracted,
                projects = stats.projects_extracted,
                errors = stats.errors,
                duration_ms = stats.duration.as_millis() as u64,
                "Extraction finished"
            );
            Ok(stats)
        }
        Err(failure) => {
            error!(partial = %failure.partial, "Extraction aborted");
            Err(CliError::ExtractionFailed(failure.to_string()))
        }
    }
}
