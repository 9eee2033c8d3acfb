use tracing_subscriber::EnvFilter;

use crate::pipeline::{RunEvent, RunObserver};

pub fn init_tracing() {
    let filter = EnvFilter::from_default_env().add_directive(
        "irradiance_ingestion=info"
            .parse()
            .unwrap_or_else(|_| tracing_subscriber::filter::LevelFilter::INFO.into()),
    );

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Reports ingestion progress as `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl RunObserver for TracingObserver {
    fn record(&self, event: RunEvent<'_>) {
        match event {
            RunEvent::SitesFailed { error } => {
                tracing::error!(error = %error, "sites request failed");
            }
            RunEvent::SitesListed { count } => {
                tracing::info!(sites = count, "sites request successful");
            }
            RunEvent::SiteFailed {
                resource_id,
                stage,
                error,
            } => {
                tracing::error!(resource_id, stage = %stage, error = %error, "site skipped");
            }
            RunEvent::StepRejected {
                resource_id,
                index,
                reason,
            } => {
                tracing::warn!(resource_id, index, reason, "forecast step skipped");
            }
            RunEvent::AnchorMisaligned { resource_id, error } => {
                tracing::warn!(
                    resource_id,
                    error = %error,
                    "poll does not line up with the run start grid"
                );
            }
            RunEvent::ResourceCollision {
                key,
                existing,
                incoming,
            } => {
                tracing::warn!(
                    resource = key.get(),
                    existing,
                    incoming,
                    "resource key already used by another identifier"
                );
            }
            RunEvent::RegistrationFailed { resource_id, error } => {
                tracing::warn!(resource_id, error = %error, "resource mapping not recorded");
            }
            RunEvent::RowsWritten { resource_id, rows } => {
                tracing::debug!(resource_id, rows, "rows inserted");
            }
            RunEvent::Finished(summary) => {
                tracing::info!(
                    sites = summary.sites,
                    failed_sites = summary.failed_sites,
                    rejected_steps = summary.rejected_steps,
                    inserted_rows = summary.inserted_rows,
                    "ingestion run finished"
                );
            }
        }
    }
}
