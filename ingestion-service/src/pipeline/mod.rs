use std::fmt;

use irradiance_client::{
    domain::{PollRecord, Quantity, Site},
    AlignmentError, ResourceKey,
};
use serde_json::Value;
use time::OffsetDateTime;

use crate::transform::{self, IngestMode};

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("source error: {0}")]
    Source(String),
    #[error("transform error: {0}")]
    Transform(String),
    #[error("sink error: {0}")]
    Sink(String),
}

/// Where the data of a run comes from.
#[async_trait::async_trait]
pub trait SiteSource: Send + Sync {
    async fn sites(&self) -> Result<Vec<Site>, PipelineError>;

    async fn steps(&self, site: &Site, quantity: Quantity) -> Result<Vec<Value>, PipelineError>;
}

/// Outcome of recording a `resource -> resource_id` mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    New,
    Known,
    Collision { existing: String },
}

/// Where the rows of a run go. Every call is its own statement(s) and commits
/// on its own.
#[async_trait::async_trait]
pub trait PollSink: Send + Sync {
    /// Returns the number of rows actually stored. With `skip_existing`, rows
    /// whose `(time, resource)` is already present are silently dropped.
    async fn write(
        &self,
        quantity: Quantity,
        rows: &[PollRecord],
        skip_existing: bool,
    ) -> Result<u64, PipelineError>;

    async fn register_resource(
        &self,
        key: ResourceKey,
        resource_id: &str,
    ) -> Result<Registration, PipelineError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Identifier,
    Fetch,
    Insert,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Identifier => "identifier",
            Self::Fetch => "fetch",
            Self::Insert => "insert",
        })
    }
}

#[derive(Debug)]
pub enum RunEvent<'a> {
    SitesFailed {
        error: &'a PipelineError,
    },
    SitesListed {
        count: usize,
    },
    SiteFailed {
        resource_id: &'a str,
        stage: Stage,
        error: &'a (dyn std::error::Error + Send + Sync),
    },
    StepRejected {
        resource_id: &'a str,
        index: usize,
        reason: &'a str,
    },
    AnchorMisaligned {
        resource_id: &'a str,
        error: &'a AlignmentError,
    },
    ResourceCollision {
        key: ResourceKey,
        existing: &'a str,
        incoming: &'a str,
    },
    RegistrationFailed {
        resource_id: &'a str,
        error: &'a PipelineError,
    },
    RowsWritten {
        resource_id: &'a str,
        rows: u64,
    },
    Finished(&'a RunSummary),
}

/// Receives progress of an ingestion run. Passed in explicitly so the
/// pipeline does not depend on a global logger.
pub trait RunObserver: Send + Sync {
    fn record(&self, event: RunEvent<'_>);
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub sites: usize,
    pub failed_sites: usize,
    pub rejected_steps: usize,
    pub inserted_rows: u64,
}

pub struct Pipeline<S, K> {
    pub source: S,
    pub sink: K,
    pub quantity: Quantity,
    pub mode: IngestMode,
    pub take: usize,
}

impl<S, K> Pipeline<S, K>
where
    S: SiteSource,
    K: PollSink,
{
    /// Run one poll of every site. Only a failure to list the sites aborts the
    /// run; anything that goes wrong for a single site is reported and the
    /// next site is processed.
    pub async fn run(
        &self,
        anchor: OffsetDateTime,
        observer: &dyn RunObserver,
    ) -> Result<RunSummary, PipelineError> {
        let sites = match self.source.sites().await {
            Ok(sites) => sites,
            Err(error) => {
                observer.record(RunEvent::SitesFailed { error: &error });
                return Err(error);
            }
        };
        observer.record(RunEvent::SitesListed { count: sites.len() });

        let mut summary = RunSummary {
            sites: sites.len(),
            ..RunSummary::default()
        };

        for site in &sites {
            match self.poll_site(site, anchor, observer).await {
                Ok((inserted, rejected)) => {
                    summary.inserted_rows += inserted;
                    summary.rejected_steps += rejected;
                }
                Err((stage, error)) => {
                    summary.failed_sites += 1;
                    observer.record(RunEvent::SiteFailed {
                        resource_id: &site.resource_id,
                        stage,
                        error: &error,
                    });
                }
            }
        }

        observer.record(RunEvent::Finished(&summary));
        Ok(summary)
    }

    async fn poll_site(
        &self,
        site: &Site,
        anchor: OffsetDateTime,
        observer: &dyn RunObserver,
    ) -> Result<(u64, usize), (Stage, PipelineError)> {
        let resource_id = site.resource_id.as_str();

        let key = ResourceKey::from_resource_id(resource_id)
            .map_err(|e| (Stage::Identifier, PipelineError::Transform(e.to_string())))?;

        let mut steps = self
            .source
            .steps(site, self.quantity)
            .await
            .map_err(|e| (Stage::Fetch, e))?;
        steps.truncate(self.take);

        let built = transform::build_rows(self.mode, anchor, key, steps);
        for rejected in &built.rejected {
            observer.record(RunEvent::StepRejected {
                resource_id,
                index: rejected.index,
                reason: &rejected.reason,
            });
        }
        if let Some(error) = &built.misalignment {
            observer.record(RunEvent::AnchorMisaligned { resource_id, error });
        }

        // The side table is optional; without it the rows are still stored.
        match self.sink.register_resource(key, resource_id).await {
            Ok(Registration::Collision { existing }) => {
                observer.record(RunEvent::ResourceCollision {
                    key,
                    existing: &existing,
                    incoming: resource_id,
                });
            }
            Ok(Registration::New | Registration::Known) => {}
            Err(error) => {
                observer.record(RunEvent::RegistrationFailed {
                    resource_id,
                    error: &error,
                });
            }
        }

        let inserted = self
            .sink
            .write(self.quantity, &built.rows, self.mode.skips_existing())
            .await
            .map_err(|e| (Stage::Insert, e))?;
        observer.record(RunEvent::RowsWritten {
            resource_id,
            rows: inserted,
        });

        Ok((inserted, built.rejected.len()))
    }
}
