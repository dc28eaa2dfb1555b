//! One pass of the provisioning pipeline
//!
//! fetch → parse → derive filters → replace the alert policy. Each stage
//! returns its own error type, which is lifted into `AppError` here.

use crate::alerts::{
    AlertPolicy, AlertPolicyManager, AlertPolicyService, PolicyOutcome, PolicySettings,
};
use crate::config::Config;
use crate::error::{AppError, MonitoringError};
use crate::filters::{error_filters, ErrorFilter};
use crate::pattern::LogPattern;
use crate::source::{FileLocation, FileSource};
use log::{debug, info};
use std::future::Future;
use std::sync::Arc;

/// The fetched document and what was derived from it
#[derive(Debug, Clone)]
pub struct Prepared {
    pub pattern: LogPattern,
    pub filters: Vec<ErrorFilter>,
    pub fetched_bytes: usize,
}

/// Summary of a completed run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub fetched_bytes: usize,
    pub filters: Vec<ErrorFilter>,
    pub outcome: PolicyOutcome,
}

/// What one invocation produced
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Dry run: the policy that would have been submitted
    Planned {
        prepared: Prepared,
        policy: AlertPolicy,
    },
    Applied(RunReport),
}

/// Fetch the log pattern and make sure it describes at least one error entry
///
/// # Errors
///
/// Fails with `AppError::NoErrorLogs` when no record qualifies for a filter.
pub async fn prepare(config: &Config, source: &dyn FileSource) -> Result<Prepared, AppError> {
    let location = FileLocation::from(&config.source);
    let raw = source.fetch(&location).await?;
    debug!("Fetched log pattern: {}", raw);

    let pattern = LogPattern::parse(&raw)?;
    let filters = error_filters(&pattern, &config.filters);
    if filters.is_empty() {
        return Err(AppError::NoErrorLogs);
    }

    info!("Generated {} error filter(s)", filters.len());
    for filter in &filters {
        debug!("Error filter: {}", filter);
    }

    Ok(Prepared {
        pattern,
        filters,
        fetched_bytes: raw.len(),
    })
}

/// Build the policy a run would submit, without touching the project
pub fn plan(config: &Config, prepared: &Prepared) -> Result<AlertPolicy, AppError> {
    Ok(PolicySettings::from(&config.monitoring).build_policy(&prepared.pattern)?)
}

/// Replace the alert policy from an already prepared document
pub async fn apply(
    config: &Config,
    prepared: Prepared,
    service: Arc<dyn AlertPolicyService>,
) -> Result<RunReport, AppError> {
    let manager = AlertPolicyManager::new(service, PolicySettings::from(&config.monitoring));
    let outcome = manager.replace_policy(&prepared.pattern).await?;

    Ok(RunReport {
        fetched_bytes: prepared.fetched_bytes,
        filters: prepared.filters,
        outcome,
    })
}

/// Run the whole pipeline once
pub async fn run(
    config: &Config,
    source: &dyn FileSource,
    service: Arc<dyn AlertPolicyService>,
) -> Result<RunReport, AppError> {
    let prepared = prepare(config, source).await?;
    apply(config, prepared, service).await
}

/// Run once, connecting to Cloud Monitoring only when the policy is to be applied
///
/// `connect` is not called for a dry run or when the document yields no error
/// filters.
pub async fn execute<C, F>(
    config: &Config,
    source: &dyn FileSource,
    dry_run: bool,
    connect: C,
) -> Result<Outcome, AppError>
where
    C: FnOnce() -> F,
    F: Future<Output = Result<Arc<dyn AlertPolicyService>, MonitoringError>>,
{
    let prepared = prepare(config, source).await?;
    if dry_run {
        let policy = plan(config, &prepared)?;
        info!("Dry run, no changes made");
        return Ok(Outcome::Planned { prepared, policy });
    }

    let service = connect().await?;
    Ok(Outcome::Applied(apply(config, prepared, service).await?))
}
