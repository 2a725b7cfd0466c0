//! One reconcile pass: load the spec, observe the provider, diff, act,
//! publish status and decide when to look again.
//!
//! A pass never waits for the provider to converge. Anything still
//! materializing is requeued after the poll interval, and failures are
//! requeued with a backoff keyed on how many passes in a row have failed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use esd_common::settings::OperatorSettings;
use esd_common::util::backoff::RetryConfig;
use tracing::{debug, info, warn};

use crate::differ::{self, Diff, DomainField};
use crate::error::{EsdOperatorError, EsdOperatorResult};
use crate::fetcher::{Fetcher, Observation};
use crate::operator::crd::{ConditionStatus, ConditionType, DomainPhase, ElasticsearchDomainSpec};
use crate::provider::{self, CloudApi, CreateOutcome, DeleteOutcome};
use crate::queue::{ReconcileTask, TaskHandler};
use crate::status::{StatusReport, StatusWriter};
use crate::store::{DomainStore, ResourceId, StoredDomain};

/// The mutating call a pass made, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Created,
    /// Create answered that the domain already exists.
    AlreadyExisted,
    Updated(Vec<DomainField>),
    DeleteRequested,
    AlreadyDeleted,
    FinalizerRemoved,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub phase: DomainPhase,
    pub requeue_after: Option<Duration>,
    pub mutation: Option<Mutation>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Failures {
    consecutive: u32,
    unknown: u32,
}

pub struct Reconciler {
    store: Arc<dyn DomainStore>,
    cloud: Arc<dyn CloudApi>,
    fetcher: Fetcher,
    writer: StatusWriter,
    poll_interval: Duration,
    error_backoff: RetryConfig,
    unknown_error_threshold: u32,
    tokens: Mutex<HashMap<ResourceId, Arc<tokio::sync::Mutex<()>>>>,
    failures: Mutex<HashMap<ResourceId, Failures>>,
}

/// Phase implied by one observation.
pub fn phase_of(observation: &Observation) -> DomainPhase {
    match observation {
        Observation::NotFound => DomainPhase::Absent,
        Observation::Found(status) if status.deleted => DomainPhase::Deleting,
        Observation::Found(status) if !status.created => DomainPhase::Creating,
        // No endpoint yet means the first materialization is still running.
        Observation::Found(status) if status.processing && status.endpoint.is_none() => {
            DomainPhase::Creating
        }
        Observation::Found(status) if status.processing => DomainPhase::Processing,
        Observation::Found(_) => DomainPhase::Created,
    }
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn DomainStore>,
        cloud: Arc<dyn CloudApi>,
        settings: &OperatorSettings,
    ) -> Self {
        Self {
            fetcher: Fetcher::new(cloud.clone(), RetryConfig::from(&settings.retry)),
            writer: StatusWriter::new(store.clone(), settings.status_write_attempts),
            store,
            cloud,
            poll_interval: settings.poll_interval(),
            error_backoff: RetryConfig::from(&settings.error_backoff),
            unknown_error_threshold: settings.unknown_error_threshold.max(1),
            tokens: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn store(&self) -> &Arc<dyn DomainStore> {
        &self.store
    }

    fn token(&self, id: &ResourceId) -> Arc<tokio::sync::Mutex<()>> {
        let mut tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());
        tokens.entry(id.clone()).or_default().clone()
    }

    fn failures(&self, id: &ResourceId) -> Failures {
        let failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        failures.get(id).copied().unwrap_or_default()
    }

    pub fn consecutive_failures(&self, id: &ResourceId) -> u32 {
        self.failures(id).consecutive
    }

    pub async fn reconcile(&self, id: &ResourceId) -> EsdOperatorResult<ReconcileOutcome> {
        let token = self.token(id);
        let result = {
            let _guard = token.lock().await;
            match self.pass(id).await {
                Ok(outcome) => {
                    self.failures
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .remove(id);
                    debug!(domain = %id, phase = %outcome.phase, mutation = ?outcome.mutation, "Reconciled");
                    Ok(outcome)
                }
                Err(e) => {
                    self.record_failure(id, &e).await;
                    Err(e)
                }
            }
        };
        drop(token);

        if matches!(&result, Ok(outcome) if outcome.phase == DomainPhase::Absent) {
            self.release_token(id);
        }
        result
    }

    /// Forget the token of a resource that is gone, unless another pass is
    /// already waiting on it.
    fn release_token(&self, id: &ResourceId) {
        let mut tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());
        if tokens.get(id).is_some_and(|t| Arc::strong_count(t) == 1) {
            tokens.remove(id);
        }
    }

    /// When to retry after `err`. Configuration errors wait for the spec
    /// to change.
    pub fn error_requeue(&self, id: &ResourceId, err: &EsdOperatorError) -> Option<Duration> {
        match err {
            EsdOperatorError::Config(_) => None,
            EsdOperatorError::WriteConflict(_) => Some(Duration::ZERO),
            _ => {
                let failures = self.failures(id).consecutive.max(1);
                Some(self.error_backoff.delay_for(failures))
            }
        }
    }

    async fn record_failure(&self, id: &ResourceId, err: &EsdOperatorError) {
        let failures = {
            let mut all = self.failures.lock().unwrap_or_else(|e| e.into_inner());
            let entry = all.entry(id.clone()).or_default();
            entry.consecutive += 1;
            if matches!(err, EsdOperatorError::Unknown(_)) {
                entry.unknown += 1;
            }
            *entry
        };

        let report = match err {
            EsdOperatorError::Config(config) => {
                warn!(domain = %id, error = %config, "Domain configuration can not converge");
                Some(
                    StatusReport {
                        phase: Some(DomainPhase::Failed),
                        ..Default::default()
                    }
                    .with_condition(
                        ConditionType::Terminal,
                        ConditionStatus::True,
                        config.reason(),
                        config.to_string(),
                    )
                    .with_condition(
                        ConditionType::Synced,
                        ConditionStatus::False,
                        config.reason(),
                        "Spec can not be applied as written",
                    ),
                )
            }
            EsdOperatorError::Unknown(provider) if failures.unknown >= self.unknown_error_threshold => {
                warn!(
                    domain = %id,
                    failures = failures.unknown,
                    error = %provider,
                    "Repeated unexpected provider errors"
                );
                Some(StatusReport::default().with_condition(
                    ConditionType::Recoverable,
                    ConditionStatus::True,
                    err.reason().as_str(),
                    provider.to_string(),
                ))
            }
            EsdOperatorError::WriteConflict(_) => {
                debug!(domain = %id, "Status write conflicted, requeueing");
                None
            }
            other => {
                warn!(domain = %id, failures = failures.consecutive, error = %other, "Reconcile failed");
                None
            }
        };

        if let Some(report) = report {
            if let Err(e) = self.writer.write(id, &report).await {
                warn!(domain = %id, error = %e, "Unable to publish failure status");
            }
        }
    }

    async fn pass(&self, id: &ResourceId) -> EsdOperatorResult<ReconcileOutcome> {
        let Some(stored) = self.store.load(id).await? else {
            debug!(domain = %id, "Resource is gone, nothing to reconcile");
            return Ok(ReconcileOutcome {
                phase: DomainPhase::Absent,
                requeue_after: None,
                mutation: None,
            });
        };

        match stored.desired() {
            Some(spec) => self.converge(id, &stored, spec).await,
            None => self.tear_down(id, &stored).await,
        }
    }

    async fn converge(
        &self,
        id: &ResourceId,
        stored: &StoredDomain,
        spec: &ElasticsearchDomainSpec,
    ) -> EsdOperatorResult<ReconcileOutcome> {
        if !stored.has_finalizer() {
            self.store.add_finalizer(id).await?;
        }
        differ::validate_spec(spec)?;

        let name = spec.domain_name.as_str();
        let observation = self.fetcher.fetch_with_retry(name).await?;

        let mutation = match &observation {
            Observation::NotFound => {
                self.check_placement(spec).await?;
                let request = differ::create_request(spec);
                match provider::create_if_absent(self.cloud.as_ref(), &request).await? {
                    CreateOutcome::Created(_) => {
                        info!(domain = %id, name, "Domain created");
                        Some(Mutation::Created)
                    }
                    CreateOutcome::AlreadyExists => {
                        info!(domain = %id, name, "Domain already exists");
                        Some(Mutation::AlreadyExisted)
                    }
                }
            }
            Observation::Found(status) if status.deleted => {
                debug!(domain = %id, name, "Previous domain still being deleted");
                None
            }
            Observation::Found(status) => match differ::diff(spec, status)? {
                Diff::NoChange => None,
                Diff::Changes(changes) if status.processing => {
                    debug!(
                        domain = %id,
                        fields = ?changes.fields(),
                        "Domain is processing, deferring update"
                    );
                    None
                }
                Diff::Changes(changes) => {
                    if changes.contains(DomainField::SubnetIds) {
                        self.check_placement(spec).await?;
                    }
                    let update = changes.to_update(spec);
                    self.cloud.update_domain_config(name, &update).await?;
                    info!(domain = %id, name, fields = ?changes.fields(), "Domain config updated");
                    Some(Mutation::Updated(changes.fields()))
                }
            },
        };

        let observation = match mutation {
            Some(_) => self.fetcher.fetch_with_retry(name).await?,
            None => observation,
        };
        let phase = match (&observation, &mutation) {
            // Describe may lag right after a create.
            (Observation::NotFound, Some(_)) => DomainPhase::Creating,
            _ => phase_of(&observation),
        };
        let report = synced_report(phase, observation, stored.generation);
        self.writer.write(id, &report).await?;

        Ok(ReconcileOutcome {
            phase,
            requeue_after: self.requeue_for(phase),
            mutation,
        })
    }

    async fn tear_down(
        &self,
        id: &ResourceId,
        stored: &StoredDomain,
    ) -> EsdOperatorResult<ReconcileOutcome> {
        if !stored.has_finalizer() {
            return Ok(ReconcileOutcome {
                phase: DomainPhase::Absent,
                requeue_after: None,
                mutation: None,
            });
        }

        let name = stored.spec.domain_name.as_str();
        let mut observation = self.fetcher.fetch_with_retry(name).await?;
        let mut mutation = None;

        if let Some(domain_name) = observation.live().map(|s| s.domain_name.clone()) {
            let outcome = provider::delete_if_present(self.cloud.as_ref(), &domain_name).await?;
            mutation = Some(match outcome {
                DeleteOutcome::Deleting(_) => {
                    info!(domain = %id, name, "Domain deletion requested");
                    Mutation::DeleteRequested
                }
                DeleteOutcome::AlreadyDeleted => Mutation::AlreadyDeleted,
            });
            observation = self.fetcher.fetch_with_retry(name).await?;
        }

        let phase = phase_of(&observation);
        self.writer
            .write(id, &synced_report(phase, observation, stored.generation))
            .await?;

        if phase == DomainPhase::Absent {
            self.store.remove_finalizer(id).await?;
            info!(domain = %id, name, "Domain deleted, finalizer removed");
            mutation = Some(Mutation::FinalizerRemoved);
        }

        Ok(ReconcileOutcome {
            phase,
            requeue_after: self.requeue_for(phase),
            mutation,
        })
    }

    async fn check_placement(&self, spec: &ElasticsearchDomainSpec) -> EsdOperatorResult {
        if let Some(vpc) = &spec.vpc_options {
            let subnets = self.cloud.describe_subnets(&vpc.subnet_ids).await?;
            differ::validate_placement(spec, &subnets)?;
        }
        Ok(())
    }

    fn requeue_for(&self, phase: DomainPhase) -> Option<Duration> {
        match phase {
            DomainPhase::Creating | DomainPhase::Processing | DomainPhase::Deleting => {
                Some(self.poll_interval)
            }
            DomainPhase::Absent | DomainPhase::Created | DomainPhase::Failed => None,
        }
    }
}

fn synced_report(
    phase: DomainPhase,
    observation: Observation,
    generation: Option<i64>,
) -> StatusReport {
    let (status, reason, message) = match phase {
        DomainPhase::Created => (ConditionStatus::True, "Converged", "Domain matches the spec"),
        DomainPhase::Absent => (ConditionStatus::True, "Absent", "Domain does not exist"),
        DomainPhase::Deleting => (ConditionStatus::False, "Deleting", "Domain is being deleted"),
        DomainPhase::Creating => (ConditionStatus::False, "Creating", "Domain is being created"),
        DomainPhase::Processing | DomainPhase::Failed => {
            (ConditionStatus::False, "Processing", "Domain is applying changes")
        }
    };
    StatusReport::observed(phase, observation, generation)
        .with_condition(ConditionType::Synced, status, reason, message)
        .clear(ConditionType::Terminal)
        .clear(ConditionType::Recoverable)
}

#[async_trait]
impl TaskHandler for Reconciler {
    async fn handle(&self, task: &ReconcileTask) -> Option<Duration> {
        match self.reconcile(&task.id).await {
            Ok(outcome) => outcome.requeue_after,
            Err(e) => self.error_requeue(&task.id, &e),
        }
    }
}
