//! Publishes what the controller observed onto the resource's status.
//!
//! Writes are optimistic: the stored record is re-read, the report is merged
//! into its status, and the result is written against the version that was
//! read. A conflict means someone else wrote in between, so the whole
//! read-merge-write is redone.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use tracing::debug;

use crate::fetcher::Observation;
use crate::operator::crd::{
    Condition, ConditionStatus, ConditionType, DomainPhase, ElasticsearchDomainStatus,
};
use crate::store::{DomainStore, ResourceId, StoreError};

/// Changes one reconcile pass wants on the status. Fields left `None` keep
/// their stored value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatusReport {
    pub phase: Option<DomainPhase>,
    pub observation: Option<Observation>,
    pub conditions: Vec<Condition>,
    pub cleared: Vec<ConditionType>,
    pub observed_generation: Option<i64>,
}

impl StatusReport {
    pub fn observed(phase: DomainPhase, observation: Observation, generation: Option<i64>) -> Self {
        Self {
            phase: Some(phase),
            observation: Some(observation),
            observed_generation: generation,
            ..Default::default()
        }
    }

    pub fn with_condition(
        mut self,
        type_: ConditionType,
        status: ConditionStatus,
        reason: &str,
        message: impl Into<String>,
    ) -> Self {
        self.conditions.retain(|c| c.type_ != type_);
        self.cleared.retain(|c| *c != type_);
        self.conditions.push(Condition {
            type_,
            status,
            reason: Some(reason.to_string()),
            message: Some(message.into()),
            last_transition_time: None,
        });
        self
    }

    pub fn clear(mut self, type_: ConditionType) -> Self {
        self.conditions.retain(|c| c.type_ != type_);
        if !self.cleared.contains(&type_) {
            self.cleared.push(type_);
        }
        self
    }
}

fn apply_observation(status: &mut ElasticsearchDomainStatus, observation: &Observation) {
    match observation {
        Observation::Found(domain) => {
            status.processing = Some(domain.processing);
            status.created = Some(domain.created);
            status.deleted = Some(domain.deleted);
            status.domain_id = Some(domain.domain_id.clone());
            status.arn = Some(domain.arn.clone());
            status.endpoint = domain.endpoint.clone();
            status.elasticsearch_version = Some(domain.elasticsearch_version.clone());
            status.cluster_config = Some(domain.cluster_config.clone());
            status.ebs_options = domain.ebs_options.clone();
            status.vpc_options = domain.vpc_options.clone();
        }
        Observation::NotFound => {
            status.processing = Some(false);
            status.created = Some(false);
            status.deleted = None;
            status.domain_id = None;
            status.arn = None;
            status.endpoint = None;
            status.elasticsearch_version = None;
            status.cluster_config = None;
            status.ebs_options = None;
            status.vpc_options = None;
        }
    }
}

/// Merge `report` into `current`. A condition keeps its transition time
/// unless its status flips.
pub fn merge(
    current: &ElasticsearchDomainStatus,
    report: &StatusReport,
    now: &str,
) -> ElasticsearchDomainStatus {
    let mut next = current.clone();

    if let Some(phase) = report.phase {
        next.phase = phase;
    }
    if let Some(observation) = &report.observation {
        apply_observation(&mut next, observation);
    }
    if report.observed_generation.is_some() {
        next.observed_generation = report.observed_generation;
    }

    next.conditions.retain(|c| !report.cleared.contains(&c.type_));
    for condition in &report.conditions {
        let mut condition = condition.clone();
        match next.conditions.iter_mut().find(|c| c.type_ == condition.type_) {
            Some(existing) => {
                condition.last_transition_time = if existing.status == condition.status {
                    existing.last_transition_time.clone()
                } else {
                    Some(now.to_string())
                };
                *existing = condition;
            }
            None => {
                condition.last_transition_time = Some(now.to_string());
                next.conditions.push(condition);
            }
        }
    }
    next
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    Unchanged,
    /// The resource no longer exists; nothing to write to.
    Gone,
}

#[derive(Clone)]
pub struct StatusWriter {
    store: Arc<dyn DomainStore>,
    attempts: u32,
}

impl StatusWriter {
    pub fn new(store: Arc<dyn DomainStore>, attempts: u32) -> Self {
        Self {
            store,
            attempts: attempts.max(1),
        }
    }

    pub async fn write(
        &self,
        id: &ResourceId,
        report: &StatusReport,
    ) -> Result<WriteOutcome, StoreError> {
        for attempt in 1..=self.attempts {
            let Some(stored) = self.store.load(id).await? else {
                return Ok(WriteOutcome::Gone);
            };
            let current = stored.status.clone().unwrap_or_default();
            let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
            let next = merge(&current, report, &now);

            if stored.status.as_ref() == Some(&next) {
                return Ok(WriteOutcome::Unchanged);
            }

            match self
                .store
                .write_status(id, stored.resource_version.as_deref(), &next)
                .await
            {
                Ok(()) => {
                    debug!(domain = %id, phase = %next.phase, "Status written");
                    return Ok(WriteOutcome::Written);
                }
                Err(StoreError::Conflict(_)) => {
                    debug!(domain = %id, attempt, "Status write conflicted, retrying");
                }
                Err(StoreError::NotFound(_)) => return Ok(WriteOutcome::Gone),
                Err(e) => return Err(e),
            }
        }
        Err(StoreError::Conflict(id.clone()))
    }
}
