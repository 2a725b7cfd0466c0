//! Run domain manifests through the reconciler against the simulated
//! provider, the way the controller would against a cluster.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use esd_common::bootstrap::BootstrapResources;
use esd_common::settings::Settings;
use esd_common::util::backoff::{poll_until, RetryConfig};
use esd_operator::operator::crd::{DomainPhase, ElasticsearchDomain};
use esd_operator::provider::SimulatedCloud;
use esd_operator::queue::{run_workers, ReconcileTask, Trigger, WorkQueue};
use esd_operator::reconcile::Reconciler;
use esd_operator::store::{MemoryDomainStore, ResourceId};
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{EsdCliError, EsdCliResult};

#[derive(Parser, Debug, Clone)]
pub struct SimulateArgs {
    /// ElasticsearchDomain manifests (multi-document YAML allowed)
    #[arg(required = true)]
    pub manifests: Vec<PathBuf>,

    /// Bootstrap record that seeds the VPC and subnets
    #[arg(short, long)]
    pub bootstrap: Option<PathBuf>,

    /// Delete every domain once it converged
    #[arg(long, default_value_t = false)]
    pub delete: bool,

    /// Interval between reconcile passes of a processing domain
    #[arg(long, default_value_t = 50)]
    pub poll_interval_ms: u64,

    /// Describes a created or updated domain stays processing for
    #[arg(long, default_value_t = 3)]
    pub processing_describes: u32,
}

pub fn load_manifests(path: &Path) -> EsdCliResult<Vec<ElasticsearchDomain>> {
    let manifest_error = |reason: String| EsdCliError::Manifest {
        path: path.display().to_string(),
        reason,
    };
    let text = std::fs::read_to_string(path).map_err(|e| manifest_error(e.to_string()))?;

    let mut domains = Vec::new();
    for document in serde_yaml::Deserializer::from_str(&text) {
        let domain =
            ElasticsearchDomain::deserialize(document).map_err(|e| manifest_error(e.to_string()))?;
        domains.push(domain);
    }
    if domains.is_empty() {
        return Err(manifest_error("no ElasticsearchDomain documents".into()));
    }
    Ok(domains)
}

fn poll_config(interval: Duration) -> RetryConfig {
    RetryConfig {
        max_attempts: 0,
        initial_delay: interval,
        max_delay: interval * 4,
        backoff_multiplier: 1.5,
        jitter: false,
    }
}

pub async fn run(args: SimulateArgs, config: &Settings) -> EsdCliResult<()> {
    let mut domains = Vec::new();
    for path in &args.manifests {
        domains.extend(load_manifests(path)?);
    }

    let mut cloud = SimulatedCloud::new().with_processing_describes(args.processing_describes);
    let bootstrap_path = args
        .bootstrap
        .clone()
        .unwrap_or_else(|| config.bootstrap.path.clone());
    if bootstrap_path.exists() {
        let record = BootstrapResources::read(&bootstrap_path)?;
        info!(path = %bootstrap_path.display(), vpc = %record.vpc_id, "Seeding simulated network");
        cloud = cloud.with_bootstrap(&record);
    }
    let cloud = Arc::new(cloud);
    let store = Arc::new(MemoryDomainStore::new());

    let poll_interval = Duration::from_millis(args.poll_interval_ms);
    let reconciler = Arc::new(
        Reconciler::new(store.clone(), cloud.clone(), &config.operator)
            .with_poll_interval(poll_interval),
    );

    let queue = WorkQueue::new();
    let workers = run_workers(
        queue.clone(),
        usize::from(config.operator.concurrency),
        reconciler.clone(),
    );

    let mut ids = Vec::new();
    for domain in domains {
        let id = store.apply(domain).map_err(|e| EsdCliError::Runtime(e.to_string()))?;
        queue.push(ReconcileTask::new(id.clone(), Trigger::Create)).await;
        ids.push(id);
    }

    let result = converge_and_clean_up(&args, config, &store, &queue, &ids, poll_interval).await;

    queue.close().await;
    for worker in workers {
        if let Err(e) = worker.await {
            warn!(error = %e, "Worker ended abnormally");
        }
    }
    result
}

async fn converge_and_clean_up(
    args: &SimulateArgs,
    config: &Settings,
    store: &MemoryDomainStore,
    queue: &Arc<WorkQueue>,
    ids: &[ResourceId],
    poll_interval: Duration,
) -> EsdCliResult<()> {
    let polling = poll_config(poll_interval);

    let settled = poll_until(
        &polling,
        "domain creation",
        config.operator.create_timeout(),
        move || async move { Ok::<_, EsdCliError>(settled_phases(store, ids)) },
    )
    .await?;

    let mut failed = Vec::new();
    for (id, domain) in ids.iter().zip(&settled) {
        let status = domain.status.clone().unwrap_or_default();
        let cluster = status.cluster_config.as_ref();
        println!(
            "{id}\tphase={}\tinstances={}\tmasters={}\tzoneAware={}\tvpc={}\tendpoint={}",
            status.phase,
            cluster.map(|c| c.instance_count).unwrap_or_default(),
            cluster.and_then(|c| c.dedicated_master_count).unwrap_or_default(),
            cluster.map(|c| c.zone_awareness_enabled).unwrap_or_default(),
            status.vpc_options.as_ref().map(|v| v.vpc_id.as_str()).unwrap_or("-"),
            status.endpoint.as_deref().unwrap_or("-"),
        );
        if status.phase == DomainPhase::Failed {
            let message = status
                .conditions
                .iter()
                .find_map(|c| c.message.clone())
                .unwrap_or_default();
            failed.push(format!("{id}: {message}"));
        }
    }
    if !failed.is_empty() {
        return Err(EsdCliError::Convergence(failed.join("; ")));
    }

    if args.delete {
        for id in ids {
            store
                .request_delete(id)
                .map_err(|e| EsdCliError::Runtime(e.to_string()))?;
            queue.push(ReconcileTask::new(id.clone(), Trigger::Delete)).await;
        }
        poll_until(
            &polling,
            "domain deletion",
            config.operator.delete_timeout(),
            move || async move {
                let remaining = ids.iter().filter(|id| store.get(id).is_some()).count();
                Ok::<_, EsdCliError>((remaining == 0).then_some(()))
            },
        )
        .await?;
        info!(domains = ids.len(), "All domains deleted");
    }
    Ok(())
}

/// Every domain once none is still on its way to a resting phase.
fn settled_phases(store: &MemoryDomainStore, ids: &[ResourceId]) -> Option<Vec<ElasticsearchDomain>> {
    let mut domains = Vec::with_capacity(ids.len());
    for id in ids {
        let domain = store.get(id)?;
        let phase = domain.status.as_ref().map(|s| s.phase)?;
        if !matches!(phase, DomainPhase::Created | DomainPhase::Failed) {
            return None;
        }
        domains.push(domain);
    }
    Some(domains)
}
