pub mod crd;
pub mod finalizer;

use std::sync::Arc;

use crd::ElasticsearchDomain;
use esd_common::settings::OperatorSettings;
use futures::StreamExt;
use kube::runtime::controller::{self, Action};
use kube::runtime::{watcher, Controller};
use kube::{Api, Client, CustomResourceExt};
use tracing::{debug, info, warn};

use crate::error::{EsdOperatorError, EsdOperatorResult};
use crate::provider::CloudApi;
use crate::reconcile::Reconciler;
use crate::store::{KubeDomainStore, ResourceId};

pub struct ContextData {
    reconciler: Reconciler,
}

impl ContextData {
    pub fn new(reconciler: Reconciler) -> Self {
        Self { reconciler }
    }
}

/// The CustomResourceDefinition as YAML, ready for `kubectl apply`.
pub fn crd_yaml() -> EsdOperatorResult<String> {
    Ok(serde_yaml::to_string(&ElasticsearchDomain::crd())?)
}

pub async fn operator(settings: &OperatorSettings, cloud: Arc<dyn CloudApi>) -> EsdOperatorResult<()> {
    let client = Client::try_default().await?;

    let crd_api: Api<ElasticsearchDomain> = match &settings.namespace {
        Some(namespace) => Api::namespaced(client.clone(), namespace),
        None => Api::all(client.clone()),
    };
    let store = Arc::new(KubeDomainStore::new(client.clone()));
    let context = Arc::new(ContextData::new(Reconciler::new(store, cloud, settings)));

    info!(
        namespace = settings.namespace.as_deref().unwrap_or("*"),
        concurrency = settings.concurrency,
        "Starting ElasticsearchDomain controller"
    );

    Controller::new(crd_api, watcher::Config::default())
        .with_config(controller::Config::default().concurrency(settings.concurrency))
        .shutdown_on_signal()
        .run(reconcile, on_error, context)
        .for_each(|recon_result| async move {
            match recon_result {
                Ok((object, action)) => {
                    debug!(domain = %object.name, ?action, "Reconciliation successful")
                }
                Err(err) => warn!(error = %err, "Reconciliation error"),
            }
        })
        .await;

    info!("Controller stopped");
    Ok(())
}

pub async fn reconcile(
    domain: Arc<ElasticsearchDomain>,
    context: Arc<ContextData>,
) -> EsdOperatorResult<Action> {
    let id = ResourceId::from_resource(&domain);
    let outcome = context.reconciler.reconcile(&id).await?;
    Ok(match outcome.requeue_after {
        Some(delay) => Action::requeue(delay),
        None => Action::await_change(),
    })
}

pub fn on_error(
    domain: Arc<ElasticsearchDomain>,
    error: &EsdOperatorError,
    context: Arc<ContextData>,
) -> Action {
    let id = ResourceId::from_resource(&domain);
    match context.reconciler.error_requeue(&id, error) {
        Some(delay) => Action::requeue(delay),
        None => Action::await_change(),
    }
}
