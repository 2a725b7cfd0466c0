//! Observed-state reads.

use std::sync::Arc;

use esd_common::util::backoff::{retry_with_backoff, RetryConfig};
use tracing::debug;

use crate::provider::{CloudApi, DomainStatus, ErrorClass, ProviderError};

/// Outcome of one describe. A missing domain is a state, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    Found(DomainStatus),
    NotFound,
}

impl Observation {
    pub fn status(&self) -> Option<&DomainStatus> {
        match self {
            Observation::Found(status) => Some(status),
            Observation::NotFound => None,
        }
    }

    /// Present and not yet on its way out.
    pub fn live(&self) -> Option<&DomainStatus> {
        self.status().filter(|status| !status.deleted)
    }
}

#[derive(Clone)]
pub struct Fetcher {
    cloud: Arc<dyn CloudApi>,
    retry: RetryConfig,
}

impl Fetcher {
    pub fn new(cloud: Arc<dyn CloudApi>, retry: RetryConfig) -> Self {
        Self { cloud, retry }
    }

    /// Single describe. Errors other than NotFound are returned unchanged.
    pub async fn fetch(&self, domain_name: &str) -> Result<Observation, ProviderError> {
        match self.cloud.describe_domain(domain_name).await {
            Ok(status) => Ok(Observation::Found(status)),
            Err(e) if e.class() == ErrorClass::NotFound => {
                debug!(domain = %domain_name, "Domain not found at provider");
                Ok(Observation::NotFound)
            }
            Err(e) => Err(e),
        }
    }

    /// Describe, retrying transient failures with backoff. Anything else
    /// surfaces after the first attempt.
    pub async fn fetch_with_retry(&self, domain_name: &str) -> Result<Observation, ProviderError> {
        retry_with_backoff(
            &self.retry,
            "describe_domain",
            ProviderError::is_transient,
            || self.fetch(domain_name),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::provider::simulated::CloudOperation;
    use crate::provider::{ErrorCode, SimulatedCloud};

    fn fast_retry(attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts: attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }

    #[tokio::test]
    async fn not_found_is_an_observation() {
        let cloud = Arc::new(SimulatedCloud::new());
        let fetcher = Fetcher::new(cloud, fast_retry(3));
        assert_eq!(
            fetcher.fetch("missing").await.unwrap(),
            Observation::NotFound
        );
    }

    #[tokio::test]
    async fn throttling_is_retried_and_never_not_found() {
        let cloud = Arc::new(SimulatedCloud::new());
        for _ in 0..2 {
            cloud.inject_fault(
                CloudOperation::DescribeDomain,
                ProviderError::new(ErrorCode::Throttling, "Rate exceeded"),
            );
        }
        let fetcher = Fetcher::new(cloud.clone(), fast_retry(5));

        assert_eq!(
            fetcher.fetch_with_retry("missing").await.unwrap(),
            Observation::NotFound
        );
        assert_eq!(cloud.calls(CloudOperation::DescribeDomain), 3);
    }

    #[tokio::test]
    async fn exhausted_retries_return_the_transient_error() {
        let cloud = Arc::new(SimulatedCloud::new());
        for _ in 0..3 {
            cloud.inject_fault(
                CloudOperation::DescribeDomain,
                ProviderError::new(ErrorCode::ServiceUnavailable, "try later"),
            );
        }
        let fetcher = Fetcher::new(cloud.clone(), fast_retry(2));

        let err = fetcher.fetch_with_retry("a").await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(cloud.calls(CloudOperation::DescribeDomain), 2);
    }

    #[tokio::test]
    async fn unknown_errors_are_not_retried() {
        let cloud = Arc::new(SimulatedCloud::new());
        cloud.inject_fault(
            CloudOperation::DescribeDomain,
            ProviderError::new(ErrorCode::AccessDenied, "denied"),
        );
        let fetcher = Fetcher::new(cloud.clone(), fast_retry(5));

        let err = fetcher.fetch_with_retry("a").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::AccessDenied);
        assert_eq!(cloud.calls(CloudOperation::DescribeDomain), 1);
    }
}
