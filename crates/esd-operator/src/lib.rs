pub mod differ;
pub mod error;
pub mod fetcher;
pub mod operator;
pub mod provider;
pub mod queue;
pub mod reconcile;
pub mod status;
pub mod store;
