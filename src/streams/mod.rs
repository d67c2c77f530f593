//! Producers feeding the ingestion coordinator.
//!
//! - [`poller`] walks each monitored program's signature history on a timer.
//! - [`webhook`] accepts pushed batches over HTTP.
//!
//! Both hand transactions to the same `IngestionCoordinator` and may overlap
//! freely.

pub mod poller;
pub mod webhook;
