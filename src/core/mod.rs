pub mod coordinator;
pub mod decoder;
pub mod extractor;
pub mod handlers;
pub mod metrics;

pub use coordinator::{BatchSummary, IngestionCoordinator, TransactionReport};
pub use decoder::EventDecoder;
pub use extractor::{Extraction, LogExtractor};
pub use handlers::{EventHandler, HandlerRegistry};
pub use metrics::{IngestionMetrics, MetricsSnapshot};
