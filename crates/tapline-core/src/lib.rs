//! Tapline Core - resilient HTTP extraction engine
//!
//! Retrying gateway, cursor pagination, dependent parent/child stream
//! walking and identifier normalization shared by the source crates, plus
//! the output sinks and terminal plumbing used by the CLI.

pub mod accumulator;
pub mod clock;
pub mod error;
pub mod events;
pub mod gateway;
pub mod logging;
pub mod normalize;
pub mod paginate;
pub mod progress;
pub mod retry;
pub mod sink;
pub mod transport;
pub mod walker;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-exports for convenience
pub use accumulator::{Accumulator, DEFAULT_BATCH_SIZE, write_batched};
pub use clock::{Clock, SystemClock};
pub use error::TapError;
pub use events::{Event, LogObserver, Observer, OperationOutcome};
pub use gateway::HttpGateway;
pub use logging::{IndicatifLogger, init_logging};
pub use normalize::{IdNormalizer, coerce_id};
pub use paginate::{CursorPager, Page, PageShape};
pub use progress::{ProgressContext, StreamProgress, fmt_num};
pub use retry::{RetryPolicy, linear_backoff, retry_with_backoff};
pub use sink::{JsonlSink, ParquetSink, is_valid_parquet};
pub use transport::{
    Method, ReqwestTransport, Request, Response, SHARED_RUNTIME, Transport, TransportError,
    http_client,
};
pub use walker::{ChildRecords, ParentSource, WalkSummary, WalkerConfig, for_each_child};
