//! Structured observability events
//!
//! Components never log prose directly at their extension points; they emit
//! an [`Event`] to an [`Observer`]. The default [`LogObserver`] renders each
//! event as a single `key=value` line through the `log` facade.

use std::time::Duration;

use crate::logging::EVENTS_TARGET;

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Gateway is about to sleep before retrying a throttled request
    RetryScheduled {
        endpoint: String,
        attempt: u32,
        delay: Duration,
    },
    /// Same page is retried after a connection-class error
    ConnectionRetry {
        resource: String,
        page_index: u32,
        attempt: u32,
        delay: Duration,
    },
    DefinitionCreated {
        name: String,
    },
    /// Created definition not yet visible in the listing
    DefinitionPending {
        name: String,
        attempt: u32,
    },
    /// Definition unavailable; consumers skip it
    DefinitionMissing {
        name: String,
    },
    OperationStarted {
        operation: String,
    },
    OperationPolled {
        operation: String,
        poll: u32,
        done: bool,
    },
    OperationFinished {
        operation: String,
        outcome: OperationOutcome,
        elapsed: Duration,
    },
    PageFetched {
        resource: String,
        page_index: u32,
        rows: usize,
    },
    /// Child pagination stopped early for one parent
    ParentAbandoned {
        parent: String,
        page_index: u32,
        reason: String,
    },
    ReportSkipped {
        name: String,
        reason: String,
    },
}

/// Terminal state of a polled operation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationOutcome {
    Succeeded,
    Failed,
    TimedOut,
}

impl OperationOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
        }
    }
}

impl Event {
    /// Short machine-friendly event name
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RetryScheduled { .. } => "retry_scheduled",
            Self::ConnectionRetry { .. } => "connection_retry",
            Self::DefinitionCreated { .. } => "definition_created",
            Self::DefinitionPending { .. } => "definition_pending",
            Self::DefinitionMissing { .. } => "definition_missing",
            Self::OperationStarted { .. } => "operation_started",
            Self::OperationPolled { .. } => "operation_polled",
            Self::OperationFinished { .. } => "operation_finished",
            Self::PageFetched { .. } => "page_fetched",
            Self::ParentAbandoned { .. } => "parent_abandoned",
            Self::ReportSkipped { .. } => "report_skipped",
        }
    }

    /// Log level the default observer uses for this event
    pub fn level(&self) -> log::Level {
        match self {
            Self::RetryScheduled { .. }
            | Self::ConnectionRetry { .. }
            | Self::DefinitionMissing { .. }
            | Self::ParentAbandoned { .. }
            | Self::ReportSkipped { .. } => log::Level::Warn,
            Self::OperationFinished {
                outcome: OperationOutcome::Succeeded,
                ..
            } => log::Level::Info,
            Self::OperationFinished { .. } => log::Level::Error,
            Self::DefinitionCreated { .. } | Self::OperationStarted { .. } => log::Level::Info,
            Self::DefinitionPending { .. }
            | Self::OperationPolled { .. }
            | Self::PageFetched { .. } => log::Level::Debug,
        }
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind())?;
        match self {
            Self::RetryScheduled {
                endpoint,
                attempt,
                delay,
            } => write!(
                f,
                " endpoint=\"{endpoint}\" attempt={attempt} delay_ms={}",
                delay.as_millis()
            ),
            Self::ConnectionRetry {
                resource,
                page_index,
                attempt,
                delay,
            } => write!(
                f,
                " resource={resource} page={page_index} attempt={attempt} delay_ms={}",
                delay.as_millis()
            ),
            Self::DefinitionCreated { name } | Self::DefinitionMissing { name } => {
                write!(f, " name=\"{name}\"")
            }
            Self::DefinitionPending { name, attempt } => {
                write!(f, " name=\"{name}\" attempt={attempt}")
            }
            Self::OperationStarted { operation } => write!(f, " operation={operation}"),
            Self::OperationPolled {
                operation,
                poll,
                done,
            } => write!(f, " operation={operation} poll={poll} done={done}"),
            Self::OperationFinished {
                operation,
                outcome,
                elapsed,
            } => write!(
                f,
                " operation={operation} outcome={} elapsed_ms={}",
                outcome.as_str(),
                elapsed.as_millis()
            ),
            Self::PageFetched {
                resource,
                page_index,
                rows,
            } => write!(f, " resource={resource} page={page_index} rows={rows}"),
            Self::ParentAbandoned {
                parent,
                page_index,
                reason,
            } => write!(f, " parent={parent} page={page_index} reason=\"{reason}\""),
            Self::ReportSkipped { name, reason } => {
                write!(f, " name=\"{name}\" reason=\"{reason}\"")
            }
        }
    }
}

/// Receives events at the engine's extension points.
pub trait Observer {
    fn observe(&self, event: &Event);
}

/// Renders events through the `log` facade
#[derive(Clone, Copy, Debug, Default)]
pub struct LogObserver;

impl Observer for LogObserver {
    fn observe(&self, event: &Event) {
        log::log!(target: EVENTS_TARGET, event.level(), "{event}");
    }
}
