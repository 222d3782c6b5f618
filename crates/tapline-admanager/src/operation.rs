//! Long-running report operations: start a run and poll it to a terminal state

use std::time::Duration;

use serde::Deserialize;
use serde_json::{Map, Value};
use tapline_core::{Event, HttpGateway, OperationOutcome, Request, TapError};

use crate::config::join_url;

/// Remote operation snapshot as returned by the operations endpoint
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Operation {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<Value>,
    #[serde(default)]
    pub response: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
    Pending,
    Succeeded,
    Failed,
    TimedOut,
}

impl Operation {
    pub fn state(&self) -> OperationState {
        match (self.done, &self.error) {
            (false, _) => OperationState::Pending,
            (true, Some(e)) if !e.is_null() => OperationState::Failed,
            (true, _) => OperationState::Succeeded,
        }
    }
}

/// Name of a started operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationHandle {
    pub name: String,
}

#[derive(Deserialize)]
struct RunResponse {
    name: Option<String>,
}

pub struct OperationPoller<'a> {
    gateway: &'a HttpGateway,
    base_url: String,
    poll_interval: Duration,
    timeout: Duration,
}

impl<'a> OperationPoller<'a> {
    pub fn new(gateway: &'a HttpGateway, base_url: impl Into<String>) -> Self {
        Self {
            gateway,
            base_url: base_url.into(),
            poll_interval: Duration::from_secs(5),
            timeout: Duration::from_secs(300),
        }
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// POST `{base}{resource}:run` and return the operation handle.
    pub fn run(&self, resource_name: &str) -> Result<OperationHandle, TapError> {
        let url = join_url(&self.base_url, &format!("{resource_name}:run"));
        let endpoint = format!("POST {url}");
        let body: RunResponse = self.gateway.send_json(Request::post(url))?;
        let name = body.name.filter(|n| !n.is_empty()).ok_or(TapError::Decode {
            endpoint,
            message: "run response has no operation name".to_string(),
        })?;

        self.gateway
            .observer()
            .observe(&Event::OperationStarted { operation: name.clone() });
        Ok(OperationHandle { name })
    }

    /// Poll until done or until the timeout elapses.
    ///
    /// Success yields the `response` payload (an empty object if absent). The
    /// elapsed time is checked before every poll, so no request is sent once
    /// the budget is spent.
    pub fn await_completion(&self, handle: &OperationHandle) -> Result<Value, TapError> {
        let clock = self.gateway.clock();
        let observer = self.gateway.observer();
        let url = join_url(&self.base_url, &handle.name);
        let start = clock.now();
        let mut poll = 0u32;

        let finish = |outcome, elapsed| {
            observer.observe(&Event::OperationFinished {
                operation: handle.name.clone(),
                outcome,
                elapsed,
            });
        };

        loop {
            let elapsed = clock.now().saturating_duration_since(start);
            if elapsed >= self.timeout {
                finish(OperationOutcome::TimedOut, elapsed);
                return Err(TapError::OperationTimeout {
                    operation: handle.name.clone(),
                    elapsed,
                });
            }

            poll += 1;
            let snapshot = match self.gateway.send_json::<Operation>(Request::get(&url)) {
                Ok(op) => op,
                Err(e) if e.is_transient() => {
                    log::warn!("Poll {poll} of {}: {e}, treating as pending", handle.name);
                    Operation::default()
                }
                Err(e) => return Err(e),
            };

            let state = snapshot.state();
            observer.observe(&Event::OperationPolled {
                operation: handle.name.clone(),
                poll,
                done: state != OperationState::Pending,
            });

            match state {
                OperationState::Succeeded => {
                    finish(OperationOutcome::Succeeded, clock.now().saturating_duration_since(start));
                    return Ok(snapshot
                        .response
                        .filter(|r| !r.is_null())
                        .unwrap_or_else(|| Value::Object(Map::new())));
                }
                OperationState::Failed => {
                    finish(OperationOutcome::Failed, clock.now().saturating_duration_since(start));
                    return Err(TapError::RemoteOperation {
                        operation: handle.name.clone(),
                        payload: snapshot.error.unwrap_or(Value::Null),
                    });
                }
                OperationState::Pending | OperationState::TimedOut => {}
            }

            clock.sleep(self.poll_interval);
        }
    }
}
