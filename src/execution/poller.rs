//! Asynchronous task completion polling

use crate::api::{ApiClient, VcdSession};
use crate::core::error::PreflightError;
use crate::core::model::TaskStatus;
use std::time::Duration;
use tracing::debug;

const TASK_STATUS_SUCCESS: &str = "success";
const TASK_STATUS_ERROR: &str = "error";

/// Polls a long-running server-side operation until it reaches a terminal
/// state or the deadline elapses
///
/// Holds no global state, so several monitors could poll independent tasks
/// concurrently even though the pipeline never needs to.
#[derive(Debug, Clone)]
pub struct TaskMonitor {
    deadline: Duration,
    interval: Duration,
}

impl TaskMonitor {
    pub fn new(deadline: Duration, interval: Duration) -> Self {
        Self { deadline, interval }
    }

    /// Poll `task_url` until the named operation succeeds or fails
    ///
    /// A record whose operation name does not match `expected_operation` is
    /// ignored and polling continues - a stale or unrelated task record
    /// must never be mistaken for completion. With `capture_output` the
    /// identifier embedded in the operation's descriptive text (its last
    /// parenthesized segment) is returned on success.
    pub async fn wait_for_completion<C: ApiClient>(
        &self,
        session: &VcdSession<C>,
        task_url: &str,
        expected_operation: &str,
        capture_output: bool,
    ) -> Result<Option<String>, PreflightError> {
        let mut waited = Duration::ZERO;
        loop {
            debug!("checking status for task {}", expected_operation);
            let response = session.get(task_url).await?;
            if response.is_success() {
                let task: TaskStatus = response.json()?;
                if task.operation_name.contains(expected_operation) {
                    match task.status.as_str() {
                        TASK_STATUS_SUCCESS => {
                            debug!("task {} completed", expected_operation);
                            let output = if capture_output {
                                task.operation.as_deref().and_then(last_parenthesized)
                            } else {
                                None
                            };
                            return Ok(output);
                        }
                        TASK_STATUS_ERROR => {
                            return Err(PreflightError::TaskFailed {
                                task: expected_operation.to_string(),
                                detail: task.details.unwrap_or_default(),
                            });
                        }
                        _ => debug!("task {} is in running state", expected_operation),
                    }
                } else {
                    debug!(
                        "task record names operation {}, waiting for {}",
                        task.operation_name, expected_operation
                    );
                }
            }
            if waited >= self.deadline {
                return Err(PreflightError::TaskTimeout {
                    task: expected_operation.to_string(),
                    secs: self.deadline.as_secs(),
                });
            }
            tokio::time::sleep(self.interval).await;
            waited += self.interval;
        }
    }
}

/// Extract the last parenthesized segment of an operation description,
/// e.g. `Created Org VDC acme-t(urn:vcloud:vdc:9f)` -> `urn:vcloud:vdc:9f`
fn last_parenthesized(text: &str) -> Option<String> {
    let open = text.rfind('(')?;
    let close = text.rfind(')')?;
    if close <= open {
        return None;
    }
    Some(text[open + 1..close].to_string())
}
