//! Container synchronization state machine

use tokio::time::Instant;

use crate::types::{Container, RequiredContainerSet};

/// Non-terminal state of one synchronization run
///
/// A run leaves the machine through [`Step::Complete`], which becomes a
/// [`SyncOutcome`](super::SyncOutcome), or through one of the failing steps,
/// which become a [`SyncError`](super::SyncError).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// A download request is about to be sent
    Triggering { retries: u32 },
    /// Waiting for the agent to report every required container installed
    Polling { retries: u32, deadline: Instant },
}

/// Required containers grouped by reported status
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assessment {
    /// `DOWNLOAD_ERROR` or `ERROR`
    pub errored: Vec<String>,
    /// Still downloading, unknown status, or not reported yet
    pub busy: Vec<String>,
    pub ready: Vec<String>,
}

impl Assessment {
    /// Partition `required` by the status the agent reports in `containers`
    pub fn new(required: &RequiredContainerSet, containers: &[Container]) -> Self {
        let mut assessment = Self::default();
        for name in required.iter() {
            let status = containers
                .iter()
                .find(|container| container.name == name)
                .map(|container| container.status);
            let bucket = match status {
                Some(status) if status.is_installed() => &mut assessment.ready,
                Some(status) if status.is_errored() => &mut assessment.errored,
                _ => &mut assessment.busy,
            };
            bucket.push(name.to_string());
        }
        assessment
    }

    pub fn is_complete(&self) -> bool {
        self.errored.is_empty() && self.busy.is_empty()
    }
}

/// What the coordinator does after a status poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Complete,
    /// Re-trigger the download; carries the new retry count
    Retrigger(u32),
    Wait,
    DownloadFailed(Vec<String>),
    TimedOut(Vec<String>),
}

impl SyncState {
    /// Decide the next step from a status poll taken at `now`
    ///
    /// Only meaningful while polling; a run that is still triggering waits.
    pub fn on_poll(&self, assessment: Assessment, now: Instant, max_retries: u32) -> Step {
        let Self::Polling { retries, deadline } = *self else {
            return Step::Wait;
        };

        if !assessment.errored.is_empty() {
            if retries < max_retries {
                Step::Retrigger(retries + 1)
            } else {
                Step::DownloadFailed(assessment.errored)
            }
        } else if !assessment.busy.is_empty() {
            if now >= deadline {
                Step::TimedOut(assessment.busy)
            } else {
                Step::Wait
            }
        } else {
            Step::Complete
        }
    }
}
