//! Store writes started from the command loop that have not finished yet.

use contact_core::{ContactError, PendingWrite, WriteKind};
use tokio::task::JoinSet;
use tracing::warn;

pub type FinishedWrite = (WriteKind, Result<(), ContactError>);

#[derive(Default)]
pub struct PendingWrites {
    tasks: JoinSet<FinishedWrite>,
}

impl PendingWrites {
    pub fn track(&mut self, pending: PendingWrite) {
        let kind = pending.kind();
        self.tasks.spawn(async move { (kind, pending.outcome().await) });
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Next write to finish, or `None` when nothing is in flight.
    pub async fn next_finished(&mut self) -> Option<FinishedWrite> {
        loop {
            match self.tasks.join_next().await? {
                Ok(finished) => return Some(finished),
                Err(err) => warn!(error = %err, "write tracking task failed"),
            }
        }
    }

    /// Waits for every tracked write and returns the ones that failed.
    pub async fn drain(&mut self) -> Vec<(WriteKind, ContactError)> {
        let mut failures = Vec::new();
        while let Some((kind, result)) = self.next_finished().await {
            if let Err(err) = result {
                failures.push((kind, err));
            }
        }
        failures
    }
}

#[cfg(test)]
#[path = "tests/writes_tests.rs"]
mod tests;
