//! Reactive view state for the contact list screen.
//!
//! [`ContactViewModel`] takes user events, keeps the unsaved draft and the
//! active sort order, and issues writes to a [`storage::ContactStore`]. The
//! rendering layer attaches with [`ContactViewModel::subscribe`] and receives
//! [`ViewSnapshot`]s combining the draft, the selector and the contact list
//! ordered by that selector.

use std::time::Duration;

pub mod aggregator;
pub mod dispatcher;
pub mod draft;
pub mod events;
pub mod feed;

pub use aggregator::{SnapshotSubscription, StateAggregator, ViewSnapshot};
pub use dispatcher::{ContactViewModel, PendingWrite, WriteKind};
pub use draft::DraftState;
pub use events::ContactEvent;
pub use feed::{OrderedRecordFeed, Selection};
pub use shared::{
    domain::{Contact, ContactId, SortSelector},
    error::ContactError,
};

/// How long the view state stays warm after its last subscriber leaves.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewModelConfig {
    pub grace_period: Duration,
}

impl Default for ViewModelConfig {
    fn default() -> Self {
        Self {
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }
}

impl ViewModelConfig {
    pub fn with_grace_period(grace_period: Duration) -> Self {
        Self { grace_period }
    }
}

#[cfg(test)]
#[path = "tests/fake_store.rs"]
mod fake_store;
