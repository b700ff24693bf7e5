//! Event handling for the contact screen.

use std::sync::Arc;

use shared::{
    domain::{Contact, SortSelector},
    error::ContactError,
};
use storage::ContactStore;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::{
    aggregator::{SnapshotSubscription, StateAggregator, ViewSnapshot},
    draft::DraftState,
    events::ContactEvent,
    ViewModelConfig,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Upsert,
    Delete,
}

/// A store request issued by [`ContactViewModel::on_event`].
///
/// The request runs whether or not this handle is kept; awaiting
/// [`PendingWrite::outcome`] is only needed to observe failures.
#[derive(Debug)]
pub struct PendingWrite {
    kind: WriteKind,
    task: JoinHandle<Result<(), ContactError>>,
}

impl PendingWrite {
    pub fn kind(&self) -> WriteKind {
        self.kind
    }

    pub async fn outcome(self) -> Result<(), ContactError> {
        match self.task.await {
            Ok(result) => result,
            Err(join_err) => Err(ContactError::StoreWriteFailed(join_err.to_string())),
        }
    }
}

pub struct ContactViewModel<S: ContactStore> {
    store: Arc<S>,
    state: StateAggregator<S>,
}

impl<S: ContactStore> ContactViewModel<S> {
    /// Must be called from within a Tokio runtime.
    pub fn new(store: Arc<S>, config: ViewModelConfig) -> Self {
        let state = StateAggregator::new(Arc::clone(&store), &config);
        Self { store, state }
    }

    pub fn subscribe(&self) -> SnapshotSubscription<S> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> Arc<ViewSnapshot> {
        self.state.current()
    }

    pub fn draft(&self) -> DraftState {
        self.state.draft()
    }

    pub fn sort_selector(&self) -> SortSelector {
        self.state.selection().selector
    }

    pub fn state(&self) -> &StateAggregator<S> {
        &self.state
    }

    /// Applies `event` synchronously and returns the store request it
    /// started, if any. Local state is never rolled back when that request
    /// later fails.
    pub fn on_event(&self, event: ContactEvent) -> Option<PendingWrite> {
        debug!(event = event.name(), "dispatching contact event");
        match event {
            ContactEvent::SetFirstName(value) => {
                self.state.update_draft(|draft| draft.set_first_name(value));
                None
            }
            ContactEvent::SetLastName(value) => {
                self.state.update_draft(|draft| draft.set_last_name(value));
                None
            }
            ContactEvent::SetPhoneNumber(value) => {
                self.state.update_draft(|draft| draft.set_phone_number(value));
                None
            }
            ContactEvent::ShowDialog => {
                self.state.update_draft(DraftState::show_dialog);
                None
            }
            ContactEvent::HideDialog => {
                self.state.update_draft(DraftState::hide_dialog);
                None
            }
            ContactEvent::SortContacts(selector) => {
                self.state.select(selector);
                None
            }
            ContactEvent::SaveContact => self.save_contact(),
            ContactEvent::DeleteContact(contact) => Some(self.delete_contact(contact)),
        }
    }

    fn save_contact(&self) -> Option<PendingWrite> {
        // Validation and reset happen under one lock so an edit cannot slip in
        // between building the contact and clearing the form.
        let contact = self.state.update_draft(|draft| {
            let contact = draft.validated_contact();
            if contact.is_ok() {
                draft.reset_fields();
            }
            contact
        });

        match contact {
            Ok(contact) => Some(self.spawn_upsert(contact)),
            Err(err) => {
                debug!(error = %err, "save ignored");
                None
            }
        }
    }

    fn spawn_upsert(&self, contact: Contact) -> PendingWrite {
        let store = Arc::clone(&self.store);
        let task = self.state.runtime().spawn(async move {
            match store.upsert_contact(contact).await {
                Ok(id) => {
                    debug!(contact_id = %id, "contact upserted");
                    Ok(())
                }
                Err(err) => {
                    let err = ContactError::StoreWriteFailed(format!("{err:#}"));
                    warn!(error = %err, "contact upsert failed");
                    Err(err)
                }
            }
        });
        PendingWrite {
            kind: WriteKind::Upsert,
            task,
        }
    }

    fn delete_contact(&self, contact: Contact) -> PendingWrite {
        let store = Arc::clone(&self.store);
        let key = contact.key();
        let task = self.state.runtime().spawn(async move {
            store.delete_contact(&contact).await.map_err(|err| {
                let err = ContactError::StoreWriteFailed(format!("{err:#}"));
                warn!(contact_id = ?key, error = %err, "contact delete failed");
                err
            })
        });
        PendingWrite {
            kind: WriteKind::Delete,
            task,
        }
    }
}

#[cfg(test)]
#[path = "tests/dispatcher_tests.rs"]
mod tests;
