//! Live contact list that follows the active sort selector.
//!
//! The feed owns exactly one store query at a time. When the selector
//! changes, the running query is dropped before the next one is opened, so a
//! result computed under an older selector can never be forwarded after the
//! switch. Every emission is tagged with the selection generation and the
//! activation that produced it; the aggregator drops anything stale.

use std::sync::Arc;

use futures::StreamExt;
use shared::domain::{Contact, SortSelector};
use storage::{ContactStore, ContactStream};
use tokio::{runtime::Handle, sync::watch, task::JoinHandle};
use tracing::{debug, warn};

/// A sort selector together with the generation it was issued in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Selection {
    pub generation: u64,
    pub selector: SortSelector,
}

#[derive(Debug)]
pub(crate) struct FeedEmission {
    pub activation: u64,
    pub selection: Selection,
    pub result: anyhow::Result<Vec<Contact>>,
}

pub struct OrderedRecordFeed<S: ContactStore> {
    store: Arc<S>,
}

impl<S: ContactStore> OrderedRecordFeed<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// The store query backing `selector`.
    pub fn query(&self, selector: SortSelector) -> ContactStream {
        self.store.contacts_ordered_by(selector)
    }

    /// Runs the feed until the selection channel closes or the query fails.
    /// A failure is forwarded once and not retried. A query that ends leaves
    /// the feed idle until the next selection opens a new one.
    pub(crate) fn spawn<F>(
        &self,
        runtime: &Handle,
        activation: u64,
        mut selections: watch::Receiver<Selection>,
        sink: F,
    ) -> JoinHandle<()>
    where
        F: Fn(FeedEmission) + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        runtime.spawn(async move {
            let mut selection = *selections.borrow_and_update();
            let mut results = store.contacts_ordered_by(selection.selector);
            debug!(activation, selector = %selection.selector, "feed query opened");

            loop {
                tokio::select! {
                    biased;

                    changed = selections.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        selection = *selections.borrow_and_update();
                        results = store.contacts_ordered_by(selection.selector);
                        debug!(
                            activation,
                            generation = selection.generation,
                            selector = %selection.selector,
                            "feed query switched"
                        );
                    }
                    item = results.next() => match item {
                        Some(Ok(contacts)) => sink(FeedEmission {
                            activation,
                            selection,
                            result: Ok(contacts),
                        }),
                        Some(Err(err)) => {
                            let message = format!("{err:#}");
                            warn!(
                                activation,
                                selector = %selection.selector,
                                error = %message,
                                "feed query failed"
                            );
                            sink(FeedEmission {
                                activation,
                                selection,
                                result: Err(err),
                            });
                            break;
                        }
                        None => {
                            debug!(activation, selector = %selection.selector, "feed query ended");
                            results = futures::stream::pending().boxed();
                        }
                    },
                }
            }
        })
    }
}

#[cfg(test)]
#[path = "tests/feed_tests.rs"]
mod tests;
