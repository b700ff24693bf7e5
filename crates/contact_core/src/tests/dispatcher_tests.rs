use std::time::Duration;

use shared::{domain::ContactId, error::ErrorCode};

use super::*;
use crate::fake_store::FakeStore;

fn view_model(store: &FakeStore) -> ContactViewModel<FakeStore> {
    ContactViewModel::new(Arc::new(store.clone()), ViewModelConfig::default())
}

fn fill(vm: &ContactViewModel<FakeStore>, first: &str, last: &str, phone: &str) {
    vm.on_event(ContactEvent::ShowDialog);
    vm.on_event(ContactEvent::SetFirstName(first.into()));
    vm.on_event(ContactEvent::SetLastName(last.into()));
    vm.on_event(ContactEvent::SetPhoneNumber(phone.into()));
}

#[tokio::test]
async fn field_and_dialog_events_update_draft_synchronously() {
    let store = FakeStore::default();
    let vm = view_model(&store);
    let _sub = vm.subscribe();

    fill(&vm, "Jane", "Doe", "555-0100");
    let draft = vm.draft();
    assert_eq!(draft.first_name, "Jane");
    assert_eq!(draft.last_name, "Doe");
    assert_eq!(draft.phone_number, "555-0100");
    assert!(draft.dialog_visible);

    let snapshot = vm.snapshot();
    assert_eq!(snapshot.first_name, "Jane");
    assert!(snapshot.dialog_visible);

    assert!(vm.on_event(ContactEvent::HideDialog).is_none());
    assert!(!vm.draft().dialog_visible);
    assert_eq!(vm.draft().first_name, "Jane");
    assert!(store.upserts().is_empty());
}

#[tokio::test]
async fn save_with_blank_field_is_a_no_op() {
    let store = FakeStore::default();
    let vm = view_model(&store);
    fill(&vm, "", "Doe", "555");
    let before = vm.draft();

    assert!(vm.on_event(ContactEvent::SaveContact).is_none());

    assert_eq!(vm.draft(), before);
    assert!(vm.draft().dialog_visible);
    assert!(store.upserts().is_empty());
}

#[tokio::test]
async fn save_with_whitespace_only_field_is_a_no_op() {
    let store = FakeStore::default();
    let vm = view_model(&store);
    fill(&vm, "Jane", "Doe", "   ");

    assert!(vm.on_event(ContactEvent::SaveContact).is_none());
    assert!(store.upserts().is_empty());
    assert_eq!(vm.draft().phone_number, "   ");
}

#[tokio::test]
async fn save_upserts_unkeyed_contact_and_clears_draft_before_completion() {
    let store = FakeStore::default();
    store.hold_writes();
    let vm = view_model(&store);
    fill(&vm, "Jane", "Doe", "555-0100");

    let pending = vm
        .on_event(ContactEvent::SaveContact)
        .expect("upsert issued");
    assert_eq!(pending.kind(), WriteKind::Upsert);
    assert_eq!(vm.draft(), DraftState::default());

    for _ in 0..10 {
        if !store.upserts().is_empty() {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(store.upserts(), [Contact::new("Jane", "Doe", "555-0100")]);
    assert_eq!(vm.draft(), DraftState::default());

    store.release_writes();
    pending.outcome().await.expect("upsert ok");
    assert_eq!(store.upserts().len(), 1);
    assert_eq!(store.sorted(SortSelector::FirstName).len(), 1);
}

#[tokio::test]
async fn failed_upsert_is_reported_without_rolling_back_draft() {
    let store = FakeStore::default();
    store.fail_writes(true);
    let vm = view_model(&store);
    fill(&vm, "Jane", "Doe", "555-0100");

    let pending = vm
        .on_event(ContactEvent::SaveContact)
        .expect("upsert issued");
    let err = pending.outcome().await.expect_err("write failure");

    assert_eq!(err.code(), ErrorCode::StoreWrite);
    assert!(err.to_string().contains("database is locked"));
    assert_eq!(vm.draft(), DraftState::default());
    assert_eq!(store.upserts().len(), 1);
}

#[tokio::test]
async fn delete_targets_assigned_key_and_leaves_draft_alone() {
    let store = FakeStore::default();
    let vm = view_model(&store);
    fill(&vm, "Half", "Typed", "");
    let draft = vm.draft();

    let contact = Contact::new("Jane", "Doe", "555-0100").with_id(ContactId(7));
    let pending = vm
        .on_event(ContactEvent::DeleteContact(contact))
        .expect("delete issued");
    assert_eq!(pending.kind(), WriteKind::Delete);
    pending.outcome().await.expect("delete ok");

    assert_eq!(store.deletes(), [Some(ContactId(7))]);
    assert_eq!(vm.draft(), draft);
}

#[tokio::test]
async fn failed_delete_is_reported() {
    let store = FakeStore::default();
    store.fail_writes(true);
    let vm = view_model(&store);

    let contact = Contact::new("Jane", "Doe", "555-0100").with_id(ContactId(3));
    let err = vm
        .on_event(ContactEvent::DeleteContact(contact))
        .expect("delete issued")
        .outcome()
        .await
        .expect_err("write failure");
    assert!(matches!(err, ContactError::StoreWriteFailed(_)));
}

#[tokio::test]
async fn saved_contact_reaches_snapshot_with_stable_key() {
    let store = FakeStore::default();
    let vm = view_model(&store);
    let mut sub = vm.subscribe();
    fill(&vm, "Jane", "Doe", "555-0100");

    vm.on_event(ContactEvent::SaveContact)
        .expect("upsert issued")
        .outcome()
        .await
        .expect("upsert ok");

    let snapshot = sub
        .wait_for(|s| s.contacts.len() == 1)
        .await
        .expect("contact listed");
    let saved = &snapshot.contacts[0];
    assert_eq!(saved.first_name, "Jane");
    assert_eq!(saved.last_name, "Doe");
    assert_eq!(saved.phone_number, "555-0100");
    let key = saved.id.expect("assigned key");

    vm.on_event(ContactEvent::SortContacts(SortSelector::PhoneNumber));
    let resorted = sub
        .wait_for(|s| s.sort_selector == SortSelector::PhoneNumber)
        .await
        .expect("resorted");
    assert_eq!(resorted.contacts[0].id, Some(key));
    assert!(!resorted.dialog_visible);
    assert!(resorted.first_name.is_empty());
}

#[tokio::test]
async fn snapshot_order_follows_latest_selector() {
    let store = FakeStore::seeded(&[
        ("Carol", "Adams", "555-0200"),
        ("Alice", "Coleman", "555-0300"),
        ("Bob", "Baker", "555-0100"),
        ("Dave", "Adams", "555-0050"),
    ]);
    let vm = view_model(&store);
    let mut sub = vm.subscribe();

    let sequence = [
        SortSelector::LastName,
        SortSelector::PhoneNumber,
        SortSelector::LastName,
        SortSelector::FirstName,
        SortSelector::PhoneNumber,
    ];
    for selector in sequence {
        vm.on_event(ContactEvent::SortContacts(selector));
        assert_eq!(vm.sort_selector(), selector);
        let snapshot = sub
            .wait_for(|s| s.sort_selector == selector && s.contacts.len() == 4)
            .await
            .expect("resorted");
        assert!(selector.is_sorted(&snapshot.contacts), "{selector}");
        assert_eq!(snapshot.contacts, store.sorted(selector));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn back_to_back_sorts_never_pair_selector_with_other_order() {
    let store = FakeStore::seeded(&[
        ("Carol", "Adams", "555-0200"),
        ("Alice", "Coleman", "555-0300"),
        ("Bob", "Baker", "555-0100"),
    ]);
    let vm = view_model(&store);
    let mut sub = vm.subscribe();
    sub.wait_for(|s| s.contacts.len() == 3)
        .await
        .expect("contacts");

    for _ in 0..20 {
        vm.on_event(ContactEvent::SortContacts(SortSelector::LastName));
        vm.on_event(ContactEvent::SortContacts(SortSelector::PhoneNumber));
        let current = vm.snapshot();
        assert!(current.sort_selector.is_sorted(&current.contacts));

        loop {
            let snapshot = tokio::time::timeout(Duration::from_secs(5), sub.changed())
                .await
                .expect("snapshot")
                .expect("no fault");
            assert!(
                snapshot.sort_selector.is_sorted(&snapshot.contacts),
                "{} paired with mismatched order",
                snapshot.sort_selector
            );
            if snapshot.sort_selector == SortSelector::PhoneNumber {
                break;
            }
        }

        vm.on_event(ContactEvent::SortContacts(SortSelector::FirstName));
        sub.wait_for(|s| s.sort_selector == SortSelector::FirstName)
            .await
            .expect("reset order");
    }
}
