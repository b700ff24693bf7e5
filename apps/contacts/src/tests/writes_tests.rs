use std::sync::Arc;

use contact_core::{ContactEvent, ContactViewModel, ViewModelConfig};
use storage::Storage;

use super::*;

async fn temp_storage() -> (tempfile::TempDir, Storage) {
    let dir = tempfile::tempdir().expect("tempdir");
    let database_url = format!(
        "sqlite://{}",
        dir.path()
            .join("contacts.db")
            .to_string_lossy()
            .replace('\\', "/")
    );
    let storage = Storage::new(&database_url).await.expect("db");
    (dir, storage)
}

fn save_jane(view_model: &ContactViewModel<Storage>) -> PendingWrite {
    for event in [
        ContactEvent::ShowDialog,
        ContactEvent::SetFirstName("Jane".into()),
        ContactEvent::SetLastName("Doe".into()),
        ContactEvent::SetPhoneNumber("555-0100".into()),
    ] {
        assert!(view_model.on_event(event).is_none());
    }
    view_model
        .on_event(ContactEvent::SaveContact)
        .expect("save issues an upsert")
}

#[tokio::test]
async fn drain_waits_for_saves_issued_just_before_exit() {
    let (_dir, storage) = temp_storage().await;
    let view_model = ContactViewModel::new(Arc::new(storage.clone()), ViewModelConfig::default());

    let mut writes = PendingWrites::default();
    writes.track(save_jane(&view_model));
    assert!(!writes.is_empty());

    assert!(writes.drain().await.is_empty());
    assert!(writes.is_empty());
    assert_eq!(storage.contact_count().await.expect("count"), 1);
}

#[tokio::test]
async fn drain_reports_failed_writes_with_their_kind() {
    let (_dir, storage) = temp_storage().await;
    sqlx::query("DROP TABLE contacts")
        .execute(storage.pool())
        .await
        .expect("drop table");
    let view_model = ContactViewModel::new(Arc::new(storage), ViewModelConfig::default());

    let mut writes = PendingWrites::default();
    writes.track(save_jane(&view_model));

    let failures = writes.drain().await;
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, WriteKind::Upsert);
    assert!(matches!(failures[0].1, ContactError::StoreWriteFailed(_)));
}

#[tokio::test]
async fn next_finished_is_none_when_idle() {
    let mut writes = PendingWrites::default();
    assert!(writes.next_finished().await.is_none());
}
