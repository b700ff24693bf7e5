use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::{stream::BoxStream, StreamExt};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};
use tokio::sync::watch;
use tracing::debug;

use shared::domain::{Contact, ContactId, SortSelector};

/// Live query result: the full ordered contact list, re-emitted after every
/// write that touches the table. A failed read is the last item.
pub type ContactStream = BoxStream<'static, Result<Vec<Contact>>>;

/// Durable contact storage as seen by the view layer.
#[async_trait]
pub trait ContactStore: Send + Sync + 'static {
    fn contacts_ordered_by_first_name(&self) -> ContactStream;
    fn contacts_ordered_by_last_name(&self) -> ContactStream;
    fn contacts_ordered_by_phone_number(&self) -> ContactStream;

    /// Inserts `contact` when it has no key yet, otherwise replaces the
    /// record with the same key. Returns the key the record is stored under.
    async fn upsert_contact(&self, contact: Contact) -> Result<ContactId>;
    async fn delete_contact(&self, contact: &Contact) -> Result<()>;

    fn contacts_ordered_by(&self, selector: SortSelector) -> ContactStream {
        match selector {
            SortSelector::FirstName => self.contacts_ordered_by_first_name(),
            SortSelector::LastName => self.contacts_ordered_by_last_name(),
            SortSelector::PhoneNumber => self.contacts_ordered_by_phone_number(),
        }
    }
}

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
    invalidations: Arc<watch::Sender<u64>>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        let (invalidations, _) = watch::channel(0);
        Ok(Self {
            pool,
            invalidations: Arc::new(invalidations),
        })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn list_contacts(&self, selector: SortSelector) -> Result<Vec<Contact>> {
        let sql = format!(
            "SELECT id, first_name, last_name, phone_number FROM contacts ORDER BY {} ASC, id ASC",
            selector.column()
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("failed to list contacts ordered by {selector}"))?;
        Ok(rows.iter().map(contact_from_row).collect())
    }

    pub async fn load_contact(&self, id: ContactId) -> Result<Option<Contact>> {
        let row = sqlx::query(
            "SELECT id, first_name, last_name, phone_number FROM contacts WHERE id = ?",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(contact_from_row))
    }

    pub async fn contact_count(&self) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM contacts")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn upsert(&self, contact: &Contact) -> Result<ContactId> {
        let rec = match contact.id {
            None => sqlx::query(
                "INSERT INTO contacts (first_name, last_name, phone_number)
                 VALUES (?, ?, ?)
                 RETURNING id",
            )
            .bind(&contact.first_name)
            .bind(&contact.last_name)
            .bind(&contact.phone_number)
            .fetch_one(&self.pool)
            .await
            .context("failed to insert contact")?,
            Some(id) => sqlx::query(
                "INSERT INTO contacts (id, first_name, last_name, phone_number)
                 VALUES (?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                    first_name = excluded.first_name,
                    last_name = excluded.last_name,
                    phone_number = excluded.phone_number
                 RETURNING id",
            )
            .bind(id.0)
            .bind(&contact.first_name)
            .bind(&contact.last_name)
            .bind(&contact.phone_number)
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("failed to replace contact {id}"))?,
        };
        let id = ContactId(rec.get::<i64, _>(0));
        self.invalidate();
        Ok(id)
    }

    pub async fn delete(&self, contact: &Contact) -> Result<()> {
        let Some(id) = contact.id else {
            debug!("skipping delete of contact without a stored key");
            return Ok(());
        };
        sqlx::query("DELETE FROM contacts WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to delete contact {id}"))?;
        self.invalidate();
        Ok(())
    }

    /// Ordered contact list that re-queries whenever the table changes.
    ///
    /// Change notifications are coalesced: a burst of writes while a query is
    /// running yields a single follow-up query.
    pub fn watch_contacts(&self, selector: SortSelector) -> ContactStream {
        let changes = self.invalidations.subscribe();
        futures::stream::unfold(
            Some((self.clone(), changes, true)),
            move |state| async move {
                let (storage, mut changes, first) = state?;
                if !first && changes.changed().await.is_err() {
                    return None;
                }
                changes.borrow_and_update();
                match storage.list_contacts(selector).await {
                    Ok(contacts) => Some((Ok(contacts), Some((storage, changes, false)))),
                    Err(err) => Some((Err(err), None)),
                }
            },
        )
        .boxed()
    }

    fn invalidate(&self) {
        self.invalidations.send_modify(|version| *version += 1);
    }
}

#[async_trait]
impl ContactStore for Storage {
    fn contacts_ordered_by_first_name(&self) -> ContactStream {
        self.watch_contacts(SortSelector::FirstName)
    }

    fn contacts_ordered_by_last_name(&self) -> ContactStream {
        self.watch_contacts(SortSelector::LastName)
    }

    fn contacts_ordered_by_phone_number(&self) -> ContactStream {
        self.watch_contacts(SortSelector::PhoneNumber)
    }

    async fn upsert_contact(&self, contact: Contact) -> Result<ContactId> {
        self.upsert(&contact).await
    }

    async fn delete_contact(&self, contact: &Contact) -> Result<()> {
        self.delete(contact).await
    }
}

fn contact_from_row(row: &SqliteRow) -> Contact {
    Contact {
        id: Some(ContactId(row.get::<i64, _>("id"))),
        first_name: row.get::<String, _>("first_name"),
        last_name: row.get::<String, _>("last_name"),
        phone_number: row.get::<String, _>("phone_number"),
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
