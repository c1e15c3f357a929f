//! [`SqliteStore`]: the SQLite implementation of [`ContactStore`].

use std::path::Path;

use ident_core::{
  contact::{Contact, ContactId, LinkPrecedence, NewContact},
  store::{ContactStore, ContactTx},
};
use rusqlite::{OptionalExtension as _, TransactionBehavior};

use crate::{
  encode::{CONTACT_COLUMNS, RawContact, encode_dt, now},
  schema::SCHEMA,
  Error, Result,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A contact store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    tracing::debug!(?path, "opened contact store");
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── Transaction view ────────────────────────────────────────────────────────

/// [`ContactTx`] over an open `rusqlite` transaction.
struct SqliteTx<'a> {
  conn: &'a rusqlite::Connection,
}

impl SqliteTx<'_> {
  fn query_contacts(
    &self,
    sql: &str,
    params: impl rusqlite::Params,
  ) -> Result<Vec<Contact>> {
    let mut stmt = self.conn.prepare_cached(sql)?;
    let raws = stmt
      .query_map(params, RawContact::from_row)?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    raws.into_iter().map(RawContact::into_contact).collect()
  }
}

impl ContactTx for SqliteTx<'_> {
  type Error = Error;

  fn find_matching(
    &mut self,
    email: Option<&str>,
    phone: Option<&str>,
  ) -> Result<Vec<Contact>> {
    if email.is_none() && phone.is_none() {
      return Ok(Vec::new());
    }
    // `col = NULL` is never true, so an absent field drops its clause.
    self.query_contacts(
      &format!(
        "SELECT {CONTACT_COLUMNS} FROM contacts
         WHERE email = ?1 OR phone_number = ?2
         ORDER BY created_at, id"
      ),
      rusqlite::params![email, phone],
    )
  }

  fn get(&mut self, id: ContactId) -> Result<Option<Contact>> {
    let raw = self
      .conn
      .query_row(
        &format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = ?1"),
        rusqlite::params![id],
        RawContact::from_row,
      )
      .optional()?;
    raw.map(RawContact::into_contact).transpose()
  }

  fn linked_to(&mut self, primary_id: ContactId) -> Result<Vec<Contact>> {
    self.query_contacts(
      &format!(
        "SELECT {CONTACT_COLUMNS} FROM contacts
         WHERE linked_id = ?1
         ORDER BY created_at, id"
      ),
      rusqlite::params![primary_id],
    )
  }

  fn insert(&mut self, input: NewContact) -> Result<Contact> {
    let at = now();
    let at_str = encode_dt(at);

    self.conn.execute(
      "INSERT INTO contacts (
         email, phone_number, linked_id, link_precedence, created_at, updated_at
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
      rusqlite::params![
        input.email,
        input.phone_number,
        input.linked_id,
        input.link_precedence.as_str(),
        at_str,
      ],
    )?;

    Ok(Contact {
      id:              self.conn.last_insert_rowid(),
      email:           input.email,
      phone_number:    input.phone_number,
      linked_id:       input.linked_id,
      link_precedence: input.link_precedence,
      created_at:      at,
      updated_at:      at,
    })
  }

  fn update_linkage(
    &mut self,
    id: ContactId,
    precedence: LinkPrecedence,
    linked_id: Option<ContactId>,
  ) -> Result<()> {
    let changed = self.conn.execute(
      "UPDATE contacts
       SET link_precedence = ?2, linked_id = ?3, updated_at = ?4
       WHERE id = ?1",
      rusqlite::params![id, precedence.as_str(), linked_id, encode_dt(now())],
    )?;
    if changed == 0 {
      return Err(Error::ContactNotFound(id));
    }
    Ok(())
  }
}

// ─── ContactStore impl ───────────────────────────────────────────────────────

impl ContactStore for SqliteStore {
  type Error = Error;

  async fn transact<F, T>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&mut dyn ContactTx<Error = Self::Error>) -> Result<T, Self::Error>
      + Send
      + 'static,
    T: Send + 'static,
  {
    // The inner result is `f`'s own outcome; the outer one reports failures
    // to begin or commit. Dropping an uncommitted transaction rolls it back.
    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut view = SqliteTx { conn: &tx };
        let result = f(&mut view as &mut dyn ContactTx<Error = Error>);
        if result.is_ok() {
          tx.commit()?;
        }
        Ok(result)
      })
      .await?;
    outcome
  }

  async fn get_contact(&self, id: ContactId) -> Result<Option<Contact>> {
    let raw: Option<RawContact> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = ?1"),
              rusqlite::params![id],
              RawContact::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawContact::into_contact).transpose()
  }

  async fn list_contacts(&self) -> Result<Vec<Contact>> {
    let raws: Vec<RawContact> = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare(&format!("SELECT {CONTACT_COLUMNS} FROM contacts ORDER BY id"))?;
        let rows = stmt
          .query_map([], RawContact::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawContact::into_contact).collect()
  }
}
