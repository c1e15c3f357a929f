//! The `ContactStore` and `ContactTx` traits.
//!
//! The traits are implemented by storage backends (e.g. `ident-store-sqlite`).
//! The resolver and the HTTP layer depend on this abstraction, not on any
//! concrete backend.

use std::future::Future;

use crate::contact::{Contact, ContactId, LinkPrecedence, NewContact};

// ─── Transaction view ────────────────────────────────────────────────────────

/// Operations available inside a single store transaction.
///
/// Calls are synchronous: the whole read-decide-write span of one
/// identification runs on the backend's own thread while it holds the write
/// lock.
pub trait ContactTx {
  type Error: std::error::Error + Send + Sync + 'static;

  /// All contacts whose email equals `email` OR whose phone number equals
  /// `phone`. A `None` argument drops its clause; both `None` matches
  /// nothing.
  fn find_matching(
    &mut self,
    email: Option<&str>,
    phone: Option<&str>,
  ) -> Result<Vec<Contact>, Self::Error>;

  /// Fetch a contact by id. Returns `None` if not found.
  fn get(&mut self, id: ContactId) -> Result<Option<Contact>, Self::Error>;

  /// All contacts whose `linked_id` equals `primary_id`.
  fn linked_to(&mut self, primary_id: ContactId) -> Result<Vec<Contact>, Self::Error>;

  /// Persist a new contact. `id`, `created_at` and `updated_at` are assigned
  /// by the store.
  fn insert(&mut self, input: NewContact) -> Result<Contact, Self::Error>;

  /// Rewrite the linkage of an existing contact and refresh its
  /// `updated_at`. No other field is touched.
  fn update_linkage(
    &mut self,
    id: ContactId,
    precedence: LinkPrecedence,
    linked_id: Option<ContactId>,
  ) -> Result<(), Self::Error>;
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// Abstraction over a durable contact store backend.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait ContactStore: Send + Sync {
  /// Backend error. Data-integrity failures detected by callers inside a
  /// transaction are folded in through `From<crate::Error>`.
  type Error: std::error::Error + From<crate::Error> + Send + Sync + 'static;

  /// Run `f` inside one write transaction.
  ///
  /// Commits iff `f` returns `Ok`; any error rolls back every write `f`
  /// performed. Concurrent transactions on the same store serialise.
  fn transact<F, T>(
    &self,
    f: F,
  ) -> impl Future<Output = Result<T, Self::Error>> + Send + '_
  where
    F: FnOnce(&mut dyn ContactTx<Error = Self::Error>) -> Result<T, Self::Error>
      + Send
      + 'static,
    T: Send + 'static;

  /// Retrieve a contact by id outside of any caller transaction.
  fn get_contact(
    &self,
    id: ContactId,
  ) -> impl Future<Output = Result<Option<Contact>, Self::Error>> + Send + '_;

  /// List every stored contact in id order.
  fn list_contacts(
    &self,
  ) -> impl Future<Output = Result<Vec<Contact>, Self::Error>> + Send + '_;
}
