//! Error types for `ident-core`.

use thiserror::Error;

use crate::contact::ContactId;

#[derive(Debug, Error)]
pub enum Error {
  #[error("at least one of email or phoneNumber must be provided")]
  EmptyObservation,

  #[error("contact {id} links to missing contact {linked_id}")]
  DanglingLink { id: ContactId, linked_id: ContactId },

  #[error("secondary contact {0} has no linked primary")]
  Unlinked(ContactId),

  #[error("link chain starting at contact {0} does not reach a primary")]
  LinkCycle(ContactId),

  #[error("unknown link precedence: {0:?}")]
  UnknownPrecedence(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
