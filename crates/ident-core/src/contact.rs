//! Contact records, the sole persisted entity.
//!
//! A contact attests to at most one email and at most one phone number. Its
//! role in an identity graph is carried by [`LinkPrecedence`]; secondaries
//! point at their primary through `linked_id`.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Store-assigned, auto-incrementing record id.
pub type ContactId = i64;

// ─── Precedence ──────────────────────────────────────────────────────────────

/// Role of a contact within its identity graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkPrecedence {
  Primary,
  Secondary,
}

impl LinkPrecedence {
  /// The value stored in the `link_precedence` column.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Primary => "primary",
      Self::Secondary => "secondary",
    }
  }
}

impl fmt::Display for LinkPrecedence {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for LinkPrecedence {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "primary" => Ok(Self::Primary),
      "secondary" => Ok(Self::Secondary),
      other => Err(Error::UnknownPrecedence(other.to_owned())),
    }
  }
}

// ─── Contact ─────────────────────────────────────────────────────────────────

/// A stored contact record.
///
/// `email`, `phone_number` and `created_at` never change after insertion.
/// Only a demotion (primary to secondary) or a re-link rewrites
/// `link_precedence`, `linked_id` and `updated_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
  pub id:              ContactId,
  pub email:           Option<String>,
  pub phone_number:    Option<String>,
  /// Set iff `link_precedence` is `Secondary`.
  pub linked_id:       Option<ContactId>,
  pub link_precedence: LinkPrecedence,
  pub created_at:      DateTime<Utc>,
  pub updated_at:      DateTime<Utc>,
}

impl Contact {
  pub fn is_primary(&self) -> bool {
    self.link_precedence == LinkPrecedence::Primary
  }

  pub fn attests_email(&self, email: &str) -> bool {
    self.email.as_deref() == Some(email)
  }

  pub fn attests_phone(&self, phone: &str) -> bool {
    self.phone_number.as_deref() == Some(phone)
  }

  /// Sort key used for the "oldest wins" tie-break. The id settles records
  /// created within the same clock tick.
  pub fn age_key(&self) -> (DateTime<Utc>, ContactId) {
    (self.created_at, self.id)
  }
}

// ─── Observation ─────────────────────────────────────────────────────────────

/// A normalised `(email, phone)` pair presented for identification.
///
/// Surrounding whitespace is trimmed and empty strings count as absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
  email:        Option<String>,
  phone_number: Option<String>,
}

impl Observation {
  /// Returns [`Error::EmptyObservation`] when neither field carries a value.
  pub fn new(email: Option<String>, phone_number: Option<String>) -> Result<Self> {
    let email = normalise(email);
    let phone_number = normalise(phone_number);
    if email.is_none() && phone_number.is_none() {
      return Err(Error::EmptyObservation);
    }
    Ok(Self { email, phone_number })
  }

  pub fn email(&self) -> Option<&str> { self.email.as_deref() }

  pub fn phone_number(&self) -> Option<&str> { self.phone_number.as_deref() }
}

fn normalise(value: Option<String>) -> Option<String> {
  value
    .map(|v| v.trim().to_owned())
    .filter(|v| !v.is_empty())
}

// ─── NewContact ──────────────────────────────────────────────────────────────

/// Input to [`crate::store::ContactTx::insert`].
/// Timestamps are always set by the store; they are not accepted from callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContact {
  pub email:           Option<String>,
  pub phone_number:    Option<String>,
  pub linked_id:       Option<ContactId>,
  pub link_precedence: LinkPrecedence,
}

impl NewContact {
  /// A fresh primary anchoring a brand-new identity.
  pub fn primary(obs: &Observation) -> Self {
    Self {
      email:           obs.email.clone(),
      phone_number:    obs.phone_number.clone(),
      linked_id:       None,
      link_precedence: LinkPrecedence::Primary,
    }
  }

  /// A secondary attaching `obs` to the graph anchored at `primary_id`.
  pub fn secondary(obs: &Observation, primary_id: ContactId) -> Self {
    Self {
      email:           obs.email.clone(),
      phone_number:    obs.phone_number.clone(),
      linked_id:       Some(primary_id),
      link_precedence: LinkPrecedence::Secondary,
    }
  }
}
