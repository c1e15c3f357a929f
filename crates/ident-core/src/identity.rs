//! The consolidated identity read model. Never stored; always derived from
//! a primary and the secondaries linked to it.

use serde::{Deserialize, Serialize};

use crate::contact::{Contact, ContactId};

/// The observable identity of one graph.
///
/// Ordering is deterministic but carries no meaning: the primary's own
/// values come first, the remainder follow member creation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityView {
  pub primary_id:    ContactId,
  /// Distinct, non-null emails across the graph.
  pub emails:        Vec<String>,
  /// Distinct, non-null phone numbers across the graph.
  pub phone_numbers: Vec<String>,
  pub secondary_ids: Vec<ContactId>,
}

impl IdentityView {
  /// Build the view for `primary` and its `secondaries`. Any member that is
  /// not secondary (including `primary` if repeated) is ignored for
  /// `secondary_ids`.
  pub fn from_graph(primary: &Contact, secondaries: &[Contact]) -> Self {
    let mut members: Vec<&Contact> = secondaries
      .iter()
      .filter(|c| c.id != primary.id)
      .collect();
    members.sort_by_key(|c| c.age_key());

    let mut emails = Vec::new();
    let mut phone_numbers = Vec::new();
    for c in std::iter::once(primary).chain(members.iter().copied()) {
      push_distinct(&mut emails, c.email.as_deref());
      push_distinct(&mut phone_numbers, c.phone_number.as_deref());
    }

    let secondary_ids = members
      .iter()
      .filter(|c| !c.is_primary())
      .map(|c| c.id)
      .collect();

    Self { primary_id: primary.id, emails, phone_numbers, secondary_ids }
  }

  pub fn has_email(&self, email: &str) -> bool {
    self.emails.iter().any(|e| e == email)
  }

  pub fn has_phone(&self, phone: &str) -> bool {
    self.phone_numbers.iter().any(|p| p == phone)
  }
}

fn push_distinct(values: &mut Vec<String>, value: Option<&str>) {
  if let Some(v) = value
    && !values.iter().any(|existing| existing == v)
  {
    values.push(v.to_owned());
  }
}
