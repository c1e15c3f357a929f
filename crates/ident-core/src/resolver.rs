//! Identity resolution: matching an observation against stored contacts,
//! merging identity graphs and attaching novel attributes.
//!
//! Every identification runs inside one [`ContactStore::transact`] call, so
//! a demotion is never visible without the re-links that accompany it, and
//! two concurrent identical requests cannot both insert a secondary.

use std::{collections::HashSet, sync::Arc};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
  contact::{Contact, ContactId, LinkPrecedence, NewContact, Observation},
  identity::IdentityView,
  store::{ContactStore, ContactTx},
};

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Failure of [`Resolver::identify`].
#[derive(Debug, Error)]
pub enum IdentifyError {
  /// The request carried neither an email nor a phone number. Nothing was
  /// read or written.
  #[error("invalid request: {0}")]
  InvalidRequest(String),

  /// The store transaction did not commit. Nothing was written; retrying the
  /// whole call is safe.
  #[error("store unavailable: {0}")]
  StoreUnavailable(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl IdentifyError {
  pub fn is_retryable(&self) -> bool { matches!(self, Self::StoreUnavailable(_)) }
}

// ─── Resolver ────────────────────────────────────────────────────────────────

/// Resolves observations to identities against an explicit store handle.
pub struct Resolver<S> {
  store: Arc<S>,
}

impl<S> Clone for Resolver<S> {
  fn clone(&self) -> Self { Self { store: Arc::clone(&self.store) } }
}

impl<S: ContactStore> Resolver<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  pub fn store(&self) -> &Arc<S> { &self.store }

  /// Identify the person behind `(email, phone)`, creating or merging
  /// records as needed, and return their consolidated identity.
  pub async fn identify(
    &self,
    email: Option<String>,
    phone_number: Option<String>,
  ) -> Result<IdentityView, IdentifyError> {
    let obs = Observation::new(email, phone_number)
      .map_err(|e| IdentifyError::InvalidRequest(e.to_string()))?;
    self.identify_observation(obs).await
  }

  /// As [`Resolver::identify`], for an already-validated observation.
  pub async fn identify_observation(
    &self,
    obs: Observation,
  ) -> Result<IdentityView, IdentifyError> {
    self
      .store
      .transact(move |tx| resolve_in(tx, &obs))
      .await
      .map_err(|e| {
        warn!(error = %e, "identify transaction rolled back");
        IdentifyError::StoreUnavailable(Box::new(e))
      })
  }
}

// ─── Algorithm ───────────────────────────────────────────────────────────────

/// Run the resolution algorithm against an open transaction.
///
/// Writes are limited to at most one insert, plus demotions and re-links
/// when the observation bridges several identity graphs.
pub fn resolve_in<E>(
  tx: &mut dyn ContactTx<Error = E>,
  obs: &Observation,
) -> Result<IdentityView, E>
where
  E: std::error::Error + From<crate::Error> + Send + Sync + 'static,
{
  let matches = tx.find_matching(obs.email(), obs.phone_number())?;
  debug!(matches = matches.len(), "matched existing contacts");

  let Some((first, rest)) = matches.split_first() else {
    let primary = tx.insert(NewContact::primary(obs))?;
    info!(id = primary.id, "created primary contact");
    return Ok(IdentityView::from_graph(&primary, &[]));
  };

  // Every match contributes the primary of its graph; the oldest survives.
  let mut primaries = vec![ultimate_primary(tx, first)?];
  for contact in rest {
    let root = ultimate_primary(tx, contact)?;
    if !primaries.iter().any(|p| p.id == root.id) {
      primaries.push(root);
    }
  }
  primaries.sort_by_key(Contact::age_key);
  let survivor = primaries.remove(0);

  for loser in &primaries {
    demote(tx, loser.id, survivor.id)?;
  }

  let mut members = load_graph(tx, &survivor)?;

  let email_is_new = obs
    .email()
    .is_some_and(|e| !survivor.attests_email(e) && !members.iter().any(|c| c.attests_email(e)));
  let phone_is_new = obs
    .phone_number()
    .is_some_and(|p| !survivor.attests_phone(p) && !members.iter().any(|c| c.attests_phone(p)));

  if email_is_new || phone_is_new {
    let secondary = tx.insert(NewContact::secondary(obs, survivor.id))?;
    info!(id = secondary.id, primary = survivor.id, "attached secondary contact");
    members.push(secondary);
  }

  Ok(IdentityView::from_graph(&survivor, &members))
}

/// Follow `linked_id` from `contact` until a primary is reached.
///
/// The write path keeps every chain one hop long, but stored data is not
/// trusted: longer chains are walked, cycles and dangling links are reported.
fn ultimate_primary<E>(
  tx: &mut dyn ContactTx<Error = E>,
  contact: &Contact,
) -> Result<Contact, E>
where
  E: std::error::Error + From<crate::Error> + Send + Sync + 'static,
{
  let mut current = contact.clone();
  let mut seen = HashSet::from([current.id]);

  while !current.is_primary() {
    let linked_id = current
      .linked_id
      .ok_or(crate::Error::Unlinked(current.id))?;
    if !seen.insert(linked_id) {
      return Err(crate::Error::LinkCycle(contact.id).into());
    }
    current = tx.get(linked_id)?.ok_or(crate::Error::DanglingLink {
      id: current.id,
      linked_id,
    })?;
  }

  Ok(current)
}

/// Demote `loser` beneath `survivor`, pointing its former secondaries
/// straight at `survivor` so no chain grows past one hop.
fn demote<E>(
  tx: &mut dyn ContactTx<Error = E>,
  loser: ContactId,
  survivor: ContactId,
) -> Result<(), E>
where
  E: std::error::Error + Send + Sync + 'static,
{
  let children = tx.linked_to(loser)?;
  for child in &children {
    tx.update_linkage(child.id, LinkPrecedence::Secondary, Some(survivor))?;
  }
  tx.update_linkage(loser, LinkPrecedence::Secondary, Some(survivor))?;
  info!(
    demoted = loser,
    primary = survivor,
    relinked = children.len(),
    "merged identity graphs"
  );
  Ok(())
}

/// Every contact reachable from `primary` through `linked_id`, excluding the
/// primary itself. Members found more than one hop away are re-pointed at
/// `primary` directly.
fn load_graph<E>(
  tx: &mut dyn ContactTx<Error = E>,
  primary: &Contact,
) -> Result<Vec<Contact>, E>
where
  E: std::error::Error + Send + Sync + 'static,
{
  let mut members = tx.linked_to(primary.id)?;
  let mut seen: HashSet<ContactId> = members.iter().map(|c| c.id).collect();
  seen.insert(primary.id);

  let mut frontier: Vec<ContactId> = members.iter().map(|c| c.id).collect();
  while let Some(parent) = frontier.pop() {
    for mut nested in tx.linked_to(parent)? {
      if !seen.insert(nested.id) {
        continue;
      }
      warn!(id = nested.id, via = parent, primary = primary.id, "flattening chained link");
      tx.update_linkage(nested.id, LinkPrecedence::Secondary, Some(primary.id))?;
      nested.link_precedence = LinkPrecedence::Secondary;
      nested.linked_id = Some(primary.id);
      frontier.push(nested.id);
      members.push(nested);
    }
  }

  Ok(members)
}
