//! Integration tests for `SqliteStore` and the resolver against an in-memory
//! database.

use std::{collections::HashMap, sync::Arc};

use ident_core::{
  IdentifyError, Resolver,
  contact::{Contact, ContactId, LinkPrecedence, NewContact, Observation},
  store::ContactStore,
};
use proptest::prelude::*;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

async fn resolver() -> Resolver<SqliteStore> { Resolver::new(Arc::new(store().await)) }

fn some(s: &str) -> Option<String> { Some(s.to_owned()) }

async fn contacts(r: &Resolver<SqliteStore>) -> Vec<Contact> {
  r.store().list_contacts().await.unwrap()
}

async fn contact(r: &Resolver<SqliteStore>, id: ContactId) -> Contact {
  r.store().get_contact(id).await.unwrap().expect("contact exists")
}

/// Force a linkage directly, bypassing the resolver.
async fn relink(
  r: &Resolver<SqliteStore>,
  id: ContactId,
  precedence: LinkPrecedence,
  linked_id: Option<ContactId>,
) {
  r.store()
    .transact(move |tx| tx.update_linkage(id, precedence, linked_id))
    .await
    .unwrap();
}

/// Structural invariants that must hold after every committed call.
fn assert_invariants(all: &[Contact]) {
  let by_id: HashMap<ContactId, &Contact> = all.iter().map(|c| (c.id, c)).collect();

  for c in all {
    assert!(c.email.is_some() || c.phone_number.is_some(), "{c:?} is empty");
    assert_eq!(c.is_primary(), c.linked_id.is_none(), "{c:?} has bad linkage");

    if let Some(linked_id) = c.linked_id {
      let primary = by_id[&linked_id];
      assert!(primary.is_primary(), "{c:?} links to non-primary {primary:?}");
      assert!(
        primary.age_key() < c.age_key(),
        "primary {primary:?} is not older than {c:?}"
      );
    }
  }

  // Records attesting the same email or phone belong to the same graph.
  let root = |c: &Contact| c.linked_id.unwrap_or(c.id);
  for a in all {
    for b in all {
      let shares_email = a.email.is_some() && a.email == b.email;
      let shares_phone = a.phone_number.is_some() && a.phone_number == b.phone_number;
      if shares_email || shares_phone {
        assert_eq!(root(a), root(b), "{a:?} and {b:?} are in different graphs");
      }
    }
  }
}

// ─── Store contract ──────────────────────────────────────────────────────────

#[tokio::test]
async fn insert_and_get_contact() {
  let s = store().await;
  let obs = Observation::new(some("doc@hill.valley"), some("555-0101")).unwrap();

  let inserted = s
    .transact(move |tx| tx.insert(NewContact::primary(&obs)))
    .await
    .unwrap();
  assert!(inserted.is_primary());
  assert_eq!(inserted.created_at, inserted.updated_at);

  let fetched = s.get_contact(inserted.id).await.unwrap();
  assert_eq!(fetched, Some(inserted));
}

#[tokio::test]
async fn get_contact_missing_returns_none() {
  let s = store().await;
  assert!(s.get_contact(42).await.unwrap().is_none());
}

#[tokio::test]
async fn find_matching_is_an_or_over_supplied_fields() {
  let s = store().await;
  let found = s
    .transact(|tx| {
      for (email, phone) in [
        (Some("a@x"), Some("1")),
        (Some("b@x"), Some("2")),
        (None, Some("1")),
      ] {
        let obs = Observation::new(email.map(str::to_owned), phone.map(str::to_owned))?;
        tx.insert(NewContact::primary(&obs))?;
      }
      let both = tx.find_matching(Some("b@x"), Some("1"))?;
      let email_only = tx.find_matching(Some("a@x"), None)?;
      let nothing = tx.find_matching(None, None)?;
      Ok((both, email_only, nothing))
    })
    .await
    .unwrap();

  let (both, email_only, nothing) = found;
  assert_eq!(both.iter().map(|c| c.id).collect::<Vec<_>>(), [1, 2, 3]);
  assert_eq!(email_only.len(), 1);
  assert!(nothing.is_empty());
}

#[tokio::test]
async fn update_linkage_missing_contact_errors() {
  let s = store().await;
  let err = s
    .transact(|tx| tx.update_linkage(7, LinkPrecedence::Primary, None))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::ContactNotFound(7)));
}

#[tokio::test]
async fn schema_rejects_contact_without_email_or_phone() {
  let s = store().await;
  let err = s
    .transact(|tx| {
      tx.insert(NewContact {
        email:           None,
        phone_number:    None,
        linked_id:       None,
        link_precedence: LinkPrecedence::Primary,
      })
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Sqlite(_)));
}

#[tokio::test]
async fn failed_transaction_rolls_back_every_write() {
  let s = store().await;
  let result: Result<(), Error> = s
    .transact(|tx| {
      let obs = Observation::new(some("marty@hill.valley"), None)?;
      let first = tx.insert(NewContact::primary(&obs))?;
      tx.insert(NewContact::secondary(&obs, first.id))?;
      Err(Error::ContactNotFound(first.id))
    })
    .await;
  assert!(result.is_err());
  assert!(s.list_contacts().await.unwrap().is_empty());
}

// ─── Identification ──────────────────────────────────────────────────────────

#[tokio::test]
async fn new_identity_creates_single_primary() {
  let r = resolver().await;

  let view = r.identify(some("lorraine@hill.valley"), some("123456")).await.unwrap();
  assert_eq!(view.emails, ["lorraine@hill.valley"]);
  assert_eq!(view.phone_numbers, ["123456"]);
  assert!(view.secondary_ids.is_empty());

  let all = contacts(&r).await;
  assert_eq!(all.len(), 1);
  assert!(all[0].is_primary());
  assert_eq!(all[0].id, view.primary_id);
}

#[tokio::test]
async fn identical_request_is_idempotent() {
  let r = resolver().await;

  let first = r.identify(some("lorraine@hill.valley"), some("123456")).await.unwrap();
  let second = r.identify(some("lorraine@hill.valley"), some("123456")).await.unwrap();

  assert_eq!(first, second);
  assert_eq!(contacts(&r).await.len(), 1);
}

#[tokio::test]
async fn new_phone_for_known_email_extends_identity() {
  let r = resolver().await;
  let primary = r.identify(some("lorraine@hill.valley"), some("123456")).await.unwrap();

  let view = r.identify(some("lorraine@hill.valley"), some("789012")).await.unwrap();
  assert_eq!(view.primary_id, primary.primary_id);
  assert_eq!(view.phone_numbers, ["123456", "789012"]);
  assert_eq!(view.secondary_ids.len(), 1);

  let secondary = contact(&r, view.secondary_ids[0]).await;
  assert_eq!(secondary.link_precedence, LinkPrecedence::Secondary);
  assert_eq!(secondary.linked_id, Some(primary.primary_id));
  assert_eq!(secondary.phone_number.as_deref(), Some("789012"));
}

#[tokio::test]
async fn partial_request_returns_whole_graph_without_writing() {
  let r = resolver().await;
  r.identify(some("lorraine@hill.valley"), some("123456")).await.unwrap();
  let full = r.identify(some("mcfly@hill.valley"), some("123456")).await.unwrap();

  let by_phone = r.identify(None, some("123456")).await.unwrap();
  let by_email = r.identify(some("mcfly@hill.valley"), None).await.unwrap();

  assert_eq!(by_phone, full);
  assert_eq!(by_email, full);
  assert_eq!(contacts(&r).await.len(), 2);
}

#[tokio::test]
async fn older_primary_wins_merge() {
  let r = resolver().await;
  let a = r.identify(some("george@hill.valley"), some("919191")).await.unwrap();
  let b = r.identify(some("biffsucks@hill.valley"), some("717171")).await.unwrap();
  assert_ne!(a.primary_id, b.primary_id);

  let view = r.identify(some("george@hill.valley"), some("717171")).await.unwrap();
  assert_eq!(view.primary_id, a.primary_id);
  assert_eq!(view.secondary_ids, [b.primary_id]);
  assert_eq!(view.emails, ["george@hill.valley", "biffsucks@hill.valley"]);
  assert_eq!(view.phone_numbers, ["919191", "717171"]);

  let demoted = contact(&r, b.primary_id).await;
  assert_eq!(demoted.link_precedence, LinkPrecedence::Secondary);
  assert_eq!(demoted.linked_id, Some(a.primary_id));
  assert!(demoted.updated_at >= demoted.created_at);
  assert!(contact(&r, a.primary_id).await.is_primary());

  // The merge request was fully covered by the two graphs.
  assert_eq!(contacts(&r).await.len(), 2);
}

#[tokio::test]
async fn fully_covered_request_across_records_is_noop() {
  let r = resolver().await;
  r.identify(some("e1@x"), some("p1")).await.unwrap();
  r.identify(some("e1@x"), some("p2")).await.unwrap();
  let before = r.identify(some("e2@x"), some("p1")).await.unwrap();
  assert_eq!(contacts(&r).await.len(), 3);

  // e2 lives on one secondary, p2 on another.
  let after = r.identify(some("e2@x"), some("p2")).await.unwrap();
  assert_eq!(after, before);
  assert_eq!(contacts(&r).await.len(), 3);
}

#[tokio::test]
async fn merge_repoints_secondaries_of_demoted_primary() {
  let r = resolver().await;
  let a = r.identify(some("a@x"), some("1")).await.unwrap();
  let b = r.identify(some("b@x"), some("2")).await.unwrap();
  let b_ext = r.identify(some("b@x"), some("3")).await.unwrap();
  let b_child = b_ext.secondary_ids[0];
  assert_eq!(contact(&r, b_child).await.linked_id, Some(b.primary_id));

  let view = r.identify(some("a@x"), some("2")).await.unwrap();
  assert_eq!(view.primary_id, a.primary_id);
  assert_eq!(view.secondary_ids, [b.primary_id, b_child]);
  assert_eq!(view.phone_numbers, ["1", "2", "3"]);

  assert_eq!(contact(&r, b_child).await.linked_id, Some(a.primary_id));
  assert_invariants(&contacts(&r).await);
}

#[tokio::test]
async fn three_primaries_merge_into_oldest() {
  let r = resolver().await;
  let a = r.identify(some("a@x"), some("1")).await.unwrap();
  let b = r.identify(some("b@x"), some("2")).await.unwrap();
  let c = r.identify(some("c@x"), some("3")).await.unwrap();

  // Bridge b and c first, then bridge a with the merged graph.
  let bc = r.identify(some("c@x"), some("2")).await.unwrap();
  assert_eq!(bc.primary_id, b.primary_id);

  let view = r.identify(some("a@x"), some("3")).await.unwrap();
  assert_eq!(view.primary_id, a.primary_id);
  assert_eq!(view.secondary_ids, [b.primary_id, c.primary_id]);
  assert_eq!(view.emails, ["a@x", "b@x", "c@x"]);
  assert_invariants(&contacts(&r).await);
}

#[tokio::test]
async fn matched_secondary_pulls_in_its_unmatched_primary() {
  let r = resolver().await;
  let a = r.identify(some("a@x"), some("1")).await.unwrap();
  let b = r.identify(some("b@x"), some("2")).await.unwrap();
  let b_ext = r.identify(some("b@x"), some("9")).await.unwrap();

  // Matches a (primary) by email and b's secondary by phone only.
  let view = r.identify(some("a@x"), some("9")).await.unwrap();
  assert_eq!(view.primary_id, a.primary_id);
  assert!(view.secondary_ids.contains(&b.primary_id));
  assert!(view.secondary_ids.contains(&b_ext.secondary_ids[0]));
  assert_eq!(view.phone_numbers, ["1", "2", "9"]);

  let all = contacts(&r).await;
  assert_eq!(all.iter().filter(|c| c.is_primary()).count(), 1);
  assert_invariants(&all);
}

#[tokio::test]
async fn empty_request_is_rejected_without_side_effects() {
  let r = resolver().await;

  let err = r.identify(None, None).await.unwrap_err();
  assert!(matches!(err, IdentifyError::InvalidRequest(_)));
  assert!(!err.is_retryable());

  let err = r.identify(some("  "), some("")).await.unwrap_err();
  assert!(matches!(err, IdentifyError::InvalidRequest(_)));

  assert!(contacts(&r).await.is_empty());
}

#[tokio::test]
async fn chained_links_are_followed_and_flattened() {
  let r = resolver().await;
  let a = r.identify(some("a@x"), some("1")).await.unwrap();
  let ext = r.identify(some("a@x"), some("2")).await.unwrap();
  let middle = ext.secondary_ids[0];
  let c = r.identify(some("c@x"), some("3")).await.unwrap();

  // Corrupt the graph: c -> middle -> a.
  relink(&r, c.primary_id, LinkPrecedence::Secondary, Some(middle)).await;

  let view = r.identify(some("c@x"), None).await.unwrap();
  assert_eq!(view.primary_id, a.primary_id);
  assert_eq!(view.secondary_ids, [middle, c.primary_id]);
  assert_eq!(contact(&r, c.primary_id).await.linked_id, Some(a.primary_id));
  assert_eq!(contacts(&r).await.len(), 3);
}

#[tokio::test]
async fn link_cycle_fails_and_writes_nothing() {
  let r = resolver().await;
  let a = r.identify(some("a@x"), None).await.unwrap();
  let b = r.identify(some("b@x"), None).await.unwrap();
  relink(&r, b.primary_id, LinkPrecedence::Secondary, Some(a.primary_id)).await;
  relink(&r, a.primary_id, LinkPrecedence::Secondary, Some(b.primary_id)).await;

  let err = r.identify(some("a@x"), some("new-phone")).await.unwrap_err();
  assert!(err.is_retryable());
  assert!(err.to_string().contains("does not reach a primary"));
  assert_eq!(contacts(&r).await.len(), 2);
}

#[tokio::test]
async fn concurrent_identical_requests_attach_one_secondary() {
  let r = resolver().await;
  r.identify(some("doc@hill.valley"), some("1955")).await.unwrap();

  let mut set = tokio::task::JoinSet::new();
  for _ in 0..8 {
    let r = r.clone();
    set.spawn(async move { r.identify(some("doc@hill.valley"), some("1985")).await });
  }
  let mut views = Vec::new();
  while let Some(joined) = set.join_next().await {
    views.push(joined.unwrap().unwrap());
  }

  assert!(views.windows(2).all(|w| w[0] == w[1]));
  assert_eq!(contacts(&r).await.len(), 2);
}

// ─── Properties ──────────────────────────────────────────────────────────────

const EMAILS: [&str; 4] = ["a@x", "b@x", "c@x", "d@x"];
const PHONES: [&str; 4] = ["100", "200", "300", "400"];

fn request() -> impl Strategy<Value = (Option<usize>, Option<usize>)> {
  (prop::option::of(0..EMAILS.len()), prop::option::of(0..PHONES.len()))
    .prop_filter("needs email or phone", |(e, p)| e.is_some() || p.is_some())
}

proptest! {
  #![proptest_config(ProptestConfig::with_cases(48))]

  #[test]
  fn any_request_sequence_keeps_invariants(
    requests in prop::collection::vec(request(), 1..12),
  ) {
    let rt = tokio::runtime::Builder::new_current_thread()
      .enable_all()
      .build()
      .unwrap();

    rt.block_on(async {
      let r = resolver().await;

      for (e, p) in &requests {
        let email = e.map(|i| EMAILS[i].to_owned());
        let phone = p.map(|i| PHONES[i].to_owned());

        let view = r.identify(email.clone(), phone.clone()).await.unwrap();
        let all = contacts(&r).await;
        assert_invariants(&all);

        let primary = all.iter().find(|c| c.id == view.primary_id).unwrap();
        assert!(primary.is_primary());
        if let Some(email) = &email {
          assert!(view.has_email(email));
        }
        if let Some(phone) = &phone {
          assert!(view.has_phone(phone));
        }

        // Repeating the request changes nothing.
        let again = r.identify(email, phone).await.unwrap();
        assert_eq!(again, view);
        assert_eq!(contacts(&r).await, all);
      }
    });
  }
}
