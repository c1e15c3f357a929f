//! Handler for `POST /identify`.
//!
//! Request body: `{"email": "...", "phoneNumber": "..."}`; either field may be
//! `null` or omitted, but not both. `phoneNumber` may also be a JSON number.

use axum::{Json, extract::State};
use ident_core::{Resolver, contact::ContactId, identity::IdentityView, store::ContactStore};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ApiError;

// ─── Wire types ───────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifyRequest {
  #[serde(default)]
  pub email:        Option<String>,
  #[serde(default, deserialize_with = "string_or_number")]
  pub phone_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifyResponse {
  pub contact: ContactSummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactSummary {
  pub primary_contact_id:    ContactId,
  pub emails:                Vec<String>,
  pub phone_numbers:         Vec<String>,
  pub secondary_contact_ids: Vec<ContactId>,
}

impl From<IdentityView> for IdentifyResponse {
  fn from(view: IdentityView) -> Self {
    Self {
      contact: ContactSummary {
        primary_contact_id:    view.primary_id,
        emails:                view.emails,
        phone_numbers:         view.phone_numbers,
        secondary_contact_ids: view.secondary_ids,
      },
    }
  }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
  String(String),
  Number(serde_json::Number),
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
  D: Deserializer<'de>,
{
  Ok(
    Option::<StringOrNumber>::deserialize(deserializer)?.map(|v| match v {
      StringOrNumber::String(s) => s,
      StringOrNumber::Number(n) => n.to_string(),
    }),
  )
}

// ─── Handler ──────────────────────────────────────────────────────────────────

/// `POST /identify`
pub async fn handler<S>(
  State(resolver): State<Resolver<S>>,
  Json(body): Json<IdentifyRequest>,
) -> Result<Json<IdentifyResponse>, ApiError>
where
  S: ContactStore + 'static,
{
  let view = resolver.identify(body.email, body.phone_number).await?;
  Ok(Json(view.into()))
}
