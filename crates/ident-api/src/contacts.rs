//! Handler for `GET /contacts/{id}`: a read-only view of one stored record.

use axum::{
  Json,
  extract::{Path, State},
};
use ident_core::{
  Resolver,
  contact::{Contact, ContactId},
  store::ContactStore,
};

use crate::error::ApiError;

/// `GET /contacts/{id}`
pub async fn get_one<S>(
  State(resolver): State<Resolver<S>>,
  Path(id): Path<ContactId>,
) -> Result<Json<Contact>, ApiError>
where
  S: ContactStore + 'static,
{
  let contact = resolver
    .store()
    .get_contact(id)
    .await
    .map_err(|e| ApiError::Unavailable(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound(format!("contact {id} not found")))?;
  Ok(Json(contact))
}
