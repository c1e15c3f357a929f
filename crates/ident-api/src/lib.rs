//! JSON HTTP API for identity reconciliation.
//!
//! Exposes an axum [`Router`] backed by a [`Resolver`] over any
//! [`ident_core::store::ContactStore`]. TLS, request tracing and process
//! concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .merge(ident_api::api_router(Resolver::new(store.clone())))
//! ```

pub mod contacts;
pub mod error;
pub mod identify;

use axum::{
  Json, Router,
  routing::{get, post},
};
use ident_core::{Resolver, store::ContactStore};
use serde_json::{Value, json};

pub use error::ApiError;

/// Build the API router for `resolver`.
///
/// The returned `Router<()>` can be merged into any parent router regardless
/// of its own state type.
pub fn api_router<S>(resolver: Resolver<S>) -> Router<()>
where
  S: ContactStore + 'static,
{
  Router::new()
    .route("/identify", post(identify::handler::<S>))
    .route("/contacts/{id}", get(contacts::get_one::<S>))
    .route("/health", get(health))
    .with_state(resolver)
}

/// `GET /health`
async fn health() -> Json<Value> { Json(json!({ "status": "ok" })) }
