//! Client-side data layer for the Keel API.
//!
//! - `transport`: HTTP plumbing and session token handling
//! - `cache`: key-addressed query cache with in-flight deduplication
//! - `mutation`: write requests that invalidate cache entries on success
//! - `form` / `list`: view models for record forms and list screens
//! - `notify`: user-facing notifications

pub mod cache;
pub mod client;
pub mod error;
pub mod form;
pub mod list;
pub mod mutation;
pub mod notify;
pub mod query;
pub mod transport;

#[cfg(test)]
mod testing;

pub use cache::{CacheConfig, CacheEvent, Invalidate, QueryCache, QueryObserver};
pub use client::ApiClient;
pub use error::ClientError;
pub use form::{FormPhase, FormState, LineItemsForm, format_currency};
pub use list::ResourceList;
pub use mutation::{Mutation, MutationState};
pub use notify::{Notifier, Toast, ToastLevel, ToastQueue};
pub use query::{ApiRequest, Method, QueryKey};
pub use transport::{HttpTransport, Session, SessionUser, Transport};
