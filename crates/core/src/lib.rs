//! `keel-core`: domain building blocks shared by the server and the client.
//!
//! Nothing in here touches storage or HTTP: identifiers, the domain error
//! model, field definitions with their coercion rules, the record shape and
//! the resource catalog.

pub mod catalog;
pub mod error;
pub mod field;
pub mod id;
pub mod record;

pub use catalog::{Catalog, Lifecycle, ResourceDef, Transition};
pub use error::{DomainError, DomainResult};
pub use field::{FieldDef, FieldError, FieldKind, ValidationMode, validate_fields};
pub use id::{RecordId, TenantId, UserId};
pub use record::Record;
