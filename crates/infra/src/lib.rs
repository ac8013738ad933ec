//! Infrastructure layer: record/user storage and the record service that
//! sits between HTTP handlers and storage.

pub mod record_service;
pub mod store;

pub use record_service::{RecordService, ServiceError};
pub use store::{
    InMemoryRecordStore, InMemoryUserStore, RecordStore, SqliteStore, StoreError, UserStore,
};
