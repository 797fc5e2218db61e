//! casbin-datastore - policy persistence over a key/value document store
//!
//! Rules are stored one record per rule, keyed by their comma-joined content,
//! under a per-partition ancestor key so a whole partition can be listed and
//! replaced in one strongly consistent query. It exposes all modules for
//! testing purposes.

pub mod adapter;
pub mod datastore;
pub mod entities;
pub mod errors;
pub mod filter;
pub mod key;
pub mod model;
pub mod model_store;
pub mod query;
pub mod rule;
pub mod settings;

pub use adapter::{Adapter, AdapterConfig, PolicyAdapter};
pub use datastore::{Datastore, MemoryDatastore, SqlDatastore, Transaction};
pub use errors::{AdapterError, DatastoreError};
pub use model::Model;
pub use rule::RuleRecord;
