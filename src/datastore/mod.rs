//! Document store primitives the adapter is written against.

pub mod memory;
pub mod sql;

use async_trait::async_trait;

use crate::errors::DatastoreError;
use crate::key::Key;
use crate::query::Query;
use crate::rule::RuleRecord;

pub use memory::MemoryDatastore;
pub use sql::SqlDatastore;

/// One write inside a [`Transaction`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Delete(Key),
    Put(Key, RuleRecord),
}

/// Ordered batch of writes applied all-or-nothing by [`Datastore::commit`].
#[derive(Debug, Clone, Default)]
pub struct Transaction {
    mutations: Vec<Mutation>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delete_multi(&mut self, keys: impl IntoIterator<Item = Key>) -> &mut Self {
        self.mutations.extend(keys.into_iter().map(Mutation::Delete));
        self
    }

    pub fn put(&mut self, key: Key, record: RuleRecord) -> &mut Self {
        self.mutations.push(Mutation::Put(key, record));
        self
    }

    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    pub fn into_mutations(self) -> Vec<Mutation> {
        self.mutations
    }
}

#[async_trait]
pub trait Datastore: Send + Sync {
    /// Entities matching `query`, with their keys.
    async fn get_all(&self, query: &Query) -> Result<Vec<(Key, RuleRecord)>, DatastoreError>;

    /// Keys of the entities matching `query`.
    async fn get_all_keys(&self, query: &Query) -> Result<Vec<Key>, DatastoreError>;

    /// Insert or overwrite the entity stored under `key`.
    async fn put(&self, key: &Key, record: &RuleRecord) -> Result<(), DatastoreError>;

    /// Delete the entity under `key`; deleting a missing key is not an error.
    async fn delete(&self, key: &Key) -> Result<(), DatastoreError>;

    /// Delete every key in one call, returning how many entities were removed.
    async fn delete_multi(&self, keys: &[Key]) -> Result<u64, DatastoreError>;

    /// Apply every mutation of `tx` atomically.
    async fn commit(&self, tx: Transaction) -> Result<(), DatastoreError>;

    /// Release the underlying handle.
    async fn close(self) -> Result<(), DatastoreError>
    where
        Self: Sized;
}
