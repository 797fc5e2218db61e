use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{Datastore, Mutation, Transaction};
use crate::errors::DatastoreError;
use crate::key::Key;
use crate::query::Query;
use crate::rule::RuleRecord;

/// Process-local store. Commits are applied to a staged copy and swapped in
/// only when every mutation succeeded.
#[derive(Debug, Default)]
pub struct MemoryDatastore {
    entities: Mutex<BTreeMap<Key, RuleRecord>>,
}

impl MemoryDatastore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entities across every partition.
    pub async fn len(&self) -> usize {
        self.entities.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entities.lock().await.is_empty()
    }

    /// Snapshot of everything stored, in key order.
    pub async fn snapshot(&self) -> Vec<(Key, RuleRecord)> {
        self.entities
            .lock()
            .await
            .iter()
            .map(|(key, record)| (key.clone(), record.clone()))
            .collect()
    }
}

fn check_key(key: &Key) -> Result<(), DatastoreError> {
    if key.is_incomplete() {
        return Err(DatastoreError::IncompleteKey(key.to_string()));
    }
    Ok(())
}

#[async_trait]
impl Datastore for MemoryDatastore {
    async fn get_all(&self, query: &Query) -> Result<Vec<(Key, RuleRecord)>, DatastoreError> {
        let entities = self.entities.lock().await;
        Ok(entities
            .iter()
            .filter(|(key, record)| query.matches(key, record))
            .map(|(key, record)| (key.clone(), record.clone()))
            .collect())
    }

    async fn get_all_keys(&self, query: &Query) -> Result<Vec<Key>, DatastoreError> {
        let entities = self.entities.lock().await;
        Ok(entities
            .iter()
            .filter(|(key, record)| query.matches(key, record))
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn put(&self, key: &Key, record: &RuleRecord) -> Result<(), DatastoreError> {
        check_key(key)?;
        self.entities
            .lock()
            .await
            .insert(key.clone(), record.clone());
        Ok(())
    }

    async fn delete(&self, key: &Key) -> Result<(), DatastoreError> {
        check_key(key)?;
        self.entities.lock().await.remove(key);
        Ok(())
    }

    async fn delete_multi(&self, keys: &[Key]) -> Result<u64, DatastoreError> {
        keys.iter().try_for_each(check_key)?;
        let mut entities = self.entities.lock().await;
        let removed = keys
            .iter()
            .filter(|key| entities.remove(*key).is_some())
            .count();
        Ok(removed as u64)
    }

    async fn commit(&self, tx: Transaction) -> Result<(), DatastoreError> {
        let mut entities = self.entities.lock().await;
        let mut staged = entities.clone();
        for mutation in tx.into_mutations() {
            match mutation {
                Mutation::Delete(key) => {
                    check_key(&key)?;
                    staged.remove(&key);
                }
                Mutation::Put(key, record) => {
                    check_key(&key)?;
                    staged.insert(key, record);
                }
            }
        }
        *entities = staged;
        Ok(())
    }

    async fn close(self) -> Result<(), DatastoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::Partition;

    fn partition() -> Partition {
        Partition::new("casbin", "")
    }

    fn record(fields: &[&str]) -> RuleRecord {
        RuleRecord::encode("p", fields)
    }

    #[tokio::test]
    async fn test_put_is_upsert() {
        let store = MemoryDatastore::new();
        let rule = record(&["alice", "data1", "read"]);
        let key = partition().record_key(&rule);

        store.put(&key, &rule).await.expect("first put");
        store.put(&key, &rule).await.expect("second put");

        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_put_rejects_incomplete_key() {
        let store = MemoryDatastore::new();
        let rule = RuleRecord::encode("", &["alice"]);
        let err = store
            .put(&partition().record_key(&rule), &rule)
            .await
            .expect_err("blank identity must be rejected");
        assert!(matches!(err, DatastoreError::IncompleteKey(_)));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_delete_missing_key_is_ok() {
        let store = MemoryDatastore::new();
        let key = partition().record_key(&record(&["nobody"]));
        store.delete(&key).await.expect("delete of missing key");
        assert_eq!(store.delete_multi(&[key]).await.expect("delete_multi"), 0);
    }

    #[tokio::test]
    async fn test_get_all_applies_query() {
        let store = MemoryDatastore::new();
        let alice = record(&["alice", "data1", "read"]);
        let bob = record(&["bob", "data2", "write"]);
        store.put(&partition().record_key(&alice), &alice).await.unwrap();
        store.put(&partition().record_key(&bob), &bob).await.unwrap();

        let elsewhere = Partition::new("casbin", "other");
        store.put(&elsewhere.record_key(&bob), &bob).await.unwrap();

        let all = store.get_all(&Query::list_all(&partition())).await.unwrap();
        assert_eq!(all.len(), 2);

        let keys = store
            .get_all_keys(&Query::list_all(&elsewhere).keys_only())
            .await
            .unwrap();
        assert_eq!(keys, vec![elsewhere.record_key(&bob)]);
    }

    #[tokio::test]
    async fn test_commit_is_all_or_nothing() {
        let store = MemoryDatastore::new();
        let alice = record(&["alice", "data1", "read"]);
        let alice_key = partition().record_key(&alice);
        store.put(&alice_key, &alice).await.unwrap();

        let bob = record(&["bob", "data2", "write"]);
        let blank = RuleRecord::encode(" ", &["carol"]);
        let mut tx = Transaction::new();
        tx.delete_multi([alice_key.clone()])
            .put(partition().record_key(&bob), bob)
            .put(partition().record_key(&blank), blank);
        assert_eq!(tx.len(), 3);

        assert!(store.commit(tx).await.is_err());
        assert_eq!(store.snapshot().await, vec![(alice_key, alice)]);
    }
}
