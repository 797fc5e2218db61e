use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::datastore::{Datastore, Transaction};
use crate::errors::{AdapterError, DatastoreError};
use crate::filter::build_filters;
use crate::key::Partition;
use crate::model::Model;
use crate::query::Query;
use crate::rule::RuleRecord;

pub const DEFAULT_KIND: &str = "casbin";
pub const DEFAULT_MODEL_KIND: &str = "casbin_model";
pub const DEFAULT_LONG_OPERATION_DEADLINE: Duration = Duration::from_secs(10 * 60);
pub const DEFAULT_SHORT_OPERATION_DEADLINE: Duration = Duration::from_secs(30);

/// Sections whose rules are persisted by [`PolicyAdapter::save_policy`].
const POLICY_SECTIONS: [&str; 2] = ["p", "g"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterConfig {
    /// Kind the rule records are stored under.
    pub kind: String,
    /// Kind the model definition is stored under.
    pub model_kind: String,
    pub namespace: String,
    /// Trace every store call at `info` level.
    pub debug: bool,
    /// Bound for load, save and filtered removal.
    pub long_operation_deadline: Duration,
    /// Bound for single add and remove calls.
    pub short_operation_deadline: Duration,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            kind: DEFAULT_KIND.to_string(),
            model_kind: DEFAULT_MODEL_KIND.to_string(),
            namespace: String::new(),
            debug: false,
            long_operation_deadline: DEFAULT_LONG_OPERATION_DEADLINE,
            short_operation_deadline: DEFAULT_SHORT_OPERATION_DEADLINE,
        }
    }
}

impl AdapterConfig {
    /// Replace blank kinds and zero deadlines with their defaults.
    ///
    /// The model definition never shares the policy partition: a `model_kind`
    /// equal to `kind` becomes `<kind>_model`.
    pub fn normalized(mut self) -> Self {
        if self.kind.trim().is_empty() {
            self.kind = DEFAULT_KIND.to_string();
        }
        if self.model_kind.trim().is_empty() {
            self.model_kind = DEFAULT_MODEL_KIND.to_string();
        }
        if self.model_kind == self.kind {
            let model_kind = format!("{}_model", self.kind);
            tracing::warn!(
                kind = %self.kind,
                model_kind = %model_kind,
                "model kind equals the policy kind; storing the model under a separate kind"
            );
            self.model_kind = model_kind;
        }
        if self.long_operation_deadline.is_zero() {
            self.long_operation_deadline = DEFAULT_LONG_OPERATION_DEADLINE;
        }
        if self.short_operation_deadline.is_zero() {
            self.short_operation_deadline = DEFAULT_SHORT_OPERATION_DEADLINE;
        }
        self
    }

    pub fn partition(&self) -> Partition {
        Partition::new(&self.kind, &self.namespace)
    }

    pub fn model_partition(&self) -> Partition {
        Partition::new(&self.model_kind, &self.namespace)
    }
}

/// The persistence contract a policy engine drives.
///
/// `sec` is accepted for compatibility but never stored: on load the section
/// is re-derived from the first character of the rule type.
#[async_trait]
pub trait PolicyAdapter: Send + Sync {
    async fn load_policy(&self, model: &mut Model) -> Result<(), AdapterError>;

    async fn save_policy(&self, model: &Model) -> Result<(), AdapterError>;

    async fn add_policy(&self, sec: &str, ptype: &str, rule: &[String])
        -> Result<(), AdapterError>;

    async fn add_policies(
        &self,
        sec: &str,
        ptype: &str,
        rules: &[Vec<String>],
    ) -> Result<(), AdapterError>;

    async fn remove_policy(
        &self,
        sec: &str,
        ptype: &str,
        rule: &[String],
    ) -> Result<(), AdapterError>;

    async fn remove_policies(
        &self,
        sec: &str,
        ptype: &str,
        rules: &[Vec<String>],
    ) -> Result<(), AdapterError>;

    /// Remove every rule of `ptype` matching `field_values` from position
    /// `field_index` on. Empty values match anything. Returns the number removed.
    async fn remove_filtered_policy(
        &self,
        sec: &str,
        ptype: &str,
        field_index: isize,
        field_values: &[String],
    ) -> Result<u64, AdapterError>;
}

/// Warns when an adapter goes away without [`Adapter::close`].
#[derive(Debug)]
struct CloseGuard {
    armed: bool,
    partition: Partition,
}

impl Drop for CloseGuard {
    fn drop(&mut self) {
        if self.armed {
            tracing::warn!(
                kind = %self.partition.kind,
                namespace = %self.partition.namespace,
                "adapter dropped without close(); the store handle was not released explicitly"
            );
        }
    }
}

/// Policy persistence over a [`Datastore`].
///
/// Owns the store handle until [`Adapter::close`]. A `save_policy` running
/// concurrently with other mutations of the same partition may drop their
/// effect, so callers serialize saves against add/remove on one partition.
#[derive(Debug)]
pub struct Adapter<S: Datastore> {
    store: S,
    config: AdapterConfig,
    partition: Partition,
    guard: CloseGuard,
}

pub(crate) async fn with_deadline<T, F>(
    operation: &'static str,
    deadline: Duration,
    fut: F,
) -> Result<T, AdapterError>
where
    F: Future<Output = Result<T, AdapterError>>,
{
    tokio::time::timeout(deadline, fut)
        .await
        .map_err(|_| AdapterError::DeadlineExceeded {
            operation,
            deadline,
        })?
}

/// Records for every rule in the `p` and `g` sections, in model order.
pub fn policy_records(model: &Model) -> Vec<RuleRecord> {
    POLICY_SECTIONS
        .iter()
        .filter_map(|sec| model.get(sec))
        .flat_map(|assertions| assertions.iter())
        .flat_map(|(ptype, assertion)| {
            assertion
                .policy
                .iter()
                .map(move |rule| RuleRecord::encode(ptype, rule))
        })
        .collect()
}

fn load_record(record: &RuleRecord, model: &mut Model) {
    let Some(sec) = record.section() else {
        return;
    };
    let (ptype, fields) = record.decode();
    model.add_policy(&sec, &ptype, fields);
}

impl<S: Datastore> Adapter<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, AdapterConfig::default())
    }

    pub fn with_config(store: S, config: AdapterConfig) -> Self {
        let config = config.normalized();
        let partition = config.partition();
        Self {
            store,
            guard: CloseGuard {
                armed: true,
                partition: partition.clone(),
            },
            partition,
            config,
        }
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Release the store handle.
    pub async fn close(self) -> Result<(), AdapterError> {
        let Adapter {
            store, mut guard, ..
        } = self;
        guard.armed = false;
        store.close().await?;
        Ok(())
    }

    fn trace(&self, operation: &str, detail: &str) {
        if self.config.debug {
            tracing::info!(
                kind = %self.partition.kind,
                namespace = %self.partition.namespace,
                "[{operation}] {detail}"
            );
        }
    }
}

#[async_trait]
impl<S: Datastore> PolicyAdapter for Adapter<S> {
    async fn load_policy(&self, model: &mut Model) -> Result<(), AdapterError> {
        self.trace("load_policy", "called - getting all db entries");

        let query = Query::list_all(&self.partition);
        let entries = with_deadline(
            "load_policy",
            self.config.long_operation_deadline,
            async { Ok(self.store.get_all(&query).await?) },
        )
        .await?;

        for (_, record) in &entries {
            load_record(record, model);
        }
        tracing::debug!(rules = entries.len(), "loaded policy rules");
        Ok(())
    }

    async fn save_policy(&self, model: &Model) -> Result<(), AdapterError> {
        self.trace("save_policy", "called");

        with_deadline("save_policy", self.config.long_operation_deadline, async {
            let query = Query::list_all(&self.partition).keys_only();
            let keys = self.store.get_all_keys(&query).await?;
            self.trace("save_policy", &format!("{} keys to drop", keys.len()));

            let records = policy_records(model);
            let inserted = records.len();

            let mut tx = Transaction::new();
            tx.delete_multi(keys);
            for record in records {
                tx.put(self.partition.record_key(&record), record);
            }
            self.store.commit(tx).await?;

            tracing::debug!(rules = inserted, "saved policy rules");
            Ok(())
        })
        .await
    }

    async fn add_policy(
        &self,
        sec: &str,
        ptype: &str,
        rule: &[String],
    ) -> Result<(), AdapterError> {
        let record = RuleRecord::encode(ptype, rule);
        let key = self.partition.record_key(&record);
        self.trace("add_policy", &format!("{sec}: {}", record.identity()));

        with_deadline("add_policy", self.config.short_operation_deadline, async {
            Ok(self.store.put(&key, &record).await?)
        })
        .await
    }

    async fn add_policies(
        &self,
        sec: &str,
        ptype: &str,
        rules: &[Vec<String>],
    ) -> Result<(), AdapterError> {
        self.trace("add_policies", &format!("{sec}: {} rules", rules.len()));

        with_deadline("add_policies", self.config.short_operation_deadline, async {
            for rule in rules {
                let record = RuleRecord::encode(ptype, rule);
                self.store
                    .put(&self.partition.record_key(&record), &record)
                    .await?;
            }
            Ok(())
        })
        .await
    }

    async fn remove_policy(
        &self,
        sec: &str,
        ptype: &str,
        rule: &[String],
    ) -> Result<(), AdapterError> {
        let record = RuleRecord::encode(ptype, rule);
        let key = self.partition.record_key(&record);
        self.trace("remove_policy", &format!("{sec}: {}", record.identity()));

        with_deadline("remove_policy", self.config.short_operation_deadline, async {
            Ok(self.store.delete(&key).await?)
        })
        .await
    }

    async fn remove_policies(
        &self,
        sec: &str,
        ptype: &str,
        rules: &[Vec<String>],
    ) -> Result<(), AdapterError> {
        self.trace("remove_policies", &format!("{sec}: {} rules", rules.len()));

        let keys: Vec<_> = rules
            .iter()
            .map(|rule| self.partition.record_key(&RuleRecord::encode(ptype, rule)))
            .collect();
        with_deadline(
            "remove_policies",
            self.config.short_operation_deadline,
            async {
                self.store.delete_multi(&keys).await?;
                Ok(())
            },
        )
        .await
    }

    async fn remove_filtered_policy(
        &self,
        sec: &str,
        ptype: &str,
        field_index: isize,
        field_values: &[String],
    ) -> Result<u64, AdapterError> {
        self.trace(
            "remove_filtered_policy",
            &format!("{sec}: {ptype} from {field_index} matching {field_values:?}"),
        );

        let filters = build_filters(ptype, field_index, field_values);
        let query = Query::list_all(&self.partition)
            .narrow(&filters)
            .keys_only();

        with_deadline(
            "remove_filtered_policy",
            self.config.long_operation_deadline,
            async {
                let keys = match self.store.get_all_keys(&query).await {
                    Ok(keys) => keys,
                    Err(DatastoreError::NotFound) => return Ok(0),
                    Err(err) => return Err(err.into()),
                };
                if keys.is_empty() {
                    return Ok(0);
                }
                let removed = self.store.delete_multi(&keys).await?;
                tracing::debug!(removed, "removed filtered policy rules");
                Ok(removed)
            },
        )
        .await
    }
}
