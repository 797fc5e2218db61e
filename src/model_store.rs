//! Storage for the model definition itself, kept beside the policy rules.
//!
//! Each assertion becomes one record: `ptype` holds the section key, `v0` the
//! assertion key and `v1` its definition text. The records live in the
//! `(model_kind, namespace)` partition.

use crate::adapter::{with_deadline, Adapter, AdapterConfig};
use crate::datastore::{Datastore, Transaction};
use crate::errors::AdapterError;
use crate::model::Model;
use crate::query::Query;
use crate::rule::RuleRecord;

fn definition_records(model: &Model) -> Vec<RuleRecord> {
    model
        .sections()
        .flat_map(|(sec, assertions)| {
            assertions
                .values()
                .map(move |assertion| RuleRecord::encode(sec, &[&assertion.key, &assertion.value]))
        })
        .collect()
}

/// Parse `conf` and replace the stored model definition with it.
pub async fn save_model<S: Datastore>(
    store: &S,
    conf: &str,
    config: &AdapterConfig,
) -> Result<(), AdapterError> {
    let model = Model::from_conf_str(conf)?;
    let partition = config.model_partition();

    with_deadline("save_model", config.long_operation_deadline, async {
        let query = Query::list_all(&partition).keys_only();
        let keys = store.get_all_keys(&query).await?;

        let mut tx = Transaction::new();
        tx.delete_multi(keys);
        for record in definition_records(&model) {
            tx.put(partition.record_key(&record), record);
        }
        store.commit(tx).await?;
        Ok(())
    })
    .await?;

    tracing::debug!(
        kind = %partition.kind,
        namespace = %partition.namespace,
        "saved model definition"
    );
    Ok(())
}

/// Rebuild the stored model definition. Fails if nothing is stored.
pub async fn load_model<S: Datastore>(
    store: &S,
    config: &AdapterConfig,
) -> Result<Model, AdapterError> {
    let partition = config.model_partition();
    let query = Query::list_all(&partition);
    let entries = with_deadline("load_model", config.long_operation_deadline, async {
        Ok(store.get_all(&query).await?)
    })
    .await?;

    if entries.is_empty() {
        return Err(AdapterError::ModelNotFound {
            kind: partition.kind,
            namespace: partition.namespace,
        });
    }

    let mut model = Model::new();
    for (_, record) in entries {
        let (sec, fields) = record.decode();
        let Some(key) = fields.first() else {
            continue;
        };
        let value = fields.get(1).map(String::as_str).unwrap_or_default();
        model.add_def(&sec, key, value);
    }
    Ok(model)
}

impl<S: Datastore> Adapter<S> {
    pub async fn save_model(&self, conf: &str) -> Result<(), AdapterError> {
        save_model(self.store(), conf, self.config()).await
    }

    pub async fn load_model(&self) -> Result<Model, AdapterError> {
        load_model(self.store(), self.config()).await
    }
}
