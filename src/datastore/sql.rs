use async_trait::async_trait;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, Database, DatabaseConnection, EntityTrait,
    QueryFilter, QuerySelect, Select, Set, TransactionTrait,
};

use super::{Datastore, Mutation, Transaction};
use crate::entities::rule_record::{ActiveModel, Column, Entity, Model};
use crate::errors::DatastoreError;
use crate::key::{Key, KeyId};
use crate::query::{FilterOp, Query};
use crate::rule::{RuleField, RuleRecord};

/// Keys per `DELETE` statement, to stay clear of bind-parameter limits.
const DELETE_CHUNK: usize = 100;

const KEY_COLUMNS: [Column; 5] = [
    Column::Namespace,
    Column::Kind,
    Column::ParentKind,
    Column::ParentId,
    Column::Name,
];

const VALUE_COLUMNS: [Column; 7] = [
    Column::Ptype,
    Column::V0,
    Column::V1,
    Column::V2,
    Column::V3,
    Column::V4,
    Column::V5,
];

/// Store backed by the `rule_records` table through SeaORM.
#[derive(Debug, Clone)]
pub struct SqlDatastore {
    db: DatabaseConnection,
}

/// A store key flattened onto the table's key columns.
#[derive(Debug, Clone, PartialEq, Eq)]
struct KeyRow {
    namespace: String,
    kind: String,
    parent_kind: String,
    parent_id: i64,
    name: String,
}

impl KeyRow {
    fn from_key(key: &Key) -> Result<Self, DatastoreError> {
        let name = match &key.id {
            KeyId::Name(name) if name.is_empty() => {
                return Err(DatastoreError::IncompleteKey(key.to_string()))
            }
            KeyId::Name(name) => name.clone(),
            KeyId::Id(_) => return Err(DatastoreError::UnsupportedKey(key.to_string())),
        };
        let (parent_kind, parent_id) = match key.parent.as_deref() {
            None => (String::new(), 0),
            Some(parent) => ancestor_row(parent)?,
        };
        Ok(Self {
            namespace: key.namespace.clone(),
            kind: key.kind.clone(),
            parent_kind,
            parent_id,
            name,
        })
    }

    fn into_key(self) -> Key {
        let parent = (!self.parent_kind.is_empty()).then(|| {
            Key::id_key(&self.parent_kind, self.parent_id, None).with_namespace(&self.namespace)
        });
        Key::name_key(&self.kind, &self.name, parent).with_namespace(&self.namespace)
    }

    fn condition(&self) -> Condition {
        Condition::all()
            .add(Column::Namespace.eq(self.namespace.as_str()))
            .add(Column::Kind.eq(self.kind.as_str()))
            .add(Column::ParentKind.eq(self.parent_kind.as_str()))
            .add(Column::ParentId.eq(self.parent_id))
            .add(Column::Name.eq(self.name.as_str()))
    }
}

fn ancestor_row(ancestor: &Key) -> Result<(String, i64), DatastoreError> {
    match (&ancestor.id, &ancestor.parent) {
        (KeyId::Id(id), None) => Ok((ancestor.kind.clone(), *id)),
        _ => Err(DatastoreError::UnsupportedKey(ancestor.to_string())),
    }
}

fn column(field: RuleField) -> Column {
    match field {
        RuleField::PType => Column::Ptype,
        RuleField::V0 => Column::V0,
        RuleField::V1 => Column::V1,
        RuleField::V2 => Column::V2,
        RuleField::V3 => Column::V3,
        RuleField::V4 => Column::V4,
        RuleField::V5 => Column::V5,
    }
}

fn select(query: &Query) -> Result<Select<Entity>, DatastoreError> {
    let mut select = Entity::find()
        .filter(Column::Namespace.eq(query.namespace.as_str()))
        .filter(Column::Kind.eq(query.kind.as_str()));

    if let Some(ancestor) = &query.ancestor {
        let (parent_kind, parent_id) = ancestor_row(ancestor)?;
        select = select
            .filter(Column::ParentKind.eq(parent_kind))
            .filter(Column::ParentId.eq(parent_id));
    }

    for filter in &query.filters {
        let column = column(filter.field);
        let value = filter.value.as_str();
        select = match filter.op {
            FilterOp::Eq => select.filter(column.eq(value)),
            FilterOp::Gt => select.filter(column.gt(value)),
        };
    }

    Ok(select)
}

fn into_entry(model: Model) -> (Key, RuleRecord) {
    let record = RuleRecord {
        ptype: model.ptype,
        v0: model.v0,
        v1: model.v1,
        v2: model.v2,
        v3: model.v3,
        v4: model.v4,
        v5: model.v5,
    };
    let key = KeyRow {
        namespace: model.namespace,
        kind: model.kind,
        parent_kind: model.parent_kind,
        parent_id: model.parent_id,
        name: model.name,
    }
    .into_key();
    (key, record)
}

async fn put_with<C: ConnectionTrait>(
    conn: &C,
    key: &Key,
    record: &RuleRecord,
) -> Result<(), DatastoreError> {
    let row = KeyRow::from_key(key)?;

    let model = ActiveModel {
        namespace: Set(row.namespace),
        kind: Set(row.kind),
        parent_kind: Set(row.parent_kind),
        parent_id: Set(row.parent_id),
        name: Set(row.name),
        ptype: Set(record.ptype.clone()),
        v0: Set(record.v0.clone()),
        v1: Set(record.v1.clone()),
        v2: Set(record.v2.clone()),
        v3: Set(record.v3.clone()),
        v4: Set(record.v4.clone()),
        v5: Set(record.v5.clone()),
    };

    Entity::insert(model)
        .on_conflict(
            OnConflict::columns(KEY_COLUMNS)
                .update_columns(VALUE_COLUMNS)
                .to_owned(),
        )
        .exec_without_returning(conn)
        .await?;

    Ok(())
}

async fn delete_with<C: ConnectionTrait>(conn: &C, keys: &[Key]) -> Result<u64, DatastoreError> {
    let rows = keys
        .iter()
        .map(KeyRow::from_key)
        .collect::<Result<Vec<_>, _>>()?;

    let mut removed = 0;
    for chunk in rows.chunks(DELETE_CHUNK) {
        let condition = chunk
            .iter()
            .fold(Condition::any(), |any, row| any.add(row.condition()));
        let result = Entity::delete_many().filter(condition).exec(conn).await?;
        removed += result.rows_affected;
    }
    Ok(removed)
}

impl SqlDatastore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Connect using a SeaORM/SQLx URL such as `sqlite://casbin.db?mode=rwc`.
    pub async fn connect(url: &str) -> Result<Self, DatastoreError> {
        let db = Database::connect(url).await?;
        Ok(Self::new(db))
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

#[async_trait]
impl Datastore for SqlDatastore {
    async fn get_all(&self, query: &Query) -> Result<Vec<(Key, RuleRecord)>, DatastoreError> {
        let models = select(query)?.all(&self.db).await?;
        Ok(models.into_iter().map(into_entry).collect())
    }

    async fn get_all_keys(&self, query: &Query) -> Result<Vec<Key>, DatastoreError> {
        let rows: Vec<(String, String, String, i64, String)> = select(query)?
            .select_only()
            .columns(KEY_COLUMNS)
            .into_tuple()
            .all(&self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(namespace, kind, parent_kind, parent_id, name)| {
                KeyRow {
                    namespace,
                    kind,
                    parent_kind,
                    parent_id,
                    name,
                }
                .into_key()
            })
            .collect())
    }

    async fn put(&self, key: &Key, record: &RuleRecord) -> Result<(), DatastoreError> {
        put_with(&self.db, key, record).await
    }

    async fn delete(&self, key: &Key) -> Result<(), DatastoreError> {
        delete_with(&self.db, std::slice::from_ref(key)).await?;
        Ok(())
    }

    async fn delete_multi(&self, keys: &[Key]) -> Result<u64, DatastoreError> {
        delete_with(&self.db, keys).await
    }

    async fn commit(&self, tx: Transaction) -> Result<(), DatastoreError> {
        // Dropping `txn` on an early return rolls everything back.
        let txn = self.db.begin().await?;

        let mut pending_deletes = Vec::new();
        for mutation in tx.into_mutations() {
            match mutation {
                Mutation::Delete(key) => pending_deletes.push(key),
                Mutation::Put(key, record) => {
                    if !pending_deletes.is_empty() {
                        delete_with(&txn, &pending_deletes).await?;
                        pending_deletes.clear();
                    }
                    put_with(&txn, &key, &record).await?;
                }
            }
        }
        if !pending_deletes.is_empty() {
            delete_with(&txn, &pending_deletes).await?;
        }

        txn.commit().await?;
        Ok(())
    }

    async fn close(self) -> Result<(), DatastoreError> {
        self.db.close().await?;
        Ok(())
    }
}
