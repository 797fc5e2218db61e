use std::collections::BTreeMap;

use crate::key::{Key, Partition};
use crate::rule::{RuleField, RuleRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Gt,
}

/// A single predicate on a stored field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub field: RuleField,
    pub op: FilterOp,
    pub value: String,
}

impl Filter {
    pub fn matches(&self, record: &RuleRecord) -> bool {
        let stored = record.field(self.field);
        match self.op {
            FilterOp::Eq => stored == self.value,
            FilterOp::Gt => stored > self.value.as_str(),
        }
    }
}

/// Description of a fetch against a [`crate::datastore::Datastore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub kind: String,
    pub namespace: String,
    pub ancestor: Option<Key>,
    pub filters: Vec<Filter>,
    pub keys_only: bool,
}

impl Query {
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            namespace: String::new(),
            ancestor: None,
            filters: Vec::new(),
            keys_only: false,
        }
    }

    /// Every record of the partition with a non-empty type tag.
    pub fn list_all(partition: &Partition) -> Self {
        Self::new(&partition.kind)
            .namespace(&partition.namespace)
            .ancestor(partition.ancestor_key())
            .filter(RuleField::PType, FilterOp::Gt, "")
    }

    pub fn namespace(mut self, namespace: &str) -> Self {
        self.namespace = namespace.to_string();
        self
    }

    pub fn ancestor(mut self, ancestor: Key) -> Self {
        self.ancestor = Some(ancestor);
        self
    }

    pub fn filter(mut self, field: RuleField, op: FilterOp, value: &str) -> Self {
        self.filters.push(Filter {
            field,
            op,
            value: value.to_string(),
        });
        self
    }

    /// Add one equality filter per entry.
    pub fn narrow(self, filters: &BTreeMap<RuleField, String>) -> Self {
        filters
            .iter()
            .fold(self, |query, (field, value)| {
                query.filter(*field, FilterOp::Eq, value)
            })
    }

    pub fn keys_only(mut self) -> Self {
        self.keys_only = true;
        self
    }

    /// Whether a stored entity falls inside this query.
    pub fn matches(&self, key: &Key, record: &RuleRecord) -> bool {
        key.kind == self.kind
            && key.namespace == self.namespace
            && self
                .ancestor
                .as_ref()
                .map_or(true, |ancestor| key.has_ancestor(ancestor))
            && self.filters.iter().all(|filter| filter.matches(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partition() -> Partition {
        Partition::new("casbin", "unittest")
    }

    #[test]
    fn test_list_all() {
        let query = Query::list_all(&partition());
        assert_eq!(query.kind, "casbin");
        assert_eq!(query.namespace, "unittest");
        assert_eq!(query.ancestor, Some(partition().ancestor_key()));
        assert_eq!(
            query.filters,
            vec![Filter {
                field: RuleField::PType,
                op: FilterOp::Gt,
                value: String::new(),
            }]
        );
        assert!(!query.keys_only);
    }

    #[test]
    fn test_list_all_excludes_blank_type() {
        let query = Query::list_all(&partition());
        let record = RuleRecord::encode("", &["alice"]);
        let key = partition().record_key(&RuleRecord::encode("p", &["alice"]));
        assert!(!query.matches(&key, &record));
    }

    #[test]
    fn test_matches_requires_partition() {
        let query = Query::list_all(&partition());
        let record = RuleRecord::encode("p", &["alice", "data1", "read"]);

        assert!(query.matches(&partition().record_key(&record), &record));

        let other_ns = Partition::new("casbin", "other").record_key(&record);
        assert!(!query.matches(&other_ns, &record));

        let other_kind = Partition::new("casbin_xx", "unittest").record_key(&record);
        assert!(!query.matches(&other_kind, &record));
    }

    #[test]
    fn test_narrow_filter_order_is_irrelevant() {
        let mut filters = BTreeMap::new();
        filters.insert(RuleField::V1, "data2".to_string());
        filters.insert(RuleField::PType, "p".to_string());
        let query = Query::list_all(&partition()).narrow(&filters);
        assert_eq!(query.filters.len(), 3);

        let record = RuleRecord::encode("p", &["bob", "data2", "write"]);
        let key = partition().record_key(&record);
        assert!(query.matches(&key, &record));

        let reversed = query.filters.iter().rev().cloned().collect::<Vec<_>>();
        let reversed = Query {
            filters: reversed,
            ..query.clone()
        };
        assert!(reversed.matches(&key, &record));

        let miss = RuleRecord::encode("p", &["bob", "data1", "write"]);
        assert!(!query.matches(&partition().record_key(&miss), &miss));
    }
}
