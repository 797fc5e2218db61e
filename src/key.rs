use crate::rule::RuleRecord;

/// Numeric id of the synthetic root every record of a partition hangs off.
pub const ANCESTOR_ID: i64 = 1;

/// Identifier part of a [`Key`]: either numeric or a string name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyId {
    Id(i64),
    Name(String),
}

/// Store key: kind + identifier, optionally parented, scoped to a namespace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key {
    pub namespace: String,
    pub kind: String,
    pub id: KeyId,
    pub parent: Option<Box<Key>>,
}

impl Key {
    pub fn id_key(kind: &str, id: i64, parent: Option<Key>) -> Self {
        Self {
            namespace: String::new(),
            kind: kind.to_string(),
            id: KeyId::Id(id),
            parent: parent.map(Box::new),
        }
    }

    pub fn name_key(kind: &str, name: &str, parent: Option<Key>) -> Self {
        Self {
            namespace: String::new(),
            kind: kind.to_string(),
            id: KeyId::Name(name.to_string()),
            parent: parent.map(Box::new),
        }
    }

    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.namespace = namespace.to_string();
        self
    }

    pub fn name(&self) -> Option<&str> {
        match &self.id {
            KeyId::Name(name) => Some(name),
            KeyId::Id(_) => None,
        }
    }

    /// A named key with an empty name does not identify anything.
    pub fn is_incomplete(&self) -> bool {
        matches!(&self.id, KeyId::Name(name) if name.is_empty())
    }

    /// True when `ancestor` is this key's parent, grandparent, and so on.
    pub fn has_ancestor(&self, ancestor: &Key) -> bool {
        let mut current = self.parent.as_deref();
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = parent.parent.as_deref();
        }
        false
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(parent) = &self.parent {
            write!(f, "{}/", parent)?;
        } else if !self.namespace.is_empty() {
            write!(f, "[{}]", self.namespace)?;
        }
        match &self.id {
            KeyId::Id(id) => write!(f, "{},{}", self.kind, id),
            KeyId::Name(name) => write!(f, "{},{:?}", self.kind, name),
        }
    }
}

/// Isolated storage area for one policy store: a kind name and a namespace.
///
/// Every record of a partition is a child of the same ancestor key, which puts
/// them into one strongly consistent group so a save can replace them in a
/// single transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Partition {
    pub kind: String,
    pub namespace: String,
}

impl Partition {
    pub fn new(kind: &str, namespace: &str) -> Self {
        Self {
            kind: kind.to_string(),
            namespace: namespace.to_string(),
        }
    }

    pub fn ancestor_key(&self) -> Key {
        Key::id_key(&self.kind, ANCESTOR_ID, None).with_namespace(&self.namespace)
    }

    /// Content-derived key of a record: named by its identity, under the ancestor.
    pub fn record_key(&self, record: &RuleRecord) -> Key {
        Key::name_key(&self.kind, &record.identity(), Some(self.ancestor_key()))
            .with_namespace(&self.namespace)
    }
}
