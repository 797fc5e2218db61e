use serde::{Deserialize, Serialize};

/// Number of positional value slots a record carries (`v0`..`v5`).
pub const SLOT_COUNT: usize = 6;

/// Names of the seven stored fields of a [`RuleRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RuleField {
    PType,
    V0,
    V1,
    V2,
    V3,
    V4,
    V5,
}

impl RuleField {
    pub const SLOTS: [RuleField; SLOT_COUNT] = [
        RuleField::V0,
        RuleField::V1,
        RuleField::V2,
        RuleField::V3,
        RuleField::V4,
        RuleField::V5,
    ];

    /// The field stored at rule position `position`, if there is one.
    pub fn slot(position: usize) -> Option<Self> {
        Self::SLOTS.get(position).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            RuleField::PType => "ptype",
            RuleField::V0 => "v0",
            RuleField::V1 => "v1",
            RuleField::V2 => "v2",
            RuleField::V3 => "v3",
            RuleField::V4 => "v4",
            RuleField::V5 => "v5",
        }
    }
}

impl std::fmt::Display for RuleField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Fixed-shape projection of a policy rule: a type tag and six value slots.
/// Unused slots hold empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleRecord {
    pub ptype: String,
    pub v0: String,
    pub v1: String,
    pub v2: String,
    pub v3: String,
    pub v4: String,
    pub v5: String,
}

impl RuleRecord {
    /// Build a record from a rule type and its fields. Fields past the sixth are dropped.
    pub fn encode<S: AsRef<str>>(ptype: &str, fields: &[S]) -> Self {
        let mut record = RuleRecord {
            ptype: ptype.to_string(),
            ..Default::default()
        };
        for (slot, value) in RuleField::SLOTS.iter().zip(fields) {
            *record.field_mut(*slot) = value.as_ref().to_string();
        }
        record
    }

    pub fn field(&self, field: RuleField) -> &str {
        match field {
            RuleField::PType => &self.ptype,
            RuleField::V0 => &self.v0,
            RuleField::V1 => &self.v1,
            RuleField::V2 => &self.v2,
            RuleField::V3 => &self.v3,
            RuleField::V4 => &self.v4,
            RuleField::V5 => &self.v5,
        }
    }

    fn field_mut(&mut self, field: RuleField) -> &mut String {
        match field {
            RuleField::PType => &mut self.ptype,
            RuleField::V0 => &mut self.v0,
            RuleField::V1 => &mut self.v1,
            RuleField::V2 => &mut self.v2,
            RuleField::V3 => &mut self.v3,
            RuleField::V4 => &mut self.v4,
            RuleField::V5 => &mut self.v5,
        }
    }

    /// Canonical content identity, used as the storage key name.
    ///
    /// Joins the trimmed type tag and slots with `,`, stopping at the first
    /// value that is empty after trimming. Slots behind an empty one never
    /// contribute, so `["a", "", "c"]` and `["a"]` share an identity.
    pub fn identity(&self) -> String {
        let mut tokens: Vec<&str> = Vec::with_capacity(SLOT_COUNT + 1);
        let ordered = std::iter::once(RuleField::PType).chain(RuleField::SLOTS);
        for field in ordered {
            let value = self.field(field).trim();
            if value.is_empty() {
                break;
            }
            tokens.push(value);
        }
        tokens.join(",")
    }

    /// Split the record back into its rule type and fields.
    ///
    /// Fields are read untrimmed until the first literally empty slot. A
    /// whitespace-only slot ends [`Self::identity`] but not the decoded
    /// fields, so `["a", "  ", "c"]` decodes in full while its identity is `p,a`.
    pub fn decode(&self) -> (String, Vec<String>) {
        let fields = RuleField::SLOTS
            .iter()
            .map(|slot| self.field(*slot))
            .take_while(|value| !value.is_empty())
            .map(str::to_string)
            .collect();
        (self.ptype.clone(), fields)
    }

    /// Section the rule belongs to: the first character of its type tag.
    pub fn section(&self) -> Option<String> {
        self.ptype.chars().next().map(String::from)
    }
}
