//! In-memory policy model: section -> rule type -> assertion.
//!
//! Mirrors the shape a Casbin-style engine hands to its persistence adapter.
//! Only the parts persistence needs are here; nothing evaluates policies.

use std::collections::BTreeMap;

use crate::errors::AdapterError;

/// Model `.conf` section headers and the section keys they map to.
const SECTION_NAMES: [(&str, &str); 5] = [
    ("request_definition", "r"),
    ("policy_definition", "p"),
    ("role_definition", "g"),
    ("policy_effect", "e"),
    ("matchers", "m"),
];

/// Sections every model definition must declare.
const REQUIRED_SECTIONS: [&str; 4] = ["r", "p", "e", "m"];

/// All rules sharing one rule type under one section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assertion {
    pub key: String,
    /// Definition text from the model file, e.g. `sub, obj, act`.
    pub value: String,
    pub policy: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Model {
    sections: BTreeMap<String, BTreeMap<String, Assertion>>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a model definition (`[request_definition]`, `[policy_definition]`, ...).
    pub fn from_conf_str(text: &str) -> Result<Self, AdapterError> {
        let mut model = Model::new();
        let mut section: Option<&'static str> = None;
        let mut unknown_section = false;
        let mut pending = String::new();

        for (number, raw) in text.lines().enumerate() {
            let line = raw.trim();
            let is_comment = line.starts_with('#') || line.starts_with(';');
            if pending.is_empty() && (line.is_empty() || is_comment) {
                continue;
            }

            if let Some(continued) = line.strip_suffix('\\') {
                pending.push_str(continued.trim_end());
                pending.push(' ');
                continue;
            }
            let line = if pending.is_empty() {
                line.to_string()
            } else {
                let joined = format!("{pending}{line}");
                pending.clear();
                joined
            };

            if let Some(header) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                let header = header.trim();
                section = SECTION_NAMES
                    .iter()
                    .find(|(name, _)| *name == header)
                    .map(|(_, key)| *key);
                unknown_section = section.is_none();
                if unknown_section {
                    tracing::warn!("ignoring unknown model section `{header}`");
                }
                continue;
            }

            if unknown_section {
                continue;
            }
            let Some(sec) = section else {
                return Err(AdapterError::InvalidModel(format!(
                    "line {}: `{}` appears before any section header",
                    number + 1,
                    line
                )));
            };
            let Some((key, value)) = line.split_once('=') else {
                return Err(AdapterError::InvalidModel(format!(
                    "line {}: expected `key = value`, found `{}`",
                    number + 1,
                    line
                )));
            };
            let key = key.trim();
            if key.is_empty() {
                return Err(AdapterError::InvalidModel(format!(
                    "line {}: missing key before `=`",
                    number + 1
                )));
            }
            model.add_def(sec, key, value.trim());
        }

        let missing: Vec<&str> = REQUIRED_SECTIONS
            .iter()
            .copied()
            .filter(|sec| model.get(sec).map_or(true, BTreeMap::is_empty))
            .collect();
        if !missing.is_empty() {
            return Err(AdapterError::InvalidModel(format!(
                "missing section(s): {}",
                missing.join(", ")
            )));
        }

        Ok(model)
    }

    /// Render the definitions back into `.conf` text.
    pub fn to_conf_string(&self) -> String {
        let mut out = String::new();
        for (name, sec) in SECTION_NAMES {
            let Some(assertions) = self.get(sec) else {
                continue;
            };
            if assertions.is_empty() {
                continue;
            }
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&format!("[{name}]\n"));
            for assertion in assertions.values() {
                out.push_str(&format!("{} = {}\n", assertion.key, assertion.value));
            }
        }
        out
    }

    /// Add or replace the definition of `key` in `sec`, keeping any rules.
    pub fn add_def(&mut self, sec: &str, key: &str, value: &str) {
        let assertion = self.assertion_mut(sec, key);
        assertion.value = value.to_string();
    }

    pub fn get(&self, sec: &str) -> Option<&BTreeMap<String, Assertion>> {
        self.sections.get(sec)
    }

    pub fn sections(&self) -> impl Iterator<Item = (&String, &BTreeMap<String, Assertion>)> {
        self.sections.iter()
    }

    /// The assertion for `ptype` in `sec`, created empty if absent.
    pub fn assertion_mut(&mut self, sec: &str, ptype: &str) -> &mut Assertion {
        self.sections
            .entry(sec.to_string())
            .or_default()
            .entry(ptype.to_string())
            .or_insert_with(|| Assertion {
                key: ptype.to_string(),
                ..Default::default()
            })
    }

    pub fn add_policy(&mut self, sec: &str, ptype: &str, rule: Vec<String>) {
        self.assertion_mut(sec, ptype).policy.push(rule);
    }

    pub fn get_policy(&self, sec: &str, ptype: &str) -> &[Vec<String>] {
        self.sections
            .get(sec)
            .and_then(|assertions| assertions.get(ptype))
            .map(|assertion| assertion.policy.as_slice())
            .unwrap_or(&[])
    }

    /// Drop every rule from the `p` and `g` sections, keeping definitions.
    pub fn clear_policy(&mut self) {
        for sec in ["p", "g"] {
            if let Some(assertions) = self.sections.get_mut(sec) {
                for assertion in assertions.values_mut() {
                    assertion.policy.clear();
                }
            }
        }
    }

    pub fn rule_count(&self) -> usize {
        self.sections
            .values()
            .flat_map(BTreeMap::values)
            .map(|assertion| assertion.policy.len())
            .sum()
    }

    /// Append rules from CSV policy text (`p, alice, data1, read`).
    ///
    /// Blank lines and `#` comments are skipped. Returns the number of rules added.
    pub fn load_policy_text(&mut self, text: &str) -> Result<usize, AdapterError> {
        let mut added = 0;
        for (number, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut tokens = line.split(',').map(str::trim);
            let ptype = tokens.next().unwrap_or_default();
            let rule: Vec<String> = tokens.map(str::to_string).collect();
            let Some(sec) = ptype.chars().next().map(String::from) else {
                return Err(AdapterError::InvalidPolicyLine {
                    line: number + 1,
                    reason: "missing rule type".to_string(),
                });
            };
            if rule.is_empty() {
                return Err(AdapterError::InvalidPolicyLine {
                    line: number + 1,
                    reason: format!("rule type `{ptype}` has no fields"),
                });
            }
            self.add_policy(&sec, ptype, rule);
            added += 1;
        }
        Ok(added)
    }

    /// Render the rules of the `p` and `g` sections as CSV policy text.
    pub fn to_policy_text(&self) -> String {
        let mut out = String::new();
        for sec in ["p", "g"] {
            let Some(assertions) = self.get(sec) else {
                continue;
            };
            for (ptype, assertion) in assertions {
                for rule in &assertion.policy {
                    out.push_str(ptype);
                    for field in rule {
                        out.push_str(", ");
                        out.push_str(field);
                    }
                    out.push('\n');
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RBAC_MODEL: &str = r#"
[request_definition]
r = sub, obj, act

[policy_definition]
p = sub, obj, act

[role_definition]
g = _, _

[policy_effect]
e = some(where (p.eft == allow))

[matchers]
m = g(r.sub, p.sub) && r.obj == p.obj && r.act == p.act
"#;

    #[test]
    fn test_parse_rbac_model() {
        let model = Model::from_conf_str(RBAC_MODEL).expect("valid model");
        assert_eq!(model.get("r").unwrap()["r"].value, "sub, obj, act");
        assert_eq!(model.get("g").unwrap()["g"].value, "_, _");
        assert_eq!(
            model.get("m").unwrap()["m"].value,
            "g(r.sub, p.sub) && r.obj == p.obj && r.act == p.act"
        );
        assert_eq!(model.rule_count(), 0);
    }

    #[test]
    fn test_line_continuation() {
        let text = RBAC_MODEL.replace(
            "m = g(r.sub, p.sub) && r.obj == p.obj && r.act == p.act",
            "m = g(r.sub, p.sub) && \\\n    r.obj == p.obj && r.act == p.act",
        );
        let model = Model::from_conf_str(&text).expect("valid model");
        assert_eq!(
            model.get("m").unwrap()["m"].value,
            "g(r.sub, p.sub) && r.obj == p.obj && r.act == p.act"
        );
    }

    #[test]
    fn test_policy_csv_is_not_a_model() {
        let err = Model::from_conf_str("p, alice, data1, read\n").unwrap_err();
        assert!(matches!(err, AdapterError::InvalidModel(_)));
    }

    #[test]
    fn test_missing_sections() {
        let err = Model::from_conf_str("[request_definition]\nr = sub, obj, act\n").unwrap_err();
        let AdapterError::InvalidModel(message) = err else {
            panic!("expected InvalidModel");
        };
        assert!(message.contains("p, e, m"));
    }

    #[test]
    fn test_conf_round_trip() {
        let model = Model::from_conf_str(RBAC_MODEL).unwrap();
        let again = Model::from_conf_str(&model.to_conf_string()).unwrap();
        assert_eq!(model, again);
    }

    #[test]
    fn test_load_policy_text() {
        let mut model = Model::new();
        let added = model
            .load_policy_text(
                "p, alice, data1, read\n\n# comment\np, bob, data2, write\ng, alice, data2_admin\n",
            )
            .expect("valid policy");
        assert_eq!(added, 3);
        assert_eq!(model.get_policy("p", "p").len(), 2);
        assert_eq!(
            model.get_policy("g", "g"),
            &[vec!["alice".to_string(), "data2_admin".to_string()]]
        );
        assert_eq!(
            model.to_policy_text(),
            "p, alice, data1, read\np, bob, data2, write\ng, alice, data2_admin\n"
        );
    }

    #[test]
    fn test_load_policy_text_rejects_bare_type() {
        let err = Model::new().load_policy_text("p\n").unwrap_err();
        assert!(matches!(err, AdapterError::InvalidPolicyLine { line: 1, .. }));
    }

    #[test]
    fn test_clear_policy_keeps_definitions() {
        let mut model = Model::from_conf_str(RBAC_MODEL).unwrap();
        model.add_policy("p", "p", vec!["alice".into(), "data1".into(), "read".into()]);
        model.clear_policy();
        assert_eq!(model.rule_count(), 0);
        assert_eq!(model.get("p").unwrap()["p"].value, "sub, obj, act");
    }

    #[test]
    fn test_get_policy_of_missing_type() {
        assert!(Model::new().get_policy("p", "p2").is_empty());
    }
}
