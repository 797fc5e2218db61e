use casbin_datastore::model::Model;

pub const RBAC_MODEL: &str = r#"
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

pub const RBAC_POLICY: &str = "\
p, alice, data1, read
p, bob, data2, write
p, data2_admin, data2, read
p, data2_admin, data2, write
g, alice, data2_admin
";

pub const TENANT_SERVICE_MODEL: &str = r#"
[request_definition]
r = dom, sub, obj, act, service

[policy_definition]
p = dom, sub, obj, act, eft, service

[role_definition]
g = _, _, _

[policy_effect]
e = some(where (p.eft == allow)) && !some(where (p.eft == deny))

[matchers]
m = g(r.sub, p.sub, r.dom) && r.dom == p.dom && r.obj == p.obj && r.act == p.act && r.service == p.service
"#;

/// Builder for in-memory models used as save/load fixtures
pub struct ModelBuilder {
    conf: &'static str,
    policy: String,
}

impl ModelBuilder {
    pub fn new(conf: &'static str) -> Self {
        Self {
            conf,
            policy: String::new(),
        }
    }

    /// The RBAC model with its sample policy.
    pub fn rbac() -> Self {
        Self::new(RBAC_MODEL).with_policy(RBAC_POLICY)
    }

    pub fn with_policy(mut self, csv: &str) -> Self {
        self.policy.push_str(csv);
        self
    }

    pub fn build(self) -> Model {
        let mut model = Model::from_conf_str(self.conf).expect("Failed to parse model");
        model
            .load_policy_text(&self.policy)
            .expect("Failed to parse policy");
        model
    }

    /// The model definition alone, no rules.
    pub fn empty(self) -> Model {
        Model::from_conf_str(self.conf).expect("Failed to parse model")
    }
}

/// Owned rules from string literals, sorted for order-free comparison.
pub fn rules(rows: &[&[&str]]) -> Vec<Vec<String>> {
    let mut out: Vec<Vec<String>> = rows
        .iter()
        .map(|row| row.iter().map(|f| f.to_string()).collect())
        .collect();
    out.sort();
    out
}
