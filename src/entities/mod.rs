pub mod rule_record;

pub use rule_record::Entity as RuleRecord;
