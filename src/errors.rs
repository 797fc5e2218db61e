use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;

/// Failures raised by a [`crate::datastore::Datastore`] implementation.
#[derive(Debug, Error, Diagnostic)]
pub enum DatastoreError {
    #[error("No entity matched the request")]
    #[diagnostic(code(casbin_datastore::store::not_found))]
    NotFound,

    #[error("Incomplete key `{0}`: a named key needs a non-empty name")]
    #[diagnostic(
        code(casbin_datastore::store::incomplete_key),
        help("Rule records are keyed by their identity; a rule type that is blank after trimming has no identity")
    )]
    IncompleteKey(String),

    #[error("Unsupported key `{0}`")]
    #[diagnostic(
        code(casbin_datastore::store::unsupported_key),
        help("The SQL backend stores at most one ancestor level, and the ancestor must be an id key")
    )]
    UnsupportedKey(String),

    #[error("Database error: {0}")]
    #[diagnostic(code(casbin_datastore::store::db))]
    Db(#[from] sea_orm::DbErr),
}

#[derive(Debug, Error, Diagnostic)]
pub enum AdapterError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Datastore(#[from] DatastoreError),

    #[error("{operation} did not finish within {deadline:?}")]
    #[diagnostic(
        code(casbin_datastore::deadline_exceeded),
        help("Raise `long_operation_deadline_secs` or `short_operation_deadline_secs` in the adapter settings")
    )]
    DeadlineExceeded {
        operation: &'static str,
        deadline: Duration,
    },

    #[error("Invalid model definition: {0}")]
    #[diagnostic(
        code(casbin_datastore::invalid_model),
        help("A model needs [request_definition], [policy_definition], [policy_effect] and [matchers] sections")
    )]
    InvalidModel(String),

    #[error("No model definition stored under kind `{kind}` in namespace `{namespace}`")]
    #[diagnostic(code(casbin_datastore::model_not_found))]
    ModelNotFound { kind: String, namespace: String },

    #[error("Invalid policy line {line}: {reason}")]
    #[diagnostic(
        code(casbin_datastore::invalid_policy_line),
        help("Policy lines look like: p, alice, data1, read")
    )]
    InvalidPolicyLine { line: usize, reason: String },

    #[error("I/O error: {0}")]
    #[diagnostic(code(casbin_datastore::io))]
    Io(#[from] std::io::Error),
}

