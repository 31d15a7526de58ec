//! Span names and attribute sets for observed driver events
//!
//! Attribute keys are an external contract: dashboards and alerts key on
//! them, so they are fixed strings and never derived from span names.

use crate::driver::{HostInfo, HostState, ObservedBatch, ObservedConnect, ObservedQuery};
use opentelemetry::{Array, Key, KeyValue, StringValue, Value};
use opentelemetry_semantic_conventions::attribute::{
    DB_NAMESPACE, DB_OPERATION_BATCH_SIZE, DB_SYSTEM_NAME,
};

/// Address of the node that served the event
pub const CASS_HOST_KEY: Key = Key::from_static_str("cassandra.host");
/// Native protocol port of the node
pub const CASS_PORT_KEY: Key = Key::from_static_str("cassandra.port");
/// Cassandra release version of the node
pub const CASS_VERSION_KEY: Key = Key::from_static_str("cassandra.version");
/// Node state: `UP`, `DOWN` or `UNKNOWN`
pub const CASS_HOST_STATE_KEY: Key = Key::from_static_str("cassandra.host.state");
/// Statement text, query spans only
pub const CASS_STATEMENT_KEY: Key = Key::from_static_str("cassandra.stmt");
/// Ordered statement texts, batch spans only
pub const CASS_BATCH_STATEMENTS_KEY: Key = Key::from_static_str("cassandra.batch.stmts");

const DB_SYSTEM: &str = "cassandra";

/// The three instrumentation categories
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Connect,
    Query,
    Batch,
}

impl Operation {
    /// Canonical span name for this event kind
    #[must_use]
    pub fn span_name(self) -> &'static str {
        match self {
            Operation::Connect => "connect",
            Operation::Query => "query",
            Operation::Batch => "batch-query",
        }
    }
}

/// Host attributes extracted from a driver host descriptor
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostAttributes {
    pub address: String,
    pub port: u16,
    pub version: String,
    pub state: HostState,
}

impl HostAttributes {
    /// Extract attributes from a host descriptor, filling gaps with empty
    /// values rather than failing.
    #[must_use]
    pub fn from_host(host: Option<&HostInfo>) -> Self {
        match host {
            Some(host) => Self {
                address: host.address.map(|a| a.to_string()).unwrap_or_default(),
                port: host.port,
                version: host.release_version.clone().unwrap_or_default(),
                state: host.state,
            },
            None => Self {
                address: String::new(),
                port: 0,
                version: String::new(),
                state: HostState::Unknown,
            },
        }
    }

    #[must_use]
    pub fn key_values(&self) -> Vec<KeyValue> {
        vec![
            KeyValue::new(CASS_HOST_KEY, self.address.clone()),
            KeyValue::new(CASS_PORT_KEY, i64::from(self.port)),
            KeyValue::new(CASS_VERSION_KEY, self.version.clone()),
            KeyValue::new(CASS_HOST_STATE_KEY, self.state.as_str()),
        ]
    }
}

fn common_attributes(host: Option<&HostInfo>, keyspace: Option<&str>) -> Vec<KeyValue> {
    let mut attributes = HostAttributes::from_host(host).key_values();
    attributes.push(KeyValue::new(DB_SYSTEM_NAME, DB_SYSTEM));
    if let Some(keyspace) = keyspace.filter(|k| !k.is_empty()) {
        attributes.push(KeyValue::new(DB_NAMESPACE, keyspace.to_string()));
    }
    attributes
}

/// Attributes of a `connect` span: host attributes and `db.system.name`
#[must_use]
pub fn connect_attributes(observed: &ObservedConnect) -> Vec<KeyValue> {
    common_attributes(observed.host.as_ref(), None)
}

/// Attributes of a `query` span
///
/// Host attributes, `db.system.name`, `db.namespace` when the keyspace is
/// known and the statement text under `cassandra.stmt`.
#[must_use]
pub fn query_attributes(observed: &ObservedQuery) -> Vec<KeyValue> {
    let mut attributes = common_attributes(observed.host.as_ref(), Some(&observed.keyspace));
    attributes.push(KeyValue::new(CASS_STATEMENT_KEY, observed.statement.clone()));
    attributes
}

/// Attributes of a `batch-query` span
///
/// Like [`query_attributes`], with the batch size and every statement text
/// under `cassandra.batch.stmts` in batch order.
#[must_use]
pub fn batch_attributes(observed: &ObservedBatch) -> Vec<KeyValue> {
    let mut attributes = common_attributes(observed.host.as_ref(), Some(&observed.keyspace));
    let statements: Vec<StringValue> = observed
        .statements
        .iter()
        .map(|s| StringValue::from(s.clone()))
        .collect();
    attributes.push(KeyValue::new(
        DB_OPERATION_BATCH_SIZE,
        i64::try_from(statements.len()).unwrap_or(i64::MAX),
    ));
    attributes.push(KeyValue::new(
        CASS_BATCH_STATEMENTS_KEY,
        Value::Array(Array::String(statements)),
    ));
    attributes
}
