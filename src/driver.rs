//! The driver-side contract this crate instruments
//!
//! A Cassandra driver exposes three observer slots on its cluster
//! configuration (connect, query, batch) and calls them from its own worker
//! threads as connections are opened and statements complete. The types in
//! this module describe that contract; a driver integration implements
//! [`ClusterConfig`] and [`Session`] and fills in the observed events.

use opentelemetry::Context;
use std::error::Error;
use std::fmt;
use std::future::Future;
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::error::{InstrumentationError, InstrumentationResult};

/// An error reported by the driver for an observed operation
pub type DriverError = Arc<dyn Error + Send + Sync + 'static>;

/// Liveness of a Cassandra node as last seen by the driver
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum HostState {
    Up,
    Down,
    #[default]
    Unknown,
}

impl HostState {
    /// Canonical upper-case name used in span attributes
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            HostState::Up => "UP",
            HostState::Down => "DOWN",
            HostState::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for HostState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HostState {
    type Err = InstrumentationError;

    fn from_str(s: &str) -> InstrumentationResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "up" => Ok(HostState::Up),
            "down" => Ok(HostState::Down),
            "unknown" => Ok(HostState::Unknown),
            _ => Err(InstrumentationError::UnknownHostState(s.to_string())),
        }
    }
}

/// Identification of the physical node involved in an event
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HostInfo {
    /// Address the driver connects to
    pub address: Option<IpAddr>,
    /// Native protocol port, `0` when unknown
    pub port: u16,
    /// Cassandra release version reported by the node, e.g. `3.11.4`
    pub release_version: Option<String>,
    pub state: HostState,
}

impl HostInfo {
    #[must_use]
    pub fn new(address: IpAddr, port: u16) -> Self {
        Self {
            address: Some(address),
            port,
            release_version: None,
            state: HostState::Unknown,
        }
    }

    #[must_use]
    pub fn with_release_version(mut self, version: impl Into<String>) -> Self {
        self.release_version = Some(version.into());
        self
    }

    #[must_use]
    pub fn with_state(mut self, state: HostState) -> Self {
        self.state = state;
        self
    }
}

fn elapsed(start: SystemTime, end: SystemTime) -> Duration {
    end.duration_since(start).unwrap_or_default()
}

/// A connection attempt to a single host
#[derive(Clone, Debug)]
pub struct ObservedConnect {
    pub host: Option<HostInfo>,
    pub start: SystemTime,
    pub end: SystemTime,
    pub error: Option<DriverError>,
}

impl ObservedConnect {
    #[must_use]
    pub fn latency(&self) -> Duration {
        elapsed(self.start, self.end)
    }
}

/// A single statement execution, reported once per attempt
#[derive(Clone, Debug)]
pub struct ObservedQuery {
    pub keyspace: String,
    pub statement: String,
    /// Context the caller executed the statement under
    pub context: Context,
    pub host: Option<HostInfo>,
    pub start: SystemTime,
    pub end: SystemTime,
    pub rows: u64,
    pub attempt: u32,
    pub error: Option<DriverError>,
}

impl ObservedQuery {
    #[must_use]
    pub fn latency(&self) -> Duration {
        elapsed(self.start, self.end)
    }
}

/// A batch execution; one event covers every statement in the batch
#[derive(Clone, Debug)]
pub struct ObservedBatch {
    pub keyspace: String,
    /// Statement texts in submission order
    pub statements: Vec<String>,
    pub context: Context,
    pub host: Option<HostInfo>,
    pub start: SystemTime,
    pub end: SystemTime,
    pub attempt: u32,
    pub error: Option<DriverError>,
}

impl ObservedBatch {
    #[must_use]
    pub fn latency(&self) -> Duration {
        elapsed(self.start, self.end)
    }
}

/// Called by the driver after every connection attempt
pub trait ConnectObserver: Send + Sync {
    fn observe_connect(&self, observed: &ObservedConnect);

    /// `true` only for the tracing adapters of this crate
    fn is_tracing_adapter(&self) -> bool {
        false
    }
}

/// Called by the driver after every statement execution
pub trait QueryObserver: Send + Sync {
    fn observe_query(&self, observed: &ObservedQuery);

    /// `true` only for the tracing adapters of this crate
    fn is_tracing_adapter(&self) -> bool {
        false
    }
}

/// Called by the driver after every batch execution
pub trait BatchObserver: Send + Sync {
    fn observe_batch(&self, observed: &ObservedBatch);

    /// `true` only for the tracing adapters of this crate
    fn is_tracing_adapter(&self) -> bool {
        false
    }
}

/// A statement with its positional bind values
#[derive(Clone, Debug, PartialEq)]
pub struct Statement<V> {
    text: String,
    values: Vec<V>,
}

impl<V> Statement<V> {
    /// Statement text with its positional bind values
    #[must_use]
    pub fn new(text: impl Into<String>, values: Vec<V>) -> Self {
        Self {
            text: text.into(),
            values,
        }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn values(&self) -> &[V] {
        &self.values
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BatchKind {
    #[default]
    Logged,
    Unlogged,
    Counter,
}

/// An ordered group of statements executed as one request
#[derive(Clone, Debug, PartialEq)]
pub struct Batch<V> {
    kind: BatchKind,
    entries: Vec<Statement<V>>,
}

impl<V> Batch<V> {
    #[must_use]
    pub fn new(kind: BatchKind) -> Self {
        Self {
            kind,
            entries: Vec::new(),
        }
    }

    /// Append a statement to the batch
    pub fn query(&mut self, text: impl Into<String>, values: Vec<V>) -> &mut Self {
        self.entries.push(Statement::new(text, values));
        self
    }

    #[must_use]
    pub fn kind(&self) -> BatchKind {
        self.kind
    }

    #[must_use]
    pub fn entries(&self) -> &[Statement<V>] {
        &self.entries
    }

    /// Statement texts in submission order
    #[must_use]
    pub fn statements(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(Statement::text)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Driver cluster configuration with one observer slot per event kind
pub trait ClusterConfig: Send + Sync {
    type Session: Session;
    type Error: Error + Send + Sync + 'static;

    fn connect_observer(&self) -> Option<Arc<dyn ConnectObserver>>;
    fn set_connect_observer(&mut self, observer: Arc<dyn ConnectObserver>);

    fn query_observer(&self) -> Option<Arc<dyn QueryObserver>>;
    fn set_query_observer(&mut self, observer: Arc<dyn QueryObserver>);

    fn batch_observer(&self) -> Option<Arc<dyn BatchObserver>>;
    fn set_batch_observer(&mut self, observer: Arc<dyn BatchObserver>);

    /// Open connections and return a session bound to this configuration
    fn create_session(&self) -> impl Future<Output = Result<Self::Session, Self::Error>> + Send;
}

/// A driver session. Every operation receives the caller's context so the
/// driver can hand it back in the observed event.
pub trait Session: Send + Sync {
    type Value: Send + Sync;
    type Rows: Send;
    type Error: Error + Send + Sync + 'static;

    fn execute(
        &self,
        statement: &Statement<Self::Value>,
        cx: &Context,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn iter(
        &self,
        statement: &Statement<Self::Value>,
        cx: &Context,
    ) -> impl Future<Output = Result<Self::Rows, Self::Error>> + Send;

    fn execute_batch(
        &self,
        batch: &Batch<Self::Value>,
        cx: &Context,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn close(&self);
}
