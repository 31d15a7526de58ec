//! Immutable telemetry configuration shared by the observer adapters
//!
//! An [`Instrumentation`] is built once from an
//! [`InstrumentationBuilder`](crate::builder::InstrumentationBuilder) and never
//! changes afterwards, so the adapters read it from any driver thread without
//! locking.

use crate::attributes::Operation;
use crate::builder::InstrumentationBuilder;
use crate::driver::{BatchObserver, ConnectObserver, QueryObserver};
use crate::metrics::CassandraMetrics;
use crate::observer::{BatchTracer, ConnectTracer, QueryTracer};
use opentelemetry::global::{self, BoxedTracer};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Name the default tracer is registered under
pub const INSTRUMENTATION_NAME: &str = env!("CARGO_PKG_NAME");

/// Telemetry configuration for an instrumented Cassandra cluster
#[derive(Clone)]
pub struct Instrumentation {
    inner: Arc<Inner>,
}

struct Inner {
    tracer: OnceLock<BoxedTracer>,
    metrics: Option<CassandraMetrics>,
    connect_observers: Vec<Arc<dyn ConnectObserver>>,
    query_observers: Vec<Arc<dyn QueryObserver>>,
    batch_observers: Vec<Arc<dyn BatchObserver>>,
    instrument_connect: bool,
    instrument_query: bool,
    instrument_batch: bool,
}

/// Everything the builder collected, handed over in one piece
pub(crate) struct Parts {
    pub(crate) tracer: Option<BoxedTracer>,
    pub(crate) metrics: Option<CassandraMetrics>,
    pub(crate) connect_observers: Vec<Arc<dyn ConnectObserver>>,
    pub(crate) query_observers: Vec<Arc<dyn QueryObserver>>,
    pub(crate) batch_observers: Vec<Arc<dyn BatchObserver>>,
    pub(crate) instrument_connect: bool,
    pub(crate) instrument_query: bool,
    pub(crate) instrument_batch: bool,
}

impl Instrumentation {
    /// Start configuring instrumentation from the defaults
    #[must_use]
    pub fn builder() -> InstrumentationBuilder {
        InstrumentationBuilder::new()
    }

    pub(crate) fn from_parts(parts: Parts) -> Self {
        let tracer = match parts.tracer {
            Some(tracer) => OnceLock::from(tracer),
            None => OnceLock::new(),
        };

        Self {
            inner: Arc::new(Inner {
                tracer,
                metrics: parts.metrics,
                connect_observers: parts.connect_observers,
                query_observers: parts.query_observers,
                batch_observers: parts.batch_observers,
                instrument_connect: parts.instrument_connect,
                instrument_query: parts.instrument_query,
                instrument_batch: parts.instrument_batch,
            }),
        }
    }

    /// The configured tracer, or the global one resolved on first use
    #[must_use]
    pub fn tracer(&self) -> &BoxedTracer {
        self.inner
            .tracer
            .get_or_init(|| global::tracer(INSTRUMENTATION_NAME))
    }

    /// Metric instruments, present only when a meter was configured
    #[must_use]
    pub fn metrics(&self) -> Option<&CassandraMetrics> {
        self.inner.metrics.as_ref()
    }

    /// Whether spans and metrics are produced for this category
    #[must_use]
    pub fn is_enabled(&self, operation: Operation) -> bool {
        match operation {
            Operation::Connect => self.inner.instrument_connect,
            Operation::Query => self.inner.instrument_query,
            Operation::Batch => self.inner.instrument_batch,
        }
    }

    /// Whether an adapter has any work to do for this category
    pub(crate) fn needs_adapter(&self, operation: Operation) -> bool {
        self.is_enabled(operation)
            || match operation {
                Operation::Connect => !self.inner.connect_observers.is_empty(),
                Operation::Query => !self.inner.query_observers.is_empty(),
                Operation::Batch => !self.inner.batch_observers.is_empty(),
            }
    }

    /// Extra connect observers, in registration order
    #[must_use]
    pub fn connect_observers(&self) -> &[Arc<dyn ConnectObserver>] {
        &self.inner.connect_observers
    }

    /// Extra query observers, in registration order
    #[must_use]
    pub fn query_observers(&self) -> &[Arc<dyn QueryObserver>] {
        &self.inner.query_observers
    }

    /// Extra batch observers, in registration order
    #[must_use]
    pub fn batch_observers(&self) -> &[Arc<dyn BatchObserver>] {
        &self.inner.batch_observers
    }

    /// A standalone connect adapter for manual installation on a cluster
    #[must_use]
    pub fn connect_observer(&self) -> ConnectTracer {
        ConnectTracer::new(self.clone())
    }

    /// A standalone query adapter for manual installation on a cluster
    #[must_use]
    pub fn query_observer(&self) -> QueryTracer {
        QueryTracer::new(self.clone())
    }

    /// A standalone batch adapter for manual installation on a cluster
    #[must_use]
    pub fn batch_observer(&self) -> BatchTracer {
        BatchTracer::new(self.clone())
    }
}

impl Default for Instrumentation {
    fn default() -> Self {
        InstrumentationBuilder::new().build()
    }
}

impl fmt::Debug for Instrumentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instrumentation")
            .field("tracer_resolved", &self.inner.tracer.get().is_some())
            .field("metrics", &self.inner.metrics.is_some())
            .field("connect_observers", &self.inner.connect_observers.len())
            .field("query_observers", &self.inner.query_observers.len())
            .field("batch_observers", &self.inner.batch_observers.len())
            .field("instrument_connect", &self.inner.instrument_connect)
            .field("instrument_query", &self.inner.instrument_query)
            .field("instrument_batch", &self.inner.instrument_batch)
            .finish()
    }
}
