//! Builder for configuring Cassandra instrumentation
//!
//! Configuration is an ordered sequence of [`TracingOption`]s applied to the
//! defaults. Later options replace earlier ones for the tracer, the meter and
//! the category toggles; observer options accumulate in registration order.

use crate::driver::{BatchObserver, ConnectObserver, QueryObserver};
use crate::metrics::CassandraMetrics;
use crate::telemetry::{Instrumentation, Parts};
use opentelemetry::global::BoxedTracer;
use opentelemetry::metrics::Meter;
use std::fmt;
use std::sync::Arc;

/// A single configuration effect
pub enum TracingOption {
    /// Use this tracer instead of the global one
    Tracer(BoxedTracer),
    /// Record metrics on this meter
    Meter(Meter),
    /// Also forward connect events to this observer
    ConnectObserver(Arc<dyn ConnectObserver>),
    /// Also forward query events to this observer
    QueryObserver(Arc<dyn QueryObserver>),
    /// Also forward batch events to this observer
    BatchObserver(Arc<dyn BatchObserver>),
    /// Toggle spans and metrics for connection attempts
    ConnectInstrumentation(bool),
    /// Toggle spans and metrics for queries
    QueryInstrumentation(bool),
    /// Toggle spans and metrics for batches
    BatchInstrumentation(bool),
}

impl fmt::Debug for TracingOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TracingOption::Tracer(_) => f.write_str("Tracer"),
            TracingOption::Meter(_) => f.write_str("Meter"),
            TracingOption::ConnectObserver(_) => f.write_str("ConnectObserver"),
            TracingOption::QueryObserver(_) => f.write_str("QueryObserver"),
            TracingOption::BatchObserver(_) => f.write_str("BatchObserver"),
            TracingOption::ConnectInstrumentation(enabled) => {
                f.debug_tuple("ConnectInstrumentation").field(enabled).finish()
            }
            TracingOption::QueryInstrumentation(enabled) => {
                f.debug_tuple("QueryInstrumentation").field(enabled).finish()
            }
            TracingOption::BatchInstrumentation(enabled) => {
                f.debug_tuple("BatchInstrumentation").field(enabled).finish()
            }
        }
    }
}

/// Builder for an [`Instrumentation`]
///
/// Defaults: the global tracer named after this crate, no metrics, every
/// category enabled and no extra observers.
///
/// # Example
///
/// ```rust,ignore
/// let instrumentation = Instrumentation::builder()
///     .with_tracer(my_tracer)                   // Optional - global tracer otherwise
///     .with_meter(my_meter)                     // Optional - only if you want metrics
///     .with_connect_instrumentation(false)
///     .build();
/// ```
pub struct InstrumentationBuilder {
    tracer: Option<BoxedTracer>,
    meter: Option<Meter>,
    connect_observers: Vec<Arc<dyn ConnectObserver>>,
    query_observers: Vec<Arc<dyn QueryObserver>>,
    batch_observers: Vec<Arc<dyn BatchObserver>>,
    instrument_connect: bool,
    instrument_query: bool,
    instrument_batch: bool,
}

impl InstrumentationBuilder {
    /// Create a new builder holding the defaults
    #[must_use]
    pub fn new() -> Self {
        Self {
            tracer: None,
            meter: None,
            connect_observers: Vec::new(),
            query_observers: Vec::new(),
            batch_observers: Vec::new(),
            instrument_connect: true,
            instrument_query: true,
            instrument_batch: true,
        }
    }

    /// Apply a sequence of options, in order, to the defaults
    #[must_use]
    pub fn from_options(options: impl IntoIterator<Item = TracingOption>) -> Self {
        options.into_iter().fold(Self::new(), Self::apply)
    }

    /// Apply one option
    #[must_use]
    pub fn apply(mut self, option: TracingOption) -> Self {
        match option {
            TracingOption::Tracer(tracer) => self.tracer = Some(tracer),
            TracingOption::Meter(meter) => self.meter = Some(meter),
            TracingOption::ConnectObserver(observer) => self.connect_observers.push(observer),
            TracingOption::QueryObserver(observer) => self.query_observers.push(observer),
            TracingOption::BatchObserver(observer) => self.batch_observers.push(observer),
            TracingOption::ConnectInstrumentation(enabled) => self.instrument_connect = enabled,
            TracingOption::QueryInstrumentation(enabled) => self.instrument_query = enabled,
            TracingOption::BatchInstrumentation(enabled) => self.instrument_batch = enabled,
        }
        self
    }

    /// Use `tracer` for every span
    #[must_use]
    pub fn with_tracer(self, tracer: BoxedTracer) -> Self {
        self.apply(TracingOption::Tracer(tracer))
    }

    /// Record metrics on `meter`
    #[must_use]
    pub fn with_meter(self, meter: Meter) -> Self {
        self.apply(TracingOption::Meter(meter))
    }

    #[must_use]
    pub fn with_connect_observer(self, observer: Arc<dyn ConnectObserver>) -> Self {
        self.apply(TracingOption::ConnectObserver(observer))
    }

    #[must_use]
    pub fn with_query_observer(self, observer: Arc<dyn QueryObserver>) -> Self {
        self.apply(TracingOption::QueryObserver(observer))
    }

    #[must_use]
    pub fn with_batch_observer(self, observer: Arc<dyn BatchObserver>) -> Self {
        self.apply(TracingOption::BatchObserver(observer))
    }

    #[must_use]
    pub fn with_connect_instrumentation(self, enabled: bool) -> Self {
        self.apply(TracingOption::ConnectInstrumentation(enabled))
    }

    #[must_use]
    pub fn with_query_instrumentation(self, enabled: bool) -> Self {
        self.apply(TracingOption::QueryInstrumentation(enabled))
    }

    #[must_use]
    pub fn with_batch_instrumentation(self, enabled: bool) -> Self {
        self.apply(TracingOption::BatchInstrumentation(enabled))
    }

    /// Freeze the configuration
    #[must_use]
    pub fn build(self) -> Instrumentation {
        Instrumentation::from_parts(Parts {
            tracer: self.tracer,
            metrics: self.meter.as_ref().map(CassandraMetrics::new),
            connect_observers: self.connect_observers,
            query_observers: self.query_observers,
            batch_observers: self.batch_observers,
            instrument_connect: self.instrument_connect,
            instrument_query: self.instrument_query,
            instrument_batch: self.instrument_batch,
        })
    }
}

impl Default for InstrumentationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FromIterator<TracingOption> for InstrumentationBuilder {
    fn from_iter<I: IntoIterator<Item = TracingOption>>(iter: I) -> Self {
        Self::from_options(iter)
    }
}
