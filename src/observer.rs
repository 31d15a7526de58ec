//! Observer adapters turning driver events into spans and metrics
//!
//! Each adapter implements one driver observer trait. On every event it
//! starts a span under the right parent, fills in attributes, records
//! metrics, ends the span at the event's end time and finally forwards the
//! untouched event to the extra observers registered for that kind.
//!
//! Telemetry never fails a database operation: span and metric work runs
//! behind a panic guard and a failure there only costs the telemetry for
//! that one event.

use crate::attributes::{batch_attributes, connect_attributes, query_attributes, Operation};
use crate::driver::{
    BatchObserver, ConnectObserver, DriverError, ObservedBatch, ObservedConnect, ObservedQuery,
    QueryObserver,
};
use crate::error::{InstrumentationError, InstrumentationResult};
use crate::metrics::CassandraMetrics;
use crate::telemetry::Instrumentation;
use opentelemetry::global::BoxedSpan;
use opentelemetry::trace::{Span, SpanKind, Status, Tracer};
use opentelemetry::{Context, KeyValue};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, warn};

fn catch_telemetry<T>(operation: Operation, f: impl FnOnce() -> T) -> InstrumentationResult<T> {
    panic::catch_unwind(AssertUnwindSafe(f))
        .map_err(|payload| InstrumentationError::telemetry_panic(operation, payload.as_ref()))
}

/// Run telemetry code, turning a panic into a logged, dropped error
fn guarded<T>(operation: Operation, f: impl FnOnce() -> T) -> Option<T> {
    match catch_telemetry(operation, f) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(error = %err, "dropping telemetry for cassandra event");
            None
        }
    }
}

/// Span and metric work shared by the three adapters.
///
/// Span start, attribute population, metric recording, error recording and
/// span end are guarded separately: a failure in one leaves the others
/// running, and the span always ends at the event's end time.
fn record_event(
    instrumentation: &Instrumentation,
    operation: Operation,
    parent: &Context,
    attributes: impl FnOnce() -> Vec<KeyValue>,
    (start, end): (SystemTime, SystemTime),
    error: Option<&DriverError>,
    record_metrics: impl FnOnce(&CassandraMetrics),
) {
    let mut span: Option<BoxedSpan> = guarded(operation, || {
        let tracer = instrumentation.tracer();
        tracer
            .span_builder(operation.span_name())
            .with_kind(SpanKind::Client)
            .with_start_time(start)
            .start_with_context(tracer, parent)
    });

    if let Some(span) = span.as_mut() {
        guarded(operation, || span.set_attributes(attributes()));
    }

    if let Some(metrics) = instrumentation.metrics() {
        guarded(operation, || record_metrics(metrics));
    }

    if let Some(mut span) = span {
        if let Some(err) = error {
            guarded(operation, || span.set_status(Status::error(err.to_string())));
            guarded(operation, || span.record_error(&**err));
        }
        guarded(operation, move || span.end_with_timestamp(end));
    }
}

/// Traces connection attempts
///
/// Connect spans are always roots: a physical connection can serve many
/// logical queries, so it is never nested under whichever query happened
/// to trigger it.
pub struct ConnectTracer {
    instrumentation: Instrumentation,
    observers: Vec<Arc<dyn ConnectObserver>>,
}

impl ConnectTracer {
    pub(crate) fn new(instrumentation: Instrumentation) -> Self {
        Self::wrapping(instrumentation, None)
    }

    /// Forward to `previous` first, then to the registered observers
    pub(crate) fn wrapping(
        instrumentation: Instrumentation,
        previous: Option<Arc<dyn ConnectObserver>>,
    ) -> Self {
        let mut observers: Vec<_> = previous.into_iter().collect();
        observers.extend(instrumentation.connect_observers().iter().cloned());
        Self {
            instrumentation,
            observers,
        }
    }

    /// Also forward events to `observer`, after those already attached
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn ConnectObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Observers events are forwarded to, in call order
    #[must_use]
    pub fn observers(&self) -> &[Arc<dyn ConnectObserver>] {
        &self.observers
    }
}

impl ConnectObserver for ConnectTracer {
    fn is_tracing_adapter(&self) -> bool {
        true
    }

    fn observe_connect(&self, observed: &ObservedConnect) {
        debug!(
            host = ?observed.host.as_ref().and_then(|h| h.address),
            failed = observed.error.is_some(),
            "observed cassandra connect"
        );

        if self.instrumentation.is_enabled(Operation::Connect) {
            record_event(
                &self.instrumentation,
                Operation::Connect,
                &Context::new(),
                || connect_attributes(observed),
                (observed.start, observed.end),
                observed.error.as_ref(),
                |metrics| metrics.record_connect(observed),
            );
        }

        for observer in &self.observers {
            observer.observe_connect(observed);
        }
    }
}

/// Traces single statement executions as children of the caller's context
pub struct QueryTracer {
    instrumentation: Instrumentation,
    observers: Vec<Arc<dyn QueryObserver>>,
}

impl QueryTracer {
    pub(crate) fn new(instrumentation: Instrumentation) -> Self {
        Self::wrapping(instrumentation, None)
    }

    /// Forward to `previous` first, then to the registered observers
    pub(crate) fn wrapping(
        instrumentation: Instrumentation,
        previous: Option<Arc<dyn QueryObserver>>,
    ) -> Self {
        let mut observers: Vec<_> = previous.into_iter().collect();
        observers.extend(instrumentation.query_observers().iter().cloned());
        Self {
            instrumentation,
            observers,
        }
    }

    /// Also forward events to `observer`, after those already attached
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn QueryObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Observers events are forwarded to, in call order
    #[must_use]
    pub fn observers(&self) -> &[Arc<dyn QueryObserver>] {
        &self.observers
    }
}

impl QueryObserver for QueryTracer {
    fn is_tracing_adapter(&self) -> bool {
        true
    }

    fn observe_query(&self, observed: &ObservedQuery) {
        debug!(
            keyspace = %observed.keyspace,
            attempt = observed.attempt,
            rows = observed.rows,
            failed = observed.error.is_some(),
            "observed cassandra query"
        );

        if self.instrumentation.is_enabled(Operation::Query) {
            record_event(
                &self.instrumentation,
                Operation::Query,
                &observed.context,
                || query_attributes(observed),
                (observed.start, observed.end),
                observed.error.as_ref(),
                |metrics| metrics.record_query(observed),
            );
        }

        for observer in &self.observers {
            observer.observe_query(observed);
        }
    }
}

/// Traces batch executions, one span per batch
pub struct BatchTracer {
    instrumentation: Instrumentation,
    observers: Vec<Arc<dyn BatchObserver>>,
}

impl BatchTracer {
    pub(crate) fn new(instrumentation: Instrumentation) -> Self {
        Self::wrapping(instrumentation, None)
    }

    /// Forward to `previous` first, then to the registered observers
    pub(crate) fn wrapping(
        instrumentation: Instrumentation,
        previous: Option<Arc<dyn BatchObserver>>,
    ) -> Self {
        let mut observers: Vec<_> = previous.into_iter().collect();
        observers.extend(instrumentation.batch_observers().iter().cloned());
        Self {
            instrumentation,
            observers,
        }
    }

    /// Also forward events to `observer`, after those already attached
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn BatchObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Observers events are forwarded to, in call order
    #[must_use]
    pub fn observers(&self) -> &[Arc<dyn BatchObserver>] {
        &self.observers
    }
}

impl BatchObserver for BatchTracer {
    fn is_tracing_adapter(&self) -> bool {
        true
    }

    fn observe_batch(&self, observed: &ObservedBatch) {
        debug!(
            keyspace = %observed.keyspace,
            statements = observed.statements.len(),
            failed = observed.error.is_some(),
            "observed cassandra batch"
        );

        if self.instrumentation.is_enabled(Operation::Batch) {
            record_event(
                &self.instrumentation,
                Operation::Batch,
                &observed.context,
                || batch_attributes(observed),
                (observed.start, observed.end),
                observed.error.as_ref(),
                |metrics| metrics.record_batch(observed),
            );
        }

        for observer in &self.observers {
            observer.observe_batch(observed);
        }
    }
}
