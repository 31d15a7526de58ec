//! OpenTelemetry metrics for observed Cassandra events
//!
//! Every observed connect, query and batch event updates a counter for its
//! kind, the shared latency histogram and, on failure, the error counter.

use crate::attributes::{HostAttributes, Operation, CASS_HOST_KEY, CASS_PORT_KEY};
use crate::driver::{DriverError, HostInfo, ObservedBatch, ObservedConnect, ObservedQuery};
use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::KeyValue;
use opentelemetry_semantic_conventions::attribute::DB_OPERATION_NAME;
use std::time::Duration;

/// Cassandra metrics collector
#[derive(Clone, Debug)]
pub struct CassandraMetrics {
    /// Number of queries observed
    queries_total: Counter<u64>,
    /// Rows returned per query
    rows: Histogram<u64>,
    /// Number of batches observed
    batches_total: Counter<u64>,
    /// Number of connection attempts observed
    connections_total: Counter<u64>,
    /// Number of observed events that carried an error
    errors_total: Counter<u64>,
    /// Event latency in milliseconds
    latency: Histogram<f64>,
}

impl CassandraMetrics {
    /// Create the instruments on the provided meter
    ///
    /// ```rust,ignore
    /// use opentelemetry::metrics::MeterProvider;
    /// use otel_instrumentation_cassandra::CassandraMetrics;
    ///
    /// let meter = meter_provider.meter("cassandra");
    /// let metrics = CassandraMetrics::new(&meter);
    /// ```
    #[must_use]
    pub fn new(meter: &Meter) -> Self {
        Self {
            queries_total: meter
                .u64_counter("db.cassandra.queries")
                .with_description("Number of queries executed")
                .build(),

            rows: meter
                .u64_histogram("db.cassandra.rows")
                .with_description("Number of rows returned by a query")
                .build(),

            batches_total: meter
                .u64_counter("db.cassandra.batch.queries")
                .with_description("Number of batch queries executed")
                .build(),

            connections_total: meter
                .u64_counter("db.cassandra.connections")
                .with_description("Number of connection attempts")
                .build(),

            errors_total: meter
                .u64_counter("db.cassandra.errors")
                .with_description("Number of connect, query and batch errors")
                .build(),

            latency: meter
                .f64_histogram("db.cassandra.latency")
                .with_description("Latency of connect, query and batch operations")
                .with_unit("ms")
                .build(),
        }
    }

    /// Record a connection attempt
    ///
    /// # Arguments
    ///
    /// * `observed` - The connect event; its error marks the attempt failed
    pub fn record_connect(&self, observed: &ObservedConnect) {
        let attributes = Self::attributes(
            Operation::Connect,
            observed.host.as_ref(),
            observed.error.as_ref(),
        );
        self.connections_total.add(1, &attributes);
        self.record_outcome(observed.latency(), observed.error.as_ref(), &attributes);
    }

    /// Record a statement execution and the number of rows it returned
    ///
    /// # Arguments
    ///
    /// * `observed` - The query event reported by the driver
    pub fn record_query(&self, observed: &ObservedQuery) {
        let attributes = Self::attributes(
            Operation::Query,
            observed.host.as_ref(),
            observed.error.as_ref(),
        );
        self.queries_total.add(1, &attributes);
        self.rows.record(observed.rows, &attributes);
        self.record_outcome(observed.latency(), observed.error.as_ref(), &attributes);
    }

    /// Record a batch execution
    ///
    /// # Arguments
    ///
    /// * `observed` - The batch event reported by the driver
    pub fn record_batch(&self, observed: &ObservedBatch) {
        let attributes = Self::attributes(
            Operation::Batch,
            observed.host.as_ref(),
            observed.error.as_ref(),
        );
        self.batches_total.add(1, &attributes);
        self.record_outcome(observed.latency(), observed.error.as_ref(), &attributes);
    }

    fn record_outcome(
        &self,
        latency: Duration,
        error: Option<&DriverError>,
        attributes: &[KeyValue],
    ) {
        self.latency.record(latency.as_secs_f64() * 1000.0, attributes);
        if error.is_some() {
            self.errors_total.add(1, attributes);
        }
    }

    fn attributes(
        operation: Operation,
        host: Option<&HostInfo>,
        error: Option<&DriverError>,
    ) -> Vec<KeyValue> {
        let host = HostAttributes::from_host(host);
        vec![
            KeyValue::new(DB_OPERATION_NAME, operation.span_name()),
            KeyValue::new(CASS_HOST_KEY, host.address),
            KeyValue::new(CASS_PORT_KEY, i64::from(host.port)),
            KeyValue::new("success", error.is_none()),
        ]
    }
}
