//! In-process stand-in for a Cassandra driver plus span capture helpers.
//!
//! `MockCluster` behaves like a driver cluster configuration: session
//! creation opens `num_conns` connections per host on worker threads and
//! reports each one to the connect observer; queries and batches report to
//! their observers with the caller's context.

#![allow(dead_code)]

use opentelemetry::global::{self, BoxedTracer};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{Context, Key, Value};
use opentelemetry_sdk::trace::{
    InMemorySpanExporter, InMemorySpanExporterBuilder, Sampler, SdkTracerProvider, SpanData,
};
use opentelemetry_sdk::Resource;
use otel_instrumentation_cassandra::driver::{
    Batch, BatchObserver, ClusterConfig, ConnectObserver, DriverError, HostInfo, HostState,
    ObservedBatch, ObservedConnect, ObservedQuery, QueryObserver, Session, Statement,
};
use std::fmt;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

pub const KEYSPACE: &str = "gotest";
pub const TABLE_NAME: &str = "test_table";
pub const RELEASE_VERSION: &str = "3.11.4";

pub struct TestHarness {
    provider: SdkTracerProvider,
    exporter: InMemorySpanExporter,
}

impl TestHarness {
    pub fn new() -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let exporter = InMemorySpanExporterBuilder::new().build();
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .with_sampler(Sampler::AlwaysOn)
            .with_resource(Resource::builder_empty().build())
            .build();

        Self { provider, exporter }
    }

    pub fn tracer(&self) -> BoxedTracer {
        BoxedTracer::new(Box::new(self.provider.tracer("cassandra-test")))
    }

    pub fn spans(&self) -> Vec<SpanData> {
        let _ = self.provider.force_flush();
        self.exporter.get_finished_spans().unwrap()
    }

    /// Make this provider the process-wide default
    pub fn install_global(&self) {
        global::set_tracer_provider(self.provider.clone());
    }

    pub fn reset(&self) {
        self.exporter.reset();
    }
}

pub fn attribute<'a>(span: &'a SpanData, key: &Key) -> Option<&'a Value> {
    span.attributes
        .iter()
        .find(|kv| &kv.key == key)
        .map(|kv| &kv.value)
}

pub fn insert_statement() -> String {
    format!("insert into {TABLE_NAME} (id, title) values (?, ?)")
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MockError {
    message: String,
}

impl MockError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for MockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for MockError {}

fn driver_error(err: &MockError) -> DriverError {
    Arc::new(err.clone())
}

#[derive(Default)]
pub struct CountingObserver {
    calls: AtomicUsize,
}

impl CountingObserver {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ConnectObserver for CountingObserver {
    fn observe_connect(&self, _observed: &ObservedConnect) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl QueryObserver for CountingObserver {
    fn observe_query(&self, _observed: &ObservedQuery) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl BatchObserver for CountingObserver {
    fn observe_batch(&self, _observed: &ObservedBatch) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// Records the name of each observer as it is called
pub struct OrderedObserver {
    name: &'static str,
    log: Arc<Mutex<Vec<&'static str>>>,
}

impl OrderedObserver {
    pub fn new(name: &'static str, log: &Arc<Mutex<Vec<&'static str>>>) -> Arc<Self> {
        Arc::new(Self {
            name,
            log: log.clone(),
        })
    }
}

impl QueryObserver for OrderedObserver {
    fn observe_query(&self, _observed: &ObservedQuery) {
        self.log.lock().unwrap().push(self.name);
    }
}

impl BatchObserver for OrderedObserver {
    fn observe_batch(&self, _observed: &ObservedBatch) {
        self.log.lock().unwrap().push(self.name);
    }
}

pub struct MockCluster {
    pub hosts: Vec<IpAddr>,
    pub port: u16,
    pub num_conns: usize,
    /// Report a connection during every query, from inside the query's context
    pub connect_during_query: bool,
    /// Fail every connection attempt and session creation
    pub unreachable: bool,
    connect_observer: Option<Arc<dyn ConnectObserver>>,
    query_observer: Option<Arc<dyn QueryObserver>>,
    batch_observer: Option<Arc<dyn BatchObserver>>,
}

impl MockCluster {
    pub fn new(host: &str) -> Self {
        Self {
            hosts: vec![host.parse().unwrap()],
            port: 9042,
            num_conns: 1,
            connect_during_query: false,
            unreachable: false,
            connect_observer: None,
            query_observer: None,
            batch_observer: None,
        }
    }

    fn host_info(&self, address: IpAddr) -> HostInfo {
        let state = if self.unreachable {
            HostState::Down
        } else {
            HostState::Up
        };
        HostInfo::new(address, self.port)
            .with_release_version(RELEASE_VERSION)
            .with_state(state)
    }
}

fn report_connect(observer: Option<&Arc<dyn ConnectObserver>>, host: HostInfo, error: Option<DriverError>) {
    let start = SystemTime::now();
    if let Some(observer) = observer {
        observer.observe_connect(&ObservedConnect {
            host: Some(host),
            start,
            end: SystemTime::now(),
            error,
        });
    }
}

impl ClusterConfig for MockCluster {
    type Session = MockSession;
    type Error = MockError;

    fn connect_observer(&self) -> Option<Arc<dyn ConnectObserver>> {
        self.connect_observer.clone()
    }

    fn set_connect_observer(&mut self, observer: Arc<dyn ConnectObserver>) {
        self.connect_observer = Some(observer);
    }

    fn query_observer(&self) -> Option<Arc<dyn QueryObserver>> {
        self.query_observer.clone()
    }

    fn set_query_observer(&mut self, observer: Arc<dyn QueryObserver>) {
        self.query_observer = Some(observer);
    }

    fn batch_observer(&self) -> Option<Arc<dyn BatchObserver>> {
        self.batch_observer.clone()
    }

    fn set_batch_observer(&mut self, observer: Arc<dyn BatchObserver>) {
        self.batch_observer = Some(observer);
    }

    async fn create_session(&self) -> Result<MockSession, MockError> {
        let refused = self
            .unreachable
            .then(|| MockError::new("connection refused"));

        // Connections are opened on driver worker threads
        std::thread::scope(|scope| {
            for &address in &self.hosts {
                for _ in 0..self.num_conns {
                    let host = self.host_info(address);
                    let error = refused.as_ref().map(driver_error);
                    let observer = self.connect_observer.as_ref();
                    scope.spawn(move || report_connect(observer, host, error));
                }
            }
        });

        if let Some(err) = refused {
            return Err(err);
        }

        Ok(MockSession {
            host: self.host_info(self.hosts[0]),
            connect_during_query: self.connect_during_query,
            connect_observer: self.connect_observer.clone(),
            query_observer: self.query_observer.clone(),
            batch_observer: self.batch_observer.clone(),
            rows: Mutex::new(Vec::new()),
            closed: Mutex::new(false),
        })
    }
}

pub struct MockSession {
    host: HostInfo,
    connect_during_query: bool,
    connect_observer: Option<Arc<dyn ConnectObserver>>,
    query_observer: Option<Arc<dyn QueryObserver>>,
    batch_observer: Option<Arc<dyn BatchObserver>>,
    rows: Mutex<Vec<Vec<String>>>,
    closed: Mutex<bool>,
}

impl MockSession {
    pub fn is_closed(&self) -> bool {
        *self.closed.lock().unwrap()
    }

    fn run(&self, statement: &Statement<String>, cx: &Context) -> Result<Vec<Vec<String>>, MockError> {
        let start = SystemTime::now();

        if self.connect_during_query {
            let _guard = cx.clone().attach();
            report_connect(self.connect_observer.as_ref(), self.host.clone(), None);
        }

        let text = statement.text().to_lowercase();
        let result = if text.starts_with("insert") {
            self.rows.lock().unwrap().push(statement.values().to_vec());
            Ok(Vec::new())
        } else if text.starts_with("select") {
            Ok(self.rows.lock().unwrap().clone())
        } else {
            Err(MockError::new(format!(
                "line 1:0 no viable alternative at input '{}'",
                statement.text()
            )))
        };

        if let Some(observer) = &self.query_observer {
            observer.observe_query(&ObservedQuery {
                keyspace: KEYSPACE.to_string(),
                statement: statement.text().to_string(),
                context: cx.clone(),
                host: Some(self.host.clone()),
                start,
                end: SystemTime::now(),
                rows: result.as_ref().map_or(0, |rows| rows.len() as u64),
                attempt: 1,
                error: result.as_ref().err().map(driver_error),
            });
        }

        result
    }
}

impl Session for MockSession {
    type Value = String;
    type Rows = Vec<Vec<String>>;
    type Error = MockError;

    async fn execute(&self, statement: &Statement<String>, cx: &Context) -> Result<(), MockError> {
        self.run(statement, cx).map(|_| ())
    }

    async fn iter(
        &self,
        statement: &Statement<String>,
        cx: &Context,
    ) -> Result<Vec<Vec<String>>, MockError> {
        self.run(statement, cx)
    }

    async fn execute_batch(&self, batch: &Batch<String>, cx: &Context) -> Result<(), MockError> {
        let start = SystemTime::now();
        let result = if batch.is_empty() {
            Err(MockError::new("batch has no statements"))
        } else {
            let mut rows = self.rows.lock().unwrap();
            rows.extend(batch.entries().iter().map(|s| s.values().to_vec()));
            Ok(())
        };

        if let Some(observer) = &self.batch_observer {
            observer.observe_batch(&ObservedBatch {
                keyspace: KEYSPACE.to_string(),
                statements: batch.statements().map(str::to_string).collect(),
                context: cx.clone(),
                host: Some(self.host.clone()),
                start,
                end: SystemTime::now(),
                attempt: 1,
                error: result.as_ref().err().map(driver_error),
            });
        }

        result
    }

    fn close(&self) {
        *self.closed.lock().unwrap() = true;
    }
}
