use crate::attributes::Operation;
use crate::builder::{InstrumentationBuilder, TracingOption};
use crate::driver::{Batch, BatchKind, ClusterConfig, Session, Statement};
use crate::observer::{BatchTracer, ConnectTracer, QueryTracer};
use crate::telemetry::Instrumentation;
use opentelemetry::Context;
use std::ops::Deref;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Install the observer adapters on a cluster configuration
///
/// A category gets an adapter when it is enabled or has extra observers
/// registered. Any observer already sitting in the slot is kept and called
/// before the registered extras. A slot that already holds a tracing adapter
/// is left alone, so instrumenting the same cluster twice is harmless.
pub fn instrument_cluster<C: ClusterConfig>(cluster: &mut C, instrumentation: &Instrumentation) {
    let connect = cluster.connect_observer();
    let installed = connect.as_deref().is_some_and(|o| o.is_tracing_adapter());
    if should_install(instrumentation, Operation::Connect, installed) {
        let adapter = ConnectTracer::wrapping(instrumentation.clone(), connect);
        cluster.set_connect_observer(Arc::new(adapter));
    }

    let query = cluster.query_observer();
    let installed = query.as_deref().is_some_and(|o| o.is_tracing_adapter());
    if should_install(instrumentation, Operation::Query, installed) {
        let adapter = QueryTracer::wrapping(instrumentation.clone(), query);
        cluster.set_query_observer(Arc::new(adapter));
    }

    let batch = cluster.batch_observer();
    let installed = batch.as_deref().is_some_and(|o| o.is_tracing_adapter());
    if should_install(instrumentation, Operation::Batch, installed) {
        let adapter = BatchTracer::wrapping(instrumentation.clone(), batch);
        cluster.set_batch_observer(Arc::new(adapter));
    }
}

fn should_install(instrumentation: &Instrumentation, operation: Operation, installed: bool) -> bool {
    if installed {
        debug!(operation = operation.span_name(), "observer slot already instrumented");
        return false;
    }
    instrumentation.needs_adapter(operation)
}

/// Create a traced session from a cluster configuration and options
///
/// # Errors
///
/// Returns the driver's session creation error unchanged
pub async fn new_session_with_tracing<C: ClusterConfig>(
    cluster: C,
    options: impl IntoIterator<Item = TracingOption>,
) -> Result<TracedSession<C::Session>, C::Error> {
    let instrumentation = InstrumentationBuilder::from_options(options).build();
    TracedSession::connect(cluster, &instrumentation).await
}

/// A driver session whose cluster carries the tracing observers
///
/// Spans come from the observers the driver calls; this wrapper only makes
/// sure every operation hands the caller's context to the driver.
pub struct TracedSession<S> {
    inner: S,
}

impl<S: Session> TracedSession<S> {
    /// Instrument `cluster` and open a session on it
    ///
    /// # Errors
    ///
    /// Returns the driver's session creation error unchanged
    pub async fn connect<C>(mut cluster: C, instrumentation: &Instrumentation) -> Result<Self, C::Error>
    where
        C: ClusterConfig<Session = S>,
    {
        instrument_cluster(&mut cluster, instrumentation);

        match cluster.create_session().await {
            Ok(inner) => {
                info!("created traced cassandra session");
                Ok(Self { inner })
            }
            Err(e) => {
                error!("failed to create cassandra session: {}", e);
                Err(e)
            }
        }
    }

    /// Wrap a session created from an already instrumented cluster
    #[must_use]
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    /// Build a statement to run against this session
    ///
    /// # Arguments
    ///
    /// * `text` - CQL statement text
    /// * `values` - Positional bind values
    #[must_use]
    pub fn query(&self, text: impl Into<String>, values: Vec<S::Value>) -> TracedQuery<'_, S> {
        TracedQuery {
            session: &self.inner,
            statement: Statement::new(text, values),
        }
    }

    /// Start an empty batch of the given kind
    #[must_use]
    pub fn new_batch(&self, kind: BatchKind) -> Batch<S::Value> {
        Batch::new(kind)
    }

    /// Execute a batch; the batch span is parented under `cx`
    ///
    /// # Errors
    ///
    /// Returns the driver's error unchanged
    pub async fn execute_batch(&self, batch: &Batch<S::Value>, cx: &Context) -> Result<(), S::Error> {
        debug!(statements = batch.len(), kind = ?batch.kind(), "executing batch");
        self.inner.execute_batch(batch, cx).await
    }

    /// Close the driver session
    pub fn close(&self) {
        debug!("closing traced cassandra session");
        self.inner.close();
    }

    /// Get a reference to the driver session
    #[must_use]
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Consume self and return the driver session
    #[must_use]
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S> Deref for TracedSession<S> {
    type Target = S;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<S> AsRef<S> for TracedSession<S> {
    fn as_ref(&self) -> &S {
        &self.inner
    }
}

/// A statement bound to a traced session
///
/// The execution context is passed to [`exec`](Self::exec) and
/// [`iter`](Self::iter) directly, so the same query can run under
/// different parents.
pub struct TracedQuery<'a, S: Session> {
    session: &'a S,
    statement: Statement<S::Value>,
}

impl<S: Session> TracedQuery<'_, S> {
    /// Execute the statement, discarding rows
    ///
    /// # Errors
    ///
    /// Returns the driver's error unchanged
    pub async fn exec(&self, cx: &Context) -> Result<(), S::Error> {
        debug!(statement = %self.statement.text(), "executing query");
        self.session.execute(&self.statement, cx).await
    }

    /// Execute the statement and return its rows
    ///
    /// # Errors
    ///
    /// Returns the driver's error unchanged
    pub async fn iter(&self, cx: &Context) -> Result<S::Rows, S::Error> {
        debug!(statement = %self.statement.text(), "iterating query");
        self.session.iter(&self.statement, cx).await
    }

    /// The statement and its bind values
    #[must_use]
    pub fn statement(&self) -> &Statement<S::Value> {
        &self.statement
    }
}
