/*!
`otel-instrumentation-cassandra` turns the connect, query and batch observer
callbacks of a Cassandra driver into OpenTelemetry spans and metrics.

# Usage

The driver calls its observers from its own worker threads. This crate
installs an adapter in each observer slot of the cluster configuration;
every adapter starts and ends one span per event, records metrics and then
forwards the event to any observers you registered for the same kind.

# Example

```rust,ignore
use opentelemetry::{global, trace::{TraceContextExt, Tracer}, Context};
use otel_instrumentation_cassandra::{new_session_with_tracing, TracingOption};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set up your tracer provider first; the global tracer is used by default
    let cluster = my_driver::ClusterConfig::new("127.0.0.1");

    let session = new_session_with_tracing(
        cluster,
        [
            TracingOption::Meter(global::meter("cassandra")),
            TracingOption::ConnectInstrumentation(false),
        ],
    )
    .await?;

    let parent = global::tracer("app").start("insert book");
    let cx = Context::current_with_span(parent);

    // The query span becomes a child of `parent`
    session
        .query("INSERT INTO book (id, title) VALUES (?, ?)", values)
        .exec(&cx)
        .await?;

    cx.span().end();
    Ok(())
}
```

# Spans

| span | parent | attributes |
|------|--------|------------|
| `connect` | none | host attributes |
| `query` | caller's context | host attributes, `cassandra.stmt` |
| `batch-query` | caller's context | host attributes, `cassandra.batch.stmts` |

Host attributes are `cassandra.host`, `cassandra.port`, `cassandra.version`
and `cassandra.host.state`. Connect spans never nest under a query: a
connection is shared by many queries.

# Failure handling

Telemetry failures are logged through `tracing` and dropped. Driver errors
are recorded on the span and returned to the caller unchanged.

*/
#![warn(clippy::all, clippy::pedantic)]

pub mod attributes;
pub mod builder;
pub mod driver;
pub mod error;
pub mod ext;
pub mod metrics;
pub mod observer;
pub mod session;
pub mod telemetry;

pub use attributes::{HostAttributes, Operation};
pub use builder::{InstrumentationBuilder, TracingOption};
pub use error::{InstrumentationError, InstrumentationResult};
pub use ext::ClusterConfigExt;
pub use metrics::CassandraMetrics;
pub use observer::{BatchTracer, ConnectTracer, QueryTracer};
pub use session::{instrument_cluster, new_session_with_tracing, TracedQuery, TracedSession};
pub use telemetry::{Instrumentation, INSTRUMENTATION_NAME};
