//! Extension trait for adding instrumentation to driver cluster configurations

use crate::driver::ClusterConfig;
use crate::session::{instrument_cluster, TracedSession};
use crate::telemetry::Instrumentation;
use std::future::Future;

/// Extension trait for any [`ClusterConfig`]
///
/// # Example
///
/// ```rust,ignore
/// use otel_instrumentation_cassandra::{ClusterConfigExt, Instrumentation};
///
/// let instrumentation = Instrumentation::builder()
///     .with_connect_instrumentation(false)
///     .build();
///
/// let session = cluster.create_traced_session(&instrumentation).await?;
/// ```
pub trait ClusterConfigExt: ClusterConfig + Sized {
    /// Install the tracing observers in place
    ///
    /// Useful when the session is created elsewhere; observers already set
    /// on the cluster keep receiving events.
    fn instrument(&mut self, instrumentation: &Instrumentation);

    /// Install the tracing observers and open a session
    ///
    /// Slots already instrumented by [`instrument`](Self::instrument) are
    /// kept as they are.
    ///
    /// # Errors
    ///
    /// Returns the driver's session creation error unchanged
    fn create_traced_session(
        self,
        instrumentation: &Instrumentation,
    ) -> impl Future<Output = Result<TracedSession<Self::Session>, Self::Error>> + Send;
}

impl<C: ClusterConfig> ClusterConfigExt for C {
    fn instrument(&mut self, instrumentation: &Instrumentation) {
        instrument_cluster(self, instrumentation);
    }

    async fn create_traced_session(
        self,
        instrumentation: &Instrumentation,
    ) -> Result<TracedSession<Self::Session>, Self::Error> {
        TracedSession::connect(self, instrumentation).await
    }
}
