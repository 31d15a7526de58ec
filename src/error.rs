//! Error types for OpenTelemetry Cassandra instrumentation
//!
//! None of these errors ever reach the caller of a database operation:
//! telemetry failures are logged and dropped, and driver errors pass through
//! untouched.

use crate::attributes::Operation;
use std::any::Any;
use std::fmt;

/// Errors raised inside the instrumentation layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstrumentationError {
    /// Span or metric code panicked while handling a driver event
    TelemetryPanic {
        /// The event kind being observed
        operation: Operation,
        /// Panic payload, when it was a string
        message: String,
    },
    /// A host state string did not name a known state
    UnknownHostState(String),
}

impl fmt::Display for InstrumentationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstrumentationError::TelemetryPanic { operation, message } => {
                write!(
                    f,
                    "telemetry for {} event panicked: {message}",
                    operation.span_name()
                )
            }
            InstrumentationError::UnknownHostState(state) => {
                write!(f, "unknown host state '{state}'")
            }
        }
    }
}

impl std::error::Error for InstrumentationError {}

impl InstrumentationError {
    /// Build a telemetry panic error from a `catch_unwind` payload
    #[must_use]
    pub fn telemetry_panic(operation: Operation, payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };

        Self::TelemetryPanic { operation, message }
    }
}

/// Result type alias for instrumentation operations
pub type InstrumentationResult<T> = Result<T, InstrumentationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_payload_messages() {
        let err = InstrumentationError::telemetry_panic(Operation::Query, &"boom");
        assert_eq!(err.to_string(), "telemetry for query event panicked: boom");

        let owned: Box<dyn Any + Send> = Box::new(String::from("owned boom"));
        let err = InstrumentationError::telemetry_panic(Operation::Batch, owned.as_ref());
        assert_eq!(
            err,
            InstrumentationError::TelemetryPanic {
                operation: Operation::Batch,
                message: "owned boom".to_string(),
            }
        );

        let err = InstrumentationError::telemetry_panic(Operation::Connect, &42_u8);
        assert!(err.to_string().contains("non-string panic payload"));
    }
}
