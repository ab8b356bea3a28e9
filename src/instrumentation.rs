use crate::error::Error;
use std::time::Duration;

/// Observability record for one attempt of an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Measurement {
    /// 1-based, contiguous within one invocation
    pub attempt: u32,
    pub action: String,
    pub table: Option<String>,
    pub duration: Duration,
    /// Error kind name, `None` when the attempt succeeded
    pub error: Option<&'static str>,
}

/// Receives the measurements of each invocation.
///
/// Called once per invocation, after it finishes, with every attempt in order.
pub trait Instrumentation: Send + Sync {
    fn record(&self, measurements: &[Measurement]);
}

impl<F> Instrumentation for F
where
    F: Fn(&[Measurement]) + Send + Sync,
{
    fn record(&self, measurements: &[Measurement]) {
        self(measurements)
    }
}

/// Notified of every terminal failure before it is returned to the caller.
pub trait ErrorHook: Send + Sync {
    fn on_error(&self, action: &str, error: &Error);
}

impl<F> ErrorHook for F
where
    F: Fn(&str, &Error) + Send + Sync,
{
    fn on_error(&self, action: &str, error: &Error) {
        self(action, error)
    }
}
