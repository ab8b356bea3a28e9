use crate::error::{Error, ErrorKind};
use crate::instrumentation::{ErrorHook, Instrumentation, Measurement};
use crate::model::{Backoff, ClientConfig};
use crate::transport::Transport;
use serde_json::Value as Json;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::sleep;

#[cfg(feature = "tracing")]
use tracing::{debug, info, warn};

/// Attempts per invocation, including the first.
pub const MAX_ATTEMPTS: u32 = 3;

/// Drives one action through the transport, retrying retryable failures.
///
/// Attempts are strictly sequential. Every attempt yields one
/// [`Measurement`]; the full ordered list goes to the instrumentation hook
/// once the invocation settles.
#[derive(Clone)]
pub(crate) struct Executor {
    transport: Arc<dyn Transport>,
    instrumentation: Option<Arc<dyn Instrumentation>>,
    error_hook: Option<Arc<dyn ErrorHook>>,
    backoff: Backoff,
}

impl Executor {
    pub(crate) fn new(transport: Arc<dyn Transport>, config: ClientConfig) -> Self {
        Self {
            transport,
            instrumentation: config.instrumentation,
            error_hook: config.error_hook,
            backoff: config.backoff,
        }
    }

    pub(crate) async fn execute(&self, action: &str, table: Option<&str>, payload: &Json) -> Result<Json, Error> {
        let mut measurements = Vec::with_capacity(MAX_ATTEMPTS as usize);
        let mut attempt = 1;

        let result = loop {
            let start = Instant::now();
            debug!(action, attempt, "sending request");

            let outcome = match self.transport.fetch(action, payload).await {
                Ok(Some(body)) => Ok(body),
                Ok(None) => Err(Error::new(
                    ErrorKind::DynamoDBException,
                    format!("empty response body for {action}"),
                )),
                Err(err) => Err(Error::from(err)),
            };

            measurements.push(Measurement {
                attempt,
                action: action.to_string(),
                table: table.map(str::to_string),
                duration: start.elapsed(),
                error: outcome.as_ref().err().map(Error::name),
            });

            match outcome {
                Ok(body) => {
                    debug!(action, attempt, "request succeeded");
                    break Ok(body);
                }
                Err(err) if err.is_retryable() && attempt < MAX_ATTEMPTS => {
                    warn!(action, attempt, error = %err, "retryable failure");
                    if let Some(delay) = self.backoff.delay(attempt) {
                        sleep(delay).await;
                    }
                    attempt += 1;
                }
                Err(err) => {
                    if err.is_retryable() {
                        warn!(action, attempt, error = %err, "giving up after retries");
                    } else {
                        info!(action, attempt, error = %err, "non-retryable failure");
                    }
                    break Err(err);
                }
            }
        };

        if let Some(instrumentation) = &self.instrumentation {
            instrumentation.record(&measurements);
        }
        if let (Err(err), Some(hook)) = (&result, &self.error_hook) {
            hook.on_error(action, err);
        }

        result
    }
}
