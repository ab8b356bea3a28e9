use crate::instrumentation::{ErrorHook, Instrumentation};
use crate::value::Item;
use aws_sdk_dynamodb::types::{ReturnConsumedCapacity, ReturnItemCollectionMetrics, ReturnValue, Select};
use serde::Deserialize;
use serde_json::Value as Json;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Pause between attempts of the same action.
///
/// Pacing only; the attempt budget is fixed regardless of strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Retry immediately
    None,
    /// Same delay before every retry
    Linear { delay: Duration },
    /// `base_delay * multiplier^(attempt - 1)` before the retry following `attempt`
    Exponential { base_delay: Duration, multiplier: f64 },
}

impl Backoff {
    pub fn none() -> Self {
        Self::None
    }

    pub fn linear(delay: Duration) -> Self {
        Self::Linear { delay }
    }

    pub fn exponential(base_delay: Duration, multiplier: f64) -> Self {
        Self::Exponential {
            base_delay,
            multiplier,
        }
    }

    /// Delay to wait after the failed `attempt` (1-based), if any.
    ///
    /// A multiplier that yields a negative, NaN or overflowing delay means
    /// no delay.
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        match *self {
            Self::None => None,
            Self::Linear { delay } => Some(delay),
            Self::Exponential {
                base_delay,
                multiplier,
            } => {
                let exponent = attempt.saturating_sub(1) as i32;
                Duration::try_from_secs_f64(base_delay.as_secs_f64() * multiplier.powi(exponent)).ok()
            }
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::exponential(Duration::from_millis(50), 2.0)
    }
}

/// Per-client configuration, fixed at construction.
#[derive(Clone, Default)]
pub struct ClientConfig {
    /// Receives the measurements of every invocation
    pub instrumentation: Option<Arc<dyn Instrumentation>>,
    /// Notified of terminal failures
    pub error_hook: Option<Arc<dyn ErrorHook>>,
    /// Pause between attempts
    pub backoff: Backoff,
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_instrumentation(mut self, instrumentation: impl Instrumentation + 'static) -> Self {
        self.instrumentation = Some(Arc::new(instrumentation));
        self
    }

    pub fn with_error_hook(mut self, hook: impl ErrorHook + 'static) -> Self {
        self.error_hook = Some(Arc::new(hook));
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("instrumentation", &self.instrumentation.is_some())
            .field("error_hook", &self.error_hook.is_some())
            .field("backoff", &self.backoff)
            .finish()
    }
}

/// What a write should report back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReturnOptions {
    pub return_consumed_capacity: Option<ReturnConsumedCapacity>,
    pub return_item_collection_metrics: Option<ReturnItemCollectionMetrics>,
    pub return_values: Option<ReturnValue>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PutItemOptions {
    pub condition_expression: Option<String>,
    pub expression_attribute_names: Option<HashMap<String, String>>,
    pub expression_attribute_values: Option<Item>,
    pub returns: ReturnOptions,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GetItemOptions {
    pub consistent_read: Option<bool>,
    pub projection_expression: Option<String>,
    pub expression_attribute_names: Option<HashMap<String, String>>,
    pub return_consumed_capacity: Option<ReturnConsumedCapacity>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateItemOptions {
    pub condition_expression: Option<String>,
    pub update_expression: Option<String>,
    pub expression_attribute_names: Option<HashMap<String, String>>,
    pub expression_attribute_values: Option<Item>,
    pub returns: ReturnOptions,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteItemOptions {
    pub condition_expression: Option<String>,
    pub expression_attribute_names: Option<HashMap<String, String>>,
    pub expression_attribute_values: Option<Item>,
    pub returns: ReturnOptions,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryInput {
    pub index_name: Option<String>,
    pub key_condition_expression: String,
    pub filter_expression: Option<String>,
    pub projection_expression: Option<String>,
    pub expression_attribute_names: Option<HashMap<String, String>>,
    pub expression_attribute_values: Option<Item>,
    pub limit: Option<u32>,
    /// Continuation key from the previous page
    pub exclusive_start_key: Option<Item>,
    pub consistent_read: Option<bool>,
    pub scan_index_forward: Option<bool>,
    pub select: Option<Select>,
    pub return_consumed_capacity: Option<ReturnConsumedCapacity>,
}

impl QueryInput {
    pub fn new(key_condition_expression: impl Into<String>) -> Self {
        Self {
            key_condition_expression: key_condition_expression.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanInput {
    pub index_name: Option<String>,
    pub filter_expression: Option<String>,
    pub projection_expression: Option<String>,
    pub expression_attribute_names: Option<HashMap<String, String>>,
    pub expression_attribute_values: Option<Item>,
    pub limit: Option<u32>,
    /// Continuation key from the previous page
    pub exclusive_start_key: Option<Item>,
    pub consistent_read: Option<bool>,
    pub select: Option<Select>,
    pub segment: Option<u32>,
    pub total_segments: Option<u32>,
    pub return_consumed_capacity: Option<ReturnConsumedCapacity>,
}

/// Result of `PutItem`, `UpdateItem` and `DeleteItem`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteOutput {
    /// Present when `return_values` asked for them
    pub attributes: Option<Item>,
    pub consumed_capacity: Option<Json>,
    pub item_collection_metrics: Option<Json>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GetItemOutput {
    /// `None` when no item matches the key
    pub item: Option<Item>,
    pub consumed_capacity: Option<Json>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListTablesOutput {
    #[serde(default)]
    pub table_names: Vec<String>,
    pub last_evaluated_table_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TableStatus {
    Active,
    Creating,
    Deleting,
    Disabled,
    Updating,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IndexDescription {
    pub index_name: String,
    pub index_status: TableStatus,
    #[serde(flatten)]
    pub other: serde_json::Map<String, Json>,
}

/// Table description as returned by `CreateTable`, `DescribeTable` and `DeleteTable`.
///
/// Fields without a typed counterpart are kept in `other`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TableDescription {
    pub table_name: String,
    pub table_status: TableStatus,
    #[serde(default)]
    pub global_secondary_indexes: Vec<IndexDescription>,
    #[serde(flatten)]
    pub other: serde_json::Map<String, Json>,
}

impl TableDescription {
    /// The table and all of its global secondary indexes are active.
    pub fn is_ready(&self) -> bool {
        self.table_status == TableStatus::Active
            && self
                .global_secondary_indexes
                .iter()
                .all(|index| index.index_status == TableStatus::Active)
    }
}
