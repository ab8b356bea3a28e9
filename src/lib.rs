//! dynamo-actions - A small asynchronous client for the DynamoDB JSON API
//!
//! Every remote action goes through one executor that retries transient
//! failures (at most three attempts), classifies errors into a closed
//! [`ErrorKind`] taxonomy and reports one [`Measurement`] per attempt to an
//! optional instrumentation hook. Items are plain Rust values ([`Value`]) and
//! are converted to and from DynamoDB's typed wire format by the [`codec`].
//!
//! # Example
//!
//! ```no_run
//! use dynamo_actions::{Client, ClientConfig, Item, Measurement, PutItemOptions, QueryInput, Value};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::new().with_instrumentation(|measurements: &[Measurement]| {
//!     for m in measurements {
//!         println!("{} attempt {} took {:?}", m.action, m.attempt, m.duration);
//!     }
//! });
//! let client = Client::from_env(config).await?;
//!
//! let item = Item::from([
//!     ("id".to_string(), Value::from("thread-1")),
//!     ("replies".to_string(), Value::from(3)),
//! ]);
//! client.put_item("Thread", &item, &PutItemOptions::default()).await?;
//!
//! let mut query = QueryInput::new("id = :id");
//! query.expression_attribute_values = Some(Item::from([(":id".to_string(), Value::from("thread-1"))]));
//! query.limit = Some(25);
//! let items = client.query_all("Thread", query).await?;
//! println!("found {} items", items.len());
//! # Ok(())
//! # }
//! ```

// No-op macros when tracing is disabled
#[cfg(not(feature = "tracing"))]
macro_rules! debug {
    ($($tt:tt)*) => {{}};
}
#[cfg(not(feature = "tracing"))]
macro_rules! info {
    ($($tt:tt)*) => {{}};
}
#[cfg(not(feature = "tracing"))]
macro_rules! warn {
    ($($tt:tt)*) => {{}};
}

pub mod client;
pub mod codec;
pub mod error;
pub mod http;
pub mod instrumentation;
pub mod model;
pub mod pagination;
pub mod retry;
pub mod status;
pub mod transport;
pub mod value;

// Re-export commonly used types
pub use client::Client;
pub use codec::{decode, encode, from_item, marshall, to_item, unmarshall, AttributeMap, AttributeValue};
pub use error::{Error, ErrorKind, Result, CLIENT_TIMEOUT_STATUS};
pub use http::{HttpTransport, HttpTransportBuilder};
pub use instrumentation::{ErrorHook, Instrumentation, Measurement};
pub use model::{
    Backoff, ClientConfig, DeleteItemOptions, GetItemOptions, GetItemOutput, IndexDescription, ListTablesOutput,
    PutItemOptions, QueryInput, ReturnOptions, ScanInput, TableDescription, TableStatus, UpdateItemOptions,
    WriteOutput,
};
pub use pagination::{collect_items, paginate, Page};
pub use retry::MAX_ATTEMPTS;
pub use status::StatusPolicy;
pub use transport::{Transport, TransportError};
pub use value::{Item, Number, Value};
