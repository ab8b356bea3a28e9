use crate::codec::{marshall_json, unmarshall_json};
use crate::error::{protocol, Error, ErrorKind, Result};
use crate::http::HttpTransport;
use crate::model::{
    ClientConfig, DeleteItemOptions, GetItemOptions, GetItemOutput, ListTablesOutput, PutItemOptions,
    QueryInput, ReturnOptions, ScanInput, TableDescription, UpdateItemOptions, WriteOutput,
};
use crate::pagination::{collect_items, paginate, Page};
use crate::retry::Executor;
use crate::transport::Transport;
use crate::value::Item;
use futures::Stream;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use std::collections::HashMap;
use std::sync::Arc;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// One method per remote action, all sharing the retrying executor.
///
/// Item-shaped arguments are marshalled before the request is sent, so a
/// value the codec rejects fails locally and is never retried.
#[derive(Clone)]
pub struct Client {
    executor: Executor,
}

impl Client {
    pub fn new(transport: Arc<dyn Transport>, config: ClientConfig) -> Self {
        Self {
            executor: Executor::new(transport, config),
        }
    }

    /// Build a client over [`HttpTransport`] configured from the environment.
    pub async fn from_env(config: ClientConfig) -> Result<Self> {
        let transport = HttpTransport::from_env().await?;
        Ok(Self::new(Arc::new(transport), config))
    }

    /// Run an action that has no dedicated method, such as `BatchWriteItem`.
    ///
    /// The payload is sent as-is and the raw response returned.
    #[cfg_attr(feature = "tracing", instrument(skip(self, payload)))]
    pub async fn execute(&self, action: &str, payload: &Json) -> Result<Json> {
        let table = payload.get("TableName").and_then(Json::as_str);
        self.executor.execute(action, table, payload).await
    }

    /// Create a table from a `CreateTable` definition.
    ///
    /// The definition is passed through untouched; validating it is left to
    /// the service.
    #[cfg_attr(feature = "tracing", instrument(skip_all))]
    pub async fn create_table<T>(&self, definition: &T) -> Result<TableDescription>
    where
        T: Serialize + ?Sized,
    {
        let payload = serde_json::to_value(definition)?;
        let table = payload.get("TableName").and_then(Json::as_str);
        let body = self.executor.execute("CreateTable", table, &payload).await?;
        response_field(body, "TableDescription")
    }

    #[cfg_attr(feature = "tracing", instrument(skip(self)))]
    pub async fn delete_table(&self, table: &str) -> Result<TableDescription> {
        let payload = Payload::for_table(table).into_json();
        let body = self.executor.execute("DeleteTable", Some(table), &payload).await?;
        response_field(body, "TableDescription")
    }

    #[cfg_attr(feature = "tracing", instrument(skip(self)))]
    pub async fn describe_table(&self, table: &str) -> Result<TableDescription> {
        let payload = Payload::for_table(table).into_json();
        let body = self.executor.execute("DescribeTable", Some(table), &payload).await?;
        response_field(body, "Table")
    }

    #[cfg_attr(feature = "tracing", instrument(skip(self)))]
    pub async fn list_tables(&self, limit: Option<u32>, exclusive_start_table_name: Option<&str>) -> Result<ListTablesOutput> {
        let payload = Payload::default()
            .set_opt("Limit", limit)
            .set_opt("ExclusiveStartTableName", exclusive_start_table_name)
            .into_json();
        let body = self.executor.execute("ListTables", None, &payload).await?;
        protocol(body, "ListTables response")
    }

    #[cfg_attr(feature = "tracing", instrument(skip(self, item, options)))]
    pub async fn put_item(&self, table: &str, item: &Item, options: &PutItemOptions) -> Result<WriteOutput> {
        let payload = Payload::for_table(table)
            .set("Item", marshall_json(item)?)
            .set_opt("ConditionExpression", options.condition_expression.as_deref())
            .set_names(options.expression_attribute_names.as_ref())
            .set_values(options.expression_attribute_values.as_ref())?
            .set_returns(&options.returns)
            .into_json();
        let body = self.executor.execute("PutItem", Some(table), &payload).await?;
        write_output(body)
    }

    #[cfg_attr(feature = "tracing", instrument(skip(self, key, options)))]
    pub async fn get_item(&self, table: &str, key: &Item, options: &GetItemOptions) -> Result<GetItemOutput> {
        let payload = Payload::for_table(table)
            .set("Key", marshall_json(key)?)
            .set_opt("ConsistentRead", options.consistent_read)
            .set_opt("ProjectionExpression", options.projection_expression.as_deref())
            .set_names(options.expression_attribute_names.as_ref())
            .set_opt(
                "ReturnConsumedCapacity",
                options.return_consumed_capacity.as_ref().map(|r| r.as_str()),
            )
            .into_json();
        let body = self.executor.execute("GetItem", Some(table), &payload).await?;

        #[derive(Deserialize)]
        #[serde(rename_all = "PascalCase")]
        struct Raw {
            item: Option<Map<String, Json>>,
            consumed_capacity: Option<Json>,
        }

        let raw: Raw = protocol(body, "GetItem response")?;
        Ok(GetItemOutput {
            item: raw.item.map(Json::Object).map(unmarshall_json).transpose()?,
            consumed_capacity: raw.consumed_capacity,
        })
    }

    #[cfg_attr(feature = "tracing", instrument(skip(self, key, options)))]
    pub async fn update_item(&self, table: &str, key: &Item, options: &UpdateItemOptions) -> Result<WriteOutput> {
        let payload = Payload::for_table(table)
            .set("Key", marshall_json(key)?)
            .set_opt("ConditionExpression", options.condition_expression.as_deref())
            .set_opt("UpdateExpression", options.update_expression.as_deref())
            .set_names(options.expression_attribute_names.as_ref())
            .set_values(options.expression_attribute_values.as_ref())?
            .set_returns(&options.returns)
            .into_json();
        let body = self.executor.execute("UpdateItem", Some(table), &payload).await?;
        write_output(body)
    }

    #[cfg_attr(feature = "tracing", instrument(skip(self, key, options)))]
    pub async fn delete_item(&self, table: &str, key: &Item, options: &DeleteItemOptions) -> Result<WriteOutput> {
        let payload = Payload::for_table(table)
            .set("Key", marshall_json(key)?)
            .set_opt("ConditionExpression", options.condition_expression.as_deref())
            .set_names(options.expression_attribute_names.as_ref())
            .set_values(options.expression_attribute_values.as_ref())?
            .set_returns(&options.returns)
            .into_json();
        let body = self.executor.execute("DeleteItem", Some(table), &payload).await?;
        write_output(body)
    }

    /// Fetch one page of a query. Pass the returned `last_evaluated_key` back
    /// as `exclusive_start_key` to continue.
    #[cfg_attr(feature = "tracing", instrument(skip(self, input)))]
    pub async fn query(&self, table: &str, input: &QueryInput) -> Result<Page> {
        let payload = Payload::for_table(table)
            .set_opt("IndexName", input.index_name.as_deref())
            .set("KeyConditionExpression", input.key_condition_expression.as_str())
            .set_opt("FilterExpression", input.filter_expression.as_deref())
            .set_opt("ProjectionExpression", input.projection_expression.as_deref())
            .set_names(input.expression_attribute_names.as_ref())
            .set_values(input.expression_attribute_values.as_ref())?
            .set_opt("Limit", input.limit)
            .set_item_opt("ExclusiveStartKey", input.exclusive_start_key.as_ref())?
            .set_opt("ConsistentRead", input.consistent_read)
            .set_opt("ScanIndexForward", input.scan_index_forward)
            .set_opt("Select", input.select.as_ref().map(|s| s.as_str()))
            .set_opt(
                "ReturnConsumedCapacity",
                input.return_consumed_capacity.as_ref().map(|r| r.as_str()),
            )
            .into_json();
        let body = self.executor.execute("Query", Some(table), &payload).await?;
        Page::from_response(body)
    }

    /// Fetch one page of a scan.
    #[cfg_attr(feature = "tracing", instrument(skip(self, input)))]
    pub async fn scan(&self, table: &str, input: &ScanInput) -> Result<Page> {
        let payload = Payload::for_table(table)
            .set_opt("IndexName", input.index_name.as_deref())
            .set_opt("FilterExpression", input.filter_expression.as_deref())
            .set_opt("ProjectionExpression", input.projection_expression.as_deref())
            .set_names(input.expression_attribute_names.as_ref())
            .set_values(input.expression_attribute_values.as_ref())?
            .set_opt("Limit", input.limit)
            .set_item_opt("ExclusiveStartKey", input.exclusive_start_key.as_ref())?
            .set_opt("ConsistentRead", input.consistent_read)
            .set_opt("Select", input.select.as_ref().map(|s| s.as_str()))
            .set_opt("Segment", input.segment)
            .set_opt("TotalSegments", input.total_segments)
            .set_opt(
                "ReturnConsumedCapacity",
                input.return_consumed_capacity.as_ref().map(|r| r.as_str()),
            )
            .into_json();
        let body = self.executor.execute("Scan", Some(table), &payload).await?;
        Page::from_response(body)
    }

    /// Stream every page of a query, starting from `input.exclusive_start_key`.
    pub fn query_pages<'a>(&'a self, table: &'a str, input: QueryInput) -> impl Stream<Item = Result<Page>> + 'a {
        let start = input.exclusive_start_key.clone();
        paginate(start, move |key| {
            let input = QueryInput {
                exclusive_start_key: key,
                ..input.clone()
            };
            async move { self.query(table, &input).await }
        })
    }

    /// Stream every page of a scan, starting from `input.exclusive_start_key`.
    pub fn scan_pages<'a>(&'a self, table: &'a str, input: ScanInput) -> impl Stream<Item = Result<Page>> + 'a {
        let start = input.exclusive_start_key.clone();
        paginate(start, move |key| {
            let input = ScanInput {
                exclusive_start_key: key,
                ..input.clone()
            };
            async move { self.scan(table, &input).await }
        })
    }

    /// All items matching a query, across every page, in page order.
    pub async fn query_all(&self, table: &str, input: QueryInput) -> Result<Vec<Item>> {
        collect_items(self.query_pages(table, input)).await
    }

    /// All items of a scan, across every page, in page order.
    pub async fn scan_all(&self, table: &str, input: ScanInput) -> Result<Vec<Item>> {
        collect_items(self.scan_pages(table, input)).await
    }
}

/// Request payload under construction.
#[derive(Default)]
struct Payload(Map<String, Json>);

impl Payload {
    fn for_table(table: &str) -> Self {
        Self::default().set("TableName", table)
    }

    fn set(mut self, key: &str, value: impl Into<Json>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    fn set_opt<T: Into<Json>>(self, key: &str, value: Option<T>) -> Self {
        match value {
            Some(value) => self.set(key, value),
            None => self,
        }
    }

    fn set_item_opt(self, key: &str, item: Option<&Item>) -> Result<Self> {
        Ok(match item {
            Some(item) => self.set(key, marshall_json(item)?),
            None => self,
        })
    }

    fn set_names(self, names: Option<&HashMap<String, String>>) -> Self {
        let names = names.map(|names| {
            names
                .iter()
                .map(|(k, v)| (k.clone(), Json::String(v.clone())))
                .collect::<Map<_, _>>()
        });
        self.set_opt("ExpressionAttributeNames", names)
    }

    fn set_values(self, values: Option<&Item>) -> Result<Self> {
        self.set_item_opt("ExpressionAttributeValues", values)
    }

    fn set_returns(self, returns: &ReturnOptions) -> Self {
        self.set_opt(
            "ReturnConsumedCapacity",
            returns.return_consumed_capacity.as_ref().map(|r| r.as_str()),
        )
        .set_opt(
            "ReturnItemCollectionMetrics",
            returns.return_item_collection_metrics.as_ref().map(|r| r.as_str()),
        )
        .set_opt("ReturnValues", returns.return_values.as_ref().map(|r| r.as_str()))
    }

    fn into_json(self) -> Json {
        Json::Object(self.0)
    }
}

fn response_field<T: DeserializeOwned>(mut body: Json, field: &str) -> Result<T> {
    match body.get_mut(field).map(Json::take) {
        Some(value) => protocol(value, field),
        None => Err(Error::new(
            ErrorKind::DynamoDBException,
            format!("response is missing {field}"),
        )),
    }
}

fn write_output(body: Json) -> Result<WriteOutput> {
    #[derive(Deserialize)]
    #[serde(rename_all = "PascalCase")]
    struct Raw {
        attributes: Option<Map<String, Json>>,
        consumed_capacity: Option<Json>,
        item_collection_metrics: Option<Json>,
    }

    let raw: Raw = protocol(body, "write response")?;
    Ok(WriteOutput {
        attributes: raw.attributes.map(Json::Object).map(unmarshall_json).transpose()?,
        consumed_capacity: raw.consumed_capacity,
        item_collection_metrics: raw.item_collection_metrics,
    })
}
