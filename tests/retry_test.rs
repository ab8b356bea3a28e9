use async_trait::async_trait;
use dynamo_actions::{
    Backoff, Client, ClientConfig, Error, ErrorKind, GetItemOptions, Item, Measurement, PutItemOptions, Transport,
    TransportError, Value, MAX_ATTEMPTS,
};
use serde_json::{json, Value as Json};
use std::collections::{BTreeSet, VecDeque};
use std::sync::{Arc, Mutex};

type Response = Result<Option<Json>, TransportError>;

// Transport that replays a fixed script and records every call it receives
struct ScriptedTransport {
    responses: Mutex<VecDeque<Response>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    fn new(responses: Vec<Response>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn fetch(&self, action: &str, _payload: &Json) -> Result<Option<Json>, TransportError> {
        self.calls.lock().unwrap().push(action.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Protocol("no more scripted responses".into())))
    }
}

type Recorded = Arc<Mutex<Vec<Vec<Measurement>>>>;

// Client whose instrumentation keeps each invocation's measurements separately
fn recording_client(transport: Arc<ScriptedTransport>) -> (Client, Recorded) {
    let recorded: Recorded = Arc::new(Mutex::new(Vec::new()));
    let sink = recorded.clone();
    let config = ClientConfig::new()
        .with_backoff(Backoff::none())
        .with_instrumentation(move |measurements: &[Measurement]| sink.lock().unwrap().push(measurements.to_vec()));
    (Client::new(transport, config), recorded)
}

fn bare_client(transport: Arc<ScriptedTransport>) -> Client {
    Client::new(transport, ClientConfig::new().with_backoff(Backoff::none()))
}

fn timeout() -> Response {
    Err(TransportError::Http {
        status: 599,
        body: None,
    })
}

fn server_error() -> Response {
    Err(TransportError::Http {
        status: 500,
        body: None,
    })
}

fn service_error(status: u16, code: &str, message: &str) -> Response {
    Err(TransportError::Http {
        status,
        body: Some(json!({
            "__type": format!("com.amazonaws.dynamodb.v20120810#{code}"),
            "message": message,
        })),
    })
}

fn table_description(name: &str) -> Response {
    Ok(Some(json!({
        "Table": {"TableName": name, "TableStatus": "ACTIVE", "ItemCount": 0}
    })))
}

fn key(id: &str) -> Item {
    Item::from([("id".to_string(), Value::from(id))])
}

#[tokio::test]
async fn test_persistent_retryable_failure_yields_three_measurements() {
    let transport = ScriptedTransport::new(vec![timeout(), timeout(), timeout(), table_description("Thread")]);
    let (client, recorded) = recording_client(transport.clone());

    let err = client.describe_table("Thread").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::TimeoutException);
    assert_eq!(transport.calls().len(), MAX_ATTEMPTS as usize);

    let recorded = recorded.lock().unwrap();
    assert_eq!(recorded.len(), 1, "one delivery per invocation");
    let measurements = &recorded[0];
    assert_eq!(measurements.iter().map(|m| m.attempt).collect::<Vec<_>>(), vec![1, 2, 3]);
    for m in measurements {
        assert_eq!(m.action, "DescribeTable");
        assert_eq!(m.table.as_deref(), Some("Thread"));
        assert_eq!(m.error, Some("TimeoutException"));
    }
}

#[tokio::test]
async fn test_retryable_service_code_exhausts_budget() {
    let internal = || service_error(500, "InternalServerError", "Internal server error");
    let transport = ScriptedTransport::new(vec![internal(), internal(), internal(), table_description("Thread")]);
    let (client, recorded) = recording_client(transport.clone());

    let err = client.describe_table("Thread").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InternalServerError);
    assert_eq!(err.message(), "Internal server error");
    assert_eq!(transport.calls().len(), MAX_ATTEMPTS as usize);

    let recorded = recorded.lock().unwrap();
    let measurements = &recorded[0];
    assert_eq!(measurements.iter().map(|m| m.attempt).collect::<Vec<_>>(), vec![1, 2, 3]);
    assert!(measurements.iter().all(|m| m.error == Some("InternalServerError")));
}

#[tokio::test]
async fn test_throttling_then_success() {
    let transport = ScriptedTransport::new(vec![
        service_error(400, "ProvisionedThroughputExceededException", "Rate exceeded"),
        service_error(400, "ThrottlingException", "Rate exceeded"),
        table_description("Thread"),
    ]);
    let (client, recorded) = recording_client(transport.clone());

    client.describe_table("Thread").await.unwrap();

    let errors: Vec<_> = recorded.lock().unwrap()[0].iter().map(|m| m.error).collect();
    assert_eq!(errors, vec![Some("ThroughputExceeded"), Some("ThrottlingException"), None]);
}

#[tokio::test]
async fn test_non_retryable_failure_yields_one_measurement() {
    let transport = ScriptedTransport::new(vec![
        service_error(400, "ResourceNotFoundException", "Requested resource not found"),
        table_description("Thread"),
    ]);
    let (client, recorded) = recording_client(transport.clone());

    let err = client.describe_table("Thread").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ResourceNotFound);
    assert_eq!(err.message(), "Requested resource not found");
    assert_eq!(transport.calls().len(), 1);

    let recorded = recorded.lock().unwrap();
    assert_eq!(recorded[0].len(), 1);
    assert_eq!(recorded[0][0].attempt, 1);
    assert_eq!(recorded[0][0].error, Some("ResourceNotFound"));
}

#[tokio::test]
async fn test_success_on_second_attempt_short_circuits() {
    let transport = ScriptedTransport::new(vec![server_error(), table_description("Thread"), server_error()]);
    let (client, recorded) = recording_client(transport.clone());

    let description = client.describe_table("Thread").await.unwrap();

    assert_eq!(description.table_name, "Thread");
    assert_eq!(transport.calls().len(), 2);

    let recorded = recorded.lock().unwrap();
    let measurements = &recorded[0];
    assert_eq!(measurements.len(), 2);
    assert_eq!((measurements[0].attempt, measurements[0].error), (1, Some("RequestException")));
    assert_eq!((measurements[1].attempt, measurements[1].error), (2, None));
}

#[tokio::test]
async fn test_instrumentation_does_not_change_outcomes() {
    let scripts = || {
        vec![
            vec![timeout(), timeout(), timeout()],
            vec![service_error(400, "ConditionalCheckFailedException", "The conditional request failed")],
            vec![server_error(), table_description("Thread")],
        ]
    };

    let mut with_hook = Vec::new();
    for script in scripts() {
        let transport = ScriptedTransport::new(script);
        let (client, _) = recording_client(transport.clone());
        let outcome = client.describe_table("Thread").await.map(|_| ()).map_err(|e| e.kind());
        with_hook.push((outcome, transport.calls().len()));
    }

    let mut without_hook = Vec::new();
    for script in scripts() {
        let transport = ScriptedTransport::new(script);
        let client = bare_client(transport.clone());
        let outcome = client.describe_table("Thread").await.map(|_| ()).map_err(|e| e.kind());
        without_hook.push((outcome, transport.calls().len()));
    }

    assert_eq!(with_hook, without_hook);
    assert_eq!(
        without_hook,
        vec![
            (Err(ErrorKind::TimeoutException), 3),
            (Err(ErrorKind::ConditionalCheckFailedException), 1),
            (Ok(()), 2),
        ]
    );
}

#[test]
fn test_classification_of_transport_failures() {
    let cases = vec![
        (timeout(), ErrorKind::TimeoutException, true),
        (server_error(), ErrorKind::RequestException, true),
        (
            service_error(400, "ConditionalCheckFailedException", "The conditional request failed"),
            ErrorKind::ConditionalCheckFailedException,
            false,
        ),
        (
            service_error(400, "ProvisionedThroughputExceededException", "slow down"),
            ErrorKind::ThroughputExceeded,
            true,
        ),
        (
            service_error(400, "ValidationException", "One or more parameter values were invalid"),
            ErrorKind::ValidationException,
            false,
        ),
        (
            Err(TransportError::NoCredentials("no providers in chain".into())),
            ErrorKind::NoCredentialsError,
            false,
        ),
        (
            Err(TransportError::Connection("connection refused".into())),
            ErrorKind::RequestException,
            true,
        ),
    ];

    for (response, expected, retryable) in cases {
        let err = Error::from(response.unwrap_err());
        assert_eq!(err.kind(), expected);
        assert_eq!(err.is_retryable(), retryable, "{expected}");
    }
}

#[tokio::test]
async fn test_conditional_put_is_not_retried() {
    let transport = ScriptedTransport::new(vec![service_error(
        400,
        "ConditionalCheckFailedException",
        "The conditional request failed",
    )]);
    let client = bare_client(transport.clone());
    let options = PutItemOptions {
        condition_expression: Some("attribute_not_exists(id)".to_string()),
        ..Default::default()
    };

    let err = client.put_item("Thread", &key("a"), &options).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConditionalCheckFailedException);
    assert_eq!(transport.calls(), vec!["PutItem"]);
}

#[tokio::test]
async fn test_empty_body_is_protocol_violation() {
    let transport = ScriptedTransport::new(vec![Ok(None)]);
    let (client, recorded) = recording_client(transport.clone());

    let err = client.get_item("Thread", &key("a"), &GetItemOptions::default()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DynamoDBException);
    assert_eq!(transport.calls().len(), 1);
    assert_eq!(recorded.lock().unwrap()[0][0].error, Some("DynamoDBException"));
}

#[tokio::test]
async fn test_unencodable_item_never_reaches_transport() {
    let transport = ScriptedTransport::new(vec![Ok(Some(json!({})))]);
    let (client, recorded) = recording_client(transport.clone());
    let item = Item::from([
        ("id".to_string(), Value::from("a")),
        ("tags".to_string(), Value::StringSet(BTreeSet::new())),
    ]);

    let err = client.put_item("Thread", &item, &PutItemOptions::default()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SerializationError);
    assert!(transport.calls().is_empty());
    assert!(recorded.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_error_hook_receives_terminal_failure() {
    let transport = ScriptedTransport::new(vec![timeout(), timeout(), timeout()]);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let hook_seen = seen.clone();
    let config = ClientConfig::new()
        .with_backoff(Backoff::none())
        .with_error_hook(move |action: &str, err: &Error| hook_seen.lock().unwrap().push((action.to_string(), err.kind())));
    let client = Client::new(transport, config);

    let _ = client.delete_table("Thread").await;

    assert_eq!(
        *seen.lock().unwrap(),
        vec![("DeleteTable".to_string(), ErrorKind::TimeoutException)]
    );
}

#[tokio::test]
async fn test_execute_reads_table_from_payload() {
    let transport = ScriptedTransport::new(vec![Ok(Some(json!({"UnprocessedItems": {}})))]);
    let (client, recorded) = recording_client(transport);

    let body = client
        .execute("BatchWriteItem", &json!({"RequestItems": {"Thread": []}}))
        .await
        .unwrap();
    assert_eq!(body, json!({"UnprocessedItems": {}}));

    let recorded = recorded.lock().unwrap();
    assert_eq!(recorded[0][0].action, "BatchWriteItem");
    assert_eq!(recorded[0][0].table, None);
}
