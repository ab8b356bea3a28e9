use crate::error::{Error, ErrorKind, CLIENT_TIMEOUT_STATUS};
use crate::transport::{Transport, TransportError};
use async_trait::async_trait;
use aws_credential_types::provider::error::CredentialsError;
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use aws_credential_types::Credentials;
use aws_sigv4::http_request::{sign, SignableBody, SignableRequest, SigningParams, SigningSettings};
use aws_sigv4::sign::v4;
use reqwest::Url;
use serde_json::Value as Json;
use std::time::{Duration, SystemTime};
use tokio::sync::Mutex;

#[cfg(feature = "tracing")]
use tracing::debug;

const SERVICE_NAME: &str = "dynamodb";
const TARGET_PREFIX: &str = "DynamoDB_20120810";
const CONTENT_TYPE: &str = "application/x-amz-json-1.0";

/// Client-side limit for one HTTP exchange.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

// Cached credentials are refreshed this long before they expire.
const REFRESH_WINDOW: Duration = Duration::from_secs(300);

/// SigV4-signed HTTP transport for the DynamoDB JSON protocol.
///
/// A client-side timeout is reported as HTTP status 599 so it classifies as
/// a `TimeoutException`; connection-level failures, including connect
/// timeouts, are reported as connection failures.
pub struct HttpTransport {
    http: reqwest::Client,
    endpoint: Url,
    host: String,
    region: String,
    credentials: SharedCredentialsProvider,
    cached: Mutex<Option<Credentials>>,
}

#[derive(Default)]
pub struct HttpTransportBuilder {
    endpoint: Option<String>,
    region: Option<String>,
    credentials: Option<SharedCredentialsProvider>,
    timeout: Option<Duration>,
}

impl HttpTransportBuilder {
    /// Override the endpoint, e.g. `http://localhost:8000` for DynamoDB Local.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn credentials_provider(mut self, provider: impl ProvideCredentials + 'static) -> Self {
        self.credentials = Some(SharedCredentialsProvider::new(provider));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<HttpTransport, Error> {
        let region = self
            .region
            .ok_or_else(|| Error::new(ErrorKind::ConfigNotFound, "no AWS region configured"))?;
        let credentials = self
            .credentials
            .ok_or_else(|| Error::new(ErrorKind::NoCredentialsError, "no credentials provider configured"))?;

        let endpoint = self
            .endpoint
            .unwrap_or_else(|| format!("https://{SERVICE_NAME}.{region}.amazonaws.com/"));
        let endpoint = Url::parse(&endpoint).map_err(|err| {
            Error::with_source(
                ErrorKind::ConfigParserError,
                format!("invalid endpoint {endpoint}"),
                err,
            )
        })?;
        let host = match (endpoint.host_str(), endpoint.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(Error::new(
                    ErrorKind::ConfigParserError,
                    format!("endpoint {endpoint} has no host"),
                ))
            }
        };

        let http = reqwest::Client::builder()
            .timeout(self.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()
            .map_err(|err| Error::with_source(ErrorKind::DynamoDBException, "unable to build HTTP client", err))?;

        Ok(HttpTransport {
            http,
            endpoint,
            host,
            region,
            credentials,
            cached: Mutex::new(None),
        })
    }
}

impl HttpTransport {
    pub fn builder() -> HttpTransportBuilder {
        HttpTransportBuilder::default()
    }

    /// Resolve region, endpoint override and credentials the way the AWS SDKs do.
    pub async fn from_env() -> Result<Self, Error> {
        let config = aws_config::load_from_env().await;
        Self::from_sdk_config(&config)
    }

    pub fn from_sdk_config(config: &aws_config::SdkConfig) -> Result<Self, Error> {
        let mut builder = Self::builder();
        if let Some(region) = config.region() {
            builder = builder.region(region.to_string());
        }
        if let Some(endpoint) = config.endpoint_url() {
            builder = builder.endpoint(endpoint);
        }
        builder.credentials = config.credentials_provider();
        builder.build()
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    async fn credentials(&self) -> Result<Credentials, TransportError> {
        let mut cached = self.cached.lock().await;
        if let Some(credentials) = cached.as_ref() {
            let fresh = credentials
                .expiry()
                .map_or(true, |expiry| expiry > SystemTime::now() + REFRESH_WINDOW);
            if fresh {
                return Ok(credentials.clone());
            }
        }

        let credentials = self
            .credentials
            .provide_credentials()
            .await
            .map_err(credentials_error)?;
        *cached = Some(credentials.clone());
        Ok(credentials)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, action: &str, payload: &Json) -> Result<Option<Json>, TransportError> {
        let credentials = self.credentials().await?;
        let body = serde_json::to_vec(payload).map_err(|err| TransportError::Protocol(err.to_string()))?;
        let target = format!("{TARGET_PREFIX}.{action}");
        let headers = [
            ("content-type", CONTENT_TYPE),
            ("host", self.host.as_str()),
            ("x-amz-target", target.as_str()),
        ];

        let identity = &credentials.into();
        let signing_params: SigningParams<'_> = v4::SigningParams::builder()
            .identity(identity)
            .region(&self.region)
            .name(SERVICE_NAME)
            .time(SystemTime::now())
            .settings(SigningSettings::default())
            .build()
            .map_err(|err| TransportError::Protocol(format!("signing parameters: {err}")))?
            .into();
        let signable = SignableRequest::new(
            "POST",
            self.endpoint.as_str(),
            headers.iter().copied(),
            SignableBody::Bytes(&body),
        )
        .map_err(|err| TransportError::Protocol(format!("unsignable request: {err}")))?;
        let (instructions, _signature) = sign(signable, &signing_params)
            .map_err(|err| TransportError::Protocol(format!("signing failed: {err}")))?
            .into_parts();

        // reqwest derives Host from the URL
        let mut request = self.http.post(self.endpoint.clone());
        for (name, value) in headers.iter().filter(|(name, _)| *name != "host") {
            request = request.header(*name, *value);
        }
        for (name, value) in instructions.headers() {
            request = request.header(name, value);
        }

        let response = request.body(body).send().await.map_err(request_error)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(request_error)?;
        debug!(action, status = status.as_u16(), bytes = bytes.len(), "response received");

        if status.is_success() {
            if bytes.is_empty() {
                return Ok(None);
            }
            serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|err| TransportError::Protocol(format!("invalid response body: {err}")))
        } else {
            Err(TransportError::Http {
                status: status.as_u16(),
                body: serde_json::from_slice(&bytes).ok(),
            })
        }
    }
}

fn credentials_error(err: CredentialsError) -> TransportError {
    let message = err.to_string();
    match err {
        CredentialsError::InvalidConfiguration(_) => TransportError::ConfigParser {
            path: "credentials provider".to_string(),
            message,
        },
        CredentialsError::ProviderTimedOut(_) => TransportError::Connection(message),
        _ => TransportError::NoCredentials(message),
    }
}

fn request_error(err: reqwest::Error) -> TransportError {
    if err.is_connect() {
        TransportError::Connection(error_chain(&err))
    } else if err.is_timeout() {
        TransportError::Http {
            status: CLIENT_TIMEOUT_STATUS,
            body: None,
        }
    } else {
        TransportError::Connection(error_chain(&err))
    }
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn test_credentials() -> Credentials {
        Credentials::new("AKIDEXAMPLE", "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY", None, None, "test")
    }

    fn transport(endpoint: &str) -> HttpTransport {
        HttpTransport::builder()
            .endpoint(endpoint)
            .region("us-east-1")
            .credentials_provider(test_credentials())
            .timeout(Duration::from_millis(500))
            .build()
            .unwrap()
    }

    /// Accept one connection, capture the request head and answer with `response`.
    async fn serve_once(response: String) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}/", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0_u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request).to_string();
                if let Some(head_end) = text.find("\r\n\r\n") {
                    let length = text[..head_end]
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if request.len() >= head_end + 4 + length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&request).to_string()
        });
        (endpoint, handle)
    }

    fn http_response(status: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/x-amz-json-1.0\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    #[test]
    fn test_build_requires_region() {
        let err = HttpTransport::builder()
            .credentials_provider(test_credentials())
            .build()
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::ConfigNotFound);
    }

    #[test]
    fn test_build_requires_credentials() {
        let err = HttpTransport::builder().region("us-east-1").build().err().unwrap();
        assert_eq!(err.kind(), ErrorKind::NoCredentialsError);
    }

    #[test]
    fn test_build_rejects_malformed_endpoint() {
        let err = HttpTransport::builder()
            .region("us-east-1")
            .endpoint("not a url")
            .credentials_provider(test_credentials())
            .build()
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::ConfigParserError);
    }

    #[test]
    fn test_default_endpoint_follows_region() {
        let transport = HttpTransport::builder()
            .region("eu-central-1")
            .credentials_provider(test_credentials())
            .build()
            .unwrap();
        assert_eq!(transport.endpoint(), "https://dynamodb.eu-central-1.amazonaws.com/");
        assert_eq!(transport.host, "dynamodb.eu-central-1.amazonaws.com");
        assert_eq!(transport.region(), "eu-central-1");
    }

    #[test]
    fn test_host_keeps_explicit_port() {
        let transport = transport("http://localhost:8000");
        assert_eq!(transport.host, "localhost:8000");
    }

    #[test]
    fn test_credentials_errors_are_classified() {
        let not_loaded = credentials_error(CredentialsError::not_loaded("no provider"));
        assert!(matches!(not_loaded, TransportError::NoCredentials(_)));

        let invalid = credentials_error(CredentialsError::invalid_configuration("bad profile file"));
        assert!(matches!(invalid, TransportError::ConfigParser { .. }));

        let timed_out = credentials_error(CredentialsError::provider_timed_out(Duration::from_secs(5)));
        assert!(matches!(timed_out, TransportError::Connection(_)));
    }

    #[tokio::test]
    async fn test_signed_request_and_json_response() {
        let (endpoint, server) = serve_once(http_response("200 OK", r#"{"TableNames":["a"]}"#)).await;
        let transport = transport(&endpoint);

        let body = transport.fetch("ListTables", &json!({"Limit": 10})).await.unwrap();
        assert_eq!(body, Some(json!({"TableNames": ["a"]})));

        let request = server.await.unwrap().to_lowercase();
        assert!(request.starts_with("post / http/1.1"));
        assert!(request.contains("x-amz-target: dynamodb_20120810.listtables"));
        assert!(request.contains("content-type: application/x-amz-json-1.0"));
        assert!(request.contains("authorization: aws4-hmac-sha256 credential=akidexample/"));
        assert!(request.contains("/us-east-1/dynamodb/aws4_request"));
        assert!(request.contains("x-amz-date:"));
        assert!(request.ends_with(r#"{"limit":10}"#));
    }

    #[tokio::test]
    async fn test_empty_success_body_is_none() {
        let (endpoint, server) = serve_once(http_response("200 OK", "")).await;
        let body = transport(&endpoint).fetch("PutItem", &json!({})).await.unwrap();
        assert_eq!(body, None);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_error_status_carries_decoded_body() {
        let error_body = r#"{"__type":"com.amazonaws.dynamodb.v20120810#ResourceNotFoundException","message":"Requested resource not found"}"#;
        let (endpoint, server) = serve_once(http_response("400 Bad Request", error_body)).await;

        let err = transport(&endpoint).fetch("DescribeTable", &json!({"TableName": "missing"})).await.unwrap_err();
        server.await.unwrap();

        match &err {
            TransportError::Http { status, body } => {
                assert_eq!(*status, 400);
                assert!(body.is_some());
            }
            other => panic!("expected HTTP error, got {other:?}"),
        }
        assert_eq!(Error::from(err).kind(), ErrorKind::ResourceNotFound);
    }

    #[tokio::test]
    async fn test_connection_refused_is_connection_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}/", listener.local_addr().unwrap());
        drop(listener);

        let err = transport(&endpoint).fetch("ListTables", &json!({})).await.unwrap_err();
        assert!(matches!(err, TransportError::Connection(_)), "got {err:?}");
        assert_eq!(Error::from(err).kind(), ErrorKind::RequestException);
    }

    #[tokio::test]
    async fn test_slow_response_is_timeout_status() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}/", listener.local_addr().unwrap());
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(2)).await;
            drop(socket);
        });

        let err = transport(&endpoint).fetch("ListTables", &json!({})).await.unwrap_err();
        server.abort();

        assert!(
            matches!(err, TransportError::Http { status: CLIENT_TIMEOUT_STATUS, .. }),
            "got {err:?}"
        );
        assert_eq!(Error::from(err).kind(), ErrorKind::TimeoutException);
    }
}
