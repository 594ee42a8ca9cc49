//! reqwest-based client for OpenAI-compatible gateways.

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::header::{ACCEPT, HeaderValue};
use reqwest::{Client, RequestBuilder, Response};
use tokio_util::sync::CancellationToken;

use crate::client::{GatewayFuture, GatewayHooks, GatewayOperation, NoopGatewayHooks};
use crate::stream::{relay_sse, spawn_stream_task};
use crate::wire::{decode_error, decode_model_list, decode_response, encode_request};
use crate::{GatewayClient, GatewayError, ModelRequest, ModelResponse, SecretString, StreamHandle};

pub const DEFAULT_BASE_URL: &str = "https://ai-gateway.vercel.sh";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct HttpGatewayConfig {
    pub base_url: String,
    pub api_key: SecretString,
    /// Whole-request budget for `complete`; for `stream` it bounds the wait for response
    /// headers only.
    pub timeout: Duration,
}

impl HttpGatewayConfig {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Clone)]
pub struct HttpGatewayClient {
    http: Client,
    config: Arc<HttpGatewayConfig>,
    hooks: Arc<dyn GatewayHooks>,
}

impl std::fmt::Debug for HttpGatewayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpGatewayClient")
            .field("base_url", &self.config.base_url)
            .field("timeout", &self.config.timeout)
            .finish_non_exhaustive()
    }
}

impl HttpGatewayClient {
    pub fn new(config: HttpGatewayConfig) -> Result<Self, GatewayError> {
        let http = Client::builder().build().map_err(|error| {
            GatewayError::other(format!("failed to build HTTP client: {error}"))
        })?;
        Ok(Self::with_client(http, config))
    }

    /// Shares an existing connection pool.
    pub fn with_client(http: Client, config: HttpGatewayConfig) -> Self {
        Self {
            http,
            config: Arc::new(config),
            hooks: Arc::new(NoopGatewayHooks),
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn GatewayHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Lists model ids advertised by `GET /v1/models`.
    pub async fn list_models(&self) -> Result<Vec<String>, GatewayError> {
        let started = Instant::now();
        let operation = GatewayOperation::ListModels;
        self.hooks.on_request_start(operation, "");

        let result = async {
            let response = self
                .authorized(self.http.get(self.endpoint("v1/models")))
                .timeout(self.config.timeout)
                .send()
                .await
                .map_err(map_send_error)?;
            let body = read_success_body(response).await?;
            decode_model_list(&body)
        }
        .await;

        self.observe(operation, "", started, &result);
        result
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.bearer_auth(self.config.api_key.expose())
    }

    fn observe<T>(
        &self,
        operation: GatewayOperation,
        model: &str,
        started: Instant,
        result: &Result<T, GatewayError>,
    ) {
        match result {
            Ok(_) => self
                .hooks
                .on_request_success(operation, model, started.elapsed()),
            Err(error) => {
                self.hooks
                    .on_request_failure(operation, model, started.elapsed(), error)
            }
        }
    }

    async fn send_complete(&self, request: &ModelRequest) -> Result<ModelResponse, GatewayError> {
        let body = encode_request(request, false)?;
        let response = self
            .authorized(self.http.post(self.endpoint("v1/chat/completions")))
            .json(&body)
            .timeout(self.config.timeout)
            .send()
            .await
            .map_err(map_send_error)?;

        let body = read_success_body(response).await?;
        decode_response(&body)
    }

    async fn open_stream(&self, request: &ModelRequest) -> Result<Response, GatewayError> {
        let body = encode_request(request, true)?;
        let pending = self
            .authorized(self.http.post(self.endpoint("v1/chat/completions")))
            .header(ACCEPT, HeaderValue::from_static("text/event-stream"))
            .json(&body)
            .send();

        let response = tokio::time::timeout(self.config.timeout, pending)
            .await
            .map_err(|_| GatewayError::timeout("timed out waiting for stream response"))?
            .map_err(map_send_error)?;

        if !response.status().is_success() {
            return Err(read_error(response).await);
        }
        Ok(response)
    }
}

impl GatewayClient for HttpGatewayClient {
    fn complete<'a>(
        &'a self,
        request: ModelRequest,
    ) -> GatewayFuture<'a, Result<ModelResponse, GatewayError>> {
        Box::pin(async move {
            request.validate()?;
            let started = Instant::now();
            self.hooks
                .on_request_start(GatewayOperation::Complete, &request.model);

            let result = self.send_complete(&request).await;
            self.observe(GatewayOperation::Complete, &request.model, started, &result);
            result
        })
    }

    fn stream(&self, request: ModelRequest, cancel: CancellationToken) -> StreamHandle {
        let client = self.clone();

        spawn_stream_task(cancel, move |cancel, events| async move {
            request.validate()?;
            let started = Instant::now();
            client
                .hooks
                .on_request_start(GatewayOperation::Stream, &request.model);

            let opened = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(GatewayError::cancelled("stream cancelled")),
                opened = client.open_stream(&request) => opened,
            };
            client.observe(GatewayOperation::Stream, &request.model, started, &opened);

            relay_sse(opened?.bytes_stream(), &cancel, &events).await
        })
    }
}

fn map_send_error(error: reqwest::Error) -> GatewayError {
    if error.is_timeout() {
        GatewayError::timeout(format!("request timed out: {error}"))
    } else {
        GatewayError::transport(format!("failed to send request: {error}"))
    }
}

async fn read_success_body(response: Response) -> Result<Vec<u8>, GatewayError> {
    if !response.status().is_success() {
        return Err(read_error(response).await);
    }

    response
        .bytes()
        .await
        .map(|bytes| bytes.to_vec())
        .map_err(|error| GatewayError::transport(format!("failed to read response: {error}")))
}

async fn read_error(response: Response) -> GatewayError {
    let status = response.status().as_u16();
    let body = response.bytes().await.unwrap_or_default();
    decode_error(status, &body)
}
