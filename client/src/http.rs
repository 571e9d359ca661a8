//! HTTP link.
//!
//! ```text
//! query     : GET  {endpoint}/{name}?input=<json>
//! mutation  : POST {endpoint}/{name}            body {"input": <json>}
//! batch     : GET|POST {endpoint}/{a,b,c}?batch=1   input {"0": .., "1": .., "2": ..}
//! ```

use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde_json::{Map, Value};
use switchyard_config::SwitchyardConfig;
use switchyard_types::{
    ErrorCode, ProcedureKind, RequestEnvelope, ResponseEnvelope, RpcError, RpcResult,
};
use tracing::debug;
use url::Url;

use crate::link::{Link, LinkFut, Operation};

const CONNECT_TIMEOUT_SECS: u64 = 10;
const REQUEST_TIMEOUT_SECS: u64 = 30;
const MAX_ERROR_SNIPPET_BYTES: usize = 512;

/// Link that talks to a remote transport adapter.
#[derive(Debug, Clone)]
pub struct HttpLink {
    client: reqwest::Client,
    endpoint: Url,
    headers: Vec<(String, String)>,
}

impl HttpLink {
    /// `base_url` is an origin such as `http://localhost:3000`; `base_path` is
    /// where the router is mounted, such as `/api/trpc`.
    pub fn new(base_url: &str, base_path: &str) -> RpcResult<Self> {
        let joined = format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            base_path.trim_matches('/')
        );
        let endpoint = Url::parse(&joined)
            .map_err(|e| RpcError::internal(format!("invalid endpoint '{joined}': {e}")))?;
        if endpoint.cannot_be_a_base() {
            return Err(RpcError::internal(format!(
                "endpoint '{joined}' cannot carry procedure paths"
            )));
        }
        Ok(Self {
            client: default_client()?,
            endpoint,
            headers: Vec::new(),
        })
    }

    /// Endpoint from the config file (if any) and the process environment.
    pub fn from_env() -> RpcResult<Self> {
        Self::from_config(&SwitchyardConfig::load_or_default())
    }

    /// Origin from [`SwitchyardConfig::base_url`], mounted at the configured
    /// base path.
    pub fn from_config(config: &SwitchyardConfig) -> RpcResult<Self> {
        Self::new(config.base_url().as_str(), &config.base_path())
    }

    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Attach a header to every request (an auth header, for example).
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// URL for one procedure (or a comma-joined batch of them).
    pub fn procedure_url(&self, name: &str) -> RpcResult<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|()| RpcError::internal("endpoint cannot carry procedure paths"))?
            .pop_if_empty()
            .push(name);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        self.headers
            .iter()
            .fold(self.client.request(method, url), |req, (k, v)| {
                req.header(k.as_str(), v.as_str())
            })
    }

    async fn send_one(&self, op: Operation) -> RpcResult<Value> {
        let mut url = self.procedure_url(&op.path)?;
        let response = match op.kind {
            ProcedureKind::Query => {
                if !op.input.is_null() {
                    url.query_pairs_mut()
                        .append_pair("input", &op.input.to_string());
                }
                debug!(procedure = %op.path, "GET");
                self.request(Method::GET, url).send().await
            }
            ProcedureKind::Mutation => {
                debug!(procedure = %op.path, "POST");
                self.request(Method::POST, url)
                    .json(&RequestEnvelope::new(op.input))
                    .send()
                    .await
            }
        }
        .map_err(transport_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(transport_error)?;
        match serde_json::from_slice::<ResponseEnvelope>(&body) {
            Ok(envelope) => envelope.into_result(),
            Err(_) => Err(non_json_error(status, &body)),
        }
    }

    async fn send_batch(&self, ops: Vec<Operation>) -> Vec<RpcResult<Value>> {
        let count = ops.len();
        match self.try_send_batch(ops).await {
            Ok(results) => results,
            Err(err) => vec![Err(err); count],
        }
    }

    async fn try_send_batch(&self, ops: Vec<Operation>) -> RpcResult<Vec<RpcResult<Value>>> {
        let count = ops.len();
        let all_queries = ops.iter().all(|op| op.kind == ProcedureKind::Query);
        let names = ops
            .iter()
            .map(|op| op.path.as_str())
            .collect::<Vec<_>>()
            .join(",");
        let inputs: Map<String, Value> = ops
            .into_iter()
            .enumerate()
            .map(|(i, op)| (i.to_string(), op.input))
            .collect();

        let mut url = self.procedure_url(&names)?;
        url.query_pairs_mut().append_pair("batch", "1");
        debug!(procedures = %names, count, "batch");

        let response = if all_queries {
            url.query_pairs_mut()
                .append_pair("input", &Value::Object(inputs).to_string());
            self.request(Method::GET, url).send().await
        } else {
            self.request(Method::POST, url)
                .json(&RequestEnvelope::new(Value::Object(inputs)))
                .send()
                .await
        }
        .map_err(transport_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(transport_error)?;
        if let Ok(envelopes) = serde_json::from_slice::<Vec<ResponseEnvelope>>(&body) {
            if envelopes.len() != count {
                return Err(RpcError::internal(format!(
                    "batch returned {} results for {count} calls",
                    envelopes.len()
                )));
            }
            return Ok(envelopes
                .into_iter()
                .map(ResponseEnvelope::into_result)
                .collect());
        }
        // The whole batch was rejected with a single envelope.
        match serde_json::from_slice::<ResponseEnvelope>(&body) {
            Ok(envelope) => Err(envelope
                .into_result()
                .err()
                .unwrap_or_else(|| RpcError::internal("batch returned a single success"))),
            Err(_) => Err(non_json_error(status, &body)),
        }
    }
}

impl Link for HttpLink {
    fn call(&self, op: Operation) -> LinkFut<'_, RpcResult<Value>> {
        Box::pin(self.send_one(op))
    }

    fn call_batch(&self, ops: Vec<Operation>) -> LinkFut<'_, Vec<RpcResult<Value>>> {
        Box::pin(async move {
            if ops.is_empty() {
                return Vec::new();
            }
            self.send_batch(ops).await
        })
    }
}

fn default_client() -> RpcResult<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .map_err(|e| RpcError::internal(format!("failed to build HTTP client: {e}")))
}

fn transport_error(err: reqwest::Error) -> RpcError {
    RpcError::internal(format!("transport error: {err}"))
}

fn non_json_error(status: StatusCode, body: &[u8]) -> RpcError {
    let text = String::from_utf8_lossy(body);
    let snippet: String = text.chars().take(MAX_ERROR_SNIPPET_BYTES).collect();
    RpcError::new(
        ErrorCode::from_http_status(status.as_u16()),
        format!("HTTP {status}: {snippet}"),
    )
}
