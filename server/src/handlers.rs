//! Request handlers.
//!
//! Every procedure request follows the same path:
//! parse input → open a request scope → build the context → dispatch inside
//! `catch_unwind` → sanitize → wrap in a [`ResponseEnvelope`].

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::{BytesRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::header::{ALLOW, HeaderName};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use futures_util::FutureExt;
use futures_util::future::join_all;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use switchyard_rpc::{Access, RequestScope, new_request_id};
use switchyard_types::{
    RequestContext, RequestEnvelope, RequestId, RequestMeta, ResponseEnvelope, RpcError,
    RpcResult,
};
use tracing::{debug, info};

use crate::sanitize::{panic_message, sanitize_for_client};
use crate::state::AppState;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Upper bound on calls in one batched request.
pub const MAX_BATCH_CALLS: usize = 32;

/// Query string accepted on procedure routes.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct CallParams {
    input: Option<String>,
    batch: Option<String>,
}

impl CallParams {
    fn is_batch(&self) -> bool {
        matches!(self.batch.as_deref(), Some("1" | "true"))
    }
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "procedures": state.router.len(),
    }))
}

pub(crate) async fn handle_get(
    State(state): State<AppState>,
    procedure: Result<Path<String>, PathRejection>,
    params: Result<Query<CallParams>, QueryRejection>,
    headers: HeaderMap,
) -> Response {
    let (procedure, params) = match extract_call(procedure, params) {
        Ok(call) => call,
        Err(err) => return reject(Method::GET, err),
    };
    let input = match params.input.as_deref() {
        None => Ok(Value::Null),
        Some(raw) => serde_json::from_str(raw)
            .map_err(|e| RpcError::parse_error(format!("input is not valid JSON: {e}"))),
    };
    respond(&state, Method::GET, &procedure, &params, input, &headers).await
}

pub(crate) async fn handle_post(
    State(state): State<AppState>,
    procedure: Result<Path<String>, PathRejection>,
    params: Result<Query<CallParams>, QueryRejection>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let (procedure, params) = match extract_call(procedure, params) {
        Ok(call) => call,
        Err(err) => return reject(Method::POST, err),
    };
    let input = match body {
        Ok(body) => parse_post_body(&body),
        Err(rejection) => Err(RpcError::parse_error(format!(
            "failed to read request body: {}",
            rejection.body_text()
        ))),
    };
    respond(&state, Method::POST, &procedure, &params, input, &headers).await
}

/// Turn axum's plain-text extractor rejections into RPC errors.
fn extract_call(
    procedure: Result<Path<String>, PathRejection>,
    params: Result<Query<CallParams>, QueryRejection>,
) -> RpcResult<(String, CallParams)> {
    let Path(procedure) = procedure.map_err(|rejection| {
        RpcError::bad_input(format!("invalid procedure path: {}", rejection.body_text()))
    })?;
    let Query(params) = params.map_err(|rejection| {
        RpcError::parse_error(format!("invalid query string: {}", rejection.body_text()))
    })?;
    Ok((procedure, params))
}

/// Requests refused before a scope is opened still get an id and an envelope.
fn reject(method: Method, err: RpcError) -> Response {
    let request_id = new_request_id();
    info!(
        method = %method,
        request_id = %request_id,
        status = err.code.http_status(),
        "rejected request: {}",
        err.message
    );
    with_request_id(
        envelope_response(ResponseEnvelope::from_result(Err(err))),
        &request_id,
    )
}

/// Unmatched paths: answer in the same JSON shape as everything else.
pub(crate) async fn fallback(method: Method, uri: Uri) -> Response {
    let err = RpcError::not_found(format!("no route for {method} {}", uri.path()));
    envelope_response(ResponseEnvelope::from_result(Err(err)))
}

pub(crate) async fn method_not_allowed(method: Method) -> Response {
    let err = RpcError::method_not_supported(format!("{method} is not supported; use GET or POST"));
    with_allow(
        envelope_response(ResponseEnvelope::from_result(Err(err))),
        "GET, POST",
    )
}

fn parse_post_body(body: &[u8]) -> RpcResult<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice::<RequestEnvelope>(body)
        .map(|envelope| envelope.input)
        .map_err(|e| RpcError::parse_error(format!("body is not a valid request envelope: {e}")))
}

async fn respond(
    state: &AppState,
    method: Method,
    procedure: &str,
    params: &CallParams,
    input: RpcResult<Value>,
    headers: &HeaderMap,
) -> Response {
    let started = Instant::now();
    let access = if method == Method::GET {
        Access::QueryOnly
    } else {
        Access::Any
    };
    let scope = state.arena.scope();
    let meta = request_meta(headers);

    let batch_len = procedure.split(',').count();
    let (status, response) = if params.is_batch() && batch_len > MAX_BATCH_CALLS {
        let err = RpcError::bad_input(format!(
            "batch of {batch_len} calls exceeds the limit of {MAX_BATCH_CALLS}"
        ));
        let envelope = ResponseEnvelope::from_result(Err(err));
        (status_of(&envelope), envelope_response(envelope))
    } else if params.is_batch() {
        let envelopes = run_batch(state, &scope, &meta, procedure, access, input).await;
        let status = if envelopes
            .iter()
            .all(|e| matches!(e, ResponseEnvelope::Success { .. }))
        {
            StatusCode::OK
        } else {
            StatusCode::MULTI_STATUS
        };
        (status, (status, Json(envelopes)).into_response())
    } else {
        let result = match input {
            Ok(input) => run_one(state, &scope, &meta, procedure, access, input).await,
            Err(err) => Err(err),
        };
        let envelope = ResponseEnvelope::from_result(result);
        let status = status_of(&envelope);
        let response = envelope_response(envelope);
        if status == StatusCode::METHOD_NOT_ALLOWED {
            // Only mutations are refused over GET.
            (status, with_allow(response, "POST"))
        } else {
            (status, response)
        }
    };

    info!(
        method = %method,
        procedure,
        request_id = %scope.request_id(),
        status = status.as_u16(),
        elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        "handled request"
    );
    with_request_id(response, scope.request_id())
}

async fn run_one(
    state: &AppState,
    scope: &RequestScope,
    meta: &RequestMeta,
    procedure: &str,
    access: Access,
    input: Value,
) -> RpcResult<Value> {
    let ctx = guarded_context(state, scope, meta)
        .await
        .map_err(|err| sanitize_for_client(err, procedure, scope.request_id()))?;
    guarded_dispatch(state, procedure, access, input, ctx).await
}

/// Batch: comma-separated names, input object keyed by position, one shared
/// request scope.
async fn run_batch(
    state: &AppState,
    scope: &RequestScope,
    meta: &RequestMeta,
    procedures: &str,
    access: Access,
    input: RpcResult<Value>,
) -> Vec<ResponseEnvelope> {
    let names: Vec<&str> = procedures.split(',').collect();
    let fail_all = |err: RpcError| {
        names
            .iter()
            .map(|_| ResponseEnvelope::from_result(Err(err.clone())))
            .collect::<Vec<_>>()
    };

    let inputs = match input {
        Ok(Value::Object(map)) => map,
        Ok(Value::Null) => Map::new(),
        Ok(_) => {
            return fail_all(RpcError::bad_input(
                "batch input must be an object keyed by call index",
            ));
        }
        Err(err) => return fail_all(err),
    };

    let ctx = match guarded_context(state, scope, meta).await {
        Ok(ctx) => ctx,
        Err(err) => return fail_all(sanitize_for_client(err, procedures, scope.request_id())),
    };

    debug!(count = names.len(), request_id = %scope.request_id(), "dispatching batch");
    let calls = names.iter().enumerate().map(|(i, name)| {
        let input = inputs.get(&i.to_string()).cloned().unwrap_or(Value::Null);
        let ctx = Arc::clone(&ctx);
        async move {
            ResponseEnvelope::from_result(guarded_dispatch(state, name, access, input, ctx).await)
        }
    });
    join_all(calls).await
}

/// Context factories and auth providers are user code too: a panic there is
/// an internal error, not a dropped connection.
async fn guarded_context(
    state: &AppState,
    scope: &RequestScope,
    meta: &RequestMeta,
) -> RpcResult<Arc<RequestContext>> {
    AssertUnwindSafe(scope.context(state.contexts.as_ref(), meta))
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| {
            Err(RpcError::internal(format!(
                "context factory panicked: {}",
                panic_message(payload.as_ref())
            )))
        })
}

async fn guarded_dispatch(
    state: &AppState,
    procedure: &str,
    access: Access,
    input: Value,
    ctx: Arc<RequestContext>,
) -> RpcResult<Value> {
    let request_id = ctx.request_id().clone();
    let outcome = AssertUnwindSafe(state.router.dispatch(procedure, access, input, ctx))
        .catch_unwind()
        .await;
    let result = match outcome {
        Ok(result) => result,
        Err(payload) => Err(RpcError::internal(format!(
            "procedure panicked: {}",
            panic_message(payload.as_ref())
        ))),
    };
    result.map_err(|err| sanitize_for_client(err, procedure, &request_id))
}

fn request_meta(headers: &HeaderMap) -> RequestMeta {
    let mut meta = RequestMeta::new();
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            meta.push_header(name.as_str(), value);
        }
    }
    meta
}

fn status_of(envelope: &ResponseEnvelope) -> StatusCode {
    StatusCode::from_u16(envelope.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

fn envelope_response(envelope: ResponseEnvelope) -> Response {
    (status_of(&envelope), Json(envelope)).into_response()
}

fn with_request_id(mut response: Response, request_id: &RequestId) -> Response {
    if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    response
}

fn with_allow(mut response: Response, methods: &'static str) -> Response {
    response
        .headers_mut()
        .insert(ALLOW, HeaderValue::from_static(methods));
    response
}
