use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::Value;
use tracing::debug;

use super::dto::StatusReply;
use crate::common::response::{
    INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR, RpcErrorObject, RpcRequest,
    RpcResponse,
};
use crate::state::AppState;

pub const GET_STATUS: &str = "get_status";

/// JSON-RPC 2.0 endpoint. The only method is `get_status`.
#[utoipa::path(
    post,
    path = "/rpc",
    request_body = RpcRequest,
    responses(
        (status = 200, description = "JSON-RPC response", body = RpcResponse<StatusReply>),
        (status = 204, description = "Notification processed, no response body")
    ),
    tag = "Status"
)]
pub async fn rpc(State(state): State<AppState>, body: Bytes) -> Response {
    let value: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            return RpcResponse::<()>::error(PARSE_ERROR, format!("Parse error: {}", e), Value::Null)
                .into_response();
        }
    };

    let Some(object) = value.as_object() else {
        return invalid_request("request must be a JSON object", Value::Null);
    };

    let is_notification = !object.contains_key("id");
    let id = object.get("id").cloned().unwrap_or(Value::Null);
    if !matches!(id, Value::Null | Value::String(_) | Value::Number(_)) {
        return invalid_request("id must be a string, number or null", Value::Null);
    }

    let request: RpcRequest = match serde_json::from_value(value) {
        Ok(r) => r,
        Err(e) => return invalid_request(&e.to_string(), id),
    };
    if request.jsonrpc != "2.0" {
        return invalid_request("jsonrpc must be \"2.0\"", id);
    }

    debug!(method = %request.method, "RPC request");
    let outcome = dispatch(&state, &request);

    if is_notification {
        return StatusCode::NO_CONTENT.into_response();
    }

    match outcome {
        Ok(reply) => RpcResponse::success(reply, id).into_response(),
        Err(err) => RpcResponse::<()>::error(err.code, err.message, id).into_response(),
    }
}

fn dispatch(state: &AppState, request: &RpcRequest) -> Result<StatusReply, RpcErrorObject> {
    match request.method.as_str() {
        GET_STATUS => {
            if !params_are_empty(request.params.as_ref()) {
                return Err(RpcErrorObject {
                    code: INVALID_PARAMS,
                    message: format!("{} takes no parameters", GET_STATUS),
                });
            }
            Ok(StatusReply::from(state.progress.read()))
        }
        other => Err(RpcErrorObject {
            code: METHOD_NOT_FOUND,
            message: format!("Method not found: {}", other),
        }),
    }
}

fn params_are_empty(params: Option<&Value>) -> bool {
    match params {
        None | Some(Value::Null) => true,
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Object(fields)) => fields.is_empty(),
        Some(_) => false,
    }
}

fn invalid_request(message: &str, id: Value) -> Response {
    RpcResponse::<()>::error(INVALID_REQUEST, format!("Invalid Request: {}", message), id)
        .into_response()
}
