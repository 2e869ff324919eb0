// src/mcp/server.rs

use super::{
    codes, query_tool_descriptor, sse, JsonRpcError, JsonRpcRequest, JsonRpcResponse, ToolResult,
    JSONRPC_VERSION, PROTOCOL_VERSION, QUERY_TOOL,
};
use crate::duck::QueryEngine;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::{reject::Rejection, reply::Reply, Filter};

/// Largest request body accepted on `/mcp`.
const MAX_BODY_BYTES: u64 = 1024 * 1024;

/// Stateless JSON-RPC handler exposing the `query` tool over a DuckDB engine.
pub struct McpServer {
    engine: Arc<QueryEngine>,
}

impl McpServer {
    pub fn new(engine: Arc<QueryEngine>) -> Self {
        Self { engine }
    }

    /// Dispatch one request. Notifications (no `id`) get no response.
    pub fn handle(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let id = match request.id {
            Some(id) => id,
            None => {
                debug!(method = %request.method, "notification");
                return None;
            }
        };

        if request.jsonrpc != JSONRPC_VERSION {
            return Some(JsonRpcResponse::failure(
                id,
                JsonRpcError::new(codes::INVALID_REQUEST, "jsonrpc must be \"2.0\""),
            ));
        }

        let outcome = match request.method.as_str() {
            "initialize" => Ok(json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": { "tools": {} },
                "serverInfo": {
                    "name": env!("CARGO_PKG_NAME"),
                    "version": env!("CARGO_PKG_VERSION"),
                }
            })),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": [query_tool_descriptor()] })),
            "tools/call" => self.call_tool(&request.params),
            other => Err(JsonRpcError::new(
                codes::METHOD_NOT_FOUND,
                format!("method not found: {}", other),
            )),
        };

        Some(match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(err) => JsonRpcResponse::failure(id, err),
        })
    }

    fn call_tool(&self, params: &Value) -> Result<Value, JsonRpcError> {
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| JsonRpcError::new(codes::INVALID_PARAMS, "missing tool name"))?;
        if name != QUERY_TOOL {
            return Err(JsonRpcError::new(
                codes::INVALID_PARAMS,
                format!("unknown tool: {}", name),
            ));
        }
        let sql = params
            .pointer("/arguments/query")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                JsonRpcError::new(codes::INVALID_PARAMS, "missing string argument 'query'")
            })?;

        let start = Instant::now();
        let result = match self.engine.query(sql) {
            Ok(table) => {
                info!(rows = table.num_rows(), elapsed = ?start.elapsed(), "query ok");
                ToolResult::text(table.render())
            }
            Err(e) => {
                warn!(error = %e, elapsed = ?start.elapsed(), "query failed");
                ToolResult::error(format!("Error: {:#}", e))
            }
        };

        serde_json::to_value(result)
            .map_err(|e| JsonRpcError::new(codes::INTERNAL_ERROR, e.to_string()))
    }
}

/// `GET /health` and `POST /mcp` (with or without trailing slash).
pub fn routes(
    server: Arc<McpServer>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .map(|| {
            warp::reply::json(&json!({
                "status": "healthy",
                "service": env!("CARGO_PKG_NAME"),
            }))
        });

    let with_server = warp::any().map(move || server.clone());
    let mcp = warp::path("mcp")
        .and(warp::path::end())
        .and(warp::post())
        .and(with_server)
        .and(warp::header::optional::<String>("accept"))
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::bytes())
        .and_then(handle_http);

    health.or(mcp)
}

async fn handle_http(
    server: Arc<McpServer>,
    accept: Option<String>,
    body: Bytes,
) -> Result<warp::reply::Response, Rejection> {
    let wants_sse = accept.map_or(false, |a| a.contains("text/event-stream"));

    let raw: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            let err = JsonRpcError::new(codes::PARSE_ERROR, format!("parse error: {}", e));
            return Ok(respond(&JsonRpcResponse::failure(Value::Null, err), wants_sse));
        }
    };
    let id = raw.get("id").cloned().unwrap_or(Value::Null);
    let request: JsonRpcRequest = match serde_json::from_value(raw) {
        Ok(r) => r,
        Err(e) => {
            let err = JsonRpcError::new(codes::INVALID_REQUEST, format!("invalid request: {}", e));
            return Ok(respond(&JsonRpcResponse::failure(id, err), wants_sse));
        }
    };

    debug!(method = %request.method, "rpc");
    let response = match tokio::task::spawn_blocking(move || server.handle(request)).await {
        Ok(Some(response)) => response,
        Ok(None) => {
            return Ok(warp::reply::with_status(warp::reply(), StatusCode::ACCEPTED).into_response())
        }
        Err(e) => JsonRpcResponse::failure(
            id,
            JsonRpcError::new(codes::INTERNAL_ERROR, format!("handler failed: {}", e)),
        ),
    };
    Ok(respond(&response, wants_sse))
}

fn respond(response: &JsonRpcResponse, wants_sse: bool) -> warp::reply::Response {
    if !wants_sse {
        return warp::reply::json(response).into_response();
    }
    let body = match serde_json::to_string(response) {
        Ok(body) => body,
        Err(e) => {
            warn!(error = %e, "serializing response");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    let reply =
        warp::reply::with_header(sse::encode_event(&body), "content-type", "text/event-stream");
    warp::reply::with_header(reply, "cache-control", "no-cache").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::parse_ascii_table;

    fn server() -> Arc<McpServer> {
        let engine = QueryEngine::open_in_memory().unwrap();
        engine
            .execute_batch(
                "CREATE TABLE routes(airline VARCHAR, stops INTEGER);
                 INSERT INTO routes VALUES ('BA', 0), ('AF', 1), ('BA', 0);",
            )
            .unwrap();
        Arc::new(McpServer::new(Arc::new(engine)))
    }

    fn call(sql: &str) -> JsonRpcRequest {
        JsonRpcRequest::query_tool_call("t-1", "test", sql)
    }

    #[test]
    fn tools_call_returns_ascii_table() {
        let sql = "SELECT airline, COUNT(*) AS n FROM routes GROUP BY airline ORDER BY airline";
        let resp = server().handle(call(sql)).unwrap();
        assert_eq!(resp.id, json!("t-1"));
        let result = resp.result.unwrap();
        assert_eq!(result["isError"], json!(false));
        let text = result["content"][0]["text"].as_str().unwrap();
        let parsed = parse_ascii_table(text);
        assert_eq!(parsed.columns, vec!["airline", "n"]);
        assert_eq!(parsed.records.len(), 2);
    }

    #[test]
    fn sql_failure_is_a_tool_error() {
        let resp = server().handle(call("SELECT * FROM nowhere")).unwrap();
        let result = resp.result.unwrap();
        assert_eq!(result["isError"], json!(true));
        assert!(result["content"][0]["text"]
            .as_str()
            .unwrap()
            .starts_with("Error:"));
    }

    #[test]
    fn protocol_errors() {
        let s = server();
        let unknown = JsonRpcRequest {
            jsonrpc: "2.0".into(),
            id: Some(json!(7)),
            method: "resources/list".into(),
            params: Value::Null,
        };
        let resp = s.handle(unknown).unwrap();
        assert_eq!(resp.error.unwrap().code, codes::METHOD_NOT_FOUND);

        let mut wrong_tool = call("SELECT 1");
        wrong_tool.params["name"] = json!("drop_everything");
        assert_eq!(s.handle(wrong_tool).unwrap().error.unwrap().code, codes::INVALID_PARAMS);

        let mut no_query = call("SELECT 1");
        no_query.params["arguments"] = json!({});
        assert_eq!(s.handle(no_query).unwrap().error.unwrap().code, codes::INVALID_PARAMS);

        let mut old = call("SELECT 1");
        old.jsonrpc = "1.0".into();
        assert_eq!(s.handle(old).unwrap().error.unwrap().code, codes::INVALID_REQUEST);
    }

    #[test]
    fn notifications_get_no_response() {
        let note = JsonRpcRequest {
            jsonrpc: "2.0".into(),
            id: None,
            method: "notifications/initialized".into(),
            params: Value::Null,
        };
        assert!(server().handle(note).is_none());
    }

    #[test]
    fn initialize_and_list() {
        let s = server();
        let init = JsonRpcRequest {
            jsonrpc: "2.0".into(),
            id: Some(json!(1)),
            method: "initialize".into(),
            params: json!({}),
        };
        let result = s.handle(init).unwrap().result.unwrap();
        assert_eq!(result["protocolVersion"], json!(PROTOCOL_VERSION));

        let list = JsonRpcRequest {
            jsonrpc: "2.0".into(),
            id: Some(json!(2)),
            method: "tools/list".into(),
            params: Value::Null,
        };
        let result = s.handle(list).unwrap().result.unwrap();
        assert_eq!(result["tools"][0]["name"], json!("query"));
    }

    #[tokio::test]
    async fn http_sse_reply() {
        let routes = routes(server());
        let body = serde_json::to_vec(&call("SELECT 1 AS one")).unwrap();
        let resp = warp::test::request()
            .method("POST")
            .path("/mcp/")
            .header("accept", "application/json, text/event-stream")
            .header("content-type", "application/json")
            .body(body)
            .reply(&routes)
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["content-type"], "text/event-stream");
        let text = String::from_utf8(resp.body().to_vec()).unwrap();
        let payload = sse::first_data_payload(text.as_bytes()).unwrap().unwrap();
        let envelope: Value = serde_json::from_str(&payload).unwrap();
        let table = envelope["result"]["content"][0]["text"].as_str().unwrap();
        assert_eq!(parse_ascii_table(table).records.len(), 1);
    }

    #[tokio::test]
    async fn http_plain_json_and_errors() {
        let routes = routes(server());

        let resp = warp::test::request()
            .method("POST")
            .path("/mcp")
            .header("accept", "application/json")
            .body(serde_json::to_vec(&call("SELECT 2")).unwrap())
            .reply(&routes)
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["content-type"], "application/json");

        let resp = warp::test::request()
            .method("POST")
            .path("/mcp/")
            .body("{not json")
            .reply(&routes)
            .await;
        let envelope: Value = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(envelope["error"]["code"], json!(codes::PARSE_ERROR));

        let resp = warp::test::request()
            .method("POST")
            .path("/mcp/")
            .body(r#"{"jsonrpc":"2.0","id":3}"#)
            .reply(&routes)
            .await;
        let envelope: Value = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(envelope["error"]["code"], json!(codes::INVALID_REQUEST));
        assert_eq!(envelope["id"], json!(3));

        let resp = warp::test::request()
            .method("POST")
            .path("/mcp/")
            .body(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .reply(&routes)
            .await;
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn health_check() {
        let resp = warp::test::request()
            .method("GET")
            .path("/health")
            .reply(&routes(server()))
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
