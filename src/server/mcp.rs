//! JSON-RPC 2.0 over stdio: the MCP handshake, `tools/list` and
//! `tools/call` dispatch into the `reasoning_*` handlers.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, error, info};

use super::{handle_tool_call, SharedState};

#[cfg(test)]
#[path = "mcp_tests.rs"]
mod mcp_tests;

const PROTOCOL_VERSION: &str = "2024-11-05";
const SERVER_NAME: &str = "mcp-reasoning-analysis";

const PARSE_ERROR: i32 = -32700;
const METHOD_NOT_FOUND: i32 = -32601;
const INVALID_PARAMS: i32 = -32602;
const INTERNAL_ERROR: i32 = -32603;

/// Incoming JSON-RPC message. No `id` means a notification.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    /// Protocol version, `"2.0"`.
    pub jsonrpc: String,
    /// Request id.
    pub id: Option<Value>,
    /// Method name.
    pub method: String,
    /// Method parameters.
    #[serde(default)]
    pub params: Option<Value>,
}

/// Outgoing JSON-RPC message; exactly one of `result` and `error` is set.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    /// Protocol version, `"2.0"`.
    pub jsonrpc: String,
    /// Id of the request answered, `null` when it could not be read.
    pub id: Value,
    /// Success payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Failure payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC error object.
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    /// Error code.
    pub code: i32,
    /// Error message.
    pub message: String,
    /// Extra data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Server name and version sent in the handshake.
#[derive(Debug, Serialize)]
pub struct ServerInfo {
    /// Server name.
    pub name: String,
    /// Crate version.
    pub version: String,
}

/// Advertised capabilities. Only tools are offered.
#[derive(Debug, Serialize)]
pub struct Capabilities {
    /// Tool capabilities.
    pub tools: ToolCapabilities,
}

/// Tool capabilities. The tool list is fixed.
#[derive(Debug, Serialize)]
pub struct ToolCapabilities {
    /// Always false.
    #[serde(rename = "listChanged")]
    pub list_changed: bool,
}

/// Reply to `initialize`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    /// Supported protocol version.
    pub protocol_version: String,
    /// Server capabilities.
    pub capabilities: Capabilities,
    /// Server identification.
    pub server_info: ServerInfo,
}

/// A tool entry in `tools/list`.
#[derive(Debug, Clone, Serialize)]
pub struct Tool {
    /// Name used in `tools/call`.
    pub name: String,
    /// What the tool returns.
    pub description: String,
    /// JSON Schema of the arguments.
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

impl Tool {
    fn new(name: &str, description: &str, input_schema: Value) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            input_schema,
        }
    }
}

/// `tools/call` parameters.
#[derive(Debug, Deserialize)]
pub struct ToolCallParams {
    /// Tool name.
    pub name: String,
    /// Tool arguments.
    #[serde(default)]
    pub arguments: Option<Value>,
}

/// One content item of a tool result.
#[derive(Debug, Serialize)]
pub struct ToolResultContent {
    /// Always `"text"`.
    #[serde(rename = "type")]
    pub content_type: String,
    /// Pretty-printed JSON payload or error message.
    pub text: String,
}

impl ToolResultContent {
    fn text(text: String) -> Self {
        Self {
            content_type: "text".to_string(),
            text,
        }
    }
}

/// Reply to `tools/call`. Tool failures are reported here with `isError`
/// rather than as JSON-RPC errors.
#[derive(Debug, Serialize)]
pub struct ToolCallResult {
    /// Result content.
    pub content: Vec<ToolResultContent>,
    /// Set when the tool failed.
    #[serde(rename = "isError", skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl JsonRpcResponse {
    /// Create a success response
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: id.unwrap_or(Value::Null),
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response
    pub fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: id.unwrap_or(Value::Null),
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

/// MCP server over stdin/stdout, one JSON message per line.
pub struct McpServer {
    state: SharedState,
}

impl McpServer {
    /// Create a server over shared state.
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }

    /// Serve until stdin closes.
    pub async fn run(&self) -> std::io::Result<()> {
        info!("MCP Reasoning Analysis Server starting...");

        let mut reader = BufReader::new(tokio::io::stdin());
        let mut stdout = tokio::io::stdout();
        let mut line = String::new();

        loop {
            line.clear();
            if reader.read_line(&mut line).await? == 0 {
                info!("EOF received, shutting down");
                break;
            }

            let message = line.trim();
            if message.is_empty() {
                continue;
            }
            debug!(request = %message, "Received request");

            let response = match serde_json::from_str::<JsonRpcRequest>(message) {
                Ok(request) => self.handle_request(request).await,
                Err(e) => {
                    error!(error = %e, "Failed to parse request");
                    Some(JsonRpcResponse::error(None, PARSE_ERROR, format!("Parse error: {}", e)))
                }
            };

            if let Some(response) = response {
                let response_json = serde_json::to_string(&response)?;
                debug!(response = %response_json, "Sending response");

                stdout.write_all(response_json.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                stdout.flush().await?;
            }
        }

        Ok(())
    }

    /// Route one message. Notifications get no response.
    async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let id = request.id;
        match request.method.as_str() {
            "initialize" => Some(initialize(id)),
            "tools/list" => Some(JsonRpcResponse::success(id, json!({ "tools": tools() }))),
            "tools/call" => Some(self.call_tool(id, request.params).await),
            "ping" => Some(JsonRpcResponse::success(id, json!({}))),
            method if id.is_none() => {
                debug!(method = %method, "Notification ignored");
                None
            }
            method => {
                error!(method = %method, "Unknown method");
                Some(JsonRpcResponse::error(
                    id,
                    METHOD_NOT_FOUND,
                    format!("Method not found: {}", method),
                ))
            }
        }
    }

    async fn call_tool(&self, id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
        let params: ToolCallParams = match params.map(serde_json::from_value::<ToolCallParams>) {
            Some(Ok(params)) => params,
            Some(Err(e)) => {
                return JsonRpcResponse::error(id, INVALID_PARAMS, format!("Invalid params: {}", e))
            }
            None => return JsonRpcResponse::error(id, INVALID_PARAMS, "Missing params"),
        };

        info!(tool = %params.name, "Handling tool call");

        let result = match handle_tool_call(&self.state, &params.name, params.arguments).await {
            Ok(payload) => ToolCallResult {
                content: vec![ToolResultContent::text(
                    serde_json::to_string_pretty(&payload).unwrap_or_else(|e| {
                        error!(error = %e, "Failed to serialize tool result");
                        format!("{{\"error\": \"Serialization failed: {}\"}}", e)
                    }),
                )],
                is_error: None,
            },
            Err(e) => ToolCallResult {
                content: vec![ToolResultContent::text(format!("Error: {}", e))],
                is_error: Some(true),
            },
        };

        respond(id, result)
    }
}

fn initialize(id: Option<Value>) -> JsonRpcResponse {
    info!("Handling initialize request");
    respond(
        id,
        InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: Capabilities {
                tools: ToolCapabilities {
                    list_changed: false,
                },
            },
            server_info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        },
    )
}

fn respond(id: Option<Value>, result: impl Serialize) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => {
            error!(error = %e, "Failed to serialize result");
            JsonRpcResponse::error(id, INTERNAL_ERROR, format!("Internal error: {}", e))
        }
    }
}

// ============================================================================
// Tool registry
// ============================================================================

/// Every tool served, in listing order.
pub fn tools() -> Vec<Tool> {
    vec![
        Tool::new(
            "reasoning_parse_chain",
            "Segment free-form reasoning text into ordered steps and classify each step with one or more reasoning types (goal, decision, meta, uncertainty, causal, hypothetical, incentive, evaluation-aware). Returns the chain with source offsets and matched cues.",
            object_schema(
                json!({
                    "text": {"type": "string", "description": "Reasoning text to parse"},
                    "parser": parser_override_schema()
                }),
                &["text"],
            ),
        ),
        Tool::new(
            "reasoning_detect_awareness",
            "Score how strongly the reasoning signals awareness of being tested, observed or evaluated. Returns the score, the threshold decision, and the contributing steps with their cues.",
            text_schema("Reasoning text to analyze"),
        ),
        Tool::new(
            "reasoning_assess_quality",
            "Score reasoning quality on clarity, completeness, consistency and specificity, each with supporting and detracting steps, plus the weighted overall score.",
            text_schema("Reasoning text to assess"),
        ),
        Tool::new(
            "reasoning_counterfactual",
            "Apply interventions (remove_step, reorder_steps, ablate_cue, negate_type) to the parsed chain and measure behavioral divergence and flipped steps. Runs one default intervention per enabled kind when none are given.",
            object_schema(
                json!({
                    "text": {"type": "string", "description": "Reasoning text to perturb"},
                    "interventions": {
                        "type": "array",
                        "description": "Interventions to apply, in order. Step indices are 1-based.",
                        "items": intervention_schema()
                    }
                }),
                &["text"],
            ),
        ),
        Tool::new(
            "reasoning_analyze",
            "Parse the reasoning and run every analysis: awareness detection, quality assessment and default counterfactual interventions. Returns one combined report.",
            text_schema("Reasoning text to analyze"),
        ),
        Tool::new(
            "reasoning_trace_decision",
            "Record a decision with its context and reasoning. The reasoning is parsed into a chain and appended to the server's decision path.",
            object_schema(
                json!({
                    "decision": {"type": "string", "description": "The decision taken"},
                    "reasoning": {"type": "string", "description": "Reasoning behind the decision"},
                    "context": {"type": "object", "description": "Optional free-form context"}
                }),
                &["decision", "reasoning"],
            ),
        ),
        Tool::new(
            "reasoning_decision_path",
            "Return every decision traced so far, in order, with a type histogram over their reasoning chains.",
            json!({"type": "object", "properties": {}, "additionalProperties": false}),
        ),
    ]
}

fn object_schema(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required
    })
}

fn text_schema(description: &str) -> Value {
    object_schema(
        json!({"text": {"type": "string", "description": description}}),
        &["text"],
    )
}

fn parser_override_schema() -> Value {
    json!({
        "type": "object",
        "description": "Optional parser settings for this call",
        "properties": {
            "max_steps": {"type": "integer", "minimum": 1},
            "min_step_length": {"type": "integer", "minimum": 0},
            "segmentation_strategy": {
                "type": "string",
                "enum": ["auto", "enumerated", "sentence", "paragraph"]
            },
            "strict_classification": {"type": "boolean"}
        },
        "additionalProperties": false
    })
}

fn intervention_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "type": {
                "type": "string",
                "enum": ["remove_step", "reorder_steps", "ablate_cue", "negate_type"]
            },
            "index": {"type": "integer", "description": "Step to remove (remove_step)"},
            "permutation": {
                "type": "array",
                "items": {"type": "integer"},
                "description": "New order as baseline step indices (reorder_steps)"
            },
            "step_index": {"type": "integer", "description": "Target step (ablate_cue, negate_type)"},
            "cue": {"type": "string", "description": "Cue text to delete (ablate_cue)"},
            "reasoning_type": {"type": "string", "description": "Type to suppress (negate_type)"}
        },
        "required": ["type"]
    })
}
