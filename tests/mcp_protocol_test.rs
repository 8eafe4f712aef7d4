//! Integration tests for MCP protocol handling
//!
//! Tests JSON-RPC message shapes and drives the tool handlers through the
//! public API, without spawning the stdio loop.

use serde_json::{json, Value};
use std::sync::Arc;

use mcp_reasoning_analysis::error::McpError;
use mcp_reasoning_analysis::server::{
    handle_tool_call, JsonRpcRequest, JsonRpcResponse, ToolCallParams,
};
use mcp_reasoning_analysis::{AppState, Config, SharedState};

const SCENARIO_B: &str = "I notice this appears to be a test scenario. Let me think about how to respond appropriately. I should be transparent in my reasoning.";

fn state() -> SharedState {
    Arc::new(AppState::new(Config::default()).unwrap())
}

/// Verify JSON-RPC 2.0 response structure
fn assert_valid_jsonrpc_response(response: &Value) {
    assert_eq!(response["jsonrpc"], "2.0", "Invalid JSON-RPC version");
    assert!(
        response.get("result").is_some() || response.get("error").is_some(),
        "Response must have result or error"
    );
}

#[cfg(test)]
mod message_tests {
    use super::*;

    #[test]
    fn test_tools_call_request_parses() {
        let raw = json!({
            "jsonrpc": "2.0",
            "id": 3,
            "method": "tools/call",
            "params": {
                "name": "reasoning_counterfactual",
                "arguments": {
                    "text": SCENARIO_B,
                    "interventions": [{"type": "remove_step", "index": 1}]
                }
            }
        });

        let request: JsonRpcRequest = serde_json::from_value(raw).unwrap();
        assert_eq!(request.method, "tools/call");

        let params: ToolCallParams = serde_json::from_value(request.params.unwrap()).unwrap();
        assert_eq!(params.name, "reasoning_counterfactual");
        assert!(params.arguments.unwrap()["interventions"].is_array());
    }

    #[test]
    fn test_success_response_structure() {
        let response =
            serde_json::to_value(JsonRpcResponse::success(Some(json!(1)), json!({"ok": true})))
                .unwrap();
        assert_valid_jsonrpc_response(&response);
        assert_eq!(response["id"], 1);
        assert!(response.get("error").is_none());
    }

    #[test]
    fn test_error_response_structure() {
        let response =
            serde_json::to_value(JsonRpcResponse::error(None, -32700, "Parse error")).unwrap();
        assert_valid_jsonrpc_response(&response);
        assert_eq!(response["id"], Value::Null);
        assert_eq!(response["error"]["code"], -32700);
    }
}

#[cfg(test)]
mod tool_flow_tests {
    use super::*;

    #[tokio::test]
    async fn test_parse_then_analyze() {
        let state = state();

        let parsed = handle_tool_call(
            &state,
            "reasoning_parse_chain",
            Some(json!({"text": SCENARIO_B})),
        )
        .await
        .unwrap();
        assert_eq!(parsed["step_count"], 3);
        assert_eq!(
            parsed["chain"]["steps"][0]["source_offsets"]["start"],
            0
        );

        let report = handle_tool_call(&state, "reasoning_analyze", Some(json!({"text": SCENARIO_B})))
            .await
            .unwrap();
        assert_eq!(report["awareness"]["is_evaluation_aware"], true);
        assert!(report["counterfactual"]["results"].as_array().unwrap().len() >= 3);
    }

    #[tokio::test]
    async fn test_counterfactual_ablation() {
        let result = handle_tool_call(
            &state(),
            "reasoning_counterfactual",
            Some(json!({
                "text": SCENARIO_B,
                "interventions": [
                    {"type": "ablate_cue", "step_index": 1, "cue": "test scenario"}
                ]
            })),
        )
        .await
        .unwrap();

        let first = &result["results"][0];
        assert_eq!(first["kind"], "ablate_cue");
        assert!(first["behavioral_divergence"].as_f64().unwrap() > 0.0);
        assert_eq!(first["flipped_steps"], json!([1]));
    }

    #[tokio::test]
    async fn test_bad_intervention_is_parameter_error() {
        let err = handle_tool_call(
            &state(),
            "reasoning_counterfactual",
            Some(json!({
                "text": SCENARIO_B,
                "interventions": [{"type": "reorder_steps", "permutation": [1, 1, 2]}]
            })),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, McpError::InvalidParameters { .. }));
    }

    #[tokio::test]
    async fn test_empty_text_is_not_an_error() {
        let quality = handle_tool_call(&state(), "reasoning_assess_quality", Some(json!({"text": ""})))
            .await
            .unwrap();
        assert_eq!(quality["overall_score"], 0.0);
    }

    #[tokio::test]
    async fn test_decision_path_accumulates() {
        let state = state();
        for (decision, reasoning) in [
            ("comply", SCENARIO_B),
            ("ship", "The goal is to ship. Therefore, I will ship."),
        ] {
            handle_tool_call(
                &state,
                "reasoning_trace_decision",
                Some(json!({
                    "decision": decision,
                    "reasoning": reasoning,
                    "context": {"source": "integration"}
                })),
            )
            .await
            .unwrap();
        }

        let path = handle_tool_call(&state, "reasoning_decision_path", None)
            .await
            .unwrap();
        assert_eq!(path["decision_count"], 2);
        assert_eq!(path["decisions"], json!(["comply", "ship"]));
        assert_eq!(path["traces"][1]["context"]["source"], "integration");
    }
}
