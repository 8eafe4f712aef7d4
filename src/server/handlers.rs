use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::info;

use super::SharedState;
use crate::analysis::Intervention;
use crate::chain::{ReasoningChain, ReasoningType, TypeDistribution};
use crate::config::ParserConfig;
use crate::error::{McpError, McpResult, ReasoningError};
use crate::parser::ReasoningParser;

/// Route tool calls to appropriate handlers
pub async fn handle_tool_call(
    state: &SharedState,
    tool_name: &str,
    arguments: Option<Value>,
) -> McpResult<Value> {
    info!(tool = %tool_name, "Routing tool call");

    match tool_name {
        "reasoning_parse_chain" => handle_parse_chain(state, arguments),
        "reasoning_detect_awareness" => handle_detect_awareness(state, arguments),
        "reasoning_assess_quality" => handle_assess_quality(state, arguments),
        "reasoning_counterfactual" => handle_counterfactual(state, arguments),
        "reasoning_analyze" => handle_analyze(state, arguments),
        "reasoning_trace_decision" => handle_trace_decision(state, arguments).await,
        "reasoning_decision_path" => handle_decision_path(state).await,
        _ => Err(McpError::UnknownTool {
            tool_name: tool_name.to_string(),
        }),
    }
}

// ============================================================================
// Parameters
// ============================================================================

/// Arguments shared by the text-only tools.
#[derive(Debug, Deserialize)]
pub struct TextParams {
    /// Reasoning text to parse.
    pub text: String,
}

/// Arguments for `reasoning_parse_chain`.
#[derive(Debug, Deserialize)]
pub struct ParseChainParams {
    /// Reasoning text to parse.
    pub text: String,
    /// Per-call parser settings replacing the configured ones.
    #[serde(default)]
    pub parser: Option<ParserConfig>,
}

/// Arguments for `reasoning_counterfactual`.
#[derive(Debug, Deserialize)]
pub struct CounterfactualParams {
    /// Reasoning text to parse.
    pub text: String,
    /// Interventions to run; one default per enabled kind when absent.
    #[serde(default)]
    pub interventions: Option<Vec<Intervention>>,
}

/// Arguments for `reasoning_trace_decision`.
#[derive(Debug, Deserialize)]
pub struct TraceDecisionParams {
    /// The decision taken.
    pub decision: String,
    /// Reasoning behind the decision.
    pub reasoning: String,
    /// Free-form context.
    #[serde(default)]
    pub context: BTreeMap<String, Value>,
}

// ============================================================================
// Responses
// ============================================================================

/// Result of `reasoning_parse_chain`.
#[derive(Debug, Serialize)]
pub struct ParseChainResponse {
    /// The parsed chain.
    pub chain: ReasoningChain,
    /// Number of steps.
    pub step_count: usize,
    /// Type → step count histogram.
    pub type_distribution: TypeDistribution,
    /// Most frequent classified type.
    pub dominant_type: Option<ReasoningType>,
}

/// Result of `reasoning_decision_path`.
#[derive(Debug, Serialize)]
pub struct DecisionPathResponse {
    /// Number of traced decisions.
    pub decision_count: usize,
    /// Decisions in order.
    pub decisions: Vec<String>,
    /// Type histogram over every traced chain.
    pub type_distribution: TypeDistribution,
    /// Full traces.
    pub traces: Value,
}

// ============================================================================
// Handlers
// ============================================================================

fn handle_parse_chain(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    const TOOL: &str = "reasoning_parse_chain";
    let params: ParseChainParams = parse_arguments(TOOL, arguments)?;

    let chain = match params.parser {
        Some(config) => {
            let rules = state.parser.classifier().rules().clone();
            let parser =
                ReasoningParser::with_rules(config, rules).map_err(|e| reasoning_failure(TOOL, e))?;
            parser.parse(&params.text)
        }
        None => state.parser.parse(&params.text),
    }
    .map_err(|e| reasoning_failure(TOOL, e))?;

    let type_distribution = chain.type_distribution().clone();
    let response = ParseChainResponse {
        step_count: chain.len(),
        dominant_type: type_distribution.dominant_type(),
        type_distribution,
        chain,
    };
    serde_json::to_value(response).map_err(McpError::Json)
}

fn handle_detect_awareness(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    const TOOL: &str = "reasoning_detect_awareness";
    let chain = parse_text(state, TOOL, arguments)?;
    let result = state.analyzer.detector().detect(&chain);
    serde_json::to_value(result).map_err(McpError::Json)
}

fn handle_assess_quality(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    const TOOL: &str = "reasoning_assess_quality";
    let chain = parse_text(state, TOOL, arguments)?;
    let result = state.analyzer.assessor().assess(&chain);
    serde_json::to_value(result).map_err(McpError::Json)
}

fn handle_counterfactual(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    const TOOL: &str = "reasoning_counterfactual";
    let params: CounterfactualParams = parse_arguments(TOOL, arguments)?;
    let chain = state
        .parser
        .parse(&params.text)
        .map_err(|e| reasoning_failure(TOOL, e))?;

    let counterfactual = state.analyzer.counterfactual();
    let report = match params.interventions {
        Some(interventions) => counterfactual.analyze(&chain, &interventions),
        None => counterfactual.analyze_all(&chain),
    }
    .map_err(|e| reasoning_failure(TOOL, e))?;

    serde_json::to_value(report).map_err(McpError::Json)
}

fn handle_analyze(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    const TOOL: &str = "reasoning_analyze";
    let chain = parse_text(state, TOOL, arguments)?;
    let report = state
        .analyzer
        .analyze(&chain)
        .map_err(|e| reasoning_failure(TOOL, e))?;
    serde_json::to_value(report).map_err(McpError::Json)
}

async fn handle_trace_decision(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    const TOOL: &str = "reasoning_trace_decision";
    let params: TraceDecisionParams = parse_arguments(TOOL, arguments)?;

    let mut tracer = state.tracer.lock().await;
    let trace = tracer
        .trace(params.decision, params.context, params.reasoning)
        .map_err(|e| reasoning_failure(TOOL, e))?;
    serde_json::to_value(trace).map_err(McpError::Json)
}

async fn handle_decision_path(state: &SharedState) -> McpResult<Value> {
    let tracer = state.tracer.lock().await;
    let path = tracer.path();
    let response = DecisionPathResponse {
        decision_count: path.len(),
        decisions: path.decisions().into_iter().map(String::from).collect(),
        type_distribution: path.type_distribution(),
        traces: serde_json::to_value(path.traces())?,
    };
    serde_json::to_value(response).map_err(McpError::Json)
}

// ============================================================================
// Helpers
// ============================================================================

fn parse_text(
    state: &SharedState,
    tool_name: &str,
    arguments: Option<Value>,
) -> McpResult<ReasoningChain> {
    let params: TextParams = parse_arguments(tool_name, arguments)?;
    state
        .parser
        .parse(&params.text)
        .map_err(|e| reasoning_failure(tool_name, e))
}

/// Caller mistakes become parameter errors; anything else is an execution
/// failure.
fn reasoning_failure(tool_name: &str, err: ReasoningError) -> McpError {
    match err {
        ReasoningError::InvalidConfiguration { .. } | ReasoningError::InvalidIntervention { .. } => {
            McpError::InvalidParameters {
                tool_name: tool_name.to_string(),
                message: err.to_string(),
            }
        }
        other => other.into(),
    }
}

fn parse_arguments<T: serde::de::DeserializeOwned>(
    tool_name: &str,
    arguments: Option<Value>,
) -> McpResult<T> {
    match arguments {
        Some(args) => serde_json::from_value(args).map_err(|e| McpError::InvalidParameters {
            tool_name: tool_name.to_string(),
            message: e.to_string(),
        }),
        None => Err(McpError::InvalidParameters {
            tool_name: tool_name.to_string(),
            message: "Missing arguments".to_string(),
        }),
    }
}
