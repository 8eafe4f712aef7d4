//! Server module for MCP protocol handling.
//!
//! This module provides:
//! - MCP server implementation over stdio
//! - Tool call handlers and routing
//! - Shared application state management

mod handlers;
mod mcp;

pub use handlers::*;
pub use mcp::*;

use std::sync::Arc;
use tokio::sync::Mutex;

use crate::analysis::ChainAnalyzer;
use crate::config::Config;
use crate::error::ReasoningResult;
use crate::parser::ReasoningParser;
use crate::trace::DecisionTracer;

/// Application state shared across handlers.
///
/// The parser and analyzer are read-only; only the decision tracer holds
/// state that changes between calls.
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Text → chain pipeline.
    pub parser: ReasoningParser,
    /// Awareness, quality and counterfactual analyses.
    pub analyzer: ChainAnalyzer,
    /// Decision path recorded through `reasoning_trace_decision`.
    pub tracer: Mutex<DecisionTracer>,
}

impl AppState {
    /// Create new application state, building the pipeline from `config`.
    pub fn new(config: Config) -> ReasoningResult<Self> {
        let parser = ReasoningParser::with_rules(config.parser.clone(), config.rule_table()?)?;
        let analyzer = ChainAnalyzer::new(&parser, &config.analysis)?;
        let tracer = Mutex::new(DecisionTracer::new(parser.clone()));

        tracing::info!(
            segmentation = %config.parser.segmentation_strategy,
            max_steps = config.parser.max_steps,
            rules = parser.classifier().rules().len(),
            awareness_threshold = config.analysis.awareness_threshold,
            "AppState initialized"
        );

        Ok(Self {
            config,
            parser,
            analyzer,
            tracer,
        })
    }
}

/// Shared application state handle
pub type SharedState = Arc<AppState>;
