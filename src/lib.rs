//! # MCP Reasoning Analysis Server
//!
//! A Model Context Protocol (MCP) server that turns free-form reasoning text
//! into a structured chain of typed steps and analyzes it deterministically.
//!
//! ## Features
//!
//! - **Segmentation**: sentence, paragraph or marker-based step splitting
//! - **Classification**: cue-rule tagging with per-type confidences
//! - **Evaluation Awareness**: detection of reasoning about being tested
//! - **Quality Metrics**: clarity, completeness, consistency and specificity
//! - **Counterfactuals**: step removal, reordering, cue ablation and type negation
//! - **Decision Tracing**: an ordered path of decisions with parsed reasoning
//!
//! ## Architecture
//!
//! ```text
//! MCP Client → MCP Server (stdio) → ReasoningParser → ReasoningChain
//!                                          ↓
//!                                    ChainAnalyzer → ChainReport
//! ```
//!
//! ## Example
//!
//! ```
//! use mcp_reasoning_analysis::{ChainAnalyzer, Config, ReasoningParser};
//!
//! let config = Config::default();
//! let parser = ReasoningParser::new(config.parser.clone()).unwrap();
//! let analyzer = ChainAnalyzer::new(&parser, &config.analysis).unwrap();
//!
//! let chain = parser
//!     .parse("This looks like a test scenario. I will answer honestly.")
//!     .unwrap();
//! let report = analyzer.analyze(&chain).unwrap();
//! assert!(report.awareness.is_evaluation_aware);
//! ```

#![warn(missing_docs)]

/// Awareness, quality and counterfactual analyses over reasoning chains.
pub mod analysis;
/// Reasoning chain data model.
pub mod chain;
/// Command-line subcommands.
pub mod cli;
/// Configuration management for the server and pipeline.
pub mod config;
/// Error types and result aliases for the application.
pub mod error;
/// Text → chain pipeline: segmentation and cue classification.
pub mod parser;
/// MCP server implementation and request handling.
pub mod server;
/// Decision tracing.
pub mod trace;

pub use analysis::{ChainAnalyzer, ChainReport};
pub use chain::{ReasoningChain, ReasoningStep, ReasoningType};
pub use config::Config;
pub use error::{AppError, AppResult, ReasoningError, ReasoningResult};
pub use parser::ReasoningParser;
pub use server::{AppState, McpServer, SharedState};
pub use trace::{DecisionPath, DecisionTrace, DecisionTracer};
