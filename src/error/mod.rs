use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Reasoning error: {0}")]
    Reasoning(#[from] ReasoningError),

    #[error("MCP protocol error: {0}")]
    Mcp(#[from] McpError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the parsing and analysis pipeline.
///
/// The variants separate "could not build a chain" from "could not classify
/// a step" from "bad configuration", so callers can react to each.
#[derive(Debug, Error)]
pub enum ReasoningError {
    #[error("Malformed chain: {message}")]
    MalformedChain { message: String },

    #[error("Invalid configuration: {field} - {reason}")]
    InvalidConfiguration { field: String, reason: String },

    #[error("Unclassifiable input at bytes {start}..{end}: no cue rule matched '{excerpt}'")]
    UnclassifiableInput {
        start: usize,
        end: usize,
        excerpt: String,
    },

    #[error("Invalid intervention {kind}: {reason}")]
    InvalidIntervention { kind: String, reason: String },
}

impl ReasoningError {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        ReasoningError::MalformedChain {
            message: message.into(),
        }
    }

    pub(crate) fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ReasoningError::InvalidConfiguration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_intervention(kind: impl Into<String>, reason: impl Into<String>) -> Self {
        ReasoningError::InvalidIntervention {
            kind: kind.into(),
            reason: reason.into(),
        }
    }
}

/// MCP protocol errors
#[derive(Debug, Error)]
pub enum McpError {
    #[error("Unknown tool: {tool_name}")]
    UnknownTool { tool_name: String },

    #[error("Invalid parameters for {tool_name}: {message}")]
    InvalidParameters { tool_name: String, message: String },

    #[error("Tool execution failed: {message}")]
    ExecutionFailed { message: String },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<ReasoningError> for McpError {
    fn from(err: ReasoningError) -> Self {
        McpError::ExecutionFailed {
            message: err.to_string(),
        }
    }
}

impl From<AppError> for McpError {
    fn from(err: AppError) -> Self {
        McpError::ExecutionFailed {
            message: err.to_string(),
        }
    }
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for pipeline and analysis operations
pub type ReasoningResult<T> = Result<T, ReasoningError>;

/// Result type alias for MCP operations
pub type McpResult<T> = Result<T, McpError>;
