//! Command-line subcommands.
//!
//! `serve` runs the MCP server over stdio; `analyze` runs the full analysis
//! over a file or stdin and prints the JSON report.

use clap::Subcommand;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::analysis::ChainAnalyzer;
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::parser::ReasoningParser;

/// Top-level CLI subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Run the MCP server over stdio (default)
    Serve,

    /// Analyze reasoning text and print the JSON report
    Analyze {
        /// Read the text from this file instead of stdin
        #[arg(long)]
        file: Option<PathBuf>,

        /// Print compact single-line JSON
        #[arg(long)]
        compact: bool,
    },
}

/// Result of CLI command execution.
#[derive(Debug)]
pub struct CliResult {
    /// Exit code (0 = success)
    pub exit_code: i32,
    /// Output message
    pub message: String,
}

impl CliResult {
    /// Create a success result with the given message.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            message: message.into(),
        }
    }

    /// Create an error result with the given message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            exit_code: 1,
            message: message.into(),
        }
    }
}

/// Read input text from `file`, or from stdin when no file is given.
pub fn read_input(file: Option<&Path>) -> AppResult<String> {
    match file {
        Some(path) => std::fs::read_to_string(path).map_err(|e| AppError::Config {
            message: format!("cannot read {}: {}", path.display(), e),
        }),
        None => {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text)?;
            Ok(text)
        }
    }
}

/// Parse and analyze `text`, rendering the report as JSON.
pub fn execute_analyze(config: &Config, text: &str, compact: bool) -> CliResult {
    match analyze_to_json(config, text, compact) {
        Ok(json) => CliResult::success(json),
        Err(e) => CliResult::error(format!("Error: {}", e)),
    }
}

fn analyze_to_json(config: &Config, text: &str, compact: bool) -> AppResult<String> {
    let parser = ReasoningParser::with_rules(config.parser.clone(), config.rule_table()?)?;
    let analyzer = ChainAnalyzer::new(&parser, &config.analysis)?;
    let chain = parser.parse(text)?;
    let report = analyzer.analyze(&chain)?;

    let rendered = if compact {
        serde_json::to_string(&report)
    } else {
        serde_json::to_string_pretty(&report)
    };
    rendered.map_err(|e| AppError::Config {
        message: format!("cannot serialize report: {}", e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParserConfig;
    use std::io::Write;

    #[test]
    fn test_execute_analyze_pretty_and_compact() {
        let config = Config::default();
        let pretty = execute_analyze(&config, "This is a test. I will comply.", false);
        assert_eq!(pretty.exit_code, 0);
        assert!(pretty.message.contains('\n'));

        let compact = execute_analyze(&config, "This is a test. I will comply.", true);
        assert_eq!(compact.exit_code, 0);
        assert!(!compact.message.contains('\n'));

        let report: serde_json::Value = serde_json::from_str(&compact.message).unwrap();
        assert_eq!(report["awareness"]["is_evaluation_aware"], true);
    }

    #[test]
    fn test_execute_analyze_strict_failure() {
        let config = Config {
            parser: ParserConfig {
                strict_classification: true,
                ..ParserConfig::default()
            },
            ..Config::default()
        };
        let result = execute_analyze(&config, "The sky is blue.", true);
        assert_eq!(result.exit_code, 1);
        assert!(result.message.contains("Unclassifiable input"));
    }

    #[test]
    fn test_read_input_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "Maybe it works.").unwrap();
        assert_eq!(read_input(Some(file.path())).unwrap(), "Maybe it works.");
    }

    #[test]
    fn test_read_input_missing_file() {
        let err = read_input(Some(Path::new("/nonexistent/reasoning.txt"))).unwrap_err();
        assert!(matches!(err, AppError::Config { .. }));
    }
}
