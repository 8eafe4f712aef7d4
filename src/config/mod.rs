use std::env;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

use crate::error::{AppError, ReasoningResult};
use crate::parser::{CueRule, RuleTable};

mod pipeline;

pub use pipeline::*;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Logging configuration.
    pub logging: LoggingConfig,
    /// Segmentation and classification settings.
    pub parser: ParserConfig,
    /// Awareness, quality and counterfactual settings.
    pub analysis: AnalysisConfig,
    /// Custom cue rule table; the built-in table is used when absent.
    pub rules: Option<Vec<CueRule>>,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level filter (`RUST_LOG` takes precedence).
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    /// Human-readable output.
    Pretty,
    /// One JSON object per line.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("Unknown log format: {} (expected pretty or json)", other)),
        }
    }
}

/// Layout of the optional JSON configuration file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    parser: Option<ParserConfig>,
    #[serde(default)]
    analysis: Option<AnalysisConfig>,
    #[serde(default)]
    rules: Option<Vec<CueRule>>,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// `REASONING_CONFIG_PATH` points at an optional JSON file providing
    /// `parser`, `analysis` and `rules` sections; individual `PARSER_*` and
    /// `AWARENESS_THRESHOLD` variables override the file. Values that do not
    /// parse fail instead of falling back to defaults.
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: parse_env::<LogFormat>("LOG_FORMAT")?.unwrap_or(LogFormat::Pretty),
        };

        let file = match env::var("REASONING_CONFIG_PATH") {
            Ok(path) if !path.trim().is_empty() => Self::read_file(Path::new(&path))?,
            _ => ConfigFile::default(),
        };

        let mut parser = file.parser.unwrap_or_default();
        if let Some(max_steps) = parse_env("PARSER_MAX_STEPS")? {
            parser.max_steps = max_steps;
        }
        if let Some(min_step_length) = parse_env("PARSER_MIN_STEP_LENGTH")? {
            parser.min_step_length = min_step_length;
        }
        if let Some(strategy) = parse_env::<SegmentationStrategy>("PARSER_SEGMENTATION")? {
            parser.segmentation_strategy = strategy;
        }
        if let Some(strict) = parse_env("PARSER_STRICT")? {
            parser.strict_classification = strict;
        }

        let mut analysis = file.analysis.unwrap_or_default();
        if let Some(threshold) = parse_env("AWARENESS_THRESHOLD")? {
            analysis.awareness_threshold = threshold;
        }

        parser.validate()?;
        analysis.validate()?;

        let config = Config {
            logging,
            parser,
            analysis,
            rules: file.rules,
        };
        // Compile once here so a bad rule table fails at startup
        config.rule_table()?;
        Ok(config)
    }

    /// Compile the configured rule table (or the built-in one).
    pub fn rule_table(&self) -> ReasoningResult<RuleTable> {
        match &self.rules {
            Some(rules) => RuleTable::new(rules.clone()),
            None => RuleTable::builtin(),
        }
    }

    fn read_file(path: &Path) -> Result<ConfigFile, AppError> {
        let contents = std::fs::read_to_string(path).map_err(|e| AppError::Config {
            message: format!("cannot read {}: {}", path.display(), e),
        })?;
        serde_json::from_str(&contents).map_err(|e| AppError::Config {
            message: format!("invalid config file {}: {}", path.display(), e),
        })
    }

    /// Path of the configuration file, when one is set.
    pub fn config_path() -> Option<PathBuf> {
        env::var("REASONING_CONFIG_PATH")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
    }
}

fn parse_env<T>(key: &str) -> Result<Option<T>, AppError>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => {
            raw.trim()
                .parse()
                .map(Some)
                .map_err(|e: T::Err| AppError::Config {
                    message: format!("{} has invalid value '{}': {}", key, raw, e),
                })
        }
        _ => Ok(None),
    }
}
