//! Text → chain pipeline.
//!
//! This module provides the three pipeline stages and the parser that
//! chains them:
//! - [`Segmenter`]: structural splitting into candidate spans
//! - [`Classifier`]: rule-driven multi-label classification
//! - [`ReasoningParser`]: segment → classify → [`ChainBuilder`]
//!
//! [`ChainBuilder`]: crate::chain::ChainBuilder

mod classifier;
mod rules;
mod segmenter;

pub use classifier::*;
pub use rules::{default_rules, CueRule, RuleScope, RuleTable};
pub(crate) use rules::cue_regex;
pub use segmenter::*;

use tracing::debug;

use crate::chain::{ChainBuilder, ClassifiedSpan, ReasoningChain};
use crate::config::ParserConfig;
use crate::error::ReasoningResult;

/// Parses raw text into a [`ReasoningChain`].
///
/// Holds only read-only configuration; the same parser may be shared
/// across threads and calls.
#[derive(Debug, Clone)]
pub struct ReasoningParser {
    config: ParserConfig,
    segmenter: Segmenter,
    classifier: Classifier,
}

impl ReasoningParser {
    /// Create a parser with the built-in rule table
    pub fn new(config: ParserConfig) -> ReasoningResult<Self> {
        Self::with_rules(config, RuleTable::builtin()?)
    }

    /// Create a parser with a custom rule table
    pub fn with_rules(config: ParserConfig, rules: RuleTable) -> ReasoningResult<Self> {
        config.validate()?;
        Ok(Self {
            segmenter: Segmenter::new(&config),
            classifier: Classifier::new(rules, config.strict_classification),
            config,
        })
    }

    /// Run the full pipeline over `text`.
    ///
    /// Empty or whitespace-only text yields an empty chain.
    pub fn parse(&self, text: &str) -> ReasoningResult<ReasoningChain> {
        let spans = self.segmenter.segment(text);
        let classified = spans
            .into_iter()
            .map(|span| self.classifier.classify_span(text, span))
            .collect::<ReasoningResult<Vec<ClassifiedSpan>>>()?;

        let chain = ChainBuilder::build(text, classified)?;
        debug!(
            text_len = text.len(),
            steps = chain.len(),
            "Text parsed into reasoning chain"
        );
        Ok(chain)
    }

    /// Parser configuration.
    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// The segmentation stage.
    pub fn segmenter(&self) -> &Segmenter {
        &self.segmenter
    }

    /// The classification stage.
    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Same pipeline with strict classification turned off.
    pub(crate) fn lenient(&self) -> Self {
        let config = ParserConfig {
            strict_classification: false,
            ..self.config.clone()
        };
        Self {
            segmenter: self.segmenter.clone(),
            classifier: Classifier::new(self.classifier.rules().clone(), false),
            config,
        }
    }
}
