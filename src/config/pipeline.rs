//! Parser and analysis configuration.
//!
//! Both records deserialize with `deny_unknown_fields` and are validated
//! when constructed through [`ParserConfig::from_json`] /
//! [`AnalysisConfig::from_json`] or by the components that consume them, so
//! misconfiguration surfaces before any analysis runs.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::analysis::{InterventionKind, QualityDimension};
use crate::chain::ReasoningType;
use crate::error::{ReasoningError, ReasoningResult};

// ============================================================================
// Parser
// ============================================================================

/// How the segmenter splits text into candidate steps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentationStrategy {
    /// Enumerations first, then sentences, then paragraphs.
    #[default]
    Auto,
    /// Numbered, lettered or bulleted list items only.
    Enumerated,
    /// Sentence-terminal punctuation followed by whitespace.
    Sentence,
    /// Newline-delimited lines.
    Paragraph,
}

impl SegmentationStrategy {
    /// Get the strategy name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentationStrategy::Auto => "auto",
            SegmentationStrategy::Enumerated => "enumerated",
            SegmentationStrategy::Sentence => "sentence",
            SegmentationStrategy::Paragraph => "paragraph",
        }
    }
}

impl fmt::Display for SegmentationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SegmentationStrategy {
    type Err = ReasoningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(SegmentationStrategy::Auto),
            "enumerated" => Ok(SegmentationStrategy::Enumerated),
            "sentence" => Ok(SegmentationStrategy::Sentence),
            "paragraph" => Ok(SegmentationStrategy::Paragraph),
            other => Err(ReasoningError::invalid_config(
                "segmentation_strategy",
                format!("unknown strategy '{}'", other),
            )),
        }
    }
}

/// Segmentation and classification options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParserConfig {
    /// Maximum number of steps kept; later spans are discarded.
    pub max_steps: usize,
    /// Spans with fewer characters than this are dropped.
    pub min_step_length: usize,
    /// Segmentation strategy.
    pub segmentation_strategy: SegmentationStrategy,
    /// Fail with `UnclassifiableInput` instead of tagging `unclassified`.
    pub strict_classification: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_steps: 256,
            min_step_length: 1,
            segmentation_strategy: SegmentationStrategy::Auto,
            strict_classification: false,
        }
    }
}

impl ParserConfig {
    /// Parse and validate from JSON.
    pub fn from_json(json: &str) -> ReasoningResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ReasoningError::invalid_config("parser", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> ReasoningResult<()> {
        if self.max_steps == 0 {
            return Err(ReasoningError::invalid_config(
                "max_steps",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Analysis
// ============================================================================

/// Whether `unclassified` steps count in quality denominators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnclassifiedPolicy {
    /// Unclassified steps count (and pull scores down).
    #[default]
    Include,
    /// Unclassified steps are left out of the denominators.
    Exclude,
}

/// Expected character-length range of a well-formed step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepLengthRange {
    /// Shorter steps score proportionally lower.
    pub min_chars: usize,
    /// Longer unstructured steps are penalized.
    pub max_chars: usize,
}

impl Default for StepLengthRange {
    fn default() -> Self {
        Self {
            min_chars: 20,
            max_chars: 400,
        }
    }
}

/// Awareness, quality and counterfactual options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Score at or above which a chain is evaluation-aware.
    pub awareness_threshold: f64,
    /// Number of top contributions averaged by the awareness aggregate.
    pub awareness_top_k: usize,
    /// Multiplier applied when an awareness step is also meta-reasoning.
    pub meta_awareness_boost: f64,
    /// Raw quality weights keyed by dimension name.
    pub quality_weights: BTreeMap<String, f64>,
    /// Confidence a type needs to count towards clarity.
    pub high_confidence_threshold: f64,
    /// Expected step length for specificity.
    pub expected_step_length: StepLengthRange,
    /// Type pairs that contradict each other within one step.
    pub forbidden_type_pairs: Vec<(ReasoningType, ReasoningType)>,
    /// Treatment of unclassified steps in quality denominators.
    pub unclassified_policy: UnclassifiedPolicy,
    /// Intervention kinds the counterfactual analyzer may run.
    pub enabled_interventions: BTreeSet<InterventionKind>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            awareness_threshold: 0.5,
            awareness_top_k: 3,
            meta_awareness_boost: 1.25,
            quality_weights: QualityDimension::ALL
                .iter()
                .map(|d| (d.as_str().to_string(), 0.25))
                .collect(),
            high_confidence_threshold: 0.7,
            expected_step_length: StepLengthRange::default(),
            forbidden_type_pairs: vec![
                (ReasoningType::Uncertainty, ReasoningType::DecisionMaking),
                (ReasoningType::Hypothetical, ReasoningType::DecisionMaking),
            ],
            unclassified_policy: UnclassifiedPolicy::Include,
            enabled_interventions: InterventionKind::ALL.into_iter().collect(),
        }
    }
}

impl AnalysisConfig {
    /// Parse and validate from JSON.
    pub fn from_json(json: &str) -> ReasoningResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ReasoningError::invalid_config("analysis", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges and the quality weight set.
    pub fn validate(&self) -> ReasoningResult<()> {
        if !(self.awareness_threshold.is_finite()
            && self.awareness_threshold > 0.0
            && self.awareness_threshold <= 1.0)
        {
            return Err(ReasoningError::invalid_config(
                "awareness_threshold",
                format!("must be in (0, 1], got {}", self.awareness_threshold),
            ));
        }
        if self.awareness_top_k == 0 {
            return Err(ReasoningError::invalid_config(
                "awareness_top_k",
                "must be at least 1",
            ));
        }
        if !(self.meta_awareness_boost.is_finite() && self.meta_awareness_boost >= 1.0) {
            return Err(ReasoningError::invalid_config(
                "meta_awareness_boost",
                format!("must be >= 1.0, got {}", self.meta_awareness_boost),
            ));
        }
        if !(0.0..=1.0).contains(&self.high_confidence_threshold) {
            return Err(ReasoningError::invalid_config(
                "high_confidence_threshold",
                format!("must be in [0, 1], got {}", self.high_confidence_threshold),
            ));
        }
        let range = self.expected_step_length;
        if range.min_chars == 0 || range.max_chars <= range.min_chars {
            return Err(ReasoningError::invalid_config(
                "expected_step_length",
                format!(
                    "requires 0 < min_chars < max_chars, got {}..{}",
                    range.min_chars, range.max_chars
                ),
            ));
        }
        QualityWeights::normalize(&self.quality_weights)?;
        Ok(())
    }

    /// Normalized quality weights.
    pub fn normalized_weights(&self) -> ReasoningResult<QualityWeights> {
        QualityWeights::normalize(&self.quality_weights)
    }
}

// ============================================================================
// Quality weights
// ============================================================================

/// Quality weights normalized to sum to 1.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct QualityWeights(BTreeMap<QualityDimension, f64>);

impl QualityWeights {
    /// Validate raw weights and scale them to sum to 1.
    ///
    /// Unknown dimension names, negative or non-finite weights, and an
    /// all-zero weight set are rejected. Missing dimensions weigh 0.
    pub fn normalize(raw: &BTreeMap<String, f64>) -> ReasoningResult<Self> {
        let mut weights = BTreeMap::new();
        for (name, weight) in raw {
            let dimension: QualityDimension = name.parse()?;
            if !weight.is_finite() || *weight < 0.0 {
                return Err(ReasoningError::invalid_config(
                    "quality_weights",
                    format!("weight for '{}' must be a non-negative number", name),
                ));
            }
            weights.insert(dimension, *weight);
        }

        let sum: f64 = weights.values().sum();
        if sum <= 0.0 {
            return Err(ReasoningError::invalid_config(
                "quality_weights",
                "weights sum to zero",
            ));
        }

        for dimension in QualityDimension::ALL {
            let weight = weights.entry(dimension).or_insert(0.0);
            *weight /= sum;
        }
        Ok(Self(weights))
    }

    /// Normalized weight of one dimension.
    pub fn weight(&self, dimension: QualityDimension) -> f64 {
        self.0.get(&dimension).copied().unwrap_or(0.0)
    }

    /// Sum of all weights (1.0 within floating tolerance).
    pub fn sum(&self) -> f64 {
        self.0.values().sum()
    }
}
