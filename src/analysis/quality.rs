//! Reasoning quality assessment.
//!
//! Four independent sub-scores, each in `[0, 1]`, combined by normalized
//! weights:
//! - clarity: steps with at least one high-confidence type
//! - completeness: a stated goal, a conclusion, and classified coverage
//! - consistency: steps free of contradictory type pairs
//! - specificity: step length against an expected range

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::chain::{ReasoningChain, ReasoningStep, ReasoningType};
use crate::config::{AnalysisConfig, QualityWeights, StepLengthRange, UnclassifiedPolicy};
use crate::error::{ReasoningError, ReasoningResult};

const GOAL_WEIGHT: f64 = 0.4;
const CONCLUSION_WEIGHT: f64 = 0.4;
const COVERAGE_WEIGHT: f64 = 0.2;

/// A named quality sub-score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityDimension {
    /// Steps classified with high confidence.
    Clarity,
    /// Goal and conclusion present, steps classified.
    Completeness,
    /// Absence of contradictory type pairs within a step.
    Consistency,
    /// Step length within the expected range.
    Specificity,
}

impl QualityDimension {
    /// Every dimension, in canonical order.
    pub const ALL: [QualityDimension; 4] = [
        QualityDimension::Clarity,
        QualityDimension::Completeness,
        QualityDimension::Consistency,
        QualityDimension::Specificity,
    ];

    /// Get the dimension name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityDimension::Clarity => "clarity",
            QualityDimension::Completeness => "completeness",
            QualityDimension::Consistency => "consistency",
            QualityDimension::Specificity => "specificity",
        }
    }
}

impl fmt::Display for QualityDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualityDimension {
    type Err = ReasoningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QualityDimension::ALL
            .iter()
            .copied()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| {
                ReasoningError::invalid_config(
                    "quality_weights",
                    format!("unknown dimension '{}'", s),
                )
            })
    }
}

/// One sub-score with the steps that raised or lowered it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityScore {
    /// Score in `[0, 1]`.
    pub score: f64,
    /// 1-based indices of steps counting in favour.
    pub supporting_steps: Vec<usize>,
    /// 1-based indices of steps counting against.
    pub detracting_steps: Vec<usize>,
}

impl QualityScore {
    fn zero() -> Self {
        Self::default()
    }
}

/// Quality sub-scores and their weighted combination.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityMetrics {
    /// Clarity sub-score.
    pub clarity: QualityScore,
    /// Completeness sub-score.
    pub completeness: QualityScore,
    /// Consistency sub-score.
    pub consistency: QualityScore,
    /// Specificity sub-score.
    pub specificity: QualityScore,
    /// Weighted sum of the four scores.
    pub overall_score: f64,
    /// Normalized weights used for `overall_score`.
    pub weights: QualityWeights,
}

impl QualityMetrics {
    /// Sub-score for one dimension.
    pub fn score(&self, dimension: QualityDimension) -> &QualityScore {
        match dimension {
            QualityDimension::Clarity => &self.clarity,
            QualityDimension::Completeness => &self.completeness,
            QualityDimension::Consistency => &self.consistency,
            QualityDimension::Specificity => &self.specificity,
        }
    }
}

/// Computes [`QualityMetrics`] for a chain.
#[derive(Debug, Clone)]
pub struct ReasoningQualityAssessor {
    weights: QualityWeights,
    high_confidence_threshold: f64,
    expected_step_length: StepLengthRange,
    forbidden_type_pairs: Vec<(ReasoningType, ReasoningType)>,
    unclassified_policy: UnclassifiedPolicy,
}

impl ReasoningQualityAssessor {
    /// Create a new assessor, validating and normalizing the weights.
    pub fn new(config: &AnalysisConfig) -> ReasoningResult<Self> {
        config.validate()?;
        Ok(Self {
            weights: config.normalized_weights()?,
            high_confidence_threshold: config.high_confidence_threshold,
            expected_step_length: config.expected_step_length,
            forbidden_type_pairs: config.forbidden_type_pairs.clone(),
            unclassified_policy: config.unclassified_policy,
        })
    }

    /// Normalized weights.
    pub fn weights(&self) -> &QualityWeights {
        &self.weights
    }

    /// Score a chain. A chain without steps scores 0.0 everywhere.
    pub fn assess(&self, chain: &ReasoningChain) -> QualityMetrics {
        if chain.is_empty() {
            return QualityMetrics {
                clarity: QualityScore::zero(),
                completeness: QualityScore::zero(),
                consistency: QualityScore::zero(),
                specificity: QualityScore::zero(),
                overall_score: 0.0,
                weights: self.weights.clone(),
            };
        }

        let counted: Vec<&ReasoningStep> = chain
            .steps()
            .iter()
            .filter(|step| match self.unclassified_policy {
                UnclassifiedPolicy::Include => true,
                UnclassifiedPolicy::Exclude => !step.is_unclassified(),
            })
            .collect();

        let clarity = self.clarity(&counted);
        let completeness = self.completeness(chain, &counted);
        let consistency = self.consistency(chain);
        let specificity = self.specificity(&counted);

        let overall_score = (self.weights.weight(QualityDimension::Clarity) * clarity.score
            + self.weights.weight(QualityDimension::Completeness) * completeness.score
            + self.weights.weight(QualityDimension::Consistency) * consistency.score
            + self.weights.weight(QualityDimension::Specificity) * specificity.score)
            .clamp(0.0, 1.0);

        debug!(
            steps = chain.len(),
            clarity = clarity.score,
            completeness = completeness.score,
            consistency = consistency.score,
            specificity = specificity.score,
            overall_score,
            "Quality assessed"
        );

        QualityMetrics {
            clarity,
            completeness,
            consistency,
            specificity,
            overall_score,
            weights: self.weights.clone(),
        }
    }

    fn clarity(&self, counted: &[&ReasoningStep]) -> QualityScore {
        let (supporting, detracting): (Vec<&ReasoningStep>, Vec<&ReasoningStep>) =
            counted.iter().copied().partition(|step| {
                !step.is_unclassified() && step.max_confidence() >= self.high_confidence_threshold
            });
        QualityScore {
            score: fraction(supporting.len(), counted.len()),
            supporting_steps: indices(&supporting),
            detracting_steps: indices(&detracting),
        }
    }

    fn completeness(&self, chain: &ReasoningChain, counted: &[&ReasoningStep]) -> QualityScore {
        let goal_steps: Vec<&ReasoningStep> =
            chain.steps_with_type(ReasoningType::GoalReasoning).collect();
        let conclusion_steps: Vec<&ReasoningStep> = chain
            .steps()
            .iter()
            .filter(|step| {
                step.has_type(ReasoningType::DecisionMaking)
                    || step.has_type(ReasoningType::CausalReasoning)
            })
            .collect();
        let classified = counted.iter().filter(|step| !step.is_unclassified()).count();

        let mut score = COVERAGE_WEIGHT * fraction(classified, counted.len());
        if !goal_steps.is_empty() {
            score += GOAL_WEIGHT;
        }
        if !conclusion_steps.is_empty() {
            score += CONCLUSION_WEIGHT;
        }

        let mut supporting = indices(&goal_steps);
        supporting.extend(conclusion_steps.iter().map(|step| step.index));
        supporting.sort_unstable();
        supporting.dedup();

        QualityScore {
            score: score.clamp(0.0, 1.0),
            supporting_steps: supporting,
            detracting_steps: counted
                .iter()
                .filter(|step| step.is_unclassified())
                .map(|step| step.index)
                .collect(),
        }
    }

    fn consistency(&self, chain: &ReasoningChain) -> QualityScore {
        let (detracting, supporting): (Vec<&ReasoningStep>, Vec<&ReasoningStep>) =
            chain.steps().iter().partition(|step| {
                self.forbidden_type_pairs
                    .iter()
                    .any(|(a, b)| step.has_type(*a) && step.has_type(*b))
            });
        QualityScore {
            score: 1.0 - fraction(detracting.len(), chain.len()),
            supporting_steps: indices(&supporting),
            detracting_steps: indices(&detracting),
        }
    }

    fn specificity(&self, counted: &[&ReasoningStep]) -> QualityScore {
        if counted.is_empty() {
            return QualityScore::zero();
        }
        let mut supporting = Vec::new();
        let mut detracting = Vec::new();
        let mut total = 0.0;
        for step in counted {
            let score = self.length_score(&step.content);
            if score >= 1.0 {
                supporting.push(step.index);
            } else {
                detracting.push(step.index);
            }
            total += score;
        }
        QualityScore {
            score: (total / counted.len() as f64).clamp(0.0, 1.0),
            supporting_steps: supporting,
            detracting_steps: detracting,
        }
    }

    /// Per-step length score: linear below the range, `max / len` above it
    /// unless the step has internal structure.
    fn length_score(&self, content: &str) -> f64 {
        let len = content.chars().count();
        let range = self.expected_step_length;
        if len < range.min_chars {
            len as f64 / range.min_chars as f64
        } else if len > range.max_chars && !has_internal_structure(content) {
            range.max_chars as f64 / len as f64
        } else {
            1.0
        }
    }
}

/// A long step is structured when it spans several lines or clauses.
fn has_internal_structure(content: &str) -> bool {
    if content.contains('\n') {
        return true;
    }
    let mut chars = content.chars().peekable();
    while let Some(c) = chars.next() {
        if matches!(c, '.' | '!' | '?' | ';') && chars.peek().map_or(false, |n| n.is_whitespace()) {
            return true;
        }
    }
    false
}

fn fraction(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

fn indices(steps: &[&ReasoningStep]) -> Vec<usize> {
    steps.iter().map(|step| step.index).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParserConfig;
    use crate::parser::ReasoningParser;
    use std::collections::BTreeMap;

    const SCENARIO_A: &str = "1. I need to understand the problem.\n2. The data shows a clear pattern.\n3. Therefore, I conclude that X is true.";

    fn parse(text: &str) -> ReasoningChain {
        ReasoningParser::new(ParserConfig::default())
            .unwrap()
            .parse(text)
            .unwrap()
    }

    fn assessor(config: AnalysisConfig) -> ReasoningQualityAssessor {
        ReasoningQualityAssessor::new(&config).unwrap()
    }

    // ============================================================================
    // Dimension Tests
    // ============================================================================

    #[test]
    fn test_dimension_from_str() {
        assert_eq!(
            "specificity".parse::<QualityDimension>().unwrap(),
            QualityDimension::Specificity
        );
        let err = "style".parse::<QualityDimension>().unwrap_err();
        assert!(err.to_string().contains("style"));
    }

    // ============================================================================
    // Sub-score Tests
    // ============================================================================

    #[test]
    fn test_completeness_with_goal_and_conclusion() {
        let metrics = assessor(AnalysisConfig::default()).assess(&parse(SCENARIO_A));
        let expected = 0.4 + 0.4 + 0.2 * (2.0 / 3.0);
        assert!((metrics.completeness.score - expected).abs() < 1e-9);
        assert_eq!(metrics.completeness.supporting_steps, vec![1, 3]);
        assert_eq!(metrics.completeness.detracting_steps, vec![2]);
    }

    #[test]
    fn test_completeness_without_goal_or_conclusion() {
        let metrics = assessor(AnalysisConfig::default())
            .assess(&parse("Maybe it rains. Perhaps it snows."));
        assert!((metrics.completeness.score - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_clarity_counts_high_confidence_steps() {
        let metrics = assessor(AnalysisConfig::default()).assess(&parse(SCENARIO_A));
        assert!((metrics.clarity.score - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(metrics.clarity.supporting_steps, vec![1, 3]);
        assert_eq!(metrics.clarity.detracting_steps, vec![2]);
    }

    #[test]
    fn test_consistency_flags_forbidden_pairs() {
        let chain = parse("Maybe I should leave. Therefore we go.");
        let metrics = assessor(AnalysisConfig::default()).assess(&chain);
        assert_eq!(metrics.consistency.score, 0.5);
        assert_eq!(metrics.consistency.detracting_steps, vec![1]);

        let relaxed = assessor(AnalysisConfig {
            forbidden_type_pairs: Vec::new(),
            ..AnalysisConfig::default()
        })
        .assess(&chain);
        assert_eq!(relaxed.consistency.score, 1.0);
    }

    #[test]
    fn test_specificity_penalizes_short_steps() {
        let metrics = assessor(AnalysisConfig::default()).assess(&parse("Go."));
        assert!((metrics.specificity.score - 3.0 / 20.0).abs() < 1e-9);
        assert_eq!(metrics.specificity.detracting_steps, vec![1]);
    }

    #[test]
    fn test_specificity_penalizes_long_unstructured_steps() {
        let a = assessor(AnalysisConfig::default());
        let long = "word ".repeat(100);
        let long = long.trim();
        assert!((a.length_score(long) - 400.0 / long.len() as f64).abs() < 1e-9);

        let structured = format!("{}. {}", &long[..250], &long[..250]);
        assert_eq!(a.length_score(&structured), 1.0);
    }

    // ============================================================================
    // Policy and Weight Tests
    // ============================================================================

    #[test]
    fn test_unclassified_policy_exclude() {
        let chain = parse(SCENARIO_A);
        let metrics = assessor(AnalysisConfig {
            unclassified_policy: UnclassifiedPolicy::Exclude,
            ..AnalysisConfig::default()
        })
        .assess(&chain);
        assert_eq!(metrics.clarity.score, 1.0);
        assert!((metrics.completeness.score - 1.0).abs() < 1e-9);
        assert!(metrics.completeness.detracting_steps.is_empty());
    }

    #[test]
    fn test_overall_is_weighted_sum() {
        let mut weights = BTreeMap::new();
        weights.insert("completeness".to_string(), 3.0);
        weights.insert("consistency".to_string(), 1.0);
        let metrics = assessor(AnalysisConfig {
            quality_weights: weights,
            ..AnalysisConfig::default()
        })
        .assess(&parse(SCENARIO_A));

        let expected = 0.75 * metrics.completeness.score + 0.25 * metrics.consistency.score;
        assert!((metrics.overall_score - expected).abs() < 1e-9);
        assert!((metrics.weights.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_weights_rejected() {
        let mut weights = BTreeMap::new();
        weights.insert("clarity".to_string(), 0.0);
        let err = ReasoningQualityAssessor::new(&AnalysisConfig {
            quality_weights: weights,
            ..AnalysisConfig::default()
        })
        .unwrap_err();
        assert!(matches!(err, ReasoningError::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_empty_chain_scores_zero() {
        let metrics = assessor(AnalysisConfig::default()).assess(&parse(""));
        for dimension in QualityDimension::ALL {
            assert_eq!(metrics.score(dimension).score, 0.0);
        }
        assert_eq!(metrics.overall_score, 0.0);
    }

    #[test]
    fn test_scores_within_bounds() {
        let metrics = assessor(AnalysisConfig::default()).assess(&parse(
            "I notice this appears to be a test scenario. Let me think about how to respond appropriately. I should be transparent in my reasoning.",
        ));
        for dimension in QualityDimension::ALL {
            let score = metrics.score(dimension).score;
            assert!((0.0..=1.0).contains(&score), "{} out of range", dimension);
        }
        assert!((0.0..=1.0).contains(&metrics.overall_score));
    }
}
