//! Reasoning chain data model.
//!
//! This module provides the immutable value types produced by the parsing
//! pipeline:
//! - [`ReasoningType`]: the closed, non-exclusive classification taxonomy
//! - [`ReasoningStep`]: one classified span of the source text
//! - [`ReasoningChain`]: the ordered, immutable sequence of steps
//! - [`TypeDistribution`]: the type → count histogram over a chain
//!
//! Chains are only created through [`ChainBuilder`], which enforces the
//! ordering and offset invariants.

mod builder;

pub use builder::*;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

// ============================================================================
// Taxonomy
// ============================================================================

/// Semantic category of a reasoning step.
///
/// Categories are not mutually exclusive; a step may carry several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningType {
    /// Recognition of being tested, observed or evaluated.
    EvaluationAware,
    /// Statement of an objective or what needs to be achieved.
    GoalReasoning,
    /// A choice, commitment or conclusion.
    DecisionMaking,
    /// Reasoning about the reasoning process itself.
    MetaReasoning,
    /// Expressed doubt or hedging.
    Uncertainty,
    /// Cause/effect and inferential connectives.
    CausalReasoning,
    /// Counterfactual or suppositional framing.
    Hypothetical,
    /// Reasoning about rewards, penalties or consequences for the author.
    IncentiveReasoning,
    /// Sentinel for steps no cue rule matched.
    Unclassified,
}

impl ReasoningType {
    /// Every category, in canonical order.
    pub const ALL: [ReasoningType; 9] = [
        ReasoningType::EvaluationAware,
        ReasoningType::GoalReasoning,
        ReasoningType::DecisionMaking,
        ReasoningType::MetaReasoning,
        ReasoningType::Uncertainty,
        ReasoningType::CausalReasoning,
        ReasoningType::Hypothetical,
        ReasoningType::IncentiveReasoning,
        ReasoningType::Unclassified,
    ];

    /// Get the type name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasoningType::EvaluationAware => "evaluation_aware",
            ReasoningType::GoalReasoning => "goal_reasoning",
            ReasoningType::DecisionMaking => "decision_making",
            ReasoningType::MetaReasoning => "meta_reasoning",
            ReasoningType::Uncertainty => "uncertainty",
            ReasoningType::CausalReasoning => "causal_reasoning",
            ReasoningType::Hypothetical => "hypothetical",
            ReasoningType::IncentiveReasoning => "incentive_reasoning",
            ReasoningType::Unclassified => "unclassified",
        }
    }
}

impl fmt::Display for ReasoningType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReasoningType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        ReasoningType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == lower)
            .ok_or_else(|| format!("Unknown reasoning type: {}", s))
    }
}

// ============================================================================
// Spans and cues
// ============================================================================

/// Half-open byte range `[start, end)` into a source text.
///
/// Offsets always fall on UTF-8 character boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceSpan {
    /// Inclusive start offset.
    pub start: usize,
    /// Exclusive end offset.
    pub end: usize,
}

impl SourceSpan {
    /// Create a new span
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Length of the span in bytes.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Whether the span covers no text.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of bytes shared with another span.
    pub fn overlap(&self, other: &SourceSpan) -> usize {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        end.saturating_sub(start)
    }
}

/// A literal substring that triggered a classification rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedCue {
    /// The type the firing rule assigns.
    pub reasoning_type: ReasoningType,
    /// The configured pattern that matched.
    pub pattern: String,
    /// The literal text matched in the step content.
    pub text: String,
    /// Start offset relative to the step content.
    pub start: usize,
    /// End offset relative to the step content.
    pub end: usize,
}

/// Outcome of classifying one span: a non-empty type map and its cues.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    types: BTreeMap<ReasoningType, f64>,
    cues: Vec<MatchedCue>,
}

impl Classification {
    /// The classification of a span no rule matched.
    pub fn unclassified() -> Self {
        let mut types = BTreeMap::new();
        types.insert(ReasoningType::Unclassified, 0.0);
        Self {
            types,
            cues: Vec::new(),
        }
    }

    /// Build from matched types and cues, falling back to `Unclassified`
    /// when nothing matched.
    pub(crate) fn from_parts(types: BTreeMap<ReasoningType, f64>, cues: Vec<MatchedCue>) -> Self {
        if types.is_empty() {
            return Self::unclassified();
        }
        Self { types, cues }
    }

    /// Type → confidence map (never empty).
    pub fn types(&self) -> &BTreeMap<ReasoningType, f64> {
        &self.types
    }

    /// Cues recorded for the fired rules.
    pub fn cues(&self) -> &[MatchedCue] {
        &self.cues
    }

    /// Whether no rule matched.
    pub fn is_unclassified(&self) -> bool {
        self.types.contains_key(&ReasoningType::Unclassified)
    }
}

/// A span paired with its classification, ready for chain assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedSpan {
    /// Location in the source text.
    pub span: SourceSpan,
    /// Classification of the span content.
    pub classification: Classification,
}

impl ClassifiedSpan {
    /// Create a new classified span
    pub fn new(span: SourceSpan, classification: Classification) -> Self {
        Self {
            span,
            classification,
        }
    }
}

// ============================================================================
// Steps
// ============================================================================

/// One classified unit of reasoning within a chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReasoningStep {
    /// 1-based position within the chain.
    pub index: usize,
    /// Exact text of the span.
    pub content: String,
    /// Location of `content` in the chain's source text.
    pub source_offsets: SourceSpan,
    /// Non-empty type → confidence map.
    pub types: BTreeMap<ReasoningType, f64>,
    /// Literal cues that triggered each type.
    pub matched_cues: Vec<MatchedCue>,
}

impl ReasoningStep {
    /// Whether the step carries the given type.
    pub fn has_type(&self, reasoning_type: ReasoningType) -> bool {
        self.types.contains_key(&reasoning_type)
    }

    /// Confidence for a type, 0.0 when absent.
    pub fn confidence(&self, reasoning_type: ReasoningType) -> f64 {
        self.types.get(&reasoning_type).copied().unwrap_or(0.0)
    }

    /// The set of types carried by the step.
    pub fn type_set(&self) -> BTreeSet<ReasoningType> {
        self.types.keys().copied().collect()
    }

    /// Whether no rule matched this step.
    pub fn is_unclassified(&self) -> bool {
        self.has_type(ReasoningType::Unclassified)
    }

    /// Cues recorded for one type.
    pub fn cues_for(&self, reasoning_type: ReasoningType) -> impl Iterator<Item = &MatchedCue> {
        self.matched_cues
            .iter()
            .filter(move |cue| cue.reasoning_type == reasoning_type)
    }

    /// Highest confidence across all types.
    pub fn max_confidence(&self) -> f64 {
        self.types.values().copied().fold(0.0, f64::max)
    }

    /// The step's classification as a standalone value.
    pub fn classification(&self) -> Classification {
        Classification {
            types: self.types.clone(),
            cues: self.matched_cues.clone(),
        }
    }
}

// ============================================================================
// Distribution
// ============================================================================

/// Histogram of reasoning type → number of steps carrying it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeDistribution(BTreeMap<ReasoningType, usize>);

impl TypeDistribution {
    /// Count type occurrences over a step sequence.
    pub fn from_steps(steps: &[ReasoningStep]) -> Self {
        let mut counts = BTreeMap::new();
        for step in steps {
            for reasoning_type in step.types.keys() {
                *counts.entry(*reasoning_type).or_insert(0) += 1;
            }
        }
        Self(counts)
    }

    /// Number of steps carrying a type.
    pub fn count(&self, reasoning_type: ReasoningType) -> usize {
        self.0.get(&reasoning_type).copied().unwrap_or(0)
    }

    /// Total number of type assignments.
    pub fn total(&self) -> usize {
        self.0.values().sum()
    }

    /// Whether no type was counted.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over `(type, count)` pairs in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (ReasoningType, usize)> + '_ {
        self.0.iter().map(|(t, c)| (*t, *c))
    }

    /// Most frequent classified type (ties resolved by canonical order).
    pub fn dominant_type(&self) -> Option<ReasoningType> {
        self.iter()
            .filter(|(t, _)| *t != ReasoningType::Unclassified)
            .fold(None, |best: Option<(ReasoningType, usize)>, (t, c)| match best {
                Some((_, best_count)) if best_count >= c => best,
                _ => Some((t, c)),
            })
            .map(|(t, _)| t)
    }

    /// Normalized Manhattan distance between two histograms.
    ///
    /// `Σ|a_t − b_t| / (Σa_t + Σb_t)`, in `[0, 1]`: 0 for identical
    /// histograms, 1 when no type is shared. Two empty histograms are
    /// identical.
    pub fn divergence(&self, other: &TypeDistribution) -> f64 {
        let denominator = self.total() + other.total();
        if denominator == 0 {
            return 0.0;
        }
        let distance: usize = ReasoningType::ALL
            .iter()
            .map(|t| self.count(*t).abs_diff(other.count(*t)))
            .sum();
        (distance as f64 / denominator as f64).clamp(0.0, 1.0)
    }
}

// ============================================================================
// Chain
// ============================================================================

/// Ordered, immutable sequence of reasoning steps over a shared source text.
///
/// There is no mutation API; interventions produce new chains. The type
/// distribution is computed lazily and cached. Two chains are equal when
/// they share a source text and their steps agree on content, offsets and
/// types; cue provenance is not compared.
#[derive(Debug, Clone, Serialize)]
pub struct ReasoningChain {
    #[serde(rename = "source_text")]
    source: Arc<str>,
    steps: Vec<ReasoningStep>,
    #[serde(skip)]
    distribution: OnceLock<TypeDistribution>,
}

impl ReasoningChain {
    /// Steps must already satisfy the builder's invariants.
    pub(crate) fn from_validated(source: Arc<str>, steps: Vec<ReasoningStep>) -> Self {
        Self {
            source,
            steps,
            distribution: OnceLock::new(),
        }
    }

    /// The text the chain was derived from.
    pub fn source_text(&self) -> &str {
        &self.source
    }

    /// Shared handle to the source text.
    pub fn shared_source(&self) -> Arc<str> {
        Arc::clone(&self.source)
    }

    /// Steps in canonical order.
    pub fn steps(&self) -> &[ReasoningStep] {
        &self.steps
    }

    /// Step by 1-based index.
    pub fn step(&self, index: usize) -> Option<&ReasoningStep> {
        index.checked_sub(1).and_then(|i| self.steps.get(i))
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the chain has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Cached type → count histogram.
    pub fn type_distribution(&self) -> &TypeDistribution {
        self.distribution
            .get_or_init(|| TypeDistribution::from_steps(&self.steps))
    }

    /// Steps carrying the given type.
    pub fn steps_with_type(
        &self,
        reasoning_type: ReasoningType,
    ) -> impl Iterator<Item = &ReasoningStep> {
        self.steps
            .iter()
            .filter(move |step| step.has_type(reasoning_type))
    }

    /// Whether any step carries the given type.
    pub fn contains_type(&self, reasoning_type: ReasoningType) -> bool {
        self.type_distribution().count(reasoning_type) > 0
    }
}

impl PartialEq for ReasoningChain {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
            && self.steps.len() == other.steps.len()
            && self.steps.iter().zip(&other.steps).all(|(a, b)| {
                a.content == b.content
                    && a.source_offsets == b.source_offsets
                    && a.types == b.types
            })
    }
}
