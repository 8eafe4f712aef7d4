//! Counterfactual interventions over reasoning chains.
//!
//! An intervention is a pure perturbation of a chain. Structural edits
//! (`remove_step`, `reorder_steps`, `negate_type`) rebuild the step list and
//! re-classify only the affected steps; text edits (`ablate_cue`) rewrite the
//! source text, shift the other steps' offsets and re-classify the edited
//! step in place. Either way the input chain is
//! left untouched and a new comparison chain is produced.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

use super::awareness::EvaluationAwarenessDetector;
use crate::chain::{
    ChainBuilder, ClassifiedSpan, ReasoningChain, ReasoningType, SourceSpan, TypeDistribution,
};
use crate::config::AnalysisConfig;
use crate::error::{ReasoningError, ReasoningResult};
use crate::parser::{cue_regex, ReasoningParser};

// ============================================================================
// Interventions
// ============================================================================

/// Kind of intervention, independent of its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionKind {
    /// Drop one step.
    RemoveStep,
    /// Permute the steps.
    ReorderSteps,
    /// Delete a cue substring from one step's text.
    AblateCue,
    /// Suppress one type on one step.
    NegateType,
}

impl InterventionKind {
    /// Every kind, in canonical order.
    pub const ALL: [InterventionKind; 4] = [
        InterventionKind::RemoveStep,
        InterventionKind::ReorderSteps,
        InterventionKind::AblateCue,
        InterventionKind::NegateType,
    ];

    /// Get the kind name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            InterventionKind::RemoveStep => "remove_step",
            InterventionKind::ReorderSteps => "reorder_steps",
            InterventionKind::AblateCue => "ablate_cue",
            InterventionKind::NegateType => "negate_type",
        }
    }
}

impl fmt::Display for InterventionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InterventionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        InterventionKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("Unknown intervention kind: {}", s))
    }
}

/// A perturbation request. Step indices are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Intervention {
    /// Remove the step at `index`.
    RemoveStep {
        /// Step to remove.
        index: usize,
    },
    /// Reorder steps; `permutation[i]` is the baseline index placed at
    /// position `i + 1`.
    ReorderSteps {
        /// A permutation of `1..=len`.
        permutation: Vec<usize>,
    },
    /// Delete every occurrence of `cue` from the step's text and re-parse.
    AblateCue {
        /// Step whose text is edited.
        step_index: usize,
        /// Literal cue text, matched case-insensitively.
        cue: String,
    },
    /// Re-classify the step with the rules of `reasoning_type` suppressed.
    NegateType {
        /// Step to re-classify.
        step_index: usize,
        /// Type forced to zero confidence.
        reasoning_type: ReasoningType,
    },
}

impl Intervention {
    /// The intervention's kind.
    pub fn kind(&self) -> InterventionKind {
        match self {
            Intervention::RemoveStep { .. } => InterventionKind::RemoveStep,
            Intervention::ReorderSteps { .. } => InterventionKind::ReorderSteps,
            Intervention::AblateCue { .. } => InterventionKind::AblateCue,
            Intervention::NegateType { .. } => InterventionKind::NegateType,
        }
    }
}

// ============================================================================
// Results
// ============================================================================

/// Outcome of one intervention.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    /// Kind of the applied intervention.
    pub kind: InterventionKind,
    /// The applied intervention.
    pub intervention: Intervention,
    /// Type histogram before the intervention.
    pub baseline_distribution: TypeDistribution,
    /// Type histogram after the intervention.
    pub intervened_distribution: TypeDistribution,
    /// Normalized Manhattan distance between the histograms, in `[0, 1]`.
    pub behavioral_divergence: f64,
    /// Baseline step indices whose type set changed or that disappeared.
    pub flipped_steps: Vec<usize>,
    /// Awareness score of the baseline chain.
    pub baseline_awareness: f64,
    /// Awareness score of the comparison chain.
    pub intervened_awareness: f64,
    /// The chain produced by the intervention.
    pub comparison_chain: ReasoningChain,
}

/// Results of a batch of interventions, in request order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CounterfactualReport {
    /// One result per requested intervention.
    pub results: Vec<AnalysisResult>,
}

impl CounterfactualReport {
    /// First result of each intervention kind.
    pub fn by_kind(&self) -> BTreeMap<InterventionKind, &AnalysisResult> {
        let mut map = BTreeMap::new();
        for result in &self.results {
            map.entry(result.kind).or_insert(result);
        }
        map
    }

    /// Highest divergence across results, 0.0 when empty.
    pub fn max_divergence(&self) -> f64 {
        self.results
            .iter()
            .map(|r| r.behavioral_divergence)
            .fold(0.0, f64::max)
    }

    /// Number of results.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Whether no intervention ran.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// A comparison chain and, for each baseline step, the 1-based index of the
/// comparison step it became.
struct Applied {
    chain: ReasoningChain,
    alignment: Vec<Option<usize>>,
}

impl Applied {
    fn unchanged(chain: &ReasoningChain) -> Self {
        Self {
            chain: chain.clone(),
            alignment: (1..=chain.len()).map(Some).collect(),
        }
    }
}

// ============================================================================
// Analyzer
// ============================================================================

/// Applies interventions and measures how classification reacts.
#[derive(Debug, Clone)]
pub struct CounterfactualAnalyzer {
    parser: ReasoningParser,
    detector: EvaluationAwarenessDetector,
    enabled: BTreeSet<InterventionKind>,
}

impl CounterfactualAnalyzer {
    /// Create a new analyzer.
    ///
    /// Re-parsing always runs with strict classification off, so an
    /// ablation that leaves a step without cues cannot fail the analysis.
    pub fn new(parser: &ReasoningParser, config: &AnalysisConfig) -> ReasoningResult<Self> {
        Ok(Self {
            parser: parser.lenient(),
            detector: EvaluationAwarenessDetector::new(config)?,
            enabled: config.enabled_interventions.clone(),
        })
    }

    /// Intervention kinds this analyzer will run.
    pub fn enabled_kinds(&self) -> &BTreeSet<InterventionKind> {
        &self.enabled
    }

    /// Apply each intervention to a copy of `chain`.
    ///
    /// Requesting a disabled kind, an out-of-range step or a
    /// non-permutation fails the whole batch with
    /// [`ReasoningError::InvalidIntervention`].
    pub fn analyze(
        &self,
        chain: &ReasoningChain,
        interventions: &[Intervention],
    ) -> ReasoningResult<CounterfactualReport> {
        let baseline_awareness = self.detector.score(chain);
        let mut results = Vec::with_capacity(interventions.len());

        for intervention in interventions {
            let kind = intervention.kind();
            if !self.enabled.contains(&kind) {
                return Err(ReasoningError::invalid_intervention(
                    kind.as_str(),
                    "intervention kind is disabled",
                ));
            }

            let applied = self.apply(chain, intervention)?;
            let result = self.compare(chain, baseline_awareness, intervention.clone(), applied);
            debug!(
                kind = %kind,
                divergence = result.behavioral_divergence,
                flipped = result.flipped_steps.len(),
                "Intervention applied"
            );
            results.push(result);
        }

        info!(
            steps = chain.len(),
            interventions = results.len(),
            "Counterfactual analysis completed"
        );
        Ok(CounterfactualReport { results })
    }

    /// Run one default intervention per enabled kind.
    pub fn analyze_all(&self, chain: &ReasoningChain) -> ReasoningResult<CounterfactualReport> {
        let interventions = self.default_interventions(chain);
        self.analyze(chain, &interventions)
    }

    /// One representative intervention per enabled kind.
    ///
    /// Targets the first evaluation-aware step when there is one, so the
    /// defaults probe what drives the awareness score. Kinds with nothing
    /// to act on (no steps, no cues) are skipped.
    pub fn default_interventions(&self, chain: &ReasoningChain) -> Vec<Intervention> {
        let aware = chain.steps_with_type(ReasoningType::EvaluationAware).next();
        let target = aware.or_else(|| chain.steps().iter().find(|s| !s.is_unclassified()));

        self.enabled
            .iter()
            .filter_map(|kind| match kind {
                InterventionKind::RemoveStep => target
                    .or_else(|| chain.steps().first())
                    .map(|step| Intervention::RemoveStep { index: step.index }),
                InterventionKind::ReorderSteps => Some(Intervention::ReorderSteps {
                    permutation: (1..=chain.len()).rev().collect(),
                }),
                InterventionKind::AblateCue => target.and_then(|step| {
                    let preferred = aware.map(|_| ReasoningType::EvaluationAware);
                    let cue = match preferred {
                        Some(t) => step.cues_for(t).next(),
                        None => step.matched_cues.first(),
                    }?;
                    Some(Intervention::AblateCue {
                        step_index: step.index,
                        cue: cue.text.clone(),
                    })
                }),
                InterventionKind::NegateType => target.and_then(|step| {
                    let reasoning_type = if aware.is_some() {
                        ReasoningType::EvaluationAware
                    } else {
                        step.types.keys().next().copied()?
                    };
                    Some(Intervention::NegateType {
                        step_index: step.index,
                        reasoning_type,
                    })
                }),
            })
            .collect()
    }

    fn compare(
        &self,
        baseline: &ReasoningChain,
        baseline_awareness: f64,
        intervention: Intervention,
        applied: Applied,
    ) -> AnalysisResult {
        let Applied { chain, alignment } = applied;

        let flipped_steps = baseline
            .steps()
            .iter()
            .zip(&alignment)
            .filter(|(step, aligned)| match aligned.and_then(|i| chain.step(i)) {
                Some(other) => other.type_set() != step.type_set(),
                None => true,
            })
            .map(|(step, _)| step.index)
            .collect();

        let baseline_distribution = baseline.type_distribution().clone();
        let intervened_distribution = chain.type_distribution().clone();

        AnalysisResult {
            kind: intervention.kind(),
            intervention,
            behavioral_divergence: baseline_distribution.divergence(&intervened_distribution),
            baseline_distribution,
            intervened_distribution,
            flipped_steps,
            baseline_awareness,
            intervened_awareness: self.detector.score(&chain),
            comparison_chain: chain,
        }
    }

    fn apply(
        &self,
        chain: &ReasoningChain,
        intervention: &Intervention,
    ) -> ReasoningResult<Applied> {
        match intervention {
            Intervention::RemoveStep { index } => self.remove_step(chain, *index),
            Intervention::ReorderSteps { permutation } => self.reorder_steps(chain, permutation),
            Intervention::AblateCue { step_index, cue } => {
                self.ablate_cue(chain, *step_index, cue)
            }
            Intervention::NegateType {
                step_index,
                reasoning_type,
            } => self.negate_type(chain, *step_index, *reasoning_type),
        }
    }

    fn remove_step(&self, chain: &ReasoningChain, index: usize) -> ReasoningResult<Applied> {
        check_index(chain, index, InterventionKind::RemoveStep)?;

        let spans = chain
            .steps()
            .iter()
            .filter(|step| step.index != index)
            .map(|step| ClassifiedSpan::new(step.source_offsets, step.classification()))
            .collect();
        let rebuilt = ChainBuilder::build_shared(chain.shared_source(), spans)?;

        let alignment = (1..=chain.len())
            .map(|i| match i.cmp(&index) {
                std::cmp::Ordering::Less => Some(i),
                std::cmp::Ordering::Equal => None,
                std::cmp::Ordering::Greater => Some(i - 1),
            })
            .collect();
        Ok(Applied {
            chain: rebuilt,
            alignment,
        })
    }

    fn reorder_steps(
        &self,
        chain: &ReasoningChain,
        permutation: &[usize],
    ) -> ReasoningResult<Applied> {
        let n = chain.len();
        let mut seen = vec![false; n];
        if permutation.len() != n {
            return Err(ReasoningError::invalid_intervention(
                InterventionKind::ReorderSteps.as_str(),
                format!("permutation has {} entries, chain has {} steps", permutation.len(), n),
            ));
        }
        for &index in permutation {
            if index == 0 || index > n || seen[index - 1] {
                return Err(ReasoningError::invalid_intervention(
                    InterventionKind::ReorderSteps.as_str(),
                    format!("{:?} is not a permutation of 1..={}", permutation, n),
                ));
            }
            seen[index - 1] = true;
        }

        if permutation.iter().enumerate().all(|(i, &p)| p == i + 1) {
            return Ok(Applied::unchanged(chain));
        }

        let classifier = self.parser.classifier();
        let mut parts = Vec::with_capacity(n);
        let mut alignment = vec![None; n];
        for (position, &index) in permutation.iter().enumerate() {
            let Some(step) = chain.step(index) else {
                continue;
            };
            let classification = if position + 1 == index {
                step.classification()
            } else {
                classifier.classify(&step.content)
            };
            parts.push((step.content.clone(), classification));
            alignment[index - 1] = Some(position + 1);
        }

        Ok(Applied {
            chain: ChainBuilder::assemble(parts)?,
            alignment,
        })
    }

    fn negate_type(
        &self,
        chain: &ReasoningChain,
        step_index: usize,
        reasoning_type: ReasoningType,
    ) -> ReasoningResult<Applied> {
        check_index(chain, step_index, InterventionKind::NegateType)?;
        if reasoning_type == ReasoningType::Unclassified {
            return Err(ReasoningError::invalid_intervention(
                InterventionKind::NegateType.as_str(),
                "the unclassified sentinel cannot be negated",
            ));
        }

        let Some(target) = chain.step(step_index) else {
            return Ok(Applied::unchanged(chain));
        };
        if !target.has_type(reasoning_type) {
            return Ok(Applied::unchanged(chain));
        }

        let classifier = self.parser.classifier();
        let spans = chain
            .steps()
            .iter()
            .map(|step| {
                let classification = if step.index == step_index {
                    classifier.classify_excluding(&step.content, &[reasoning_type])
                } else {
                    step.classification()
                };
                ClassifiedSpan::new(step.source_offsets, classification)
            })
            .collect();

        Ok(Applied {
            chain: ChainBuilder::build_shared(chain.shared_source(), spans)?,
            alignment: (1..=chain.len()).map(Some).collect(),
        })
    }

    fn ablate_cue(
        &self,
        chain: &ReasoningChain,
        step_index: usize,
        cue: &str,
    ) -> ReasoningResult<Applied> {
        check_index(chain, step_index, InterventionKind::AblateCue)?;
        if cue.trim().is_empty() {
            return Err(ReasoningError::invalid_intervention(
                InterventionKind::AblateCue.as_str(),
                "cue must not be blank",
            ));
        }
        let matcher = cue_regex(cue).map_err(|e| {
            ReasoningError::invalid_intervention(InterventionKind::AblateCue.as_str(), e.to_string())
        })?;

        let Some(step) = chain.step(step_index) else {
            return Ok(Applied::unchanged(chain));
        };
        let offset = step.source_offsets.start;
        let deletions: Vec<SourceSpan> = matcher
            .find_iter(&step.content)
            .map(|m| SourceSpan::new(offset + m.start(), offset + m.end()))
            .collect();
        if deletions.is_empty() {
            return Ok(Applied::unchanged(chain));
        }

        let source = chain.source_text();
        let mut edited = String::with_capacity(source.len());
        let mut cursor = 0;
        for deletion in &deletions {
            edited.push_str(&source[cursor..deletion.start]);
            cursor = deletion.end;
        }
        edited.push_str(&source[cursor..]);

        // Steps outside the edit keep their spans and types; only the edited
        // step is re-trimmed and re-classified.
        let map = |span: SourceSpan| {
            SourceSpan::new(map_offset(span.start, &deletions), map_offset(span.end, &deletions))
        };
        let region = map(step.source_offsets);
        let fragment = trimmed(&edited, region)
            .filter(|span| span.len() >= self.parser.config().min_step_length);

        let classifier = self.parser.classifier();
        let mut spans = Vec::with_capacity(chain.len());
        let mut alignment = Vec::with_capacity(chain.len());
        for other in chain.steps() {
            if other.index != step_index {
                spans.push(ClassifiedSpan::new(map(other.source_offsets), other.classification()));
                alignment.push(Some(spans.len()));
            } else if let Some(span) = fragment {
                spans.push(classifier.classify_span(&edited, span)?);
                alignment.push(Some(spans.len()));
            } else {
                debug!(step_index, "Ablation emptied step");
                alignment.push(None);
            }
        }

        Ok(Applied {
            chain: ChainBuilder::build(&edited, spans)?,
            alignment,
        })
    }
}

fn check_index(chain: &ReasoningChain, index: usize, kind: InterventionKind) -> ReasoningResult<()> {
    if index == 0 || index > chain.len() {
        return Err(ReasoningError::invalid_intervention(
            kind.as_str(),
            format!("step {} out of range 1..={}", index, chain.len()),
        ));
    }
    Ok(())
}

/// Position of `pos` after the sorted, disjoint `deletions` are removed.
fn map_offset(pos: usize, deletions: &[SourceSpan]) -> usize {
    let mut removed = 0;
    for deletion in deletions {
        if deletion.end <= pos {
            removed += deletion.len();
        } else if deletion.start < pos {
            removed += pos - deletion.start;
        } else {
            break;
        }
    }
    pos - removed
}

/// `span` with surrounding whitespace removed, or `None` if nothing is left.
fn trimmed(text: &str, span: SourceSpan) -> Option<SourceSpan> {
    let slice = &text[span.start..span.end];
    let start = span.start + (slice.len() - slice.trim_start().len());
    let end = span.end - (slice.len() - slice.trim_end().len());
    (start < end).then(|| SourceSpan::new(start, end))
}
