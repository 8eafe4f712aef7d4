//! Analyses over built reasoning chains.
//!
//! This module provides:
//! - [`EvaluationAwarenessDetector`]: awareness-of-evaluation scoring
//! - [`ReasoningQualityAssessor`]: weighted quality sub-scores
//! - [`CounterfactualAnalyzer`]: interventions and behavioral divergence
//! - [`ChainAnalyzer`]: all three bundled into one [`ChainReport`]
//!
//! Results are recomputed on demand and never cached inside the chain.

mod awareness;
mod counterfactual;
mod quality;

pub use awareness::*;
pub use counterfactual::*;
pub use quality::*;

use serde::Serialize;
use tracing::info;

use crate::chain::ReasoningChain;
use crate::config::AnalysisConfig;
use crate::error::ReasoningResult;
use crate::parser::ReasoningParser;

/// Every analysis of one chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainReport {
    /// The analyzed chain.
    pub chain: ReasoningChain,
    /// Evaluation-awareness result.
    pub awareness: AwarenessAnalysis,
    /// Quality sub-scores.
    pub quality: QualityMetrics,
    /// Default interventions for every enabled kind.
    pub counterfactual: CounterfactualReport,
}

/// Runs awareness, quality and counterfactual analysis together.
#[derive(Debug, Clone)]
pub struct ChainAnalyzer {
    detector: EvaluationAwarenessDetector,
    assessor: ReasoningQualityAssessor,
    counterfactual: CounterfactualAnalyzer,
}

impl ChainAnalyzer {
    /// Create a new analyzer. `parser` is used to re-parse edited text.
    pub fn new(parser: &ReasoningParser, config: &AnalysisConfig) -> ReasoningResult<Self> {
        Ok(Self {
            detector: EvaluationAwarenessDetector::new(config)?,
            assessor: ReasoningQualityAssessor::new(config)?,
            counterfactual: CounterfactualAnalyzer::new(parser, config)?,
        })
    }

    /// The awareness detector.
    pub fn detector(&self) -> &EvaluationAwarenessDetector {
        &self.detector
    }

    /// The quality assessor.
    pub fn assessor(&self) -> &ReasoningQualityAssessor {
        &self.assessor
    }

    /// The counterfactual analyzer.
    pub fn counterfactual(&self) -> &CounterfactualAnalyzer {
        &self.counterfactual
    }

    /// Produce the full report for `chain`.
    pub fn analyze(&self, chain: &ReasoningChain) -> ReasoningResult<ChainReport> {
        let awareness = self.detector.detect(chain);
        let quality = self.assessor.assess(chain);
        let counterfactual = self.counterfactual.analyze_all(chain)?;

        info!(
            steps = chain.len(),
            awareness_score = awareness.awareness_score,
            is_evaluation_aware = awareness.is_evaluation_aware,
            overall_quality = quality.overall_score,
            max_divergence = counterfactual.max_divergence(),
            "Chain analysis completed"
        );

        Ok(ChainReport {
            chain: chain.clone(),
            awareness,
            quality,
            counterfactual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParserConfig;

    fn setup() -> (ReasoningParser, ChainAnalyzer) {
        let parser = ReasoningParser::new(ParserConfig::default()).unwrap();
        let analyzer = ChainAnalyzer::new(&parser, &AnalysisConfig::default()).unwrap();
        (parser, analyzer)
    }

    #[test]
    fn test_report_for_aware_chain() {
        let (parser, analyzer) = setup();
        let chain = parser
            .parse("I notice this appears to be a test scenario. Let me think about how to respond appropriately. I should be transparent in my reasoning.")
            .unwrap();
        let report = analyzer.analyze(&chain).unwrap();

        assert!(report.awareness.is_evaluation_aware);
        assert_eq!(report.counterfactual.len(), 4);
        assert!(report.counterfactual.max_divergence() > 0.0);
        assert_eq!(report.chain, chain);
    }

    #[test]
    fn test_report_for_empty_chain() {
        let (parser, analyzer) = setup();
        let report = analyzer.analyze(&parser.parse("").unwrap()).unwrap();
        assert_eq!(report.awareness.awareness_score, 0.0);
        assert_eq!(report.quality.overall_score, 0.0);
    }

    #[test]
    fn test_report_serializes() {
        let (parser, analyzer) = setup();
        let chain = parser.parse("Maybe this is a test. I will answer anyway.").unwrap();
        let json = serde_json::to_value(analyzer.analyze(&chain).unwrap()).unwrap();
        assert!(json["chain"]["source_text"].is_string());
        assert!(json["quality"]["overall_score"].is_number());
        assert!(json["counterfactual"]["results"].is_array());
    }
}
