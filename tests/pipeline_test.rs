//! Integration tests for the text → chain pipeline
//!
//! Covers determinism, offset and classification invariants, the
//! enumerated-list scenario and strict classification.

use mcp_reasoning_analysis::analysis::ReasoningQualityAssessor;
use mcp_reasoning_analysis::chain::{ChainBuilder, ClassifiedSpan, Classification, SourceSpan};
use mcp_reasoning_analysis::config::{AnalysisConfig, ParserConfig, SegmentationStrategy};
use mcp_reasoning_analysis::parser::{CueRule, RuleTable};
use mcp_reasoning_analysis::{ReasoningError, ReasoningParser, ReasoningType};

const SCENARIO_A: &str = "1. I need to understand the problem.\n2. The data shows a clear pattern.\n3. Therefore, I conclude that X is true.";

const SAMPLES: &[&str] = &[
    SCENARIO_A,
    "I notice this appears to be a test scenario. Let me think about how to respond appropriately. I should be transparent in my reasoning.",
    "First, the goal is clear: ship on time.\n\nIf we delay, we might lose the reward. So I will ship.",
    "- maybe this\n- perhaps that\n- therefore the other",
    "   ",
    "",
    "Ünïcödé text, with ellipses… and émphasis! Because reasons. I decide.",
];

fn parser() -> ReasoningParser {
    ReasoningParser::new(ParserConfig::default()).unwrap()
}

// ============================================================================
// Invariants
// ============================================================================

#[test]
fn test_parse_is_deterministic() {
    let p = parser();
    for text in SAMPLES {
        let first = p.parse(text).unwrap();
        let second = p.parse(text).unwrap();
        assert_eq!(first, second, "nondeterministic parse of {:?}", text);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}

#[test]
fn test_offsets_increase_and_stay_in_bounds() {
    let p = parser();
    for text in SAMPLES {
        let chain = p.parse(text).unwrap();
        let mut previous_end = 0;
        for (position, step) in chain.steps().iter().enumerate() {
            let span = step.source_offsets;
            assert_eq!(step.index, position + 1);
            assert!(span.start >= previous_end, "overlap in {:?}", text);
            assert!(span.start < span.end);
            assert!(span.end <= text.len());
            assert_eq!(&text[span.start..span.end], step.content);
            previous_end = span.end;
        }
    }
}

#[test]
fn test_every_step_has_a_type() {
    let p = parser();
    for text in SAMPLES {
        for step in p.parse(text).unwrap().steps() {
            assert!(!step.types.is_empty());
            assert!(step
                .types
                .values()
                .all(|confidence| (0.0..=1.0).contains(confidence)));
            if step.is_unclassified() {
                assert_eq!(step.types.len(), 1);
                assert_eq!(step.confidence(ReasoningType::Unclassified), 0.0);
            }
        }
    }
}

#[test]
fn test_whitespace_only_input_yields_empty_chain() {
    let chain = parser().parse("  \n\t ").unwrap();
    assert!(chain.is_empty());
    assert_eq!(chain.type_distribution().total(), 0);
}

// ============================================================================
// Scenario A
// ============================================================================

#[test]
fn test_enumerated_scenario() {
    let chain = parser().parse(SCENARIO_A).unwrap();
    assert_eq!(chain.len(), 3);

    let first = chain.step(1).unwrap();
    assert_eq!(first.content, "I need to understand the problem.");
    assert!(first.has_type(ReasoningType::GoalReasoning));

    let last = chain.step(3).unwrap();
    assert!(last.has_type(ReasoningType::CausalReasoning));
    assert!(last.has_type(ReasoningType::DecisionMaking));
    assert!(last
        .cues_for(ReasoningType::CausalReasoning)
        .any(|cue| cue.text.eq_ignore_ascii_case("therefore")));

    let metrics = ReasoningQualityAssessor::new(&AnalysisConfig::default())
        .unwrap()
        .assess(&chain);
    assert!(metrics.completeness.score > 0.9);
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_max_steps_truncates() {
    let p = ReasoningParser::new(ParserConfig {
        max_steps: 2,
        ..ParserConfig::default()
    })
    .unwrap();
    let chain = p.parse(SCENARIO_A).unwrap();
    assert_eq!(chain.len(), 2);
    assert_eq!(chain.step(2).unwrap().content, "The data shows a clear pattern.");
}

#[test]
fn test_paragraph_strategy_ignores_sentences() {
    let p = ReasoningParser::new(ParserConfig {
        segmentation_strategy: SegmentationStrategy::Paragraph,
        ..ParserConfig::default()
    })
    .unwrap();
    let chain = p.parse("Maybe this. Maybe that.\nSo I will go.").unwrap();
    assert_eq!(chain.len(), 2);
    assert_eq!(chain.step(1).unwrap().content, "Maybe this. Maybe that.");
}

#[test]
fn test_strict_mode_reports_span() {
    let p = ReasoningParser::new(ParserConfig {
        strict_classification: true,
        ..ParserConfig::default()
    })
    .unwrap();

    let text = "Maybe it rains. The sky is blue.";
    match p.parse(text).unwrap_err() {
        ReasoningError::UnclassifiableInput { start, end, .. } => {
            assert_eq!(&text[start..end], "The sky is blue.");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_custom_rule_table() {
    let rules = RuleTable::new(vec![CueRule::new(
        ReasoningType::IncentiveReasoning,
        &["bonus points"],
        0.8,
    )])
    .unwrap();
    let p = ReasoningParser::with_rules(ParserConfig::default(), rules).unwrap();

    let chain = p.parse("I get bonus points. Maybe not.").unwrap();
    assert!(chain.step(1).unwrap().has_type(ReasoningType::IncentiveReasoning));
    assert!(chain.step(2).unwrap().is_unclassified());
}

#[test]
fn test_invalid_rule_table_rejected() {
    let err = RuleTable::new(vec![CueRule::new(ReasoningType::Uncertainty, &["maybe"], 1.5)])
        .unwrap_err();
    assert!(matches!(err, ReasoningError::InvalidConfiguration { .. }));
}

// ============================================================================
// Chain builder
// ============================================================================

#[test]
fn test_builder_rejects_overlapping_spans() {
    let spans = vec![
        ClassifiedSpan::new(SourceSpan::new(0, 6), Classification::unclassified()),
        ClassifiedSpan::new(SourceSpan::new(4, 10), Classification::unclassified()),
    ];
    let err = ChainBuilder::build("abcdefghijkl", spans).unwrap_err();
    assert!(matches!(err, ReasoningError::MalformedChain { .. }));
}

#[test]
fn test_builder_rejects_out_of_bounds_span() {
    let spans = vec![ClassifiedSpan::new(
        SourceSpan::new(0, 50),
        Classification::unclassified(),
    )];
    let err = ChainBuilder::build("short", spans).unwrap_err();
    assert!(matches!(err, ReasoningError::MalformedChain { .. }));
}
