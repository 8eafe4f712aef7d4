//! Chain assembly with structural validation.

use std::sync::Arc;

use tracing::debug;

use super::{ClassifiedSpan, Classification, ReasoningChain, ReasoningStep, SourceSpan};
use crate::error::{ReasoningError, ReasoningResult};

/// Separator used when a chain's source text has to be synthesized from
/// step contents.
pub const SYNTHESIZED_SEPARATOR: &str = "\n";

/// Assembles classified spans into an immutable [`ReasoningChain`].
///
/// Construction is all-or-nothing: any ordering, overlap or bounds
/// violation fails the whole build with [`ReasoningError::MalformedChain`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ChainBuilder;

impl ChainBuilder {
    /// Build a chain over `text` from already-classified spans.
    pub fn build(text: &str, spans: Vec<ClassifiedSpan>) -> ReasoningResult<ReasoningChain> {
        Self::build_shared(Arc::from(text), spans)
    }

    /// Build a chain reusing an existing shared source text.
    pub fn build_shared(
        source: Arc<str>,
        spans: Vec<ClassifiedSpan>,
    ) -> ReasoningResult<ReasoningChain> {
        let mut steps = Vec::with_capacity(spans.len());
        let mut previous: Option<SourceSpan> = None;

        for (position, classified) in spans.into_iter().enumerate() {
            let span = classified.span;
            validate_span(&source, span, position, previous)?;

            let content = source[span.start..span.end].to_string();
            validate_cues(&content, &classified.classification, position)?;

            let Classification { types, cues } = classified.classification;
            steps.push(ReasoningStep {
                index: position + 1,
                content,
                source_offsets: span,
                types,
                matched_cues: cues,
            });
            previous = Some(span);
        }

        debug!(steps = steps.len(), "Reasoning chain built");
        Ok(ReasoningChain::from_validated(source, steps))
    }

    /// Build a chain from step contents in a new order.
    ///
    /// The source text is synthesized by joining the contents with
    /// [`SYNTHESIZED_SEPARATOR`], so offsets stay monotonic whatever order
    /// the steps arrive in.
    pub fn assemble(parts: Vec<(String, Classification)>) -> ReasoningResult<ReasoningChain> {
        let mut text = String::new();
        let mut spans = Vec::with_capacity(parts.len());

        for (position, (content, classification)) in parts.into_iter().enumerate() {
            if position > 0 {
                text.push_str(SYNTHESIZED_SEPARATOR);
            }
            let start = text.len();
            text.push_str(&content);
            spans.push(ClassifiedSpan::new(
                SourceSpan::new(start, text.len()),
                classification,
            ));
        }

        Self::build(&text, spans)
    }
}

fn validate_span(
    source: &str,
    span: SourceSpan,
    position: usize,
    previous: Option<SourceSpan>,
) -> ReasoningResult<()> {
    let step = position + 1;

    if span.start >= span.end {
        return Err(ReasoningError::malformed(format!(
            "span {} is empty ({}..{})",
            step, span.start, span.end
        )));
    }
    if span.end > source.len() {
        return Err(ReasoningError::malformed(format!(
            "span {} ends at {} beyond text length {}",
            step,
            span.end,
            source.len()
        )));
    }
    if !source.is_char_boundary(span.start) || !source.is_char_boundary(span.end) {
        return Err(ReasoningError::malformed(format!(
            "span {} ({}..{}) does not fall on character boundaries",
            step, span.start, span.end
        )));
    }
    if let Some(prev) = previous {
        if span.start <= prev.start {
            return Err(ReasoningError::malformed(format!(
                "span {} starts at {} which is not after span {} start {}",
                step, span.start, position, prev.start
            )));
        }
        if span.start < prev.end {
            return Err(ReasoningError::malformed(format!(
                "span {} ({}..{}) overlaps span {} ({}..{})",
                step, span.start, span.end, position, prev.start, prev.end
            )));
        }
    }
    Ok(())
}

fn validate_cues(
    content: &str,
    classification: &Classification,
    position: usize,
) -> ReasoningResult<()> {
    for cue in classification.cues() {
        let aligned = cue.start < cue.end
            && cue.end <= content.len()
            && content.is_char_boundary(cue.start)
            && content.is_char_boundary(cue.end)
            && content[cue.start..cue.end] == cue.text;
        if !aligned {
            return Err(ReasoningError::malformed(format!(
                "cue '{}' at {}..{} is not aligned with the content of span {}",
                cue.text,
                cue.start,
                cue.end,
                position + 1
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{MatchedCue, ReasoningType};
    use std::collections::BTreeMap;

    fn unclassified(start: usize, end: usize) -> ClassifiedSpan {
        ClassifiedSpan::new(SourceSpan::new(start, end), Classification::unclassified())
    }

    fn goal_classification(content: &str, cue: &str) -> Classification {
        let start = content.find(cue).unwrap();
        let mut types = BTreeMap::new();
        types.insert(ReasoningType::GoalReasoning, 0.8);
        Classification::from_parts(
            types,
            vec![MatchedCue {
                reasoning_type: ReasoningType::GoalReasoning,
                pattern: cue.to_string(),
                text: cue.to_string(),
                start,
                end: start + cue.len(),
            }],
        )
    }

    #[test]
    fn test_build_assigns_indices_and_content() {
        let text = "First part. Second part.";
        let chain =
            ChainBuilder::build(text, vec![unclassified(0, 11), unclassified(12, 24)]).unwrap();

        assert_eq!(chain.len(), 2);
        assert_eq!(chain.steps()[0].index, 1);
        assert_eq!(chain.steps()[0].content, "First part.");
        assert_eq!(chain.steps()[1].index, 2);
        assert_eq!(chain.steps()[1].content, "Second part.");
        assert_eq!(chain.source_text(), text);
    }

    #[test]
    fn test_build_empty_is_valid() {
        let chain = ChainBuilder::build("", Vec::new()).unwrap();
        assert!(chain.is_empty());
        assert!(chain.type_distribution().is_empty());
    }

    #[test]
    fn test_build_rejects_overlap() {
        let err = ChainBuilder::build("abcdefghij", vec![unclassified(0, 5), unclassified(4, 8)])
            .unwrap_err();
        assert!(matches!(err, ReasoningError::MalformedChain { .. }));
        assert!(err.to_string().contains("overlaps"));
    }

    #[test]
    fn test_build_rejects_unordered_spans() {
        let err = ChainBuilder::build("abcdefghij", vec![unclassified(5, 8), unclassified(0, 3)])
            .unwrap_err();
        assert!(matches!(err, ReasoningError::MalformedChain { .. }));
    }

    #[test]
    fn test_build_rejects_out_of_bounds() {
        let err = ChainBuilder::build("short", vec![unclassified(0, 50)]).unwrap_err();
        assert!(err.to_string().contains("beyond text length"));
    }

    #[test]
    fn test_build_rejects_empty_span() {
        let err = ChainBuilder::build("short", vec![unclassified(2, 2)]).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_build_rejects_non_char_boundary() {
        // 'é' is two bytes; offset 1 splits it
        let err = ChainBuilder::build("é and more", vec![unclassified(1, 5)]).unwrap_err();
        assert!(err.to_string().contains("character boundaries"));
    }

    #[test]
    fn test_build_rejects_misaligned_cue() {
        let classification = goal_classification("my goal is clear", "goal");
        // span content is "is clear", which does not contain the cue at its recorded offset
        let text = "my goal is clear";
        let err = ChainBuilder::build(
            text,
            vec![ClassifiedSpan::new(SourceSpan::new(8, 16), classification)],
        )
        .unwrap_err();
        assert!(err.to_string().contains("not aligned"));
    }

    #[test]
    fn test_assemble_synthesizes_source() {
        let parts = vec![
            (
                "my goal is clear".to_string(),
                goal_classification("my goal is clear", "goal"),
            ),
            ("nothing here".to_string(), Classification::unclassified()),
        ];
        let chain = ChainBuilder::assemble(parts).unwrap();

        assert_eq!(chain.source_text(), "my goal is clear\nnothing here");
        assert_eq!(chain.steps()[1].source_offsets, SourceSpan::new(17, 29));
        assert!(chain.steps()[0].has_type(ReasoningType::GoalReasoning));
    }

    #[test]
    fn test_chain_equality_ignores_cache_state() {
        let a = ChainBuilder::build("One. Two.", vec![unclassified(0, 4), unclassified(5, 9)])
            .unwrap();
        let b = a.clone();
        let _ = a.type_distribution();
        assert_eq!(a, b);
    }
}
