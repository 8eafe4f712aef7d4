//! Rule-driven, multi-label span classification.

use std::collections::BTreeMap;

use crate::chain::{Classification, ClassifiedSpan, MatchedCue, ReasoningType, SourceSpan};
use crate::error::{ReasoningError, ReasoningResult};

use super::rules::{RuleScope, RuleTable};

const EXCERPT_CHARS: usize = 60;

/// Generic evaluator over a [`RuleTable`].
///
/// Every matching rule fires. A type's confidence is the maximum base
/// confidence among its matching rules, so repeated cue words never inflate
/// it. Each fired rule records the literal substring of every pattern that
/// matched.
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: RuleTable,
    strict: bool,
}

impl Classifier {
    /// Create a new classifier
    pub fn new(rules: RuleTable, strict: bool) -> Self {
        Self { rules, strict }
    }

    /// The rule table in use.
    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    /// Whether unmatched spans are errors.
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Classify span content. Never fails; unmatched content is
    /// `{unclassified: 0.0}`.
    pub fn classify(&self, content: &str) -> Classification {
        self.evaluate(content, &[])
    }

    /// Classify with the rules of some types suppressed.
    pub fn classify_excluding(&self, content: &str, excluded: &[ReasoningType]) -> Classification {
        self.evaluate(content, excluded)
    }

    /// Classify a span of `text`, honouring strict mode.
    pub fn classify_span(&self, text: &str, span: SourceSpan) -> ReasoningResult<ClassifiedSpan> {
        let content = &text[span.start..span.end];
        let classification = self.classify(content);
        if self.strict && classification.is_unclassified() {
            return Err(ReasoningError::UnclassifiableInput {
                start: span.start,
                end: span.end,
                excerpt: content.chars().take(EXCERPT_CHARS).collect(),
            });
        }
        Ok(ClassifiedSpan::new(span, classification))
    }

    fn evaluate(&self, content: &str, excluded: &[ReasoningType]) -> Classification {
        let clause = &content[..first_clause_end(content)];
        let mut types: BTreeMap<ReasoningType, f64> = BTreeMap::new();
        let mut cues: Vec<MatchedCue> = Vec::new();

        for compiled in self.rules.compiled() {
            let rule = &compiled.rule;
            if excluded.contains(&rule.reasoning_type) {
                continue;
            }
            let scope = match rule.scope {
                RuleScope::WholeSpan => content,
                RuleScope::FirstClause => clause,
            };

            let mut fired = false;
            for (pattern, matcher) in &compiled.matchers {
                let Some(m) = matcher.find(scope) else {
                    continue;
                };
                fired = true;
                let cue = MatchedCue {
                    reasoning_type: rule.reasoning_type,
                    pattern: pattern.clone(),
                    text: m.as_str().to_string(),
                    start: m.start(),
                    end: m.end(),
                };
                if !cues.contains(&cue) {
                    cues.push(cue);
                }
            }

            if fired {
                let confidence = types.entry(rule.reasoning_type).or_insert(0.0);
                *confidence = confidence.max(rule.base_confidence);
            }
        }

        Classification::from_parts(types, cues)
    }
}

/// End of the first clause: the first `,`, `;` or `:`, or the whole text.
fn first_clause_end(content: &str) -> usize {
    content
        .find(&[',', ';', ':'][..])
        .unwrap_or(content.len())
}
