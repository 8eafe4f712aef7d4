//! Decision tracing.
//!
//! A [`DecisionTrace`] records a decision, the context it was made in and
//! the free-form reasoning behind it, with that reasoning parsed into a
//! [`ReasoningChain`]. Traces accumulate in order in a [`DecisionPath`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::info;
use uuid::Uuid;

use crate::chain::{ReasoningChain, ReasoningType, TypeDistribution};
use crate::error::ReasoningResult;
use crate::parser::ReasoningParser;

/// One traced decision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionTrace {
    /// Unique trace identifier.
    pub id: Uuid,
    /// When the decision was traced.
    pub timestamp: DateTime<Utc>,
    /// The decision taken.
    pub decision: String,
    /// Caller-supplied context.
    pub context: BTreeMap<String, Value>,
    /// Raw reasoning text.
    pub reasoning: String,
    /// `reasoning` parsed into steps.
    pub reasoning_chain: ReasoningChain,
}

/// Ordered sequence of traced decisions.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DecisionPath {
    traces: Vec<DecisionTrace>,
}

impl DecisionPath {
    /// Traces in the order they were recorded.
    pub fn traces(&self) -> &[DecisionTrace] {
        &self.traces
    }

    /// Number of traces.
    pub fn len(&self) -> usize {
        self.traces.len()
    }

    /// Whether nothing was traced.
    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    /// Most recent trace.
    pub fn last(&self) -> Option<&DecisionTrace> {
        self.traces.last()
    }

    /// Decisions in order.
    pub fn decisions(&self) -> Vec<&str> {
        self.traces.iter().map(|t| t.decision.as_str()).collect()
    }

    /// Type histogram summed over every traced chain.
    pub fn type_distribution(&self) -> TypeDistribution {
        let steps: Vec<_> = self
            .traces
            .iter()
            .flat_map(|t| t.reasoning_chain.steps().iter().cloned())
            .collect();
        TypeDistribution::from_steps(&steps)
    }

    /// Traces whose reasoning carries the given type.
    pub fn traces_with_type(&self, reasoning_type: ReasoningType) -> Vec<&DecisionTrace> {
        self.traces
            .iter()
            .filter(|t| t.reasoning_chain.contains_type(reasoning_type))
            .collect()
    }
}

/// Records decisions with parsed reasoning.
#[derive(Debug, Clone)]
pub struct DecisionTracer {
    parser: ReasoningParser,
    path: DecisionPath,
}

impl DecisionTracer {
    /// Create a new tracer
    pub fn new(parser: ReasoningParser) -> Self {
        Self {
            parser,
            path: DecisionPath::default(),
        }
    }

    /// Parse `reasoning` and append a trace to the path.
    pub fn trace(
        &mut self,
        decision: impl Into<String>,
        context: BTreeMap<String, Value>,
        reasoning: impl Into<String>,
    ) -> ReasoningResult<&DecisionTrace> {
        let reasoning = reasoning.into();
        let reasoning_chain = self.parser.parse(&reasoning)?;
        let trace = DecisionTrace {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            decision: decision.into(),
            context,
            reasoning,
            reasoning_chain,
        };

        info!(
            trace_id = %trace.id,
            decision = %trace.decision,
            steps = trace.reasoning_chain.len(),
            "Decision traced"
        );

        let position = self.path.traces.len();
        self.path.traces.push(trace);
        Ok(&self.path.traces[position])
    }

    /// The path so far.
    pub fn path(&self) -> &DecisionPath {
        &self.path
    }

    /// Consume the tracer, returning its path.
    pub fn into_path(self) -> DecisionPath {
        self.path
    }

    /// Drop every recorded trace.
    pub fn clear(&mut self) {
        self.path.traces.clear();
    }
}
