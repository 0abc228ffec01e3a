//! Step traces for matcher observability.
//!
//! These types record how a binding or an alias expansion was reached, one
//! step per decision. Tracing is opt-in via `Binder::enable_tracing()` and
//! `AliasExpander::enable_tracing()`; nothing is recorded otherwise.

use serde::Serialize;

/// A single step in a match or expansion trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchStep {
    pub step: usize,
    pub action: MatchAction,
    pub formal: String,
    pub actual: String,
    pub detail: String,
}

/// What the matcher did at a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchAction {
    /// Formal and actual are already identical.
    Identity,
    /// Structural recursion into constructor arguments or callable parts.
    Decompose,
    /// Scalar variable bound (e.g. `T0 := int`).
    BindScalar,
    /// Tuple variable bound to the remaining middle slice.
    BindTuple,
    /// Open variadic slots sharing one tuple id split the remainder evenly.
    SplitEvenly,
    /// Sibling constraint solved ahead of the parameter list.
    SolveAnchor,
    /// Bound `Map` slot expanded into a fixed-arity segment.
    ExpandMap,
    /// Unbound `Map` slot solved by stripping the constructor off each actual.
    InvertMap,
    /// Alias instantiated with its arguments.
    ExpandAlias,
    /// Matching or expansion failed.
    Error,
}

/// Records steps when enabled.
#[derive(Debug, Clone, Default)]
pub(crate) struct Tracer {
    enabled: bool,
    steps: Vec<MatchStep>,
}

impl Tracer {
    pub(crate) fn enable(&mut self) {
        self.enabled = true;
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub(crate) fn clear(&mut self) {
        self.steps.clear();
    }

    pub(crate) fn steps(&self) -> &[MatchStep] {
        &self.steps
    }

    pub(crate) fn push(
        &mut self,
        action: MatchAction,
        formal: impl ToString,
        actual: impl ToString,
        detail: impl FnOnce() -> String,
    ) {
        if self.enabled {
            let step = self.steps.len() + 1;
            self.steps.push(MatchStep {
                step,
                action,
                formal: formal.to_string(),
                actual: actual.to_string(),
                detail: detail(),
            });
        }
    }
}
