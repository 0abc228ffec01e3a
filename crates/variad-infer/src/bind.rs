//! Binding formal parameter lists against actual argument types.
//!
//! A formal list is a fixed prefix, any number of variadic slots, and a
//! fixed suffix. The binder peels fixed-length slots off both ends of the
//! list, then assigns whatever remains in the middle to the single open
//! tuple variable. A variadic slot whose tuple is already bound (by an
//! anchor, an earlier slot, or an enclosing constraint) counts as fixed
//! length, which is how anchors fix the split between two tuple variables.
//!
//! Matching is one-directional: variables on the formal side bind; the
//! actual side is treated as data.

use variad_types::{
    Binding, CallSite, ParameterList, ParameterSlot, Signature, TupleVarId, TypeExpr, VarId, VarRef,
};

use crate::expand::map_op;
use crate::trace::{MatchAction, MatchStep, Tracer};
use crate::{Arity, MatchError, PathSegment};

/// A sibling constraint solved before the parameter list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    pub formal: TypeExpr,
    pub actual: TypeExpr,
}

impl Anchor {
    pub fn new(formal: TypeExpr, actual: TypeExpr) -> Self {
        Self { formal, actual }
    }
}

/// Which kind of list is being matched; decides the path segment per index.
#[derive(Debug, Clone, Copy)]
enum ListKind {
    Params,
    Args,
    CallableParams,
    Members,
    Elements,
}

impl ListKind {
    fn segment(self, index: usize) -> PathSegment {
        match self {
            ListKind::Params => PathSegment::Param(index),
            ListKind::Args => PathSegment::Arg(index),
            ListKind::CallableParams => PathSegment::CallableParam(index),
            ListKind::Members => PathSegment::Member(index),
            ListKind::Elements => PathSegment::Element(index),
        }
    }
}

/// Matches formal parameter lists against actuals, one attempt at a time.
///
/// Each public entry point starts from an empty binding and either returns
/// the complete binding or the first failure; partial bindings are never
/// exposed.
#[derive(Debug, Clone, Default)]
pub struct Binder {
    binding: Binding,
    tracer: Tracer,
}

impl Binder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a step trace for each subsequent attempt.
    pub fn enable_tracing(&mut self) {
        self.tracer.enable();
    }

    /// Steps of the most recent attempt (empty unless tracing is enabled).
    pub fn trace(&self) -> &[MatchStep] {
        self.tracer.steps()
    }

    /// Match a formal parameter list against actual argument types.
    pub fn match_params(
        &mut self,
        formal: &ParameterList,
        actual: &[TypeExpr],
    ) -> Result<Binding, MatchError> {
        self.match_anchored(formal, actual, &[])
    }

    /// Match a single formal type expression against an actual one.
    pub fn match_expr(
        &mut self,
        formal: &TypeExpr,
        actual: &TypeExpr,
    ) -> Result<Binding, MatchError> {
        self.begin();
        let result = self.unify(formal, actual, &mut Vec::new());
        self.finish(result)
    }

    /// Solve `anchors` left to right, then match the parameter list.
    ///
    /// Two anchors that assign different contents to the same tuple
    /// variable are reported as `AmbiguousSplit`: the split they were meant
    /// to fix is not determined.
    pub fn match_anchored(
        &mut self,
        formal: &ParameterList,
        actual: &[TypeExpr],
        anchors: &[Anchor],
    ) -> Result<Binding, MatchError> {
        self.begin();
        let result = self.anchored(formal, actual, anchors);
        self.finish(result)
    }

    /// Match a call site against a function signature.
    ///
    /// Keyword parameters act as anchors and are solved first, in
    /// declaration order. Extra keywords go to `**kwargs` when declared.
    pub fn match_call(
        &mut self,
        signature: &Signature,
        call: &CallSite,
    ) -> Result<Binding, MatchError> {
        self.begin();
        let result = self.call(signature, call);
        self.finish(result)
    }

    fn begin(&mut self) {
        self.binding = Binding::new();
        self.tracer.clear();
    }

    fn finish(&mut self, result: Result<(), MatchError>) -> Result<Binding, MatchError> {
        let binding = std::mem::take(&mut self.binding);
        result.map(|()| binding)
    }

    fn anchored(
        &mut self,
        formal: &ParameterList,
        actual: &[TypeExpr],
        anchors: &[Anchor],
    ) -> Result<(), MatchError> {
        for (i, anchor) in anchors.iter().enumerate() {
            let mut path = vec![PathSegment::Anchor(i)];
            self.solve_anchor(&anchor.formal, &anchor.actual, &mut path)?;
        }
        self.match_list(formal.slots(), actual, ListKind::Params, &mut Vec::new())
    }

    fn call(&mut self, signature: &Signature, call: &CallSite) -> Result<(), MatchError> {
        for (name, formal) in &signature.keyword {
            let mut path = vec![PathSegment::Keyword(name.clone())];
            let Some(actual) = call.keyword_arg(name) else {
                return Err(MatchError::MissingKeyword {
                    function: signature.name.clone(),
                    name: name.clone(),
                    path,
                });
            };
            self.solve_anchor(formal, actual, &mut path)?;
        }
        for (name, actual) in &call.keyword {
            if signature.keyword.iter().any(|(kw, _)| kw == name) {
                continue;
            }
            let mut path = vec![PathSegment::Keyword(name.clone())];
            match &signature.kwargs {
                Some(kwargs) => self.unify(kwargs, actual, &mut path)?,
                None => {
                    return Err(MatchError::UnexpectedKeyword {
                        function: signature.name.clone(),
                        name: name.clone(),
                        path,
                    });
                }
            }
        }
        self.match_list(
            signature.positional.slots(),
            &call.positional,
            ListKind::Params,
            &mut Vec::new(),
        )
    }

    fn solve_anchor(
        &mut self,
        formal: &TypeExpr,
        actual: &TypeExpr,
        path: &mut Vec<PathSegment>,
    ) -> Result<(), MatchError> {
        let anchored: Vec<TupleVarId> = formal
            .tuple_vars()
            .into_iter()
            .filter(|id| self.binding.tuple(*id).is_some())
            .collect();
        self.tracer.push(MatchAction::SolveAnchor, formal, actual, || {
            "sibling constraint solved before the parameter list".into()
        });
        match self.unify(formal, actual, path) {
            Err(MatchError::Inconsistent {
                var: VarRef::Tuple(id),
                path,
                ..
            }) if anchored.contains(&id) => Err(MatchError::AmbiguousSplit {
                tuples: vec![id],
                path,
            }),
            Err(MatchError::ArityMismatch { path, .. }) if !anchored.is_empty() => {
                Err(MatchError::AmbiguousSplit {
                    tuples: anchored,
                    path,
                })
            }
            other => other,
        }
    }

    // -----------------------------------------------------------------------
    // Unification
    // -----------------------------------------------------------------------

    fn unify(
        &mut self,
        formal: &TypeExpr,
        actual: &TypeExpr,
        path: &mut Vec<PathSegment>,
    ) -> Result<(), MatchError> {
        match (formal, actual) {
            (TypeExpr::Variable(var), _) => self.bind_scalar(*var, actual, path),
            (TypeExpr::TupleVariable(id), _) => match actual.tuple_elements() {
                Some(elements) => {
                    self.tracer.push(MatchAction::Decompose, formal, actual, || {
                        "Ts ~ tuple[...] → match [*Ts] against the elements".into()
                    });
                    let slots = [ParameterSlot::VariadicUnpack(*id)];
                    self.match_list(&slots, &elements, ListKind::Elements, path)
                }
                None => self.mismatch(formal, actual, path),
            },
            (TypeExpr::GenericApp { args, .. }, TypeExpr::TupleVariable(id))
                if formal.tuple_elements().is_some() =>
            {
                let slots = ParameterList::from_exprs(args);
                let elements = [TypeExpr::Unpack(*id)];
                self.match_list(slots.slots(), &elements, ListKind::Elements, path)
            }
            (TypeExpr::Concrete(left), TypeExpr::Concrete(right)) if left == right => {
                self.tracer
                    .push(MatchAction::Identity, formal, actual, || "same name".into());
                Ok(())
            }
            (
                TypeExpr::GenericApp {
                    ctor: formal_ctor,
                    args: formal_args,
                },
                TypeExpr::GenericApp {
                    ctor: actual_ctor,
                    args: actual_args,
                },
            ) => {
                self.tracer.push(MatchAction::Decompose, formal, actual, || {
                    "F[args] ~ G[args] → unify constructors, then match args".into()
                });
                path.push(PathSegment::Ctor);
                self.unify(formal_ctor, actual_ctor, path)?;
                path.pop();
                let slots = ParameterList::from_exprs(formal_args);
                self.match_list(slots.slots(), actual_args, ListKind::Args, path)
            }
            (
                TypeExpr::Callable {
                    params: formal_params,
                    ret: formal_ret,
                },
                TypeExpr::Callable {
                    params: actual_params,
                    ret: actual_ret,
                },
            ) => {
                self.tracer.push(MatchAction::Decompose, formal, actual, || {
                    "(P1) -> R1 ~ (P2) -> R2 → match params, then unify returns".into()
                });
                let slots = ParameterList::from_exprs(formal_params);
                self.match_list(slots.slots(), actual_params, ListKind::CallableParams, path)?;
                path.push(PathSegment::Return);
                self.unify(formal_ret, actual_ret, path)?;
                path.pop();
                Ok(())
            }
            (TypeExpr::Union(formal_members), TypeExpr::Union(actual_members)) => {
                self.tracer.push(MatchAction::Decompose, formal, actual, || {
                    "union members matched in order".into()
                });
                let slots = ParameterList::from_exprs(formal_members);
                self.match_list(slots.slots(), actual_members, ListKind::Members, path)
            }
            _ if formal == actual => {
                self.tracer
                    .push(MatchAction::Identity, formal, actual, || "types already equal".into());
                Ok(())
            }
            _ => self.mismatch(formal, actual, path),
        }
    }

    fn mismatch(
        &mut self,
        formal: &TypeExpr,
        actual: &TypeExpr,
        path: &[PathSegment],
    ) -> Result<(), MatchError> {
        self.tracer
            .push(MatchAction::Error, formal, actual, || "type mismatch".into());
        Err(MatchError::TypeMismatch {
            expected: formal.clone(),
            actual: actual.clone(),
            path: path.to_vec(),
        })
    }

    fn bind_scalar(
        &mut self,
        var: VarId,
        actual: &TypeExpr,
        path: &[PathSegment],
    ) -> Result<(), MatchError> {
        match self.binding.scalar(var) {
            Some(previous) if previous == actual => Ok(()),
            Some(previous) => {
                let previous = previous.clone();
                self.tracer.push(MatchAction::Error, var, actual, || {
                    format!("{var} already bound to {previous}")
                });
                Err(MatchError::Inconsistent {
                    var: VarRef::Scalar(var),
                    previous,
                    found: actual.clone(),
                    path: path.to_vec(),
                })
            }
            None => {
                self.tracer
                    .push(MatchAction::BindScalar, var, actual, || format!("{var} := {actual}"));
                self.binding.bind_scalar(var, actual.clone());
                Ok(())
            }
        }
    }

    fn bind_tuple(
        &mut self,
        id: TupleVarId,
        contents: &[TypeExpr],
        path: &[PathSegment],
    ) -> Result<(), MatchError> {
        match self.binding.tuple(id) {
            Some(previous) if previous == contents => Ok(()),
            Some(previous) => {
                let previous = TypeExpr::tuple(previous.to_vec());
                let found = TypeExpr::tuple(contents.to_vec());
                self.tracer.push(MatchAction::Error, id, &found, || {
                    format!("{id} already bound to {previous}")
                });
                Err(MatchError::Inconsistent {
                    var: VarRef::Tuple(id),
                    previous,
                    found,
                    path: path.to_vec(),
                })
            }
            None => {
                if self.tracer.is_enabled() {
                    let found = TypeExpr::tuple(contents.to_vec());
                    self.tracer
                        .push(MatchAction::BindTuple, id, &found, || format!("{id} := {found}"));
                }
                self.binding.bind_tuple(id, contents.to_vec());
                Ok(())
            }
        }
    }

    // -----------------------------------------------------------------------
    // List matching
    // -----------------------------------------------------------------------

    /// Length of the actual segment a slot consumes, if already known.
    fn segment_len(&self, slot: &ParameterSlot) -> Option<usize> {
        match slot {
            ParameterSlot::Fixed(_) => Some(1),
            ParameterSlot::VariadicUnpack(id) | ParameterSlot::Mapped { tuple: id, .. } => {
                self.binding.tuple(*id).map(<[TypeExpr]>::len)
            }
        }
    }

    fn match_list(
        &mut self,
        slots: &[ParameterSlot],
        actual: &[TypeExpr],
        kind: ListKind,
        path: &mut Vec<PathSegment>,
    ) -> Result<(), MatchError> {
        let (required, open) = self.required_len(slots);
        if open == 0 && actual.len() != required {
            return Err(MatchError::ArityMismatch {
                expected: Arity::Exactly(required),
                found: actual.len(),
                path: path.clone(),
            });
        }
        if actual.len() < required {
            return Err(MatchError::ArityMismatch {
                expected: Arity::AtLeast(required),
                found: actual.len(),
                path: path.clone(),
            });
        }

        let (mut lo_slot, mut hi_slot) = (0, slots.len());
        let (mut lo, mut hi) = (0, actual.len());
        loop {
            let mut progressed = false;

            // Fixed-length slots off the front.
            while lo_slot < hi_slot {
                let Some(len) = self.segment_len(&slots[lo_slot]) else {
                    break;
                };
                if hi - lo < len {
                    return Err(self.short_arity(slots, lo_slot, hi_slot, hi - lo, path));
                }
                self.match_segment(&slots[lo_slot], &actual[lo..lo + len], lo, kind, path)?;
                lo += len;
                lo_slot += 1;
                progressed = true;
            }

            // Fixed-length slots off the back.
            while lo_slot < hi_slot {
                let Some(len) = self.segment_len(&slots[hi_slot - 1]) else {
                    break;
                };
                if hi - lo < len {
                    return Err(self.short_arity(slots, lo_slot, hi_slot, hi - lo, path));
                }
                let segment = &actual[hi - len..hi];
                self.match_segment(&slots[hi_slot - 1], segment, hi - len, kind, path)?;
                hi -= len;
                hi_slot -= 1;
                progressed = true;
            }

            if lo_slot == hi_slot {
                if lo != hi {
                    let (required, _) = self.required_len(slots);
                    return Err(MatchError::ArityMismatch {
                        expected: Arity::Exactly(required),
                        found: actual.len(),
                        path: path.clone(),
                    });
                }
                return Ok(());
            }
            if progressed {
                // A binding made at one end may have fixed a slot at the other.
                continue;
            }

            // Both ends are open variadic slots.
            let remaining = &slots[lo_slot..hi_slot];
            let open_ids = self.open_ids(remaining);
            if open_ids.len() > 1 {
                if self.tracer.is_enabled() {
                    self.tracer.push(
                        MatchAction::Error,
                        ParameterList::new(remaining.to_vec()),
                        render_seq(&actual[lo..hi]),
                        || "several open tuple variables".into(),
                    );
                }
                return Err(MatchError::AmbiguousSplit {
                    tuples: open_ids,
                    path: path.clone(),
                });
            }

            let fixed: usize = remaining.iter().filter_map(|s| self.segment_len(s)).sum();
            let occurrences = remaining
                .iter()
                .filter(|s| s.is_variadic() && self.segment_len(s).is_none())
                .count();
            let Some(available) = (hi - lo).checked_sub(fixed) else {
                return Err(self.short_arity(slots, lo_slot, hi_slot, hi - lo, path));
            };
            if available % occurrences != 0 {
                return Err(MatchError::ArityMismatch {
                    expected: Arity::MultipleOf(occurrences),
                    found: available,
                    path: path.clone(),
                });
            }
            let len = available / occurrences;
            if occurrences > 1 && self.tracer.is_enabled() {
                self.tracer.push(
                    MatchAction::SplitEvenly,
                    ParameterList::new(remaining.to_vec()),
                    render_seq(&actual[lo..hi]),
                    || format!("{available} argument(s) over {occurrences} occurrence(s)"),
                );
            }
            self.solve_open(&slots[lo_slot], &actual[lo..lo + len], lo, kind, path)?;
            lo += len;
            lo_slot += 1;
        }
    }

    /// Actuals required by the slots whose length is known, and the number
    /// of open variadic slots.
    fn required_len(&self, slots: &[ParameterSlot]) -> (usize, usize) {
        slots
            .iter()
            .fold((0, 0), |(required, open), slot| match self.segment_len(slot) {
                Some(len) => (required + len, open),
                None => (required, open + 1),
            })
    }

    fn short_arity(
        &self,
        slots: &[ParameterSlot],
        lo_slot: usize,
        hi_slot: usize,
        found: usize,
        path: &[PathSegment],
    ) -> MatchError {
        let (required, open) = self.required_len(&slots[lo_slot..hi_slot]);
        MatchError::ArityMismatch {
            expected: if open == 0 {
                Arity::Exactly(required)
            } else {
                Arity::AtLeast(required)
            },
            found,
            path: path.to_vec(),
        }
    }

    fn open_ids(&self, slots: &[ParameterSlot]) -> Vec<TupleVarId> {
        let mut ids = Vec::new();
        for slot in slots {
            if let Some(id) = slot.tuple_id()
                && self.binding.tuple(id).is_none()
                && !ids.contains(&id)
            {
                ids.push(id);
            }
        }
        ids
    }

    /// Match a slot whose length is known against its segment.
    fn match_segment(
        &mut self,
        slot: &ParameterSlot,
        segment: &[TypeExpr],
        offset: usize,
        kind: ListKind,
        path: &mut Vec<PathSegment>,
    ) -> Result<(), MatchError> {
        match slot {
            ParameterSlot::Fixed(formal) => {
                path.push(kind.segment(offset));
                self.unify(formal, &segment[0], path)?;
                path.pop();
                Ok(())
            }
            ParameterSlot::VariadicUnpack(id) => {
                path.push(kind.segment(offset));
                self.bind_tuple(*id, segment, path)?;
                path.pop();
                Ok(())
            }
            ParameterSlot::Mapped { ctor, tuple } => {
                let bound = self.binding.tuple(*tuple).unwrap_or_default().to_vec();
                let expanded = map_op(ctor, &bound);
                if self.tracer.is_enabled() {
                    self.tracer.push(
                        MatchAction::ExpandMap,
                        slot,
                        render_seq(segment),
                        || format!("{tuple} is bound, Map yields {}", render_seq(&expanded)),
                    );
                }
                for (i, (formal, actual)) in expanded.iter().zip(segment).enumerate() {
                    path.push(kind.segment(offset + i));
                    self.unify(formal, actual, path)?;
                    path.pop();
                }
                Ok(())
            }
        }
    }

    /// Solve the only open tuple variable from its segment.
    fn solve_open(
        &mut self,
        slot: &ParameterSlot,
        segment: &[TypeExpr],
        offset: usize,
        kind: ListKind,
        path: &mut Vec<PathSegment>,
    ) -> Result<(), MatchError> {
        match slot {
            ParameterSlot::VariadicUnpack(id) => {
                path.push(kind.segment(offset));
                self.bind_tuple(*id, segment, path)?;
                path.pop();
                Ok(())
            }
            ParameterSlot::Mapped { ctor, tuple } => {
                if self.tracer.is_enabled() {
                    self.tracer.push(MatchAction::InvertMap, slot, render_seq(segment), || {
                        format!("{tuple} is only determined by this Map; strip `{ctor}`")
                    });
                }
                let mut contents = Vec::with_capacity(segment.len());
                for (i, actual) in segment.iter().enumerate() {
                    path.push(kind.segment(offset + i));
                    match actual {
                        TypeExpr::GenericApp {
                            ctor: actual_ctor,
                            args,
                        } if args.len() == 1 => {
                            path.push(PathSegment::Ctor);
                            self.unify(ctor, actual_ctor, path)?;
                            path.pop();
                            contents.push(args[0].clone());
                        }
                        _ => {
                            let expected =
                                TypeExpr::app(ctor.clone(), vec![TypeExpr::Unpack(*tuple)]);
                            return self.mismatch(&expected, actual, path);
                        }
                    }
                    path.pop();
                }
                self.bind_tuple(*tuple, &contents, path)
            }
            ParameterSlot::Fixed(_) => self.match_segment(slot, segment, offset, kind, path),
        }
    }
}

fn render_seq(items: &[TypeExpr]) -> String {
    TypeExpr::tuple(items.to_vec()).to_string()
}
