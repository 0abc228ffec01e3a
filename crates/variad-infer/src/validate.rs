//! Declaration-time checks, run once when an alias or function is
//! registered.
//!
//! The ambiguity check replays the binder's front/back peeling over tuple
//! ids instead of types: a slot is "known" once its tuple id has been seen in
//! a sibling or in a fixed slot already consumed. Whenever the binder would
//! be stuck with two distinct open ids, no call site can disambiguate them and
//! the list is rejected up front.

use std::collections::BTreeSet;

use variad_types::{Alias, ParameterList, ParameterSlot, Signature, TupleVarId, TypeExpr};

use crate::{MatchError, PathSegment};

/// Reject a list whose variadic split cannot be determined from `siblings`
/// and its own fixed slots. Nested lists are checked as their own contexts.
pub fn validate_parameter_list(
    list: &ParameterList,
    siblings: &[TypeExpr],
) -> Result<(), MatchError> {
    let mut known = BTreeSet::new();
    for sibling in siblings {
        check_nested(sibling, &known, &mut Vec::new())?;
        known.extend(sibling.tuple_vars());
    }
    check_list(
        list.slots(),
        &mut known,
        PathSegment::Param,
        &mut Vec::new(),
    )
}

pub fn validate_signature(signature: &Signature) -> Result<(), MatchError> {
    if let Some(annotation) = &signature.kwargs
        && matches!(
            annotation,
            TypeExpr::TupleVariable(_) | TypeExpr::Unpack(_) | TypeExpr::MapUnpack { .. }
        )
    {
        return Err(MatchError::InvalidKwargsUsage {
            function: signature.name.clone(),
            annotation: annotation.clone(),
        });
    }
    validate_parameter_list(&signature.positional, &signature.siblings())
}

pub fn validate_alias(alias: &Alias) -> Result<(), MatchError> {
    check_single_tuple(alias)?;
    validate_parameter_list(&alias.formal, &[])
}

/// An alias formal mentions at most one distinct tuple id, in any form.
pub(crate) fn check_single_tuple(alias: &Alias) -> Result<(), MatchError> {
    let tuples = alias.formal.tuple_ids();
    if tuples.len() > 1 {
        return Err(MatchError::MultipleDistinctTupleInAlias {
            alias: alias.name.clone(),
            tuples,
        });
    }
    Ok(())
}

fn slot_known(slot: &ParameterSlot, known: &BTreeSet<TupleVarId>) -> bool {
    match slot.tuple_id() {
        Some(id) => known.contains(&id),
        None => true,
    }
}

fn check_list(
    slots: &[ParameterSlot],
    known: &mut BTreeSet<TupleVarId>,
    segment: fn(usize) -> PathSegment,
    path: &mut Vec<PathSegment>,
) -> Result<(), MatchError> {
    let (mut lo, mut hi) = (0, slots.len());
    loop {
        let mut progressed = false;
        while lo < hi && slot_known(&slots[lo], known) {
            consume(&slots[lo], known, segment(lo), path)?;
            lo += 1;
            progressed = true;
        }
        while lo < hi && slot_known(&slots[hi - 1], known) {
            consume(&slots[hi - 1], known, segment(hi - 1), path)?;
            hi -= 1;
            progressed = true;
        }
        if lo == hi {
            return Ok(());
        }
        if progressed {
            continue;
        }

        let mut open: Vec<TupleVarId> = Vec::new();
        for id in slots[lo..hi].iter().filter_map(ParameterSlot::tuple_id) {
            if !known.contains(&id) && !open.contains(&id) {
                open.push(id);
            }
        }
        if open.len() > 1 {
            return Err(MatchError::AmbiguousSplit {
                tuples: open,
                path: path.clone(),
            });
        }
        // One open id: the binder splits the remainder over its occurrences.
        known.extend(open);
    }
}

/// A fixed slot contributes every tuple id it mentions once matched.
fn consume(
    slot: &ParameterSlot,
    known: &mut BTreeSet<TupleVarId>,
    at: PathSegment,
    path: &mut Vec<PathSegment>,
) -> Result<(), MatchError> {
    path.push(at);
    match slot {
        ParameterSlot::Fixed(ty) => {
            check_nested(ty, known, path)?;
            known.extend(ty.tuple_vars());
        }
        ParameterSlot::Mapped { ctor, .. } => {
            path.push(PathSegment::Ctor);
            check_nested(ctor, known, path)?;
            path.pop();
        }
        ParameterSlot::VariadicUnpack(_) => {}
    }
    path.pop();
    Ok(())
}

fn check_nested(
    ty: &TypeExpr,
    known: &BTreeSet<TupleVarId>,
    path: &mut Vec<PathSegment>,
) -> Result<(), MatchError> {
    match ty {
        TypeExpr::GenericApp { ctor, args } => {
            path.push(PathSegment::Ctor);
            check_nested(ctor, known, path)?;
            path.pop();
            let list = ParameterList::from_exprs(args);
            check_list(list.slots(), &mut known.clone(), PathSegment::Arg, path)
        }
        TypeExpr::Callable { params, ret } => {
            let list = ParameterList::from_exprs(params);
            check_list(
                list.slots(),
                &mut known.clone(),
                PathSegment::CallableParam,
                path,
            )?;
            path.push(PathSegment::Return);
            check_nested(ret, known, path)?;
            path.pop();
            Ok(())
        }
        TypeExpr::Union(members) => {
            let list = ParameterList::from_exprs(members);
            check_list(list.slots(), &mut known.clone(), PathSegment::Member, path)
        }
        TypeExpr::MapUnpack { ctor, .. } => check_nested(ctor, known, path),
        TypeExpr::Concrete(_)
        | TypeExpr::Variable(_)
        | TypeExpr::TupleVariable(_)
        | TypeExpr::Unpack(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use variad_diag::render_path;
    use variad_types::VarId;

    use super::*;

    fn c(name: &str) -> TypeExpr {
        TypeExpr::concrete(name)
    }

    const TS1: TupleVarId = TupleVarId(1);
    const TS2: TupleVarId = TupleVarId(2);

    fn list(items: &[TypeExpr]) -> ParameterList {
        ParameterList::from_exprs(items)
    }

    #[test]
    fn single_tuple_with_prefix_and_suffix_is_valid() {
        let formal = list(&[c("int"), TypeExpr::Unpack(TS1), c("str")]);
        assert!(validate_parameter_list(&formal, &[]).is_ok());
    }

    #[test]
    fn two_unanchored_tuples_are_ambiguous() {
        let formal = list(&[TypeExpr::Unpack(TS1), c("int"), TypeExpr::Unpack(TS2)]);
        assert_eq!(
            validate_parameter_list(&formal, &[]).unwrap_err(),
            MatchError::AmbiguousSplit {
                tuples: vec![TS1, TS2],
                path: vec![],
            }
        );
    }

    #[test]
    fn sibling_anchors_one_tuple() {
        let formal = list(&[TypeExpr::Unpack(TS1), TypeExpr::Unpack(TS2)]);
        assert!(validate_parameter_list(&formal, &[TypeExpr::TupleVariable(TS2)]).is_ok());
        assert!(validate_parameter_list(&formal, &[TypeExpr::TupleVariable(TS1)]).is_ok());
    }

    #[test]
    fn anchor_inside_sibling_nested_list() {
        let formal = list(&[TypeExpr::Unpack(TS1), TypeExpr::Unpack(TS2)]);
        let sibling = TypeExpr::callable(vec![TypeExpr::Unpack(TS2)], c("None"));
        assert!(validate_parameter_list(&formal, &[sibling]).is_ok());
    }

    #[test]
    fn wrapped_occurrence_at_end_anchors() {
        let formal = list(&[
            TypeExpr::Unpack(TS1),
            TypeExpr::Unpack(TS2),
            TypeExpr::TupleVariable(TS2),
        ]);
        assert!(validate_parameter_list(&formal, &[]).is_ok());
    }

    #[test]
    fn three_tuples_need_two_anchors() {
        let ts3 = TupleVarId(3);
        let formal = list(&[
            TypeExpr::Unpack(TS1),
            TypeExpr::Unpack(TS2),
            TypeExpr::Unpack(ts3),
        ]);
        let err = validate_parameter_list(&formal, &[TypeExpr::TupleVariable(TS1)]).unwrap_err();
        assert_eq!(
            err,
            MatchError::AmbiguousSplit {
                tuples: vec![TS2, ts3],
                path: vec![],
            }
        );
        assert!(
            validate_parameter_list(
                &formal,
                &[TypeExpr::TupleVariable(TS1), TypeExpr::TupleVariable(ts3)]
            )
            .is_ok()
        );
    }

    #[test]
    fn repeated_single_tuple_is_valid() {
        let formal = list(&[TypeExpr::Unpack(TS1), c("sep"), TypeExpr::Unpack(TS1)]);
        assert!(validate_parameter_list(&formal, &[]).is_ok());
    }

    #[test]
    fn nested_list_is_checked_on_its_own() {
        let nested = TypeExpr::tuple(vec![TypeExpr::Unpack(TS1), TypeExpr::Unpack(TS2)]);
        let formal = list(&[c("int"), nested]);
        let err = validate_parameter_list(&formal, &[]).unwrap_err();
        assert_eq!(err.category(), crate::Category::AmbiguousSplit);
        assert_eq!(render_path(err.path()), "param[1]");
    }

    #[test]
    fn nested_callable_inside_union_is_reported_with_path() {
        let callable = TypeExpr::callable(
            vec![TypeExpr::Unpack(TS1), TypeExpr::Unpack(TS2)],
            c("None"),
        );
        let formal = list(&[TypeExpr::Union(vec![c("int"), callable])]);
        let err = validate_parameter_list(&formal, &[]).unwrap_err();
        assert_eq!(render_path(err.path()), "param[0].member[1]");
    }

    #[test]
    fn kwargs_cannot_take_tuple_variables() {
        let sig = Signature::new("f", list(&[]), c("None")).with_kwargs(TypeExpr::Unpack(TS1));
        assert!(matches!(
            validate_signature(&sig),
            Err(MatchError::InvalidKwargsUsage { .. })
        ));
        let mapped = Signature::new("g", list(&[]), c("None"))
            .with_kwargs(TypeExpr::map_unpack(c("list"), TS1));
        assert!(validate_signature(&mapped).is_err());
        let plain = Signature::new("h", list(&[]), c("None"))
            .with_kwargs(TypeExpr::Variable(VarId(0)));
        assert!(validate_signature(&plain).is_ok());
    }

    #[test]
    fn keyword_parameters_anchor_positional_split() {
        let positional = list(&[TypeExpr::Unpack(TS1), TypeExpr::Unpack(TS2)]);
        let bare = Signature::new("f", positional.clone(), c("None"));
        assert!(validate_signature(&bare).is_err());
        let anchored = bare.with_keyword("tail", TypeExpr::TupleVariable(TS2));
        assert!(validate_signature(&anchored).is_ok());
    }

    #[test]
    fn alias_with_two_tuples_is_rejected() {
        let alias = Alias::new(
            "Both",
            list(&[TypeExpr::Unpack(TS1), TypeExpr::Unpack(TS2)]),
            c("None"),
        );
        assert_eq!(
            validate_alias(&alias).unwrap_err(),
            MatchError::MultipleDistinctTupleInAlias {
                alias: "Both".into(),
                tuples: vec![TS1, TS2],
            }
        );
        let single = Alias::new(
            "One",
            list(&[TypeExpr::Variable(VarId(0)), TypeExpr::Unpack(TS1)]),
            c("None"),
        );
        assert!(validate_alias(&single).is_ok());
    }

    #[test]
    fn alias_counts_wrapped_tuples_too() {
        let mixed = Alias::new(
            "Mixed",
            list(&[TypeExpr::TupleVariable(TS1), TypeExpr::Unpack(TS2)]),
            c("None"),
        );
        assert_eq!(
            validate_alias(&mixed).unwrap_err(),
            MatchError::MultipleDistinctTupleInAlias {
                alias: "Mixed".into(),
                tuples: vec![TS1, TS2],
            }
        );

        let nested = Alias::new(
            "Nested",
            list(&[
                TypeExpr::Unpack(TS1),
                TypeExpr::named_app("list", vec![TypeExpr::Unpack(TS2)]),
            ]),
            c("None"),
        );
        assert!(matches!(
            validate_alias(&nested),
            Err(MatchError::MultipleDistinctTupleInAlias { .. })
        ));

        let same = Alias::new(
            "Same",
            list(&[TypeExpr::TupleVariable(TS1), TypeExpr::Unpack(TS1)]),
            c("None"),
        );
        assert!(validate_alias(&same).is_ok());
    }
}
