//! Alias expansion, the `Map` operator and tuple-to-union collapse.

use variad_types::{Alias, Binding, TypeExpr};

use crate::bind::Binder;
use crate::table::DeclarationTable;
use crate::trace::{MatchAction, MatchStep, Tracer};
use crate::validate::check_single_tuple;
use crate::{MatchError, PathSegment};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpandOptions {
    /// Nested alias expansions allowed before giving up as recursive.
    pub max_depth: usize,
}

impl Default for ExpandOptions {
    fn default() -> Self {
        Self { max_depth: 64 }
    }
}

// ---------------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------------

/// Apply a one-argument constructor to each element: `[ctor[t] for t in seq]`.
pub fn map_op(ctor: &TypeExpr, seq: &[TypeExpr]) -> Vec<TypeExpr> {
    seq.iter()
        .map(|ty| TypeExpr::app(ctor.clone(), vec![ty.clone()]))
        .collect()
}

/// Collapse a bound sequence into a union. Duplicates keep their positions.
pub fn union_op(seq: &[TypeExpr]) -> Result<TypeExpr, MatchError> {
    if seq.is_empty() {
        return Err(MatchError::EmptyUnion { path: Vec::new() });
    }
    Ok(TypeExpr::Union(seq.to_vec()))
}

// ---------------------------------------------------------------------------
// Substitution
// ---------------------------------------------------------------------------

/// Replace bound variables in `template`, producing a new tree.
///
/// Inside a list, bound `*Ts` and `*Map[F, Ts]` splice their elements. Outside
/// a list, the same forms produce a wrapped `tuple[...]`. Unbound variables
/// are left in place.
pub fn substitute(template: &TypeExpr, binding: &Binding) -> Result<TypeExpr, MatchError> {
    substitute_at(template, binding, &mut Vec::new())
}

fn substitute_at(
    ty: &TypeExpr,
    binding: &Binding,
    path: &mut Vec<PathSegment>,
) -> Result<TypeExpr, MatchError> {
    Ok(match ty {
        TypeExpr::Concrete(_) => ty.clone(),
        TypeExpr::Variable(var) => binding.scalar(*var).cloned().unwrap_or_else(|| ty.clone()),
        TypeExpr::TupleVariable(id) | TypeExpr::Unpack(id) => match binding.tuple(*id) {
            Some(seq) => TypeExpr::tuple(seq.to_vec()),
            None => ty.clone(),
        },
        TypeExpr::MapUnpack { ctor, tuple } => {
            path.push(PathSegment::Ctor);
            let ctor = substitute_at(ctor, binding, path)?;
            path.pop();
            match binding.tuple(*tuple) {
                Some(seq) => TypeExpr::tuple(map_op(&ctor, seq)),
                None => TypeExpr::map_unpack(ctor, *tuple),
            }
        }
        TypeExpr::GenericApp { ctor, args } => {
            path.push(PathSegment::Ctor);
            let ctor = substitute_at(ctor, binding, path)?;
            path.pop();
            let args = substitute_list(args, binding, path, PathSegment::Arg)?;
            TypeExpr::app(ctor, args)
        }
        TypeExpr::Callable { params, ret } => {
            let params = substitute_list(params, binding, path, PathSegment::CallableParam)?;
            path.push(PathSegment::Return);
            let ret = substitute_at(ret, binding, path)?;
            path.pop();
            TypeExpr::callable(params, ret)
        }
        TypeExpr::Union(members) => {
            let members = substitute_list(members, binding, path, PathSegment::Member)?;
            union_op(&members).map_err(|_| MatchError::EmptyUnion { path: path.clone() })?
        }
    })
}

fn substitute_list(
    items: &[TypeExpr],
    binding: &Binding,
    path: &mut Vec<PathSegment>,
    segment: fn(usize) -> PathSegment,
) -> Result<Vec<TypeExpr>, MatchError> {
    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        path.push(segment(i));
        match item {
            TypeExpr::Unpack(id) if binding.tuple(*id).is_some() => {
                out.extend(binding.tuple(*id).unwrap_or_default().iter().cloned());
            }
            TypeExpr::MapUnpack { ctor, tuple } if binding.tuple(*tuple).is_some() => {
                path.push(PathSegment::Ctor);
                let ctor = substitute_at(ctor, binding, path)?;
                path.pop();
                out.extend(map_op(&ctor, binding.tuple(*tuple).unwrap_or_default()));
            }
            other => out.push(substitute_at(other, binding, path)?),
        }
        path.pop();
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Alias expansion
// ---------------------------------------------------------------------------

/// Instantiates aliases and expands the alias references they contain.
///
/// Without a table only the alias being expanded is known by name, which is
/// enough to catch direct self-reference.
#[derive(Debug, Clone, Default)]
pub struct AliasExpander<'a> {
    table: Option<&'a DeclarationTable>,
    options: ExpandOptions,
    tracer: Tracer,
}

impl<'a> AliasExpander<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(table: &'a DeclarationTable) -> Self {
        Self {
            table: Some(table),
            ..Self::default()
        }
    }

    pub fn with_options(mut self, options: ExpandOptions) -> Self {
        self.options = options;
        self
    }

    pub fn enable_tracing(&mut self) {
        self.tracer.enable();
    }

    pub fn trace(&self) -> &[MatchStep] {
        self.tracer.steps()
    }

    /// Instantiate `alias` with `supplied` and expand the result fully.
    pub fn expand(&mut self, alias: &Alias, supplied: &[TypeExpr]) -> Result<TypeExpr, MatchError> {
        self.tracer.clear();
        self.instantiate(alias, supplied, Some(alias), &mut Vec::new())
    }

    /// Expand every alias reference inside `ty`.
    pub fn expand_references(&mut self, ty: &TypeExpr) -> Result<TypeExpr, MatchError> {
        self.tracer.clear();
        self.resolve(ty, None, &mut Vec::new())
    }

    fn instantiate(
        &mut self,
        alias: &Alias,
        supplied: &[TypeExpr],
        root: Option<&Alias>,
        stack: &mut Vec<String>,
    ) -> Result<TypeExpr, MatchError> {
        if let Some(at) = stack.iter().position(|name| *name == alias.name) {
            let mut chain = stack[at..].to_vec();
            chain.push(alias.name.clone());
            return Err(self.recursive(alias, chain));
        }
        if stack.len() >= self.options.max_depth {
            let mut chain = stack.clone();
            chain.push(alias.name.clone());
            return Err(self.recursive(alias, chain));
        }

        let binding = bind_arguments(alias, supplied)?;
        if self.tracer.is_enabled() {
            let formal = format!("{}{}", alias.name, alias.formal);
            let actual = TypeExpr::tuple(supplied.to_vec());
            self.tracer
                .push(MatchAction::ExpandAlias, formal, actual, || binding.to_string());
        }
        let body = substitute(&alias.body, &binding)?;

        stack.push(alias.name.clone());
        let expanded = self.resolve(&body, root, stack)?;
        stack.pop();
        Ok(expanded)
    }

    fn recursive(&mut self, alias: &Alias, chain: Vec<String>) -> MatchError {
        self.tracer.push(MatchAction::Error, &alias.name, chain.join(" -> "), || {
            "alias reaches itself".into()
        });
        MatchError::RecursiveAlias {
            alias: alias.name.clone(),
            chain,
        }
    }

    fn lookup<'r>(&self, name: &str, root: Option<&'r Alias>) -> Option<&'r Alias>
    where
        'a: 'r,
    {
        match root {
            Some(alias) if alias.name == name => Some(alias),
            _ => self.table.and_then(|table| table.alias(name)),
        }
    }

    fn resolve(
        &mut self,
        ty: &TypeExpr,
        root: Option<&Alias>,
        stack: &mut Vec<String>,
    ) -> Result<TypeExpr, MatchError> {
        Ok(match ty {
            TypeExpr::Concrete(name) => match self.lookup(name, root) {
                Some(alias) => self.instantiate(alias, &[], root, stack)?,
                None => ty.clone(),
            },
            TypeExpr::GenericApp { ctor, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.resolve(arg, root, stack))
                    .collect::<Result<Vec<_>, _>>()?;
                let target = match ctor.as_ref() {
                    TypeExpr::Concrete(name) => self.lookup(name, root),
                    _ => None,
                };
                match target {
                    Some(alias) => self.instantiate(alias, &args, root, stack)?,
                    None => TypeExpr::app(self.resolve(ctor, root, stack)?, args),
                }
            }
            TypeExpr::Callable { params, ret } => {
                let params = params
                    .iter()
                    .map(|param| self.resolve(param, root, stack))
                    .collect::<Result<Vec<_>, _>>()?;
                TypeExpr::callable(params, self.resolve(ret, root, stack)?)
            }
            TypeExpr::Union(members) => TypeExpr::Union(
                members
                    .iter()
                    .map(|member| self.resolve(member, root, stack))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            // A bare constructor is only expanded once `Map` applies it.
            TypeExpr::MapUnpack { ctor, tuple } => match ctor.as_ref() {
                TypeExpr::Concrete(_) => ty.clone(),
                _ => TypeExpr::map_unpack(self.resolve(ctor, root, stack)?, *tuple),
            },
            TypeExpr::Variable(_) | TypeExpr::TupleVariable(_) | TypeExpr::Unpack(_) => ty.clone(),
        })
    }
}

/// Scalars take arguments positionally; the rest collect into the alias's
/// single tuple variable.
fn bind_arguments(alias: &Alias, supplied: &[TypeExpr]) -> Result<Binding, MatchError> {
    let scalars = alias.formal.scalar_vars();
    if supplied.len() < scalars.len() {
        return Err(MatchError::TooFewArguments {
            alias: alias.name.clone(),
            expected: scalars.len(),
            found: supplied.len(),
        });
    }
    check_single_tuple(alias)?;
    Binder::new().match_params(&alias.formal, supplied)
}

#[cfg(test)]
mod tests {
    use variad_diag::render_path;
    use variad_types::{ParameterList, TupleVarId, VarId};

    use super::*;
    use crate::Arity;

    fn c(name: &str) -> TypeExpr {
        TypeExpr::concrete(name)
    }

    const T: VarId = VarId(0);
    const TS: TupleVarId = TupleVarId(0);

    #[test]
    fn map_op_preserves_order_and_arity() {
        assert!(map_op(&c("list"), &[]).is_empty());
        let mapped = map_op(&c("list"), &[c("int"), c("str")]);
        assert_eq!(
            mapped,
            vec![
                TypeExpr::named_app("list", vec![c("int")]),
                TypeExpr::named_app("list", vec![c("str")]),
            ]
        );
    }

    #[test]
    fn nested_maps_compose() {
        let inner = map_op(&c("set"), &[c("int"), c("str")]);
        let outer = map_op(&c("list"), &inner);
        assert_eq!(outer[1].to_string(), "list[set[str]]");
    }

    #[test]
    fn union_op_keeps_duplicates() {
        let union = union_op(&[c("int"), c("str"), c("int")]).unwrap();
        assert_eq!(union.to_string(), "int | str | int");
        assert_eq!(
            union_op(&[]).unwrap_err(),
            MatchError::EmptyUnion { path: vec![] }
        );
    }

    #[test]
    fn substitute_splices_inside_lists() {
        let mut binding = Binding::new();
        binding.bind_scalar(T, c("int"));
        binding.bind_tuple(TS, vec![c("str"), c("bool")]);

        let body = TypeExpr::callable(
            vec![TypeExpr::Variable(T), TypeExpr::Unpack(TS)],
            TypeExpr::TupleVariable(TS),
        );
        let out = substitute(&body, &binding).unwrap();
        assert_eq!(out.to_string(), "(int, str, bool) -> tuple[str, bool]");

        let mapped = TypeExpr::tuple(vec![TypeExpr::map_unpack(c("list"), TS)]);
        assert_eq!(
            substitute(&mapped, &binding).unwrap().to_string(),
            "tuple[list[str], list[bool]]"
        );
    }

    #[test]
    fn substitute_wraps_outside_lists() {
        let mut binding = Binding::new();
        binding.bind_tuple(TS, vec![c("str")]);
        assert_eq!(
            substitute(&TypeExpr::Unpack(TS), &binding).unwrap(),
            TypeExpr::tuple(vec![c("str")])
        );
    }

    #[test]
    fn substitute_leaves_unbound_variables() {
        let body = TypeExpr::named_app("list", vec![TypeExpr::Variable(T), TypeExpr::Unpack(TS)]);
        assert_eq!(substitute(&body, &Binding::new()).unwrap(), body);
    }

    #[test]
    fn substitute_reports_empty_union_path() {
        let mut binding = Binding::new();
        binding.bind_tuple(TS, vec![]);
        let body = TypeExpr::named_app("list", vec![TypeExpr::Union(vec![TypeExpr::Unpack(TS)])]);
        let err = substitute(&body, &binding).unwrap_err();
        assert_eq!(err.category(), crate::Category::EmptyUnion);
        assert_eq!(render_path(err.path()), "arg[0]");
    }

    #[test]
    fn expand_binds_scalars_then_tuple() {
        // Pair[T, *Ts] = tuple[T, list[*Ts]]
        let alias = Alias::new(
            "Pair",
            ParameterList::from_exprs(&[TypeExpr::Variable(T), TypeExpr::Unpack(TS)]),
            TypeExpr::tuple(vec![
                TypeExpr::Variable(T),
                TypeExpr::named_app("list", vec![TypeExpr::Unpack(TS)]),
            ]),
        );
        let mut expander = AliasExpander::new();
        let out = expander
            .expand(&alias, &[c("int"), c("str"), c("bytes")])
            .unwrap();
        assert_eq!(out.to_string(), "tuple[int, list[str, bytes]]");

        let empty = expander.expand(&alias, &[c("int")]).unwrap();
        assert_eq!(empty.to_string(), "tuple[int, list[()]]");
    }

    #[test]
    fn expand_rejects_too_few_arguments() {
        let alias = Alias::new(
            "Two",
            ParameterList::from_exprs(&[TypeExpr::Variable(T), TypeExpr::Variable(VarId(1))]),
            TypeExpr::Variable(T),
        );
        let err = AliasExpander::new()
            .expand(&alias, &[c("int")])
            .unwrap_err();
        assert_eq!(
            err,
            MatchError::TooFewArguments {
                alias: "Two".into(),
                expected: 2,
                found: 1,
            }
        );
    }

    #[test]
    fn expand_rejects_surplus_without_tuple() {
        let alias = Alias::new(
            "One",
            ParameterList::from_exprs(&[TypeExpr::Variable(T)]),
            TypeExpr::Variable(T),
        );
        let err = AliasExpander::new()
            .expand(&alias, &[c("int"), c("str")])
            .unwrap_err();
        assert!(matches!(
            err,
            MatchError::ArityMismatch {
                expected: Arity::Exactly(1),
                found: 2,
                ..
            }
        ));
    }

    #[test]
    fn expand_empty_union_alias() {
        // U[*Ts] = Union[*Ts]
        let alias = Alias::new(
            "U",
            ParameterList::from_exprs(&[TypeExpr::Unpack(TS)]),
            TypeExpr::Union(vec![TypeExpr::Unpack(TS)]),
        );
        let mut expander = AliasExpander::new();
        assert_eq!(
            expander
                .expand(&alias, &[c("int"), c("str")])
                .unwrap()
                .to_string(),
            "int | str"
        );
        let err = expander.expand(&alias, &[]).unwrap_err();
        assert_eq!(err, MatchError::EmptyUnion { path: vec![] });
    }

    #[test]
    fn expand_rejects_wrapped_and_spliced_tuples() {
        let ts2 = TupleVarId(1);
        let alias = Alias::new(
            "Mixed",
            ParameterList::from_exprs(&[TypeExpr::TupleVariable(TS), TypeExpr::Unpack(ts2)]),
            c("None"),
        );
        let err = AliasExpander::new()
            .expand(&alias, &[TypeExpr::tuple(vec![c("int")]), c("str")])
            .unwrap_err();
        assert_eq!(
            err,
            MatchError::MultipleDistinctTupleInAlias {
                alias: "Mixed".into(),
                tuples: vec![TS, ts2],
            }
        );
    }

    #[test]
    fn direct_self_reference_is_recursive() {
        let alias = Alias::new(
            "Loop",
            ParameterList::from_exprs(&[TypeExpr::Variable(T)]),
            TypeExpr::named_app(
                "list",
                vec![TypeExpr::named_app("Loop", vec![TypeExpr::Variable(T)])],
            ),
        );
        let err = AliasExpander::new()
            .expand(&alias, &[c("int")])
            .unwrap_err();
        assert_eq!(
            err,
            MatchError::RecursiveAlias {
                alias: "Loop".into(),
                chain: vec!["Loop".into(), "Loop".into()],
            }
        );
    }

    #[test]
    fn depth_limit_is_configurable() {
        let alias = Alias::new("Leaf", ParameterList::default(), c("int"));
        let mut expander = AliasExpander::new().with_options(ExpandOptions { max_depth: 0 });
        let err = expander.expand(&alias, &[]).unwrap_err();
        assert_eq!(err.category(), crate::Category::RecursiveAlias);
        assert_eq!(ExpandOptions::default().max_depth, 64);
    }

    #[test]
    fn expansion_trace_names_alias_and_binding() {
        let alias = Alias::new(
            "Wrap",
            ParameterList::from_exprs(&[TypeExpr::Unpack(TS)]),
            TypeExpr::TupleVariable(TS),
        );
        let mut expander = AliasExpander::new();
        expander.enable_tracing();
        expander.expand(&alias, &[c("int")]).unwrap();
        let steps = expander.trace();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].action, MatchAction::ExpandAlias);
        assert_eq!(steps[0].formal, "Wrap(*Ts0)");
        assert_eq!(steps[0].detail, "{Ts0 = (int,)}");
    }
}
