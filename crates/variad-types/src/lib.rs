//! Type expression model for variadic type-parameter matching.
//!
//! This crate defines the already-resolved type expressions the binder and
//! expanders operate on. There is no surface syntax here: an upstream
//! resolver produces these trees, and `variad-infer` consumes them.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Concrete name of the builtin wrapped-tuple constructor.
///
/// `TupleVariable(id)` is equivalent to `tuple[*id]`.
pub const TUPLE_CONSTRUCTOR: &str = "tuple";

/// Concrete name of the placeholder hosts substitute at a failure site.
pub const UNKNOWN_TYPE: &str = "Any";

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Identifier of a scalar type variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub u32);

/// Identifier of a type variable tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TupleVarId(pub u32);

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

impl fmt::Display for TupleVarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ts{}", self.0)
    }
}

/// Either kind of variable, used to name the subject of a binding conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VarRef {
    Scalar(VarId),
    Tuple(TupleVarId),
}

impl fmt::Display for VarRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VarRef::Scalar(var) => write!(f, "{var}"),
            VarRef::Tuple(var) => write!(f, "{var}"),
        }
    }
}

/// Source of human-readable variable names.
///
/// The declaration table implements this so diagnostics can show `Ts`
/// instead of `Ts0`. Unnamed ids fall back to their numeric form.
pub trait VarNames {
    fn scalar_name(&self, var: VarId) -> Option<&str>;
    fn tuple_name(&self, var: TupleVarId) -> Option<&str>;
}

// ---------------------------------------------------------------------------
// Type expressions
// ---------------------------------------------------------------------------

/// A resolved type expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeExpr {
    /// A nominal type, matched by exact name.
    Concrete(String),
    /// A scalar type variable.
    Variable(VarId),
    /// A type variable tuple in wrapped form (`tuple[*Ts]`).
    TupleVariable(TupleVarId),
    /// A type variable tuple spliced into the enclosing list.
    Unpack(TupleVarId),
    /// `*Map[ctor, Ts]`: the spliced sequence `ctor[t]` for each `t` in `Ts`.
    MapUnpack {
        ctor: Box<TypeExpr>,
        tuple: TupleVarId,
    },
    GenericApp {
        ctor: Box<TypeExpr>,
        args: Vec<TypeExpr>,
    },
    Union(Vec<TypeExpr>),
    Callable {
        params: Vec<TypeExpr>,
        ret: Box<TypeExpr>,
    },
}

impl TypeExpr {
    pub fn concrete(name: impl Into<String>) -> Self {
        TypeExpr::Concrete(name.into())
    }

    pub fn app(ctor: TypeExpr, args: Vec<TypeExpr>) -> Self {
        TypeExpr::GenericApp {
            ctor: Box::new(ctor),
            args,
        }
    }

    /// Apply a named constructor, e.g. `named_app("list", [int])`.
    pub fn named_app(ctor: impl Into<String>, args: Vec<TypeExpr>) -> Self {
        TypeExpr::app(TypeExpr::concrete(ctor), args)
    }

    /// Wrapped tuple of the given elements.
    pub fn tuple(elements: Vec<TypeExpr>) -> Self {
        TypeExpr::named_app(TUPLE_CONSTRUCTOR, elements)
    }

    pub fn callable(params: Vec<TypeExpr>, ret: TypeExpr) -> Self {
        TypeExpr::Callable {
            params,
            ret: Box::new(ret),
        }
    }

    pub fn map_unpack(ctor: TypeExpr, tuple: TupleVarId) -> Self {
        TypeExpr::MapUnpack {
            ctor: Box::new(ctor),
            tuple,
        }
    }

    /// The placeholder a host substitutes after a failed match.
    pub fn unknown() -> Self {
        TypeExpr::concrete(UNKNOWN_TYPE)
    }

    /// Elements of a wrapped tuple, if this expression is one.
    ///
    /// A wrapped tuple variable yields its single unpacked occurrence.
    pub fn tuple_elements(&self) -> Option<Vec<TypeExpr>> {
        match self {
            TypeExpr::GenericApp { ctor, args }
                if matches!(ctor.as_ref(), TypeExpr::Concrete(name) if name == TUPLE_CONSTRUCTOR) =>
            {
                Some(args.clone())
            }
            TypeExpr::TupleVariable(id) => Some(vec![TypeExpr::Unpack(*id)]),
            _ => None,
        }
    }

    /// Visit this expression and every sub-expression, pre-order.
    pub fn walk(&self, visit: &mut impl FnMut(&TypeExpr)) {
        visit(self);
        match self {
            TypeExpr::Concrete(_)
            | TypeExpr::Variable(_)
            | TypeExpr::TupleVariable(_)
            | TypeExpr::Unpack(_) => {}
            TypeExpr::MapUnpack { ctor, .. } => ctor.walk(visit),
            TypeExpr::GenericApp { ctor, args } => {
                ctor.walk(visit);
                for arg in args {
                    arg.walk(visit);
                }
            }
            TypeExpr::Union(members) => {
                for member in members {
                    member.walk(visit);
                }
            }
            TypeExpr::Callable { params, ret } => {
                for param in params {
                    param.walk(visit);
                }
                ret.walk(visit);
            }
        }
    }

    /// Every tuple variable mentioned anywhere, in any form.
    pub fn tuple_vars(&self) -> BTreeSet<TupleVarId> {
        let mut out = BTreeSet::new();
        self.walk(&mut |ty| match ty {
            TypeExpr::TupleVariable(id) | TypeExpr::Unpack(id) => {
                out.insert(*id);
            }
            TypeExpr::MapUnpack { tuple, .. } => {
                out.insert(*tuple);
            }
            _ => {}
        });
        out
    }

    /// Every scalar variable mentioned anywhere.
    pub fn scalar_vars(&self) -> BTreeSet<VarId> {
        let mut out = BTreeSet::new();
        self.walk(&mut |ty| {
            if let TypeExpr::Variable(var) = ty {
                out.insert(*var);
            }
        });
        out
    }

    /// Render with declared variable names where available.
    pub fn display_with<'a>(&'a self, names: &'a dyn VarNames) -> Rendered<'a> {
        Rendered {
            ty: self,
            names: Some(names),
        }
    }
}

/// A type expression paired with a name source for display.
pub struct Rendered<'a> {
    ty: &'a TypeExpr,
    names: Option<&'a dyn VarNames>,
}

impl fmt::Display for Rendered<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_expr(self.ty, self.names, f)
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_expr(self, None, f)
    }
}

fn fmt_scalar(var: VarId, names: Option<&dyn VarNames>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match names.and_then(|n| n.scalar_name(var)) {
        Some(name) => write!(f, "{name}"),
        None => write!(f, "{var}"),
    }
}

fn fmt_tuple_var(
    var: TupleVarId,
    names: Option<&dyn VarNames>,
    f: &mut fmt::Formatter<'_>,
) -> fmt::Result {
    match names.and_then(|n| n.tuple_name(var)) {
        Some(name) => write!(f, "{name}"),
        None => write!(f, "{var}"),
    }
}

fn fmt_list(
    items: &[TypeExpr],
    names: Option<&dyn VarNames>,
    f: &mut fmt::Formatter<'_>,
) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        fmt_expr(item, names, f)?;
    }
    Ok(())
}

fn fmt_expr(
    ty: &TypeExpr,
    names: Option<&dyn VarNames>,
    f: &mut fmt::Formatter<'_>,
) -> fmt::Result {
    match ty {
        TypeExpr::Concrete(name) => write!(f, "{name}"),
        TypeExpr::Variable(var) => fmt_scalar(*var, names, f),
        TypeExpr::TupleVariable(var) => fmt_tuple_var(*var, names, f),
        TypeExpr::Unpack(var) => {
            write!(f, "*")?;
            fmt_tuple_var(*var, names, f)
        }
        TypeExpr::MapUnpack { ctor, tuple } => {
            write!(f, "*Map[")?;
            fmt_expr(ctor, names, f)?;
            write!(f, ", ")?;
            fmt_tuple_var(*tuple, names, f)?;
            write!(f, "]")
        }
        TypeExpr::GenericApp { ctor, args } => {
            fmt_expr(ctor, names, f)?;
            if args.is_empty() {
                return write!(f, "[()]");
            }
            write!(f, "[")?;
            fmt_list(args, names, f)?;
            write!(f, "]")
        }
        TypeExpr::Union(members) => {
            if members.is_empty() {
                return write!(f, "Union[]");
            }
            for (i, member) in members.iter().enumerate() {
                if i > 0 {
                    write!(f, " | ")?;
                }
                // Callables bind looser than `|`.
                if matches!(member, TypeExpr::Callable { .. }) {
                    write!(f, "(")?;
                    fmt_expr(member, names, f)?;
                    write!(f, ")")?;
                } else {
                    fmt_expr(member, names, f)?;
                }
            }
            Ok(())
        }
        TypeExpr::Callable { params, ret } => {
            write!(f, "(")?;
            fmt_list(params, names, f)?;
            write!(f, ") -> ")?;
            fmt_expr(ret, names, f)
        }
    }
}

// ---------------------------------------------------------------------------
// Parameter lists
// ---------------------------------------------------------------------------

/// One position of a formal parameter list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParameterSlot {
    /// Matches exactly one actual.
    Fixed(TypeExpr),
    /// Matches a contiguous, possibly empty run of actuals.
    VariadicUnpack(TupleVarId),
    /// Matches `ctor[t]` for each `t` of the tuple, once the tuple is known.
    Mapped { ctor: TypeExpr, tuple: TupleVarId },
}

impl ParameterSlot {
    /// Classify a list element: spliced forms become variadic slots.
    pub fn from_expr(ty: &TypeExpr) -> Self {
        match ty {
            TypeExpr::Unpack(id) => ParameterSlot::VariadicUnpack(*id),
            TypeExpr::MapUnpack { ctor, tuple } => ParameterSlot::Mapped {
                ctor: ctor.as_ref().clone(),
                tuple: *tuple,
            },
            other => ParameterSlot::Fixed(other.clone()),
        }
    }

    /// The tuple variable a variadic slot splices, if any.
    pub fn tuple_id(&self) -> Option<TupleVarId> {
        match self {
            ParameterSlot::Fixed(_) => None,
            ParameterSlot::VariadicUnpack(id) => Some(*id),
            ParameterSlot::Mapped { tuple, .. } => Some(*tuple),
        }
    }

    pub fn is_variadic(&self) -> bool {
        self.tuple_id().is_some()
    }

    pub fn to_expr(&self) -> TypeExpr {
        match self {
            ParameterSlot::Fixed(ty) => ty.clone(),
            ParameterSlot::VariadicUnpack(id) => TypeExpr::Unpack(*id),
            ParameterSlot::Mapped { ctor, tuple } => TypeExpr::map_unpack(ctor.clone(), *tuple),
        }
    }
}

impl fmt::Display for ParameterSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_expr())
    }
}

/// An ordered formal parameter list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ParameterList(pub Vec<ParameterSlot>);

impl ParameterList {
    pub fn new(slots: Vec<ParameterSlot>) -> Self {
        Self(slots)
    }

    pub fn from_exprs(items: &[TypeExpr]) -> Self {
        Self(items.iter().map(ParameterSlot::from_expr).collect())
    }

    pub fn slots(&self) -> &[ParameterSlot] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Distinct tuple ids mentioned anywhere in the list, wrapped or
    /// spliced, in first-occurrence order.
    pub fn tuple_ids(&self) -> Vec<TupleVarId> {
        let mut out = Vec::new();
        for slot in &self.0 {
            slot.to_expr().walk(&mut |ty| {
                let id = match ty {
                    TypeExpr::TupleVariable(id) | TypeExpr::Unpack(id) => *id,
                    TypeExpr::MapUnpack { tuple, .. } => *tuple,
                    _ => return,
                };
                if !out.contains(&id) {
                    out.push(id);
                }
            });
        }
        out
    }

    /// Distinct scalar variables occupying fixed slots, in order.
    pub fn scalar_vars(&self) -> Vec<VarId> {
        let mut out = Vec::new();
        for slot in &self.0 {
            if let ParameterSlot::Fixed(TypeExpr::Variable(var)) = slot
                && !out.contains(var)
            {
                out.push(*var);
            }
        }
        out
    }

    pub fn to_exprs(&self) -> Vec<TypeExpr> {
        self.0.iter().map(ParameterSlot::to_expr).collect()
    }
}

impl fmt::Display for ParameterList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, slot) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{slot}")?;
        }
        write!(f, ")")
    }
}

// ---------------------------------------------------------------------------
// Bindings
// ---------------------------------------------------------------------------

/// Variable assignments produced by one match attempt.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Binding {
    scalars: BTreeMap<VarId, TypeExpr>,
    tuples: BTreeMap<TupleVarId, Vec<TypeExpr>>,
}

impl Binding {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scalar(&self, var: VarId) -> Option<&TypeExpr> {
        self.scalars.get(&var)
    }

    pub fn tuple(&self, var: TupleVarId) -> Option<&[TypeExpr]> {
        self.tuples.get(&var).map(Vec::as_slice)
    }

    pub fn bind_scalar(&mut self, var: VarId, ty: TypeExpr) {
        self.scalars.insert(var, ty);
    }

    pub fn bind_tuple(&mut self, var: TupleVarId, contents: Vec<TypeExpr>) {
        self.tuples.insert(var, contents);
    }

    pub fn scalars(&self) -> &BTreeMap<VarId, TypeExpr> {
        &self.scalars
    }

    pub fn tuples(&self) -> &BTreeMap<TupleVarId, Vec<TypeExpr>> {
        &self.tuples
    }

    pub fn is_empty(&self) -> bool {
        self.scalars.is_empty() && self.tuples.is_empty()
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        let mut first = true;
        for (var, ty) in &self.scalars {
            if !first {
                write!(f, ", ")?;
            }
            first = false;
            write!(f, "{var} = {ty}")?;
        }
        for (var, contents) in &self.tuples {
            if !first {
                write!(f, ", ")?;
            }
            first = false;
            write!(f, "{var} = (")?;
            for (i, ty) in contents.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{ty}")?;
            }
            if contents.len() == 1 {
                write!(f, ",")?;
            }
            write!(f, ")")?;
        }
        write!(f, "}}")
    }
}

// ---------------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------------

/// A named generic template, e.g. `Alias[T, *Ts] = tuple[T, list[*Ts]]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alias {
    pub name: String,
    pub formal: ParameterList,
    pub body: TypeExpr,
}

impl Alias {
    pub fn new(name: impl Into<String>, formal: ParameterList, body: TypeExpr) -> Self {
        Self {
            name: name.into(),
            formal,
            body,
        }
    }
}

/// A function declaration as the binder sees it.
///
/// `positional` already includes the spliced `*args` segment. Keyword
/// parameters are siblings of the positional list and are solved first, so
/// a keyword typed with a wrapped tuple variable anchors that variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    pub positional: ParameterList,
    pub keyword: Vec<(String, TypeExpr)>,
    /// Annotation of the keyword-variadic (`**kwargs`) parameter.
    pub kwargs: Option<TypeExpr>,
    pub ret: TypeExpr,
}

impl Signature {
    pub fn new(name: impl Into<String>, positional: ParameterList, ret: TypeExpr) -> Self {
        Self {
            name: name.into(),
            positional,
            keyword: Vec::new(),
            kwargs: None,
            ret,
        }
    }

    pub fn with_keyword(mut self, name: impl Into<String>, ty: TypeExpr) -> Self {
        self.keyword.push((name.into(), ty));
        self
    }

    pub fn with_kwargs(mut self, ty: TypeExpr) -> Self {
        self.kwargs = Some(ty);
        self
    }

    /// Keyword parameter types in declaration order.
    pub fn siblings(&self) -> Vec<TypeExpr> {
        self.keyword.iter().map(|(_, ty)| ty.clone()).collect()
    }
}

/// Actual argument types at one call site.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CallSite {
    pub positional: Vec<TypeExpr>,
    pub keyword: Vec<(String, TypeExpr)>,
}

impl CallSite {
    pub fn new(positional: Vec<TypeExpr>) -> Self {
        Self {
            positional,
            keyword: Vec::new(),
        }
    }

    pub fn with_keyword(mut self, name: impl Into<String>, ty: TypeExpr) -> Self {
        self.keyword.push((name.into(), ty));
        self
    }

    pub fn keyword_arg(&self, name: &str) -> Option<&TypeExpr> {
        self.keyword
            .iter()
            .find(|(arg, _)| arg == name)
            .map(|(_, ty)| ty)
    }
}
