//! Variadic type-parameter matching.
//!
//! This crate implements:
//! - the binder: matching a formal parameter list with fixed prefix/suffix
//!   and type variable tuples against actual argument types
//! - a declaration-time validity pass (ambiguous splits, alias and
//!   `**kwargs` restrictions)
//! - alias expansion, the `Map` operator and tuple-to-union collapse
//!
//! Everything is a pure function of its inputs. The only shared state is a
//! frozen `DeclarationTable`, which is `Send + Sync` and may be read from
//! several threads at once.

pub mod bind;
pub mod expand;
pub mod table;
pub mod trace;
pub mod validate;

use std::fmt;

use variad_types::{TupleVarId, TypeExpr, VarRef};

pub use bind::{Anchor, Binder};
pub use expand::{AliasExpander, ExpandOptions, map_op, substitute, union_op};
pub use table::{DeclarationTable, DeclarationTableBuilder};
pub use validate::{validate_alias, validate_parameter_list, validate_signature};
pub use variad_diag::{Category, Diagnostic, DiagnosticError, PathSegment, render_path};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// How many actuals a list wanted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
    /// Several open slots share one tuple id, so the variadic remainder
    /// must divide evenly between them.
    MultipleOf(usize),
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exactly(n) => write!(f, "exactly {n}"),
            Arity::AtLeast(n) => write!(f, "at least {n}"),
            Arity::MultipleOf(n) => write!(f, "a multiple of {n}"),
        }
    }
}

/// A failed match, expansion or declaration check.
///
/// All variants are recoverable: the host reports them and usually
/// substitutes `TypeExpr::unknown()` at the failure site.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchError {
    #[error("expected {expected} argument(s), got {found}")]
    ArityMismatch {
        expected: Arity,
        found: usize,
        path: Vec<PathSegment>,
    },
    #[error("`{function}` requires keyword argument `{name}`")]
    MissingKeyword {
        function: String,
        name: String,
        path: Vec<PathSegment>,
    },
    #[error("`{function}` takes no keyword argument `{name}`")]
    UnexpectedKeyword {
        function: String,
        name: String,
        path: Vec<PathSegment>,
    },
    #[error("type mismatch: expected `{expected}`, got `{actual}`")]
    TypeMismatch {
        expected: TypeExpr,
        actual: TypeExpr,
        path: Vec<PathSegment>,
    },
    #[error("`{var}` is already bound to `{previous}`, cannot rebind it to `{found}`")]
    Inconsistent {
        var: VarRef,
        previous: TypeExpr,
        found: TypeExpr,
        path: Vec<PathSegment>,
    },
    #[error("ambiguous split between {}", render_tuple_ids(.tuples))]
    AmbiguousSplit {
        tuples: Vec<TupleVarId>,
        path: Vec<PathSegment>,
    },
    #[error("alias `{alias}` expects at least {expected} type argument(s), got {found}")]
    TooFewArguments {
        alias: String,
        expected: usize,
        found: usize,
    },
    #[error("union has no members")]
    EmptyUnion { path: Vec<PathSegment> },
    #[error("alias `{alias}` expands recursively: {}", .chain.join(" -> "))]
    RecursiveAlias { alias: String, chain: Vec<String> },
    #[error("`**kwargs` of `{function}` cannot be annotated with tuple variable `{annotation}`")]
    InvalidKwargsUsage {
        function: String,
        annotation: TypeExpr,
    },
    #[error("alias `{alias}` uses distinct tuple variables {}", render_tuple_ids(.tuples))]
    MultipleDistinctTupleInAlias {
        alias: String,
        tuples: Vec<TupleVarId>,
    },
    #[error("`{name}` is already declared")]
    DuplicateDeclaration { name: String },
}

impl MatchError {
    pub fn category(&self) -> Category {
        match self {
            MatchError::ArityMismatch { .. }
            | MatchError::MissingKeyword { .. }
            | MatchError::UnexpectedKeyword { .. } => Category::ArityMismatch,
            MatchError::TypeMismatch { .. } => Category::TypeMismatch,
            MatchError::Inconsistent { .. } => Category::Inconsistent,
            MatchError::AmbiguousSplit { .. } => Category::AmbiguousSplit,
            MatchError::TooFewArguments { .. } => Category::TooFewArguments,
            MatchError::EmptyUnion { .. } => Category::EmptyUnion,
            MatchError::RecursiveAlias { .. } => Category::RecursiveAlias,
            MatchError::InvalidKwargsUsage { .. } => Category::InvalidKwargsUsage,
            MatchError::MultipleDistinctTupleInAlias { .. } => {
                Category::MultipleDistinctTupleInAlias
            }
            MatchError::DuplicateDeclaration { .. } => Category::DuplicateDeclaration,
        }
    }

    /// Structural position of the failure; empty for whole-declaration errors.
    pub fn path(&self) -> &[PathSegment] {
        match self {
            MatchError::ArityMismatch { path, .. }
            | MatchError::MissingKeyword { path, .. }
            | MatchError::UnexpectedKeyword { path, .. }
            | MatchError::TypeMismatch { path, .. }
            | MatchError::Inconsistent { path, .. }
            | MatchError::AmbiguousSplit { path, .. }
            | MatchError::EmptyUnion { path } => path,
            MatchError::TooFewArguments { .. }
            | MatchError::RecursiveAlias { .. }
            | MatchError::InvalidKwargsUsage { .. }
            | MatchError::MultipleDistinctTupleInAlias { .. }
            | MatchError::DuplicateDeclaration { .. } => &[],
        }
    }

    /// Convert into the host-facing `{kind, message, path}` record.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let help = match self {
            MatchError::AmbiguousSplit { tuples, .. } => format!(
                "give {} a separate parameter so its length is known before the split",
                tuples
                    .first()
                    .map(|id| format!("`{id}`"))
                    .unwrap_or_else(|| "one tuple variable".to_string())
            ),
            MatchError::MissingKeyword { name, .. } => {
                format!("Pass `{name}` as a keyword argument.")
            }
            MatchError::UnexpectedKeyword { function, name, .. } => {
                format!("Remove `{name}` or declare `**kwargs` on `{function}`.")
            }
            other => other.category().example_fix().to_string(),
        };
        Diagnostic::error(self.category(), self.to_string())
            .with_path(self.path().to_vec())
            .with_help(help)
    }
}

fn render_tuple_ids(ids: &[TupleVarId]) -> String {
    ids.iter()
        .map(|id| format!("`{id}`"))
        .collect::<Vec<_>>()
        .join(" and ")
}


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
