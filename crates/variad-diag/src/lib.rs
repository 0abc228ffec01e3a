//! Structured diagnostics for variadic type-parameter matching.
//!
//! The engine never aborts on a failed match. Every failure becomes a
//! `Diagnostic` carrying a category, a stable code, a message and the
//! structural path to the offending position. The host decides how to
//! render and whether to keep checking.

use std::fmt;

// ---------------------------------------------------------------------------
// Diagnostic categories
// ---------------------------------------------------------------------------

/// Kind of failure. One category per error the matcher can return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Too few or too many actuals for a parameter list.
    ArityMismatch,
    /// Two type expressions could not be unified.
    TypeMismatch,
    /// A variable was bound twice to different types.
    Inconsistent,
    /// The split between several tuple variables is not determined.
    AmbiguousSplit,
    /// An alias received fewer arguments than it has scalar parameters.
    TooFewArguments,
    /// A union would have no members.
    EmptyUnion,
    /// An alias expands to itself.
    RecursiveAlias,
    /// A tuple variable annotates a keyword-variadic parameter.
    InvalidKwargsUsage,
    /// An alias declares two distinct tuple variables.
    MultipleDistinctTupleInAlias,
    /// A name was registered twice in the declaration table.
    DuplicateDeclaration,
}

impl Category {
    pub const ALL: [Category; 10] = [
        Category::ArityMismatch,
        Category::TypeMismatch,
        Category::Inconsistent,
        Category::AmbiguousSplit,
        Category::TooFewArguments,
        Category::EmptyUnion,
        Category::RecursiveAlias,
        Category::InvalidKwargsUsage,
        Category::MultipleDistinctTupleInAlias,
        Category::DuplicateDeclaration,
    ];

    pub fn all() -> &'static [Category] {
        &Self::ALL
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::ArityMismatch => "arity_mismatch",
            Category::TypeMismatch => "type_mismatch",
            Category::Inconsistent => "inconsistent",
            Category::AmbiguousSplit => "ambiguous_split",
            Category::TooFewArguments => "too_few_arguments",
            Category::EmptyUnion => "empty_union",
            Category::RecursiveAlias => "recursive_alias",
            Category::InvalidKwargsUsage => "invalid_kwargs_usage",
            Category::MultipleDistinctTupleInAlias => "multiple_distinct_tuple_in_alias",
            Category::DuplicateDeclaration => "duplicate_declaration",
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Category::ArityMismatch => "V0001",
            Category::TypeMismatch => "V0002",
            Category::Inconsistent => "V0003",
            Category::AmbiguousSplit => "V0004",
            Category::TooFewArguments => "V0005",
            Category::EmptyUnion => "V0006",
            Category::RecursiveAlias => "V0007",
            Category::InvalidKwargsUsage => "V0008",
            Category::MultipleDistinctTupleInAlias => "V0009",
            Category::DuplicateDeclaration => "V0010",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Category::ArityMismatch => "The number of arguments does not fit the parameter list.",
            Category::TypeMismatch => {
                "An argument type does not match the declared parameter type."
            }
            Category::Inconsistent => "A type variable was solved to two different types.",
            Category::AmbiguousSplit => {
                "Arguments cannot be split deterministically between tuple variables."
            }
            Category::TooFewArguments => "A generic alias was given too few type arguments.",
            Category::EmptyUnion => "A union type must have at least one member.",
            Category::RecursiveAlias => "A type alias refers to itself during expansion.",
            Category::InvalidKwargsUsage => {
                "A type variable tuple cannot annotate a keyword-variadic parameter."
            }
            Category::MultipleDistinctTupleInAlias => {
                "A type alias may use at most one distinct type variable tuple."
            }
            Category::DuplicateDeclaration => "A declaration name was registered more than once.",
        }
    }

    pub fn example_fix(self) -> &'static str {
        match self {
            Category::ArityMismatch => "Pass as many arguments as the fixed parameters require.",
            Category::TypeMismatch => "Adjust the argument so it matches the parameter type.",
            Category::Inconsistent => {
                "Make every occurrence of the variable receive the same type."
            }
            Category::AmbiguousSplit => {
                "Bind one of the tuple variables through another parameter (an anchor)."
            }
            Category::TooFewArguments => "Supply an argument for every scalar type parameter.",
            Category::EmptyUnion => "Bind the tuple to at least one type before forming a union.",
            Category::RecursiveAlias => "Break the cycle by naming the recursive part explicitly.",
            Category::InvalidKwargsUsage => {
                "Annotate `**kwargs` with an ordinary type instead of a tuple variable."
            }
            Category::MultipleDistinctTupleInAlias => {
                "Split the alias so each part uses a single tuple variable."
            }
            Category::DuplicateDeclaration => "Rename one of the declarations.",
        }
    }
}

// ---------------------------------------------------------------------------
// Structural paths
// ---------------------------------------------------------------------------

/// One step from a matched root down to the failing sub-expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Position in a top-level parameter list.
    Param(usize),
    /// Keyword parameter by name.
    Keyword(String),
    /// Anchor constraint by declaration order.
    Anchor(usize),
    /// Constructor of a generic application.
    Ctor,
    /// Argument of a generic application.
    Arg(usize),
    /// Parameter of a callable type.
    CallableParam(usize),
    /// Return type of a callable type.
    Return,
    /// Member of a union.
    Member(usize),
    /// Element of a wrapped tuple.
    Element(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Param(i) => write!(f, "param[{i}]"),
            PathSegment::Keyword(name) => write!(f, "keyword[{name}]"),
            PathSegment::Anchor(i) => write!(f, "anchor[{i}]"),
            PathSegment::Ctor => write!(f, "ctor"),
            PathSegment::Arg(i) => write!(f, "arg[{i}]"),
            PathSegment::CallableParam(i) => write!(f, "callable_param[{i}]"),
            PathSegment::Return => write!(f, "return"),
            PathSegment::Member(i) => write!(f, "member[{i}]"),
            PathSegment::Element(i) => write!(f, "element[{i}]"),
        }
    }
}

/// Render a path as `param[1].arg[0]`; the empty path renders as `<root>`.
pub fn render_path(path: &[PathSegment]) -> String {
    if path.is_empty() {
        return "<root>".to_string();
    }
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

// ---------------------------------------------------------------------------
// Diagnostic
// ---------------------------------------------------------------------------

/// A structured error report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Stable diagnostic code (e.g. V0002).
    pub code: Option<String>,
    pub category: Category,
    /// Primary message: what went wrong.
    pub message: String,
    /// Where it went wrong, from the matched root.
    pub path: Vec<PathSegment>,
    /// Suggested fix, if any.
    pub help: Option<String>,
}

impl Diagnostic {
    pub fn error(category: Category, message: impl Into<String>) -> Self {
        Self {
            code: Some(category.code().to_string()),
            category,
            message: message.into(),
            path: Vec::new(),
            help: None,
        }
    }

    pub fn with_path(mut self, path: Vec<PathSegment>) -> Self {
        self.path = path;
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(code) = &self.code {
            write!(f, "error[{code}]: {}", self.message)?;
        } else {
            write!(f, "error: {}", self.message)?;
        }
        if !self.path.is_empty() {
            write!(f, "\n  at: {}", render_path(&self.path))?;
        }
        if let Some(help) = &self.help {
            write!(f, "\n  help: {help}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Error type for batches of diagnostics
// ---------------------------------------------------------------------------

/// Error type wrapping one or more diagnostics.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{}", .0.first().map(|d| d.to_string()).unwrap_or_default())]
pub struct DiagnosticError(pub Vec<Diagnostic>);

impl DiagnosticError {
    pub fn multiple(diags: Vec<Diagnostic>) -> Self {
        Self(diags)
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.0
    }
}
