//! Registered declarations: variable names, aliases and function signatures.
//!
//! Declarations are collected in a `DeclarationTableBuilder`, validated as
//! they are registered, then frozen. The frozen table is immutable and can be
//! shared across threads; matching borrows it read-only.

use std::collections::BTreeMap;

use variad_types::{Alias, Signature, TupleVarId, TypeExpr, VarId, VarNames};

use crate::expand::AliasExpander;
use crate::validate::{validate_alias, validate_signature};
use crate::{DiagnosticError, MatchError};

#[derive(Debug, Clone, Default)]
pub struct DeclarationTableBuilder {
    vars: Vec<String>,
    tuple_vars: Vec<String>,
    aliases: BTreeMap<String, Alias>,
    functions: BTreeMap<String, Signature>,
}

impl DeclarationTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a scalar type variable. Ids are dense, in declaration order.
    pub fn declare_var(&mut self, name: impl Into<String>) -> VarId {
        let id = VarId(self.vars.len() as u32);
        self.vars.push(name.into());
        id
    }

    pub fn declare_tuple_var(&mut self, name: impl Into<String>) -> TupleVarId {
        let id = TupleVarId(self.tuple_vars.len() as u32);
        self.tuple_vars.push(name.into());
        id
    }

    pub fn register_alias(&mut self, alias: Alias) -> Result<(), MatchError> {
        self.check_unique(&alias.name)?;
        validate_alias(&alias)?;
        self.aliases.insert(alias.name.clone(), alias);
        Ok(())
    }

    pub fn register_function(&mut self, signature: Signature) -> Result<(), MatchError> {
        self.check_unique(&signature.name)?;
        validate_signature(&signature)?;
        self.functions.insert(signature.name.clone(), signature);
        Ok(())
    }

    fn check_unique(&self, name: &str) -> Result<(), MatchError> {
        if self.aliases.contains_key(name) || self.functions.contains_key(name) {
            return Err(MatchError::DuplicateDeclaration {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    pub fn freeze(self) -> DeclarationTable {
        DeclarationTable {
            vars: self.vars,
            tuple_vars: self.tuple_vars,
            aliases: self.aliases,
            functions: self.functions,
        }
    }
}

/// Frozen, read-only declarations.
#[derive(Debug, Clone, Default)]
pub struct DeclarationTable {
    vars: Vec<String>,
    tuple_vars: Vec<String>,
    aliases: BTreeMap<String, Alias>,
    functions: BTreeMap<String, Signature>,
}

impl DeclarationTable {
    pub fn alias(&self, name: &str) -> Option<&Alias> {
        self.aliases.get(name)
    }

    pub fn function(&self, name: &str) -> Option<&Signature> {
        self.functions.get(name)
    }

    pub fn aliases(&self) -> impl Iterator<Item = &Alias> {
        self.aliases.values()
    }

    pub fn functions(&self) -> impl Iterator<Item = &Signature> {
        self.functions.values()
    }

    /// Render a type with declared variable names (`Ts` rather than `Ts0`).
    pub fn render(&self, ty: &TypeExpr) -> String {
        ty.display_with(self).to_string()
    }

    /// An expander that resolves references to the aliases in this table.
    pub fn expander(&self) -> AliasExpander<'_> {
        AliasExpander::with_table(self)
    }

    /// Expand every alias against its own formals, reporting each alias that
    /// cannot be expanded (recursion, empty unions).
    pub fn validate_aliases(&self) -> Result<(), DiagnosticError> {
        let mut expander = self.expander();
        let mut diagnostics = Vec::new();
        for alias in self.aliases.values() {
            let placeholders = alias.formal.to_exprs();
            if let Err(err) = expander.expand(alias, &placeholders) {
                diagnostics.push(err.to_diagnostic());
            }
        }
        if diagnostics.is_empty() {
            Ok(())
        } else {
            Err(DiagnosticError::multiple(diagnostics))
        }
    }
}

impl VarNames for DeclarationTable {
    fn scalar_name(&self, var: VarId) -> Option<&str> {
        self.vars.get(var.0 as usize).map(String::as_str)
    }

    fn tuple_name(&self, var: TupleVarId) -> Option<&str> {
        self.tuple_vars.get(var.0 as usize).map(String::as_str)
    }
}
