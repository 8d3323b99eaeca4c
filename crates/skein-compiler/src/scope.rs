//! Lexical scope management.
//!
//! A [`ScopeStack`] holds one [`Scope`] per method being compiled: the script
//! body at the bottom, then one per nested block. Temporaries and arguments
//! live in separate stores of the runtime context object, so each kind is
//! numbered densely from 0 on its own.
//!
//! Lookup only consults the innermost scope. A name that is not bound there is
//! a global, resolved by name at runtime, even if an enclosing block declares
//! it.

use rustc_hash::FxHashMap;
use skein_core::{CompilationError, Result, Span};

// ============================================================================
// Types
// ============================================================================

/// Which context store a name lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKind {
    /// `| t |` declaration
    Temporary,
    /// Block or method parameter
    Argument,
}

/// A declared name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    /// Store
    pub kind: SlotKind,
    /// Index within the store
    pub slot: u16,
    /// Where it was declared
    pub span: Span,
}

/// Result of resolving an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Temporary at the given index
    Temporary(u16),
    /// Argument at the given index
    Argument(u16),
    /// Not declared in the current scope
    Unresolved,
}

/// Strip the leading colon block parameters are written with.
pub fn parameter_name(name: &str) -> &str {
    name.strip_prefix(':').unwrap_or(name)
}

// ============================================================================
// Scope
// ============================================================================

/// Names declared by one script body or block.
#[derive(Debug, Default)]
pub struct Scope {
    bindings: FxHashMap<String, Binding>,
    temporaries: u16,
    arguments: u16,
}

impl Scope {
    /// Create an empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `name`, returning its slot in the store for `kind`.
    pub fn declare(&mut self, name: &str, kind: SlotKind, span: Span) -> Result<u16> {
        let name = parameter_name(name);
        if self.bindings.contains_key(name) {
            return Err(CompilationError::DuplicateDeclaration {
                name: name.to_string(),
                span,
            });
        }
        let counter = match kind {
            SlotKind::Temporary => &mut self.temporaries,
            SlotKind::Argument => &mut self.arguments,
        };
        let slot = *counter;
        *counter += 1;
        self.bindings.insert(name.to_string(), Binding { kind, slot, span });
        Ok(slot)
    }

    /// Resolve `name` within this scope.
    pub fn resolve(&self, name: &str) -> Resolution {
        match self.bindings.get(parameter_name(name)) {
            Some(Binding {
                kind: SlotKind::Temporary,
                slot,
                ..
            }) => Resolution::Temporary(*slot),
            Some(Binding {
                kind: SlotKind::Argument,
                slot,
                ..
            }) => Resolution::Argument(*slot),
            None => Resolution::Unresolved,
        }
    }

    /// Look up the full binding for `name`.
    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(parameter_name(name))
    }

    /// Number of temporaries declared.
    pub fn temporary_count(&self) -> u16 {
        self.temporaries
    }

    /// Number of arguments declared.
    pub fn argument_count(&self) -> u16 {
        self.arguments
    }
}

// ============================================================================
// ScopeStack
// ============================================================================

/// Active scopes, innermost last.
#[derive(Debug, Default)]
pub struct ScopeStack {
    scopes: Vec<Scope>,
}

impl ScopeStack {
    /// Create an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter a new innermost scope.
    pub fn push(&mut self) {
        self.scopes.push(Scope::new());
    }

    /// Leave the innermost scope.
    pub fn pop(&mut self) -> Option<Scope> {
        self.scopes.pop()
    }

    /// Number of active scopes.
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// The innermost scope.
    pub fn current(&self) -> Option<&Scope> {
        self.scopes.last()
    }

    /// Declare in the innermost scope.
    pub fn declare(&mut self, name: &str, kind: SlotKind, span: Span) -> Result<u16> {
        self.scopes
            .last_mut()
            .ok_or_else(|| CompilationError::internal("declaration outside any scope", span))?
            .declare(name, kind, span)
    }

    /// Resolve against the innermost scope only.
    pub fn resolve(&self, name: &str) -> Resolution {
        self.current()
            .map_or(Resolution::Unresolved, |scope| scope.resolve(name))
    }
}
