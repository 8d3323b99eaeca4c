//! Error types for Smalltalk code generation.
//!
//! Every failure is fatal for the compilation unit being processed: the
//! compiler returns the first error it meets and no partial class files.
//!
//! ```text
//! CompilationError
//! ├── DuplicateDeclaration        - name declared twice in one scope
//! ├── UnresolvedAssignmentTarget  - assignment to something that is not a temporary
//! ├── UnsupportedArity            - send with more arguments than the runtime dispatches
//! ├── UnknownEscapeDirective      - bad raw-instruction directive
//! └── InternalCompilerError       - malformed tree or class-file limit exceeded
//! ```

use thiserror::Error;

use crate::Span;

// ============================================================================
// Compilation Errors
// ============================================================================

/// Errors raised while generating code for one compilation unit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompilationError {
    /// An identifier was declared twice in the same scope.
    #[error("at {span}: '{name}' is already declared in this scope")]
    DuplicateDeclaration {
        /// The redeclared identifier.
        name: String,
        /// Location of the second declaration.
        span: Span,
    },

    /// An assignment target does not resolve to a temporary.
    #[error("at {span}: cannot assign to '{name}', only temporaries are assignable")]
    UnresolvedAssignmentTarget {
        /// The assignment target.
        name: String,
        /// Location of the assignment.
        span: Span,
    },

    /// A message send has more arguments than the runtime can dispatch.
    #[error("at {span}: '{selector}' has {arity} arguments, at most {max} are supported")]
    UnsupportedArity {
        /// The selector being sent.
        selector: String,
        /// Number of arguments in the send.
        arity: usize,
        /// Largest supported arity.
        max: usize,
        /// Location of the send.
        span: Span,
    },

    /// A raw-instruction directive is unknown or has invalid operands.
    #[error("at {span}: invalid escape directive '{directive}': {reason}")]
    UnknownEscapeDirective {
        /// The directive's keyword selector.
        directive: String,
        /// What is wrong with it.
        reason: String,
        /// Location of the directive.
        span: Span,
    },

    /// The tree had a shape the generator does not handle, or the output
    /// exceeded a class-file limit.
    #[error("at {span}: internal compiler error: {message}")]
    InternalCompilerError {
        /// Description of the problem.
        message: String,
        /// Location of the offending construct.
        span: Span,
    },
}

impl CompilationError {
    /// Get the span where this error occurred.
    pub fn span(&self) -> Span {
        match self {
            CompilationError::DuplicateDeclaration { span, .. } => *span,
            CompilationError::UnresolvedAssignmentTarget { span, .. } => *span,
            CompilationError::UnsupportedArity { span, .. } => *span,
            CompilationError::UnknownEscapeDirective { span, .. } => *span,
            CompilationError::InternalCompilerError { span, .. } => *span,
        }
    }

    /// Shorthand for an [`CompilationError::InternalCompilerError`].
    pub fn internal(message: impl Into<String>, span: Span) -> Self {
        CompilationError::InternalCompilerError {
            message: message.into(),
            span,
        }
    }

    /// Shorthand for an [`CompilationError::UnknownEscapeDirective`].
    pub fn escape(directive: impl Into<String>, reason: impl Into<String>, span: Span) -> Self {
        CompilationError::UnknownEscapeDirective {
            directive: directive.into(),
            reason: reason.into(),
            span,
        }
    }
}
