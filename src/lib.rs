//! Skein: a Smalltalk to JVM bytecode compiler backend.
//!
//! A parser adapter builds the syntax tree of a script in an arena with
//! [`AstBuilder`]; a [`Context`] compiles it into class files and defines
//! them in its [`ClassRegistry`], where a class loader can pick them up.
//!
//! # Example
//!
//! ```
//! use skein::{AstBuilder, Bump, Context, SourceUnit};
//!
//! let arena = Bump::new();
//! let b = AstBuilder::new(&arena);
//!
//! // | x | x := 1 + 2. ^x
//! let script = b.script(
//!     &["x"],
//!     &[
//!         b.stmt(b.assign("x", b.binary(b.number("1"), "+", b.number("2")))),
//!         b.answer(b.reference("x")),
//!     ],
//! );
//!
//! let context = Context::new();
//! let unit = context.compile(&script, &SourceUnit::new("st.app", "Sum")).unwrap();
//! assert_eq!(unit.primary.name, "st.app.Sum");
//! assert!(context.registry().contains("st.app.Sum"));
//! ```
//!
//! ## Crates
//!
//! - [`skein_core`]: spans and errors
//! - [`skein_ast`]: the syntax tree
//! - [`skein_compiler`]: code generation and class files

mod context;

pub use bumpalo::Bump;
pub use context::{Context, ContextError};
pub use skein_ast::AstBuilder;
pub use skein_compiler::{
    ClassRegistry, ClassSink, CompiledUnit, Compiler, CompilerConfig, GeneratedClass, MAX_ARITY, RuntimeNames,
    SourceUnit,
};
pub use skein_core::{CompilationError, Span};

pub mod ast {
    //! Syntax tree node types.
    pub use skein_ast::ast::*;
}

pub mod classfile {
    //! Class file model and reader.
    pub use skein_compiler::classfile::*;
}

pub mod emit {
    //! Symbolic instructions of generated methods.
    pub use skein_compiler::emit::*;
}
