//! Syntax tree consumed by the Skein code generator.
//!
//! Parsing is done elsewhere; a parser adapter allocates these nodes in a
//! [`bumpalo::Bump`] arena, usually through [`AstBuilder`], and hands the
//! resulting [`Script`] to the compiler.
//!
//! ## Modules
//!
//! - [`ast`]: node definitions
//! - [`builder`]: arena-backed constructor API

pub mod ast;
pub mod builder;

pub use ast::*;
pub use builder::AstBuilder;
