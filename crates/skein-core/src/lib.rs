//! Core types shared by the Skein crates.
//!
//! - [`Span`]: source locations carried by every syntax node
//! - [`CompilationError`]: the error type of the code generator

mod error;
mod span;

pub use error::CompilationError;
pub use span::Span;

/// Result alias used throughout the compiler.
pub type Result<T> = std::result::Result<T, CompilationError>;
