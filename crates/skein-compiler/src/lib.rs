//! Smalltalk to JVM bytecode compiler backend.
//!
//! Takes the syntax tree of one Smalltalk script and produces class files
//! for a dynamically typed runtime: every message is a `perform` call on
//! `PrimObject`, blocks become lambda methods and non-local returns become
//! marker exceptions caught by the method that created the block.
//!
//! ```text
//! Script ──► CodeGenerator ──► ClassFile ──► bytes ──► ClassSink
//!             (sendMessages,     (primary +
//!              block lambdas)     markers)
//! ```
//!
//! ## Modules
//!
//! - [`classfile`]: class file model, writer and reader
//! - [`config`]: compiler settings and runtime class names
//! - [`emit`]: instruction emitter with operand stack tracking
//! - [`keyword`]: keyword message records and block naming
//! - [`registry`]: destinations for generated classes
//! - [`scope`]: lexical scopes and name resolution
//! - [`unit`]: compilation units, the compiler entry point and its output

pub mod classfile;
pub mod config;
pub mod emit;
pub mod keyword;
pub mod registry;
pub mod scope;
pub mod unit;

mod generator;

pub use config::{CompilerConfig, RuntimeNames};
pub use generator::MAX_ARITY;
pub use registry::{ClassRegistry, ClassSink};
pub use unit::{CompiledUnit, Compiler, GeneratedClass, SourceUnit, compile};
