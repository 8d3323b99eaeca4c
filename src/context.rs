//! Compilation context.
//!
//! A [`Context`] pairs a [`Compiler`] with the [`ClassRegistry`] its output
//! is defined in. Compiling through a shared context from several threads is
//! fine: each call has its own generator and the registry is locked.

use std::sync::Arc;

use log::{debug, info};
use skein_ast::ast::Script;
use skein_compiler::{ClassRegistry, CompiledUnit, Compiler, CompilerConfig, SourceUnit};
use skein_core::CompilationError;
use thiserror::Error;

/// Compiles units and keeps the classes they produce.
#[derive(Debug, Clone, Default)]
pub struct Context {
    compiler: Compiler,
    registry: Arc<ClassRegistry>,
}

impl Context {
    /// A context with the default configuration and an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A context with `config` and an empty registry.
    pub fn with_config(config: CompilerConfig) -> Self {
        Self {
            compiler: Compiler::new(config),
            registry: Arc::default(),
        }
    }

    /// A context defining its classes in a registry shared with others.
    pub fn with_registry(config: CompilerConfig, registry: Arc<ClassRegistry>) -> Self {
        Self {
            compiler: Compiler::new(config),
            registry,
        }
    }

    /// The configuration in use.
    pub fn config(&self) -> &CompilerConfig {
        self.compiler.config()
    }

    /// The registry classes are defined in.
    pub fn registry(&self) -> &Arc<ClassRegistry> {
        &self.registry
    }

    /// Number of classes defined so far.
    pub fn class_count(&self) -> usize {
        self.registry.len()
    }

    /// Compile `script` as `unit` and define its classes, markers first.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::Compilation`] if code generation fails and
    /// [`ContextError::AlreadyDefined`] if one of the unit's classes is
    /// already in the registry. Nothing is defined in either case.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn compile(&self, script: &Script<'_>, unit: &SourceUnit) -> Result<CompiledUnit, ContextError> {
        let compiled = self.compiler.compile(script, unit)?;
        self.registry
            .define_all(compiled.classes())
            .map_err(ContextError::AlreadyDefined)?;
        info!(
            "defined {} with {} marker classes",
            compiled.primary.name,
            compiled.markers.len()
        );
        debug!("registry holds {} classes", self.registry.len());
        Ok(compiled)
    }
}

/// Errors from [`Context::compile`].
#[derive(Debug, Error)]
pub enum ContextError {
    /// Code generation failed.
    #[error(transparent)]
    Compilation(#[from] CompilationError),

    /// A class of the unit is already defined.
    #[error("class '{0}' is already defined")]
    AlreadyDefined(String),
}

impl ContextError {
    /// The compilation error, if that is what failed.
    pub fn compilation_error(&self) -> Option<&CompilationError> {
        match self {
            Self::Compilation(err) => Some(err),
            Self::AlreadyDefined(_) => None,
        }
    }
}
