//! Tree-walking code generator.
//!
//! A [`CodeGenerator`] compiles the statements of one script into the
//! `sendMessages` method of its class. Block literals are compiled on the way
//! into lambda methods, and blocks that answer from their home method get a
//! marker class plus a protected region in the method that created them.
//!
//! The generator keeps one [`MethodFrame`] per method under construction. The
//! frame of a block is pushed while its body is compiled and popped when it
//! is done, so the enclosing method simply continues afterwards.
//!
//! ## Statement Layout
//!
//! ```text
//! region_start:              ; statement-level protected region
//! [statement]                ; may push several values (escape directives)
//! [pop to base depth]        ; non-final statements only
//! [handlers]                 ; only if a block in it answers non-locally
//! ```
//!
//! The sequence ends with `areturn` of the final statement's value.

mod block;
mod escape;
mod expr;
mod non_local;
mod runtime;

pub use block::BlockRole;
pub(crate) use expr::Receiver;
pub use runtime::MAX_ARITY;

use log::debug;
use rustc_hash::FxHashSet;
use skein_ast::ast::{Script, Sequence, Statement};
use skein_core::{CompilationError, Result, Span};

use crate::classfile::opcode::Opcode;
use crate::classfile::{ClassFile, MethodAccess, MethodInfo};
use crate::config::CompilerConfig;
use crate::emit::{MethodBody, MethodEmitter, VType};
use crate::keyword::KeywordRecord;
use crate::scope::{ScopeStack, SlotKind};
use crate::unit::SourceUnit;
use non_local::Region;

/// Methods every primary class defines; block methods never take these names.
pub(crate) const RESERVED_METHOD_NAMES: &[&str] = &["<init>", "packageName", "importFor", "sendMessages"];

/// What a sequence without statements answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EmptyAnswer {
    /// The receiver (script bodies)
    Receiver,
    /// `nil` (blocks)
    Nil,
}

/// A method under construction.
pub(crate) struct MethodFrame {
    /// Instruction sink
    emitter: MethodEmitter,
    /// Open protected regions, innermost last
    regions: Vec<Region>,
}

impl MethodFrame {
    fn new(emitter: MethodEmitter) -> Self {
        Self {
            emitter,
            regions: Vec::new(),
        }
    }

    fn finish(self, span: Span) -> Result<MethodBody> {
        if !self.regions.is_empty() {
            return Err(CompilationError::internal(
                "protected region left open at end of method",
                span,
            ));
        }
        self.emitter
            .finish()
            .map_err(|err| CompilationError::internal(err.to_string(), span))
    }
}

/// Members produced for the primary class besides `sendMessages`.
#[derive(Debug)]
pub(crate) struct GeneratedMembers {
    /// Block lambda methods, in creation order
    pub lambdas: Vec<MethodInfo>,
    /// Non-local return marker classes, in creation order
    pub markers: Vec<ClassFile>,
}

/// Compiles one script.
pub(crate) struct CodeGenerator<'a> {
    /// Compiler settings
    config: &'a CompilerConfig,
    /// Unit being compiled
    unit: &'a SourceUnit,
    /// Lexical scopes, one per method
    scopes: ScopeStack,
    /// Keyword messages whose arguments are being compiled
    keywords: Vec<KeywordRecord>,
    /// Method currently receiving instructions
    frame: MethodFrame,
    /// Enclosing methods, waiting for the current block to finish
    suspended: Vec<MethodFrame>,
    /// Finished block methods
    lambdas: Vec<MethodInfo>,
    /// Synthesized marker classes
    markers: Vec<ClassFile>,
    /// Method names taken in the primary class
    method_names: FxHashSet<String>,
    /// Next number for `B<n>` block names
    block_sequence: u32,
}

impl<'a> CodeGenerator<'a> {
    /// Create a generator whose current method is `sendMessages`.
    pub(crate) fn new(config: &'a CompilerConfig, unit: &'a SourceUnit) -> Self {
        let runtime = &config.runtime;
        let locals = vec![
            VType::object(unit.internal_name()),
            VType::object(runtime.object.clone()),
            VType::object(runtime.context.clone()),
        ];
        let emitter = Self::configure(config, MethodEmitter::new(locals));
        Self {
            config,
            unit,
            scopes: ScopeStack::new(),
            keywords: Vec::new(),
            frame: MethodFrame::new(emitter),
            suspended: Vec::new(),
            lambdas: Vec::new(),
            markers: Vec::new(),
            method_names: RESERVED_METHOD_NAMES.iter().map(|name| name.to_string()).collect(),
            block_sequence: 0,
        }
    }

    /// Compile the script body into `sendMessages`.
    pub(crate) fn compile_script(mut self, script: &Script<'_>) -> Result<(MethodInfo, GeneratedMembers)> {
        debug!(
            "generating sendMessages for {} ({} statements)",
            self.unit.binary_name(),
            script.statements().len()
        );
        self.scopes.push();
        self.compile_sequence(&script.body, EmptyAnswer::Receiver)?;
        self.scopes.pop();

        let body = self.frame.finish(script.span)?;
        let runtime = &self.config.runtime;
        let method = MethodInfo {
            access: MethodAccess::PROTECTED,
            name: "sendMessages".to_string(),
            descriptor: format!("({}{}){}", runtime.object_desc(), runtime.context_desc(), runtime.object_desc()),
            body,
        };
        let members = GeneratedMembers {
            lambdas: self.lambdas,
            markers: self.markers,
        };
        Ok((method, members))
    }

    /// The current method's emitter.
    fn emitter(&mut self) -> &mut MethodEmitter {
        &mut self.frame.emitter
    }

    fn configure(config: &CompilerConfig, emitter: MethodEmitter) -> MethodEmitter {
        if config.emit_line_numbers {
            emitter
        } else {
            emitter.without_line_numbers()
        }
    }

    /// Suspend the current method and start a new one with `locals`.
    fn enter_method(&mut self, locals: Vec<VType>) {
        let emitter = Self::configure(self.config, MethodEmitter::new(locals));
        let parent = std::mem::replace(&mut self.frame, MethodFrame::new(emitter));
        self.suspended.push(parent);
    }

    /// Finish the current method and resume the one it interrupted.
    fn leave_method(&mut self, span: Span) -> Result<MethodBody> {
        let parent = self
            .suspended
            .pop()
            .ok_or_else(|| CompilationError::internal("no enclosing method to resume", span))?;
        std::mem::replace(&mut self.frame, parent).finish(span)
    }

    // ==========================================================================
    // Sequences and Statements
    // ==========================================================================

    /// Compile temporaries and statements, ending with `areturn`.
    fn compile_sequence(&mut self, sequence: &Sequence<'_>, empty: EmptyAnswer) -> Result<()> {
        self.declare_temporaries(sequence)?;

        let Some((last, init)) = sequence.statements.split_last() else {
            self.emitter().set_line(sequence.span.line);
            match empty {
                EmptyAnswer::Receiver => self.push_receiver(),
                EmptyAnswer::Nil => self.push_pseudo("referenceNil"),
            }
            self.emitter().emit(Opcode::Areturn);
            return Ok(());
        };

        for statement in init {
            if let Statement::Answer(answer) = statement {
                return Err(CompilationError::internal(
                    "an answer must be the last statement of its sequence",
                    answer.span,
                ));
            }
            self.compile_statement(statement, false)?;
        }
        self.compile_statement(last, true)?;

        // Skipped by the emitter when the last statement already answered.
        self.emitter().emit(Opcode::Areturn);
        Ok(())
    }

    fn declare_temporaries(&mut self, sequence: &Sequence<'_>) -> Result<()> {
        let Some(first) = sequence.temporaries.first() else {
            return Ok(());
        };
        for temporary in sequence.temporaries {
            self.scopes
                .declare(temporary.name, SlotKind::Temporary, temporary.span)?;
        }
        let count = self.scopes.current().map_or(0, |scope| scope.temporary_count());
        self.emitter().set_line(first.span.line);
        self.init_temporaries(count);
        Ok(())
    }

    fn compile_statement(&mut self, statement: &Statement<'_>, is_last: bool) -> Result<()> {
        let base = self.emitter().stack_depth();
        self.open_region(statement.span());

        match statement {
            Statement::Expression(expr) => self.compile_expr(expr)?,
            Statement::Answer(answer) => {
                self.emitter().set_line(answer.span.line);
                self.compile_expr(&answer.value)?;
                self.emitter().emit(Opcode::Areturn);
            }
        }

        self.close_region()?;

        if !self.emitter().is_reachable() {
            return Ok(());
        }
        if is_last {
            if self.emitter().stack_depth() == base {
                self.push_pseudo("referenceNil");
            }
        } else {
            while self.emitter().stack_depth() > base {
                self.emitter().emit_pop();
            }
        }
        Ok(())
    }
}
