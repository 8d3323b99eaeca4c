//! Non-local return.
//!
//! A block that answers (`^value`) must return from the method that created
//! it, not just from its own lambda. The runtime implements that by throwing
//! a marker exception, one class per block, that carries the value. The
//! creating method catches it around the keyword message the block was passed
//! to and returns the carried value.
//!
//! ## Bytecode Layout
//!
//! ```text
//! start:                     ; opened before the receiver
//! [keyword send]
//! end:
//! goto after
//! handler_1:                 ; stack: [marker_1]
//! invokevirtual marker_1.answer()PrimObject
//! areturn
//! ...
//! handler_k:
//! invokevirtual marker_k.answer()PrimObject
//! areturn
//! after:
//! ```
//!
//! Regions nest like the sends that open them and inner regions close
//! first, so their exception table entries take priority. Every statement
//! also opens a region, which catches blocks answering outside any keyword
//! message.
//!
//! A block whose creating method has already returned still throws its
//! marker when it answers. Nothing catches it then; that case is undefined.

use log::debug;
use skein_core::{CompilationError, Result, Span};

use super::CodeGenerator;
use crate::classfile::opcode::Opcode;
use crate::classfile::{ClassFile, MethodAccess, MethodInfo};
use crate::emit::{Label, MemberRef, MethodEmitter, VType};

/// An open protected region.
#[derive(Debug)]
pub(crate) struct Region {
    /// First protected instruction
    start: Label,
    /// Internal names of markers to catch
    markers: Vec<String>,
    /// Construct that opened it
    span: Span,
}

impl CodeGenerator<'_> {
    /// Open a protected region at the current position.
    pub(super) fn open_region(&mut self, span: Span) {
        let start = self.emitter().new_label();
        self.emitter().mark(start);
        self.frame.regions.push(Region {
            start,
            markers: Vec::new(),
            span,
        });
    }

    /// Close the innermost region, emitting handlers if any block in it
    /// needs them.
    pub(super) fn close_region(&mut self) -> Result<()> {
        let region = self
            .frame
            .regions
            .pop()
            .ok_or_else(|| CompilationError::internal("no protected region to close", Span::default()))?;
        if region.markers.is_empty() {
            return Ok(());
        }

        debug!(
            "closing protected region at {} with {} handlers",
            region.span,
            region.markers.len()
        );
        let answer_desc = format!("(){}", self.config.runtime.object_desc());
        let emitter = self.emitter();
        let end = emitter.new_label();
        let after = emitter.new_label();
        emitter.mark(end);

        let handlers: Vec<(Label, String)> = region
            .markers
            .into_iter()
            .map(|marker| (emitter.new_label(), marker))
            .collect();
        for (handler, marker) in &handlers {
            emitter.add_try_catch(region.start, end, *handler, Some(marker.as_str()));
        }
        emitter.emit_goto(after);

        for (handler, marker) in handlers {
            emitter.mark_handler(handler, &marker);
            emitter.set_line(region.span.line);
            emitter.emit_invoke(
                Opcode::Invokevirtual,
                MemberRef::new(marker, "answer", answer_desc.clone()),
            );
            emitter.emit(Opcode::Areturn);
        }
        emitter.mark(after);
        Ok(())
    }

    /// Catch `marker` in the innermost open region.
    pub(super) fn attach_marker(&mut self, marker: String, span: Span) -> Result<()> {
        let region = self
            .frame
            .regions
            .last_mut()
            .ok_or_else(|| CompilationError::internal("non-local return outside any statement", span))?;
        region.markers.push(marker);
        Ok(())
    }

    /// Create the marker class for the block method `block_name`, returning
    /// its internal name.
    pub(super) fn synthesize_marker(&mut self, block_name: &str, span: Span) -> Result<String> {
        let name = self.unit.marker_binary_name(block_name).replace('.', "/");
        debug!("synthesizing non-local return marker {name}");

        let runtime = &self.config.runtime;
        let descriptor = format!("({})V", runtime.object_desc());
        let mut emitter = MethodEmitter::constructor(name.clone(), vec![VType::object(runtime.object.clone())]);
        emitter.emit_load(0);
        emitter.emit_load(1);
        emitter.emit_invoke(
            Opcode::Invokespecial,
            MemberRef::new(runtime.block_answer.clone(), "<init>", descriptor.clone()),
        );
        emitter.emit(Opcode::Return);
        let body = emitter
            .finish()
            .map_err(|err| CompilationError::internal(err.to_string(), span))?;

        let mut class = ClassFile::new(name.clone(), runtime.block_answer.clone());
        class.source_file = Some(self.unit.source_file(&self.config.source_extension));
        class.add_method(MethodInfo {
            access: MethodAccess::PUBLIC,
            name: "<init>".to_string(),
            descriptor,
            body,
        });
        self.markers.push(class);
        Ok(name)
    }
}
