//! Class-file encoding.
//!
//! Method code is assembled in two passes: the first interns operands in the
//! constant pool and fixes every instruction's size and offset, the second
//! writes the bytes with branch offsets resolved. The pool is only complete
//! once every method is assembled, so it is written last into the header.
//!
//! ```text
//! Code attribute
//! ├── max_stack, max_locals
//! ├── code[]
//! ├── exception_table[]   innermost protected ranges first
//! └── attributes
//!     ├── LineNumberTable
//!     └── StackMapTable   one frame per branch/handler target
//! ```
//!
//! `LineNumberTable` entries hold 16-bit line numbers. A method whose source
//! reaches past line 65535 fails to assemble rather than losing its lines.

use rustc_hash::FxHashMap;
use skein_core::{CompilationError, Result, Span};

use super::constant_pool::ConstantPool;
use super::descriptor::MethodDescriptor;
use super::opcode::Opcode;
use super::{CLASS_MAJOR_VERSION, ClassFile, MethodInfo};
use crate::emit::{BootstrapArg, CallSite, HandleKind, Insn, Label, LdcValue, MethodHandle, VType};

const MAGIC: u32 = 0xCAFE_BABE;
const MAX_CODE_LENGTH: u32 = 65535;

/// `BootstrapMethods` entries, deduplicated.
#[derive(Default)]
struct BootstrapTable {
    entries: Vec<(u16, Vec<u16>)>,
    index: FxHashMap<(u16, Vec<u16>), u16>,
}

impl BootstrapTable {
    fn add(&mut self, pool: &mut ConstantPool, site: &CallSite) -> Result<u16> {
        let handle = handle_index(pool, &site.bootstrap)?;
        let mut args = Vec::with_capacity(site.arguments.len());
        for arg in &site.arguments {
            args.push(match arg {
                BootstrapArg::MethodType(descriptor) => pool.method_type(descriptor)?,
                BootstrapArg::Handle(handle) => handle_index(pool, handle)?,
            });
        }
        let key = (handle, args);
        if let Some(&idx) = self.index.get(&key) {
            return Ok(idx);
        }
        let idx = self.entries.len() as u16;
        self.entries.push(key.clone());
        self.index.insert(key, idx);
        Ok(idx)
    }
}

fn handle_index(pool: &mut ConstantPool, handle: &MethodHandle) -> Result<u16> {
    let member = &handle.member;
    let reference = match handle.kind {
        HandleKind::GetField | HandleKind::GetStatic | HandleKind::PutField | HandleKind::PutStatic => {
            pool.field_ref(&member.owner, &member.name, &member.descriptor)?
        }
        HandleKind::InvokeInterface => {
            pool.interface_method_ref(&member.owner, &member.name, &member.descriptor)?
        }
        _ => pool.method_ref(&member.owner, &member.name, &member.descriptor)?,
    };
    pool.method_handle(handle.kind as u8, reference)
}

fn put_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

/// A complete attribute: name index, length, body.
fn attribute(name: u16, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 6);
    put_u16(&mut out, name);
    put_u32(&mut out, body.len() as u32);
    out.extend_from_slice(body);
    out
}

fn class_error(message: String) -> CompilationError {
    CompilationError::internal(message, Span::default())
}

pub(super) fn write_class(class: &ClassFile) -> Result<Vec<u8>> {
    let mut pool = ConstantPool::new();
    let mut bootstraps = BootstrapTable::default();
    let this_class = pool.class(&class.name)?;
    let super_class = pool.class(&class.super_name)?;

    let mut methods = Vec::new();
    for method in &class.methods {
        write_method(&mut pool, &mut bootstraps, method, &mut methods)?;
    }

    let mut attributes = Vec::new();
    if let Some(source) = &class.source_file {
        let name = pool.utf8("SourceFile")?;
        let source = pool.utf8(source)?;
        attributes.push(attribute(name, &source.to_be_bytes()));
    }
    if !class.inner_classes.is_empty() {
        let name = pool.utf8("InnerClasses")?;
        let mut body = Vec::new();
        put_u16(&mut body, class.inner_classes.len() as u16);
        for inner in &class.inner_classes {
            put_u16(&mut body, pool.class(&inner.inner)?);
            put_u16(&mut body, pool.class(&inner.outer)?);
            put_u16(&mut body, pool.utf8(&inner.name)?);
            put_u16(&mut body, inner.access.bits());
        }
        attributes.push(attribute(name, &body));
    }
    if !bootstraps.entries.is_empty() {
        let name = pool.utf8("BootstrapMethods")?;
        let mut body = Vec::new();
        put_u16(&mut body, bootstraps.entries.len() as u16);
        for (handle, args) in &bootstraps.entries {
            put_u16(&mut body, *handle);
            put_u16(&mut body, args.len() as u16);
            for arg in args {
                put_u16(&mut body, *arg);
            }
        }
        attributes.push(attribute(name, &body));
    }

    let mut out = Vec::with_capacity(1024);
    put_u32(&mut out, MAGIC);
    put_u16(&mut out, 0);
    put_u16(&mut out, CLASS_MAJOR_VERSION);
    put_u16(&mut out, pool.count());
    pool.write(&mut out);
    put_u16(&mut out, class.access.bits());
    put_u16(&mut out, this_class);
    put_u16(&mut out, super_class);
    put_u16(&mut out, 0); // interfaces
    put_u16(&mut out, 0); // fields
    put_u16(&mut out, class.methods.len() as u16);
    out.extend_from_slice(&methods);
    put_u16(&mut out, attributes.len() as u16);
    for attr in attributes {
        out.extend_from_slice(&attr);
    }
    Ok(out)
}

fn write_method(
    pool: &mut ConstantPool,
    bootstraps: &mut BootstrapTable,
    method: &MethodInfo,
    out: &mut Vec<u8>,
) -> Result<()> {
    put_u16(out, method.access.bits());
    put_u16(out, pool.utf8(&method.name)?);
    put_u16(out, pool.utf8(&method.descriptor)?);
    put_u16(out, 1);
    let code_name = pool.utf8("Code")?;
    let code = assemble_code(pool, bootstraps, method)?;
    out.extend_from_slice(&attribute(code_name, &code));
    Ok(())
}

// ============================================================================
// Code assembly
// ============================================================================

/// Returns the body of the `Code` attribute.
fn assemble_code(pool: &mut ConstantPool, bootstraps: &mut BootstrapTable, method: &MethodInfo) -> Result<Vec<u8>> {
    let body = &method.body;

    // Pass 1: operands and offsets
    let mut operands = Vec::with_capacity(body.insns.len());
    let mut offsets = Vec::with_capacity(body.insns.len());
    let mut labels: FxHashMap<Label, u32> = FxHashMap::default();
    let mut pc: u32 = 0;
    for insn in &body.insns {
        offsets.push(pc);
        let (operand, size) = match insn {
            Insn::Op(_) => (0, 1),
            Insn::Int(Opcode::Bipush, _) => (0, 2),
            Insn::Int(..) => (0, 3),
            Insn::Ldc(value) => {
                let idx = match value {
                    LdcValue::String(text) => pool.string(text)?,
                    LdcValue::Int(value) => pool.integer(*value)?,
                };
                (idx, if idx < 256 { 2 } else { 3 })
            }
            Insn::Var(_, slot) => (
                0,
                match slot {
                    0..=3 => 1,
                    4..=255 => 2,
                    _ => 4,
                },
            ),
            Insn::Type(_, class) => (pool.class(class)?, 3),
            Insn::Field(_, field) => (pool.field_ref(&field.owner, &field.name, &field.descriptor)?, 3),
            Insn::Invoke(Opcode::Invokeinterface, m) => {
                (pool.interface_method_ref(&m.owner, &m.name, &m.descriptor)?, 5)
            }
            Insn::Invoke(_, m) => (pool.method_ref(&m.owner, &m.name, &m.descriptor)?, 3),
            Insn::InvokeDynamic(site) => {
                let bootstrap = bootstraps.add(pool, site)?;
                (pool.invoke_dynamic(bootstrap, &site.name, &site.descriptor)?, 5)
            }
            Insn::Jump(..) => (0, 3),
            Insn::Mark(label) => {
                labels.insert(*label, pc);
                (0, 0)
            }
            Insn::Line(_) => (0, 0),
        };
        operands.push(operand);
        pc += size;
    }
    if pc == 0 || pc > MAX_CODE_LENGTH {
        return Err(class_error(format!(
            "method '{}' has {pc} bytes of code, expected 1..={MAX_CODE_LENGTH}",
            method.name
        )));
    }
    let label_offset = |label: &Label| {
        labels
            .get(label)
            .copied()
            .ok_or_else(|| class_error(format!("label {} in '{}' is never placed", label.0, method.name)))
    };

    // Pass 2: encoding
    let mut code = Vec::with_capacity(pc as usize);
    let mut lines: Vec<(u16, u16)> = Vec::new();
    for (i, insn) in body.insns.iter().enumerate() {
        let operand = operands[i];
        match insn {
            Insn::Op(op) => code.push(u8::from(*op)),
            Insn::Int(op, value) => {
                code.push(u8::from(*op));
                if *op == Opcode::Bipush {
                    code.push(*value as i8 as u8);
                } else {
                    code.extend_from_slice(&value.to_be_bytes());
                }
            }
            Insn::Ldc(_) => {
                if operand < 256 {
                    code.push(u8::from(Opcode::Ldc));
                    code.push(operand as u8);
                } else {
                    code.push(u8::from(Opcode::LdcW));
                    put_u16(&mut code, operand);
                }
            }
            Insn::Var(op, slot) => encode_var(*op, *slot, &mut code),
            Insn::Type(op, _) | Insn::Field(op, _) => {
                code.push(u8::from(*op));
                put_u16(&mut code, operand);
            }
            Insn::Invoke(op, member) => {
                code.push(u8::from(*op));
                put_u16(&mut code, operand);
                if *op == Opcode::Invokeinterface {
                    let descriptor = MethodDescriptor::parse(&member.descriptor)
                        .map_err(|e| class_error(e.to_string()))?;
                    code.push(1 + descriptor.param_slots() as u8);
                    code.push(0);
                }
            }
            Insn::InvokeDynamic(_) => {
                code.push(u8::from(Opcode::Invokedynamic));
                put_u16(&mut code, operand);
                put_u16(&mut code, 0);
            }
            Insn::Jump(op, target) => {
                let delta = label_offset(target)? as i64 - offsets[i] as i64;
                let delta = i16::try_from(delta).map_err(|_| {
                    class_error(format!("branch offset {delta} out of range in '{}'", method.name))
                })?;
                code.push(u8::from(*op));
                code.extend_from_slice(&delta.to_be_bytes());
            }
            Insn::Mark(_) => {}
            Insn::Line(line) => {
                let start = offsets[i] as u16;
                let line = u16::try_from(*line).map_err(|_| {
                    CompilationError::internal(
                        format!("line {line} in '{}' exceeds the line table limit of {}", method.name, u16::MAX),
                        Span::line(*line),
                    )
                })?;
                match lines.last_mut() {
                    Some(last) if last.0 == start => last.1 = line,
                    _ => lines.push((start, line)),
                }
            }
        }
    }
    // Markers after the last instruction have no code to describe.
    lines.retain(|(start, _)| u32::from(*start) < pc);

    let mut out = Vec::with_capacity(code.len() + 64);
    put_u16(&mut out, body.max_stack);
    put_u16(&mut out, body.max_locals);
    put_u32(&mut out, code.len() as u32);
    out.extend_from_slice(&code);

    put_u16(&mut out, body.handlers.len() as u16);
    for handler in &body.handlers {
        put_u16(&mut out, label_offset(&handler.start)? as u16);
        put_u16(&mut out, label_offset(&handler.end)? as u16);
        put_u16(&mut out, label_offset(&handler.handler)? as u16);
        let catch_type = match &handler.catch_type {
            Some(class) => pool.class(class)?,
            None => 0,
        };
        put_u16(&mut out, catch_type);
    }

    let mut attributes = Vec::new();
    if !lines.is_empty() {
        let name = pool.utf8("LineNumberTable")?;
        let mut table = Vec::with_capacity(2 + lines.len() * 4);
        put_u16(&mut table, lines.len() as u16);
        for (start, line) in &lines {
            put_u16(&mut table, *start);
            put_u16(&mut table, *line);
        }
        attributes.push(attribute(name, &table));
    }
    if !body.frames.is_empty() {
        let mut frames = Vec::with_capacity(body.frames.len());
        for (label, stack) in &body.frames {
            frames.push((label_offset(label)?, stack));
        }
        frames.sort_by_key(|(offset, _)| *offset);
        frames.dedup_by_key(|(offset, _)| *offset);

        let name = pool.utf8("StackMapTable")?;
        let mut table = Vec::new();
        put_u16(&mut table, frames.len() as u16);
        let mut previous: Option<u32> = None;
        for (offset, stack) in frames {
            let delta = match previous {
                None => offset,
                Some(previous) => offset - previous - 1,
            } as u16;
            previous = Some(offset);
            match stack.as_slice() {
                [] if delta < 64 => table.push(delta as u8),
                [] => {
                    table.push(251);
                    put_u16(&mut table, delta);
                }
                [single] if delta < 64 => {
                    table.push(64 + delta as u8);
                    write_vtype(pool, single, &offsets, &mut table)?;
                }
                [single] => {
                    table.push(247);
                    put_u16(&mut table, delta);
                    write_vtype(pool, single, &offsets, &mut table)?;
                }
                _ => {
                    table.push(255);
                    put_u16(&mut table, delta);
                    put_u16(&mut table, body.locals.len() as u16);
                    for local in &body.locals {
                        write_vtype(pool, local, &offsets, &mut table)?;
                    }
                    put_u16(&mut table, stack.len() as u16);
                    for entry in stack {
                        write_vtype(pool, entry, &offsets, &mut table)?;
                    }
                }
            }
        }
        attributes.push(attribute(name, &table));
    }

    put_u16(&mut out, attributes.len() as u16);
    for attr in attributes {
        out.extend_from_slice(&attr);
    }
    Ok(out)
}

fn encode_var(op: Opcode, slot: u16, code: &mut Vec<u8>) {
    let short_base = if op == Opcode::Astore {
        Opcode::Astore0
    } else {
        Opcode::Aload0
    };
    match slot {
        0..=3 => code.push(u8::from(short_base) + slot as u8),
        4..=255 => {
            code.push(u8::from(op));
            code.push(slot as u8);
        }
        _ => {
            code.push(u8::from(Opcode::Wide));
            code.push(u8::from(op));
            put_u16(code, slot);
        }
    }
}

fn write_vtype(pool: &mut ConstantPool, ty: &VType, offsets: &[u32], out: &mut Vec<u8>) -> Result<()> {
    match ty {
        VType::Top => out.push(0),
        VType::Integer => out.push(1),
        VType::Float => out.push(2),
        VType::Double => out.push(3),
        VType::Long => out.push(4),
        VType::Null => out.push(5),
        VType::UninitializedThis => out.push(6),
        VType::Object(class) => {
            out.push(7);
            put_u16(out, pool.class(class)?);
        }
        VType::Uninitialized(insn) => {
            let offset = offsets
                .get(*insn)
                .ok_or_else(|| class_error(format!("'new' at instruction {insn} is missing")))?;
            out.push(8);
            put_u16(out, *offset as u16);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::reader::ClassSummary;
    use crate::classfile::{InnerClass, MethodAccess};
    use crate::emit::{MemberRef, MethodEmitter};

    fn simple_method(name: &str) -> MethodInfo {
        let mut e = MethodEmitter::new(vec![VType::object("st/app/Main")]);
        e.set_line(1);
        e.emit_load(0);
        e.emit(Opcode::Areturn);
        MethodInfo {
            access: MethodAccess::PUBLIC,
            name: name.to_string(),
            descriptor: "()Ljava/lang/Object;".to_string(),
            body: e.finish().unwrap(),
        }
    }

    #[test]
    fn header_and_version() {
        let mut class = ClassFile::new("st/app/Main", "java/lang/Object");
        class.add_method(simple_method("me"));
        let bytes = class.to_bytes().unwrap();
        assert_eq!(&bytes[..4], &[0xCA, 0xFE, 0xBA, 0xBE]);
        assert_eq!(u16::from_be_bytes([bytes[6], bytes[7]]), 52);
    }

    #[test]
    fn short_and_wide_locals() {
        let mut code = Vec::new();
        encode_var(Opcode::Aload, 2, &mut code);
        encode_var(Opcode::Astore, 9, &mut code);
        encode_var(Opcode::Aload, 300, &mut code);
        assert_eq!(code, vec![44, 58, 9, 196, 25, 1, 44]);
    }

    #[test]
    fn branch_frames_are_encoded() {
        let mut e = MethodEmitter::new(vec![VType::object("st/app/Main")]);
        let after = e.new_label();
        e.emit_load(0);
        e.emit_goto(after);
        e.mark(after);
        e.emit(Opcode::Areturn);
        let mut class = ClassFile::new("st/app/Main", "java/lang/Object");
        class.add_method(MethodInfo {
            access: MethodAccess::PUBLIC,
            name: "jump".into(),
            descriptor: "()Ljava/lang/Object;".into(),
            body: e.finish().unwrap(),
        });
        let summary = ClassSummary::parse(&class.to_bytes().unwrap()).unwrap();
        let code = summary.method("jump").unwrap().code.as_ref().unwrap();
        assert_eq!(code.code, vec![42, 167, 0, 3, 176]);
        assert!(code.attributes.contains(&"StackMapTable".to_string()));
    }

    #[test]
    fn bootstrap_methods_are_shared() {
        let site = CallSite {
            name: "apply".into(),
            descriptor: "()Ljava/lang/Runnable;".into(),
            bootstrap: MethodHandle {
                kind: HandleKind::InvokeStatic,
                member: MemberRef::new("java/lang/invoke/LambdaMetafactory", "metafactory", "()V"),
            },
            arguments: vec![BootstrapArg::MethodType("()V".into())],
        };
        let mut e = MethodEmitter::new(vec![]);
        e.emit_invoke_dynamic(site.clone());
        e.emit_invoke_dynamic(site);
        e.emit(Opcode::Pop);
        e.emit(Opcode::Areturn);
        let mut class = ClassFile::new("st/app/Main", "java/lang/Object");
        class.inner_classes.push(InnerClass::method_handles_lookup());
        class.add_method(MethodInfo {
            access: MethodAccess::PUBLIC | MethodAccess::STATIC,
            name: "make".into(),
            descriptor: "()Ljava/lang/Runnable;".into(),
            body: e.finish().unwrap(),
        });
        let summary = ClassSummary::parse(&class.to_bytes().unwrap()).unwrap();
        assert_eq!(summary.bootstrap_methods, 1);
        assert!(summary.attributes.contains(&"InnerClasses".to_string()));
    }

    #[test]
    fn lines_past_the_table_limit_are_rejected() {
        let mut e = MethodEmitter::new(vec![VType::object("st/app/Main")]);
        e.set_line(70_000);
        e.emit_load(0);
        e.emit(Opcode::Areturn);
        let mut class = ClassFile::new("st/app/Main", "java/lang/Object");
        class.add_method(MethodInfo {
            access: MethodAccess::PUBLIC,
            name: "far".into(),
            descriptor: "()Ljava/lang/Object;".into(),
            body: e.finish().unwrap(),
        });
        let err = class.to_bytes().unwrap_err();
        assert!(matches!(err, CompilationError::InternalCompilerError { .. }));
        assert_eq!(err.span().line, 70_000);
    }

    #[test]
    fn empty_code_is_rejected() {
        let mut class = ClassFile::new("st/app/Main", "java/lang/Object");
        class.add_method(MethodInfo {
            access: MethodAccess::PUBLIC,
            name: "nothing".into(),
            descriptor: "()V".into(),
            body: crate::emit::MethodBody {
                insns: vec![],
                handlers: vec![],
                frames: vec![],
                locals: vec![],
                max_stack: 0,
                max_locals: 0,
            },
        });
        assert!(matches!(
            class.to_bytes(),
            Err(CompilationError::InternalCompilerError { .. })
        ));
    }
}
