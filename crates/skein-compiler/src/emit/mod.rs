//! Instruction emitter for one generated method.
//!
//! The [`MethodEmitter`] records a symbolic instruction stream. Constant pool
//! indices and branch offsets are only resolved when the class writer
//! assembles the finished [`MethodBody`], so several emitters can be open at
//! once (a block body is compiled while its enclosing method is half done).
//!
//! Alongside the stream the emitter simulates the operand stack. That gives
//! `max_stack`, and a stack snapshot for every label that is a branch or
//! handler target, which becomes a `StackMapTable` frame.
//!
//! Code following an unconditional transfer (`goto`, `areturn`, `athrow`) is
//! dropped until a label that something branches to is marked, so the output
//! never contains unreachable instructions without a frame.
//!
//! # Example
//!
//! ```ignore
//! let mut emitter = MethodEmitter::new(vec![VType::object("st/app/Main")]);
//! emitter.set_line(3);
//! emitter.emit_load(0);
//! emitter.emit(Opcode::Areturn);
//! let body = emitter.finish()?;
//! ```

pub mod frames;

use rustc_hash::FxHashSet;
use thiserror::Error;

use crate::classfile::descriptor::{MethodDescriptor, parse_field};
use crate::classfile::opcode::Opcode;
use frames::OperandStack;
pub use frames::VType;

/// Problems detected while emitting a method.
///
/// These all indicate a generator bug or an invalid raw-instruction sequence.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmitError {
    /// An instruction needed more operands than the stack held.
    #[error("operand stack underflow at '{0}'")]
    StackUnderflow(&'static str),

    /// A member descriptor could not be parsed.
    #[error("malformed descriptor '{0}'")]
    MalformedDescriptor(String),

    /// A local variable outside the method's frame was loaded.
    #[error("local variable {0} is not defined")]
    UndefinedLocal(u16),

    /// An opcode was emitted through the wrong entry point.
    #[error("opcode '{0}' needs operands")]
    MissingOperands(&'static str),

    /// A label was branched to but never placed.
    #[error("label {0} is never marked")]
    UnmarkedLabel(u32),

    /// Execution can run past the last instruction.
    #[error("control reaches the end of the method")]
    FallsOffEnd,
}

/// A position in the instruction stream, resolved at assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(pub(crate) u32);

impl Label {
    /// Label number within its method.
    pub fn index(self) -> u32 {
        self.0
    }
}

/// A field or method reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberRef {
    /// Internal name of the declaring class.
    pub owner: String,
    /// Member name.
    pub name: String,
    /// Field or method descriptor.
    pub descriptor: String,
}

impl MemberRef {
    /// Create a member reference.
    pub fn new(owner: impl Into<String>, name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            descriptor: descriptor.into(),
        }
    }
}

/// Method handle reference kinds (JVMS 4.4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum HandleKind {
    GetField = 1,
    GetStatic = 2,
    PutField = 3,
    PutStatic = 4,
    InvokeVirtual = 5,
    InvokeStatic = 6,
    InvokeSpecial = 7,
    NewInvokeSpecial = 8,
    InvokeInterface = 9,
}

/// A method handle constant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodHandle {
    /// Reference kind
    pub kind: HandleKind,
    /// Target member
    pub member: MemberRef,
}

/// Static argument of a bootstrap method.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BootstrapArg {
    /// `MethodType` constant from a method descriptor.
    MethodType(String),
    /// `MethodHandle` constant.
    Handle(MethodHandle),
}

/// An `invokedynamic` call site.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallSite {
    /// Name passed to the bootstrap method.
    pub name: String,
    /// Call site descriptor.
    pub descriptor: String,
    /// Bootstrap method handle.
    pub bootstrap: MethodHandle,
    /// Static bootstrap arguments.
    pub arguments: Vec<BootstrapArg>,
}

/// Value loaded by `ldc`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LdcValue {
    /// `CONSTANT_String`
    String(String),
    /// `CONSTANT_Integer`
    Int(i32),
}

/// A symbolic instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Insn {
    /// Operand-less instruction.
    Op(Opcode),
    /// `bipush` or `sipush`.
    Int(Opcode, i16),
    /// `ldc`; the writer picks `ldc_w` when needed.
    Ldc(LdcValue),
    /// `aload` or `astore`; the writer picks the short or wide form.
    Var(Opcode, u16),
    /// `new` or `checkcast`.
    Type(Opcode, String),
    /// Field access.
    Field(Opcode, MemberRef),
    /// Method invocation other than `invokedynamic`.
    Invoke(Opcode, MemberRef),
    /// `invokedynamic`.
    InvokeDynamic(Box<CallSite>),
    /// Branch to a label.
    Jump(Opcode, Label),
    /// Placement of a label.
    Mark(Label),
    /// Start of code for a source line.
    Line(u32),
}

/// Exception table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TryCatch {
    /// First protected instruction.
    pub start: Label,
    /// End of the protected range (exclusive).
    pub end: Label,
    /// Handler entry.
    pub handler: Label,
    /// Caught class, `None` catches everything.
    pub catch_type: Option<String>,
}

/// A finished method body, ready for assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodBody {
    /// Instruction stream.
    pub insns: Vec<Insn>,
    /// Exception table, innermost regions first.
    pub handlers: Vec<TryCatch>,
    /// Labels that are branch or handler targets, with the stack there.
    pub frames: Vec<(Label, Vec<VType>)>,
    /// Locals on entry; frames assume they never change.
    pub locals: Vec<VType>,
    /// Operand stack size in slots.
    pub max_stack: u16,
    /// Local variable slots.
    pub max_locals: u16,
}

impl MethodBody {
    /// The instructions, without label and line markers.
    pub fn instructions(&self) -> impl DoubleEndedIterator<Item = &Insn> {
        self.insns
            .iter()
            .filter(|insn| !matches!(insn, Insn::Mark(_) | Insn::Line(_)))
    }

    /// Source lines in the order they appear.
    pub fn lines(&self) -> Vec<u32> {
        self.insns
            .iter()
            .filter_map(|insn| match insn {
                Insn::Line(line) => Some(*line),
                _ => None,
            })
            .collect()
    }

    /// Invoked methods as `owner.name`, in order.
    pub fn calls(&self) -> Vec<String> {
        self.insns
            .iter()
            .filter_map(|insn| match insn {
                Insn::Invoke(_, member) => Some(format!("{}.{}", member.owner, member.name)),
                _ => None,
            })
            .collect()
    }
}

/// Emits instructions for a single method.
pub struct MethodEmitter {
    /// Instruction stream
    insns: Vec<Insn>,
    /// Simulated operand stack
    stack: OperandStack,
    /// Entry locals
    entry_locals: Vec<VType>,
    /// Current locals
    locals: Vec<VType>,
    /// Stack recorded for each label, `None` while unknown
    label_stacks: Vec<Option<Vec<VType>>>,
    /// Whether each label has been placed
    marked: Vec<bool>,
    /// Labels that need a frame
    targets: FxHashSet<Label>,
    /// Exception table
    handlers: Vec<TryCatch>,
    /// Whether the next instruction can execute
    reachable: bool,
    /// Line of the last emitted line marker
    current_line: Option<u32>,
    /// Whether line markers are recorded
    line_numbers: bool,
    /// Class of `this` while it is still uninitialized
    this_class: Option<String>,
    /// First problem found, reported by `finish`
    fault: Option<EmitError>,
}

impl MethodEmitter {
    /// Create an emitter for a method whose entry locals are `locals`
    /// (`this` first for instance methods, then the parameters).
    pub fn new(locals: Vec<VType>) -> Self {
        Self {
            insns: Vec::new(),
            stack: OperandStack::default(),
            entry_locals: locals.clone(),
            locals,
            label_stacks: Vec::new(),
            marked: Vec::new(),
            targets: FxHashSet::default(),
            handlers: Vec::new(),
            reachable: true,
            current_line: None,
            line_numbers: true,
            this_class: None,
            fault: None,
        }
    }

    /// Create an emitter for a constructor of `this_class`.
    pub fn constructor(this_class: impl Into<String>, params: Vec<VType>) -> Self {
        let mut locals = vec![VType::UninitializedThis];
        locals.extend(params);
        let mut emitter = Self::new(locals);
        emitter.this_class = Some(this_class.into());
        emitter
    }

    /// Stop recording line markers.
    pub fn without_line_numbers(mut self) -> Self {
        self.line_numbers = false;
        self
    }

    /// Associate the following instructions with a source line.
    pub fn set_line(&mut self, line: u32) {
        if !self.line_numbers || !self.reachable || self.current_line == Some(line) {
            return;
        }
        self.current_line = Some(line);
        self.insns.push(Insn::Line(line));
    }

    /// Number of values on the operand stack.
    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    /// Whether the next instruction would be reachable.
    pub fn is_reachable(&self) -> bool {
        self.reachable
    }

    /// Number of local variable slots defined on entry.
    pub fn entry_local_count(&self) -> usize {
        self.entry_locals.len()
    }

    // ==========================================================================
    // Basic Emission
    // ==========================================================================

    /// Emit an operand-less instruction.
    pub fn emit(&mut self, op: Opcode) {
        if !self.reachable {
            return;
        }
        match op {
            Opcode::Nop => {}
            Opcode::AconstNull => self.stack.push(VType::Null),
            Opcode::IconstM1
            | Opcode::Iconst0
            | Opcode::Iconst1
            | Opcode::Iconst2
            | Opcode::Iconst3
            | Opcode::Iconst4
            | Opcode::Iconst5 => self.stack.push(VType::Integer),
            Opcode::Pop => {
                self.pop(op);
            }
            Opcode::Pop2 => {
                if let Some(top) = self.pop(op)
                    && !top.is_wide()
                {
                    self.pop(op);
                }
            }
            Opcode::Dup => {
                if let Some(top) = self.pop(op) {
                    self.stack.push(top.clone());
                    self.stack.push(top);
                }
            }
            Opcode::DupX1 => {
                if let (Some(first), Some(second)) = (self.pop(op), self.pop(op)) {
                    self.stack.push(first.clone());
                    self.stack.push(second);
                    self.stack.push(first);
                }
            }
            Opcode::Swap => {
                if let (Some(first), Some(second)) = (self.pop(op), self.pop(op)) {
                    self.stack.push(first);
                    self.stack.push(second);
                }
            }
            Opcode::Areturn | Opcode::Athrow => {
                self.pop(op);
            }
            Opcode::Return => {}
            _ => {
                self.fail(EmitError::MissingOperands(op.mnemonic()));
                return;
            }
        }
        self.insns.push(Insn::Op(op));
        if op.ends_flow() {
            self.reachable = false;
        }
    }

    /// Discard the top value with `pop` or `pop2` as its width requires.
    pub fn emit_pop(&mut self) {
        match self.stack.peek() {
            Some(top) if top.is_wide() => self.emit(Opcode::Pop2),
            _ => self.emit(Opcode::Pop),
        }
    }

    /// Push an int using the shortest encoding.
    pub fn emit_int(&mut self, value: i32) {
        if !self.reachable {
            return;
        }
        if let Some(op) = Opcode::iconst(value) {
            return self.emit(op);
        }
        let insn = if let Ok(byte) = i8::try_from(value) {
            Insn::Int(Opcode::Bipush, i16::from(byte))
        } else if let Ok(short) = i16::try_from(value) {
            Insn::Int(Opcode::Sipush, short)
        } else {
            Insn::Ldc(LdcValue::Int(value))
        };
        self.insns.push(insn);
        self.stack.push(VType::Integer);
    }

    /// Push a string constant.
    pub fn emit_string(&mut self, value: &str) {
        if !self.reachable {
            return;
        }
        self.insns.push(Insn::Ldc(LdcValue::String(value.to_string())));
        self.stack.push(VType::object("java/lang/String"));
    }

    /// Load a reference local.
    pub fn emit_load(&mut self, slot: u16) {
        if !self.reachable {
            return;
        }
        let Some(ty) = self.locals.get(slot as usize).cloned() else {
            self.fail(EmitError::UndefinedLocal(slot));
            return;
        };
        self.insns.push(Insn::Var(Opcode::Aload, slot));
        self.stack.push(ty);
    }

    /// Store the top reference into a local.
    pub fn emit_store(&mut self, slot: u16) {
        if !self.reachable {
            return;
        }
        let Some(ty) = self.pop(Opcode::Astore) else {
            return;
        };
        let index = slot as usize;
        if self.locals.len() <= index {
            self.locals.resize(index + 1, VType::Top);
        }
        self.locals[index] = ty;
        self.insns.push(Insn::Var(Opcode::Astore, slot));
    }

    /// Allocate an uninitialized instance of `class`.
    pub fn emit_new(&mut self, class: &str) {
        if !self.reachable {
            return;
        }
        let index = self.insns.len();
        self.insns.push(Insn::Type(Opcode::New, class.to_string()));
        self.stack.push(VType::Uninitialized(index));
    }

    /// Read a static field.
    pub fn emit_get_static(&mut self, field: MemberRef) {
        if !self.reachable {
            return;
        }
        match parse_field(&field.descriptor) {
            Ok(ty) => self.stack.push(VType::from(&ty)),
            Err(_) => self.fail(EmitError::MalformedDescriptor(field.descriptor.clone())),
        }
        self.insns.push(Insn::Field(Opcode::Getstatic, field));
    }

    /// Invoke a method with `invokevirtual`, `invokespecial`,
    /// `invokestatic` or `invokeinterface`.
    pub fn emit_invoke(&mut self, op: Opcode, method: MemberRef) {
        if !self.reachable {
            return;
        }
        let Ok(descriptor) = MethodDescriptor::parse(&method.descriptor) else {
            self.fail(EmitError::MalformedDescriptor(method.descriptor.clone()));
            return;
        };
        for _ in &descriptor.params {
            self.pop(op);
        }
        if op != Opcode::Invokestatic {
            let receiver = self.pop(op);
            if op == Opcode::Invokespecial && method.name == "<init>" {
                self.complete_construction(receiver, &method.owner);
            }
        }
        if let Some(ret) = &descriptor.ret {
            self.stack.push(VType::from(ret));
        }
        self.insns.push(Insn::Invoke(op, method));
    }

    /// Emit an `invokedynamic` call site.
    pub fn emit_invoke_dynamic(&mut self, site: CallSite) {
        if !self.reachable {
            return;
        }
        let Ok(descriptor) = MethodDescriptor::parse(&site.descriptor) else {
            self.fail(EmitError::MalformedDescriptor(site.descriptor.clone()));
            return;
        };
        for _ in &descriptor.params {
            self.pop(Opcode::Invokedynamic);
        }
        if let Some(ret) = &descriptor.ret {
            self.stack.push(VType::from(ret));
        }
        self.insns.push(Insn::InvokeDynamic(Box::new(site)));
    }

    fn complete_construction(&mut self, receiver: Option<VType>, owner: &str) {
        let initialized = match &receiver {
            Some(VType::UninitializedThis) => match &self.this_class {
                Some(class) => VType::object(class.clone()),
                None => VType::object(owner),
            },
            Some(VType::Uninitialized(_)) => VType::object(owner),
            _ => return,
        };
        if let Some(receiver) = receiver {
            self.stack.replace(&receiver, &initialized);
            for local in self.locals.iter_mut().filter(|local| **local == receiver) {
                *local = initialized.clone();
            }
        }
    }

    // ==========================================================================
    // Labels and Control Flow
    // ==========================================================================

    /// Allocate a new, unplaced label.
    pub fn new_label(&mut self) -> Label {
        let label = Label(self.label_stacks.len() as u32);
        self.label_stacks.push(None);
        self.marked.push(false);
        label
    }

    /// Place `label` at the current position.
    ///
    /// If the current position is unreachable, the stack recorded by an
    /// earlier branch to the label becomes the current stack.
    pub fn mark(&mut self, label: Label) {
        let index = label.0 as usize;
        if self.reachable {
            self.label_stacks[index] = Some(self.stack.snapshot());
        } else if let Some(recorded) = &self.label_stacks[index] {
            self.stack.restore(recorded);
            self.reachable = true;
            self.current_line = None;
        }
        self.marked[index] = true;
        self.insns.push(Insn::Mark(label));
    }

    /// Place an exception handler entry; the stack holds just the exception.
    pub fn mark_handler(&mut self, label: Label, exception: &str) {
        let index = label.0 as usize;
        self.label_stacks[index] = Some(vec![VType::object(exception)]);
        self.targets.insert(label);
        self.reachable = false;
        self.mark(label);
    }

    /// Emit an unconditional branch.
    pub fn emit_goto(&mut self, target: Label) {
        if !self.reachable {
            return;
        }
        let index = target.0 as usize;
        if self.label_stacks[index].is_none() {
            self.label_stacks[index] = Some(self.stack.snapshot());
        }
        self.targets.insert(target);
        self.insns.push(Insn::Jump(Opcode::Goto, target));
        self.reachable = false;
    }

    /// Register an exception table entry. Entries added first take priority.
    pub fn add_try_catch(&mut self, start: Label, end: Label, handler: Label, catch_type: Option<&str>) {
        self.handlers.push(TryCatch {
            start,
            end,
            handler,
            catch_type: catch_type.map(str::to_string),
        });
    }

    // ==========================================================================
    // Finalization
    // ==========================================================================

    /// Finish the method, validating labels and control flow.
    pub fn finish(self) -> Result<MethodBody, EmitError> {
        if let Some(fault) = self.fault {
            return Err(fault);
        }
        if self.reachable {
            return Err(EmitError::FallsOffEnd);
        }
        let referenced = self
            .targets
            .iter()
            .copied()
            .chain(self.handlers.iter().flat_map(|h| [h.start, h.end]));
        for label in referenced {
            if !self.marked[label.0 as usize] {
                return Err(EmitError::UnmarkedLabel(label.0));
            }
        }

        let mut frames: Vec<(Label, Vec<VType>)> = self
            .targets
            .iter()
            .filter_map(|label| {
                self.label_stacks[label.0 as usize]
                    .clone()
                    .map(|stack| (*label, stack))
            })
            .collect();
        frames.sort_by_key(|(label, _)| *label);

        let local_slots: u16 = self.locals.iter().map(VType::slots).sum();
        Ok(MethodBody {
            insns: self.insns,
            handlers: self.handlers,
            frames,
            locals: self.entry_locals,
            max_stack: self.stack.max_slots(),
            max_locals: local_slots,
        })
    }

    fn pop(&mut self, op: Opcode) -> Option<VType> {
        let value = self.stack.pop();
        if value.is_none() {
            self.fail(EmitError::StackUnderflow(op.mnemonic()));
        }
        value
    }

    fn fail(&mut self, error: EmitError) {
        if self.fault.is_none() {
            self.fault = Some(error);
        }
    }
}
