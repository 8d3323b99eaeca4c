//! Verification types and operand stack simulation.
//!
//! The emitter tracks the type of every operand stack entry so it can compute
//! `max_stack` and record the stack at each branch target. The class writer
//! turns those snapshots into `StackMapTable` frames.

use crate::classfile::descriptor::FieldType;

/// A verification type as used by `StackMapTable` frames.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VType {
    /// Unusable slot
    Top,
    /// `int` and the narrower integral types
    Integer,
    /// `float`
    Float,
    /// `long` (two slots)
    Long,
    /// `double` (two slots)
    Double,
    /// `null`
    Null,
    /// `this` inside a constructor before the super constructor ran
    UninitializedThis,
    /// Reference to the named class (internal name or array descriptor)
    Object(String),
    /// Result of the `new` at the given instruction index, not yet constructed
    Uninitialized(usize),
}

impl VType {
    /// Reference type of the given internal class name.
    pub fn object(name: impl Into<String>) -> Self {
        VType::Object(name.into())
    }

    /// Number of stack or local slots the type occupies.
    pub fn slots(&self) -> u16 {
        match self {
            VType::Long | VType::Double => 2,
            _ => 1,
        }
    }

    /// Whether the type needs `pop2` rather than `pop`.
    pub fn is_wide(&self) -> bool {
        self.slots() == 2
    }
}

impl From<&FieldType> for VType {
    fn from(field: &FieldType) -> Self {
        match field {
            FieldType::Integer => VType::Integer,
            FieldType::Float => VType::Float,
            FieldType::Long => VType::Long,
            FieldType::Double => VType::Double,
            FieldType::Reference(name) => VType::Object(name.clone()),
        }
    }
}

/// Simulated operand stack of one method.
#[derive(Debug, Clone, Default)]
pub(crate) struct OperandStack {
    entries: Vec<VType>,
    slots: u16,
    max_slots: u16,
}

impl OperandStack {
    pub fn push(&mut self, ty: VType) {
        self.slots += ty.slots();
        self.max_slots = self.max_slots.max(self.slots);
        self.entries.push(ty);
    }

    /// Pop the top entry, `None` on underflow.
    pub fn pop(&mut self) -> Option<VType> {
        let ty = self.entries.pop()?;
        self.slots -= ty.slots();
        Some(ty)
    }

    pub fn peek(&self) -> Option<&VType> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn max_slots(&self) -> u16 {
        self.max_slots
    }

    pub fn snapshot(&self) -> Vec<VType> {
        self.entries.clone()
    }

    /// Replace the contents with a recorded snapshot, keeping the maximum.
    pub fn restore(&mut self, entries: &[VType]) {
        self.entries = entries.to_vec();
        self.slots = entries.iter().map(VType::slots).sum();
        self.max_slots = self.max_slots.max(self.slots);
    }

    /// Replace every occurrence of `from` with `to` (constructor completion).
    pub fn replace(&mut self, from: &VType, to: &VType) {
        for entry in self.entries.iter_mut().filter(|entry| *entry == from) {
            *entry = to.clone();
        }
    }
}
