//! Class-file constant pool with deduplication.
//!
//! Entries are interned while methods are assembled; identical entries share
//! one index. Index 0 is never used, as the format requires.

use rustc_hash::FxHashMap;
use skein_core::{CompilationError, Result, Span};

/// A constant pool entry. Indices refer to other entries of the same pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PoolEntry {
    Utf8(String),
    Integer(i32),
    Class(u16),
    String(u16),
    Fieldref(u16, u16),
    Methodref(u16, u16),
    InterfaceMethodref(u16, u16),
    NameAndType(u16, u16),
    MethodHandle(u8, u16),
    MethodType(u16),
    InvokeDynamic(u16, u16),
}

impl PoolEntry {
    /// The entry's tag byte.
    pub fn tag(&self) -> u8 {
        match self {
            PoolEntry::Utf8(_) => 1,
            PoolEntry::Integer(_) => 3,
            PoolEntry::Class(_) => 7,
            PoolEntry::String(_) => 8,
            PoolEntry::Fieldref(..) => 9,
            PoolEntry::Methodref(..) => 10,
            PoolEntry::InterfaceMethodref(..) => 11,
            PoolEntry::NameAndType(..) => 12,
            PoolEntry::MethodHandle(..) => 15,
            PoolEntry::MethodType(_) => 16,
            PoolEntry::InvokeDynamic(..) => 18,
        }
    }
}

/// Constant pool of one class file.
#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    /// Entries in index order, starting at index 1.
    entries: Vec<PoolEntry>,
    /// Deduplication index.
    index: FxHashMap<PoolEntry, u16>,
}

impl ConstantPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or get an existing entry.
    pub fn add(&mut self, entry: PoolEntry) -> Result<u16> {
        if let Some(&idx) = self.index.get(&entry) {
            return Ok(idx);
        }
        let idx = u16::try_from(self.entries.len() + 1)
            .ok()
            .filter(|idx| *idx < u16::MAX)
            .ok_or_else(|| CompilationError::internal("constant pool overflow", Span::default()))?;
        self.entries.push(entry.clone());
        self.index.insert(entry, idx);
        Ok(idx)
    }

    pub fn utf8(&mut self, text: &str) -> Result<u16> {
        if modified_utf8_len(text) > u16::MAX as usize {
            return Err(CompilationError::internal(
                "string constant longer than 65535 bytes",
                Span::default(),
            ));
        }
        self.add(PoolEntry::Utf8(text.to_string()))
    }

    pub fn integer(&mut self, value: i32) -> Result<u16> {
        self.add(PoolEntry::Integer(value))
    }

    /// `CONSTANT_Class` for an internal name or array descriptor.
    pub fn class(&mut self, name: &str) -> Result<u16> {
        let name = self.utf8(name)?;
        self.add(PoolEntry::Class(name))
    }

    pub fn string(&mut self, value: &str) -> Result<u16> {
        let value = self.utf8(value)?;
        self.add(PoolEntry::String(value))
    }

    pub fn name_and_type(&mut self, name: &str, descriptor: &str) -> Result<u16> {
        let name = self.utf8(name)?;
        let descriptor = self.utf8(descriptor)?;
        self.add(PoolEntry::NameAndType(name, descriptor))
    }

    pub fn field_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<u16> {
        let owner = self.class(owner)?;
        let nat = self.name_and_type(name, descriptor)?;
        self.add(PoolEntry::Fieldref(owner, nat))
    }

    pub fn method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<u16> {
        let owner = self.class(owner)?;
        let nat = self.name_and_type(name, descriptor)?;
        self.add(PoolEntry::Methodref(owner, nat))
    }

    pub fn interface_method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<u16> {
        let owner = self.class(owner)?;
        let nat = self.name_and_type(name, descriptor)?;
        self.add(PoolEntry::InterfaceMethodref(owner, nat))
    }

    /// `CONSTANT_MethodHandle` of the given kind pointing at `reference`.
    pub fn method_handle(&mut self, kind: u8, reference: u16) -> Result<u16> {
        self.add(PoolEntry::MethodHandle(kind, reference))
    }

    pub fn method_type(&mut self, descriptor: &str) -> Result<u16> {
        let descriptor = self.utf8(descriptor)?;
        self.add(PoolEntry::MethodType(descriptor))
    }

    pub fn invoke_dynamic(&mut self, bootstrap: u16, name: &str, descriptor: &str) -> Result<u16> {
        let nat = self.name_and_type(name, descriptor)?;
        self.add(PoolEntry::InvokeDynamic(bootstrap, nat))
    }

    /// Value of `constant_pool_count`: one more than the last index.
    pub fn count(&self) -> u16 {
        (self.entries.len() + 1) as u16
    }

    /// Entry at a 1-based index.
    pub fn get(&self, index: u16) -> Option<&PoolEntry> {
        self.entries.get((index as usize).checked_sub(1)?)
    }

    /// Append the encoded entries (not the count) to `out`.
    pub fn write(&self, out: &mut Vec<u8>) {
        for entry in &self.entries {
            out.push(entry.tag());
            match entry {
                PoolEntry::Utf8(text) => {
                    let bytes = encode_modified_utf8(text);
                    out.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
                    out.extend_from_slice(&bytes);
                }
                PoolEntry::Integer(value) => out.extend_from_slice(&value.to_be_bytes()),
                PoolEntry::Class(idx) | PoolEntry::String(idx) | PoolEntry::MethodType(idx) => {
                    out.extend_from_slice(&idx.to_be_bytes())
                }
                PoolEntry::Fieldref(a, b)
                | PoolEntry::Methodref(a, b)
                | PoolEntry::InterfaceMethodref(a, b)
                | PoolEntry::NameAndType(a, b)
                | PoolEntry::InvokeDynamic(a, b) => {
                    out.extend_from_slice(&a.to_be_bytes());
                    out.extend_from_slice(&b.to_be_bytes());
                }
                PoolEntry::MethodHandle(kind, reference) => {
                    out.push(*kind);
                    out.extend_from_slice(&reference.to_be_bytes());
                }
            }
        }
    }
}

/// Encode text in the class-file variant of UTF-8: NUL takes two bytes and
/// supplementary characters are written as surrogate pairs.
pub fn encode_modified_utf8(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for unit in text.encode_utf16() {
        match unit {
            0x0001..=0x007F => out.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                out.push(0xC0 | (unit >> 6) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                out.push(0xE0 | (unit >> 12) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    out
}

fn modified_utf8_len(text: &str) -> usize {
    text.encode_utf16()
        .map(|unit| match unit {
            0x0001..=0x007F => 1,
            0x0000 | 0x0080..=0x07FF => 2,
            _ => 3,
        })
        .sum()
}
