//! Class file model, writer and reader.
//!
//! A [`ClassFile`] is the symbolic form of one generated class: its methods
//! hold [`MethodBody`] instruction streams. [`ClassFile::to_bytes`] interns
//! every constant, assembles the code and encodes the result as a version
//! 52.0 class file.
//!
//! ## Modules
//!
//! - [`constant_pool`]: pool entries and deduplication
//! - [`descriptor`]: field and method descriptor parsing
//! - [`opcode`]: opcode values
//! - [`reader`]: structural parser used to inspect generated output

pub mod constant_pool;
pub mod descriptor;
pub mod opcode;
pub mod reader;
mod writer;

use bitflags::bitflags;
use skein_core::Result;

use crate::emit::MethodBody;

/// Major version written to every class file (Java 8).
pub const CLASS_MAJOR_VERSION: u16 = 52;

bitflags! {
    /// Access flags of a class or inner class entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClassAccess: u16 {
        const PUBLIC = 0x0001;
        /// Only meaningful in `InnerClasses` entries.
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        /// Use modern `invokespecial` semantics; always set on classes.
        const SUPER = 0x0020;
        const ABSTRACT = 0x0400;
        const SYNTHETIC = 0x1000;
    }
}

bitflags! {
    /// Access flags of a method.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MethodAccess: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const SYNTHETIC = 0x1000;
    }
}

/// A method with its code.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodInfo {
    /// Access flags
    pub access: MethodAccess,
    /// Method name
    pub name: String,
    /// Method descriptor
    pub descriptor: String,
    /// Instructions and metadata
    pub body: MethodBody,
}

/// An `InnerClasses` attribute entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InnerClass {
    /// Internal name of the inner class.
    pub inner: String,
    /// Internal name of the enclosing class.
    pub outer: String,
    /// Simple name.
    pub name: String,
    /// Declared access flags.
    pub access: ClassAccess,
}

impl InnerClass {
    /// `java/lang/invoke/MethodHandles$Lookup`, required by classes whose
    /// code uses `invokedynamic`.
    pub fn method_handles_lookup() -> Self {
        Self {
            inner: "java/lang/invoke/MethodHandles$Lookup".to_string(),
            outer: "java/lang/invoke/MethodHandles".to_string(),
            name: "Lookup".to_string(),
            access: ClassAccess::PUBLIC | ClassAccess::STATIC | ClassAccess::FINAL,
        }
    }
}

/// Symbolic class file.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassFile {
    /// Access flags
    pub access: ClassAccess,
    /// Internal name
    pub name: String,
    /// Internal name of the superclass
    pub super_name: String,
    /// `SourceFile` attribute
    pub source_file: Option<String>,
    /// Methods in declaration order
    pub methods: Vec<MethodInfo>,
    /// `InnerClasses` attribute entries
    pub inner_classes: Vec<InnerClass>,
}

impl ClassFile {
    /// A public class extending `super_name` with no members.
    pub fn new(name: impl Into<String>, super_name: impl Into<String>) -> Self {
        Self {
            access: ClassAccess::PUBLIC | ClassAccess::SUPER,
            name: name.into(),
            super_name: super_name.into(),
            source_file: None,
            methods: Vec::new(),
            inner_classes: Vec::new(),
        }
    }

    /// Add a method.
    pub fn add_method(&mut self, method: MethodInfo) {
        self.methods.push(method);
    }

    /// Find a method by name.
    pub fn method(&self, name: &str) -> Option<&MethodInfo> {
        self.methods.iter().find(|m| m.name == name)
    }

    /// Encode as class-file bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        writer::write_class(self)
    }
}
