//! Structural class-file reader.
//!
//! Parses enough of a class file to inspect what the generator produced:
//! names, methods, code arrays, exception tables and attribute names. It does
//! not verify bytecode.

use thiserror::Error;

use super::opcode::Opcode;
use super::{ClassAccess, MethodAccess};

/// Errors from [`ClassSummary::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassFormatError {
    /// Input ended early.
    #[error("class file truncated at byte {0}")]
    Truncated(usize),

    /// The magic number is wrong.
    #[error("bad magic number {0:#010x}")]
    BadMagic(u32),

    /// A constant pool tag is not known.
    #[error("unknown constant pool tag {tag} at index {index}")]
    UnknownTag { tag: u8, index: u16 },

    /// An index points at the wrong kind of constant.
    #[error("constant pool index {0} is invalid here")]
    BadConstant(u16),

    /// A code array contains an opcode outside the supported set.
    #[error("unsupported opcode {opcode} at offset {offset}")]
    UnknownOpcode { opcode: u8, offset: usize },
}

type Result<T> = std::result::Result<T, ClassFormatError>;

/// Summary of a parsed class file.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassSummary {
    /// Major version
    pub major_version: u16,
    /// Access flags
    pub access: ClassAccess,
    /// Internal class name
    pub name: String,
    /// Internal superclass name
    pub super_name: String,
    /// Methods in file order
    pub methods: Vec<MethodSummary>,
    /// Class attribute names
    pub attributes: Vec<String>,
    /// `SourceFile` value
    pub source_file: Option<String>,
    /// Number of `BootstrapMethods` entries
    pub bootstrap_methods: usize,
    /// Values of all `CONSTANT_String` entries
    pub strings: Vec<String>,
}

/// One method of a [`ClassSummary`].
#[derive(Debug, Clone, PartialEq)]
pub struct MethodSummary {
    /// Access flags
    pub access: MethodAccess,
    /// Name
    pub name: String,
    /// Descriptor
    pub descriptor: String,
    /// `Code` attribute, absent for abstract methods
    pub code: Option<CodeSummary>,
}

/// Contents of a `Code` attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeSummary {
    /// Declared operand stack size
    pub max_stack: u16,
    /// Declared local slots
    pub max_locals: u16,
    /// Raw bytecode
    pub code: Vec<u8>,
    /// Exception table
    pub exception_table: Vec<ExceptionEntry>,
    /// Nested attribute names
    pub attributes: Vec<String>,
    /// `LineNumberTable` entries as (start pc, line)
    pub line_numbers: Vec<(u16, u16)>,
    /// Number of `StackMapTable` frames
    pub stack_map_frames: u16,
}

/// An exception table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionEntry {
    pub start: u16,
    pub end: u16,
    pub handler: u16,
    /// Caught class, `None` for catch-all
    pub catch_type: Option<String>,
}

impl ClassSummary {
    /// Parse class-file bytes.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut input = Input { bytes, pos: 0 };
        let magic = input.u32()?;
        if magic != 0xCAFE_BABE {
            return Err(ClassFormatError::BadMagic(magic));
        }
        let _minor = input.u16()?;
        let major_version = input.u16()?;
        let pool = Pool::parse(&mut input)?;

        let access = ClassAccess::from_bits_retain(input.u16()?);
        let name = pool.class_name(input.u16()?)?;
        let super_name = pool.class_name(input.u16()?)?;
        let interfaces = input.u16()?;
        input.skip(interfaces as usize * 2)?;
        let fields = input.u16()?;
        for _ in 0..fields {
            input.skip(6)?;
            skip_attributes(&mut input)?;
        }

        let method_count = input.u16()?;
        let mut methods = Vec::with_capacity(method_count as usize);
        for _ in 0..method_count {
            methods.push(parse_method(&mut input, &pool)?);
        }

        let mut attributes = Vec::new();
        let mut source_file = None;
        let mut bootstrap_methods = 0;
        for _ in 0..input.u16()? {
            let attr_name = pool.utf8(input.u16()?)?;
            let len = input.u32()? as usize;
            let body = input.take(len)?;
            match attr_name.as_str() {
                "SourceFile" if body.len() >= 2 => {
                    source_file = Some(pool.utf8(u16::from_be_bytes([body[0], body[1]]))?);
                }
                "BootstrapMethods" if body.len() >= 2 => {
                    bootstrap_methods = u16::from_be_bytes([body[0], body[1]]) as usize;
                }
                _ => {}
            }
            attributes.push(attr_name);
        }

        Ok(Self {
            major_version,
            access,
            name,
            super_name,
            methods,
            attributes,
            source_file,
            bootstrap_methods,
            strings: pool.strings(),
        })
    }

    /// Find a method by name.
    pub fn method(&self, name: &str) -> Option<&MethodSummary> {
        self.methods.iter().find(|m| m.name == name)
    }
}

impl CodeSummary {
    /// Decode the opcodes of the code array, skipping operands.
    pub fn opcodes(&self) -> Result<Vec<Opcode>> {
        let mut ops = Vec::new();
        let mut pc = 0;
        while pc < self.code.len() {
            let byte = self.code[pc];
            let op = Opcode::try_from(byte).map_err(|_| ClassFormatError::UnknownOpcode {
                opcode: byte,
                offset: pc,
            })?;
            pc += 1;
            if op == Opcode::Wide {
                let inner = *self.code.get(pc).ok_or(ClassFormatError::Truncated(pc))?;
                let inner = Opcode::try_from(inner).map_err(|_| ClassFormatError::UnknownOpcode {
                    opcode: inner,
                    offset: pc,
                })?;
                ops.push(inner);
                pc += 3;
                continue;
            }
            pc += op.operand_len();
            ops.push(op);
        }
        Ok(ops)
    }
}

fn parse_method(input: &mut Input<'_>, pool: &Pool) -> Result<MethodSummary> {
    let access = MethodAccess::from_bits_retain(input.u16()?);
    let name = pool.utf8(input.u16()?)?;
    let descriptor = pool.utf8(input.u16()?)?;
    let mut code = None;
    for _ in 0..input.u16()? {
        let attr_name = pool.utf8(input.u16()?)?;
        let len = input.u32()? as usize;
        let body = input.take(len)?;
        if attr_name == "Code" {
            code = Some(parse_code(body, pool)?);
        }
    }
    Ok(MethodSummary {
        access,
        name,
        descriptor,
        code,
    })
}

fn parse_code(body: &[u8], pool: &Pool) -> Result<CodeSummary> {
    let mut input = Input { bytes: body, pos: 0 };
    let max_stack = input.u16()?;
    let max_locals = input.u16()?;
    let code_len = input.u32()? as usize;
    let code = input.take(code_len)?.to_vec();

    let mut exception_table = Vec::new();
    for _ in 0..input.u16()? {
        let start = input.u16()?;
        let end = input.u16()?;
        let handler = input.u16()?;
        let catch_type = match input.u16()? {
            0 => None,
            idx => Some(pool.class_name(idx)?),
        };
        exception_table.push(ExceptionEntry {
            start,
            end,
            handler,
            catch_type,
        });
    }

    let mut attributes = Vec::new();
    let mut line_numbers = Vec::new();
    let mut stack_map_frames = 0;
    for _ in 0..input.u16()? {
        let attr_name = pool.utf8(input.u16()?)?;
        let len = input.u32()? as usize;
        let mut attr = Input {
            bytes: input.take(len)?,
            pos: 0,
        };
        match attr_name.as_str() {
            "LineNumberTable" => {
                for _ in 0..attr.u16()? {
                    line_numbers.push((attr.u16()?, attr.u16()?));
                }
            }
            "StackMapTable" => stack_map_frames = attr.u16()?,
            _ => {}
        }
        attributes.push(attr_name);
    }

    Ok(CodeSummary {
        max_stack,
        max_locals,
        code,
        exception_table,
        attributes,
        line_numbers,
        stack_map_frames,
    })
}

fn skip_attributes(input: &mut Input<'_>) -> Result<()> {
    for _ in 0..input.u16()? {
        input.skip(2)?;
        let len = input.u32()? as usize;
        input.skip(len)?;
    }
    Ok(())
}

struct Input<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Input<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(ClassFormatError::Truncated(self.pos))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn skip(&mut self, len: usize) -> Result<()> {
        self.take(len).map(|_| ())
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }
}

/// Parsed constants that matter for inspection.
enum Constant {
    Utf8(String),
    Class(u16),
    String(u16),
    Other,
    /// Second slot of a long or double.
    Unusable,
}

struct Pool {
    entries: Vec<Constant>,
}

impl Pool {
    fn parse(input: &mut Input<'_>) -> Result<Self> {
        let count = input.u16()?;
        let mut entries = vec![Constant::Unusable];
        let mut index = 1;
        while index < count {
            let tag = input.u8()?;
            let entry = match tag {
                1 => {
                    let len = input.u16()? as usize;
                    Constant::Utf8(decode_modified_utf8(input.take(len)?))
                }
                7 => Constant::Class(input.u16()?),
                8 => Constant::String(input.u16()?),
                3 | 4 => {
                    input.skip(4)?;
                    Constant::Other
                }
                5 | 6 => {
                    input.skip(8)?;
                    entries.push(Constant::Other);
                    index += 1;
                    Constant::Unusable
                }
                9 | 10 | 11 | 12 | 17 | 18 => {
                    input.skip(4)?;
                    Constant::Other
                }
                15 => {
                    input.skip(3)?;
                    Constant::Other
                }
                16 | 19 | 20 => {
                    input.skip(2)?;
                    Constant::Other
                }
                _ => return Err(ClassFormatError::UnknownTag { tag, index }),
            };
            entries.push(entry);
            index += 1;
        }
        Ok(Self { entries })
    }

    fn utf8(&self, index: u16) -> Result<String> {
        match self.entries.get(index as usize) {
            Some(Constant::Utf8(text)) => Ok(text.clone()),
            _ => Err(ClassFormatError::BadConstant(index)),
        }
    }

    fn class_name(&self, index: u16) -> Result<String> {
        match self.entries.get(index as usize) {
            Some(Constant::Class(name)) => self.utf8(*name),
            _ => Err(ClassFormatError::BadConstant(index)),
        }
    }

    fn strings(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter_map(|entry| match entry {
                Constant::String(idx) => self.utf8(*idx).ok(),
                _ => None,
            })
            .collect()
    }
}

fn decode_modified_utf8(bytes: &[u8]) -> String {
    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i] as u16;
        if b & 0x80 == 0 {
            units.push(b);
            i += 1;
        } else if b & 0xE0 == 0xC0 && i + 1 < bytes.len() {
            units.push(((b & 0x1F) << 6) | (bytes[i + 1] as u16 & 0x3F));
            i += 2;
        } else if i + 2 < bytes.len() {
            units.push(((b & 0x0F) << 12) | ((bytes[i + 1] as u16 & 0x3F) << 6) | (bytes[i + 2] as u16 & 0x3F));
            i += 3;
        } else {
            units.push(0xFFFD);
            i += 1;
        }
    }
    String::from_utf16_lossy(&units)
}
