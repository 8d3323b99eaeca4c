//! Compilation units and their output.
//!
//! [`Compiler::compile`] turns the tree of one [`SourceUnit`] into a
//! [`CompiledUnit`]: the primary class plus one marker class per block that
//! answers non-locally.
//!
//! ## Primary Class Layout
//!
//! ```text
//! public class <package>/<Name> extends PrimObject
//!     public <init>()V                         ; imports, context, runs the script
//!     protected packageName()String
//!     protected importFor(String)String        ; packages other than the default
//!     protected sendMessages(PrimObject, PrimContext)PrimObject
//!     private static synthetic <block>(PrimObject, PrimObject, PrimContext)PrimObject
//! ```

use log::debug;
use skein_ast::ast::Script;
use skein_core::{CompilationError, Result, Span};

use crate::classfile::opcode::Opcode;
use crate::classfile::{ClassFile, InnerClass, MethodAccess, MethodInfo};
use crate::config::CompilerConfig;
use crate::emit::{MemberRef, MethodEmitter, VType};
use crate::generator::CodeGenerator;
use crate::registry::ClassSink;

// ============================================================================
// SourceUnit
// ============================================================================

/// Identity of the class a script compiles to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceUnit {
    package: String,
    class_name: String,
}

impl SourceUnit {
    /// A unit named `class_name` in the dotted `package` (may be empty).
    pub fn new(package: impl Into<String>, class_name: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            class_name: class_name.into(),
        }
    }

    /// Dotted package name.
    pub fn package(&self) -> &str {
        &self.package
    }

    /// Simple class name.
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Dotted name, e.g. `st.app.Counter`.
    pub fn binary_name(&self) -> String {
        if self.package.is_empty() {
            self.class_name.clone()
        } else {
            format!("{}.{}", self.package, self.class_name)
        }
    }

    /// Slash-separated name, e.g. `st/app/Counter`.
    pub fn internal_name(&self) -> String {
        self.binary_name().replace('.', "/")
    }

    /// Dotted name of the marker class for the block method `block_name`.
    pub fn marker_binary_name(&self, block_name: &str) -> String {
        format!("{}$A{}", self.binary_name(), block_name)
    }

    /// Value of the `SourceFile` attribute.
    pub fn source_file(&self, extension: &str) -> String {
        format!("{}{}", self.class_name, extension)
    }
}

// ============================================================================
// Output
// ============================================================================

/// One generated class.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedClass {
    /// Dotted class name
    pub name: String,
    /// Symbolic form
    pub file: ClassFile,
    /// Encoded class file
    pub bytes: Vec<u8>,
}

impl GeneratedClass {
    /// Encode `file`.
    pub fn assemble(file: ClassFile) -> Result<Self> {
        let bytes = file.to_bytes()?;
        Ok(Self {
            name: file.name.replace('/', "."),
            file,
            bytes,
        })
    }
}

/// Everything produced for one unit.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledUnit {
    /// The unit's own class
    pub primary: GeneratedClass,
    /// Non-local return markers
    pub markers: Vec<GeneratedClass>,
}

impl CompiledUnit {
    /// All classes, markers first: the primary class refers to them in its
    /// exception tables.
    pub fn classes(&self) -> impl Iterator<Item = &GeneratedClass> {
        self.markers.iter().chain(std::iter::once(&self.primary))
    }

    /// Hand every class to `sink`, returning how many it accepted.
    pub fn define_in(&self, sink: &dyn ClassSink) -> usize {
        self.classes().filter(|class| sink.define(class)).count()
    }
}

// ============================================================================
// Compiler
// ============================================================================

/// Compiles units with a fixed configuration.
///
/// # Example
///
/// ```
/// use bumpalo::Bump;
/// use skein_ast::AstBuilder;
/// use skein_compiler::{Compiler, CompilerConfig, SourceUnit};
///
/// let arena = Bump::new();
/// let b = AstBuilder::new(&arena);
/// let script = b.script(&[], &[b.answer(b.number("42"))]);
///
/// let compiler = Compiler::new(CompilerConfig::default());
/// let unit = compiler.compile(&script, &SourceUnit::new("st.app", "Answer")).unwrap();
/// assert_eq!(unit.primary.name, "st.app.Answer");
/// assert!(unit.markers.is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    config: CompilerConfig,
}

impl Compiler {
    /// Create a compiler.
    pub fn new(config: CompilerConfig) -> Self {
        Self { config }
    }

    /// The configuration in use.
    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compile `script` as the class described by `unit`.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn compile(&self, script: &Script<'_>, unit: &SourceUnit) -> Result<CompiledUnit> {
        debug!("compiling {}", unit.binary_name());
        let (send_messages, members) = CodeGenerator::new(&self.config, unit).compile_script(script)?;

        let runtime = &self.config.runtime;
        let mut class = ClassFile::new(unit.internal_name(), runtime.object.clone());
        class.source_file = Some(unit.source_file(&self.config.source_extension));
        class.inner_classes.push(InnerClass::method_handles_lookup());
        class.add_method(self.constructor(unit)?);
        class.add_method(self.package_name_method(unit)?);
        if unit.package() != self.config.default_package {
            class.add_method(self.import_for_method()?);
        }
        class.add_method(send_messages);
        for lambda in members.lambdas {
            class.add_method(lambda);
        }

        let primary = GeneratedClass::assemble(class)?;
        let markers = members
            .markers
            .into_iter()
            .map(GeneratedClass::assemble)
            .collect::<Result<Vec<_>>>()?;
        debug!(
            "compiled {}: {} bytes, {} methods, {} markers",
            primary.name,
            primary.bytes.len(),
            primary.file.methods.len(),
            markers.len()
        );
        Ok(CompiledUnit { primary, markers })
    }

    fn emitter(&self, emitter: MethodEmitter) -> MethodEmitter {
        if self.config.emit_line_numbers {
            emitter
        } else {
            emitter.without_line_numbers()
        }
    }

    /// `<init>`: import the unit's package, create the context, run the script.
    fn constructor(&self, unit: &SourceUnit) -> Result<MethodInfo> {
        let runtime = &self.config.runtime;
        let this = unit.internal_name();
        let object = runtime.object_desc();
        let mut e = self.emitter(MethodEmitter::constructor(this.clone(), Vec::new()));

        e.set_line(0);
        e.emit_load(0);
        e.emit_invoke(Opcode::Invokespecial, MemberRef::new(runtime.object.clone(), "<init>", "()V"));

        e.emit_load(0);
        e.emit_load(0);
        e.emit_invoke(
            Opcode::Invokevirtual,
            MemberRef::new(runtime.object.clone(), "packageName", "()Ljava/lang/String;"),
        );
        e.emit_invoke(
            Opcode::Invokevirtual,
            MemberRef::new(runtime.object.clone(), "importAll", "(Ljava/lang/String;)V"),
        );

        e.emit_new(&runtime.context);
        e.emit(Opcode::Dup);
        e.emit_load(0);
        e.emit_invoke(
            Opcode::Invokespecial,
            MemberRef::new(runtime.context.clone(), "<init>", format!("({object})V")),
        );
        e.emit_store(1);

        e.emit_load(0);
        e.emit_load(0);
        e.emit_invoke(
            Opcode::Invokevirtual,
            MemberRef::new(this.clone(), "selfClass", format!("({object})V")),
        );

        e.emit_load(0);
        e.emit_load(0);
        e.emit_load(1);
        e.emit_invoke(
            Opcode::Invokevirtual,
            MemberRef::new(
                this,
                "sendMessages",
                format!("({object}{}){object}", runtime.context_desc()),
            ),
        );
        e.emit(Opcode::Pop);
        e.emit(Opcode::Return);

        Ok(MethodInfo {
            access: MethodAccess::PUBLIC,
            name: "<init>".to_string(),
            descriptor: "()V".to_string(),
            body: finish(e)?,
        })
    }

    fn package_name_method(&self, unit: &SourceUnit) -> Result<MethodInfo> {
        let this = VType::object(unit.internal_name());
        let mut e = self.emitter(MethodEmitter::new(vec![this]));
        e.emit_string(unit.package());
        e.emit(Opcode::Areturn);
        Ok(MethodInfo {
            access: MethodAccess::PROTECTED,
            name: "packageName".to_string(),
            descriptor: "()Ljava/lang/String;".to_string(),
            body: finish(e)?,
        })
    }

    /// `importFor(name)`: resolve through the class loader relative to this
    /// unit's package.
    fn import_for_method(&self) -> Result<MethodInfo> {
        let runtime = &self.config.runtime;
        let locals = vec![
            VType::object(runtime.object.clone()),
            VType::object("java/lang/String"),
        ];
        let mut e = self.emitter(MethodEmitter::new(locals));
        e.emit_load(0);
        e.emit_invoke(
            Opcode::Invokevirtual,
            MemberRef::new(
                runtime.object.clone(),
                "classLoader",
                format!("()L{};", runtime.class_loader),
            ),
        );
        e.emit_load(1);
        e.emit_load(0);
        e.emit_invoke(
            Opcode::Invokevirtual,
            MemberRef::new(runtime.object.clone(), "packageName", "()Ljava/lang/String;"),
        );
        e.emit_invoke(
            Opcode::Invokevirtual,
            MemberRef::new(
                runtime.class_loader.clone(),
                "importForBy",
                "(Ljava/lang/String;Ljava/lang/String;)Ljava/lang/String;",
            ),
        );
        e.emit(Opcode::Areturn);
        Ok(MethodInfo {
            access: MethodAccess::PROTECTED,
            name: "importFor".to_string(),
            descriptor: "(Ljava/lang/String;)Ljava/lang/String;".to_string(),
            body: finish(e)?,
        })
    }
}

fn finish(emitter: MethodEmitter) -> Result<crate::emit::MethodBody> {
    emitter
        .finish()
        .map_err(|err| CompilationError::internal(err.to_string(), Span::default()))
}

/// Compile `script` as `unit` with `config`.
pub fn compile(script: &Script<'_>, unit: &SourceUnit, config: &CompilerConfig) -> Result<CompiledUnit> {
    Compiler::new(config.clone()).compile(script, unit)
}
