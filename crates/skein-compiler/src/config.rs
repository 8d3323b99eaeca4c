//! Compiler configuration.
//!
//! [`CompilerConfig`] collects everything that is fixed per compiler instance
//! rather than per unit: names of the runtime classes the generated code calls
//! into, the reserved escape identifier, and debug-info switches.

/// Internal names (slash-separated) of the runtime classes generated code uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeNames {
    /// Base class of every Smalltalk object and generated class.
    pub object: String,
    /// Activation context holding temporaries and arguments.
    pub context: String,
    /// Throwable base class of non-local return markers.
    pub block_answer: String,
    /// Functional interface implemented by block lambdas.
    pub lambda_block: String,
    /// Class loader type returned by `classLoader()`.
    pub class_loader: String,
}

impl Default for RuntimeNames {
    fn default() -> Self {
        Self {
            object: "st/core/PrimObject".to_string(),
            context: "st/core/PrimContext".to_string(),
            block_answer: "st/core/PrimBlockAnswer".to_string(),
            lambda_block: "st/core/LambdaBlock".to_string(),
            class_loader: "st/classloader/SmalltalkClassLoader".to_string(),
        }
    }
}

impl RuntimeNames {
    /// `L<object>;`
    pub fn object_desc(&self) -> String {
        format!("L{};", self.object)
    }

    /// `L<context>;`
    pub fn context_desc(&self) -> String {
        format!("L{};", self.context)
    }

    /// Descriptor shared by block lambdas: `(receiver-ish, receiver, context) -> object`.
    pub fn block_lambda_desc(&self) -> String {
        let object = self.object_desc();
        format!("({object}{object}{}){object}", self.context_desc())
    }

    /// Descriptor of `perform` and `superPerform` with `arity` arguments.
    pub fn perform_desc(&self, arity: usize) -> String {
        let object = self.object_desc();
        format!("({}Ljava/lang/String;){object}", object.repeat(arity))
    }
}

/// Settings for a compiler instance.
#[derive(Debug, Clone)]
pub struct CompilerConfig {
    /// Package whose classes every unit imports; units in it get no `importFor`.
    pub default_package: String,
    /// Identifier that switches a keyword send into raw-instruction mode.
    pub escape_identifier: String,
    /// Keyword part whose block argument compiles as a method rather than a block.
    pub method_keyword: String,
    /// Appended to the class name for the `SourceFile` attribute.
    pub source_extension: String,
    /// Whether to emit `LineNumberTable` attributes.
    pub emit_line_numbers: bool,
    /// Runtime class names.
    pub runtime: RuntimeNames,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            default_package: "st.kernel".to_string(),
            escape_identifier: "JVM".to_string(),
            method_keyword: "withMethod:".to_string(),
            source_extension: ".st".to_string(),
            emit_line_numbers: true,
            runtime: RuntimeNames::default(),
        }
    }
}

impl CompilerConfig {
    /// Default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different default package.
    pub fn with_default_package(mut self, package: impl Into<String>) -> Self {
        self.default_package = package.into();
        self
    }

    /// Use a different escape identifier.
    pub fn with_escape_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.escape_identifier = identifier.into();
        self
    }

    /// Use a different as-method keyword.
    pub fn with_method_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.method_keyword = keyword.into();
        self
    }

    /// Use different runtime class names.
    pub fn with_runtime(mut self, runtime: RuntimeNames) -> Self {
        self.runtime = runtime;
        self
    }

    /// Omit line number tables.
    pub fn without_line_numbers(mut self) -> Self {
        self.emit_line_numbers = false;
        self
    }
}
