//! Block literal compilation.
//!
//! Every block becomes a `private static synthetic` method of the unit's
//! class with the lambda signature `(PrimObject, PrimObject, PrimContext)
//! PrimObject`. Its parameters and temporaries live in the context passed
//! as the third argument, so the method's own locals never change.
//!
//! ## Bytecode Layout (creating method)
//!
//! ```text
//! aload 1                          ; receiver
//! invokedynamic apply()LambdaBlock ; LambdaMetafactory over the block method
//! invokevirtual smalltalkBlock     ; or smalltalkMethod, or
//!                                  ; ldc "marker" + smalltalkBlockAnswer
//! ```

use log::debug;
use skein_ast::ast::BlockExpr;
use skein_core::Result;

use super::{CodeGenerator, EmptyAnswer, RESERVED_METHOD_NAMES};
use crate::classfile::{MethodAccess, MethodInfo};
use crate::emit::VType;
use crate::keyword::block_method_name;
use crate::scope::SlotKind;

/// How the runtime wraps a compiled block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockRole {
    /// An ordinary block value.
    Value,
    /// The body of a method being installed; `^` returns from it directly.
    Method,
}

/// Decisions about a block made before its body is compiled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BlockDescriptor {
    /// Position among the unit's blocks, in creation order
    pub index: usize,
    /// Name of the lambda method
    pub method_name: String,
    /// Value or method
    pub role: BlockRole,
    /// Whether an answer in the block must return from the creating method
    pub requires_non_local_return: bool,
}

impl CodeGenerator<'_> {
    /// Compile a block literal, leaving the block object on the stack.
    pub(super) fn compile_block(&mut self, block: &BlockExpr<'_>, role: BlockRole) -> Result<()> {
        let descriptor = self.describe_block(block, role);
        debug!(
            "compiling block {} as {} ({:?}, {} parameters, non-local return: {})",
            descriptor.index,
            descriptor.method_name,
            descriptor.role,
            block.params.len(),
            descriptor.requires_non_local_return
        );

        let runtime = &self.config.runtime;
        let locals = vec![
            VType::object(runtime.object.clone()),
            VType::object(runtime.object.clone()),
            VType::object(runtime.context.clone()),
        ];
        let signature = runtime.block_lambda_desc();

        self.enter_method(locals);
        self.scopes.push();
        for param in block.params {
            self.scopes.declare(param.name, SlotKind::Argument, param.span)?;
        }
        self.compile_sequence(&block.body, EmptyAnswer::Nil)?;
        self.scopes.pop();
        let body = self.leave_method(block.span)?;

        self.lambdas.push(MethodInfo {
            access: MethodAccess::PRIVATE | MethodAccess::STATIC | MethodAccess::SYNTHETIC,
            name: descriptor.method_name.clone(),
            descriptor: signature,
            body,
        });

        self.emitter().set_line(block.span.line);
        self.push_receiver();
        self.push_block_lambda(&descriptor.method_name);
        let object = self.config.runtime.object_desc();
        match descriptor.role {
            BlockRole::Method => {
                self.invoke_object("smalltalkMethod", format!("(Ljava/lang/Object;){object}"));
            }
            BlockRole::Value if descriptor.requires_non_local_return => {
                let marker = self.synthesize_marker(&descriptor.method_name, block.span)?;
                self.emitter().emit_string(&marker.replace('/', "."));
                self.invoke_object(
                    "smalltalkBlockAnswer",
                    format!("(Ljava/lang/Object;Ljava/lang/String;){object}"),
                );
                self.attach_marker(marker, block.span)?;
            }
            BlockRole::Value => {
                self.invoke_object("smalltalkBlock", format!("(Ljava/lang/Object;){object}"));
            }
        }
        Ok(())
    }

    fn describe_block(&mut self, block: &BlockExpr<'_>, role: BlockRole) -> BlockDescriptor {
        let index = self.method_names.len() - RESERVED_METHOD_NAMES.len();
        BlockDescriptor {
            index,
            method_name: self.allocate_block_name(),
            role,
            requires_non_local_return: role == BlockRole::Value && block.body.answers(),
        }
    }

    /// Pick a method name no other member of the class uses.
    fn allocate_block_name(&mut self) -> String {
        let first_argument = self
            .keywords
            .last()
            .and_then(|record| record.first_argument())
            .map(str::to_string);
        let sequence = &mut self.block_sequence;
        let mut name = block_method_name(first_argument.as_deref(), || {
            let next = *sequence;
            *sequence += 1;
            next
        });
        while self.method_names.contains(&name) {
            name = format!("B{}", self.block_sequence);
            self.block_sequence += 1;
        }
        self.method_names.insert(name.clone());
        name
    }
}
