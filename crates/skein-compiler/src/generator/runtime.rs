//! Calls into the object runtime.
//!
//! Generated code never touches Smalltalk state directly. Every variable
//! access, literal, block and send goes through a method of the runtime's
//! object or context class; the helpers here emit those calls.

use log::trace;
use skein_core::{CompilationError, Result, Span};

use super::{CodeGenerator, Receiver};
use crate::classfile::opcode::Opcode;
use crate::emit::{BootstrapArg, CallSite, HandleKind, MemberRef, MethodHandle};

/// Most arguments a send can pass to `perform`.
pub const MAX_ARITY: usize = 5;

/// Local holding the receiver in `sendMessages` and block lambdas.
const RECEIVER_SLOT: u16 = 1;

/// Local holding the activation context.
const CONTEXT_SLOT: u16 = 2;

const LAMBDA_METAFACTORY: &str = "java/lang/invoke/LambdaMetafactory";

const METAFACTORY_DESC: &str = "(Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;\
Ljava/lang/invoke/MethodType;Ljava/lang/invoke/MethodType;Ljava/lang/invoke/MethodHandle;\
Ljava/lang/invoke/MethodType;)Ljava/lang/invoke/CallSite;";

impl CodeGenerator<'_> {
    pub(super) fn push_receiver(&mut self) {
        self.emitter().emit_load(RECEIVER_SLOT);
    }

    pub(super) fn push_context(&mut self) {
        self.emitter().emit_load(CONTEXT_SLOT);
    }

    /// `receiver.<name>()`, used for `nil`, `true` and `false`.
    pub(super) fn push_pseudo(&mut self, name: &str) {
        self.push_receiver();
        let descriptor = format!("(){}", self.config.runtime.object_desc());
        self.invoke_object(name, descriptor);
    }

    /// `receiver.reference(name)`
    pub(super) fn push_global(&mut self, name: &str) {
        self.push_receiver();
        self.emitter().emit_string(name);
        let descriptor = format!("(Ljava/lang/String;){}", self.config.runtime.object_desc());
        self.invoke_object("reference", descriptor);
    }

    /// `receiver.<factory>(text)`
    pub(super) fn push_literal(&mut self, factory: &str, text: &str) {
        self.push_receiver();
        self.emitter().emit_string(text);
        let descriptor = format!("(Ljava/lang/Object;){}", self.config.runtime.object_desc());
        self.invoke_object(factory, descriptor);
    }

    pub(super) fn push_temporary(&mut self, slot: u16) {
        self.push_context();
        self.emitter().emit_int(i32::from(slot));
        let descriptor = format!("(I){}", self.config.runtime.object_desc());
        self.invoke_context("temporaryAt", descriptor);
    }

    pub(super) fn push_argument(&mut self, slot: u16) {
        self.push_context();
        self.emitter().emit_int(i32::from(slot));
        let descriptor = format!("(I){}", self.config.runtime.object_desc());
        self.invoke_context("argumentAt", descriptor);
    }

    /// Store the value on top of the stack into a temporary, consuming it.
    pub(super) fn store_temporary(&mut self, slot: u16) {
        let runtime = &self.config.runtime;
        let method = MemberRef::new(
            runtime.context.clone(),
            "temporaryPutAt",
            format!("({}I{})V", runtime.object_desc(), runtime.context_desc()),
        );
        self.emitter().emit_int(i32::from(slot));
        self.push_context();
        self.emitter().emit_invoke(Opcode::Invokestatic, method);
    }

    pub(super) fn init_temporaries(&mut self, count: u16) {
        self.push_context();
        self.emitter().emit_int(i32::from(count));
        self.invoke_context("initTemporaries", "(I)V".to_string());
    }

    /// Push a `LambdaBlock` for the block method `method_name`.
    pub(super) fn push_block_lambda(&mut self, method_name: &str) {
        let runtime = &self.config.runtime;
        let signature = runtime.block_lambda_desc();
        let site = CallSite {
            name: "apply".to_string(),
            descriptor: format!("()L{};", runtime.lambda_block),
            bootstrap: MethodHandle {
                kind: HandleKind::InvokeStatic,
                member: MemberRef::new(LAMBDA_METAFACTORY, "metafactory", METAFACTORY_DESC),
            },
            arguments: vec![
                BootstrapArg::MethodType(signature.clone()),
                BootstrapArg::Handle(MethodHandle {
                    kind: HandleKind::InvokeStatic,
                    member: MemberRef::new(self.unit.internal_name(), method_name, signature.clone()),
                }),
                BootstrapArg::MethodType(signature),
            ],
        };
        self.emitter().emit_invoke_dynamic(site);
    }

    /// `invokevirtual` on the runtime object class.
    pub(super) fn invoke_object(&mut self, name: &str, descriptor: String) {
        let method = MemberRef::new(self.config.runtime.object.clone(), name, descriptor);
        self.emitter().emit_invoke(Opcode::Invokevirtual, method);
    }

    fn invoke_context(&mut self, name: &str, descriptor: String) {
        let method = MemberRef::new(self.config.runtime.context.clone(), name, descriptor);
        self.emitter().emit_invoke(Opcode::Invokevirtual, method);
    }

    /// Fail for sends with more arguments than `perform` accepts.
    pub(super) fn check_arity(&self, selector: &str, arity: usize, span: Span) -> Result<()> {
        if arity > MAX_ARITY {
            return Err(CompilationError::UnsupportedArity {
                selector: selector.to_string(),
                arity,
                max: MAX_ARITY,
                span,
            });
        }
        Ok(())
    }

    /// Send `selector` to the receiver under `arity` arguments on the stack.
    pub(super) fn dispatch(&mut self, selector: &str, arity: usize, receiver: Receiver, span: Span) -> Result<()> {
        self.check_arity(selector, arity, span)?;
        let name = match receiver {
            Receiver::Super => "superPerform",
            _ => "perform",
        };
        trace!("{name} #{selector} ({arity} arguments) at {span}");
        let descriptor = self.config.runtime.perform_desc(arity);
        self.emitter().set_line(span.line);
        self.emitter().emit_string(selector);
        self.invoke_object(name, descriptor);
        Ok(())
    }
}
