//! Raw-instruction escape directives.
//!
//! A keyword message sent to the escape identifier (`JVM` by default) emits
//! instructions directly instead of a send:
//!
//! | Directive                                   | Emits                                   |
//! |---------------------------------------------|-----------------------------------------|
//! | `argLoad: n`                                | `context.argumentAt(n)`                 |
//! | `aload: n`                                  | `aload n`                               |
//! | `invokeVirtual: owner method: m matching: d`| `invokevirtual owner.m d`               |
//! | `invokeStatic: owner method: m matching: d` | `invokestatic owner.m d`                |
//! | `getStatic: owner named: f as: d`           | `getstatic owner.f d`                   |
//! | `primitive: n`                              | `receiver.primitive<n>(context)`        |
//!
//! Arguments must be string or number literals. Directives only move object
//! references: the operand stack of a compiled method never holds primitives,
//! so descriptors with primitive parameters, results or field types are
//! refused.

use log::trace;
use skein_ast::ast::{Expr, KeywordMessage, KeywordPart, LiteralExpr, LiteralKind};
use skein_core::{CompilationError, Result, Span};

use super::CodeGenerator;
use crate::classfile::descriptor::{FieldType, MethodDescriptor, parse_field};
use crate::classfile::opcode::Opcode;
use crate::emit::MemberRef;

const DIRECTIVES: &[&str] = &[
    "argLoad:",
    "aload:",
    "invokeVirtual:method:matching:",
    "invokeStatic:method:matching:",
    "getStatic:named:as:",
    "primitive:",
];

impl CodeGenerator<'_> {
    /// Compile a keyword message sent to the escape identifier.
    pub(super) fn compile_escape(&mut self, message: &KeywordMessage<'_>) -> Result<()> {
        let directive = message.selector();
        let span = message.span;
        if !DIRECTIVES.contains(&directive.as_str()) {
            return Err(CompilationError::escape(directive, "unknown directive", span));
        }
        let args = message
            .parts
            .iter()
            .map(|part| escape_argument(&directive, part))
            .collect::<Result<Vec<&str>>>()?;
        trace!("escape {directive} {args:?} at {span}");

        self.emitter().set_line(span.line);
        match (directive.as_str(), args.as_slice()) {
            ("argLoad:", &[index]) => {
                let index = parse_number(&directive, index, span)?;
                self.push_argument(index);
                Ok(())
            }
            ("aload:", &[slot]) => {
                let slot = parse_number(&directive, slot, span)?;
                if usize::from(slot) >= self.emitter().entry_local_count() {
                    return Err(CompilationError::escape(
                        directive.as_str(),
                        format!("local {slot} is not a parameter of this method"),
                        span,
                    ));
                }
                self.emitter().emit_load(slot);
                Ok(())
            }
            ("invokeVirtual:method:matching:", &[owner, name, descriptor]) => {
                self.escape_invoke(Opcode::Invokevirtual, &directive, MemberRef::new(owner, name, descriptor), span)
            }
            ("invokeStatic:method:matching:", &[owner, name, descriptor]) => {
                self.escape_invoke(Opcode::Invokestatic, &directive, MemberRef::new(owner, name, descriptor), span)
            }
            ("getStatic:named:as:", &[owner, name, descriptor]) => {
                let field = parse_field(descriptor)
                    .map_err(|err| CompilationError::escape(directive.clone(), err.to_string(), span))?;
                if !matches!(field, FieldType::Reference(_)) {
                    return Err(CompilationError::escape(
                        directive.as_str(),
                        format!("{owner}.{name} has primitive type {descriptor}"),
                        span,
                    ));
                }
                self.emitter().emit_get_static(MemberRef::new(owner, name, descriptor));
                Ok(())
            }
            ("primitive:", &[number]) => {
                let number = parse_number(&directive, number, span)?;
                self.push_receiver();
                self.push_context();
                let runtime = &self.config.runtime;
                let descriptor = format!("({}){}", runtime.context_desc(), runtime.object_desc());
                self.invoke_object(&format!("primitive{number}"), descriptor);
                Ok(())
            }
            _ => Err(CompilationError::internal(
                format!("escape directive '{directive}' with {} arguments", args.len()),
                span,
            )),
        }
    }

    fn escape_invoke(&mut self, op: Opcode, directive: &str, method: MemberRef, span: Span) -> Result<()> {
        let descriptor = MethodDescriptor::parse(&method.descriptor)
            .map_err(|err| CompilationError::escape(directive, err.to_string(), span))?;
        let needed = descriptor.params.len() + usize::from(op != Opcode::Invokestatic);
        let available = self.emitter().stack_depth();
        if available < needed {
            return Err(CompilationError::escape(
                directive,
                format!("{}.{} needs {needed} operands, the stack holds {available}", method.owner, method.name),
                span,
            ));
        }
        let primitive = descriptor
            .params
            .iter()
            .chain(descriptor.ret.as_ref())
            .any(|ty| !matches!(ty, FieldType::Reference(_)));
        if primitive {
            return Err(CompilationError::escape(
                directive,
                format!("{}.{} {} moves primitive values", method.owner, method.name, method.descriptor),
                span,
            ));
        }
        self.emitter().emit_invoke(op, method);
        Ok(())
    }
}

/// Text of a directive argument, which must be a string or number literal.
fn escape_argument<'ast>(directive: &str, part: &KeywordPart<'ast>) -> Result<&'ast str> {
    match part.argument {
        Expr::Literal(LiteralExpr {
            kind: LiteralKind::String | LiteralKind::Number,
            text,
            ..
        }) => Ok(text),
        other => Err(CompilationError::escape(
            directive,
            format!("argument of '{}' must be a string or number literal", part.keyword.name),
            other.span(),
        )),
    }
}

fn parse_number(directive: &str, text: &str, span: Span) -> Result<u16> {
    text.parse().map_err(|_| {
        CompilationError::escape(
            directive,
            format!("'{text}' is not a valid index"),
            span,
        )
    })
}

#[cfg(test)]
mod tests {
    use bumpalo::Bump;
    use skein_ast::AstBuilder;
    use skein_ast::ast::{Expr, Script};

    use crate::classfile::MethodInfo;
    use crate::classfile::opcode::Opcode;
    use crate::config::CompilerConfig;
    use crate::emit::Insn;
    use crate::generator::{CodeGenerator, GeneratedMembers};
    use crate::unit::SourceUnit;
    use skein_core::{CompilationError, Result};

    fn generate(script: &Script<'_>) -> Result<(MethodInfo, GeneratedMembers)> {
        let config = CompilerConfig::default();
        let unit = SourceUnit::new("st.app", "Main");
        CodeGenerator::new(&config, &unit).compile_script(script)
    }

    fn escape<'ast>(b: &AstBuilder<'ast>, parts: &[(&str, Expr<'ast>)]) -> Expr<'ast> {
        b.keyword(b.reference("JVM"), parts)
    }

    #[test]
    fn arg_load_reads_context() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena);
        let script = b.script(&[], &[b.stmt(escape(&b, &[("argLoad:", b.number("1"))]))]);
        let (method, _) = generate(&script).unwrap();
        let insns: Vec<&Insn> = method.body.instructions().collect();
        assert_eq!(insns[0], &Insn::Var(Opcode::Aload, 2));
        assert_eq!(insns[1], &Insn::Op(Opcode::Iconst1));
        assert_eq!(method.body.calls(), vec!["st/core/PrimContext.argumentAt"]);
    }

    #[test]
    fn primitive_calls_numbered_method() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena);
        let script = b.script(&[], &[b.stmt(escape(&b, &[("primitive:", b.number("60"))]))]);
        let (method, _) = generate(&script).unwrap();
        assert_eq!(method.body.calls(), vec!["st/core/PrimObject.primitive60"]);
    }

    #[test]
    fn invoke_static_uses_given_member() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena);
        let directive = escape(
            &b,
            &[
                ("invokeStatic:", b.string("st/core/Prims")),
                ("method:", b.string("now")),
                ("matching:", b.string("()Lst/core/PrimObject;")),
            ],
        );
        let (method, _) = generate(&b.script(&[], &[b.stmt(directive)])).unwrap();
        let invoke = method
            .body
            .instructions()
            .find_map(|insn| match insn {
                Insn::Invoke(op, member) => Some((*op, member.clone())),
                _ => None,
            })
            .unwrap();
        assert_eq!(invoke.0, Opcode::Invokestatic);
        assert_eq!(invoke.1.owner, "st/core/Prims");
        assert_eq!(invoke.1.name, "now");
    }

    #[test]
    fn void_directive_answers_nil() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena);
        let directive = escape(
            &b,
            &[
                ("invokeStatic:", b.string("st/core/Prims")),
                ("method:", b.string("reset")),
                ("matching:", b.string("()V")),
            ],
        );
        let (method, _) = generate(&b.script(&[], &[b.stmt(directive)])).unwrap();
        assert_eq!(
            method.body.calls(),
            vec!["st/core/Prims.reset", "st/core/PrimObject.referenceNil"]
        );
    }

    #[test]
    fn get_static_validates_descriptor() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena);
        let directive = escape(
            &b,
            &[
                ("getStatic:", b.string("java/lang/System")),
                ("named:", b.string("out")),
                ("as:", b.string("Ljava/io/PrintStream")),
            ],
        );
        assert!(matches!(
            generate(&b.script(&[], &[b.stmt(directive)])),
            Err(CompilationError::UnknownEscapeDirective { .. })
        ));
    }

    #[test]
    fn get_static_refuses_primitive_fields() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena);
        let directive = escape(
            &b,
            &[
                ("getStatic:", b.string("java/lang/Integer")),
                ("named:", b.string("MAX_VALUE")),
                ("as:", b.string("I")),
            ],
        );
        let err = generate(&b.script(&[], &[b.stmt(directive)])).unwrap_err();
        assert!(matches!(err, CompilationError::UnknownEscapeDirective { .. }));
        assert!(err.to_string().contains("primitive type I"));
    }

    #[test]
    fn invoke_refuses_primitive_results() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena);
        for descriptor in ["()I", "()J", "()Z"] {
            let directive = escape(
                &b,
                &[
                    ("invokeStatic:", b.string("java/lang/System")),
                    ("method:", b.string("nanoTime")),
                    ("matching:", b.string(descriptor)),
                ],
            );
            let answered = b.script(&[], &[b.answer(directive)]);
            let err = generate(&answered).unwrap_err();
            assert!(matches!(err, CompilationError::UnknownEscapeDirective { .. }));
            assert!(err.to_string().contains("moves primitive values"), "{err}");
        }
    }

    #[test]
    fn invoke_refuses_primitive_parameters() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena);
        let directive = escape(
            &b,
            &[
                ("invokeStatic:", b.string("st/core/Prims")),
                ("method:", b.string("at")),
                ("matching:", b.string("(I)Lst/core/PrimObject;")),
            ],
        );
        // the receiver of the outer send is on the stack when the directive runs
        let send = b.keyword(b.self_ref(), &[("at:", directive)]);
        let err = generate(&b.script(&[], &[b.stmt(send)])).unwrap_err();
        assert!(matches!(err, CompilationError::UnknownEscapeDirective { .. }));
        assert!(err.to_string().contains("moves primitive values"), "{err}");
    }

    #[test]
    fn invoke_virtual_checks_operands() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena);
        let directive = escape(
            &b,
            &[
                ("invokeVirtual:", b.string("st/core/PrimObject")),
                ("method:", b.string("hash")),
                ("matching:", b.string("()I")),
            ],
        );
        let err = generate(&b.script(&[], &[b.stmt(directive)])).unwrap_err();
        assert!(matches!(err, CompilationError::UnknownEscapeDirective { .. }));
        assert!(err.to_string().contains("needs 1 operands"));
    }

    #[test]
    fn aload_is_limited_to_parameters() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena);
        let ok = b.script(&[], &[b.stmt(escape(&b, &[("aload:", b.number("2"))]))]);
        assert!(generate(&ok).is_ok());
        let bad = b.script(&[], &[b.stmt(escape(&b, &[("aload:", b.number("3"))]))]);
        assert!(matches!(
            generate(&bad),
            Err(CompilationError::UnknownEscapeDirective { .. })
        ));
    }

    #[test]
    fn unknown_directive() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena);
        let script = b.script(&[], &[b.stmt(escape(&b, &[("iadd:", b.number("1"))]))]);
        let err = generate(&script).unwrap_err();
        assert_eq!(
            err,
            CompilationError::UnknownEscapeDirective {
                directive: "iadd:".into(),
                reason: "unknown directive".into(),
                span: skein_core::Span::line(1),
            }
        );
    }

    #[test]
    fn arguments_must_be_literals() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena);
        let script = b.script(&[], &[b.stmt(escape(&b, &[("argLoad:", b.reference("n"))]))]);
        assert!(matches!(
            generate(&script),
            Err(CompilationError::UnknownEscapeDirective { .. })
        ));
        let symbol = b.script(&[], &[b.stmt(escape(&b, &[("primitive:", b.symbol("x"))]))]);
        assert!(matches!(
            generate(&symbol),
            Err(CompilationError::UnknownEscapeDirective { .. })
        ));
    }
}
