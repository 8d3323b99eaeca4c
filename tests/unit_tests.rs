//! Integration tests for Skein using `Context` as the entry point.
//!
//! These tests build complete scripts, compile them, and check the generated
//! classes both in symbolic form and by parsing the encoded bytes back.

use skein::ast::Script;
use skein::classfile::opcode::Opcode;
use skein::classfile::reader::{ClassSummary, CodeSummary};
use skein::classfile::{CLASS_MAJOR_VERSION, MethodAccess};
use skein::emit::Insn;
use skein::{
    AstBuilder, Bump, ClassRegistry, CompilationError, CompiledUnit, CompilerConfig, Context, RuntimeNames,
    SourceUnit,
};
use std::sync::Arc;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn compile(script: &Script<'_>) -> Result<CompiledUnit, CompilationError> {
    init_logging();
    Context::new()
        .compile(script, &SourceUnit::new("st.app", "Main"))
        .map_err(|err| match err.compilation_error() {
            Some(err) => err.clone(),
            None => panic!("unexpected error: {err}"),
        })
}

fn summary(unit: &CompiledUnit) -> ClassSummary {
    ClassSummary::parse(&unit.primary.bytes).expect("primary class parses")
}

fn code<'a>(summary: &'a ClassSummary, method: &str) -> &'a CodeSummary {
    summary
        .method(method)
        .and_then(|m| m.code.as_ref())
        .unwrap_or_else(|| panic!("{method} has no code"))
}

fn invoked_descriptors(unit: &CompiledUnit, method: &str, name: &str) -> Vec<String> {
    unit.primary
        .file
        .method(method)
        .expect("method exists")
        .body
        .instructions()
        .filter_map(|insn| match insn {
            Insn::Invoke(_, member) if member.name == name => Some(member.descriptor.clone()),
            _ => None,
        })
        .collect()
}

// =============================================================================
// Statements and answers
// =============================================================================

#[test]
fn test_temporary_sum_and_answer() {
    // | x | x := 1 + 2. ^x
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let script = b.script(
        &["x"],
        &[
            b.stmt(b.assign("x", b.binary(b.number("1"), "+", b.number("2")))),
            b.answer(b.reference("x")),
        ],
    );
    let unit = compile(&script).unwrap();
    let class = summary(&unit);

    assert_eq!(
        code(&class, "sendMessages").opcodes().unwrap(),
        vec![
            // initTemporaries(1)
            Opcode::Aload2,
            Opcode::Iconst1,
            Opcode::Invokevirtual,
            // 1 + 2
            Opcode::Aload1,
            Opcode::Ldc,
            Opcode::Invokevirtual,
            Opcode::Aload1,
            Opcode::Ldc,
            Opcode::Invokevirtual,
            Opcode::Ldc,
            Opcode::Invokevirtual,
            // x := ...
            Opcode::Dup,
            Opcode::Iconst0,
            Opcode::Aload2,
            Opcode::Invokestatic,
            Opcode::Pop,
            // ^x
            Opcode::Aload2,
            Opcode::Iconst0,
            Opcode::Invokevirtual,
            Opcode::Areturn,
        ]
    );
    assert_eq!(
        invoked_descriptors(&unit, "sendMessages", "perform"),
        vec![RuntimeNames::default().perform_desc(1)]
    );
    for text in ["1", "2", "+"] {
        assert!(class.strings.iter().any(|s| s == text), "missing string {text}");
    }
}

#[test]
fn test_last_statement_is_answered() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let script = b.script(&[], &[b.stmt(b.number("1")), b.stmt(b.unary(b.number("2"), "negated"))]);
    let unit = compile(&script).unwrap();
    let ops = code(&summary(&unit), "sendMessages").opcodes().unwrap();

    assert_eq!(ops.iter().filter(|op| **op == Opcode::Pop).count(), 1);
    assert_eq!(ops.iter().filter(|op| **op == Opcode::Areturn).count(), 1);
    assert_eq!(&ops[ops.len() - 3..], &[Opcode::Ldc, Opcode::Invokevirtual, Opcode::Areturn]);
}

#[test]
fn test_empty_script_answers_receiver() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let unit = compile(&b.script(&[], &[])).unwrap();
    assert_eq!(
        code(&summary(&unit), "sendMessages").opcodes().unwrap(),
        vec![Opcode::Aload1, Opcode::Areturn]
    );
}

#[test]
fn test_class_layout() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let script = b.script(&[], &[b.stmt(b.block(&[], &[], &[]))]);
    let unit = compile(&script).unwrap();
    let class = summary(&unit);

    assert_eq!(class.major_version, CLASS_MAJOR_VERSION);
    assert_eq!(class.name, "st/app/Main");
    assert_eq!(class.super_name, "st/core/PrimObject");
    assert_eq!(class.source_file.as_deref(), Some("Main.st"));
    assert_eq!(class.bootstrap_methods, 1);
    for attribute in ["SourceFile", "InnerClasses", "BootstrapMethods"] {
        assert!(class.attributes.iter().any(|a| a == attribute), "missing {attribute}");
    }

    let names: Vec<&str> = class.methods.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["<init>", "packageName", "importFor", "sendMessages", "B0"]);
    assert_eq!(
        class.method("sendMessages").map(|m| m.descriptor.as_str()),
        Some("(Lst/core/PrimObject;Lst/core/PrimContext;)Lst/core/PrimObject;")
    );
    assert!(class.method("packageName").unwrap().access.contains(MethodAccess::PROTECTED));
    assert!(class.strings.iter().any(|s| s == "st.app"));
}

// =============================================================================
// Blocks and non-local return
// =============================================================================

#[test]
fn test_empty_block_answers_nil() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let script = b.script(&[], &[b.stmt(b.keyword(b.reference("flag"), &[("ifTrue:", b.block(&[], &[], &[]))]))]);
    let unit = compile(&script).unwrap();
    let class = summary(&unit);

    assert!(unit.markers.is_empty());
    assert!(code(&class, "sendMessages").exception_table.is_empty());
    let lambda = class.method("B0").unwrap();
    assert_eq!(
        lambda.access,
        MethodAccess::PRIVATE | MethodAccess::STATIC | MethodAccess::SYNTHETIC
    );
    assert_eq!(
        lambda.code.as_ref().unwrap().opcodes().unwrap(),
        vec![Opcode::Aload1, Opcode::Invokevirtual, Opcode::Areturn]
    );
}

#[test]
fn test_keyword_send_with_answering_block() {
    // flag ifTrue: [^42]
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let block = b.block(&[], &[], &[b.answer(b.number("42"))]);
    let script = b.script(&[], &[b.stmt(b.keyword(b.reference("flag"), &[("ifTrue:", block)]))]);
    let unit = compile(&script).unwrap();

    assert_eq!(unit.markers.len(), 1);
    let marker = ClassSummary::parse(&unit.markers[0].bytes).unwrap();
    assert_eq!(marker.name, "st/app/Main$AB0");
    assert_eq!(marker.super_name, "st/core/PrimBlockAnswer");
    assert_eq!(
        marker.method("<init>").map(|m| m.descriptor.as_str()),
        Some("(Lst/core/PrimObject;)V")
    );

    let class = summary(&unit);
    let send = code(&class, "sendMessages");
    assert_eq!(send.exception_table.len(), 1);
    let entry = &send.exception_table[0];
    assert_eq!(entry.catch_type.as_deref(), Some("st/app/Main$AB0"));
    assert_eq!(entry.start, 0);
    let handler = entry.handler as usize;
    assert_eq!(send.code[handler], u8::from(Opcode::Invokevirtual));
    assert_eq!(send.code[handler + 3], u8::from(Opcode::Areturn));
    assert!(send.stack_map_frames >= 2);
    assert!(send.attributes.iter().any(|a| a == "StackMapTable"));
    assert!(class.strings.iter().any(|s| s == "st.app.Main$AB0"));

    let lambda = code(&class, "B0");
    assert!(lambda.exception_table.is_empty());
    assert_eq!(*lambda.opcodes().unwrap().last().unwrap(), Opcode::Areturn);
}

#[test]
fn test_markers_are_defined_before_primary() {
    init_logging();
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let yes = b.block(&[], &[], &[b.answer(b.number("1"))]);
    let no = b.block(&[], &[], &[b.answer(b.number("2"))]);
    let script = b.script(&[], &[b.stmt(b.keyword(b.reference("flag"), &[("ifTrue:", yes), ("ifFalse:", no)]))]);

    let context = Context::new();
    let unit = context.compile(&script, &SourceUnit::new("st.app", "Main")).unwrap();
    let order: Vec<&str> = unit.classes().map(|c| c.name.as_str()).collect();
    assert_eq!(order, vec!["st.app.Main$AB0", "st.app.Main$AB1", "st.app.Main"]);
    assert_eq!(context.class_count(), 3);
}

#[test]
fn test_method_block_returns_directly() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let body = b.block(&[":aStream"], &[], &[b.answer(b.self_ref())]);
    let install = b.keyword(
        b.reference("Counter"),
        &[("atSelector:", b.symbol("#printOn:")), ("withMethod:", body)],
    );
    let unit = compile(&b.script(&[], &[b.stmt(install)])).unwrap();

    assert!(unit.markers.is_empty());
    let class = summary(&unit);
    assert!(class.method("printOn:").is_some());
    assert!(code(&class, "sendMessages").exception_table.is_empty());
}

// =============================================================================
// Scopes and arity
// =============================================================================

#[test]
fn test_duplicate_temporary_fails() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let err = compile(&b.script(&["x", "x"], &[])).unwrap_err();
    assert!(matches!(err, CompilationError::DuplicateDeclaration { ref name, .. } if name == "x"));
}

/// Slot index pushed right before each `name` call on the context.
fn context_slots(body: &skein::emit::MethodBody, name: &str) -> Vec<Insn> {
    let insns: Vec<&Insn> = body.instructions().collect();
    let mut slots = Vec::new();
    for (index, insn) in insns.iter().enumerate() {
        if let Insn::Invoke(_, member) = insn
            && member.name == name
        {
            // temporaryPutAt takes (value, slot, context); the getters (context, slot)
            let offset = if name == "temporaryPutAt" { 2 } else { 1 };
            slots.push(insns[index - offset].clone());
        }
    }
    slots
}

#[test]
fn test_nested_block_may_shadow() {
    // | y x | x := 1. [ | x | x := 2 ] value. ^x
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let inner = b.block(&[], &["x"], &[b.stmt(b.assign("x", b.number("2")))]);
    let script = b.script(
        &["y", "x"],
        &[
            b.stmt(b.assign("x", b.number("1"))),
            b.stmt(b.unary(inner, "value")),
            b.answer(b.reference("x")),
        ],
    );
    let unit = compile(&script).unwrap();

    let lambda = &unit.primary.file.method("B0").unwrap().body;
    assert_eq!(context_slots(lambda, "temporaryPutAt"), vec![Insn::Op(Opcode::Iconst0)]);
    assert!(context_slots(lambda, "temporaryAt").is_empty());

    let send = &unit.primary.file.method("sendMessages").unwrap().body;
    assert_eq!(context_slots(send, "temporaryPutAt"), vec![Insn::Op(Opcode::Iconst1)]);
    assert_eq!(context_slots(send, "temporaryAt"), vec![Insn::Op(Opcode::Iconst1)]);
}

#[test]
fn test_assignment_to_global_fails() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let script = b.script(&[], &[b.stmt(b.assign("Transcript", b.number("1")))]);
    assert!(matches!(
        compile(&script),
        Err(CompilationError::UnresolvedAssignmentTarget { .. })
    ));
}

#[test]
fn test_arities_up_to_five() {
    let keywords = ["a:", "b:", "c:", "d:", "e:", "f:"];
    for arity in 0..=5 {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena);
        let send = if arity == 0 {
            b.unary(b.reference("x"), "size")
        } else {
            let parts: Vec<_> = keywords[..arity].iter().map(|k| (*k, b.number("1"))).collect();
            b.keyword(b.reference("x"), &parts)
        };
        let unit = compile(&b.script(&[], &[b.stmt(send)])).unwrap();
        assert_eq!(
            invoked_descriptors(&unit, "sendMessages", "perform"),
            vec![RuntimeNames::default().perform_desc(arity)],
            "arity {arity}"
        );
    }
}

#[test]
fn test_six_arguments_fail() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let parts: Vec<_> = ["a:", "b:", "c:", "d:", "e:", "f:"]
        .iter()
        .map(|k| (*k, b.number("1")))
        .collect();
    let script = b.script(&[], &[b.stmt(b.keyword(b.reference("x"), &parts))]);
    assert!(matches!(
        compile(&script),
        Err(CompilationError::UnsupportedArity { arity: 6, max: 5, .. })
    ));
}

#[test]
fn test_super_sends() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let script = b.script(&[], &[b.stmt(b.unary(b.super_ref(), "initialize"))]);
    let unit = compile(&script).unwrap();
    assert_eq!(
        invoked_descriptors(&unit, "sendMessages", "superPerform"),
        vec![RuntimeNames::default().perform_desc(0)]
    );
}

// =============================================================================
// Escape directives
// =============================================================================

#[test]
fn test_escape_only_after_escape_identifier() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let ordinary = b.script(&[], &[b.stmt(b.keyword(b.reference("x"), &[("aload:", b.number("1"))]))]);
    let unit = compile(&ordinary).unwrap();
    assert_eq!(invoked_descriptors(&unit, "sendMessages", "perform").len(), 1);
    assert!(summary(&unit).strings.iter().any(|s| s == "aload:"));

    let escaped = b.script(&[], &[b.stmt(b.keyword(b.reference("JVM"), &[("aload:", b.number("1"))]))]);
    let unit = compile(&escaped).unwrap();
    assert_eq!(
        code(&summary(&unit), "sendMessages").opcodes().unwrap(),
        vec![Opcode::Aload1, Opcode::Areturn]
    );
}

#[test]
fn test_escape_identifier_can_be_declared() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let script = b.script(&["JVM"], &[b.stmt(b.keyword(b.reference("JVM"), &[("aload:", b.number("1"))]))]);
    let unit = compile(&script).unwrap();
    assert_eq!(invoked_descriptors(&unit, "sendMessages", "perform").len(), 1);
}

#[test]
fn test_custom_escape_identifier() {
    init_logging();
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let script = b.script(&[], &[b.stmt(b.keyword(b.reference("Asm"), &[("primitive:", b.number("60"))]))]);
    let context = Context::with_config(CompilerConfig::default().with_escape_identifier("Asm"));
    let unit = context.compile(&script, &SourceUnit::new("st.app", "Main")).unwrap();
    assert_eq!(
        invoked_descriptors(&unit, "sendMessages", "primitive60"),
        vec!["(Lst/core/PrimContext;)Lst/core/PrimObject;".to_string()]
    );
}

// =============================================================================
// Lines and configuration
// =============================================================================

#[test]
fn test_line_numbers_follow_statements() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let first = b.at(3).stmt(b.unary(b.reference("a"), "foo"));
    let second = b.at(5).stmt(b.unary(b.reference("b"), "bar"));
    let unit = compile(&b.script(&[], &[first, second])).unwrap();

    let lines: Vec<u16> = code(&summary(&unit), "sendMessages")
        .line_numbers
        .iter()
        .map(|(_, line)| *line)
        .collect();
    assert!(lines.contains(&3));
    assert!(lines.contains(&5));
    assert!(lines.iter().all(|line| *line == 3 || *line == 5));
}

#[test]
fn test_line_numbers_can_be_disabled() {
    init_logging();
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let script = b.script(&[], &[b.stmt(b.unary(b.reference("a"), "foo"))]);
    let context = Context::with_config(CompilerConfig::default().without_line_numbers());
    let unit = context.compile(&script, &SourceUnit::new("st.app", "Main")).unwrap();
    let class = summary(&unit);
    for method in &class.methods {
        assert!(method.code.as_ref().unwrap().line_numbers.is_empty(), "{}", method.name);
    }
}

#[test]
fn test_custom_runtime_names() {
    init_logging();
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let script = b.script(&[], &[b.stmt(b.unary(b.reference("a"), "foo"))]);
    let runtime = RuntimeNames {
        object: "rt/Obj".to_string(),
        ..RuntimeNames::default()
    };
    let context = Context::with_config(CompilerConfig::default().with_runtime(runtime));
    let unit = context.compile(&script, &SourceUnit::new("st.app", "Main")).unwrap();
    let class = summary(&unit);
    assert_eq!(class.super_name, "rt/Obj");
    assert_eq!(
        class.method("sendMessages").map(|m| m.descriptor.as_str()),
        Some("(Lrt/Obj;Lst/core/PrimContext;)Lrt/Obj;")
    );
}

#[test]
fn test_units_compile_in_parallel() {
    init_logging();
    let registry = Arc::new(ClassRegistry::new());
    std::thread::scope(|scope| {
        for index in 0..4 {
            let registry = Arc::clone(&registry);
            scope.spawn(move || {
                let arena = Bump::new();
                let b = AstBuilder::new(&arena);
                let block = b.block(&[], &[], &[b.answer(b.number("1"))]);
                let script = b.script(&[], &[b.stmt(b.keyword(b.reference("x"), &[("ifTrue:", block)]))]);
                let context = Context::with_registry(CompilerConfig::default(), registry);
                context
                    .compile(&script, &SourceUnit::new("st.app", format!("Unit{index}")))
                    .unwrap();
            });
        }
    });
    assert_eq!(registry.len(), 8);
    assert!(registry.contains("st.app.Unit3$AB0"));
}
