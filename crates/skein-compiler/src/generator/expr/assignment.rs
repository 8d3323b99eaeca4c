//! Assignment compilation.
//!
//! ```text
//! [value]
//! dup                      ; the assignment's own value
//! push slot
//! aload 2                  ; context
//! invokestatic temporaryPutAt
//! ```

use skein_ast::ast::AssignExpr;
use skein_core::{CompilationError, Result};

use crate::classfile::opcode::Opcode;
use crate::generator::CodeGenerator;
use crate::scope::Resolution;

/// Compile `target := value`. Only temporaries of the current scope can be
/// assigned.
pub fn compile_assign(generator: &mut CodeGenerator<'_>, assign: &AssignExpr<'_>) -> Result<()> {
    let Resolution::Temporary(slot) = generator.scopes.resolve(assign.target.name) else {
        return Err(CompilationError::UnresolvedAssignmentTarget {
            name: assign.target.name.to_string(),
            span: assign.target.span,
        });
    };

    generator.compile_expr(&assign.value)?;
    generator.emitter().set_line(assign.span.line);
    generator.emitter().emit(Opcode::Dup);
    generator.store_temporary(slot);
    Ok(())
}

#[cfg(test)]
mod tests {
    use bumpalo::Bump;
    use skein_ast::AstBuilder;

    use crate::config::CompilerConfig;
    use crate::generator::CodeGenerator;
    use crate::unit::SourceUnit;
    use skein_core::CompilationError;

    #[test]
    fn assigning_an_undeclared_name_fails() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena);
        let script = b.script(&[], &[b.stmt(b.assign("x", b.number("1")))]);
        let config = CompilerConfig::default();
        let unit = SourceUnit::new("st.app", "Main");
        let err = CodeGenerator::new(&config, &unit)
            .compile_script(&script)
            .err()
            .unwrap();
        assert_eq!(
            err,
            CompilationError::UnresolvedAssignmentTarget {
                name: "x".into(),
                span: skein_core::Span::line(1),
            }
        );
    }

    #[test]
    fn block_arguments_are_read_only() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena);
        let block = b.block(&[":a"], &[], &[b.stmt(b.assign("a", b.number("1")))]);
        let script = b.script(&[], &[b.stmt(block)]);
        let config = CompilerConfig::default();
        let unit = SourceUnit::new("st.app", "Main");
        assert!(matches!(
            CodeGenerator::new(&config, &unit).compile_script(&script),
            Err(CompilationError::UnresolvedAssignmentTarget { .. })
        ));
    }

    #[test]
    fn assignment_leaves_its_value() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena);
        let script = b.script(&["x"], &[b.stmt(b.assign("x", b.number("1")))]);
        let config = CompilerConfig::default();
        let unit = SourceUnit::new("st.app", "Main");
        let (method, _) = CodeGenerator::new(&config, &unit)
            .compile_script(&script)
            .unwrap();
        assert_eq!(
            method.body.calls(),
            vec![
                "st/core/PrimContext.initTemporaries",
                "st/core/PrimObject.smalltalkNumber",
                "st/core/PrimContext.temporaryPutAt",
            ]
        );
        // receiver, number text; dup keeps the value for areturn
        assert_eq!(method.body.max_stack, 4);
    }
}
