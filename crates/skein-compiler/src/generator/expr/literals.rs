//! Literal compilation.
//!
//! Literals are created by the receiver from their source text, so number
//! syntax (radix, scale, exponent) is the runtime's business.

use skein_ast::ast::{LiteralExpr, LiteralKind};

use crate::generator::CodeGenerator;

/// Runtime factory building a literal of `kind`.
fn factory(kind: LiteralKind) -> &'static str {
    match kind {
        LiteralKind::Number => "smalltalkNumber",
        LiteralKind::Character => "smalltalkCharacter",
        LiteralKind::String => "smalltalkString",
        LiteralKind::Symbol => "smalltalkSymbol",
        LiteralKind::Array => "smalltalkArray",
    }
}

/// Compile a literal expression.
pub fn compile_literal(generator: &mut CodeGenerator<'_>, literal: &LiteralExpr<'_>) {
    generator.emitter().set_line(literal.span.line);
    generator.push_literal(factory(literal.kind), literal.text);
}
