//! Pseudo-variables and identifier references.

use log::trace;
use skein_ast::ast::{Ident, PseudoExpr, PseudoKind};

use super::Receiver;
use crate::generator::CodeGenerator;
use crate::scope::Resolution;

/// Compile `self`, `super`, `nil`, `true` or `false`.
pub fn compile_pseudo(generator: &mut CodeGenerator<'_>, pseudo: &PseudoExpr) -> Receiver {
    generator.emitter().set_line(pseudo.span.line);
    match pseudo.kind {
        PseudoKind::SelfRef => {
            generator.push_receiver();
            Receiver::Value
        }
        PseudoKind::Super => {
            generator.push_receiver();
            Receiver::Super
        }
        PseudoKind::Nil => {
            generator.push_pseudo("referenceNil");
            Receiver::Value
        }
        PseudoKind::True => {
            generator.push_pseudo("referenceTrue");
            Receiver::Value
        }
        PseudoKind::False => {
            generator.push_pseudo("referenceFalse");
            Receiver::Value
        }
    }
}

/// Compile a variable reference.
///
/// Names declared in the current scope read the context; the escape
/// identifier emits nothing; anything else is a global looked up by name.
pub fn compile_reference(generator: &mut CodeGenerator<'_>, ident: &Ident<'_>) -> Receiver {
    let resolution = generator.scopes.resolve(ident.name);
    if resolution == Resolution::Unresolved && ident.name == generator.config.escape_identifier {
        trace!("escape mode at {}", ident.span);
        return Receiver::Escape;
    }

    generator.emitter().set_line(ident.span.line);
    match resolution {
        Resolution::Temporary(slot) => generator.push_temporary(slot),
        Resolution::Argument(slot) => generator.push_argument(slot),
        Resolution::Unresolved => generator.push_global(ident.name),
    }
    Receiver::Value
}
