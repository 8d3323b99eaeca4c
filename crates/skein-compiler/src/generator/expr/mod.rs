//! Expression compilation.
//!
//! Every expression leaves exactly one value on the operand stack, with one
//! exception: the escape identifier pushes nothing and turns the message sent
//! to it into raw instructions. Receiver compilation reports which case it
//! produced through [`Receiver`], and the message compiler consumes it.

mod assignment;
mod cascade;
mod identifiers;
mod literals;
mod messages;

use skein_ast::ast::Expr;
use skein_core::{CompilationError, Result};

use super::CodeGenerator;

/// What compiling a receiver left for the message that consumes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Receiver {
    /// A value is on the stack.
    Value,
    /// `super`: the receiver is on the stack and the send skips its class.
    Super,
    /// The escape identifier: nothing was pushed, the message is a directive.
    Escape,
}

impl CodeGenerator<'_> {
    /// Compile an expression for its value.
    pub(super) fn compile_expr(&mut self, expr: &Expr<'_>) -> Result<()> {
        match self.compile_receiver(expr)? {
            Receiver::Value | Receiver::Super => Ok(()),
            Receiver::Escape => Err(CompilationError::escape(
                self.config.escape_identifier.clone(),
                "only keyword messages can be sent to it",
                expr.span(),
            )),
        }
    }

    /// Compile an expression that may be the receiver of a message.
    pub(super) fn compile_receiver(&mut self, expr: &Expr<'_>) -> Result<Receiver> {
        match expr {
            Expr::Literal(literal) => {
                literals::compile_literal(self, literal);
                Ok(Receiver::Value)
            }
            Expr::Pseudo(pseudo) => Ok(identifiers::compile_pseudo(self, pseudo)),
            Expr::Reference(ident) => Ok(identifiers::compile_reference(self, ident)),
            Expr::Block(block) => {
                self.compile_block(block, super::BlockRole::Value)?;
                Ok(Receiver::Value)
            }
            Expr::Send(send) => {
                messages::compile_send(self, send)?;
                Ok(Receiver::Value)
            }
            Expr::Cascade(cascade) => {
                cascade::compile_cascade(self, cascade)?;
                Ok(Receiver::Value)
            }
            Expr::Assign(assign) => {
                assignment::compile_assign(self, assign)?;
                Ok(Receiver::Value)
            }
            Expr::Paren(paren) => {
                self.compile_expr(&paren.expr)?;
                Ok(Receiver::Value)
            }
            Expr::Primitive(primitive) => Err(CompilationError::internal(
                format!(
                    "<primitive: {}> is not supported, use '{} primitive: {}' instead",
                    primitive.number, self.config.escape_identifier, primitive.number
                ),
                primitive.span,
            )),
        }
    }
}
