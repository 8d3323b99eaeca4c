//! Message send compilation.
//!
//! ## Bytecode Layout
//!
//! ```text
//! region_start:            ; keyword sends only
//! [receiver]
//! [arguments]              ; left to right
//! ldc "selector"
//! invokevirtual perform    ; superPerform for super sends
//! [region close]           ; handlers for non-local returns, if any
//! ```
//!
//! The protected region of a keyword send starts before its receiver so that
//! a block answering from anywhere in the send returns from this method.

use skein_ast::ast::{Expr, Ident, KeywordMessage, LiteralExpr, LiteralKind, Message, SendExpr};
use skein_core::{CompilationError, Result};

use super::Receiver;
use crate::generator::{BlockRole, CodeGenerator};
use crate::keyword::KeywordRecord;

/// Compile a single message send.
pub fn compile_send(generator: &mut CodeGenerator<'_>, send: &SendExpr<'_>) -> Result<()> {
    match &send.message {
        Message::Keyword(message) => {
            generator.open_region(send.span);
            let receiver = generator.compile_receiver(&send.receiver)?;
            compile_keyword(generator, message, receiver)?;
            generator.close_region()
        }
        message => {
            let receiver = generator.compile_receiver(&send.receiver)?;
            compile_message(generator, message, receiver)
        }
    }
}

/// Compile `message` sent to an already compiled receiver.
///
/// Keyword messages get no protected region here; callers open one.
pub fn compile_message(
    generator: &mut CodeGenerator<'_>,
    message: &Message<'_>,
    receiver: Receiver,
) -> Result<()> {
    match message {
        Message::Unary(unary) => {
            reject_escape(generator, receiver, &unary.selector)?;
            generator.dispatch(unary.selector.name, 0, receiver, unary.selector.span)
        }
        Message::Binary(binary) => {
            reject_escape(generator, receiver, &binary.selector)?;
            generator.compile_expr(&binary.argument)?;
            generator.dispatch(binary.selector.name, 1, receiver, binary.span)
        }
        Message::Keyword(keyword) => compile_keyword(generator, keyword, receiver),
    }
}

fn reject_escape(generator: &CodeGenerator<'_>, receiver: Receiver, selector: &Ident<'_>) -> Result<()> {
    if receiver != Receiver::Escape {
        return Ok(());
    }
    Err(CompilationError::escape(
        selector.name,
        format!(
            "'{}' only understands keyword messages",
            generator.config.escape_identifier
        ),
        selector.span,
    ))
}

/// Compile the arguments and dispatch of a keyword message.
pub fn compile_keyword(
    generator: &mut CodeGenerator<'_>,
    message: &KeywordMessage<'_>,
    receiver: Receiver,
) -> Result<()> {
    check_parts(message)?;
    if receiver == Receiver::Escape {
        return generator.compile_escape(message);
    }

    let selector = message.selector();
    let arity = message.parts.len();
    generator.check_arity(&selector, arity, message.span)?;

    generator.keywords.push(KeywordRecord::new(message.span));
    for (index, part) in message.parts.iter().enumerate() {
        if let Some(record) = generator.keywords.last_mut() {
            record.add_part(part.keyword.name);
            if index == 0
                && let Expr::Literal(LiteralExpr {
                    kind: LiteralKind::Symbol,
                    text,
                    ..
                }) = part.argument
            {
                record.set_first_argument(text);
            }
        }

        match part.argument {
            Expr::Block(block) => {
                let role = if part.keyword.name == generator.config.method_keyword {
                    BlockRole::Method
                } else {
                    BlockRole::Value
                };
                generator.compile_block(block, role)?;
            }
            argument => generator.compile_expr(&argument)?,
        }
    }
    generator.keywords.pop();

    generator.dispatch(&selector, arity, receiver, message.span)
}

/// Every keyword part is one identifier followed by a single colon.
fn check_parts(message: &KeywordMessage<'_>) -> Result<()> {
    if message.parts.is_empty() {
        return Err(CompilationError::internal("keyword message without parts", message.span));
    }
    for part in message.parts {
        let name = part.keyword.name;
        if name.len() < 2 || !name.ends_with(':') || name.matches(':').count() != 1 {
            return Err(CompilationError::internal(
                format!("malformed keyword part '{name}' in '{}'", message.selector()),
                part.keyword.span,
            ));
        }
    }
    Ok(())
}
