//! Cascade compilation.
//!
//! ## Bytecode Layout
//!
//! ```text
//! [receiver]
//! dup                      ; every message but the last
//! [message 1]
//! pop
//! ...
//! [message k]              ; its result is the cascade's value
//! ```
//!
//! Keyword messages of a cascade each open their own protected region. The
//! receiver is shared, so the region starts at the message.

use skein_ast::ast::{CascadeExpr, Message};
use skein_core::{CompilationError, Result};

use super::Receiver;
use super::messages::{compile_keyword, compile_message};
use crate::classfile::opcode::Opcode;
use crate::generator::CodeGenerator;

/// Compile `receiver m1; m2; ...; mk`.
pub fn compile_cascade(generator: &mut CodeGenerator<'_>, cascade: &CascadeExpr<'_>) -> Result<()> {
    let Some(last) = cascade.messages.len().checked_sub(1) else {
        return Err(CompilationError::internal("cascade without messages", cascade.span));
    };

    let receiver = generator.compile_receiver(&cascade.receiver)?;
    if receiver == Receiver::Escape {
        return compile_escape_cascade(generator, cascade);
    }

    for (index, message) in cascade.messages.iter().enumerate() {
        if index < last {
            generator.emitter().emit(Opcode::Dup);
        }
        match message {
            Message::Keyword(keyword) => {
                generator.open_region(keyword.span);
                compile_keyword(generator, keyword, receiver)?;
                generator.close_region()?;
            }
            other => compile_message(generator, other, receiver)?,
        }
        if index < last {
            generator.emitter().emit_pop();
        }
    }
    Ok(())
}

/// Each message is a directive; nothing was pushed for the receiver, so
/// nothing is duplicated or popped.
fn compile_escape_cascade(generator: &mut CodeGenerator<'_>, cascade: &CascadeExpr<'_>) -> Result<()> {
    for message in cascade.messages {
        compile_message(generator, message, Receiver::Escape)?;
    }
    Ok(())
}
