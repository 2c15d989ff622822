//! System instruction templates.
//!
//! Strict and open instructions are separate templates: only the strict one
//! ever carries context text.

use crate::context::Context;

/// Preamble shared by both templates.
pub const ASSISTANT_PREAMBLE: &str = "You are a helpful assistant.";

/// Message sent when the user typed nothing (e.g. only a URL or PDF was given).
pub const DEFAULT_USER_MESSAGE: &str = "Hello";

/// Instruction restricting the model to the supplied context.
pub fn strict_instruction(context: &str) -> String {
    format!("{ASSISTANT_PREAMBLE} Use ONLY the provided CONTEXT to answer.\nCONTEXT:\n{context}")
}

/// Instruction for an ungrounded, open-ended answer.
pub fn open_instruction() -> String {
    ASSISTANT_PREAMBLE.to_string()
}

/// Pick the template matching the context's strictness.
pub fn system_instruction(context: &Context) -> String {
    if context.strict {
        strict_instruction(&context.text)
    } else {
        open_instruction()
    }
}

/// The user message actually sent: trimmed input, or a greeting when empty.
pub fn user_message(input: &str) -> &str {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        DEFAULT_USER_MESSAGE
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_instruction_embeds_context() {
        let ctx = Context {
            text: "PDF_CONTENT:\nalpha".into(),
            strict: true,
        };
        assert_eq!(
            system_instruction(&ctx),
            "You are a helpful assistant. Use ONLY the provided CONTEXT to answer.\nCONTEXT:\nPDF_CONTENT:\nalpha"
        );
    }

    #[test]
    fn open_instruction_never_embeds_context() {
        let ctx = Context {
            text: "RECENT_CHAT_HISTORY:\nUser: hi".into(),
            strict: false,
        };
        let instruction = system_instruction(&ctx);
        assert_eq!(instruction, "You are a helpful assistant.");
        assert!(!instruction.contains("CONTEXT"));
    }

    #[test]
    fn empty_input_becomes_greeting() {
        assert_eq!(user_message(""), "Hello");
        assert_eq!(user_message("   \n"), "Hello");
        assert_eq!(user_message("  What is X? "), "What is X?");
    }
}
