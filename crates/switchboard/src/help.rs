//! Help synthesis over the command registry.
//!
//! Pure rendering: walks a registry snapshot in order, skipping commands
//! flagged help-hidden, and joins one block per command into a single
//! string. Parameter tokens render in inline code, literals in bold, a lock
//! glyph marks authorized commands, and each example becomes a blockquote
//! line.

use std::sync::Arc;

use switchboard_core::Token;

use crate::command::Command;

const LOCK: &str = ":lock:";

/// Renders the help listing for a registry snapshot.
pub fn render_help(commands: &[Arc<dyn Command>]) -> String {
    let mut lines = Vec::new();

    for command in commands {
        let definition = command.definition();
        if definition.hide_help {
            continue;
        }

        let mut line = String::new();
        for token in command.tokens() {
            match token {
                Token::Parameter(name) => line.push_str(&format!("`<{name}>` ")),
                Token::Literal(word) => line.push_str(&format!("*{word}* ")),
            }
        }

        if definition.authorize.is_some() {
            line.push_str(LOCK);
            line.push(' ');
        }

        if !definition.description.is_empty() {
            line.push_str(&format!("- _{}_", definition.description));
        }

        lines.push(line.trim_end().to_string());

        for example in &definition.examples {
            lines.push(format!(">_*Example:* {example}_"));
        }
    }

    lines.join("\n")
}
