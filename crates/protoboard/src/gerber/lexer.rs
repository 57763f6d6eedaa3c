/// Tokens produced by the Gerber lexer.
#[derive(Debug, Clone, PartialEq)]
pub enum GerberToken {
    /// One command from an extended block (between `%` delimiters).
    /// Example: `"FSLAX46Y46"`, `"ADD10C,0.750000"`, `"LPD"`
    Extended(String),
    /// A word command terminated by `*`.
    /// Example: `"D10"`, `"X001270000Y001270000D03"`, `"G36"`, `"M02"`
    Word(String),
}

/// Tokenize Gerber source into a sequence of tokens.
///
/// `*` terminates a statement and `%...%` wraps extended commands, which may
/// hold several `*`-terminated statements. Line breaks carry no meaning.
/// `G04` comments are dropped.
pub fn tokenize(input: &str) -> Vec<GerberToken> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_extended = false;

    for ch in input.chars() {
        match ch {
            '%' => {
                // Anything pending before a block boundary is unterminated
                push_token(&mut tokens, &mut current, in_extended);
                in_extended = !in_extended;
            }
            '*' => push_token(&mut tokens, &mut current, in_extended),
            '\n' | '\r' => {}
            _ => current.push(ch),
        }
    }
    push_token(&mut tokens, &mut current, in_extended);

    tokens
}

fn push_token(tokens: &mut Vec<GerberToken>, current: &mut String, extended: bool) {
    let trimmed = current.trim();
    if !trimmed.is_empty() && !is_comment(trimmed) {
        let text = trimmed.to_string();
        tokens.push(if extended {
            GerberToken::Extended(text)
        } else {
            GerberToken::Word(text)
        });
    }
    current.clear();
}

/// Check if a command is a G04 comment.
fn is_comment(s: &str) -> bool {
    s.starts_with("G04") || s.starts_with("G4 ")
}
