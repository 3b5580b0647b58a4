//! Tokenizer for ODKeyScript source.

use super::error::ScriptError;

/// A lexical token together with the 1-based line and column at which it
/// starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
}

/// The kinds of token the lexer produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// A bare word: a statement keyword (`press`, `type`, `repeat`, ...), a
    /// key name (`A`, `ENTER`, ...) or a modifier name (`M_LEFTSHIFT`, ...).
    /// The parser disambiguates by context, matching the original
    /// single-pass compiler.
    Word(String),
    /// An integer literal.
    Number(u32),
    /// A double-quoted string literal with escapes already resolved.
    String(String),
    BraceOpen,
    BraceClose,
    /// A `#`-to-end-of-line comment. Carried through the token stream rather
    /// than dropped during lexing, since `keyup`'s bare-vs-operand rule peeks
    /// at the raw next token and needs to tell "nothing follows but a
    /// comment" apart from "more program follows". Everywhere else the
    /// parser skips over these like whitespace.
    Comment,
    Eof,
}

/// Splits ODKeyScript source into a token stream.
///
/// Comments start with `#` and run to end of line; each is emitted as a
/// single `Comment` token rather than being dropped, for the parser to
/// discard (see [`TokenKind::Comment`]). Strings are double quoted; `\t`,
/// `\n`, `\\` and `\"` are recognized escapes, any other `\x` is passed
/// through literally as `\x` and a lone trailing backslash is kept as-is. An
/// unterminated string reports the error at the position of the opening
/// quote.
pub fn tokenize(source: &str) -> Result<Vec<Token>, ScriptError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0usize;
    let mut line = 1usize;
    let mut column = 1usize;

    let advance = |pos: &mut usize, line: &mut usize, column: &mut usize, chars: &[char]| {
        if chars[*pos] == '\n' {
            *line += 1;
            *column = 1;
        } else {
            *column += 1;
        }
        *pos += 1;
    };

    while pos < chars.len() {
        let c = chars[pos];

        if c.is_whitespace() {
            advance(&mut pos, &mut line, &mut column, &chars);
            continue;
        }

        let start_line = line;
        let start_column = column;

        if c == '#' {
            while pos < chars.len() && chars[pos] != '\n' {
                advance(&mut pos, &mut line, &mut column, &chars);
            }
            tokens.push(Token {
                kind: TokenKind::Comment,
                line: start_line,
                column: start_column,
            });
            continue;
        }

        if c == '{' {
            tokens.push(Token {
                kind: TokenKind::BraceOpen,
                line: start_line,
                column: start_column,
            });
            advance(&mut pos, &mut line, &mut column, &chars);
            continue;
        }

        if c == '}' {
            tokens.push(Token {
                kind: TokenKind::BraceClose,
                line: start_line,
                column: start_column,
            });
            advance(&mut pos, &mut line, &mut column, &chars);
            continue;
        }

        if c == '"' {
            advance(&mut pos, &mut line, &mut column, &chars);
            let mut value = String::new();
            let mut closed = false;
            while pos < chars.len() {
                let ch = chars[pos];
                if ch == '"' {
                    advance(&mut pos, &mut line, &mut column, &chars);
                    closed = true;
                    break;
                }
                if ch == '\\' {
                    advance(&mut pos, &mut line, &mut column, &chars);
                    if pos >= chars.len() {
                        value.push('\\');
                        break;
                    }
                    let esc = chars[pos];
                    match esc {
                        't' => value.push('\t'),
                        'n' => value.push('\n'),
                        '\\' => value.push('\\'),
                        '"' => value.push('"'),
                        other => {
                            value.push('\\');
                            value.push(other);
                        }
                    }
                    advance(&mut pos, &mut line, &mut column, &chars);
                    continue;
                }
                value.push(ch);
                advance(&mut pos, &mut line, &mut column, &chars);
            }
            if !closed {
                return Err(ScriptError::syntax(
                    "unterminated string literal",
                    start_line,
                    start_column,
                ));
            }
            tokens.push(Token {
                kind: TokenKind::String(value),
                line: start_line,
                column: start_column,
            });
            continue;
        }

        if c.is_ascii_digit() {
            let mut value = String::new();
            while pos < chars.len() && chars[pos].is_ascii_digit() {
                value.push(chars[pos]);
                advance(&mut pos, &mut line, &mut column, &chars);
            }
            let number: u32 = value.parse().map_err(|_| {
                ScriptError::syntax("number literal out of range", start_line, start_column)
            })?;
            tokens.push(Token {
                kind: TokenKind::Number(number),
                line: start_line,
                column: start_column,
            });
            continue;
        }

        if is_identifier_start(c) {
            let mut value = String::new();
            while pos < chars.len() && is_identifier_continue(chars[pos]) {
                value.push(chars[pos]);
                advance(&mut pos, &mut line, &mut column, &chars);
            }
            tokens.push(Token {
                kind: TokenKind::Word(value),
                line: start_line,
                column: start_column,
            });
            continue;
        }

        return Err(ScriptError::syntax(
            format!("unexpected character {c:?}"),
            start_line,
            start_column,
        ));
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        line,
        column,
    });
    Ok(tokens)
}

fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_identifier_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_simple_statement() {
        let tokens = tokenize("press A").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token {
                    kind: TokenKind::Word("press".into()),
                    line: 1,
                    column: 1,
                },
                Token {
                    kind: TokenKind::Word("A".into()),
                    line: 1,
                    column: 7,
                },
                Token {
                    kind: TokenKind::Eof,
                    line: 1,
                    column: 8,
                },
            ]
        );
    }

    #[test]
    fn comments_become_their_own_token() {
        let tokens = tokenize("press A # hold the A key\npress B").unwrap();
        assert!(tokens.iter().any(|t| matches!(t.kind, TokenKind::Comment)));
        assert!(tokens.iter().any(|t| matches!(&t.kind, TokenKind::Word(w) if w == "B")));
    }

    #[test]
    fn resolves_string_escapes() {
        let tokens = tokenize(r#"type "a\tb\nc\\d\"e""#).unwrap();
        match &tokens[1].kind {
            TokenKind::String(s) => assert_eq!(s, "a\tb\nc\\d\"e"),
            other => panic!("expected string token, got {other:?}"),
        }
    }

    #[test]
    fn preserves_unknown_escape_literally() {
        let tokens = tokenize(r#"type "a\zb""#).unwrap();
        match &tokens[1].kind {
            TokenKind::String(s) => assert_eq!(s, "a\\zb"),
            other => panic!("expected string token, got {other:?}"),
        }
    }

    #[test]
    fn reports_unterminated_string_at_opening_quote() {
        let err = tokenize("type \"abc").unwrap_err();
        assert_eq!(err.line(), 1);
        assert_eq!(err.column(), 6);
    }

    #[test]
    fn braces_are_separate_tokens() {
        let tokens = tokenize("repeat 3 { press A }").unwrap();
        assert!(tokens
            .iter()
            .any(|t| matches!(t.kind, TokenKind::BraceOpen)));
        assert!(tokens
            .iter()
            .any(|t| matches!(t.kind, TokenKind::BraceClose)));
    }
}
