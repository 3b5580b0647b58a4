//! Single-pass compiler from a token stream to ODKey bytecode.

use super::error::ScriptError;
use super::keys::{char_to_keycode, lookup_keycode, KEY_CODES, MODIFIER_BITS};
use super::lexer::{tokenize, Token, TokenKind};
use super::opcodes::*;

const DEFAULT_PRESS_TIME_MS: u32 = 30;
const DEFAULT_INTERKEY_TIME_MS: u32 = 30;

/// Compiles ODKeyScript source into bytecode.
///
/// A fresh `Compiler` uses the default press/inter-key timings and the
/// lenient character-fallback behaviour (unmapped characters in a `type`
/// statement lower to `SPACE`). Use [`Compiler::with_strict_typing`] to
/// reject them instead.
pub struct Compiler {
    tokens: Vec<Token>,
    pos: usize,
    code: Vec<u8>,
    press_time_ms: u32,
    interkey_time_ms: u32,
    next_counter: u16,
    loop_stack: Vec<usize>,
    strict_typing: bool,
}

impl Compiler {
    /// Creates a compiler for `source`, tokenizing it immediately so lexical
    /// errors surface before any compilation work begins.
    pub fn new(source: &str) -> Result<Self, ScriptError> {
        Ok(Self {
            tokens: tokenize(source)?,
            pos: 0,
            code: Vec::new(),
            press_time_ms: DEFAULT_PRESS_TIME_MS,
            interkey_time_ms: DEFAULT_INTERKEY_TIME_MS,
            next_counter: 0,
            loop_stack: Vec::new(),
            strict_typing: false,
        })
    }

    /// When `strict` is `true`, a `type` statement containing a character
    /// with no entry in the printable-character table is a semantic error
    /// instead of silently lowering to `SPACE`.
    pub fn with_strict_typing(mut self, strict: bool) -> Self {
        self.strict_typing = strict;
        self
    }

    /// Compiles the tokenized source into bytecode.
    pub fn compile(mut self) -> Result<Vec<u8>, ScriptError> {
        self.compile_statements(false)?;
        if !self.loop_stack.is_empty() {
            return Err(ScriptError::semantic(
                "unclosed repeat block",
                self.peek().line,
                self.peek().column,
            ));
        }
        Ok(self.code)
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    /// Advances past any run of `Comment` tokens sitting at the current
    /// position. Called everywhere the parser expects the next "real" token,
    /// since comments are noise to every rule but `keyup`'s bare-vs-operand
    /// check, which peeks the raw stream itself before this runs.
    fn skip_comments(&mut self) {
        while matches!(self.peek().kind, TokenKind::Comment) {
            self.advance();
        }
    }

    fn compile_statements(&mut self, inside_block: bool) -> Result<(), ScriptError> {
        loop {
            self.skip_comments();
            match &self.peek().kind {
                TokenKind::Eof => {
                    if inside_block {
                        return Err(ScriptError::semantic(
                            "expected '}' before end of input",
                            self.peek().line,
                            self.peek().column,
                        ));
                    }
                    return Ok(());
                }
                TokenKind::BraceClose => {
                    if inside_block {
                        return Ok(());
                    }
                    let tok = self.peek();
                    return Err(ScriptError::syntax("unmatched '}'", tok.line, tok.column));
                }
                _ => self.compile_statement()?,
            }
        }
    }

    fn compile_statement(&mut self) -> Result<(), ScriptError> {
        let token = self.advance();
        let word = match token.kind {
            TokenKind::Word(w) => w,
            other => {
                return Err(ScriptError::syntax(
                    format!("expected a statement, found {other:?}"),
                    token.line,
                    token.column,
                ))
            }
        };

        match word.as_str() {
            "press_time" => self.compile_press_time(token.line, token.column),
            "interkey_time" => self.compile_interkey_time(token.line, token.column),
            "keydn" => self.compile_keydn(token.line, token.column),
            "keyup" => self.compile_keyup(token.line, token.column),
            "press" => self.compile_press(token.line, token.column),
            "type" => self.compile_type(token.line, token.column),
            "repeat" => self.compile_repeat(token.line, token.column),
            "pause" => self.compile_pause(token.line, token.column),
            other => Err(ScriptError::semantic(
                format!("unknown statement '{other}'"),
                token.line,
                token.column,
            )),
        }
    }

    fn expect_number(&mut self) -> Result<u32, ScriptError> {
        self.skip_comments();
        let token = self.advance();
        match token.kind {
            TokenKind::Number(n) => Ok(n),
            other => Err(ScriptError::syntax(
                format!("expected a number, found {other:?}"),
                token.line,
                token.column,
            )),
        }
    }

    fn compile_press_time(&mut self, line: usize, column: usize) -> Result<(), ScriptError> {
        let ms = self.expect_number()?;
        if ms > u32::from(u16::MAX) {
            return Err(ScriptError::semantic(
                "press_time out of range",
                line,
                column,
            ));
        }
        self.press_time_ms = ms;
        Ok(())
    }

    fn compile_interkey_time(&mut self, line: usize, column: usize) -> Result<(), ScriptError> {
        let ms = self.expect_number()?;
        if ms > u32::from(u16::MAX) {
            return Err(ScriptError::semantic(
                "interkey_time out of range",
                line,
                column,
            ));
        }
        self.interkey_time_ms = ms;
        Ok(())
    }

    /// Parses a run of key and modifier words following a `keydn`/`keyup`/
    /// `press` statement, skipping over any interleaved comments and
    /// stopping (without consuming) at the next statement keyword, brace or
    /// end of input. Any other word is, by construction, meant to name a
    /// key or modifier, so one that matches neither table is a semantic
    /// error rather than being left for the next statement. Rejects a 7th
    /// key per instruction.
    fn parse_key_operands(
        &mut self,
        line: usize,
        column: usize,
    ) -> Result<(u8, Vec<u8>), ScriptError> {
        let mut modifiers = 0u8;
        let mut keys = Vec::new();
        loop {
            self.skip_comments();
            let word = match &self.peek().kind {
                TokenKind::Word(w) => w.clone(),
                _ => break,
            };
            if let Some(&bit) = MODIFIER_BITS.get(word.as_str()) {
                modifiers |= bit;
                self.advance();
                continue;
            }
            if let Some(&code) = KEY_CODES.get(word.as_str()) {
                if keys.len() >= 6 {
                    return Err(ScriptError::semantic(
                        "at most 6 keys may be held at once",
                        line,
                        column,
                    ));
                }
                keys.push(code);
                self.advance();
                continue;
            }
            if is_statement_keyword(&word) {
                break;
            }
            return Err(ScriptError::semantic(
                format!("'{word}' is not a known key or modifier name"),
                self.peek().line,
                self.peek().column,
            ));
        }
        Ok((modifiers, keys))
    }

    fn emit_keydn(&mut self, modifiers: u8, keys: &[u8]) {
        self.code.push(KEYDN);
        self.code.push(modifiers);
        self.code.push(keys.len() as u8);
        self.code.extend_from_slice(keys);
    }

    fn emit_keyup(&mut self, modifiers: u8, keys: &[u8]) {
        self.code.push(KEYUP);
        self.code.push(modifiers);
        self.code.push(keys.len() as u8);
        self.code.extend_from_slice(keys);
    }

    fn emit_keyup_all(&mut self) {
        self.code.push(KEYUP_ALL);
    }

    fn emit_wait(&mut self, ms: u32) {
        self.code.push(WAIT);
        self.code.extend_from_slice(&(ms as u16).to_le_bytes());
    }

    fn compile_keydn(&mut self, line: usize, column: usize) -> Result<(), ScriptError> {
        let (modifiers, keys) = self.parse_key_operands(line, column)?;
        self.emit_keydn(modifiers, &keys);
        Ok(())
    }

    fn compile_keyup(&mut self, line: usize, column: usize) -> Result<(), ScriptError> {
        // Peek the raw next token, before `skip_comments` runs anywhere: a
        // comment immediately after `keyup` means "nothing follows", same
        // as end of input.
        if matches!(self.peek().kind, TokenKind::Eof | TokenKind::Comment) {
            self.emit_keyup_all();
            return Ok(());
        }
        let (modifiers, keys) = self.parse_key_operands(line, column)?;
        if keys.is_empty() && modifiers == 0 {
            self.emit_keyup_all();
        } else {
            self.emit_keyup(modifiers, &keys);
        }
        Ok(())
    }

    fn compile_press(&mut self, line: usize, column: usize) -> Result<(), ScriptError> {
        let (modifiers, keys) = self.parse_key_operands(line, column)?;
        if keys.is_empty() {
            return Err(ScriptError::semantic(
                "press requires at least one key",
                line,
                column,
            ));
        }
        self.emit_keydn(modifiers, &keys);
        self.emit_wait(self.press_time_ms);
        self.emit_keyup(modifiers, &keys);
        self.emit_wait(self.interkey_time_ms);
        Ok(())
    }

    fn compile_type(&mut self, line: usize, column: usize) -> Result<(), ScriptError> {
        self.skip_comments();
        let token = self.advance();
        let text = match token.kind {
            TokenKind::String(s) => s,
            other => {
                return Err(ScriptError::syntax(
                    format!("expected a string after 'type', found {other:?}"),
                    token.line,
                    token.column,
                ))
            }
        };

        let chars: Vec<char> = text.chars().collect();
        for (i, &c) in chars.iter().enumerate() {
            if self.strict_typing && !is_mappable(c) {
                return Err(ScriptError::semantic(
                    format!("character {c:?} has no key mapping"),
                    line,
                    column + i,
                ));
            }
            let (code, modifiers) = char_to_keycode(c);
            self.emit_keydn(modifiers, &[code]);
            self.emit_wait(self.press_time_ms);
            self.emit_keyup(modifiers, &[code]);
            if i + 1 < chars.len() {
                self.emit_wait(self.interkey_time_ms);
            }
        }
        Ok(())
    }

    fn compile_repeat(&mut self, line: usize, column: usize) -> Result<(), ScriptError> {
        let count = self.expect_number()?;
        if count > u32::from(u16::MAX) {
            return Err(ScriptError::semantic(
                "repeat count out of range",
                line,
                column,
            ));
        }

        if usize::from(self.next_counter) >= MAX_LOOP_DEPTH {
            return Err(ScriptError::semantic(
                "program uses more than 256 repeat blocks",
                line,
                column,
            ));
        }

        self.skip_comments();
        let open = self.advance();
        if !matches!(open.kind, TokenKind::BraceOpen) {
            return Err(ScriptError::syntax(
                "expected '{' after repeat count",
                open.line,
                open.column,
            ));
        }

        let counter = self.next_counter;
        self.next_counter += 1;

        self.code.push(SET_COUNTER);
        self.code.push(counter as u8);
        self.code.extend_from_slice(&(count as u16).to_le_bytes());

        let loop_start = self.code.len();
        self.loop_stack.push(loop_start);

        self.compile_statements(true)?;

        let close = self.advance();
        if !matches!(close.kind, TokenKind::BraceClose) {
            return Err(ScriptError::syntax(
                "expected '}' to close repeat block",
                close.line,
                close.column,
            ));
        }

        let loop_start = self.loop_stack.pop().expect("loop stack was pushed above");
        self.code.push(DEC);
        self.code.push(counter as u8);
        self.code.push(JNZ);
        self.code
            .extend_from_slice(&(loop_start as u32).to_le_bytes());
        Ok(())
    }

    fn compile_pause(&mut self, line: usize, column: usize) -> Result<(), ScriptError> {
        let ms = self.expect_number()?;
        if ms > u32::from(u16::MAX) {
            return Err(ScriptError::semantic("pause out of range", line, column));
        }
        self.emit_wait(ms);
        Ok(())
    }
}

const STATEMENT_KEYWORDS: &[&str] = &[
    "press_time",
    "interkey_time",
    "keydn",
    "keyup",
    "press",
    "type",
    "repeat",
    "pause",
];

fn is_statement_keyword(word: &str) -> bool {
    STATEMENT_KEYWORDS.contains(&word)
}

fn is_mappable(c: char) -> bool {
    lookup_keycode(c).is_some()
}

/// Compiles `source` into bytecode using default compiler settings.
///
/// Equivalent to `Compiler::new(source)?.compile()`.
pub fn compile(source: &str) -> Result<Vec<u8>, ScriptError> {
    Compiler::new(source)?.compile()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_single_press_byte_exact() {
        let code = compile("press A").unwrap();
        assert_eq!(
            code,
            vec![0x10, 0x00, 0x01, 0x04, 0x13, 0x1E, 0x00, 0x11, 0x00, 0x01, 0x04, 0x13, 0x1E, 0x00]
        );
    }

    #[test]
    fn press_time_affects_subsequent_press() {
        let code = compile("press_time 100\npress A").unwrap();
        let wait_pos = code.iter().position(|&b| b == WAIT).unwrap();
        let wait_ms = u16::from_le_bytes([code[wait_pos + 1], code[wait_pos + 2]]);
        assert_eq!(wait_ms, 100);
    }

    #[test]
    fn type_lowers_hi_byte_exact() {
        let code = compile(r#"type "Hi""#).unwrap();
        assert_eq!(
            code,
            vec![
                0x10, 0x02, 0x01, 0x0B, 0x13, 0x1E, 0x00, 0x11, 0x02, 0x01, 0x0B, 0x13, 0x1E, 0x00,
                0x10, 0x00, 0x01, 0x0C, 0x13, 0x1E, 0x00, 0x11, 0x00, 0x01, 0x0C,
            ]
        );
    }

    #[test]
    fn repeat_lowers_to_counter_loop() {
        let code = compile("repeat 3 { press A }").unwrap();
        assert_eq!(code[0], SET_COUNTER);
        assert_eq!(code[1], 0);
        assert_eq!(u16::from_le_bytes([code[2], code[3]]), 3);
        assert!(code.contains(&DEC));
        assert!(code.contains(&JNZ));
        let jnz_pos = code.iter().rposition(|&b| b == JNZ).unwrap();
        let target = u32::from_le_bytes(code[jnz_pos + 1..jnz_pos + 5].try_into().unwrap());
        assert_eq!(target, 4);
    }

    #[test]
    fn nested_repeat_allocates_distinct_counters() {
        let code = compile("repeat 2 { repeat 3 { press A } }").unwrap();
        let set_counter_indices: Vec<u8> = code
            .iter()
            .enumerate()
            .filter(|(_, &op)| op == SET_COUNTER)
            .map(|(i, _)| code[i + 1])
            .collect();
        assert_eq!(set_counter_indices, vec![0, 1]);
    }

    #[test]
    fn keyup_with_no_operands_emits_keyup_all() {
        let code = compile("keyup").unwrap();
        assert_eq!(code, vec![KEYUP_ALL]);
    }

    #[test]
    fn unknown_key_name_is_semantic_error() {
        let err = compile("press UNKNOWN_KEY").unwrap_err();
        assert!(matches!(err, ScriptError::Semantic { .. }));
    }

    #[test]
    fn seventh_key_is_rejected() {
        let err = compile("keydn A B C D E F G").unwrap_err();
        assert!(matches!(err, ScriptError::Semantic { .. }));
    }

    #[test]
    fn repeat_count_out_of_range_is_rejected() {
        let err = compile("repeat 65536 { press A }").unwrap_err();
        assert!(matches!(err, ScriptError::Semantic { .. }));
    }

    #[test]
    fn unclosed_repeat_block_is_rejected() {
        assert!(compile("repeat 3 { press A").is_err());
    }

    #[test]
    fn deeply_nested_repeat_is_rejected() {
        let mut source = String::new();
        for _ in 0..257 {
            source.push_str("repeat 1 { ");
        }
        source.push_str("press A");
        for _ in 0..257 {
            source.push('}');
        }
        assert!(compile(&source).is_err());
    }

    #[test]
    fn interkey_time_out_of_range_is_rejected() {
        assert!(compile("interkey_time 65536").is_err());
    }

    #[test]
    fn unmatched_brace_is_syntax_error() {
        let err = compile("press A }").unwrap_err();
        assert!(matches!(err, ScriptError::Syntax { .. }));
    }

    #[test]
    fn strict_typing_rejects_unmapped_characters() {
        let err = Compiler::new("type \"\u{1F600}\"")
            .unwrap()
            .with_strict_typing(true)
            .compile()
            .unwrap_err();
        assert!(matches!(err, ScriptError::Semantic { .. }));
    }

    #[test]
    fn lenient_typing_falls_back_to_space() {
        let code = Compiler::new("type \"\u{1F600}\"")
            .unwrap()
            .with_strict_typing(false)
            .compile()
            .unwrap();
        assert_eq!(code[3], KEY_CODES["SPACE"]);
    }

    #[test]
    fn bare_keydn_is_allowed_with_no_operands() {
        let code = compile("keydn").unwrap();
        assert_eq!(code, vec![KEYDN, 0x00, 0x00]);
    }

    #[test]
    fn press_with_only_a_modifier_and_no_key_is_rejected() {
        let err = compile("press M_LEFTCTRL").unwrap_err();
        assert!(matches!(err, ScriptError::Semantic { .. }));
    }

    #[test]
    fn keyup_followed_only_by_a_comment_emits_keyup_all() {
        let code = compile("keyup # release everything\npress A").unwrap();
        assert_eq!(code[0], KEYUP_ALL);
    }

    #[test]
    fn comment_between_keydn_operands_is_skipped() {
        let code = compile("keydn A # shift key follows\nM_LEFTSHIFT B").unwrap();
        assert_eq!(code, vec![KEYDN, 0x02, 0x02, KEY_CODES["A"], KEY_CODES["B"]]);
    }
}
