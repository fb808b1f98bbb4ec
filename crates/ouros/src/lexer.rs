//! Source text to token stream, including INDENT/DEDENT synthesis.
//!
//! Grounded on the shape of `parse.rs`'s `CodeRange` position tracking and
//! `fstring.rs`'s prefix/format-spec handling in the teacher crate, but
//! written from scratch: the teacher delegates lexing to `ruff_python_parser`,
//! while this interpreter owns its own front end end to end.

use std::iter::Peekable;
use std::str::Chars;

use num_bigint::BigInt;
use num_traits::Num;

use crate::token::{Keyword, Position, Token, TokenKind};

#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxError {
    pub message: String,
    pub pos: Position,
}

impl std::fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SyntaxError: {} ({})", self.message, self.pos)
    }
}

type LexResult<T> = Result<T, SyntaxError>;

/// Tracks a pending f-string so that nested `{...}` expressions can be
/// re-lexed as ordinary tokens while balanced braces are counted.
struct FStringFrame {
    quote: char,
    triple: bool,
    raw: bool,
    /// 0 while scanning literal text; 1 while scanning the top level of an
    /// embedded `{expr}`; >1 while inside a nested bracketed expression
    /// (e.g. a dict literal within the hole).
    brace_depth: u32,
    in_format_spec: bool,
    /// `self.bracket_depth` as it stood right after the hole's opening `{`;
    /// used to tell a hole-closing `:`/`!`/`}` apart from the same characters
    /// appearing inside a nested `[...]`/`(...)`/`{...}` in the expression
    /// (e.g. a slice `f"{a[1:2]}"`).
    open_bracket_depth: u32,
}

pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    line: u32,
    column: u32,
    /// Indentation widths, always starting at `[0]`.
    indent_stack: Vec<u32>,
    /// Bracket nesting depth; while > 0, NEWLINE/INDENT/DEDENT are suppressed.
    bracket_depth: u32,
    at_line_start: bool,
    paren_since_line_start: bool,
    pending: Vec<Token>,
    fstring_stack: Vec<FStringFrame>,
    done: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            line: 1,
            column: 1,
            indent_stack: vec![0],
            bracket_depth: 0,
            at_line_start: true,
            paren_since_line_start: false,
            pending: Vec::new(),
            fstring_stack: Vec::new(),
            done: false,
        }
    }

    pub fn tokenize(mut self) -> LexResult<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token()?;
            let is_eof = matches!(tok.kind, TokenKind::Eof);
            tokens.push(tok);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }

    fn pos(&self) -> Position {
        Position::new(self.line, self.column)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn peek2(&mut self) -> Option<char> {
        let mut clone = self.chars.clone();
        clone.next();
        clone.next()
    }

    fn next_token(&mut self) -> LexResult<Token> {
        if let Some(t) = self.pending.pop() {
            return Ok(t);
        }

        if let Some(top) = self.fstring_stack.last() {
            if top.in_format_spec {
                return self.lex_fstring_format_spec();
            }
            if top.brace_depth == 0 {
                return self.lex_fstring_middle();
            }
        }

        if self.at_line_start && self.bracket_depth == 0 && self.fstring_stack.is_empty() {
            if let Some(tok) = self.handle_indentation()? {
                return Ok(tok);
            }
        }

        self.skip_intertoken_space()?;

        if let Some(top) = self.fstring_stack.last() {
            if top.brace_depth == 1 {
                if let Some(tok) = self.try_lex_fstring_hole_punctuation()? {
                    return Ok(tok);
                }
            }
        }

        let start = self.pos();
        let Some(c) = self.peek() else {
            return self.handle_eof(start);
        };

        if c == '\n' {
            self.bump();
            if self.bracket_depth == 0 {
                self.at_line_start = true;
                return Ok(Token::new(TokenKind::Newline, start));
            }
            return self.next_token();
        }

        if c.is_ascii_digit() || (c == '.' && self.peek2().is_some_and(|d| d.is_ascii_digit())) {
            return self.lex_number(start);
        }

        if is_ident_start(c) {
            return self.lex_ident_or_string_prefix(start);
        }

        if c == '"' || c == '\'' {
            return self.lex_string(start, StringPrefixFlags::default());
        }

        self.lex_operator(start)
    }

    fn handle_eof(&mut self, start: Position) -> LexResult<Token> {
        if !self.done {
            self.done = true;
            if self.indent_stack.len() > 1 {
                self.pending.push(Token::new(TokenKind::Eof, start));
                for _ in 1..self.indent_stack.len() {
                    self.pending.push(Token::new(TokenKind::Dedent, start));
                }
                self.indent_stack.truncate(1);
                return Ok(self.pending.pop().unwrap());
            }
        }
        Ok(Token::new(TokenKind::Eof, start))
    }

    /// Consumes leading whitespace on a fresh logical line and emits
    /// INDENT/DEDENT tokens as the indentation stack changes. Blank lines and
    /// comment-only lines are skipped entirely (they don't affect indentation).
    fn handle_indentation(&mut self) -> LexResult<Option<Token>> {
        loop {
            let mut width = 0u32;
            let mut saw_tab_after_space = false;
            let mut saw_space = false;
            loop {
                match self.peek() {
                    Some(' ') => {
                        saw_space = true;
                        width += 1;
                        self.bump();
                    }
                    Some('\t') => {
                        if saw_space {
                            saw_tab_after_space = true;
                        }
                        width += 8 - (width % 8);
                        self.bump();
                    }
                    _ => break,
                }
            }
            match self.peek() {
                None => {
                    self.at_line_start = false;
                    return Ok(None);
                }
                Some('\n') => {
                    self.bump();
                    continue;
                }
                Some('#') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                    continue;
                }
                Some(_) => {
                    if saw_tab_after_space {
                        return Err(SyntaxError {
                            message: "inconsistent use of tabs and spaces in indentation".to_owned(),
                            pos: self.pos(),
                        });
                    }
                    self.at_line_start = false;
                    let pos = self.pos();
                    let top = *self.indent_stack.last().unwrap();
                    if width > top {
                        self.indent_stack.push(width);
                        return Ok(Some(Token::new(TokenKind::Indent, pos)));
                    }
                    if width < top {
                        let mut dedents = 0;
                        while *self.indent_stack.last().unwrap() > width {
                            self.indent_stack.pop();
                            dedents += 1;
                        }
                        if *self.indent_stack.last().unwrap() != width {
                            return Err(SyntaxError {
                                message: "unindent does not match any outer indentation level".to_owned(),
                                pos,
                            });
                        }
                        for _ in 1..dedents {
                            self.pending.push(Token::new(TokenKind::Dedent, pos));
                        }
                        return Ok(Some(Token::new(TokenKind::Dedent, pos)));
                    }
                    return Ok(None);
                }
            }
        }
    }

    /// Skips spaces/tabs, comments, and backslash line-continuations between
    /// tokens on the same logical line.
    fn skip_intertoken_space(&mut self) -> LexResult<()> {
        loop {
            match self.peek() {
                Some(' ' | '\t' | '\r') => {
                    self.bump();
                }
                Some('\\') if self.peek2() == Some('\n') => {
                    self.bump();
                    self.bump();
                }
                Some('\\') if self.peek2().is_none() => {
                    return Err(SyntaxError {
                        message: "unexpected end of file after line continuation".to_owned(),
                        pos: self.pos(),
                    });
                }
                Some('#') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some('\n') if self.bracket_depth > 0 => {
                    self.bump();
                }
                _ => break,
            }
        }
        Ok(())
    }

    fn lex_number(&mut self, start: Position) -> LexResult<Token> {
        let mut lexeme = String::new();
        let mut is_float = false;
        let mut radix = 10u32;

        if self.peek() == Some('0') && matches!(self.peek2(), Some('x' | 'X' | 'o' | 'O' | 'b' | 'B')) {
            self.bump(); // 0
            let marker = self.bump().unwrap();
            radix = match marker.to_ascii_lowercase() {
                'x' => 16,
                'o' => 8,
                'b' => 2,
                _ => unreachable!(),
            };
            let mut digits = String::new();
            let mut last_was_digit = false;
            while let Some(c) = self.peek() {
                if c.is_digit(radix) {
                    digits.push(c);
                    last_was_digit = true;
                    self.bump();
                } else if c == '_' {
                    if !last_was_digit {
                        return Err(SyntaxError {
                            message: "invalid placement of underscore in numeric literal".to_owned(),
                            pos: self.pos(),
                        });
                    }
                    last_was_digit = false;
                    self.bump();
                } else {
                    break;
                }
            }
            if digits.is_empty() {
                return Err(SyntaxError {
                    message: "invalid numeric literal".to_owned(),
                    pos: start,
                });
            }
            let value = BigInt::from_str_radix(&digits, radix).map_err(|_| SyntaxError {
                message: "invalid numeric literal".to_owned(),
                pos: start,
            })?;
            return Ok(Token::new(TokenKind::Int(value), start));
        }

        let mut last_was_digit = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                lexeme.push(c);
                last_was_digit = true;
                self.bump();
            } else if c == '_' {
                if !last_was_digit {
                    return Err(SyntaxError {
                        message: "invalid placement of underscore in numeric literal".to_owned(),
                        pos: self.pos(),
                    });
                }
                last_was_digit = false;
                self.bump();
            } else {
                break;
            }
        }
        if self.peek() == Some('.') && self.peek2() != Some('.') {
            is_float = true;
            lexeme.push('.');
            self.bump();
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() {
                    lexeme.push(c);
                    self.bump();
                } else if c == '_' {
                    self.bump();
                } else {
                    break;
                }
            }
        }
        if matches!(self.peek(), Some('e' | 'E'))
            && (self.peek2().is_some_and(|d| d.is_ascii_digit())
                || matches!(self.peek2(), Some('+' | '-')))
        {
            is_float = true;
            lexeme.push('e');
            self.bump();
            if matches!(self.peek(), Some('+' | '-')) {
                lexeme.push(self.peek().unwrap());
                self.bump();
            }
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() {
                    lexeme.push(c);
                    self.bump();
                } else if c == '_' {
                    self.bump();
                } else {
                    break;
                }
            }
        }
        if matches!(self.peek(), Some('j' | 'J')) {
            // complex literals are parsed but not representable; reject clearly
            return Err(SyntaxError {
                message: "complex literals are not supported".to_owned(),
                pos: self.pos(),
            });
        }

        if is_float {
            let value: f64 = lexeme.parse().map_err(|_| SyntaxError {
                message: "invalid float literal".to_owned(),
                pos: start,
            })?;
            Ok(Token::new(TokenKind::Float(value), start))
        } else {
            let value = BigInt::from_str_radix(&lexeme, 10).map_err(|_| SyntaxError {
                message: "invalid integer literal".to_owned(),
                pos: start,
            })?;
            let _ = radix;
            Ok(Token::new(TokenKind::Int(value), start))
        }
    }

    fn lex_ident_or_string_prefix(&mut self, start: Position) -> LexResult<Token> {
        let mut ident = String::new();
        while let Some(c) = self.peek() {
            if is_ident_continue(c) {
                ident.push(c);
                self.bump();
            } else {
                break;
            }
        }

        if ident.len() <= 2 && matches!(self.peek(), Some('"' | '\'')) {
            if let Some(flags) = string_prefix_flags(&ident) {
                return self.lex_string(start, flags);
            }
        }

        if let Some(kw) = Keyword::from_str(&ident) {
            return Ok(Token::new(TokenKind::Keyword(kw), start));
        }
        Ok(Token::new(TokenKind::Ident(ident), start))
    }

    fn lex_string(&mut self, start: Position, flags: StringPrefixFlags) -> LexResult<Token> {
        let quote = self.bump().unwrap(); // opening quote
        let triple = self.peek() == Some(quote) && self.peek2() == Some(quote);
        if triple {
            self.bump();
            self.bump();
        }

        if flags.fstring {
            self.fstring_stack.push(FStringFrame {
                quote,
                triple,
                raw: flags.raw,
                brace_depth: 0,
                in_format_spec: false,
                open_bracket_depth: 0,
            });
            return Ok(Token::new(TokenKind::FStringStart, start));
        }

        let mut buf = String::new();
        let mut raw_bytes = Vec::new();
        loop {
            let Some(c) = self.peek() else {
                return Err(SyntaxError {
                    message: "unterminated string literal".to_owned(),
                    pos: start,
                });
            };
            if c == quote {
                if triple {
                    let save = self.chars.clone();
                    let save_line = self.line;
                    let save_col = self.column;
                    self.bump();
                    if self.peek() == Some(quote) && self.peek2() == Some(quote) {
                        self.bump();
                        self.bump();
                        break;
                    }
                    self.chars = save;
                    self.line = save_line;
                    self.column = save_col;
                    buf.push(c);
                    if flags.bytes {
                        raw_bytes.push(c as u8);
                    }
                    self.bump();
                    continue;
                }
                self.bump();
                break;
            }
            if !triple && c == '\n' {
                return Err(SyntaxError {
                    message: "unterminated string literal (newline in single-line string)".to_owned(),
                    pos: start,
                });
            }
            if c == '\\' && !flags.raw {
                self.bump();
                self.lex_escape(&mut buf, &mut raw_bytes, flags.bytes)?;
                continue;
            }
            if c == '\\' && flags.raw {
                buf.push(c);
                if flags.bytes {
                    raw_bytes.push(c as u8);
                }
                self.bump();
                if let Some(next) = self.peek() {
                    buf.push(next);
                    if flags.bytes {
                        raw_bytes.push(next as u8);
                    }
                    self.bump();
                }
                continue;
            }
            buf.push(c);
            if flags.bytes {
                let mut tmp = [0u8; 4];
                for b in c.encode_utf8(&mut tmp).as_bytes() {
                    raw_bytes.push(*b);
                }
            }
            self.bump();
        }

        if flags.bytes {
            Ok(Token::new(TokenKind::Bytes(raw_bytes), start))
        } else {
            Ok(Token::new(TokenKind::Str(buf), start))
        }
    }

    fn lex_escape(&mut self, buf: &mut String, raw_bytes: &mut Vec<u8>, as_bytes: bool) -> LexResult<()> {
        let Some(c) = self.bump() else {
            return Err(SyntaxError {
                message: "unterminated escape sequence".to_owned(),
                pos: self.pos(),
            });
        };
        let decoded = match c {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            '\\' => '\\',
            '\'' => '\'',
            '"' => '"',
            '0' => '\0',
            'a' => '\u{7}',
            'b' => '\u{8}',
            'f' => '\u{c}',
            'v' => '\u{b}',
            '\n' => return Ok(()), // escaped newline joins the line, contributes nothing
            'x' => {
                let hi = self.bump().ok_or_else(|| SyntaxError {
                    message: "truncated \\x escape".to_owned(),
                    pos: self.pos(),
                })?;
                let lo = self.bump().ok_or_else(|| SyntaxError {
                    message: "truncated \\x escape".to_owned(),
                    pos: self.pos(),
                })?;
                let byte = u8::from_str_radix(&format!("{hi}{lo}"), 16).map_err(|_| SyntaxError {
                    message: "invalid \\x escape".to_owned(),
                    pos: self.pos(),
                })?;
                byte as char
            }
            other => {
                // Unknown escape: keep backslash and character literally, as
                // the reference language does for non-raw strings.
                buf.push('\\');
                if as_bytes {
                    raw_bytes.push(b'\\');
                }
                other
            }
        };
        buf.push(decoded);
        if as_bytes {
            raw_bytes.push(decoded as u8);
        }
        Ok(())
    }

    /// Scans f-string literal text (the parts outside `{...}`), handling
    /// `{{`/`}}` escapes, until an unescaped `{` opens a hole or the
    /// enclosing quote closes the string.
    fn lex_fstring_middle(&mut self) -> LexResult<Token> {
        let start = self.pos();
        let mut buf = String::new();
        loop {
            let frame = self.fstring_stack.last().expect("in fstring middle without a frame");
            let quote = frame.quote;
            let triple = frame.triple;
            match self.peek() {
                None => {
                    return Err(SyntaxError {
                        message: "unterminated f-string".to_owned(),
                        pos: start,
                    });
                }
                Some(c) if c == quote => {
                    if triple {
                        let save = (self.chars.clone(), self.line, self.column);
                        self.bump();
                        if self.peek() == Some(quote) && self.peek2() == Some(quote) {
                            self.bump();
                            self.bump();
                            self.fstring_stack.pop();
                            self.pending.push(Token::new(TokenKind::FStringEnd, self.pos()));
                            return self.finish_fstring_middle(buf, start);
                        }
                        (self.chars, self.line, self.column) = save;
                        buf.push(c);
                        self.bump();
                        continue;
                    }
                    self.bump();
                    self.fstring_stack.pop();
                    self.pending.push(Token::new(TokenKind::FStringEnd, self.pos()));
                    return self.finish_fstring_middle(buf, start);
                }
                Some('{') if self.peek2() == Some('{') => {
                    self.bump();
                    self.bump();
                    buf.push('{');
                }
                Some('}') if self.peek2() == Some('}') => {
                    self.bump();
                    self.bump();
                    buf.push('}');
                }
                Some('{') => {
                    self.bump();
                    self.bracket_depth += 1;
                    let depth = self.bracket_depth;
                    let frame = self.fstring_stack.last_mut().unwrap();
                    frame.brace_depth = 1;
                    frame.open_bracket_depth = depth;
                    self.pending.push(Token::new(TokenKind::FStringExprStart, self.pos()));
                    return self.finish_fstring_middle(buf, start);
                }
                Some(c) => {
                    buf.push(c);
                    self.bump();
                }
            }
        }
    }

    /// Returns `FStringMiddle(buf)` now if there was any literal text,
    /// otherwise immediately returns the token queued in `pending`.
    fn finish_fstring_middle(&mut self, buf: String, start: Position) -> LexResult<Token> {
        if buf.is_empty() {
            Ok(self.pending.pop().expect("pending fstring token"))
        } else {
            Ok(Token::new(TokenKind::FStringMiddle(buf), start))
        }
    }

    /// At the top level of an f-string hole (`frame.brace_depth == 1`),
    /// recognizes `!conv`, `:spec`, and the closing `}` before falling back
    /// to ordinary expression tokenization.
    fn try_lex_fstring_hole_punctuation(&mut self) -> LexResult<Option<Token>> {
        let start = self.pos();
        let frame_open_depth = self.fstring_stack.last().unwrap().open_bracket_depth;
        if self.bracket_depth != frame_open_depth {
            // Inside a nested bracket within the hole (e.g. a slice or dict
            // literal); these characters belong to ordinary tokenization.
            return Ok(None);
        }
        match self.peek() {
            Some('!') if !matches!(self.peek2(), Some('=')) => {
                self.bump();
                let conv = self.bump().ok_or_else(|| SyntaxError {
                    message: "expected conversion character after '!'".to_owned(),
                    pos: start,
                })?;
                if !matches!(conv, 'r' | 's' | 'a') {
                    return Err(SyntaxError {
                        message: format!("invalid conversion character {conv:?}, expected one of r/s/a"),
                        pos: start,
                    });
                }
                Ok(Some(Token::new(TokenKind::FStringConversion(conv), start)))
            }
            Some(':') => {
                self.bump();
                self.fstring_stack.last_mut().unwrap().in_format_spec = true;
                Ok(Some(Token::new(TokenKind::FStringFormatSpecStart, start)))
            }
            Some('}') => {
                self.bump();
                self.bracket_depth = self.bracket_depth.saturating_sub(1);
                self.fstring_stack.last_mut().unwrap().brace_depth = 0;
                Ok(Some(Token::new(TokenKind::FStringExprEnd, start)))
            }
            _ => Ok(None),
        }
    }

    /// Captures the raw text of a format spec (after `:`), tracking brace
    /// depth so nested replacement fields (`{x:{width}}`) are preserved
    /// verbatim for the evaluator's `format()` to re-parse at runtime.
    fn lex_fstring_format_spec(&mut self) -> LexResult<Token> {
        let start = self.pos();
        let quote = self.fstring_stack.last().unwrap().quote;
        let triple = self.fstring_stack.last().unwrap().triple;
        let mut buf = String::new();
        let mut depth = 0u32;
        loop {
            match self.peek() {
                None => {
                    return Err(SyntaxError {
                        message: "unterminated format spec in f-string".to_owned(),
                        pos: start,
                    });
                }
                Some('{') => {
                    depth += 1;
                    buf.push('{');
                    self.bump();
                }
                Some('}') if depth > 0 => {
                    depth -= 1;
                    buf.push('}');
                    self.bump();
                }
                Some('}') => {
                    self.bump();
                    self.bracket_depth = self.bracket_depth.saturating_sub(1);
                    let frame = self.fstring_stack.last_mut().unwrap();
                    frame.in_format_spec = false;
                    frame.brace_depth = 0;
                    self.pending.push(Token::new(TokenKind::FStringExprEnd, self.pos()));
                    // Reuse FStringMiddle as the carrier for the spec's raw text;
                    // the parser treats a format-spec text token distinctly by
                    // context (it always directly follows FStringFormatSpecStart).
                    return Ok(Token::new(TokenKind::FStringMiddle(buf), start));
                }
                Some(c) if c == quote && !triple => {
                    return Err(SyntaxError {
                        message: "unterminated format spec in f-string".to_owned(),
                        pos: start,
                    });
                }
                Some(c) => {
                    buf.push(c);
                    self.bump();
                }
            }
        }
    }

    fn lex_operator(&mut self, start: Position) -> LexResult<Token> {
        let c = self.bump().unwrap();
        macro_rules! two {
            ($second:expr, $two_kind:expr, $one_kind:expr) => {{
                if self.peek() == Some($second) {
                    self.bump();
                    $two_kind
                } else {
                    $one_kind
                }
            }};
        }
        let kind = match c {
            '(' => {
                self.bracket_depth += 1;
                TokenKind::LParen
            }
            ')' => {
                self.bracket_depth = self.bracket_depth.saturating_sub(1);
                TokenKind::RParen
            }
            '[' => {
                self.bracket_depth += 1;
                TokenKind::LBracket
            }
            ']' => {
                self.bracket_depth = self.bracket_depth.saturating_sub(1);
                TokenKind::RBracket
            }
            '{' => {
                if let Some(frame) = self.fstring_stack.last_mut() {
                    frame.brace_depth += 1;
                }
                self.bracket_depth += 1;
                TokenKind::LBrace
            }
            '}' => {
                self.bracket_depth = self.bracket_depth.saturating_sub(1);
                if let Some(frame) = self.fstring_stack.last_mut() {
                    frame.brace_depth = frame.brace_depth.saturating_sub(1);
                }
                TokenKind::RBrace
            }
            ',' => TokenKind::Comma,
            ':' => two!('=', TokenKind::Walrus, TokenKind::Colon),
            ';' => TokenKind::Semicolon,
            '~' => TokenKind::Tilde,
            '+' => two!('=', TokenKind::PlusEq, TokenKind::Plus),
            '-' => {
                if self.peek() == Some('>') {
                    self.bump();
                    TokenKind::Arrow
                } else {
                    two!('=', TokenKind::MinusEq, TokenKind::Minus)
                }
            }
            '%' => two!('=', TokenKind::PercentEq, TokenKind::Percent),
            '^' => two!('=', TokenKind::CaretEq, TokenKind::Caret),
            '@' => two!('=', TokenKind::AtEq, TokenKind::At),
            '&' => two!('=', TokenKind::AmpEq, TokenKind::Amp),
            '|' => two!('=', TokenKind::PipeEq, TokenKind::Pipe),
            '*' => {
                if self.peek() == Some('*') {
                    self.bump();
                    two!('=', TokenKind::DoubleStarEq, TokenKind::DoubleStar)
                } else {
                    two!('=', TokenKind::StarEq, TokenKind::Star)
                }
            }
            '/' => {
                if self.peek() == Some('/') {
                    self.bump();
                    two!('=', TokenKind::DoubleSlashEq, TokenKind::DoubleSlash)
                } else {
                    two!('=', TokenKind::SlashEq, TokenKind::Slash)
                }
            }
            '<' => {
                if self.peek() == Some('<') {
                    self.bump();
                    two!('=', TokenKind::LShiftEq, TokenKind::LShift)
                } else {
                    two!('=', TokenKind::LtEq, TokenKind::Lt)
                }
            }
            '>' => {
                if self.peek() == Some('>') {
                    self.bump();
                    two!('=', TokenKind::RShiftEq, TokenKind::RShift)
                } else {
                    two!('=', TokenKind::GtEq, TokenKind::Gt)
                }
            }
            '=' => two!('=', TokenKind::EqEq, TokenKind::Assign),
            '!' => {
                if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::NotEq
                } else {
                    return Err(SyntaxError {
                        message: "unexpected character '!'".to_owned(),
                        pos: start,
                    });
                }
            }
            '.' => {
                if self.peek() == Some('.') && self.peek2() == Some('.') {
                    self.bump();
                    self.bump();
                    TokenKind::Ellipsis
                } else {
                    TokenKind::Dot
                }
            }
            '"' | '\'' => {
                // Closing quote of an enclosing f-string expression part, or a
                // plain string we mis-dispatched; only reachable for f-strings
                // resuming after `}`.
                return self.lex_string(start, StringPrefixFlags::default());
            }
            other => {
                return Err(SyntaxError {
                    message: format!("unexpected character {other:?}"),
                    pos: start,
                });
            }
        };
        Ok(Token::new(kind, start))
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct StringPrefixFlags {
    raw: bool,
    bytes: bool,
    fstring: bool,
}

fn string_prefix_flags(prefix: &str) -> Option<StringPrefixFlags> {
    let mut flags = StringPrefixFlags::default();
    for c in prefix.chars() {
        match c.to_ascii_lowercase() {
            'r' => flags.raw = true,
            'b' => flags.bytes = true,
            'f' => flags.fstring = true,
            'u' => {}
            _ => return None,
        }
    }
    if flags.bytes && flags.fstring {
        return None;
    }
    Some(flags)
}

fn is_ident_start(c: char) -> bool {
    c == '_' || c.is_alphabetic()
}

fn is_ident_continue(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src).tokenize().unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn indent_dedent_roundtrip() {
        let toks = kinds("if x:\n    y\nz\n");
        assert!(matches!(toks[4], TokenKind::Indent));
        assert!(toks.iter().any(|k| matches!(k, TokenKind::Dedent)));
    }

    #[test]
    fn underscored_numeric_literal() {
        let toks = kinds("1_000_000");
        assert_eq!(toks[0], TokenKind::Int(BigInt::from(1_000_000)));
    }

    #[test]
    fn hex_literal() {
        let toks = kinds("0xFF");
        assert_eq!(toks[0], TokenKind::Int(BigInt::from(255)));
    }

    #[test]
    fn float_literal_with_exponent() {
        let toks = kinds("1.5e2");
        assert_eq!(toks[0], TokenKind::Float(150.0));
    }

    #[test]
    fn power_is_not_two_stars() {
        let toks = kinds("2**3");
        assert_eq!(toks[1], TokenKind::DoubleStar);
    }

    #[test]
    fn raw_string_keeps_backslashes() {
        let toks = kinds(r#"r"a\nb""#);
        assert_eq!(toks[0], TokenKind::Str("a\\nb".to_owned()));
    }

    #[test]
    fn bracket_suppresses_newline() {
        let toks = kinds("(1,\n2)\n");
        assert!(!toks.iter().any(|k| matches!(k, TokenKind::Newline)) || {
            // the only Newline should be the one after the closing paren
            toks.iter().filter(|k| matches!(k, TokenKind::Newline)).count() == 1
        });
    }

    #[test]
    fn inconsistent_indentation_errors() {
        let err = Lexer::new("if x:\n  y\n\tz\n").tokenize();
        assert!(err.is_err());
    }
}
