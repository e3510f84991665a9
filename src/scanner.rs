//! Streaming lexer for Lox source text.
//!
//! [`Scanner`] is an iterator of `Result<Token, LoxError>`: a bad character
//! yields one `Err` and scanning carries on with the next byte, so a caller can
//! collect every lexical problem in one pass.  The stream always ends with a
//! single `EOF` token, after which the iterator is fused.
//!
//! Lexemes are slices of the input, never copies.  Positions are byte offsets;
//! anything outside ASCII is only legal inside string literals, and a stray
//! multibyte character is reported as a whole so slices stay on `char`
//! boundaries.
//!
//! ```rust
//! use rox::scanner::Scanner;
//!
//! let kinds: Vec<String> = Scanner::new("print 1 + x;")
//!     .filter_map(Result::ok)
//!     .map(|t| t.token_type.name().to_string())
//!     .collect();
//!
//! assert_eq!(kinds, ["PRINT", "NUMBER", "PLUS", "IDENTIFIER", "SEMICOLON", "EOF"]);
//! ```

use std::iter::FusedIterator;

use log::{debug, info};
use memchr::{memchr, memchr_iter};

use crate::error::{LoxError, Result};
use crate::token::{Token, TokenType};

pub struct Scanner<'a> {
    text: &'a str,
    src: &'a [u8],
    start: usize, // first byte of the lexeme being scanned
    curr: usize,  // next byte to examine
    line: usize,
    done: bool, // EOF already emitted
}

impl<'a> Scanner<'a> {
    pub fn new(text: &'a str) -> Self {
        info!("Scanner created over {} bytes", text.len());

        Self {
            text,
            src: text.as_bytes(),
            start: 0,
            curr: 0,
            line: 1,
            done: false,
        }
    }

    #[inline(always)]
    fn is_at_end(&self) -> bool {
        self.curr >= self.src.len()
    }

    /// Current byte, or `0` past the end.
    #[inline(always)]
    fn peek(&self) -> u8 {
        self.src.get(self.curr).copied().unwrap_or(0)
    }

    #[inline(always)]
    fn peek_next(&self) -> u8 {
        self.src.get(self.curr + 1).copied().unwrap_or(0)
    }

    #[inline(always)]
    fn bump(&mut self) -> u8 {
        let b = self.peek();
        self.curr += 1;
        b
    }

    /// `matched` if the next byte is `second` (consuming it), else `single`.
    #[inline(always)]
    fn either(&mut self, second: u8, matched: TokenType, single: TokenType) -> TokenType {
        if !self.is_at_end() && self.peek() == second {
            self.curr += 1;
            matched
        } else {
            single
        }
    }

    #[inline(always)]
    fn lexeme(&self) -> &'a str {
        &self.text[self.start..self.curr]
    }

    /// Scan from `self.start`.  `None` means trivia (whitespace or a
    /// comment) was skipped and no token is due.
    fn scan_token(&mut self) -> Option<Result<TokenType>> {
        use TokenType::*;

        let kind = match self.bump() {
            b'(' => LEFT_PAREN,
            b')' => RIGHT_PAREN,
            b'{' => LEFT_BRACE,
            b'}' => RIGHT_BRACE,
            b',' => COMMA,
            b'.' => DOT,
            b'-' => MINUS,
            b'+' => PLUS,
            b';' => SEMICOLON,
            b'*' => STAR,

            b'!' => self.either(b'=', BANG_EQUAL, BANG),
            b'=' => self.either(b'=', EQUAL_EQUAL, EQUAL),
            b'<' => self.either(b'=', LESS_EQUAL, LESS),
            b'>' => self.either(b'=', GREATER_EQUAL, GREATER),

            b'/' if self.peek() == b'/' => {
                // The newline itself is left for the main loop to count.
                let end: usize = memchr(b'\n', &self.src[self.curr..])
                    .map_or(self.src.len(), |offset| self.curr + offset);
                self.curr = end;
                return None;
            }
            b'/' => SLASH,

            b' ' | b'\r' | b'\t' => return None,
            b'\n' => {
                self.line += 1;
                return None;
            }

            b'"' => return Some(self.string()),
            b'0'..=b'9' => return Some(self.number()),
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.identifier(),

            _ => return Some(Err(self.unexpected())),
        };

        Some(Ok(kind))
    }

    fn string(&mut self) -> Result<TokenType> {
        let rest: &[u8] = &self.src[self.curr..];

        let Some(close) = memchr(b'"', rest) else {
            self.line += memchr_iter(b'\n', rest).count();
            self.curr = self.src.len();
            return Err(LoxError::lex(self.line, "Unterminated string."));
        };

        // Strings may span lines; the token reports the line it ends on.
        self.line += memchr_iter(b'\n', &rest[..close]).count();
        self.curr += close + 1;

        let body: &str = &self.text[self.start + 1..self.curr - 1];
        Ok(TokenType::STRING(body.to_owned()))
    }

    fn number(&mut self) -> Result<TokenType> {
        while self.peek().is_ascii_digit() {
            self.curr += 1;
        }

        if self.peek() == b'.' && self.peek_next().is_ascii_digit() {
            self.curr += 1;
            while self.peek().is_ascii_digit() {
                self.curr += 1;
            }
        }

        self.lexeme()
            .parse::<f64>()
            .map(TokenType::NUMBER)
            .map_err(|e| LoxError::lex(self.line, format!("Invalid number: {}", e)))
    }

    fn identifier(&mut self) -> TokenType {
        while matches!(self.peek(), b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_') {
            self.curr += 1;
        }

        TokenType::keyword(self.lexeme().as_bytes()).unwrap_or(TokenType::IDENTIFIER)
    }

    /// Report the character at `self.start`, consuming all of its bytes.
    fn unexpected(&mut self) -> LoxError {
        let ch: char = self.text[self.start..].chars().next().unwrap_or('\u{FFFD}');
        self.curr = self.start + ch.len_utf8();

        LoxError::lex(self.line, format!("Unexpected character: {}", ch))
    }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Result<Token<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        while !self.is_at_end() {
            self.start = self.curr;

            match self.scan_token() {
                None => continue,
                Some(Err(e)) => return Some(Err(e)),
                Some(Ok(kind)) => {
                    debug!("Scanned {:?} on line {}", kind, self.line);
                    return Some(Ok(Token::new(kind, self.lexeme(), self.line)));
                }
            }
        }

        self.done = true;
        Some(Ok(Token::new(TokenType::EOF, "", self.line)))
    }
}

impl FusedIterator for Scanner<'_> {}

/// Scan `src` to completion, separating tokens from lexical errors.  The token
/// list always ends with `EOF`.
pub fn scan_tokens(src: &str) -> (Vec<Token<'_>>, Vec<LoxError>) {
    let mut tokens: Vec<Token<'_>> = Vec::new();
    let mut errors: Vec<LoxError> = Vec::new();

    for result in Scanner::new(src) {
        match result {
            Ok(token) => tokens.push(token),
            Err(e) => errors.push(e),
        }
    }

    info!(
        "Scanned {} token(s) with {} error(s)",
        tokens.len(),
        errors.len()
    );

    (tokens, errors)
}
