//! Line-oriented tokenizer and block-body reader.
//!
//! Full-line comments (`#`, `//`) are dropped before tokenizing. Quoted strings
//! become single tokens that keep their delimiters. The tokenizer never fails;
//! the block reader reports [`ScanError::UnexpectedEnd`] when the token stream
//! runs out inside a construct.

use std::collections::BTreeMap;
use std::path::PathBuf;

/// Errors from scanning. None of these are fatal to a run.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("token stream ended inside {construct} (last line {line})")]
    UnexpectedEnd { construct: &'static str, line: usize },
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Kind of a scanned token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Bare word: identifiers, keywords, references such as `var.name`, numbers.
    Word,
    /// Quoted string, delimiters included.
    Str,
    OpenBrace,
    CloseBrace,
    Equals,
    /// Any other single punctuation character: `( ) [ ] ,`.
    Symbol,
}

/// A token with its 1-based source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: usize,
}

impl Token {
    /// True for a bare word with exactly this text.
    pub fn is_word(&self, word: &str) -> bool {
        self.kind == TokenKind::Word && self.text == word
    }

    /// String contents without delimiters; other tokens return their text.
    pub fn unquoted(&self) -> &str {
        match self.kind {
            TokenKind::Str => unquote(&self.text),
            _ => &self.text,
        }
    }
}

/// Strip one pair of surrounding double quotes, if present.
pub fn unquote(text: &str) -> &str {
    text.strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(text)
}

/// True for lines that are entirely a comment.
pub fn is_comment_line(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with('#') || trimmed.starts_with("//")
}

const SYMBOLS: &[char] = &['(', ')', '[', ']', ','];

fn is_word_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '"' | '{' | '}' | '=') && !SYMBOLS.contains(&c)
}

/// Tokenize configuration text. Never fails; unrecognised input is skipped or
/// returned as best-effort tokens.
pub fn tokenize(source: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    for (idx, line) in source.lines().enumerate() {
        if is_comment_line(line) {
            continue;
        }
        tokenize_line(line, idx + 1, &mut tokens);
    }
    tokens
}

fn tokenize_line(line: &str, line_no: usize, out: &mut Vec<Token>) {
    let mut chars = line.char_indices().peekable();
    while let Some((start, c)) = chars.next() {
        let push = |out: &mut Vec<Token>, kind, text: &str| {
            out.push(Token {
                kind,
                text: text.to_string(),
                line: line_no,
            });
        };
        match c {
            c if c.is_whitespace() => {}
            '"' => {
                // An unterminated string runs to the end of the line.
                let mut end = line.len();
                let mut escaped = false;
                for (i, ch) in chars.by_ref() {
                    if escaped {
                        escaped = false;
                    } else if ch == '\\' {
                        escaped = true;
                    } else if ch == '"' {
                        end = i + 1;
                        break;
                    }
                }
                push(out, TokenKind::Str, &line[start..end]);
            }
            '{' => push(out, TokenKind::OpenBrace, "{"),
            '}' => push(out, TokenKind::CloseBrace, "}"),
            '=' => push(out, TokenKind::Equals, "="),
            c if SYMBOLS.contains(&c) => push(out, TokenKind::Symbol, &line[start..start + 1]),
            _ => {
                let mut end = line.len();
                while let Some(&(i, ch)) = chars.peek() {
                    if !is_word_char(ch) {
                        end = i;
                        break;
                    }
                    chars.next();
                }
                push(out, TokenKind::Word, &line[start..end]);
            }
        }
    }
}

/// Forward-only cursor over a token slice.
pub struct TokenStream<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> TokenStream<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    pub fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn last_line(&self) -> usize {
        self.tokens
            .get(self.pos.saturating_sub(1))
            .map_or(0, |t| t.line)
    }

    /// Next token, or `UnexpectedEnd` naming the construct being read.
    pub fn expect_next(&mut self, construct: &'static str) -> Result<&'a Token, ScanError> {
        match self.next() {
            Some(token) => Ok(token),
            None => Err(ScanError::UnexpectedEnd {
                construct,
                line: self.last_line(),
            }),
        }
    }

    /// Read a `{ ... }` body starting at the next `{` and collect the raw value
    /// tokens of top-level `key = value` assignments whose key is in `keys`.
    ///
    /// Nested blocks are skipped. Values that open a nested block or object are
    /// not recorded.
    pub fn read_block(
        &mut self,
        keys: &[&str],
        construct: &'static str,
    ) -> Result<BTreeMap<String, &'a Token>, ScanError> {
        loop {
            if self.expect_next(construct)?.kind == TokenKind::OpenBrace {
                break;
            }
        }

        let mut found = BTreeMap::new();
        let mut depth = 1usize;
        while depth > 0 {
            let token = self.expect_next(construct)?;
            match token.kind {
                TokenKind::OpenBrace => depth += 1,
                TokenKind::CloseBrace => depth -= 1,
                TokenKind::Word if depth == 1 && keys.contains(&token.text.as_str()) => {
                    if self.peek().is_some_and(|t| t.kind == TokenKind::Equals) {
                        self.next();
                        let value = self.expect_next(construct)?;
                        match value.kind {
                            TokenKind::OpenBrace => depth += 1,
                            TokenKind::CloseBrace => depth -= 1,
                            _ => {
                                found.insert(token.text.clone(), value);
                            }
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(found)
    }
}

impl<'a> Iterator for TokenStream<'a> {
    type Item = &'a Token;

    fn next(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(token)
    }
}
