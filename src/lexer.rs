use crate::error::LexError;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Text,
    CommentOpen,  // {#
    CommentClose, // #}
    VarOpen,      // {{
    VarClose,     // }}
    TagOpen,      // {%
    TagClose,     // %}

    // Keywords
    If,
    Elseif, // elseif, elif
    Else,
    EndIf,
    For,
    In,
    EndFor,
    Range,
    And,
    Or,
    Not,
    True,
    False,

    // Operators and punctuation
    Cmp(CmpOp),
    Assign,   // =
    Dot,      // .
    Colon,    // :
    Pipe,     // |
    Comma,    // ,
    LParen,   // (
    RParen,   // )
    LBracket, // [
    RBracket, // ]
    Plus,     // +
    Minus,    // -
    Star,     // *
    Slash,    // /
    Tilde,    // ~

    // Data
    Ident,
    Str(String), // unescaped contents
    Number,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl CmpOp {
    pub fn as_str(self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Gt => ">",
            CmpOp::Le => "<=",
            CmpOp::Ge => ">=",
        }
    }
}

/// A token and the exact source slice it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub offset: usize,
}

impl Token<'_> {
    /// Offset one past the last byte of this token.
    pub fn end(&self) -> usize {
        self.offset + self.text.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delim {
    Var,
    Tag,
    Comment,
}

impl Delim {
    fn close(self) -> &'static str {
        match self {
            Delim::Var => "}}",
            Delim::Tag => "%}",
            Delim::Comment => "#}",
        }
    }

    fn close_kind(self) -> TokenKind {
        match self {
            Delim::Var => TokenKind::VarClose,
            Delim::Tag => TokenKind::TagClose,
            Delim::Comment => TokenKind::CommentClose,
        }
    }
}

/// Lazy single-pass tokenizer. Cloning it restarts from the same position.
///
/// Each directive's closing delimiter is located before its contents are
/// scanned, so the first `}}`, `%}` or `#}` after an opener always ends it.
#[derive(Clone)]
pub struct Tokenizer<'a> {
    input: &'a str,
    cursor: usize,
    // Offset of the close delimiter of the directive being scanned.
    directive: Option<(Delim, usize)>,
    // Digits right after a `.` are a path segment, never a decimal.
    after_dot: bool,
    failed: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            cursor: 0,
            directive: None,
            after_dot: false,
            failed: false,
        }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.cursor..]
    }

    fn slice(&self, start: usize, end: usize) -> &'a str {
        &self.input[start..end]
    }

    fn token(&mut self, kind: TokenKind, len: usize) -> Token<'a> {
        let offset = self.cursor;
        self.cursor += len;
        self.after_dot = kind == TokenKind::Dot;
        Token {
            kind,
            text: self.slice(offset, offset + len),
            offset,
        }
    }

    pub fn next_token(&mut self) -> Result<Option<Token<'a>>, LexError> {
        match self.directive {
            None => self.next_outside(),
            Some((delim, close_at)) => self.next_inside(delim, close_at).map(Some),
        }
    }

    fn next_outside(&mut self) -> Result<Option<Token<'a>>, LexError> {
        let rest = self.remaining();
        if rest.is_empty() {
            return Ok(None);
        }

        let next_open = rest
            .as_bytes()
            .windows(2)
            .position(|pair| pair[0] == b'{' && matches!(pair[1], b'{' | b'%' | b'#'));

        match next_open {
            Some(0) => {
                let (delim, kind) = match &rest[..2] {
                    "{{" => (Delim::Var, TokenKind::VarOpen),
                    "{%" => (Delim::Tag, TokenKind::TagOpen),
                    _ => (Delim::Comment, TokenKind::CommentOpen),
                };
                let close_at = rest[2..]
                    .find(delim.close())
                    .map(|idx| self.cursor + 2 + idx)
                    .ok_or_else(|| {
                        LexError::new(
                            self.cursor,
                            format!("unterminated `{}`: missing `{}`", &rest[..2], delim.close()),
                        )
                    })?;
                self.directive = Some((delim, close_at));
                Ok(Some(self.token(kind, 2)))
            }
            Some(idx) => Ok(Some(self.token(TokenKind::Text, idx))),
            None => Ok(Some(self.token(TokenKind::Text, rest.len()))),
        }
    }

    fn next_inside(&mut self, delim: Delim, close_at: usize) -> Result<Token<'a>, LexError> {
        if delim == Delim::Comment {
            // Comment bodies are opaque.
            if self.cursor < close_at {
                return Ok(self.token(TokenKind::Text, close_at - self.cursor));
            }
            self.directive = None;
            return Ok(self.token(TokenKind::CommentClose, 2));
        }

        let body = self.slice(self.cursor, close_at);
        let skipped = body.len() - body.trim_start().len();
        self.cursor += skipped;

        if self.cursor == close_at {
            self.directive = None;
            return Ok(self.token(delim.close_kind(), 2));
        }

        let rest = self.slice(self.cursor, close_at);

        for (op, kind) in [
            ("==", CmpOp::Eq),
            ("!=", CmpOp::Ne),
            ("<=", CmpOp::Le),
            (">=", CmpOp::Ge),
            ("<", CmpOp::Lt),
            (">", CmpOp::Gt),
        ] {
            if rest.starts_with(op) {
                return Ok(self.token(TokenKind::Cmp(kind), op.len()));
            }
        }

        // Every branch below has a non-empty `rest`.
        let first = match rest.chars().next() {
            Some(c) => c,
            None => return Err(LexError::new(self.cursor, "unexpected end of directive")),
        };

        let punct = match first {
            '=' => Some(TokenKind::Assign),
            '.' => Some(TokenKind::Dot),
            ':' => Some(TokenKind::Colon),
            '|' => Some(TokenKind::Pipe),
            ',' => Some(TokenKind::Comma),
            '(' => Some(TokenKind::LParen),
            ')' => Some(TokenKind::RParen),
            '[' => Some(TokenKind::LBracket),
            ']' => Some(TokenKind::RBracket),
            '+' => Some(TokenKind::Plus),
            '-' => Some(TokenKind::Minus),
            '*' => Some(TokenKind::Star),
            '/' => Some(TokenKind::Slash),
            '~' => Some(TokenKind::Tilde),
            _ => None,
        };
        if let Some(kind) = punct {
            return Ok(self.token(kind, 1));
        }

        if first == '\'' || first == '"' {
            return self.string(first, rest);
        }

        if first.is_ascii_digit() {
            return self.number(rest);
        }

        if first.is_alphabetic() || first == '_' {
            let len = rest
                .char_indices()
                .find(|(_, c)| !(c.is_alphanumeric() || *c == '_'))
                .map_or(rest.len(), |(idx, _)| idx);
            let kind = match &rest[..len] {
                "if" => TokenKind::If,
                "elseif" | "elif" => TokenKind::Elseif,
                "else" => TokenKind::Else,
                "endif" => TokenKind::EndIf,
                "for" => TokenKind::For,
                "in" => TokenKind::In,
                "endfor" => TokenKind::EndFor,
                "range" => TokenKind::Range,
                "and" => TokenKind::And,
                "or" => TokenKind::Or,
                "not" => TokenKind::Not,
                "true" => TokenKind::True,
                "false" => TokenKind::False,
                _ => TokenKind::Ident,
            };
            return Ok(self.token(kind, len));
        }

        Err(LexError::new(
            self.cursor,
            format!("illegal character {first:?} inside directive"),
        ))
    }

    fn string(&mut self, quote: char, rest: &str) -> Result<Token<'a>, LexError> {
        let mut value = String::new();
        let mut chars = rest.char_indices().skip(1);
        while let Some((idx, c)) = chars.next() {
            if c == quote {
                return Ok(self.token(TokenKind::Str(value), idx + 1));
            }
            if c == '\\' {
                match chars.next() {
                    Some((_, 'n')) => value.push('\n'),
                    Some((_, 't')) => value.push('\t'),
                    Some((_, esc @ ('\\' | '"' | '\''))) => value.push(esc),
                    // Unknown escapes are not escapes: `C:\dir` stays as written.
                    Some((_, other)) => {
                        value.push('\\');
                        value.push(other);
                    }
                    None => break,
                }
            } else {
                value.push(c);
            }
        }
        Err(LexError::new(self.cursor, "unterminated string literal"))
    }

    fn number(&mut self, rest: &str) -> Result<Token<'a>, LexError> {
        let bytes = rest.as_bytes();
        let mut len = bytes.iter().take_while(|b| b.is_ascii_digit()).count();
        let segment = self.after_dot;
        if !segment && bytes.get(len) == Some(&b'.') {
            let fraction = bytes[len + 1..]
                .iter()
                .take_while(|b| b.is_ascii_digit())
                .count();
            if fraction == 0 {
                return Err(LexError::new(
                    self.cursor,
                    "malformed number literal: missing digits after `.`",
                ));
            }
            len += 1 + fraction;
        }
        if let Some(c) = rest[len..].chars().next() {
            if c.is_alphanumeric() || c == '_' || (c == '.' && !segment) {
                return Err(LexError::new(
                    self.cursor + len,
                    format!("invalid character {c:?} in number literal"),
                ));
            }
        }
        Ok(self.token(TokenKind::Number, len))
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Result<Token<'a>, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_token() {
            Ok(token) => token.map(Ok),
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

/// Tokenize a whole template, stopping at the first error.
pub fn tokenize(source: &str) -> Result<Vec<Token<'_>>, LexError> {
    Tokenizer::new(source).collect()
}
