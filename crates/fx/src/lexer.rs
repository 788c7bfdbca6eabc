//! Tokeniser for `.omwfx` technique files.
//!
//! The lexer is pull based: the parser calls [`Lexer::next`] and
//! [`Lexer::peek`] to walk block declarations, and [`Lexer::jump`] to capture
//! raw GLSL bodies verbatim. Shader bodies are never tokenised.

use std::fmt;

use crate::error::LexerError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Eof,

    Shared,
    Technique,
    MainPass,
    RenderTarget,
    Vertex,
    Fragment,
    Compute,
    Sampler1D,
    Sampler2D,
    Sampler3D,
    UniformBool,
    UniformFloat,
    UniformInt,
    UniformVec2,
    UniformVec3,
    UniformVec4,

    True,
    False,
    Vec2,
    Vec3,
    Vec4,

    Literal(String),
    String(String),
    Integer(i64),
    Float(f64),

    OpenBrace,
    CloseBrace,
    OpenParen,
    CloseParen,
    Equal,
    Comma,
    SemiColon,
    Colon,
    VBar,
}

const KEYWORDS: &[(&str, Token)] = &[
    ("shared", Token::Shared),
    ("technique", Token::Technique),
    ("main_pass", Token::MainPass),
    ("render_target", Token::RenderTarget),
    ("vertex", Token::Vertex),
    ("fragment", Token::Fragment),
    ("compute", Token::Compute),
    ("sampler_1d", Token::Sampler1D),
    ("sampler_2d", Token::Sampler2D),
    ("sampler_3d", Token::Sampler3D),
    ("uniform_bool", Token::UniformBool),
    ("uniform_float", Token::UniformFloat),
    ("uniform_int", Token::UniformInt),
    ("uniform_vec2", Token::UniformVec2),
    ("uniform_vec3", Token::UniformVec3),
    ("uniform_vec4", Token::UniformVec4),
    ("true", Token::True),
    ("false", Token::False),
    ("vec2", Token::Vec2),
    ("vec3", Token::Vec3),
    ("vec4", Token::Vec4),
];

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Eof => f.write_str("end of file"),
            Token::Literal(value) => write!(f, "literal '{value}'"),
            Token::String(value) => write!(f, "string \"{value}\""),
            Token::Integer(value) => write!(f, "integer {value}"),
            Token::Float(value) => write!(f, "float {value}"),
            Token::OpenBrace => f.write_str("'{'"),
            Token::CloseBrace => f.write_str("'}'"),
            Token::OpenParen => f.write_str("'('"),
            Token::CloseParen => f.write_str("')'"),
            Token::Equal => f.write_str("'='"),
            Token::Comma => f.write_str("','"),
            Token::SemiColon => f.write_str("';'"),
            Token::Colon => f.write_str("':'"),
            Token::VBar => f.write_str("'|'"),
            keyword => {
                let name = KEYWORDS
                    .iter()
                    .find(|(_, token)| token == keyword)
                    .map(|(name, _)| *name)
                    .unwrap_or("keyword");
                write!(f, "'{name}'")
            }
        }
    }
}

/// Raw text captured by [`Lexer::jump`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JumpBlock {
    pub content: String,
    /// 0-based line of the opening brace.
    pub line: usize,
}

#[derive(Debug, Clone, Copy)]
struct Cursor {
    pos: usize,
    line: usize,
    line_start: usize,
}

pub struct Lexer<'a> {
    source: &'a str,
    cursor: Cursor,
    last_jump: Option<JumpBlock>,
}

impl<'a> Lexer<'a> {
    /// `source` is expected to use `\n` line endings.
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            cursor: Cursor {
                pos: 0,
                line: 0,
                line_start: 0,
            },
            last_jump: None,
        }
    }

    pub fn next(&mut self) -> Result<Token, LexerError> {
        self.lex()
    }

    pub fn peek(&mut self) -> Result<Token, LexerError> {
        let saved = self.cursor;
        let token = self.lex();
        self.cursor = saved;
        token
    }

    /// Captures everything up to the brace that closes the block whose
    /// opening brace was just consumed. The closing brace is left in the
    /// stream. Returns `false` when the block is never closed.
    pub fn jump(&mut self) -> bool {
        let bytes = self.source.as_bytes();
        let start = self.cursor.pos;
        let start_line = self.cursor.line;
        let mut scan = self.cursor;
        let mut depth = 1usize;

        while scan.pos < bytes.len() {
            match bytes[scan.pos] {
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        self.last_jump = Some(JumpBlock {
                            content: self.source[start..scan.pos].to_owned(),
                            line: start_line,
                        });
                        self.cursor = scan;
                        return true;
                    }
                }
                b'\n' => {
                    scan.line += 1;
                    scan.line_start = scan.pos + 1;
                }
                b'/' if bytes.get(scan.pos + 1) == Some(&b'/') => {
                    while scan.pos < bytes.len() && bytes[scan.pos] != b'\n' {
                        scan.pos += 1;
                    }
                    continue;
                }
                b'/' if bytes.get(scan.pos + 1) == Some(&b'*') => {
                    scan.pos += 2;
                    while scan.pos < bytes.len()
                        && !(bytes[scan.pos] == b'*' && bytes.get(scan.pos + 1) == Some(&b'/'))
                    {
                        if bytes[scan.pos] == b'\n' {
                            scan.line += 1;
                            scan.line_start = scan.pos + 1;
                        }
                        scan.pos += 1;
                    }
                    scan.pos += 2;
                    continue;
                }
                _ => {}
            }
            scan.pos += 1;
        }

        false
    }

    pub fn last_jump_block(&self) -> Option<&JumpBlock> {
        self.last_jump.as_ref()
    }

    /// Builds an error located at the current position.
    pub fn error(&self, message: impl Into<String>) -> LexerError {
        LexerError {
            line: self.cursor.line + 1,
            column: self.cursor.pos - self.cursor.line_start + 1,
            message: message.into(),
        }
    }

    fn lex(&mut self) -> Result<Token, LexerError> {
        self.skip_trivia()?;
        let bytes = self.source.as_bytes();
        let Some(&ch) = bytes.get(self.cursor.pos) else {
            return Ok(Token::Eof);
        };

        let punct = match ch {
            b'{' => Some(Token::OpenBrace),
            b'}' => Some(Token::CloseBrace),
            b'(' => Some(Token::OpenParen),
            b')' => Some(Token::CloseParen),
            b'=' => Some(Token::Equal),
            b',' => Some(Token::Comma),
            b';' => Some(Token::SemiColon),
            b':' => Some(Token::Colon),
            b'|' => Some(Token::VBar),
            _ => None,
        };
        if let Some(token) = punct {
            self.cursor.pos += 1;
            return Ok(token);
        }

        if ch == b'"' {
            return self.lex_string();
        }

        if ch.is_ascii_digit() || self.starts_number(ch) {
            return self.lex_number();
        }

        if ch.is_ascii_alphabetic() || ch == b'_' {
            let start = self.cursor.pos;
            while bytes
                .get(self.cursor.pos)
                .is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'_')
            {
                self.cursor.pos += 1;
            }
            let word = &self.source[start..self.cursor.pos];
            let token = KEYWORDS
                .iter()
                .find(|(name, _)| *name == word)
                .map(|(_, token)| token.clone())
                .unwrap_or_else(|| Token::Literal(word.to_owned()));
            return Ok(token);
        }

        let unexpected = self.source[self.cursor.pos..]
            .chars()
            .next()
            .unwrap_or(ch as char);
        Err(self.error(format!("unexpected character '{unexpected}'")))
    }

    fn starts_number(&self, ch: u8) -> bool {
        let bytes = self.source.as_bytes();
        let next = bytes.get(self.cursor.pos + 1).copied();
        match ch {
            b'-' | b'+' => match next {
                Some(b'.') => bytes
                    .get(self.cursor.pos + 2)
                    .is_some_and(u8::is_ascii_digit),
                Some(digit) => digit.is_ascii_digit(),
                None => false,
            },
            b'.' => next.is_some_and(|digit| digit.is_ascii_digit()),
            _ => false,
        }
    }

    fn lex_number(&mut self) -> Result<Token, LexerError> {
        let bytes = self.source.as_bytes();
        let start = self.cursor.pos;
        let mut is_float = false;

        if matches!(bytes[self.cursor.pos], b'-' | b'+') {
            self.cursor.pos += 1;
        }
        while bytes.get(self.cursor.pos).is_some_and(u8::is_ascii_digit) {
            self.cursor.pos += 1;
        }
        if bytes.get(self.cursor.pos) == Some(&b'.') {
            is_float = true;
            self.cursor.pos += 1;
            while bytes.get(self.cursor.pos).is_some_and(u8::is_ascii_digit) {
                self.cursor.pos += 1;
            }
        }
        if matches!(bytes.get(self.cursor.pos), Some(b'e' | b'E')) {
            let mut probe = self.cursor.pos + 1;
            if matches!(bytes.get(probe), Some(b'-' | b'+')) {
                probe += 1;
            }
            if bytes.get(probe).is_some_and(u8::is_ascii_digit) {
                is_float = true;
                self.cursor.pos = probe;
                while bytes.get(self.cursor.pos).is_some_and(u8::is_ascii_digit) {
                    self.cursor.pos += 1;
                }
            }
        }

        let text = &self.source[start..self.cursor.pos];
        if is_float {
            text.parse::<f64>()
                .map(Token::Float)
                .map_err(|_| self.error(format!("invalid float '{text}'")))
        } else {
            text.parse::<i64>()
                .map(Token::Integer)
                .map_err(|_| self.error(format!("invalid integer '{text}'")))
        }
    }

    fn lex_string(&mut self) -> Result<Token, LexerError> {
        let bytes = self.source.as_bytes();
        self.cursor.pos += 1;
        let start = self.cursor.pos;
        while let Some(&b) = bytes.get(self.cursor.pos) {
            match b {
                b'"' => {
                    let value = self.source[start..self.cursor.pos].to_owned();
                    self.cursor.pos += 1;
                    return Ok(Token::String(value));
                }
                b'\n' => {
                    self.cursor.line += 1;
                    self.cursor.line_start = self.cursor.pos + 1;
                }
                _ => {}
            }
            self.cursor.pos += 1;
        }
        Err(self.error("unterminated string"))
    }

    fn skip_trivia(&mut self) -> Result<(), LexerError> {
        let bytes = self.source.as_bytes();
        loop {
            match bytes.get(self.cursor.pos) {
                Some(b'\n') => {
                    self.cursor.pos += 1;
                    self.cursor.line += 1;
                    self.cursor.line_start = self.cursor.pos;
                }
                Some(b) if b.is_ascii_whitespace() => self.cursor.pos += 1,
                Some(b'/') if bytes.get(self.cursor.pos + 1) == Some(&b'/') => {
                    while bytes.get(self.cursor.pos).is_some_and(|b| *b != b'\n') {
                        self.cursor.pos += 1;
                    }
                }
                Some(b'/') if bytes.get(self.cursor.pos + 1) == Some(&b'*') => {
                    let opened = self.error("unterminated comment");
                    self.cursor.pos += 2;
                    loop {
                        match bytes.get(self.cursor.pos) {
                            None => return Err(opened),
                            Some(b'*') if bytes.get(self.cursor.pos + 1) == Some(&b'/') => {
                                self.cursor.pos += 2;
                                break;
                            }
                            Some(b'\n') => {
                                self.cursor.pos += 1;
                                self.cursor.line += 1;
                                self.cursor.line_start = self.cursor.pos;
                            }
                            Some(_) => self.cursor.pos += 1,
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }
}
