use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::str::Chars;
use lazy_static::lazy_static;
use crate::util;


lazy_static! {
    static ref KEYWORDS: HashSet<&'static str> = [
        "def", "if", "else", "while", "return", "func", "var", "let", "const", "set",
    ].into_iter().collect();
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TokenPos {
    pub line: i32,
    pub column: i32,
}

impl TokenPos {
    pub fn new(line: i32, column: i32) -> TokenPos {
        TokenPos { line, column }
    }

    pub fn begin() -> TokenPos {
        TokenPos::new(1, 1)
    }
}

impl Display for TokenPos {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[line {} column {}]", self.line, self.column)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenType {
    LeftParen, RightParen,
    Quote,

    Number,
    String,
    Identifier,
    Keyword,

    Eof,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    token_type: TokenType,
    source: String,
    start: TokenPos,
}

impl Token {
    pub fn new(token_type: TokenType, source: String, start: TokenPos) -> Token {
        Token { token_type, source, start }
    }

    pub fn token_type(&self) -> TokenType { self.token_type }
    /// Literal text of the token. String tokens hold the text between the quotes.
    pub fn source(&self) -> &str { &self.source }
    pub fn start(&self) -> &TokenPos { &self.start }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.token_type {
            TokenType::Eof => f.write_str("Eof"),
            TokenType::String => write!(f, "`\"{}\"`", self.source),
            _ => write!(f, "`{}`", self.source),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexerError {
    UnterminatedString { pos: TokenPos },
    UnexpectedCharacter(TokenPos, char),
}

impl LexerError {
    pub fn get_pos(&self) -> TokenPos {
        match self {
            LexerError::UnterminatedString { pos } => *pos,
            LexerError::UnexpectedCharacter(pos, _) => *pos,
        }
    }
}

impl Display for LexerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LexerError::UnterminatedString { pos } => write!(f, "{} Unterminated string literal", pos),
            LexerError::UnexpectedCharacter(pos, c) => write!(f, "{} Unexpected character '{}'", pos, c),
        }
    }
}

impl std::error::Error for LexerError {}

type LexerResult<T> = Result<T, LexerError>;

/// Turns the whole source text into tokens. The trailing `Eof` token is not included.
pub fn tokenize(source: &str) -> LexerResult<Vec<Token>> {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();

    loop {
        let token = lexer.scan_token()?;

        if token.token_type() == TokenType::Eof {
            return Ok(tokens);
        }

        tokens.push(token);
    }
}

pub struct Lexer<'source> {
    input: &'source str,

    chars: Chars<'source>,
    peek_1: Option<char>,
    peek_2: Option<char>,

    // Byte offsets into `input`
    start_index: usize,
    current_index: usize,

    start_pos: TokenPos,
    current_pos: TokenPos,
}

impl<'source> Lexer<'source> {
    pub fn new(source: &'source str) -> Lexer<'source> {
        Lexer {
            input: source,

            chars: source.chars(),
            peek_1: None,
            peek_2: None,

            start_index: 0,
            current_index: 0,

            start_pos: TokenPos::begin(),
            current_pos: TokenPos::begin(),
        }
    }

    pub fn scan_token(&mut self) -> LexerResult<Token> {
        loop {
            self.skip_whitespace();
            self.start_index = self.current_index;
            self.start_pos = self.current_pos;

            let c = match self.consume() {
                Some(c) => c,
                None => return Ok(self.make_token(TokenType::Eof)),
            };

            return match c {
                '(' => Ok(self.make_token(TokenType::LeftParen)),
                ')' => Ok(self.make_token(TokenType::RightParen)),
                '\'' => Ok(self.make_token(TokenType::Quote)),
                ';' => {
                    self.skip_line();
                    continue;
                },

                // `<=`, `>=`, `!=`, `==`; the single characters are plain identifiers
                '<' | '>' | '!' | '=' => {
                    self.expect('=');
                    Ok(self.make_token(TokenType::Identifier))
                },

                '"' => self.scan_string(),
                c if util::is_numeric(c) => self.scan_number(),
                c if util::is_sign(c) && self.peek().map_or(false, util::is_numeric) => self.scan_number(),
                c if util::is_identifier_start(c) => self.scan_identifier(),

                _ => Err(LexerError::UnexpectedCharacter(self.start_pos, c)),
            };
        }
    }

    fn scan_string(&mut self) -> LexerResult<Token> {
        while let Some(c) = self.peek() {
            if c == '"' {
                break;
            }

            self.consume();
        }

        if self.consume().is_none() {
            return Err(LexerError::UnterminatedString { pos: self.start_pos });
        }

        // Don't add leading and trailing '"' characters to token
        Ok(Token {
            token_type: TokenType::String,
            source: self.input[(self.start_index + 1)..(self.current_index - 1)].to_owned(),
            start: self.start_pos,
        })
    }

    fn scan_number(&mut self) -> LexerResult<Token> {
        while let Some('0'..='9') = self.peek() {
            self.consume();
        }

        if let Some('.') = self.peek() {
            if let Some('0'..='9') = self.peek_next() {
                self.consume();

                while let Some('0'..='9') = self.peek() {
                    self.consume();
                }
            }
        }

        Ok(self.make_token(TokenType::Number))
    }

    fn scan_identifier(&mut self) -> LexerResult<Token> {
        while let Some(c) = self.peek() {
            if !util::is_identifier_continue(c) {
                break;
            }

            self.consume();
        }

        let name = &self.input[self.start_index..self.current_index];
        let token_type = if KEYWORDS.contains(name) { TokenType::Keyword } else { TokenType::Identifier };

        Ok(Token { source: name.to_owned(), token_type, start: self.start_pos })
    }

    fn make_token(&self, token_type: TokenType) -> Token {
        Token {
            token_type,
            source: self.input[self.start_index..self.current_index].to_owned(),
            start: self.start_pos,
        }
    }

    fn consume(&mut self) -> Option<char> {
        let c = if let Some(c) = self.peek_1.take() {
            self.peek_1 = self.peek_2.take();
            c
        } else {
            self.chars.next()?
        };

        self.current_index += c.len_utf8();

        if c == '\n' {
            self.current_pos.line += 1;
            self.current_pos.column = 1;
        } else {
            self.current_pos.column += 1;
        }

        Some(c)
    }

    fn peek(&mut self) -> Option<char> {
        if self.peek_1.is_none() {
            self.peek_1 = self.chars.next();
        }

        self.peek_1
    }

    fn peek_next(&mut self) -> Option<char> {
        self.peek()?;

        if self.peek_2.is_none() {
            self.peek_2 = self.chars.next();
        }

        self.peek_2
    }

    fn expect(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.consume();
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                return;
            }

            self.consume();
        }
    }

    fn skip_line(&mut self) {
        while let Some(c) = self.consume() {
            if c == '\n' {
                return;
            }
        }
    }
}
