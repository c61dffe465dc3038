use std::fmt::{Display, Formatter};
use std::rc::Rc;
use crate::interpreter::ast::Node;
use crate::interpreter::lexer::{Token, TokenPos, TokenType};


#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Input ended inside the list opened at `pos`.
    UnmatchedParenthesis { pos: TokenPos },
    /// A quote at `pos` with nothing after it to quote.
    DanglingQuote { pos: TokenPos },
}

impl ParseError {
    pub fn get_pos(&self) -> TokenPos {
        match self {
            ParseError::UnmatchedParenthesis { pos } => *pos,
            ParseError::DanglingQuote { pos } => *pos,
        }
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::UnmatchedParenthesis { pos } => write!(f, "{} Unmatched parenthesis", pos),
            ParseError::DanglingQuote { pos } => write!(f, "{} Expected expression after quote", pos),
        }
    }
}

impl std::error::Error for ParseError {}

type ParseResult<T> = Result<T, ParseError>;

pub fn parse(tokens: &[Token]) -> ParseResult<Vec<Node>> {
    Parser::new(tokens).parse()
}

pub struct Parser<'tokens> {
    tokens: &'tokens [Token],
    current: usize,
}

impl<'tokens> Parser<'tokens> {
    pub fn new(tokens: &'tokens [Token]) -> Parser<'tokens> {
        Parser { tokens, current: 0 }
    }

    pub fn parse(&mut self) -> ParseResult<Vec<Node>> {
        let mut forms = Vec::new();

        while let Some(token) = self.advance() {
            match token.token_type() {
                TokenType::Eof => break,
                // Stray closing parentheses between top-level forms are tolerated
                TokenType::RightParen => log::warn!("{} Skipping unmatched ')'", token.start()),
                _ => forms.push(self.parse_expression(token)?),
            }
        }

        Ok(forms)
    }

    fn parse_expression(&mut self, token: &'tokens Token) -> ParseResult<Node> {
        match token.token_type() {
            TokenType::Quote => match self.advance() {
                Some(next) if !matches!(next.token_type(), TokenType::RightParen | TokenType::Eof) =>
                    Ok(Node::Quoted(Rc::new(self.parse_expression(next)?))),
                _ => Err(ParseError::DanglingQuote { pos: *token.start() }),
            },
            TokenType::Number => Ok(Node::Number(Self::parse_number(token))),
            TokenType::String => Ok(Node::string(token.source())),
            TokenType::Identifier | TokenType::Keyword => Ok(Node::symbol(token.source())),
            TokenType::LeftParen => self.parse_list(*token.start()),
            TokenType::RightParen | TokenType::Eof => Err(ParseError::UnmatchedParenthesis { pos: *token.start() }),
        }
    }

    fn parse_list(&mut self, open: TokenPos) -> ParseResult<Node> {
        let mut elements = Vec::new();

        loop {
            match self.advance() {
                None => return Err(ParseError::UnmatchedParenthesis { pos: open }),
                Some(token) => match token.token_type() {
                    TokenType::Eof => return Err(ParseError::UnmatchedParenthesis { pos: open }),
                    TokenType::RightParen => return Ok(Node::list(elements)),
                    _ => elements.push(self.parse_expression(token)?),
                },
            }
        }
    }

    fn parse_number(token: &Token) -> f64 {
        // The lexer only produces `[+-]?digits(.digits)?`, which always parses
        token.source().parse().unwrap_or(f64::NAN)
    }

    fn advance(&mut self) -> Option<&'tokens Token> {
        let token = self.tokens.get(self.current)?;
        self.current += 1;
        Some(token)
    }
}
