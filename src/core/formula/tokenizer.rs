//! Formula tokenizer
//!
//! Converts formula strings like `=SUM(price) * 1.1` or
//! `=IF([Unit Price] >= 10, "bulk", "single")` into a sequence of tokens.

use std::iter::Peekable;
use std::str::Chars;

/// A token in a formula expression
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// A numeric literal (e.g., 123, 45.67, 1.5e10)
    Number(f64),
    /// A string literal (e.g., "hello" or 'world')
    Text(String),
    /// A bare identifier: function name or column name without spaces
    Identifier(String),
    /// A bracketed column reference, for names containing spaces: `[Column 1]`
    ColumnRef(String),
    /// Binary/comparison operators: + - * / ^ = == != <> >= <= < >
    Operator(String),
    OpenParen,
    CloseParen,
    Comma,
}

/// Error during tokenization
#[derive(Debug, Clone, PartialEq)]
pub struct TokenizeError {
    pub message: String,
    pub position: usize,
}

impl TokenizeError {
    fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

impl std::fmt::Display for TokenizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Tokenize error at position {}: {}",
            self.position, self.message
        )
    }
}

impl std::error::Error for TokenizeError {}

/// Tokenizer for formula expressions
pub struct Tokenizer<'a> {
    chars: Peekable<Chars<'a>>,
    position: usize,
}

impl<'a> Tokenizer<'a> {
    /// Create a new tokenizer for the given formula string
    pub fn new(formula: &'a str) -> Self {
        let formula = formula.trim_start();
        let formula = formula.strip_prefix('=').unwrap_or(formula);
        Self {
            chars: formula.chars().peekable(),
            position: 0,
        }
    }

    /// Tokenize the entire formula into a vector of tokens
    pub fn tokenize(mut self) -> Result<Vec<Token>, TokenizeError> {
        let mut tokens = Vec::new();

        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }

        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Option<Token>, TokenizeError> {
        self.skip_whitespace();

        let Some(c) = self.peek() else {
            return Ok(None);
        };

        let token = match c {
            '"' | '\'' => self.read_string()?,
            '[' => self.read_column_ref()?,

            '(' => {
                self.advance();
                Token::OpenParen
            }
            ')' => {
                self.advance();
                Token::CloseParen
            }
            ',' => {
                self.advance();
                Token::Comma
            }

            // Minus is always an operator here; the parser handles unary minus
            '+' | '-' | '*' | '/' | '^' => {
                self.advance();
                Token::Operator(c.to_string())
            }

            '<' => self.read_less_than_operator(),
            '>' => self.read_greater_than_operator(),
            '=' => {
                self.advance();
                if self.peek() == Some('=') {
                    self.advance();
                    Token::Operator("==".to_string())
                } else {
                    Token::Operator("=".to_string())
                }
            }
            '!' => {
                let start = self.position;
                self.advance();
                if self.peek() == Some('=') {
                    self.advance();
                    Token::Operator("!=".to_string())
                } else {
                    return Err(TokenizeError::new("Expected '=' after '!'", start));
                }
            }

            c if c.is_ascii_digit() || c == '.' => self.read_number()?,

            c if c.is_alphabetic() || c == '_' => self.read_identifier(),

            c => {
                return Err(TokenizeError::new(
                    format!("Unexpected character: '{}'", c),
                    self.position,
                ));
            }
        };
        Ok(Some(token))
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next();
        if c.is_some() {
            self.position += 1;
        }
        c
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// Read a string literal (double or single quoted, quotes escaped by doubling)
    fn read_string(&mut self) -> Result<Token, TokenizeError> {
        let start_pos = self.position;
        let Some(quote) = self.advance() else {
            return Err(TokenizeError::new("Expected string literal", start_pos));
        };
        let mut value = String::new();

        loop {
            match self.advance() {
                None => {
                    return Err(TokenizeError::new("Unterminated string literal", start_pos));
                }
                Some(c) if c == quote => {
                    if self.peek() == Some(quote) {
                        value.push(quote);
                        self.advance();
                    } else {
                        break;
                    }
                }
                Some(c) => value.push(c),
            }
        }

        Ok(Token::Text(value))
    }

    /// Read a `[Column Name]` reference
    fn read_column_ref(&mut self) -> Result<Token, TokenizeError> {
        let start_pos = self.position;
        self.advance(); // '['
        let mut name = String::new();

        loop {
            match self.advance() {
                None => {
                    return Err(TokenizeError::new(
                        "Unterminated column reference",
                        start_pos,
                    ));
                }
                Some(']') => break,
                Some(c) => name.push(c),
            }
        }

        let name = name.trim();
        if name.is_empty() {
            return Err(TokenizeError::new("Empty column reference", start_pos));
        }
        Ok(Token::ColumnRef(name.to_string()))
    }

    /// Read a number (integer, decimal, or scientific notation)
    fn read_number(&mut self) -> Result<Token, TokenizeError> {
        let start_pos = self.position;
        let mut num_str = String::new();

        self.read_digits(&mut num_str);

        if self.peek() == Some('.') {
            num_str.push('.');
            self.advance();
            self.read_digits(&mut num_str);
        }

        if matches!(self.peek(), Some('e') | Some('E')) {
            num_str.push('e');
            self.advance();
            if let Some(sign @ ('+' | '-')) = self.peek() {
                num_str.push(sign);
                self.advance();
            }
            self.read_digits(&mut num_str);
        }

        num_str
            .parse::<f64>()
            .map(Token::Number)
            .map_err(|_| TokenizeError::new(format!("Invalid number: {}", num_str), start_pos))
    }

    fn read_digits(&mut self, out: &mut String) {
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                out.push(c);
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_identifier(&mut self) -> Token {
        let mut ident = String::new();

        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' || c == '.' {
                ident.push(c);
                self.advance();
            } else {
                break;
            }
        }

        Token::Identifier(ident)
    }

    fn read_less_than_operator(&mut self) -> Token {
        self.advance(); // '<'

        match self.peek() {
            Some('=') => {
                self.advance();
                Token::Operator("<=".to_string())
            }
            Some('>') => {
                self.advance();
                Token::Operator("<>".to_string())
            }
            _ => Token::Operator("<".to_string()),
        }
    }

    fn read_greater_than_operator(&mut self) -> Token {
        self.advance(); // '>'

        match self.peek() {
            Some('=') => {
                self.advance();
                Token::Operator(">=".to_string())
            }
            _ => Token::Operator(">".to_string()),
        }
    }
}

/// Convenience function to tokenize a formula string
pub fn tokenize(formula: &str) -> Result<Vec<Token>, TokenizeError> {
    Tokenizer::new(formula).tokenize()
}
