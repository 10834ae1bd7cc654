//! Formula parser
//!
//! Converts a sequence of tokens into an expression tree using recursive
//! descent with operator precedence.

use super::tokenizer::{tokenize, Token};

/// Expression tree node
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A numeric literal
    Number(f64),
    /// A string literal
    Text(String),
    /// A column of the table, bare (`qty`) or bracketed (`[Unit Price]`)
    Column(String),
    /// Function call: NAME(arg1, arg2, ...)
    FunctionCall { name: String, args: Vec<Expr> },
    /// Binary operation: left op right
    BinaryOp {
        op: String,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Unary operation: -expr / +expr
    UnaryOp { op: String, operand: Box<Expr> },
}

/// Error during parsing
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Parse error at position {}: {}",
            self.position, self.message
        )
    }
}

impl std::error::Error for ParseError {}

const COMPARISON_OPERATORS: &[&str] = &["=", "==", "!=", "<>", "<", ">", "<=", ">="];

/// Parser for formula tokens
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            position: 0,
        }
    }

    /// Parse the tokens into an expression tree
    pub fn parse(mut self) -> Result<Expr, ParseError> {
        if self.tokens.is_empty() {
            return Err(ParseError::new("Empty expression", 0));
        }
        let expr = self.expression()?;

        if !self.is_at_end() {
            return Err(ParseError::new(
                format!("Unexpected token after expression: {:?}", self.peek()),
                self.position,
            ));
        }

        Ok(expr)
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn match_token(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn match_any_operator(&mut self, ops: &[&str]) -> Option<String> {
        if let Some(Token::Operator(s)) = self.peek() {
            if ops.contains(&s.as_str()) {
                let op = s.clone();
                self.position += 1;
                return Some(op);
            }
        }
        None
    }

    /// Expression: comparison
    fn expression(&mut self) -> Result<Expr, ParseError> {
        self.comparison()
    }

    /// Comparison: term (( "=" | "==" | "!=" | "<>" | "<" | ">" | "<=" | ">=" ) term)*
    fn comparison(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.term()?;

        while let Some(op) = self.match_any_operator(COMPARISON_OPERATORS) {
            let right = self.term()?;
            left = Expr::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    /// Term: factor (( "+" | "-" ) factor)*
    fn term(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.factor()?;

        while let Some(op) = self.match_any_operator(&["+", "-"]) {
            let right = self.factor()?;
            left = Expr::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    /// Factor: power (( "*" | "/" ) power)*
    fn factor(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.power()?;

        while let Some(op) = self.match_any_operator(&["*", "/"]) {
            let right = self.power()?;
            left = Expr::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    /// Power: unary ( "^" power )?   (right-associative)
    fn power(&mut self) -> Result<Expr, ParseError> {
        let left = self.unary()?;

        if self.match_any_operator(&["^"]).is_some() {
            let right = self.power()?;
            Ok(Expr::BinaryOp {
                op: "^".to_string(),
                left: Box::new(left),
                right: Box::new(right),
            })
        } else {
            Ok(left)
        }
    }

    /// Unary: ( "-" | "+" ) unary | call
    fn unary(&mut self) -> Result<Expr, ParseError> {
        if let Some(op) = self.match_any_operator(&["-", "+"]) {
            let operand = self.unary()?;
            Ok(Expr::UnaryOp {
                op,
                operand: Box::new(operand),
            })
        } else {
            self.call()
        }
    }

    /// Call: IDENTIFIER "(" arguments? ")" | primary
    fn call(&mut self) -> Result<Expr, ParseError> {
        if let (Some(Token::Identifier(name)), Some(Token::OpenParen)) =
            (self.tokens.get(self.position), self.tokens.get(self.position + 1))
        {
            let name = name.clone();
            self.position += 2;
            let args = self.arguments()?;
            if !self.match_token(&Token::CloseParen) {
                return Err(ParseError::new(
                    "Expected ')' after function arguments",
                    self.position,
                ));
            }
            return Ok(Expr::FunctionCall { name, args });
        }
        self.primary()
    }

    /// Arguments: ( expr ( "," expr )* )?
    fn arguments(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();

        if let Some(Token::CloseParen) = self.peek() {
            return Ok(args);
        }

        args.push(self.expression()?);
        while self.match_token(&Token::Comma) {
            args.push(self.expression()?);
        }

        Ok(args)
    }

    /// Primary: NUMBER | STRING | IDENTIFIER | COLUMN_REF | "(" expr ")"
    fn primary(&mut self) -> Result<Expr, ParseError> {
        let position = self.position;
        match self.advance() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Text(s)) => Ok(Expr::Text(s)),
            Some(Token::Identifier(name)) | Some(Token::ColumnRef(name)) => Ok(Expr::Column(name)),
            Some(Token::OpenParen) => {
                let expr = self.expression()?;
                if !self.match_token(&Token::CloseParen) {
                    return Err(ParseError::new(
                        "Expected ')' after expression",
                        self.position,
                    ));
                }
                Ok(expr)
            }
            Some(token) => Err(ParseError::new(
                format!("Unexpected token: {:?}", token),
                position,
            )),
            None => Err(ParseError::new("Unexpected end of expression", position)),
        }
    }
}

/// Convenience function to parse tokens into an expression tree
pub fn parse(tokens: Vec<Token>) -> Result<Expr, ParseError> {
    Parser::new(tokens).parse()
}

/// Tokenize and parse a formula string in one step
pub fn parse_formula(formula: &str) -> Result<Expr, ParseError> {
    let tokens = tokenize(formula).map_err(|e| ParseError::new(e.message, e.position))?;
    parse(tokens)
}
