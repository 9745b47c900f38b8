use crate::ast::{
    BinaryOp, DeclarationKind, Expr, Literal, LogicOp, ObjectProperty, Token, UnaryOp,
};
use crate::error::ScriptError;
use crate::lexer::Lexer;

/// Parser configuration.
#[derive(Debug, Clone, Copy)]
pub struct ParserOptions {
    /// When false, assignment expressions are disabled and a bare `=` is
    /// reinterpreted as the equality operator; declarations are rejected.
    pub allow_assignments: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        ParserOptions {
            allow_assignments: true,
        }
    }
}

/// Recursive-descent expression parser.
///
/// Precedence, lowest to highest: assignment, conditional, `??`, `||`,
/// `&&`, `|`, `^`, `&`, equality, relational, shift, additive,
/// multiplicative, unary, postfix member/call/index, primary. All binary
/// operators are left-associative; the conditional is right-associative.
pub struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    options: ParserOptions,
}

impl Parser {
    pub fn new(source: &str) -> Result<Self, ScriptError> {
        Parser::with_options(source, ParserOptions::default())
    }

    pub fn with_options(source: &str, options: ParserOptions) -> Result<Self, ScriptError> {
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::new();
        loop {
            let position = lexer.position();
            let token = lexer.next_token()?;
            let done = token == Token::Eof;
            tokens.push((token, position));
            if done {
                break;
            }
        }
        Ok(Parser {
            tokens,
            pos: 0,
            options,
        })
    }

    /// Parse a complete expression and require the input to be consumed.
    pub fn parse(&mut self) -> Result<Expr, ScriptError> {
        let expr = self.parse_statement()?;
        self.expect(&Token::Eof)?;
        Ok(expr)
    }

    /// Convenience: parse a full source string to a single expression.
    pub fn parse_source(source: &str) -> Result<Expr, ScriptError> {
        Parser::new(source)?.parse()
    }

    pub fn parse_source_with(source: &str, options: ParserOptions) -> Result<Expr, ScriptError> {
        Parser::with_options(source, options)?.parse()
    }

    fn current(&self) -> &Token {
        &self.tokens[self.pos].0
    }

    fn position(&self) -> usize {
        self.tokens[self.pos].1
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].0.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn check(&self, token: &Token) -> bool {
        std::mem::discriminant(self.current()) == std::mem::discriminant(token)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<(), ScriptError> {
        if !self.check(expected) {
            return Err(self.error(format!(
                "expected {:?}, found {:?}",
                expected,
                self.current()
            )));
        }
        self.advance();
        Ok(())
    }

    fn error(&self, message: impl Into<String>) -> ScriptError {
        ScriptError::syntax(message, self.position())
    }

    /// Statement level: variable declarations or an expression.
    fn parse_statement(&mut self) -> Result<Expr, ScriptError> {
        let kind = match self.current() {
            Token::Var => DeclarationKind::Var,
            Token::Let => DeclarationKind::Let,
            Token::Const => DeclarationKind::Const,
            _ => return self.parse_expression(),
        };
        if !self.options.allow_assignments {
            return Err(self.error(format!(
                "'{}' declarations are disabled in this context",
                kind.keyword()
            )));
        }
        self.advance();

        let mut declarations = Vec::new();
        loop {
            let name = match self.advance() {
                Token::Identifier(name) => name,
                other => {
                    return Err(self.error(format!(
                        "expected identifier after '{}', found {:?}",
                        kind.keyword(),
                        other
                    )));
                }
            };
            let init = if self.eat(&Token::Assign) {
                Some(self.parse_expression()?)
            } else {
                None
            };
            declarations.push((name, init));
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        Ok(Expr::VariableDeclaration { kind, declarations })
    }

    pub fn parse_expression(&mut self) -> Result<Expr, ScriptError> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<Expr, ScriptError> {
        let left = self.parse_conditional()?;

        if self.options.allow_assignments && self.check(&Token::Assign) {
            match &left {
                Expr::Identifier(_) | Expr::Member { .. } => {}
                _ => {
                    return Err(self.error(
                        "invalid assignment target: only identifiers and member expressions \
                         can be assigned to",
                    ));
                }
            }
            self.advance();
            // right-associative: a = b = c
            let value = self.parse_assignment()?;
            return Ok(Expr::Assignment {
                target: Box::new(left),
                value: Box::new(value),
            });
        }
        Ok(left)
    }

    fn parse_conditional(&mut self) -> Result<Expr, ScriptError> {
        let test = self.parse_coalesce()?;

        if self.eat(&Token::Question) {
            let consequent = self.parse_assignment()?;
            self.expect(&Token::Colon)?;
            let alternate = self.parse_assignment()?;
            return Ok(Expr::Conditional {
                test: Box::new(test),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
            });
        }
        Ok(test)
    }

    fn parse_coalesce(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.parse_logical_or()?;
        while self.eat(&Token::Coalesce) {
            let right = self.parse_logical_or()?;
            left = Expr::Logical {
                op: LogicOp::Coalesce,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_logical_or(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.parse_logical_and()?;
        while self.eat(&Token::OrOr) {
            let right = self.parse_logical_and()?;
            left = Expr::Logical {
                op: LogicOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_logical_and(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.parse_bitor()?;
        while self.eat(&Token::AndAnd) {
            let right = self.parse_bitor()?;
            left = Expr::Logical {
                op: LogicOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_bitor(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.parse_bitxor()?;
        while self.eat(&Token::Pipe) {
            let right = self.parse_bitxor()?;
            left = Expr::binary(BinaryOp::BitOr, left, right);
        }
        Ok(left)
    }

    fn parse_bitxor(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.parse_bitand()?;
        while self.eat(&Token::Caret) {
            let right = self.parse_bitand()?;
            left = Expr::binary(BinaryOp::BitXor, left, right);
        }
        Ok(left)
    }

    fn parse_bitand(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.parse_equality()?;
        while self.eat(&Token::Amp) {
            let right = self.parse_equality()?;
            left = Expr::binary(BinaryOp::BitAnd, left, right);
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.parse_relational()?;
        loop {
            let op = match self.current() {
                Token::EqEq => BinaryOp::Equal,
                Token::NotEq => BinaryOp::NotEqual,
                // with assignments disabled, `=` means equality
                Token::Assign if !self.options.allow_assignments => BinaryOp::Equal,
                _ => break,
            };
            self.advance();
            let right = self.parse_relational()?;
            left = Expr::binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_relational(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.parse_shift()?;
        loop {
            let op = match self.current() {
                Token::Lt => BinaryOp::LessThan,
                Token::Gt => BinaryOp::GreaterThan,
                Token::LtEq => BinaryOp::LessEqual,
                Token::GtEq => BinaryOp::GreaterEqual,
                _ => break,
            };
            self.advance();
            let right = self.parse_shift()?;
            left = Expr::binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_shift(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.current() {
                Token::Shl => BinaryOp::ShiftLeft,
                Token::Shr => BinaryOp::ShiftRight,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            left = Expr::binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.current() {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Subtract,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.current() {
                Token::Star => BinaryOp::Multiply,
                Token::Slash => BinaryOp::Divide,
                Token::Percent => BinaryOp::Modulo,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ScriptError> {
        let op = match self.current() {
            Token::Bang => UnaryOp::Not,
            Token::Minus => UnaryOp::Minus,
            Token::Plus => UnaryOp::Plus,
            _ => return self.parse_postfix(),
        };
        self.advance();
        let expr = self.parse_unary()?;
        Ok(Expr::Unary {
            op,
            expr: Box::new(expr),
        })
    }

    /// Postfix member/call/index chains, valid on any primary including
    /// literals: `1.add(2)`, `[1].count()`, `'a'.upper()`.
    fn parse_postfix(&mut self) -> Result<Expr, ScriptError> {
        let mut expr = self.parse_primary()?;

        loop {
            if self.eat(&Token::Dot) {
                let name = match self.advance() {
                    Token::Identifier(name) => name,
                    other => {
                        return Err(
                            self.error(format!("expected identifier after '.', found {:?}", other))
                        );
                    }
                };
                expr = Expr::Member {
                    object: Box::new(expr),
                    property: Box::new(Expr::Identifier(name)),
                    computed: false,
                };
            } else if self.eat(&Token::LBracket) {
                let key = self.parse_expression()?;
                self.expect(&Token::RBracket)?;
                expr = Expr::Member {
                    object: Box::new(expr),
                    property: Box::new(key),
                    computed: true,
                };
            } else if self.check(&Token::LParen) {
                let args = self.parse_call_args()?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_call_args(&mut self) -> Result<Vec<Expr>, ScriptError> {
        self.expect(&Token::LParen)?;
        let mut args = Vec::new();
        while !self.check(&Token::RParen) {
            if self.eat(&Token::Ellipsis) {
                let spread = self.parse_expression()?;
                args.push(Expr::Spread(Box::new(spread)));
            } else {
                args.push(self.parse_expression()?);
            }
            if !self.check(&Token::RParen) {
                self.expect(&Token::Comma)?;
            }
        }
        self.expect(&Token::RParen)?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr, ScriptError> {
        match self.current().clone() {
            Token::Integer(n) => {
                self.advance();
                Ok(Expr::Literal(Literal::Integer(n)))
            }
            Token::Float(n) => {
                self.advance();
                Ok(Expr::Literal(Literal::Float(n)))
            }
            Token::String(s) => {
                self.advance();
                Ok(Expr::Literal(Literal::String(s)))
            }
            Token::Boolean(b) => {
                self.advance();
                Ok(Expr::Literal(Literal::Boolean(b)))
            }
            Token::Null => {
                self.advance();
                Ok(Expr::Literal(Literal::Null))
            }
            Token::Template { parts, holes } => {
                self.advance();
                let mut exprs = Vec::with_capacity(holes.len());
                for hole in &holes {
                    exprs.push(Parser::parse_source_with(hole, self.options)?);
                }
                Ok(Expr::TemplateLiteral { parts, exprs })
            }
            Token::Identifier(name) => {
                self.advance();
                // bare-identifier arrow: a => expr
                if self.eat(&Token::Arrow) {
                    let body = self.parse_expression()?;
                    return Ok(Expr::ArrowFunction {
                        params: vec![name],
                        body: Box::new(body),
                    });
                }
                Ok(Expr::Identifier(name))
            }
            Token::LParen => {
                if let Some(params) = self.try_parse_arrow_params() {
                    self.expect(&Token::Arrow)?;
                    let body = self.parse_expression()?;
                    return Ok(Expr::ArrowFunction {
                        params,
                        body: Box::new(body),
                    });
                }
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(&Token::RParen)?;
                Ok(expr)
            }
            Token::LBracket => self.parse_array_literal(),
            Token::LBrace => self.parse_object_literal(),
            token => Err(self.error(format!("unexpected token {:?}", token))),
        }
    }

    /// Look ahead for `(a, b, ...) =>` without consuming input on failure.
    fn try_parse_arrow_params(&mut self) -> Option<Vec<String>> {
        let start = self.pos;
        let mut params = Vec::new();
        if !self.eat(&Token::LParen) {
            return None;
        }
        if !self.check(&Token::RParen) {
            loop {
                match self.advance() {
                    Token::Identifier(name) => params.push(name),
                    _ => {
                        self.pos = start;
                        return None;
                    }
                }
                if self.eat(&Token::Comma) {
                    continue;
                }
                break;
            }
        }
        if !self.eat(&Token::RParen) || !self.check(&Token::Arrow) {
            self.pos = start;
            return None;
        }
        Some(params)
    }

    fn parse_array_literal(&mut self) -> Result<Expr, ScriptError> {
        self.expect(&Token::LBracket)?;
        let mut elements = Vec::new();
        while !self.check(&Token::RBracket) {
            if self.eat(&Token::Ellipsis) {
                let spread = self.parse_expression()?;
                elements.push(Expr::Spread(Box::new(spread)));
            } else {
                elements.push(self.parse_expression()?);
            }
            if !self.check(&Token::RBracket) {
                self.expect(&Token::Comma)?;
            }
        }
        self.expect(&Token::RBracket)?;
        Ok(Expr::Array(elements))
    }

    fn parse_object_literal(&mut self) -> Result<Expr, ScriptError> {
        self.expect(&Token::LBrace)?;
        let mut properties = Vec::new();

        while !self.check(&Token::RBrace) {
            if self.eat(&Token::Ellipsis) {
                let spread = self.parse_expression()?;
                properties.push(ObjectProperty::Spread(spread));
            } else {
                let key = match self.advance() {
                    Token::Identifier(name) => name,
                    Token::String(s) => s,
                    Token::Integer(n) => n.to_string(),
                    other => {
                        return Err(self.error(format!(
                            "expected object key, found {:?}",
                            other
                        )));
                    }
                };
                if self.eat(&Token::Colon) {
                    let value = self.parse_expression()?;
                    properties.push(ObjectProperty::Pair {
                        key,
                        value,
                        shorthand: false,
                    });
                } else {
                    // {key} is shorthand for {key: key}
                    let value = Expr::Identifier(key.clone());
                    properties.push(ObjectProperty::Pair {
                        key,
                        value,
                        shorthand: true,
                    });
                }
            }
            if !self.check(&Token::RBrace) {
                self.expect(&Token::Comma)?;
            }
        }
        self.expect(&Token::RBrace)?;
        Ok(Expr::Object(properties))
    }
}
