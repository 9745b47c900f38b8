use crate::ast::Token;
use crate::error::ScriptError;

pub struct Lexer {
    input: Vec<char>,
    position: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            position: 0,
        }
    }

    /// Current character offset, used for syntax error positions.
    pub fn position(&self) -> usize {
        self.position
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_char(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn error(&self, message: impl Into<String>) -> ScriptError {
        ScriptError::syntax(message, self.position)
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<(), ScriptError> {
        loop {
            while let Some(ch) = self.current_char() {
                if ch.is_whitespace() {
                    self.advance();
                } else {
                    break;
                }
            }
            if self.current_char() == Some('/') && self.peek_char(1) == Some('/') {
                while let Some(ch) = self.current_char() {
                    if ch == '\n' {
                        break;
                    }
                    self.advance();
                }
            } else if self.current_char() == Some('/') && self.peek_char(1) == Some('*') {
                self.advance();
                self.advance();
                loop {
                    match self.current_char() {
                        Some('*') if self.peek_char(1) == Some('/') => {
                            self.advance();
                            self.advance();
                            break;
                        }
                        Some(_) => self.advance(),
                        None => return Err(self.error("unterminated block comment")),
                    }
                }
            } else {
                return Ok(());
            }
        }
    }

    fn read_identifier(&mut self) -> String {
        let mut result = String::new();
        while let Some(ch) = self.current_char() {
            if ch.is_alphanumeric() || ch == '_' {
                result.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        result
    }

    fn read_escape(&mut self, quote: char) -> Result<char, ScriptError> {
        self.advance(); // consume backslash
        let ch = match self.current_char() {
            Some('n') => '\n',
            Some('t') => '\t',
            Some('r') => '\r',
            Some('0') => '\0',
            Some('\\') => '\\',
            Some('`') => '`',
            Some('\'') => '\'',
            Some('"') => '"',
            Some('$') => '$',
            Some(c) if c == quote => quote,
            Some(c) => return Err(self.error(format!("invalid escape sequence: \\{}", c))),
            None => return Err(self.error("unterminated string: EOF after backslash")),
        };
        self.advance();
        Ok(ch)
    }

    fn read_string(&mut self, quote: char) -> Result<String, ScriptError> {
        let mut result = String::new();
        self.advance(); // consume opening quote

        while let Some(ch) = self.current_char() {
            match ch {
                c if c == quote => {
                    self.advance();
                    return Ok(result);
                }
                '\\' => result.push(self.read_escape(quote)?),
                _ => {
                    result.push(ch);
                    self.advance();
                }
            }
        }

        Err(self.error("unterminated string: missing closing quote"))
    }

    /// Back-tick template literal. Text parts are cooked (escapes applied);
    /// `${...}` hole sources are captured raw, with inner braces balanced,
    /// for the parser to re-parse as expressions.
    fn read_template(&mut self) -> Result<Token, ScriptError> {
        let mut parts = vec![String::new()];
        let mut holes = Vec::new();
        self.advance(); // consume opening back-tick

        loop {
            match self.current_char() {
                Some('`') => {
                    self.advance();
                    return Ok(Token::Template { parts, holes });
                }
                Some('\\') => {
                    let ch = self.read_escape('`')?;
                    if let Some(part) = parts.last_mut() {
                        part.push(ch);
                    }
                }
                Some('$') if self.peek_char(1) == Some('{') => {
                    self.advance();
                    self.advance();
                    holes.push(self.read_template_hole()?);
                    parts.push(String::new());
                }
                Some(ch) => {
                    if let Some(part) = parts.last_mut() {
                        part.push(ch);
                    }
                    self.advance();
                }
                None => return Err(self.error("unterminated template literal")),
            }
        }
    }

    fn read_template_hole(&mut self) -> Result<String, ScriptError> {
        let mut depth = 1usize;
        let mut hole = String::new();
        loop {
            match self.current_char() {
                Some('{') => {
                    depth += 1;
                    hole.push('{');
                    self.advance();
                }
                Some('}') => {
                    depth -= 1;
                    self.advance();
                    if depth == 0 {
                        return Ok(hole);
                    }
                    hole.push('}');
                }
                Some(q @ ('\'' | '"')) => {
                    // carry strings through verbatim so braces inside them
                    // don't affect the balance
                    hole.push(q);
                    self.advance();
                    while let Some(ch) = self.current_char() {
                        hole.push(ch);
                        self.advance();
                        if ch == '\\' {
                            if let Some(next) = self.current_char() {
                                hole.push(next);
                                self.advance();
                            }
                        } else if ch == q {
                            break;
                        }
                    }
                }
                Some(ch) => {
                    hole.push(ch);
                    self.advance();
                }
                None => return Err(self.error("unterminated ${...} in template literal")),
            }
        }
    }

    /// Numeric literal: decimal digits, at most one decimal point (only when
    /// followed by a digit, so `1.add(2)` lexes as `1` `.` `add`), and an
    /// optional exponent. A second decimal point is malformed.
    fn read_number(&mut self) -> Result<Token, ScriptError> {
        let mut number = String::new();
        let mut is_float = false;

        while let Some(ch) = self.current_char() {
            if ch.is_ascii_digit() {
                number.push(ch);
                self.advance();
            } else if ch == '.' && self.peek_char(1).is_some_and(|c| c.is_ascii_digit()) {
                if is_float {
                    return Err(self.error(format!(
                        "malformed number '{}.': second decimal point",
                        number
                    )));
                }
                is_float = true;
                number.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        if let Some('e' | 'E') = self.current_char() {
            is_float = true;
            number.push('e');
            self.advance();
            if let Some(sign @ ('+' | '-')) = self.current_char() {
                number.push(sign);
                self.advance();
            }
            let mut digits = 0;
            while let Some(ch) = self.current_char() {
                if ch.is_ascii_digit() {
                    number.push(ch);
                    digits += 1;
                    self.advance();
                } else {
                    break;
                }
            }
            if digits == 0 {
                return Err(self.error(format!("malformed number '{}': missing exponent", number)));
            }
        }

        if is_float {
            number
                .parse::<f64>()
                .map(Token::Float)
                .map_err(|_| self.error(format!("malformed number '{}'", number)))
        } else {
            number
                .parse::<i64>()
                .map(Token::Integer)
                .map_err(|_| self.error(format!("integer '{}' out of range", number)))
        }
    }

    pub fn next_token(&mut self) -> Result<Token, ScriptError> {
        self.skip_whitespace_and_comments()?;

        let token = match self.current_char() {
            None => Token::Eof,
            Some('+') => {
                self.advance();
                Token::Plus
            }
            Some('-') => {
                self.advance();
                Token::Minus
            }
            Some('*') => {
                self.advance();
                Token::Star
            }
            Some('/') => {
                self.advance();
                Token::Slash
            }
            Some('%') => {
                self.advance();
                Token::Percent
            }
            Some('^') => {
                self.advance();
                Token::Caret
            }
            Some('=') => {
                if self.peek_char(1) == Some('=') {
                    self.advance();
                    self.advance();
                    Token::EqEq
                } else if self.peek_char(1) == Some('>') {
                    self.advance();
                    self.advance();
                    Token::Arrow
                } else {
                    self.advance();
                    Token::Assign
                }
            }
            Some('!') => {
                if self.peek_char(1) == Some('=') {
                    self.advance();
                    self.advance();
                    Token::NotEq
                } else {
                    self.advance();
                    Token::Bang
                }
            }
            Some('<') => {
                if self.peek_char(1) == Some('=') {
                    self.advance();
                    self.advance();
                    Token::LtEq
                } else if self.peek_char(1) == Some('<') {
                    self.advance();
                    self.advance();
                    Token::Shl
                } else {
                    self.advance();
                    Token::Lt
                }
            }
            Some('>') => {
                if self.peek_char(1) == Some('=') {
                    self.advance();
                    self.advance();
                    Token::GtEq
                } else if self.peek_char(1) == Some('>') {
                    self.advance();
                    self.advance();
                    Token::Shr
                } else {
                    self.advance();
                    Token::Gt
                }
            }
            Some('&') => {
                if self.peek_char(1) == Some('&') {
                    self.advance();
                    self.advance();
                    Token::AndAnd
                } else {
                    self.advance();
                    Token::Amp
                }
            }
            Some('|') => {
                if self.peek_char(1) == Some('|') {
                    self.advance();
                    self.advance();
                    Token::OrOr
                } else if self.peek_char(1) == Some('>') {
                    self.advance();
                    self.advance();
                    Token::PipeGt
                } else {
                    self.advance();
                    Token::Pipe
                }
            }
            Some('?') => {
                if self.peek_char(1) == Some('?') {
                    self.advance();
                    self.advance();
                    Token::Coalesce
                } else {
                    self.advance();
                    Token::Question
                }
            }
            Some('.') => {
                if self.peek_char(1) == Some('.') && self.peek_char(2) == Some('.') {
                    self.advance();
                    self.advance();
                    self.advance();
                    Token::Ellipsis
                } else {
                    self.advance();
                    Token::Dot
                }
            }
            Some(':') => {
                self.advance();
                Token::Colon
            }
            Some(';') => {
                self.advance();
                Token::Semicolon
            }
            Some(',') => {
                self.advance();
                Token::Comma
            }
            Some('(') => {
                self.advance();
                Token::LParen
            }
            Some(')') => {
                self.advance();
                Token::RParen
            }
            Some('[') => {
                self.advance();
                Token::LBracket
            }
            Some(']') => {
                self.advance();
                Token::RBracket
            }
            Some('{') => {
                self.advance();
                Token::LBrace
            }
            Some('}') => {
                self.advance();
                Token::RBrace
            }
            Some('"') => Token::String(self.read_string('"')?),
            Some('\'') => Token::String(self.read_string('\'')?),
            Some('`') => self.read_template()?,
            Some(ch) if ch.is_alphabetic() || ch == '_' => {
                let ident = self.read_identifier();
                match ident.as_str() {
                    "true" => Token::Boolean(true),
                    "false" => Token::Boolean(false),
                    "null" | "undefined" => Token::Null,
                    "var" => Token::Var,
                    "let" => Token::Let,
                    "const" => Token::Const,
                    _ => Token::Identifier(ident),
                }
            }
            Some(ch) if ch.is_ascii_digit() => self.read_number()?,
            Some(ch) => return Err(self.error(format!("unexpected character '{}'", ch))),
        };

        Ok(token)
    }
}

/// Tokenize a complete source string.
pub fn tokenize(input: &str) -> Result<Vec<Token>, ScriptError> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token == Token::Eof;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

#[test]
fn test_keywords() {
    let mut lexer = Lexer::new("true false null undefined var let const");
    assert_eq!(lexer.next_token().unwrap(), Token::Boolean(true));
    assert_eq!(lexer.next_token().unwrap(), Token::Boolean(false));
    assert_eq!(lexer.next_token().unwrap(), Token::Null);
    assert_eq!(lexer.next_token().unwrap(), Token::Null);
    assert_eq!(lexer.next_token().unwrap(), Token::Var);
    assert_eq!(lexer.next_token().unwrap(), Token::Let);
    assert_eq!(lexer.next_token().unwrap(), Token::Const);
}

#[test]
fn test_multi_char_operators() {
    let mut lexer = Lexer::new("== != <= >= && || ?? << >> => ... |>");
    assert_eq!(lexer.next_token().unwrap(), Token::EqEq);
    assert_eq!(lexer.next_token().unwrap(), Token::NotEq);
    assert_eq!(lexer.next_token().unwrap(), Token::LtEq);
    assert_eq!(lexer.next_token().unwrap(), Token::GtEq);
    assert_eq!(lexer.next_token().unwrap(), Token::AndAnd);
    assert_eq!(lexer.next_token().unwrap(), Token::OrOr);
    assert_eq!(lexer.next_token().unwrap(), Token::Coalesce);
    assert_eq!(lexer.next_token().unwrap(), Token::Shl);
    assert_eq!(lexer.next_token().unwrap(), Token::Shr);
    assert_eq!(lexer.next_token().unwrap(), Token::Arrow);
    assert_eq!(lexer.next_token().unwrap(), Token::Ellipsis);
    assert_eq!(lexer.next_token().unwrap(), Token::PipeGt);
}

#[test]
fn test_number_then_method() {
    // `1.2.add` must lex as the float 1.2, a dot, then an identifier
    let mut lexer = Lexer::new("1.2.add");
    assert_eq!(lexer.next_token().unwrap(), Token::Float(1.2));
    assert_eq!(lexer.next_token().unwrap(), Token::Dot);
    assert_eq!(lexer.next_token().unwrap(), Token::Identifier("add".to_string()));
}
