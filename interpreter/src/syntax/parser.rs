use crate::error::RuntimeError;
use crate::syntax::ast::{Argument, BinaryOperator, Expr, Statement, UnaryOperator};
use crate::syntax::lexer::{Spanned, Token, tokenize};

/// Parse fragment code into statements.
pub fn parse_program(code: &str) -> Result<Vec<Statement>, RuntimeError> {
    let tokens = tokenize(code)?;
    let mut parser = ProgramParser::new(tokens, code.len());
    parser.parse_statements(None)
}

// ---------------------------------------------------------------------------
// Parser state
// ---------------------------------------------------------------------------

struct ProgramParser {
    tokens: Vec<Spanned>,
    pos: usize,
    /// Depth of open parentheses and brackets; newlines are insignificant inside them.
    nesting: usize,
    /// Depth of the expression tree being built.
    depth: usize,
    code_len: usize,
}

/// Deepest expression tree the parser builds.
const MAX_NESTING: usize = 200;

// Binding powers (precedence). Higher = tighter binding.
// Left bp, right bp. For left-assoc: right = left + 1. For right-assoc: right = left.
const BP_OR: u8 = 2; // | ||
const BP_AND: u8 = 4; // & &&
const BP_NOT: u8 = 6; // prefix !
const BP_COMPARISON: u8 = 8; // == != < > <= >=
const BP_ADDITIVE: u8 = 10; // + -
const BP_MULTIPLICATIVE: u8 = 12; // * /
const BP_SPECIAL: u8 = 14; // %% %/%
const BP_SEQUENCE: u8 = 16; // :
const BP_UNARY: u8 = 18; // prefix -
const BP_POWER: u8 = 20; // ^
const BP_POSTFIX: u8 = 22; // [ ] $

impl ProgramParser {
    fn new(tokens: Vec<Spanned>, code_len: usize) -> Self {
        ProgramParser {
            tokens,
            pos: 0,
            nesting: 0,
            depth: 0,
            code_len,
        }
    }

    /// Index of the `n`th significant token from the cursor.
    fn index_of(&self, n: usize) -> Option<usize> {
        let mut seen = 0;
        for idx in self.pos..self.tokens.len() {
            if self.nesting > 0 && self.tokens[idx].token == Token::Newline {
                continue;
            }
            if seen == n {
                return Some(idx);
            }
            seen += 1;
        }
        None
    }

    fn peek(&self) -> Option<&Token> {
        self.peek_nth(0)
    }

    fn peek_nth(&self, n: usize) -> Option<&Token> {
        self.index_of(n).map(|idx| &self.tokens[idx].token)
    }

    fn advance(&mut self) -> Option<Spanned> {
        let idx = self.index_of(0)?;
        self.pos = idx + 1;
        Some(self.tokens[idx].clone())
    }

    /// Byte offset of the next token, or the end of the code.
    fn offset(&self) -> usize {
        self.index_of(0)
            .map(|idx| self.tokens[idx].span.start)
            .unwrap_or(self.code_len)
    }

    /// End offset of the last consumed token.
    fn last_end(&self) -> usize {
        self.pos
            .checked_sub(1)
            .and_then(|idx| self.tokens.get(idx))
            .map(|t| t.span.end)
            .unwrap_or(0)
    }

    fn error(&self, message: impl Into<String>) -> RuntimeError {
        RuntimeError::Syntax {
            message: message.into(),
            offset: self.offset(),
        }
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<(), RuntimeError> {
        match self.peek() {
            Some(t) if *t == expected => {
                self.advance();
                Ok(())
            }
            Some(t) => Err(self.error(format!("expected {}, found {}", what, describe(t)))),
            None => Err(self.error(format!("expected {}, found end of input", what))),
        }
    }

    fn expect_name(&mut self) -> Result<String, RuntimeError> {
        match self.advance().map(|t| t.token) {
            Some(Token::Ident(name)) | Some(Token::StringLit(name)) => Ok(name),
            _ => Err(self.error("expected a name")),
        }
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    /// Parse statements until `closing` (or the end of input when `None`).
    fn parse_statements(&mut self, closing: Option<Token>) -> Result<Vec<Statement>, RuntimeError> {
        let mut statements = Vec::new();
        loop {
            while matches!(self.peek(), Some(Token::Newline | Token::Semicolon)) {
                self.advance();
            }
            match (self.peek(), &closing) {
                (None, None) => break,
                (None, Some(_)) => return Err(self.error("unexpected end of input, expected '}'")),
                (Some(t), Some(c)) if t == c => {
                    self.advance();
                    break;
                }
                _ => {}
            }

            statements.push(self.parse_statement()?);

            match (self.peek(), &closing) {
                (None, _) | (Some(Token::Newline | Token::Semicolon), _) => {}
                (Some(t), Some(c)) if t == c => {}
                (Some(t), _) => {
                    return Err(self.error(format!("unexpected {}", describe(t))));
                }
            }
        }
        Ok(statements)
    }

    fn parse_statement(&mut self) -> Result<Statement, RuntimeError> {
        self.descend()?;
        let statement = self.parse_assignment();
        self.depth -= 1;
        statement
    }

    fn descend(&mut self) -> Result<(), RuntimeError> {
        if self.depth >= MAX_NESTING {
            return Err(self.error("expression nested too deeply"));
        }
        self.depth += 1;
        Ok(())
    }

    fn parse_assignment(&mut self) -> Result<Statement, RuntimeError> {
        let start = self.offset();
        let expr = self.parse_expr(0)?;

        match self.peek() {
            Some(Token::LeftAssign | Token::Eq) => {
                let target = match expr {
                    Expr::Variable(name, _) => name,
                    Expr::String(name) => name,
                    _ => return Err(self.error("invalid assignment target")),
                };
                self.advance();
                let value = match self.parse_statement()? {
                    Statement::Assignment { target, value, span } => Expr::Block(vec![
                        Statement::Assignment {
                            target: target.clone(),
                            value,
                            span: span.clone(),
                        },
                        Statement::Expression {
                            value: Expr::Variable(target, span.clone()),
                            span,
                        },
                    ]),
                    Statement::Expression { value, .. } => value,
                };
                Ok(Statement::Assignment {
                    target,
                    value,
                    span: start..self.last_end(),
                })
            }
            Some(Token::RightAssign) => {
                self.advance();
                let target = match self.advance().map(|t| t.token) {
                    Some(Token::Ident(name)) => name,
                    _ => return Err(self.error("invalid assignment target")),
                };
                Ok(Statement::Assignment {
                    target,
                    value: expr,
                    span: start..self.last_end(),
                })
            }
            _ => Ok(Statement::Expression {
                value: expr,
                span: start..self.last_end(),
            }),
        }
    }

    // ------------------------------------------------------------------
    // Pratt parser core
    // ------------------------------------------------------------------

    fn parse_expr(&mut self, min_bp: u8) -> Result<Expr, RuntimeError> {
        self.descend()?;
        let outer = self.depth;
        let expr = self.parse_operators(min_bp);
        self.depth = outer - 1;
        expr
    }

    /// Each operator applied wraps `left` one level deeper.
    fn parse_operators(&mut self, min_bp: u8) -> Result<Expr, RuntimeError> {
        let mut left = self.parse_prefix()?;

        loop {
            let Some(token) = self.peek() else { break };

            // Postfix operators
            match token {
                Token::LBracket if BP_POSTFIX >= min_bp => {
                    self.descend()?;
                    self.advance();
                    self.nesting += 1;
                    let index = self.parse_expr(0)?;
                    self.expect(Token::RBracket, "']'")?;
                    self.nesting -= 1;
                    left = Expr::Index {
                        target: Box::new(left),
                        index: Box::new(index),
                    };
                    continue;
                }
                Token::Dollar if BP_POSTFIX >= min_bp => {
                    self.descend()?;
                    self.advance();
                    let name = self.expect_name()?;
                    left = Expr::Member {
                        target: Box::new(left),
                        name,
                    };
                    continue;
                }
                _ => {}
            }

            let Some((operator, l_bp, r_bp)) = infix(token) else { break };
            if l_bp < min_bp {
                break;
            }
            self.descend()?;
            self.advance();
            let right = self.parse_expr(r_bp)?;
            left = Expr::Binary {
                operator,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_prefix(&mut self) -> Result<Expr, RuntimeError> {
        let Some(Spanned { token, span }) = self.advance() else {
            return Err(self.error("unexpected end of input"));
        };

        match token {
            // Literals
            Token::Number(n) => Ok(Expr::Number(n)),
            Token::StringLit(s) => Ok(Expr::String(s)),
            Token::True => Ok(Expr::Boolean(true)),
            Token::False => Ok(Expr::Boolean(false)),
            Token::Null => Ok(Expr::Null),

            Token::Ident(name) => match self.peek() {
                Some(Token::ColonColon) => {
                    self.advance();
                    let function = self.expect_name()?;
                    self.expect(Token::LParen, "'(' after a namespaced name")?;
                    let args = self.parse_arguments()?;
                    Ok(Expr::Call {
                        namespace: Some(name),
                        function,
                        args,
                        span: span.start..self.last_end(),
                    })
                }
                Some(Token::LParen) => {
                    self.advance();
                    let args = self.parse_arguments()?;
                    Ok(Expr::Call {
                        namespace: None,
                        function: name,
                        args,
                        span: span.start..self.last_end(),
                    })
                }
                _ => Ok(Expr::Variable(name, span)),
            },

            // Unary operators
            Token::Minus => {
                let operand = self.parse_expr(BP_UNARY)?;
                Ok(Expr::Unary {
                    operator: UnaryOperator::Negation,
                    operand: Box::new(operand),
                })
            }
            Token::Plus => self.parse_expr(BP_UNARY),
            Token::Bang => {
                let operand = self.parse_expr(BP_NOT)?;
                Ok(Expr::Unary {
                    operator: UnaryOperator::LogicalNot,
                    operand: Box::new(operand),
                })
            }

            // Parenthesized expression
            Token::LParen => {
                self.nesting += 1;
                let expr = self.parse_expr(0)?;
                self.expect(Token::RParen, "')'")?;
                self.nesting -= 1;
                Ok(expr)
            }

            Token::LBrace => {
                let outer = std::mem::replace(&mut self.nesting, 0);
                let statements = self.parse_statements(Some(Token::RBrace))?;
                self.nesting = outer;
                Ok(Expr::Block(statements))
            }

            Token::If => {
                self.expect(Token::LParen, "'(' after 'if'")?;
                self.nesting += 1;
                let condition = self.parse_expr(0)?;
                self.expect(Token::RParen, "')'")?;
                self.nesting -= 1;
                let then_branch = self.parse_expr(0)?;

                // `else` may follow on a later line.
                let mut lookahead = self.pos;
                while self
                    .tokens
                    .get(lookahead)
                    .is_some_and(|t| t.token == Token::Newline)
                {
                    lookahead += 1;
                }
                let has_else =
                    self.tokens.get(lookahead).map(|t| &t.token) == Some(&Token::Else);
                let else_branch = if has_else {
                    self.pos = lookahead + 1;
                    Some(Box::new(self.parse_expr(0)?))
                } else {
                    None
                };

                Ok(Expr::If {
                    condition: Box::new(condition),
                    then_branch: Box::new(then_branch),
                    else_branch,
                })
            }

            other => Err(RuntimeError::Syntax {
                message: format!("unexpected {}", describe(&other)),
                offset: span.start,
            }),
        }
    }

    /// Parse call arguments after the opening parenthesis.
    fn parse_arguments(&mut self) -> Result<Vec<Argument>, RuntimeError> {
        self.nesting += 1;
        let mut args = Vec::new();

        if self.peek() == Some(&Token::RParen) {
            self.advance();
            self.nesting -= 1;
            return Ok(args);
        }

        loop {
            let named = matches!(
                (self.peek(), self.peek_nth(1)),
                (Some(Token::Ident(_) | Token::StringLit(_)), Some(Token::Eq))
            );
            let name = if named {
                let name = self.expect_name()?;
                self.advance();
                Some(name)
            } else {
                None
            };
            let value = self.parse_expr(0)?;
            args.push(Argument { name, value });

            match self.advance().map(|t| t.token) {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => break,
                Some(other) => {
                    return Err(self.error(format!(
                        "expected ',' or ')' in argument list, found {}",
                        describe(&other)
                    )));
                }
                None => return Err(self.error("unexpected end of input in argument list")),
            }
        }

        self.nesting -= 1;
        Ok(args)
    }
}

/// Infix operators with their binding powers.
fn infix(token: &Token) -> Option<(BinaryOperator, u8, u8)> {
    let (operator, bp) = match token {
        Token::PipePipe => (BinaryOperator::LogicalOr, BP_OR),
        Token::Pipe => (BinaryOperator::Or, BP_OR),
        Token::AmpAmp => (BinaryOperator::LogicalAnd, BP_AND),
        Token::Amp => (BinaryOperator::And, BP_AND),
        Token::EqEq => (BinaryOperator::Equality, BP_COMPARISON),
        Token::BangEq => (BinaryOperator::Inequality, BP_COMPARISON),
        Token::Gt => (BinaryOperator::GreaterThan, BP_COMPARISON),
        Token::Lt => (BinaryOperator::LessThan, BP_COMPARISON),
        Token::GtEq => (BinaryOperator::GreaterThanOrEqual, BP_COMPARISON),
        Token::LtEq => (BinaryOperator::LessThanOrEqual, BP_COMPARISON),
        Token::Plus => (BinaryOperator::Addition, BP_ADDITIVE),
        Token::Minus => (BinaryOperator::Subtraction, BP_ADDITIVE),
        Token::Star => (BinaryOperator::Multiplication, BP_MULTIPLICATIVE),
        Token::Slash => (BinaryOperator::Division, BP_MULTIPLICATIVE),
        Token::Modulo => (BinaryOperator::Modulo, BP_SPECIAL),
        Token::IntDivide => (BinaryOperator::IntegerDivision, BP_SPECIAL),
        Token::Colon => (BinaryOperator::Sequence, BP_SEQUENCE),
        Token::Caret => return Some((BinaryOperator::Power, BP_POWER, BP_POWER)),
        _ => return None,
    };
    Some((operator, bp, bp + 1))
}

fn describe(token: &Token) -> String {
    match token {
        Token::Number(n) => format!("number {}", n),
        Token::StringLit(s) => format!("string \"{}\"", s),
        Token::Ident(name) => format!("symbol '{}'", name),
        Token::Newline => "end of line".to_string(),
        other => format!("{:?}", other),
    }
}
