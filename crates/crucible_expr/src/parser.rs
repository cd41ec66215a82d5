//! Recursive-descent parser producing the expression tree.
//!
//! Grammar, lowest precedence first:
//!
//! ```text
//! expr     := or ( "?" expr ":" expr )?
//! or       := and ( "||" and )*
//! and      := equality ( "&&" equality )*
//! equality := compare ( ("==" | "!=") compare )*
//! compare  := additive ( ("<" | "<=" | ">" | ">=") additive )*
//! additive := term ( ("+" | "-") term )*
//! term     := unary ( ("*" | "/" | "%") unary )*
//! unary    := ("!" | "-") unary | primary
//! primary  := literal | ident ("." ident)* | ident "(" args ")" | "(" expr ")"
//! ```

use crate::error::{ExprError, ExprResult};
use crate::lexer::{Spanned, Token};
use crate::value::Value;

/// Unary operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    /// Logical negation.
    Not,
    /// Arithmetic negation.
    Neg,
}

/// Binary operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Rem,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `&&`
    And,
    /// `||`
    Or,
}

/// Expression tree node.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// Constant value.
    Literal(Value),
    /// Variable reference; dotted paths are joined (`input0.attack`).
    Var(String),
    /// Built-in call.
    Call {
        /// Function name.
        name: String,
        /// Arguments in source order.
        args: Vec<Expr>,
    },
    /// Unary operation.
    Unary(UnaryOp, Box<Expr>),
    /// Binary operation.
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    /// `cond ? then : otherwise`
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
}

/// Parses a token stream into a single expression.
///
/// # Errors
///
/// Returns [`ExprError::Parse`] on malformed input and
/// [`ExprError::LimitExceeded`] when nesting exceeds `max_depth`.
pub fn parse(tokens: &[Spanned], max_depth: usize) -> ExprResult<Expr> {
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        max_depth,
    };
    let expr = parser.parse_expr()?;
    if parser.peek() != &Token::Eof {
        return Err(parser.err(format!("unexpected trailing token {:?}", parser.peek())));
    }
    Ok(expr)
}

static EOF: Token = Token::Eof;

struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
    depth: usize,
    max_depth: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> &Token {
        // lex() always terminates the stream with Eof
        self.tokens.get(self.pos).map_or(&EOF, |s| &s.token)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(0, |s| s.offset)
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, want: &Token, what: &str) -> ExprResult<()> {
        if self.peek() == want {
            self.advance();
            Ok(())
        } else {
            Err(self.err(format!("expected {what}, got {:?}", self.peek())))
        }
    }

    fn err(&self, message: impl Into<String>) -> ExprError {
        ExprError::parse(self.offset(), message)
    }

    fn enter(&mut self) -> ExprResult<()> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(ExprError::LimitExceeded(format!(
                "nesting depth exceeds {}",
                self.max_depth
            )));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    /// Each node of a left-associated operator chain nests one level deeper.
    fn leave_chain(&mut self, chain: usize) {
        self.depth -= chain;
    }

    fn parse_expr(&mut self) -> ExprResult<Expr> {
        self.enter()?;
        let cond = self.parse_or()?;
        let out = if self.peek() == &Token::Question {
            self.advance();
            let then = self.parse_expr()?;
            self.expect(&Token::Colon, "':' in conditional")?;
            let otherwise = self.parse_expr()?;
            Expr::Ternary(Box::new(cond), Box::new(then), Box::new(otherwise))
        } else {
            cond
        };
        self.leave();
        Ok(out)
    }

    fn parse_or(&mut self) -> ExprResult<Expr> {
        let mut left = self.parse_and()?;
        let mut chain = 0;
        while self.peek() == &Token::OrOr {
            self.advance();
            self.enter()?;
            chain += 1;
            let right = self.parse_and()?;
            left = Expr::Binary(BinaryOp::Or, Box::new(left), Box::new(right));
        }
        self.leave_chain(chain);
        Ok(left)
    }

    fn parse_and(&mut self) -> ExprResult<Expr> {
        let mut left = self.parse_equality()?;
        let mut chain = 0;
        while self.peek() == &Token::AndAnd {
            self.advance();
            self.enter()?;
            chain += 1;
            let right = self.parse_equality()?;
            left = Expr::Binary(BinaryOp::And, Box::new(left), Box::new(right));
        }
        self.leave_chain(chain);
        Ok(left)
    }

    fn parse_equality(&mut self) -> ExprResult<Expr> {
        let mut left = self.parse_compare()?;
        let mut chain = 0;
        loop {
            let op = match self.peek() {
                Token::EqEq => BinaryOp::Eq,
                Token::NotEq => BinaryOp::Ne,
                _ => break,
            };
            self.advance();
            self.enter()?;
            chain += 1;
            let right = self.parse_compare()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        self.leave_chain(chain);
        Ok(left)
    }

    fn parse_compare(&mut self) -> ExprResult<Expr> {
        let mut left = self.parse_additive()?;
        let mut chain = 0;
        loop {
            let op = match self.peek() {
                Token::Lt => BinaryOp::Lt,
                Token::Le => BinaryOp::Le,
                Token::Gt => BinaryOp::Gt,
                Token::Ge => BinaryOp::Ge,
                _ => break,
            };
            self.advance();
            self.enter()?;
            chain += 1;
            let right = self.parse_additive()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        self.leave_chain(chain);
        Ok(left)
    }

    fn parse_additive(&mut self) -> ExprResult<Expr> {
        let mut left = self.parse_term()?;
        let mut chain = 0;
        loop {
            let op = match self.peek() {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            self.enter()?;
            chain += 1;
            let right = self.parse_term()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        self.leave_chain(chain);
        Ok(left)
    }

    fn parse_term(&mut self) -> ExprResult<Expr> {
        let mut left = self.parse_unary()?;
        let mut chain = 0;
        loop {
            let op = match self.peek() {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                Token::Percent => BinaryOp::Rem,
                _ => break,
            };
            self.advance();
            self.enter()?;
            chain += 1;
            let right = self.parse_unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        self.leave_chain(chain);
        Ok(left)
    }

    fn parse_unary(&mut self) -> ExprResult<Expr> {
        let op = match self.peek() {
            Token::Bang => UnaryOp::Not,
            Token::Minus => UnaryOp::Neg,
            _ => return self.parse_primary(),
        };
        self.advance();
        self.enter()?;
        let inner = self.parse_unary()?;
        self.leave();

        // Fold negated literals.
        if op == UnaryOp::Neg {
            match inner {
                Expr::Literal(Value::Int(v)) => {
                    return v
                        .checked_neg()
                        .map(|n| Expr::Literal(Value::Int(n)))
                        .ok_or_else(|| ExprError::Arithmetic("negation overflow".into()));
                }
                Expr::Literal(Value::Float(v)) => return Ok(Expr::Literal(Value::Float(-v))),
                _ => {}
            }
        }
        Ok(Expr::Unary(op, Box::new(inner)))
    }

    fn parse_primary(&mut self) -> ExprResult<Expr> {
        match self.advance() {
            Token::Int(v) => Ok(Expr::Literal(Value::Int(v))),
            Token::Float(v) => Ok(Expr::Literal(Value::Float(v))),
            Token::Str(s) => Ok(Expr::Literal(Value::Str(s))),
            Token::LParen => {
                let inner = self.parse_expr()?;
                self.expect(&Token::RParen, "')'")?;
                Ok(inner)
            }
            Token::Ident(name) => match name.as_str() {
                "true" => Ok(Expr::Literal(Value::Bool(true))),
                "false" => Ok(Expr::Literal(Value::Bool(false))),
                _ if self.peek() == &Token::LParen => {
                    self.advance();
                    let args = self.parse_args()?;
                    Ok(Expr::Call { name, args })
                }
                _ => {
                    let mut path = name;
                    while self.peek() == &Token::Dot {
                        self.advance();
                        match self.advance() {
                            Token::Ident(field) => {
                                path.push('.');
                                path.push_str(&field);
                            }
                            other => {
                                return Err(self.err(format!("expected field name after '.', got {other:?}")))
                            }
                        }
                    }
                    Ok(Expr::Var(path))
                }
            },
            other => {
                // Point the error at the token we just consumed.
                self.pos = self.pos.saturating_sub(1);
                Err(self.err(format!("expected expression, got {other:?}")))
            }
        }
    }

    fn parse_args(&mut self) -> ExprResult<Vec<Expr>> {
        let mut args = Vec::new();
        if self.peek() == &Token::RParen {
            self.advance();
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            match self.advance() {
                Token::Comma => continue,
                Token::RParen => return Ok(args),
                other => {
                    self.pos = self.pos.saturating_sub(1);
                    return Err(self.err(format!("expected ',' or ')' in call, got {other:?}")));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;

    fn p(src: &str) -> ExprResult<Expr> {
        parse(&lex(src)?, 64)
    }

    #[test]
    fn test_precedence() {
        let e = p("1 + 2 * 3").unwrap();
        assert_eq!(
            e,
            Expr::Binary(
                BinaryOp::Add,
                Box::new(Expr::Literal(Value::Int(1))),
                Box::new(Expr::Binary(
                    BinaryOp::Mul,
                    Box::new(Expr::Literal(Value::Int(2))),
                    Box::new(Expr::Literal(Value::Int(3))),
                )),
            )
        );
    }

    #[test]
    fn test_member_path_and_call() {
        assert_eq!(p("input1.HP").unwrap(), Expr::Var("input1.HP".into()));
        assert_eq!(
            p("rand(10)").unwrap(),
            Expr::Call {
                name: "rand".into(),
                args: vec![Expr::Literal(Value::Int(10))],
            }
        );
    }

    #[test]
    fn test_ternary_is_right_associative() {
        let e = p("a ? 1 : b ? 2 : 3").unwrap();
        let Expr::Ternary(_, _, otherwise) = e else {
            panic!("expected ternary");
        };
        assert!(matches!(*otherwise, Expr::Ternary(..)));
    }

    #[test]
    fn test_negative_literal_folding() {
        assert_eq!(p("-5").unwrap(), Expr::Literal(Value::Int(-5)));
        assert_eq!(p("-2.5").unwrap(), Expr::Literal(Value::Float(-2.5)));
    }

    #[test]
    fn test_depth_limit() {
        let deep = format!("{}1{}", "(".repeat(100), ")".repeat(100));
        assert!(matches!(p(&deep), Err(ExprError::LimitExceeded(_))));
    }

    #[test]
    fn test_operator_chain_counts_toward_depth() {
        assert!(p(&format!("1{}", "+1".repeat(40))).is_ok());
        assert!(matches!(
            p(&format!("1{}", "+1".repeat(2047))),
            Err(ExprError::LimitExceeded(_))
        ));
        assert!(matches!(
            p(&format!("a{}", " && a".repeat(100))),
            Err(ExprError::LimitExceeded(_))
        ));
        // Depth is released after each chain.
        let siblings = vec![format!("1{}", "*1".repeat(40)); 4].join(" == ");
        assert!(p(&siblings).is_ok());
    }

    #[test]
    fn test_errors() {
        assert!(matches!(p("1 +"), Err(ExprError::Parse { .. })));
        assert!(matches!(p("f(1 2)"), Err(ExprError::Parse { .. })));
        assert!(matches!(p("1 2"), Err(ExprError::Parse { .. })));
        assert!(matches!(p("a ? 1"), Err(ExprError::Parse { .. })));
    }
}
