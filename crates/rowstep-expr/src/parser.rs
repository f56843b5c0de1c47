//! Precedence-climbing parser.
//!
//! ```text
//! or      := and (("||" | "or") and)*
//! and     := cmp (("&&" | "and") cmp)*
//! cmp     := add (("==" | "!=" | "<" | "<=" | ">" | ">=") add)*
//! add     := mul (("+" | "-") mul)*
//! mul     := unary (("*" | "/" | "%") unary)*
//! unary   := ("!" | "not" | "-") unary | primary
//! primary := literal | ident | ident "(" args? ")" | "(" or ")"
//! ```

use rowstep_core::types::Scalar;

use crate::aggregate::AggFunc;
use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::error::{ExprError, Result};
use crate::functions::FunctionSet;
use crate::lexer::{tokenize, Spanned, Token};

pub struct Parser<'f> {
    tokens: Vec<Spanned>,
    pos: usize,
    functions: &'f dyn FunctionSet,
    /// Aggregate functions in slot order.
    aggs: Vec<AggFunc>,
    in_aggregate: bool,
}

/// Parse `src`, returning the tree and its aggregate slots.
pub fn parse(src: &str, functions: &dyn FunctionSet) -> Result<(Expr, Vec<AggFunc>)> {
    let mut p = Parser {
        tokens: tokenize(src)?,
        pos: 0,
        functions,
        aggs: Vec::new(),
        in_aggregate: false,
    };
    if p.peek() == &Token::Eof {
        return Err(ExprError::parse(0, "empty expression"));
    }
    let expr = p.parse_or()?;
    if p.peek() != &Token::Eof {
        return Err(ExprError::parse(
            p.cur_pos(),
            format!("unexpected token {:?}", p.peek()),
        ));
    }
    Ok((expr, p.aggs))
}

impl<'f> Parser<'f> {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].token
    }

    fn cur_pos(&self) -> usize {
        self.tokens[self.pos.min(self.tokens.len() - 1)].pos
    }

    fn advance(&mut self) -> Token {
        let t = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        t
    }

    fn expect(&mut self, want: Token) -> Result<()> {
        if self.peek() == &want {
            self.advance();
            Ok(())
        } else {
            Err(ExprError::parse(
                self.cur_pos(),
                format!("expected {:?}, got {:?}", want, self.peek()),
            ))
        }
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut left = self.parse_and()?;
        while self.peek() == &Token::Or {
            self.advance();
            let right = self.parse_and()?;
            left = binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_cmp()?;
        while self.peek() == &Token::And {
            self.advance();
            let right = self.parse_cmp()?;
            left = binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn parse_cmp(&mut self) -> Result<Expr> {
        let mut left = self.parse_add()?;
        loop {
            let op = match self.peek() {
                Token::Eq => BinaryOp::Eq,
                Token::NotEq => BinaryOp::NotEq,
                Token::Lt => BinaryOp::Lt,
                Token::LtEq => BinaryOp::LtEq,
                Token::Gt => BinaryOp::Gt,
                Token::GtEq => BinaryOp::GtEq,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_add()?;
            left = binary(op, left, right);
        }
    }

    fn parse_add(&mut self) -> Result<Expr> {
        let mut left = self.parse_mul()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_mul()?;
            left = binary(op, left, right);
        }
    }

    fn parse_mul(&mut self) -> Result<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                Token::Percent => BinaryOp::Rem,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        let op = match self.peek() {
            Token::Not => UnaryOp::Not,
            Token::Minus => UnaryOp::Neg,
            _ => return self.parse_primary(),
        };
        self.advance();
        let expr = self.parse_unary()?;
        // fold negative literals so `-1` stays a literal
        if op == UnaryOp::Neg {
            match expr {
                Expr::Literal(Scalar::I64(i)) => return Ok(Expr::Literal(Scalar::I64(-i))),
                Expr::Literal(Scalar::F64(f)) => return Ok(Expr::Literal(Scalar::F64(-f))),
                _ => {}
            }
        }
        Ok(Expr::Unary {
            op,
            expr: Box::new(expr),
        })
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let pos = self.cur_pos();
        match self.advance() {
            Token::Int(i) => Ok(Expr::Literal(Scalar::I64(i))),
            Token::Float(f) => Ok(Expr::Literal(Scalar::F64(f))),
            Token::Str(s) => Ok(Expr::Literal(Scalar::Str(s))),
            Token::True => Ok(Expr::Literal(Scalar::Bool(true))),
            Token::False => Ok(Expr::Literal(Scalar::Bool(false))),
            Token::Null => Ok(Expr::Literal(Scalar::Null)),
            Token::LParen => {
                let e = self.parse_or()?;
                self.expect(Token::RParen)?;
                Ok(e)
            }
            Token::Ident(name) => {
                if self.peek() == &Token::LParen {
                    self.advance();
                    self.parse_call(name, pos)
                } else {
                    Ok(Expr::Ident(name))
                }
            }
            other => Err(ExprError::parse(pos, format!("unexpected token {:?}", other))),
        }
    }

    fn parse_call(&mut self, name: String, pos: usize) -> Result<Expr> {
        let lname = name.to_ascii_lowercase();

        if let Some(func) = AggFunc::lookup(&lname) {
            if self.in_aggregate {
                return Err(ExprError::parse(
                    pos,
                    format!("nested aggregate function {lname}"),
                ));
            }
            self.in_aggregate = true;
            let args = self.parse_args();
            self.in_aggregate = false;
            let args = args?;
            func.check_arity(args.len())?;
            let slot = self.aggs.len();
            self.aggs.push(func);
            return Ok(Expr::Aggregate { func, args, slot });
        }

        let (min, max) = self
            .functions
            .arity(&lname)
            .ok_or_else(|| ExprError::UnknownFunction(name.clone()))?;
        let args = self.parse_args()?;
        if args.len() < min || max.is_some_and(|m| args.len() > m) {
            return Err(ExprError::Arity {
                name: lname,
                expected: match max {
                    Some(m) if m == min => format!("{min}"),
                    Some(m) => format!("{min}..={m}"),
                    None => format!("at least {min}"),
                },
                got: args.len(),
            });
        }
        Ok(Expr::Call { name: lname, args })
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>> {
        let mut args = Vec::new();
        if self.peek() == &Token::RParen {
            self.advance();
            return Ok(args);
        }
        loop {
            args.push(self.parse_or()?);
            match self.peek() {
                Token::Comma => {
                    self.advance();
                }
                Token::RParen => {
                    self.advance();
                    return Ok(args);
                }
                other => {
                    return Err(ExprError::parse(
                        self.cur_pos(),
                        format!("expected ',' or ')', got {:?}", other),
                    ))
                }
            }
        }
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::Builtins;

    fn p(src: &str) -> Result<(Expr, Vec<AggFunc>)> {
        parse(src, &Builtins)
    }

    #[test]
    fn precedence() {
        let (e, _) = p("1 + 2 * 3 > 6 && !false").unwrap();
        let Expr::Binary { op: BinaryOp::And, left, .. } = e else {
            panic!("expected &&");
        };
        let Expr::Binary { op: BinaryOp::Gt, left, .. } = *left else {
            panic!("expected >");
        };
        assert!(matches!(*left, Expr::Binary { op: BinaryOp::Add, .. }));
    }

    #[test]
    fn aggregates_get_slots() {
        let (e, aggs) = p("sum(v1) / count(v1)").unwrap();
        assert_eq!(aggs, vec![AggFunc::Sum, AggFunc::Count]);
        assert!(e.has_aggregate());
        assert!(e.free_idents().is_empty());
        assert_eq!(e.idents(), vec!["v1".to_string()]);
    }

    #[test]
    fn nested_function_idents_surface() {
        let (e, _) = p("month(i_not_real)").unwrap();
        assert_eq!(e.idents(), vec!["i_not_real".to_string()]);
    }

    #[test]
    fn errors() {
        assert!(matches!(p("nope(1)"), Err(ExprError::UnknownFunction(_))));
        assert!(matches!(p("year()"), Err(ExprError::Arity { .. })));
        assert!(matches!(p("sum(count(x))"), Err(ExprError::Parse { .. })));
        assert!(matches!(p("(1 + 2"), Err(ExprError::Parse { .. })));
        assert!(matches!(p(""), Err(ExprError::Parse { .. })));
        assert!(matches!(p("a b"), Err(ExprError::Parse { .. })));
    }
}
