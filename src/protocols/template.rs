//! Arithmetic templates for declarative unit scaling.
//!
//! Protocol tables express raw-to-engineering-unit conversion as a small
//! expression over the single variable `r`, e.g. `"r/10"` or
//! `"(r-30000)/10"`. The language is restricted to `+ - * / ( )`, numeric
//! literals and `r`; templates are parsed once at table construction and
//! evaluated per decode, so a malformed expression fails protocol setup
//! rather than the first response.
//!
//! Division always produces a float; the other operators stay integral
//! when both operands are integers.

use crate::error::{Error, Result};
use crate::protocols::result::Value;

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Var,
    Int(i64),
    Float(f64),
    Neg(Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
}

/// A compiled template expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    source: String,
    expr: Expr,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }
}

impl Template {
    /// Parse `source` into a template, failing on anything outside the
    /// restricted arithmetic grammar.
    pub fn parse(source: &str) -> Result<Self> {
        let tokens = tokenize(source)?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.expression()?;
        if parser.pos != parser.tokens.len() {
            return Err(Error::Config(format!(
                "trailing input in template '{source}'"
            )));
        }
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate with `r` bound to an integer raw value.
    pub fn apply_int(&self, r: i64) -> Value {
        Self::to_value(Self::eval(&self.expr, Num::Int(r)))
    }

    /// Evaluate with `r` bound to a float raw value.
    pub fn apply_float(&self, r: f64) -> Value {
        Self::to_value(Self::eval(&self.expr, Num::Float(r)))
    }

    fn to_value(num: Num) -> Value {
        match num {
            Num::Int(i) => Value::Int(i),
            Num::Float(f) => Value::Float(f),
        }
    }

    fn eval(expr: &Expr, r: Num) -> Num {
        match expr {
            Expr::Var => r,
            Expr::Int(i) => Num::Int(*i),
            Expr::Float(f) => Num::Float(*f),
            Expr::Neg(inner) => match Self::eval(inner, r) {
                Num::Int(i) => Num::Int(-i),
                Num::Float(f) => Num::Float(-f),
            },
            Expr::Add(a, b) => {
                Self::arith(Self::eval(a, r), Self::eval(b, r), i64::wrapping_add, |x, y| x + y)
            }
            Expr::Sub(a, b) => {
                Self::arith(Self::eval(a, r), Self::eval(b, r), i64::wrapping_sub, |x, y| x - y)
            }
            Expr::Mul(a, b) => {
                Self::arith(Self::eval(a, r), Self::eval(b, r), i64::wrapping_mul, |x, y| x * y)
            }
            // division always promotes to float, matching the tables'
            // expectation that r/10 keeps the tenths digit
            Expr::Div(a, b) => Num::Float(Self::eval(a, r).as_f64() / Self::eval(b, r).as_f64()),
        }
    }

    fn arith(a: Num, b: Num, int_op: fn(i64, i64) -> i64, float_op: fn(f64, f64) -> f64) -> Num {
        match (a, b) {
            (Num::Int(x), Num::Int(y)) => Num::Int(int_op(x, y)),
            _ => Num::Float(float_op(a.as_f64(), b.as_f64())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Var,
    Int(i64),
    Float(f64),
    Plus,
    Minus,
    Star,
    Slash,
    Open,
    Close,
}

fn tokenize(source: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' => {
                chars.next();
            }
            'r' => {
                chars.next();
                tokens.push(Token::Var);
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            '-' => {
                chars.next();
                tokens.push(Token::Minus);
            }
            '*' => {
                chars.next();
                tokens.push(Token::Star);
            }
            '/' => {
                chars.next();
                tokens.push(Token::Slash);
            }
            '(' => {
                chars.next();
                tokens.push(Token::Open);
            }
            ')' => {
                chars.next();
                tokens.push(Token::Close);
            }
            '0'..='9' | '.' => {
                let mut literal = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        literal.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let token = if literal.contains('.') {
                    Token::Float(literal.parse().map_err(|_| {
                        Error::Config(format!("bad numeric literal '{literal}' in template '{source}'"))
                    })?)
                } else {
                    Token::Int(literal.parse().map_err(|_| {
                        Error::Config(format!("bad numeric literal '{literal}' in template '{source}'"))
                    })?)
                };
                tokens.push(token);
            }
            other => {
                return Err(Error::Config(format!(
                    "unexpected character '{other}' in template '{source}'"
                )))
            }
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expression(&mut self) -> Result<Expr> {
        let mut lhs = self.term()?;
        while let Some(op) = self.peek() {
            let op = match op {
                Token::Plus => Token::Plus,
                Token::Minus => Token::Minus,
                _ => break,
            };
            self.next();
            let rhs = self.term()?;
            lhs = match op {
                Token::Plus => Expr::Add(Box::new(lhs), Box::new(rhs)),
                _ => Expr::Sub(Box::new(lhs), Box::new(rhs)),
            };
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr> {
        let mut lhs = self.factor()?;
        while let Some(op) = self.peek() {
            let op = match op {
                Token::Star => Token::Star,
                Token::Slash => Token::Slash,
                _ => break,
            };
            self.next();
            let rhs = self.factor()?;
            lhs = match op {
                Token::Star => Expr::Mul(Box::new(lhs), Box::new(rhs)),
                _ => Expr::Div(Box::new(lhs), Box::new(rhs)),
            };
        }
        Ok(lhs)
    }

    fn factor(&mut self) -> Result<Expr> {
        match self.next() {
            Some(Token::Var) => Ok(Expr::Var),
            Some(Token::Int(i)) => Ok(Expr::Int(i)),
            Some(Token::Float(f)) => Ok(Expr::Float(f)),
            Some(Token::Minus) => Ok(Expr::Neg(Box::new(self.factor()?))),
            Some(Token::Open) => {
                let inner = self.expression()?;
                match self.next() {
                    Some(Token::Close) => Ok(inner),
                    _ => Err(Error::Config("unbalanced parenthesis in template".into())),
                }
            }
            other => Err(Error::Config(format!(
                "unexpected token {other:?} in template"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn divide_by_ten() {
        let t = Template::parse("r/10").unwrap();
        assert_eq!(t.apply_int(265), Value::Float(26.5));
    }

    #[test]
    fn offset_then_scale() {
        let t = Template::parse("(r-30000)/10").unwrap();
        assert_eq!(t.apply_int(30159), Value::Float(15.9));
    }

    #[test]
    fn integer_arithmetic_stays_integral() {
        let t = Template::parse("r-40").unwrap();
        assert_eq!(t.apply_int(46), Value::Int(6));
    }

    #[test]
    fn float_input() {
        let t = Template::parse("r*2").unwrap();
        assert_eq!(t.apply_float(1.5), Value::Float(3.0));
    }

    #[test]
    fn unary_minus() {
        let t = Template::parse("-r+5").unwrap();
        assert_eq!(t.apply_int(3), Value::Int(2));
    }

    #[test]
    fn precedence() {
        let t = Template::parse("r+2*3").unwrap();
        assert_eq!(t.apply_int(1), Value::Int(7));
    }

    #[test]
    fn rejects_identifiers() {
        assert!(Template::parse("exec(r)").is_err());
        assert!(Template::parse("r.abs()").is_err());
    }

    #[test]
    fn rejects_unbalanced_parens() {
        assert!(Template::parse("(r/10").is_err());
    }

    #[test]
    fn rejects_trailing_garbage() {
        assert!(Template::parse("r/10)").is_err());
    }
}
