//! Recursive-descent parser producing an [`Expr`] tree from source text.
//!
//! Precedence, low to high: ternary, `or`, `and`, `not`, comparisons,
//! `|`, `^`, `&`, shifts, additive, multiplicative, unary, power, postfix
//! (call / subscript / attribute), atom.

use crate::ast::*;
use crate::error::EvalError;
use crate::lexer::{lex, Tok};

/// Parse a single expression. Fails with [`EvalError::UnsupportedSyntax`]
/// on anything outside the supported grammar (including leftover tokens
/// after a complete expression, and unknown statements).
pub fn parse(src: &str) -> Result<Expr, EvalError> {
    let toks = lex(src).map_err(|(msg, pos)| EvalError::UnsupportedSyntax {
        expr: src.to_string(),
        detail: format!("{msg} at byte {pos}"),
    })?;
    let mut p = Parser { toks, pos: 0, src };
    let expr = p.parse_ternary()?;
    p.expect_eof()?;
    Ok(expr)
}

struct Parser<'a> {
    toks: Vec<(Tok, usize)>,
    pos: usize,
    src: &'a str,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> &Tok {
        &self.toks[self.pos].0
    }

    fn bump(&mut self) -> Tok {
        let t = self.toks[self.pos].0.clone();
        if self.pos + 1 < self.toks.len() {
            self.pos += 1;
        }
        t
    }

    fn err(&self, detail: impl Into<String>) -> EvalError {
        EvalError::UnsupportedSyntax {
            expr: self.src.to_string(),
            detail: detail.into(),
        }
    }

    fn expect_eof(&self) -> Result<(), EvalError> {
        if matches!(self.peek(), Tok::Eof) {
            Ok(())
        } else {
            Err(self.err(format!("unexpected trailing token {:?}", self.peek())))
        }
    }

    fn eat_ident(&mut self, word: &str) -> bool {
        if let Tok::Ident(s) = self.peek() {
            if s == word {
                self.bump();
                return true;
            }
        }
        false
    }

    fn peek_ident_is(&self, word: &str) -> bool {
        matches!(self.peek(), Tok::Ident(s) if s == word)
    }

    fn expect(&mut self, tok: Tok) -> Result<(), EvalError> {
        if std::mem::discriminant(self.peek()) == std::mem::discriminant(&tok) {
            self.bump();
            Ok(())
        } else {
            Err(self.err(format!("expected {tok:?}, found {:?}", self.peek())))
        }
    }

    // ternary := or_expr ("if" or_expr "else" ternary)?
    fn parse_ternary(&mut self) -> Result<Expr, EvalError> {
        let body = self.parse_or()?;
        if self.eat_ident("if") {
            let cond = self.parse_or()?;
            if !self.eat_ident("else") {
                return Err(self.err("expected 'else' in conditional expression"));
            }
            let alt = self.parse_ternary()?;
            Ok(Expr::Ternary(Box::new(body), Box::new(cond), Box::new(alt)))
        } else {
            Ok(body)
        }
    }

    // or_expr := and_expr ("or" and_expr)*
    fn parse_or(&mut self) -> Result<Expr, EvalError> {
        let first = self.parse_and()?;
        let mut rest = vec![first];
        while self.eat_ident("or") {
            rest.push(self.parse_and()?);
        }
        if rest.len() == 1 {
            Ok(rest.pop().unwrap())
        } else {
            Ok(Expr::BoolOp(BoolOpKind::Or, rest))
        }
    }

    // and_expr := not_expr ("and" not_expr)*
    fn parse_and(&mut self) -> Result<Expr, EvalError> {
        let first = self.parse_not()?;
        let mut rest = vec![first];
        while self.eat_ident("and") {
            rest.push(self.parse_not()?);
        }
        if rest.len() == 1 {
            Ok(rest.pop().unwrap())
        } else {
            Ok(Expr::BoolOp(BoolOpKind::And, rest))
        }
    }

    // not_expr := "not" not_expr | comparison
    fn parse_not(&mut self) -> Result<Expr, EvalError> {
        if self.eat_ident("not") {
            let inner = self.parse_not()?;
            Ok(Expr::Unary(UnOp::Not, Box::new(inner)))
        } else {
            self.parse_comparison()
        }
    }

    // comparison := bitor ( (op | "in" | "not in") bitor )*
    fn parse_comparison(&mut self) -> Result<Expr, EvalError> {
        let first = self.parse_bitor()?;
        let mut chain = Vec::new();
        loop {
            let op = if matches!(self.peek(), Tok::Lt) {
                self.bump();
                CmpOp::Lt
            } else if matches!(self.peek(), Tok::Le) {
                self.bump();
                CmpOp::Le
            } else if matches!(self.peek(), Tok::Gt) {
                self.bump();
                CmpOp::Gt
            } else if matches!(self.peek(), Tok::Ge) {
                self.bump();
                CmpOp::Ge
            } else if matches!(self.peek(), Tok::Eq) {
                self.bump();
                CmpOp::Eq
            } else if matches!(self.peek(), Tok::NotEq) {
                self.bump();
                CmpOp::Ne
            } else if self.peek_ident_is("in") {
                self.bump();
                CmpOp::In
            } else if self.peek_ident_is("not") {
                // lookahead for "not in"
                let save = self.pos;
                self.bump();
                if self.eat_ident("in") {
                    CmpOp::NotIn
                } else {
                    self.pos = save;
                    break;
                }
            } else {
                break;
            };
            let rhs = self.parse_bitor()?;
            chain.push((op, rhs));
        }
        if chain.is_empty() {
            Ok(first)
        } else {
            Ok(Expr::Compare(Box::new(first), chain))
        }
    }

    fn parse_bitor(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.parse_bitxor()?;
        while matches!(self.peek(), Tok::Pipe) {
            self.bump();
            let rhs = self.parse_bitxor()?;
            lhs = Expr::Binary(Box::new(lhs), BinOp::BitOr, Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_bitxor(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.parse_bitand()?;
        while matches!(self.peek(), Tok::Caret) {
            self.bump();
            let rhs = self.parse_bitand()?;
            lhs = Expr::Binary(Box::new(lhs), BinOp::BitXor, Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_bitand(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.parse_shift()?;
        while matches!(self.peek(), Tok::Amp) {
            self.bump();
            let rhs = self.parse_shift()?;
            lhs = Expr::Binary(Box::new(lhs), BinOp::BitAnd, Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_shift(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Tok::Shl => BinOp::Shl,
                Tok::Shr => BinOp::Shr,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_additive()?;
            lhs = Expr::Binary(Box::new(lhs), op, Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Tok::Plus => BinOp::Add,
                Tok::Minus => BinOp::Sub,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary(Box::new(lhs), op, Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Tok::Star => BinOp::Mul,
                Tok::Slash => BinOp::Div,
                Tok::DoubleSlash => BinOp::FloorDiv,
                Tok::Percent => BinOp::Mod,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(Box::new(lhs), op, Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, EvalError> {
        let op = match self.peek() {
            Tok::Plus => Some(UnOp::Pos),
            Tok::Minus => Some(UnOp::Neg),
            Tok::Tilde => Some(UnOp::Invert),
            _ => None,
        };
        if let Some(op) = op {
            self.bump();
            let inner = self.parse_unary()?;
            Ok(Expr::Unary(op, Box::new(inner)))
        } else {
            self.parse_power()
        }
    }

    // power := postfix ("**" unary)?   (right-associative)
    fn parse_power(&mut self) -> Result<Expr, EvalError> {
        let base = self.parse_postfix()?;
        if matches!(self.peek(), Tok::DoubleStar) {
            self.bump();
            let exp = self.parse_unary()?;
            Ok(Expr::Binary(Box::new(base), BinOp::Pow, Box::new(exp)))
        } else {
            Ok(base)
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr, EvalError> {
        let mut expr = self.parse_atom()?;
        loop {
            match self.peek() {
                Tok::Dot => {
                    self.bump();
                    let name = match self.bump() {
                        Tok::Ident(s) => s,
                        other => return Err(self.err(format!("expected attribute name, found {other:?}"))),
                    };
                    expr = Expr::Attribute(Box::new(expr), name);
                }
                Tok::LParen => {
                    self.bump();
                    let mut args = Vec::new();
                    if !matches!(self.peek(), Tok::RParen) {
                        loop {
                            args.push(self.parse_ternary()?);
                            if matches!(self.peek(), Tok::Comma) {
                                self.bump();
                            } else {
                                break;
                            }
                        }
                    }
                    self.expect(Tok::RParen)?;
                    expr = Expr::Call(Box::new(expr), args);
                }
                Tok::LBracket => {
                    self.bump();
                    let sub = self.parse_subscript()?;
                    self.expect(Tok::RBracket)?;
                    expr = Expr::Index(Box::new(expr), sub);
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_subscript(&mut self) -> Result<Subscript, EvalError> {
        // slice := expr? ":" expr? (":" expr?)?
        let first = if matches!(self.peek(), Tok::Colon) {
            None
        } else {
            Some(Box::new(self.parse_ternary()?))
        };
        if !matches!(self.peek(), Tok::Colon) {
            return Ok(Subscript::Index(first.expect("non-slice index")));
        }
        self.bump(); // ':'
        let second = if matches!(self.peek(), Tok::Colon | Tok::RBracket) {
            None
        } else {
            Some(Box::new(self.parse_ternary()?))
        };
        let third = if matches!(self.peek(), Tok::Colon) {
            self.bump();
            if matches!(self.peek(), Tok::RBracket) {
                None
            } else {
                Some(Box::new(self.parse_ternary()?))
            }
        } else {
            None
        };
        Ok(Subscript::Slice(first, second, third))
    }

    fn parse_atom(&mut self) -> Result<Expr, EvalError> {
        match self.bump() {
            Tok::Int(v) => Ok(Expr::Int(v)),
            Tok::Float(v) => Ok(Expr::Float(v)),
            Tok::Str(s) => Ok(Expr::Str(s)),
            Tok::Ident(name) => match name.as_str() {
                "True" => Ok(Expr::Bool(true)),
                "False" => Ok(Expr::Bool(false)),
                "None" => Ok(Expr::NoneLit),
                _ => Ok(Expr::Name(name)),
            },
            Tok::LParen => {
                if matches!(self.peek(), Tok::RParen) {
                    self.bump();
                    return Ok(Expr::Tuple(vec![]));
                }
                let first = self.parse_ternary()?;
                if matches!(self.peek(), Tok::Comma) {
                    let mut items = vec![first];
                    while matches!(self.peek(), Tok::Comma) {
                        self.bump();
                        if matches!(self.peek(), Tok::RParen) {
                            break;
                        }
                        items.push(self.parse_ternary()?);
                    }
                    self.expect(Tok::RParen)?;
                    Ok(Expr::Tuple(items))
                } else {
                    self.expect(Tok::RParen)?;
                    Ok(first)
                }
            }
            Tok::LBracket => self.parse_list_or_comprehension(),
            Tok::LBrace => self.parse_map_literal(),
            other => Err(self.err(format!("unexpected token {other:?}"))),
        }
    }

    fn parse_list_or_comprehension(&mut self) -> Result<Expr, EvalError> {
        if matches!(self.peek(), Tok::RBracket) {
            self.bump();
            return Ok(Expr::List(vec![]));
        }
        let first = self.parse_ternary()?;
        if self.peek_ident_is("for") {
            self.bump();
            let target = self.parse_comprehension_target()?;
            if !self.eat_ident("in") {
                return Err(self.err("expected 'in' in comprehension"));
            }
            let iter = self.parse_or()?;
            let cond = if self.eat_ident("if") {
                Some(Box::new(self.parse_or()?))
            } else {
                None
            };
            self.expect(Tok::RBracket)?;
            if self.peek_ident_is("for") {
                return Err(self.err("only single-generator comprehensions are supported"));
            }
            Ok(Expr::ListComp {
                element: Box::new(first),
                target,
                iter: Box::new(iter),
                cond,
            })
        } else {
            let mut items = vec![first];
            while matches!(self.peek(), Tok::Comma) {
                self.bump();
                if matches!(self.peek(), Tok::RBracket) {
                    break;
                }
                items.push(self.parse_ternary()?);
            }
            self.expect(Tok::RBracket)?;
            Ok(Expr::List(items))
        }
    }

    fn parse_comprehension_target(&mut self) -> Result<Target, EvalError> {
        if matches!(self.peek(), Tok::LParen) {
            self.bump();
            let mut names = Vec::new();
            loop {
                match self.bump() {
                    Tok::Ident(s) => names.push(s),
                    other => return Err(self.err(format!("expected name in tuple target, found {other:?}"))),
                }
                if matches!(self.peek(), Tok::Comma) {
                    self.bump();
                } else {
                    break;
                }
            }
            self.expect(Tok::RParen)?;
            Ok(Target::Tuple(names))
        } else {
            match self.bump() {
                Tok::Ident(s) => Ok(Target::Name(s)),
                other => Err(self.err(format!("expected comprehension target, found {other:?}"))),
            }
        }
    }

    fn parse_map_literal(&mut self) -> Result<Expr, EvalError> {
        let mut entries = Vec::new();
        if matches!(self.peek(), Tok::RBrace) {
            self.bump();
            return Ok(Expr::Map(entries));
        }
        loop {
            let key = self.parse_ternary()?;
            self.expect(Tok::Colon)?;
            let value = self.parse_ternary()?;
            entries.push((key, value));
            if matches!(self.peek(), Tok::Comma) {
                self.bump();
                if matches!(self.peek(), Tok::RBrace) {
                    break;
                }
            } else {
                break;
            }
        }
        self.expect(Tok::RBrace)?;
        Ok(Expr::Map(entries))
    }
}
