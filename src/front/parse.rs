//! The parser: recursive descent with precedence climbing for binary
//! operators, building the symbol table's scope tree as it goes.

use crate::common::Id;
use crate::error::{CompileError, Result};
use crate::middle::symbol::{ScopeId, SymbolTable, Type};

use super::ast::*;
use super::lex::Lexer;
use super::token::{Token, TokenKind};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Assoc {
    Left,
    Right,
}

/// `(precedence, associativity)` for each binary operator; higher binds
/// tighter. `Assign` is lowest and right-associative.
fn precedence(op: BinaryOp) -> (u8, Assoc) {
    use BinaryOp::*;
    match op {
        Assign => (0, Assoc::Right),
        Or => (10, Assoc::Left),
        And => (20, Assoc::Left),
        Equal | NotEqual => (30, Assoc::Left),
        Less | LessEqual | Greater | GreaterEqual => (40, Assoc::Left),
        Add | Sub => (50, Assoc::Left),
        Mul | Div => (60, Assoc::Left),
    }
}

fn binary_op_of(kind: TokenKind) -> Option<BinaryOp> {
    use BinaryOp::*;
    use TokenKind as T;
    Some(match kind {
        T::Plus => Add,
        T::Minus => Sub,
        T::Star => Mul,
        T::Slash => Div,
        T::Less => Less,
        T::LessEqual => LessEqual,
        T::Greater => Greater,
        T::GreaterEqual => GreaterEqual,
        T::Equal => Equal,
        T::NotEqual => NotEqual,
        T::And => And,
        T::Or => Or,
        T::Assign => Assign,
        _ => return None,
    })
}

fn binary_result_type(op: BinaryOp, left_ty: Type) -> Type {
    use BinaryOp::*;
    match op {
        Add | Sub | Mul | Div | Assign => left_ty,
        Less | LessEqual | Greater | GreaterEqual | Equal | NotEqual | And | Or => Type::Bool,
    }
}

pub struct Parser<'input> {
    lexer: Lexer<'input>,
    next: Token,
    sym: SymbolTable,
    scopes: Vec<ScopeId>,
}

pub fn parse(input: &str) -> Result<(Program, SymbolTable)> {
    let mut lexer = Lexer::new(input);
    let first = lexer.next()?;
    let sym = SymbolTable::new();
    let root = sym.root();
    let mut parser = Parser {
        lexer,
        next: first,
        sym,
        scopes: vec![root],
    };
    let program = parser.program()?;
    Ok((program, parser.sym))
}

impl<'input> Parser<'input> {
    fn scope(&self) -> ScopeId {
        *self.scopes.last().unwrap()
    }

    fn advance(&mut self) -> Result<Token> {
        let tok = self.lexer.next()?;
        Ok(std::mem::replace(&mut self.next, tok))
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.next.kind == kind
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token> {
        if self.next.kind != kind {
            return Err(CompileError::UnexpectedToken {
                found: format!("{}", self.next.kind),
                expected: format!("{kind}"),
            });
        }
        self.advance()
    }

    fn type_token(&mut self) -> Result<Type> {
        let ty = match self.next.kind {
            TokenKind::IntType => Type::Int,
            TokenKind::FloatType => Type::Float,
            TokenKind::BoolType => Type::Bool,
            TokenKind::StrType => Type::Str,
            _ => {
                return Err(CompileError::UnexpectedToken {
                    found: format!("{}", self.next.kind),
                    expected: "a type".to_string(),
                })
            }
        };
        self.advance()?;
        Ok(ty)
    }

    fn ident(&mut self) -> Result<Id> {
        let tok = self.expect(TokenKind::Id)?;
        Ok(tok.text)
    }

    fn program(&mut self) -> Result<Program> {
        let mut functions = Vec::new();
        while !self.check(TokenKind::Eof) {
            functions.push(self.function()?);
        }
        Ok(Program { functions })
    }

    fn function(&mut self) -> Result<Function> {
        let return_type = self.type_token()?;
        let name = self.ident()?;
        self.expect(TokenKind::OParen)?;

        let global = self.scope();
        let param_scope = self.sym.add_child_scope(global);
        let mut parameters = Vec::new();
        if !self.check(TokenKind::CParen) {
            loop {
                let ty = self.type_token()?;
                let pname = self.ident()?;
                parameters.push(self.sym.declare_var(param_scope, pname, ty));
                if self.check(TokenKind::Comma) {
                    self.advance()?;
                } else {
                    break;
                }
            }
        }
        self.expect(TokenKind::CParen)?;

        let body_scope = self.sym.add_child_scope(param_scope);
        let sym = self
            .sym
            .declare_func(global, name, return_type, param_scope, parameters);

        self.scopes.push(body_scope);
        let body = self.block_in(body_scope)?;
        self.scopes.pop();

        Ok(Function { sym, body })
    }

    /// Parse `"{" stmt* "}"` directly into an already-established scope,
    /// without pushing a further nested one. Used for a function's top-level
    /// body, whose scope is the parameter scope's first child.
    fn block_in(&mut self, scope: ScopeId) -> Result<Stmt> {
        debug_assert_eq!(self.scope(), scope);
        self.expect(TokenKind::OBrace)?;
        let mut stmts = Vec::new();
        while !self.check(TokenKind::CBrace) {
            stmts.push(self.stmt()?);
        }
        self.expect(TokenKind::CBrace)?;
        Ok(Stmt::Block(stmts))
    }

    /// Parse a nested block, pushing a fresh child scope of the current one.
    fn block(&mut self) -> Result<Stmt> {
        let child = self.sym.add_child_scope(self.scope());
        self.scopes.push(child);
        let stmt = self.block_in(child)?;
        self.scopes.pop();
        Ok(stmt)
    }

    fn stmt(&mut self) -> Result<Stmt> {
        match self.next.kind {
            TokenKind::IntType | TokenKind::FloatType | TokenKind::BoolType | TokenKind::StrType => {
                self.var_decl()
            }
            TokenKind::If => self.if_stmt(),
            TokenKind::While => self.while_stmt(),
            TokenKind::Return => self.return_stmt(),
            TokenKind::OBrace => self.block(),
            _ => self.expr_stmt(),
        }
    }

    fn var_decl(&mut self) -> Result<Stmt> {
        let ty = self.type_token()?;
        let name = self.ident()?;
        let var = self.sym.declare_var(self.scope(), name, ty);
        let stmt = if self.check(TokenKind::Assign) {
            self.advance()?;
            let init = self.expr()?;
            Stmt::Expr(Expr::Binary {
                op: BinaryOp::Assign,
                ty,
                left: Box::new(Expr::Var { ty, var }),
                right: Box::new(init),
            })
        } else {
            Stmt::Block(Vec::new())
        };
        self.expect(TokenKind::Semicolon)?;
        Ok(stmt)
    }

    fn if_stmt(&mut self) -> Result<Stmt> {
        self.expect(TokenKind::If)?;
        self.expect(TokenKind::OParen)?;
        let condition = self.expr()?;
        self.expect(TokenKind::CParen)?;
        let then_branch = Box::new(self.stmt()?);
        let else_branch = if self.check(TokenKind::Else) {
            self.advance()?;
            Some(Box::new(self.stmt()?))
        } else {
            None
        };
        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn while_stmt(&mut self) -> Result<Stmt> {
        self.expect(TokenKind::While)?;
        self.expect(TokenKind::OParen)?;
        let condition = self.expr()?;
        self.expect(TokenKind::CParen)?;
        let body = Box::new(self.stmt()?);
        Ok(Stmt::While { condition, body })
    }

    fn return_stmt(&mut self) -> Result<Stmt> {
        self.expect(TokenKind::Return)?;
        let expr = if self.check(TokenKind::Semicolon) {
            None
        } else {
            Some(self.expr()?)
        };
        self.expect(TokenKind::Semicolon)?;
        Ok(Stmt::Return(expr))
    }

    fn expr_stmt(&mut self) -> Result<Stmt> {
        let expr = self.expr()?;
        self.expect(TokenKind::Semicolon)?;
        Ok(Stmt::Expr(expr))
    }

    fn expr(&mut self) -> Result<Expr> {
        let left = self.unary_expr()?;
        self.binary_expr(left, 0)
    }

    /// Precedence-climbing over the flat operator table; `min_prec` is the
    /// lowest-precedence operator this call is allowed to consume.
    fn binary_expr(&mut self, mut left: Expr, min_prec: u8) -> Result<Expr> {
        loop {
            let Some(op) = binary_op_of(self.next.kind) else {
                return Ok(left);
            };
            let (prec, assoc) = precedence(op);
            if prec < min_prec {
                return Ok(left);
            }
            self.advance()?;
            let mut right = self.unary_expr()?;
            loop {
                let Some(next_op) = binary_op_of(self.next.kind) else {
                    break;
                };
                let (next_prec, _) = precedence(next_op);
                let climbs = next_prec > prec || (next_prec == prec && assoc == Assoc::Right);
                if !climbs {
                    break;
                }
                right = self.binary_expr(right, next_prec)?;
            }
            let ty = binary_result_type(op, left.ty());
            left = Expr::Binary {
                op,
                ty,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn unary_expr(&mut self) -> Result<Expr> {
        match self.next.kind {
            TokenKind::Not => {
                self.advance()?;
                let expr = self.unary_expr()?;
                let ty = expr.ty();
                Ok(Expr::Unary {
                    op: UnaryOp::Not,
                    ty,
                    expr: Box::new(expr),
                })
            }
            TokenKind::Minus => {
                self.advance()?;
                let expr = self.unary_expr()?;
                let ty = expr.ty();
                Ok(Expr::Unary {
                    op: UnaryOp::Negate,
                    ty,
                    expr: Box::new(expr),
                })
            }
            _ => self.primary_expr(),
        }
    }

    fn primary_expr(&mut self) -> Result<Expr> {
        match self.next.kind {
            TokenKind::IntLit => {
                let tok = self.advance()?;
                let value: i64 = tok.text.parse().expect("lexer guarantees digits");
                Ok(Expr::ConstInt(value))
            }
            TokenKind::FloatLit => {
                let tok = self.advance()?;
                let value: f64 = tok.text.parse().expect("lexer guarantees a float shape");
                Ok(Expr::ConstFloat(value))
            }
            TokenKind::StrLit => {
                let tok = self.advance()?;
                let trimmed = tok.text.trim_matches('"').to_string();
                Ok(Expr::ConstStr(trimmed))
            }
            TokenKind::True => {
                self.advance()?;
                Ok(Expr::ConstBool(true))
            }
            TokenKind::False => {
                self.advance()?;
                Ok(Expr::ConstBool(false))
            }
            TokenKind::OParen => {
                self.advance()?;
                let expr = self.expr()?;
                self.expect(TokenKind::CParen)?;
                Ok(expr)
            }
            TokenKind::Id => {
                let name = self.ident()?;
                if self.check(TokenKind::OParen) {
                    self.advance()?;
                    let mut args = Vec::new();
                    if !self.check(TokenKind::CParen) {
                        loop {
                            args.push(self.expr()?);
                            if self.check(TokenKind::Comma) {
                                self.advance()?;
                            } else {
                                break;
                            }
                        }
                    }
                    self.expect(TokenKind::CParen)?;
                    let func = self.sym.resolve_func(self.scope(), name)?;
                    let ty = self.sym.func(func).return_type;
                    Ok(Expr::Call { ty, func, args })
                } else {
                    let var = self.sym.resolve_var(self.scope(), name)?;
                    let ty = self.sym.var(var).ty;
                    Ok(Expr::Var { ty, var })
                }
            }
            _ => Err(CompileError::UnexpectedToken {
                found: format!("{}", self.next.kind),
                expected: "an expression".to_string(),
            }),
        }
    }
}
