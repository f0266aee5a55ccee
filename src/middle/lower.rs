//! Lowers the AST into three-address code (component K): a tree-walking
//! visitor that mirrors the AST's own recursive shape.
//!
//! A `label` is threaded through the recursion as a resource: it starts as
//! whatever the enclosing statement wants the *next emitted quadruple* to
//! carry, and is consumed (turned into `None`) the moment some quadruple
//! actually picks it up. This is what lets an `IfStmt`'s `afterLabel` land on
//! the first instruction of whatever statement follows it in its block.

use crate::common::Id;
use crate::error::Result;
use crate::front::ast::{self, BinaryOp, Expr, Stmt, UnaryOp};

use super::symbol::{ScopeId, SymbolTable, Type, VarId};
use super::tac::{Address, Function, Op, Quadruple};

struct NameGen {
    prefix: &'static str,
    n: u32,
}

impl NameGen {
    fn new(prefix: &'static str) -> Self {
        NameGen { prefix, n: 0 }
    }

    fn next(&mut self) -> Id {
        let name = crate::common::id(format!("{}{}", self.prefix, self.n));
        self.n += 1;
        name
    }
}

fn binary_tac_op(op: BinaryOp) -> Op {
    match op {
        BinaryOp::Add => Op::Add,
        BinaryOp::Sub => Op::Sub,
        BinaryOp::Mul => Op::Mul,
        BinaryOp::Div => Op::Div,
        BinaryOp::Less => Op::Less,
        BinaryOp::LessEqual => Op::LessEqual,
        BinaryOp::Greater => Op::Greater,
        BinaryOp::GreaterEqual => Op::GreaterEqual,
        BinaryOp::Equal => Op::Equal,
        BinaryOp::NotEqual => Op::NotEqual,
        BinaryOp::And => Op::And,
        BinaryOp::Or => Op::Or,
        BinaryOp::Assign => unreachable!("Assign is lowered separately"),
    }
}

fn unary_tac_op(op: UnaryOp) -> Op {
    match op {
        UnaryOp::Not => Op::Not,
        UnaryOp::Negate => Op::Negate,
    }
}

struct Lower<'a> {
    sym: &'a mut SymbolTable,
    scope: ScopeId,
    labels: NameGen,
    temps: NameGen,
    code: Vec<Quadruple>,
}

impl<'a> Lower<'a> {
    fn new_temp(&mut self, ty: Type) -> VarId {
        let name = self.temps.next();
        self.sym.declare_var(self.scope, name, ty)
    }

    fn new_label(&mut self) -> Id {
        self.labels.next()
    }

    fn emit(&mut self, label: Option<Id>, op: Op, result: Address, arg1: Address, arg2: Address) {
        self.code.push(match label {
            Some(l) => Quadruple::labeled(l, op, result, arg1, arg2),
            None => Quadruple::new(op, result, arg1, arg2),
        });
    }

    fn lower_expr(&mut self, expr: &Expr, label: Option<Id>) -> Result<(Address, Option<Id>)> {
        match expr {
            Expr::Var { var, .. } => Ok((Address::Var(*var), label)),
            Expr::ConstInt(v) => Ok((Address::ConstInt(*v), label)),
            Expr::ConstFloat(v) => Ok((Address::ConstFloat(*v), label)),
            Expr::ConstBool(v) => Ok((Address::ConstBool(*v), label)),
            Expr::ConstStr(_) => Err(crate::error::CompileError::UnsupportedOperand(
                "string constants are not representable as a TAC address",
            )),
            Expr::Binary {
                op: BinaryOp::Assign,
                left,
                right,
                ..
            } => {
                let (dst, label) = self.lower_expr(left, label)?;
                let (src, label) = self.lower_expr(right, label)?;
                self.emit(label, Op::Assign, dst.clone(), dst.clone(), src);
                Ok((dst, None))
            }
            Expr::Binary {
                op, ty, left, right, ..
            } => {
                let (left_addr, label) = self.lower_expr(left, label)?;
                let (right_addr, label) = self.lower_expr(right, label)?;
                let tmp = self.new_temp(*ty);
                self.emit(label, binary_tac_op(*op), Address::Var(tmp), left_addr, right_addr);
                Ok((Address::Var(tmp), None))
            }
            Expr::Unary { op, ty, expr } => {
                let (operand, label) = self.lower_expr(expr, label)?;
                let tmp = self.new_temp(*ty);
                self.emit(label, unary_tac_op(*op), Address::Var(tmp), operand, Address::Empty);
                Ok((Address::Var(tmp), None))
            }
            Expr::Call { ty, func, args } => {
                let mut label = label;
                for arg in args {
                    let (addr, after) = self.lower_expr(arg, label)?;
                    self.emit(after, Op::Param, Address::Empty, addr, Address::Empty);
                    label = None;
                }
                let tmp = self.new_temp(*ty);
                self.emit(
                    label,
                    Op::Call,
                    Address::Var(tmp),
                    Address::Func(*func),
                    Address::ArgCount(args.len()),
                );
                Ok((Address::Var(tmp), None))
            }
        }
    }

    fn lower_stmt(&mut self, stmt: &Stmt, label: Option<Id>) -> Result<Option<Id>> {
        match stmt {
            Stmt::Expr(e) => {
                let (_, label) = self.lower_expr(e, label)?;
                Ok(label)
            }
            Stmt::Block(stmts) => {
                let mut label = label;
                for s in stmts {
                    label = self.lower_stmt(s, label)?;
                }
                Ok(label)
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let (cond_addr, cond_label) = self.lower_expr(condition, label)?;
                let after_label = self.new_label();
                if let Some(else_branch) = else_branch {
                    let false_label = self.new_label();
                    self.emit(
                        cond_label,
                        Op::IfFalseJump,
                        Address::Label(false_label),
                        cond_addr,
                        Address::Empty,
                    );
                    self.lower_stmt(then_branch, None)?;
                    self.emit(
                        None,
                        Op::Jump,
                        Address::Label(after_label),
                        Address::Empty,
                        Address::Empty,
                    );
                    self.lower_stmt(else_branch, Some(false_label))?;
                } else {
                    self.emit(
                        cond_label,
                        Op::IfFalseJump,
                        Address::Label(after_label),
                        cond_addr,
                        Address::Empty,
                    );
                    self.lower_stmt(then_branch, None)?;
                }
                Ok(Some(after_label))
            }
            Stmt::While { condition, body } => {
                let loop_label = match label {
                    Some(l) => l,
                    None => self.new_label(),
                };
                let after_label = self.new_label();
                let (cond_addr, cond_label) = self.lower_expr(condition, Some(loop_label))?;
                self.emit(
                    cond_label,
                    Op::IfFalseJump,
                    Address::Label(after_label),
                    cond_addr,
                    Address::Empty,
                );
                self.lower_stmt(body, None)?;
                self.emit(
                    None,
                    Op::Jump,
                    Address::Label(loop_label),
                    Address::Empty,
                    Address::Empty,
                );
                Ok(Some(after_label))
            }
            Stmt::Return(expr) => {
                match expr {
                    Some(e) => {
                        let (addr, label) = self.lower_expr(e, label)?;
                        self.emit(label, Op::Return, Address::Empty, addr, Address::Empty);
                    }
                    None => {
                        self.emit(label, Op::Return, Address::Empty, Address::Empty, Address::Empty);
                    }
                }
                Ok(None)
            }
        }
    }
}

/// Lower every function in `program` into three-address code.
pub fn lower(program: &ast::Program, sym: &mut SymbolTable) -> Result<Vec<Function>> {
    let mut functions = Vec::with_capacity(program.functions.len());
    for function in &program.functions {
        let param_scope = sym.func(function.sym).parameter_scope;
        let body_scope = sym.children(param_scope)[0];
        let mut lower = Lower {
            sym,
            scope: body_scope,
            labels: NameGen::new("__label"),
            temps: NameGen::new("__temp"),
            code: Vec::new(),
        };
        lower.lower_stmt(&function.body, None)?;
        functions.push(Function {
            sym: function.sym,
            code: lower.code,
        });
    }
    Ok(functions)
}
