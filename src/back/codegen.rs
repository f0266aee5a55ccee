//! The instruction emitter (component G): the core of the back end. Walks
//! each function's basic blocks and, per quadruple, drives the register
//! file and variable descriptors through `load`/`store`/`copyOrDrop`/
//! `overwriteWithResult` to produce textual x86-64 assembly.

use crate::common::Id;
use crate::error::{CompileError, Result};
use crate::middle::symbol::{SymbolTable, VarId};
use crate::middle::tac::{self, Address, Op, Quadruple};

use super::block::split_blocks;
use super::frame::Frame;
use super::liveness::{next_use_live, reset, Triple, UseInfo};
use super::reg::{Location, Register, RegisterFile};

/// Generate assembly for every function, in order, sharing one output
/// buffer. This is the whole back end's entry point.
pub fn generate(functions: &[tac::Function], sym: &mut SymbolTable) -> Result<String> {
    let mut gen = CodeGen {
        sym,
        regs: RegisterFile::new(),
        out: String::new(),
    };
    gen.out.push_str("section .text\nglobal main\n");
    for function in functions {
        gen.gen_function(function)?;
    }
    Ok(gen.out)
}

struct CodeGen<'a> {
    sym: &'a mut SymbolTable,
    regs: RegisterFile,
    out: String,
}

fn result_var(quad: &Quadruple) -> Result<VarId> {
    quad.result
        .as_var()
        .ok_or(CompileError::UnsupportedOperand("quadruple result must be a variable"))
}

fn label_of(addr: &Address) -> Result<Id> {
    match addr {
        Address::Label(l) => Ok(*l),
        _ => Err(CompileError::UnsupportedOperand("expected a jump target label")),
    }
}

fn imm(addr: &Address) -> Result<String> {
    match addr {
        Address::ConstInt(v) => Ok(v.to_string()),
        Address::ConstFloat(v) => Ok(v.to_string()),
        Address::ConstBool(v) => Ok((*v as i32).to_string()),
        _ => Err(CompileError::UnsupportedOperand("expected a constant operand")),
    }
}

fn next_use(info: Option<UseInfo>) -> i32 {
    info.map(|i| i.next_use).unwrap_or(crate::middle::symbol::NO_NEXT_USE)
}

impl<'a> CodeGen<'a> {
    fn line(&mut self, s: impl AsRef<str>) {
        self.out.push_str(s.as_ref());
        self.out.push('\n');
    }

    fn gen_function(&mut self, function: &tac::Function) -> Result<()> {
        let func = self.sym.func(function.sym).clone();
        let mut frame = Frame::new();
        Frame::layout_parameters(self.sym, func.parameter_scope, &func.parameters);

        let blocks = split_blocks(&function.code);
        log::debug!("function {}: block splitting done, {} basic blocks", func.name, blocks.len());

        self.out.push_str(&format!("{}:\n", func.name));
        self.line("push rbp");
        self.line("mov rbp, rsp");

        for (block_no, block) in blocks.iter().enumerate() {
            reset(self.sym, func.parameter_scope);
            self.regs.clear();
            let info = next_use_live(self.sym, func.parameter_scope, block);
            log::debug!(
                "function {}: liveness pass done for block {} ({} quadruples)",
                func.name,
                block_no,
                block.len()
            );
            log::trace!("entering allocator for a block of {} quadruples", block.len());
            for (i, quad) in block.iter().enumerate() {
                self.emit_quad(quad, &info[i], &mut frame)?;
            }
        }

        let fell_through = !matches!(function.code.last(), Some(q) if q.op == Op::Return);
        if fell_through {
            self.epilogue();
            self.line("ret");
        }
        Ok(())
    }

    fn epilogue(&mut self) {
        self.line("mov rsp, rbp");
        self.line("pop rbp");
    }

    fn emit_quad(&mut self, quad: &Quadruple, info: &Triple, frame: &mut Frame) -> Result<()> {
        if let Some(label) = &quad.label {
            self.out.push_str(&format!("{label}: "));
        }
        use Op::*;
        match quad.op {
            Add => self.emit_arithmetic("add", quad, info, frame)?,
            Sub => self.emit_arithmetic("sub", quad, info, frame)?,
            Mul => self.emit_arithmetic("mul", quad, info, frame)?,
            Div => self.emit_arithmetic("div", quad, info, frame)?,
            And => self.emit_arithmetic("and", quad, info, frame)?,
            Or => self.emit_arithmetic("or", quad, info, frame)?,
            Less => self.emit_comparison("setl", quad)?,
            LessEqual => self.emit_comparison("setle", quad)?,
            Greater => self.emit_comparison("setg", quad)?,
            GreaterEqual => self.emit_comparison("setge", quad)?,
            Equal => self.emit_comparison("sete", quad)?,
            NotEqual => self.emit_comparison("setne", quad)?,
            Assign => self.emit_assign(quad)?,
            Return => self.emit_return(&quad.arg1)?,
            Param => self.emit_param(&quad.arg1)?,
            IfFalseJump => self.emit_if_false_jump(&quad.result, &quad.arg1)?,
            IfJump => self.emit_if_jump(&quad.result, &quad.arg1)?,
            Jump => self.emit_jump(&quad.result)?,
            Not => self.emit_not(quad)?,
            Negate => self.emit_negate(quad, frame)?,
            Call => self.emit_call(quad, frame)?,
        }
        Ok(())
    }

    /// Load `var` into a register, reusing one it's already in.
    fn load(&mut self, var: VarId) -> Result<Register> {
        let existing = self.sym.var(var).descriptor.iter().find_map(|loc| match loc {
            Location::Register(r) => Some(*r),
            Location::Memory => None,
        });
        if let Some(reg) = existing {
            log::trace!("load: {} already in {}", self.sym.var(var).name, reg);
            return Ok(reg);
        }

        let reg = self.regs.get_free_register()?;
        log::trace!("load: allocated {} for {}", reg, self.sym.var(var).name);
        self.regs.content_mut(reg).insert(var);
        let v = self.sym.var_mut(var);
        v.descriptor.insert(Location::Register(reg));
        let ty = v.ty;
        let offset = v.base_pointer_offset;

        let mnemonic = if ty.size() < 8 { "movsx" } else { "mov" };
        self.line(format!("{mnemonic} {}, [rbp + {offset}]", reg.sub(ty.size())));
        Ok(reg)
    }

    /// Write `var` back to its memory slot, laying it out on first use.
    fn store(&mut self, var: VarId, frame: &mut Frame) -> Result<()> {
        let v = self.sym.var(var);
        let in_memory = v.descriptor.contains(&Location::Memory);
        let reg = v
            .descriptor
            .iter()
            .find_map(|loc| match loc {
                Location::Register(r) => Some(*r),
                Location::Memory => None,
            })
            .ok_or(CompileError::NotInRegister(v.name))?;

        if in_memory {
            log::trace!("store: {} already in memory, skipping spill", v.name);
            return Ok(());
        }

        if self.sym.var(var).base_pointer_offset == 0 {
            frame.layout_local(self.sym, var);
        }

        let v = self.sym.var(var);
        let ty = v.ty;
        let offset = v.base_pointer_offset;
        log::trace!("store: spilling {} from {} to [rbp + {}]", v.name, reg, offset);
        self.line(format!("mov [rbp + {offset}], {}", reg.sub(ty.size())));
        self.sym.var_mut(var).descriptor.insert(Location::Memory);
        Ok(())
    }

    /// Preserve a source operand before its register is reused for a result.
    fn copy_or_drop(&mut self, var: VarId, info: Option<UseInfo>, frame: &mut Frame) -> Result<()> {
        let needed = next_use(info) != crate::middle::symbol::NO_NEXT_USE;
        let v = self.sym.var(var);
        let in_memory = v.descriptor.contains(&Location::Memory);
        let reg = v
            .descriptor
            .iter()
            .find_map(|loc| match loc {
                Location::Register(r) => Some(*r),
                Location::Memory => None,
            })
            .ok_or(CompileError::NotInRegister(v.name))?;

        if in_memory {
            if needed {
                let fresh = self.regs.get_free_register()?;
                self.regs.content_mut(fresh).insert(var);
                self.sym.var_mut(var).descriptor.insert(Location::Register(fresh));
            }
            return Ok(());
        }

        if needed {
            let fresh = self.regs.get_free_register()?;
            self.line(format!("mov {fresh}, {reg}"));
            self.regs.content_mut(fresh).insert(var);
            self.sym.var_mut(var).descriptor.insert(Location::Register(fresh));
        } else if !self.sym.var(var).is_temporary() {
            self.store(var, frame)?;
        }
        Ok(())
    }

    /// Rebind `result` to be the sole occupant of `reg`, evicting whoever was
    /// there before.
    fn overwrite_with_result(&mut self, result: VarId, reg: Register) {
        let previous: Vec<VarId> = self.regs.content(reg).iter().copied().collect();
        for var in previous {
            self.sym.var_mut(var).descriptor.remove(&Location::Register(reg));
        }
        self.regs.content_mut(reg).clear();
        self.sym.var_mut(result).descriptor.clear();
        self.sym.var_mut(result).descriptor.insert(Location::Register(reg));
        self.regs.content_mut(reg).insert(result);
    }

    fn emit_arithmetic(&mut self, mnemonic: &str, quad: &Quadruple, info: &Triple, frame: &mut Frame) -> Result<()> {
        let result = result_var(quad)?;
        match (&quad.arg1, &quad.arg2) {
            (Address::Var(a1), Address::Var(a2)) => {
                let r1 = self.load(*a1)?;
                let r2 = self.load(*a2)?;
                self.copy_or_drop(*a1, info.1, frame)?;
                self.line(format!("{mnemonic} {r1}, {r2}"));
                self.overwrite_with_result(result, r1);
            }
            (Address::Var(a1), c2) => {
                let r1 = self.load(*a1)?;
                self.copy_or_drop(*a1, info.1, frame)?;
                self.line(format!("{mnemonic} {r1}, {}", imm(c2)?));
                self.overwrite_with_result(result, r1);
            }
            (c1, Address::Var(a2)) => {
                let r2 = self.load(*a2)?;
                let r1 = self.regs.get_free_register()?;
                self.line(format!("mov {r1}, {}", imm(c1)?));
                self.line(format!("{mnemonic} {r1}, {r2}"));
                self.overwrite_with_result(result, r1);
            }
            (c1, c2) => {
                let r = self.regs.get_free_register()?;
                self.line(format!("mov {r}, {}", imm(c1)?));
                self.line(format!("{mnemonic} {r}, {}", imm(c2)?));
                self.overwrite_with_result(result, r);
            }
        }
        Ok(())
    }

    fn emit_comparison(&mut self, setcc: &str, quad: &Quadruple) -> Result<()> {
        let result = result_var(quad)?;
        match (&quad.arg1, &quad.arg2) {
            (Address::Var(a1), Address::Var(a2)) => {
                let r1 = self.load(*a1)?;
                let r2 = self.load(*a2)?;
                let r = self.regs.get_free_register()?;
                self.line(format!("cmp {r1}, {r2}"));
                self.line(format!("{setcc} {}", r.sub(1)));
                self.overwrite_with_result(result, r);
            }
            (Address::Var(a1), c2) => {
                let r1 = self.load(*a1)?;
                let r = self.regs.get_free_register()?;
                self.line(format!("cmp {r1}, {}", imm(c2)?));
                self.line(format!("{setcc} {}", r.sub(1)));
                self.overwrite_with_result(result, r);
            }
            (c1, Address::Var(a2)) => {
                let r2 = self.load(*a2)?;
                let r1 = self.regs.get_free_register()?;
                self.line(format!("mov {r1}, {}", imm(c1)?));
                self.line(format!("cmp {r1}, {r2}"));
                self.line(format!("{setcc} {}", r1.sub(1)));
                self.overwrite_with_result(result, r1);
            }
            (c1, c2) => {
                let r = self.regs.get_free_register()?;
                self.line(format!("mov {r}, {}", imm(c1)?));
                self.line(format!("cmp {r}, {}", imm(c2)?));
                self.line(format!("{setcc} {}", r.sub(1)));
                self.overwrite_with_result(result, r);
            }
        }
        Ok(())
    }

    fn emit_assign(&mut self, quad: &Quadruple) -> Result<()> {
        let result = result_var(quad)?;
        match &quad.arg1 {
            Address::Var(a1) => {
                let r = self.load(*a1)?;
                self.regs.content_mut(r).insert(result);
                self.sym.var_mut(result).descriptor.clear();
                self.sym.var_mut(result).descriptor.insert(Location::Register(r));
            }
            c => {
                let r = self.regs.get_free_register()?;
                self.regs.content_mut(r).insert(result);
                self.sym.var_mut(result).descriptor.clear();
                self.sym.var_mut(result).descriptor.insert(Location::Register(r));
                self.line(format!("mov {r}, {}", imm(c)?));
            }
        }
        Ok(())
    }

    fn emit_return(&mut self, arg1: &Address) -> Result<()> {
        match arg1 {
            Address::Var(v) => {
                let r = self.load(*v)?;
                if r != Register::Rax {
                    self.line(format!("mov RAX, {r}"));
                }
            }
            Address::Empty => {}
            c => self.line(format!("mov RAX, {}", imm(c)?)),
        }
        self.epilogue();
        self.line("ret");
        Ok(())
    }

    fn emit_param(&mut self, arg1: &Address) -> Result<()> {
        match arg1 {
            Address::Var(v) => {
                let r = self.load(*v)?;
                let ty = self.sym.var(*v).ty;
                self.line(format!("push {}", r.sub(ty.size())));
            }
            c => self.line(format!("push {}", imm(c)?)),
        }
        Ok(())
    }

    fn emit_if_false_jump(&mut self, result: &Address, arg1: &Address) -> Result<()> {
        let label = label_of(result)?;
        match arg1 {
            Address::Var(v) => {
                let r = self.load(*v)?;
                self.line(format!("cmp {r}, 0"));
                self.line(format!("jz {label}"));
            }
            Address::ConstBool(false) => self.line(format!("jmp {label}")),
            Address::ConstBool(true) => {}
            _ => return Err(CompileError::UnsupportedOperand("IfFalseJump condition must be a variable or a bool constant")),
        }
        Ok(())
    }

    fn emit_if_jump(&mut self, result: &Address, arg1: &Address) -> Result<()> {
        let label = label_of(result)?;
        match arg1 {
            Address::Var(v) => {
                let r = self.load(*v)?;
                self.line(format!("cmp {r}, 0"));
                self.line(format!("jnz {label}"));
            }
            Address::ConstBool(true) => self.line(format!("jmp {label}")),
            Address::ConstBool(false) => {}
            _ => return Err(CompileError::UnsupportedOperand("IfJump condition must be a variable or a bool constant")),
        }
        Ok(())
    }

    fn emit_jump(&mut self, result: &Address) -> Result<()> {
        let label = label_of(result)?;
        self.line(format!("jmp {label}"));
        Ok(())
    }

    fn emit_not(&mut self, quad: &Quadruple) -> Result<()> {
        let result = result_var(quad)?;
        match &quad.arg1 {
            Address::Var(v) => {
                let r = self.load(*v)?;
                self.line(format!("cmp {r}, 0"));
                let fresh = self.regs.get_free_register()?;
                self.line(format!("sete {}", fresh.sub(1)));
                self.overwrite_with_result(result, fresh);
            }
            Address::ConstBool(b) => {
                let fresh = self.regs.get_free_register()?;
                self.line(format!("mov {fresh}, {}", !b as i32));
                self.overwrite_with_result(result, fresh);
            }
            _ => return Err(CompileError::UnsupportedOperand("Not operand must be a variable or a bool constant")),
        }
        Ok(())
    }

    fn emit_negate(&mut self, quad: &Quadruple, _frame: &mut Frame) -> Result<()> {
        let result = result_var(quad)?;
        match &quad.arg1 {
            Address::Var(v) => {
                let r = self.load(*v)?;
                self.line(format!("neg {r}"));
                self.overwrite_with_result(result, r);
            }
            Address::ConstInt(v) => {
                let fresh = self.regs.get_free_register()?;
                self.line(format!("mov {fresh}, {}", -v));
                self.overwrite_with_result(result, fresh);
            }
            Address::ConstFloat(v) => {
                let fresh = self.regs.get_free_register()?;
                self.line(format!("mov {fresh}, {}", -v));
                self.overwrite_with_result(result, fresh);
            }
            _ => return Err(CompileError::UnsupportedOperand("Negate operand must be a variable or a numeric constant")),
        }
        Ok(())
    }

    fn emit_call(&mut self, quad: &Quadruple, frame: &mut Frame) -> Result<()> {
        let result = result_var(quad)?;
        let func = match &quad.arg1 {
            Address::Func(f) => *f,
            _ => return Err(CompileError::UnsupportedOperand("Call target must be a function reference")),
        };
        let argc = match &quad.arg2 {
            Address::ArgCount(n) => *n,
            _ => return Err(CompileError::UnsupportedOperand("Call arg count must be an argument count")),
        };
        let name = self.sym.func(func).name;

        let occupants: Vec<VarId> = self.regs.content(Register::Rax).iter().copied().collect();
        for var in occupants {
            self.store(var, frame)?;
        }

        self.line(format!("call {name}"));
        if argc > 0 {
            self.line(format!("add rsp, {}", 8 * argc));
        }
        self.overwrite_with_result(result, Register::Rax);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middle::symbol::{FuncId, Type};
    use crate::middle::tac::{Address, Op, Quadruple};

    fn make_function(sym: &mut SymbolTable, name: &str) -> FuncId {
        let root = sym.root();
        let param_scope = sym.add_child_scope(root);
        sym.add_child_scope(param_scope);
        sym.declare_func(root, crate::common::id(name), Type::Int, param_scope, vec![])
    }

    #[test]
    fn return_constant_emits_mov_epilogue_ret() {
        let mut sym = SymbolTable::new();
        let f = make_function(&mut sym, "main");
        let code = vec![Quadruple::new(
            Op::Return,
            Address::Empty,
            Address::ConstInt(42),
            Address::Empty,
        )];
        let out = generate(&[tac::Function { sym: f, code }], &mut sym).unwrap();
        assert!(out.contains("mov RAX, 42"));
        assert!(out.contains("mov rsp, rbp"));
        assert!(out.contains("pop rbp"));
        assert!(out.trim_end().ends_with("ret"));
    }

    #[test]
    fn conditional_false_jump_on_constant() {
        let mut sym = SymbolTable::new();
        let f = make_function(&mut sym, "main");
        let l1 = crate::common::id("L1");
        let code = vec![
            Quadruple::new(
                Op::IfFalseJump,
                Address::Label(l1),
                Address::ConstBool(false),
                Address::Empty,
            ),
            Quadruple::new(Op::Return, Address::Empty, Address::Empty, Address::Empty),
        ];
        let out = generate(&[tac::Function { sym: f, code }], &mut sym).unwrap();
        assert!(out.contains("jmp L1"));
    }

    #[test]
    fn conditional_false_jump_on_true_constant_emits_nothing() {
        let mut sym = SymbolTable::new();
        let f = make_function(&mut sym, "main");
        let l1 = crate::common::id("L1");
        let code = vec![
            Quadruple::new(
                Op::IfFalseJump,
                Address::Label(l1),
                Address::ConstBool(true),
                Address::Empty,
            ),
            Quadruple::new(Op::Return, Address::Empty, Address::Empty, Address::Empty),
        ];
        let out = generate(&[tac::Function { sym: f, code }], &mut sym).unwrap();
        assert!(!out.contains("jmp"));
        assert!(!out.contains("jz"));
    }

    #[test]
    fn arithmetic_preserves_still_live_operand() {
        let mut sym = SymbolTable::new();
        let f = make_function(&mut sym, "main");
        let param_scope = sym.func(f).parameter_scope;
        let body_scope = sym.children(param_scope)[0];
        let a = sym.declare_var(body_scope, crate::common::id("a"), Type::Int);
        let b = sym.declare_var(body_scope, crate::common::id("b"), Type::Int);
        let c = sym.declare_var(body_scope, crate::common::id("c"), Type::Int);

        let code = vec![
            Quadruple::new(Op::Add, Address::Var(c), Address::Var(a), Address::Var(b)),
            Quadruple::new(Op::Return, Address::Empty, Address::Var(a), Address::Empty),
        ];
        let out = generate(&[tac::Function { sym: f, code }], &mut sym).unwrap();
        assert!(out.contains("add "));
        assert!(out.matches("mov").count() >= 3);
    }

    #[test]
    fn function_without_trailing_return_still_gets_epilogue() {
        let mut sym = SymbolTable::new();
        let f = make_function(&mut sym, "f");
        let param_scope = sym.func(f).parameter_scope;
        let body_scope = sym.children(param_scope)[0];
        let x = sym.declare_var(body_scope, crate::common::id("x"), Type::Int);
        let code = vec![Quadruple::new(Op::Assign, Address::Var(x), Address::ConstInt(1), Address::Empty)];
        let out = generate(&[tac::Function { sym: f, code }], &mut sym).unwrap();
        assert!(out.contains("mov rsp, rbp"));
        assert!(out.trim_end().ends_with("ret"));
    }

    #[test]
    fn full_pipeline_smoke() {
        let src = "bool main() { if (5 < 3 and true) { int a = 5; } else { int b = 3; } return true; }";
        let (program, mut sym) = crate::front::parse(src).unwrap();
        let functions = crate::middle::lower(&program, &mut sym).unwrap();
        let out = generate(&functions, &mut sym).unwrap();

        assert!(out.contains("main:"));
        assert!(out.contains("push rbp"));
        assert!(out.contains("cmp "));
        assert!(out.contains("setl "));
        assert!(out.contains("and "));
        assert!(out.contains("jz "));
        assert!(out.contains("jmp "));
        assert!(out.contains("mov RAX, 1"));
        assert!(out.contains("mov rsp, rbp"));
        assert!(out.trim_end().ends_with("ret"));
    }
}
