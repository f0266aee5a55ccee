//! The x86-64 register file (component A) and the register state machine
//! (component C).
//!
//! Registers are enumerated as a fixed, indexable set. Only the fourteen
//! general-purpose registers (`RAX`..`R15`) are ever handed out by
//! [`RegisterFile::get_free_register`]; `RBP`, `RSP`, and `RIP` exist in the
//! enum purely so [`Location`] and operand formatting can name them uniformly,
//! but they are never placed in a register descriptor's content set.

use derive_more::Display;

use crate::common::Set;
use crate::error::{CompileError, Result};
use crate::middle::symbol::VarId;

/// Registers of the target machine, in register-file order.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Register {
    #[display("RAX")]
    Rax,
    #[display("RBX")]
    Rbx,
    #[display("RCX")]
    Rcx,
    #[display("RDX")]
    Rdx,
    #[display("RSI")]
    Rsi,
    #[display("RDI")]
    Rdi,
    #[display("R8")]
    R8,
    #[display("R9")]
    R9,
    #[display("R10")]
    R10,
    #[display("R11")]
    R11,
    #[display("R12")]
    R12,
    #[display("R13")]
    R13,
    #[display("R14")]
    R14,
    #[display("R15")]
    R15,
    /// Frame (base) pointer. Never allocated to a variable.
    #[display("RBP")]
    Rbp,
    /// Stack pointer. Never allocated to a variable.
    #[display("RSP")]
    Rsp,
    /// Instruction pointer. Never allocated to a variable.
    #[display("RIP")]
    Rip,
}

/// The fourteen general-purpose registers, in allocation order.
pub const GP_REGISTERS: [Register; 14] = [
    Register::Rax,
    Register::Rbx,
    Register::Rcx,
    Register::Rdx,
    Register::Rsi,
    Register::Rdi,
    Register::R8,
    Register::R9,
    Register::R10,
    Register::R11,
    Register::R12,
    Register::R13,
    Register::R14,
    Register::R15,
];

impl Register {
    /// The sub-register mnemonic for this register at the given operand
    /// width in bytes (one of 1, 2, 4, 8).
    pub fn sub(self, size: i32) -> &'static str {
        use Register::*;
        match (self, size) {
            (Rax, 1) => "AL",
            (Rax, 2) => "AX",
            (Rax, 4) => "EAX",
            (Rax, 8) => "RAX",
            (Rbx, 1) => "BL",
            (Rbx, 2) => "BX",
            (Rbx, 4) => "EBX",
            (Rbx, 8) => "RBX",
            (Rcx, 1) => "CL",
            (Rcx, 2) => "CX",
            (Rcx, 4) => "ECX",
            (Rcx, 8) => "RCX",
            (Rdx, 1) => "DL",
            (Rdx, 2) => "DX",
            (Rdx, 4) => "EDX",
            (Rdx, 8) => "RDX",
            (Rsi, 1) => "SIL",
            (Rsi, 2) => "SI",
            (Rsi, 4) => "ESI",
            (Rsi, 8) => "RSI",
            (Rdi, 1) => "DIL",
            (Rdi, 2) => "DI",
            (Rdi, 4) => "EDI",
            (Rdi, 8) => "RDI",
            (R8, 1) => "R8B",
            (R8, 2) => "R8W",
            (R8, 4) => "R8D",
            (R8, 8) => "R8",
            (R9, 1) => "R9B",
            (R9, 2) => "R9W",
            (R9, 4) => "R9D",
            (R9, 8) => "R9",
            (R10, 1) => "R10B",
            (R10, 2) => "R10W",
            (R10, 4) => "R10D",
            (R10, 8) => "R10",
            (R11, 1) => "R11B",
            (R11, 2) => "R11W",
            (R11, 4) => "R11D",
            (R11, 8) => "R11",
            (R12, 1) => "R12B",
            (R12, 2) => "R12W",
            (R12, 4) => "R12D",
            (R12, 8) => "R12",
            (R13, 1) => "R13B",
            (R13, 2) => "R13W",
            (R13, 4) => "R13D",
            (R13, 8) => "R13",
            (R14, 1) => "R14B",
            (R14, 2) => "R14W",
            (R14, 4) => "R14D",
            (R14, 8) => "R14",
            (R15, 1) => "R15B",
            (R15, 2) => "R15W",
            (R15, 4) => "R15D",
            (R15, 8) => "R15",
            (Rbp, _) => "RBP",
            (Rsp, _) => "RSP",
            (Rip, _) => "RIP",
            (_, other) => unreachable!("unsupported operand width {other}"),
        }
    }
}

/// A location that can hold a variable's current value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Location {
    /// The variable's stack slot, at its `base_pointer_offset`.
    Memory,
    /// A register currently holding the variable's value.
    Register(Register),
}

/// Per-register bookkeeping: which variables currently live in this register.
#[derive(Debug, Default, Clone)]
pub struct RegisterDescriptor {
    pub content: Set<VarId>,
}

/// Tracks, for every general-purpose register, the set of variables it
/// currently holds (component C).
pub struct RegisterFile {
    descriptors: [RegisterDescriptor; 14],
}

impl RegisterFile {
    pub fn new() -> Self {
        RegisterFile {
            descriptors: Default::default(),
        }
    }

    fn index_of(reg: Register) -> usize {
        GP_REGISTERS
            .iter()
            .position(|&r| r == reg)
            .expect("not a general-purpose register")
    }

    pub fn content(&self, reg: Register) -> &Set<VarId> {
        &self.descriptors[Self::index_of(reg)].content
    }

    pub fn content_mut(&mut self, reg: Register) -> &mut Set<VarId> {
        &mut self.descriptors[Self::index_of(reg)].content
    }

    /// Returns any register whose content set is empty.
    ///
    /// Per the allocator contract (§8, property 2): the returned register's
    /// content set is empty at the moment of return. This implementation does
    /// not spill on failure; see `CompileError::NoFreeRegister`.
    pub fn get_free_register(&self) -> Result<Register> {
        match GP_REGISTERS.iter().copied().find(|&r| self.content(r).is_empty()) {
            Some(r) => {
                log::trace!("get_free_register: handing out {r}");
                Ok(r)
            }
            None => {
                log::trace!("get_free_register: all {} registers occupied, no spilling", GP_REGISTERS.len());
                Err(CompileError::NoFreeRegister)
            }
        }
    }

    /// Empties every register's content set. Called at each block boundary.
    pub fn clear(&mut self) {
        for d in &mut self.descriptors {
            d.content.clear();
        }
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}
