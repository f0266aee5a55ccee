//! The error taxonomy shared by every stage of the pipeline.
//!
//! Nothing here is recovered locally: every fallible operation in `front`,
//! `middle`, and `back` propagates a [`CompileError`] with `?`, and the CLI
//! driver is the only place that turns one into a process exit code.

use crate::common::Id;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("unexpected character {0:?} at byte offset {1}")]
    UnexpectedChar(char, usize),

    #[error("unexpected token {found}, expected {expected}")]
    UnexpectedToken { found: String, expected: String },

    #[error("use of undeclared variable `{0}`")]
    UndeclaredVariable(Id),

    #[error("use of undeclared function `{0}`")]
    UndeclaredFunction(Id),

    #[error("unsupported operand shape for opcode {0}")]
    UnsupportedOperand(&'static str),

    #[error("variable `{0}` is not in a register")]
    NotInRegister(Id),

    #[error("no free register available")]
    NoFreeRegister,

    #[error("opcode {0} is not supported by the back end")]
    UnsupportedOpcode(&'static str),
}

pub type Result<T> = std::result::Result<T, CompileError>;
