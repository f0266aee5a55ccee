//! Backward liveness / next-use analysis (component E).
//!
//! Runs once per basic block, right to left, mutating the live/next-use
//! fields of whatever variables the block's quadruples reference. The value
//! recorded for each operand slot is the *pre-update* state — this is what
//! turns a plain liveness pass into a next-use analysis.

use super::reg::Location;
use crate::middle::symbol::{ScopeId, SymbolTable, NO_NEXT_USE, SENTINEL_NEXT_USE};
use crate::middle::tac::Quadruple;

/// Liveness/next-use state of one variable occurrence, captured just before
/// the backward pass updates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UseInfo {
    pub live: bool,
    pub next_use: i32,
}

/// `(result, arg1, arg2)` info for one quadruple. `None` means that operand
/// slot does not reference a variable.
pub type Triple = (Option<UseInfo>, Option<UseInfo>, Option<UseInfo>);

/// Seed every variable in `scope`'s subtree for a fresh analysis pass:
/// temporaries start dead, named variables start live with no known next use
/// within the block (the sentinel stands in for "beyond the block's end").
///
/// Also clears each variable's descriptor set. A register binding from the
/// previous block is never valid once `RegisterFile::clear` empties every
/// register's content, so every non-temporary is reseeded with `Memory`
/// alone; a temporary has no home outside the block that defines it, so its
/// descriptor is left empty.
pub fn reset(sym: &mut SymbolTable, scope: ScopeId) {
    for id in sym.vars_in_subtree(scope) {
        let var = sym.var_mut(id);
        var.descriptor.clear();
        if var.is_temporary() {
            var.live = false;
            var.next_use = NO_NEXT_USE;
        } else {
            var.live = true;
            var.next_use = SENTINEL_NEXT_USE;
            var.descriptor.insert(Location::Memory);
        }
    }
}

/// Run the backward next-use pass over `block`, returning one triple per
/// quadruple. Resets `scope` first, so this can be called once per block
/// without a separate reset step.
pub fn next_use_live(sym: &mut SymbolTable, scope: ScopeId, block: &[Quadruple]) -> Vec<Triple> {
    reset(sym, scope);

    let mut info: Vec<Triple> = vec![(None, None, None); block.len()];
    for i in (0..block.len()).rev() {
        let quad = &block[i];

        if let Some(id) = quad.result.as_var() {
            let var = sym.var_mut(id);
            info[i].0 = Some(UseInfo {
                live: var.live,
                next_use: var.next_use,
            });
            var.live = false;
            var.next_use = NO_NEXT_USE;
        }

        if let Some(id) = quad.arg1.as_var() {
            let var = sym.var_mut(id);
            info[i].1 = Some(UseInfo {
                live: var.live,
                next_use: var.next_use,
            });
            var.live = true;
            var.next_use = i as i32;
        }

        if let Some(id) = quad.arg2.as_var() {
            let var = sym.var_mut(id);
            info[i].2 = Some(UseInfo {
                live: var.live,
                next_use: var.next_use,
            });
            var.live = true;
            var.next_use = i as i32;
        }
    }
    info
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middle::symbol::Type;
    use crate::middle::tac::{Address, Op, Quadruple};

    #[test]
    fn next_use_records_pre_update_state() {
        let mut sym = SymbolTable::new();
        let scope = sym.root();
        let x = sym.declare_var(scope, crate::common::id("x"), Type::Int);
        let y = sym.declare_var(scope, crate::common::id("y"), Type::Int);
        let t = sym.declare_var(scope, crate::common::id("__t0"), Type::Int);

        let block = vec![
            Quadruple::new(Op::Add, Address::Var(t), Address::Var(x), Address::ConstInt(1)),
            Quadruple::new(Op::Assign, Address::Var(y), Address::Var(t), Address::Empty),
        ];

        let info = next_use_live(&mut sym, scope, &block);

        let q1_result = info[1].0.unwrap();
        assert_eq!(q1_result, UseInfo { live: true, next_use: SENTINEL_NEXT_USE });
        let q1_arg1 = info[1].1.unwrap();
        assert_eq!(q1_arg1, UseInfo { live: false, next_use: NO_NEXT_USE });

        let q0_result = info[0].0.unwrap();
        assert_eq!(q0_result, UseInfo { live: true, next_use: 1 });
        let q0_arg1 = info[0].1.unwrap();
        assert_eq!(q0_arg1, UseInfo { live: true, next_use: SENTINEL_NEXT_USE });
    }

    #[test]
    fn running_twice_is_idempotent() {
        let mut sym = SymbolTable::new();
        let scope = sym.root();
        let x = sym.declare_var(scope, crate::common::id("x"), Type::Int);
        let block = vec![Quadruple::new(
            Op::Return,
            Address::Empty,
            Address::Var(x),
            Address::Empty,
        )];
        let first = next_use_live(&mut sym, scope, &block);
        let second = next_use_live(&mut sym, scope, &block);
        assert_eq!(first, second);
    }
}
