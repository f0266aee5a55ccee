//! Stack-frame layout (component F): assigns base-pointer offsets to
//! parameters up front and to locals lazily, on their first spill.

use super::reg::Location;
use crate::middle::symbol::{ScopeId, SymbolTable, VarId};

/// Per-function local-offset accumulator. Parameters are laid out all at
/// once ([`layout_parameters`]); locals are laid out one at a time as
/// `store` first needs to commit them to memory.
pub struct Frame {
    next_local_offset: i32,
}

impl Frame {
    /// A fresh frame, reset at the start of every function.
    pub fn new() -> Self {
        Frame {
            next_local_offset: 8,
        }
    }

    /// Assign each parameter a negative offset from the saved frame pointer,
    /// in declaration order, and mark it as already resident in memory.
    pub fn layout_parameters(sym: &mut SymbolTable, _parameter_scope: ScopeId, parameters: &[VarId]) {
        let mut offset = -8;
        for &param in parameters {
            let size = sym.var(param).ty.size();
            offset -= size;
            let var = sym.var_mut(param);
            var.base_pointer_offset = offset;
            var.descriptor.insert(Location::Memory);
        }
    }

    /// Assign `var` the next available positive local offset.
    pub fn layout_local(&mut self, sym: &mut SymbolTable, var: VarId) {
        let size = sym.var(var).ty.size();
        sym.var_mut(var).base_pointer_offset = self.next_local_offset;
        self.next_local_offset += size;
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middle::symbol::Type;

    #[test]
    fn parameters_get_descending_negative_offsets() {
        let mut sym = SymbolTable::new();
        let scope = sym.root();
        let a = sym.declare_var(scope, crate::common::id("a"), Type::Int);
        let b = sym.declare_var(scope, crate::common::id("b"), Type::Bool);
        Frame::layout_parameters(&mut sym, scope, &[a, b]);
        assert_eq!(sym.var(a).base_pointer_offset, -16);
        assert_eq!(sym.var(b).base_pointer_offset, -17);
    }

    #[test]
    fn locals_get_ascending_positive_offsets_on_demand() {
        let mut sym = SymbolTable::new();
        let scope = sym.root();
        let x = sym.declare_var(scope, crate::common::id("x"), Type::Int);
        let y = sym.declare_var(scope, crate::common::id("y"), Type::Bool);
        let mut frame = Frame::new();
        frame.layout_local(&mut sym, x);
        frame.layout_local(&mut sym, y);
        assert_eq!(sym.var(x).base_pointer_offset, 8);
        assert_eq!(sym.var(y).base_pointer_offset, 16);
    }
}
