//! The symbol table: a tree of scopes holding `Variable`/`Function` entries.
//!
//! Rather than the mutually-referential pointers of the original (variables
//! pointing at register descriptors and vice versa), state lives in one
//! arena per kind and everything else refers to it by a small stable index
//! (`VarId`/`FuncId`/`ScopeId`). This sidesteps lifetime entanglement
//! entirely: the whole symbol table is one value, and indices into it are
//! `Copy`.

use crate::back::reg::Location;
use crate::common::{Id, Map, Set};
use crate::error::{CompileError, Result};

/// The four primitive types of the source language.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Type {
    Int,
    Float,
    Bool,
    Str,
}

impl Type {
    /// Size in bytes of a value of this type, per the operand-width policy
    /// in §4.A: `Bool` is one byte, everything else is a pointer-or-word-sized
    /// eight bytes.
    pub fn size(self) -> i32 {
        match self {
            Type::Bool => 1,
            Type::Int | Type::Float | Type::Str => 8,
        }
    }
}

/// "No next use within the current block."
pub const NO_NEXT_USE: i32 = -1;
/// Sentinel next-use value for a named variable at block entry: larger than
/// any valid intra-block index.
pub const SENTINEL_NEXT_USE: i32 = 1000;

/// A stable handle to a [`Variable`] entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarId(pub usize);

/// A stable handle to a [`Function`] entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FuncId(pub usize);

/// A stable handle to a scope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScopeId(pub usize);

#[derive(Clone, Debug)]
pub struct Variable {
    pub name: Id,
    pub ty: Type,
    /// Offset from the frame pointer. `0` means "not yet laid out".
    pub base_pointer_offset: i32,
    /// Index within the current block of this variable's next use, or
    /// [`NO_NEXT_USE`].
    pub next_use: i32,
    pub live: bool,
    /// Every location currently holding this variable's value.
    pub descriptor: Set<Location>,
}

impl Variable {
    fn new(name: Id, ty: Type) -> Self {
        Variable {
            name,
            ty,
            base_pointer_offset: 0,
            next_use: NO_NEXT_USE,
            live: false,
            descriptor: Set::new(),
        }
    }

    /// A compiler-generated temporary never needs to be written back to
    /// memory on its last use, and is seeded dead at block entry.
    pub fn is_temporary(&self) -> bool {
        self.name.starts_with("__")
    }
}

#[derive(Clone, Debug)]
pub struct Function {
    pub name: Id,
    pub return_type: Type,
    /// Scope holding this function's parameters; its first child is the
    /// function body's scope.
    pub parameter_scope: ScopeId,
    /// Parameters, in declaration order.
    pub parameters: Vec<VarId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Symbol {
    Var(VarId),
    Func(FuncId),
}

#[derive(Default)]
struct Scope {
    parent: Option<ScopeId>,
    children: Vec<ScopeId>,
    symbols: Map<Id, Symbol>,
}

/// The whole-program symbol table: a scope tree plus the variable/function
/// arenas it indexes into.
pub struct SymbolTable {
    vars: Vec<Variable>,
    funcs: Vec<Function>,
    scopes: Vec<Scope>,
    root: ScopeId,
}

impl SymbolTable {
    pub fn new() -> Self {
        let root_scope = Scope::default();
        SymbolTable {
            vars: Vec::new(),
            funcs: Vec::new(),
            scopes: vec![root_scope],
            root: ScopeId(0),
        }
    }

    pub fn root(&self) -> ScopeId {
        self.root
    }

    pub fn add_child_scope(&mut self, parent: ScopeId) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope {
            parent: Some(parent),
            children: Vec::new(),
            symbols: Map::new(),
        });
        self.scopes[parent.0].children.push(id);
        id
    }

    pub fn children(&self, scope: ScopeId) -> &[ScopeId] {
        &self.scopes[scope.0].children
    }

    pub fn parent(&self, scope: ScopeId) -> Option<ScopeId> {
        self.scopes[scope.0].parent
    }

    pub fn declare_var(&mut self, scope: ScopeId, name: Id, ty: Type) -> VarId {
        let id = VarId(self.vars.len());
        self.vars.push(Variable::new(name, ty));
        self.scopes[scope.0].symbols.insert(name, Symbol::Var(id));
        id
    }

    pub fn declare_func(
        &mut self,
        scope: ScopeId,
        name: Id,
        return_type: Type,
        parameter_scope: ScopeId,
        parameters: Vec<VarId>,
    ) -> FuncId {
        let id = FuncId(self.funcs.len());
        self.funcs.push(Function {
            name,
            return_type,
            parameter_scope,
            parameters,
        });
        self.scopes[scope.0].symbols.insert(name, Symbol::Func(id));
        id
    }

    /// Resolve a name starting at `scope`, walking up through parents to the
    /// root.
    pub fn resolve(&self, scope: ScopeId, name: Id) -> Option<Symbol> {
        let mut cur = Some(scope);
        while let Some(s) = cur {
            if let Some(&sym) = self.scopes[s.0].symbols.get(&name) {
                return Some(sym);
            }
            cur = self.scopes[s.0].parent;
        }
        None
    }

    pub fn resolve_var(&self, scope: ScopeId, name: Id) -> Result<VarId> {
        match self.resolve(scope, name) {
            Some(Symbol::Var(id)) => Ok(id),
            _ => Err(CompileError::UndeclaredVariable(name)),
        }
    }

    pub fn resolve_func(&self, scope: ScopeId, name: Id) -> Result<FuncId> {
        match self.resolve(scope, name) {
            Some(Symbol::Func(id)) => Ok(id),
            _ => Err(CompileError::UndeclaredFunction(name)),
        }
    }

    pub fn var(&self, id: VarId) -> &Variable {
        &self.vars[id.0]
    }

    pub fn var_mut(&mut self, id: VarId) -> &mut Variable {
        &mut self.vars[id.0]
    }

    pub fn func(&self, id: FuncId) -> &Function {
        &self.funcs[id.0]
    }

    /// Every variable declared directly in `scope` (not its children), in
    /// insertion order by name.
    pub fn own_vars(&self, scope: ScopeId) -> impl Iterator<Item = VarId> + '_ {
        self.scopes[scope.0].symbols.values().filter_map(|s| match s {
            Symbol::Var(id) => Some(*id),
            Symbol::Func(_) => None,
        })
    }

    /// Every variable visible in `scope`'s subtree: `scope` itself plus every
    /// scope nested under it, recursively. This is how the back end reaches
    /// "every variable in the function's parameter-and-locals scope set"
    /// (§4.E) without re-deriving the function's structure.
    pub fn vars_in_subtree(&self, scope: ScopeId) -> Vec<VarId> {
        let mut out: Vec<VarId> = self.own_vars(scope).collect();
        for &child in self.children(scope) {
            out.extend(self.vars_in_subtree(child));
        }
        out
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}
