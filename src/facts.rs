// SPDX-License-Identifier: BSD-3-Clause
//! Input facts: the immutable tables the analysis joins against.
//!
//! Each table corresponds to one statement shape in the intermediate
//! representation the facts were extracted from (allocations, moves, field
//! loads and stores, the three invocation kinds, parameter and return
//! plumbing, and the name/type metadata used for dynamic dispatch). Tuples
//! are plain value types with structural equality; tables are sets, so
//! duplicate rows in the input collapse. Nothing here is mutated once
//! loading finishes.

use std::collections::BTreeSet;

use rustc_hash::FxHashSet;

mod name;
pub use name::*;
pub mod reader;
pub use reader::{FactsReader, ReadStats};

/// `variable` is assigned a fresh object allocated at `site` inside `method`.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct Allocation {
    pub variable: VariableName,
    pub site: SiteName,
    pub method: MethodName,
}

/// The class (or array) type instantiated at `site`.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct AllocType {
    pub site: SiteName,
    pub ty: ClassName,
}

/// `to := from`, inside `method`.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct Move {
    pub from: VariableName,
    pub to: VariableName,
    pub method: MethodName,
}

/// `to := base.field`, inside `method`.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct Load {
    pub to: VariableName,
    pub base: VariableName,
    pub field: FieldName,
    pub method: MethodName,
}

/// `base.field := from`, inside `method`.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct Store {
    pub base: VariableName,
    pub field: FieldName,
    pub from: VariableName,
    pub method: MethodName,
}

/// `variable` is returned by `method`.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct ReturnVar {
    pub variable: VariableName,
    pub method: MethodName,
}

/// A dynamically-dispatched call site: the callee is named, not resolved.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct VirtualInvocation {
    pub invocation: InvocationName,
    pub base: VariableName,
    pub method_name: SimpleName,
    pub enclosing: MethodName,
}

/// A statically-resolved call site.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct StaticInvocation {
    pub invocation: InvocationName,
    pub callee: MethodName,
    pub enclosing: MethodName,
}

/// A constructor or privately-dispatched call site: the callee is resolved,
/// but a receiver still flows into its `this` variable.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct SpecialInvocation {
    pub invocation: InvocationName,
    pub base: VariableName,
    pub callee: MethodName,
    pub enclosing: MethodName,
}

/// Positional argument at a call site.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct ActualParam {
    pub index: usize,
    pub invocation: InvocationName,
    pub variable: VariableName,
}

/// Positional parameter of a method.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct FormalParam {
    pub index: usize,
    pub method: MethodName,
    pub variable: VariableName,
}

/// The receiver-binding variable of `method`.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct ThisVar {
    pub method: MethodName,
    pub variable: VariableName,
}

/// `variable` receives the return value of the call at `invocation`.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct AssignReturnValue {
    pub invocation: InvocationName,
    pub variable: VariableName,
}

/// Declares that `method` is named `name` on `class`. The virtual-call rule
/// joins this table as its dispatch lookup: (class, name) -> method.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct MethodNameType {
    pub method: MethodName,
    pub name: SimpleName,
    pub class: ClassName,
}

/// The full, read-only fact set for one analysis run.
#[derive(Debug, Default)]
pub struct FactStore {
    pub allocations: FxHashSet<Allocation>,
    pub alloc_types: FxHashSet<AllocType>,
    pub moves: FxHashSet<Move>,
    pub loads: FxHashSet<Load>,
    pub stores: FxHashSet<Store>,
    pub return_vars: FxHashSet<ReturnVar>,
    pub virtual_invocations: FxHashSet<VirtualInvocation>,
    pub static_invocations: FxHashSet<StaticInvocation>,
    pub special_invocations: FxHashSet<SpecialInvocation>,
    pub actual_params: FxHashSet<ActualParam>,
    pub formal_params: FxHashSet<FormalParam>,
    pub this_vars: FxHashSet<ThisVar>,
    pub assign_return_values: FxHashSet<AssignReturnValue>,
    pub method_name_types: FxHashSet<MethodNameType>,
    /// Methods declared outright (from `Method.facts`), in addition to those
    /// appearing as enclosing methods elsewhere.
    pub methods: FxHashSet<MethodName>,
}

impl FactStore {
    /// Every method named as enclosing or declared across all tables, in
    /// lexicographic order. This is the universe the entry resolver scans.
    pub fn method_universe(&self) -> BTreeSet<&MethodName> {
        let mut universe: BTreeSet<&MethodName> = BTreeSet::new();
        universe.extend(self.methods.iter());
        universe.extend(self.allocations.iter().map(|f| &f.method));
        universe.extend(self.moves.iter().map(|f| &f.method));
        universe.extend(self.loads.iter().map(|f| &f.method));
        universe.extend(self.stores.iter().map(|f| &f.method));
        universe.extend(self.return_vars.iter().map(|f| &f.method));
        universe.extend(self.virtual_invocations.iter().map(|f| &f.enclosing));
        universe.extend(self.static_invocations.iter().map(|f| &f.enclosing));
        universe.extend(self.special_invocations.iter().map(|f| &f.enclosing));
        universe.extend(self.formal_params.iter().map(|f| &f.method));
        universe.extend(self.this_vars.iter().map(|f| &f.method));
        universe.extend(self.method_name_types.iter().map(|f| &f.method));
        universe
    }

    /// Total number of fact tuples across all tables.
    pub fn len(&self) -> usize {
        self.allocations.len()
            + self.alloc_types.len()
            + self.moves.len()
            + self.loads.len()
            + self.stores.len()
            + self.return_vars.len()
            + self.virtual_invocations.len()
            + self.static_invocations.len()
            + self.special_invocations.len()
            + self.actual_params.len()
            + self.formal_params.len()
            + self.this_vars.len()
            + self.assign_return_values.len()
            + self.method_name_types.len()
            + self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn universe_is_sorted_and_deduplicated() {
        let mut facts = FactStore::default();
        facts.moves.insert(Move {
            from: "b/x".into(),
            to: "b/y".into(),
            method: "b".into(),
        });
        facts.allocations.insert(Allocation {
            variable: "a/v".into(),
            site: "a/H1".into(),
            method: "a".into(),
        });
        facts.methods.insert("a".into());

        let universe: Vec<&str> = facts.method_universe().iter().map(|m| m.as_str()).collect();
        assert_eq!(universe, vec!["a", "b"]);
    }
}
