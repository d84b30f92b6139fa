// SPDX-License-Identifier: BSD-3-Clause
//! Pointer analysis
//!
//! A context-insensitive, flow-insensitive, inclusion-based (Andersen-style)
//! points-to analysis over the input fact tables. Nine inference rules are
//! iterated to a least fixpoint over three growing relations:
//!
//! - `VarPointsTo(variable, site)`
//! - `FieldPointsTo(baseSite, field, targetSite)`
//! - `CallGraphEdge(invocation | root, method)`
//!
//! Evaluation is semi-naive: each pass joins only the tuples added by the
//! previous pass (the delta) against the full relations, and buffers its
//! insertions until the pass ends. No rule observes another rule's same-pass
//! writes, so the result is independent of rule order. Termination follows
//! from monotonicity: relations only grow, and the fact universe bounds them.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::trace_span;

use crate::entry::EntryResolver;
use crate::error::Error;
use crate::facts::{
    ActualParam, AllocType, Allocation, AssignReturnValue, ClassName, FactStore, FieldName,
    FormalParam, InvocationName, Load, MethodName, MethodNameType, Move, ReturnVar, SiteName,
    SpecialInvocation, StaticInvocation, Store, ThisVar, VariableName, VirtualInvocation,
};

#[derive(Clone, Debug, Default)]
pub struct Options {
    /// Upper bound on the number of growing passes; `None` iterates to the
    /// fixpoint unconditionally.
    pub max_iterations: Option<usize>,
    /// Report per-pass growth on stderr.
    pub debug: bool,
}

/// The three relations at the fixpoint, plus run metadata.
#[derive(Debug)]
pub struct OutputRelations {
    pub var_points_to: FxHashSet<(VariableName, SiteName)>,
    pub field_points_to: FxHashSet<(SiteName, FieldName, SiteName)>,
    /// `None` as the invocation marks the synthetic program-entry edge.
    pub call_graph: FxHashSet<(Option<InvocationName>, MethodName)>,
    pub stats: Stats,
}

impl OutputRelations {
    pub fn len(&self) -> usize {
        self.var_points_to.len() + self.field_points_to.len() + self.call_graph.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone, Debug)]
pub struct Stats {
    /// Number of passes that added at least one tuple.
    pub iterations: usize,
    /// Total passes evaluated, including the final zero-growth pass.
    pub passes: usize,
    pub elapsed: Duration,
    pub entry: MethodName,
    /// Special/virtual callees with no `ThisVar` fact. The call rules fire
    /// zero times for these, silently losing precision.
    pub missing_this_vars: usize,
}

// Profiling machinery
#[inline]
#[allow(unused_variables)]
fn count(relation: &str, rule: &str) {
    #[cfg(all(feature = "count", feature = "relation"))]
    eprintln!("{} 1", relation);
    #[cfg(all(feature = "count", feature = "rule"))]
    eprintln!("{} 1", rule);
}

/// The mutable, monotonically-growing state of one analysis run.
///
/// Alongside the three primary relations this keeps the secondary indexes
/// the rules join through: points-to by variable and by site, call-graph
/// edges by invocation and by callee, and the reachable-method set. All of
/// them are updated together by the insertion methods, which report whether
/// the tuple was new.
#[derive(Debug, Default)]
pub struct RelationStore {
    var_points_to: FxHashSet<(VariableName, SiteName)>,
    sites_by_var: FxHashMap<VariableName, FxHashSet<SiteName>>,
    vars_by_site: FxHashMap<SiteName, FxHashSet<VariableName>>,

    field_points_to: FxHashSet<(SiteName, FieldName, SiteName)>,
    targets_by_base_field: FxHashMap<(SiteName, FieldName), FxHashSet<SiteName>>,

    call_graph: FxHashSet<(Option<InvocationName>, MethodName)>,
    callees_by_invocation: FxHashMap<InvocationName, FxHashSet<MethodName>>,
    invocations_by_callee: FxHashMap<MethodName, FxHashSet<InvocationName>>,
    reachable: FxHashSet<MethodName>,
}

impl RelationStore {
    /// Total tuple count across the three relations.
    pub fn len(&self) -> usize {
        self.var_points_to.len() + self.field_points_to.len() + self.call_graph.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn var_points_to(&self) -> &FxHashSet<(VariableName, SiteName)> {
        &self.var_points_to
    }

    pub fn field_points_to(&self) -> &FxHashSet<(SiteName, FieldName, SiteName)> {
        &self.field_points_to
    }

    pub fn call_graph(&self) -> &FxHashSet<(Option<InvocationName>, MethodName)> {
        &self.call_graph
    }

    pub fn is_reachable(&self, method: &MethodName) -> bool {
        self.reachable.contains(method)
    }

    fn insert_var(&mut self, variable: VariableName, site: SiteName) -> bool {
        if !self.var_points_to.insert((variable.clone(), site.clone())) {
            return false;
        }
        self.sites_by_var
            .entry(variable.clone())
            .or_default()
            .insert(site.clone());
        self.vars_by_site.entry(site).or_default().insert(variable);
        true
    }

    fn insert_field(&mut self, base: SiteName, field: FieldName, target: SiteName) -> bool {
        if !self
            .field_points_to
            .insert((base.clone(), field.clone(), target.clone()))
        {
            return false;
        }
        self.targets_by_base_field
            .entry((base, field))
            .or_default()
            .insert(target);
        true
    }

    fn insert_edge(&mut self, invocation: Option<InvocationName>, method: MethodName) -> bool {
        if !self.call_graph.insert((invocation.clone(), method.clone())) {
            return false;
        }
        if let Some(invocation) = invocation {
            self.callees_by_invocation
                .entry(invocation.clone())
                .or_default()
                .insert(method.clone());
            self.invocations_by_callee
                .entry(method.clone())
                .or_default()
                .insert(invocation);
        }
        self.reachable.insert(method);
        true
    }

    fn points_to(&self, variable: &VariableName) -> impl Iterator<Item = &SiteName> {
        self.sites_by_var.get(variable).into_iter().flatten()
    }

    fn pointed_by(&self, site: &SiteName) -> impl Iterator<Item = &VariableName> {
        self.vars_by_site.get(site).into_iter().flatten()
    }

    fn field_targets<'a>(
        &'a self,
        base: &SiteName,
        field: &FieldName,
    ) -> impl Iterator<Item = &'a SiteName> {
        self.targets_by_base_field
            .get(&(base.clone(), field.clone()))
            .into_iter()
            .flatten()
    }

    fn callees_of(&self, invocation: &InvocationName) -> impl Iterator<Item = &MethodName> {
        self.callees_by_invocation
            .get(invocation)
            .into_iter()
            .flatten()
    }

    fn invocations_targeting(&self, method: &MethodName) -> impl Iterator<Item = &InvocationName> {
        self.invocations_by_callee.get(method).into_iter().flatten()
    }
}

/// Tuple buffer: the insertions proposed during a pass, and (once merged)
/// the delta driving the next pass. `reachable` carries the methods that
/// became reachable when their first call-graph edge was merged.
#[derive(Debug, Default)]
pub(crate) struct Tuples {
    pub(crate) var_points_to: Vec<(VariableName, SiteName)>,
    pub(crate) field_points_to: Vec<(SiteName, FieldName, SiteName)>,
    pub(crate) call_graph: Vec<(Option<InvocationName>, MethodName)>,
    pub(crate) reachable: Vec<MethodName>,
}

impl Tuples {
    pub(crate) fn is_empty(&self) -> bool {
        self.var_points_to.is_empty()
            && self.field_points_to.is_empty()
            && self.call_graph.is_empty()
            && self.reachable.is_empty()
    }
}

fn push_index<'f, K, V>(index: &mut FxHashMap<&'f K, Vec<&'f V>>, key: &'f K, value: &'f V)
where
    K: std::hash::Hash + Eq,
{
    index.entry(key).or_default().push(value);
}

/// Hash indexes over the immutable fact tables, built once per run. Each
/// table gets one index per join column a rule can be triggered through.
#[derive(Debug, Default)]
struct FactIndex<'f> {
    allocations_by_method: FxHashMap<&'f MethodName, Vec<&'f Allocation>>,
    moves_by_method: FxHashMap<&'f MethodName, Vec<&'f Move>>,
    moves_by_from: FxHashMap<&'f VariableName, Vec<&'f Move>>,
    stores_by_method: FxHashMap<&'f MethodName, Vec<&'f Store>>,
    stores_by_from: FxHashMap<&'f VariableName, Vec<&'f Store>>,
    stores_by_base: FxHashMap<&'f VariableName, Vec<&'f Store>>,
    loads_by_method: FxHashMap<&'f MethodName, Vec<&'f Load>>,
    loads_by_base: FxHashMap<&'f VariableName, Vec<&'f Load>>,
    statics_by_method: FxHashMap<&'f MethodName, Vec<&'f StaticInvocation>>,
    specials_by_method: FxHashMap<&'f MethodName, Vec<&'f SpecialInvocation>>,
    specials_by_base: FxHashMap<&'f VariableName, Vec<&'f SpecialInvocation>>,
    virtuals_by_method: FxHashMap<&'f MethodName, Vec<&'f VirtualInvocation>>,
    virtuals_by_base: FxHashMap<&'f VariableName, Vec<&'f VirtualInvocation>>,
    actuals_by_invocation: FxHashMap<&'f InvocationName, Vec<&'f ActualParam>>,
    actuals_by_var: FxHashMap<&'f VariableName, Vec<&'f ActualParam>>,
    formals_by_method: FxHashMap<&'f MethodName, Vec<&'f FormalParam>>,
    returns_by_method: FxHashMap<&'f MethodName, Vec<&'f ReturnVar>>,
    returns_by_var: FxHashMap<&'f VariableName, Vec<&'f ReturnVar>>,
    assigns_by_invocation: FxHashMap<&'f InvocationName, Vec<&'f AssignReturnValue>>,
    this_by_method: FxHashMap<&'f MethodName, Vec<&'f ThisVar>>,
    types_by_site: FxHashMap<&'f SiteName, Vec<&'f AllocType>>,
    /// Dispatch table for virtual resolution: allocated class -> declared
    /// methods, filtered by simple name at the join.
    dispatch_by_class: FxHashMap<&'f ClassName, Vec<&'f MethodNameType>>,
}

impl<'f> FactIndex<'f> {
    fn new(facts: &'f FactStore) -> Self {
        let mut index = FactIndex::default();
        for f in &facts.allocations {
            push_index(&mut index.allocations_by_method, &f.method, f);
        }
        for f in &facts.moves {
            push_index(&mut index.moves_by_method, &f.method, f);
            push_index(&mut index.moves_by_from, &f.from, f);
        }
        for f in &facts.stores {
            push_index(&mut index.stores_by_method, &f.method, f);
            push_index(&mut index.stores_by_from, &f.from, f);
            push_index(&mut index.stores_by_base, &f.base, f);
        }
        for f in &facts.loads {
            push_index(&mut index.loads_by_method, &f.method, f);
            push_index(&mut index.loads_by_base, &f.base, f);
        }
        for f in &facts.static_invocations {
            push_index(&mut index.statics_by_method, &f.enclosing, f);
        }
        for f in &facts.special_invocations {
            push_index(&mut index.specials_by_method, &f.enclosing, f);
            push_index(&mut index.specials_by_base, &f.base, f);
        }
        for f in &facts.virtual_invocations {
            push_index(&mut index.virtuals_by_method, &f.enclosing, f);
            push_index(&mut index.virtuals_by_base, &f.base, f);
        }
        for f in &facts.actual_params {
            push_index(&mut index.actuals_by_invocation, &f.invocation, f);
            push_index(&mut index.actuals_by_var, &f.variable, f);
        }
        for f in &facts.formal_params {
            push_index(&mut index.formals_by_method, &f.method, f);
        }
        for f in &facts.return_vars {
            push_index(&mut index.returns_by_method, &f.method, f);
            push_index(&mut index.returns_by_var, &f.variable, f);
        }
        for f in &facts.assign_return_values {
            push_index(&mut index.assigns_by_invocation, &f.invocation, f);
        }
        for f in &facts.this_vars {
            push_index(&mut index.this_by_method, &f.method, f);
        }
        for f in &facts.alloc_types {
            push_index(&mut index.types_by_site, &f.site, f);
        }
        for f in &facts.method_name_types {
            push_index(&mut index.dispatch_by_class, &f.class, f);
        }
        index
    }
}

/// The rule engine: nine inference rules over one shared [`RelationStore`],
/// stepped a pass at a time by [`analysis`].
pub(crate) struct Engine<'f> {
    index: FactIndex<'f>,
    store: RelationStore,
}

impl<'f> Engine<'f> {
    pub(crate) fn new(facts: &'f FactStore) -> Self {
        Engine {
            index: FactIndex::new(facts),
            store: RelationStore::default(),
        }
    }

    pub(crate) fn store(&self) -> &RelationStore {
        &self.store
    }

    pub(crate) fn into_store(self) -> RelationStore {
        self.store
    }

    /// Insert the synthetic entry edge and return the delta that drives the
    /// first pass.
    pub(crate) fn seed(&mut self, entry: MethodName) -> Tuples {
        let mut delta = Tuples::default();
        if self.store.insert_edge(None, entry.clone()) {
            delta.call_graph.push((None, entry.clone()));
            delta.reachable.push(entry);
        }
        delta
    }

    /// One pass: evaluate every rule against the previous pass's delta and
    /// the full relations, buffering insertions; then merge the buffer and
    /// return the genuinely-new tuples as the next delta. The store is not
    /// touched until every rule has run, so all rules see the same snapshot.
    pub(crate) fn step(&mut self, delta: &Tuples) -> Tuples {
        let mut pending = Tuples::default();
        self.rule_alloc(delta, &mut pending);
        self.rule_move(delta, &mut pending);
        self.rule_store(delta, &mut pending);
        self.rule_load(delta, &mut pending);
        self.rule_static_call(delta, &mut pending);
        self.rule_special_call(delta, &mut pending);
        self.rule_virtual_call(delta, &mut pending);
        self.rule_param(delta, &mut pending);
        self.rule_return(delta, &mut pending);
        self.merge(pending)
    }

    fn merge(&mut self, pending: Tuples) -> Tuples {
        let mut next = Tuples::default();
        for (variable, site) in pending.var_points_to {
            if self.store.insert_var(variable.clone(), site.clone()) {
                next.var_points_to.push((variable, site));
            }
        }
        for (base, field, target) in pending.field_points_to {
            if self
                .store
                .insert_field(base.clone(), field.clone(), target.clone())
            {
                next.field_points_to.push((base, field, target));
            }
        }
        for (invocation, method) in pending.call_graph {
            let newly_reachable = !self.store.is_reachable(&method);
            if self.store.insert_edge(invocation.clone(), method.clone()) {
                if newly_reachable {
                    next.reachable.push(method.clone());
                }
                next.call_graph.push((invocation, method));
            }
        }
        next
    }

    /// Alloc: Allocation(v, s, m), reachable(m) => VarPointsTo(v, s).
    fn rule_alloc(&self, delta: &Tuples, out: &mut Tuples) {
        let span = trace_span!("alloc");
        let _span = span.enter();
        for method in &delta.reachable {
            for alloc in self
                .index
                .allocations_by_method
                .get(method)
                .into_iter()
                .flatten()
            {
                out.var_points_to
                    .push((alloc.variable.clone(), alloc.site.clone()));
                count("var_points_to", "alloc");
            }
        }
    }

    /// Move: Move(f, t, m), VarPointsTo(f, s), reachable(m)
    /// => VarPointsTo(t, s).
    fn rule_move(&self, delta: &Tuples, out: &mut Tuples) {
        let span = trace_span!("move");
        let _span = span.enter();
        for (variable, site) in &delta.var_points_to {
            for mv in self.index.moves_by_from.get(variable).into_iter().flatten() {
                if self.store.is_reachable(&mv.method) {
                    out.var_points_to.push((mv.to.clone(), site.clone()));
                    count("var_points_to", "move");
                }
            }
        }
        for method in &delta.reachable {
            for mv in self.index.moves_by_method.get(method).into_iter().flatten() {
                for site in self.store.points_to(&mv.from) {
                    out.var_points_to.push((mv.to.clone(), site.clone()));
                    count("var_points_to", "move");
                }
            }
        }
    }

    /// Store: Store(b, fld, f, m), VarPointsTo(f, s_f), VarPointsTo(b, s_b),
    /// reachable(m) => FieldPointsTo(s_b, fld, s_f).
    fn rule_store(&self, delta: &Tuples, out: &mut Tuples) {
        let span = trace_span!("store");
        let _span = span.enter();
        for (variable, site) in &delta.var_points_to {
            for st in self.index.stores_by_from.get(variable).into_iter().flatten() {
                if self.store.is_reachable(&st.method) {
                    for base_site in self.store.points_to(&st.base) {
                        out.field_points_to
                            .push((base_site.clone(), st.field.clone(), site.clone()));
                        count("field_points_to", "store");
                    }
                }
            }
            for st in self.index.stores_by_base.get(variable).into_iter().flatten() {
                if self.store.is_reachable(&st.method) {
                    for from_site in self.store.points_to(&st.from) {
                        out.field_points_to
                            .push((site.clone(), st.field.clone(), from_site.clone()));
                        count("field_points_to", "store");
                    }
                }
            }
        }
        for method in &delta.reachable {
            for st in self.index.stores_by_method.get(method).into_iter().flatten() {
                for base_site in self.store.points_to(&st.base) {
                    for from_site in self.store.points_to(&st.from) {
                        out.field_points_to
                            .push((base_site.clone(), st.field.clone(), from_site.clone()));
                        count("field_points_to", "store");
                    }
                }
            }
        }
    }

    /// Load: Load(t, f, fld, m), VarPointsTo(f, s_b),
    /// FieldPointsTo(s_b, fld, s_t), reachable(m) => VarPointsTo(t, s_t).
    fn rule_load(&self, delta: &Tuples, out: &mut Tuples) {
        let span = trace_span!("load");
        let _span = span.enter();
        for (variable, base_site) in &delta.var_points_to {
            for ld in self.index.loads_by_base.get(variable).into_iter().flatten() {
                if self.store.is_reachable(&ld.method) {
                    for target in self.store.field_targets(base_site, &ld.field) {
                        out.var_points_to.push((ld.to.clone(), target.clone()));
                        count("var_points_to", "load");
                    }
                }
            }
        }
        for (base_site, field, target) in &delta.field_points_to {
            for variable in self.store.pointed_by(base_site) {
                for ld in self.index.loads_by_base.get(variable).into_iter().flatten() {
                    if ld.field == *field && self.store.is_reachable(&ld.method) {
                        out.var_points_to.push((ld.to.clone(), target.clone()));
                        count("var_points_to", "load");
                    }
                }
            }
        }
        for method in &delta.reachable {
            for ld in self.index.loads_by_method.get(method).into_iter().flatten() {
                for base_site in self.store.points_to(&ld.base) {
                    for target in self.store.field_targets(base_site, &ld.field) {
                        out.var_points_to.push((ld.to.clone(), target.clone()));
                        count("var_points_to", "load");
                    }
                }
            }
        }
    }

    /// StaticCall: StaticInvocation(i, callee, m), reachable(m)
    /// => CallGraphEdge(i, callee).
    fn rule_static_call(&self, delta: &Tuples, out: &mut Tuples) {
        let span = trace_span!("static_call");
        let _span = span.enter();
        for method in &delta.reachable {
            for call in self.index.statics_by_method.get(method).into_iter().flatten() {
                out.call_graph
                    .push((Some(call.invocation.clone()), call.callee.clone()));
                count("call_graph", "static_call");
            }
        }
    }

    /// SpecialCall: SpecialInvocation(i, b, callee, m), reachable(m),
    /// VarPointsTo(b, s), ThisVar(callee, this)
    /// => CallGraphEdge(i, callee), VarPointsTo(this, s).
    ///
    /// The callee is a direct bind (no type lookup), but the rule still
    /// requires a points-to fact for the receiver and a ThisVar fact for the
    /// callee before the edge appears.
    fn rule_special_call(&self, delta: &Tuples, out: &mut Tuples) {
        let span = trace_span!("special_call");
        let _span = span.enter();
        for method in &delta.reachable {
            for call in self.index.specials_by_method.get(method).into_iter().flatten() {
                for site in self.store.points_to(&call.base) {
                    self.bind_special(call, site, out);
                }
            }
        }
        for (variable, site) in &delta.var_points_to {
            for call in self.index.specials_by_base.get(variable).into_iter().flatten() {
                if self.store.is_reachable(&call.enclosing) {
                    self.bind_special(call, site, out);
                }
            }
        }
    }

    fn bind_special(&self, call: &SpecialInvocation, site: &SiteName, out: &mut Tuples) {
        for this_var in self.index.this_by_method.get(&call.callee).into_iter().flatten() {
            out.call_graph
                .push((Some(call.invocation.clone()), call.callee.clone()));
            out.var_points_to
                .push((this_var.variable.clone(), site.clone()));
            count("call_graph", "special_call");
        }
    }

    /// VirtualCall: VirtualInvocation(i, b, name, m), reachable(m),
    /// VarPointsTo(b, s), AllocType(s, type), MethodNameType(resolved, name,
    /// type), ThisVar(resolved, this)
    /// => CallGraphEdge(i, resolved), VarPointsTo(this, s).
    ///
    /// This is the dispatch rule: the receiver's allocation site supplies
    /// its dynamic type, and (type, invoked name) indexes the declared-method
    /// table to find the concrete callee.
    fn rule_virtual_call(&self, delta: &Tuples, out: &mut Tuples) {
        let span = trace_span!("virtual_call");
        let _span = span.enter();
        for method in &delta.reachable {
            for call in self.index.virtuals_by_method.get(method).into_iter().flatten() {
                for site in self.store.points_to(&call.base) {
                    self.dispatch(call, site, out);
                }
            }
        }
        for (variable, site) in &delta.var_points_to {
            for call in self.index.virtuals_by_base.get(variable).into_iter().flatten() {
                if self.store.is_reachable(&call.enclosing) {
                    self.dispatch(call, site, out);
                }
            }
        }
    }

    fn dispatch(&self, call: &VirtualInvocation, site: &SiteName, out: &mut Tuples) {
        for alloc_type in self.index.types_by_site.get(site).into_iter().flatten() {
            for decl in self
                .index
                .dispatch_by_class
                .get(&alloc_type.ty)
                .into_iter()
                .flatten()
            {
                if decl.name != call.method_name {
                    continue;
                }
                for this_var in self.index.this_by_method.get(&decl.method).into_iter().flatten() {
                    out.call_graph
                        .push((Some(call.invocation.clone()), decl.method.clone()));
                    out.var_points_to
                        .push((this_var.variable.clone(), site.clone()));
                    count("call_graph", "virtual_call");
                }
            }
        }
    }

    /// Param: CallGraphEdge(i, callee), ActualParam(idx, i, actual),
    /// FormalParam(idx, callee, formal), VarPointsTo(actual, s)
    /// => VarPointsTo(formal, s).
    fn rule_param(&self, delta: &Tuples, out: &mut Tuples) {
        let span = trace_span!("param");
        let _span = span.enter();
        for (invocation, callee) in &delta.call_graph {
            let Some(invocation) = invocation else {
                // The entry edge has no call site, so no arguments flow.
                continue;
            };
            for actual in self
                .index
                .actuals_by_invocation
                .get(invocation)
                .into_iter()
                .flatten()
            {
                for formal in self.index.formals_by_method.get(callee).into_iter().flatten() {
                    if formal.index != actual.index {
                        continue;
                    }
                    for site in self.store.points_to(&actual.variable) {
                        out.var_points_to
                            .push((formal.variable.clone(), site.clone()));
                        count("var_points_to", "param");
                    }
                }
            }
        }
        for (variable, site) in &delta.var_points_to {
            for actual in self.index.actuals_by_var.get(variable).into_iter().flatten() {
                for callee in self.store.callees_of(&actual.invocation) {
                    for formal in self.index.formals_by_method.get(callee).into_iter().flatten() {
                        if formal.index == actual.index {
                            out.var_points_to
                                .push((formal.variable.clone(), site.clone()));
                            count("var_points_to", "param");
                        }
                    }
                }
            }
        }
    }

    /// Return: CallGraphEdge(i, callee), AssignReturnValue(i, result),
    /// ReturnVar(ret, callee), VarPointsTo(ret, s) => VarPointsTo(result, s).
    fn rule_return(&self, delta: &Tuples, out: &mut Tuples) {
        let span = trace_span!("return");
        let _span = span.enter();
        for (invocation, callee) in &delta.call_graph {
            let Some(invocation) = invocation else {
                continue;
            };
            for assign in self
                .index
                .assigns_by_invocation
                .get(invocation)
                .into_iter()
                .flatten()
            {
                for ret in self.index.returns_by_method.get(callee).into_iter().flatten() {
                    for site in self.store.points_to(&ret.variable) {
                        out.var_points_to
                            .push((assign.variable.clone(), site.clone()));
                        count("var_points_to", "return");
                    }
                }
            }
        }
        for (variable, site) in &delta.var_points_to {
            for ret in self.index.returns_by_var.get(variable).into_iter().flatten() {
                for invocation in self.store.invocations_targeting(&ret.method) {
                    for assign in self
                        .index
                        .assigns_by_invocation
                        .get(invocation)
                        .into_iter()
                        .flatten()
                    {
                        out.var_points_to
                            .push((assign.variable.clone(), site.clone()));
                        count("var_points_to", "return");
                    }
                }
            }
        }
    }
}

/// Warn once for every special/virtual callee that has no `ThisVar` fact.
/// The call rules fire zero times for such callees, which silently degrades
/// precision; surfacing the gap lets the caller judge whether the fact
/// extraction was incomplete.
fn report_missing_this_vars(facts: &FactStore) -> usize {
    let has_this: FxHashSet<&MethodName> = facts.this_vars.iter().map(|t| &t.method).collect();
    let mut missing: BTreeSet<&MethodName> = BTreeSet::new();
    for call in &facts.special_invocations {
        if !has_this.contains(&call.callee) {
            missing.insert(&call.callee);
        }
    }
    for decl in &facts.method_name_types {
        if !has_this.contains(&decl.method) {
            missing.insert(&decl.method);
        }
    }
    for method in &missing {
        tracing::warn!(%method, "callee has no ThisVar fact; call rules cannot bind it");
    }
    missing.len()
}

/// Run the analysis to its least fixpoint.
///
/// Pure in the fact store: two runs over the same facts produce identical
/// relations. Fails with [`Error::NoEntryPoint`] on an empty universe, or
/// [`Error::NonConvergence`] when an iteration cap is configured and
/// exhausted.
pub fn analysis(facts: &FactStore, opts: &Options) -> Result<OutputRelations, Error> {
    let start = Instant::now();
    let span = trace_span!("analysis");
    let _span = span.enter();

    let entry = EntryResolver::new().resolve(facts)?;
    let missing_this_vars = report_missing_this_vars(facts);

    let mut engine = Engine::new(facts);
    let mut delta = engine.seed(entry.clone());
    let mut iterations = 0;
    let mut passes = 0;

    loop {
        let before = engine.store().len();
        let next = engine.step(&delta);
        passes += 1;
        if opts.debug {
            eprintln!("pass {}: +{} tuples", passes, engine.store().len() - before);
        }
        if next.is_empty() {
            break;
        }
        iterations += 1;
        if let Some(cap) = opts.max_iterations {
            if iterations > cap {
                return Err(Error::NonConvergence { cap });
            }
        }
        delta = next;
    }

    let elapsed = start.elapsed();
    tracing::info!(iterations, ?elapsed, "fixpoint reached");

    let store = engine.into_store();
    Ok(OutputRelations {
        var_points_to: store.var_points_to,
        field_points_to: store.field_points_to,
        call_graph: store.call_graph,
        stats: Stats {
            iterations,
            passes,
            elapsed,
            entry,
            missing_this_vars,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::{Engine, Tuples};
    use crate::facts::{Allocation, FactStore, Load, Move, Store};

    fn chain_facts() -> FactStore {
        let mut facts = FactStore::default();
        facts.allocations.insert(Allocation {
            variable: "m/a".into(),
            site: "m/H1".into(),
            method: "m".into(),
        });
        facts.allocations.insert(Allocation {
            variable: "m/b".into(),
            site: "m/H2".into(),
            method: "m".into(),
        });
        facts.stores.insert(Store {
            base: "m/a".into(),
            field: "f".into(),
            from: "m/b".into(),
            method: "m".into(),
        });
        facts.loads.insert(Load {
            to: "m/c".into(),
            base: "m/a".into(),
            field: "f".into(),
            method: "m".into(),
        });
        facts.moves.insert(Move {
            from: "m/c".into(),
            to: "m/d".into(),
            method: "m".into(),
        });
        facts
    }

    #[test]
    fn passes_are_monotone() {
        let facts = chain_facts();
        let mut engine = Engine::new(&facts);
        let mut delta = engine.seed("m".into());
        let mut sizes = vec![engine.store().len()];
        loop {
            delta = engine.step(&delta);
            sizes.push(engine.store().len());
            if delta.is_empty() {
                break;
            }
        }
        assert!(sizes.windows(2).all(|w| w[0] <= w[1]));
        assert!(sizes.len() >= 3, "store/load chain needs at least two passes");
    }

    /// After convergence, replaying the entire relation contents as a delta
    /// must derive nothing new: the relations are a fixpoint of all nine
    /// rules, not just of the semi-naive schedule.
    #[test]
    fn converged_state_is_a_fixpoint() {
        let facts = chain_facts();
        let mut engine = Engine::new(&facts);
        let mut delta = engine.seed("m".into());
        while !delta.is_empty() {
            delta = engine.step(&delta);
        }

        let replay = {
            let store = engine.store();
            Tuples {
                var_points_to: store.var_points_to().iter().cloned().collect(),
                field_points_to: store.field_points_to().iter().cloned().collect(),
                call_graph: store.call_graph().iter().cloned().collect(),
                reachable: store.call_graph().iter().map(|(_, m)| m.clone()).collect(),
            }
        };
        let before = engine.store().len();
        let next = engine.step(&replay);
        assert!(next.is_empty());
        assert_eq!(engine.store().len(), before);
    }

    #[test]
    fn stepping_an_empty_delta_is_a_no_op() {
        let facts = chain_facts();
        let mut engine = Engine::new(&facts);
        let mut delta = engine.seed("m".into());
        while !delta.is_empty() {
            delta = engine.step(&delta);
        }
        let next = engine.step(&Tuples::default());
        assert!(next.is_empty());
    }
}
