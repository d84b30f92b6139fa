use criterion::{black_box, criterion_group, criterion_main, Criterion};

use japt::facts::{
    ActualParam, Allocation, AssignReturnValue, FactStore, FormalParam, Load, Move, ReturnVar,
    StaticInvocation, Store,
};
use japt::pointer::{self, Options};

const MAIN: &str = "<Main: void main(java.lang.String[])>";

// ------------------------------------------------------------------
// Synthetic fact generators

/// One allocation flowing through a chain of `n` moves. Worst case for the
/// pass count: each pass advances the points-to set by one variable.
fn move_chain(n: usize) -> FactStore {
    let mut facts = FactStore::default();
    facts.allocations.insert(Allocation {
        variable: "main/v0".into(),
        site: "main/H0".into(),
        method: MAIN.into(),
    });
    for i in 0..n {
        facts.moves.insert(Move {
            from: format!("main/v{i}").as_str().into(),
            to: format!("main/v{}", i + 1).as_str().into(),
            method: MAIN.into(),
        });
    }
    facts
}

/// `n` allocations all stored into one base object's fields and loaded back,
/// so the field relation and the load rule dominate.
fn field_mesh(n: usize) -> FactStore {
    let mut facts = FactStore::default();
    facts.allocations.insert(Allocation {
        variable: "main/base".into(),
        site: "main/HB".into(),
        method: MAIN.into(),
    });
    for i in 0..n {
        facts.allocations.insert(Allocation {
            variable: format!("main/v{i}").as_str().into(),
            site: format!("main/H{i}").as_str().into(),
            method: MAIN.into(),
        });
        facts.stores.insert(Store {
            base: "main/base".into(),
            field: format!("f{}", i % 8).as_str().into(),
            from: format!("main/v{i}").as_str().into(),
            method: MAIN.into(),
        });
        facts.loads.insert(Load {
            to: format!("main/out{i}").as_str().into(),
            base: "main/base".into(),
            field: format!("f{}", i % 8).as_str().into(),
            method: MAIN.into(),
        });
    }
    facts
}

/// A chain of `n` static calls, each forwarding its argument and returning
/// it, so reachability, parameter, and return rules all fire per level.
fn call_chain(n: usize) -> FactStore {
    let mut facts = FactStore::default();
    facts.allocations.insert(Allocation {
        variable: "main/a".into(),
        site: "main/H0".into(),
        method: MAIN.into(),
    });
    let mut caller = MAIN.to_owned();
    let mut arg = "main/a".to_owned();
    let mut result = "main/r".to_owned();
    for i in 0..n {
        let callee = format!("<F{i}: java.lang.Object f(java.lang.Object)>");
        let invocation = format!("{caller}/invoke{i}");
        facts.static_invocations.insert(StaticInvocation {
            invocation: invocation.as_str().into(),
            callee: callee.as_str().into(),
            enclosing: caller.as_str().into(),
        });
        facts.actual_params.insert(ActualParam {
            index: 0,
            invocation: invocation.as_str().into(),
            variable: arg.as_str().into(),
        });
        facts.formal_params.insert(FormalParam {
            index: 0,
            method: callee.as_str().into(),
            variable: format!("f{i}/p").as_str().into(),
        });
        facts.return_vars.insert(ReturnVar {
            variable: format!("f{i}/p").as_str().into(),
            method: callee.as_str().into(),
        });
        facts.assign_return_values.insert(AssignReturnValue {
            invocation: invocation.as_str().into(),
            variable: result.as_str().into(),
        });
        caller = callee;
        arg = format!("f{i}/p");
        result = format!("f{i}/r");
    }
    facts
}

// ------------------------------------------------------------------

const OPTS: Options = Options {
    max_iterations: None,
    debug: false,
};

pub fn moves(c: &mut Criterion) {
    let facts = move_chain(256);
    c.bench_function("pointer::analysis(move-chain-256)", |b| {
        b.iter(|| pointer::analysis(black_box(&facts), &OPTS))
    });
}

pub fn fields(c: &mut Criterion) {
    let facts = field_mesh(256);
    c.bench_function("pointer::analysis(field-mesh-256)", |b| {
        b.iter(|| pointer::analysis(black_box(&facts), &OPTS))
    });
}

pub fn calls(c: &mut Criterion) {
    let facts = call_chain(128);
    c.bench_function("pointer::analysis(call-chain-128)", |b| {
        b.iter(|| pointer::analysis(black_box(&facts), &OPTS))
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = moves, fields, calls
}
criterion_main!(benches);
