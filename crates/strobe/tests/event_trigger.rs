//! Explicit event handles: the trigger is `isFired()`, and firing sets up
//! clear-now plus deferred clearing of the 'triggered' state.

mod common;
use common::*;
use strobe::ir::{DType, Expr, LValue, Netlist, SenItem, SenTree, Stmt};
use strobe::sched::{SchedOptions, schedule};
use strobe::Sim;

fn build() -> Netlist {
    let mut netlist = Netlist::new("top");
    let ev = netlist.create_temp("ev", DType::Event);
    let cnt = bit_var(&mut netlist, "cnt", 8);
    let ev_ref = netlist.var_ref(ev);
    let tree = netlist.add_sen_tree(SenTree {
        items: vec![SenItem { edge: strobe::ir::EdgeKind::Event, expr: Some(ev_ref) }],
    });
    // always @(ev) cnt <= cnt + 1
    let cnt_ref = netlist.var_ref(cnt);
    let one = netlist.const_u(1, 8);
    let sum = netlist.add(cnt_ref, one);
    let stmt = netlist.add_stmt(Stmt::Assign { lhs: LValue::Var(cnt), rhs: sum });
    let scope = netlist.top_scope();
    netlist.add_active(scope, tree, vec![stmt]);
    netlist
}

#[test]
fn test_compute_function_contains_clearing_update() {
    let mut netlist = build();
    schedule(&mut netlist, &SchedOptions::default(), None).unwrap();

    let compute = func_named(&netlist, "_eval_triggers__act");
    let mut flat = Vec::new();
    collect_stmts(&netlist, &netlist.func(compute).stmts, &mut flat);

    // The trigger term is ev.isFired()
    let trig_assign = flat.iter().any(|s| {
        matches!(
            netlist.stmt(*s),
            Stmt::Assign { lhs: LValue::TrigBit { .. }, rhs }
                if matches!(netlist.exprs.get(*rhs), Expr::EventFired(_))
        )
    });
    assert!(trig_assign);

    // The update: if ev.isFired() { ev.clearFired(); enqueue for clearing }
    let update = flat.iter().find_map(|s| match netlist.stmt(*s) {
        Stmt::If { cond, then_stmts, .. }
            if matches!(netlist.exprs.get(*cond), Expr::EventFired(_)) =>
        {
            Some(then_stmts.clone())
        }
        _ => None,
    });
    let then_stmts = update.expect("event clearing update missing");
    assert!(matches!(netlist.stmt(then_stmts[0]), Stmt::EventClear(_)));
    assert!(matches!(netlist.stmt(then_stmts[1]), Stmt::EnqueueEventClear(_)));
}

#[test]
fn test_fire_runs_body_once_and_clears() {
    let mut netlist = build();
    schedule(&mut netlist, &SchedOptions::default(), None).unwrap();

    let ev = find_var(&netlist, "ev");
    let cnt = find_var(&netlist, "cnt");

    let mut sim = Sim::new(&netlist);
    sim.initialize().unwrap();
    sim.eval().unwrap();
    assert_eq!(sim.get_u64(cnt), 0);

    sim.fire_event(ev);
    sim.eval().unwrap();
    assert_eq!(sim.get_u64(cnt), 1);
    // 'fired' was cleared during trigger computation
    assert!(!sim.event_fired(ev));
    // 'triggered' is cleared on the next eval, through the runtime queue
    assert!(sim.event_triggered(ev));

    sim.eval().unwrap();
    assert_eq!(sim.get_u64(cnt), 1);
    assert!(!sim.event_triggered(ev));
}
