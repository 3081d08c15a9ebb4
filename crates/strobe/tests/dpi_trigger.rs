//! Variables written by foreign (DPI export) callouts: the trigger kits
//! reserve a flag slot, set-then-clear the export flag at compute head, and
//! the ordering passes inject the export trigger for logic reading such
//! variables.

mod common;
use common::*;
use strobe::ir::{DType, EdgeKind, Expr, LValue, Netlist, Stmt};
use strobe::sched::{SchedOptions, schedule};
use strobe::Sim;

/// clk-driven flop reading a DPI-written variable, plus input-fed
/// combinational logic reading it too.
fn build() -> Netlist {
    let mut netlist = Netlist::new("top");
    let flag = netlist.create_temp("__Vdpi_export_trigger", DType::Bit { width: 1 });
    netlist.dpi_export_trigger = Some(flag);

    let clk = input_var(&mut netlist, "clk", 1);
    let a = input_var(&mut netlist, "a", 1);
    let x = bit_var(&mut netlist, "x", 1);
    netlist.var_mut(x).written_by_dpi = true;
    let q = bit_var(&mut netlist, "q", 1);
    let y = bit_var(&mut netlist, "y", 1);

    // always_ff (posedge clk) q <= x
    let tree = edge_tree(&mut netlist, EdgeKind::Posedge, clk);
    let x_ref = netlist.var_ref(x);
    add_assign_active(&mut netlist, tree, q, x_ref);

    // assign y = a ^ x
    let ct = combo_tree(&mut netlist);
    let a_ref = netlist.var_ref(a);
    let x_ref = netlist.var_ref(x);
    let rhs = netlist.xor(a_ref, x_ref);
    add_assign_active(&mut netlist, ct, y, rhs);

    netlist
}

#[test]
fn test_act_triggers_reserve_dpi_slot() {
    let mut netlist = build();
    schedule(&mut netlist, &SchedOptions::default(), None).unwrap();

    // One slot for the export flag plus one for the clock
    let act_vec = find_var(&netlist, "__VactTriggered");
    assert_eq!(netlist.var(act_vec).dtype, DType::TriggerVec { width: 2 });

    // Compute head: latch the flag into slot 0, then clear the flag
    let flag = find_var(&netlist, "__Vdpi_export_trigger");
    let compute = func_named(&netlist, "_eval_triggers__act");
    let stmts = &netlist.func(compute).stmts;
    let Stmt::Assign { lhs: LValue::TrigBit { vec, index: 0 }, rhs } = *netlist.stmt(stmts[0])
    else {
        panic!("dpi latch should be the first compute statement");
    };
    assert_eq!(vec, act_vec);
    assert_eq!(*netlist.exprs.get(rhs), Expr::VarRef(flag));
    let Stmt::Assign { lhs: LValue::Var(cleared), .. } = *netlist.stmt(stmts[1]) else {
        panic!("flag clear should follow the latch");
    };
    assert_eq!(cleared, flag);

    // The export trigger reference is dropped from the netlist afterwards
    assert!(netlist.dpi_export_trigger.is_none());
}

#[test]
fn test_ico_triggers_reserve_dpi_slot() {
    let mut netlist = build();
    schedule(&mut netlist, &SchedOptions::default(), None).unwrap();

    // Slot 0 is the first-iteration trigger, slot 1 the export flag
    let ico_vec = find_var(&netlist, "__VicoTriggered");
    assert_eq!(netlist.var(ico_vec).dtype, DType::TriggerVec { width: 2 });

    let compute = func_named(&netlist, "_eval_triggers__ico");
    let stmts = &netlist.func(compute).stmts;
    // Head order: first-iteration assignment, then the dpi latch and clear
    let Stmt::Assign { lhs: LValue::TrigBit { index: 0, .. }, rhs } = *netlist.stmt(stmts[0])
    else {
        panic!("first-iteration assignment should lead");
    };
    assert!(matches!(netlist.exprs.get(rhs), Expr::Eq(..)));
    assert!(matches!(
        netlist.stmt(stmts[1]),
        Stmt::Assign { lhs: LValue::TrigBit { index: 1, .. }, .. }
    ));
}

#[test]
fn test_order_injects_export_trigger_for_readers() {
    let mut netlist = build();
    schedule(&mut netlist, &SchedOptions::default(), None).unwrap();

    let act_vec = find_var(&netlist, "__VactTriggered");
    let nba = netlist.eval_nba_fn.unwrap();
    let mut flat = Vec::new();
    collect_stmts_through_calls(&netlist, nba, &mut flat);

    // Both readers of x are guarded (among other flags) by the export
    // trigger, which lives in the act vector
    let mut export_guards = 0;
    for stmt in flat {
        if let Stmt::If { cond, .. } = netlist.stmt(stmt) {
            let mut conds = vec![*cond];
            let mut found = false;
            while let Some(c) = conds.pop() {
                match *netlist.exprs.get(c) {
                    Expr::Or(l, r) => {
                        conds.push(l);
                        conds.push(r);
                    }
                    Expr::TrigAt { vec, index: 0 } if vec == act_vec => found = true,
                    _ => {}
                }
            }
            if found {
                export_guards += 1;
            }
        }
    }
    assert_eq!(export_guards, 2);
}

/// A DPI-written variable read by clock-generating logic: the act region
/// re-evaluates within the tick that latched the export flag.
#[test]
fn test_export_flag_drives_act_region() {
    let mut netlist = Netlist::new("top");
    let flag = netlist.create_temp("__Vdpi_export_trigger", DType::Bit { width: 1 });
    netlist.dpi_export_trigger = Some(flag);

    let clk = input_var(&mut netlist, "clk", 1);
    let x = bit_var(&mut netlist, "x", 1);
    netlist.var_mut(x).written_by_dpi = true;
    let gclk = bit_var(&mut netlist, "gclk", 1);
    let q = bit_var(&mut netlist, "q", 1);

    // always_ff (posedge clk) gclk <= x   -- drives a clock, so act region
    let clk_tree = edge_tree(&mut netlist, EdgeKind::Posedge, clk);
    let x_ref = netlist.var_ref(x);
    add_assign_active(&mut netlist, clk_tree, gclk, x_ref);
    // always_ff (posedge gclk) q <= 1
    let gen_tree = edge_tree(&mut netlist, EdgeKind::Posedge, gclk);
    let one = netlist.const_u(1, 1);
    add_assign_active(&mut netlist, gen_tree, q, one);

    schedule(&mut netlist, &SchedOptions::default(), None).unwrap();

    let mut sim = Sim::new(&netlist);
    sim.initialize().unwrap();

    // Simulate a DPI export writing x mid-tick: set the value and the flag,
    // with no clock edge at all
    sim.set(find_var(&netlist, "x"), 1);
    sim.set(find_var(&netlist, "__Vdpi_export_trigger"), 1);
    sim.eval().unwrap();

    // The export trigger re-evaluated the generator, whose edge clocked q
    assert_eq!(sim.get_u64(find_var(&netlist, "gclk")), 1);
    assert_eq!(sim.get_u64(find_var(&netlist, "q")), 1);
}
