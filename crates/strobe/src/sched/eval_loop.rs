//! Helpers to construct an evaluation loop.

use crate::ir::{DType, Netlist, FuncId, Stmt, StmtId, VarId};
use crate::sched::{SchedOptions, set_var};

/// Emit
/// ```text
/// continue := 1
/// while (continue) { continue := 0; <body> }
/// ```
/// where `build` populates the body.
pub fn build_loop(
    netlist: &mut Netlist,
    tag: &str,
    build: impl FnOnce(&mut Netlist, VarId, &mut Vec<StmtId>),
) -> Vec<StmtId> {
    // Create the loop condition variable and initialize it to true
    let continue_var = netlist.create_temp(&format!("__V{tag}Continue"), DType::Bit { width: 1 });
    let init = set_var(netlist, continue_var, 1);
    // Clear the loop condition variable in the loop, then build the body
    let mut body = vec![set_var(netlist, continue_var, 0)];
    build(netlist, continue_var, &mut body);
    let cond = netlist.var_ref(continue_var);
    let loop_stmt = netlist.add_stmt(Stmt::While { cond, body });
    vec![init, loop_stmt]
}

/// Emit a bounded fixed-point evaluation loop: recompute the triggers, and
/// while any trigger is active run the body, dying when the convergence
/// limit is exceeded. Returns the iteration counter variable and the loop
/// node sequence.
#[allow(clippy::too_many_arguments)]
pub fn make_eval_loop(
    netlist: &mut Netlist,
    tag: &str,
    name: &str,
    trig_vec: VarId,
    dump_fn: FuncId,
    opts: &SchedOptions,
    compute_triggers: impl FnOnce(&mut Netlist) -> Vec<StmtId>,
    make_body: impl FnOnce(&mut Netlist) -> Vec<StmtId>,
) -> (VarId, Vec<StmtId>) {
    assert!(netlist.var(trig_vec).dtype.is_trigger_vec(), "not a trigger vector");

    let counter = netlist.create_temp(&format!("__V{tag}IterCount"), DType::Bit { width: 32 });

    let mut result = vec![set_var(netlist, counter, 0)];
    let loop_stmts = build_loop(netlist, tag, |netlist, continue_var, loop_body| {
        // Compute the triggers
        loop_body.extend(compute_triggers(netlist));

        // Invoke the body if anything triggered
        let mut then_stmts = vec![set_var(netlist, continue_var, 1)];

        // If we exceeded the iteration limit, die
        {
            let counter_ref = netlist.var_ref(counter);
            let limit = netlist.const_u(opts.converge_limit as u64, 32);
            let exceeded = netlist.gt(counter_ref, limit);
            let dump_call = netlist.add_stmt(Stmt::Call(dump_fn));
            let dump = netlist.add_stmt(Stmt::IfDebug { body: vec![dump_call] });
            let fatal = netlist.add_stmt(Stmt::Fatal {
                file: netlist.top_loc.file.clone(),
                line: netlist.top_loc.line,
                msg: format!("{name} region did not converge."),
            });
            then_stmts.push(netlist.add_stmt(Stmt::If {
                cond: exceeded,
                then_stmts: vec![dump, fatal],
                else_stmts: vec![],
                unlikely: false,
            }));
        }

        // Increment the iteration count
        {
            let counter_ref = netlist.var_ref(counter);
            let one = netlist.const_u(1, 32);
            let incremented = netlist.add(counter_ref, one);
            then_stmts.push(netlist.add_stmt(Stmt::Assign {
                lhs: crate::ir::LValue::Var(counter),
                rhs: incremented,
            }));
        }

        // Add the body
        then_stmts.extend(make_body(netlist));

        let any = netlist.trig_any(trig_vec);
        loop_body.push(netlist.add_stmt(Stmt::If {
            cond: any,
            then_stmts,
            else_stmts: vec![],
            unlikely: false,
        }));
    });
    result.extend(loop_stmts);

    (counter, result)
}
