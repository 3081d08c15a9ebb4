//! Builders for the simply ordered regions (static/initial/final), the
//! settle loop and the input combinational loop.

use crate::HashMap;
use crate::ir::{FuncId, Netlist, SenTreeId, Stmt, StmtId};
use crate::order;
use crate::sched::{
    LogicByScope, LogicClasses, SchedError, SchedOptions, SenExprBuilder, create_triggers,
    get_sen_trees_used_by, invert_and_merge_sen_tree_map, make_eval_loop, make_top_function,
    order_sequentially, remap_sensitivities, split_check,
};

//============================================================================
// Create simply ordered functions

pub fn create_static(netlist: &mut Netlist, statics: LogicByScope, opts: &SchedOptions) {
    let func = make_top_function(netlist, "_eval_static", /* slow: */ true);
    order_sequentially(netlist, func, statics);
    split_check(netlist, func, opts);
}

pub fn create_initial(netlist: &mut Netlist, initials: LogicByScope) -> FuncId {
    let func = make_top_function(netlist, "_eval_initial", /* slow: */ true);
    order_sequentially(netlist, func, initials);
    func // Not split yet, as the orchestrator may still append to it
}

pub fn create_final(netlist: &mut Netlist, finals: LogicByScope, opts: &SchedOptions) {
    let func = make_top_function(netlist, "_eval_final", /* slow: */ true);
    order_sequentially(netlist, func, finals);
    split_check(netlist, func, opts);
}

//============================================================================
// Order the combinational logic to create the settle loop

pub fn create_settle(
    netlist: &mut Netlist,
    sen_expr_builder: &mut SenExprBuilder,
    logic_classes: &LogicClasses,
    opts: &SchedOptions,
) -> Result<(), SchedError> {
    let func = make_top_function(netlist, "_eval_settle", true);

    // Clone, because ordering is destructive, but the logic is still needed
    // for '_eval'
    let mut comb = logic_classes.comb.clone_logic(netlist);
    let mut hybrid = logic_classes.hybrid.clone_logic(netlist);

    // Nothing to do if there is no logic. While this is rare in real
    // designs, it reduces noise in small tests.
    if comb.is_empty() && hybrid.is_empty() {
        return Ok(());
    }

    // We have an extra trigger denoting the first iteration of the settle
    // loop
    const FIRST_ITERATION_TRIGGER: u32 = 0;
    const EXTRA_TRIGGERS: u32 = FIRST_ITERATION_TRIGGER + 1;

    // Gather the relevant sensitivity expressions and create the trigger kit
    let sen_trees = get_sen_trees_used_by(netlist, &[&comb, &hybrid]);
    let trig = create_triggers(
        netlist,
        sen_expr_builder,
        &sen_trees,
        "stl",
        EXTRA_TRIGGERS,
        true,
        opts,
    );

    // Remap the sensitivities (comb logic has none, so only do the hybrid)
    remap_sensitivities(netlist, &hybrid, &trig.map);

    // Create the inverse map from trigger sensitivity to original sensitivity
    let mut trig_to_sen: HashMap<SenTreeId, SenTreeId> = HashMap::default();
    invert_and_merge_sen_tree_map(&mut trig_to_sen, netlist, &trig.map);

    // The first trigger stands in for pure combinational activation
    let input_changed = trig.create_trigger_sen_tree(netlist, FIRST_ITERATION_TRIGGER);

    // Create and order the body function
    let stl_func = order::order(
        netlist,
        &mut [&mut comb, &mut hybrid],
        &trig_to_sen,
        "stl",
        false,
        true,
        |_, _, out| out.push(input_changed),
    )?;
    split_check(netlist, stl_func, opts);

    // Create the eval loop
    let trig_compute = trig.compute_fn;
    let (counter, loop_stmts) = make_eval_loop(
        netlist,
        "stl",
        "Settle",
        trig.vec,
        trig.dump_fn,
        opts,
        |netlist| vec![netlist.add_stmt(Stmt::Call(trig_compute))],
        |netlist| vec![netlist.add_stmt(Stmt::Call(stl_func))],
    );

    // Add the first iteration trigger to the trigger computation function
    trig.add_first_iteration_trigger_assignment(netlist, counter, FIRST_ITERATION_TRIGGER);

    // Add the eval loop to the top function
    netlist.func_mut(func).stmts.extend(loop_stmts);
    Ok(())
}

//============================================================================
// Order the replicated combinational logic to create the 'ico' region

pub fn create_input_comb_loop(
    netlist: &mut Netlist,
    sen_expr_builder: &mut SenExprBuilder,
    logic: &mut LogicByScope,
    opts: &SchedOptions,
) -> Result<Option<Vec<StmtId>>, SchedError> {
    // Nothing to do if no combinational logic is sensitive to top level
    // inputs
    if logic.is_empty() {
        return Ok(None);
    }

    // SystemC only: top level inputs feeding combinational logic must be
    // marked, so they can be made externally sensitive in emission
    if opts.systemc {
        let mut reads = Vec::new();
        let mut writes = Vec::new();
        for (_, active) in logic.iter() {
            for stmt in &netlist.active(*active).stmts {
                netlist.stmt_reads_writes(*stmt, &mut reads, &mut writes);
            }
        }
        for var in reads {
            let v = netlist.var(var);
            if netlist.scope(v.scope).is_top && v.is_non_output {
                netlist.var_mut(var).sc_sensitive = true;
            }
        }
    }

    // We have some extra triggers denoting external conditions
    let dpi_export_trigger = netlist.dpi_export_trigger;

    let mut extra_triggers = 0u32;
    let first_iteration_trigger = extra_triggers;
    extra_triggers += 1;
    let dpi_export_trigger_index = dpi_export_trigger.map(|_| {
        let index = extra_triggers;
        extra_triggers += 1;
        index
    });

    // Gather the relevant sensitivity expressions and create the trigger kit
    let sen_trees = get_sen_trees_used_by(netlist, &[&*logic]);
    let trig = create_triggers(
        netlist,
        sen_expr_builder,
        &sen_trees,
        "ico",
        extra_triggers,
        false,
        opts,
    );

    if let (Some(dpi_var), Some(index)) = (dpi_export_trigger, dpi_export_trigger_index) {
        trig.add_dpi_export_trigger_assignment(netlist, dpi_var, index);
    }

    // Remap the sensitivities
    remap_sensitivities(netlist, logic, &trig.map);

    // Create the inverse map from trigger sensitivity to original sensitivity
    let mut trig_to_sen: HashMap<SenTreeId, SenTreeId> = HashMap::default();
    invert_and_merge_sen_tree_map(&mut trig_to_sen, netlist, &trig.map);

    // The trigger for top level inputs (first iteration)
    let input_changed = trig.create_trigger_sen_tree(netlist, first_iteration_trigger);

    // The DPI export trigger
    let dpi_export_triggered =
        dpi_export_trigger_index.map(|index| trig.create_trigger_sen_tree(netlist, index));

    // Create and order the body function
    let ico_func = order::order(
        netlist,
        &mut [logic],
        &trig_to_sen,
        "ico",
        false,
        false,
        |netlist, var, out| {
            let v = netlist.var(var);
            if netlist.scope(v.scope).is_top && v.is_non_output {
                out.push(input_changed);
            }
            if v.written_by_dpi {
                out.extend(dpi_export_triggered);
            }
        },
    )?;
    split_check(netlist, ico_func, opts);

    // Create the eval loop
    let trig_compute = trig.compute_fn;
    let (counter, loop_stmts) = make_eval_loop(
        netlist,
        "ico",
        "Input combinational",
        trig.vec,
        trig.dump_fn,
        opts,
        |netlist| vec![netlist.add_stmt(Stmt::Call(trig_compute))],
        |netlist| vec![netlist.add_stmt(Stmt::Call(ico_func))],
    );

    // Add the first iteration trigger to the trigger computation function
    trig.add_first_iteration_trigger_assignment(netlist, counter, first_iteration_trigger);

    // Return the eval loop itself; the orchestrator splices it into '_eval'
    Ok(Some(loop_stmts))
}
