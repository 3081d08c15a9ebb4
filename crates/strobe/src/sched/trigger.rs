//! A TriggerKit holds all the components related to one packed trigger
//! vector: the vector variable, its compute and dump functions, and the map
//! from input sensitivity trees to trigger-bit sensitivity trees.

use crate::HashMap;
use crate::ir::{
    DType, EdgeKind, LValue, Netlist, FuncId, SenItem, SenTree, SenTreeId, Stmt, StmtId, VarId,
};
use crate::sched::{SchedOptions, SenExprBuilder, make_sub_function, set_var};

pub struct TriggerKit {
    /// The trigger vector variable holding one flag per sensitivity
    pub vec: VarId,
    /// The function that computes the current active triggers
    pub compute_fn: FuncId,
    /// The function that dumps the current active triggers
    pub dump_fn: FuncId,
    /// The map from input sensitivity tree to trigger sensitivity tree
    pub map: HashMap<SenTreeId, SenTreeId>,
}

impl TriggerKit {
    /// Create a fresh sensitivity tree firing on the given trigger index.
    pub fn create_trigger_sen_tree(&self, netlist: &mut Netlist, index: u32) -> SenTreeId {
        let sense = netlist.trig_at(self.vec, index);
        netlist.add_sen_tree(SenTree {
            items: vec![SenItem { edge: EdgeKind::True, expr: Some(sense) }],
        })
    }

    /// Make the given index trigger fire when the iteration counter is zero.
    pub fn add_first_iteration_trigger_assignment(
        &self,
        netlist: &mut Netlist,
        counter: VarId,
        index: u32,
    ) {
        let counter_ref = netlist.var_ref(counter);
        let width = netlist.var(counter).dtype.width();
        let zero = netlist.const_u(0, width);
        let rhs = netlist.eq(counter_ref, zero);
        let assign =
            netlist.add_stmt(Stmt::Assign { lhs: LValue::TrigBit { vec: self.vec, index }, rhs });
        netlist.func_mut(self.compute_fn).stmts.insert(0, assign);
    }

    /// Set then clear the DPI export trigger flag at the head of the compute
    /// function.
    pub fn add_dpi_export_trigger_assignment(
        &self,
        netlist: &mut Netlist,
        dpi_export_trigger: VarId,
        index: u32,
    ) {
        let flag_ref = netlist.var_ref(dpi_export_trigger);
        let latch = netlist
            .add_stmt(Stmt::Assign { lhs: LValue::TrigBit { vec: self.vec, index }, rhs: flag_ref });
        let clear = set_var(netlist, dpi_export_trigger, 0);
        let stmts = &mut netlist.func_mut(self.compute_fn).stmts;
        stmts.insert(0, latch);
        stmts.insert(1, clear);
    }
}

/// Create a trigger vector and the related TriggerKit for the given
/// sensitivity trees. Indices `0..extra` are reserved for caller-owned slots.
pub fn create_triggers(
    netlist: &mut Netlist,
    sen_expr_builder: &mut SenExprBuilder,
    sen_trees: &[SenTreeId],
    name: &str,
    extra: u32,
    slow: bool,
    opts: &SchedOptions,
) -> TriggerKit {
    let mut map: HashMap<SenTreeId, SenTreeId> = HashMap::default();

    let n_triggers = sen_trees.len() as u32 + extra;

    // Create the trigger vector variable
    let vec =
        netlist.create_temp(&format!("__V{name}Triggered"), DType::TriggerVec { width: n_triggers });

    // Create the trigger computation function
    let compute_fn = make_sub_function(netlist, &format!("_eval_triggers__{name}"), slow);

    // Create the trigger dump function (for debugging), compiled only when
    // debug support is enabled
    let dump_fn = make_sub_function(netlist, &format!("_dump_triggers__{name}"), slow);
    netlist.func_mut(dump_fn).ifdef_debug = true;

    // Print from the dumping function if there are no triggers pending
    {
        let any = netlist.trig_any(vec);
        let msg = netlist.add_stmt(Stmt::DbgMsg("         No triggers active\n".to_owned()));
        let ifp = netlist.add_stmt(Stmt::If {
            cond: any,
            then_stmts: vec![],
            else_stmts: vec![msg],
            unlikely: false,
        });
        netlist.func_mut(dump_fn).stmts.push(ifp);
    }

    // Add a debug dumping statement for one trigger
    fn add_debug(netlist: &mut Netlist, dump_fn: FuncId, vec: VarId, name: &str, index: u32, text: &str) {
        let mut message = format!("         '{name}' region trigger index {index} is active");
        if !text.is_empty() {
            message.push_str(": ");
            message.push_str(text);
        }
        message.push('\n');
        let cond = netlist.trig_at(vec, index);
        let msg = netlist.add_stmt(Stmt::DbgMsg(message));
        let ifp = netlist.add_stmt(Stmt::If {
            cond,
            then_stmts: vec![msg],
            else_stmts: vec![],
            unlikely: false,
        });
        netlist.func_mut(dump_fn).stmts.push(ifp);
    }

    // A print for each of the extra, caller-owned triggers
    for index in 0..extra {
        add_debug(netlist, dump_fn, vec, name, index, "");
    }

    // Add the trigger computation
    let mut trigger_number = extra;
    let mut initial_trigs: Vec<StmtId> = Vec::new();
    for tree in sen_trees {
        let senp = netlist.sen_tree(*tree);
        assert!(
            senp.has_clocked() || senp.has_hybrid(),
            "cannot create trigger expression for non-clocked sensitivity"
        );

        // Create the trigger sensitivity tree and associate it with the
        // original; this is the sensitivity used by the IR henceforth
        let sense = netlist.trig_at(vec, trigger_number);
        let trig_sen = netlist.add_sen_tree(SenTree {
            items: vec![SenItem { edge: EdgeKind::True, expr: Some(sense) }],
        });
        map.insert(*tree, trig_sen);

        // Add the trigger computation
        let (expr, fired_at_init) = sen_expr_builder.build(netlist, *tree);
        let rhs = expr.unwrap_or_else(|| netlist.const_u(0, 1));
        let assign = netlist.add_stmt(Stmt::Assign {
            lhs: LValue::TrigBit { vec, index: trigger_number },
            rhs,
        });
        netlist.func_mut(compute_fn).stmts.push(assign);

        // Add the initialization time trigger
        if fired_at_init || opts.x_initial_edge {
            let one = netlist.const_u(1, 1);
            let assign = netlist.add_stmt(Stmt::Assign {
                lhs: LValue::TrigBit { vec, index: trigger_number },
                rhs: one,
            });
            initial_trigs.push(assign);
        }

        // Add a debug statement for this trigger
        let text = netlist.sen_tree_to_string(*tree);
        add_debug(netlist, dump_fn, vec, name, trigger_number, &text);

        trigger_number += 1;
    }

    // Add the update statements
    let updates = sen_expr_builder.get_and_clear_updates();
    netlist.func_mut(compute_fn).stmts.extend(updates);

    // Add the initialization statements, gated by a one-shot flag
    if !initial_trigs.is_empty() {
        let did_init =
            netlist.create_temp(&format!("__V{name}DidInit"), DType::Bit { width: 1 });
        let did_init_ref = netlist.var_ref(did_init);
        let cond = netlist.not(did_init_ref);
        let mut then_stmts = vec![set_var(netlist, did_init, 1)];
        then_stmts.extend(initial_trigs);
        let ifp = netlist.add_stmt(Stmt::If {
            cond,
            then_stmts,
            else_stmts: vec![],
            unlikely: true,
        });
        netlist.func_mut(compute_fn).stmts.push(ifp);
    }

    // Call the dumping function if debug is enabled
    {
        let call = netlist.add_stmt(Stmt::Call(dump_fn));
        let guarded = netlist.add_stmt(Stmt::IfDebug { body: vec![call] });
        netlist.func_mut(compute_fn).stmts.push(guarded);
    }

    TriggerKit { vec, compute_fn, dump_fn, map }
}
