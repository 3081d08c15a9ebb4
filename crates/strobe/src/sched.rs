//! Scheduling: transform the classified logic of an elaborated design into
//! an explicit evaluation plan implementing event-driven semantics.
//!
//! The high level process is:
//!
//!  - Gather and classify all logic in the design based on what triggers its
//!    execution
//!  - Schedule static, initial and final logic classes in source order
//!  - Break combinational cycles by introducing hybrid logic
//!  - Create the 'settle' region that restores the combinational invariant
//!  - Partition the clocked and combinational (including hybrid) logic into
//!    pre/act/nba. All clocks (signals referenced in a sensitivity tree)
//!    generated via a blocking assignment are computed within the act region.
//!  - Replicate combinational logic
//!  - Create the input combinational logic loop
//!  - Create the pre/act/nba triggers
//!  - Create the 'act' and 'nba' region evaluation functions
//!  - Bolt it all together to create the '_eval' function

use crate::HashMap;
use crate::HashSet;
use crate::cycle_break;
use crate::debug::ScheduleTrace;
use crate::ir::{
    ActiveId, Func, FuncId, LValue, Netlist, ScopeId, SenTreeId, Stmt, StmtId, VarId,
};
use crate::order;
use crate::partition;
use crate::replicate;
use thiserror::Error;

mod classify;
mod eval_loop;
mod regions;
mod sen_expr;
mod trigger;

pub use classify::gather_logic_classes;
pub use eval_loop::{build_loop, make_eval_loop};
pub use regions::{
    create_final, create_initial, create_input_comb_loop, create_settle, create_static,
};
pub use sen_expr::SenExprBuilder;
pub use trigger::{TriggerKit, create_triggers};

/// User-visible scheduling failures. IR contract violations are panics, and
/// runtime divergence is a fatal in the generated plan, not here.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SchedError {
    #[error("multiple drivers detected for '{var}'")]
    MultipleDriver { var: String },
}

/// Option surface consumed by the scheduler.
#[derive(Debug, Clone)]
pub struct SchedOptions {
    /// Split generated functions larger than this statement count
    pub split_funcs: Option<usize>,
    /// Fixed-point iteration bound emitted into the eval loops
    pub converge_limit: u32,
    /// Mark top level inputs read by input-combinational logic as externally
    /// sensitive
    pub systemc: bool,
    /// Allow the nba region to be compiled to a task graph
    pub mtasks: bool,
    /// Fire every edge trigger on the first evaluation
    pub x_initial_edge: bool,
    /// Record per-stage sizes into the schedule trace
    pub stats: bool,
    /// Dump the generated functions to stderr at level 3 and above
    pub dump_tree_level: u32,
}

impl Default for SchedOptions {
    fn default() -> Self {
        Self {
            split_funcs: None,
            converge_limit: 100,
            systemc: false,
            mtasks: false,
            x_initial_edge: false,
            stats: false,
            dump_tree_level: 0,
        }
    }
}

/// An ordered multimap from scope to activation. The scheduler's unit of
/// logic bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct LogicByScope(pub Vec<(ScopeId, ActiveId)>);

impl LogicByScope {
    pub fn push(&mut self, scope: ScopeId, active: ActiveId) {
        self.0.push((scope, active));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(ScopeId, ActiveId)> {
        self.0.iter()
    }

    /// Deep-copy: activations (and their statement trees) are cloned, the
    /// sensitivity trees are shared with the originals.
    pub fn clone_logic(&self, netlist: &mut Netlist) -> LogicByScope {
        let mut result = LogicByScope::default();
        for (scope, active) in &self.0 {
            let original = netlist.active(*active).clone();
            let stmts = netlist.clone_stmts(&original.stmts);
            let copy = netlist.add_active_detached(original.scope, original.sen_tree, stmts);
            result.push(*scope, copy);
        }
        result
    }

    /// Total statement node count, for stage statistics.
    pub fn total_stmt_count(&self, netlist: &Netlist) -> usize {
        self.0
            .iter()
            .map(|(_, active)| netlist.stmts_count(&netlist.active(*active).stmts))
            .sum()
    }
}

/// The five classification buckets, plus hybrid logic populated by the cycle
/// breaker.
#[derive(Debug, Default)]
pub struct LogicClasses {
    pub statics: LogicByScope,
    pub initials: LogicByScope,
    pub finals: LogicByScope,
    pub comb: LogicByScope,
    pub clocked: LogicByScope,
    pub hybrid: LogicByScope,
}

/// The three semantic regions of one eval tick.
#[derive(Debug, Default)]
pub struct LogicRegions {
    pub pre: LogicByScope,
    pub act: LogicByScope,
    pub nba: LogicByScope,
}

/// Combinational logic fanned out to feed the input loop and the partitioned
/// regions.
#[derive(Debug, Default)]
pub struct LogicReplicas {
    pub ico: LogicByScope,
    pub act: LogicByScope,
    pub nba: LogicByScope,
}

//============================================================================
// Utility functions

pub(crate) fn make_sub_function(netlist: &mut Netlist, name: &str, slow: bool) -> FuncId {
    let scope_top = netlist.top_scope();
    netlist.add_func(Func {
        name: name.to_owned(),
        scope: scope_top,
        stmts: Vec::new(),
        finals: Vec::new(),
        slow,
        entry_point: false,
        dont_combine: true,
        is_loose: true,
        is_const: false,
        decl_private: true,
        ifdef_debug: false,
        mtasks: false,
    })
}

pub(crate) fn make_top_function(netlist: &mut Netlist, name: &str, slow: bool) -> FuncId {
    let func = make_sub_function(netlist, name, slow);
    netlist.func_mut(func).entry_point = true;
    func
}

/// Gather the distinct clocked or hybrid sensitivity trees referenced by the
/// given logic, preserving first-use order.
pub(crate) fn get_sen_trees_used_by(netlist: &Netlist, lbss: &[&LogicByScope]) -> Vec<SenTreeId> {
    let mut seen: HashSet<SenTreeId> = HashSet::default();
    let mut result = Vec::new();
    for lbs in lbss {
        for (_, active) in lbs.iter() {
            let tree = netlist.active(*active).sen_tree;
            if !seen.insert(tree) {
                continue;
            }
            let senp = netlist.sen_tree(tree);
            if senp.has_clocked() || senp.has_hybrid() {
                result.push(tree);
            }
        }
    }
    result
}

pub(crate) fn set_var(netlist: &mut Netlist, var: VarId, val: u64) -> StmtId {
    let width = netlist.var(var).dtype.width();
    let rhs = netlist.const_u(val, width);
    netlist.add_stmt(Stmt::Assign { lhs: LValue::Var(var), rhs })
}

/// Point every non-combinational activation at its trigger sensitivity tree.
pub(crate) fn remap_sensitivities(
    netlist: &mut Netlist,
    lbs: &LogicByScope,
    sen_tree_map: &HashMap<SenTreeId, SenTreeId>,
) {
    for (_, active) in lbs.iter() {
        let tree = netlist.active(*active).sen_tree;
        if netlist.sen_tree(tree).has_combo() {
            continue;
        }
        let mapped = sen_tree_map[&tree];
        netlist.active_mut(*active).sen_tree = mapped;
    }
}

/// Build the inverse map from trigger sensitivity tree back to the original
/// sensitivity tree. Each trigger tree must appear exactly once.
pub(crate) fn invert_and_merge_sen_tree_map(
    result: &mut HashMap<SenTreeId, SenTreeId>,
    netlist: &Netlist,
    sen_tree_map: &HashMap<SenTreeId, SenTreeId>,
) {
    for (original, trigger) in sen_tree_map {
        assert_eq!(
            netlist.sen_tree(*trigger).items.len(),
            1,
            "trigger sensitivity should have a single item"
        );
        let prev = result.insert(*trigger, *original);
        assert!(prev.is_none(), "trigger sensitivity mapped twice");
    }
}

//============================================================================
// Simple ordering in source order

/// Move each activation's body into a per-scope sub-function of `func`,
/// preserving source order, then delete the emptied activations.
pub(crate) fn order_sequentially(netlist: &mut Netlist, func: FuncId, lbs: LogicByScope) {
    // Scope -> the sub-function for the scope
    let mut sub_funcs: HashMap<ScopeId, FuncId> = HashMap::default();
    for (scope, active) in lbs.0 {
        let sub_func = match sub_funcs.get(&scope).copied() {
            Some(id) => id,
            None => {
                // One sub-function per scope so they can be combined later
                let sub_name =
                    format!("{}__{}", netlist.func(func).name, netlist.scope(scope).name_dotless());
                let slow = netlist.func(func).slow;
                let sub = netlist.add_func(Func {
                    name: sub_name,
                    scope,
                    stmts: Vec::new(),
                    finals: Vec::new(),
                    slow,
                    entry_point: false,
                    dont_combine: false,
                    is_loose: true,
                    is_const: false,
                    decl_private: true,
                    ifdef_debug: false,
                    mtasks: false,
                });
                let call = netlist.add_stmt(Stmt::Call(sub));
                netlist.func_mut(func).stmts.push(call);
                sub_funcs.insert(scope, sub);
                sub
            }
        };
        // Move statements into the sub-function; for procedures, only the body
        let stmts = std::mem::take(&mut netlist.active_mut(active).stmts);
        for stmt in stmts {
            if let Stmt::Process { body } = netlist.stmt(stmt) {
                let body = body.clone();
                netlist.func_mut(sub_func).stmts.extend(body);
            } else {
                netlist.func_mut(sub_func).stmts.push(stmt);
            }
        }
        netlist.delete_active(active);
    }
}

//============================================================================
// Split large functions according to the output split option

/// If the function exceeds the split threshold, partition its direct
/// statement list into `__0, __1, ...` sub-functions and replace the body
/// with calls.
pub(crate) fn split_check(netlist: &mut Netlist, func: FuncId, opts: &SchedOptions) {
    let Some(threshold) = opts.split_funcs else { return };
    if netlist.func(func).stmts.is_empty() {
        return;
    }
    if netlist.stmts_count(&netlist.func(func).stmts) < threshold {
        return;
    }
    assert!(netlist.func(func).finals.is_empty(), "should not have any finals");

    let stmts = std::mem::take(&mut netlist.func_mut(func).stmts);
    let mut func_num = 0usize;
    let mut func_stmts = 0usize;
    let mut current: Option<FuncId> = None;
    for stmt in stmts {
        let count = netlist.stmt_count(stmt);
        if current.is_none() || func_stmts + count > threshold {
            let name = format!("{}__{}", netlist.func(func).name, func_num);
            func_num += 1;
            let scope = netlist.func(func).scope;
            let slow = netlist.func(func).slow;
            let sub = netlist.add_func(Func {
                name,
                scope,
                stmts: Vec::new(),
                finals: Vec::new(),
                slow,
                entry_point: false,
                dont_combine: true,
                is_loose: true,
                is_const: false,
                decl_private: false,
                ifdef_debug: false,
                mtasks: false,
            });
            let call = netlist.add_stmt(Stmt::Call(sub));
            netlist.func_mut(func).stmts.push(call);
            current = Some(sub);
            func_stmts = 0;
        }
        let sub = current.unwrap();
        netlist.func_mut(sub).stmts.push(stmt);
        func_stmts += count;
    }
}

/// Replace whole-word occurrences of `from` in `text` with `to`. Word
/// characters are alphanumerics and underscore.
pub(crate) fn replace_word(text: &str, from: &str, to: &str) -> String {
    let bytes = text.as_bytes();
    let is_word = |b: u8| b.is_ascii_alphanumeric() || b == b'_';
    let mut result = String::with_capacity(text.len());
    let mut pos = 0;
    while let Some(offset) = text[pos..].find(from) {
        let start = pos + offset;
        let end = start + from.len();
        let bounded_left = start == 0 || !is_word(bytes[start - 1]);
        let bounded_right = end == bytes.len() || !is_word(bytes[end]);
        result.push_str(&text[pos..start]);
        if bounded_left && bounded_right {
            result.push_str(to);
        } else {
            result.push_str(from);
        }
        pos = end;
    }
    result.push_str(&text[pos..]);
    result
}

//============================================================================
// Bolt together parts to create the top level _eval function

#[allow(clippy::too_many_arguments)]
fn create_eval(
    netlist: &mut Netlist,
    ico_loop: Option<Vec<StmtId>>,
    act_trig: &TriggerKit,
    pre_trig_vec: VarId,
    nba_trig_vec: VarId,
    act_func: FuncId,
    nba_func: FuncId,
    opts: &SchedOptions,
) {
    let func = make_top_function(netlist, "_eval", false);
    netlist.eval_fn = Some(func);

    // Start with the ico loop, if any
    if let Some(stmts) = ico_loop {
        netlist.func_mut(func).stmts.extend(stmts);
    }

    // Create the NBA trigger dumping function, which is the same as the act
    // trigger dumping function, but referencing the nba trigger vector
    let nba_dump = clone_dump_for_nba(netlist, act_trig, nba_trig_vec);

    // Create the active eval loop
    let act_vec = act_trig.vec;
    let act_compute = act_trig.compute_fn;
    let act_dump = act_trig.dump_fn;
    let active_eval_loop = make_eval_loop(
        netlist,
        "act",
        "Active",
        act_vec,
        act_dump,
        opts,
        |netlist| vec![netlist.add_stmt(Stmt::Call(act_compute))],
        |netlist| {
            // Compute the pre triggers, then latch the active trigger flags
            // under the NBA trigger flags
            let and_not = netlist.add_stmt(Stmt::TrigAndNot {
                dst: pre_trig_vec,
                a: act_vec,
                b: nba_trig_vec,
            });
            let set = netlist.add_stmt(Stmt::TrigSet { dst: nba_trig_vec, src: act_vec });
            let call = netlist.add_stmt(Stmt::Call(act_func));
            vec![and_not, set, call]
        },
    )
    .1;

    // Create the NBA eval loop. This uses the active eval loop in the trigger
    // section.
    let nba_eval_loop = make_eval_loop(
        netlist,
        "nba",
        "NBA",
        nba_trig_vec,
        nba_dump,
        opts,
        |netlist| {
            let mut stmts = vec![netlist.add_stmt(Stmt::TrigClear { vec: nba_trig_vec })];
            stmts.extend(active_eval_loop.iter().copied());
            stmts
        },
        |netlist| vec![netlist.add_stmt(Stmt::Call(nba_func))],
    )
    .1;

    netlist.func_mut(func).stmts.extend(nba_eval_loop);
}

/// Clone the act trigger dump function, redirecting every trigger vector
/// read to the nba vector and renaming "act" to "nba" in messages.
fn clone_dump_for_nba(netlist: &mut Netlist, act_trig: &TriggerKit, nba_trig_vec: VarId) -> FuncId {
    let template = netlist.func(act_trig.dump_fn).clone();
    let stmts = netlist.clone_stmts(&template.stmts);
    let stmts: Vec<StmtId> = stmts
        .into_iter()
        .map(|s| rewrite_dump_stmt(netlist, s, act_trig.vec, nba_trig_vec))
        .collect();
    netlist.add_func(Func { name: "_dump_triggers__nba".to_owned(), stmts, ..template })
}

fn rewrite_dump_stmt(netlist: &mut Netlist, stmt: StmtId, from: VarId, to: VarId) -> StmtId {
    match netlist.stmt(stmt).clone() {
        Stmt::If { cond, then_stmts, else_stmts, unlikely } => {
            let cond = netlist.rewrite_trigger_refs(cond, from, to);
            let then_stmts = then_stmts
                .into_iter()
                .map(|s| rewrite_dump_stmt(netlist, s, from, to))
                .collect();
            let else_stmts = else_stmts
                .into_iter()
                .map(|s| rewrite_dump_stmt(netlist, s, from, to))
                .collect();
            *netlist.stmt_mut(stmt) = Stmt::If { cond, then_stmts, else_stmts, unlikely };
            stmt
        }
        Stmt::DbgMsg(text) => {
            *netlist.stmt_mut(stmt) = Stmt::DbgMsg(replace_word(&text, "act", "nba"));
            stmt
        }
        other => panic!("trigger dump should only read state, found {other:?}"),
    }
}

//============================================================================
// Top level entry-point to scheduling

fn checkpoint(
    netlist: &Netlist,
    opts: &SchedOptions,
    trace: &mut Option<&mut ScheduleTrace>,
    stage: &str,
    sizes: &[(&str, &LogicByScope)],
) {
    if !opts.stats {
        return;
    }
    if let Some(t) = trace.as_deref_mut() {
        for (name, lbs) in sizes {
            t.add_size(name, lbs.total_stmt_count(netlist));
        }
        t.stage(stage);
    }
}

pub fn schedule(
    netlist: &mut Netlist,
    opts: &SchedOptions,
    mut trace: Option<&mut ScheduleTrace>,
) -> Result<(), SchedError> {
    // Step 1. Gather and classify all logic in the design
    let mut logic_classes = gather_logic_classes(netlist);
    checkpoint(
        netlist,
        opts,
        &mut trace,
        "sched-gather",
        &[
            ("size of class: static", &logic_classes.statics),
            ("size of class: initial", &logic_classes.initials),
            ("size of class: final", &logic_classes.finals),
        ],
    );

    // Step 2. Schedule static, initial and final logic classes in source order
    create_static(netlist, std::mem::take(&mut logic_classes.statics), opts);
    checkpoint(netlist, opts, &mut trace, "sched-static", &[]);

    let init_func = create_initial(netlist, std::mem::take(&mut logic_classes.initials));
    checkpoint(netlist, opts, &mut trace, "sched-initial", &[]);

    create_final(netlist, std::mem::take(&mut logic_classes.finals), opts);
    checkpoint(netlist, opts, &mut trace, "sched-final", &[]);

    // Step 3: Break combinational cycles by introducing hybrid logic.
    // Note: break_cycles also removes the corresponding logic from the comb
    // class.
    logic_classes.hybrid = cycle_break::break_cycles(netlist, &mut logic_classes.comb);
    checkpoint(
        netlist,
        opts,
        &mut trace,
        "sched-break-cycles",
        &[
            ("size of class: clocked", &logic_classes.clocked),
            ("size of class: combinational", &logic_classes.comb),
            ("size of class: hybrid", &logic_classes.hybrid),
        ],
    );

    // We pass around a single SenExprBuilder instance, as we only need one
    // set of 'prev' variables for edge/change detection in sensitivity
    // expressions, which this keeps track of.
    let mut sen_expr_builder = SenExprBuilder::new(init_func);

    // Step 4: Create the 'settle' region that restores the combinational
    // invariant
    create_settle(netlist, &mut sen_expr_builder, &logic_classes, opts)?;
    checkpoint(netlist, opts, &mut trace, "sched-settle", &[]);

    // Step 5: Partition the clocked and combinational (including hybrid)
    // logic into pre/act/nba
    let mut logic_regions = partition::partition(
        netlist,
        std::mem::take(&mut logic_classes.clocked),
        std::mem::take(&mut logic_classes.comb),
        std::mem::take(&mut logic_classes.hybrid),
    );
    checkpoint(
        netlist,
        opts,
        &mut trace,
        "sched-partition",
        &[
            ("size of region: Active Pre", &logic_regions.pre),
            ("size of region: Active", &logic_regions.act),
            ("size of region: NBA", &logic_regions.nba),
        ],
    );

    // Step 6: Replicate combinational logic
    let mut logic_replicas = replicate::replicate_logic(netlist, &logic_regions);
    checkpoint(
        netlist,
        opts,
        &mut trace,
        "sched-replicate",
        &[
            ("size of replicated logic: Input", &logic_replicas.ico),
            ("size of replicated logic: Active", &logic_replicas.act),
            ("size of replicated logic: NBA", &logic_replicas.nba),
        ],
    );

    // Step 7: Create the input combinational logic loop
    let ico_loop =
        create_input_comb_loop(netlist, &mut sen_expr_builder, &mut logic_replicas.ico, opts)?;
    checkpoint(netlist, opts, &mut trace, "sched-create-ico", &[]);

    // Step 8: Create the pre/act/nba triggers
    let dpi_export_trigger = netlist.dpi_export_trigger;

    let mut extra_triggers = 0u32;
    // We may have an extra trigger for variables updated in DPI exports
    let dpi_export_trigger_index = dpi_export_trigger.map(|_| {
        let index = extra_triggers;
        extra_triggers += 1;
        index
    });

    let sen_trees = get_sen_trees_used_by(
        netlist,
        &[&logic_regions.pre, &logic_regions.act, &logic_regions.nba],
    );
    let act_trig = create_triggers(
        netlist,
        &mut sen_expr_builder,
        &sen_trees,
        "act",
        extra_triggers,
        false,
        opts,
    );

    if let (Some(dpi_var), Some(index)) = (dpi_export_trigger, dpi_export_trigger_index) {
        act_trig.add_dpi_export_trigger_assignment(netlist, dpi_var, index);
    }

    let act_trig_vec = act_trig.vec;
    let pre_trig_vec = netlist.create_temp_like("__VpreTriggered", act_trig_vec);
    let nba_trig_vec = netlist.create_temp_like("__VnbaTriggered", act_trig_vec);

    // Derive the pre/nba trigger maps by cloning the act map and rewriting
    // every trigger vector reference to the corresponding new variable
    let clone_map_with_new_trigger_references =
        |netlist: &mut Netlist, map: &HashMap<SenTreeId, SenTreeId>, vec: VarId| {
            let mut new_map: HashMap<SenTreeId, SenTreeId> = HashMap::default();
            for (original, trigger) in map {
                let mut tree = netlist.sen_tree(*trigger).clone();
                for item in &mut tree.items {
                    let expr = item.expr.expect("trigger item without expression");
                    item.expr = Some(netlist.rewrite_trigger_refs(expr, act_trig_vec, vec));
                }
                let cloned = netlist.add_sen_tree(tree);
                new_map.insert(*original, cloned);
            }
            new_map
        };

    let act_trig_map = &act_trig.map;
    let pre_trig_map = clone_map_with_new_trigger_references(netlist, act_trig_map, pre_trig_vec);
    let nba_trig_map = clone_map_with_new_trigger_references(netlist, act_trig_map, nba_trig_vec);
    checkpoint(netlist, opts, &mut trace, "sched-create-triggers", &[]);

    // Note: running the act (or ico) regions on multiple threads has not
    // shown a win, so the multi-thread flag is honoured for nba only.

    // Step 9: Create the 'act' region evaluation function

    // Remap the sensitivities of the input logic to the triggers
    remap_sensitivities(netlist, &logic_regions.pre, &pre_trig_map);
    remap_sensitivities(netlist, &logic_regions.act, act_trig_map);
    remap_sensitivities(netlist, &logic_replicas.act, act_trig_map);

    // Create the inverse map from trigger sensitivity to original sensitivity
    let mut trig_to_sen_act: HashMap<SenTreeId, SenTreeId> = HashMap::default();
    invert_and_merge_sen_tree_map(&mut trig_to_sen_act, netlist, &pre_trig_map);
    invert_and_merge_sen_tree_map(&mut trig_to_sen_act, netlist, act_trig_map);

    // The DPI export trigger sensitivity
    let dpi_export_triggered =
        dpi_export_trigger_index.map(|index| act_trig.create_trigger_sen_tree(netlist, index));

    let act_func = order::order(
        netlist,
        &mut [&mut logic_regions.pre, &mut logic_regions.act, &mut logic_replicas.act],
        &trig_to_sen_act,
        "act",
        false,
        false,
        |netlist, var, out| {
            if netlist.var(var).written_by_dpi {
                out.extend(dpi_export_triggered);
            }
        },
    )?;
    split_check(netlist, act_func, opts);
    checkpoint(netlist, opts, &mut trace, "sched-create-act", &[]);

    // Step 10: Create the 'nba' region evaluation function

    remap_sensitivities(netlist, &logic_regions.nba, &nba_trig_map);
    remap_sensitivities(netlist, &logic_replicas.nba, &nba_trig_map);

    let mut trig_to_sen_nba: HashMap<SenTreeId, SenTreeId> = HashMap::default();
    invert_and_merge_sen_tree_map(&mut trig_to_sen_nba, netlist, &nba_trig_map);

    let nba_func = order::order(
        netlist,
        &mut [&mut logic_regions.nba, &mut logic_replicas.nba],
        &trig_to_sen_nba,
        "nba",
        opts.mtasks,
        false,
        |netlist, var, out| {
            if netlist.var(var).written_by_dpi {
                out.extend(dpi_export_triggered);
            }
        },
    )?;
    split_check(netlist, nba_func, opts);
    netlist.eval_nba_fn = Some(nba_func); // Remembered for downstream passes
    checkpoint(netlist, opts, &mut trace, "sched-create-nba", &[]);

    // Step 11: Bolt it all together to create the '_eval' function
    create_eval(
        netlist,
        ico_loop,
        &act_trig,
        pre_trig_vec,
        nba_trig_vec,
        act_func,
        nba_func,
        opts,
    );

    split_check(netlist, init_func, opts);

    netlist.dpi_export_trigger = None;

    // Everything gathered in step 1 must have been transplanted by now
    for scope in &netlist.scopes {
        assert!(scope.actives.is_empty(), "unconsumed activation in scope '{}'", scope.name);
    }
    if opts.dump_tree_level >= 3 {
        for func in &netlist.funcs {
            eprintln!("sched: {} ({} statements)", func.name, netlist.stmts_count(&func.stmts));
        }
    }
    Ok(())
}
