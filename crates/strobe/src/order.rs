//! Ordering: turn a collection of triggered logic into a single callable
//! body function that evaluates the logic respecting data dependencies.
//!
//! Each activation is guarded by the trigger flags it is sensitive to.
//! Combinational and hybrid logic additionally inherits the guards of the
//! logic that writes its inputs, so that a change anywhere upstream
//! re-evaluates the downstream logic within the same iteration.

use crate::HashMap;
use crate::HashSet;
use crate::ir::{
    ActiveId, Expr, ExprId, FuncId, Netlist, SenTreeId, Stmt, VarId,
};
use crate::sched::{LogicByScope, SchedError, make_sub_function};
use std::collections::BTreeSet;

/// One trigger flag: the vector variable and the bit index within it.
type TrigBit = (VarId, u32);

struct Block {
    active: ActiveId,
    reads: Vec<VarId>,
    writes: Vec<VarId>,
    /// Pure combinational (no sensitivity remap happened)
    combo: bool,
    /// Originally a hybrid sensitivity: ordered like combinational logic
    /// against its non-cut dependencies
    hybrid: bool,
    /// Trigger flags from the block's own (remapped) sensitivity plus the
    /// caller-injected extras of the variables it reads
    bits: BTreeSet<TrigBit>,
}

/// Extract the single trigger flag a synthetic sensitivity tree reads.
fn trigger_bit_of(netlist: &Netlist, tree: SenTreeId) -> TrigBit {
    let senp = netlist.sen_tree(tree);
    assert_eq!(senp.items.len(), 1, "trigger sensitivity should have a single item");
    let expr = senp.items[0].expr.expect("trigger sensitivity without expression");
    match *netlist.exprs.get(expr) {
        Expr::TrigAt { vec, index } => (vec, index),
        _ => panic!("trigger sensitivity should read a trigger flag"),
    }
}

//============================================================================
// Tarjan's strongly connected components

struct TarjanContext {
    index: usize,
    stack: Vec<usize>,
    on_stack: HashSet<usize>,
    indices: Vec<Option<usize>>,
    lowlink: Vec<Option<usize>>,
    sccs: Vec<Vec<usize>>,
}

fn strong_connect(u: usize, adj: &[Vec<usize>], ctx: &mut TarjanContext) {
    ctx.indices[u] = Some(ctx.index);
    ctx.lowlink[u] = Some(ctx.index);
    ctx.index += 1;
    ctx.stack.push(u);
    ctx.on_stack.insert(u);

    for &v in &adj[u] {
        if ctx.indices[v].is_none() {
            strong_connect(v, adj, ctx);
            ctx.lowlink[u] = Some(ctx.lowlink[u].unwrap().min(ctx.lowlink[v].unwrap()));
        } else if ctx.on_stack.contains(&v) {
            ctx.lowlink[u] = Some(ctx.lowlink[u].unwrap().min(ctx.indices[v].unwrap()));
        }
    }

    if ctx.lowlink[u] == ctx.indices[u] {
        let mut scc = Vec::new();
        while let Some(w) = ctx.stack.pop() {
            ctx.on_stack.remove(&w);
            scc.push(w);
            if w == u {
                break;
            }
        }
        ctx.sccs.push(scc);
    }
}

pub(crate) fn sccs_in_topological_order(adj: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let n = adj.len();
    let mut ctx = TarjanContext {
        index: 0,
        stack: Vec::new(),
        on_stack: HashSet::default(),
        indices: vec![None; n],
        lowlink: vec![None; n],
        sccs: Vec::new(),
    };
    for u in 0..n {
        if ctx.indices[u].is_none() {
            strong_connect(u, adj, &mut ctx);
        }
    }
    ctx.sccs.reverse();
    ctx.sccs
}

//============================================================================
// The ordering pass

/// Consume the given logic sets and produce `_eval_<tag>`: the activations'
/// statements, dependency ordered and wrapped in their trigger guards.
///
/// `trig_to_sen` maps trigger sensitivities back to the original trees, so
/// ordering can see the real dependencies behind a trigger flag.
/// `extra_triggers_for` lets the caller inject synthetic sensitivities per
/// variable. The multi-thread flag is recorded on the emitted function only;
/// `settle` marks the fixed-point (slow path) variant.
pub fn order(
    netlist: &mut Netlist,
    logic: &mut [&mut LogicByScope],
    trig_to_sen: &HashMap<SenTreeId, SenTreeId>,
    tag: &str,
    mtasks: bool,
    settle: bool,
    mut extra_triggers_for: impl FnMut(&Netlist, VarId, &mut Vec<SenTreeId>),
) -> Result<FuncId, SchedError> {
    // Flatten the logic sets in order, consuming them
    let actives: Vec<ActiveId> = logic
        .iter_mut()
        .flat_map(|lbs| std::mem::take(&mut lbs.0))
        .map(|(_, active)| active)
        .collect();

    // Characterize each block
    let mut blocks: Vec<Block> = Vec::with_capacity(actives.len());
    for active in actives {
        let mut reads = Vec::new();
        let mut writes = Vec::new();
        for stmt in &netlist.active(active).stmts {
            netlist.stmt_reads_writes(*stmt, &mut reads, &mut writes);
        }

        let tree = netlist.active(active).sen_tree;
        let combo = netlist.sen_tree(tree).has_combo();
        let original = trig_to_sen.get(&tree);
        let hybrid = original.is_some_and(|t| netlist.sen_tree(*t).has_hybrid());

        let mut bits = BTreeSet::new();
        if !combo {
            bits.insert(trigger_bit_of(netlist, tree));
        }
        // Caller-injected sensitivities, per read variable
        let mut seen_vars: HashSet<VarId> = HashSet::default();
        for var in &reads {
            if !seen_vars.insert(*var) {
                continue;
            }
            let mut extra = Vec::new();
            extra_triggers_for(netlist, *var, &mut extra);
            for tree in extra {
                bits.insert(trigger_bit_of(netlist, tree));
            }
        }

        blocks.push(Block { active, reads, writes, combo, hybrid, bits });
    }

    // Continuous assignments must be single-driven
    {
        let mut combo_driver: HashMap<VarId, usize> = HashMap::default();
        for (idx, block) in blocks.iter().enumerate() {
            if !block.combo {
                continue;
            }
            for var in &block.writes {
                if let Some(prev) = combo_driver.insert(*var, idx) {
                    if prev != idx {
                        return Err(SchedError::MultipleDriver {
                            var: netlist.var(*var).name.clone(),
                        });
                    }
                }
            }
        }
    }

    // Build the dependency graph: writer before reader
    let mut writers: HashMap<VarId, Vec<usize>> = HashMap::default();
    for (idx, block) in blocks.iter().enumerate() {
        for var in &block.writes {
            writers.entry(*var).or_default().push(idx);
        }
    }
    let n = blocks.len();
    let mut adj: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (u, block) in blocks.iter().enumerate() {
        // Data dependencies of the statements
        let mut dep_vars: Vec<VarId> = block.reads.clone();
        // Dependencies behind the trigger flag: the variables sensed by the
        // original sensitivity tree
        let tree = netlist.active(block.active).sen_tree;
        if let Some(original) = trig_to_sen.get(&tree) {
            for item in &netlist.sen_tree(*original).items {
                if let Some(expr) = item.expr {
                    netlist.expr_reads(expr, &mut dep_vars);
                }
            }
        }
        let mut seen: HashSet<usize> = HashSet::default();
        for var in dep_vars {
            if let Some(ws) = writers.get(&var) {
                for &w in ws {
                    if w != u && seen.insert(w) {
                        adj[w].push(u);
                    }
                }
            }
        }
    }

    let sccs = sccs_in_topological_order(&adj);

    // Resolve the guard of every block. Combinational and hybrid logic
    // inherits the guards of its writers; other logic fires on its own
    // triggers only. Members of a cyclic component share the union of the
    // component's flags.
    let mut guards: Vec<BTreeSet<TrigBit>> = blocks.iter().map(|b| b.bits.clone()).collect();
    for scc in &sccs {
        let mut scc_bits: BTreeSet<TrigBit> = BTreeSet::new();
        for &u in scc {
            scc_bits.extend(blocks[u].bits.iter().copied());
            if blocks[u].combo || blocks[u].hybrid {
                for var in &blocks[u].reads {
                    if let Some(ws) = writers.get(var) {
                        for &w in ws {
                            if !scc.contains(&w) {
                                scc_bits.extend(guards[w].iter().copied());
                            }
                        }
                    }
                }
            }
        }
        for &u in scc {
            if blocks[u].combo || blocks[u].hybrid {
                guards[u] = scc_bits.clone();
            }
        }
    }

    // Emit the body function
    let func = make_sub_function(netlist, &format!("_eval_{tag}"), settle);
    netlist.func_mut(func).mtasks = mtasks;

    for scc in sccs {
        // Within a cyclic component, keep source order; the enclosing eval
        // loop converges the cycle
        let mut members = scc;
        members.sort_unstable();
        for u in members {
            let block = &blocks[u];
            let active = block.active;
            let guard = &guards[u];

            // Transplant the statements; for procedures, only the body
            let stmts = std::mem::take(&mut netlist.active_mut(active).stmts);
            let mut body = Vec::new();
            for stmt in stmts {
                if let Stmt::Process { body: inner } = netlist.stmt(stmt) {
                    body.extend(inner.clone());
                } else {
                    body.push(stmt);
                }
            }

            if guard.is_empty() {
                netlist.func_mut(func).stmts.extend(body);
            } else {
                let mut cond: Option<ExprId> = None;
                for (vec, index) in guard {
                    let bit = netlist.trig_at(*vec, *index);
                    cond = Some(match cond {
                        Some(acc) => netlist.or(acc, bit),
                        None => bit,
                    });
                }
                let guarded = netlist.add_stmt(Stmt::If {
                    cond: cond.unwrap(),
                    then_stmts: body,
                    else_stmts: vec![],
                    unlikely: false,
                });
                netlist.func_mut(func).stmts.push(guarded);
            }

            netlist.delete_active(active);
        }
    }

    Ok(func)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{DType, EdgeKind, LValue, SenItem, SenTree};
    use crate::sched::LogicByScope;

    fn combo_tree(netlist: &mut Netlist) -> SenTreeId {
        netlist.add_sen_tree(SenTree { items: vec![SenItem { edge: EdgeKind::Combo, expr: None }] })
    }

    fn assign_active(
        netlist: &mut Netlist,
        lbs: &mut LogicByScope,
        tree: SenTreeId,
        lhs: VarId,
        rhs: ExprId,
    ) -> ActiveId {
        let scope = netlist.top_scope();
        let stmt = netlist.add_stmt(Stmt::Assign { lhs: LValue::Var(lhs), rhs });
        let active = netlist.add_active(scope, tree, vec![stmt]);
        lbs.push(scope, active);
        active
    }

    #[test]
    fn test_dependency_order_writer_first() {
        let mut netlist = Netlist::new("top");
        let a = netlist.create_temp("a", DType::Bit { width: 1 });
        let b = netlist.create_temp("b", DType::Bit { width: 1 });
        let c = netlist.create_temp("c", DType::Bit { width: 1 });
        let tree = combo_tree(&mut netlist);

        let mut logic = LogicByScope::default();
        // b = a (reader listed first on purpose)
        let a_ref = netlist.var_ref(a);
        assign_active(&mut netlist, &mut logic, tree, b, a_ref);
        // a = c
        let c_ref = netlist.var_ref(c);
        assign_active(&mut netlist, &mut logic, tree, a, c_ref);

        let func = order(
            &mut netlist,
            &mut [&mut logic],
            &HashMap::default(),
            "stl",
            false,
            true,
            |_, _, _| {},
        )
        .unwrap();

        let stmts = netlist.func(func).stmts.clone();
        assert_eq!(stmts.len(), 2);
        let written: Vec<VarId> = stmts
            .iter()
            .map(|s| match netlist.stmt(*s) {
                Stmt::Assign { lhs: LValue::Var(v), .. } => *v,
                other => panic!("unguarded assign expected, found {other:?}"),
            })
            .collect();
        assert_eq!(written, vec![a, b]);
        assert!(logic.is_empty());
    }

    #[test]
    fn test_multiple_driver_detected() {
        let mut netlist = Netlist::new("top");
        let a = netlist.create_temp("a", DType::Bit { width: 1 });
        let tree = combo_tree(&mut netlist);
        let mut logic = LogicByScope::default();
        let zero = netlist.const_u(0, 1);
        let one = netlist.const_u(1, 1);
        assign_active(&mut netlist, &mut logic, tree, a, zero);
        assign_active(&mut netlist, &mut logic, tree, a, one);

        let result = order(
            &mut netlist,
            &mut [&mut logic],
            &HashMap::default(),
            "stl",
            false,
            true,
            |_, _, _| {},
        );
        assert_eq!(result.unwrap_err(), SchedError::MultipleDriver { var: "a".to_owned() });
    }

    #[test]
    fn test_triggered_block_is_guarded() {
        let mut netlist = Netlist::new("top");
        let q = netlist.create_temp("q", DType::Bit { width: 1 });
        let d = netlist.create_temp("d", DType::Bit { width: 1 });
        let vec = netlist.create_temp("__VactTriggered", DType::TriggerVec { width: 1 });

        // The remapped sensitivity: fire on trigger bit 0
        let bit = netlist.trig_at(vec, 0);
        let trig_tree = netlist.add_sen_tree(SenTree {
            items: vec![SenItem { edge: EdgeKind::True, expr: Some(bit) }],
        });
        // The original sensitivity behind it
        let clk = netlist.create_temp("clk", DType::Bit { width: 1 });
        let clk_ref = netlist.var_ref(clk);
        let orig_tree = netlist.add_sen_tree(SenTree {
            items: vec![SenItem { edge: EdgeKind::Posedge, expr: Some(clk_ref) }],
        });
        let mut inv: HashMap<SenTreeId, SenTreeId> = HashMap::default();
        inv.insert(trig_tree, orig_tree);

        let mut logic = LogicByScope::default();
        let d_ref = netlist.var_ref(d);
        assign_active(&mut netlist, &mut logic, trig_tree, q, d_ref);

        let func =
            order(&mut netlist, &mut [&mut logic], &inv, "act", false, false, |_, _, _| {})
                .unwrap();

        let stmts = netlist.func(func).stmts.clone();
        assert_eq!(stmts.len(), 1);
        let Stmt::If { cond, then_stmts, .. } = netlist.stmt(stmts[0]) else {
            panic!("triggered block should be guarded");
        };
        assert_eq!(*netlist.exprs.get(*cond), Expr::TrigAt { vec, index: 0 });
        assert!(matches!(netlist.stmt(then_stmts[0]), Stmt::Assign { .. }));
    }

    #[test]
    fn test_combo_inherits_upstream_guard() {
        let mut netlist = Netlist::new("top");
        let q = netlist.create_temp("q", DType::Bit { width: 1 });
        let y = netlist.create_temp("y", DType::Bit { width: 1 });
        let d = netlist.create_temp("d", DType::Bit { width: 1 });
        let vec = netlist.create_temp("__VactTriggered", DType::TriggerVec { width: 1 });

        let bit = netlist.trig_at(vec, 0);
        let trig_tree = netlist.add_sen_tree(SenTree {
            items: vec![SenItem { edge: EdgeKind::True, expr: Some(bit) }],
        });
        let clk = netlist.create_temp("clk", DType::Bit { width: 1 });
        let clk_ref = netlist.var_ref(clk);
        let orig_tree = netlist.add_sen_tree(SenTree {
            items: vec![SenItem { edge: EdgeKind::Posedge, expr: Some(clk_ref) }],
        });
        let mut inv: HashMap<SenTreeId, SenTreeId> = HashMap::default();
        inv.insert(trig_tree, orig_tree);

        let mut logic = LogicByScope::default();
        // q is written under the trigger; y = q combinationally
        let d_ref = netlist.var_ref(d);
        assign_active(&mut netlist, &mut logic, trig_tree, q, d_ref);
        let combo = combo_tree(&mut netlist);
        let q_ref = netlist.var_ref(q);
        assign_active(&mut netlist, &mut logic, combo, y, q_ref);

        let func =
            order(&mut netlist, &mut [&mut logic], &inv, "nba", false, false, |_, _, _| {})
                .unwrap();

        let stmts = netlist.func(func).stmts.clone();
        assert_eq!(stmts.len(), 2);
        // The combinational follower is guarded by the writer's trigger
        let Stmt::If { cond, .. } = netlist.stmt(stmts[1]) else {
            panic!("downstream combinational logic should inherit the guard");
        };
        assert_eq!(*netlist.exprs.get(*cond), Expr::TrigAt { vec, index: 0 });
    }
}
