//! Partition the clocked and combinational (including hybrid) logic into the
//! pre/act/nba regions of one eval tick.
//!
//! Signals used as clocks (referenced in a sensitivity tree) that are
//! assigned from clocked logic must be computed within the act region, as
//! must any combinational logic on a path feeding a clock. Shadow-variable
//! updates for non-blocking assignments go to pre. Everything else
//! evaluates in nba.

use crate::HashMap;
use crate::HashSet;
use crate::ir::{ActiveId, Netlist, Stmt, StmtId, VarId};
use crate::sched::{LogicByScope, LogicRegions};

fn is_pre_logic(netlist: &Netlist, stmts: &[StmtId]) -> bool {
    stmts.iter().all(|stmt| match netlist.stmt(*stmt) {
        Stmt::AssignPre { .. } => true,
        Stmt::Process { body } => is_pre_logic(netlist, body),
        _ => false,
    })
}

pub fn partition(
    netlist: &mut Netlist,
    clocked: LogicByScope,
    comb: LogicByScope,
    hybrid: LogicByScope,
) -> LogicRegions {
    // All blocks, remembering which ones are clocked
    let mut items: Vec<(bool, (crate::ir::ScopeId, ActiveId))> = Vec::new();
    items.extend(clocked.0.into_iter().map(|it| (true, it)));
    items.extend(comb.0.into_iter().map(|it| (false, it)));
    items.extend(hybrid.0.into_iter().map(|it| (false, it)));

    let mut reads: Vec<Vec<VarId>> = Vec::with_capacity(items.len());
    let mut writes: Vec<Vec<VarId>> = Vec::with_capacity(items.len());
    for (_, (_, active)) in &items {
        let mut r = Vec::new();
        let mut w = Vec::new();
        for stmt in &netlist.active(*active).stmts {
            netlist.stmt_reads_writes(*stmt, &mut r, &mut w);
        }
        reads.push(r);
        writes.push(w);
    }

    // The variables sensed by any sensitivity tree of this logic are clocks
    let mut clock_vars: HashSet<VarId> = HashSet::default();
    for (_, (_, active)) in &items {
        let tree = netlist.active(*active).sen_tree;
        for item in &netlist.sen_tree(tree).items {
            if let Some(expr) = item.expr {
                let mut vars = Vec::new();
                netlist.expr_reads(expr, &mut vars);
                clock_vars.extend(vars);
            }
        }
    }

    // Fixed point: a block feeds a clock if it writes a clock-feeding
    // variable. Propagation continues through combinational blocks only; a
    // clocked block samples its inputs, so its inputs need not be active
    // region themselves.
    let mut writers: HashMap<VarId, Vec<usize>> = HashMap::default();
    for (idx, w) in writes.iter().enumerate() {
        for var in w {
            writers.entry(*var).or_default().push(idx);
        }
    }
    let mut feeds_clock = vec![false; items.len()];
    let mut worklist: Vec<VarId> = clock_vars.iter().copied().collect();
    let mut visited_vars: HashSet<VarId> = clock_vars.clone();
    while let Some(var) = worklist.pop() {
        let Some(ws) = writers.get(&var) else { continue };
        for &w in ws {
            if feeds_clock[w] {
                continue;
            }
            feeds_clock[w] = true;
            let (is_clocked, _) = items[w];
            if !is_clocked {
                for input in &reads[w] {
                    if visited_vars.insert(*input) {
                        worklist.push(*input);
                    }
                }
            }
        }
    }

    let mut result = LogicRegions::default();
    for (idx, (is_clocked, (scope, active))) in items.into_iter().enumerate() {
        if is_clocked && is_pre_logic(netlist, &netlist.active(active).stmts) {
            result.pre.push(scope, active);
        } else if feeds_clock[idx] {
            result.act.push(scope, active);
        } else {
            result.nba.push(scope, active);
        }
    }
    result
}
