//! Break combinational cycles by reclassifying the logic on a cycle as
//! hybrid: instead of being ordered purely by data dependencies, hybrid
//! logic re-evaluates through explicit change-detection triggers on its
//! loop-carried inputs, inside a bounded fixed-point loop.

use crate::HashMap;
use crate::HashSet;
use crate::ir::{EdgeKind, Netlist, SenItem, SenTree, VarId};
use crate::order::sccs_in_topological_order;
use crate::sched::LogicByScope;

/// Move every combinational activation that participates in a dependency
/// cycle from `comb` into the returned hybrid set. `comb` is mutated in
/// place.
pub fn break_cycles(netlist: &mut Netlist, comb: &mut LogicByScope) -> LogicByScope {
    let items: Vec<_> = comb.0.clone();

    // Reads and writes of each block
    let mut reads: Vec<Vec<VarId>> = Vec::with_capacity(items.len());
    let mut writes: Vec<Vec<VarId>> = Vec::with_capacity(items.len());
    for (_, active) in &items {
        let mut r = Vec::new();
        let mut w = Vec::new();
        for stmt in &netlist.active(*active).stmts {
            netlist.stmt_reads_writes(*stmt, &mut r, &mut w);
        }
        reads.push(r);
        writes.push(w);
    }

    // Dependency graph: writer before reader
    let mut writers: HashMap<VarId, Vec<usize>> = HashMap::default();
    for (idx, w) in writes.iter().enumerate() {
        for var in w {
            writers.entry(*var).or_default().push(idx);
        }
    }
    let n = items.len();
    let mut adj: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (u, r) in reads.iter().enumerate() {
        let mut seen: HashSet<usize> = HashSet::default();
        for var in r {
            if let Some(ws) = writers.get(var) {
                for &w in ws {
                    if seen.insert(w) {
                        adj[w].push(u);
                    }
                }
            }
        }
    }

    // Any component with a cycle becomes hybrid
    let mut cyclic = vec![false; n];
    for scc in sccs_in_topological_order(&adj) {
        let is_loop = scc.len() > 1 || (scc.len() == 1 && adj[scc[0]].contains(&scc[0]));
        if !is_loop {
            continue;
        }
        let scc_writes: HashSet<VarId> =
            scc.iter().flat_map(|&u| writes[u].iter().copied()).collect();
        for &u in &scc {
            cyclic[u] = true;
            // Sense changes of the loop-carried inputs only; acyclic inputs
            // stay ordinary ordering dependencies
            let mut items_for_tree = Vec::new();
            let mut seen: HashSet<VarId> = HashSet::default();
            for var in &reads[u] {
                if scc_writes.contains(var) && seen.insert(*var) {
                    let expr = netlist.var_ref(*var);
                    items_for_tree.push(SenItem { edge: EdgeKind::Hybrid, expr: Some(expr) });
                }
            }
            let tree = netlist.add_sen_tree(SenTree { items: items_for_tree });
            let (_, active) = items[u];
            netlist.active_mut(active).sen_tree = tree;
        }
    }

    let mut hybrid = LogicByScope::default();
    let mut remaining = Vec::new();
    for (idx, (scope, active)) in items.into_iter().enumerate() {
        if cyclic[idx] {
            hybrid.push(scope, active);
        } else {
            remaining.push((scope, active));
        }
    }
    comb.0 = remaining;
    hybrid
}
