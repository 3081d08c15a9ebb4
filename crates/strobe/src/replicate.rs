//! Replicate combinational logic across regions. A combinational block
//! computes a pure function of its inputs, so it can legally run in any
//! region; it must run again wherever its inputs may have changed since the
//! last evaluation. The input loop gets a copy of everything fed by top
//! level inputs, and act/nba each get a copy of the other region's
//! combinational logic they interact with.

use crate::HashSet;
use crate::ir::{ActiveId, Netlist, ScopeId, VarId};
use crate::sched::{LogicByScope, LogicRegions, LogicReplicas};

struct Block {
    scope: ScopeId,
    active: ActiveId,
    reads: Vec<VarId>,
    writes: Vec<VarId>,
    /// Combinational or hybrid sensitivity, i.e. replicable
    replicable: bool,
    /// Index of the source region: act or nba
    in_act: bool,
}

fn characterize(netlist: &Netlist, lbs: &LogicByScope, in_act: bool, out: &mut Vec<Block>) {
    for (scope, active) in lbs.iter() {
        let mut reads = Vec::new();
        let mut writes = Vec::new();
        for stmt in &netlist.active(*active).stmts {
            netlist.stmt_reads_writes(*stmt, &mut reads, &mut writes);
        }
        let tree = netlist.sen_tree(netlist.active(*active).sen_tree);
        let replicable = tree.has_combo() || tree.has_hybrid();
        out.push(Block { scope: *scope, active: *active, reads, writes, replicable, in_act });
    }
}

fn clone_into(netlist: &mut Netlist, block: &Block, dst: &mut LogicByScope) {
    let original = netlist.active(block.active).clone();
    let stmts = netlist.clone_stmts(&original.stmts);
    let copy = netlist.add_active_detached(original.scope, original.sen_tree, stmts);
    dst.push(block.scope, copy);
}

pub fn replicate_logic(netlist: &mut Netlist, regions: &LogicRegions) -> LogicReplicas {
    let mut blocks: Vec<Block> = Vec::new();
    characterize(netlist, &regions.act, true, &mut blocks);
    characterize(netlist, &regions.nba, false, &mut blocks);

    // Per-region read and write sets
    let mut act_reads: HashSet<VarId> = HashSet::default();
    let mut act_writes: HashSet<VarId> = HashSet::default();
    let mut nba_reads: HashSet<VarId> = HashSet::default();
    let mut nba_writes: HashSet<VarId> = HashSet::default();
    for block in &blocks {
        if block.in_act {
            act_reads.extend(block.reads.iter().copied());
            act_writes.extend(block.writes.iter().copied());
        } else {
            nba_reads.extend(block.reads.iter().copied());
            nba_writes.extend(block.writes.iter().copied());
        }
    }

    // Variables fed (transitively, through combinational logic) by top level
    // inputs
    let mut input_fed: HashSet<VarId> = netlist
        .vars
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_top_input)
        .map(|(idx, _)| VarId(idx))
        .collect();
    loop {
        let mut changed = false;
        for block in &blocks {
            if !block.replicable {
                continue;
            }
            if block.reads.iter().any(|v| input_fed.contains(v)) {
                for var in &block.writes {
                    changed |= input_fed.insert(*var);
                }
            }
        }
        if !changed {
            break;
        }
    }

    let mut result = LogicReplicas::default();
    for block in &blocks {
        if !block.replicable {
            continue;
        }

        // Anything fed by a top level input re-evaluates in the input loop
        if block.reads.iter().any(|v| input_fed.contains(v)) {
            clone_into(netlist, block, &mut result.ico);
        }

        if block.in_act {
            // The nba region writes its inputs or reads its outputs
            if block.reads.iter().any(|v| nba_writes.contains(v))
                || block.writes.iter().any(|v| nba_reads.contains(v))
            {
                clone_into(netlist, block, &mut result.nba);
            }
        } else {
            // The act region writes its inputs or reads its outputs
            if block.reads.iter().any(|v| act_writes.contains(v))
                || block.writes.iter().any(|v| act_reads.contains(v))
            {
                clone_into(netlist, block, &mut result.act);
            }
        }
    }
    result
}
