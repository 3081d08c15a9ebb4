//! Collect and classify all logic in the design.

use crate::ir::{Netlist, ScopeId};
use crate::sched::LogicClasses;

/// Walk every scope and bucket each activation by the kind of its
/// sensitivity tree. Empty activations are deleted. Source order is
/// preserved within each bucket.
pub fn gather_logic_classes(netlist: &mut Netlist) -> LogicClasses {
    let mut result = LogicClasses::default();

    for scope_idx in 0..netlist.scopes.len() {
        let scope = ScopeId(scope_idx);
        let mut empty = Vec::new();

        for active in netlist.scope(scope).actives.clone() {
            let tree = netlist.active(active).sen_tree;
            let senp = netlist.sen_tree(tree);
            if netlist.active(active).stmts.is_empty() {
                // Some activations might be empty due to previous optimizations
                empty.push(active);
            } else if senp.has_static() {
                assert_eq!(senp.items.len(), 1, "static initializer with additional sensitivities");
                result.statics.push(scope, active);
            } else if senp.has_initial() {
                assert_eq!(senp.items.len(), 1, "'initial' logic with additional sensitivities");
                result.initials.push(scope, active);
            } else if senp.has_final() {
                assert_eq!(senp.items.len(), 1, "'final' logic with additional sensitivities");
                result.finals.push(scope, active);
            } else if senp.has_combo() {
                assert_eq!(senp.items.len(), 1, "combinational logic with additional sensitivities");
                result.comb.push(scope, active);
            } else {
                assert!(senp.has_clocked(), "what else could it be?");
                result.clocked.push(scope, active);
            }
        }

        for active in empty {
            netlist.delete_active(active);
        }
    }

    result
}
